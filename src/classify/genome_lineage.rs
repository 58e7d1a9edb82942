// src/classify/genome_lineage.rs

use serde::Serialize;

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::gather::gather_at_rank;
use crate::refdb::ReferenceOracle;
use crate::sketch::HashSketch;
use crate::taxonomy::{Lineage, Rank};

/// How a caller-provided lineage compares with the k-mer guess. Informational
/// only: a provided lineage is used either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvidedAgreement {
    Agrees,
    Disagrees,
    /// Gather produced no lineage to compare against.
    NoGuess,
}

/// Outcome of genome lineage resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenomeLineageResult {
    /// Resolved lineage; `None` when resolution failed.
    pub lineage: Option<Lineage>,
    /// Best-supported gather lineage at the configured match rank.
    pub guessed: Option<Lineage>,
    /// Match rank to classify contigs at, after pulling back to the
    /// resolved lineage's depth.
    pub match_rank: Rank,
    pub f_ident: f64,
    pub f_major: f64,
    pub comment: Option<String>,
    pub provided_agreement: Option<ProvidedAgreement>,
}

impl GenomeLineageResult {
    pub fn is_resolved(&self) -> bool {
        self.lineage.is_some()
    }

    /// Mark resolution as failed, keeping the confidence metrics.
    pub fn fail(&mut self, comment: impl Into<String>) {
        self.lineage = None;
        self.comment = Some(comment.into());
    }
}

/// Result of [`choose_genome_lineage`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineageChoice {
    pub lineage: Option<Lineage>,
    pub comment: Option<String>,
    pub provided_agreement: Option<ProvidedAgreement>,
}

fn percent(threshold: f64) -> String {
    format!("{:.0}%", threshold * 100.0)
}

/// Pick the genome lineage from the gather guess and an optional provided
/// lineage. The first applicable rule wins:
/// 1. a provided lineage is used (truncated to `match_rank`);
/// 2. too few identified hashes fails;
/// 3. too few hashes in the major lineage fails;
/// 4. otherwise the guess is used.
pub fn choose_genome_lineage(
    guessed: Option<&Lineage>,
    provided: Option<&Lineage>,
    match_rank: Rank,
    f_ident: f64,
    f_major: f64,
    config: &ClassifierConfig,
) -> LineageChoice {
    if let Some(provided) = provided.filter(|l| !l.is_empty()) {
        let agreement = match guessed {
            Some(g) if provided.matches_at_rank(g, match_rank) => {
                log::info!("provided lineage agrees with k-mer classification at {} level", match_rank);
                ProvidedAgreement::Agrees
            }
            Some(_) => {
                log::info!(
                    "provided lineage disagrees with k-mer classification at or above {} level",
                    match_rank
                );
                ProvidedAgreement::Disagrees
            }
            None => ProvidedAgreement::NoGuess,
        };
        log::info!("using provided lineage as genome lineage");
        return LineageChoice {
            lineage: Some(provided.truncate(match_rank)),
            comment: None,
            provided_agreement: Some(agreement),
        };
    }

    let failed = |comment: String| {
        log::warn!("{}", comment);
        LineageChoice {
            lineage: None,
            comment: Some(comment),
            provided_agreement: None,
        }
    };

    if f_ident < config.f_ident_threshold {
        return failed(format!(
            "too few identifiable hashes; f_ident < {}. provide a lineage for this genome.",
            percent(config.f_ident_threshold)
        ));
    }
    if f_major < config.f_major_threshold {
        return failed(format!(
            "too few hashes in major lineage; f_major < {}. provide a lineage for this genome.",
            percent(config.f_major_threshold)
        ));
    }
    match guessed.filter(|l| !l.is_empty()) {
        Some(g) => {
            log::info!("using majority gather lineage as genome lineage");
            LineageChoice {
                lineage: Some(g.truncate(match_rank)),
                comment: None,
                provided_agreement: None,
            }
        }
        None => failed("no lineage for the major gather match. provide a lineage for this genome.".to_string()),
    }
}

/// A genome cannot be judged at a rank deeper than its lineage is known to.
pub fn pull_back_rank(lineage: &Lineage, match_rank: Rank) -> Rank {
    match lineage.deepest_rank() {
        Some(deepest) if deepest < match_rank => deepest,
        _ => match_rank,
    }
}

/// Resolve one authoritative lineage for the whole genome.
///
/// `f_ident` is the fraction of genome hashes explained by any reference;
/// `f_major` the fraction of explained hashes in the top lineage, where the
/// top lineage is the best-supported one with at least
/// `gather_min_matches` hashes.
pub fn resolve_genome_lineage<O>(
    genome: &HashSketch,
    oracle: &O,
    provided: Option<&Lineage>,
    config: &ClassifierConfig,
) -> Result<GenomeLineageResult>
where
    O: ReferenceOracle + ?Sized,
{
    let match_rank = config.match_rank;
    let matches = gather_at_rank(genome, oracle, match_rank)?;

    let sum_identified: u64 = matches.iter().map(|m| m.count).sum();
    let top = matches
        .iter()
        .find(|m| m.count >= config.gather_min_matches);

    let f_ident = if genome.is_empty() {
        0.0
    } else {
        sum_identified as f64 / genome.len() as f64
    };
    let f_major = match top {
        Some(t) if sum_identified > 0 => t.count as f64 / sum_identified as f64,
        _ => 0.0,
    };
    let guessed = top.map(|t| t.lineage.clone());
    log::info!(
        "gather classification on this genome yields: {} (f_ident {:.3}, f_major {:.3})",
        guessed.as_ref().map(|l| l.display_short()).unwrap_or_else(|| Lineage::empty().display_short()),
        f_ident,
        f_major
    );

    let choice = choose_genome_lineage(guessed.as_ref(), provided, match_rank, f_ident, f_major, config);
    let effective_rank = choice
        .lineage
        .as_ref()
        .map(|l| pull_back_rank(l, match_rank))
        .unwrap_or(match_rank);
    if effective_rank != match_rank {
        log::info!(
            "genome lineage only known to {}; classifying contigs at {} instead of {}",
            effective_rank,
            effective_rank,
            match_rank
        );
    }

    Ok(GenomeLineageResult {
        lineage: choice.lineage,
        guessed,
        match_rank: effective_rank,
        f_ident,
        f_major,
        comment: choice.comment,
        provided_agreement: choice.provided_agreement,
    })
}
