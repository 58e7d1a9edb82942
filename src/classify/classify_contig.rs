// src/classify/classify_contig.rs

use std::fmt;

use serde::Serialize;

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::gather::{aggregate_at_rank, gather_references, total_count, ReferenceHit};
use crate::refdb::ReferenceOracle;
use crate::sketch::HashSketch;
use crate::taxonomy::{Lineage, Rank};

/// Final state of one contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContigState {
    Clean,
    Dirty,
    NoIdent,
    NoHash,
}

impl ContigState {
    pub fn as_str(self) -> &'static str {
        match self {
            ContigState::Clean => "clean",
            ContigState::Dirty => "dirty",
            ContigState::NoIdent => "no_ident",
            ContigState::NoHash => "no_hash",
        }
    }

    /// Only dirty contigs are removed from the genome.
    pub fn is_dirty(self) -> bool {
        self == ContigState::Dirty
    }
}

impl fmt::Display for ContigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a contig ended up in its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DecisionReason {
    /// Fewer hashes than `gather_min_matches`; nothing was checked.
    TooFewHashes,
    /// Gather content agreeing with the genome reached `gather_min_matches`.
    AggregateAgrees,
    /// No reference matched at all.
    NoMatch,
    /// The best reference shares fewer than `min_ident_hashes`.
    BelowIdentityFloor,
    /// The best reference's lineage stops above the match rank, so it can
    /// neither confirm nor contradict the genome.
    BestMatchUnresolved,
    /// The best reference agrees with the genome at the match rank.
    BestMatchAgrees,
    /// The best reference belongs to another lineage; `rank` is the
    /// shallowest rank at which the two lineages differ.
    BestMatchDisagrees { rank: Rank },
}

impl DecisionReason {
    pub fn code(&self) -> String {
        match self {
            DecisionReason::TooFewHashes => "too_few_hashes".to_string(),
            DecisionReason::AggregateAgrees => "aggregate_agrees".to_string(),
            DecisionReason::NoMatch => "no_match".to_string(),
            DecisionReason::BelowIdentityFloor => "below_identity_floor".to_string(),
            DecisionReason::BestMatchUnresolved => "best_match_unresolved".to_string(),
            DecisionReason::BestMatchAgrees => "best_match_agrees".to_string(),
            DecisionReason::BestMatchDisagrees { rank } => format!("disagrees_at_{}", rank),
        }
    }
}

/// Gather output for one contig, independent of any match rank.
#[derive(Debug, Clone, Default)]
pub struct ContigEvidence {
    pub total_hashes: u64,
    pub scale: u64,
    /// Empty when the contig had too few hashes to gather.
    pub hits: Vec<ReferenceHit>,
}

impl ContigEvidence {
    /// The single reference that explained the most hashes. Ties go to the
    /// earlier gather round.
    pub fn best_hit(&self) -> Option<&ReferenceHit> {
        self.hits
            .iter()
            .fold(None, |best: Option<&ReferenceHit>, h| match best {
                Some(b) if b.count >= h.count => Some(b),
                _ => Some(h),
            })
    }
}

/// Run gather on a contig sketch. Contigs below `gather_min_matches` hashes are
/// not gathered; they classify as `NoHash` regardless of rank.
pub fn gather_contig_evidence<O>(
    sketch: &HashSketch,
    oracle: &O,
    config: &ClassifierConfig,
) -> Result<ContigEvidence>
where
    O: ReferenceOracle + ?Sized,
{
    let total_hashes = sketch.len() as u64;
    let hits = if total_hashes < config.gather_min_matches {
        Vec::new()
    } else {
        gather_references(sketch, oracle)?
    };
    Ok(ContigEvidence {
        total_hashes,
        scale: sketch.scale(),
        hits,
    })
}

/// Immutable per-contig outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContigDecision {
    pub name: String,
    pub length: u64,
    pub state: ContigState,
    pub reason: DecisionReason,
    /// The contig's own lineage at match rank, when it has one.
    pub contig_lineage: Option<Lineage>,
    pub total_hashes: u64,
    /// Hashes explained by any reference.
    pub identified_hashes: u64,
    /// Hashes explained by references agreeing with the genome lineage.
    pub matched_hashes: u64,
    /// For dirty contigs: disagreeing lineages at match rank with the
    /// approximate bp (`count * scale`) each explains.
    pub foreign: Vec<(Lineage, u64)>,
}

/// Decide one contig's state at `match_rank` against the resolved genome
/// lineage.
///
/// Agreement in aggregate comes first, so a contig mostly explained by the
/// genome's own lineage stays clean even if a few hashes hit elsewhere.
/// Otherwise the single best reference decides, provided it is confidently
/// identified.
pub fn classify_contig(
    name: &str,
    length: u64,
    evidence: &ContigEvidence,
    genome_lineage: &Lineage,
    match_rank: Rank,
    config: &ClassifierConfig,
) -> ContigDecision {
    let mut decision = ContigDecision {
        name: name.to_string(),
        length,
        state: ContigState::NoHash,
        reason: DecisionReason::TooFewHashes,
        contig_lineage: None,
        total_hashes: evidence.total_hashes,
        identified_hashes: 0,
        matched_hashes: 0,
        foreign: Vec::new(),
    };

    if evidence.total_hashes < config.gather_min_matches {
        return decision;
    }

    let at_rank = aggregate_at_rank(&evidence.hits, match_rank);
    let good_count: u64 = at_rank
        .iter()
        .filter(|m| m.lineage.matches_at_rank(genome_lineage, match_rank))
        .map(|m| m.count)
        .sum();
    decision.identified_hashes = total_count(&evidence.hits);
    decision.matched_hashes = good_count;
    decision.contig_lineage = at_rank.first().map(|m| m.lineage.clone());

    if good_count >= config.gather_min_matches {
        decision.state = ContigState::Clean;
        decision.reason = DecisionReason::AggregateAgrees;
        return decision;
    }

    let best = match evidence.best_hit() {
        None => {
            decision.state = ContigState::NoIdent;
            decision.reason = DecisionReason::NoMatch;
            return decision;
        }
        Some(best) => best,
    };

    if best.count < config.min_ident_hashes {
        decision.state = ContigState::NoIdent;
        decision.reason = DecisionReason::BelowIdentityFloor;
        return decision;
    }

    let best_lineage = best.lineage.truncate(match_rank);
    decision.contig_lineage = Some(best_lineage.clone());

    if best_lineage.matches_at_rank(genome_lineage, match_rank) {
        decision.state = ContigState::Clean;
        decision.reason = DecisionReason::BestMatchAgrees;
        return decision;
    }

    match best_lineage.first_disagreement_rank(genome_lineage) {
        Some(rank) => {
            decision.state = ContigState::Dirty;
            decision.reason = DecisionReason::BestMatchDisagrees { rank };
            decision.foreign = at_rank
                .iter()
                .filter(|m| m.lineage.first_disagreement_rank(genome_lineage).is_some())
                .map(|m| (m.lineage.clone(), m.count * evidence.scale))
                .collect();
        }
        None => {
            // one lineage is a prefix of the other: nothing to disagree on
            decision.state = ContigState::NoIdent;
            decision.reason = DecisionReason::BestMatchUnresolved;
        }
    }
    decision
}
