//src/contam_map.rs

//! Cross-genome contamination flows and the per-reference match listing.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::Serialize;

use crate::classify::classify_contig::{ContigDecision, ContigEvidence};
use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::taxonomy::{Lineage, Rank};

/// Approximate bp flowing from a source lineage into a target genome lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContamFlow {
    pub source: Lineage,
    pub target: Lineage,
    pub bp: u64,
}

/// `(source, target) -> bp`, summed over dirty contigs.
#[derive(Debug, Clone, Default)]
pub struct ContaminationMap {
    flows: AHashMap<(Lineage, Lineage), u64>,
}

fn by_bp_then_name(a: (&str, u64), b: (&str, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

impl ContaminationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: Lineage, target: Lineage, bp: u64) {
        *self.flows.entry((source, target)).or_insert(0) += bp;
    }

    /// Record every disagreeing lineage of every dirty contig against the
    /// genome lineage.
    pub fn add_decisions(&mut self, genome_lineage: &Lineage, decisions: &[ContigDecision]) {
        for decision in decisions.iter().filter(|d| d.state.is_dirty()) {
            for (source, bp) in &decision.foreign {
                self.add(source.clone(), genome_lineage.clone(), *bp);
            }
        }
    }

    pub fn merge(&mut self, other: ContaminationMap) {
        self.flows.reserve(other.flows.len());
        for (key, bp) in other.flows {
            *self.flows.entry(key).or_insert(0) += bp;
        }
    }

    pub fn get(&self, source: &Lineage, target: &Lineage) -> Option<u64> {
        self.flows.get(&(source.clone(), target.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Every `(source, target)` pair, most bp first; ties ordered by
    /// `"source -> target"` display text.
    pub fn ranked_flows(&self) -> Vec<ContamFlow> {
        let mut keyed: Vec<(String, ContamFlow)> = self
            .flows
            .iter()
            .map(|((source, target), &bp)| {
                (
                    format!("{} -> {}", source, target),
                    ContamFlow {
                        source: source.clone(),
                        target: target.clone(),
                        bp,
                    },
                )
            })
            .collect();
        keyed.sort_by(|a, b| by_bp_then_name((&a.0, a.1.bp), (&b.0, b.1.bp)));
        keyed.into_iter().map(|(_, flow)| flow).collect()
    }

    /// Total bp per source lineage across all targets, most bp first.
    pub fn ranked_sources(&self) -> Vec<(Lineage, u64)> {
        let mut totals: AHashMap<&Lineage, u64> = AHashMap::new();
        for ((source, _), &bp) in &self.flows {
            *totals.entry(source).or_insert(0) += bp;
        }
        let mut keyed: Vec<(String, Lineage, u64)> = totals
            .into_iter()
            .map(|(lineage, bp)| (lineage.display(), lineage.clone(), bp))
            .collect();
        keyed.sort_by(|a, b| by_bp_then_name((&a.0, a.2), (&b.0, b.2)));
        keyed.into_iter().map(|(_, lineage, bp)| (lineage, bp)).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.ranked_flows())?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Clean,
    Dirty,
}

/// One reference that explained part of some contig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchListing {
    pub lineage: Lineage,
    pub match_type: MatchType,
    /// Hashes explained, summed over contigs.
    pub counts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryInfo {
    pub genome: String,
    pub genome_lineage: Lineage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub query_info: QueryInfo,
    pub matches: BTreeMap<String, MatchListing>,
}

impl MatchReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// List every reference that explained at least `gather_min_matches` hashes
/// of some contig, marked clean or dirty against `genome_lineage` at
/// `match_rank`.
pub fn list_reference_matches(
    genome: &str,
    genome_lineage: &Lineage,
    evidence: &[ContigEvidence],
    match_rank: Rank,
    config: &ClassifierConfig,
) -> MatchReport {
    let mut matches: BTreeMap<String, MatchListing> = BTreeMap::new();
    let hits = evidence
        .iter()
        .flat_map(|ev| ev.hits.iter())
        .filter(|h| h.count >= config.gather_min_matches);

    for hit in hits {
        let match_type = if hit.lineage.matches_at_rank(genome_lineage, match_rank) {
            MatchType::Clean
        } else {
            MatchType::Dirty
        };
        matches
            .entry(hit.ident.clone())
            .and_modify(|m| m.counts += hit.count)
            .or_insert_with(|| MatchListing {
                lineage: hit.lineage.clone(),
                match_type,
                counts: hit.count,
            });
    }

    MatchReport {
        query_info: QueryInfo {
            genome: genome.to_string(),
            genome_lineage: genome_lineage.clone(),
        },
        matches,
    }
}
