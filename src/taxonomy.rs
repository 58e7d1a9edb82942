//src/taxonomy.rs

//! Ordered-rank lineages and the comparisons used to decide whether two
//! taxonomic assignments agree.
//!
//! A [`Lineage`] is always contiguous from superkingdom downward: the entry at
//! position `i` carries rank `Rank::ALL[i]`. The constructors enforce this, so
//! positional comparisons never see two different rank labels side by side.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Taxonomic rank, ordered shallowest to deepest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Superkingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Strain,
}

impl Rank {
    /// The full rank vocabulary in order.
    pub const ALL: [Rank; 8] = [
        Rank::Superkingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
        Rank::Strain,
    ];

    /// Position of this rank in [`Rank::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Superkingdom => "superkingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
            Rank::Strain => "strain",
        }
    }

    /// Ranks from superkingdom down to and including `self`.
    pub fn up_to(self) -> impl Iterator<Item = Rank> {
        Rank::ALL.into_iter().take(self.index() + 1)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Rank::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| Error::UnknownRank(s.to_string()))
    }
}

/// One `(rank, name)` entry of a lineage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineagePair {
    pub rank: Rank,
    pub name: String,
}

impl LineagePair {
    pub fn new(rank: Rank, name: impl Into<String>) -> Self {
        Self {
            rank,
            name: name.into(),
        }
    }
}

/// An immutable, cheaply clonable lineage usable as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lineage {
    pairs: Arc<[LineagePair]>,
}

impl Default for Lineage {
    fn default() -> Self {
        Self {
            pairs: Vec::new().into(),
        }
    }
}

impl Lineage {
    /// The empty lineage ("no assignment").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a lineage from explicit pairs, rejecting gaps and out-of-order ranks.
    pub fn new(pairs: Vec<LineagePair>) -> Result<Self> {
        if pairs.len() > Rank::ALL.len() {
            return Err(Error::TooManyNames(pairs.len()));
        }
        for (position, (pair, expected)) in pairs.iter().zip(Rank::ALL).enumerate() {
            if pair.rank != expected {
                return Err(Error::MalformedLineage {
                    position,
                    expected,
                    found: pair.rank,
                });
            }
            if pair.name.trim().is_empty() {
                return Err(Error::EmptyLineageName(pair.rank));
            }
        }
        Ok(Self {
            pairs: pairs.into(),
        })
    }

    /// Assign names to ranks positionally from superkingdom. The lineage ends
    /// at the first empty name, so trailing blank fields are allowed.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pairs = Vec::with_capacity(Rank::ALL.len());
        for (i, name) in names.into_iter().enumerate() {
            let name = name.as_ref().trim();
            if name.is_empty() {
                break;
            }
            let rank = *Rank::ALL.get(i).ok_or(Error::TooManyNames(i + 1))?;
            pairs.push(LineagePair::new(rank, name));
        }
        Ok(Self {
            pairs: pairs.into(),
        })
    }

    /// Parse a `;`-separated lineage, falling back to `,` when there is no `;`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.contains(';') {
            Self::from_names(text.split(';'))
        } else {
            Self::from_names(text.split(','))
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[LineagePair] {
        &self.pairs
    }

    /// Deepest rank this lineage is known to, or `None` when empty.
    pub fn deepest_rank(&self) -> Option<Rank> {
        self.pairs.last().map(|p| p.rank)
    }

    pub fn name_at(&self, rank: Rank) -> Option<&str> {
        self.pairs.get(rank.index()).map(|p| p.name.as_str())
    }

    /// Drop every entry deeper than `rank`. A lineage that is already
    /// shallower than `rank` is returned unchanged.
    pub fn truncate(&self, rank: Rank) -> Lineage {
        let keep = rank.index() + 1;
        if self.pairs.len() <= keep {
            return self.clone();
        }
        Lineage {
            pairs: self.pairs[..keep].into(),
        }
    }

    /// True iff both lineages reach `rank` and agree at every position up to
    /// and including it. A disagreement at any shallower rank is a mismatch.
    pub fn matches_at_rank(&self, other: &Lineage, rank: Rank) -> bool {
        for (a, b) in self.pairs.iter().zip(other.pairs.iter()) {
            debug_assert_eq!(a.rank, b.rank, "rank vocabularies differ between lineages");
            if a.name != b.name {
                return false;
            }
            if a.rank == rank {
                return true;
            }
        }
        false
    }

    /// First rank, scanning from superkingdom, at which the names differ.
    /// `None` when one lineage is a prefix of the other.
    pub fn first_disagreement_rank(&self, other: &Lineage) -> Option<Rank> {
        self.pairs
            .iter()
            .zip(other.pairs.iter())
            .find(|(a, b)| a.name != b.name)
            .map(|(a, _)| a.rank)
    }

    /// All names joined by `;`.
    pub fn display(&self) -> String {
        self.pairs
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Short label: the species/strain name alone, `"<rank> <name>"` for
    /// shallower lineages.
    pub fn display_short(&self) -> String {
        match self.pairs.last() {
            None => "** no assignment **".to_string(),
            Some(last) if matches!(last.rank, Rank::Species | Rank::Strain) => last.name.clone(),
            Some(last) => format!("{} {}", last.rank, last.name),
        }
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl FromStr for Lineage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Lineage::parse(s)
    }
}

impl Serialize for Lineage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display())
    }
}

impl<'de> Deserialize<'de> for Lineage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Lineage::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lin(s: &str) -> Lineage {
        Lineage::parse(s).unwrap()
    }

    const SHEWANELLA: &str = "Bacteria;Proteobacteria;Gammaproteobacteria;Alteromonadales;Shewanellaceae;Shewanella;Shewanella baltica;Shewanella baltica OS185";
    const AKKERMANSIA: &str = "Bacteria;Verrucomicrobia;Verrucomicrobiae;Verrucomicrobiales;Akkermansiaceae;Akkermansia;Akkermansia muciniphila";

    #[test]
    fn test_rank_parse_and_order() {
        assert_eq!("Genus".parse::<Rank>().unwrap(), Rank::Genus);
        assert!(Rank::Phylum < Rank::Genus);
        assert!(matches!("domain".parse::<Rank>(), Err(Error::UnknownRank(_))));
        let ranks: Vec<_> = Rank::Family.up_to().collect();
        assert_eq!(ranks.len(), 5);
        assert_eq!(ranks.last(), Some(&Rank::Family));
    }

    #[test]
    fn test_parse_stops_at_empty_name() {
        let l = lin("Bacteria,Firmicutes,Bacilli,,,");
        assert_eq!(l.len(), 3);
        assert_eq!(l.deepest_rank(), Some(Rank::Class));
        assert_eq!(l.name_at(Rank::Phylum), Some("Firmicutes"));
    }

    #[test]
    fn test_new_rejects_gap() {
        let pairs = vec![
            LineagePair::new(Rank::Superkingdom, "Bacteria"),
            LineagePair::new(Rank::Class, "Bacilli"),
        ];
        assert!(matches!(
            Lineage::new(pairs),
            Err(Error::MalformedLineage { position: 1, expected: Rank::Phylum, found: Rank::Class })
        ));
    }

    #[test]
    fn test_too_many_names() {
        let res = Lineage::parse("a;b;c;d;e;f;g;h;i");
        assert!(matches!(res, Err(Error::TooManyNames(9))));
    }

    #[test]
    fn test_truncate() {
        let l = lin(SHEWANELLA);
        let g = l.truncate(Rank::Genus);
        assert_eq!(g.deepest_rank(), Some(Rank::Genus));
        assert_eq!(g.display_short(), "genus Shewanella");

        // already shallower: unchanged
        let fam = l.truncate(Rank::Family);
        assert_eq!(fam.truncate(Rank::Genus), fam);
    }

    #[test]
    fn test_matches_at_rank() {
        let a = lin(SHEWANELLA);
        let b = lin(AKKERMANSIA);
        assert!(a.matches_at_rank(&b, Rank::Superkingdom));
        assert!(!a.matches_at_rank(&b, Rank::Phylum));
        assert!(!a.matches_at_rank(&b, Rank::Genus));

        // a lineage that does not reach the rank never matches at it
        let fam = a.truncate(Rank::Family);
        assert!(!fam.matches_at_rank(&a, Rank::Genus));
        assert!(fam.matches_at_rank(&a, Rank::Family));
    }

    #[test]
    fn test_first_disagreement_rank() {
        let a = lin(SHEWANELLA);
        let b = lin(AKKERMANSIA);
        assert_eq!(a.first_disagreement_rank(&b), Some(Rank::Phylum));
        assert_eq!(a.first_disagreement_rank(&a.truncate(Rank::Order)), None);
    }

    #[test]
    fn test_display() {
        let a = lin(SHEWANELLA);
        assert_eq!(a.display_short(), "Shewanella baltica OS185");
        assert_eq!(Lineage::empty().display_short(), "** no assignment **");
        assert_eq!(lin(&a.display()), a);
    }

    #[test]
    fn test_serde_as_string() {
        let a = lin("Bacteria;Firmicutes");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"Bacteria;Firmicutes\"");
        let back: Lineage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    fn arb_lineage() -> impl Strategy<Value = Lineage> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..=8)
            .prop_map(|names| Lineage::from_names(names).unwrap())
    }

    fn arb_rank() -> impl Strategy<Value = Rank> {
        prop::sample::select(Rank::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_truncate_idempotent(l in arb_lineage(), r in arb_rank()) {
            let once = l.truncate(r);
            prop_assert_eq!(once.truncate(r), once.clone());
            prop_assert!(once.len() <= r.index() + 1);
            if l.len() <= r.index() + 1 {
                prop_assert_eq!(once, l);
            }
        }

        #[test]
        fn prop_matches_at_rank_symmetric(a in arb_lineage(), b in arb_lineage(), r in arb_rank()) {
            prop_assert_eq!(a.matches_at_rank(&b, r), b.matches_at_rank(&a, r));
        }
    }
}
