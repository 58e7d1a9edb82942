//src/sketch.rs

use ahash::AHashSet;

use crate::error::{Error, Result};

/// A scaled set of k-mer hash values.
///
/// `scale` is the reciprocal sampling density: one retained hash stands for
/// roughly `scale` base pairs of sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSketch {
    hashes: AHashSet<u64>,
    scale: u64,
}

impl HashSketch {
    pub fn new(scale: u64) -> Self {
        Self {
            hashes: AHashSet::new(),
            scale,
        }
    }

    pub fn from_hashes<I: IntoIterator<Item = u64>>(scale: u64, hashes: I) -> Self {
        Self {
            hashes: hashes.into_iter().collect(),
            scale,
        }
    }

    #[inline]
    pub fn scale(&self) -> u64 {
        self.scale
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    #[inline]
    pub fn insert(&mut self, hash: u64) -> bool {
        self.hashes.insert(hash)
    }

    #[inline]
    pub fn contains(&self, hash: u64) -> bool {
        self.hashes.contains(&hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.hashes.iter().copied()
    }

    /// Number of hash values shared with `other`.
    pub fn count_common(&self, other: &HashSketch) -> usize {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.hashes.iter().filter(|h| large.hashes.contains(h)).count()
    }

    /// Remove every hash value present in `other`; returns how many were removed.
    pub fn remove_many(&mut self, other: &HashSketch) -> usize {
        let before = self.hashes.len();
        if other.len() < before {
            for h in other.hashes.iter() {
                self.hashes.remove(h);
            }
        } else {
            self.hashes.retain(|h| !other.hashes.contains(h));
        }
        before - self.hashes.len()
    }

    /// Add all of `other`'s hashes. Both sketches must share a scale.
    pub fn merge(&mut self, other: &HashSketch) -> Result<()> {
        if other.scale != self.scale {
            return Err(Error::ScaleMismatch {
                expected: self.scale,
                found: other.scale,
            });
        }
        self.hashes.extend(other.hashes.iter().copied());
        Ok(())
    }

    /// Jaccard similarity; two empty sketches are defined as dissimilar.
    pub fn similarity(&self, other: &HashSketch) -> f64 {
        let common = self.count_common(other);
        let union = self.len() + other.len() - common;
        if union == 0 {
            0.0
        } else {
            common as f64 / union as f64
        }
    }
}
