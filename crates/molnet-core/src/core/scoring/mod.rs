//! Spectral similarity scoring.
//!
//! The clustering and network engines never score spectra themselves: they call an
//! injected [`SimilarityFunction`]. Anything that can expose a sorted peak list and a
//! precursor/parent mass through [`SpectrumView`] can be scored, which lets a
//! [`Cluster`] stand in for its prototype spectrum.
//!
//! Two reference implementations live in [`cosine`]. Closures with the matching
//! signature implement the trait as well, which is convenient for fixed score tables.

pub mod cosine;

use crate::core::models::cluster::Cluster;
use crate::core::models::spectrum::{Peak, Spectrum};

/// Read-only view of the parts of a spectrum used by similarity scoring.
pub trait SpectrumView {
    /// Raw peaks sorted by ascending mass-to-charge.
    fn peaks(&self) -> &[Peak];
    /// Square-root normalised peaks, aligned index-for-index with [`SpectrumView::peaks`].
    fn normalized_peaks(&self) -> &[Peak];
    fn precursor_mz(&self) -> f64;
    fn parent_mz(&self) -> f64;
}

impl SpectrumView for Spectrum {
    fn peaks(&self) -> &[Peak] {
        Spectrum::peaks(self)
    }
    fn normalized_peaks(&self) -> &[Peak] {
        Spectrum::normalized_peaks(self)
    }
    fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }
    fn parent_mz(&self) -> f64 {
        self.parent_mz
    }
}

impl SpectrumView for Cluster {
    fn peaks(&self) -> &[Peak] {
        Cluster::peaks(self)
    }
    fn normalized_peaks(&self) -> &[Peak] {
        Cluster::normalized_peaks(self)
    }
    fn precursor_mz(&self) -> f64 {
        Cluster::precursor_mz(self)
    }
    fn parent_mz(&self) -> f64 {
        Cluster::parent_mz(self)
    }
}

/// A matched peak pair: positions in the two peak lists and their mass difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakMatch {
    pub index_a: usize,
    pub index_b: usize,
    pub mass_shift: f64,
}

/// Result of comparing two spectra: a score in `[0, 1]` and the peak pairs behind it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Similarity {
    pub score: f64,
    pub matches: Vec<PeakMatch>,
}

impl Similarity {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Scores two peak lists.
///
/// Implementations must be pure: the engine may call them concurrently from several
/// threads and in any order. `min_match` is the minimum number of matched peak pairs
/// required for a non-zero score.
pub trait SimilarityFunction: Send + Sync {
    fn score(
        &self,
        a: &dyn SpectrumView,
        b: &dyn SpectrumView,
        tolerance: f64,
        min_match: usize,
    ) -> Similarity;
}

impl<F> SimilarityFunction for F
where
    F: Fn(&dyn SpectrumView, &dyn SpectrumView, f64, usize) -> Similarity + Send + Sync,
{
    fn score(
        &self,
        a: &dyn SpectrumView,
        b: &dyn SpectrumView,
        tolerance: f64,
        min_match: usize,
    ) -> Similarity {
        self(a, b, tolerance, min_match)
    }
}
