use super::{PeakMatch, Similarity, SimilarityFunction, SpectrumView};
use crate::core::models::spectrum::Peak;
use itertools::Itertools;

/// Cosine similarity over square-root normalised peaks with greedy peak assignment.
///
/// Two peaks match when their mass-to-charge values differ by at most `tolerance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cosine;

/// Cosine similarity that also matches peaks displaced by the parent-mass difference.
///
/// Useful for relating analogues that differ by a modification: a fragment that carries
/// the modification in one spectrum is matched against its shifted partner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftedCosine;

impl SimilarityFunction for Cosine {
    fn score(
        &self,
        a: &dyn SpectrumView,
        b: &dyn SpectrumView,
        tolerance: f64,
        min_match: usize,
    ) -> Similarity {
        greedy_cosine(a, b, tolerance, min_match, &[0.0])
    }
}

impl SimilarityFunction for ShiftedCosine {
    fn score(
        &self,
        a: &dyn SpectrumView,
        b: &dyn SpectrumView,
        tolerance: f64,
        min_match: usize,
    ) -> Similarity {
        let shift = a.parent_mz() - b.parent_mz();
        if shift.abs() <= tolerance {
            greedy_cosine(a, b, tolerance, min_match, &[0.0])
        } else {
            greedy_cosine(a, b, tolerance, min_match, &[0.0, shift])
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    product: f64,
    index_a: usize,
    index_b: usize,
}

fn greedy_cosine(
    a: &dyn SpectrumView,
    b: &dyn SpectrumView,
    tolerance: f64,
    min_match: usize,
    shifts: &[f64],
) -> Similarity {
    let peaks_a = a.normalized_peaks();
    let peaks_b = b.normalized_peaks();
    if peaks_a.is_empty() || peaks_b.is_empty() {
        return Similarity::zero();
    }

    let candidates: Vec<Candidate> = shifts
        .iter()
        .flat_map(|&shift| candidate_pairs(peaks_a, peaks_b, tolerance, shift))
        .sorted_by(|x, y| {
            (x.index_a, x.index_b)
                .cmp(&(y.index_a, y.index_b))
                .then(y.product.total_cmp(&x.product))
        })
        .dedup_by(|x, y| x.index_a == y.index_a && x.index_b == y.index_b)
        .sorted_by(|x, y| {
            y.product
                .total_cmp(&x.product)
                .then((x.index_a, x.index_b).cmp(&(y.index_a, y.index_b)))
        })
        .collect();

    let mut used_a = vec![false; peaks_a.len()];
    let mut used_b = vec![false; peaks_b.len()];
    let mut score = 0.0;
    let mut matches = Vec::new();
    for candidate in candidates {
        if used_a[candidate.index_a] || used_b[candidate.index_b] {
            continue;
        }
        used_a[candidate.index_a] = true;
        used_b[candidate.index_b] = true;
        score += candidate.product;
        matches.push(PeakMatch {
            index_a: candidate.index_a,
            index_b: candidate.index_b,
            mass_shift: peaks_a[candidate.index_a].mz - peaks_b[candidate.index_b].mz,
        });
    }

    if matches.len() < min_match {
        return Similarity::zero();
    }
    // Rounding can push a perfect match just above one. NaN must survive for the caller.
    Similarity {
        score: if score > 1.0 { 1.0 } else { score },
        matches,
    }
}

fn candidate_pairs(
    peaks_a: &[Peak],
    peaks_b: &[Peak],
    tolerance: f64,
    shift: f64,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (index_a, peak_a) in peaks_a.iter().enumerate() {
        let target = peak_a.mz - shift;
        let start = peaks_b.partition_point(|p| p.mz < target - tolerance);
        for (offset, peak_b) in peaks_b[start..].iter().enumerate() {
            if peak_b.mz > target + tolerance {
                break;
            }
            candidates.push(Candidate {
                product: peak_a.intensity * peak_b.intensity,
                index_a,
                index_b: start + offset,
            });
        }
    }
    candidates
}
