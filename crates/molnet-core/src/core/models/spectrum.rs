use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A single (mass-to-charge, intensity) pair of an MS2 peak list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

impl Peak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }

    /// A measured peak needs a finite position and a finite, non-negative intensity.
    pub fn validate(&self) -> Result<(), SpectrumError> {
        if !self.mz.is_finite() || !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(SpectrumError::InvalidPeak {
                mz: self.mz,
                intensity: self.intensity,
            });
        }
        Ok(())
    }
}

impl From<(f64, f64)> for Peak {
    fn from((mz, intensity): (f64, f64)) -> Self {
        Self { mz, intensity }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpectrumError {
    #[error("Invalid value for '{name}': {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("Invalid peak (m/z {mz}, intensity {intensity}): intensities must be finite and non-negative")]
    InvalidPeak { mz: f64, intensity: f64 },
}

/// A putative identification attached to a spectrum, typically from a library match.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Annotation {
    pub compound_name: Option<String>,
    pub spectrum_id: Option<String>,
    pub score: Option<f64>,
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.compound_name.as_deref().unwrap_or("-"),
            self.spectrum_id.as_deref().unwrap_or("-")
        )
    }
}

/// A measured MS2 peak list together with its acquisition metadata.
///
/// Peaks are always kept sorted by mass-to-charge. The square-root normalised peak list
/// and the intensity statistics are derived from the raw peaks and recomputed after
/// every mutating operation. A filtering step may remove every peak; the spectrum is
/// then left in a well-defined empty state (no peaks, zeroed statistics) and callers
/// should check [`Spectrum::is_empty`] before scoring it. A peak list that carries no
/// intensity at all is put in the same empty state.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    peaks: Vec<Peak>,
    normalized_peaks: Vec<Peak>,
    max_intensity: f64,
    total_intensity: f64,
    /// Name of the file (or analysis) the spectrum was acquired in.
    pub source: String,
    pub scan_number: usize,
    pub precursor_mz: f64,
    pub parent_mz: f64,
    /// Retention time in seconds, when known.
    pub retention_time: Option<f64>,
    pub precursor_intensity: Option<f64>,
    pub charge: Option<i32>,
    pub annotations: Vec<Annotation>,
}

impl Spectrum {
    /// Creates a spectrum from an arbitrary (possibly unsorted or empty) peak list.
    ///
    /// Fails with [`SpectrumError::InvalidPeak`] on the first peak with a negative or
    /// non-finite value.
    pub fn new(
        peaks: Vec<Peak>,
        source: impl Into<String>,
        scan_number: usize,
        precursor_mz: f64,
        parent_mz: f64,
    ) -> Result<Self, SpectrumError> {
        peaks.iter().try_for_each(Peak::validate)?;
        let mut spectrum = Self {
            peaks: Vec::new(),
            normalized_peaks: Vec::new(),
            max_intensity: 0.0,
            total_intensity: 0.0,
            source: source.into(),
            scan_number,
            precursor_mz,
            parent_mz,
            retention_time: None,
            precursor_intensity: None,
            charge: None,
            annotations: Vec::new(),
        };
        spectrum.set_peaks(peaks);
        Ok(spectrum)
    }

    pub fn with_retention_time(mut self, retention_time: f64) -> Self {
        self.retention_time = Some(retention_time);
        self
    }

    pub fn with_precursor_intensity(mut self, intensity: f64) -> Self {
        self.precursor_intensity = Some(intensity);
        self
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = Some(charge);
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Peaks with intensities replaced by `sqrt(intensity) / sqrt(total_intensity)`.
    pub fn normalized_peaks(&self) -> &[Peak] {
        &self.normalized_peaks
    }

    pub fn n_peaks(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn max_intensity(&self) -> f64 {
        self.max_intensity
    }

    pub fn total_intensity(&self) -> f64 {
        self.total_intensity
    }

    /// Returns the annotation with the highest score, if any annotation is attached.
    ///
    /// Annotations without a score rank below every scored one.
    pub fn best_annotation(&self) -> Option<&Annotation> {
        self.annotations.iter().max_by(|a, b| {
            match (a.score, b.score) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            }
        })
    }

    /// Strict total order by parent mass, broken by source and scan number.
    pub fn mass_order(&self, other: &Self) -> Ordering {
        self.parent_mz
            .total_cmp(&other.parent_mz)
            .then_with(|| self.source.cmp(&other.source))
            .then_with(|| self.scan_number.cmp(&other.scan_number))
    }

    /// Rescales every intensity so that the most intense peak equals `max_intensity`.
    pub fn normalize_max(&mut self, max_intensity: f64) -> Result<(), SpectrumError> {
        check_positive("max_intensity", max_intensity)?;
        if self.max_intensity <= 0.0 {
            return Ok(());
        }
        let current_max = self.max_intensity;
        let rescaled = self
            .peaks
            .iter()
            .map(|p| Peak::new(p.mz, max_intensity * (p.intensity / current_max)))
            .collect();
        self.replace_peaks(rescaled, "normalize_max");
        Ok(())
    }

    /// Drops every peak whose intensity is below `min_intensity`.
    pub fn remove_small_peaks(&mut self, min_intensity: f64) -> Result<(), SpectrumError> {
        check_non_negative("min_intensity", min_intensity)?;
        let kept = self
            .peaks
            .iter()
            .filter(|p| p.intensity >= min_intensity)
            .copied()
            .collect();
        self.replace_peaks(kept, "remove_small_peaks");
        Ok(())
    }

    /// Drops every peak within `tolerance` mass units of the precursor mass.
    pub fn remove_precursor_peak(&mut self, tolerance: f64) -> Result<(), SpectrumError> {
        check_non_negative("tolerance", tolerance)?;
        let precursor_mz = self.precursor_mz;
        let kept = self
            .peaks
            .iter()
            .filter(|p| (p.mz - precursor_mz).abs() > tolerance)
            .copied()
            .collect();
        self.replace_peaks(kept, "remove_precursor_peak");
        Ok(())
    }

    /// Removes the most intense peaks that together carry `fraction` of the total intensity.
    ///
    /// Peaks are accumulated from the least intense upwards; as soon as the running sum
    /// exceeds `(1 - fraction) * total`, that peak and every more intense one are dropped.
    /// The total is summed over the same ordering, so `fraction == 0` keeps every peak.
    pub fn remove_top_fraction(&mut self, fraction: f64) -> Result<(), SpectrumError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(SpectrumError::InvalidParameter {
                name: "fraction",
                value: fraction,
                reason: "must lie within [0, 1]",
            });
        }
        if fraction == 0.0 {
            return Ok(());
        }
        let mut by_intensity = self.peaks.clone();
        by_intensity.sort_by(|a, b| a.intensity.total_cmp(&b.intensity));
        let total: f64 = by_intensity.iter().map(|p| p.intensity).sum();
        let limit = (1.0 - fraction) * total;

        let mut cumulative = 0.0;
        let mut kept = Vec::with_capacity(by_intensity.len());
        for peak in by_intensity {
            cumulative += peak.intensity;
            if cumulative > limit {
                break;
            }
            kept.push(peak);
        }
        self.replace_peaks(kept, "remove_top_fraction");
        Ok(())
    }

    /// Keeps a peak only if fewer than `k` peaks within `± window` are strictly more intense.
    ///
    /// Uses a sliding lower bound over the mass-sorted peaks, so the cost is linear in the
    /// number of peaks times the typical window population.
    pub fn keep_local_maxima(&mut self, k: usize, window: f64) -> Result<(), SpectrumError> {
        if k == 0 {
            return Err(SpectrumError::InvalidParameter {
                name: "k",
                value: 0.0,
                reason: "must be at least 1",
            });
        }
        check_non_negative("window", window)?;

        let mut start = 0;
        let mut kept = Vec::with_capacity(self.peaks.len());
        for peak in &self.peaks {
            while self.peaks[start].mz < peak.mz - window {
                start += 1;
            }
            let n_bigger = self.peaks[start..]
                .iter()
                .take_while(|other| other.mz <= peak.mz + window)
                .filter(|other| other.intensity > peak.intensity)
                .count();
            if n_bigger < k {
                kept.push(*peak);
            }
        }
        self.replace_peaks(kept, "keep_local_maxima");
        Ok(())
    }

    /// Sets every intensity to the current maximum, leaving only peak positions informative.
    pub fn flatten_intensities(&mut self) {
        let max_intensity = self.max_intensity;
        let flattened = self
            .peaks
            .iter()
            .map(|p| Peak::new(p.mz, max_intensity))
            .collect();
        self.replace_peaks(flattened, "flatten_intensities");
    }

    /// Randomly permutes intensities across the existing peak positions.
    pub fn randomise_intensities<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut intensities: Vec<f64> = self.peaks.iter().map(|p| p.intensity).collect();
        intensities.shuffle(rng);
        let permuted = self
            .peaks
            .iter()
            .zip(intensities)
            .map(|(p, intensity)| Peak::new(p.mz, intensity))
            .collect();
        self.replace_peaks(permuted, "randomise_intensities");
    }

    fn replace_peaks(&mut self, peaks: Vec<Peak>, operation: &'static str) {
        let had_peaks = !self.peaks.is_empty();
        self.set_peaks(peaks);
        if had_peaks && self.peaks.is_empty() {
            debug!(
                source = %self.source,
                scan = self.scan_number,
                operation,
                "Spectrum has no peaks left."
            );
        }
    }

    fn set_peaks(&mut self, mut peaks: Vec<Peak>) {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        if peaks.iter().all(|p| p.intensity <= 0.0) {
            peaks.clear();
        }
        self.peaks = peaks;
        if self.peaks.is_empty() {
            self.normalized_peaks.clear();
            self.max_intensity = 0.0;
            self.total_intensity = 0.0;
            return;
        }
        self.normalized_peaks = sqrt_normalize(&self.peaks);
        self.max_intensity = self
            .peaks
            .iter()
            .map(|p| p.intensity)
            .fold(f64::NEG_INFINITY, f64::max);
        self.total_intensity = self.peaks.iter().map(|p| p.intensity).sum();
    }
}

/// Square-root normalisation: `sqrt(intensity_i) / sqrt(sum_j intensity_j)`.
///
/// For a peak list with positive total intensity the squared normalised intensities sum
/// to one. A zero total yields all-zero intensities; [`Spectrum`] never holds such a list.
pub fn sqrt_normalize(peaks: &[Peak]) -> Vec<Peak> {
    let total: f64 = peaks.iter().map(|p| p.intensity).sum();
    let norm = total.sqrt();
    peaks
        .iter()
        .map(|p| {
            let intensity = if norm > 0.0 {
                p.intensity.sqrt() / norm
            } else {
                0.0
            };
            Peak::new(p.mz, intensity)
        })
        .collect()
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), SpectrumError> {
    if value.is_nan() || value < 0.0 {
        return Err(SpectrumError::InvalidParameter {
            name,
            value,
            reason: "must be a non-negative number",
        });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f64) -> Result<(), SpectrumError> {
    if value.is_nan() || value <= 0.0 {
        return Err(SpectrumError::InvalidParameter {
            name,
            value,
            reason: "must be a positive number",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn peaks(raw: &[(f64, f64)]) -> Vec<Peak> {
        raw.iter().copied().map(Peak::from).collect()
    }

    fn spectrum(raw: &[(f64, f64)]) -> Spectrum {
        Spectrum::new(peaks(raw), "run1.mzML", 7, 300.0, 300.0).unwrap()
    }

    fn sum_of_squares(spectrum: &Spectrum) -> f64 {
        spectrum
            .normalized_peaks()
            .iter()
            .map(|p| p.intensity * p.intensity)
            .sum()
    }

    #[test]
    fn construction_sorts_peaks_and_derives_statistics() {
        let s = spectrum(&[(200.0, 10.0), (100.0, 30.0), (150.0, 60.0)]);

        let mzs: Vec<f64> = s.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![100.0, 150.0, 200.0]);
        assert_eq!(s.n_peaks(), 3);
        assert_eq!(s.max_intensity(), 60.0);
        assert_eq!(s.total_intensity(), 100.0);
        assert!((s.normalized_peaks()[1].intensity - 60.0_f64.sqrt() / 10.0).abs() < 1e-12);
    }

    #[test]
    fn normalized_intensities_have_unit_norm() {
        let s = spectrum(&[(101.1, 3.0), (120.5, 1e6), (180.0, 0.25), (250.2, 42.0)]);
        assert!((sum_of_squares(&s) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn negative_or_non_finite_intensities_are_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let result = Spectrum::new(
                peaks(&[(100.0, bad), (200.0, 4.0), (300.0, 9.0)]),
                "run1.mzML",
                7,
                300.0,
                300.0,
            );
            assert!(matches!(
                result,
                Err(SpectrumError::InvalidPeak { mz, .. }) if mz == 100.0
            ));
        }
        let bad_mz = Spectrum::new(peaks(&[(f64::NAN, 1.0)]), "run1.mzML", 7, 300.0, 300.0);
        assert!(matches!(bad_mz, Err(SpectrumError::InvalidPeak { .. })));
    }

    #[test]
    fn zero_intensity_peaks_keep_unit_norm() {
        let s = spectrum(&[(100.0, 0.0), (200.0, 4.0), (300.0, 0.0)]);
        assert_eq!(s.n_peaks(), 3);
        assert_eq!(s.normalized_peaks()[0].intensity, 0.0);
        assert!((sum_of_squares(&s) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn all_zero_intensities_give_an_empty_spectrum() {
        let s = spectrum(&[(100.0, 0.0), (200.0, 0.0)]);
        assert!(s.is_empty());
        assert_eq!(s.total_intensity(), 0.0);
        assert!(s.normalized_peaks().is_empty());

        let mut only_zero_left = spectrum(&[(100.0, 0.0), (300.0, 5.0)]);
        only_zero_left.remove_precursor_peak(0.5).unwrap();
        assert!(only_zero_left.is_empty());
    }

    #[test]
    fn empty_spectrum_has_zeroed_statistics() {
        let s = spectrum(&[]);
        assert!(s.is_empty());
        assert_eq!(s.max_intensity(), 0.0);
        assert_eq!(s.total_intensity(), 0.0);
        assert!(s.normalized_peaks().is_empty());
    }

    #[test]
    fn normalize_max_rescales_to_target() {
        let mut s = spectrum(&[(100.0, 5.0), (200.0, 20.0)]);
        s.normalize_max(1000.0).unwrap();

        assert_eq!(s.max_intensity(), 1000.0);
        assert_eq!(s.peaks()[0].intensity, 250.0);
        assert!((sum_of_squares(&s) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_max_rejects_non_positive_target() {
        let mut s = spectrum(&[(100.0, 5.0)]);
        assert!(matches!(
            s.normalize_max(0.0),
            Err(SpectrumError::InvalidParameter { name: "max_intensity", .. })
        ));
    }

    #[test]
    fn remove_small_peaks_keeps_threshold_inclusive() {
        let mut s = spectrum(&[(100.0, 5.0), (200.0, 10.0), (300.0, 15.0)]);
        s.remove_small_peaks(10.0).unwrap();

        assert_eq!(s.n_peaks(), 2);
        assert_eq!(s.total_intensity(), 25.0);
        assert_eq!(s.max_intensity(), 15.0);
    }

    #[test]
    fn removing_every_peak_leaves_empty_state() {
        let mut s = spectrum(&[(100.0, 5.0), (200.0, 10.0)]);
        s.remove_small_peaks(1000.0).unwrap();

        assert!(s.is_empty());
        assert_eq!(s.max_intensity(), 0.0);
        assert_eq!(s.total_intensity(), 0.0);
        assert!(s.normalized_peaks().is_empty());
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let mut s = spectrum(&[(100.0, 5.0)]);
        assert!(s.remove_small_peaks(-1.0).is_err());
        assert!(s.remove_precursor_peak(f64::NAN).is_err());
        assert_eq!(s.n_peaks(), 1);
    }

    #[test]
    fn remove_precursor_peak_drops_peaks_near_precursor() {
        let mut s = spectrum(&[(150.0, 1.0), (290.0, 1.0), (299.0, 1.0), (311.0, 1.0)]);
        s.remove_precursor_peak(10.0).unwrap();

        let mzs: Vec<f64> = s.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![150.0, 311.0]);
    }

    #[test]
    fn remove_top_fraction_drops_most_intense_peaks() {
        let mut s = spectrum(&[(100.0, 10.0), (200.0, 20.0), (300.0, 30.0), (400.0, 40.0)]);
        s.remove_top_fraction(0.5).unwrap();

        let mzs: Vec<f64> = s.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![100.0, 200.0]);
    }

    #[test]
    fn remove_top_fraction_zero_keeps_every_peak() {
        let mut s = spectrum(&[(100.0, 0.3), (200.0, 0.2), (300.0, 0.1)]);
        s.remove_top_fraction(0.0).unwrap();
        assert_eq!(s.n_peaks(), 3);

        let mut t = spectrum(&[(100.0, 0.1), (200.0, 0.7), (300.0, 0.2)]);
        t.remove_top_fraction(1e-12).unwrap();
        let mzs: Vec<f64> = t.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![100.0, 300.0]);
    }

    #[test]
    fn remove_top_fraction_rejects_out_of_range_fraction() {
        let mut s = spectrum(&[(100.0, 10.0)]);
        assert!(s.remove_top_fraction(1.5).is_err());
    }

    #[test]
    fn keep_local_maxima_keeps_top_k_per_window() {
        let mut s = spectrum(&[
            (100.0, 10.0),
            (101.0, 50.0),
            (102.0, 30.0),
            (103.0, 20.0),
            (500.0, 1.0),
        ]);
        s.keep_local_maxima(2, 5.0).unwrap();

        let mzs: Vec<f64> = s.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![101.0, 102.0, 500.0]);
    }

    #[test]
    fn keep_local_maxima_is_idempotent() {
        let raw: Vec<(f64, f64)> = (0..60)
            .map(|i| (100.0 + i as f64 * 3.7, ((i * 37) % 23) as f64 + 1.0))
            .collect();
        let mut once = spectrum(&raw);
        once.keep_local_maxima(3, 20.0).unwrap();
        let mut twice = once.clone();
        twice.keep_local_maxima(3, 20.0).unwrap();

        assert_eq!(once.peaks(), twice.peaks());
    }

    #[test]
    fn keep_local_maxima_rejects_zero_k() {
        let mut s = spectrum(&[(100.0, 10.0)]);
        assert!(matches!(
            s.keep_local_maxima(0, 50.0),
            Err(SpectrumError::InvalidParameter { name: "k", .. })
        ));
    }

    #[test]
    fn flatten_sets_all_intensities_to_maximum() {
        let mut s = spectrum(&[(100.0, 10.0), (200.0, 40.0)]);
        s.flatten_intensities();

        assert!(s.peaks().iter().all(|p| p.intensity == 40.0));
        assert_eq!(s.total_intensity(), 80.0);
    }

    #[test]
    fn randomise_intensities_permutes_without_moving_peaks() {
        let mut s = spectrum(&[(100.0, 1.0), (200.0, 2.0), (300.0, 3.0), (400.0, 4.0)]);
        let mut rng = StdRng::seed_from_u64(17);
        s.randomise_intensities(&mut rng);

        let mzs: Vec<f64> = s.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![100.0, 200.0, 300.0, 400.0]);
        let mut intensities: Vec<f64> = s.peaks().iter().map(|p| p.intensity).collect();
        intensities.sort_by(f64::total_cmp);
        assert_eq!(intensities, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.total_intensity(), 10.0);
    }

    #[test]
    fn best_annotation_prefers_highest_score() {
        let s = spectrum(&[(100.0, 1.0)])
            .with_annotation(Annotation {
                compound_name: Some("low".into()),
                spectrum_id: None,
                score: Some(0.4),
            })
            .with_annotation(Annotation {
                compound_name: Some("unscored".into()),
                spectrum_id: None,
                score: None,
            })
            .with_annotation(Annotation {
                compound_name: Some("high".into()),
                spectrum_id: Some("CCMSLIB1".into()),
                score: Some(0.9),
            });

        let best = s.best_annotation().unwrap();
        assert_eq!(best.compound_name.as_deref(), Some("high"));
        assert_eq!(best.to_string(), "high CCMSLIB1");
    }

    #[test]
    fn mass_order_is_total_with_identity_tie_break() {
        let a = Spectrum::new(vec![], "a", 1, 300.0, 300.0).unwrap();
        let b = Spectrum::new(vec![], "a", 2, 300.0, 300.0).unwrap();
        let c = Spectrum::new(vec![], "a", 1, 250.0, 250.0).unwrap();

        assert_eq!(a.mass_order(&b), Ordering::Less);
        assert_eq!(b.mass_order(&a), Ordering::Greater);
        assert_eq!(c.mass_order(&a), Ordering::Less);
        assert_eq!(a.mass_order(&a), Ordering::Equal);
    }
}
