use crate::core::models::spectrum::{Spectrum, SpectrumError};
use serde::Serialize;
use tracing::{info, warn};

/// Parameters for [`Spectrum::keep_local_maxima`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocalMaxima {
    pub k: usize,
    pub window: f64,
}

/// The preprocessing chain applied to every spectrum before it is clustered or scored.
///
/// Steps run in a fixed order and are skipped when their parameter is `None`:
/// max-normalisation, small-peak removal, precursor-peak removal, top-fraction
/// removal, local-maxima retention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterConfig {
    pub normalize_max: Option<f64>,
    pub min_intensity: Option<f64>,
    pub precursor_tolerance: Option<f64>,
    pub top_fraction: Option<f64>,
    pub local_maxima: Option<LocalMaxima>,
    /// Spectra with fewer peaks than this after filtering are discarded.
    pub min_peaks: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            normalize_max: None,
            min_intensity: None,
            precursor_tolerance: None,
            top_fraction: None,
            local_maxima: None,
            min_peaks: 1,
        }
    }
}

impl FilterConfig {
    /// Preprocessing used for reference library spectra.
    pub fn library() -> Self {
        Self {
            normalize_max: Some(1000.0),
            min_intensity: Some(0.0),
            precursor_tolerance: Some(17.0),
            top_fraction: None,
            local_maxima: Some(LocalMaxima { k: 6, window: 50.0 }),
            min_peaks: 1,
        }
    }

    /// Runs the chain on one spectrum and reports whether it still has enough peaks.
    pub fn apply(&self, spectrum: &mut Spectrum) -> Result<bool, SpectrumError> {
        if let Some(max_intensity) = self.normalize_max {
            spectrum.normalize_max(max_intensity)?;
        }
        if let Some(min_intensity) = self.min_intensity {
            spectrum.remove_small_peaks(min_intensity)?;
        }
        if let Some(tolerance) = self.precursor_tolerance {
            spectrum.remove_precursor_peak(tolerance)?;
        }
        if let Some(fraction) = self.top_fraction {
            spectrum.remove_top_fraction(fraction)?;
        }
        if let Some(LocalMaxima { k, window }) = self.local_maxima {
            spectrum.keep_local_maxima(k, window)?;
        }
        Ok(spectrum.n_peaks() >= self.min_peaks)
    }
}

/// Filters every spectrum and drops those left with fewer than `min_peaks` peaks.
pub fn filter_spectra(
    spectra: Vec<Spectrum>,
    config: &FilterConfig,
) -> Result<Vec<Spectrum>, SpectrumError> {
    let n_input = spectra.len();
    let mut kept = Vec::with_capacity(n_input);
    let mut n_emptied = 0;
    for mut spectrum in spectra {
        if config.apply(&mut spectrum)? {
            kept.push(spectrum);
        } else if spectrum.is_empty() {
            n_emptied += 1;
        }
    }
    if n_emptied > 0 {
        warn!(n_emptied, "Filtering removed every peak from some spectra.");
    }
    info!(
        n_input,
        n_kept = kept.len(),
        min_peaks = config.min_peaks,
        "Spectrum filtering complete."
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::spectrum::Peak;

    fn spectrum() -> Spectrum {
        Spectrum::new(
            vec![
                Peak::new(80.0, 2.0),
                Peak::new(120.0, 50.0),
                Peak::new(125.0, 20.0),
                Peak::new(299.5, 100.0),
            ],
            "run",
            1,
            300.0,
            300.0,
        )
        .unwrap()
    }

    #[test]
    fn default_config_leaves_peaks_untouched() {
        let mut s = spectrum();
        assert!(FilterConfig::default().apply(&mut s).unwrap());
        assert_eq!(s.n_peaks(), 4);
    }

    #[test]
    fn steps_run_in_order() {
        let config = FilterConfig {
            normalize_max: Some(1000.0),
            min_intensity: Some(50.0),
            precursor_tolerance: Some(1.0),
            ..Default::default()
        };
        let mut s = spectrum();
        assert!(config.apply(&mut s).unwrap());

        let mzs: Vec<f64> = s.peaks().iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![120.0, 125.0]);
        assert_eq!(s.max_intensity(), 500.0);
    }

    #[test]
    fn min_peaks_rejects_sparse_spectra() {
        let config = FilterConfig {
            min_intensity: Some(60.0),
            min_peaks: 2,
            ..Default::default()
        };
        let mut s = spectrum();
        assert!(!config.apply(&mut s).unwrap());
        assert_eq!(s.n_peaks(), 1);
    }

    #[test]
    fn invalid_parameters_are_reported() {
        let config = FilterConfig {
            top_fraction: Some(1.5),
            ..Default::default()
        };
        let result = config.apply(&mut spectrum());
        assert!(matches!(
            result,
            Err(SpectrumError::InvalidParameter { name: "fraction", .. })
        ));
    }

    #[test]
    fn filter_spectra_drops_emptied_spectra() {
        let config = FilterConfig {
            min_intensity: Some(1000.0),
            ..Default::default()
        };
        let mut sparse = spectrum();
        sparse.scan_number = 2;
        let dense = Spectrum::new(vec![Peak::new(90.0, 5000.0)], "run", 3, 200.0, 200.0).unwrap();

        let kept = filter_spectra(vec![sparse, dense], &config).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].scan_number, 3);
    }

    #[test]
    fn library_preset_drops_spectra_without_intensity() {
        let silent = Spectrum::new(
            vec![Peak::new(90.0, 0.0), Peak::new(140.0, 0.0)],
            "library.mgf",
            1,
            300.0,
            300.0,
        )
        .unwrap();
        let kept = filter_spectra(vec![silent, spectrum()], &FilterConfig::library()).unwrap();

        assert_eq!(kept.len(), 1);
        let norm: f64 = kept[0]
            .normalized_peaks()
            .iter()
            .map(|p| p.intensity * p.intensity)
            .sum();
        assert!((norm - 1.0).abs() < 1e-9);
    }
}
