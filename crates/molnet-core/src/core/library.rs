use crate::core::io::mgf::{MgfError, MgfFile};
use crate::core::io::traits::SpectrumFile;
use crate::core::models::spectrum::{Annotation, Spectrum, SpectrumError};
use crate::core::processing::{FilterConfig, filter_spectra};
use crate::core::scoring::{Similarity, SimilarityFunction, SpectrumView};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Failed to read library spectra: {0}")]
    Mgf(#[from] MgfError),
    #[error("Failed to preprocess library spectra: {0}")]
    Spectrum(#[from] SpectrumError),
    #[error("Invalid library search parameter '{name}': {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("Similarity function returned invalid score {0} (expected a finite value in [0, 1])")]
    InvalidScore(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LibrarySearchParams {
    /// Maximum precursor mass difference (exclusive) for a library entry to be scored.
    pub precursor_tolerance: f64,
    pub fragment_tolerance: f64,
    pub min_match: usize,
    pub score_threshold: f64,
}

impl Default for LibrarySearchParams {
    fn default() -> Self {
        Self {
            precursor_tolerance: 0.2,
            fragment_tolerance: 0.2,
            min_match: 2,
            score_threshold: 0.6,
        }
    }
}

impl LibrarySearchParams {
    fn validate(&self) -> Result<(), LibraryError> {
        let invalid = |name, value| Err(LibraryError::InvalidParameter { name, value });
        let is_tolerance = |value: f64| value.is_finite() && value >= 0.0;
        if !is_tolerance(self.precursor_tolerance) {
            return invalid("precursor_tolerance", self.precursor_tolerance);
        }
        if !is_tolerance(self.fragment_tolerance) {
            return invalid("fragment_tolerance", self.fragment_tolerance);
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return invalid("score_threshold", self.score_threshold);
        }
        Ok(())
    }
}

/// A library entry that scored at or above the search threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryHit {
    /// Position of the entry in [`SpectralLibrary::spectra`].
    pub entry_index: usize,
    pub compound_name: Option<String>,
    pub spectrum_id: Option<String>,
    pub precursor_mz: f64,
    pub similarity: Similarity,
}

impl LibraryHit {
    pub fn score(&self) -> f64 {
        self.similarity.score
    }

    pub fn to_annotation(&self) -> Annotation {
        Annotation {
            compound_name: self.compound_name.clone(),
            spectrum_id: self.spectrum_id.clone(),
            score: Some(self.similarity.score),
        }
    }
}

/// Preprocessed reference spectra, sorted by precursor mass for windowed lookup.
#[derive(Debug, Clone)]
pub struct SpectralLibrary {
    name: String,
    spectra: Vec<Spectrum>,
}

impl SpectralLibrary {
    /// Filters the reference spectra and indexes them by precursor mass.
    pub fn new(
        name: impl Into<String>,
        spectra: Vec<Spectrum>,
        filter: &FilterConfig,
    ) -> Result<Self, LibraryError> {
        let name = name.into();
        let n_loaded = spectra.len();
        let mut spectra = filter_spectra(spectra, filter)?;
        spectra.sort_by(|a, b| {
            a.precursor_mz
                .total_cmp(&b.precursor_mz)
                .then_with(|| a.mass_order(b))
        });
        info!(
            library = %name,
            n_loaded,
            n_kept = spectra.len(),
            "Spectral library ready."
        );
        Ok(Self { name, spectra })
    }

    /// Loads an MGF library; `NAME` and `SPECTRUMID` records become entry identities.
    pub fn from_mgf_path<P: AsRef<Path>>(path: P, filter: &FilterConfig) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let spectra = MgfFile::read_from_path(path)?;
        Self::new(path.display().to_string(), spectra, filter)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Scores `query` against every entry whose precursor mass lies strictly within
    /// `precursor_tolerance` and returns the hits at or above `score_threshold`, best first.
    #[instrument(skip_all, name = "spectral_match", fields(query_mz = query.precursor_mz()))]
    pub fn spectral_match(
        &self,
        query: &dyn SpectrumView,
        similarity: &dyn SimilarityFunction,
        params: &LibrarySearchParams,
    ) -> Result<Vec<LibraryHit>, LibraryError> {
        params.validate()?;
        if query.normalized_peaks().is_empty() {
            return Ok(Vec::new());
        }

        let query_mz = query.precursor_mz();
        let lower = query_mz - params.precursor_tolerance;
        let upper = query_mz + params.precursor_tolerance;
        let start = self.spectra.partition_point(|s| s.precursor_mz < lower);
        let end = self.spectra.partition_point(|s| s.precursor_mz <= upper);

        let mut hits = Vec::new();
        for (offset, entry) in self.spectra[start..end].iter().enumerate() {
            if (entry.precursor_mz - query_mz).abs() >= params.precursor_tolerance
                || entry.is_empty()
            {
                continue;
            }
            let result = similarity.score(
                entry,
                query,
                params.fragment_tolerance,
                params.min_match,
            );
            if !result.score.is_finite() || !(0.0..=1.0).contains(&result.score) {
                return Err(LibraryError::InvalidScore(result.score));
            }
            if result.score >= params.score_threshold {
                let annotation = entry.best_annotation();
                hits.push(LibraryHit {
                    entry_index: start + offset,
                    compound_name: annotation.and_then(|a| a.compound_name.clone()),
                    spectrum_id: annotation.and_then(|a| a.spectrum_id.clone()),
                    precursor_mz: entry.precursor_mz,
                    similarity: result,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then(a.entry_index.cmp(&b.entry_index))
        });
        debug!(n_candidates = end - start, n_hits = hits.len(), "Library search done.");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::spectrum::Peak;
    use crate::core::scoring::cosine::Cosine;
    use std::io::Write;

    fn entry(name: &str, precursor_mz: f64, peaks: &[(f64, f64)]) -> Spectrum {
        Spectrum::new(
            peaks.iter().copied().map(Peak::from).collect(),
            "library.mgf",
            1,
            precursor_mz,
            precursor_mz,
        )
        .unwrap()
        .with_annotation(Annotation {
            compound_name: Some(name.to_string()),
            spectrum_id: Some(format!("ID-{name}")),
            score: None,
        })
    }

    fn library() -> SpectralLibrary {
        SpectralLibrary::new(
            "test",
            vec![
                entry("far", 250.0, &[(100.0, 10.0), (150.0, 20.0)]),
                entry("exact", 200.05, &[(100.0, 10.0), (150.0, 20.0)]),
                entry("partial", 199.9, &[(100.0, 10.0), (175.0, 20.0)]),
            ],
            &FilterConfig::default(),
        )
        .unwrap()
    }

    fn query() -> Spectrum {
        Spectrum::new(
            vec![Peak::new(100.0, 10.0), Peak::new(150.0, 20.0)],
            "run",
            7,
            200.0,
            200.0,
        )
        .unwrap()
    }

    #[test]
    fn library_is_sorted_by_precursor() {
        let lib = library();
        let mzs: Vec<f64> = lib.spectra().iter().map(|s| s.precursor_mz).collect();
        assert_eq!(mzs, vec![199.9, 200.05, 250.0]);
    }

    #[test]
    fn hits_are_windowed_thresholded_and_ranked() {
        let lib = library();
        let params = LibrarySearchParams {
            min_match: 1,
            score_threshold: 0.2,
            ..Default::default()
        };
        let hits = lib.spectral_match(&query(), &Cosine, &params).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].compound_name.as_deref(), Some("exact"));
        assert!((hits[0].score() - 1.0).abs() < 1e-9);
        assert_eq!(hits[1].compound_name.as_deref(), Some("partial"));
        assert!(hits[0].score() >= hits[1].score());
    }

    #[test]
    fn threshold_excludes_weak_hits() {
        let lib = library();
        let params = LibrarySearchParams {
            min_match: 1,
            score_threshold: 0.9,
            ..Default::default()
        };
        let hits = lib.spectral_match(&query(), &Cosine, &params).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].to_annotation().spectrum_id.as_deref(), Some("ID-exact"));
    }

    #[test]
    fn invalid_scores_are_rejected() {
        let lib = library();
        let broken = |_: &dyn SpectrumView, _: &dyn SpectrumView, _: f64, _: usize| Similarity {
            score: 1.5,
            matches: vec![],
        };
        let result = lib.spectral_match(&query(), &broken, &LibrarySearchParams::default());
        assert!(matches!(result, Err(LibraryError::InvalidScore(s)) if s == 1.5));
    }

    #[test]
    fn library_with_negative_intensity_fails_to_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "BEGIN IONS\nPEPMASS=200.0\nNAME=Broken\n100 -1\n150 20\nEND IONS\n"
        )
        .unwrap();

        let result = SpectralLibrary::from_mgf_path(file.path(), &FilterConfig::library());
        assert!(matches!(
            result,
            Err(LibraryError::Mgf(MgfError::Parse { line: 4, .. }))
        ));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let params = LibrarySearchParams {
            precursor_tolerance: -1.0,
            ..Default::default()
        };
        let result = library().spectral_match(&query(), &Cosine, &params);
        assert!(matches!(
            result,
            Err(LibraryError::InvalidParameter {
                name: "precursor_tolerance",
                ..
            })
        ));
    }

    #[test]
    fn loads_library_from_mgf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "BEGIN IONS\nPEPMASS=200.0\nNAME=Caffeine\nSPECTRUMID=CCMS1\n100 10\n150 20\nEND IONS\n"
        )
        .unwrap();

        let lib = SpectralLibrary::from_mgf_path(file.path(), &FilterConfig::default()).unwrap();
        assert_eq!(lib.len(), 1);
        let hits = lib
            .spectral_match(&query(), &Cosine, &LibrarySearchParams::default())
            .unwrap();
        assert_eq!(hits[0].compound_name.as_deref(), Some("Caffeine"));
    }
}
