use super::ids::ClusterId;
use super::spectrum::{Annotation, Peak, Spectrum};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::info;

/// A group of near-duplicate spectra represented by a prototype spectrum.
///
/// The prototype is the member with the largest total intensity and is always stored at
/// position zero of [`Cluster::spectra`]. It is recomputed after every addition, so a
/// cluster can stand in for a spectrum in similarity comparisons through its prototype's
/// peaks and masses.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    id: ClusterId,
    spectra: Vec<Spectrum>,
}

impl Cluster {
    /// Creates a singleton cluster around one spectrum.
    pub fn new(spectrum: Spectrum, id: ClusterId) -> Self {
        Self {
            id,
            spectra: vec![spectrum],
        }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Appends a member and re-elects the prototype.
    pub fn add_spectrum(&mut self, spectrum: Spectrum) {
        self.spectra.push(spectrum);
        self.elect_prototype();
    }

    pub fn prototype(&self) -> &Spectrum {
        &self.spectra[0]
    }

    /// Members ordered by decreasing total intensity; the first one is the prototype.
    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    pub fn n_spectra(&self) -> usize {
        self.spectra.len()
    }

    pub fn peaks(&self) -> &[Peak] {
        self.prototype().peaks()
    }

    pub fn normalized_peaks(&self) -> &[Peak] {
        self.prototype().normalized_peaks()
    }

    pub fn precursor_mz(&self) -> f64 {
        self.prototype().precursor_mz
    }

    pub fn parent_mz(&self) -> f64 {
        self.prototype().parent_mz
    }

    pub fn annotate(&mut self, annotation: Annotation) {
        self.spectra[0].annotations.push(annotation);
    }

    pub fn best_annotation(&self) -> Option<&Annotation> {
        self.prototype().best_annotation()
    }

    /// Strict total order by prototype parent mass, broken by cluster id.
    pub fn mass_order(&self, other: &Self) -> Ordering {
        self.parent_mz()
            .total_cmp(&other.parent_mz())
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Member identities as `(source, scan_number)` pairs, prototype first.
    pub fn members(&self) -> Vec<(&str, usize)> {
        self.spectra
            .iter()
            .map(|s| (s.source.as_str(), s.scan_number))
            .collect()
    }

    /// Members rendered as `source_scan` and joined with `:`.
    pub fn member_string(&self) -> String {
        self.spectra
            .iter()
            .map(|s| format!("{}_{}", s.source, s.scan_number))
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn n_unique_sources(&self) -> usize {
        self.spectra
            .iter()
            .map(|s| s.source.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn contains_source<S: AsRef<str>>(&self, sources: &[S]) -> bool {
        self.spectra
            .iter()
            .any(|s| sources.iter().any(|source| source.as_ref() == s.source))
    }

    /// Member counts aligned with `sources`; members from unlisted sources are not counted.
    pub fn n_members_in_sources<S: AsRef<str>>(&self, sources: &[S]) -> Vec<usize> {
        let positions: HashMap<&str, usize> = sources
            .iter()
            .enumerate()
            .map(|(pos, source)| (source.as_ref(), pos))
            .collect();
        let mut counts = vec![0; sources.len()];
        for spectrum in &self.spectra {
            if let Some(&pos) = positions.get(spectrum.source.as_str()) {
                counts[pos] += 1;
            }
        }
        counts
    }

    /// Largest precursor intensity per source, over members that report one.
    pub fn source_intensities(&self) -> BTreeMap<&str, f64> {
        let mut intensities: BTreeMap<&str, f64> = BTreeMap::new();
        for spectrum in &self.spectra {
            if let Some(intensity) = spectrum.precursor_intensity {
                intensities
                    .entry(spectrum.source.as_str())
                    .and_modify(|current| *current = current.max(intensity))
                    .or_insert(intensity);
            }
        }
        intensities
    }

    /// Counts members per sample-group level and the number of levels that occur at all.
    ///
    /// `source_to_level` maps a source name to one of `levels`; members whose source is
    /// not mapped are ignored.
    pub fn group_counts<S: AsRef<str>>(
        &self,
        levels: &[S],
        source_to_level: &HashMap<String, String>,
    ) -> (Vec<usize>, usize) {
        let positions: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(pos, level)| (level.as_ref(), pos))
            .collect();
        let mut counts = vec![0; levels.len()];
        for spectrum in &self.spectra {
            let pos = source_to_level
                .get(&spectrum.source)
                .and_then(|level| positions.get(level.as_str()));
            if let Some(&pos) = pos {
                counts[pos] += 1;
            }
        }
        let n_non_zero = counts.iter().filter(|&&c| c > 0).count();
        (counts, n_non_zero)
    }

    fn elect_prototype(&mut self) {
        self.spectra
            .sort_by(|a, b| b.total_intensity().total_cmp(&a.total_intensity()));
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cluster {} ({} spectra), m/z: {}",
            self.id,
            self.n_spectra(),
            self.parent_mz()
        )?;
        if let Some(annotation) = self.best_annotation() {
            write!(f, ", ({})", annotation)?;
        }
        Ok(())
    }
}

/// Drops every cluster holding at least one spectrum from the listed sources (e.g. blanks).
pub fn remove_clusters_from_sources<S: AsRef<str>>(
    clusters: Vec<Cluster>,
    sources: &[S],
) -> Vec<Cluster> {
    if sources.is_empty() {
        return clusters;
    }
    let before = clusters.len();
    let kept: Vec<Cluster> = clusters
        .into_iter()
        .filter(|cluster| !cluster.contains_source(sources))
        .collect();
    info!(
        before,
        after = kept.len(),
        "Removed clusters containing spectra from excluded sources."
    );
    kept
}
