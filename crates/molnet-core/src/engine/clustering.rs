use crate::core::models::cluster::Cluster;
use crate::core::models::ids::ClusterId;
use crate::core::models::spectrum::Spectrum;
use crate::core::scoring::SimilarityFunction;
use crate::engine::config::{ClusteringConfig, ScoringConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::utils::checked_similarity;
use tracing::{info, instrument};

/// What happened to a spectrum passed to [`merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The spectrum joined an existing cluster.
    Joined(ClusterId),
    /// No candidate qualified; a new singleton cluster was created.
    Created(ClusterId),
}

impl MergeOutcome {
    pub fn cluster_id(&self) -> ClusterId {
        match self {
            MergeOutcome::Joined(id) | MergeOutcome::Created(id) => *id,
        }
    }
}

fn rt_compatible(cluster: &Cluster, spectrum: &Spectrum, rt_tolerance: f64) -> bool {
    match (cluster.prototype().retention_time, spectrum.retention_time) {
        (Some(a), Some(b)) => (a - b).abs() < rt_tolerance,
        _ => true,
    }
}

fn insertion_point(clusters: &[Cluster], cluster: &Cluster) -> usize {
    clusters.partition_point(|c| c.mass_order(cluster).is_lt())
}

/// Merges one spectrum into a cluster list kept sorted by [`Cluster::mass_order`].
///
/// Candidates are the clusters whose prototype parent mass lies within `ms1_tolerance`
/// of the spectrum's parent mass, visited in mass order. The first candidate that passes
/// the retention-time check and scores at least `score_threshold` against the spectrum
/// receives it; no better candidate is searched for. Otherwise a new cluster with id
/// `next_id` is inserted at its sorted position.
///
/// Returns the outcome together with the id counter to use for the next call.
pub fn merge(
    clusters: &mut Vec<Cluster>,
    spectrum: Spectrum,
    similarity: &dyn SimilarityFunction,
    scoring: &ScoringConfig,
    config: &ClusteringConfig,
    next_id: ClusterId,
) -> Result<(MergeOutcome, ClusterId), EngineError> {
    let parent_mz = spectrum.parent_mz;
    let start = clusters.partition_point(|c| c.parent_mz() < parent_mz - config.ms1_tolerance);

    let mut matched = None;
    for (offset, cluster) in clusters[start..].iter().enumerate() {
        if cluster.parent_mz() > parent_mz + config.ms1_tolerance {
            break;
        }
        if !rt_compatible(cluster, &spectrum, config.rt_tolerance) {
            continue;
        }
        let result = checked_similarity(
            similarity,
            cluster,
            &spectrum,
            scoring.tolerance,
            scoring.min_match,
            || format!("cluster {} and scan {}", cluster.id(), spectrum.scan_number),
        )?;
        if result.score >= config.score_threshold {
            matched = Some(start + offset);
            break;
        }
    }

    match matched {
        Some(index) => {
            // A new prototype may move the cluster within the sorted list.
            let mut cluster = clusters.remove(index);
            cluster.add_spectrum(spectrum);
            let id = cluster.id();
            let position = insertion_point(clusters, &cluster);
            clusters.insert(position, cluster);
            Ok((MergeOutcome::Joined(id), next_id))
        }
        None => {
            let cluster = Cluster::new(spectrum, next_id);
            let position = insertion_point(clusters, &cluster);
            clusters.insert(position, cluster);
            Ok((MergeOutcome::Created(next_id), next_id.next()))
        }
    }
}

/// Streams spectra into clusters with the greedy first-match policy of [`merge`].
pub struct IncrementalClusterer<'a> {
    clusters: Vec<Cluster>,
    next_id: ClusterId,
    similarity: &'a dyn SimilarityFunction,
    scoring: ScoringConfig,
    config: ClusteringConfig,
}

impl<'a> IncrementalClusterer<'a> {
    pub fn new(
        similarity: &'a dyn SimilarityFunction,
        scoring: ScoringConfig,
        config: ClusteringConfig,
    ) -> Result<Self, EngineError> {
        scoring.validate()?;
        config.validate()?;
        Ok(Self {
            clusters: Vec::new(),
            next_id: ClusterId::default(),
            similarity,
            scoring,
            config,
        })
    }

    pub fn merge(&mut self, spectrum: Spectrum) -> Result<MergeOutcome, EngineError> {
        let (outcome, next_id) = merge(
            &mut self.clusters,
            spectrum,
            self.similarity,
            &self.scoring,
            &self.config,
            self.next_id,
        )?;
        self.next_id = next_id;
        Ok(outcome)
    }

    /// Id the next newly created cluster will receive.
    pub fn next_id(&self) -> ClusterId {
        self.next_id
    }

    /// Current clusters in mass order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn into_clusters(self) -> Vec<Cluster> {
        self.clusters
    }
}

/// Clusters a batch of spectra in input order.
///
/// With clustering disabled every spectrum becomes its own cluster, numbered in input
/// order.
#[instrument(skip_all, name = "clustering_task")]
pub fn cluster_spectra(
    spectra: Vec<Spectrum>,
    similarity: &dyn SimilarityFunction,
    scoring: &ScoringConfig,
    config: &ClusteringConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<Cluster>, EngineError> {
    let n_spectra = spectra.len();
    if !config.enabled {
        info!(n_spectra, "Clustering disabled; one cluster per spectrum.");
        return Ok(spectra
            .into_iter()
            .enumerate()
            .map(|(i, s)| Cluster::new(s, ClusterId(i)))
            .collect());
    }

    info!(
        n_spectra,
        score_threshold = config.score_threshold,
        ms1_tolerance = config.ms1_tolerance,
        rt_tolerance = config.rt_tolerance,
        "Clustering spectra."
    );
    reporter.report(Progress::TaskStart {
        total_steps: n_spectra as u64,
    });

    let mut clusterer = IncrementalClusterer::new(similarity, *scoring, *config)?;
    for spectrum in spectra {
        clusterer.merge(spectrum)?;
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);

    info!(
        n_spectra,
        n_clusters = clusterer.len(),
        "Clustering complete."
    );
    Ok(clusterer.into_clusters())
}
