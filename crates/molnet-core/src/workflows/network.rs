use crate::core::models::cluster::{Cluster, remove_clusters_from_sources};
use crate::core::models::family::MolecularFamily;
use crate::core::models::ids::ClusterId;
use crate::core::models::spectrum::Spectrum;
use crate::core::processing::filter_spectra;
use crate::core::scoring::SimilarityFunction;
use crate::engine::clustering::cluster_spectra;
use crate::engine::config::WorkflowConfig;
use crate::engine::error::EngineError;
use crate::engine::graph::SimilarityGraph;
use crate::engine::partition::{assemble_families, partition};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct NetworkResult {
    /// Every cluster that survived source exclusion, including those below the
    /// network's minimum cluster size.
    pub clusters: Vec<Cluster>,
    /// The similarity graph after top-k filtering.
    pub graph: SimilarityGraph,
    pub families: Vec<MolecularFamily>,
}

impl NetworkResult {
    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id() == id)
    }

    pub fn n_edges(&self) -> usize {
        self.families.iter().map(|f| f.scores().len()).sum()
    }
}

/// Filters and clusters raw spectra, then builds the network from the clusters.
#[instrument(skip_all, name = "network_workflow")]
pub fn run(
    spectra: Vec<Spectrum>,
    config: &WorkflowConfig,
    similarity: &dyn SimilarityFunction,
    reporter: &ProgressReporter,
) -> Result<NetworkResult, EngineError> {
    config.scoring.validate()?;
    config.clustering.validate()?;
    config.network.validate()?;

    // === Phase 1: Spectrum preprocessing ===
    let spectra = reporter.phase("Filtering spectra", || {
        filter_spectra(spectra, &config.filtering)
    })?;

    // === Phase 2: Incremental clustering ===
    let clusters = reporter.phase("Clustering", || {
        cluster_spectra(
            spectra,
            similarity,
            &config.scoring,
            &config.clustering,
            reporter,
        )
    })?;

    let clusters = remove_clusters_from_sources(clusters, &config.excluded_sources);

    build_network(clusters, config, similarity, reporter)
}

/// Builds the similarity graph over `clusters` and partitions it into families.
///
/// Clusters below `min_cluster_size` stay in the result but join no family.
#[instrument(skip_all, name = "network_from_clusters_workflow")]
pub fn build_network(
    clusters: Vec<Cluster>,
    config: &WorkflowConfig,
    similarity: &dyn SimilarityFunction,
    reporter: &ProgressReporter,
) -> Result<NetworkResult, EngineError> {
    config.network.validate()?;
    let network = &config.network;

    // === Phase 3: Pairwise scoring ===
    let graph = reporter.phase("Scoring cluster pairs", || {
        tasks::pairwise::run(&clusters, similarity, &config.scoring, network, reporter)
    })?;
    info!(
        n_nodes = graph.n_nodes(),
        n_edges = graph.n_edges(),
        n_components = graph.n_connected_components(),
        "Initial network built."
    );

    // === Phase 4: Mutual top-k filtering ===
    let graph = reporter.phase("Filtering edges", || graph.topk_filter(network.top_k))?;
    let n_asymmetric = graph.check_symmetry();
    if n_asymmetric > 0 {
        warn!(n_asymmetric, "Top-k filtered graph is not symmetric.");
    }
    info!(
        top_k = network.top_k,
        n_edges = graph.n_edges(),
        "Top-k filtering complete."
    );

    // === Phase 5: Size-bounded partitioning ===
    let families = reporter.phase("Partitioning", || -> Result<_, EngineError> {
        let pieces = partition(&graph, network.max_family_size, reporter)?;
        Ok(assemble_families(&pieces))
    })?;

    reporter.report(Progress::Message(format!(
        "{} molecular families from {} clusters",
        families.len(),
        graph.n_nodes()
    )));
    info!(
        n_families = families.len(),
        max_family_size = network.max_family_size,
        "Molecular networking complete."
    );

    Ok(NetworkResult {
        clusters,
        graph,
        families,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::family::ScoreTriple;
    use crate::core::models::ids::FamilyId;
    use crate::core::models::spectrum::Peak;
    use crate::core::scoring::cosine::ShiftedCosine;
    use crate::core::scoring::{Similarity, SpectrumView};
    use crate::engine::config::{ClusteringConfig, WorkflowConfigBuilder};

    fn spectrum(source: &str, scan: usize, parent_mz: f64) -> Spectrum {
        Spectrum::new(
            vec![Peak::new(100.0, 10.0), Peak::new(150.0, 5.0)],
            source,
            scan,
            parent_mz,
            parent_mz,
        )
        .unwrap()
    }

    /// Scores looked up by the pair of parent masses: A = 500, B = 500.5, C = 600.
    fn table(a: &dyn SpectrumView, b: &dyn SpectrumView, _: f64, _: usize) -> Similarity {
        let key = |s: &dyn SpectrumView| (s.parent_mz() * 10.0).round() as i64;
        let mut pair = [key(a), key(b)];
        pair.sort_unstable();
        let score = match pair {
            [5000, 5005] => 0.9,
            _ => 0.1,
        };
        Similarity {
            score,
            matches: vec![],
        }
    }

    fn config(max_mass_shift: f64, beta: usize) -> WorkflowConfig {
        WorkflowConfigBuilder::new()
            .tolerance(0.2)
            .score_threshold(0.6)
            .top_k(10)
            .max_mass_shift(max_mass_shift)
            .max_family_size(beta)
            .build()
            .unwrap()
    }

    #[test]
    fn three_cluster_scenario_yields_pair_and_singleton() {
        let spectra = vec![
            spectrum("run", 1, 500.0),
            spectrum("run", 2, 500.5),
            spectrum("run", 3, 600.0),
        ];
        let result = run(spectra, &config(50.0, 10), &table, &ProgressReporter::new()).unwrap();

        assert_eq!(result.clusters.len(), 3);
        assert_eq!(result.graph.n_edges(), 1);
        assert_eq!(result.families.len(), 2);

        let pair = &result.families[0];
        assert_eq!(pair.id(), FamilyId(0));
        assert_eq!(pair.members(), &[ClusterId(0), ClusterId(1)]);
        assert_eq!(
            pair.scores(),
            &[ScoreTriple {
                cluster_a: ClusterId(0),
                cluster_b: ClusterId(1),
                score: 0.9
            }]
        );
        let single = &result.families[1];
        assert_eq!(single.members(), &[ClusterId(2)]);
        assert!(single.is_singleton());
    }

    #[test]
    fn families_partition_qualifying_clusters() {
        let spectra: Vec<Spectrum> = (0..12)
            .map(|i| spectrum("run", i, 300.0 + i as f64 * 3.0))
            .collect();
        let always = |_: &dyn SpectrumView, _: &dyn SpectrumView, _: f64, _: usize| Similarity {
            score: 0.8,
            matches: vec![],
        };
        let result = run(spectra, &config(100.0, 4), &always, &ProgressReporter::new()).unwrap();

        let mut members: Vec<ClusterId> = result
            .families
            .iter()
            .flat_map(|f| f.members().iter().copied())
            .collect();
        members.sort_unstable();
        assert_eq!(members, (0..12).map(ClusterId).collect::<Vec<_>>());
        for family in &result.families {
            assert!(family.n_clusters() <= 4);
            for triple in family.scores() {
                assert!(family.contains(triple.cluster_a));
                assert!(family.contains(triple.cluster_b));
            }
        }
    }

    #[test]
    fn excluded_sources_and_small_clusters_leave_the_network() {
        let mut config = config(100.0, 10);
        config.clustering = ClusteringConfig {
            enabled: true,
            ..Default::default()
        };
        config.excluded_sources = vec!["blank.mzML".to_string()];
        config.network.min_cluster_size = 2;

        let spectra = vec![
            spectrum("a.mzML", 1, 400.0),
            spectrum("b.mzML", 1, 400.0),
            spectrum("a.mzML", 2, 450.0),
            spectrum("a.mzML", 3, 500.0),
            spectrum("blank.mzML", 1, 500.0),
        ];
        let result = run(spectra, &config, &ShiftedCosine, &ProgressReporter::new()).unwrap();

        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.families.len(), 1);
        let family_member = result.families[0].members()[0];
        assert_eq!(result.cluster(family_member).unwrap().n_spectra(), 2);
    }

    #[test]
    fn invalid_configuration_is_rejected_before_work() {
        let mut config = config(100.0, 10);
        config.network.top_k = 0;
        let result = run(vec![], &config, &ShiftedCosine, &ProgressReporter::new());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
