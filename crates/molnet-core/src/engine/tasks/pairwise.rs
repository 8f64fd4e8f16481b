use crate::core::models::cluster::Cluster;
use crate::core::models::ids::ClusterId;
use crate::core::scoring::SimilarityFunction;
use crate::engine::config::{NetworkConfig, ScoringConfig};
use crate::engine::error::EngineError;
use crate::engine::graph::SimilarityGraph;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::utils::checked_similarity;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

type ScoredPair = (ClusterId, ClusterId, f64);

/// Scores every pair of eligible clusters and collects the edges above threshold.
///
/// Clusters with fewer than `min_cluster_size` spectra are left out entirely. Only pairs
/// whose prototype parent masses differ by less than `max_mass_shift` are scored. Every
/// eligible cluster becomes a node, even without edges. No top-k filtering is applied
/// here.
#[instrument(skip_all, name = "pairwise_scoring_task")]
pub fn run(
    clusters: &[Cluster],
    similarity: &dyn SimilarityFunction,
    scoring: &ScoringConfig,
    network: &NetworkConfig,
    reporter: &ProgressReporter,
) -> Result<SimilarityGraph, EngineError> {
    scoring.validate()?;
    network.validate()?;

    let mut eligible: Vec<&Cluster> = clusters
        .iter()
        .filter(|c| c.n_spectra() >= network.min_cluster_size)
        .collect();
    eligible.sort_by(|a, b| a.mass_order(b));
    info!(
        n_clusters = clusters.len(),
        n_eligible = eligible.len(),
        min_cluster_size = network.min_cluster_size,
        max_mass_shift = network.max_mass_shift,
        "Scoring cluster pairs."
    );

    let mut graph = SimilarityGraph::new();
    for cluster in &eligible {
        graph.add_node(cluster.id());
    }
    if eligible.len() < 2 {
        return Ok(graph);
    }

    reporter.report(Progress::TaskStart {
        total_steps: eligible.len() as u64,
    });

    let score_anchor = |i: usize| -> Result<Vec<ScoredPair>, EngineError> {
        let anchor = eligible[i];
        let mut edges = Vec::new();
        for other in &eligible[i + 1..] {
            if other.parent_mz() - anchor.parent_mz() >= network.max_mass_shift {
                break;
            }
            let result = checked_similarity(
                similarity,
                anchor,
                *other,
                scoring.tolerance,
                scoring.min_match,
                || format!("clusters {} and {}", anchor.id(), other.id()),
            )?;
            if result.score >= network.score_threshold {
                edges.push((anchor.id(), other.id(), result.score));
            }
        }
        reporter.report(Progress::TaskIncrement);
        Ok(edges)
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = 0..eligible.len();

    #[cfg(feature = "parallel")]
    let iterator = (0..eligible.len()).into_par_iter();

    let per_anchor: Vec<Vec<ScoredPair>> = iterator.map(score_anchor).collect::<Result<_, _>>()?;

    reporter.report(Progress::TaskFinish);

    for (a, b, weight) in per_anchor.into_iter().flatten() {
        graph.add_edge(a, b, weight)?;
    }

    debug!(n_edges = graph.n_edges(), "Pairwise scoring complete.");
    Ok(graph)
}
