use crate::core::models::family::{MolecularFamily, ScoreTriple};
use crate::core::models::ids::FamilyId;
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::graph::SimilarityGraph;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{debug, info, instrument};

/// Removes weakest edges until the component falls apart, then returns its pieces.
fn split(mut component: SimilarityGraph, max_size: usize) -> Result<Vec<SimilarityGraph>, EngineError> {
    let n_nodes = component.n_nodes();
    let mut n_removed = 0;
    loop {
        let edge = component
            .remove_weakest_edge()
            .ok_or(EngineError::UnsplittableComponent { n_nodes, max_size })?;
        n_removed += 1;
        if !component.reachable_from(edge.source).contains(&edge.target) {
            break;
        }
    }
    let pieces = component.connected_components();
    debug!(
        n_nodes,
        n_removed,
        piece_sizes = ?pieces.iter().map(SimilarityGraph::n_nodes).collect::<Vec<_>>(),
        "Split oversized component."
    );
    Ok(pieces)
}

/// Splits the graph into connected pieces of at most `max_size` nodes.
///
/// Components already within the bound are returned first, in component order. Each
/// oversized component loses its globally weakest edge, repeatedly, until it
/// disconnects; pieces still above the bound go through the same loop. The result is a
/// partition of the input nodes.
#[instrument(skip_all, name = "partition_task")]
pub fn partition(
    graph: &SimilarityGraph,
    max_size: usize,
    reporter: &ProgressReporter,
) -> Result<Vec<SimilarityGraph>, EngineError> {
    if max_size == 0 {
        return Err(ConfigError::InvalidParameter {
            name: "max_family_size",
            value: max_size.to_string(),
            reason: "must be at least 1",
        }
        .into());
    }

    let components = graph.connected_components();
    info!(
        n_components = components.len(),
        max_size, "Partitioning connected components."
    );

    let (mut finished, mut too_big): (Vec<_>, Vec<_>) = components
        .into_iter()
        .partition(|c| c.n_nodes() <= max_size);

    while !too_big.is_empty() {
        let biggest = too_big.iter().map(SimilarityGraph::n_nodes).max().unwrap_or(0);
        reporter.report(Progress::Message(format!(
            "{} components too big (largest has {} clusters)",
            too_big.len(),
            biggest
        )));
        debug!(n_too_big = too_big.len(), biggest, "Splitting oversized components.");

        let mut next_round = Vec::new();
        for component in too_big {
            for piece in split(component, max_size)? {
                if piece.n_nodes() <= max_size {
                    finished.push(piece);
                } else {
                    next_round.push(piece);
                }
            }
        }
        too_big = next_round;
    }

    info!(n_families = finished.len(), "Partitioning complete.");
    Ok(finished)
}

/// Turns partition pieces into families with sequential ids.
///
/// Members are listed by ascending cluster id and each undirected edge contributes one
/// score triple.
pub fn assemble_families(pieces: &[SimilarityGraph]) -> Vec<MolecularFamily> {
    let mut family_id = FamilyId::default();
    let mut families = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let members = piece.nodes().collect();
        let scores = piece
            .edges()
            .into_iter()
            .map(|e| ScoreTriple {
                cluster_a: e.source,
                cluster_b: e.target,
                score: e.weight,
            })
            .collect();
        families.push(MolecularFamily::new(family_id, members, scores));
        family_id = family_id.next();
    }
    families
}
