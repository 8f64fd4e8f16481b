use crate::core::library::{LibraryHit, LibrarySearchParams, SpectralLibrary};
use crate::core::models::cluster::Cluster;
use crate::core::scoring::{SimilarityFunction, SpectrumView};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Searches every query against the library; results are aligned with `queries`.
#[instrument(skip_all, name = "library_search_workflow")]
pub fn search<Q>(
    queries: &[Q],
    library: &SpectralLibrary,
    similarity: &dyn SimilarityFunction,
    params: &LibrarySearchParams,
    reporter: &ProgressReporter,
) -> Result<Vec<Vec<LibraryHit>>, EngineError>
where
    Q: SpectrumView + Sync,
{
    info!(
        n_queries = queries.len(),
        library = library.name(),
        n_entries = library.len(),
        "Searching spectral library."
    );
    reporter.report(Progress::TaskStart {
        total_steps: queries.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = queries.iter();

    #[cfg(feature = "parallel")]
    let iterator = queries.par_iter();

    let results: Vec<Vec<LibraryHit>> = iterator
        .map(|query| {
            let hits = library.spectral_match(query, similarity, params);
            reporter.report(Progress::TaskIncrement);
            hits
        })
        .collect::<Result<_, _>>()?;

    reporter.report(Progress::TaskFinish);
    let n_matched = results.iter().filter(|hits| !hits.is_empty()).count();
    info!(n_matched, "Library search complete.");
    Ok(results)
}

/// Attaches library hits as annotations on each cluster's prototype.
///
/// Returns the number of clusters that received at least one annotation.
#[instrument(skip_all, name = "annotate_clusters_workflow")]
pub fn annotate_clusters(
    clusters: &mut [Cluster],
    library: &SpectralLibrary,
    similarity: &dyn SimilarityFunction,
    params: &LibrarySearchParams,
    reporter: &ProgressReporter,
) -> Result<usize, EngineError> {
    let results = search(clusters, library, similarity, params, reporter)?;
    let mut n_annotated = 0;
    for (cluster, hits) in clusters.iter_mut().zip(results) {
        if hits.is_empty() {
            continue;
        }
        n_annotated += 1;
        for hit in hits {
            cluster.annotate(hit.to_annotation());
        }
    }
    info!(n_annotated, "Cluster annotation complete.");
    Ok(n_annotated)
}
