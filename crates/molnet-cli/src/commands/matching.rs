use super::{read_spectra, write_output};
use crate::cli::MatchArgs;
use crate::config::resolve_match_params;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use molnet::{
    core::io::tables::{self, HitRecord},
    core::library::{LibraryHit, SpectralLibrary},
    core::models::spectrum::Spectrum,
    core::processing::FilterConfig,
    engine::progress::ProgressReporter,
    workflows,
};
use tracing::info;

/// Flattens per-query hits into report rows, keeping at most `max_hits` per query.
fn hit_records(
    queries: &[Spectrum],
    results: &[Vec<LibraryHit>],
    max_hits: Option<usize>,
) -> Vec<HitRecord> {
    let mut records = Vec::new();
    for (query, hits) in queries.iter().zip(results) {
        let limit = max_hits.unwrap_or(hits.len());
        for (rank, hit) in hits.iter().take(limit).enumerate() {
            records.push(HitRecord {
                query_source: query.source.clone(),
                query_scan: query.scan_number,
                query_precursor_mz: query.precursor_mz,
                rank: rank + 1,
                compound_name: hit.compound_name.clone().unwrap_or_default(),
                spectrum_id: hit.spectrum_id.clone().unwrap_or_default(),
                library_precursor_mz: hit.precursor_mz,
                score: hit.score(),
                n_matches: hit.similarity.matches.len(),
            });
        }
    }
    records
}

pub async fn run(args: MatchArgs) -> Result<()> {
    let (params, method) = resolve_match_params(&args);

    info!("Loading spectral library from {:?}", &args.library);
    let library = SpectralLibrary::from_mgf_path(&args.library, &FilterConfig::library())
        .map_err(|e| CliError::FileParsing {
            path: args.library.clone(),
            source: e.into(),
        })?;
    if library.is_empty() {
        return Err(CliError::Argument(format!(
            "Spectral library {:?} contains no usable spectra.",
            args.library
        )));
    }

    let queries = read_spectra(&args.inputs)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Searching {} queries against {} library spectra...",
        queries.len(),
        library.len()
    );
    let results = tokio::task::block_in_place(|| {
        reporter.phase("Searching library", || {
            workflows::library::search(&queries, &library, method.similarity(), &params, &reporter)
        })
    })?;

    let records = hit_records(&queries, &results, args.max_hits);
    let n_matched = results.iter().filter(|hits| !hits.is_empty()).count();
    write_output(&args.output, |w| tables::write_hit_table(w, &records))?;

    println!(
        "✓ {} of {} queries matched; {} hits written to {}",
        n_matched,
        queries.len(),
        records.len(),
        args.output.display()
    );
    Ok(())
}
