use super::{read_spectra, with_suffix, write_output};
use crate::cli::NetworkArgs;
use crate::config::PartialNetworkConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use molnet::{
    core::io::{mgf::MgfFile, tables},
    core::library::{LibrarySearchParams, SpectralLibrary},
    core::processing::FilterConfig,
    engine::progress::ProgressReporter,
    workflows,
};
use tracing::{info, warn};

pub async fn run(args: NetworkArgs) -> Result<()> {
    let partial_config = PartialNetworkConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = partial_config.merge_with_cli(&args)?;

    let spectra = read_spectra(&args.inputs)?;
    if spectra.is_empty() {
        return Err(CliError::Argument(
            "The input files contain no spectra.".to_string(),
        ));
    }

    let library = match &args.library {
        Some(path) => {
            info!("Loading spectral library from {:?}", path);
            let library = SpectralLibrary::from_mgf_path(path, &FilterConfig::library())
                .map_err(|e| CliError::FileParsing {
                    path: path.clone(),
                    source: e.into(),
                })?;
            Some(library)
        }
        None => None,
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let workflow = &settings.workflow;
    let similarity = workflow.scoring.method.similarity();

    println!("Building molecular network from {} spectra...", spectra.len());
    info!("Invoking the core network workflow...");

    let mut result = tokio::task::block_in_place(|| {
        workflows::network::run(spectra, workflow, similarity, &reporter)
    })?;

    if let Some(library) = &library {
        let params = LibrarySearchParams {
            fragment_tolerance: workflow.scoring.tolerance,
            min_match: workflow.scoring.min_match,
            ..Default::default()
        };
        let n_annotated = tokio::task::block_in_place(|| {
            reporter.phase("Annotating clusters", || {
                workflows::library::annotate_clusters(
                    &mut result.clusters,
                    library,
                    similarity,
                    &params,
                    &reporter,
                )
            })
        })?;
        println!(
            "  {} of {} clusters matched the library.",
            n_annotated,
            result.clusters.len()
        );
    }

    if result.families.is_empty() {
        warn!("Workflow completed but produced no molecular families.");
        println!("Warning: no cluster passed the network filters; no families were formed.");
    }

    let nodes_path = with_suffix(&args.output, "_nodes.csv");
    write_output(&nodes_path, |w| {
        tables::write_node_table(w, &result.clusters, &result.families, &settings.node_table)
    })?;

    let edges_path = with_suffix(&args.output, "_edges.csv");
    write_output(&edges_path, |w| {
        tables::write_edge_table(w, &result.families)
    })?;

    let mgf_path = with_suffix(&args.output, ".mgf");
    write_output(&mgf_path, |w| {
        MgfFile::write_families(&result.clusters, &result.families, w)
    })?;

    let parameters_path = with_suffix(&args.output, "_parameters.csv");
    write_output(&parameters_path, |w| {
        tables::write_parameter_table(w, &workflow.parameter_rows())
    })?;

    if settings.write_features {
        let features_path = with_suffix(&args.output, "_features.mgf");
        write_output(&features_path, |w| {
            MgfFile::write_cluster_features(&result.clusters, w)
        })?;
    }

    println!(
        "✓ {} clusters, {} edges, {} molecular families written to {}_*",
        result.clusters.len(),
        result.n_edges(),
        result.families.len(),
        args.output.display()
    );

    Ok(())
}
