mod defaults;

pub use defaults::DefaultsConfig;

use crate::cli::{MatchArgs, NetworkArgs};
use crate::error::{CliError, Result};
use molnet::core::io::tables::{NodeTableOptions, SampleGrouping};
use molnet::core::library::LibrarySearchParams;
use molnet::engine::config::{
    self as core_config, ClusteringConfig, FilterConfig, LocalMaxima, ScoringMethod,
    WorkflowConfigBuilder,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialScoringConfig {
    tolerance: Option<f64>,
    min_match: Option<usize>,
    method: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialFilteringConfig {
    normalize_max: Option<f64>,
    min_intensity: Option<f64>,
    precursor_tolerance: Option<f64>,
    top_fraction: Option<f64>,
    local_maxima_k: Option<usize>,
    local_maxima_window: Option<f64>,
    min_peaks: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialClusteringConfig {
    enabled: Option<bool>,
    score_threshold: Option<f64>,
    rt_tolerance: Option<f64>,
    ms1_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialNetworkSection {
    score_threshold: Option<f64>,
    top_k: Option<usize>,
    max_mass_shift: Option<f64>,
    max_family_size: Option<usize>,
    min_cluster_size: Option<usize>,
    #[serde(default)]
    exclude_sources: Vec<String>,
}

/// One sample-metadata column group of the node table.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialGrouping {
    title: String,
    /// Column order; defaults to the sorted distinct levels of `sources`.
    levels: Option<Vec<String>>,
    /// Source file name to level.
    sources: BTreeMap<String, String>,
}

impl From<PartialGrouping> for SampleGrouping {
    fn from(p: PartialGrouping) -> Self {
        let levels = p.levels.unwrap_or_else(|| {
            p.sources
                .values()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        });
        Self {
            title: p.title,
            levels,
            source_to_level: p.sources.into_iter().collect(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialExportConfig {
    include_annotations: Option<bool>,
    features: Option<bool>,
    #[serde(default)]
    groupings: Vec<PartialGrouping>,
}

/// Everything the `network` command needs after merging file, overrides and defaults.
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub workflow: core_config::WorkflowConfig,
    pub node_table: NodeTableOptions,
    /// Also write `<PREFIX>_features.mgf` with one block per cluster.
    pub write_features: bool,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialNetworkConfig {
    scoring: Option<PartialScoringConfig>,
    filtering: Option<PartialFilteringConfig>,
    clustering: Option<PartialClusteringConfig>,
    network: Option<PartialNetworkSection>,
    export: Option<PartialExportConfig>,
}

impl PartialNetworkConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads `path` when given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map(Self::from_file)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    pub fn merge_with_cli(mut self, args: &NetworkArgs) -> Result<NetworkSettings> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let scoring = self.scoring.take().unwrap_or_default();
        let network = self.network.take().unwrap_or_default();

        let method = match (args.method, scoring.method.as_deref()) {
            (Some(method), _) => method,
            (None, Some(name)) => parse_method(name)?,
            (None, None) => defaults.method,
        };

        let filtering = Self::merge_filtering(self.filtering.take(), &defaults)?;
        let clustering = Self::merge_clustering(
            self.clustering.take(),
            args.clustering.as_option(),
            &defaults,
        );

        let mut builder = WorkflowConfigBuilder::new()
            .tolerance(
                args.tolerance
                    .or(scoring.tolerance)
                    .unwrap_or(defaults.tolerance),
            )
            .min_match(
                args.min_match
                    .or(scoring.min_match)
                    .unwrap_or(defaults.min_match),
            )
            .method(method)
            .filtering(filtering)
            .clustering(clustering)
            .score_threshold(
                args.score_threshold
                    .or(network.score_threshold)
                    .unwrap_or(defaults.score_threshold),
            )
            .top_k(args.top_k.or(network.top_k).unwrap_or(defaults.top_k))
            .max_mass_shift(
                args.max_mass_shift
                    .or(network.max_mass_shift)
                    .unwrap_or(defaults.max_mass_shift),
            )
            .max_family_size(
                args.max_family_size
                    .or(network.max_family_size)
                    .unwrap_or(defaults.max_family_size),
            )
            .min_cluster_size(
                args.min_cluster_size
                    .or(network.min_cluster_size)
                    .unwrap_or(defaults.min_cluster_size),
            );

        let excluded: BTreeSet<&String> = network
            .exclude_sources
            .iter()
            .chain(&args.exclude_sources)
            .collect();
        for source in excluded {
            builder = builder.exclude_source(source.clone());
        }

        let workflow = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let export = self.export.take().unwrap_or_default();
        let node_table = NodeTableOptions {
            groupings: export.groupings.into_iter().map(Into::into).collect(),
            include_annotations: export
                .include_annotations
                .unwrap_or(args.library.is_some()),
        };

        Ok(NetworkSettings {
            workflow,
            node_table,
            write_features: export.features.unwrap_or(false),
        })
    }

    fn merge_filtering(
        partial: Option<PartialFilteringConfig>,
        defaults: &DefaultsConfig,
    ) -> Result<FilterConfig> {
        let partial = partial.unwrap_or_default();
        let local_maxima = match (partial.local_maxima_k, partial.local_maxima_window) {
            (Some(k), Some(window)) => Some(LocalMaxima { k, window }),
            (None, None) => None,
            _ => {
                return Err(CliError::Config(
                    "`filtering.local-maxima-k` and `filtering.local-maxima-window` must be set together"
                        .to_string(),
                ));
            }
        };
        Ok(FilterConfig {
            normalize_max: partial.normalize_max,
            min_intensity: partial.min_intensity,
            precursor_tolerance: partial.precursor_tolerance,
            top_fraction: partial.top_fraction,
            local_maxima,
            min_peaks: partial.min_peaks.unwrap_or(defaults.min_peaks),
        })
    }

    fn merge_clustering(
        partial: Option<PartialClusteringConfig>,
        cli_enabled: Option<bool>,
        defaults: &DefaultsConfig,
    ) -> ClusteringConfig {
        let partial = partial.unwrap_or_default();
        ClusteringConfig {
            enabled: cli_enabled.or(partial.enabled).unwrap_or(defaults.cluster),
            score_threshold: partial
                .score_threshold
                .unwrap_or(defaults.cluster_score_threshold),
            rt_tolerance: partial.rt_tolerance.unwrap_or(defaults.rt_tolerance),
            ms1_tolerance: partial.ms1_tolerance.unwrap_or(defaults.ms1_tolerance),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            let value_str = value_str.trim();

            match key {
                "scoring.tolerance" => {
                    self.scoring.get_or_insert_with(Default::default).tolerance =
                        Some(parse_value(key, value_str)?);
                }
                "scoring.min-match" => {
                    self.scoring.get_or_insert_with(Default::default).min_match =
                        Some(parse_value(key, value_str)?);
                }
                "scoring.method" => {
                    parse_method(value_str)?;
                    self.scoring.get_or_insert_with(Default::default).method = Some(value_str.to_string());
                }
                "filtering.normalize-max" => {
                    self.filtering.get_or_insert_with(Default::default).normalize_max =
                        Some(parse_value(key, value_str)?);
                }
                "filtering.min-intensity" => {
                    self.filtering.get_or_insert_with(Default::default).min_intensity =
                        Some(parse_value(key, value_str)?);
                }
                "filtering.precursor-tolerance" => {
                    self.filtering
                        .get_or_insert_with(Default::default)
                        .precursor_tolerance = Some(parse_value(key, value_str)?);
                }
                "filtering.top-fraction" => {
                    self.filtering.get_or_insert_with(Default::default).top_fraction =
                        Some(parse_value(key, value_str)?);
                }
                "filtering.local-maxima-k" => {
                    self.filtering.get_or_insert_with(Default::default).local_maxima_k =
                        Some(parse_value(key, value_str)?);
                }
                "filtering.local-maxima-window" => {
                    self.filtering
                        .get_or_insert_with(Default::default)
                        .local_maxima_window = Some(parse_value(key, value_str)?);
                }
                "filtering.min-peaks" => {
                    self.filtering.get_or_insert_with(Default::default).min_peaks =
                        Some(parse_value(key, value_str)?);
                }
                "clustering.enabled" => {
                    self.clustering.get_or_insert_with(Default::default).enabled =
                        Some(parse_value(key, value_str)?);
                }
                "clustering.score-threshold" => {
                    self.clustering.get_or_insert_with(Default::default).score_threshold =
                        Some(parse_value(key, value_str)?);
                }
                "clustering.rt-tolerance" => {
                    self.clustering.get_or_insert_with(Default::default).rt_tolerance =
                        Some(parse_value(key, value_str)?);
                }
                "clustering.ms1-tolerance" => {
                    self.clustering.get_or_insert_with(Default::default).ms1_tolerance =
                        Some(parse_value(key, value_str)?);
                }
                "network.score-threshold" => {
                    self.network.get_or_insert_with(Default::default).score_threshold =
                        Some(parse_value(key, value_str)?);
                }
                "network.top-k" => {
                    self.network.get_or_insert_with(Default::default).top_k =
                        Some(parse_value(key, value_str)?);
                }
                "network.max-mass-shift" => {
                    self.network.get_or_insert_with(Default::default).max_mass_shift =
                        Some(parse_value(key, value_str)?);
                }
                "network.max-family-size" => {
                    self.network.get_or_insert_with(Default::default).max_family_size =
                        Some(parse_value(key, value_str)?);
                }
                "network.min-cluster-size" => {
                    self.network.get_or_insert_with(Default::default).min_cluster_size =
                        Some(parse_value(key, value_str)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Resolves the `match` command's search parameters from its flags and the defaults.
pub fn resolve_match_params(args: &MatchArgs) -> (LibrarySearchParams, ScoringMethod) {
    let defaults = DefaultsConfig::default();
    let params = LibrarySearchParams {
        precursor_tolerance: args
            .precursor_tolerance
            .unwrap_or(defaults.precursor_tolerance),
        fragment_tolerance: args.tolerance.unwrap_or(defaults.tolerance),
        min_match: args.min_match.unwrap_or(defaults.min_match),
        score_threshold: args
            .score_threshold
            .unwrap_or(defaults.library_score_threshold),
    };
    (params, args.method.unwrap_or(defaults.method))
}

fn parse_method(name: &str) -> Result<ScoringMethod> {
    ScoringMethod::from_str(name).map_err(|e| CliError::Config(e.to_string()))
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}
