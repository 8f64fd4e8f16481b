use crate::core::scoring::SimilarityFunction;
use crate::core::scoring::cosine::{Cosine, ShiftedCosine};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use crate::core::processing::{FilterConfig, LocalMaxima};

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("Unknown scoring method '{0}' (expected 'cosine' or 'shifted-cosine')")]
    UnknownMethod(String),
}

fn invalid(name: &'static str, value: impl fmt::Display, reason: &'static str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        value: value.to_string(),
        reason,
    }
}

fn check_tolerance(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must be a finite, non-negative number"))
    }
}

fn check_unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, value, "must lie within [0, 1]"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMethod {
    Cosine,
    #[default]
    ShiftedCosine,
}

impl ScoringMethod {
    /// The built-in similarity function implementing this method.
    pub fn similarity(&self) -> &'static dyn SimilarityFunction {
        match self {
            ScoringMethod::Cosine => &Cosine,
            ScoringMethod::ShiftedCosine => &ShiftedCosine,
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMethod::Cosine => write!(f, "cosine"),
            ScoringMethod::ShiftedCosine => write!(f, "shifted-cosine"),
        }
    }
}

impl FromStr for ScoringMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(ScoringMethod::Cosine),
            "shifted-cosine" | "shifted_cosine" | "fast-gnps" => Ok(ScoringMethod::ShiftedCosine),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

/// Parameters passed to every similarity function call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringConfig {
    /// Fragment mass tolerance for matching two peaks.
    pub tolerance: f64,
    pub min_match: usize,
    pub method: ScoringMethod,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.2,
            min_match: 2,
            method: ScoringMethod::ShiftedCosine,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_tolerance("tolerance", self.tolerance)
    }
}

/// Greedy incremental clustering of near-duplicate spectra.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusteringConfig {
    /// When false every spectrum becomes its own cluster.
    pub enabled: bool,
    pub score_threshold: f64,
    /// Retention time window in seconds (exclusive).
    pub rt_tolerance: f64,
    /// Parent mass window for candidate clusters (inclusive).
    pub ms1_tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            score_threshold: 0.95,
            rt_tolerance: 1e6,
            ms1_tolerance: 0.02,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("clustering.score_threshold", self.score_threshold)?;
        check_tolerance("rt_tolerance", self.rt_tolerance)?;
        check_tolerance("ms1_tolerance", self.ms1_tolerance)
    }
}

/// Graph construction and partitioning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkConfig {
    /// Minimum similarity for an edge.
    pub score_threshold: f64,
    /// Mutual top-k neighbour limit.
    pub top_k: usize,
    /// Pairs whose parent masses differ by this much or more are never scored.
    pub max_mass_shift: f64,
    /// Upper bound on the number of clusters in one family.
    pub max_family_size: usize,
    /// Clusters with fewer spectra are left out of the network.
    pub min_cluster_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            top_k: 10,
            max_mass_shift: 100.0,
            max_family_size: 100,
            min_cluster_size: 1,
        }
    }
}

impl NetworkConfig {
    /// `max_family_size >= 1` guarantees partitioning always terminates: any component
    /// above the bound has at least two nodes and therefore an edge to remove.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("network.score_threshold", self.score_threshold)?;
        check_tolerance("max_mass_shift", self.max_mass_shift)?;
        if self.top_k == 0 {
            return Err(invalid("top_k", self.top_k, "must be at least 1"));
        }
        if self.max_family_size == 0 {
            return Err(invalid("max_family_size", self.max_family_size, "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub scoring: ScoringConfig,
    pub filtering: FilterConfig,
    pub clustering: ClusteringConfig,
    pub network: NetworkConfig,
    /// Clusters containing a spectrum from one of these sources are dropped (e.g. blanks).
    pub excluded_sources: Vec<String>,
}

impl WorkflowConfig {
    /// Flat `key,value` description of the run, in a stable order.
    pub fn parameter_rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("method", self.scoring.method.to_string()),
            ("tolerance", self.scoring.tolerance.to_string()),
            ("min_match", self.scoring.min_match.to_string()),
            ("score_threshold", self.network.score_threshold.to_string()),
            ("top_k", self.network.top_k.to_string()),
            ("max_mass_shift", self.network.max_mass_shift.to_string()),
            ("max_family_size", self.network.max_family_size.to_string()),
            ("min_cluster_size", self.network.min_cluster_size.to_string()),
            ("clustering", self.clustering.enabled.to_string()),
            (
                "cluster_score_threshold",
                self.clustering.score_threshold.to_string(),
            ),
            ("rt_tolerance", self.clustering.rt_tolerance.to_string()),
            ("ms1_tolerance", self.clustering.ms1_tolerance.to_string()),
            ("min_peaks", self.filtering.min_peaks.to_string()),
        ];
        let optional = [
            ("normalize_max", self.filtering.normalize_max),
            ("min_intensity", self.filtering.min_intensity),
            ("precursor_tolerance", self.filtering.precursor_tolerance),
            ("top_fraction", self.filtering.top_fraction),
        ];
        rows.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v.to_string()))),
        );
        if let Some(LocalMaxima { k, window }) = self.filtering.local_maxima {
            rows.push(("local_maxima_k", k.to_string()));
            rows.push(("local_maxima_window", window.to_string()));
        }
        if !self.excluded_sources.is_empty() {
            rows.push(("excluded_sources", self.excluded_sources.join(";")));
        }
        rows.into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}

#[derive(Default)]
pub struct WorkflowConfigBuilder {
    tolerance: Option<f64>,
    min_match: Option<usize>,
    method: Option<ScoringMethod>,
    filtering: Option<FilterConfig>,
    clustering: Option<ClusteringConfig>,
    score_threshold: Option<f64>,
    top_k: Option<usize>,
    max_mass_shift: Option<f64>,
    max_family_size: Option<usize>,
    min_cluster_size: Option<usize>,
    excluded_sources: Vec<String>,
}

impl WorkflowConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn min_match(mut self, min_match: usize) -> Self {
        self.min_match = Some(min_match);
        self
    }
    pub fn method(mut self, method: ScoringMethod) -> Self {
        self.method = Some(method);
        self
    }
    pub fn filtering(mut self, filtering: FilterConfig) -> Self {
        self.filtering = Some(filtering);
        self
    }
    pub fn clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = Some(clustering);
        self
    }
    pub fn score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }
    pub fn max_mass_shift(mut self, shift: f64) -> Self {
        self.max_mass_shift = Some(shift);
        self
    }
    pub fn max_family_size(mut self, beta: usize) -> Self {
        self.max_family_size = Some(beta);
        self
    }
    pub fn min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = Some(size);
        self
    }
    pub fn exclude_source(mut self, source: impl Into<String>) -> Self {
        self.excluded_sources.push(source.into());
        self
    }

    /// Assembles and validates the configuration.
    ///
    /// Tolerance, score threshold and top-k are required; everything else falls back to
    /// its default.
    pub fn build(self) -> Result<WorkflowConfig, ConfigError> {
        let scoring = ScoringConfig {
            tolerance: self
                .tolerance
                .ok_or(ConfigError::MissingParameter("tolerance"))?,
            min_match: self.min_match.unwrap_or(ScoringConfig::default().min_match),
            method: self.method.unwrap_or_default(),
        };
        let defaults = NetworkConfig::default();
        let network = NetworkConfig {
            score_threshold: self
                .score_threshold
                .ok_or(ConfigError::MissingParameter("score_threshold"))?,
            top_k: self.top_k.ok_or(ConfigError::MissingParameter("top_k"))?,
            max_mass_shift: self.max_mass_shift.unwrap_or(defaults.max_mass_shift),
            max_family_size: self.max_family_size.unwrap_or(defaults.max_family_size),
            min_cluster_size: self.min_cluster_size.unwrap_or(defaults.min_cluster_size),
        };
        let config = WorkflowConfig {
            scoring,
            filtering: self.filtering.unwrap_or_default(),
            clustering: self.clustering.unwrap_or_default(),
            network,
            excluded_sources: self.excluded_sources,
        };
        config.scoring.validate()?;
        config.clustering.validate()?;
        config.network.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder::new()
            .tolerance(0.2)
            .score_threshold(0.7)
            .top_k(10)
    }

    #[test]
    fn builder_fills_defaults() {
        let config = complete_builder().build().unwrap();
        assert_eq!(config.scoring.min_match, 2);
        assert_eq!(config.scoring.method, ScoringMethod::ShiftedCosine);
        assert_eq!(config.network.max_family_size, 100);
        assert!(!config.clustering.enabled);
        assert_eq!(config.filtering, FilterConfig::default());
    }

    #[test]
    fn builder_reports_missing_parameters() {
        let result = WorkflowConfigBuilder::new().tolerance(0.2).top_k(3).build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingParameter("score_threshold")
        );
    }

    #[test]
    fn builder_rejects_invalid_values() {
        let zero_k = complete_builder().top_k(0).build();
        assert!(matches!(
            zero_k,
            Err(ConfigError::InvalidParameter { name: "top_k", .. })
        ));

        let zero_beta = complete_builder().max_family_size(0).build();
        assert!(matches!(
            zero_beta,
            Err(ConfigError::InvalidParameter {
                name: "max_family_size",
                ..
            })
        ));

        let negative = complete_builder().tolerance(-0.1).build();
        assert!(matches!(
            negative,
            Err(ConfigError::InvalidParameter {
                name: "tolerance",
                ..
            })
        ));

        let threshold = complete_builder().score_threshold(1.2).build();
        assert!(threshold.is_err());
    }

    #[test]
    fn scoring_method_parses_and_displays() {
        assert_eq!("cosine".parse::<ScoringMethod>().unwrap(), ScoringMethod::Cosine);
        assert_eq!(
            "Shifted-Cosine".parse::<ScoringMethod>().unwrap(),
            ScoringMethod::ShiftedCosine
        );
        assert!(matches!(
            "dot".parse::<ScoringMethod>(),
            Err(ConfigError::UnknownMethod(_))
        ));
        assert_eq!(ScoringMethod::ShiftedCosine.to_string(), "shifted-cosine");
    }

    #[test]
    fn parameter_rows_include_optional_filters() {
        let mut config = complete_builder().exclude_source("blank.mzML").build().unwrap();
        config.filtering.precursor_tolerance = Some(17.0);
        let rows = config.parameter_rows();

        assert_eq!(rows[0], ("method".to_string(), "shifted-cosine".to_string()));
        assert!(rows.contains(&("precursor_tolerance".to_string(), "17".to_string())));
        assert!(rows.contains(&("excluded_sources".to_string(), "blank.mzML".to_string())));
        assert!(!rows.iter().any(|(key, _)| key == "top_fraction"));
    }
}
