use molnet::engine::config::ScoringMethod;

/// Built-in values used when neither a flag, a `--set` override nor the config file
/// provides one.
pub struct DefaultsConfig {
    pub tolerance: f64,
    pub min_match: usize,
    pub method: ScoringMethod,
    pub score_threshold: f64,
    pub top_k: usize,
    pub max_mass_shift: f64,
    pub max_family_size: usize,
    pub min_cluster_size: usize,
    pub cluster: bool,
    pub cluster_score_threshold: f64,
    pub rt_tolerance: f64,
    pub ms1_tolerance: f64,
    pub min_peaks: usize,
    pub precursor_tolerance: f64,
    pub library_score_threshold: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.2,
            min_match: 2,
            method: ScoringMethod::ShiftedCosine,
            score_threshold: 0.6,
            top_k: 10,
            max_mass_shift: 100.0,
            max_family_size: 100,
            min_cluster_size: 1,
            cluster: false,
            cluster_score_threshold: 0.95,
            rt_tolerance: 1e6,
            ms1_tolerance: 0.02,
            min_peaks: 1,
            precursor_tolerance: 0.2,
            library_score_threshold: 0.6,
        }
    }
}
