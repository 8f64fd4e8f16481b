use thiserror::Error;

use super::config::ConfigError;
use super::graph::GraphError;
use crate::core::library::LibraryError;
use crate::core::models::spectrum::SpectrumError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Spectrum preprocessing failed: {source}")]
    Spectrum {
        #[from]
        source: SpectrumError,
    },

    #[error("Graph operation failed: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Library search failed: {source}")]
    Library {
        #[from]
        source: LibraryError,
    },

    #[error("Similarity function returned invalid score {score} for {context}")]
    InvalidScore { score: f64, context: String },

    #[error(
        "Component with {n_nodes} clusters exceeds the maximum family size of {max_size} \
         and has no edge left to remove"
    )]
    UnsplittableComponent { n_nodes: usize, max_size: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
