//! # Engine Module
//!
//! The clustering and network-partitioning engine: everything between a list of
//! preprocessed spectra and the final list of molecular families.
//!
//! ## Overview
//!
//! Spectra are first grouped into clusters of near-duplicates by greedy incremental
//! clustering. Cluster prototypes are then compared pairwise within a parent-mass window
//! to build a weighted similarity graph, which is thinned by mutual top-k filtering.
//! Finally the graph is cut into connected components no larger than a configured
//! family size by repeatedly removing the weakest edge of oversized components.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Scoring, clustering and network parameters with validation
//! - **Clustering** ([`clustering`]) - First-match incremental clustering over a mass-sorted list
//! - **Similarity Graph** ([`graph`]) - Symmetric adjacency, top-k filtering and components
//! - **Partitioning** ([`partition`]) - Size-bounded splitting and family assembly
//! - **Tasks** ([`tasks`]) - Pairwise scoring, parallel when the `parallel` feature is on
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-level error aggregation
//!
//! The similarity function is always injected; the engine only validates that the
//! scores it returns lie in `[0, 1]`.

pub mod clustering;
pub mod config;
pub mod error;
pub mod graph;
pub mod partition;
pub mod progress;
pub mod tasks;
pub(crate) mod utils;
