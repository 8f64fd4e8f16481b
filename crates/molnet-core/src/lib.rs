//! # Molnet Core Library
//!
//! Builds molecular networks from MS2 spectra: near-duplicate spectra are grouped into
//! clusters, clusters are connected by spectral similarity, and the resulting graph is
//! cut into size-bounded connected components ("molecular families").
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Spectrum`, `Cluster`,
//!   `MolecularFamily`), the spectrum filtering pipeline, the similarity-function seam
//!   with two reference scorers, the in-memory spectral library, and file I/O.
//!
//! - **[`engine`]: The Logic Core.** Configuration, errors, progress reporting, the
//!   incremental clusterer, the similarity graph with mutual top-k filtering, pairwise
//!   graph construction and the size-bounded partitioner.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that chain the engine
//!   phases, such as turning a list of spectra into molecular families.

pub mod core;
pub mod engine;
pub mod workflows;
