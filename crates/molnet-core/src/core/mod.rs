//! # Core Module
//!
//! Fundamental building blocks for molecular networking: data models for spectra and
//! clusters, spectrum preprocessing, similarity scoring, spectral library matching and
//! file I/O.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Spectra, peaks, clusters, molecular families and identifiers
//! - **Preprocessing** ([`processing`]) - The ordered peak-filtering chain applied before scoring
//! - **Similarity Scoring** ([`scoring`]) - The `SimilarityFunction` seam and cosine scorers
//! - **Spectral Library** ([`library`]) - Precursor-windowed matching against reference spectra
//! - **File I/O** ([`io`]) - MGF reading/writing and delimited node/edge table export
//!
//! Everything in this layer is free of engine state: operations take explicit parameters
//! and report invalid ones through typed errors.

pub mod io;
pub mod library;
pub mod models;
pub mod processing;
pub mod scoring;
