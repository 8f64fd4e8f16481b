//! # Workflows Module
//!
//! End-to-end procedures built from the engine phases.
//!
//! ## Overview
//!
//! Workflows are the entry points meant for applications. Each one validates its
//! configuration, runs the engine phases in order, reports progress, and hands back
//! plain result values that the I/O layer can export.
//!
//! - **Network Workflow** ([`network`]) - Spectra to clusters to molecular families
//! - **Library Workflow** ([`library`]) - Spectral library search and cluster annotation

pub mod library;
pub mod network;
