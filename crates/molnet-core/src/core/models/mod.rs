//! Data models for molecular networking.
//!
//! A [`spectrum::Spectrum`] is a single measured peak list. Near-duplicate spectra are
//! grouped into a [`cluster::Cluster`], represented by its most intense member. The
//! terminal output of the pipeline is a [`family::MolecularFamily`]: one connected,
//! size-bounded component of the cluster similarity graph.
//!
//! Clusters own their member spectra; families and graphs refer to clusters only
//! through their [`ids::ClusterId`], resolved through the owning cluster list.

pub mod cluster;
pub mod family;
pub mod ids;
pub mod spectrum;
