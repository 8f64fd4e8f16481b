//! Compute-heavy steps of the networking pipeline.
//!
//! Each task is a free `run` function taking explicit configuration and a progress
//! reporter. The quadratic pairwise scoring is the only task that fans out over threads.

pub mod pairwise;
