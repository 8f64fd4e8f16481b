//! Reading spectra from disk and exporting network results.
//!
//! Spectra come in as MGF ion blocks ([`mgf`]); networks go out as delimited node,
//! edge and parameter tables ([`tables`]) plus an MGF file of cluster prototypes.

pub mod mgf;
pub mod tables;
pub mod traits;
