pub mod matching;
pub mod network;

use crate::error::{CliError, Result};
use molnet::core::io::mgf::MgfFile;
use molnet::core::io::traits::SpectrumFile;
use molnet::core::models::spectrum::Spectrum;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads and concatenates the spectra of every MGF file, in argument order.
fn read_spectra(paths: &[PathBuf]) -> Result<Vec<Spectrum>> {
    let mut spectra = Vec::new();
    for path in paths {
        let mut read = MgfFile::read_from_path(path).map_err(|e| CliError::FileParsing {
            path: path.clone(),
            source: e.into(),
        })?;
        info!("Read {} spectra from {:?}", read.len(), path);
        spectra.append(&mut read);
    }
    Ok(spectra)
}

/// `out/run` + `_nodes.csv` -> `out/run_nodes.csv`.
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Creates `path` (and its parent directory) and hands a buffered writer to `write`.
fn write_output<E>(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::result::Result<(), E>,
) -> Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let to_cli_error = |source: anyhow::Error| CliError::FileWriting {
        path: path.to_path_buf(),
        source,
    };
    write(&mut writer).map_err(|e| to_cli_error(e.into()))?;
    writer.flush().map_err(|e| to_cli_error(e.into()))?;
    info!("Wrote {:?}", path);
    Ok(())
}
