use crate::core::models::spectrum::Spectrum;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing spectrum file formats.
///
/// Implementors handle format-specific parsing and serialization of peak lists and
/// their acquisition metadata.
pub trait SpectrumFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every spectrum from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    /// * `default_source` - Source name for spectra that do not declare one.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(
        reader: &mut impl BufRead,
        default_source: &str,
    ) -> Result<Vec<Spectrum>, Self::Error>;

    /// Writes spectra to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(spectra: &[Spectrum], writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads every spectrum from a file path.
    ///
    /// The file name becomes the source of spectra that do not declare one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Spectrum>, Self::Error> {
        let path = path.as_ref();
        let default_source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, &default_source)
    }

    /// Writes spectra to a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(spectra: &[Spectrum], path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(spectra, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
