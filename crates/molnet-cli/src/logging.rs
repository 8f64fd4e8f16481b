use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// `-q` silences everything; each `-v` lowers the threshold by one level from WARN.
fn console_level(verbosity: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbosity) {
        (true, _) => LevelFilter::OFF,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber: compact coloured output on stderr plus, when
/// `log_file` is given, an uncoloured copy with thread ids and targets.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = log_file
        .map(|path| {
            File::create(path).map(|file| {
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_target(true)
            })
        })
        .transpose()
        .map_err(CliError::Io)?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(console_level(verbosity, quiet))
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
