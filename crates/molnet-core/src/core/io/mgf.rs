use crate::core::io::traits::SpectrumFile;
use crate::core::models::cluster::Cluster;
use crate::core::models::family::MolecularFamily;
use crate::core::models::ids::ClusterId;
use crate::core::models::spectrum::{Annotation, Peak, Spectrum, SpectrumError};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MgfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: MgfParseErrorKind },
    #[error("Block starting on line {line} is missing required record: {record}")]
    MissingRecord { line: usize, record: &'static str },
    #[error("Block starting on line {line} is not a valid spectrum: {source}")]
    InvalidSpectrum {
        line: usize,
        #[source]
        source: SpectrumError,
    },
    #[error("Cluster {0} is referenced by a family but missing from the cluster list")]
    UnknownCluster(ClusterId),
}

#[derive(Debug, Error)]
pub enum MgfParseErrorKind {
    #[error("Invalid number for {key} (value: '{value}')")]
    InvalidNumber { key: String, value: String },
    #[error("Invalid charge '{0}'")]
    InvalidCharge(String),
    #[error("Invalid peak line '{0}'")]
    InvalidPeak(String),
    #[error("Invalid peak '{content}': {source}")]
    InvalidPeakValue {
        content: String,
        #[source]
        source: SpectrumError,
    },
    #[error("BEGIN IONS inside an open block")]
    NestedBlock,
    #[error("END IONS without a matching BEGIN IONS")]
    UnexpectedEnd,
    #[error("File ended inside an ion block")]
    UnterminatedBlock,
}

const COMMENT_PREFIXES: [char; 4] = ['#', ';', '!', '/'];

/// Mascot Generic Format: `BEGIN IONS` / `END IONS` blocks of `KEY=VALUE` headers
/// followed by one `mass intensity` line per peak.
pub struct MgfFile;

#[derive(Debug, Default)]
struct BlockBuilder {
    start_line: usize,
    peaks: Vec<Peak>,
    precursor_mz: Option<f64>,
    parent_mz: Option<f64>,
    precursor_intensity: Option<f64>,
    retention_time: Option<f64>,
    charge: Option<i32>,
    scan_number: Option<usize>,
    source: Option<String>,
    compound_name: Option<String>,
    spectrum_id: Option<String>,
}

impl BlockBuilder {
    fn new(start_line: usize) -> Self {
        Self {
            start_line,
            ..Default::default()
        }
    }

    fn apply_header(&mut self, line: usize, key: &str, value: &str) -> Result<(), MgfError> {
        match key {
            "PEPMASS" => {
                let mut tokens = value.split_whitespace();
                let mz = tokens.next().unwrap_or("");
                self.precursor_mz = Some(parse_number(line, key, mz)?);
                if let Some(intensity) = tokens.next() {
                    self.precursor_intensity = Some(parse_number(line, key, intensity)?);
                }
            }
            "PARENTMASS" => self.parent_mz = Some(parse_number(line, key, value)?),
            "RTINSECONDS" => self.retention_time = Some(parse_number(line, key, value)?),
            "CHARGE" => self.charge = Some(parse_charge(line, value)?),
            "SCANS" | "SCANNO" => {
                let first = value.split([',', '-']).next().unwrap_or("").trim();
                self.scan_number =
                    Some(first.parse().map_err(|_| invalid_number(line, key, value))?);
            }
            "FILENAME" => self.source = Some(value.to_string()),
            "NAME" | "COMPOUND_NAME" => self.compound_name = Some(value.to_string()),
            "SPECTRUMID" => self.spectrum_id = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    fn finish(self, default_source: &str, default_scan: usize) -> Result<Spectrum, MgfError> {
        let precursor_mz = self.precursor_mz.ok_or(MgfError::MissingRecord {
            line: self.start_line,
            record: "PEPMASS",
        })?;
        let mut spectrum = Spectrum::new(
            self.peaks,
            self.source.unwrap_or_else(|| default_source.to_string()),
            self.scan_number.unwrap_or(default_scan),
            precursor_mz,
            self.parent_mz.unwrap_or(precursor_mz),
        )
        .map_err(|source| MgfError::InvalidSpectrum {
            line: self.start_line,
            source,
        })?;
        spectrum.retention_time = self.retention_time;
        spectrum.precursor_intensity = self.precursor_intensity;
        spectrum.charge = self.charge;
        if self.compound_name.is_some() || self.spectrum_id.is_some() {
            spectrum.annotations.push(Annotation {
                compound_name: self.compound_name,
                spectrum_id: self.spectrum_id,
                score: None,
            });
        }
        Ok(spectrum)
    }
}

impl SpectrumFile for MgfFile {
    type Error = MgfError;

    fn read_from(
        reader: &mut impl BufRead,
        default_source: &str,
    ) -> Result<Vec<Spectrum>, Self::Error> {
        let mut spectra = Vec::new();
        let mut block: Option<BlockBuilder> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let raw = line_res?;
            let line_num = line_num + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with(COMMENT_PREFIXES) {
                continue;
            }

            match line {
                "BEGIN IONS" => {
                    if block.is_some() {
                        return Err(parse_error(line_num, MgfParseErrorKind::NestedBlock));
                    }
                    block = Some(BlockBuilder::new(line_num));
                }
                "END IONS" => {
                    let finished = block
                        .take()
                        .ok_or_else(|| parse_error(line_num, MgfParseErrorKind::UnexpectedEnd))?;
                    spectra.push(finished.finish(default_source, spectra.len() + 1)?);
                }
                _ => {
                    let Some(current) = block.as_mut() else {
                        continue;
                    };
                    let is_header = line.starts_with(|c: char| c.is_ascii_alphabetic());
                    if let (true, Some((key, value))) = (is_header, line.split_once('=')) {
                        current.apply_header(
                            line_num,
                            &key.trim().to_ascii_uppercase(),
                            value.trim(),
                        )?;
                    } else {
                        current.peaks.push(parse_peak(line_num, line)?);
                    }
                }
            }
        }

        if let Some(open) = block {
            return Err(parse_error(
                open.start_line,
                MgfParseErrorKind::UnterminatedBlock,
            ));
        }
        Ok(spectra)
    }

    fn write_to(spectra: &[Spectrum], writer: &mut impl Write) -> Result<(), Self::Error> {
        for spectrum in spectra {
            writeln!(writer, "BEGIN IONS")?;
            writeln!(writer, "FILENAME={}", spectrum.source)?;
            writeln!(writer, "SCANS={}", spectrum.scan_number)?;
            write_precursor_fields(writer, spectrum)?;
            if let Some(annotation) = spectrum.best_annotation() {
                if let Some(name) = &annotation.compound_name {
                    writeln!(writer, "NAME={}", name)?;
                }
                if let Some(id) = &annotation.spectrum_id {
                    writeln!(writer, "SPECTRUMID={}", id)?;
                }
            }
            write_peaks(writer, spectrum)?;
        }
        Ok(())
    }
}

impl MgfFile {
    /// Writes the prototype of every family member, tagged with cluster and family ids.
    pub fn write_families(
        clusters: &[Cluster],
        families: &[MolecularFamily],
        writer: &mut impl Write,
    ) -> Result<(), MgfError> {
        let lookup: HashMap<ClusterId, &Cluster> = clusters.iter().map(|c| (c.id(), c)).collect();
        for family in families {
            for cluster_id in family.members() {
                let cluster = lookup
                    .get(cluster_id)
                    .ok_or(MgfError::UnknownCluster(*cluster_id))?;
                let prototype = cluster.prototype();
                writeln!(writer, "BEGIN IONS")?;
                writeln!(writer, "FILENAME={}", prototype.source)?;
                writeln!(writer, "SCANNO={}", prototype.scan_number)?;
                writeln!(writer, "CID={}", cluster.id())?;
                writeln!(writer, "FAMILYID={}", family.id())?;
                write_precursor_fields(writer, prototype)?;
                writeln!(writer, "NAME={}", cluster.id())?;
                write_peaks(writer, prototype)?;
            }
        }
        Ok(())
    }

    /// Writes one feature block per cluster prototype, keyed by cluster id.
    pub fn write_cluster_features(
        clusters: &[Cluster],
        writer: &mut impl Write,
    ) -> Result<(), MgfError> {
        for cluster in clusters {
            let prototype = cluster.prototype();
            writeln!(writer, "BEGIN IONS")?;
            writeln!(writer, "FEATURE_ID={}", cluster.id())?;
            writeln!(writer, "PEPMASS={}", prototype.precursor_mz)?;
            writeln!(writer, "SCANS={}", cluster.id())?;
            if let Some(rt) = prototype.retention_time {
                writeln!(writer, "RTINSECONDS={}", rt)?;
            }
            if let Some(charge) = prototype.charge {
                writeln!(writer, "CHARGE={}", charge)?;
            }
            writeln!(writer, "MSLEVEL=2")?;
            writeln!(writer, "FILENAME={}", prototype.source)?;
            write_peaks(writer, prototype)?;
        }
        Ok(())
    }
}

fn write_precursor_fields(writer: &mut impl Write, spectrum: &Spectrum) -> io::Result<()> {
    writeln!(writer, "PEPMASS={}", spectrum.precursor_mz)?;
    if spectrum.parent_mz != spectrum.precursor_mz {
        writeln!(writer, "PARENTMASS={}", spectrum.parent_mz)?;
    }
    if let Some(rt) = spectrum.retention_time {
        writeln!(writer, "RTINSECONDS={}", rt)?;
    }
    if let Some(charge) = spectrum.charge {
        writeln!(writer, "CHARGE={}", charge)?;
    }
    Ok(())
}

fn write_peaks(writer: &mut impl Write, spectrum: &Spectrum) -> io::Result<()> {
    for peak in spectrum.peaks() {
        writeln!(writer, "{} {}", peak.mz, peak.intensity)?;
    }
    writeln!(writer, "END IONS")?;
    writeln!(writer)
}

fn parse_error(line: usize, kind: MgfParseErrorKind) -> MgfError {
    MgfError::Parse { line, kind }
}

fn invalid_number(line: usize, key: &str, value: &str) -> MgfError {
    parse_error(
        line,
        MgfParseErrorKind::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        },
    )
}

fn parse_number(line: usize, key: &str, value: &str) -> Result<f64, MgfError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_number(line, key, value))
}

/// Accepts `2`, `2+`, `+2`, `2-` and `-2`; only the first of several listed charges is kept.
fn parse_charge(line: usize, value: &str) -> Result<i32, MgfError> {
    let token = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or("");
    let negative = token.contains('-');
    let digits = token.trim_matches(|c| c == '+' || c == '-');
    let magnitude: i32 = digits
        .parse()
        .map_err(|_| parse_error(line, MgfParseErrorKind::InvalidCharge(value.to_string())))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_peak(line: usize, content: &str) -> Result<Peak, MgfError> {
    let mut tokens = content.split_whitespace();
    let invalid = || parse_error(line, MgfParseErrorKind::InvalidPeak(content.to_string()));
    let mz: f64 = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(invalid)?;
    let intensity: f64 = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(invalid)?;
    let peak = Peak::new(mz, intensity);
    peak.validate().map_err(|source| {
        parse_error(
            line,
            MgfParseErrorKind::InvalidPeakValue {
                content: content.to_string(),
                source,
            },
        )
    })?;
    Ok(peak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::family::ScoreTriple;
    use crate::core::models::ids::FamilyId;
    use std::io::Cursor;

    const TWO_BLOCKS: &str = "\
# exported by an instrument vendor tool
BEGIN IONS
TITLE=first
PEPMASS=300.5 12000
CHARGE=2+
RTINSECONDS=61.5
SCANS=17
120.1 50
100.0 10
END IONS

BEGIN IONS
PEPMASS=410.25
FILENAME=sample_b.mzML
NAME=Caffeine
SPECTRUMID=CCMSLIB0001
200.0\t5.5
END IONS
";

    fn read(content: &str) -> Result<Vec<Spectrum>, MgfError> {
        MgfFile::read_from(&mut Cursor::new(content.as_bytes()), "default.mgf")
    }

    #[test]
    fn reads_headers_and_peaks() {
        let spectra = read(TWO_BLOCKS).unwrap();
        assert_eq!(spectra.len(), 2);

        let first = &spectra[0];
        assert_eq!(first.source, "default.mgf");
        assert_eq!(first.scan_number, 17);
        assert_eq!(first.precursor_mz, 300.5);
        assert_eq!(first.parent_mz, 300.5);
        assert_eq!(first.precursor_intensity, Some(12000.0));
        assert_eq!(first.charge, Some(2));
        assert_eq!(first.retention_time, Some(61.5));
        assert_eq!(first.peaks()[0], Peak::new(100.0, 10.0));
        assert_eq!(first.n_peaks(), 2);

        let second = &spectra[1];
        assert_eq!(second.source, "sample_b.mzML");
        assert_eq!(second.scan_number, 2);
        assert_eq!(second.charge, None);
        let annotation = second.best_annotation().unwrap();
        assert_eq!(annotation.compound_name.as_deref(), Some("Caffeine"));
        assert_eq!(annotation.spectrum_id.as_deref(), Some("CCMSLIB0001"));
    }

    #[test]
    fn negative_charges_are_parsed() {
        assert_eq!(parse_charge(1, "1-").unwrap(), -1);
        assert_eq!(parse_charge(1, "+3").unwrap(), 3);
        assert_eq!(parse_charge(1, "2+ and 3+").unwrap(), 2);
        assert!(parse_charge(1, "two").is_err());
    }

    #[test]
    fn missing_pepmass_is_reported() {
        let result = read("BEGIN IONS\n100 1\nEND IONS\n");
        assert!(matches!(
            result,
            Err(MgfError::MissingRecord {
                line: 1,
                record: "PEPMASS"
            })
        ));
    }

    #[test]
    fn malformed_peak_reports_line() {
        let result = read("BEGIN IONS\nPEPMASS=100\n100 abc\nEND IONS\n");
        assert!(matches!(
            result,
            Err(MgfError::Parse {
                line: 3,
                kind: MgfParseErrorKind::InvalidPeak(_)
            })
        ));
    }

    #[test]
    fn unbalanced_blocks_are_rejected() {
        assert!(matches!(
            read("END IONS\n"),
            Err(MgfError::Parse {
                kind: MgfParseErrorKind::UnexpectedEnd,
                ..
            })
        ));
        assert!(matches!(
            read("BEGIN IONS\nBEGIN IONS\n"),
            Err(MgfError::Parse {
                kind: MgfParseErrorKind::NestedBlock,
                ..
            })
        ));
        assert!(matches!(
            read("BEGIN IONS\nPEPMASS=1\n"),
            Err(MgfError::Parse {
                kind: MgfParseErrorKind::UnterminatedBlock,
                ..
            })
        ));
    }

    #[test]
    fn unterminated_block_reports_its_opening_line() {
        let content = "BEGIN IONS\nPEPMASS=1\n100 1\nEND IONS\n\n# second\nBEGIN IONS\nPEPMASS=2\n";
        assert!(matches!(
            read(content),
            Err(MgfError::Parse {
                line: 7,
                kind: MgfParseErrorKind::UnterminatedBlock
            })
        ));
    }

    #[test]
    fn negative_or_nan_intensity_reports_line() {
        for bad in ["100 -1", "100 NaN", "100 inf"] {
            let content = format!("BEGIN IONS\nPEPMASS=300\n200 4\n{bad}\nEND IONS\n");
            assert!(matches!(
                read(&content),
                Err(MgfError::Parse {
                    line: 4,
                    kind: MgfParseErrorKind::InvalidPeakValue {
                        source: SpectrumError::InvalidPeak { .. },
                        ..
                    }
                })
            ));
        }
    }

    #[test]
    fn written_spectra_can_be_read_back() {
        let spectra = read(TWO_BLOCKS).unwrap();
        let mut buffer = Vec::new();
        MgfFile::write_to(&spectra, &mut buffer).unwrap();

        let reread = read(std::str::from_utf8(&buffer).unwrap()).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread[0].peaks(), spectra[0].peaks());
        assert_eq!(reread[0].charge, Some(2));
        assert_eq!(reread[1].source, "sample_b.mzML");
    }

    #[test]
    fn family_export_tags_cluster_and_family() {
        let spectrum = Spectrum::new(vec![Peak::new(100.0, 5.0)], "run.mzML", 9, 250.5, 250.5)
            .unwrap()
            .with_retention_time(30.0)
            .with_charge(1);
        let clusters = vec![Cluster::new(spectrum, ClusterId(4))];
        let families = vec![MolecularFamily::new(FamilyId(2), vec![ClusterId(4)], vec![])];

        let mut buffer = Vec::new();
        MgfFile::write_families(&clusters, &families, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        for expected in [
            "BEGIN IONS",
            "FILENAME=run.mzML",
            "SCANNO=9",
            "CID=4",
            "FAMILYID=2",
            "PEPMASS=250.5",
            "RTINSECONDS=30",
            "CHARGE=1",
            "100 5",
            "END IONS",
        ] {
            assert!(text.lines().any(|l| l == expected), "missing line {expected}");
        }
    }

    #[test]
    fn family_export_rejects_unknown_members() {
        let families = vec![MolecularFamily::new(
            FamilyId(0),
            vec![ClusterId(1), ClusterId(2)],
            vec![ScoreTriple {
                cluster_a: ClusterId(1),
                cluster_b: ClusterId(2),
                score: 0.7,
            }],
        )];
        let mut buffer = Vec::new();
        let result = MgfFile::write_families(&[], &families, &mut buffer);
        assert!(matches!(result, Err(MgfError::UnknownCluster(ClusterId(1)))));
    }

    #[test]
    fn cluster_features_use_cluster_id_as_scan() {
        let spectrum =
            Spectrum::new(vec![Peak::new(100.0, 5.0)], "run.mzML", 9, 250.5, 250.5).unwrap();
        let clusters = vec![Cluster::new(spectrum, ClusterId(12))];
        let mut buffer = Vec::new();
        MgfFile::write_cluster_features(&clusters, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("FEATURE_ID=12\n"));
        assert!(text.contains("SCANS=12\n"));
        assert!(text.contains("MSLEVEL=2\n"));
    }
}
