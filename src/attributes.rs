//! Named-value assignment for `<scan>` elements.
//!
//! Scan attributes, child element text and child attributes all arrive as
//! `(name, value)` pairs in arbitrary order. [`ScanBuilder`] accumulates
//! them and only decodes the peak payload in [`ScanBuilder::build`], once
//! both `peaksCount` and the `<peaks>` text are known.

use std::str::FromStr;

use crate::error::{MzXmlError, Result};
use crate::models::{Polarity, Scan};
use crate::peaks::{decode_peaks_with, PeakCompression, PeakPrecision};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanBuilder {
    scan: Scan,
    peaks_count: Option<usize>,
    peaks_text: Option<String>,
    compression: PeakCompression,
    precision: PeakPrecision,
}

impl ScanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a recognized mzXML attribute or child element value.
    ///
    /// Unknown names are ignored. A known name whose value does not parse
    /// is an [`MzXmlError::InvalidValue`].
    pub fn apply_named_value(&mut self, name: &str, value: &str) -> Result<()> {
        let scan = &mut self.scan;
        match name {
            "num" => scan.scan_number = parse_value(name, value)?,
            "msLevel" => scan.ms_order = parse_value(name, value)?,
            "peaksCount" => self.peaks_count = Some(parse_value(name, value)?),
            "peaks" => self.peaks_text = Some(value.to_string()),
            "compressionType" => {
                self.compression =
                    PeakCompression::from_mzxml(value).ok_or_else(|| invalid(name, value))?
            }
            "precision" => {
                self.precision =
                    PeakPrecision::from_mzxml(value).ok_or_else(|| invalid(name, value))?
            }
            // Peak payloads are always big-endian
            "byteOrder" if value != "network" => return Err(invalid(name, value)),
            "polarity" => {
                scan.polarity = match value {
                    "+" => Polarity::Positive,
                    "-" => Polarity::Negative,
                    "any" | "" => Polarity::Unknown,
                    _ => return Err(invalid(name, value)),
                }
            }
            "retentionTime" => {
                scan.retention_time =
                    Some(parse_duration_seconds(value).ok_or_else(|| invalid(name, value))?)
            }
            "centroided" => {
                scan.centroided = Some(match value {
                    "1" | "true" => true,
                    "0" | "false" => false,
                    _ => return Err(invalid(name, value)),
                })
            }
            "scanType" => scan.scan_type = Some(value.to_string()),
            "filterLine" => scan.filter_line = Some(value.to_string()),
            "lowMz" => scan.low_mz = Some(parse_value(name, value)?),
            "highMz" => scan.high_mz = Some(parse_value(name, value)?),
            "basePeakMz" => scan.base_peak_mz = Some(parse_value(name, value)?),
            "basePeakIntensity" => scan.base_peak_intensity = Some(parse_value(name, value)?),
            "totIonCurrent" => scan.total_ion_current = Some(parse_value(name, value)?),
            "collisionEnergy" => scan.collision_energy = Some(parse_value(name, value)?),
            "precursorMz" => scan.precursor_mz = Some(parse_value(name, value)?),
            "precursorScanNum" => {
                scan.precursor_master_scan_number = Some(parse_value(name, value)?)
            }
            "precursorIntensity" => scan.precursor_intensity = Some(parse_value(name, value)?),
            "precursorCharge" => scan.precursor_charge = Some(parse_value(name, value)?),
            "activationMethod" => scan.activation_method = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    pub fn scan_number(&self) -> u32 {
        self.scan.scan_number
    }

    /// Finish the scan, decoding its peaks if a payload was seen.
    pub fn build(self) -> Result<Scan> {
        let mut scan = self.scan;
        if let Some(text) = self.peaks_text {
            let count = match self.peaks_count {
                Some(count) => count,
                None if text.trim() == crate::peaks::EMPTY_PEAKS => 0,
                None => return Err(MzXmlError::MissingPeaksCount(scan.scan_number)),
            };
            scan.centroids = decode_peaks_with(&text, count, self.compression, self.precision)
                .map_err(|source| MzXmlError::PeakError {
                    scan: scan.scan_number,
                    source,
                })?;
        }
        Ok(scan)
    }
}

fn invalid(name: &str, value: &str) -> MzXmlError {
    MzXmlError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

/// Parse an xs:duration such as `PT12.5S` or `PT3.2M` into seconds.
///
/// A bare number is taken as seconds.
pub fn parse_duration_seconds(value: &str) -> Option<f64> {
    let value = value.trim();
    let Some(body) = value.strip_prefix("PT") else {
        return value.parse().ok();
    };

    let mut seconds = 0.0;
    let mut units = 0;
    let mut number = String::new();
    for c in body.chars() {
        let unit = match c {
            'H' => 3600.0,
            'M' => 60.0,
            'S' => 1.0,
            _ => {
                number.push(c);
                continue;
            }
        };
        seconds += number.parse::<f64>().ok()? * unit;
        units += 1;
        number.clear();
    }
    if units > 0 && number.is_empty() {
        Some(seconds)
    } else {
        None
    }
}

pub fn format_duration_seconds(seconds: f64) -> String {
    format!("PT{}S", seconds)
}
