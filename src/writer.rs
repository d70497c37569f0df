//! mzXML emission.
//!
//! The document is rendered into memory first so that the `<index>` offsets
//! are exact byte positions, then written to a temporary file beside the
//! destination and renamed into place.

use std::fs::{self, Permissions};
use std::io::Write;
use std::path::Path;

use log::{debug, info, warn};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tempfile::NamedTempFile;

use crate::attributes::format_duration_seconds;
use crate::config::Config;
use crate::error::{MzXmlError, Result};
use crate::models::{MzXmlRun, Polarity, Scan};
use crate::peaks::{encode_peaks_with, PeakCompression, PeakPrecision, EMPTY_PEAKS};

const MZXML_NS: &str = "http://sashimi.sourceforge.net/schema_revision/mzXML_3.2";
const MZXML_SCHEMA_LOCATION: &str = "http://sashimi.sourceforge.net/schema_revision/mzXML_3.2 http://sashimi.sourceforge.net/schema_revision/mzXML_3.2/mzXML_idx_3.2.xsd";

/// Write `run` to `path`.
///
/// Returns `Ok(false)` after logging a warning when the destination is
/// missing or cannot be written; in that case no partial file is left
/// behind. An existing destination keeps its permissions, a new one gets
/// `0o644` on Unix.
pub fn write_mzxml<P: AsRef<Path>>(path: P, run: &MzXmlRun, config: &Config) -> Result<bool> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if path.as_os_str().is_empty() || !dir.is_dir() {
        warn!("No file at that location: {}", path.display());
        return Ok(false);
    }

    let document = render_mzxml(run, config)?;

    let permissions = match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    };
    let persisted = NamedTempFile::new_in(dir)
        .and_then(|mut tmp| {
            tmp.write_all(&document)?;
            tmp.flush()?;
            if let Some(permissions) = permissions {
                tmp.as_file().set_permissions(permissions)?;
            }
            Ok(tmp)
        })
        .and_then(|tmp| tmp.persist(path).map_err(|e| e.error));
    match persisted {
        Ok(_) => {
            info!("Finished writing mzXML: {}", path.display());
            Ok(true)
        }
        Err(e) => {
            warn!("Could not write {}: {}", path.display(), e);
            Ok(false)
        }
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

/// Render `run` as a complete indexed mzXML document
pub fn render_mzxml(run: &MzXmlRun, config: &Config) -> Result<Vec<u8>> {
    let mut writer = MzXmlWriter::new(config.peak_compression());
    writer.write_header(run, &config.parent_file_type)?;
    for scan in &run.scans {
        writer.write_scan(scan)?;
    }
    writer.finish()
}

struct MzXmlWriter {
    handle: Writer<Vec<u8>>,
    compression: PeakCompression,
    offsets: Vec<(u32, u64)>,
}

impl MzXmlWriter {
    fn new(compression: PeakCompression) -> Self {
        Self {
            handle: Writer::new_with_indent(Vec::new(), b' ', 2),
            compression,
            offsets: Vec::new(),
        }
    }

    /// Byte offset of the most recently written start tag
    fn last_tag_offset(&self) -> u64 {
        let bytes = self.handle.get_ref();
        bytes.iter().rposition(|&b| b == b'<').unwrap_or(0) as u64
    }

    fn write_header(&mut self, run: &MzXmlRun, parent_file_type: &str) -> Result<()> {
        let header = &run.header;
        self.handle
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("mzXML");
        root.push_attribute(("xmlns", MZXML_NS));
        root.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        root.push_attribute(("xsi:schemaLocation", MZXML_SCHEMA_LOCATION));
        self.handle.write_event(Event::Start(root))?;

        let mut ms_run = BytesStart::new("msRun");
        let scan_count = run.scans.len().to_string();
        let start_time = format_duration_seconds(header.start_time as f64 * 60.0);
        let end_time = format_duration_seconds(header.end_time as f64 * 60.0);
        ms_run.push_attribute(("scanCount", scan_count.as_str()));
        ms_run.push_attribute(("startTime", start_time.as_str()));
        ms_run.push_attribute(("endTime", end_time.as_str()));
        self.handle.write_event(Event::Start(ms_run))?;

        let mut parent_file = BytesStart::new("parentFile");
        parent_file.push_attribute(("fileName", header.file_name.as_str()));
        parent_file.push_attribute(("fileType", parent_file_type));
        parent_file.push_attribute(("fileSha1", ""));
        self.handle.write_event(Event::Empty(parent_file))?;

        let mut instrument = BytesStart::new("msInstrument");
        instrument.push_attribute(("msInstrumentID", "1"));
        self.handle.write_event(Event::Start(instrument))?;
        for (tag, value) in [
            ("msManufacturer", &header.instrument_manufacturer),
            ("msModel", &header.instrument_model),
        ] {
            let mut elt = BytesStart::new(tag);
            elt.push_attribute(("category", tag));
            elt.push_attribute(("value", value.as_str()));
            self.handle.write_event(Event::Empty(elt))?;
        }
        self.handle
            .write_event(Event::End(BytesEnd::new("msInstrument")))?;
        Ok(())
    }

    fn write_scan(&mut self, scan: &Scan) -> Result<()> {
        let mut attrs: Vec<(&str, String)> = vec![
            ("num", scan.scan_number.to_string()),
            ("msLevel", scan.ms_order.to_string()),
            ("peaksCount", scan.peak_count().to_string()),
        ];
        if scan.polarity != Polarity::Unknown {
            attrs.push(("polarity", scan.polarity.as_mzxml().to_string()));
        }
        if let Some(scan_type) = &scan.scan_type {
            attrs.push(("scanType", scan_type.clone()));
        }
        if let Some(filter_line) = &scan.filter_line {
            attrs.push(("filterLine", filter_line.clone()));
        }
        if let Some(centroided) = scan.centroided {
            attrs.push(("centroided", if centroided { "1" } else { "0" }.to_string()));
        }
        if let Some(rt) = scan.retention_time {
            attrs.push(("retentionTime", format_duration_seconds(rt)));
        }
        for (name, value) in [
            ("collisionEnergy", scan.collision_energy),
            ("lowMz", scan.low_mz),
            ("highMz", scan.high_mz),
            ("basePeakMz", scan.base_peak_mz),
            ("basePeakIntensity", scan.base_peak_intensity),
            ("totIonCurrent", scan.total_ion_current),
        ] {
            if let Some(value) = value {
                attrs.push((name, value.to_string()));
            }
        }

        let mut elt = BytesStart::new("scan");
        for (name, value) in &attrs {
            elt.push_attribute((*name, value.as_str()));
        }
        self.handle.write_event(Event::Start(elt))?;
        let offset = self.last_tag_offset();
        self.offsets.push((scan.scan_number, offset));
        debug!("Scan {} at byte {}", scan.scan_number, offset);

        if scan.precursor_mz.is_some() || scan.precursor_master_scan_number.is_some() {
            self.write_precursor(scan)?;
        }
        self.write_peaks(scan)?;

        self.handle.write_event(Event::End(BytesEnd::new("scan")))?;
        Ok(())
    }

    fn write_precursor(&mut self, scan: &Scan) -> Result<()> {
        let mut elt = BytesStart::new("precursorMz");
        let scan_num = scan.precursor_master_scan_number.map(|n| n.to_string());
        let intensity = scan.precursor_intensity.map(|v| v.to_string());
        let charge = scan.precursor_charge.map(|z| z.to_string());
        if let Some(v) = &scan_num {
            elt.push_attribute(("precursorScanNum", v.as_str()));
        }
        if let Some(v) = &intensity {
            elt.push_attribute(("precursorIntensity", v.as_str()));
        }
        if let Some(v) = &charge {
            elt.push_attribute(("precursorCharge", v.as_str()));
        }
        if let Some(v) = &scan.activation_method {
            elt.push_attribute(("activationMethod", v.as_str()));
        }
        self.handle.write_event(Event::Start(elt))?;
        if let Some(mz) = scan.precursor_mz {
            self.handle
                .write_event(Event::Text(BytesText::new(&mz.to_string())))?;
        }
        self.handle
            .write_event(Event::End(BytesEnd::new("precursorMz")))?;
        Ok(())
    }

    fn write_peaks(&mut self, scan: &Scan) -> Result<()> {
        let (text, compression, compressed_len) = match &scan.centroids {
            Some(centroids) if !centroids.is_empty() => {
                let (text, len) =
                    encode_peaks_with(centroids, self.compression).map_err(|source| {
                        MzXmlError::PeakError {
                            scan: scan.scan_number,
                            source,
                        }
                    })?;
                (text, self.compression, len)
            }
            _ => (EMPTY_PEAKS.to_string(), PeakCompression::None, 0),
        };

        let compressed_len = compressed_len.to_string();
        let mut elt = BytesStart::new("peaks");
        elt.push_attribute(("precision", PeakPrecision::Single.as_mzxml()));
        elt.push_attribute(("byteOrder", "network"));
        elt.push_attribute(("contentType", "m/z-int"));
        elt.push_attribute(("compressionType", compression.as_mzxml()));
        elt.push_attribute(("compressedLen", compressed_len.as_str()));
        self.handle.write_event(Event::Start(elt))?;
        self.handle.write_event(Event::Text(BytesText::new(&text)))?;
        self.handle.write_event(Event::End(BytesEnd::new("peaks")))?;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        self.handle.write_event(Event::End(BytesEnd::new("msRun")))?;

        let mut index = BytesStart::new("index");
        index.push_attribute(("name", "scan"));
        self.handle.write_event(Event::Start(index))?;
        let index_offset = self.last_tag_offset();
        for (scan_number, offset) in std::mem::take(&mut self.offsets) {
            let id = scan_number.to_string();
            let mut elt = BytesStart::new("offset");
            elt.push_attribute(("id", id.as_str()));
            self.handle.write_event(Event::Start(elt))?;
            self.handle
                .write_event(Event::Text(BytesText::new(&offset.to_string())))?;
            self.handle.write_event(Event::End(BytesEnd::new("offset")))?;
        }
        self.handle.write_event(Event::End(BytesEnd::new("index")))?;

        self.handle
            .write_event(Event::Start(BytesStart::new("indexOffset")))?;
        self.handle
            .write_event(Event::Text(BytesText::new(&index_offset.to_string())))?;
        self.handle
            .write_event(Event::End(BytesEnd::new("indexOffset")))?;

        self.handle.write_event(Event::End(BytesEnd::new("mzXML")))?;
        Ok(self.handle.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Centroid, ScanFileHeader};

    fn sample_run() -> MzXmlRun {
        let header = ScanFileHeader {
            file_name: "run01.RAW".to_string(),
            start_time: 1.0,
            end_time: 2.0,
            ..Default::default()
        };
        let scans = vec![
            Scan {
                scan_number: 1,
                ms_order: 1,
                polarity: Polarity::Positive,
                retention_time: Some(60.0),
                centroids: Some(vec![Centroid::new(445.5, 1.0e6)]),
                ..Default::default()
            },
            Scan {
                scan_number: 2,
                ms_order: 2,
                precursor_master_scan_number: Some(1),
                precursor_mz: Some(445.5),
                precursor_charge: Some(2),
                retention_time: Some(60.5),
                centroids: None,
                ..Default::default()
            },
        ];
        MzXmlRun::new(header, scans)
    }

    #[test]
    fn test_index_offsets_point_at_scans() {
        let document = render_mzxml(&sample_run(), &Config::default()).unwrap();
        let text = String::from_utf8(document).unwrap();

        let offsets: Vec<usize> = text
            .match_indices("<offset id=\"")
            .map(|(i, _)| {
                let start = text[i..].find('>').unwrap() + i + 1;
                let end = text[start..].find('<').unwrap() + start;
                text[start..end].parse().unwrap()
            })
            .collect();
        assert_eq!(offsets.len(), 2);
        assert!(text[offsets[0]..].starts_with("<scan num=\"1\""));
        assert!(text[offsets[1]..].starts_with("<scan num=\"2\""));

        let start = text.find("<indexOffset>").unwrap() + "<indexOffset>".len();
        let end = text[start..].find('<').unwrap() + start;
        let index_offset: usize = text[start..end].parse().unwrap();
        assert!(text[index_offset..].starts_with("<index name=\"scan\">"));
    }

    #[test]
    fn test_empty_peaks_use_sentinel() {
        let document = render_mzxml(&sample_run(), &Config::default()).unwrap();
        let text = String::from_utf8(document).unwrap();
        assert!(text.contains(&format!(">{}</peaks>", EMPTY_PEAKS)));
        assert!(text.contains("peaksCount=\"0\""));
        let encoded = crate::peaks::encode_peaks(&[Centroid::new(445.5, 1.0e6)]);
        assert!(text.contains(&format!(">{}</peaks>", encoded)));
    }

    #[test]
    fn test_compressed_peaks_attributes() {
        let config = Config {
            compress_peaks: true,
            ..Default::default()
        };
        let text = String::from_utf8(render_mzxml(&sample_run(), &config).unwrap()).unwrap();
        assert!(text.contains("compressionType=\"zlib\""));
        // the sentinel scan stays uncompressed
        assert!(text.contains("compressionType=\"none\" compressedLen=\"0\""));
    }

    #[test]
    fn test_render_is_deterministic() {
        let run = sample_run();
        let config = Config::default();
        assert_eq!(
            render_mzxml(&run, &config).unwrap(),
            render_mzxml(&run, &config).unwrap()
        );
    }

    #[test]
    fn test_missing_destination_warns() {
        let written = write_mzxml("/nonexistent/dir/out.mzXML", &sample_run(), &Config::default())
            .unwrap();
        assert!(!written);
        assert!(!write_mzxml("", &sample_run(), &Config::default()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_written_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mzXML");
        assert!(write_mzxml(&path, &sample_run(), &Config::default()).unwrap());
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);

        fs::set_permissions(&path, Permissions::from_mode(0o640)).unwrap();
        assert!(write_mzxml(&path, &sample_run(), &Config::default()).unwrap());
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
