//! Streaming mzXML reader.
//!
//! Walks the document once with quick-xml. Every `<scan>` is assembled with
//! a [`ScanBuilder`] from its attributes, the text of its direct children and
//! those children's attributes, then routed through a [`ScanIngestor`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::attributes::{parse_duration_seconds, ScanBuilder};
use crate::config::Config;
use crate::error::{MzXmlError, Result};
use crate::ingest::{DependentScanProcessor, PassThrough, ScanIngestor};
use crate::models::MzXmlRun;

/// A `<scan>` that is still open. `builder` is taken once the scan has been
/// emitted early because a nested scan started.
struct OpenScan {
    depth: usize,
    builder: Option<ScanBuilder>,
}

struct OpenChild {
    depth: usize,
    name: String,
    text: String,
}

/// Read an mzXML file, leaving dependent scans unchanged.
///
/// Returns `Ok(None)` when `path` is empty or does not exist.
pub fn read_mzxml<P: AsRef<Path>>(path: P, config: &Config) -> Result<Option<MzXmlRun>> {
    read_mzxml_with(path, config, &mut PassThrough)
}

/// Read an mzXML file, running `processor` on every dependent scan.
pub fn read_mzxml_with<P, D>(path: P, config: &Config, processor: &mut D) -> Result<Option<MzXmlRun>>
where
    P: AsRef<Path>,
    D: DependentScanProcessor + ?Sized,
{
    let path = path.as_ref();
    if path.as_os_str().is_empty() || !path.is_file() {
        warn!("No scans in the input: {}", path.display());
        return Ok(None);
    }

    let file = File::open(path)?;
    let run = parse_mzxml(BufReader::new(file), config, processor)?;
    info!(
        "Read {} scans ({} MS1, {} MS2) from {}",
        run.scans.len(),
        run.scans.iter().filter(|s| s.is_top_level()).count(),
        run.scans.iter().filter(|s| s.is_dependent()).count(),
        path.display()
    );
    Ok(Some(run))
}

/// Parse an mzXML document from any buffered source
pub fn parse_mzxml<R, D>(source: R, config: &Config, processor: &mut D) -> Result<MzXmlRun>
where
    R: BufRead,
    D: DependentScanProcessor + ?Sized,
{
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut doc = DocumentState::new(ScanIngestor::new(config.ms1_window, processor));

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => doc.start_element(e, false)?,
            Event::Empty(ref e) => doc.start_element(e, true)?,
            Event::Text(ref t) => {
                if let Some(child) = doc.child.as_mut() {
                    child.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(ref t) => {
                if let Some(child) = doc.child.as_mut() {
                    child.text.push_str(&String::from_utf8_lossy(t));
                }
            }
            Event::End(ref e) => doc.end_element(e.name().as_ref() == b"scan")?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    doc.finish()
}

struct DocumentState<'p, D: DependentScanProcessor + ?Sized> {
    run: MzXmlRun,
    seen_run: bool,
    scan_count: Option<u64>,
    ingestor: ScanIngestor<'p, D>,
    scans: Vec<OpenScan>,
    child: Option<OpenChild>,
    depth: usize,
}

impl<'p, D: DependentScanProcessor + ?Sized> DocumentState<'p, D> {
    fn new(ingestor: ScanIngestor<'p, D>) -> Self {
        Self {
            run: MzXmlRun::default(),
            seen_run: false,
            scan_count: None,
            ingestor,
            scans: Vec::new(),
            child: None,
            depth: 0,
        }
    }

    fn start_element(&mut self, e: &BytesStart, is_empty: bool) -> Result<()> {
        self.depth += 1;
        match e.name().as_ref() {
            b"msRun" => {
                self.seen_run = true;
                for (name, value) in attributes(e)? {
                    match name.as_str() {
                        "scanCount" => self.scan_count = Some(parse_header(&name, &value)?),
                        "startTime" => self.run.header.start_time = parse_minutes(&name, &value)?,
                        "endTime" => self.run.header.end_time = parse_minutes(&name, &value)?,
                        _ => {}
                    }
                }
            }
            b"parentFile" if self.run.header.file_name.is_empty() => {
                for (name, value) in attributes(e)? {
                    match name.as_str() {
                        "fileName" => self.run.header.file_name = base_name(&value).to_string(),
                        "fileType" => self.run.parent_file_type = Some(value),
                        _ => {}
                    }
                }
            }
            b"msManufacturer" => {
                if let Some(value) = attribute(e, "value")? {
                    self.run.header.instrument_manufacturer = value;
                }
            }
            b"msModel" => {
                if let Some(value) = attribute(e, "value")? {
                    self.run.header.instrument_model = value;
                }
            }
            b"scan" => {
                if let Some(parent) = self.scans.last_mut().and_then(|s| s.builder.take()) {
                    self.ingestor.push(parent.build()?)?;
                }
                let mut builder = ScanBuilder::new();
                for (name, value) in attributes(e)? {
                    builder.apply_named_value(&name, &value)?;
                }
                if is_empty {
                    self.ingestor.push(builder.build()?)?;
                } else {
                    self.scans.push(OpenScan {
                        depth: self.depth,
                        builder: Some(builder),
                    });
                }
            }
            name => {
                if let Some(builder) = direct_child_of(&mut self.scans, self.depth) {
                    for (attr, value) in attributes(e)? {
                        builder.apply_named_value(&attr, &value)?;
                    }
                    if !is_empty {
                        self.child = Some(OpenChild {
                            depth: self.depth,
                            name: String::from_utf8_lossy(name).into_owned(),
                            text: String::new(),
                        });
                    }
                }
            }
        }
        if is_empty {
            self.depth -= 1;
        }
        Ok(())
    }

    fn end_element(&mut self, is_scan: bool) -> Result<()> {
        let depth = self.depth;
        if self.child.as_ref().is_some_and(|c| c.depth == depth) {
            if let Some(OpenChild { name, text, .. }) = self.child.take() {
                if let Some(builder) = direct_child_of(&mut self.scans, depth) {
                    if !text.is_empty() {
                        builder.apply_named_value(&name, &text)?;
                    }
                }
            }
        } else if is_scan && self.scans.last().is_some_and(|s| s.depth == depth) {
            if let Some(builder) = self.scans.pop().and_then(|s| s.builder) {
                self.ingestor.push(builder.build()?)?;
            }
        }
        self.depth = depth.saturating_sub(1);
        Ok(())
    }

    fn finish(self) -> Result<MzXmlRun> {
        if !self.scans.is_empty() {
            return Err(MzXmlError::InvalidStructure(
                "unclosed <scan> element".to_string(),
            ));
        }
        if !self.seen_run {
            return Err(MzXmlError::InvalidStructure(
                "No <msRun> element found in the mzXML file".to_string(),
            ));
        }

        let mut run = self.run;
        run.scans = self.ingestor.finish();
        run.header.scan_count = self.scan_count.unwrap_or(run.scans.len() as u64);
        Ok(run)
    }
}

/// The builder of the innermost open scan, if an element at `depth` is its
/// direct child
fn direct_child_of(scans: &mut [OpenScan], depth: usize) -> Option<&mut ScanBuilder> {
    scans
        .last_mut()
        .filter(|s| s.depth + 1 == depth)
        .and_then(|s| s.builder.as_mut())
}

fn attributes(e: &BytesStart) -> Result<Vec<(String, String)>> {
    e.attributes()
        .map(|a| -> Result<(String, String)> {
            let a = a?;
            let value = a.unescape_value()?;
            Ok((
                String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                value.into_owned(),
            ))
        })
        .collect()
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    Ok(attributes(e)?
        .into_iter()
        .find_map(|(key, value)| (key == name).then_some(value)))
}

fn parse_header<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| MzXmlError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_minutes(name: &str, value: &str) -> Result<f32> {
    parse_duration_seconds(value)
        .map(|seconds| (seconds / 60.0) as f32)
        .ok_or_else(|| MzXmlError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Final component of a path written on either Windows or Unix
fn base_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}
