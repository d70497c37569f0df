//! Per-file scan routing.
//!
//! Each scan is appended to the run in arrival order. Top-level scans also
//! enter the [`Ms1Window`]; dependent scans are matched to their precursor
//! and handed to a [`DependentScanProcessor`] along with the window.

use std::collections::HashMap;

use log::debug;

use crate::error::{BoxError, MzXmlError, Result};
use crate::models::Scan;
use crate::ms1_window::Ms1Window;

/// Downstream step run on every dependent scan.
///
/// The returned scan replaces `scan` in the run.
pub trait DependentScanProcessor {
    fn process(
        &mut self,
        ms1_scans: &[&Scan],
        precursor: &Scan,
        scan: Scan,
    ) -> std::result::Result<Scan, BoxError>;
}

/// Leaves dependent scans untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl DependentScanProcessor for PassThrough {
    fn process(
        &mut self,
        _ms1_scans: &[&Scan],
        _precursor: &Scan,
        scan: Scan,
    ) -> std::result::Result<Scan, BoxError> {
        Ok(scan)
    }
}

impl<F> DependentScanProcessor for F
where
    F: FnMut(&[&Scan], &Scan, Scan) -> std::result::Result<Scan, BoxError>,
{
    fn process(
        &mut self,
        ms1_scans: &[&Scan],
        precursor: &Scan,
        scan: Scan,
    ) -> std::result::Result<Scan, BoxError> {
        self(ms1_scans, precursor, scan)
    }
}

pub struct ScanIngestor<'p, P: DependentScanProcessor + ?Sized> {
    scans: Vec<Scan>,
    by_number: HashMap<u32, usize>,
    window: Ms1Window,
    processor: &'p mut P,
}

impl<'p, P: DependentScanProcessor + ?Sized> ScanIngestor<'p, P> {
    pub fn new(window_size: usize, processor: &'p mut P) -> Self {
        Self {
            scans: Vec::new(),
            by_number: HashMap::new(),
            window: Ms1Window::new(window_size),
            processor,
        }
    }

    pub fn window(&self) -> &Ms1Window {
        &self.window
    }

    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    /// The most recent top-level scan, if any
    pub fn latest_ms1(&self) -> Option<&Scan> {
        self.window.latest().and_then(|i| self.scans.get(i))
    }

    /// Route one scan and append it to the run
    pub fn push(&mut self, scan: Scan) -> Result<()> {
        let position = self.scans.len();
        let scan = match scan.ms_order {
            1 => {
                debug!("Scan {} -> MS1 window slot {}", scan.scan_number, self.window.cursor());
                self.window.push(position);
                scan
            }
            2 => self.resolve_dependent(scan)?,
            level => {
                debug!("Scan {} has MS level {}; not routed", scan.scan_number, level);
                scan
            }
        };
        self.by_number.entry(scan.scan_number).or_insert(position);
        self.scans.push(scan);
        Ok(())
    }

    fn resolve_dependent(&mut self, scan: Scan) -> Result<Scan> {
        let number = scan.scan_number;
        let precursor_number = scan
            .precursor_master_scan_number
            .ok_or(MzXmlError::MissingPrecursorReference(number))?;
        let precursor = self
            .by_number
            .get(&precursor_number)
            .and_then(|&i| self.scans.get(i))
            .ok_or(MzXmlError::UnresolvedPrecursor {
                scan: number,
                precursor: precursor_number,
            })?;
        debug!("Scan {} -> precursor {}", number, precursor_number);

        let ms1_scans: Vec<&Scan> = self
            .window
            .positions()
            .filter_map(|i| self.scans.get(i))
            .collect();
        self.processor
            .process(&ms1_scans, precursor, scan)
            .map_err(|source| MzXmlError::ProcessingError {
                scan: number,
                source,
            })
    }

    /// Hand back the run's scans and clear all routing state
    pub fn finish(mut self) -> Vec<Scan> {
        self.window.reset();
        self.by_number.clear();
        std::mem::take(&mut self.scans)
    }
}
