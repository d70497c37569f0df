use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::config::Config;
use crate::error::MzXmlError;
use crate::models::{Centroid, MzXmlRun, Scan, ScanFileHeader};

#[pyclass(name = "Scan")]
#[derive(Debug, Clone)]
pub struct PyScan {
    #[pyo3(get, set)]
    pub scan_number: u32,
    #[pyo3(get, set)]
    pub ms_order: u8,
    #[pyo3(get, set)]
    pub precursor_master_scan_number: Option<u32>,
    #[pyo3(get, set)]
    pub retention_time: Option<f64>,
    #[pyo3(get, set)]
    pub precursor_mz: Option<f64>,
    #[pyo3(get, set)]
    pub precursor_charge: Option<i32>,
    /// (mz, intensity) pairs, or None when the scan has no peak data
    #[pyo3(get, set)]
    pub centroids: Option<Vec<(f64, f64)>>,
}

#[pymethods]
impl PyScan {
    #[new]
    fn new(scan_number: u32, ms_order: u8) -> Self {
        Self {
            scan_number,
            ms_order,
            precursor_master_scan_number: None,
            retention_time: None,
            precursor_mz: None,
            precursor_charge: None,
            centroids: None,
        }
    }
}

impl From<Scan> for PyScan {
    fn from(scan: Scan) -> Self {
        Self {
            scan_number: scan.scan_number,
            ms_order: scan.ms_order,
            precursor_master_scan_number: scan.precursor_master_scan_number,
            retention_time: scan.retention_time,
            precursor_mz: scan.precursor_mz,
            precursor_charge: scan.precursor_charge,
            centroids: scan
                .centroids
                .map(|cs| cs.iter().map(|c| (c.mz, c.intensity)).collect()),
        }
    }
}

impl From<&PyScan> for Scan {
    fn from(scan: &PyScan) -> Self {
        Scan {
            scan_number: scan.scan_number,
            ms_order: scan.ms_order,
            precursor_master_scan_number: scan.precursor_master_scan_number,
            retention_time: scan.retention_time,
            precursor_mz: scan.precursor_mz,
            precursor_charge: scan.precursor_charge,
            centroids: scan
                .centroids
                .as_ref()
                .map(|cs| cs.iter().map(|&(mz, i)| Centroid::new(mz, i)).collect()),
            ..Default::default()
        }
    }
}

fn to_py_err(err: MzXmlError) -> PyErr {
    match err {
        MzXmlError::IoError(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Read an mzXML file into a list of scans, or None if the file is missing
#[pyfunction]
fn read_mzxml(path: &str) -> PyResult<Option<Vec<PyScan>>> {
    let run = crate::reader::read_mzxml(path, &Config::default()).map_err(to_py_err)?;
    Ok(run.map(|run| run.scans.into_iter().map(PyScan::from).collect()))
}

/// Write scans to an mzXML file. Returns False if the destination is unusable.
#[pyfunction]
fn write_mzxml(path: &str, scans: Vec<PyScan>, file_name: Option<String>) -> PyResult<bool> {
    let header = ScanFileHeader {
        file_name: file_name.unwrap_or_default(),
        ..Default::default()
    };
    let run = MzXmlRun::new(header, scans.iter().map(Scan::from).collect());
    crate::writer::write_mzxml(path, &run, &Config::default()).map_err(to_py_err)
}

#[pymodule]
fn libmzxml(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyScan>()?;
    m.add_function(wrap_pyfunction!(read_mzxml, m)?)?;
    m.add_function(wrap_pyfunction!(write_mzxml, m)?)?;
    Ok(())
}
