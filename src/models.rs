use serde::{Deserialize, Serialize};

/// A single (m/z, intensity) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub mz: f64,
    pub intensity: f64,
}

impl Centroid {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarity {
    Positive,
    Negative,
    #[default]
    Unknown,
}

impl Polarity {
    pub fn as_mzxml(&self) -> &'static str {
        match self {
            Polarity::Positive => "+",
            Polarity::Negative => "-",
            Polarity::Unknown => "any",
        }
    }
}

/// One acquired spectrum and its acquisition attributes.
///
/// `centroids` is `None` when the source carried no peak data (the empty
/// sentinel payload).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub scan_number: u32,
    pub ms_order: u8,
    pub precursor_master_scan_number: Option<u32>,
    pub retention_time: Option<f64>,
    pub polarity: Polarity,
    pub centroided: Option<bool>,
    pub scan_type: Option<String>,
    pub filter_line: Option<String>,
    pub low_mz: Option<f64>,
    pub high_mz: Option<f64>,
    pub base_peak_mz: Option<f64>,
    pub base_peak_intensity: Option<f64>,
    pub total_ion_current: Option<f64>,
    pub collision_energy: Option<f64>,
    pub precursor_mz: Option<f64>,
    pub precursor_intensity: Option<f64>,
    pub precursor_charge: Option<i32>,
    pub activation_method: Option<String>,
    pub centroids: Option<Vec<Centroid>>,
}

impl Scan {
    pub fn peak_count(&self) -> usize {
        self.centroids.as_ref().map_or(0, Vec::len)
    }

    pub fn is_top_level(&self) -> bool {
        self.ms_order == 1
    }

    pub fn is_dependent(&self) -> bool {
        self.ms_order == 2
    }
}

/// Per-file metadata, populated once when the file is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFileHeader {
    pub scan_count: u64,
    /// Time of the first scan in minutes
    pub start_time: f32,
    /// Time of the last scan in minutes
    pub end_time: f32,
    /// Source file name without its directory
    pub file_name: String,
    pub instrument_manufacturer: String,
    pub instrument_model: String,
}

impl Default for ScanFileHeader {
    fn default() -> Self {
        Self {
            scan_count: 0,
            start_time: 0.0,
            end_time: 0.0,
            file_name: String::new(),
            instrument_manufacturer: "unknown".to_string(),
            instrument_model: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MzXmlRun {
    pub header: ScanFileHeader,
    pub parent_file_type: Option<String>,
    pub scans: Vec<Scan>,
}

impl MzXmlRun {
    pub fn new(header: ScanFileHeader, scans: Vec<Scan>) -> Self {
        Self {
            header,
            parent_file_type: None,
            scans,
        }
    }

    pub fn find_scan(&self, scan_number: u32) -> Option<&Scan> {
        self.scans.iter().find(|s| s.scan_number == scan_number)
    }
}
