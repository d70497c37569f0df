pub mod attributes;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod ms1_window;
pub mod peaks;
pub mod reader;
pub mod writer;

#[cfg(feature = "python")]
pub mod python;

pub use attributes::ScanBuilder;
pub use config::Config;
pub use error::{BoxError, MzXmlError, Result};
pub use ingest::{DependentScanProcessor, PassThrough, ScanIngestor};
pub use models::{Centroid, MzXmlRun, Polarity, Scan, ScanFileHeader};
pub use ms1_window::Ms1Window;
pub use peaks::{
    decode_peaks, decode_peaks_with, encode_peaks, PeakCompression, PeakError, PeakPrecision,
    EMPTY_PEAKS,
};
pub use reader::{parse_mzxml, read_mzxml, read_mzxml_with};
pub use writer::{render_mzxml, write_mzxml};
