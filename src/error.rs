use crate::peaks::PeakError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while reading or writing mzXML
#[derive(Debug, thiserror::Error)]
pub enum MzXmlError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    AttrError(#[from] quick_xml::events::attributes::AttrError),

    #[error("Peak decode error in scan {scan}: {source}")]
    PeakError {
        scan: u32,
        #[source]
        source: PeakError,
    },

    #[error("Invalid mzXML structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: String, value: String },

    #[error("Scan {0} has peak data but no peaksCount")]
    MissingPeaksCount(u32),

    #[error("Dependent scan {0} declares no precursor scan number")]
    MissingPrecursorReference(u32),

    #[error("Scan {scan} references precursor scan {precursor}, which has not been seen")]
    UnresolvedPrecursor { scan: u32, precursor: u32 },

    #[error("Processing dependent scan {scan} failed: {source}")]
    ProcessingError {
        scan: u32,
        #[source]
        source: BoxError,
    },
}

pub type Result<T> = std::result::Result<T, MzXmlError>;
