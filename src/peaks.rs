//! Packed peak list codec for mzXML `<peaks>` payloads.
//!
//! A peak list is flattened to `mz, intensity, mz, intensity, ...` as 32-bit
//! floats. On encode the value sequence is reversed, each value written as
//! little-endian bytes, and then the whole byte stream is reversed before
//! Base64 framing. Decoding mirrors both reversals. The resulting text is
//! byte-identical to network byte order `m/z-int` mzXML payloads.
//!
//! Payloads written by other tools with `precision="64"` are read with the
//! same double reversal over 8-byte values.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::models::Centroid;

/// Base64 of eight zero bytes. Marks a scan with no peak data.
pub const EMPTY_PEAKS: &str = "AAAAAAAAAAA=";

/// Errors that can occur while decoding a peaks payload
#[derive(Debug, thiserror::Error)]
pub enum PeakError {
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Decompression error: {0}")]
    DecompressionError(#[from] std::io::Error),

    #[error("Payload length {0} is not a multiple of the value width")]
    MisalignedLength(usize),

    #[error("Truncated payload: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
}

/// Compression applied to the raw bytes before Base64 framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakCompression {
    #[default]
    None,
    Zlib,
}

impl PeakCompression {
    pub fn from_mzxml(value: &str) -> Option<Self> {
        match value {
            "none" => Some(PeakCompression::None),
            "zlib" => Some(PeakCompression::Zlib),
            _ => None,
        }
    }

    pub fn as_mzxml(&self) -> &'static str {
        match self {
            PeakCompression::None => "none",
            PeakCompression::Zlib => "zlib",
        }
    }
}

/// Width of each value in a `<peaks>` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakPrecision {
    #[default]
    Single,
    Double,
}

impl PeakPrecision {
    pub fn from_mzxml(value: &str) -> Option<Self> {
        match value {
            "32" => Some(PeakPrecision::Single),
            "64" => Some(PeakPrecision::Double),
            _ => None,
        }
    }

    pub fn as_mzxml(&self) -> &'static str {
        match self {
            PeakPrecision::Single => "32",
            PeakPrecision::Double => "64",
        }
    }

    pub fn width(&self) -> usize {
        match self {
            PeakPrecision::Single => 4,
            PeakPrecision::Double => 8,
        }
    }
}

/// Decode a 32-bit `<peaks>` payload holding `peak_count` pairs.
///
/// Returns `Ok(None)` for the [`EMPTY_PEAKS`] sentinel regardless of
/// `peak_count`. Bytes past `peak_count * 8` are ignored.
pub fn decode_peaks(
    text: &str,
    peak_count: usize,
    compression: PeakCompression,
) -> Result<Option<Vec<Centroid>>, PeakError> {
    decode_peaks_with(text, peak_count, compression, PeakPrecision::Single)
}

/// Decode a `<peaks>` payload whose values are `precision` wide
pub fn decode_peaks_with(
    text: &str,
    peak_count: usize,
    compression: PeakCompression,
    precision: PeakPrecision,
) -> Result<Option<Vec<Centroid>>, PeakError> {
    let text = text.trim();
    if text == EMPTY_PEAKS {
        return Ok(None);
    }

    let raw = STANDARD.decode(text)?;
    let mut bytes = match compression {
        PeakCompression::None => raw,
        PeakCompression::Zlib => {
            let mut decoder = ZlibDecoder::new(&raw[..]);
            let mut inflated = Vec::new();
            decoder.read_to_end(&mut inflated)?;
            inflated
        }
    };

    let width = precision.width();
    if bytes.len() % width != 0 {
        return Err(PeakError::MisalignedLength(bytes.len()));
    }
    let value_count = peak_count.saturating_mul(2);
    let needed = value_count.saturating_mul(width);
    if bytes.len() < needed {
        return Err(PeakError::Truncated {
            needed,
            available: bytes.len(),
        });
    }

    bytes.reverse();
    let mut values: Vec<f64> = match precision {
        PeakPrecision::Single => bytes
            .chunks_exact(4)
            .take(value_count)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64)
            .collect(),
        PeakPrecision::Double => bytes
            .chunks_exact(8)
            .take(value_count)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect(),
    };
    values.reverse();

    Ok(Some(
        values
            .chunks_exact(2)
            .map(|pair| Centroid::new(pair[0], pair[1]))
            .collect(),
    ))
}

/// Encode centroids as an uncompressed `<peaks>` payload
pub fn encode_peaks(centroids: &[Centroid]) -> String {
    STANDARD.encode(pack(centroids))
}

/// Encode centroids, compressing if requested.
///
/// Returns the Base64 text and the length of the compressed byte stream
/// (0 when uncompressed), which mzXML records as `compressedLen`.
pub fn encode_peaks_with(
    centroids: &[Centroid],
    compression: PeakCompression,
) -> Result<(String, usize), PeakError> {
    let bytes = pack(centroids);
    match compression {
        PeakCompression::None => Ok((STANDARD.encode(bytes), 0)),
        PeakCompression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&bytes)?;
            let compressed = encoder.finish()?;
            Ok((STANDARD.encode(&compressed), compressed.len()))
        }
    }
}

fn pack(centroids: &[Centroid]) -> Vec<u8> {
    let mut values: Vec<f32> = centroids
        .iter()
        .flat_map(|c| [c.mz as f32, c.intensity as f32])
        .collect();
    values.reverse();

    let mut bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    bytes.reverse();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use proptest::prelude::*;

    #[test]
    fn test_encode_known_payload() {
        let peaks = vec![Centroid::new(1.0, 2.0)];
        assert_eq!(encode_peaks(&peaks), "P4AAAEAAAAA=");

        let peaks = vec![Centroid::new(500.25, 1000.0), Centroid::new(501.10, 250.5)];
        assert_eq!(encode_peaks(&peaks), "Q/ogAER6AABD+ozNQ3qAAA==");
    }

    #[test]
    fn test_decode_known_payload() {
        let peaks = decode_peaks("Q/ogAER6AABD+ozNQ3qAAA==", 2, PeakCompression::None)
            .unwrap()
            .unwrap();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0], Centroid::new(500.25, 1000.0));
        assert_eq!(peaks[1].mz, 501.10_f32 as f64);
        assert_eq!(peaks[1].intensity, 250.5);
    }

    #[test]
    fn test_empty_sentinel() {
        for n in [0, 1, 2, 100] {
            assert!(decode_peaks(EMPTY_PEAKS, n, PeakCompression::None)
                .unwrap()
                .is_none());
        }
        assert!(decode_peaks("  AAAAAAAAAAA=\n", 3, PeakCompression::Zlib)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_truncated_payload() {
        let text = encode_peaks(&[Centroid::new(1.0, 2.0)]);
        let err = decode_peaks(&text, 2, PeakCompression::None).unwrap_err();
        assert!(matches!(
            err,
            PeakError::Truncated {
                needed: 16,
                available: 8
            }
        ));
    }

    #[test]
    fn test_misaligned_payload() {
        let text = STANDARD.encode([1u8, 2, 3, 4, 5, 6]);
        let err = decode_peaks(&text, 1, PeakCompression::None).unwrap_err();
        assert!(matches!(err, PeakError::MisalignedLength(6)));
    }

    #[test]
    fn test_bad_base64() {
        let err = decode_peaks("not base64!", 1, PeakCompression::None).unwrap_err();
        assert!(matches!(err, PeakError::Base64Error(_)));
    }

    #[test]
    fn test_extra_bytes_ignored() {
        let peaks = vec![
            Centroid::new(100.0, 1.0),
            Centroid::new(200.0, 2.0),
            Centroid::new(300.0, 3.0),
        ];
        let text = encode_peaks(&peaks);
        // Only the trailing pairs survive the reversed read
        let decoded = decode_peaks(&text, 2, PeakCompression::None)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, peaks[1..].to_vec());
    }

    #[test]
    fn test_zlib_round_trip() {
        let peaks = vec![Centroid::new(445.5, 1.0e6), Centroid::new(446.0, 2.5e5)];
        let (text, compressed_len) = encode_peaks_with(&peaks, PeakCompression::Zlib).unwrap();
        assert!(compressed_len > 0);
        let decoded = decode_peaks(&text, 2, PeakCompression::Zlib)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, peaks);
    }

    fn big_endian_f64(values: &[f64]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_double_precision() {
        let text = big_endian_f64(&[445.25, 1000.0, 446.123456789, 2.5e5]);
        let peaks = decode_peaks_with(&text, 2, PeakCompression::None, PeakPrecision::Double)
            .unwrap()
            .unwrap();
        assert_eq!(
            peaks,
            vec![
                Centroid::new(445.25, 1000.0),
                Centroid::new(446.123456789, 2.5e5)
            ]
        );
    }

    #[test]
    fn test_double_precision_length_checks() {
        // Four f32 values are only two f64 values
        let text = encode_peaks(&[Centroid::new(1.0, 2.0), Centroid::new(3.0, 4.0)]);
        let err =
            decode_peaks_with(&text, 2, PeakCompression::None, PeakPrecision::Double).unwrap_err();
        assert!(matches!(
            err,
            PeakError::Truncated {
                needed: 32,
                available: 16
            }
        ));

        let text = STANDARD.encode([1u8; 12]);
        let err =
            decode_peaks_with(&text, 1, PeakCompression::None, PeakPrecision::Double).unwrap_err();
        assert!(matches!(err, PeakError::MisalignedLength(12)));
    }

    #[test]
    fn test_precision_names() {
        assert_eq!(PeakPrecision::from_mzxml("64"), Some(PeakPrecision::Double));
        assert_eq!(PeakPrecision::from_mzxml("32"), Some(PeakPrecision::Single));
        assert_eq!(PeakPrecision::from_mzxml("16"), None);
        assert_eq!(PeakPrecision::default().as_mzxml(), "32");
    }

    fn f32_exact() -> impl Strategy<Value = f64> {
        (-1.0e7f32..1.0e7f32).prop_map(|v| v as f64)
    }

    proptest! {
        #[test]
        fn round_trip(pairs in prop::collection::vec((f32_exact(), f32_exact()), 1..64)) {
            let peaks: Vec<Centroid> = pairs.iter().map(|&(mz, i)| Centroid::new(mz, i)).collect();
            let decoded = decode_peaks(&encode_peaks(&peaks), peaks.len(), PeakCompression::None)
                .unwrap()
                .unwrap();
            prop_assert_eq!(decoded, peaks);
        }

        #[test]
        fn encode_is_deterministic(pairs in prop::collection::vec((f32_exact(), f32_exact()), 0..32)) {
            let peaks: Vec<Centroid> = pairs.iter().map(|&(mz, i)| Centroid::new(mz, i)).collect();
            prop_assert_eq!(encode_peaks(&peaks), encode_peaks(&peaks));
        }
    }
}
