//! Compression envelopes: `[algo:u8][orig_len:u32][comp_len:u32][bytes]`.
//!
//! Tag `0` ("none") is the disabled sentinel: a wrapper that was active
//! with compression turned off still writes this envelope, so a database
//! reopened later with compression enabled can still tell a legacy
//! passthrough page from one it must decompress.

use crate::errors::{CodecError, CodecResult};
use std::io::{Read, Write};

/// Compression algorithm, mirroring the envelope's one-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    /// No compression; the envelope still carries the disabled sentinel tag.
    None,
    /// Snappy (`snap` crate).
    Snappy,
    /// Zstandard, levels 1-19 (default 3).
    Zstd(i32),
    /// Gzip (DEFLATE + gzip framing), levels 0-9.
    Gzip(u32),
    /// Raw zlib (DEFLATE + zlib framing), levels 0-9.
    Zlib(u32),
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::None
    }
}

const TAG_NONE: u8 = 0;
const TAG_SNAPPY: u8 = 1;
const TAG_ZSTD: u8 = 2;
const TAG_GZIP: u8 = 3;
const TAG_ZLIB: u8 = 4;

/// Default Zstandard compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

impl CompressionAlgorithm {
    fn tag(self) -> u8 {
        match self {
            Self::None => TAG_NONE,
            Self::Snappy => TAG_SNAPPY,
            Self::Zstd(_) => TAG_ZSTD,
            Self::Gzip(_) => TAG_GZIP,
            Self::Zlib(_) => TAG_ZLIB,
        }
    }
}

const ENVELOPE_HEADER_SIZE: usize = 9;

/// Compresses `payload` per `algo` and wraps it in a tagged envelope.
pub fn encode_envelope(payload: &[u8], algo: CompressionAlgorithm) -> CodecResult<Vec<u8>> {
    let body = match algo {
        CompressionAlgorithm::None => payload.to_vec(),
        CompressionAlgorithm::Snappy => snap::raw::Encoder::new()
            .compress_vec(payload)
            .map_err(|e| CodecError::Corruption(e.to_string()))?,
        CompressionAlgorithm::Zstd(level) => {
            zstd::stream::encode_all(payload, level).map_err(CodecError::Io)?
        }
        CompressionAlgorithm::Gzip(level) => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder.write_all(payload)?;
            encoder.finish()?
        }
        CompressionAlgorithm::Zlib(level) => {
            let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder.write_all(payload)?;
            encoder.finish()?
        }
    };
    let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + body.len());
    out.push(algo.tag());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Unwraps a compression envelope produced by [`encode_envelope`], returning
/// the original plaintext bytes.
pub fn decode_envelope(bytes: &[u8], configured: CompressionAlgorithm) -> CodecResult<Vec<u8>> {
    if bytes.len() < ENVELOPE_HEADER_SIZE {
        return Err(CodecError::Corruption(
            "compression envelope shorter than its own header".to_string(),
        ));
    }
    let tag = bytes[0];
    let orig_len = u32::from_le_bytes(bytes[1..5].try_into().unwrap()) as usize;
    let comp_len = u32::from_le_bytes(bytes[5..9].try_into().unwrap()) as usize;
    let body = bytes
        .get(ENVELOPE_HEADER_SIZE..ENVELOPE_HEADER_SIZE + comp_len)
        .ok_or_else(|| CodecError::Corruption("compression envelope truncated".to_string()))?;

    if tag == TAG_NONE {
        // disabled sentinel: pass through unchanged, regardless of what the
        // caller is configured for now.
        return Ok(body[..orig_len.min(body.len())].to_vec());
    }
    if tag != configured.tag() {
        return Err(CodecError::AlgorithmMismatch {
            expected: configured.tag(),
            found: tag,
        });
    }

    let plaintext = match configured {
        CompressionAlgorithm::None => unreachable!("None never reaches a non-sentinel tag check"),
        CompressionAlgorithm::Snappy => snap::raw::Decoder::new()
            .decompress_vec(body)
            .map_err(|e| CodecError::Corruption(e.to_string()))?,
        CompressionAlgorithm::Zstd(_) => {
            zstd::stream::decode_all(body).map_err(|e| CodecError::Corruption(e.to_string()))?
        }
        CompressionAlgorithm::Gzip(_) => {
            let mut decoder = flate2::read::GzDecoder::new(body);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CodecError::Corruption(e.to_string()))?;
            out
        }
        CompressionAlgorithm::Zlib(_) => {
            let mut decoder = flate2::read::ZlibDecoder::new(body);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CodecError::Corruption(e.to_string()))?;
            out
        }
    };
    if plaintext.len() != orig_len {
        return Err(CodecError::Corruption(format!(
            "decompressed {} bytes, envelope declared {orig_len}",
            plaintext.len()
        )));
    }
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(algo: CompressionAlgorithm) {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let envelope = encode_envelope(&payload, algo).unwrap();
        let decoded = decode_envelope(&envelope, algo).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn none_round_trips() {
        round_trip(CompressionAlgorithm::None);
    }

    #[test]
    fn snappy_round_trips() {
        round_trip(CompressionAlgorithm::Snappy);
    }

    #[test]
    fn zstd_round_trips() {
        round_trip(CompressionAlgorithm::Zstd(DEFAULT_ZSTD_LEVEL));
    }

    #[test]
    fn gzip_round_trips() {
        round_trip(CompressionAlgorithm::Gzip(6));
    }

    #[test]
    fn zlib_round_trips() {
        round_trip(CompressionAlgorithm::Zlib(6));
    }

    #[test]
    fn disabled_sentinel_passes_through_even_when_reconfigured() {
        let payload = b"legacy bytes written before compression was enabled".to_vec();
        let envelope = encode_envelope(&payload, CompressionAlgorithm::None).unwrap();
        // reader is now configured for zstd, but the envelope still carries tag 0
        let decoded = decode_envelope(&envelope, CompressionAlgorithm::Zstd(DEFAULT_ZSTD_LEVEL)).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn mismatched_algorithm_is_rejected() {
        let payload = b"some bytes".to_vec();
        let envelope = encode_envelope(&payload, CompressionAlgorithm::Gzip(6)).unwrap();
        assert!(matches!(
            decode_envelope(&envelope, CompressionAlgorithm::Zlib(6)),
            Err(CodecError::AlgorithmMismatch { .. })
        ));
    }
}
