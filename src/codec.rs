//! Gzip compression of content payloads.
//!
//! Records are held and persisted in their stored form, which is gzip unless
//! the uploader already sent compressed bytes. Compression always targets a
//! growable in-memory buffer, so the encode side is infallible; the decode
//! side surfaces `io::Error` for corrupt or non-gzip input, which the read
//! pipeline turns into a plain 404.

use std::io::{self, Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Compresses a buffer with gzip at the default level.
///
/// # Examples
///
/// ```rust
/// use bytedrop::codec;
///
/// let compressed = codec::compress(b"hello hello hello hello");
/// let restored = codec::decompress(&compressed).unwrap();
/// assert_eq!(&restored[..], b"hello hello hello hello");
/// ```
pub fn compress(data: &[u8]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    // Writes into a Vec cannot fail.
    encoder.write_all(data).expect("gzip encode to Vec");
    Bytes::from(encoder.finish().expect("gzip finish to Vec"))
}

/// Decompresses a gzip buffer.
///
/// Fails with `io::Error` when the input is not valid gzip; callers treat
/// that as "record unreadable" rather than a server fault.
pub fn decompress(data: &[u8]) -> io::Result<Bytes> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);
    decoder.read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let input = b"some highly repetitive content ".repeat(64);
        let compressed = compress(&input);
        assert!(compressed.len() < input.len());
        assert_eq!(decompress(&compressed).unwrap(), Bytes::from(input));
    }

    #[test]
    fn empty_round_trip() {
        let compressed = compress(b"");
        assert_eq!(decompress(&compressed).unwrap(), Bytes::new());
    }

    #[test]
    fn garbage_fails_to_decompress() {
        assert!(decompress(b"definitely not gzip").is_err());
    }

    #[test]
    fn truncated_stream_fails() {
        let compressed = compress(b"payload that will be cut short");
        assert!(decompress(&compressed[..compressed.len() / 2]).is_err());
    }
}
