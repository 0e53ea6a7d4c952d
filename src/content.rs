//! Content records and their on-disk encoding.
//!
//! # On-disk layout (one file per record, all integers big-endian)
//!
//! ```text
//! Size  Field
//!   2   key_len          u16
//!   N   key              UTF-8 bytes
//!   4   media_type_len   i32
//!   M   media_type       raw MIME bytes
//!   8   expiry           i64, milliseconds since the Unix epoch
//!   4   body_len         i32
//!   B   body             raw bytes, stored (possibly gzipped) form
//! ```
//!
//! Records are immutable once written. Two decode paths exist: [`Content::decode`]
//! reads the whole record, [`Content::decode_meta`] stops after `expiry` so the
//! expiry sweeper never loads payloads during a scan.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use thiserror::Error;

/// Upper bound a length prefix may claim before the decoder rejects the file
/// as corrupt. Keeps a truncated or garbage header from driving a huge
/// allocation.
const MAX_FIELD_LEN: i32 = 512 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("invalid length prefix {0} in content record")]
    InvalidLength(i32),
    #[error("content key is not valid UTF-8")]
    InvalidKey,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A single stored record: key, declared media type, absolute expiry, and the
/// body in its stored form.
///
/// The "empty" sentinel ([`Content::empty`]) stands for "no such record". It
/// is a legal cache value (a lookup that found nothing on disk is cached as
/// the sentinel so repeat requests for a dead key short-circuit) but it is
/// never served to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    /// Alphanumeric identifier; doubles as the filename under the content dir.
    pub key: String,
    /// Declared MIME type, kept as opaque bytes and echoed back on reads.
    pub media_type: Bytes,
    /// Absolute expiry instant, milliseconds since the Unix epoch.
    pub expiry: i64,
    /// Stored form of the payload. Gzipped unless the uploader sent gzip.
    pub body: Bytes,
}

impl Content {
    /// Builds a record from its parts.
    pub fn new(key: String, media_type: Bytes, expiry: i64, body: Bytes) -> Self {
        Self { key, media_type, expiry, body }
    }

    /// The "not present" sentinel: empty key, empty body.
    pub fn empty() -> Self {
        Self {
            key: String::new(),
            media_type: Bytes::new(),
            expiry: 0,
            body: Bytes::new(),
        }
    }

    /// True when this record can be served: a real key and a non-empty body.
    pub fn is_present(&self) -> bool {
        !self.key.is_empty() && !self.body.is_empty()
    }

    /// True when `expiry` has passed relative to `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry < now_ms
    }

    /// Encodes the record into `w` using the layout documented at module level.
    pub fn encode<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.key.len() as u16)?;
        w.write_all(self.key.as_bytes())?;
        w.write_i32::<BigEndian>(self.media_type.len() as i32)?;
        w.write_all(&self.media_type)?;
        w.write_i64::<BigEndian>(self.expiry)?;
        w.write_i32::<BigEndian>(self.body.len() as i32)?;
        w.write_all(&self.body)?;
        Ok(())
    }

    /// Decodes a full record, body included.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bytedrop::content::Content;
    /// use bytes::Bytes;
    ///
    /// let record = Content::new(
    ///     "aZ09bcd".into(),
    ///     Bytes::from_static(b"text/plain"),
    ///     1_700_000_000_000,
    ///     Bytes::from_static(b"payload"),
    /// );
    /// let mut buf = Vec::new();
    /// record.encode(&mut buf).unwrap();
    /// assert_eq!(Content::decode(&buf[..]).unwrap(), record);
    /// ```
    pub fn decode<R: Read>(mut r: R) -> Result<Self, ContentError> {
        let mut record = Self::decode_header(&mut r)?;
        let body_len = read_len(&mut r)?;
        let mut body = vec![0u8; body_len];
        r.read_exact(&mut body)?;
        record.body = Bytes::from(body);
        Ok(record)
    }

    /// Decodes key, media type, and expiry only; the body is skipped and left
    /// empty. This is what the sweeper uses, so scans stay cheap no matter how
    /// large the payloads are.
    pub fn decode_meta<R: Read>(mut r: R) -> Result<Self, ContentError> {
        Self::decode_header(&mut r)
    }

    fn decode_header<R: Read>(r: &mut R) -> Result<Self, ContentError> {
        let key_len = r.read_u16::<BigEndian>()? as usize;
        let mut key = vec![0u8; key_len];
        r.read_exact(&mut key)?;
        let key = String::from_utf8(key).map_err(|_| ContentError::InvalidKey)?;

        let media_len = read_len(r)?;
        let mut media_type = vec![0u8; media_len];
        r.read_exact(&mut media_type)?;

        let expiry = r.read_i64::<BigEndian>()?;

        Ok(Self {
            key,
            media_type: Bytes::from(media_type),
            expiry,
            body: Bytes::new(),
        })
    }
}

fn read_len<R: Read>(r: &mut R) -> Result<usize, ContentError> {
    let len = r.read_i32::<BigEndian>()?;
    if !(0..=MAX_FIELD_LEN).contains(&len) {
        return Err(ContentError::InvalidLength(len));
    }
    Ok(len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn sample() -> Content {
        Content::new(
            "abc123Z".into(),
            Bytes::from_static(b"application/json"),
            1_712_345_678_901,
            Bytes::from_static(b"{\"hello\":\"world\"}"),
        )
    }

    #[test]
    fn encode_decode_round_trip() {
        let record = sample();
        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();
        assert_eq!(Content::decode(&buf[..]).unwrap(), record);
    }

    #[test]
    fn meta_decode_skips_body() {
        let record = sample();
        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();

        let meta = Content::decode_meta(&buf[..]).unwrap();
        assert_eq!(meta.key, record.key);
        assert_eq!(meta.media_type, record.media_type);
        assert_eq!(meta.expiry, record.expiry);
        assert!(meta.body.is_empty());
    }

    // Hand-built encoding, independent of `encode`, pinning the wire layout.
    #[test]
    fn decodes_independent_encoding() {
        let mut buf = Vec::new();
        buf.write_u16::<BigEndian>(4).unwrap();
        buf.extend_from_slice(b"k3yA");
        buf.write_i32::<BigEndian>(10).unwrap();
        buf.extend_from_slice(b"text/plain");
        buf.write_i64::<BigEndian>(42_000).unwrap();
        buf.write_i32::<BigEndian>(5).unwrap();
        buf.extend_from_slice(b"hello");

        let record = Content::decode(&buf[..]).unwrap();
        assert_eq!(record.key, "k3yA");
        assert_eq!(record.media_type, Bytes::from_static(b"text/plain"));
        assert_eq!(record.expiry, 42_000);
        assert_eq!(record.body, Bytes::from_static(b"hello"));
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u16::<BigEndian>(1).unwrap();
        buf.extend_from_slice(b"k");
        buf.write_i32::<BigEndian>(-7).unwrap();

        assert!(matches!(
            Content::decode(&buf[..]),
            Err(ContentError::InvalidLength(-7))
        ));
    }

    #[test]
    fn truncated_record_is_an_io_error() {
        let record = sample();
        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);

        assert!(matches!(
            Content::decode(&buf[..]),
            Err(ContentError::Io(_))
        ));
    }

    #[test]
    fn sentinel_is_never_present() {
        let sentinel = Content::empty();
        assert!(!sentinel.is_present());
        assert!(sentinel.is_expired(1));
    }

    #[test]
    fn expiry_comparison() {
        let record = sample();
        assert!(!record.is_expired(record.expiry - 1));
        assert!(!record.is_expired(record.expiry));
        assert!(record.is_expired(record.expiry + 1));
    }
}
