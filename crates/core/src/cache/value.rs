//! Values stored in a [`BoundedCache`](super::BoundedCache) and the
//! DEFLATE codec applied to their binary form.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// A value that can live in a [`BoundedCache`](super::BoundedCache).
///
/// Binary values expose their bytes through [`as_binary`](Self::as_binary)
/// and are compressed when the cache has compression enabled. Scalars keep
/// the default (`None`) and are stored unchanged.
///
/// A type that returns `Some` from `as_binary` must rebuild itself from the
/// same bytes in `from_binary`.
pub trait CacheValue: Clone + Send + 'static {
    fn as_binary(&self) -> Option<&[u8]> {
        None
    }

    fn from_binary(_bytes: Vec<u8>) -> Option<Self> {
        None
    }
}

impl CacheValue for Vec<u8> {
    fn as_binary(&self) -> Option<&[u8]> {
        Some(self.as_slice())
    }

    fn from_binary(bytes: Vec<u8>) -> Option<Self> {
        Some(bytes)
    }
}

impl CacheValue for String {}
impl CacheValue for i64 {}
impl CacheValue for u64 {}
impl CacheValue for f64 {}
impl CacheValue for bool {}

/// Mixed cache value: a byte blob or a scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Bytes(Vec<u8>),
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl CacheValue for CachedValue {
    fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    fn from_binary(bytes: Vec<u8>) -> Option<Self> {
        Some(Self::Bytes(bytes))
    }
}

pub(crate) fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub(crate) fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip_is_byte_exact() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
        let packed = compress(&data).expect("compress");
        assert_eq!(decompress(&packed).expect("decompress"), data);
    }

    #[test]
    fn empty_input_round_trips() {
        let packed = compress(&[]).expect("compress");
        assert!(decompress(&packed).expect("decompress").is_empty());
    }

    #[test]
    fn only_bytes_variant_is_binary() {
        assert!(CachedValue::Bytes(vec![1, 2]).as_binary().is_some());
        assert!(CachedValue::Text("x".into()).as_binary().is_none());
        assert!(CachedValue::Integer(3).as_binary().is_none());
        assert!("plain".to_string().as_binary().is_none());
    }
}
