//! # Blob Encoders
//!
//! Varint-length-prefixed byte strings and UTF-8 strings. These encoders
//! are unbounded, so nodes store their encodings out of line in the page's
//! data heap behind a u16 position pointer.

use eyre::Result;

use super::varint::{decode_varint, encode_varint, varint_len};
use super::{check_version, Encoder, EncoderProvider};
use crate::storage::{Cursor, CursorMut};

/// Raw byte strings with a varint length prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesEncoder;

impl Encoder for BytesEncoder {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>, cursor: &mut CursorMut<'_>) -> Result<()> {
        let mut prefix = [0u8; 9];
        let prefix_len = encode_varint(value.len() as u64, &mut prefix);
        cursor.write_bytes(&prefix[..prefix_len])?;
        cursor.write_bytes(value)
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<Vec<u8>> {
        let (len, prefix_len) = decode_varint(cursor.remaining())?;
        cursor.seek(prefix_len as isize);
        Ok(cursor.read_bytes(len as usize)?.to_vec())
    }

    fn exact_size_in_stream(&self, cursor: &Cursor<'_>) -> Result<usize> {
        let (len, prefix_len) = decode_varint(cursor.remaining())?;
        Ok(prefix_len + len as usize)
    }

    fn exact_size(&self, value: &Vec<u8>) -> usize {
        varint_len(value.len() as u64) + value.len()
    }

    fn is_of_bound_size(&self) -> bool {
        false
    }

    fn maximum_size(&self) -> usize {
        usize::MAX
    }
}

/// Provider for [`BytesEncoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesProvider;

impl EncoderProvider for BytesProvider {
    type Value = Vec<u8>;
    type Encoder = BytesEncoder;

    fn encoder(&self, version: u8) -> Result<BytesEncoder> {
        check_version(version)?;
        Ok(BytesEncoder)
    }
}

/// UTF-8 strings, encoded like [`BytesEncoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StrEncoder;

impl Encoder for StrEncoder {
    type Value = String;

    fn encode(&self, value: &String, cursor: &mut CursorMut<'_>) -> Result<()> {
        let mut prefix = [0u8; 9];
        let prefix_len = encode_varint(value.len() as u64, &mut prefix);
        cursor.write_bytes(&prefix[..prefix_len])?;
        cursor.write_bytes(value.as_bytes())
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<String> {
        let (len, prefix_len) = decode_varint(cursor.remaining())?;
        cursor.seek(prefix_len as isize);
        let bytes = cursor.read_bytes(len as usize)?;
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }

    fn exact_size_in_stream(&self, cursor: &Cursor<'_>) -> Result<usize> {
        let (len, prefix_len) = decode_varint(cursor.remaining())?;
        Ok(prefix_len + len as usize)
    }

    fn exact_size(&self, value: &String) -> usize {
        varint_len(value.len() as u64) + value.len()
    }

    fn is_of_bound_size(&self) -> bool {
        false
    }

    fn maximum_size(&self) -> usize {
        usize::MAX
    }
}

/// Provider for [`StrEncoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StrProvider;

impl EncoderProvider for StrProvider {
    type Value = String;
    type Encoder = StrEncoder;

    fn encoder(&self, version: u8) -> Result<StrEncoder> {
        check_version(version)?;
        Ok(StrEncoder)
    }
}
