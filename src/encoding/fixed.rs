//! # Fixed-Width Encoders
//!
//! Bounded encoders whose every encoding occupies exactly `maximum_size()`
//! bytes, little-endian. The node layer uses three of them for its own
//! layout (in-page positions as u16, page indexes as u64, and record-flag
//! bytes), and [`I64Encoder`] is the stock inline key/value codec.

use eyre::Result;

use super::{check_version, Encoder, EncoderProvider};
use crate::storage::{Cursor, CursorMut};

/// u16 offset within a page. Position pointers in record slots use this.
#[derive(Debug, Clone, Copy, Default)]
pub struct PagePositionEncoder;

impl PagePositionEncoder {
    pub fn for_version(version: u8) -> Result<Self> {
        check_version(version)?;
        Ok(Self)
    }
}

impl Encoder for PagePositionEncoder {
    type Value = u16;

    fn encode(&self, value: &u16, cursor: &mut CursorMut<'_>) -> Result<()> {
        cursor.write_u16(*value)
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<u16> {
        cursor.read_u16()
    }

    fn exact_size_in_stream(&self, _cursor: &Cursor<'_>) -> Result<usize> {
        Ok(2)
    }

    fn exact_size(&self, _value: &u16) -> usize {
        2
    }

    fn is_of_bound_size(&self) -> bool {
        true
    }

    fn maximum_size(&self) -> usize {
        2
    }
}

/// u64 page index. Child pointers and marker block indexes use this.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageIndexEncoder;

impl PageIndexEncoder {
    pub fn for_version(version: u8) -> Result<Self> {
        check_version(version)?;
        Ok(Self)
    }
}

impl Encoder for PageIndexEncoder {
    type Value = u64;

    fn encode(&self, value: &u64, cursor: &mut CursorMut<'_>) -> Result<()> {
        cursor.write_u64(*value)
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<u64> {
        cursor.read_u64()
    }

    fn exact_size_in_stream(&self, _cursor: &Cursor<'_>) -> Result<usize> {
        Ok(8)
    }

    fn exact_size(&self, _value: &u64) -> usize {
        8
    }

    fn is_of_bound_size(&self) -> bool {
        true
    }

    fn maximum_size(&self) -> usize {
        8
    }
}

/// Single byte. Record-flag bytes use this.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteEncoder;

impl ByteEncoder {
    pub fn for_version(version: u8) -> Result<Self> {
        check_version(version)?;
        Ok(Self)
    }
}

impl Encoder for ByteEncoder {
    type Value = u8;

    fn encode(&self, value: &u8, cursor: &mut CursorMut<'_>) -> Result<()> {
        cursor.write_u8(*value)
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<u8> {
        cursor.read_u8()
    }

    fn exact_size_in_stream(&self, _cursor: &Cursor<'_>) -> Result<usize> {
        Ok(1)
    }

    fn exact_size(&self, _value: &u8) -> usize {
        1
    }

    fn is_of_bound_size(&self) -> bool {
        true
    }

    fn maximum_size(&self) -> usize {
        1
    }
}

/// i64 keys or values, 8 bytes little-endian. Small enough to be stored
/// inline with the default thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Encoder;

impl Encoder for I64Encoder {
    type Value = i64;

    fn encode(&self, value: &i64, cursor: &mut CursorMut<'_>) -> Result<()> {
        cursor.write_u64(*value as u64)
    }

    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<i64> {
        Ok(cursor.read_u64()? as i64)
    }

    fn exact_size_in_stream(&self, _cursor: &Cursor<'_>) -> Result<usize> {
        Ok(8)
    }

    fn exact_size(&self, _value: &i64) -> usize {
        8
    }

    fn is_of_bound_size(&self) -> bool {
        true
    }

    fn maximum_size(&self) -> usize {
        8
    }
}

/// Provider for [`I64Encoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Provider;

impl EncoderProvider for I64Provider {
    type Value = i64;
    type Encoder = I64Encoder;

    fn encoder(&self, version: u8) -> Result<I64Encoder> {
        check_version(version)?;
        Ok(I64Encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_round_trip() {
        let mut data = [0u8; 8];

        PagePositionEncoder
            .encode(&0xBEEF, &mut CursorMut::new(&mut data, 0))
            .unwrap();

        let mut c = Cursor::new(&data, 0);
        assert_eq!(PagePositionEncoder.decode(&mut c).unwrap(), 0xBEEF);
        assert_eq!(c.position(), 2);
    }

    #[test]
    fn page_index_round_trip() {
        let mut data = [0u8; 8];

        PageIndexEncoder
            .encode(&0x0102_0304_0506_0708, &mut CursorMut::new(&mut data, 0))
            .unwrap();

        let mut c = Cursor::new(&data, 0);
        assert_eq!(
            PageIndexEncoder.decode(&mut c).unwrap(),
            0x0102_0304_0506_0708
        );
    }

    #[test]
    fn i64_round_trips_negative_values() {
        let mut data = [0u8; 8];

        I64Encoder
            .encode(&-42, &mut CursorMut::new(&mut data, 0))
            .unwrap();

        let mut c = Cursor::new(&data, 0);
        assert_eq!(I64Encoder.decode(&mut c).unwrap(), -42);
    }

    #[test]
    fn fixed_encoders_are_bounded() {
        assert!(PagePositionEncoder.is_of_bound_size());
        assert_eq!(PagePositionEncoder.maximum_size(), 2);
        assert!(PageIndexEncoder.is_of_bound_size());
        assert_eq!(PageIndexEncoder.maximum_size(), 8);
        assert!(ByteEncoder.is_of_bound_size());
        assert_eq!(ByteEncoder.maximum_size(), 1);
        assert!(I64Encoder.is_of_bound_size());
        assert_eq!(I64Encoder.maximum_size(), 8);
    }

    #[test]
    fn provider_rejects_unknown_version() {
        assert!(I64Provider.encoder(0).is_ok());
        assert!(I64Provider.encoder(3).is_err());
    }
}
