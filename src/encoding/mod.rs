//! # Encoding Module
//!
//! Encoders turn keys, values, and page-layout primitives into bytes at a
//! cursor position and back. The node layer is generic over one key encoder
//! and one value encoder; everything else it needs (in-page positions, page
//! indexes, record-flag bytes) comes from the fixed encoders in this
//! module.
//!
//! ## Bounded vs Unbounded
//!
//! An encoder that is *of bound size* promises that every encoding fits in
//! `maximum_size()` bytes. Bounded encoders at or below the configured
//! inline thresholds are stored directly in record slots; everything else
//! is spilled to the page's data heap behind a u16 position pointer.
//!
//! ## Versioning
//!
//! Pages record the version of the encoder set they were written with in
//! their flags word. Providers resolve a version to a concrete encoder and
//! reject versions this build does not know, so a page written by a newer
//! build fails loudly instead of being misread.
//!
//! ## Module Organization
//!
//! - [`varint`]: variable-length integer encoding used for length prefixes
//! - [`fixed`]: fixed-width bounded encoders (u16 position, u64 page index,
//!   byte, i64)
//! - [`blob`]: varint-prefixed byte-string and string encoders (unbounded)

pub mod blob;
pub mod fixed;
pub mod varint;

use eyre::{ensure, Result};

use crate::config::ENCODERS_VERSION;
use crate::storage::{Cursor, CursorMut};

pub use blob::{BytesEncoder, BytesProvider, StrEncoder, StrProvider};
pub use fixed::{
    ByteEncoder, I64Encoder, I64Provider, PageIndexEncoder, PagePositionEncoder,
};

/// A codec for one value type at one cursor position.
///
/// Encoders are stateless and cheap to clone; a node captures its encoder
/// set once per latch session.
pub trait Encoder: Clone {
    type Value;

    /// Writes `value` at the cursor, advancing it past the encoding.
    fn encode(&self, value: &Self::Value, cursor: &mut CursorMut<'_>) -> Result<()>;

    /// Reads a value at the cursor, advancing it past the encoding.
    fn decode(&self, cursor: &mut Cursor<'_>) -> Result<Self::Value>;

    /// Number of bytes the encoding at the cursor occupies, without
    /// consuming the cursor.
    fn exact_size_in_stream(&self, cursor: &Cursor<'_>) -> Result<usize>;

    /// Number of bytes `value` occupies when encoded.
    fn exact_size(&self, value: &Self::Value) -> usize;

    /// Whether every encoding of this encoder fits in `maximum_size()`.
    fn is_of_bound_size(&self) -> bool;

    /// Upper bound on encoding size. Meaningful only when
    /// `is_of_bound_size()` returns true.
    fn maximum_size(&self) -> usize;
}

/// Resolves an encoder-set version to a concrete encoder.
pub trait EncoderProvider {
    type Value;
    type Encoder: Encoder<Value = Self::Value>;

    fn encoder(&self, version: u8) -> Result<Self::Encoder>;
}

/// Rejects encoder-set versions this build does not know.
pub(crate) fn check_version(version: u8) -> Result<()> {
    ensure!(
        version == ENCODERS_VERSION,
        "unknown encoders version {}, this build supports version {}",
        version,
        ENCODERS_VERSION
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_version_is_accepted() {
        assert!(check_version(ENCODERS_VERSION).is_ok());
    }

    #[test]
    fn future_version_is_rejected() {
        let result = check_version(ENCODERS_VERSION + 1);

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unknown encoders version"));
    }
}
