//! # Node Error Kinds
//!
//! Contract-level failures of the node layer. Most fallible operations in
//! this crate return `eyre::Result` with descriptive messages; the variants
//! below are the cases a caller is expected to distinguish, so they are a
//! typed error that travels inside the `eyre::Report` and can be recovered
//! with `Report::downcast_ref`.
//!
//! - [`NodeError::TooLargeEntry`] is recoverable: the tree layer must
//!   reject the write instead of attempting a split.
//! - [`NodeError::LatchProtocolMisuse`] and [`NodeError::InvariantViolation`]
//!   are fatal to the session; the page must be discarded and reloaded by
//!   the cache layer rather than repaired in place.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    /// The full entry size exceeds the per-entry ceiling of a page.
    #[error("too large entry size {size}, maximum possible size is {max}")]
    TooLargeEntry { size: usize, max: usize },

    /// Mismatched begin/end pairs, byte access outside a latch session,
    /// mutation under a shared latch, or `end_read` with dirty fields.
    #[error("latch protocol misuse: {0}")]
    LatchProtocolMisuse(&'static str),

    /// An internal invariant of the page layout does not hold.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_entry_names_both_sizes() {
        let err = NodeError::TooLargeEntry {
            size: 2000,
            max: 1349,
        };

        let text = err.to_string();
        assert!(text.contains("2000"));
        assert!(text.contains("1349"));
    }

    #[test]
    fn downcasts_through_eyre_report() {
        let report = eyre::Report::new(NodeError::LatchProtocolMisuse(
            "end_write without begin_write",
        ));

        let node_err = report.downcast_ref::<NodeError>().unwrap();
        assert!(matches!(node_err, NodeError::LatchProtocolMisuse(_)));
    }
}
