//! # Block Markers
//!
//! A marker annotates a contiguous run of child pointers of an internal
//! node with the disk block that backs the pages those pointers refer to.
//! Markers are stored as fixed-width `(pointer_index, block_index,
//! block_pages_used)` triples immediately after the live record slots,
//! sorted by `pointer_index`. A marker covers the pointers from its
//! `pointer_index` up to (but not including) the next marker's.

/// A decoded marker of an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// Position of this marker within the node's marker array.
    pub index: usize,
    /// Index of the first child pointer the marker covers. Marker 0 also
    /// covers the node's left pointer.
    pub pointer_index: usize,
    /// Index of the backing allocator block.
    pub block_index: u64,
    /// Number of pages of the block currently in use.
    pub block_pages_used: usize,
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} at {}",
            self.block_index, self.block_pages_used, self.index
        )
    }
}
