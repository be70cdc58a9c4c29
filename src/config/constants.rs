//! # Configuration Constants
//!
//! This module centralizes the page geometry and encoding configuration.
//! Constants that depend on each other are co-located to prevent mismatch
//! bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> RECORDS_OFFSET (48 bytes of fixed header fields)
//!       │
//!       ├─> PAGE_SPACE (derived: PAGE_SIZE - RECORDS_OFFSET)
//!       │         │
//!       │         ├─> MAX_ENTRY_SIZE (PAGE_SPACE / 3)
//!       │         │     A single entry may never consume more than a third
//!       │         │     of a page, so a split always produces two nodes
//!       │         │     that can each absorb one more maximal entry.
//!       │         │
//!       │         └─> HALF_SIZE (PAGE_SPACE / 2)
//!       │               Split target: move tail entries until at least
//!       │               half of the record space is free.
//!       │
//!       └─> CLONE_BUFFER_SIZE (must divide PAGE_SIZE evenly)
//!
//! INLINE_KEYS_SIZE_THRESHOLD / INLINE_VALUES_SIZE_THRESHOLD
//!       Bounded encoders at or below the threshold store their bytes
//!       directly in the record slot; everything else goes to the data
//!       heap behind a u16 position pointer.
//! ```
//!
//! ## Critical Invariants
//!
//! Enforced by compile-time assertions below:
//!
//! 1. `PAGE_SPACE == PAGE_SIZE - RECORDS_OFFSET`
//! 2. `CLONE_BUFFER_SIZE` divides `PAGE_SIZE` evenly
//! 3. `MAX_ENTRY_SIZE < HALF_SIZE` (a maximal entry fits a half-empty node)

/// Size of each page in bytes. This is the fundamental unit of caching,
/// latching, and durability; a node occupies exactly one page.
pub const PAGE_SIZE: usize = 4096;

/// Byte offset of the record slot area: the fixed header fields end here.
///
/// Header layout (little-endian, in order):
///
/// ```text
/// Offset  Size  Field
/// ------  ----  ------------------
/// 0       4     free_data_position
/// 4       4     flags
/// 8       4     size
/// 12      8     tree_size
/// 20      8     left_pointer
/// 28      4     marker_count
/// 32      8     left_sibling
/// 40      8     right_sibling
/// ```
pub const RECORDS_OFFSET: usize = 48;

/// Space available to records, markers, and the data heap.
pub const PAGE_SPACE: usize = PAGE_SIZE - RECORDS_OFFSET;

/// Largest full entry size a node accepts. Larger entries must be rejected
/// by the tree layer rather than split.
pub const MAX_ENTRY_SIZE: usize = PAGE_SPACE / 3;

/// Split target: a tail move stops once at least this many bytes are free.
pub const HALF_SIZE: usize = PAGE_SPACE / 2;

/// Chunk size for whole-page clone copies.
pub const CLONE_BUFFER_SIZE: usize = 1024;

/// Keys whose encoder is bounded with maximum size at or below this
/// threshold are stored inline in the record slot.
pub const INLINE_KEYS_SIZE_THRESHOLD: usize = 16;

/// Values whose encoder is bounded with maximum size at or below this
/// threshold are stored inline in the record slot.
pub const INLINE_VALUES_SIZE_THRESHOLD: usize = 16;

/// Version of the encoder set used to interpret pages written by this
/// build. Stored in the high byte of the node flags word.
pub const ENCODERS_VERSION: u8 = 0;

const _: () = assert!(
    PAGE_SPACE == PAGE_SIZE - RECORDS_OFFSET,
    "PAGE_SPACE must be derived from PAGE_SIZE and RECORDS_OFFSET"
);

const _: () = assert!(
    PAGE_SIZE % CLONE_BUFFER_SIZE == 0,
    "CLONE_BUFFER_SIZE must divide PAGE_SIZE evenly"
);

const _: () = assert!(
    MAX_ENTRY_SIZE < HALF_SIZE,
    "a maximal entry must fit into a half-empty node"
);
