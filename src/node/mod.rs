//! # SEB-Tree Page Nodes
//!
//! This module implements the page node of an SEB-tree: one fixed-size
//! page holding either an ordered run of key/value records (leaf) or
//! key/child-pointer records plus block markers (internal). The node is
//! the atomic unit of caching, latching, and durability; higher layers
//! compose nodes into a tree and decide when to split or merge.
//!
//! ## Page Layout
//!
//! ```text
//! +--------------------------------+ 0
//! | Header (48 bytes, fixed)       |   free_data_position, flags, size,
//! |                                |   tree_size, left_pointer,
//! |                                |   marker_count, siblings
//! +--------------------------------+ RECORDS_OFFSET
//! | Record slots (fixed width)     |   grows forward
//! |   [slot 0][slot 1]...          |
//! +--------------------------------+
//! | Marker array (internal only)   |   immediately after live slots,
//! |   [marker 0][marker 1]...      |   moves when slots are inserted
//! +--------------------------------+
//! | Free space                     |
//! +--------------------------------+ free_data_position
//! | Data heap                      |   grows backward; out-of-line
//! |   [blob][blob]...              |   key/value bytes
//! +--------------------------------+ PAGE_SIZE
//! ```
//!
//! Each record slot holds a key part (inline bytes or a u16 position of an
//! out-of-line blob), a value part (leaf: inline bytes or blob position;
//! internal: a u64 child pointer), and, on leaves in tombstone-delete
//! mode, a one-byte record-flags field.
//!
//! ## Sessions
//!
//! A node is driven in latch sessions: `begin_read`/`end_read` under the
//! page's shared latch, `begin_write`/`end_write` (or `begin_create` +
//! `create`) under the exclusive latch. Header fields are cached in the
//! node struct, lazily loaded on first access, and flushed back on
//! `end_write` only if modified. An error during a write session leaves
//! the cached fields unspecified; discard the node without calling
//! `end_write` and let the cache layer reload the page.
//!
//! ## Module Organization
//!
//! - [`node`]: the node itself and all its operations
//! - [`marker`]: the decoded marker triple
//! - [`search`]: signed search-result arithmetic and the default key
//!   comparator

pub mod marker;
pub mod node;
pub mod search;

pub use marker::Marker;
pub use node::SebTreeNode;
pub use search::{
    compare_keys, is_insertion_point, to_index, to_insertion_point, to_minus_one_based_index,
};
