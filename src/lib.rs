//! # sebtree - SEB-Tree Page Nodes
//!
//! This crate implements the page node of an SEB-tree, the B+-tree variant
//! used as the sorted component of an LSM-tree. A node occupies exactly one
//! fixed-size page and is the atomic unit of caching, latching, and
//! durability. The crate prioritizes:
//!
//! - **Bit-exact layout**: pages are interpreted through fixed header
//!   offsets and versioned encoders, so every build reads every page the
//!   same way
//! - **Deterministic space accounting**: `full_entry_size` is exactly the
//!   number of free bytes an insert consumes, letting the tree layer
//!   predict overflow without trial encodes
//! - **Minimal header traffic**: header fields are lazily loaded and
//!   written back only when modified
//!
//! ## Quick Start
//!
//! ```
//! use sebtree::encoding::{Encoder, I64Provider, StrEncoder, StrProvider};
//! use sebtree::node::SebTreeNode;
//! use sebtree::storage::PageHandle;
//!
//! # fn main() -> eyre::Result<()> {
//! let page = PageHandle::new_zeroed(1);
//! let mut node = SebTreeNode::new(page, I64Provider, StrProvider, false);
//!
//! node.begin_create()?;
//! node.create(true)?;
//!
//! let value = "hello".to_owned();
//! let search_index = node.index_of(&7)?;
//! node.insert_value(search_index, &7, 8, &value, StrEncoder.exact_size(&value))?;
//!
//! assert_eq!(node.value_at(0)?, "hello");
//! node.end_write()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Tree layer (traversal, splits)     │   out of scope
//! ├─────────────────────────────────────┤
//! │   SebTreeNode (this crate)           │   search / insert / update /
//! │                                      │   delete / markers / move-tail
//! ├──────────────────┬──────────────────┤
//! │   Encoders       │  Header cache     │   versioned codecs, dirty-
//! │                  │                   │   field write-back
//! ├──────────────────┴──────────────────┤
//! │   PageHandle + latch + cursors       │   fixed-size page buffers
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Page Layout
//!
//! Every page holds a 48-byte header, a forward-growing array of
//! fixed-width record slots, on internal nodes a marker array directly
//! after the live slots, and a backward-growing data heap for out-of-line
//! key and value bytes. See [`node`] for the full layout.
//!
//! ## Concurrency
//!
//! A node only latches its own page: shared for reads, exclusive for
//! writes, with all mutations totally ordered by the exclusive latch.
//! Latch ordering across pages (lock coupling) is the tree layer's
//! responsibility.
//!
//! ## Module Overview
//!
//! - [`config`]: page geometry and encoding constants
//! - [`storage`]: page buffers, latches, byte cursors
//! - [`encoding`]: encoder traits, fixed and blob codecs, varints
//! - [`node`]: the node itself, markers, search-result arithmetic
//! - [`error`]: typed contract-level error kinds

pub mod config;
pub mod encoding;
pub mod error;
pub mod node;
pub mod storage;

pub use config::{HALF_SIZE, MAX_ENTRY_SIZE, PAGE_SIZE, PAGE_SPACE, RECORDS_OFFSET};
pub use error::NodeError;
pub use node::{Marker, SebTreeNode};
pub use storage::PageHandle;
