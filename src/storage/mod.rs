//! # Storage Module
//!
//! This module provides the page-buffer layer the node code is built on:
//! fixed-size page buffers, their reader/writer latches, and bounds-checked
//! byte cursors for positional access within a page.
//!
//! ## Architecture Overview
//!
//! A [`PageHandle`] is the unit a cache layer hands out: a cheaply cloneable
//! reference to one page frame plus its latch. The node layer acquires the
//! latch for the duration of a read or write session and addresses the page
//! bytes through [`Cursor`]/[`CursorMut`], which perform all fixed-width
//! primitive reads and writes at explicit byte positions.
//!
//! ## Latching
//!
//! Each page carries its own `parking_lot::RwLock`. Sessions hold *owned*
//! arc guards (`arc_lock` feature), so a latched session is a value that can
//! live inside the node struct rather than a borrow tied to the handle.
//!
//! No ordering is established between different pages at this layer; the
//! tree layer sequences latch acquisition to avoid deadlock.
//!
//! ## Module Organization
//!
//! - `page`: page frames, handles, latches, and byte cursors

mod page;

pub use crate::config::PAGE_SIZE;
pub use page::{Cursor, CursorMut, ExclusivePageGuard, PageBytes, PageHandle, SharedPageGuard};
