//! # Page Buffers, Latches, and Cursors
//!
//! A page is a fixed `PAGE_SIZE` byte buffer. [`PageHandle`] pairs the
//! buffer with its reader/writer latch and the page's index in the backing
//! store; it is the object a buffer-cache layer would produce. All node
//! state lives in the page bytes, so the handle itself is trivially
//! cloneable and shareable across threads.
//!
//! ## Latch Protocol
//!
//! - `acquire_shared` blocks until a shared latch is available and returns
//!   an owned guard; any number of readers may hold the page concurrently.
//! - `acquire_exclusive` blocks for the single-writer latch.
//!
//! Guards are owned (`parking_lot` arc guards), so a session can store its
//! guard in a struct field and release it explicitly by dropping it. All
//! mutation of a page flows through the exclusive guard.
//!
//! ## Cursors
//!
//! [`Cursor`] and [`CursorMut`] provide positional, bounds-checked access
//! to fixed-width little-endian primitives and raw byte runs. Encoders
//! consume cursors; the node layer creates short-lived cursors at computed
//! offsets instead of threading one long-lived stream through every
//! operation.

use std::sync::Arc;

use eyre::{ensure, Result};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

use crate::config::PAGE_SIZE;

pub type PageBytes = Box<[u8; PAGE_SIZE]>;

/// Owned shared latch over one page.
pub type SharedPageGuard = ArcRwLockReadGuard<RawRwLock, PageBytes>;

/// Owned exclusive latch over one page.
pub type ExclusivePageGuard = ArcRwLockWriteGuard<RawRwLock, PageBytes>;

/// A reference to one page frame and its latch.
#[derive(Clone)]
pub struct PageHandle {
    page_index: u64,
    frame: Arc<RwLock<PageBytes>>,
}

impl PageHandle {
    /// Creates a handle over a freshly zeroed page frame.
    pub fn new_zeroed(page_index: u64) -> Self {
        Self {
            page_index,
            frame: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }

    /// The page's index in the backing store.
    #[inline]
    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    /// Acquires the shared latch, blocking until available.
    pub fn acquire_shared(&self) -> SharedPageGuard {
        self.frame.read_arc()
    }

    /// Acquires the exclusive latch, blocking until available.
    pub fn acquire_exclusive(&self) -> ExclusivePageGuard {
        self.frame.write_arc()
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_index", &self.page_index)
            .finish()
    }
}

/// Read cursor over page bytes.
#[derive(Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Moves the cursor relative to its current position.
    pub fn seek(&mut self, delta: isize) {
        self.position = self.position.wrapping_add_signed(delta);
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        ensure!(
            self.position + len <= self.data.len(),
            "read of {} bytes at {} overruns page of {} bytes",
            len,
            self.position,
            self.data.len()
        );
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Everything from the cursor position to the end of the page, without
    /// consuming cursor position.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Reads ahead without consuming cursor position.
    pub fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        ensure!(
            self.position + len <= self.data.len(),
            "peek of {} bytes at {} overruns page of {} bytes",
            len,
            self.position,
            self.data.len()
        );
        Ok(&self.data[self.position..self.position + len])
    }
}

/// Write cursor over page bytes.
#[derive(Debug)]
pub struct CursorMut<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> CursorMut<'a> {
    pub fn new(data: &'a mut [u8], position: usize) -> Self {
        Self { data, position }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn seek(&mut self, delta: isize) {
        self.position = self.position.wrapping_add_signed(delta);
    }

    fn take_mut(&mut self, len: usize) -> Result<&mut [u8]> {
        ensure!(
            self.position + len <= self.data.len(),
            "write of {} bytes at {} overruns page of {} bytes",
            len,
            self.position,
            self.data.len()
        );
        let slice = &mut self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.take_mut(1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.take_mut(2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.take_mut(4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.take_mut(8)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.take_mut(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_reports_page_index() {
        let page = PageHandle::new_zeroed(42);
        assert_eq!(page.page_index(), 42);
    }

    #[test]
    fn new_page_is_zeroed() {
        let page = PageHandle::new_zeroed(0);
        let guard = page.acquire_shared();

        assert!(guard.iter().all(|&b| b == 0));
    }

    #[test]
    fn shared_latch_allows_concurrent_readers() {
        let page = PageHandle::new_zeroed(1);

        let first = page.acquire_shared();
        let second = page.acquire_shared();

        assert_eq!(first[0], second[0]);
    }

    #[test]
    fn exclusive_latch_writes_are_visible_to_readers() {
        let page = PageHandle::new_zeroed(1);

        {
            let mut guard = page.acquire_exclusive();
            guard[7] = 0xAB;
        }

        let guard = page.acquire_shared();
        assert_eq!(guard[7], 0xAB);
    }

    #[test]
    fn cursor_round_trips_primitives() {
        let mut data = [0u8; 64];

        {
            let mut w = CursorMut::new(&mut data, 0);
            w.write_u8(0x11).unwrap();
            w.write_u16(0x2233).unwrap();
            w.write_u32(0x4455_6677).unwrap();
            w.write_u64(0x8899_AABB_CCDD_EEFF).unwrap();
            assert_eq!(w.position(), 15);
        }

        let mut r = Cursor::new(&data, 0);
        assert_eq!(r.read_u8().unwrap(), 0x11);
        assert_eq!(r.read_u16().unwrap(), 0x2233);
        assert_eq!(r.read_u32().unwrap(), 0x4455_6677);
        assert_eq!(r.read_u64().unwrap(), 0x8899_AABB_CCDD_EEFF);
        assert_eq!(r.position(), 15);
    }

    #[test]
    fn cursor_is_little_endian() {
        let mut data = [0u8; 4];
        CursorMut::new(&mut data, 0).write_u32(0x0102_0304).unwrap();

        assert_eq!(data, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn cursor_seek_moves_both_directions() {
        let data = [0u8; 16];
        let mut c = Cursor::new(&data, 8);

        c.seek(4);
        assert_eq!(c.position(), 12);

        c.seek(-10);
        assert_eq!(c.position(), 2);
    }

    #[test]
    fn cursor_read_past_end_fails() {
        let data = [0u8; 4];
        let mut c = Cursor::new(&data, 2);

        let result = c.read_u32();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("overruns"));
    }

    #[test]
    fn cursor_write_past_end_fails() {
        let mut data = [0u8; 4];
        let mut c = CursorMut::new(&mut data, 3);

        assert!(c.write_u16(1).is_err());
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [5u8, 6, 7, 8];
        let c = Cursor::new(&data, 1);

        assert_eq!(c.peek_bytes(2).unwrap(), &[6, 7]);
        assert_eq!(c.position(), 1);
    }
}
