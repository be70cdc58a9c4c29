//! # The SEB-Tree Node
//!
//! One node over one page. The node interprets the page bytes through a
//! key encoder and a value encoder resolved once per latch session, tracks
//! its header fields in a small write-back cache, and exposes the
//! primitive operations the tree layer composes: search, insert, update,
//! delete, marker maintenance, and the split-tail move.
//!
//! ## Space Accounting
//!
//! Record slots grow forward from `RECORDS_OFFSET`; out-of-line key and
//! value blobs grow backward from `PAGE_SIZE`. `free_data_position` marks
//! the first byte of the heap, so the free span of a page is the gap
//! between the end of the slot/marker area and `free_data_position`.
//! `full_entry_size` is exact: inserting a record of that size shrinks the
//! free span by exactly that many bytes, which is what lets the tree layer
//! predict overflow without trial encodes.
//!
//! ## Deletion
//!
//! Hard deletes free blobs by shifting the heap toward the tail of the
//! page and rewriting every slot position pointer below the freed blob.
//! This keeps the heap dense at all times at O(size) cost per delete; a
//! node is small, and a dense heap keeps the free-span arithmetic exact.
//! In tombstone-delete mode a leaf instead marks the record and frees only
//! the value blob, keeping the key visible as a deletion witness.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::config::{
    CLONE_BUFFER_SIZE, ENCODERS_VERSION, HALF_SIZE, INLINE_KEYS_SIZE_THRESHOLD,
    INLINE_VALUES_SIZE_THRESHOLD, MAX_ENTRY_SIZE, PAGE_SIZE, RECORDS_OFFSET,
};
use crate::encoding::{
    ByteEncoder, Encoder, EncoderProvider, PageIndexEncoder, PagePositionEncoder,
};
use crate::error::NodeError;
use crate::storage::{Cursor, CursorMut, ExclusivePageGuard, PageHandle, SharedPageGuard};

use super::marker::Marker;
use super::search::{compare_keys, is_insertion_point, to_index, to_minus_one_based_index};

// Header field offsets, in on-page order.
const FREE_DATA_POSITION_OFFSET: usize = 0;
const FLAGS_OFFSET: usize = FREE_DATA_POSITION_OFFSET + 4;
const SIZE_OFFSET: usize = FLAGS_OFFSET + 4;
const TREE_SIZE_OFFSET: usize = SIZE_OFFSET + 4;
const LEFT_POINTER_OFFSET: usize = TREE_SIZE_OFFSET + 8;
const MARKER_COUNT_OFFSET: usize = LEFT_POINTER_OFFSET + 8;
const LEFT_SIBLING_OFFSET: usize = MARKER_COUNT_OFFSET + 4;
const RIGHT_SIBLING_OFFSET: usize = LEFT_SIBLING_OFFSET + 8;

const _: () = assert!(RIGHT_SIBLING_OFFSET + 8 == RECORDS_OFFSET);

// Node flag bits.
const LEAF_FLAG_MASK: u32 = 1 << 0;
const CONTINUED_FROM_FLAG_MASK: u32 = 1 << 1;
const CONTINUED_TO_FLAG_MASK: u32 = 1 << 2;
const RECORD_FLAGS_FLAG_MASK: u32 = 1 << 3;
const EXTENSION_FLAG_MASK: u32 = 1 << 15;
const ENCODERS_VERSION_MASK: u32 = 0xFF00_0000;
const ENCODERS_VERSION_SHIFT: u32 = 24;

// Header write-back cache field bits.
const FREE_DATA_POSITION_FIELD: u8 = 1 << 0;
const FLAGS_FIELD: u8 = 1 << 1;
const SIZE_FIELD: u8 = 1 << 2;
const TREE_SIZE_FIELD: u8 = 1 << 3;
const MARKER_COUNT_FIELD: u8 = 1 << 4;

// Per-record flag bits.
const TOMBSTONE_RECORD_FLAG_MASK: u8 = 1 << 0;

enum Latch {
    Unlatched,
    Shared(SharedPageGuard),
    Exclusive(ExclusivePageGuard),
}

/// Derived layout constants and the encoder set of one latch session.
#[derive(Clone)]
struct Layout<KE, VE> {
    key: KE,
    value: VE,
    position: PagePositionEncoder,
    pointer: PageIndexEncoder,
    record_flags: ByteEncoder,
    keys_inlined: bool,
    values_inlined: bool,
    record_size: usize,
    marker_size: usize,
}

/// Snapshot of one surviving record taken before a split-tail rebuild.
struct RetainedRecord<K, V> {
    key: K,
    key_size: usize,
    /// `None` marks a tombstone.
    value: Option<(V, usize)>,
    flags: u8,
}

/// A node of an SEB-tree over one latched page.
///
/// The node is parameterized by a key and a value encoder provider; the
/// concrete encoders are resolved from the page's recorded encoder-set
/// version at session start. Construct one node per session; cached
/// header state does not survive latch hand-offs.
pub struct SebTreeNode<KP: EncoderProvider, VP: EncoderProvider> {
    page: PageHandle,
    latch: Latch,
    key_provider: KP,
    value_provider: VP,
    tombstone_delete: bool,
    layout: Option<Layout<KP::Encoder, VP::Encoder>>,
    loaded_fields: u8,
    dirty_fields: u8,
    free_data_position: usize,
    flags: u32,
    size: usize,
    tree_size: u64,
    marker_count: usize,
}

impl<KP, VP> SebTreeNode<KP, VP>
where
    KP: EncoderProvider,
    VP: EncoderProvider,
{
    /// Creates an unlatched node over `page`. `tombstone_delete` selects
    /// whether leaf deletes mark tombstones instead of removing records.
    pub fn new(page: PageHandle, key_provider: KP, value_provider: VP, tombstone_delete: bool) -> Self {
        Self {
            page,
            latch: Latch::Unlatched,
            key_provider,
            value_provider,
            tombstone_delete,
            layout: None,
            loaded_fields: 0,
            dirty_fields: 0,
            free_data_position: 0,
            flags: 0,
            size: 0,
            tree_size: 0,
            marker_count: 0,
        }
    }

    // ------------------------------------------------------------------
    // Latch sessions
    // ------------------------------------------------------------------

    /// Begins a read session: shared latch, eager `flags`/`size` load.
    pub fn begin_read(&mut self) -> Result<()> {
        self.check_unlatched("begin_read inside an active session")?;
        self.latch = Latch::Shared(self.page.acquire_shared());
        self.load_eager_fields()?;
        self.initialize(false)
    }

    /// Ends a read session. Fails if any header field was modified.
    pub fn end_read(&mut self) -> Result<()> {
        if !matches!(self.latch, Latch::Shared(_)) {
            return Err(NodeError::LatchProtocolMisuse("end_read without begin_read").into());
        }
        if self.dirty_fields != 0 {
            return Err(NodeError::LatchProtocolMisuse("end_read with dirty header fields").into());
        }
        self.loaded_fields = 0;
        self.latch = Latch::Unlatched;
        Ok(())
    }

    /// Begins a write session: exclusive latch, eager `flags`/`size` load.
    pub fn begin_write(&mut self) -> Result<()> {
        self.check_unlatched("begin_write inside an active session")?;
        self.latch = Latch::Exclusive(self.page.acquire_exclusive());
        self.load_eager_fields()?;
        self.initialize(false)
    }

    /// Ends a write session, flushing modified header fields to the page.
    pub fn end_write(&mut self) -> Result<()> {
        if !matches!(self.latch, Latch::Exclusive(_)) {
            return Err(NodeError::LatchProtocolMisuse("end_write without begin_write").into());
        }

        if self.dirty_fields != 0 {
            if self.dirty(FREE_DATA_POSITION_FIELD) {
                self.write_u32_at(FREE_DATA_POSITION_OFFSET, self.free_data_position as u32)?;
            }
            if self.dirty(FLAGS_FIELD) {
                self.write_u32_at(FLAGS_OFFSET, self.flags)?;
            }
            if self.dirty(SIZE_FIELD) {
                self.write_u32_at(SIZE_OFFSET, self.size as u32)?;
            }
            if self.dirty(TREE_SIZE_FIELD) {
                self.write_u64_at(TREE_SIZE_OFFSET, self.tree_size)?;
            }
            if self.dirty(MARKER_COUNT_FIELD) {
                self.write_u32_at(MARKER_COUNT_OFFSET, self.marker_count as u32)?;
            }
        }

        self.loaded_fields = 0;
        self.dirty_fields = 0;
        self.latch = Latch::Unlatched;
        Ok(())
    }

    /// Begins the creation session of a freshly allocated page: exclusive
    /// latch, no field loads. Follow with [`create`](Self::create) or
    /// [`create_dummy`](Self::create_dummy) and end with `end_write`.
    pub fn begin_create(&mut self) -> Result<()> {
        self.check_unlatched("begin_create inside an active session")?;
        self.latch = Latch::Exclusive(self.page.acquire_exclusive());
        Ok(())
    }

    /// Formats the page as an empty leaf or internal node.
    pub fn create(&mut self, leaf: bool) -> Result<()> {
        self.set_free_data_position(PAGE_SIZE);
        self.set_leaf(leaf);
        self.set_continued_from(false);
        self.set_continued_to(false);
        self.set_has_record_flags(leaf && self.tombstone_delete);
        self.set_encoders_version(ENCODERS_VERSION);
        self.set_flag(EXTENSION_FLAG_MASK, false);
        self.set_size(0);
        self.set_tree_size(0);
        self.set_marker_count(0);
        self.set_left_sibling(0)?;
        self.set_right_sibling(0)?;

        self.initialize(true)
    }

    /// Minimal formatting for pages that only serve as byte containers,
    /// e.g. clone targets: just the heap bound, no flags or counts.
    pub fn create_dummy(&mut self) {
        self.set_free_data_position(PAGE_SIZE);
    }

    /// Re-formats an empty leaf page as an internal node in place.
    pub fn convert_to_non_leaf(&mut self) -> Result<()> {
        if self.size != 0 {
            return Err(NodeError::InvariantViolation(
                "convert_to_non_leaf on a node that still holds records".into(),
            )
            .into());
        }

        self.set_free_data_position(PAGE_SIZE);
        self.set_leaf(false);
        self.set_continued_from(false);
        self.set_continued_to(false);
        self.set_has_record_flags(false);
        self.set_encoders_version(ENCODERS_VERSION);
        self.set_flag(EXTENSION_FLAG_MASK, false);
        self.set_size(0);
        self.set_marker_count(0);

        self.initialize(true)
    }

    /// The page's index in the backing store.
    pub fn page_index(&self) -> u64 {
        self.page.page_index()
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Binary search for `key`. Returns a hit index or an encoded
    /// insertion point (see [`super::search`]).
    pub fn index_of(&self, key: &KP::Value) -> Result<i32>
    where
        KP::Value: Ord,
    {
        let l = self.layout()?;

        let mut low = 0i32;
        let mut high = self.size as i32 - 1;
        while low <= high {
            let mid = (low + high) >> 1;
            let mid_key = self.read_key(&l, mid as usize)?;
            match compare_keys(key, &mid_key) {
                std::cmp::Ordering::Greater => low = mid + 1,
                std::cmp::Ordering::Less => high = mid - 1,
                std::cmp::Ordering::Equal => return Ok(mid),
            }
        }
        Ok(-(low + 1))
    }

    /// Child pointer selected by a record search result: an insertion
    /// point at 0 selects the left pointer, any other insertion point the
    /// pointer of the preceding record, a hit the pointer at that index.
    pub fn pointer_at(&self, search_index: i32) -> Result<u64> {
        if is_insertion_point(search_index) {
            let index = to_index(search_index);
            if index == 0 {
                self.get_left_pointer()
            } else {
                let l = self.layout()?;
                self.read_child_pointer(&l, index as usize - 1)
            }
        } else {
            let l = self.layout()?;
            self.read_child_pointer(&l, search_index as usize)
        }
    }

    /// The key of record `index`.
    pub fn key_at(&self, index: usize) -> Result<KP::Value> {
        self.check_record_index(index)?;
        let l = self.layout()?;
        self.read_key(&l, index)
    }

    /// The value of record `index`. Leaf only; tombstone value bytes are
    /// unspecified.
    pub fn value_at(&self, index: usize) -> Result<VP::Value> {
        self.check_record_index(index)?;
        let l = self.layout()?;
        self.read_value(&l, index)
    }

    /// Exact stored size of the key of record `index`.
    pub fn key_size_at(&self, index: usize) -> Result<usize> {
        let l = self.layout()?;
        self.stored_key_size(&l, index)
    }

    /// Exact stored size of the value of record `index`; 0 for an
    /// out-of-line tombstone.
    pub fn value_size_at(&self, index: usize, tombstone: bool) -> Result<usize> {
        let l = self.layout()?;
        if l.values_inlined {
            Ok(l.value.maximum_size())
        } else if tombstone {
            Ok(0)
        } else {
            let position = self.value_position(&l, index)?;
            l.value
                .exact_size_in_stream(&Cursor::new(self.bytes()?, position))
        }
    }

    /// Whether record `index` is a tombstone.
    pub fn is_tombstone_record(&self, index: usize) -> Result<bool> {
        if !self.tombstone_delete || !self.has_record_flags() {
            return Ok(false);
        }
        let l = self.layout()?;
        Ok(self.record_flags_byte(&l, index)? & TOMBSTONE_RECORD_FLAG_MASK != 0)
    }

    // ------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------

    /// Inserts a key/value record at the insertion point encoded in
    /// `search_index`. The caller guarantees the search was a miss and
    /// that the entry fits (see [`delta_fits`](Self::delta_fits)).
    pub fn insert_value(
        &mut self,
        search_index: i32,
        key: &KP::Value,
        key_size: usize,
        value: &VP::Value,
        value_size: usize,
    ) -> Result<()> {
        let index = to_index(search_index) as usize;
        ensure!(
            index <= self.size,
            "insertion point {} out of bounds (size={})",
            index,
            self.size
        );
        let l = self.layout()?;
        self.add_key_value(&l, index, key, key_size, value, value_size)
    }

    /// Inserts a tombstone record at the insertion point encoded in
    /// `search_index`.
    pub fn insert_tombstone(&mut self, search_index: i32, key: &KP::Value, key_size: usize) -> Result<()> {
        let index = to_index(search_index) as usize;
        ensure!(
            index <= self.size,
            "insertion point {} out of bounds (size={})",
            index,
            self.size
        );
        let l = self.layout()?;
        self.add_tombstone(&l, index, key, key_size)
    }

    /// Inserts a key/child-pointer record at `index` and re-indexes the
    /// markers: every marker covering pointers at or after `index` moves
    /// up by one.
    pub fn insert_pointer(&mut self, index: usize, key: &KP::Value, key_size: usize, pointer: u64) -> Result<()> {
        ensure!(
            index <= self.size,
            "insertion point {} out of bounds (size={})",
            index,
            self.size
        );
        let l = self.layout()?;
        self.add_key_pointer(&l, index, key, key_size, pointer)?;

        // Markers are sorted by pointer index, so walking from the back
        // can stop at the first one that precedes the insert.
        let marker_count = self.get_marker_count()?;
        for i in (0..marker_count).rev() {
            let marker_pointer_index = self.marker_pointer_index(&l, i)?;
            if marker_pointer_index < index {
                break;
            }
            let position = self.marker_position(&l, i);
            l.position.encode(
                &((marker_pointer_index + 1) as u16),
                &mut CursorMut::new(self.bytes_mut()?, position),
            )?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrites the value of record `index`. For out-of-line values the
    /// old blob is freed and a new one allocated whenever the size changes
    /// or the record was a tombstone (which owns no blob). Clears the
    /// tombstone mark if set.
    pub fn update_value(
        &mut self,
        index: usize,
        value: &VP::Value,
        value_size: usize,
        current_value_size: usize,
        was_tombstone: bool,
    ) -> Result<()> {
        self.check_record_index(index)?;
        let l = self.layout()?;

        let target = if !l.values_inlined && (current_value_size != value_size || was_tombstone) {
            let mut data_position = self.get_free_data_position()?;
            if !was_tombstone {
                let blob_position = self.value_position(&l, index)?;
                data_position = self.delete_data(&l, data_position, blob_position, current_value_size)?;
            }
            data_position = Self::allocate_data(data_position, value_size)?;

            let slot = self.record_value_position(&l, index);
            l.position.encode(
                &(data_position as u16),
                &mut CursorMut::new(self.bytes_mut()?, slot),
            )?;
            self.set_free_data_position(data_position);
            data_position
        } else {
            self.value_position(&l, index)?
        };

        l.value
            .encode(value, &mut CursorMut::new(self.bytes_mut()?, target))?;

        if was_tombstone {
            self.set_record_flag(&l, index, TOMBSTONE_RECORD_FLAG_MASK, false)?;
        }
        Ok(())
    }

    /// Overwrites the child pointer selected by `index`; -1 selects the
    /// left pointer.
    pub fn update_pointer(&mut self, index: i32, pointer: u64) -> Result<()> {
        if index == -1 {
            self.set_left_pointer(pointer)
        } else {
            let l = self.layout()?;
            let position = self.record_value_position(&l, index as usize);
            l.pointer
                .encode(&pointer, &mut CursorMut::new(self.bytes_mut()?, position))
        }
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Deletes record `index`. On a leaf in tombstone-delete mode the
    /// record is marked and only its value blob is freed; otherwise the
    /// record and its blobs are removed and the heap compacted.
    pub fn delete(&mut self, index: usize, key_size: usize, value_size: usize) -> Result<()> {
        self.check_record_index(index)?;
        let l = self.layout()?;
        if self.tombstone_delete && self.is_leaf() {
            self.convert_to_tombstone(&l, index, value_size)
        } else {
            self.remove_key(&l, index, key_size, value_size)
        }
    }

    // ------------------------------------------------------------------
    // Markers
    // ------------------------------------------------------------------

    /// Decodes marker `index` of the marker array.
    pub fn marker_at(&self, index: usize) -> Result<Marker> {
        let l = self.layout()?;
        self.read_marker(&l, index)
    }

    /// The marker whose run starts exactly at pointer `pointer_index`,
    /// if any.
    pub fn marker_for_pointer_at(&mut self, pointer_index: usize) -> Result<Option<Marker>> {
        let search_index = self.marker_search(pointer_index as i32)?;
        if is_insertion_point(search_index) {
            Ok(None)
        } else {
            Ok(Some(self.marker_at(search_index as usize)?))
        }
    }

    /// The marker covering the pointer selected by a record search
    /// result: the one with the largest `pointer_index` at or below it,
    /// clamped to marker 0 (which also covers the left pointer).
    pub fn nearest_marker(&mut self, pointer_search_index: i32) -> Result<Marker> {
        let search_index = self.marker_search(to_minus_one_based_index(pointer_search_index))?;
        let marker_index = if is_insertion_point(search_index) {
            to_index(search_index) - 1
        } else {
            search_index
        };
        self.marker_at(if marker_index == -1 { 0 } else { marker_index as usize })
    }

    /// The last pointer index still covered by marker `index`.
    pub fn last_pointer_index_of_marker_at(&mut self, index: usize) -> Result<usize> {
        let marker_count = self.get_marker_count()?;
        ensure!(
            index < marker_count,
            "marker index {} out of bounds (marker_count={})",
            index,
            marker_count
        );
        if index == marker_count - 1 {
            Ok(self.size - 1)
        } else {
            let l = self.layout()?;
            Ok(self.marker_pointer_index(&l, index + 1)? - 1)
        }
    }

    /// Binary search of the marker array by pointer index, in the same
    /// signed search-result convention as record search.
    pub fn marker_search(&mut self, pointer_index: i32) -> Result<i32> {
        let l = self.layout()?;
        let marker_count = self.get_marker_count()?;

        let mut low = 0i32;
        let mut high = marker_count as i32 - 1;
        while low <= high {
            let mid = (low + high) >> 1;
            let mid_val = self.marker_pointer_index(&l, mid as usize)? as i32;
            match pointer_index.cmp(&mid_val) {
                std::cmp::Ordering::Greater => low = mid + 1,
                std::cmp::Ordering::Less => high = mid - 1,
                std::cmp::Ordering::Equal => return Ok(mid),
            }
        }
        Ok(-(low + 1))
    }

    /// Inserts a marker at array position `index`.
    pub fn insert_marker(
        &mut self,
        index: usize,
        pointer_index: usize,
        block_index: u64,
        block_pages_used: usize,
    ) -> Result<()> {
        let l = self.layout()?;
        self.allocate_marker(&l, index)?;

        let position = self.marker_position(&l, index);
        {
            let mut cursor = CursorMut::new(self.bytes_mut()?, position);
            l.position.encode(&(pointer_index as u16), &mut cursor)?;
            l.pointer.encode(&block_index, &mut cursor)?;
            l.position.encode(&(block_pages_used as u16), &mut cursor)?;
        }

        let marker_count = self.get_marker_count()?;
        self.set_marker_count(marker_count + 1);
        Ok(())
    }

    /// Inserts a marker covering pointers from `pointer_index`, keeping
    /// the array sorted.
    pub fn insert_marker_for_pointer_at(
        &mut self,
        pointer_index: usize,
        block_index: u64,
        block_pages_used: usize,
    ) -> Result<()> {
        let search_index = self.marker_search(pointer_index as i32)?;
        let index = if is_insertion_point(search_index) {
            to_index(search_index)
        } else {
            search_index
        };
        self.insert_marker(index as usize, pointer_index, block_index, block_pages_used)
    }

    /// Overwrites the block usage of marker `index`.
    pub fn update_marker_usage(&mut self, index: usize, block_pages_used: usize) -> Result<()> {
        let l = self.layout()?;
        let position = self.marker_position(&l, index)
            + l.position.maximum_size()
            + l.pointer.maximum_size();
        l.position.encode(
            &(block_pages_used as u16),
            &mut CursorMut::new(self.bytes_mut()?, position),
        )
    }

    /// Overwrites the block index and usage of marker `index`.
    pub fn update_marker(&mut self, index: usize, block_index: u64, block_pages_used: usize) -> Result<()> {
        let l = self.layout()?;
        let position = self.marker_position(&l, index) + l.position.maximum_size();
        let mut cursor = CursorMut::new(self.bytes_mut()?, position);
        l.pointer.encode(&block_index, &mut cursor)?;
        l.position.encode(&(block_pages_used as u16), &mut cursor)
    }

    /// Checks marker-array invariants: sorted by pointer index, no
    /// duplicates, all indexes within the live record range, and none on
    /// a leaf.
    pub fn verify_markers(&mut self) -> Result<()> {
        let marker_count = self.get_marker_count()?;
        if self.is_leaf() {
            if marker_count != 0 {
                return Err(
                    NodeError::InvariantViolation("leaf node carries markers".into()).into(),
                );
            }
            return Ok(());
        }

        let mut previous: Option<usize> = None;
        for i in 0..marker_count {
            let marker = self.marker_at(i)?;
            if marker.pointer_index >= self.size {
                return Err(NodeError::InvariantViolation(format!(
                    "marker {} points at {} beyond the {} live records",
                    i, marker.pointer_index, self.size
                ))
                .into());
            }
            if let Some(previous) = previous {
                if marker.pointer_index <= previous {
                    return Err(NodeError::InvariantViolation(format!(
                        "marker {} pointer index {} is not above its predecessor's {}",
                        i, marker.pointer_index, previous
                    ))
                    .into());
                }
            }
            previous = Some(marker.pointer_index);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Space accounting
    // ------------------------------------------------------------------

    /// Exact number of free-span bytes a record of the given encoded key
    /// and value sizes consumes when inserted.
    pub fn full_entry_size(&self, key_size: usize, value_size: usize) -> Result<usize> {
        let l = self.layout()?;
        let mut size = key_size + value_size;

        if !l.keys_inlined {
            size += l.position.maximum_size();
        }
        if self.is_leaf() {
            if !l.values_inlined {
                size += l.position.maximum_size();
            }
            if self.has_record_flags() {
                size += l.record_flags.maximum_size();
            }
        }
        Ok(size)
    }

    /// Exact number of free-span bytes a tombstone of the given encoded
    /// key size consumes.
    pub fn full_tombstone_size(&self, key_size: usize) -> Result<usize> {
        if !self.is_leaf() {
            return Err(
                NodeError::InvariantViolation("tombstone sizing on an internal node".into()).into(),
            );
        }
        let l = self.layout()?;
        Ok(l.record_size + if l.keys_inlined { 0 } else { key_size })
    }

    /// Fails with [`NodeError::TooLargeEntry`] when an entry exceeds the
    /// per-entry ceiling; the tree layer must reject the write.
    pub fn check_entry_size(&self, entry_size: usize) -> Result<()> {
        if entry_size > MAX_ENTRY_SIZE {
            return Err(NodeError::TooLargeEntry {
                size: entry_size,
                max: MAX_ENTRY_SIZE,
            }
            .into());
        }
        Ok(())
    }

    /// Bytes between the end of the slot/marker area and the data heap.
    pub fn get_free_bytes(&mut self) -> Result<usize> {
        let l = self.layout()?;
        let free_data_position = self.get_free_data_position()?;
        let markers = if self.is_leaf() {
            0
        } else {
            self.get_marker_count()? * l.marker_size
        };
        let used = RECORDS_OFFSET + self.size * l.record_size + markers;
        free_data_position.checked_sub(used).ok_or_else(|| {
            NodeError::InvariantViolation("record area overlaps the data heap".into()).into()
        })
    }

    /// Whether `size_delta` more bytes still fit.
    pub fn delta_fits(&mut self, size_delta: usize) -> Result<bool> {
        Ok(size_delta <= self.get_free_bytes()?)
    }

    /// Whether one more marker still fits.
    pub fn marker_fits(&mut self) -> Result<bool> {
        let l = self.layout()?;
        self.delta_fits(l.marker_size)
    }

    // ------------------------------------------------------------------
    // Split support
    // ------------------------------------------------------------------

    /// Moves the last `length` records of this node to the front of
    /// `destination`, then rebuilds this node's surviving prefix, which
    /// compacts the data heap. On internal nodes the markers covering the
    /// moved pointers travel along, rebased to the destination's
    /// numbering; the first marker must stay behind.
    pub fn move_tail_to(&mut self, destination: &mut Self, length: usize) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        ensure!(
            length <= self.size,
            "cannot move {} records out of {}",
            length,
            self.size
        );

        if self.is_leaf() {
            self.leaf_move_tail_to(destination, length)
        } else {
            self.non_leaf_move_tail_to(destination, length)
        }
    }

    /// Number of tail records whose removal brings the free span to at
    /// least [`HALF_SIZE`]. Used by the split driver to pick the split
    /// point.
    pub fn count_entries_to_move_until_half_free(&mut self) -> Result<usize> {
        let l = self.layout()?;
        let leaf = self.is_leaf();

        let mut entries_to_move = 0;
        let mut bytes_free = self.get_free_bytes()?;
        for i in (0..self.size).rev() {
            if bytes_free >= HALF_SIZE {
                break;
            }

            let key_size = self.stored_key_size(&l, i)?;
            let value_size = if leaf {
                if self.is_tombstone_record(i)? {
                    if l.values_inlined {
                        l.value.maximum_size()
                    } else {
                        0
                    }
                } else if l.values_inlined {
                    l.value.maximum_size()
                } else {
                    let position = self.value_position(&l, i)?;
                    l.value
                        .exact_size_in_stream(&Cursor::new(self.bytes()?, position))?
                }
            } else {
                l.pointer.maximum_size()
            };

            bytes_free += self.full_entry_size(key_size, value_size)?;
            entries_to_move += 1;
        }
        Ok(entries_to_move)
    }

    /// Rewrites this page with a bytewise copy of `node`'s page. Cached
    /// header fields are not refreshed; end the session and begin a new
    /// one to observe the cloned header.
    pub fn clone_from(&mut self, node: &Self) -> Result<()> {
        let source = node.bytes()?;
        let target = self.bytes_mut()?;
        for chunk in 0..PAGE_SIZE / CLONE_BUFFER_SIZE {
            let start = chunk * CLONE_BUFFER_SIZE;
            target[start..start + CLONE_BUFFER_SIZE]
                .copy_from_slice(&source[start..start + CLONE_BUFFER_SIZE]);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Header accessors
    // ------------------------------------------------------------------

    pub fn get_free_data_position(&mut self) -> Result<usize> {
        if self.absent(FREE_DATA_POSITION_FIELD) {
            self.free_data_position = self.read_u32_at(FREE_DATA_POSITION_OFFSET)? as usize;
            self.loaded(FREE_DATA_POSITION_FIELD);
        }
        Ok(self.free_data_position)
    }

    pub fn set_free_data_position(&mut self, value: usize) {
        self.changed(FREE_DATA_POSITION_FIELD);
        self.free_data_position = value;
    }

    #[inline]
    pub fn get_size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, value: usize) {
        self.changed(SIZE_FIELD);
        self.size = value;
    }

    pub fn get_tree_size(&mut self) -> Result<u64> {
        if self.absent(TREE_SIZE_FIELD) {
            self.tree_size = self.read_u64_at(TREE_SIZE_OFFSET)?;
            self.loaded(TREE_SIZE_FIELD);
        }
        Ok(self.tree_size)
    }

    pub fn set_tree_size(&mut self, value: u64) {
        self.changed(TREE_SIZE_FIELD);
        self.tree_size = value;
    }

    pub fn get_marker_count(&mut self) -> Result<usize> {
        if self.absent(MARKER_COUNT_FIELD) {
            self.marker_count = self.read_u32_at(MARKER_COUNT_OFFSET)? as usize;
            self.loaded(MARKER_COUNT_FIELD);
        }
        Ok(self.marker_count)
    }

    fn set_marker_count(&mut self, value: usize) {
        self.changed(MARKER_COUNT_FIELD);
        self.marker_count = value;
    }

    #[inline]
    pub fn get_flags(&self) -> u32 {
        self.flags
    }

    fn set_flags(&mut self, value: u32) {
        self.changed(FLAGS_FIELD);
        self.flags = value;
    }

    fn set_flag(&mut self, mask: u32, value: bool) {
        if value {
            self.set_flags(self.flags | mask);
        } else {
            self.set_flags(self.flags & !mask);
        }
    }

    #[inline]
    fn get_flag(&self, mask: u32) -> bool {
        self.flags & mask != 0
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.get_flag(LEAF_FLAG_MASK)
    }

    fn set_leaf(&mut self, value: bool) {
        self.set_flag(LEAF_FLAG_MASK, value);
    }

    pub fn is_continued_from(&self) -> bool {
        self.get_flag(CONTINUED_FROM_FLAG_MASK)
    }

    pub fn set_continued_from(&mut self, value: bool) {
        self.set_flag(CONTINUED_FROM_FLAG_MASK, value);
    }

    pub fn is_continued_to(&self) -> bool {
        self.get_flag(CONTINUED_TO_FLAG_MASK)
    }

    pub fn set_continued_to(&mut self, value: bool) {
        self.set_flag(CONTINUED_TO_FLAG_MASK, value);
    }

    pub fn has_record_flags(&self) -> bool {
        self.get_flag(RECORD_FLAGS_FLAG_MASK)
    }

    fn set_has_record_flags(&mut self, value: bool) {
        self.set_flag(RECORD_FLAGS_FLAG_MASK, value);
    }

    pub fn get_encoders_version(&self) -> u8 {
        ((self.flags & ENCODERS_VERSION_MASK) >> ENCODERS_VERSION_SHIFT) as u8
    }

    fn set_encoders_version(&mut self, value: u8) {
        self.set_flags(
            ((value as u32) << ENCODERS_VERSION_SHIFT) & ENCODERS_VERSION_MASK
                | (self.flags & !ENCODERS_VERSION_MASK),
        );
    }

    /// Child pointer for keys strictly below `key_at(0)`. Internal only.
    pub fn get_left_pointer(&self) -> Result<u64> {
        if self.is_leaf() {
            return Err(
                NodeError::InvariantViolation("left pointer access on a leaf node".into()).into(),
            );
        }
        self.read_u64_at(LEFT_POINTER_OFFSET)
    }

    pub fn set_left_pointer(&mut self, pointer: u64) -> Result<()> {
        if self.is_leaf() {
            return Err(
                NodeError::InvariantViolation("left pointer update on a leaf node".into()).into(),
            );
        }
        self.write_u64_at(LEFT_POINTER_OFFSET, pointer)
    }

    pub fn get_left_sibling(&self) -> Result<u64> {
        self.read_u64_at(LEFT_SIBLING_OFFSET)
    }

    pub fn set_left_sibling(&mut self, pointer: u64) -> Result<()> {
        self.write_u64_at(LEFT_SIBLING_OFFSET, pointer)
    }

    pub fn get_right_sibling(&self) -> Result<u64> {
        self.read_u64_at(RIGHT_SIBLING_OFFSET)
    }

    pub fn set_right_sibling(&mut self, pointer: u64) -> Result<()> {
        self.write_u64_at(RIGHT_SIBLING_OFFSET, pointer)
    }

    // ------------------------------------------------------------------
    // Session internals
    // ------------------------------------------------------------------

    fn check_record_index(&self, index: usize) -> Result<()> {
        ensure!(
            index < self.size,
            "record index {} out of bounds (size={})",
            index,
            self.size
        );
        Ok(())
    }

    fn check_unlatched(&self, context: &'static str) -> Result<()> {
        if matches!(self.latch, Latch::Unlatched) {
            Ok(())
        } else {
            Err(NodeError::LatchProtocolMisuse(context).into())
        }
    }

    fn load_eager_fields(&mut self) -> Result<()> {
        self.flags = self.read_u32_at(FLAGS_OFFSET)?;
        self.size = self.read_u32_at(SIZE_OFFSET)? as usize;
        self.loaded_fields = FLAGS_FIELD | SIZE_FIELD;
        Ok(())
    }

    /// Resolves the session's encoder set and derives the layout
    /// constants. Cheap after the first call unless `force`d by a
    /// re-format.
    fn initialize(&mut self, force: bool) -> Result<()> {
        if self.layout.is_some() && !force {
            return Ok(());
        }

        let version = self.get_encoders_version();
        let key = self.key_provider.encoder(version)?;
        let value = self.value_provider.encoder(version)?;
        let position = PagePositionEncoder::for_version(version)?;
        let pointer = PageIndexEncoder::for_version(version)?;
        let record_flags = ByteEncoder::for_version(version)?;

        let keys_inlined =
            key.is_of_bound_size() && key.maximum_size() <= INLINE_KEYS_SIZE_THRESHOLD;
        let values_inlined =
            value.is_of_bound_size() && value.maximum_size() <= INLINE_VALUES_SIZE_THRESHOLD;

        let mut record_size = if keys_inlined {
            key.maximum_size()
        } else {
            position.maximum_size()
        };
        let mut marker_size = 0;
        if self.is_leaf() {
            record_size += if values_inlined {
                value.maximum_size()
            } else {
                position.maximum_size()
            };
        } else {
            record_size += pointer.maximum_size();
            marker_size =
                position.maximum_size() + pointer.maximum_size() + position.maximum_size();
        }
        if self.has_record_flags() {
            record_size += record_flags.maximum_size();
        }

        self.layout = Some(Layout {
            key,
            value,
            position,
            pointer,
            record_flags,
            keys_inlined,
            values_inlined,
            record_size,
            marker_size,
        });
        Ok(())
    }

    fn layout(&self) -> Result<Layout<KP::Encoder, VP::Encoder>> {
        match &self.layout {
            Some(layout) => Ok(layout.clone()),
            None => Err(NodeError::LatchProtocolMisuse(
                "node operation outside an initialized session",
            )
            .into()),
        }
    }

    #[inline]
    fn absent(&self, field: u8) -> bool {
        self.loaded_fields & field == 0
    }

    #[inline]
    fn loaded(&mut self, field: u8) {
        self.loaded_fields |= field;
    }

    #[inline]
    fn dirty(&self, field: u8) -> bool {
        self.dirty_fields & field != 0
    }

    #[inline]
    fn changed(&mut self, field: u8) {
        self.dirty_fields |= field;
        self.loaded_fields |= field;
    }

    // ------------------------------------------------------------------
    // Page byte access
    // ------------------------------------------------------------------

    fn bytes(&self) -> Result<&[u8]> {
        match &self.latch {
            Latch::Shared(guard) => Ok(&guard[..]),
            Latch::Exclusive(guard) => Ok(&guard[..]),
            Latch::Unlatched => {
                Err(NodeError::LatchProtocolMisuse("page access outside a latch session").into())
            }
        }
    }

    fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.latch {
            Latch::Exclusive(guard) => Ok(&mut guard[..]),
            Latch::Shared(_) => {
                Err(NodeError::LatchProtocolMisuse("page mutation under a shared latch").into())
            }
            Latch::Unlatched => {
                Err(NodeError::LatchProtocolMisuse("page access outside a latch session").into())
            }
        }
    }

    fn read_u32_at(&self, offset: usize) -> Result<u32> {
        Cursor::new(self.bytes()?, offset).read_u32()
    }

    fn read_u64_at(&self, offset: usize) -> Result<u64> {
        Cursor::new(self.bytes()?, offset).read_u64()
    }

    fn write_u32_at(&mut self, offset: usize, value: u32) -> Result<()> {
        CursorMut::new(self.bytes_mut()?, offset).write_u32(value)
    }

    fn write_u64_at(&mut self, offset: usize, value: u64) -> Result<()> {
        CursorMut::new(self.bytes_mut()?, offset).write_u64(value)
    }

    fn move_data(&mut self, source: usize, target: usize, length: usize) -> Result<()> {
        let bytes = self.bytes_mut()?;
        ensure!(
            source + length <= bytes.len() && target + length <= bytes.len(),
            "data move of {} bytes from {} to {} overruns the page",
            length,
            source,
            target
        );
        bytes.copy_within(source..source + length, target);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Record layout arithmetic
    // ------------------------------------------------------------------

    fn record_position(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> usize {
        RECORDS_OFFSET + index * l.record_size
    }

    fn record_key_position(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> usize {
        self.record_position(l, index)
    }

    fn record_value_position(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> usize {
        self.record_key_position(l, index)
            + if l.keys_inlined {
                l.key.maximum_size()
            } else {
                l.position.maximum_size()
            }
    }

    fn record_flags_position(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> usize {
        self.record_value_position(l, index)
            + if l.values_inlined {
                l.value.maximum_size()
            } else {
                l.position.maximum_size()
            }
    }

    fn marker_position(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> usize {
        RECORDS_OFFSET + self.size * l.record_size + index * l.marker_size
    }

    /// Position of the key bytes of record `index`, following the slot's
    /// indirection for out-of-line keys.
    fn key_position(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<usize> {
        let slot = self.record_key_position(l, index);
        if l.keys_inlined {
            Ok(slot)
        } else {
            let mut cursor = Cursor::new(self.bytes()?, slot);
            Ok(l.position.decode(&mut cursor)? as usize)
        }
    }

    /// Position of the value bytes of record `index`, following the
    /// slot's indirection for out-of-line values.
    fn value_position(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<usize> {
        let slot = self.record_value_position(l, index);
        if l.values_inlined {
            Ok(slot)
        } else {
            let mut cursor = Cursor::new(self.bytes()?, slot);
            Ok(l.position.decode(&mut cursor)? as usize)
        }
    }

    fn read_key(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<KP::Value> {
        let position = self.key_position(l, index)?;
        l.key.decode(&mut Cursor::new(self.bytes()?, position))
    }

    fn read_value(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<VP::Value> {
        let position = self.value_position(l, index)?;
        l.value.decode(&mut Cursor::new(self.bytes()?, position))
    }

    fn read_child_pointer(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<u64> {
        let position = self.record_value_position(l, index);
        l.pointer.decode(&mut Cursor::new(self.bytes()?, position))
    }

    fn stored_key_size(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<usize> {
        if l.keys_inlined {
            Ok(l.key.maximum_size())
        } else {
            let position = self.key_position(l, index)?;
            l.key
                .exact_size_in_stream(&Cursor::new(self.bytes()?, position))
        }
    }

    fn record_flags_byte(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<u8> {
        if !self.has_record_flags() {
            return Err(NodeError::InvariantViolation(
                "record flags access on a node without record flags".into(),
            )
            .into());
        }
        let position = self.record_flags_position(l, index);
        l.record_flags.decode(&mut Cursor::new(self.bytes()?, position))
    }

    fn set_record_flags_byte(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        flags: u8,
    ) -> Result<()> {
        if !self.has_record_flags() {
            return Err(NodeError::InvariantViolation(
                "record flags update on a node without record flags".into(),
            )
            .into());
        }
        let position = self.record_flags_position(l, index);
        l.record_flags
            .encode(&flags, &mut CursorMut::new(self.bytes_mut()?, position))
    }

    fn set_record_flag(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        mask: u8,
        value: bool,
    ) -> Result<()> {
        let current = self.record_flags_byte(l, index)?;
        let updated = if value { current | mask } else { current & !mask };
        self.set_record_flags_byte(l, index, updated)
    }

    fn marker_pointer_index(
        &self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        marker_index: usize,
    ) -> Result<usize> {
        let position = self.marker_position(l, marker_index);
        let mut cursor = Cursor::new(self.bytes()?, position);
        Ok(l.position.decode(&mut cursor)? as usize)
    }

    fn read_marker(&self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<Marker> {
        let mut cursor = Cursor::new(self.bytes()?, self.marker_position(l, index));
        let pointer_index = l.position.decode(&mut cursor)? as usize;
        let block_index = l.pointer.decode(&mut cursor)?;
        let block_pages_used = l.position.decode(&mut cursor)? as usize;
        Ok(Marker {
            index,
            pointer_index,
            block_index,
            block_pages_used,
        })
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    /// Opens a slot at `index` by shifting the tail slots together with
    /// the whole marker array one record width to the right.
    fn allocate_record(&mut self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<()> {
        let record_position = self.record_position(l, index);
        let marker_count = self.get_marker_count()?;
        if index < self.size || marker_count > 0 {
            self.move_data(
                record_position,
                record_position + l.record_size,
                (self.size - index) * l.record_size + marker_count * l.marker_size,
            )?;
        }
        Ok(())
    }

    /// Closes the slot at `index` by shifting the tail slots and the
    /// marker array one record width to the left.
    fn delete_record(&mut self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<()> {
        let record_position = self.record_position(l, index);
        let marker_count = self.get_marker_count()?;
        if index < self.size - 1 || marker_count > 0 {
            self.move_data(
                record_position + l.record_size,
                record_position,
                (self.size - index - 1) * l.record_size + marker_count * l.marker_size,
            )?;
        }
        Ok(())
    }

    /// Opens a marker slot at array position `index`.
    fn allocate_marker(&mut self, l: &Layout<KP::Encoder, VP::Encoder>, index: usize) -> Result<()> {
        let marker_position = self.marker_position(l, index);
        let marker_count = self.get_marker_count()?;
        if index < marker_count {
            self.move_data(
                marker_position,
                marker_position + l.marker_size,
                (marker_count - index) * l.marker_size,
            )?;
        }
        Ok(())
    }

    fn allocate_data(free_position: usize, length: usize) -> Result<usize> {
        free_position.checked_sub(length).ok_or_else(|| {
            NodeError::InvariantViolation("data heap allocation below the page start".into()).into()
        })
    }

    /// Stores the key part of a fresh slot at `index`: inline bytes, or a
    /// heap blob behind a position pointer.
    fn store_key(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        key: &KP::Value,
        key_size: usize,
    ) -> Result<()> {
        let slot = self.record_key_position(l, index);
        if l.keys_inlined {
            l.key
                .encode(key, &mut CursorMut::new(self.bytes_mut()?, slot))?;
        } else {
            let data_position = Self::allocate_data(self.get_free_data_position()?, key_size)?;
            l.position.encode(
                &(data_position as u16),
                &mut CursorMut::new(self.bytes_mut()?, slot),
            )?;
            l.key
                .encode(key, &mut CursorMut::new(self.bytes_mut()?, data_position))?;
            self.set_free_data_position(data_position);
        }
        Ok(())
    }

    fn add_key_value(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        key: &KP::Value,
        key_size: usize,
        value: &VP::Value,
        value_size: usize,
    ) -> Result<()> {
        self.allocate_record(l, index)?;
        self.store_key(l, index, key, key_size)?;

        let slot = self.record_value_position(l, index);
        if l.values_inlined {
            l.value
                .encode(value, &mut CursorMut::new(self.bytes_mut()?, slot))?;
        } else {
            let data_position = Self::allocate_data(self.get_free_data_position()?, value_size)?;
            l.position.encode(
                &(data_position as u16),
                &mut CursorMut::new(self.bytes_mut()?, slot),
            )?;
            l.value
                .encode(value, &mut CursorMut::new(self.bytes_mut()?, data_position))?;
            self.set_free_data_position(data_position);
        }

        if self.has_record_flags() {
            self.set_record_flags_byte(l, index, 0)?;
        }
        self.set_size(self.size + 1);
        Ok(())
    }

    fn add_tombstone(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        key: &KP::Value,
        key_size: usize,
    ) -> Result<()> {
        if !self.tombstone_delete {
            return Err(NodeError::InvariantViolation(
                "tombstone insert without tombstone-delete mode".into(),
            )
            .into());
        }
        self.allocate_record(l, index)?;
        self.store_key(l, index, key, key_size)?;
        self.set_record_flags_byte(l, index, TOMBSTONE_RECORD_FLAG_MASK)?;
        self.set_size(self.size + 1);
        Ok(())
    }

    fn add_key_pointer(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        key: &KP::Value,
        key_size: usize,
        pointer: u64,
    ) -> Result<()> {
        self.allocate_record(l, index)?;
        self.store_key(l, index, key, key_size)?;

        let slot = self.record_value_position(l, index);
        l.pointer
            .encode(&pointer, &mut CursorMut::new(self.bytes_mut()?, slot))?;

        self.set_size(self.size + 1);
        Ok(())
    }

    fn remove_key(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        key_size: usize,
        value_size: usize,
    ) -> Result<()> {
        if !l.keys_inlined {
            let key_data_position = self.key_position(l, index)?;
            let free_data_position = self.get_free_data_position()?;
            let updated = self.delete_data(l, free_data_position, key_data_position, key_size)?;
            self.set_free_data_position(updated);
        }

        // Re-read the value pointer only now: freeing the key blob may
        // have shifted it.
        if self.is_leaf() && !l.values_inlined {
            let value_data_position = self.value_position(l, index)?;
            let free_data_position = self.get_free_data_position()?;
            let updated = self.delete_data(l, free_data_position, value_data_position, value_size)?;
            self.set_free_data_position(updated);
        }

        self.delete_record(l, index)?;
        self.set_size(self.size - 1);
        Ok(())
    }

    fn convert_to_tombstone(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        index: usize,
        value_size: usize,
    ) -> Result<()> {
        self.set_record_flag(l, index, TOMBSTONE_RECORD_FLAG_MASK, true)?;

        if !l.values_inlined {
            let value_data_position = self.value_position(l, index)?;
            let free_data_position = self.get_free_data_position()?;
            let updated = self.delete_data(l, free_data_position, value_data_position, value_size)?;
            self.set_free_data_position(updated);
        }
        Ok(())
    }

    /// Frees `length` heap bytes at `position` by shifting the heap span
    /// `[free_position, position)` toward the page tail, then rewrites
    /// every slot position pointer below `position`. Returns the new free
    /// data position. O(size): every slot may need its pointer rewritten,
    /// which is what keeps the heap dense.
    fn delete_data(
        &mut self,
        l: &Layout<KP::Encoder, VP::Encoder>,
        free_position: usize,
        position: usize,
        length: usize,
    ) -> Result<usize> {
        if position > free_position {
            self.move_data(free_position, free_position + length, position - free_position)?;

            let leaf = self.is_leaf();
            for i in 0..self.size {
                if !l.keys_inlined {
                    let slot = self.record_key_position(l, i);
                    let key_data_position =
                        l.position.decode(&mut Cursor::new(self.bytes()?, slot))? as usize;
                    if key_data_position < position {
                        l.position.encode(
                            &((key_data_position + length) as u16),
                            &mut CursorMut::new(self.bytes_mut()?, slot),
                        )?;
                    }
                }

                if leaf && !l.values_inlined {
                    let slot = self.record_value_position(l, i);
                    let value_data_position =
                        l.position.decode(&mut Cursor::new(self.bytes()?, slot))? as usize;
                    if value_data_position < position {
                        l.position.encode(
                            &((value_data_position + length) as u16),
                            &mut CursorMut::new(self.bytes_mut()?, slot),
                        )?;
                    }
                }
            }
        }

        Ok(free_position + length)
    }

    /// Resets the page to empty without touching flags or siblings.
    fn clear(&mut self) {
        self.set_size(0);
        if !self.is_leaf() {
            self.set_marker_count(0);
        }
        self.set_free_data_position(PAGE_SIZE);
    }

    fn leaf_move_tail_to(&mut self, destination: &mut Self, length: usize) -> Result<()> {
        let l = self.layout()?;
        let dl = destination.layout()?;
        let remaining = self.size - length;

        let has_record_flags = self.has_record_flags();
        let destination_has_record_flags = destination.has_record_flags();

        for i in 0..length {
            let index = remaining + i;

            let key = self.read_key(&l, index)?;
            let key_size = self.stored_key_size(&l, index)?;

            if self.is_tombstone_record(index)? {
                destination.add_tombstone(&dl, i, &key, key_size)?;
            } else {
                let value = self.read_value(&l, index)?;
                let value_size = self.value_size_at(index, false)?;
                destination.add_key_value(&dl, i, &key, key_size, &value, value_size)?;
            }

            if destination_has_record_flags {
                let flags = if has_record_flags {
                    self.record_flags_byte(&l, index)?
                } else {
                    0
                };
                destination.set_record_flags_byte(&dl, i, flags)?;
            }
        }

        // Snapshot the surviving prefix, then rebuild it from scratch.
        // Re-inserting in order compacts the data heap.
        let mut retained: SmallVec<[RetainedRecord<KP::Value, VP::Value>; 16]> =
            SmallVec::with_capacity(remaining);
        for i in 0..remaining {
            let key = self.read_key(&l, i)?;
            let key_size = self.stored_key_size(&l, i)?;
            let tombstone = self.is_tombstone_record(i)?;
            let value = if tombstone {
                None
            } else {
                let value = self.read_value(&l, i)?;
                let value_size = self.value_size_at(i, false)?;
                Some((value, value_size))
            };
            let flags = if has_record_flags {
                self.record_flags_byte(&l, i)?
            } else {
                0
            };
            retained.push(RetainedRecord {
                key,
                key_size,
                value,
                flags,
            });
        }

        self.clear();
        for (i, record) in retained.iter().enumerate() {
            match &record.value {
                None => self.add_tombstone(&l, i, &record.key, record.key_size)?,
                Some((value, value_size)) => {
                    self.add_key_value(&l, i, &record.key, record.key_size, value, *value_size)?
                }
            }
            if has_record_flags {
                self.set_record_flags_byte(&l, i, record.flags)?;
            }
        }
        Ok(())
    }

    fn non_leaf_move_tail_to(&mut self, destination: &mut Self, length: usize) -> Result<()> {
        let l = self.layout()?;
        let dl = destination.layout()?;
        let remaining = self.size - length;
        let marker_count = self.get_marker_count()?;

        for i in 0..length {
            let index = remaining + i;

            let key = self.read_key(&l, index)?;
            let key_size = self.stored_key_size(&l, index)?;
            let pointer = self.read_child_pointer(&l, index)?;

            destination.add_key_pointer(&dl, i, &key, key_size, pointer)?;
        }

        let search_index = self.marker_search(remaining as i32)?;
        let marker_index = if is_insertion_point(search_index) {
            to_index(search_index) as usize
        } else {
            search_index as usize
        };
        // Marker 0 covers the left pointer, which never moves; callers
        // must arrange splits so it stays behind.
        if marker_count > 0 && marker_index == 0 {
            return Err(NodeError::InvariantViolation(
                "split would move the first marker out of the source node".into(),
            )
            .into());
        }

        for i in marker_index..marker_count {
            let marker = self.read_marker(&l, i)?;
            destination.insert_marker(
                i - marker_index,
                marker.pointer_index - remaining,
                marker.block_index,
                marker.block_pages_used,
            )?;
        }

        let mut retained: SmallVec<[(KP::Value, usize, u64); 16]> =
            SmallVec::with_capacity(remaining);
        for i in 0..remaining {
            let key = self.read_key(&l, i)?;
            let key_size = self.stored_key_size(&l, i)?;
            let pointer = self.read_child_pointer(&l, i)?;
            retained.push((key, key_size, pointer));
        }

        let mut retained_markers: SmallVec<[(usize, u64, usize); 8]> =
            SmallVec::with_capacity(marker_index);
        for i in 0..marker_index {
            let marker = self.read_marker(&l, i)?;
            retained_markers.push((marker.pointer_index, marker.block_index, marker.block_pages_used));
        }

        self.clear();
        for (i, (key, key_size, pointer)) in retained.iter().enumerate() {
            self.add_key_pointer(&l, i, key, *key_size, *pointer)?;
        }
        for (i, &(pointer_index, block_index, block_pages_used)) in
            retained_markers.iter().enumerate()
        {
            self.insert_marker(i, pointer_index, block_index, block_pages_used)?;
        }
        Ok(())
    }
}

impl<KP, VP> std::fmt::Display for SebTreeNode<KP, VP>
where
    KP: EncoderProvider,
    VP: EncoderProvider,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            if self.is_leaf() { "Leaf" } else { "Int." },
            self.page_index()
        )
    }
}
