//! Row buffers and the bit descriptors fields bind to.
//!
//! A [`RowBuffer`] owns the bytes of one or more records laid out back to back
//! (current row, previous row, default values). Fields never own row memory:
//! each one holds a byte offset into the buffer plus an optional [`NullBit`].
//! Large-object payloads live out of line in a per-buffer arena; the record
//! itself stores the payload length followed by an 8-byte arena handle.
//!
//! BIT columns may keep their leftover high bits inside the null bitmap. Those
//! bits are described by a [`BitRange`]. [`validate_layout`] checks that no two
//! descriptors claim the same bit.

use std::collections::HashMap;

use crate::field::session::{FieldConfig, Session};
use crate::FieldError;

/// One null flag: a byte offset into the record and a single-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NullBit {
    pub offset: usize,
    pub mask: u8,
}

impl NullBit {
    pub fn new(offset: usize, mask: u8) -> Self {
        NullBit { offset, mask }
    }

    /// The same bit, shifted by a record offset.
    pub fn shifted(self, diff: isize) -> Self {
        NullBit {
            offset: offset_add(self.offset, diff),
            mask: self.mask,
        }
    }
}

/// Up to 7 high bits of a BIT value stored inside the null bitmap.
///
/// `shift` is the bit position inside the byte at `offset`; a range may spill
/// into the following byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    pub offset: usize,
    pub shift: u8,
    pub len: u8,
}

impl BitRange {
    pub fn shifted(self, diff: isize) -> Self {
        BitRange {
            offset: offset_add(self.offset, diff),
            ..self
        }
    }

    /// Per-byte masks covered by this range.
    pub fn byte_masks(&self) -> Vec<(usize, u8)> {
        let all = ((1u16 << self.len) - 1) << self.shift;
        let mut out = vec![(self.offset, (all & 0xFF) as u8)];
        if (all >> 8) != 0 {
            out.push((self.offset + 1, (all >> 8) as u8));
        }
        out
    }
}

pub(crate) fn offset_add(offset: usize, diff: isize) -> usize {
    (offset as isize + diff) as usize
}

/// A bit-ownership claim used for layout validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitClaim {
    Null(NullBit),
    Bits(BitRange),
}

/// Reject layouts where two claims own the same bit.
///
/// Sharing a byte is fine as long as the masks are disjoint.
pub fn validate_layout(claims: &[(String, BitClaim)]) -> Result<(), FieldError> {
    let mut owners: HashMap<usize, (u8, &str)> = HashMap::new();
    for (name, claim) in claims {
        let masks = match claim {
            BitClaim::Null(nb) => {
                if nb.mask.count_ones() != 1 {
                    return Err(FieldError::Argument(format!(
                        "null bit of '{}' must be a single bit, got mask 0x{:02x}",
                        name, nb.mask
                    )));
                }
                vec![(nb.offset, nb.mask)]
            }
            BitClaim::Bits(range) => {
                if range.len == 0 || range.len > 7 || range.shift > 7 {
                    return Err(FieldError::Argument(format!(
                        "bit range of '{}' is invalid (shift {}, len {})",
                        name, range.shift, range.len
                    )));
                }
                range.byte_masks()
            }
        };
        for (offset, mask) in masks {
            let entry = owners.entry(offset).or_insert((0, name.as_str()));
            if entry.0 & mask != 0 {
                return Err(FieldError::Argument(format!(
                    "'{}' overlaps bits of '{}' in null byte {}",
                    name, entry.1, offset
                )));
            }
            entry.0 |= mask;
            entry.1 = name.as_str();
        }
    }
    Ok(())
}

/// Out-of-line storage for large-object payloads.
///
/// Handles are 1-based; handle 0 means "no payload". Each slot counts the
/// record images that hold its handle. A store releases the handle it
/// replaces, and a slot whose count drops to zero is reused by the next
/// insert. Raw record copies that duplicate a handle must call
/// [`BlobArena::retain`].
#[derive(Debug, Clone, Default)]
pub struct BlobArena {
    slots: Vec<BlobSlot>,
    free: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
struct BlobSlot {
    bytes: Vec<u8>,
    refs: u32,
}

impl BlobArena {
    pub fn insert(&mut self, bytes: Vec<u8>) -> u64 {
        let slot = BlobSlot { bytes, refs: 1 };
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx as u64 + 1
            }
            None => {
                self.slots.push(slot);
                self.slots.len() as u64
            }
        }
    }

    pub fn get(&self, handle: u64) -> &[u8] {
        match self.live(handle) {
            Some(idx) => &self.slots[idx].bytes,
            None => &[],
        }
    }

    /// Record one more image holding `handle`.
    pub fn retain(&mut self, handle: u64) {
        if let Some(idx) = self.live(handle) {
            self.slots[idx].refs += 1;
        }
    }

    /// Drop one holder of `handle`, freeing the slot with its last holder.
    pub fn release(&mut self, handle: u64) {
        let Some(idx) = self.live(handle) else {
            return;
        };
        let slot = &mut self.slots[idx];
        slot.refs -= 1;
        if slot.refs == 0 {
            slot.bytes = Vec::new();
            self.free.push(idx);
        }
    }

    fn live(&self, handle: u64) -> Option<usize> {
        let idx = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.slots.get(idx).filter(|s| s.refs > 0).map(|_| idx)
    }

    /// Slots allocated so far, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently holding a payload.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

/// Bytes of one or more records plus the state stores need.
#[derive(Debug, Clone)]
pub struct RowBuffer {
    data: Vec<u8>,
    blobs: BlobArena,
    null_row: bool,
    session: Session,
}

impl RowBuffer {
    /// A zeroed buffer of `len` bytes under a default session.
    pub fn new(len: usize) -> Self {
        Self::with_session(len, Session::default())
    }

    pub fn with_config(len: usize, config: FieldConfig) -> Self {
        Self::with_session(len, Session::new(config))
    }

    pub fn with_session(len: usize, session: Session) -> Self {
        RowBuffer {
            data: vec![0u8; len],
            blobs: BlobArena::default(),
            null_row: false,
            session,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    pub fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.data[offset..offset + len]
    }

    /// Copy `len` bytes inside the buffer; ranges may overlap.
    pub fn copy_within(&mut self, from: usize, to: usize, len: usize) {
        self.data.copy_within(from..from + len, to);
    }

    /// Byte order of multi-byte integers inside this buffer's records.
    pub fn low_byte_first(&self) -> bool {
        self.session.config.low_byte_first
    }

    /// True when the whole row is a NULL-complemented outer-join row.
    pub fn null_row(&self) -> bool {
        self.null_row
    }

    pub fn set_null_row(&mut self, null_row: bool) {
        self.null_row = null_row;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn config(&self) -> &FieldConfig {
        &self.session.config
    }

    pub fn blob(&self, handle: u64) -> &[u8] {
        self.blobs.get(handle)
    }

    pub fn alloc_blob(&mut self, bytes: Vec<u8>) -> u64 {
        self.blobs.insert(bytes)
    }

    pub fn retain_blob(&mut self, handle: u64) {
        self.blobs.retain(handle);
    }

    pub fn release_blob(&mut self, handle: u64) {
        self.blobs.release(handle);
    }

    pub fn blobs(&self) -> &BlobArena {
        &self.blobs
    }

    /// Drop every out-of-line payload. All stored handles become empty values.
    pub fn clear_blobs(&mut self) {
        self.blobs.clear();
    }

    pub fn test_bit(&self, bit: NullBit) -> bool {
        self.data[bit.offset] & bit.mask != 0
    }

    pub fn set_bit(&mut self, bit: NullBit) {
        self.data[bit.offset] |= bit.mask;
    }

    pub fn clear_bit(&mut self, bit: NullBit) {
        self.data[bit.offset] &= !bit.mask;
    }

    /// Read the leftover bits of a BIT column.
    pub fn get_rec_bits(&self, range: BitRange) -> u8 {
        let mut val = self.data[range.offset] as u16;
        if range.shift + range.len > 8 {
            val |= (self.data[range.offset + 1] as u16) << 8;
        }
        ((val >> range.shift) & ((1u16 << range.len) - 1)) as u8
    }

    /// Write the leftover bits of a BIT column, leaving neighbouring bits alone.
    pub fn set_rec_bits(&mut self, range: BitRange, bits: u8) {
        let mask = (1u16 << range.len) - 1;
        let bits = bits as u16 & mask;
        let first = &mut self.data[range.offset];
        *first = ((*first as u16 & !(mask << range.shift)) | (bits << range.shift)) as u8;
        if range.shift + range.len > 8 {
            let spill = 8 - range.shift;
            let second = &mut self.data[range.offset + 1];
            *second = ((*second as u16 & !(mask >> spill)) | (bits >> spill)) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_bits_are_isolated() {
        let mut row = RowBuffer::new(2);
        let a = NullBit::new(0, 0x01);
        let b = NullBit::new(0, 0x02);
        row.set_bit(a);
        assert!(row.test_bit(a));
        assert!(!row.test_bit(b));
        row.set_bit(b);
        row.clear_bit(a);
        assert!(!row.test_bit(a));
        assert!(row.test_bit(b));
        assert_eq!(row.bytes()[0], 0x02);
    }

    #[test]
    fn test_rec_bits_spanning_two_bytes() {
        let mut row = RowBuffer::new(2);
        row.bytes_mut()[0] = 0x0F;
        let range = BitRange { offset: 0, shift: 6, len: 5 };
        row.set_rec_bits(range, 0b10110);
        assert_eq!(row.get_rec_bits(range), 0b10110);
        // Low bits untouched.
        assert_eq!(row.bytes()[0] & 0x3F, 0x0F);
        row.set_rec_bits(range, 0);
        assert_eq!(row.bytes(), &[0x0F, 0x00]);
    }

    #[test]
    fn test_blob_arena_handles() {
        let mut row = RowBuffer::new(0);
        let h = row.alloc_blob(b"abc".to_vec());
        assert_eq!(h, 1);
        assert_eq!(row.blob(h), b"abc");
        assert_eq!(row.blob(0), b"");
        assert_eq!(row.blob(99), b"");
    }

    #[test]
    fn test_blob_arena_reuses_released_slots() {
        let mut arena = BlobArena::default();
        let a = arena.insert(b"a".to_vec());
        let b = arena.insert(b"b".to_vec());
        arena.retain(a);
        arena.release(a);
        assert_eq!(arena.get(a), b"a");
        arena.release(a);
        assert_eq!(arena.get(a), b"");
        assert_eq!(arena.len(), 1);

        let c = arena.insert(b"c".to_vec());
        assert_eq!(c, a);
        assert_eq!(arena.capacity(), 2);
        assert_eq!(arena.get(b), b"b");

        // Unknown and already freed handles are ignored.
        arena.release(0);
        arena.release(42);
        arena.release(b);
        arena.release(b);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(c), b"c");
    }

    #[test]
    fn test_validate_layout() {
        let ok = vec![
            ("a".to_string(), BitClaim::Null(NullBit::new(0, 1))),
            ("b".to_string(), BitClaim::Null(NullBit::new(0, 2))),
            (
                "c".to_string(),
                BitClaim::Bits(BitRange { offset: 0, shift: 2, len: 7 }),
            ),
        ];
        assert!(validate_layout(&ok).is_ok());

        let clash = vec![
            ("a".to_string(), BitClaim::Null(NullBit::new(0, 4))),
            (
                "c".to_string(),
                BitClaim::Bits(BitRange { offset: 0, shift: 2, len: 3 }),
            ),
        ];
        let err = validate_layout(&clash).unwrap_err();
        assert!(err.to_string().contains("overlaps"));

        let wide = vec![("a".to_string(), BitClaim::Null(NullBit::new(0, 3)))];
        assert!(validate_layout(&wide).is_err());
    }
}
