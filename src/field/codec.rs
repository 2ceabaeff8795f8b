//! Byte-level codec primitives shared by every field type.
//!
//! Three concerns live here:
//!
//! - record-order integer access: a table stores multi-byte integers either
//!   low byte first or high byte first (`low_byte_first`), independent of the
//!   host CPU;
//! - the `handle_int*` helpers that re-order integer images between the record
//!   and the replication wire;
//! - memcmp sort-key transforms: big-endian with the sign bit flipped for
//!   signed integers, and a monotonic bit transform for IEEE-754 floats.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Read an unsigned integer of `len` bytes (1..=8) in the given byte order.
pub fn read_uint(data: &[u8], len: usize, low_byte_first: bool) -> u64 {
    if low_byte_first {
        LittleEndian::read_uint(data, len)
    } else {
        BigEndian::read_uint(data, len)
    }
}

/// Read a sign-extended integer of `len` bytes (1..=8) in the given byte order.
pub fn read_int(data: &[u8], len: usize, low_byte_first: bool) -> i64 {
    if low_byte_first {
        LittleEndian::read_int(data, len)
    } else {
        BigEndian::read_int(data, len)
    }
}

/// Write the low `len` bytes of `value` in the given byte order.
pub fn write_uint(data: &mut [u8], value: u64, len: usize, low_byte_first: bool) {
    let masked = if len == 8 {
        value
    } else {
        value & ((1u64 << (len * 8)) - 1)
    };
    if low_byte_first {
        LittleEndian::write_uint(data, masked, len)
    } else {
        BigEndian::write_uint(data, masked, len)
    }
}

/// Write the low `len` bytes of a signed value in the given byte order.
pub fn write_int(data: &mut [u8], value: i64, len: usize, low_byte_first: bool) {
    write_uint(data, value as u64, len, low_byte_first)
}

pub fn read_f32(data: &[u8], low_byte_first: bool) -> f32 {
    if low_byte_first {
        LittleEndian::read_f32(data)
    } else {
        BigEndian::read_f32(data)
    }
}

pub fn read_f64(data: &[u8], low_byte_first: bool) -> f64 {
    if low_byte_first {
        LittleEndian::read_f64(data)
    } else {
        BigEndian::read_f64(data)
    }
}

pub fn write_f32(data: &mut [u8], value: f32, low_byte_first: bool) {
    if low_byte_first {
        LittleEndian::write_f32(data, value)
    } else {
        BigEndian::write_f32(data, value)
    }
}

pub fn write_f64(data: &mut [u8], value: f64, low_byte_first: bool) {
    if low_byte_first {
        LittleEndian::write_f64(data, value)
    } else {
        BigEndian::write_f64(data, value)
    }
}

/// Copy an integer image of `len` bytes, reversing it when the source and
/// destination byte orders differ.
pub fn handle_int(to: &mut [u8], from: &[u8], len: usize, from_low_byte_first: bool, to_low_byte_first: bool) {
    to[..len].copy_from_slice(&from[..len]);
    if from_low_byte_first != to_low_byte_first {
        to[..len].reverse();
    }
}

pub fn handle_int16(to: &mut [u8], from: &[u8], from_low_byte_first: bool, to_low_byte_first: bool) {
    handle_int(to, from, 2, from_low_byte_first, to_low_byte_first)
}

pub fn handle_int24(to: &mut [u8], from: &[u8], from_low_byte_first: bool, to_low_byte_first: bool) {
    handle_int(to, from, 3, from_low_byte_first, to_low_byte_first)
}

pub fn handle_int32(to: &mut [u8], from: &[u8], from_low_byte_first: bool, to_low_byte_first: bool) {
    handle_int(to, from, 4, from_low_byte_first, to_low_byte_first)
}

pub fn handle_int64(to: &mut [u8], from: &[u8], from_low_byte_first: bool, to_low_byte_first: bool) {
    handle_int(to, from, 8, from_low_byte_first, to_low_byte_first)
}

/// Write a memcmp-orderable image of an integer stored in `from`.
///
/// The output is big-endian with the sign bit flipped for signed values, so
/// plain byte comparison gives numeric order. When `to` is shorter than the
/// integer the most significant bytes are kept; when longer, the tail is zeroed.
pub fn copy_integer(to: &mut [u8], from: &[u8], source_big_endian: bool, unsigned: bool) {
    if to.is_empty() || from.is_empty() {
        to.fill(0);
        return;
    }
    let n = to.len().min(from.len());
    if source_big_endian {
        to[..n].copy_from_slice(&from[..n]);
    } else {
        for (i, slot) in to[..n].iter_mut().enumerate() {
            *slot = from[from.len() - 1 - i];
        }
    }
    if !unsigned {
        to[0] ^= 0x80;
    }
    to[n..].fill(0);
}

/// Monotonic transform of an `f32` into 4 memcmp-orderable bytes.
///
/// Negative and positive zero map to the same image.
pub fn sortable_f32(value: f32) -> [u8; 4] {
    let value = if value == 0.0 { 0.0f32 } else { value };
    let bits = value.to_bits();
    let key = if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    };
    key.to_be_bytes()
}

/// Monotonic transform of an `f64` into 8 memcmp-orderable bytes.
pub fn sortable_f64(value: f64) -> [u8; 8] {
    let value = if value == 0.0 { 0.0f64 } else { value };
    let bits = value.to_bits();
    let key = if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    };
    key.to_be_bytes()
}

/// Copy `src` into a fixed-length sort-key slot, truncating or zero-padding.
pub fn fill_key(to: &mut [u8], src: &[u8]) {
    let n = to.len().min(src.len());
    to[..n].copy_from_slice(&src[..n]);
    to[n..].fill(0);
}

/// Width of the length prefix used by packed variable-length values.
pub fn length_bytes_for(max_length: usize) -> usize {
    if max_length > 255 {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_orders() {
        let mut buf = [0u8; 4];
        write_uint(&mut buf, 0x0102_0304, 4, true);
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(read_uint(&buf, 4, true), 0x0102_0304);
        write_uint(&mut buf, 0x0102_0304, 4, false);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(read_uint(&buf, 4, false), 0x0102_0304);
    }

    #[test]
    fn test_signed_three_byte() {
        let mut buf = [0u8; 3];
        write_int(&mut buf, -2, 3, true);
        assert_eq!(buf, [0xFE, 0xFF, 0xFF]);
        assert_eq!(read_int(&buf, 3, true), -2);
    }

    #[test]
    fn test_handle_int_swaps_only_when_orders_differ() {
        let src = [1u8, 2, 3, 4];
        let mut out = [0u8; 4];
        handle_int32(&mut out, &src, true, true);
        assert_eq!(out, src);
        handle_int32(&mut out, &src, true, false);
        assert_eq!(out, [4, 3, 2, 1]);
        let mut out8 = [0u8; 8];
        let src8 = [1u8, 2, 3, 4, 5, 6, 7, 8];
        handle_int64(&mut out8, &src8, false, true);
        assert_eq!(out8, [8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_copy_integer_signed_order() {
        let mut neg = [0u8; 2];
        let mut pos = [0u8; 2];
        copy_integer(&mut neg, &(-1i16).to_le_bytes(), false, false);
        copy_integer(&mut pos, &1i16.to_le_bytes(), false, false);
        assert_eq!(neg, [0x7F, 0xFF]);
        assert_eq!(pos, [0x80, 0x01]);
        assert!(neg < pos);
    }

    #[test]
    fn test_copy_integer_pads_and_truncates() {
        let mut wide = [0xAAu8; 6];
        copy_integer(&mut wide, &5u32.to_be_bytes(), true, true);
        assert_eq!(wide, [0, 0, 0, 5, 0, 0]);
        let mut narrow = [0u8; 1];
        copy_integer(&mut narrow, &0x1234u16.to_le_bytes(), false, true);
        assert_eq!(narrow, [0x12]);
    }

    #[test]
    fn test_sortable_floats() {
        let vals = [-1e10f64, -2.5, -0.0, 0.0, 1e-300, 3.0, 1e300];
        for w in vals.windows(2) {
            assert!(sortable_f64(w[0]) <= sortable_f64(w[1]), "{} vs {}", w[0], w[1]);
        }
        assert_eq!(sortable_f64(-0.0), sortable_f64(0.0));
        assert!(sortable_f32(-3.5) < sortable_f32(-1.0));
        assert!(sortable_f32(1.0) < sortable_f32(2.0));
    }
}
