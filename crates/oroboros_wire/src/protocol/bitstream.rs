//! # Bit Channel
//!
//! Sequential bit-level I/O over a caller-owned byte buffer.
//!
//! ## Modes
//!
//! - **Compressed** (default): any width from 1 to 32 bits. The bits below
//!   the first byte boundary are written raw, every remaining byte goes
//!   through the shared [`Huffman`] coder.
//! - **Out-of-band**: byte aligned little-endian 8/16/32-bit values, used
//!   for connectionless traffic. [`BitBuffer::uncompressed`] switches a
//!   compressed channel into this mode mid-message.
//!
//! ## Exhaustion
//!
//! Writing past capacity latches `overflowed`; every later write is a
//! no-op and callers check the flag once after the whole message. Reading
//! past the valid size returns zero and latches a past-end condition that
//! the sized readers report as `-1`.
//!
//! Negative widths mean "signed value of |width| bits": writes truncate,
//! reads sign-extend from the full width.

use crate::config::ChannelConfig;
use crate::error::{WireError, WireResult};

use super::huffman::{self, get_bit, put_bit, Huffman};

/// Converts degrees to a 16-bit binary angle.
#[inline]
#[must_use]
pub fn angle_to_short(angle: f32) -> i32 {
    ((angle * 65536.0 / 360.0) as i32) & 65535
}

/// Converts a 16-bit binary angle back to degrees.
#[inline]
#[must_use]
pub fn short_to_angle(short: i32) -> f32 {
    short as f32 * (360.0 / 65536.0)
}

#[inline]
fn check_width(bits: i32) {
    assert!(bits != 0 && (-31..=32).contains(&bits), "bad bits {bits}");
}

/// Mask covering the low `width` bits, `width` in `1..=32`.
#[inline]
const fn low_mask(width: usize) -> u32 {
    u32::MAX >> (32 - width)
}

/// A message being written or read.
///
/// The buffer never allocates: it borrows the backing bytes for its whole
/// lifetime and mutates them in place.
pub struct BitBuffer<'a> {
    data: &'a mut [u8],
    huffman: &'static Huffman,
    max_size: usize,
    cur_size: usize,
    read_count: usize,
    /// Bit cursor, shared by reads and writes.
    bit: usize,
    overflowed: bool,
    oob: bool,
    strip: bool,
    /// Logical bits requested by writes, before compression.
    uncompressed_bits: u64,
    pub(super) max_string_chars: usize,
    pub(super) max_big_string_chars: usize,
}

impl<'a> BitBuffer<'a> {
    /// Creates an empty compressed channel over `data`.
    #[must_use]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self::with_config(data, &ChannelConfig::default())
    }

    /// Creates an empty out-of-band channel over `data`.
    #[must_use]
    pub fn new_oob(data: &'a mut [u8]) -> Self {
        let mut buffer = Self::new(data);
        buffer.oob = true;
        buffer
    }

    /// Creates an empty compressed channel with the given string policy.
    #[must_use]
    pub fn with_config(data: &'a mut [u8], config: &ChannelConfig) -> Self {
        let max_size = data.len();
        Self {
            data,
            huffman: huffman::shared(),
            max_size,
            cur_size: 0,
            read_count: 0,
            bit: 0,
            overflowed: false,
            oob: false,
            strip: config.strip,
            uncompressed_bits: 0,
            max_string_chars: config.max_string_chars,
            max_big_string_chars: config.max_big_string_chars,
        }
    }

    /// Wraps `len` bytes received from the transport for reading.
    ///
    /// Call one of the `begin_reading*` methods before the first read.
    #[must_use]
    pub fn received(data: &'a mut [u8], len: usize) -> Self {
        let mut buffer = Self::new(data);
        buffer.cur_size = len.min(buffer.max_size);
        buffer
    }

    /// Forgets everything written so far.
    pub fn clear(&mut self) {
        self.cur_size = 0;
        self.overflowed = false;
        self.bit = 0;
    }

    /// Switches to compressed mode.
    pub fn bitstream(&mut self) {
        self.oob = false;
    }

    /// Byte-aligns the cursor and switches to out-of-band mode.
    pub fn uncompressed(&mut self) {
        self.bit = (self.bit + 7) & !7;
        self.oob = true;
    }

    /// Rewinds for reading in compressed mode.
    pub fn begin_reading(&mut self) {
        self.read_count = 0;
        self.bit = 0;
        self.oob = false;
    }

    /// Rewinds for reading in out-of-band mode.
    pub fn begin_reading_oob(&mut self) {
        self.read_count = 0;
        self.bit = 0;
        self.oob = true;
    }

    /// Byte-aligns the read cursor and continues in out-of-band mode.
    pub fn begin_reading_uncompressed(&mut self) {
        self.bit = (self.bit + 7) & !7;
        self.oob = true;
    }

    /// Duplicates this channel onto a new backing buffer.
    ///
    /// The copy keeps every cursor and flag; its capacity is `target`'s length.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::CopyTooSmall`] if `target` cannot hold the
    /// bytes written so far.
    pub fn copy_into<'b>(&self, target: &'b mut [u8]) -> WireResult<BitBuffer<'b>> {
        if target.len() < self.cur_size {
            return Err(WireError::CopyTooSmall {
                required: self.cur_size,
                available: target.len(),
            });
        }
        target[..self.cur_size].copy_from_slice(&self.data[..self.cur_size]);
        let max_size = target.len();
        Ok(BitBuffer {
            data: target,
            huffman: self.huffman,
            max_size,
            cur_size: self.cur_size,
            read_count: self.read_count,
            bit: self.bit,
            overflowed: self.overflowed,
            oob: self.oob,
            strip: self.strip,
            uncompressed_bits: self.uncompressed_bits,
            max_string_chars: self.max_string_chars,
            max_big_string_chars: self.max_big_string_chars,
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Bytes of valid data.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.cur_size
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cur_size == 0
    }

    /// Capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_size
    }

    /// Current bit cursor.
    #[inline]
    #[must_use]
    pub const fn bit(&self) -> usize {
        self.bit
    }

    /// Bytes consumed by reads so far.
    #[inline]
    #[must_use]
    pub const fn read_count(&self) -> usize {
        self.read_count
    }

    /// Returns true once a write did not fit.
    #[inline]
    #[must_use]
    pub const fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Returns true once a read ran past the valid data.
    #[inline]
    #[must_use]
    pub const fn is_past_end(&self) -> bool {
        self.read_count > self.cur_size
    }

    /// Returns true in out-of-band mode.
    #[inline]
    #[must_use]
    pub const fn is_oob(&self) -> bool {
        self.oob
    }

    /// Returns true if strings are stripped of high-bit bytes.
    #[inline]
    #[must_use]
    pub const fn strip(&self) -> bool {
        self.strip
    }

    /// Enables or disables high-bit stripping for strings.
    pub fn set_strip(&mut self, strip: bool) {
        self.strip = strip;
    }

    /// Logical bits requested by every write so far, compressed or not.
    #[inline]
    #[must_use]
    pub const fn uncompressed_bits(&self) -> u64 {
        self.uncompressed_bits
    }

    /// The valid part of the backing buffer.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.cur_size]
    }

    // ========================================================================
    // BITS
    // ========================================================================

    /// Writes the low `|bits|` bits of `value`.
    ///
    /// # Panics
    ///
    /// Panics with "bad bits" if `bits` is 0, below -31 or above 32, or is
    /// not 8, 16 or 32 in out-of-band mode. Those requests only come from
    /// mismatched builds.
    pub fn write_bits(&mut self, value: i32, bits: i32) {
        self.uncompressed_bits += u64::from(bits.unsigned_abs());

        if self.overflowed {
            return;
        }
        check_width(bits);

        let width = bits.unsigned_abs() as usize;
        if self.oob {
            self.write_aligned(value as u32, width);
        } else {
            self.write_packed(value as u32, width);
        }
    }

    fn write_aligned(&mut self, value: u32, width: usize) {
        let bytes = width >> 3;
        if self.cur_size + bytes > self.max_size {
            self.overflowed = true;
            return;
        }
        assert!(matches!(width, 8 | 16 | 32), "bad bits {width} in out-of-band mode");

        self.data[self.cur_size..self.cur_size + bytes].copy_from_slice(&value.to_le_bytes()[..bytes]);
        self.cur_size += bytes;
        self.bit += width;
    }

    fn write_packed(&mut self, value: u32, width: usize) {
        let max_bits = self.max_size << 3;
        let mut value = value & low_mask(width);
        let mut remaining = width;

        let raw = width & 7;
        if raw != 0 {
            if self.bit + raw > max_bits {
                self.overflowed = true;
                return;
            }
            for _ in 0..raw {
                put_bit((value & 1) as u8, self.data, &mut self.bit);
                value >>= 1;
            }
            remaining -= raw;
        }

        let huffman = self.huffman;
        for _ in (0..remaining).step_by(8) {
            huffman.offset_transmit((value & 0xff) as u8, self.data, &mut self.bit, max_bits);
            value >>= 8;
            if self.bit >= max_bits {
                self.overflowed = true;
                return;
            }
        }
        // A raw write can end exactly on the last bit.
        self.cur_size = ((self.bit >> 3) + 1).min(self.max_size);
    }

    /// Reads `|bits|` bits, sign-extending when `bits` is negative.
    ///
    /// Returns 0 once the read cursor is past the valid data.
    ///
    /// # Panics
    ///
    /// Same width rules as [`BitBuffer::write_bits`].
    pub fn read_bits(&mut self, bits: i32) -> i32 {
        if self.is_past_end() {
            return 0;
        }
        check_width(bits);

        let width = bits.unsigned_abs() as usize;
        let raw = if self.oob {
            self.read_aligned(width)
        } else {
            self.read_packed(width)
        };
        let Some(raw) = raw else {
            self.read_count = self.cur_size + 1;
            return 0;
        };

        if bits < 0 && width < 32 && raw & (1 << (width - 1)) != 0 {
            (raw | !low_mask(width)) as i32
        } else {
            raw as i32
        }
    }

    fn read_aligned(&mut self, width: usize) -> Option<u32> {
        let bytes = width >> 3;
        if self.read_count + bytes > self.cur_size {
            return None;
        }
        assert!(matches!(width, 8 | 16 | 32), "bad bits {width} in out-of-band mode");

        let mut le = [0u8; 4];
        le[..bytes].copy_from_slice(&self.data[self.read_count..self.read_count + bytes]);
        self.read_count += bytes;
        self.bit += width;
        Some(u32::from_le_bytes(le))
    }

    fn read_packed(&mut self, width: usize) -> Option<u32> {
        let max_bits = self.cur_size << 3;
        let mut value = 0u32;
        let mut shift = 0;

        let raw = width & 7;
        if raw != 0 {
            if self.bit + raw > max_bits {
                return None;
            }
            for i in 0..raw {
                value |= u32::from(get_bit(self.data, &mut self.bit)) << i;
            }
            shift = raw;
        }

        while shift < width {
            let symbol = self.huffman.offset_receive(self.data, &mut self.bit, max_bits);
            value |= u32::from(symbol) << shift;
            shift += 8;
            if self.bit > max_bits {
                return None;
            }
        }
        self.read_count = (self.bit >> 3) + 1;
        // A garbage stream can decode to the 9-bit NYT symbol.
        Some(value & low_mask(width))
    }

    // ========================================================================
    // SIZED WRITERS
    // ========================================================================

    /// Writes a signed byte.
    #[inline]
    pub fn write_char(&mut self, c: i32) {
        self.write_bits(c, 8);
    }

    /// Writes an unsigned byte.
    #[inline]
    pub fn write_byte(&mut self, c: i32) {
        self.write_bits(c, 8);
    }

    /// Writes 16 bits.
    #[inline]
    pub fn write_short(&mut self, c: i32) {
        self.write_bits(c, 16);
    }

    /// Writes 32 bits.
    #[inline]
    pub fn write_long(&mut self, c: i32) {
        self.write_bits(c, 32);
    }

    /// Writes the IEEE bit pattern of `f`.
    #[inline]
    pub fn write_float(&mut self, f: f32) {
        self.write_bits(f.to_bits() as i32, 32);
    }

    /// Writes `data` one byte at a time.
    pub fn write_data(&mut self, data: &[u8]) {
        for &byte in data {
            self.write_byte(i32::from(byte));
        }
    }

    /// Writes an angle quantized to 8 bits.
    pub fn write_angle(&mut self, angle: f32) {
        self.write_byte(((angle * 256.0 / 360.0) as i32) & 255);
    }

    /// Writes an angle quantized to 16 bits.
    pub fn write_angle16(&mut self, angle: f32) {
        self.write_short(angle_to_short(angle));
    }

    // ========================================================================
    // SIZED READERS - all return -1 once past the end
    // ========================================================================

    /// Reads a signed byte.
    pub fn read_char(&mut self) -> i32 {
        let c = i32::from(self.read_bits(8) as i8);
        if self.is_past_end() { -1 } else { c }
    }

    /// Reads an unsigned byte.
    pub fn read_byte(&mut self) -> i32 {
        let c = i32::from(self.read_bits(8) as u8);
        if self.is_past_end() { -1 } else { c }
    }

    /// Reads a signed 16-bit value.
    pub fn read_short(&mut self) -> i32 {
        let c = i32::from(self.read_bits(16) as i16);
        if self.is_past_end() { -1 } else { c }
    }

    /// Reads 32 bits.
    pub fn read_long(&mut self) -> i32 {
        let c = self.read_bits(32);
        if self.is_past_end() { -1 } else { c }
    }

    /// Reads an IEEE float.
    pub fn read_float(&mut self) -> f32 {
        let f = f32::from_bits(self.read_bits(32) as u32);
        if self.is_past_end() { -1.0 } else { f }
    }

    /// Reads a 16-bit angle in degrees.
    pub fn read_angle16(&mut self) -> f32 {
        short_to_angle(self.read_short())
    }

    /// Fills `out` byte by byte. Bytes past the end read as `0xFF`.
    pub fn read_data(&mut self, out: &mut [u8]) {
        for byte in out {
            *byte = self.read_byte() as u8;
        }
    }
}

impl std::fmt::Debug for BitBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitBuffer")
            .field("max_size", &self.max_size)
            .field("cur_size", &self.cur_size)
            .field("read_count", &self.read_count)
            .field("bit", &self.bit)
            .field("overflowed", &self.overflowed)
            .field("oob", &self.oob)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_round_trip() {
        let mut data = [0u8; 16];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_bits(-5, -8);
        msg.write_bits(-5, -8);
        msg.write_bits(-300, -12);

        msg.begin_reading();
        assert_eq!(msg.read_bits(-8), -5);
        assert_eq!(msg.read_bits(8), 251);
        assert_eq!(msg.read_bits(-12), -300);
    }

    #[test]
    fn test_mixed_widths_round_trip() {
        let values: [(i32, i32); 9] = [
            (1, 1),
            (5, 3),
            (0x7F, 7),
            (0x3FF, 10),
            (-1, 32),
            (0x1234, 16),
            (-2, -2),
            (123_456_789, 32),
            (0x1FFF, 13),
        ];
        let mut data = [0u8; 64];
        let mut msg = BitBuffer::new(&mut data);
        for &(value, bits) in &values {
            msg.write_bits(value, bits);
        }
        assert!(!msg.is_overflowed());
        let expected_bits: u64 = values.iter().map(|&(_, b)| u64::from(b.unsigned_abs())).sum();
        assert_eq!(msg.uncompressed_bits(), expected_bits);

        msg.begin_reading();
        for &(value, bits) in &values {
            assert_eq!(msg.read_bits(bits), value, "width {bits}");
        }
        assert!(!msg.is_past_end());
    }

    #[test]
    fn test_value_is_masked_to_width() {
        let mut data = [0u8; 8];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_bits(0x1FF, 8);
        msg.begin_reading();
        assert_eq!(msg.read_bits(8), 0xFF);
    }

    #[test]
    #[should_panic(expected = "bad bits")]
    fn test_zero_width_panics() {
        let mut data = [0u8; 8];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_bits(1, 0);
    }

    #[test]
    #[should_panic(expected = "bad bits")]
    fn test_oob_odd_width_panics() {
        let mut data = [0u8; 8];
        let mut msg = BitBuffer::new_oob(&mut data);
        msg.write_bits(1, 12);
    }

    #[test]
    fn test_compressed_overflow_latches() {
        let mut data = [0u8; 1];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_bits(0b101, 3);
        assert!(!msg.is_overflowed());

        // Seven raw bits cannot fit after three.
        msg.write_bits(0x7F, 7);
        assert!(msg.is_overflowed());
        assert_eq!(msg.bit(), 3);

        msg.write_bits(1, 1);
        assert_eq!(msg.bit(), 3);
        assert_eq!(msg.as_slice(), &[0b101]);
    }

    #[test]
    fn test_oob_overflow_keeps_contents() {
        let mut data = [0u8; 4];
        let mut msg = BitBuffer::new_oob(&mut data);
        msg.write_short(0x1234);
        msg.write_long(0x5555_5555);
        assert!(msg.is_overflowed());
        msg.write_byte(0x99);
        assert_eq!(msg.as_slice(), &[0x34, 0x12]);
    }

    #[test]
    fn test_oob_little_endian() {
        let mut data = [0u8; 8];
        let mut msg = BitBuffer::new_oob(&mut data);
        msg.write_byte(0xAB);
        msg.write_short(0x1234);
        msg.write_long(0x0102_0304);
        assert_eq!(msg.as_slice(), &[0xAB, 0x34, 0x12, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(msg.bit(), 56);

        msg.begin_reading_oob();
        assert_eq!(msg.read_byte(), 0xAB);
        assert_eq!(msg.read_short(), 0x1234);
        assert_eq!(msg.read_long(), 0x0102_0304);
        assert_eq!(msg.read_byte(), -1);
        assert!(msg.is_past_end());
        assert_eq!(msg.read_bits(8), 0);
    }

    #[test]
    fn test_compressed_read_past_end() {
        let mut data = [0u8; 8];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_byte(7);
        assert_eq!(msg.len(), 1);

        msg.begin_reading();
        assert_eq!(msg.read_byte(), 7);
        assert!(!msg.is_past_end());
        assert_eq!(msg.read_long(), -1);
        assert!(msg.is_past_end());
        assert_eq!(msg.read_char(), -1);
        assert!((msg.read_float() + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_received_buffer() {
        let mut data = [0u8; 8];
        let written = {
            let mut msg = BitBuffer::new(&mut data);
            msg.write_short(-2);
            msg.write_char(-100);
            msg.len()
        };

        let mut msg = BitBuffer::received(&mut data, written);
        msg.begin_reading();
        assert_eq!(msg.read_short(), -2);
        assert_eq!(msg.read_char(), -100);
    }

    #[test]
    fn test_uncompressed_section() {
        let mut data = [0u8; 8];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_bits(1, 1);
        msg.uncompressed();
        assert_eq!(msg.bit(), 8);
        msg.write_byte(0xAB);
        assert_eq!(msg.as_slice(), &[0x01, 0xAB]);

        msg.begin_reading();
        assert_eq!(msg.read_bits(1), 1);
        msg.begin_reading_uncompressed();
        assert!(msg.is_oob());
        assert_eq!(msg.read_byte(), 0xAB);
    }

    #[test]
    fn test_float_and_angles() {
        let mut data = [0u8; 32];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_float(-1234.5);
        msg.write_angle16(90.0);
        msg.write_angle(180.0);

        msg.begin_reading();
        assert_eq!(msg.read_float().to_bits(), (-1234.5f32).to_bits());
        assert!((msg.read_angle16() - 90.0).abs() < f32::EPSILON);
        assert_eq!(msg.read_byte(), 128);
    }

    #[test]
    fn test_angle_conversions() {
        assert_eq!(angle_to_short(90.0), 16384);
        assert_eq!(angle_to_short(360.0), 0);
        assert_eq!(angle_to_short(-90.0), 49152);
        assert!((short_to_angle(32768) - 180.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_data_round_trip() {
        let mut data = [0u8; 32];
        let mut msg = BitBuffer::new_oob(&mut data);
        msg.write_data(&[1, 2, 3, 250]);
        msg.begin_reading_oob();
        let mut out = [0u8; 5];
        msg.read_data(&mut out);
        assert_eq!(&out[..4], &[1, 2, 3, 250]);
        // Past the end.
        assert_eq!(out[4], 0xFF);
    }

    #[test]
    fn test_clear_resets_writer() {
        let mut data = [0u8; 1];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_bits(0, 7);
        msg.write_bits(0, 7);
        assert!(msg.is_overflowed());
        msg.clear();
        assert!(!msg.is_overflowed());
        assert_eq!(msg.bit(), 0);
        assert!(msg.is_empty());
    }

    #[test]
    fn test_copy_into() {
        let mut data = [0u8; 16];
        let mut msg = BitBuffer::new(&mut data);
        msg.write_long(0x0BAD_F00D);
        msg.write_bits(3, 2);

        let mut small = [0u8; 1];
        let err = msg.copy_into(&mut small).unwrap_err();
        assert!(matches!(err, WireError::CopyTooSmall { available: 1, .. }));

        let mut large = [0u8; 32];
        let mut copy = msg.copy_into(&mut large).unwrap();
        assert_eq!(copy.capacity(), 32);
        assert_eq!(copy.bit(), msg.bit());
        copy.begin_reading();
        assert_eq!(copy.read_long(), 0x0BAD_F00D);
        assert_eq!(copy.read_bits(2), 3);
    }
}
