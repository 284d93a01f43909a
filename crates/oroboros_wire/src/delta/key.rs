//! # Delta Keys
//!
//! Single-value deltas XORed with a per-message key.
//!
//! A changed value costs `1 + bits`, an unchanged one a single bit. The key
//! is the connection secret XORed with the command timestamp. It only makes
//! blind replay and prediction tedious; it is not encryption.

use crate::protocol::BitBuffer;

/// XOR key for one message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeltaKey(i32);

#[inline]
const fn key_mask(bits: i32) -> i32 {
    if bits >= 32 {
        -1
    } else {
        (1 << bits) - 1
    }
}

impl DeltaKey {
    /// Wraps a per-connection secret.
    #[must_use]
    pub const fn new(secret: i32) -> Self {
        Self(secret)
    }

    /// Mixes a timestamp into the key.
    #[must_use]
    pub const fn salted(self, server_time: i32) -> Self {
        Self(self.0 ^ server_time)
    }

    /// Raw key value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Writes `new` as a keyed delta against `old`.
    pub fn write(self, msg: &mut BitBuffer<'_>, old: i32, new: i32, bits: i32) {
        if old == new {
            msg.write_bits(0, 1);
            return;
        }
        msg.write_bits(1, 1);
        msg.write_bits(new ^ self.0, bits);
    }

    /// Reads a keyed delta; returns `old` if unchanged.
    pub fn read(self, msg: &mut BitBuffer<'_>, old: i32, bits: i32) -> i32 {
        if msg.read_bits(1) != 0 {
            return msg.read_bits(bits) ^ (self.0 & key_mask(bits));
        }
        old
    }

    /// Writes a float as a keyed delta over its full bit pattern.
    #[allow(clippy::float_cmp)]
    pub fn write_float(self, msg: &mut BitBuffer<'_>, old: f32, new: f32) {
        if old == new {
            msg.write_bits(0, 1);
            return;
        }
        msg.write_bits(1, 1);
        msg.write_bits(new.to_bits() as i32 ^ self.0, 32);
    }

    /// Reads a keyed float delta; returns `old` if unchanged.
    pub fn read_float(self, msg: &mut BitBuffer<'_>, old: f32) -> f32 {
        if msg.read_bits(1) != 0 {
            return f32::from_bits((msg.read_bits(32) ^ self.0) as u32);
        }
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_costs_one_bit() {
        let key = DeltaKey::new(0x5A5A_1234);
        let mut data = [0u8; 16];
        let mut msg = BitBuffer::new(&mut data);
        key.write(&mut msg, 42, 42, 16);
        assert_eq!(msg.uncompressed_bits(), 1);

        msg.begin_reading();
        assert_eq!(key.read(&mut msg, 42, 16), 42);
    }

    #[test]
    fn test_round_trip_with_key() {
        let key = DeltaKey::new(0x1357_9BDF).salted(123_456);
        let mut data = [0u8; 32];
        let mut msg = BitBuffer::new(&mut data);
        key.write(&mut msg, 0, 40_000, 16);
        key.write(&mut msg, 0, 5, 3);
        key.write(&mut msg, 0, -7, 32);
        assert_eq!(msg.uncompressed_bits(), 17 + 4 + 33);

        msg.begin_reading();
        assert_eq!(key.read(&mut msg, 0, 16), 40_000);
        assert_eq!(key.read(&mut msg, 0, 3), 5);
        assert_eq!(key.read(&mut msg, 0, 32), -7);
    }

    #[test]
    fn test_wrong_key_garbles() {
        let mut data = [0u8; 16];
        let mut msg = BitBuffer::new(&mut data);
        DeltaKey::new(1).write(&mut msg, 0, 100, 8);
        msg.begin_reading();
        assert_eq!(DeltaKey::new(3).read(&mut msg, 0, 8), 100 ^ 1 ^ 3);
    }

    #[test]
    fn test_float_round_trip() {
        let key = DeltaKey::new(-559_038_737);
        let mut data = [0u8; 32];
        let mut msg = BitBuffer::new(&mut data);
        key.write_float(&mut msg, 1.0, 1.0);
        key.write_float(&mut msg, 1.0, -0.25);
        msg.begin_reading();
        assert_eq!(key.read_float(&mut msg, 1.0).to_bits(), 1.0f32.to_bits());
        assert_eq!(key.read_float(&mut msg, 1.0).to_bits(), (-0.25f32).to_bits());
    }

    #[test]
    fn test_mask() {
        assert_eq!(key_mask(3), 0b111);
        assert_eq!(key_mask(16), 0xFFFF);
        assert_eq!(key_mask(32), -1);
    }
}
