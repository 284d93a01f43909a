//! # Net Strings
//!
//! NUL-terminated byte strings on a [`BitBuffer`].
//!
//! Every string crossing the wire is sanitized in both directions: `%` always
//! becomes `.` (downstream consumers feed strings to printf-style
//! formatters), and in strip mode so does every byte with the high bit set.
//! Oversize strings are never truncated on write; they go out empty.

use tracing::warn;

use super::bitstream::BitBuffer;

const SAFE_CHAR: u8 = b'.';

#[inline]
const fn is_unsafe(byte: u8, strip: bool) -> bool {
    byte == b'%' || (strip && byte & 0x80 != 0)
}

/// Replaces format and (in strip mode) high-bit characters in place.
fn sanitize_net_string(bytes: &mut [u8], strip: bool) {
    for byte in bytes {
        if is_unsafe(*byte, strip) {
            *byte = SAFE_CHAR;
        }
    }
}

/// Hashes a string so the result survives a trip through the channel.
///
/// Characters the channel would rewrite hash as the `.` they become. Only the
/// first `max_len` bytes before any NUL count.
#[must_use]
pub fn hash_key(string: &[u8], max_len: usize, strip: bool) -> i32 {
    let mut hash: i32 = 0;
    for (i, &byte) in string.iter().take(max_len).take_while(|&&b| b != 0).enumerate() {
        let c = if is_unsafe(byte, strip) { SAFE_CHAR } else { byte };
        // Characters are signed on the reference platform.
        let weight = 119 + i as i32;
        hash = hash.wrapping_add(i32::from(c as i8).wrapping_mul(weight));
    }
    hash ^ (hash >> 10) ^ (hash >> 20)
}

impl BitBuffer<'_> {
    /// Writes a string of at most `max_string_chars - 1` bytes.
    pub fn write_string(&mut self, string: impl AsRef<[u8]>) {
        let limit = self.max_string_chars;
        self.write_limited_string(string.as_ref(), limit);
    }

    /// Writes a configuration blob of at most `max_big_string_chars - 1` bytes.
    pub fn write_big_string(&mut self, string: impl AsRef<[u8]>) {
        let limit = self.max_big_string_chars;
        self.write_limited_string(string.as_ref(), limit);
    }

    fn write_limited_string(&mut self, string: &[u8], limit: usize) {
        // Anything after an embedded NUL would never be read back.
        let len = string.iter().position(|&b| b == 0).unwrap_or(string.len());
        if len >= limit {
            warn!(len, limit, "string too long for channel, sending empty string");
            self.write_byte(0);
            return;
        }

        let strip = self.strip();
        for &byte in &string[..len] {
            let byte = if is_unsafe(byte, strip) { SAFE_CHAR } else { byte };
            self.write_byte(i32::from(byte));
        }
        self.write_byte(0);
    }

    /// Reads a string written by [`BitBuffer::write_string`].
    pub fn read_string(&mut self) -> Vec<u8> {
        let limit = self.max_string_chars;
        self.read_limited_string(limit, false)
    }

    /// Reads a string written by [`BitBuffer::write_big_string`].
    pub fn read_big_string(&mut self) -> Vec<u8> {
        let limit = self.max_big_string_chars;
        self.read_limited_string(limit, false)
    }

    /// Reads a string that also ends at the first newline.
    pub fn read_string_line(&mut self) -> Vec<u8> {
        let limit = self.max_string_chars;
        self.read_limited_string(limit, true)
    }

    fn read_limited_string(&mut self, limit: usize, stop_at_newline: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let strip = self.strip();
        loop {
            let c = self.read_byte();
            if c <= 0 || (stop_at_newline && c == i32::from(b'\n')) {
                break;
            }
            // A full string still consumes the byte that overflowed it; the
            // rest stays in the stream for the next read.
            if out.len() + 1 >= limit {
                break;
            }
            out.push(c as u8);
        }
        sanitize_net_string(&mut out, strip);
        out
    }
}
