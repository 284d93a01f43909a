//! # Wire Error Types
//!
//! Errors the codec can report for data it did not produce itself.
//!
//! Malformed *requests* (an illegal bit width, say) are build mismatches and
//! panic. Malformed *input* (whatever arrived in a packet) always comes back
//! as a [`WireError`], so a hostile peer can at worst get itself dropped.

use thiserror::Error;

/// Errors that can occur while encoding or decoding a delta stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Entity number outside `0..MAX_GENTITIES`.
    #[error("bad entity number: {0}")]
    BadEntityNumber(i32),

    /// Delta header announced more fields than the table holds.
    #[error("invalid {table} field count: {count}")]
    InvalidFieldCount {
        /// Table the header belongs to.
        table: &'static str,
        /// Count read from the wire.
        count: i32,
    },

    /// Relay record did not start with the expected framing byte.
    #[error("bad relay magic: expected {expected:#04x}, got {found:#04x}")]
    BadMagic {
        /// Byte the reader expected.
        expected: u8,
        /// Byte actually read.
        found: i32,
    },

    /// Target buffer cannot hold the source channel's contents.
    #[error("copy target too small: need {required} bytes, have {available}")]
    CopyTooSmall {
        /// Bytes currently used by the source.
        required: usize,
        /// Bytes available in the target.
        available: usize,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;
