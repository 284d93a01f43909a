//! # Wire Protocol Primitives
//!
//! The bit channel and the coders underneath it.
//!
//! ## Layers
//!
//! ```text
//! records (entity / player / usercmd)
//!        |
//!   delta engine  (field tables, lc truncation, float fast path)
//!        |
//!   BitBuffer     (compressed or out-of-band, overflow latch)
//!        |
//!   Huffman       (static prefix code, one per process)
//! ```

// Bit packing narrows and reinterprets integers on purpose.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod bitstream;
pub mod huffman;
pub mod strings;

pub use bitstream::{angle_to_short, short_to_angle, BitBuffer};
pub use huffman::Huffman;
pub use strings::hash_key;
