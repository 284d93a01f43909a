//! # OROBOROS Wire - The Delta Codec
//!
//! Bit-packed, delta-compressed encoding of game state records.
//!
//! ## Architecture
//!
//! - **Protocol**: a bit channel over a caller-owned buffer, Huffman
//!   compressed or byte-aligned out-of-band, with an overflow latch
//! - **Delta**: one table-driven engine that sends only the changed prefix
//!   of a record against a baseline both sides already hold
//! - **Records**: entity, shared, relay and player tables plus the keyed
//!   user command codec
//!
//! ## Performance Guarantees
//!
//! - Zero heap allocations in the record codecs
//! - Records are plain old data, compared and copied as 32-bit words
//! - The Huffman tree is built once per process and shared read-only
//!
//! ## Trust Model
//!
//! ```text
//! SENDER                                RECEIVER
//!   |                                      |
//!   |--- [number][lc][changed slots] ----->|
//!   |                                      | <- every header validated
//!   |                                      | <- garbage decodes to Err,
//!   |                                      |    never to a panic
//! ```
//!
//! Width mistakes in our own tables are bugs and panic. Anything read off
//! the wire is untrusted and comes back as [`WireError`].
//!
//! ## Example
//!
//! ```rust
//! use oroboros_wire::{BitBuffer, DeltaCodec, EntityState};
//!
//! let baseline = EntityState::with_number(12);
//! let mut moved = baseline;
//! moved.origin = [128.0, 64.0, -8.0];
//!
//! let mut packet = [0u8; 256];
//! let mut codec = DeltaCodec::new();
//! let mut msg = BitBuffer::new(&mut packet);
//! codec.write_delta_entity(&mut msg, &baseline, Some(&moved), false).unwrap();
//!
//! msg.begin_reading();
//! let number = codec.read_entity_number(&mut msg);
//! let mut decoded = EntityState::default();
//! codec.read_delta_entity(&mut msg, &baseline, &mut decoded, number).unwrap();
//! assert_eq!(decoded, moved);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod delta;
pub mod error;
pub mod protocol;
pub mod records;

// Re-exports for convenience
pub use config::{ChannelConfig, ReportConfig};
pub use delta::{DeltaCodec, DeltaKey, FieldTelemetry, FieldUsage, NetField, NoTelemetry, TableId};
pub use error::{WireError, WireResult};
pub use protocol::{hash_key, BitBuffer, Huffman};
pub use records::{
    EntityShared, EntityState, PlayerState, Trajectory, UserCmd, ENTITYNUM_NONE, GENTITYNUM_BITS,
    MAX_GENTITIES,
};

/// Default packet capacity, in bytes.
pub const MAX_MSGLEN: usize = 16_384;
