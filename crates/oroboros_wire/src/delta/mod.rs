//! # Delta Coding
//!
//! Encodes a record as the difference from a baseline both peers hold.
//!
//! ## Pieces
//!
//! - [`field`]: the slot tables and the [`NetRecord`] word view
//! - `engine`: the generic `lc` + per-slot loop shared by all tables
//! - [`key`]: XOR-keyed single values for user commands
//! - [`telemetry`]: opt-in counters for table tuning
//!
//! [`DeltaCodec`] is the front door. The per-record methods live next to
//! the record types in [`crate::records`].

// Bit packing narrows and reinterprets integers on purpose.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod field;
pub mod key;
pub mod telemetry;

pub(crate) mod engine;

pub use field::{FieldCoding, NetField, NetRecord, TableId, FLOAT_FIELD, FLOAT_INT_BIAS, FLOAT_INT_BITS};
pub use key::DeltaKey;
pub use telemetry::{FieldTelemetry, FieldUsage, NoTelemetry};

/// Delta encoder/decoder for every record kind.
///
/// The codec itself is stateless apart from its telemetry sink; one instance
/// can serve any number of connections on the same thread.
#[derive(Clone, Debug, Default)]
pub struct DeltaCodec<T: FieldTelemetry = NoTelemetry> {
    pub(crate) telemetry: T,
}

impl DeltaCodec {
    /// Creates a codec without telemetry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            telemetry: NoTelemetry,
        }
    }
}

impl<T: FieldTelemetry> DeltaCodec<T> {
    /// Creates a codec reporting to `telemetry`.
    #[must_use]
    pub const fn with_telemetry(telemetry: T) -> Self {
        Self { telemetry }
    }

    /// The telemetry sink.
    #[must_use]
    pub const fn telemetry(&self) -> &T {
        &self.telemetry
    }

    /// The telemetry sink, mutably.
    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }

    /// Consumes the codec, returning its sink.
    #[must_use]
    pub fn into_telemetry(self) -> T {
        self.telemetry
    }
}
