//! # Field Tables
//!
//! A record kind is described to the delta engine as an ordered list of
//! 32-bit slots. Each [`NetField`] names one slot and how wide it is on the
//! wire; the engine never looks at the record's Rust type.
//!
//! ## Ordering
//!
//! Table order is wire format. The engine sends only the prefix of the table
//! up to the last changed slot, so hot fields belong at the front. Use the
//! `field_priority` report to measure, then reorder both peers at once.

use bytemuck::Pod;

/// Width marker for IEEE float slots.
pub const FLOAT_FIELD: i32 = 0;

/// Bits used by the float fast path.
pub const FLOAT_INT_BITS: i32 = 13;

/// Offset that maps the fast path range `-4096..4096` onto `0..8192`.
pub const FLOAT_INT_BIAS: i32 = 1 << (FLOAT_INT_BITS - 1);

/// One slot of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetField {
    /// Field path, for logs and reports.
    pub name: &'static str,
    /// Index of the 32-bit word inside the record.
    pub word: usize,
    /// Wire width: [`FLOAT_FIELD`], positive for unsigned, negative for signed.
    pub bits: i32,
}

impl NetField {
    /// Describes the slot at `byte_offset`.
    ///
    /// # Panics
    ///
    /// Panics (at compile time, in a table) if the offset is not word aligned.
    #[must_use]
    pub const fn new(name: &'static str, byte_offset: usize, bits: i32) -> Self {
        assert!(byte_offset % 4 == 0, "net fields must be word aligned");
        Self {
            name,
            word: byte_offset / 4,
            bits,
        }
    }

    /// Returns true for float slots.
    #[inline]
    #[must_use]
    pub const fn is_float(&self) -> bool {
        self.bits == FLOAT_FIELD
    }
}

/// How changed slots are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldCoding {
    /// A one-bit zero flag precedes every changed value.
    Sparse,
    /// Changed values go out directly.
    Dense,
}

/// The record kinds the engine knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// Per-entity network state.
    EntityState,
    /// Server-side entity link data.
    EntityShared,
    /// Reduced link data for relay streams.
    RelayShared,
    /// The local player's state.
    PlayerState,
}

impl TableId {
    /// Every table, in report order.
    pub const ALL: [Self; 4] = [
        Self::EntityState,
        Self::EntityShared,
        Self::RelayShared,
        Self::PlayerState,
    ];

    /// Short name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EntityState => "entity",
            Self::EntityShared => "entity_shared",
            Self::RelayShared => "relay_shared",
            Self::PlayerState => "player",
        }
    }

    /// The table's slots in wire order.
    #[must_use]
    pub fn fields(self) -> &'static [NetField] {
        use crate::records::{
            ENTITY_SHARED_FIELDS, ENTITY_STATE_FIELDS, PLAYER_STATE_FIELDS, RELAY_SHARED_FIELDS,
        };
        match self {
            Self::EntityState => &ENTITY_STATE_FIELDS,
            Self::EntityShared => &ENTITY_SHARED_FIELDS,
            Self::RelayShared => &RELAY_SHARED_FIELDS,
            Self::PlayerState => &PLAYER_STATE_FIELDS,
        }
    }

    /// Value coding used by the table.
    #[must_use]
    pub const fn coding(self) -> FieldCoding {
        match self {
            Self::PlayerState => FieldCoding::Dense,
            _ => FieldCoding::Sparse,
        }
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A plain-old-data record the engine can view as 32-bit words.
pub trait NetRecord: Pod {
    /// The record as words.
    fn words(&self) -> &[u32] {
        bytemuck::cast_slice(std::slice::from_ref(self))
    }

    /// The record as mutable words.
    fn words_mut(&mut self) -> &mut [u32] {
        bytemuck::cast_slice_mut(std::slice::from_mut(self))
    }
}

/// Builds a [`NetField`] from a field path.
///
/// ```ignore
/// net_field!(EntityState, e_flags, 24)
/// net_field!(EntityState, origin[2], FLOAT_FIELD)
/// net_field!(EntityState, pos: Trajectory => tr_base[0], FLOAT_FIELD)
/// ```
macro_rules! net_field {
    ($record:ty, $field:ident, $bits:expr) => {
        $crate::delta::field::NetField::new(
            stringify!($field),
            ::std::mem::offset_of!($record, $field),
            $bits,
        )
    };
    ($record:ty, $field:ident[$index:literal], $bits:expr) => {
        $crate::delta::field::NetField::new(
            concat!(stringify!($field), "[", stringify!($index), "]"),
            ::std::mem::offset_of!($record, $field) + $index * 4,
            $bits,
        )
    };
    ($record:ty, $outer:ident: $inner:ty => $field:ident $([$index:literal])?, $bits:expr) => {
        $crate::delta::field::NetField::new(
            concat!(stringify!($outer), ".", stringify!($field) $(, "[", stringify!($index), "]")?),
            ::std::mem::offset_of!($record, $outer)
                + ::std::mem::offset_of!($inner, $field)
                $(+ $index * 4)?,
            $bits,
        )
    };
}

pub(crate) use net_field;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Inner {
        kind: i32,
        base: [f32; 3],
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Sample {
        number: i32,
        inner: Inner,
        values: [i32; 2],
    }

    impl NetRecord for Sample {}

    const SAMPLE_FIELDS: [NetField; 4] = [
        net_field!(Sample, number, 10),
        net_field!(Sample, inner: Inner => kind, 8),
        net_field!(Sample, inner: Inner => base[2], FLOAT_FIELD),
        net_field!(Sample, values[1], -16),
    ];

    #[test]
    fn test_macro_offsets_and_names() {
        assert_eq!(SAMPLE_FIELDS[0].word, 0);
        assert_eq!(SAMPLE_FIELDS[1].word, 1);
        assert_eq!(SAMPLE_FIELDS[1].name, "inner.kind");
        assert_eq!(SAMPLE_FIELDS[2].word, 4);
        assert_eq!(SAMPLE_FIELDS[2].name, "inner.base[2]");
        assert!(SAMPLE_FIELDS[2].is_float());
        assert_eq!(SAMPLE_FIELDS[3].word, 6);
        assert_eq!(SAMPLE_FIELDS[3].name, "values[1]");
    }

    #[test]
    fn test_word_views() {
        let mut sample = Sample {
            number: 7,
            ..Sample::default()
        };
        sample.inner.base[2] = 1.5;
        assert_eq!(sample.words().len(), 7);
        assert_eq!(sample.words()[0], 7);
        assert_eq!(sample.words()[4], 1.5f32.to_bits());
        assert_eq!((sample.number, sample.inner.kind), (7, 0));

        sample.words_mut()[6] = (-3i32) as u32;
        assert_eq!(sample.values[1], -3);
    }

    #[test]
    fn test_table_codings() {
        assert_eq!(TableId::PlayerState.coding(), FieldCoding::Dense);
        assert_eq!(TableId::EntityState.coding(), FieldCoding::Sparse);
        assert_eq!(TableId::RelayShared.to_string(), "relay_shared");
    }
}
