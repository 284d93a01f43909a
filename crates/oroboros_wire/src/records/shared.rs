//! # Entity Shared State
//!
//! Server-side link data for an entity: bounds, link state and ownership.
//! Two tables describe it.
//!
//! - [`ENTITY_SHARED_FIELDS`] covers the whole record for server demos.
//! - [`RELAY_SHARED_FIELDS`] carries only placement data to relay
//!   streams, framed by [`RELAY_MAGIC`] so a relay can resync.
//!
//! ## Wire format
//!
//! ```text
//! shared:  [number:10][0]                     forced no-op
//!          [number:10][1][lc:8][fields...]    delta
//! relay:   [0x77][1]                          removal
//!          [0x77][0][0]                       forced no-op
//!          [0x77][0][1][lc:8][fields...]      delta
//! ```

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace};

use crate::delta::engine::{last_changed, read_field_count, read_fields, write_fields};
use crate::delta::field::{net_field, NetField, NetRecord, TableId, FLOAT_FIELD};
use crate::delta::{DeltaCodec, FieldTelemetry};
use crate::error::{WireError, WireResult};
use crate::protocol::BitBuffer;

use super::{CLIENTNUM_BITS, GENTITYNUM_BITS, MAX_GENTITIES};

/// Framing byte in front of every relay record.
pub const RELAY_MAGIC: u8 = 0x77;

/// Link data the server keeps beside each entity.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct EntityShared {
    pub linked: i32,
    pub linkcount: i32,
    pub svflags: i32,
    pub single_client: i32,
    pub bmodel: i32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub contents: i32,
    pub absmin: [f32; 3],
    pub absmax: [f32; 3],
    pub current_origin: [f32; 3],
    pub current_angles: [f32; 3],
    pub owner_num: i32,
    pub event_time: i32,
    pub worldflags: i32,
    pub snapshot_callback: i32,
}

impl NetRecord for EntityShared {}

/// Full shared-state table.
///
/// `owner_num` appears twice: the 10-bit slot is enough for entity owners,
/// the 32-bit one near the end keeps values the short slot truncates.
pub const ENTITY_SHARED_FIELDS: [NetField; 29] = [
    net_field!(EntityShared, linked, 1),
    // Enough to see whether the count has changed.
    net_field!(EntityShared, linkcount, 8),
    net_field!(EntityShared, bmodel, 1),
    net_field!(EntityShared, svflags, 12),
    net_field!(EntityShared, single_client, CLIENTNUM_BITS),
    net_field!(EntityShared, contents, 32),
    net_field!(EntityShared, owner_num, GENTITYNUM_BITS),
    net_field!(EntityShared, mins[0], FLOAT_FIELD),
    net_field!(EntityShared, mins[1], FLOAT_FIELD),
    net_field!(EntityShared, mins[2], FLOAT_FIELD),
    net_field!(EntityShared, maxs[0], FLOAT_FIELD),
    net_field!(EntityShared, maxs[1], FLOAT_FIELD),
    net_field!(EntityShared, maxs[2], FLOAT_FIELD),
    net_field!(EntityShared, absmin[0], FLOAT_FIELD),
    net_field!(EntityShared, absmin[1], FLOAT_FIELD),
    net_field!(EntityShared, absmin[2], FLOAT_FIELD),
    net_field!(EntityShared, absmax[0], FLOAT_FIELD),
    net_field!(EntityShared, absmax[1], FLOAT_FIELD),
    net_field!(EntityShared, absmax[2], FLOAT_FIELD),
    net_field!(EntityShared, current_origin[0], FLOAT_FIELD),
    net_field!(EntityShared, current_origin[1], FLOAT_FIELD),
    net_field!(EntityShared, current_origin[2], FLOAT_FIELD),
    net_field!(EntityShared, current_angles[0], FLOAT_FIELD),
    net_field!(EntityShared, current_angles[1], FLOAT_FIELD),
    net_field!(EntityShared, current_angles[2], FLOAT_FIELD),
    net_field!(EntityShared, owner_num, 32),
    net_field!(EntityShared, event_time, 32),
    net_field!(EntityShared, worldflags, 32),
    net_field!(EntityShared, snapshot_callback, 1),
];

/// Reduced table for relay streams.
pub const RELAY_SHARED_FIELDS: [NetField; 14] = [
    net_field!(EntityShared, current_origin[0], FLOAT_FIELD),
    net_field!(EntityShared, current_origin[1], FLOAT_FIELD),
    net_field!(EntityShared, current_origin[2], FLOAT_FIELD),
    net_field!(EntityShared, current_angles[0], FLOAT_FIELD),
    net_field!(EntityShared, current_angles[1], FLOAT_FIELD),
    net_field!(EntityShared, current_angles[2], FLOAT_FIELD),
    net_field!(EntityShared, svflags, 32),
    net_field!(EntityShared, mins[0], FLOAT_FIELD),
    net_field!(EntityShared, mins[1], FLOAT_FIELD),
    net_field!(EntityShared, mins[2], FLOAT_FIELD),
    net_field!(EntityShared, maxs[0], FLOAT_FIELD),
    net_field!(EntityShared, maxs[1], FLOAT_FIELD),
    net_field!(EntityShared, maxs[2], FLOAT_FIELD),
    net_field!(EntityShared, single_client, 8),
];

impl<T: FieldTelemetry> DeltaCodec<T> {
    // ========================================================================
    // SHARED
    // ========================================================================

    /// Writes the shared state of entity `number` as a delta from `from`.
    ///
    /// Without `force`, an unchanged record writes nothing, not even the
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BadEntityNumber`] if `number` is outside
    /// `0..MAX_GENTITIES`.
    pub fn write_delta_shared(
        &mut self,
        msg: &mut BitBuffer<'_>,
        from: &EntityShared,
        to: &EntityShared,
        force: bool,
        number: i32,
    ) -> WireResult<()> {
        if !(0..MAX_GENTITIES).contains(&number) {
            return Err(WireError::BadEntityNumber(number));
        }

        let table = TableId::EntityShared;
        let lc = last_changed(table, from.words(), to.words(), &mut self.telemetry);
        if lc == 0 {
            if force {
                msg.write_bits(number, GENTITYNUM_BITS);
                msg.write_bits(0, 1);
            }
            return Ok(());
        }

        msg.write_bits(number, GENTITYNUM_BITS);
        msg.write_bits(1, 1);
        msg.write_byte(lc as i32);
        write_fields(msg, table, from.words(), to.words(), lc, &mut self.telemetry);
        Ok(())
    }

    /// Reads a shared-state record. The caller has already read the number.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidFieldCount`] for a corrupt header.
    pub fn read_delta_shared(
        &self,
        msg: &mut BitBuffer<'_>,
        from: &EntityShared,
        to: &mut EntityShared,
    ) -> WireResult<()> {
        if msg.read_bits(1) == 0 {
            *to = *from;
            return Ok(());
        }

        let table = TableId::EntityShared;
        let lc = read_field_count(msg, table)?;
        trace!(lc, "shared delta");
        read_fields(msg, table, from.words(), to.words_mut(), lc);
        Ok(())
    }

    // ========================================================================
    // RELAY
    // ========================================================================

    /// Writes a relay record, or a removal if `to` is `None`.
    pub fn write_delta_relay(
        &mut self,
        msg: &mut BitBuffer<'_>,
        from: &EntityShared,
        to: Option<&EntityShared>,
        force: bool,
    ) {
        let Some(to) = to else {
            msg.write_bits(i32::from(RELAY_MAGIC), 8);
            msg.write_bits(1, 1);
            return;
        };

        let table = TableId::RelayShared;
        let lc = last_changed(table, from.words(), to.words(), &mut self.telemetry);
        if lc == 0 {
            if force {
                msg.write_bits(i32::from(RELAY_MAGIC), 8);
                msg.write_bits(0, 1);
                msg.write_bits(0, 1);
            }
            return;
        }

        msg.write_bits(i32::from(RELAY_MAGIC), 8);
        msg.write_bits(0, 1);
        msg.write_bits(1, 1);
        msg.write_byte(lc as i32);
        write_fields(msg, table, from.words(), to.words(), lc, &mut self.telemetry);
    }

    /// Reads a relay record. A removal leaves `to` zeroed.
    ///
    /// Slots the relay table does not carry keep their baseline values.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BadMagic`] if the framing byte is wrong and
    /// [`WireError::InvalidFieldCount`] for a corrupt header.
    pub fn read_delta_relay(
        &self,
        msg: &mut BitBuffer<'_>,
        from: &EntityShared,
        to: &mut EntityShared,
    ) -> WireResult<()> {
        let magic = msg.read_bits(8);
        if magic != i32::from(RELAY_MAGIC) {
            return Err(WireError::BadMagic {
                expected: RELAY_MAGIC,
                found: magic,
            });
        }

        *to = *from;
        if msg.read_bits(1) == 1 {
            *to = EntityShared::zeroed();
            debug!("relay entity removed");
            return Ok(());
        }
        if msg.read_bits(1) == 0 {
            return Ok(());
        }

        let table = TableId::RelayShared;
        let lc = read_field_count(msg, table)?;
        trace!(lc, "relay delta");
        read_fields(msg, table, from.words(), to.words_mut(), lc);
        Ok(())
    }
}
