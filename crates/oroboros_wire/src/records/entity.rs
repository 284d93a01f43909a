//! # Entity State
//!
//! Everything a client needs to draw and predict one entity.
//!
//! ## Wire format
//!
//! ```text
//! [number:10][removed:1]                      removal
//! [number:10][0][0]                           forced no-op
//! [number:10][0][1][lc:8][fields...]          delta
//! ```
//!
//! A non-forced delta with no changes writes nothing at all; the snapshot
//! layer relies on that to skip entities that did not move.

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace};

use crate::delta::engine::{last_changed, read_field_count, read_fields, write_fields};
use crate::delta::field::{net_field, NetField, NetRecord, TableId, FLOAT_FIELD};
use crate::delta::{DeltaCodec, FieldTelemetry};
use crate::error::{WireError, WireResult};
use crate::protocol::BitBuffer;

use super::{ANIM_BITS, ENTITYNUM_NONE, GENTITYNUM_BITS, MAX_GENTITIES, MAX_EVENTS};

/// Parametric motion path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Trajectory {
    /// Interpolation kind.
    pub tr_type: i32,
    /// Start time in milliseconds.
    pub tr_time: i32,
    /// Duration for finite paths.
    pub tr_duration: i32,
    /// Position at `tr_time`.
    pub tr_base: [f32; 3],
    /// Velocity or direction.
    pub tr_delta: [f32; 3],
}

/// Network state of one entity.
///
/// Field names follow the game's own record; only `number` is documented
/// because it is the only one the codec interprets.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct EntityState {
    /// Entity index; not part of the field table.
    pub number: i32,
    pub e_type: i32,
    pub e_flags: i32,
    pub pos: Trajectory,
    pub apos: Trajectory,
    pub time: i32,
    pub time2: i32,
    pub origin: [f32; 3],
    pub origin2: [f32; 3],
    pub angles: [f32; 3],
    pub angles2: [f32; 3],
    pub other_entity_num: i32,
    pub other_entity_num2: i32,
    pub ground_entity_num: i32,
    pub constant_light: i32,
    pub dl_intensity: i32,
    pub loop_sound: i32,
    pub modelindex: i32,
    pub modelindex2: i32,
    pub client_num: i32,
    pub frame: i32,
    pub solid: i32,
    pub event: i32,
    pub event_parm: i32,
    pub event_sequence: i32,
    pub events: [i32; MAX_EVENTS],
    pub event_parms: [i32; MAX_EVENTS],
    pub powerups: i32,
    pub weapon: i32,
    pub legs_anim: i32,
    pub torso_anim: i32,
    pub density: i32,
    pub dmg_flags: i32,
    pub on_fire_start: i32,
    pub on_fire_end: i32,
    pub next_weapon: i32,
    pub team_num: i32,
    pub effect1_time: i32,
    pub effect2_time: i32,
    pub effect3_time: i32,
    pub ai_state: i32,
    pub anim_movetype: i32,
}

impl NetRecord for EntityState {}

impl EntityState {
    /// A zeroed state for entity `number`.
    #[must_use]
    pub fn with_number(number: i32) -> Self {
        Self {
            number,
            ..Self::zeroed()
        }
    }

    /// Returns true for the marker a removal decodes to.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.number == ENTITYNUM_NONE
    }
}

/// Entity slots in wire order. `number` travels separately.
pub const ENTITY_STATE_FIELDS: [NetField; 71] = [
    net_field!(EntityState, e_type, 8),
    net_field!(EntityState, e_flags, 24),
    net_field!(EntityState, pos: Trajectory => tr_type, 8),
    net_field!(EntityState, pos: Trajectory => tr_time, 32),
    net_field!(EntityState, pos: Trajectory => tr_duration, 32),
    net_field!(EntityState, pos: Trajectory => tr_base[0], FLOAT_FIELD),
    net_field!(EntityState, pos: Trajectory => tr_base[1], FLOAT_FIELD),
    net_field!(EntityState, pos: Trajectory => tr_base[2], FLOAT_FIELD),
    net_field!(EntityState, pos: Trajectory => tr_delta[0], FLOAT_FIELD),
    net_field!(EntityState, pos: Trajectory => tr_delta[1], FLOAT_FIELD),
    net_field!(EntityState, pos: Trajectory => tr_delta[2], FLOAT_FIELD),
    net_field!(EntityState, apos: Trajectory => tr_type, 8),
    net_field!(EntityState, apos: Trajectory => tr_time, 32),
    net_field!(EntityState, apos: Trajectory => tr_duration, 32),
    net_field!(EntityState, apos: Trajectory => tr_base[0], FLOAT_FIELD),
    net_field!(EntityState, apos: Trajectory => tr_base[1], FLOAT_FIELD),
    net_field!(EntityState, apos: Trajectory => tr_base[2], FLOAT_FIELD),
    net_field!(EntityState, apos: Trajectory => tr_delta[0], FLOAT_FIELD),
    net_field!(EntityState, apos: Trajectory => tr_delta[1], FLOAT_FIELD),
    net_field!(EntityState, apos: Trajectory => tr_delta[2], FLOAT_FIELD),
    net_field!(EntityState, time, 32),
    net_field!(EntityState, time2, 32),
    net_field!(EntityState, origin[0], FLOAT_FIELD),
    net_field!(EntityState, origin[1], FLOAT_FIELD),
    net_field!(EntityState, origin[2], FLOAT_FIELD),
    net_field!(EntityState, origin2[0], FLOAT_FIELD),
    net_field!(EntityState, origin2[1], FLOAT_FIELD),
    net_field!(EntityState, origin2[2], FLOAT_FIELD),
    net_field!(EntityState, angles[0], FLOAT_FIELD),
    net_field!(EntityState, angles[1], FLOAT_FIELD),
    net_field!(EntityState, angles[2], FLOAT_FIELD),
    net_field!(EntityState, angles2[0], FLOAT_FIELD),
    net_field!(EntityState, angles2[1], FLOAT_FIELD),
    net_field!(EntityState, angles2[2], FLOAT_FIELD),
    net_field!(EntityState, other_entity_num, GENTITYNUM_BITS),
    net_field!(EntityState, other_entity_num2, GENTITYNUM_BITS),
    net_field!(EntityState, ground_entity_num, GENTITYNUM_BITS),
    net_field!(EntityState, loop_sound, 8),
    net_field!(EntityState, constant_light, 32),
    // Wide enough to carry corona colours.
    net_field!(EntityState, dl_intensity, 32),
    net_field!(EntityState, modelindex, 9),
    net_field!(EntityState, modelindex2, 9),
    net_field!(EntityState, frame, 16),
    net_field!(EntityState, client_num, 8),
    net_field!(EntityState, solid, 24),
    net_field!(EntityState, event, 10),
    net_field!(EntityState, event_parm, 8),
    net_field!(EntityState, event_sequence, 8),
    net_field!(EntityState, events[0], 8),
    net_field!(EntityState, events[1], 8),
    net_field!(EntityState, events[2], 8),
    net_field!(EntityState, events[3], 8),
    net_field!(EntityState, event_parms[0], 8),
    net_field!(EntityState, event_parms[1], 8),
    net_field!(EntityState, event_parms[2], 8),
    net_field!(EntityState, event_parms[3], 8),
    net_field!(EntityState, powerups, 16),
    net_field!(EntityState, weapon, 8),
    net_field!(EntityState, legs_anim, ANIM_BITS),
    net_field!(EntityState, torso_anim, ANIM_BITS),
    net_field!(EntityState, density, 10),
    net_field!(EntityState, dmg_flags, 32),
    net_field!(EntityState, on_fire_start, 32),
    net_field!(EntityState, on_fire_end, 32),
    net_field!(EntityState, next_weapon, 8),
    net_field!(EntityState, team_num, 8),
    net_field!(EntityState, effect1_time, 32),
    net_field!(EntityState, effect2_time, 32),
    net_field!(EntityState, effect3_time, 32),
    net_field!(EntityState, anim_movetype, 4),
    net_field!(EntityState, ai_state, 2),
];

// Every word except `number` must be on the wire.
const _: () = assert!(ENTITY_STATE_FIELDS.len() + 1 == std::mem::size_of::<EntityState>() / 4);

fn check_number(number: i32) -> WireResult<()> {
    if (0..MAX_GENTITIES).contains(&number) {
        Ok(())
    } else {
        Err(WireError::BadEntityNumber(number))
    }
}

impl<T: FieldTelemetry> DeltaCodec<T> {
    /// Writes `to` as a delta from `from`, or a removal if `to` is `None`.
    ///
    /// Without `force`, an unchanged entity writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BadEntityNumber`] if the number being written
    /// is outside `0..MAX_GENTITIES`.
    pub fn write_delta_entity(
        &mut self,
        msg: &mut BitBuffer<'_>,
        from: &EntityState,
        to: Option<&EntityState>,
        force: bool,
    ) -> WireResult<()> {
        let Some(to) = to else {
            check_number(from.number)?;
            debug!(number = from.number, "entity removed");
            msg.write_bits(from.number, GENTITYNUM_BITS);
            msg.write_bits(1, 1);
            return Ok(());
        };
        check_number(to.number)?;

        let table = TableId::EntityState;
        let lc = last_changed(table, from.words(), to.words(), &mut self.telemetry);
        if lc == 0 {
            if force {
                msg.write_bits(to.number, GENTITYNUM_BITS);
                msg.write_bits(0, 1);
                msg.write_bits(0, 1);
            }
            return Ok(());
        }

        msg.write_bits(to.number, GENTITYNUM_BITS);
        msg.write_bits(0, 1);
        msg.write_bits(1, 1);
        msg.write_byte(lc as i32);
        write_fields(msg, table, from.words(), to.words(), lc, &mut self.telemetry);
        Ok(())
    }

    /// Reads the entity number that prefixes every entity record.
    pub fn read_entity_number(&self, msg: &mut BitBuffer<'_>) -> i32 {
        msg.read_bits(GENTITYNUM_BITS)
    }

    /// Reads the rest of an entity record for `number` into `to`.
    ///
    /// A removal leaves `to` zeroed with `number` set to [`ENTITYNUM_NONE`].
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BadEntityNumber`] for an out of range `number`
    /// and [`WireError::InvalidFieldCount`] for a corrupt header.
    pub fn read_delta_entity(
        &self,
        msg: &mut BitBuffer<'_>,
        from: &EntityState,
        to: &mut EntityState,
        number: i32,
    ) -> WireResult<()> {
        check_number(number)?;

        if msg.read_bits(1) == 1 {
            *to = EntityState::with_number(ENTITYNUM_NONE);
            debug!(number, "entity removed");
            return Ok(());
        }

        if msg.read_bits(1) == 0 {
            *to = *from;
            to.number = number;
            return Ok(());
        }

        let table = TableId::EntityState;
        let lc = read_field_count(msg, table)?;
        trace!(number, lc, "entity delta");
        read_fields(msg, table, from.words(), to.words_mut(), lc);
        to.number = number;
        Ok(())
    }
}
