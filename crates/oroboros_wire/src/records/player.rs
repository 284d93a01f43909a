//! # Player State
//!
//! The state of the player a client is controlling: movement, view and
//! inventory. It changes every frame, so its table uses dense coding (no
//! zero flags) and the large, mostly static arrays travel in their own
//! bitmask blocks after the field section.
//!
//! ## Wire format
//!
//! ```text
//! [lc:8][fields...]
//! [any:1] { [changed:1][mask:16][values] } x stats, persistant, holdable, powerups
//! [any:1] { [changed:1][mask:16][values] } x 4 ammo banks
//!         { [changed:1][mask:16][values] } x 4 clip banks
//! ```
//!
//! Array values are 16 bits, except powerups which are 32.

use bytemuck::{Pod, Zeroable};
use tracing::trace;

use crate::delta::engine::{last_changed, read_field_count, read_fields, write_fields};
use crate::delta::field::{net_field, NetField, NetRecord, TableId, FLOAT_FIELD};
use crate::delta::{DeltaCodec, FieldTelemetry};
use crate::error::WireResult;
use crate::protocol::BitBuffer;

use super::{
    ANIM_BITS, GENTITYNUM_BITS, MAX_EVENTS, MAX_HOLDABLE, MAX_PERSISTANT, MAX_POWERUPS, MAX_STATS,
    MAX_WEAPONS,
};

/// Weapons per ammo bank.
const AMMO_BANK: usize = 16;
const AMMO_BANKS: usize = MAX_WEAPONS / AMMO_BANK;

/// The controlled player's state.
///
/// The leading block mirrors the field table. The arrays travel in bitmask
/// blocks. The trailing fields are local to each peer and never sent.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PlayerState {
    pub command_time: i32,
    pub pm_type: i32,
    pub bob_cycle: i32,
    pub pm_flags: i32,
    pub pm_time: i32,
    pub origin: [f32; 3],
    pub velocity: [f32; 3],
    pub weapon_time: i32,
    pub weapon_delay: i32,
    pub grenade_time_left: i32,
    pub gravity: i32,
    pub leanf: f32,
    pub speed: i32,
    pub delta_angles: [i32; 3],
    pub ground_entity_num: i32,
    pub legs_timer: i32,
    pub torso_timer: i32,
    pub legs_anim: i32,
    pub torso_anim: i32,
    pub movement_dir: i32,
    pub e_flags: i32,
    pub event_sequence: i32,
    pub events: [i32; MAX_EVENTS],
    pub event_parms: [i32; MAX_EVENTS],
    pub client_num: i32,
    pub weapons: [i32; 2],
    pub weapon: i32,
    pub weaponstate: i32,
    pub weap_anim: i32,
    pub viewangles: [f32; 3],
    pub viewheight: i32,
    pub damage_event: i32,
    pub damage_yaw: i32,
    pub damage_pitch: i32,
    pub damage_count: i32,
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub crouch_max_z: f32,
    pub crouch_view_height: f32,
    pub stand_view_height: f32,
    pub dead_view_height: f32,
    pub run_speed_scale: f32,
    pub sprint_speed_scale: f32,
    pub crouch_speed_scale: f32,
    pub friction: f32,
    pub viewlocked: i32,
    pub viewlocked_ent_num: i32,
    pub next_weapon: i32,
    pub team_num: i32,
    pub on_fire_start: i32,
    pub cur_weap_heat: i32,
    pub aim_spread_scale: i32,
    pub server_cursor_hint: i32,
    pub server_cursor_hint_val: i32,
    pub class_weapon_time: i32,
    pub identify_client: i32,
    pub identify_client_health: i32,
    pub ai_state: i32,

    pub stats: [i32; MAX_STATS],
    pub persistant: [i32; MAX_PERSISTANT],
    pub holdable: [i32; MAX_HOLDABLE],
    pub powerups: [i32; MAX_POWERUPS],
    pub ammo: [i32; MAX_WEAPONS],
    pub ammoclip: [i32; MAX_WEAPONS],

    pub ping: i32,
    pub pmove_framecount: i32,
    pub entity_event_sequence: i32,
}

impl NetRecord for PlayerState {}

impl Default for PlayerState {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Player slots in wire order.
pub const PLAYER_STATE_FIELDS: [NetField; 77] = [
    net_field!(PlayerState, command_time, 32),
    net_field!(PlayerState, pm_type, 8),
    net_field!(PlayerState, bob_cycle, 8),
    net_field!(PlayerState, pm_flags, 16),
    net_field!(PlayerState, pm_time, -16),
    net_field!(PlayerState, origin[0], FLOAT_FIELD),
    net_field!(PlayerState, origin[1], FLOAT_FIELD),
    net_field!(PlayerState, origin[2], FLOAT_FIELD),
    net_field!(PlayerState, velocity[0], FLOAT_FIELD),
    net_field!(PlayerState, velocity[1], FLOAT_FIELD),
    net_field!(PlayerState, velocity[2], FLOAT_FIELD),
    net_field!(PlayerState, weapon_time, -16),
    net_field!(PlayerState, weapon_delay, -16),
    net_field!(PlayerState, grenade_time_left, -16),
    net_field!(PlayerState, gravity, 16),
    net_field!(PlayerState, leanf, FLOAT_FIELD),
    net_field!(PlayerState, speed, 16),
    net_field!(PlayerState, delta_angles[0], 16),
    net_field!(PlayerState, delta_angles[1], 16),
    net_field!(PlayerState, delta_angles[2], 16),
    net_field!(PlayerState, ground_entity_num, GENTITYNUM_BITS),
    net_field!(PlayerState, legs_timer, 16),
    net_field!(PlayerState, torso_timer, 16),
    net_field!(PlayerState, legs_anim, ANIM_BITS),
    net_field!(PlayerState, torso_anim, ANIM_BITS),
    net_field!(PlayerState, movement_dir, 8),
    net_field!(PlayerState, e_flags, 24),
    net_field!(PlayerState, event_sequence, 8),
    net_field!(PlayerState, events[0], 8),
    net_field!(PlayerState, events[1], 8),
    net_field!(PlayerState, events[2], 8),
    net_field!(PlayerState, events[3], 8),
    net_field!(PlayerState, event_parms[0], 8),
    net_field!(PlayerState, event_parms[1], 8),
    net_field!(PlayerState, event_parms[2], 8),
    net_field!(PlayerState, event_parms[3], 8),
    net_field!(PlayerState, client_num, 8),
    net_field!(PlayerState, weapons[0], 32),
    net_field!(PlayerState, weapons[1], 32),
    net_field!(PlayerState, weapon, 7),
    net_field!(PlayerState, weaponstate, 4),
    net_field!(PlayerState, weap_anim, 10),
    net_field!(PlayerState, viewangles[0], FLOAT_FIELD),
    net_field!(PlayerState, viewangles[1], FLOAT_FIELD),
    net_field!(PlayerState, viewangles[2], FLOAT_FIELD),
    net_field!(PlayerState, viewheight, -8),
    net_field!(PlayerState, damage_event, 8),
    net_field!(PlayerState, damage_yaw, 8),
    net_field!(PlayerState, damage_pitch, 8),
    net_field!(PlayerState, damage_count, 8),
    net_field!(PlayerState, mins[0], FLOAT_FIELD),
    net_field!(PlayerState, mins[1], FLOAT_FIELD),
    net_field!(PlayerState, mins[2], FLOAT_FIELD),
    net_field!(PlayerState, maxs[0], FLOAT_FIELD),
    net_field!(PlayerState, maxs[1], FLOAT_FIELD),
    net_field!(PlayerState, maxs[2], FLOAT_FIELD),
    net_field!(PlayerState, crouch_max_z, FLOAT_FIELD),
    net_field!(PlayerState, crouch_view_height, FLOAT_FIELD),
    net_field!(PlayerState, stand_view_height, FLOAT_FIELD),
    net_field!(PlayerState, dead_view_height, FLOAT_FIELD),
    net_field!(PlayerState, run_speed_scale, FLOAT_FIELD),
    net_field!(PlayerState, sprint_speed_scale, FLOAT_FIELD),
    net_field!(PlayerState, crouch_speed_scale, FLOAT_FIELD),
    net_field!(PlayerState, friction, FLOAT_FIELD),
    net_field!(PlayerState, viewlocked, 8),
    net_field!(PlayerState, viewlocked_ent_num, 16),
    net_field!(PlayerState, next_weapon, 8),
    net_field!(PlayerState, team_num, 8),
    net_field!(PlayerState, on_fire_start, 32),
    net_field!(PlayerState, cur_weap_heat, 8),
    net_field!(PlayerState, aim_spread_scale, 8),
    net_field!(PlayerState, server_cursor_hint, 8),
    net_field!(PlayerState, server_cursor_hint_val, 8),
    net_field!(PlayerState, class_weapon_time, 32),
    net_field!(PlayerState, identify_client, 8),
    net_field!(PlayerState, identify_client_health, 8),
    net_field!(PlayerState, ai_state, 2),
];

// The table covers the leading block word for word, in order.
const _: () = assert!(PLAYER_STATE_FIELDS.len() * 4 == std::mem::offset_of!(PlayerState, stats));

/// Wire width of one array element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotWidth {
    Short,
    Long,
}

/// Bit `i` set where `from[i] != to[i]`. Arrays are at most 16 long.
fn changed_mask(from: &[i32], to: &[i32]) -> i32 {
    from.iter()
        .zip(to)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .fold(0, |mask, (i, _)| mask | (1 << i))
}

fn write_masked(msg: &mut BitBuffer<'_>, mask: i32, values: &[i32], width: SlotWidth) {
    if mask == 0 {
        msg.write_bits(0, 1);
        return;
    }
    msg.write_bits(1, 1);
    msg.write_short(mask);
    for (i, &value) in values.iter().enumerate() {
        if mask & (1 << i) != 0 {
            match width {
                SlotWidth::Short => msg.write_short(value),
                SlotWidth::Long => msg.write_long(value),
            }
        }
    }
}

fn read_masked(msg: &mut BitBuffer<'_>, values: &mut [i32], width: SlotWidth) {
    if msg.read_bits(1) == 0 {
        return;
    }
    let mask = msg.read_short();
    for (i, value) in values.iter_mut().enumerate() {
        if mask & (1 << i) != 0 {
            *value = match width {
                SlotWidth::Short => msg.read_short(),
                SlotWidth::Long => msg.read_long(),
            };
        }
    }
}

impl<T: FieldTelemetry> DeltaCodec<T> {
    /// Writes `to` as a delta from `from`, or from an all-zero state.
    ///
    /// Player records are always written, even when nothing changed.
    pub fn write_delta_playerstate(
        &mut self,
        msg: &mut BitBuffer<'_>,
        from: Option<&PlayerState>,
        to: &PlayerState,
    ) {
        let zero = PlayerState::zeroed();
        let from = from.unwrap_or(&zero);
        let start = msg.uncompressed_bits();

        let table = TableId::PlayerState;
        let lc = last_changed(table, from.words(), to.words(), &mut self.telemetry);
        msg.write_byte(lc as i32);
        write_fields(msg, table, from.words(), to.words(), lc, &mut self.telemetry);

        let arrays = [
            (changed_mask(&from.stats, &to.stats), &to.stats[..], SlotWidth::Short),
            (changed_mask(&from.persistant, &to.persistant), &to.persistant[..], SlotWidth::Short),
            (changed_mask(&from.holdable, &to.holdable), &to.holdable[..], SlotWidth::Short),
            (changed_mask(&from.powerups, &to.powerups), &to.powerups[..], SlotWidth::Long),
        ];
        if arrays.iter().any(|&(mask, _, _)| mask != 0) {
            msg.write_bits(1, 1);
            for (mask, values, width) in arrays {
                write_masked(msg, mask, values, width);
            }
        } else {
            msg.write_bits(0, 1);
        }

        let ammo_masks: [i32; AMMO_BANKS] = std::array::from_fn(|bank| {
            let range = bank * AMMO_BANK..(bank + 1) * AMMO_BANK;
            changed_mask(&from.ammo[range.clone()], &to.ammo[range])
        });
        if ammo_masks.iter().any(|&mask| mask != 0) {
            msg.write_bits(1, 1);
            for (&mask, bank) in ammo_masks.iter().zip(to.ammo.chunks_exact(AMMO_BANK)) {
                write_masked(msg, mask, bank, SlotWidth::Short);
            }
        } else {
            msg.write_bits(0, 1);
        }

        // Clips change with every shot, so they skip the outer flag.
        for (old, new) in from
            .ammoclip
            .chunks_exact(AMMO_BANK)
            .zip(to.ammoclip.chunks_exact(AMMO_BANK))
        {
            write_masked(msg, changed_mask(old, new), new, SlotWidth::Short);
        }

        trace!(lc, bits = msg.uncompressed_bits() - start, "playerstate written");
    }

    /// Reads a player delta into `to`. Local-only fields come from `from`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidFieldCount`](crate::WireError::InvalidFieldCount)
    /// for a corrupt header.
    pub fn read_delta_playerstate(
        &self,
        msg: &mut BitBuffer<'_>,
        from: Option<&PlayerState>,
        to: &mut PlayerState,
    ) -> WireResult<()> {
        let zero = PlayerState::zeroed();
        let from = from.unwrap_or(&zero);
        *to = *from;

        let table = TableId::PlayerState;
        let lc = read_field_count(msg, table)?;
        trace!(lc, "playerstate delta");
        read_fields(msg, table, from.words(), to.words_mut(), lc);

        if msg.read_bits(1) != 0 {
            read_masked(msg, &mut to.stats, SlotWidth::Short);
            read_masked(msg, &mut to.persistant, SlotWidth::Short);
            read_masked(msg, &mut to.holdable, SlotWidth::Short);
            read_masked(msg, &mut to.powerups, SlotWidth::Long);
        }

        if msg.read_bits(1) != 0 {
            for bank in to.ammo.chunks_exact_mut(AMMO_BANK) {
                read_masked(msg, bank, SlotWidth::Short);
            }
        }

        for bank in to.ammoclip.chunks_exact_mut(AMMO_BANK) {
            read_masked(msg, bank, SlotWidth::Short);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(from: Option<&PlayerState>, to: &PlayerState) -> (PlayerState, u64) {
        let mut data = vec![0u8; 4096];
        let mut codec = DeltaCodec::new();
        let mut msg = BitBuffer::new(&mut data);
        codec.write_delta_playerstate(&mut msg, from, to);
        assert!(!msg.is_overflowed());
        let bits = msg.uncompressed_bits();

        msg.begin_reading();
        let mut decoded = PlayerState::default();
        codec.read_delta_playerstate(&mut msg, from, &mut decoded).unwrap();
        (decoded, bits)
    }

    #[test]
    fn test_table_shape() {
        assert_eq!(PLAYER_STATE_FIELDS[0].name, "command_time");
        assert_eq!(PLAYER_STATE_FIELDS[76].name, "ai_state");
        assert!(PLAYER_STATE_FIELDS.iter().enumerate().all(|(i, f)| f.word == i));
    }

    #[test]
    fn test_unchanged_costs_fixed_header() {
        let state = PlayerState::default();
        let (decoded, bits) = round_trip(Some(&state), &state);
        // lc byte, array flag, ammo flag, four clip flags.
        assert_eq!(bits, 8 + 1 + 1 + 4);
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_round_trip_from_zero() {
        let mut to = PlayerState::default();
        to.command_time = 86_400;
        to.pm_time = -300;
        to.origin = [1024.0, -77.25, 40.0];
        to.viewheight = -12;
        to.weapons = [0x0000_8001, -1];
        to.viewangles[1] = 270.5;
        to.stats[0] = 100;
        to.stats[15] = -5;
        to.powerups[3] = 0x7FFF_FFFF;
        to.ammo[17] = 30;
        to.ammo[63] = 200;
        to.ammoclip[5] = 8;

        let (decoded, _) = round_trip(None, &to);
        assert_eq!(decoded, to);
    }

    #[test]
    fn test_local_fields_come_from_baseline() {
        let mut from = PlayerState::default();
        from.ping = 48;
        from.pmove_framecount = 9;
        let mut to = from;
        to.ping = 999;
        to.command_time = 5;

        let (decoded, _) = round_trip(Some(&from), &to);
        assert_eq!(decoded.command_time, 5);
        assert_eq!(decoded.ping, 48);
        assert_eq!(decoded.pmove_framecount, 9);
    }

    #[test]
    fn test_dense_zero_costs_full_width() {
        let mut from = PlayerState::default();
        from.command_time = 1;
        let to = PlayerState::default();
        let (decoded, bits) = round_trip(Some(&from), &to);
        assert_eq!(decoded, to);
        assert_eq!(bits, 8 + 1 + 32 + 6);
    }

    #[test]
    fn test_changed_mask() {
        assert_eq!(changed_mask(&[1, 2, 3], &[1, 0, 4]), 0b110);
        assert_eq!(changed_mask(&[0; 16], &[0; 16]), 0);
        let mut high = [0; 16];
        high[15] = 1;
        assert_eq!(changed_mask(&[0; 16], &high), 0x8000);
    }
}
