//! # User Commands
//!
//! Client input for one frame. Commands are sent several per packet, each
//! as a keyed delta from the one before it.
//!
//! ## Wire format
//!
//! ```text
//! [1][dt:8] | [0][server_time:32]
//! [0]                                  input unchanged
//! [1][keyed fields...]                 see DeltaKey
//! ```
//!
//! The key for the field section is the connection key XORed with the
//! command's `server_time`.

use tracing::trace;

use crate::delta::{DeltaCodec, DeltaKey, FieldTelemetry};
use crate::protocol::BitBuffer;

/// Width of the short `server_time` delta.
const SHORT_TIME_BITS: i32 = 8;

/// One frame of client input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct UserCmd {
    /// Server time the command was generated for, in milliseconds.
    pub server_time: i32,
    /// View angles as 16-bit binary angles.
    pub angles: [i32; 3],
    /// Forward movement, -127..=127.
    pub forward_move: i8,
    /// Strafe movement.
    pub right_move: i8,
    /// Jump / crouch movement.
    pub up_move: i8,
    /// Action buttons.
    pub buttons: u8,
    /// Weapon buttons.
    pub wbuttons: u8,
    /// Selected weapon.
    pub weapon: u8,
    /// Command flags.
    pub flags: u8,
    /// Double-tap direction, 3 bits.
    pub double_tap: u8,
    /// Client the player is looking at.
    pub ident_client: u8,
}

impl UserCmd {
    /// True if everything except the timestamp matches.
    #[must_use]
    pub fn same_input(&self, other: &Self) -> bool {
        Self {
            server_time: 0,
            ..*self
        } == Self {
            server_time: 0,
            ..*other
        }
    }
}

/// A move of -128 is how speed hacks sneak past the movement checks.
#[inline]
fn clamp_move(value: i8) -> i8 {
    value.max(-127)
}

impl<T: FieldTelemetry> DeltaCodec<T> {
    /// Writes `to` as a keyed delta from `from`.
    ///
    /// `key` is the per-connection secret; it is salted with
    /// `to.server_time` before use.
    pub fn write_delta_usercmd_key(
        &mut self,
        msg: &mut BitBuffer<'_>,
        key: DeltaKey,
        from: &UserCmd,
        to: &UserCmd,
    ) {
        let dt = to.server_time.wrapping_sub(from.server_time);
        if (0..1 << SHORT_TIME_BITS).contains(&dt) {
            msg.write_bits(1, 1);
            msg.write_bits(dt, SHORT_TIME_BITS);
        } else {
            msg.write_bits(0, 1);
            msg.write_bits(to.server_time, 32);
        }

        if from.same_input(to) {
            msg.write_bits(0, 1);
            return;
        }

        let key = key.salted(to.server_time);
        msg.write_bits(1, 1);
        for (old, new) in from.angles.iter().zip(&to.angles) {
            key.write(msg, *old, *new, 16);
        }
        key.write(msg, from.forward_move.into(), to.forward_move.into(), 8);
        key.write(msg, from.right_move.into(), to.right_move.into(), 8);
        key.write(msg, from.up_move.into(), to.up_move.into(), 8);
        key.write(msg, from.buttons.into(), to.buttons.into(), 8);
        key.write(msg, from.wbuttons.into(), to.wbuttons.into(), 8);
        key.write(msg, from.weapon.into(), to.weapon.into(), 8);
        key.write(msg, from.flags.into(), to.flags.into(), 8);
        key.write(msg, from.double_tap.into(), to.double_tap.into(), 3);
        key.write(msg, from.ident_client.into(), to.ident_client.into(), 8);
    }

    /// Reads a keyed command delta into `to`.
    ///
    /// Movement values of -128 are clamped to -127.
    pub fn read_delta_usercmd_key(
        &self,
        msg: &mut BitBuffer<'_>,
        key: DeltaKey,
        from: &UserCmd,
        to: &mut UserCmd,
    ) {
        to.server_time = if msg.read_bits(1) != 0 {
            from.server_time.wrapping_add(msg.read_bits(SHORT_TIME_BITS))
        } else {
            msg.read_bits(32)
        };

        if msg.read_bits(1) == 0 {
            *to = UserCmd {
                server_time: to.server_time,
                ..*from
            };
            return;
        }

        let key = key.salted(to.server_time);
        for (old, new) in from.angles.iter().zip(&mut to.angles) {
            *new = key.read(msg, *old, 16);
        }
        to.forward_move = clamp_move(key.read(msg, from.forward_move.into(), 8) as i8);
        to.right_move = clamp_move(key.read(msg, from.right_move.into(), 8) as i8);
        to.up_move = clamp_move(key.read(msg, from.up_move.into(), 8) as i8);
        to.buttons = key.read(msg, from.buttons.into(), 8) as u8;
        to.wbuttons = key.read(msg, from.wbuttons.into(), 8) as u8;
        to.weapon = key.read(msg, from.weapon.into(), 8) as u8;
        to.flags = key.read(msg, from.flags.into(), 8) as u8;
        to.double_tap = (key.read(msg, from.double_tap.into(), 3) & 7) as u8;
        to.ident_client = key.read(msg, from.ident_client.into(), 8) as u8;
        trace!(server_time = to.server_time, "usercmd delta");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::angle_to_short;

    const KEY: DeltaKey = DeltaKey::new(0x2F3A_9C41);

    fn running(server_time: i32) -> UserCmd {
        UserCmd {
            server_time,
            angles: [angle_to_short(10.0), angle_to_short(270.0), 0],
            forward_move: 127,
            right_move: -64,
            buttons: 1,
            weapon: 3,
            double_tap: 5,
            ..UserCmd::default()
        }
    }

    fn round_trip(from: &UserCmd, to: &UserCmd) -> (UserCmd, u64) {
        let mut data = [0u8; 64];
        let mut codec = DeltaCodec::new();
        let mut msg = BitBuffer::new(&mut data);
        codec.write_delta_usercmd_key(&mut msg, KEY, from, to);
        let bits = msg.uncompressed_bits();

        msg.begin_reading();
        let mut decoded = UserCmd::default();
        codec.read_delta_usercmd_key(&mut msg, KEY, from, &mut decoded);
        (decoded, bits)
    }

    #[test]
    fn test_unchanged_input_costs_ten_bits() {
        let from = running(1_000);
        let to = running(1_010);
        let (decoded, bits) = round_trip(&from, &to);
        assert_eq!(bits, 1 + 8 + 1);
        assert_eq!(decoded, to);
    }

    #[test]
    fn test_long_time_form() {
        let from = running(1_000);
        let to = running(1_256);
        let (decoded, bits) = round_trip(&from, &to);
        assert_eq!(bits, 1 + 32 + 1);
        assert_eq!(decoded.server_time, 1_256);

        // Time going backwards must not use the short form.
        let (decoded, _) = round_trip(&to, &from);
        assert_eq!(decoded, from);
    }

    #[test]
    fn test_changed_fields_round_trip() {
        let from = running(5_000);
        let mut to = running(5_016);
        to.angles[2] = angle_to_short(359.0);
        to.forward_move = -127;
        to.up_move = 100;
        to.wbuttons = 0xFF;
        to.flags = 0x80;
        to.double_tap = 2;
        to.ident_client = 63;

        let (decoded, _) = round_trip(&from, &to);
        assert_eq!(decoded, to);
    }

    #[test]
    fn test_speedhack_move_clamped_on_receive() {
        let from = UserCmd::default();
        let to = UserCmd {
            server_time: 50,
            forward_move: -128,
            right_move: -128,
            up_move: -128,
            ..UserCmd::default()
        };
        let (decoded, _) = round_trip(&from, &to);
        assert_eq!(decoded.forward_move, -127);
        assert_eq!(decoded.right_move, -127);
        assert_eq!(decoded.up_move, -127);
    }

    #[test]
    fn test_wrong_key_garbles_fields() {
        let from = UserCmd::default();
        let to = UserCmd {
            server_time: 20,
            weapon: 7,
            ..UserCmd::default()
        };
        let mut data = [0u8; 64];
        let mut codec = DeltaCodec::new();
        let mut msg = BitBuffer::new(&mut data);
        codec.write_delta_usercmd_key(&mut msg, KEY, &from, &to);

        msg.begin_reading();
        let mut decoded = UserCmd::default();
        codec.read_delta_usercmd_key(&mut msg, DeltaKey::new(0), &from, &mut decoded);
        assert_eq!(decoded.server_time, 20);
        assert_ne!(decoded.weapon, 7);
    }

    #[test]
    fn test_same_input_ignores_time() {
        assert!(running(1).same_input(&running(99)));
        assert!(!running(1).same_input(&UserCmd::default()));
    }
}
