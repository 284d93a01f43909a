//! # Records
//!
//! The concrete record kinds and their codecs. Each submodule owns one
//! record type, its field table, and the `DeltaCodec` methods that move it
//! across the wire.
//!
//! | Record | Table | Coding |
//! |--------|-------|--------|
//! | [`EntityState`] | [`ENTITY_STATE_FIELDS`] | sparse, number + remove flag |
//! | [`EntityShared`] | [`ENTITY_SHARED_FIELDS`] / [`RELAY_SHARED_FIELDS`] | sparse |
//! | [`PlayerState`] | [`PLAYER_STATE_FIELDS`] + array blocks | dense |
//! | [`UserCmd`] | hand written | XOR keyed |

// Bit packing narrows and reinterprets integers on purpose.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod entity;
pub mod player;
pub mod shared;
pub mod usercmd;

pub use entity::{EntityState, Trajectory, ENTITY_STATE_FIELDS};
pub use player::{PlayerState, PLAYER_STATE_FIELDS};
pub use shared::{EntityShared, ENTITY_SHARED_FIELDS, RELAY_MAGIC, RELAY_SHARED_FIELDS};
pub use usercmd::UserCmd;

/// Bits in an entity number.
pub const GENTITYNUM_BITS: i32 = 10;

/// Entity slots per world.
pub const MAX_GENTITIES: i32 = 1 << GENTITYNUM_BITS;

/// Entity number a removal decodes to.
pub const ENTITYNUM_NONE: i32 = MAX_GENTITIES - 1;

/// Bits in an animation index.
pub const ANIM_BITS: i32 = 10;

/// Bits in a client number.
pub const CLIENTNUM_BITS: i32 = 6;

/// Clients per server.
pub const MAX_CLIENTS: i32 = 1 << CLIENTNUM_BITS;

/// Queued events per entity.
pub const MAX_EVENTS: usize = 4;

/// Player stat slots. Every player array fits one 16-bit change mask.
pub const MAX_STATS: usize = 16;

/// Persistent stat slots.
pub const MAX_PERSISTANT: usize = 16;

/// Holdable item slots.
pub const MAX_HOLDABLE: usize = 16;

/// Powerup slots.
pub const MAX_POWERUPS: usize = 16;

/// Weapon slots, sent as four 16-weapon banks.
pub const MAX_WEAPONS: usize = 64;
