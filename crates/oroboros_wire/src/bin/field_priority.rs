//! # Field Priority Report
//!
//! Pushes a synthetic game workload through every codec with a counting
//! telemetry sink, then prints each field table reordered by how often its
//! slots changed. Hot fields belong at the front of a table; paste the
//! output back into the record source to move them there.
//!
//! ## Usage
//!
//! ```bash
//! field_priority --config report.toml --samples 20000 --seed 7
//! RUST_LOG=oroboros_wire=trace field_priority --samples 10
//! ```

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use oroboros_wire::records::{ANIM_BITS, MAX_CLIENTS, MAX_EVENTS, MAX_WEAPONS};
use oroboros_wire::{
    BitBuffer, DeltaCodec, DeltaKey, EntityShared, EntityState, FieldUsage, PlayerState,
    ReportConfig, TableId, UserCmd, WireError, WireResult, MAX_GENTITIES,
};

/// Entities alive in the synthetic world.
const ACTIVE_ENTITIES: usize = 128;

/// Milliseconds per server frame.
const FRAME_MSEC: i32 = 50;

/// Message counters for one record kind.
#[derive(Debug, Default)]
struct Totals {
    messages: u64,
    bits: u64,
    bytes: u64,
    overflows: u64,
}

impl Totals {
    fn record(&mut self, msg: &BitBuffer<'_>) {
        self.messages += 1;
        self.bits += msg.uncompressed_bits();
        self.bytes += msg.len() as u64;
        if msg.is_overflowed() {
            self.overflows += 1;
        }
    }

    fn print(&self, label: &str) {
        let messages = self.messages.max(1) as f64;
        println!(
            "│ {label:<10} {:>8} msgs   {:>8.1} bits/msg   {:>7.1} bytes/msg   {} overflowed",
            self.messages,
            self.bits as f64 / messages,
            self.bytes as f64 / messages,
            self.overflows,
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         OROBOROS WIRE - FIELD PRIORITY REPORT                    ║");
    println!("║         EVERY BIT ON THE WIRE IS A BIT WE CHOSE                  ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config = match parse_args() {
        Ok(Some(config)) => config,
        Ok(None) => return,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&config) {
        error!(error = %e, "workload failed");
        std::process::exit(1);
    }
}

/// Returns `None` when only help was requested.
fn parse_args() -> WireResult<Option<ReportConfig>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ReportConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if let Some(path) = args.get(i + 1) {
                    let source = std::fs::read_to_string(path)
                        .map_err(|e| WireError::Config(format!("{path}: {e}")))?;
                    config = ReportConfig::from_toml_str(&source)?;
                    i += 1;
                }
            }
            "--samples" | "-n" => {
                if let Some(value) = args.get(i + 1) {
                    config.samples = value.parse().unwrap_or(config.samples);
                    i += 1;
                }
            }
            "--seed" | "-s" => {
                if let Some(value) = args.get(i + 1) {
                    config.seed = value.parse().unwrap_or(config.seed);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: field_priority [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>     TOML report config");
                println!("  -n, --samples <NUM>     Deltas per record kind (default: 10000)");
                println!("  -s, --seed <SEED>       RNG seed");
                println!("  -h, --help              Show this help");
                return Ok(None);
            }
            other => warn!(argument = other, "ignoring unknown argument"),
        }
        i += 1;
    }

    if config.samples == 0 || config.buffer_size == 0 {
        return Err(WireError::Config("samples and buffer_size must be non-zero".into()));
    }
    Ok(Some(config))
}

fn run(config: &ReportConfig) -> WireResult<()> {
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Samples per kind:   {}", config.samples);
    println!("│ Seed:               {:#x}", config.seed);
    println!("│ Buffer size:        {} bytes", config.buffer_size);
    println!("│ Strip strings:      {}", config.channel.strip);
    println!("└─────────────────────────────────────────────────────────────────┘");
    println!();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut codec = DeltaCodec::with_telemetry(FieldUsage::new());
    let mut buffer = vec![0u8; config.buffer_size];
    let start = Instant::now();

    let entities = run_entities(&mut codec, &mut rng, config, &mut buffer)?;
    let (shared, relay) = run_shared(&mut codec, &mut rng, config, &mut buffer)?;
    let players = run_players(&mut codec, &mut rng, config, &mut buffer);
    let commands = run_usercmds(&mut codec, &mut rng, config, &mut buffer);

    info!(elapsed_ms = start.elapsed().as_millis(), "workload complete");

    let usage = codec.into_telemetry();
    for table in TableId::ALL {
        println!("{}", usage.render_priority_table(table));
    }

    println!("┌─ CHANGE VECTORS (entity) ───────────────────────────────────────┐");
    print!("{}", usage.report_change_vectors(TableId::EntityState));
    println!("└─────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ RESULTS ───────────────────────────────────────────────────────┐");
    entities.print("entity");
    shared.print("shared");
    relay.print("relay");
    players.print("player");
    commands.print("usercmd");
    println!("│");
    println!("│ Unchanged flags inside lc:  {}", usage.wasted_bits());
    println!("│ Slots elided past lc:       {}", usage.elided_fields());
    println!("└─────────────────────────────────────────────────────────────────┘");
    Ok(())
}

// ============================================================================
// WORKLOADS
// ============================================================================

fn step_entity(rng: &mut StdRng, state: &mut EntityState, time: i32) {
    if rng.gen_bool(0.7) {
        state.pos.tr_type = 2;
        state.pos.tr_time = time;
        for axis in 0..3 {
            state.pos.tr_base[axis] += rng.gen_range(-24.0f32..24.0).round();
            state.pos.tr_delta[axis] = rng.gen_range(-320.0f32..320.0);
        }
        state.origin = state.pos.tr_base;
    }
    if rng.gen_bool(0.3) {
        state.apos.tr_base[1] = rng.gen_range(0.0f32..360.0);
        state.angles = state.apos.tr_base;
    }
    if rng.gen_bool(0.2) {
        state.legs_anim = rng.gen_range(0..1 << ANIM_BITS);
        state.torso_anim = rng.gen_range(0..1 << ANIM_BITS);
    }
    if rng.gen_bool(0.05) {
        let slot = state.event_sequence as usize % MAX_EVENTS;
        state.events[slot] = rng.gen_range(1..256);
        state.event_parms[slot] = rng.gen_range(0..256);
        state.event_sequence = (state.event_sequence + 1) & 0xFF;
    }
    if rng.gen_bool(0.02) {
        state.e_flags ^= 1 << rng.gen_range(0..24);
        state.weapon = rng.gen_range(0..MAX_WEAPONS as i32);
    }
}

fn run_entities(
    codec: &mut DeltaCodec<FieldUsage>,
    rng: &mut StdRng,
    config: &ReportConfig,
    buffer: &mut [u8],
) -> WireResult<Totals> {
    let mut totals = Totals::default();
    let mut baselines: Vec<EntityState> = (0..ACTIVE_ENTITIES as i32)
        .map(|n| EntityState::with_number(n % MAX_GENTITIES))
        .collect();

    for sample in 0..config.samples {
        let time = sample as i32 * FRAME_MSEC;
        let index = rng.gen_range(0..baselines.len());
        let mut msg = BitBuffer::with_config(buffer, &config.channel);

        if rng.gen_bool(0.01) {
            codec.write_delta_entity(&mut msg, &baselines[index], None, false)?;
            baselines[index] = EntityState::with_number(baselines[index].number);
        } else {
            let mut state = baselines[index];
            step_entity(rng, &mut state, time);
            codec.write_delta_entity(&mut msg, &baselines[index], Some(&state), false)?;
            baselines[index] = state;
        }
        totals.record(&msg);
    }
    Ok(totals)
}

fn run_shared(
    codec: &mut DeltaCodec<FieldUsage>,
    rng: &mut StdRng,
    config: &ReportConfig,
    buffer: &mut [u8],
) -> WireResult<(Totals, Totals)> {
    let mut shared = Totals::default();
    let mut relay = Totals::default();
    let mut baselines = vec![
        EntityShared {
            linked: 1,
            mins: [-15.0, -15.0, -24.0],
            maxs: [15.0, 15.0, 32.0],
            contents: 0x0200_0000,
            owner_num: MAX_GENTITIES - 2,
            ..EntityShared::default()
        };
        ACTIVE_ENTITIES
    ];

    for sample in 0..config.samples {
        let index = rng.gen_range(0..baselines.len());
        let from = baselines[index];
        let mut to = from;

        if rng.gen_bool(0.6) {
            for axis in 0..3 {
                to.current_origin[axis] += rng.gen_range(-16.0f32..16.0).round();
                to.absmin[axis] = to.current_origin[axis] + to.mins[axis] - 1.0;
                to.absmax[axis] = to.current_origin[axis] + to.maxs[axis] + 1.0;
            }
            to.linkcount = (to.linkcount + 1) & 0xFF;
        }
        if rng.gen_bool(0.25) {
            to.current_angles[1] = rng.gen_range(0.0f32..360.0);
        }
        if rng.gen_bool(0.05) {
            to.event_time = sample as i32 * FRAME_MSEC;
        }
        if rng.gen_bool(0.01) {
            to.linked ^= 1;
            to.svflags ^= 0x10;
        }

        {
            let mut msg = BitBuffer::with_config(buffer, &config.channel);
            codec.write_delta_shared(&mut msg, &from, &to, false, index as i32)?;
            shared.record(&msg);
        }
        {
            let mut msg = BitBuffer::with_config(buffer, &config.channel);
            codec.write_delta_relay(&mut msg, &from, Some(&to), false);
            relay.record(&msg);
        }
        baselines[index] = to;
    }
    Ok((shared, relay))
}

fn step_player(rng: &mut StdRng, state: &mut PlayerState) {
    state.command_time += rng.gen_range(8..=FRAME_MSEC);
    state.bob_cycle = (state.bob_cycle + rng.gen_range(0..12)) & 0xFF;
    for axis in 0..2 {
        state.velocity[axis] = rng.gen_range(-320.0f32..320.0).round();
        state.origin[axis] += state.velocity[axis] * 0.05;
    }
    state.viewangles[0] = rng.gen_range(-85.0f32..85.0);
    state.viewangles[1] = rng.gen_range(0.0f32..360.0);
    state.movement_dir = rng.gen_range(0..8);

    if rng.gen_bool(0.3) {
        state.weapon_time = rng.gen_range(-50..400);
        let clip = rng.gen_range(0..MAX_WEAPONS);
        state.ammoclip[clip] = (state.ammoclip[clip] - 1).max(0);
    }
    if rng.gen_bool(0.1) {
        state.stats[0] = rng.gen_range(0..156);
        state.damage_count = rng.gen_range(0..100);
        state.damage_yaw = rng.gen_range(0..256);
    }
    if rng.gen_bool(0.02) {
        let weapon = rng.gen_range(0..MAX_WEAPONS);
        state.ammo[weapon] = rng.gen_range(0..300);
        state.weapon = weapon as i32;
    }
    if rng.gen_bool(0.01) {
        state.persistant[rng.gen_range(0..4)] += 1;
        state.client_num = rng.gen_range(0..MAX_CLIENTS);
    }
}

fn run_players(
    codec: &mut DeltaCodec<FieldUsage>,
    rng: &mut StdRng,
    config: &ReportConfig,
    buffer: &mut [u8],
) -> Totals {
    let mut totals = Totals::default();
    let mut baseline: Option<PlayerState> = None;
    let mut state = PlayerState::default();
    state.gravity = 800;
    state.speed = 320;
    state.ammoclip = [30; MAX_WEAPONS];

    for _ in 0..config.samples {
        step_player(rng, &mut state);
        let mut msg = BitBuffer::with_config(buffer, &config.channel);
        codec.write_delta_playerstate(&mut msg, baseline.as_ref(), &state);
        totals.record(&msg);
        baseline = Some(state);
    }
    totals
}

fn run_usercmds(
    codec: &mut DeltaCodec<FieldUsage>,
    rng: &mut StdRng,
    config: &ReportConfig,
    buffer: &mut [u8],
) -> Totals {
    let mut totals = Totals::default();
    let key = DeltaKey::new(rng.gen());
    let moves = [-127i8, 0, 127];
    let mut from = UserCmd::default();

    for _ in 0..config.samples {
        let mut to = from;
        to.server_time += rng.gen_range(8..=16);
        if rng.gen_bool(0.6) {
            to.angles[1] = (to.angles[1] + rng.gen_range(-400..400)) & 0xFFFF;
            to.forward_move = moves[rng.gen_range(0..moves.len())];
            to.right_move = moves[rng.gen_range(0..moves.len())];
        }
        if rng.gen_bool(0.1) {
            to.buttons ^= 1;
        }

        let mut msg = BitBuffer::with_config(buffer, &config.channel);
        codec.write_delta_usercmd_key(&mut msg, key, &from, &to);
        totals.record(&msg);
        from = to;
    }
    totals
}
