//! Integration test: decoding bytes we did not write.
//!
//! Anything off the wire may be truncated, corrupt or hostile. Decoding it
//! may fail, but it must never panic or read outside the buffer.

use oroboros_wire::{
    BitBuffer, DeltaCodec, DeltaKey, EntityShared, EntityState, PlayerState, UserCmd, WireError,
    MAX_GENTITIES,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn garbage(rng: &mut StdRng) -> Vec<u8> {
    let len = rng.gen_range(0..600);
    (0..len).map(|_| rng.gen()).collect()
}

#[test]
fn test_garbage_never_panics() {
    let mut rng = StdRng::seed_from_u64(0xBAD_F00D);
    let codec = DeltaCodec::new();

    for round in 0..2_000 {
        let mut data = garbage(&mut rng);
        let len = data.len();
        let mut msg = BitBuffer::received(&mut data, len);
        msg.begin_reading();

        // Keep decoding until the stream runs dry or turns out corrupt.
        for _ in 0..8 {
            let ok = match round % 5 {
                0 => {
                    let number = codec.read_entity_number(&mut msg);
                    assert!((0..MAX_GENTITIES).contains(&number));
                    let mut to = EntityState::default();
                    codec
                        .read_delta_entity(&mut msg, &EntityState::default(), &mut to, number)
                        .is_ok()
                }
                1 => {
                    let mut to = EntityShared::default();
                    codec.read_delta_shared(&mut msg, &EntityShared::default(), &mut to).is_ok()
                }
                2 => {
                    let mut to = EntityShared::default();
                    codec.read_delta_relay(&mut msg, &EntityShared::default(), &mut to).is_ok()
                }
                3 => {
                    let mut to = PlayerState::default();
                    codec.read_delta_playerstate(&mut msg, None, &mut to).is_ok()
                }
                _ => {
                    let mut to = UserCmd::default();
                    let key = DeltaKey::new(round);
                    codec.read_delta_usercmd_key(&mut msg, key, &UserCmd::default(), &mut to);
                    assert!(to.forward_move >= -127);
                    assert!(to.double_tap < 8);
                    true
                }
            };
            if !ok || msg.is_past_end() {
                break;
            }
        }
    }
}

#[test]
fn test_garbage_strings_are_sanitized() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..200 {
        let mut data = garbage(&mut rng);
        let len = data.len();
        let mut msg = BitBuffer::received(&mut data, len);
        msg.set_strip(true);
        msg.begin_reading_oob();

        let string = msg.read_string();
        assert!(string.len() < 1024);
        assert!(string.iter().all(|&c| c != b'%' && c < 0x80 && c != 0));
        let _ = msg.read_big_string();
        let _ = msg.read_string_line();
    }
}

#[test]
fn test_oversized_field_count_rejected() {
    let mut data = [0u8; 16];
    let mut msg = BitBuffer::new(&mut data);
    // Entity 5, not removed, has delta, then an lc past the table end.
    msg.write_bits(5, 10);
    msg.write_bits(0, 1);
    msg.write_bits(1, 1);
    msg.write_byte(255);

    msg.begin_reading();
    let codec = DeltaCodec::new();
    let number = codec.read_entity_number(&mut msg);
    let mut to = EntityState::default();
    assert_eq!(
        codec.read_delta_entity(&mut msg, &EntityState::default(), &mut to, number),
        Err(WireError::InvalidFieldCount { table: "entity", count: 255 })
    );
}

#[test]
fn test_empty_message_rejected() {
    let mut data = [0u8; 16];
    let mut msg = BitBuffer::received(&mut data, 0);
    msg.begin_reading();

    let codec = DeltaCodec::new();
    let mut to = PlayerState::default();
    assert_eq!(
        codec.read_delta_playerstate(&mut msg, None, &mut to),
        Err(WireError::InvalidFieldCount { table: "player", count: -1 })
    );
    assert!(msg.is_past_end());
}

#[test]
fn test_truncated_record_reads_zeros() {
    let mut from = EntityState::with_number(9);
    from.origin = [1.0, 2.0, 3.0];
    let mut to = from;
    to.effect3_time = 123_456;
    to.e_flags = 0x40;

    let mut data = [0u8; 128];
    let full = {
        let mut codec = DeltaCodec::new();
        let mut msg = BitBuffer::new(&mut data);
        codec.write_delta_entity(&mut msg, &from, Some(&to), false).unwrap();
        msg.len()
    };

    // Chop the message in half: whatever decodes must come from the wire or zeros.
    let mut msg = BitBuffer::received(&mut data, full / 2);
    msg.begin_reading();
    let codec = DeltaCodec::new();
    let number = codec.read_entity_number(&mut msg);
    let mut decoded = EntityState::default();
    if codec.read_delta_entity(&mut msg, &from, &mut decoded, number).is_ok() {
        assert!(msg.is_past_end());
        assert_ne!(decoded, to);
    }
}

#[test]
fn test_write_overflow_keeps_earlier_records() {
    let mut codec = DeltaCodec::new();
    let from = EntityState::with_number(1);
    let mut to = from;
    to.e_type = 3;

    let mut data = [0u8; 16];
    let mut msg = BitBuffer::new(&mut data);
    codec.write_delta_entity(&mut msg, &from, Some(&to), false).unwrap();
    assert!(!msg.is_overflowed());
    let kept = msg.as_slice().to_vec();

    let mut big = from;
    big.pos.tr_base = [0.5, 0.25, 0.125];
    big.pos.tr_delta = [-0.5, -0.25, -0.125];
    big.apos.tr_base = [1.5, 2.25, 3.125];
    big.apos.tr_delta = [-1.5, -2.25, -3.125];
    codec.write_delta_entity(&mut msg, &from, Some(&big), false).unwrap();
    assert!(msg.is_overflowed());
    assert_eq!(&msg.as_slice()[..kept.len() - 1], &kept[..kept.len() - 1]);
}
