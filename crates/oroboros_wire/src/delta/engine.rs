//! # Delta Engine
//!
//! Table-driven delta coding shared by every record kind.
//!
//! ## Wire layout of the field section
//!
//! ```text
//! [lc:8] then for each of the first lc slots:
//!   [changed:1]
//!   changed int,   sparse: [nonzero:1][value:bits]   dense: [value:bits]
//!   changed float, sparse: [nonzero:1][full:1][13-bit biased | 32-bit raw]
//!                  dense:  [full:1][13-bit biased | 32-bit raw]
//! ```
//!
//! Slots at or past `lc` never reach the wire; the reader copies them from
//! the baseline.

use tracing::trace;

use crate::error::{WireError, WireResult};
use crate::protocol::BitBuffer;

use super::field::{FieldCoding, NetField, TableId, FLOAT_INT_BIAS, FLOAT_INT_BITS};
use super::telemetry::FieldTelemetry;

/// One past the index of the last slot that differs, or 0 if none does.
pub(crate) fn last_changed<T: FieldTelemetry>(
    table: TableId,
    from: &[u32],
    to: &[u32],
    telemetry: &mut T,
) -> usize {
    let mut lc = 0;
    for (index, field) in table.fields().iter().enumerate() {
        if from[field.word] != to[field.word] {
            lc = index + 1;
            telemetry.field_changed(table, index);
        }
    }
    lc
}

/// Writes the first `lc` slots. The caller has already written `lc`.
pub(crate) fn write_fields<T: FieldTelemetry>(
    msg: &mut BitBuffer<'_>,
    table: TableId,
    from: &[u32],
    to: &[u32],
    lc: usize,
    telemetry: &mut T,
) {
    let fields = table.fields();
    let coding = table.coding();

    for field in &fields[..lc] {
        let value = to[field.word];
        if from[field.word] == value {
            msg.write_bits(0, 1);
            telemetry.unchanged_flag(table);
            continue;
        }
        msg.write_bits(1, 1);

        if field.is_float() {
            write_float(msg, f32::from_bits(value), coding);
        } else {
            write_int(msg, value as i32, field, coding);
        }
    }

    telemetry.fields_elided(table, fields.len() - lc);
}

#[allow(clippy::float_cmp)]
fn write_float(msg: &mut BitBuffer<'_>, value: f32, coding: FieldCoding) {
    if coding == FieldCoding::Sparse {
        // Also catches -0.0, which therefore arrives as +0.0.
        if value == 0.0 {
            msg.write_bits(0, 1);
            return;
        }
        msg.write_bits(1, 1);
    }

    let trunc = value as i32;
    if trunc as f32 == value && (-FLOAT_INT_BIAS..FLOAT_INT_BIAS).contains(&trunc) {
        msg.write_bits(0, 1);
        msg.write_bits(trunc + FLOAT_INT_BIAS, FLOAT_INT_BITS);
    } else {
        msg.write_bits(1, 1);
        msg.write_bits(value.to_bits() as i32, 32);
    }
}

fn write_int(msg: &mut BitBuffer<'_>, value: i32, field: &NetField, coding: FieldCoding) {
    if coding == FieldCoding::Sparse {
        if value == 0 {
            msg.write_bits(0, 1);
            return;
        }
        msg.write_bits(1, 1);
    }
    msg.write_bits(value, field.bits);
}

/// Reads and validates a field count.
///
/// # Errors
///
/// Returns [`WireError::InvalidFieldCount`] for a count past the table end,
/// including the `-1` of a truncated message.
pub(crate) fn read_field_count(msg: &mut BitBuffer<'_>, table: TableId) -> WireResult<usize> {
    let count = msg.read_byte();
    match usize::try_from(count) {
        Ok(lc) if lc <= table.fields().len() => Ok(lc),
        _ => Err(WireError::InvalidFieldCount {
            table: table.name(),
            count,
        }),
    }
}

/// Reads the first `lc` slots into `to` and copies the rest from `from`.
pub(crate) fn read_fields(
    msg: &mut BitBuffer<'_>,
    table: TableId,
    from: &[u32],
    to: &mut [u32],
    lc: usize,
) {
    let fields = table.fields();
    let coding = table.coding();

    for field in &fields[..lc] {
        if msg.read_bits(1) == 0 {
            to[field.word] = from[field.word];
            continue;
        }

        to[field.word] = if field.is_float() {
            let value = read_float(msg, coding);
            trace!(table = table.name(), field = field.name, value, "float");
            value.to_bits()
        } else {
            let value = read_int(msg, field, coding);
            trace!(table = table.name(), field = field.name, value, "int");
            value as u32
        };
    }

    for field in &fields[lc..] {
        to[field.word] = from[field.word];
    }
}

fn read_float(msg: &mut BitBuffer<'_>, coding: FieldCoding) -> f32 {
    if coding == FieldCoding::Sparse && msg.read_bits(1) == 0 {
        return 0.0;
    }
    if msg.read_bits(1) == 0 {
        (msg.read_bits(FLOAT_INT_BITS) - FLOAT_INT_BIAS) as f32
    } else {
        f32::from_bits(msg.read_bits(32) as u32)
    }
}

fn read_int(msg: &mut BitBuffer<'_>, field: &NetField, coding: FieldCoding) -> i32 {
    if coding == FieldCoding::Sparse && msg.read_bits(1) == 0 {
        return 0;
    }
    msg.read_bits(field.bits)
}
