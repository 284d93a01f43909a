//! # Field Telemetry
//!
//! Opt-in counters behind the offline field priority report.
//!
//! The codec reports three things while encoding: which slot changed, every
//! "unchanged" flag it had to spend inside the scanned prefix, and how many
//! trailing slots the `lc` truncation let it skip. [`NoTelemetry`] ignores
//! all of it and compiles away. [`FieldUsage`] counts it.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::field::TableId;

/// Observer for encoder events. Every method defaults to a no-op.
pub trait FieldTelemetry {
    /// Slot `index` of `table` differs between baseline and target.
    fn field_changed(&mut self, table: TableId, index: usize) {
        let _ = (table, index);
    }

    /// One "unchanged" bit was written inside the scanned prefix.
    fn unchanged_flag(&mut self, table: TableId) {
        let _ = table;
    }

    /// `count` trailing slots were left off the wire.
    fn fields_elided(&mut self, table: TableId, count: usize) {
        let _ = (table, count);
    }
}

/// Telemetry sink that records nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoTelemetry;

impl FieldTelemetry for NoTelemetry {}

/// Counting sink used by the priority report.
#[derive(Clone, Debug, Default)]
pub struct FieldUsage {
    used: HashMap<TableId, Vec<u64>>,
    wasted_bits: u64,
    elided_fields: u64,
}

impl FieldUsage {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How often slot `index` of `table` changed.
    #[must_use]
    pub fn used(&self, table: TableId, index: usize) -> u64 {
        self.used
            .get(&table)
            .and_then(|counts| counts.get(index))
            .copied()
            .unwrap_or(0)
    }

    /// Unchanged flags spent inside scanned prefixes.
    #[must_use]
    pub const fn wasted_bits(&self) -> u64 {
        self.wasted_bits
    }

    /// Trailing slots skipped by truncation.
    #[must_use]
    pub const fn elided_fields(&self) -> u64 {
        self.elided_fields
    }

    /// Slot indices of `table`, most frequently changed first.
    ///
    /// Ties keep table order.
    #[must_use]
    pub fn priority_order(&self, table: TableId) -> Vec<usize> {
        let mut order: Vec<usize> = (0..table.fields().len()).collect();
        order.sort_by(|&a, &b| self.used(table, b).cmp(&self.used(table, a)));
        order
    }

    /// Renders `table` reordered by priority, one slot per line.
    #[must_use]
    pub fn render_priority_table(&self, table: TableId) -> String {
        let fields = table.fields();
        let mut out = String::new();
        let _ = writeln!(out, "{table} fields in order of priority");
        for index in self.priority_order(table) {
            let field = &fields[index];
            let _ = writeln!(
                out,
                "    {:<28} {:>4}    // used {}",
                field.name,
                field.bits,
                self.used(table, index)
            );
        }
        out
    }

    /// Lists the change counter of every slot of `table` that changed at all.
    #[must_use]
    pub fn report_change_vectors(&self, table: TableId) -> String {
        let mut out = String::new();
        if let Some(counts) = self.used.get(&table) {
            for (index, &count) in counts.iter().enumerate().filter(|(_, &c)| c > 0) {
                let _ = writeln!(out, "{index} used {count}");
            }
        }
        out
    }
}

impl FieldTelemetry for FieldUsage {
    fn field_changed(&mut self, table: TableId, index: usize) {
        let counts = self
            .used
            .entry(table)
            .or_insert_with(|| vec![0; table.fields().len()]);
        if let Some(count) = counts.get_mut(index) {
            *count += 1;
        }
    }

    fn unchanged_flag(&mut self, _table: TableId) {
        self.wasted_bits += 1;
    }

    fn fields_elided(&mut self, _table: TableId, count: usize) {
        self.elided_fields += count as u64;
    }
}
