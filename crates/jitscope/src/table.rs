use jitscope_core::{JitBlock, SymbolDb};

use crate::{Column, CoreContext, FieldValue};

/// Profiling figures for one block, with the derived values precomputed at refresh time.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStats {
    pub run_count: u64,
    pub cycles_spent: u64,
    pub cycles_average: f64,
    /// Share of all cycles spent in profiled blocks of the same snapshot, in percent.
    pub cycles_percent: f64,
    pub time_spent_ns: u64,
    pub time_average_ns: f64,
    pub time_percent: f64,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// One table row: a copy of the block as it was at refresh, plus its resolved symbol name.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRow {
    pub block: JitBlock,
    pub symbol: Option<String>,
    pub stats: Option<BlockStats>,
    folded_symbol: Option<String>,
}

impl BlockRow {
    /// Build rows for a full snapshot. Symbols are resolved here, once per block, and percent
    /// figures are relative to the totals of this snapshot.
    pub fn build_all(blocks: Vec<JitBlock>, symbols: &dyn SymbolDb) -> Vec<BlockRow> {
        let (total_cycles, total_time) = blocks
            .iter()
            .filter_map(|block| block.profile)
            .fold((0u64, 0u64), |(cycles, time), p| {
                (
                    cycles.saturating_add(p.cycles_spent),
                    time.saturating_add(p.time_spent_ns),
                )
            });

        blocks
            .into_iter()
            .map(|block| {
                let symbol = symbols
                    .symbol_at(block.effective_address)
                    .map(|s| s.name.clone());
                let stats = block.profile.map(|p| BlockStats {
                    run_count: p.run_count,
                    cycles_spent: p.cycles_spent,
                    cycles_average: ratio(p.cycles_spent, p.run_count),
                    cycles_percent: 100.0 * ratio(p.cycles_spent, total_cycles),
                    time_spent_ns: p.time_spent_ns,
                    time_average_ns: ratio(p.time_spent_ns, p.run_count),
                    time_percent: 100.0 * ratio(p.time_spent_ns, total_time),
                });
                BlockRow {
                    folded_symbol: symbol.as_deref().map(str::to_lowercase),
                    symbol,
                    stats,
                    block,
                }
            })
            .collect()
    }

    pub fn effective_address(&self) -> u32 {
        self.block.effective_address
    }

    /// Lowercased symbol name, used by the case-insensitive filter.
    pub(crate) fn folded_symbol(&self) -> Option<&str> {
        self.folded_symbol.as_deref()
    }

    pub fn field(&self, column: Column) -> FieldValue {
        let block = &self.block;
        let stats = self.stats.as_ref();
        match column {
            Column::FeatureFlags => FieldValue::Flags(block.feature_flags),
            Column::EffectiveAddress => FieldValue::Address(block.effective_address),
            Column::CodeBufferSize => FieldValue::Size(block.code_buffer_size()),
            Column::RepeatInstructions => FieldValue::Size(block.repeat_instructions()),
            Column::HostNearCodeSize => FieldValue::Size(block.near.len()),
            Column::HostFarCodeSize => FieldValue::Size(block.far.len()),
            Column::RunCount => stats.map_or(FieldValue::Empty, |s| FieldValue::Counter(s.run_count)),
            Column::CyclesSpent => {
                stats.map_or(FieldValue::Empty, |s| FieldValue::Counter(s.cycles_spent))
            }
            Column::CyclesAverage => {
                stats.map_or(FieldValue::Empty, |s| FieldValue::Ratio(s.cycles_average))
            }
            Column::CyclesPercent => {
                stats.map_or(FieldValue::Empty, |s| FieldValue::Ratio(s.cycles_percent))
            }
            Column::TimeSpent => {
                stats.map_or(FieldValue::Empty, |s| FieldValue::Counter(s.time_spent_ns))
            }
            Column::TimeAverage => {
                stats.map_or(FieldValue::Empty, |s| FieldValue::Ratio(s.time_average_ns))
            }
            Column::TimePercent => {
                stats.map_or(FieldValue::Empty, |s| FieldValue::Ratio(s.time_percent))
            }
            Column::Symbol => self
                .symbol
                .clone()
                .map_or(FieldValue::Empty, FieldValue::Text),
        }
    }

    pub fn display(&self, column: Column) -> String {
        match self.field(column) {
            FieldValue::Empty => String::new(),
            value if column.is_percent() => format!("{value}%"),
            value => value.to_string(),
        }
    }
}

/// Snapshot of the JIT cache as a table of rows × [`Column`]s.
///
/// The snapshot is replaced wholesale by [`JitBlockTableModel::refresh`]; readers never observe
/// a partially rebuilt table.
#[derive(Debug, Default)]
pub struct JitBlockTableModel {
    rows: Vec<BlockRow>,
}

impl JitBlockTableModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read every block from the core and rebuild the snapshot.
    pub fn refresh(&mut self, ctx: &CoreContext<'_>) {
        let blocks = {
            let guard = ctx.cpu.guard();
            ctx.jit.jit_blocks(&guard)
        };
        self.rows = BlockRow::build_all(blocks, ctx.symbols);
        tracing::debug!(rows = self.rows.len(), "refreshed jit block table");
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        Column::ALL.len()
    }

    pub fn header(&self, column: Column) -> &'static str {
        column.title()
    }

    pub fn rows(&self) -> &[BlockRow] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> Option<&BlockRow> {
        self.rows.get(row)
    }

    pub fn find_row(&self, effective_address: u32) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.effective_address() == effective_address)
    }

    /// Typed value of a cell; [`FieldValue::Empty`] when `row` is out of range.
    pub fn field(&self, row: usize, column: Column) -> FieldValue {
        self.rows
            .get(row)
            .map_or(FieldValue::Empty, |r| r.field(column))
    }

    pub fn display(&self, row: usize, column: Column) -> String {
        self.rows
            .get(row)
            .map(|r| r.display(column))
            .unwrap_or_default()
    }

    /// Erase the block behind `row` from the core and drop the row.
    ///
    /// Only honoured while the CPU is paused; returns `false` without side effects otherwise, or
    /// when `row` is out of range.
    pub fn remove_row(&mut self, row: usize, ctx: &mut CoreContext<'_>) -> bool {
        if !ctx.cpu.is_paused() {
            tracing::debug!(row, "refusing to erase jit block while cpu is running");
            return false;
        }
        let Some(effective_address) = self.rows.get(row).map(BlockRow::effective_address) else {
            return false;
        };

        let erased = {
            let guard = ctx.cpu.guard();
            ctx.jit.erase_block(&guard, effective_address)
        };
        if !erased {
            tracing::warn!(
                effective_address = format_args!("{effective_address:#010x}"),
                "block was already gone from the jit cache"
            );
        }
        self.rows.remove(row);
        true
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: Vec<BlockRow>) -> Self {
        Self { rows }
    }
}
