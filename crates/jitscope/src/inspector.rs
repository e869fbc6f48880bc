use std::fmt::Write as _;

use jitscope_core::{ppc_disasm, CpuThreadGuard, JitBlock, JitInterface, GUEST_INSTRUCTION_SIZE};
use serde::Serialize;

use crate::{
    BoundEdit, CoreContext, InspectError, InspectorConfig, JitBlockProxyModel, Result, SortSpec,
};

/// Guest code of one block side by side with the host code generated for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossDisassembly {
    pub effective_address: u32,
    pub guest: String,
    pub host_near: String,
    pub host_far: String,
    pub guest_instruction_count: usize,
    pub host_near_instruction_count: usize,
    pub host_far_instruction_count: usize,
    /// Host instructions per 100 guest instructions; `None` for an empty guest buffer.
    pub blowup_percent: Option<f64>,
}

impl CrossDisassembly {
    pub fn new(ctx: &CoreContext<'_>, block: &JitBlock) -> Self {
        let mut guest = String::new();
        let mut expected = None;
        for instruction in &block.original_buffer {
            if expected != Some(instruction.address) {
                guest.push_str(&ctx.symbols.description(instruction.address));
                guest.push('\n');
            }
            let _ = writeln!(
                guest,
                "{:08x}  {:08x}  {}",
                instruction.address,
                instruction.inst,
                ppc_disasm::disassemble(instruction.inst, instruction.address)
            );
            expected = Some(instruction.address.wrapping_add(GUEST_INSTRUCTION_SIZE));
        }

        let near = ctx.jit.disassemble_near_code(block);
        let far = ctx.jit.disassemble_far_code(block);
        let guest_instruction_count = block.original_buffer.len();
        let blowup_percent = (guest_instruction_count > 0).then(|| {
            100.0 * (near.instruction_count + far.instruction_count) as f64
                / guest_instruction_count as f64
        });

        Self {
            effective_address: block.effective_address,
            guest,
            host_near: near.text,
            host_far: far.text,
            guest_instruction_count,
            host_near_instruction_count: near.instruction_count,
            host_far_instruction_count: far.instruction_count,
            blowup_percent,
        }
    }
}

/// Result of a disassembly request.
#[derive(Debug, Clone, PartialEq)]
pub enum DisassemblyView {
    Block(CrossDisassembly),
    /// Nothing selected: all three streams are empty. `status` carries the memory statistics
    /// while paused and is empty otherwise.
    Cleared { status: String },
}

/// The operations of a JIT debugging panel, without any GUI.
///
/// Selection is tracked by effective address so it survives refreshes and re-sorting.
#[derive(Debug, Default)]
pub struct JitInspector {
    proxy: JitBlockProxyModel,
    selected: Option<u32>,
}

impl JitInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &InspectorConfig) -> Self {
        let mut inspector = Self::new();
        inspector.proxy.set_sort(config.default_sort());
        inspector
    }

    pub fn proxy(&self) -> &JitBlockProxyModel {
        &self.proxy
    }

    pub fn refresh(&mut self, ctx: &CoreContext<'_>) {
        self.proxy.refresh(ctx);
        if let Some(ea) = self.selected {
            if self.proxy.source().find_row(ea).is_none() {
                tracing::debug!(
                    effective_address = format_args!("{ea:#010x}"),
                    "selected block is gone, clearing selection"
                );
                self.selected = None;
            }
        }
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn select(&mut self, effective_address: Option<u32>) {
        self.selected = effective_address;
    }

    /// Select the block shown at visible `row`; an out-of-range row clears the selection.
    pub fn select_row(&mut self, row: usize) -> Option<u32> {
        self.selected = self.proxy.row(row).map(|r| r.effective_address());
        self.selected
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.proxy.set_sort(sort);
    }

    pub fn set_symbol_filter(&mut self, name: &str) {
        self.proxy.set_symbol_name(name);
    }

    pub fn set_min_address_filter(&mut self, text: &str) -> BoundEdit {
        self.proxy.set_min_effective_address_text(text)
    }

    pub fn set_max_address_filter(&mut self, text: &str) -> BoundEdit {
        self.proxy.set_max_effective_address_text(text)
    }

    pub fn set_physical_address_filter(&mut self, text: &str) -> BoundEdit {
        self.proxy.set_physical_address_text(text)
    }

    /// Cross-disassemble the selected block from the current snapshot.
    pub fn disassemble_selection(&self, ctx: &CoreContext<'_>) -> DisassemblyView {
        let block = self
            .selected
            .and_then(|ea| self.proxy.source().find_row(ea))
            .and_then(|row| self.proxy.source().row(row))
            .map(|row| &row.block);

        match block {
            Some(block) => {
                let _guard = ctx.cpu.guard();
                DisassemblyView::Block(CrossDisassembly::new(ctx, block))
            }
            None => DisassemblyView::Cleared {
                status: if ctx.cpu.is_paused() {
                    Self::memory_status(ctx)
                } else {
                    String::new()
                },
            },
        }
    }

    pub fn clear_cache(&mut self, ctx: &mut CoreContext<'_>) -> Result<()> {
        self.with_paused_core(ctx, "clear_cache", |jit, guard| jit.clear_cache(guard))
    }

    pub fn wipe_profiling_data(&mut self, ctx: &mut CoreContext<'_>) -> Result<()> {
        self.with_paused_core(ctx, "wipe_profiling_data", |jit, guard| {
            jit.wipe_profiling_data(guard)
        })
    }

    /// Switching profiling on or off makes the core discard every compiled block.
    pub fn set_profiling_enabled(&mut self, ctx: &mut CoreContext<'_>, enabled: bool) -> Result<()> {
        self.with_paused_core(ctx, "set_profiling_enabled", |jit, guard| {
            jit.set_profiling_enabled(guard, enabled)
        })
    }

    /// Erase the block shown at visible `row`.
    pub fn erase_block(&mut self, ctx: &mut CoreContext<'_>, row: usize) -> Result<()> {
        Self::ensure_paused(ctx, "erase_block")?;
        let rows = self.proxy.row_count();
        if !self.proxy.remove_row(row, ctx) {
            return Err(InspectError::RowOutOfRange { row, rows });
        }
        self.refresh(ctx);
        Ok(())
    }

    /// One line per host code region, ordered by region name.
    pub fn memory_status(ctx: &CoreContext<'_>) -> String {
        ctx.jit
            .memory_stats()
            .iter()
            .map(|(name, stats)| {
                format!(
                    "{name}: free {} bytes, fragmentation {:.2}%",
                    stats.free_bytes,
                    stats.fragmentation * 100.0
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn translate_address(ctx: &CoreContext<'_>, effective_address: u32) -> Result<u32> {
        ctx.jit.translated_address(effective_address).ok_or_else(|| {
            tracing::warn!(
                effective_address = format_args!("{effective_address:#010x}"),
                "no physical translation"
            );
            InspectError::NoTranslation(effective_address)
        })
    }

    fn ensure_paused(ctx: &CoreContext<'_>, op: &'static str) -> Result<()> {
        if ctx.cpu.is_paused() {
            Ok(())
        } else {
            tracing::warn!(op, "rejected while cpu is running");
            Err(InspectError::CpuRunning)
        }
    }

    fn with_paused_core<R>(
        &mut self,
        ctx: &mut CoreContext<'_>,
        op: &'static str,
        f: impl FnOnce(&mut dyn JitInterface, &CpuThreadGuard<'_>) -> R,
    ) -> Result<R> {
        Self::ensure_paused(ctx, op)?;
        let result = {
            let guard = ctx.cpu.guard();
            f(&mut *ctx.jit, &guard)
        };
        tracing::info!(op, "jit cache operation done");
        self.refresh(ctx);
        Ok(result)
    }
}
