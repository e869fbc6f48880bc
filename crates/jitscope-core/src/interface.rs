use std::collections::BTreeMap;

use serde::Serialize;

use crate::{CpuThreadGuard, JitBlock};

/// Free space of one host code region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryRegionStats {
    pub free_bytes: u64,
    /// `1 - largest_free_extent / free_bytes`; 0.0 when the free space is one extent (or empty).
    pub fragmentation: f64,
}

/// Rendered host code plus the number of instructions decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostDisassembly {
    pub instruction_count: usize,
    pub text: String,
}

/// Introspection contract of the emulation core's JIT.
///
/// Everything that reads a consistent view of the cache or mutates it takes a
/// [`CpuThreadGuard`]: the borrow proves the CPU thread is parked for the duration of the call.
pub trait JitInterface {
    /// All compiled blocks, ordered by effective address.
    fn jit_blocks(&self, guard: &CpuThreadGuard<'_>) -> Vec<JitBlock>;

    /// Free-space statistics keyed by region name.
    fn memory_stats(&self) -> BTreeMap<String, MemoryRegionStats>;

    fn clear_cache(&mut self, guard: &CpuThreadGuard<'_>);

    /// Zero every block's profiling counters without discarding the blocks.
    fn wipe_profiling_data(&mut self, guard: &CpuThreadGuard<'_>);

    /// Discard the block entered at `effective_address`, forcing recompilation on next entry.
    /// Returns `false` if no such block exists.
    fn erase_block(&mut self, guard: &CpuThreadGuard<'_>, effective_address: u32) -> bool;

    fn profiling_enabled(&self) -> bool;

    /// Switch block profiling instrumentation on or off. Existing blocks were compiled for the
    /// old setting, so implementations clear the cache when the value changes.
    fn set_profiling_enabled(&mut self, guard: &CpuThreadGuard<'_>, enabled: bool);

    fn disassemble_near_code(&self, block: &JitBlock) -> HostDisassembly;

    fn disassemble_far_code(&self, block: &JitBlock) -> HostDisassembly;

    /// Effective → physical translation under the current MMU state.
    fn translated_address(&self, effective_address: u32) -> Option<u32>;
}
