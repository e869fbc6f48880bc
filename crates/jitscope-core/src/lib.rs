//! Emulation-core side of the JIT block inspector.
//!
//! The inspector never talks to a CPU core directly. Everything it needs goes through the
//! [`JitInterface`] trait: a read-only view of the compiled block cache plus the handful of
//! mutating operations (clear, wipe profiling data, erase a block) that are only legal while the
//! CPU thread is parked behind a [`CpuThreadGuard`].
//!
//! [`BlockCache`] is an in-memory implementation of the interface. It stores blocks and their host
//! code, tracks allocations inside the near/far code regions and answers effective → physical
//! translation queries from a page map. It does not compile or execute guest code.

#![forbid(unsafe_code)]

mod block;
mod cache;
mod cpu;
mod error;
pub mod host_disasm;
mod interface;
pub mod ppc_disasm;
mod symbols;

pub use block::{FeatureFlags, GuestInstruction, HostCode, JitBlock, ProfileData};
pub use cache::{BlockCache, CacheRegions, CacheSnapshot, CodeRegion, PageMapping, PAGE_SHIFT};
pub use cpu::{CpuThread, CpuThreadAttachment, CpuThreadGuard, RunState};
pub use error::{CoreError, Result};
pub use interface::{HostDisassembly, JitInterface, MemoryRegionStats};
pub use symbols::{Symbol, SymbolDb, SymbolMap, NO_SYMBOL_DESCRIPTION};

/// Guest instructions are fixed-width and word aligned.
pub const GUEST_INSTRUCTION_SIZE: u32 = 4;
