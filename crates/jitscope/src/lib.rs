//! JIT block table, filter/sort proxy and inspector for a PowerPC JIT code cache.
//!
//! [`JitBlockTableModel`] holds a snapshot of the cache as rows × [`Column`]s.
//! [`JitBlockProxyModel`] layers filtering and sorting over it, and [`JitInspector`] adds the
//! operations of a JIT debugging panel: cross-disassembly of the selected block, cache
//! maintenance behind a paused CPU, memory statistics and address translation.
//!
//! All operations receive a [`CoreContext`] instead of reaching for global emulator state.

#![forbid(unsafe_code)]

mod column;
mod config;
mod context;
mod dump;
mod error;
mod filter;
mod inspector;
mod proxy;
mod table;

pub use column::{Column, FieldValue, ParseColumnError, SortOrder, SortSpec};
pub use config::InspectorConfig;
pub use context::CoreContext;
pub use dump::{write_block_log_dump, write_block_log_dump_file};
pub use error::{InspectError, Result};
pub use filter::{parse_hex_bound, BlockFilter, BoundEdit, FilterPredicate};
pub use inspector::{CrossDisassembly, DisassemblyView, JitInspector};
pub use proxy::JitBlockProxyModel;
pub use table::{BlockRow, BlockStats, JitBlockTableModel};
