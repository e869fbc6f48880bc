use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while building or loading emulation-core state.
///
/// Queries against a loaded cache never fail; missing data is reported through `Option`s.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("symbol map line {line}: {reason}")]
    SymbolMap { line: usize, reason: String },

    #[error("code region `{region}` cannot fit {requested} bytes (largest free extent {largest_free})")]
    RegionFull {
        region: &'static str,
        requested: u64,
        largest_free: u64,
    },

    #[error("guest instruction at {address:#010x} is not word aligned")]
    UnalignedInstruction { address: u32 },

    #[error("invalid cache snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
