use std::path::PathBuf;

use jitscope_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InspectError>;

#[derive(Debug, Error)]
pub enum InspectError {
    /// Cache maintenance needs a paused CPU. Front-ends disable the controls while running, so
    /// this normally means a caller skipped that check.
    #[error("operation requires the emulated CPU to be paused")]
    CpuRunning,

    #[error("effective address {0:#010x} has no physical translation")]
    NoTranslation(u32),

    #[error("row {row} out of range ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}
