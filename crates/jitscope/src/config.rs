use std::path::{Path, PathBuf};

use jitscope_core::CacheRegions;
use serde::{Deserialize, Serialize};

use crate::{Column, InspectError, Result, SortOrder, SortSpec};

fn default_dump_dir() -> PathBuf {
    PathBuf::from("Dump").join("Debug").join("JitBlocks")
}

fn default_game_id() -> String {
    "unknown".to_string()
}

/// Inspector settings, loaded from JSON. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InspectorConfig {
    /// Column the block table is sorted by on startup; unsorted when absent.
    pub sort_column: Option<Column>,
    pub sort_order: SortOrder,
    pub dump_dir: PathBuf,
    /// Names the block log dump file.
    pub game_id: String,
    /// Replaces the region capacities stored in a snapshot when set.
    pub cache_regions: Option<CacheRegions>,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            sort_column: None,
            sort_order: SortOrder::default(),
            dump_dir: default_dump_dir(),
            game_id: default_game_id(),
            cache_regions: None,
        }
    }
}

impl InspectorConfig {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| InspectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text).map_err(|source| InspectError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded inspector config");
        Ok(config)
    }

    pub fn default_sort(&self) -> Option<SortSpec> {
        self.sort_column
            .map(|column| SortSpec::new(column, self.sort_order))
    }

    /// `<dump_dir>/<game_id>.txt`
    pub fn dump_path(&self) -> PathBuf {
        self.dump_dir.join(format!("{}.txt", self.game_id))
    }
}
