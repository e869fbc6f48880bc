use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use jitscope_core::FeatureFlags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    FeatureFlags,
    EffectiveAddress,
    CodeBufferSize,
    RepeatInstructions,
    HostNearCodeSize,
    HostFarCodeSize,
    RunCount,
    CyclesSpent,
    CyclesAverage,
    CyclesPercent,
    TimeSpent,
    TimeAverage,
    TimePercent,
    Symbol,
}

impl Column {
    pub const ALL: [Column; 14] = [
        Column::FeatureFlags,
        Column::EffectiveAddress,
        Column::CodeBufferSize,
        Column::RepeatInstructions,
        Column::HostNearCodeSize,
        Column::HostFarCodeSize,
        Column::RunCount,
        Column::CyclesSpent,
        Column::CyclesAverage,
        Column::CyclesPercent,
        Column::TimeSpent,
        Column::TimeAverage,
        Column::TimePercent,
        Column::Symbol,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Column::FeatureFlags => "PPC Feature Flags",
            Column::EffectiveAddress => "Effective Address",
            Column::CodeBufferSize => "Code Buffer Size",
            Column::RepeatInstructions => "Repeat Instructions",
            Column::HostNearCodeSize => "Host Near Code Size",
            Column::HostFarCodeSize => "Host Far Code Size",
            Column::RunCount => "Run Count",
            Column::CyclesSpent => "Cycles Spent",
            Column::CyclesAverage => "Cycles Average",
            Column::CyclesPercent => "Cycles Percent",
            Column::TimeSpent => "Time Spent (ns)",
            Column::TimeAverage => "Time Average (ns)",
            Column::TimePercent => "Time Percent",
            Column::Symbol => "Symbol",
        }
    }

    /// Identifier used in config files and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Column::FeatureFlags => "feature_flags",
            Column::EffectiveAddress => "effective_address",
            Column::CodeBufferSize => "code_buffer_size",
            Column::RepeatInstructions => "repeat_instructions",
            Column::HostNearCodeSize => "host_near_code_size",
            Column::HostFarCodeSize => "host_far_code_size",
            Column::RunCount => "run_count",
            Column::CyclesSpent => "cycles_spent",
            Column::CyclesAverage => "cycles_average",
            Column::CyclesPercent => "cycles_percent",
            Column::TimeSpent => "time_spent",
            Column::TimeAverage => "time_average",
            Column::TimePercent => "time_percent",
            Column::Symbol => "symbol",
        }
    }

    pub fn is_percent(self) -> bool {
        matches!(self, Column::CyclesPercent | Column::TimePercent)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown column `{0}`")]
pub struct ParseColumnError(pub String);

impl FromStr for Column {
    type Err = ParseColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Column::ALL
            .into_iter()
            .find(|column| column.key() == wanted)
            .ok_or_else(|| ParseColumnError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: Column,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(column: Column, order: SortOrder) -> Self {
        Self { column, order }
    }
}

/// Typed cell value. `Empty` stands for "no data" (unprofiled block, unresolved symbol,
/// out-of-range row) and sorts before everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Address(u32),
    Size(usize),
    Counter(u64),
    Ratio(f64),
    Flags(FeatureFlags),
    Text(String),
    Empty,
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    /// Natural ordering: numeric for numbers, case-insensitive for text, raw bits for flags.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Address(a), Address(b)) => a.cmp(b),
            (Size(a), Size(b)) => a.cmp(b),
            (Counter(a), Counter(b)) => a.cmp(b),
            (Ratio(a), Ratio(b)) => a.total_cmp(b),
            (Flags(a), Flags(b)) => a.bits().cmp(&b.bits()),
            (Text(a), Text(b)) => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Empty => 0,
            FieldValue::Address(_) => 1,
            FieldValue::Size(_) => 2,
            FieldValue::Counter(_) => 3,
            FieldValue::Ratio(_) => 4,
            FieldValue::Flags(_) => 5,
            FieldValue::Text(_) => 6,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Address(addr) => write!(f, "{addr:08x}"),
            FieldValue::Size(size) => write!(f, "{size}"),
            FieldValue::Counter(count) => write!(f, "{count}"),
            FieldValue::Ratio(ratio) => write!(f, "{ratio:.2}"),
            FieldValue::Flags(flags) => f.write_str(&flags.describe()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Empty => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_parsing_accepts_dashes_and_case() {
        assert_eq!("run-count".parse::<Column>(), Ok(Column::RunCount));
        assert_eq!("Symbol".parse::<Column>(), Ok(Column::Symbol));
        assert_eq!(
            "bogus".parse::<Column>(),
            Err(ParseColumnError("bogus".to_string()))
        );
        for column in Column::ALL {
            assert_eq!(column.key().parse::<Column>(), Ok(column));
        }
    }

    #[test]
    fn text_compares_case_insensitively() {
        let a = FieldValue::Text("render".into());
        let b = FieldValue::Text("UpdateInput".into());
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(
            FieldValue::Text("MAIN".into()).compare(&FieldValue::Text("main".into())),
            Ordering::Equal
        );
    }

    #[test]
    fn empty_sorts_first() {
        assert_eq!(
            FieldValue::Empty.compare(&FieldValue::Counter(0)),
            Ordering::Less
        );
        assert_eq!(FieldValue::Empty.compare(&FieldValue::Empty), Ordering::Equal);
    }
}
