use serde::{Deserialize, Serialize};

use crate::BlockRow;

/// Parse a base-16 filter bound: surrounding whitespace and an optional `0x`/`0X` prefix are
/// ignored. Returns `None` for empty or invalid text.
pub fn parse_hex_bound(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Outcome of editing an address bound from text.
///
/// Both `Cleared` and `Rejected` leave the bound unset; `Rejected` lets a front-end flag the input
/// without refusing the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundEdit {
    Set(u32),
    Cleared,
    Rejected,
}

impl BoundEdit {
    fn apply(slot: &mut Option<u32>, text: &str) -> BoundEdit {
        *slot = parse_hex_bound(text);
        match *slot {
            Some(value) => BoundEdit::Set(value),
            None if text.trim().is_empty() => BoundEdit::Cleared,
            None => BoundEdit::Rejected,
        }
    }
}

/// A single active filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPredicate {
    /// Case-insensitive substring of the symbol name; holds the lowercased needle.
    SymbolContains(String),
    MinEffectiveAddress(u32),
    MaxEffectiveAddress(u32),
    CoversPhysicalAddress(u32),
}

impl FilterPredicate {
    pub fn matches(&self, row: &BlockRow) -> bool {
        match self {
            FilterPredicate::SymbolContains(needle) => row
                .folded_symbol()
                .is_some_and(|name| name.contains(needle.as_str())),
            FilterPredicate::MinEffectiveAddress(min) => row.effective_address() >= *min,
            FilterPredicate::MaxEffectiveAddress(max) => row.effective_address() <= *max,
            FilterPredicate::CoversPhysicalAddress(paddr) => {
                row.block.covers_physical_address(*paddr)
            }
        }
    }
}

/// Filter state of the block table. Every set field must match (logical AND).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockFilter {
    pub min_effective_address: Option<u32>,
    pub max_effective_address: Option<u32>,
    pub physical_address: Option<u32>,
    /// Empty means unset.
    pub symbol_name: String,
}

impl BlockFilter {
    pub fn is_empty(&self) -> bool {
        self.predicates().is_empty()
    }

    pub fn set_min_effective_address_text(&mut self, text: &str) -> BoundEdit {
        BoundEdit::apply(&mut self.min_effective_address, text)
    }

    pub fn set_max_effective_address_text(&mut self, text: &str) -> BoundEdit {
        BoundEdit::apply(&mut self.max_effective_address, text)
    }

    pub fn set_physical_address_text(&mut self, text: &str) -> BoundEdit {
        BoundEdit::apply(&mut self.physical_address, text)
    }

    pub fn set_symbol_name(&mut self, name: impl Into<String>) {
        self.symbol_name = name.into();
    }

    /// Active predicates, cheapest first so evaluation can short-circuit early.
    pub fn predicates(&self) -> Vec<FilterPredicate> {
        let mut predicates = Vec::with_capacity(4);
        if let Some(min) = self.min_effective_address {
            predicates.push(FilterPredicate::MinEffectiveAddress(min));
        }
        if let Some(max) = self.max_effective_address {
            predicates.push(FilterPredicate::MaxEffectiveAddress(max));
        }
        if let Some(paddr) = self.physical_address {
            predicates.push(FilterPredicate::CoversPhysicalAddress(paddr));
        }
        if !self.symbol_name.is_empty() {
            predicates.push(FilterPredicate::SymbolContains(
                self.symbol_name.to_lowercase(),
            ));
        }
        predicates
    }

    pub fn matches(&self, row: &BlockRow) -> bool {
        self.predicates().iter().all(|p| p.matches(row))
    }
}
