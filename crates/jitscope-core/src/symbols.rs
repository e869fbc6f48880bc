use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Shown in place of a symbol name when an address is not covered by any symbol.
pub const NO_SYMBOL_DESCRIPTION: &str = " --- ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
    /// Size in bytes. A zero-sized symbol covers only its start address.
    pub size: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, address: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            address,
            size,
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        if self.size == 0 {
            return addr == self.address;
        }
        addr >= self.address && u64::from(addr) < u64::from(self.address) + u64::from(self.size)
    }
}

/// Address → symbol lookups used to label blocks and disassembly.
pub trait SymbolDb {
    fn symbol_at(&self, addr: u32) -> Option<&Symbol>;

    /// Display text for `addr`: the covering symbol's name, or [`NO_SYMBOL_DESCRIPTION`].
    fn description(&self, addr: u32) -> String {
        match self.symbol_at(addr) {
            Some(symbol) => symbol.name.clone(),
            None => NO_SYMBOL_DESCRIPTION.to_string(),
        }
    }
}

/// Symbol table keyed by start address. Symbols are assumed not to overlap; when they do, the one
/// with the highest start address at or below the query wins.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    symbols: BTreeMap<u32, Symbol>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol) -> Option<Symbol> {
        self.symbols.insert(symbol.address, symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Parse a text symbol map.
    ///
    /// Each symbol line is `<start> <size> <vaddr> [align] <name> [object]` with hex address
    /// columns, as written by the common GameCube/Wii linkers. Lines whose first column is not hex
    /// (section banners, column headers, blank lines) are skipped. A line that starts with a hex
    /// column but is otherwise malformed is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let mut map = SymbolMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let mut cols = raw.split_whitespace();
            let Some(first) = cols.next() else {
                continue;
            };
            let Ok(start) = u32::from_str_radix(first, 16) else {
                continue;
            };

            let size = parse_hex_col(cols.next(), line, "size")?;
            let vaddr = parse_hex_col(cols.next(), line, "virtual address")?;
            let rest: Vec<&str> = cols.collect();
            let name = match rest.as_slice() {
                [] => {
                    return Err(CoreError::SymbolMap {
                        line,
                        reason: "missing symbol name".to_string(),
                    })
                }
                [align, name, ..] if align.parse::<u32>().is_ok() => *name,
                [name, ..] => *name,
            };

            let address = if vaddr != 0 { vaddr } else { start };
            map.insert(Symbol::new(name, address, size));
        }
        Ok(map)
    }
}

fn parse_hex_col(col: Option<&str>, line: usize, what: &str) -> Result<u32> {
    let col = col.ok_or_else(|| CoreError::SymbolMap {
        line,
        reason: format!("missing {what}"),
    })?;
    u32::from_str_radix(col, 16).map_err(|_| CoreError::SymbolMap {
        line,
        reason: format!("invalid {what} `{col}`"),
    })
}

impl SymbolDb for SymbolMap {
    fn symbol_at(&self, addr: u32) -> Option<&Symbol> {
        self.symbols
            .range(..=addr)
            .next_back()
            .map(|(_, symbol)| symbol)
            .filter(|symbol| symbol.contains(addr))
    }
}

impl FromIterator<Symbol> for SymbolMap {
    fn from_iter<T: IntoIterator<Item = Symbol>>(iter: T) -> Self {
        let mut map = SymbolMap::new();
        for symbol in iter {
            map.insert(symbol);
        }
        map
    }
}
