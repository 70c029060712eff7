//! This module defines the sparse, bi-infinite `Tape` the engine reads and writes.
//!
//! Only cells that have been written are stored; every other position reads as the blank
//! symbol.

use crate::types::{Symbol, BLANK_SYMBOL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A sparse tape indexed by any `i64` position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tape {
    cells: HashMap<i64, Symbol>,
    blank: Symbol,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new(BLANK_SYMBOL)
    }
}

impl Tape {
    /// Creates an empty tape whose unwritten cells read as `blank`.
    pub fn new(blank: Symbol) -> Self {
        Self {
            cells: HashMap::new(),
            blank,
        }
    }

    /// Returns the symbol stored at `position`, or the blank symbol if the cell was never written.
    pub fn read(&self, position: i64) -> Symbol {
        self.cells.get(&position).copied().unwrap_or(self.blank)
    }

    /// Writes `symbol` at `position`. Blank writes are stored like any other symbol.
    pub fn write(&mut self, position: i64, symbol: Symbol) {
        self.cells.insert(position, symbol);
    }

    pub fn blank(&self) -> Symbol {
        self.blank
    }

    /// Counts the stored cells holding `symbol`.
    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells.values().filter(|&&s| s == symbol).count()
    }

    /// The Busy Beaver score: the number of `1`s on the tape.
    pub fn score(&self) -> usize {
        self.count(Symbol::ONE)
    }

    /// The number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the leftmost and rightmost written positions, if any cell was written.
    pub fn bounds(&self) -> Option<(i64, i64)> {
        let min = self.cells.keys().min()?;
        let max = self.cells.keys().max()?;
        Some((*min, *max))
    }

    /// Returns the `2 * radius + 1` symbols centred on `center`, clipped to the `i64` range.
    pub fn window(&self, center: i64, radius: i64) -> Vec<Symbol> {
        (center.saturating_sub(radius)..=center.saturating_add(radius))
            .map(|position| self.read(position))
            .collect()
    }

    /// Iterates over the stored cells in position order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, Symbol)> + '_ {
        let mut positions: Vec<_> = self.cells.keys().copied().collect();
        positions.sort_unstable();
        positions.into_iter().map(move |position| (position, self.read(position)))
    }
}

impl fmt::Display for Tape {
    /// Renders every cell between the outermost written positions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            Some((min, max)) => (min..=max).try_for_each(|p| write!(f, "{}", self.read(p))),
            None => Ok(()),
        }
    }
}
