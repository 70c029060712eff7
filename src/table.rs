//! This module provides the `TransitionTable`, an index over a machine's rules keyed by
//! `(state, read symbol)`.

use crate::types::{State, Symbol, Transition};
use std::collections::{BTreeSet, HashMap};

/// A deterministic rule lookup built from an ordered rule list.
///
/// Rules are never completed implicitly: a missing `(state, symbol)` pair is an implicit
/// halt. When the list contains duplicate keys, the first rule wins and the later ones are
/// reported by [`TransitionTable::duplicates`].
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    rules: Vec<Transition>,
    index: HashMap<(State, Symbol), usize>,
}

impl TransitionTable {
    pub fn new(rules: Vec<Transition>) -> Self {
        let mut index = HashMap::with_capacity(rules.len());

        for (i, rule) in rules.iter().enumerate() {
            index
                .entry((rule.current_state.clone(), rule.read_symbol))
                .or_insert(i);
        }

        Self { rules, index }
    }

    /// Returns the rule for `(state, symbol)`, if one exists.
    pub fn lookup(&self, state: &State, symbol: Symbol) -> Option<&Transition> {
        // Keyed by owned states; the clone is a reference count bump.
        self.index
            .get(&(state.clone(), symbol))
            .map(|&i| &self.rules[i])
    }

    /// Returns the rules shadowed by an earlier rule with the same key.
    pub fn duplicates(&self) -> Vec<&Transition> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(i, rule)| {
                self.index
                    .get(&(rule.current_state.clone(), rule.read_symbol))
                    .is_some_and(|first| first != i)
            })
            .map(|(_, rule)| rule)
            .collect()
    }

    /// Returns every state that has at least one outgoing rule.
    pub fn states(&self) -> BTreeSet<&State> {
        self.rules.iter().map(|rule| &rule.current_state).collect()
    }

    pub fn rules(&self) -> &[Transition] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Transition>> for TransitionTable {
    fn from(rules: Vec<Transition>) -> Self {
        Self::new(rules)
    }
}
