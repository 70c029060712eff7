//! This module provides the built-in machine catalog and the table of known Busy Beaver
//! records. Catalog machines are embedded text definitions, parsed once on first use.

use crate::parser::parse;
use crate::types::{BusyBeaverError, State, TuringMachine};
use std::fmt;
use tracing::warn;

// Embedded machine definitions, in display order.
const MACHINE_TEXTS: [&str; 5] = [
    include_str!("../machines/simple-test.bb"),
    include_str!("../machines/sigma-2.bb"),
    include_str!("../machines/sigma-3.bb"),
    include_str!("../machines/sigma-4.bb"),
    include_str!("../machines/sigma-5.bb"),
];

lazy_static::lazy_static! {
    static ref MACHINES: Vec<(&'static str, TuringMachine)> = MACHINE_TEXTS
        .iter()
        .filter_map(|&text| match parse(text) {
            Ok(machine) => Some((text, machine)),
            Err(e) => {
                warn!(error = %e, "failed to parse built-in machine");
                None
            }
        })
        .collect();
}

/// A Busy Beaver score: exact when it fits, otherwise a printable approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Exact(u64),
    Approx(&'static str),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Exact(score) => write!(f, "{score}"),
            Score::Approx(score) => f.write_str(score),
        }
    }
}

/// The best known Σ(n) for binary machines with `states` states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownScore {
    pub states: usize,
    pub score: Score,
    pub year: u16,
    pub discoverer: &'static str,
}

const KNOWN_SCORES: [KnownScore; 6] = [
    KnownScore {
        states: 1,
        score: Score::Exact(1),
        year: 1962,
        discoverer: "Radó",
    },
    KnownScore {
        states: 2,
        score: Score::Exact(4),
        year: 1962,
        discoverer: "Radó",
    },
    KnownScore {
        states: 3,
        score: Score::Exact(6),
        year: 1965,
        discoverer: "Lin & Radó",
    },
    KnownScore {
        states: 4,
        score: Score::Exact(13),
        year: 1975,
        discoverer: "Brady",
    },
    KnownScore {
        states: 5,
        score: Score::Exact(4098),
        year: 1989,
        discoverer: "Marxen & Buntrock",
    },
    KnownScore {
        states: 6,
        score: Score::Approx("≈4.6e1439"),
        year: 1997,
        discoverer: "Marxen & Buntrock",
    },
];

/// A summary of a catalog machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInfo {
    pub index: usize,
    pub name: String,
    pub description: Option<String>,
    pub initial_state: State,
    pub state_count: usize,
    pub rule_count: usize,
    pub known_score: Option<KnownScore>,
}

pub struct Catalog;

impl Catalog {
    /// Get the number of available machines
    pub fn count() -> usize {
        MACHINES.len()
    }

    /// Get a machine by its index
    pub fn get_by_index(index: usize) -> Result<TuringMachine, BusyBeaverError> {
        MACHINES
            .get(index)
            .map(|(_, machine)| machine.clone())
            .ok_or_else(|| {
                BusyBeaverError::Validation(format!("Machine index {} out of range", index))
            })
    }

    /// Get a machine by its name, ignoring case
    pub fn get_by_name(name: &str) -> Result<TuringMachine, BusyBeaverError> {
        MACHINES
            .iter()
            .find(|(_, machine)| machine.name.eq_ignore_ascii_case(name))
            .map(|(_, machine)| machine.clone())
            .ok_or_else(|| BusyBeaverError::Validation(format!("Machine '{}' not found", name)))
    }

    /// List all machine names
    pub fn list_names() -> Vec<String> {
        MACHINES
            .iter()
            .map(|(_, machine)| machine.name.clone())
            .collect()
    }

    /// Get information about a machine by its index
    pub fn info(index: usize) -> Result<MachineInfo, BusyBeaverError> {
        let machine = Self::get_by_index(index)?;
        let state_count = machine.active_states().len();

        Ok(MachineInfo {
            index,
            name: machine.name,
            description: machine.description,
            initial_state: machine.initial_state,
            state_count,
            rule_count: machine.rules.len(),
            known_score: known_score(state_count),
        })
    }

    /// Search for machines whose name or description contains `query`, ignoring case
    pub fn search(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();

        MACHINES
            .iter()
            .enumerate()
            .filter(|(_, (_, machine))| {
                machine.name.to_lowercase().contains(&query)
                    || machine
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&query))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Get the source text of a machine by its index
    pub fn text_by_index(index: usize) -> Result<&'static str, BusyBeaverError> {
        MACHINES.get(index).map(|(text, _)| *text).ok_or_else(|| {
            BusyBeaverError::Validation(format!("Machine text index {} out of range", index))
        })
    }
}

/// Returns the best known score for `states` states, if one is recorded.
pub fn known_score(states: usize) -> Option<KnownScore> {
    KNOWN_SCORES.iter().find(|known| known.states == states).copied()
}

/// Returns every recorded score, by number of states.
pub fn known_scores() -> &'static [KnownScore] {
    &KNOWN_SCORES
}
