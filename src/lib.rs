//! This crate provides the core logic for a Busy Beaver Turing machine simulator.
//! It includes modules for parsing machine definitions, executing them step by step or
//! continuously on an async runtime, validating rule sets, converting to and from standard
//! notation, and managing the built-in catalog, saved machines and random candidates.

pub mod analyzer;
pub mod encoder;
pub mod generator;
pub mod library;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod scheduler;
pub mod table;
pub mod tape;
pub mod types;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the validation entry points and their findings from the analyzer module.
pub use analyzer::{analyze, validate, validate_rule, Finding, Report, Severity};
/// Re-exports the standard notation functions from the encoder module.
pub use encoder::{decode, encode, to_text};
/// Re-exports the random machine generator.
pub use generator::{Generator, GeneratorConfig};
/// Re-exports the saved machine store.
pub use library::{MachineLibrary, SavedMachine};
/// Re-exports the `MachineLoader` struct from the loader module.
pub use loader::{Format, MachineLoader};
/// Re-exports the execution engine and its configuration from the machine module.
pub use machine::{Engine, MachineConfiguration};
/// Re-exports the parsing functions from the parser module.
pub use parser::{parse, parse_metadata, parse_rule, ParseError, ParseIssue};
/// Re-exports the built-in catalog and known records from the programs module.
pub use programs::{known_score, Catalog, KnownScore, MachineInfo, Score};
/// Re-exports the continuous execution scheduler.
pub use scheduler::{Pace, Progress, RunOutcome, Scheduler, SchedulerConfig, Status};
pub use table::TransitionTable;
pub use tape::Tape;
/// Re-exports the machine definition types from the types module.
pub use types::{
    BusyBeaverError, Direction, Halt, State, Step, Symbol, Transition, TuringMachine,
    MAX_EXECUTION_STEPS, MAX_PROGRAM_SIZE,
};
