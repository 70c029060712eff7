//! This module defines the core data structures and types used throughout the Busy Beaver
//! simulator, including symbols, states, transition rules, machine definitions, step outcomes
//! and error types.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::parser::ParseError;

/// The blank symbol every unwritten tape cell holds.
pub const BLANK_SYMBOL: Symbol = Symbol::ZERO;
/// The halt state name used when a machine does not declare its own.
pub const DEFAULT_HALT_STATE: &str = "halt";
/// The initial state name used when an imported record omits it.
pub const DEFAULT_INITIAL_STATE: &str = "A";
/// The maximum allowed size for a textual machine definition in bytes.
pub const MAX_PROGRAM_SIZE: usize = 65536; // 64KB
/// The maximum number of steps a single run may execute before it is forced to stop.
pub const MAX_EXECUTION_STEPS: u64 = 50_000_000;

/// A tape symbol.
///
/// Shipped machines only use `0` and `1`, but any single character is a valid symbol.
/// In JSON records decimal digits are written as numbers and everything else as a
/// one-character string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(char);

impl Symbol {
    /// The blank symbol `0`.
    pub const ZERO: Symbol = Symbol('0');
    /// The mark symbol `1`, counted by the Busy Beaver score.
    pub const ONE: Symbol = Symbol('1');

    /// Creates a symbol from any character.
    pub const fn new(c: char) -> Self {
        Self(c)
    }

    /// Returns the character this symbol stands for.
    pub const fn as_char(self) -> char {
        self.0
    }

    /// Returns true for `0` and `1`.
    pub fn is_binary(self) -> bool {
        matches!(self.0, '0' | '1')
    }
}

impl From<char> for Symbol {
    fn from(c: char) -> Self {
        Self(c)
    }
}

impl FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self(c)),
            (None, _) => Err("Invalid symbol: empty".to_string()),
            _ => Err(format!("Invalid symbol \"{s}\": expected a single character")),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.to_digit(10) {
            Some(digit) => serializer.serialize_u32(digit),
            None => serializer.serialize_char(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Digit(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Digit(n) => char::from_digit(n, 10)
                .map(Symbol)
                .ok_or_else(|| de::Error::custom(format!("symbol {n} is not a single digit"))),
            Repr::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

/// A machine state label.
///
/// States are cheap to clone: the label is shared. Integer states in JSON records are
/// stored as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct State(Arc<str>);

impl State {
    /// Creates a state from its label.
    pub fn new(label: &str) -> Self {
        Self(Arc::from(label))
    }

    /// Returns the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for State {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for State {
    fn from(label: String) -> Self {
        Self(Arc::from(label))
    }
}

impl From<&State> for State {
    fn from(state: &State) -> Self {
        state.clone()
    }
}

impl Borrow<str> for State {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Label(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(State::from(n.to_string())),
            Repr::Label(label) if label.trim().is_empty() => {
                Err(de::Error::custom("state label must not be empty"))
            }
            Repr::Label(label) => Ok(State::from(label)),
        }
    }
}

/// Represents the possible directions the head can move after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    #[serde(rename = "L", alias = "l", alias = "Left")]
    Left,
    /// Move the head one position to the right.
    #[serde(rename = "R", alias = "r", alias = "Right")]
    Right,
    /// Keep the head in the same position.
    #[serde(rename = "N", alias = "n", alias = "Stay", alias = "None")]
    Stay,
}

impl Direction {
    /// The head displacement: -1, +1 or 0.
    pub fn offset(self) -> i64 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
            Direction::Stay => 0,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Direction::Left => 'L',
            Direction::Right => 'R',
            Direction::Stay => 'N',
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    /// Parses the `L`, `R` and `N` tokens, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L" => Ok(Direction::Left),
            "R" => Ok(Direction::Right),
            "N" => Ok(Direction::Stay),
            _ => Err(format!("Invalid direction \"{s}\": expected L, R or N")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A single transition rule:
/// `(current_state, read_symbol) -> (write_symbol, direction, next_state)`.
///
/// The pair `(current_state, read_symbol)` is the rule's key and should be unique within a
/// machine. Rules are immutable values; editing a machine replaces its rule list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// The state this rule applies in.
    pub current_state: State,
    /// The symbol under the head this rule applies to.
    pub read_symbol: Symbol,
    /// The symbol written to the current cell.
    pub write_symbol: Symbol,
    /// The direction the head moves after writing.
    pub direction: Direction,
    /// The state the machine transitions to.
    pub next_state: State,
}

impl Transition {
    pub fn new(
        current_state: impl Into<State>,
        read_symbol: impl Into<Symbol>,
        write_symbol: impl Into<Symbol>,
        direction: Direction,
        next_state: impl Into<State>,
    ) -> Self {
        Self {
            current_state: current_state.into(),
            read_symbol: read_symbol.into(),
            write_symbol: write_symbol.into(),
            direction,
            next_state: next_state.into(),
        }
    }

    /// Returns true if the rule points back to its own state.
    pub fn is_self_loop(&self) -> bool {
        self.current_state == self.next_state
    }
}

impl fmt::Display for Transition {
    /// Formats the rule in the textual grammar: `A 0 -> 1 R B`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} {} {}",
            self.current_state, self.read_symbol, self.write_symbol, self.direction, self.next_state
        )
    }
}

/// A Turing machine definition as consumed by the engine.
///
/// This is also the exchange record shape shared with import/export collaborators.
/// Missing fields in an imported record fall back to the initial state `A`, the halt
/// state `halt` and the binary alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuringMachine {
    /// The name of the machine.
    pub name: String,
    /// An optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The transition rules, in insertion order.
    #[serde(default)]
    pub rules: Vec<Transition>,
    /// The state the machine starts in.
    #[serde(default = "default_initial_state")]
    pub initial_state: State,
    /// States that stop execution when entered.
    #[serde(default = "default_halt_states")]
    pub halt_states: BTreeSet<State>,
    /// Symbols this machine is expected to use.
    #[serde(default = "default_alphabet")]
    pub alphabet: BTreeSet<Symbol>,
}

fn default_initial_state() -> State {
    State::new(DEFAULT_INITIAL_STATE)
}

fn default_halt_states() -> BTreeSet<State> {
    BTreeSet::from([State::new(DEFAULT_HALT_STATE)])
}

fn default_alphabet() -> BTreeSet<Symbol> {
    BTreeSet::from([Symbol::ZERO, Symbol::ONE])
}

impl TuringMachine {
    /// Creates a binary machine with the default `halt` state.
    pub fn new(
        name: impl Into<String>,
        rules: Vec<Transition>,
        initial_state: impl Into<State>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            rules,
            initial_state: initial_state.into(),
            halt_states: default_halt_states(),
            alphabet: default_alphabet(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replaces the declared halt states.
    pub fn with_halt_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<State>,
    {
        self.halt_states = states.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the alphabet.
    pub fn with_alphabet<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        self.alphabet = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if entering `state` stops the machine.
    pub fn is_halt_state(&self, state: &State) -> bool {
        self.halt_states.contains(state)
    }

    /// Returns the states that have at least one outgoing rule, excluding declared halt states.
    pub fn active_states(&self) -> BTreeSet<State> {
        self.rules
            .iter()
            .map(|rule| &rule.current_state)
            .filter(|state| !self.is_halt_state(state))
            .cloned()
            .collect()
    }

    /// Parses a machine from its JSON exchange record.
    pub fn from_json(json: &str) -> Result<Self, BusyBeaverError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the machine to its pretty-printed JSON exchange record.
    pub fn to_json(&self) -> Result<String, BusyBeaverError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Represents the outcome of a single engine step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A rule was applied and the machine can keep running.
    Continue,
    /// The machine is halted.
    Halt(Halt),
}

impl Step {
    /// Returns true if the machine is halted.
    pub fn is_halt(&self) -> bool {
        matches!(self, Step::Halt(_))
    }
}

/// Why a machine halted. Both reasons are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Halt {
    /// A rule moved the machine into a declared halt state.
    Reached(State),
    /// No rule exists for the current state and the symbol under the head.
    Undefined(State),
}

impl Halt {
    /// The recorded halt state.
    pub fn state(&self) -> &State {
        match self {
            Halt::Reached(state) | Halt::Undefined(state) => state,
        }
    }
}

/// Represents the errors that can occur outside of normal machine execution.
#[derive(Debug, Error)]
pub enum BusyBeaverError {
    /// A textual machine definition could not be parsed.
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// A machine or configuration failed a structural check.
    #[error("Machine validation error: {0}")]
    Validation(String),
    /// A machine cannot be represented in, or decoded from, an encoding.
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// A file system operation failed.
    #[error("File error: {0}")]
    File(String),
    /// A JSON record could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The random generator was given unusable parameters.
    #[error("Generator error: {0}")]
    Generator(String),
}
