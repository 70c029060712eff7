//! This module provides the parser for textual Busy Beaver definitions, utilizing the `pest`
//! crate. The format has one rule per line, `STATE SYMBOL -> SYMBOL DIRECTION STATE`, and
//! `#` comment lines. Comment lines of the form `# Key: value` carry metadata.
//!
//! ```text
//! # Name: Busy Beaver 2 states
//! # Halt: H
//! A 0 -> 1 R B
//! A 1 -> 1 L B
//! B 0 -> 1 L A
//! B 1 -> 1 R H   # final step
//! ```

use crate::types::{
    Direction, State, Symbol, Transition, TuringMachine, BLANK_SYMBOL, MAX_PROGRAM_SIZE,
};
use pest::{iterators::Pair, Parser as PestParser};
use pest_derive::Parser as PestParser;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Derives a `PestParser` for the line grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct BeaverParser;

/// A single problem found while parsing, tagged with its 1-based line number when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    pub line: Option<usize>,
    pub message: String,
}

impl ParseIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            line: None,
            message: message.into(),
        }
    }

    pub fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseIssue {}

/// Every issue found in a rejected definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Parse error:\n{}", format_issues(.issues))]
pub struct ParseError {
    pub issues: Vec<ParseIssue>,
}

impl From<ParseIssue> for ParseError {
    fn from(issue: ParseIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

fn format_issues(issues: &[ParseIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Values declared in `# Key: value` lines.
///
/// Keys are case-insensitive; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Declared number of states. Informational only.
    pub states: Option<usize>,
    /// Declared number of symbols. Informational only.
    pub symbols: Option<usize>,
    pub initial: Option<State>,
    pub halt: Option<Vec<State>>,
}

impl Metadata {
    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();

        match key.to_ascii_lowercase().as_str() {
            "name" => self.name = Some(value.to_string()),
            "description" => self.description = Some(value.to_string()),
            "states" => self.states = Some(parse_count("States", value)?),
            "symbols" => self.symbols = Some(parse_count("Symbols", value)?),
            "initial" => {
                if value.is_empty() {
                    return Err("Initial state must not be empty".to_string());
                }
                self.initial = Some(State::new(value));
            }
            "halt" => {
                let states: Vec<State> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(State::new)
                    .collect();
                if states.is_empty() {
                    return Err("Halt must list at least one state".to_string());
                }
                self.halt = Some(states);
            }
            _ => {}
        }

        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .map_err(|_| format!("{key} must be a whole number, got \"{value}\""))
}

/// The content of one line.
enum Line<'a> {
    Empty,
    Metadata(&'a str, &'a str),
    Transition(Transition),
}

/// Parses a complete textual definition into a `TuringMachine`.
///
/// Every line is checked, and all failures are returned together. Missing metadata is
/// inferred from the rules: the initial state is the source state of the first rule, the
/// halt states are the states that only ever appear as targets, and the name counts the
/// active states. The alphabet is the set of symbols the rules use plus the blank.
///
/// # Arguments
///
/// * `input` - The text to parse, at most `MAX_PROGRAM_SIZE` bytes.
///
/// # Returns
///
/// * `Ok(TuringMachine)` if every line is well formed and at least one rule is present.
/// * `Err(ParseError)` listing every offending line otherwise.
pub fn parse(input: &str) -> Result<TuringMachine, ParseError> {
    if input.len() > MAX_PROGRAM_SIZE {
        return Err(ParseIssue::new(format!(
            "Definition is {} bytes, the limit is {MAX_PROGRAM_SIZE}",
            input.len()
        ))
        .into());
    }

    let mut rules = Vec::new();
    let mut metadata = Metadata::default();
    let mut issues = Vec::new();

    for (index, text) in input.lines().enumerate() {
        let number = index + 1;

        match parse_line(text) {
            Ok(Line::Empty) => {}
            Ok(Line::Metadata(key, value)) => {
                if let Err(message) = metadata.apply(key, value) {
                    issues.push(ParseIssue::at(number, message));
                }
            }
            Ok(Line::Transition(rule)) => rules.push(rule),
            Err(message) => issues.push(ParseIssue::at(number, message)),
        }
    }

    if !issues.is_empty() {
        return Err(ParseError { issues });
    }

    build_machine(rules, metadata)
}

/// Parses a single rule line such as `A 0 -> 1 R B`.
///
/// Blank, comment and metadata lines are rejected.
pub fn parse_rule(line: &str) -> Result<Transition, ParseIssue> {
    match parse_line(line) {
        Ok(Line::Transition(rule)) => Ok(rule),
        Ok(_) => Err(ParseIssue::new("Empty line or comment, expected a rule")),
        Err(message) => Err(ParseIssue::new(message)),
    }
}

/// Collects the metadata declared in `input`, skipping everything else.
pub fn parse_metadata(input: &str) -> Metadata {
    let mut metadata = Metadata::default();

    for text in input.lines() {
        if let Ok(Line::Metadata(key, value)) = parse_line(text) {
            // Malformed values are reported by `parse`.
            let _ = metadata.apply(key, value);
        }
    }

    metadata
}

fn parse_line(text: &str) -> Result<Line<'_>, String> {
    let pairs = BeaverParser::parse(Rule::line, text).map_err(|e| {
        format!(
            "Invalid rule \"{}\": {}. Expected \"STATE SYMBOL -> SYMBOL DIRECTION STATE\"",
            text.trim(),
            e.variant.message()
        )
    })?;

    // Rule: line > (metadata | comment | transition)? ~ EOI
    for pair in pairs.flat_map(|line| line.into_inner()) {
        match pair.as_rule() {
            Rule::metadata => {
                let mut inner = pair.into_inner();
                let key = inner.next().map_or("", |p| p.as_str());
                let value = inner.next().map_or("", |p| p.as_str());
                return Ok(Line::Metadata(key, value));
            }
            Rule::transition => return parse_transition(pair).map(Line::Transition),
            _ => {}
        }
    }

    Ok(Line::Empty)
}

/// Builds a `Transition` from a `Pair<Rule::transition>`.
fn parse_transition(pair: Pair<Rule>) -> Result<Transition, String> {
    let tokens: Vec<&str> = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::token)
        .map(|p| p.as_str())
        .collect();

    let &[state, read, write, direction, next] = tokens.as_slice() else {
        return Err(format!("Expected 5 fields, found {}", tokens.len()));
    };

    Ok(Transition::new(
        state,
        parse_symbol(read)?,
        parse_symbol(write)?,
        direction.parse::<Direction>()?,
        next,
    ))
}

fn parse_symbol(token: &str) -> Result<Symbol, String> {
    token.parse::<Symbol>()
}

fn build_machine(rules: Vec<Transition>, metadata: Metadata) -> Result<TuringMachine, ParseError> {
    let Some(first) = rules.first() else {
        return Err(ParseIssue::new("No rules found").into());
    };

    let initial = metadata
        .initial
        .unwrap_or_else(|| first.current_state.clone());

    let halt_states: BTreeSet<State> = match metadata.halt {
        Some(states) => states.into_iter().collect(),
        None => infer_halt_states(&rules),
    };

    let alphabet: BTreeSet<Symbol> = rules
        .iter()
        .flat_map(|rule| [rule.read_symbol, rule.write_symbol])
        .chain(std::iter::once(BLANK_SYMBOL))
        .collect();

    let mut machine = TuringMachine::new("", rules, initial)
        .with_halt_states(halt_states)
        .with_alphabet(alphabet);

    machine.name = metadata
        .name
        .unwrap_or_else(|| format!("Busy Beaver {} states", machine.active_states().len()));
    machine.description = metadata.description;

    Ok(machine)
}

/// States that are entered by some rule but have no rules of their own.
pub fn infer_halt_states(rules: &[Transition]) -> BTreeSet<State> {
    let sources: BTreeSet<&State> = rules.iter().map(|rule| &rule.current_state).collect();

    rules
        .iter()
        .map(|rule| &rule.next_state)
        .filter(|state| !sources.contains(state))
        .cloned()
        .collect()
}
