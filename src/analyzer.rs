//! This module provides an advisory validator for Busy Beaver rule sets. It reports problems
//! such as duplicate rules, missing halt states and incomplete coverage as a structured
//! `Report`. The engine never consults it: a machine with findings still runs.

use crate::parser::infer_halt_states;
use crate::table::TransitionTable;
use crate::types::{State, Symbol, Transition, TuringMachine};
use std::collections::BTreeSet;
use std::fmt::Display;
use thiserror::Error;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The machine cannot behave as a Busy Beaver.
    Error,
    /// Suspicious but runnable.
    Warning,
    /// Facts about the machine.
    Info,
}

/// Represents a single observation about a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Finding {
    /// There are no rules at all.
    #[error("No rules defined, the machine cannot run")]
    NoRules,
    /// Two rules share the same `(state, symbol)` key. Only the first one is ever used.
    #[error("Duplicate rule: state {state} + symbol {symbol}")]
    DuplicateRule { state: State, symbol: Symbol },
    /// No state is entered without also having rules of its own.
    #[error("No halt state detected, the machine may run forever")]
    NoHaltState,
    /// More than one state is only ever a target.
    #[error("Multiple halt states detected: {}", join(.0))]
    MultipleHaltStates(Vec<State>),
    /// An active state has no rule for a binary symbol the machine uses.
    #[error("Missing rule: state {state} + symbol {symbol}")]
    MissingRule { state: State, symbol: Symbol },
    /// The alphabet is something other than exactly `{0, 1}`.
    #[error("Non-standard symbols detected: {}. Busy Beaver machines normally use 0 and 1", join(.0))]
    NonStandardSymbols(Vec<Symbol>),
    /// States with a rule that points back to themselves.
    #[error("Potential loops detected in states: {}", join(.0))]
    SelfLoops(Vec<State>),
    /// The initial state has no outgoing rules.
    #[error("Initial state {0} has no rules, the machine halts immediately")]
    InitialStateWithoutRules(State),
    /// A declared halt state also has rules, which are never used.
    #[error("Halt state {0} has rules that can never fire")]
    HaltStateWithRules(State),
    /// A candidate rule has the same key as an existing one.
    #[error("Conflicts with existing rule: {0}")]
    ConflictingRule(Transition),
    #[error("Non-standard read symbol: {0}")]
    NonStandardReadSymbol(Symbol),
    #[error("Non-standard write symbol: {0}")]
    NonStandardWriteSymbol(Symbol),
    /// A candidate rule points back to its own state.
    #[error("Rule loops back to its own state {0}")]
    SelfLoop(State),
    /// Exactly one halt state was detected.
    #[error("Halt state detected: {0}")]
    HaltState(State),
    #[error("{rules} rules, {states} active states, {symbols} symbols")]
    Summary {
        rules: usize,
        states: usize,
        symbols: usize,
    },
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::NoRules
            | Finding::DuplicateRule { .. }
            | Finding::NoHaltState
            | Finding::ConflictingRule(_) => Severity::Error,
            Finding::HaltState(_) | Finding::Summary { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The findings of one validation pass, grouped by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub info: Vec<Finding>,
}

impl Report {
    /// A report is valid when it has no errors. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over every finding, errors first.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.errors.iter().chain(&self.warnings).chain(&self.info)
    }

    fn push(&mut self, finding: Finding) {
        match finding.severity() {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
            Severity::Info => self.info.push(finding),
        }
    }
}

impl FromIterator<Finding> for Report {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        let mut report = Report::default();
        iter.into_iter().for_each(|finding| report.push(finding));
        report
    }
}

/// Facts about a rule set shared by every check.
struct RuleSet<'a> {
    rules: &'a [Transition],
    table: TransitionTable,
    halt_states: BTreeSet<State>,
    active_states: BTreeSet<&'a State>,
    symbols: BTreeSet<Symbol>,
}

impl<'a> RuleSet<'a> {
    fn new(rules: &'a [Transition]) -> Self {
        let halt_states = infer_halt_states(rules);

        Self {
            rules,
            table: TransitionTable::new(rules.to_vec()),
            active_states: rules
                .iter()
                .map(|rule| &rule.current_state)
                .filter(|state| !halt_states.contains(*state))
                .collect(),
            halt_states,
            symbols: rules
                .iter()
                .flat_map(|rule| [rule.read_symbol, rule.write_symbol])
                .collect(),
        }
    }
}

/// Validates a rule list on its own.
///
/// Halt states are detected as the states that are entered but have no rules.
///
/// # Arguments
///
/// * `rules` - The rules to check, in order.
///
/// # Returns
///
/// A `Report` whose `is_valid` is false if any error was found.
pub fn validate(rules: &[Transition]) -> Report {
    if rules.is_empty() {
        return Report::from_iter([Finding::NoRules]);
    }

    let set = RuleSet::new(rules);
    let checks: [fn(&RuleSet) -> Vec<Finding>; 6] = [
        check_duplicates,
        check_halt_states,
        check_coverage,
        check_symbols,
        check_self_loops,
        summarize,
    ];

    checks.iter().flat_map(|check| check(&set)).collect()
}

/// Validates a machine: its rules plus its declared initial and halt states.
pub fn analyze(machine: &TuringMachine) -> Report {
    let mut report = validate(&machine.rules);

    if machine.rules.is_empty() {
        return report;
    }

    let sources: BTreeSet<&State> = machine.rules.iter().map(|rule| &rule.current_state).collect();

    if !sources.contains(&machine.initial_state) {
        report.push(Finding::InitialStateWithoutRules(machine.initial_state.clone()));
    }

    machine
        .halt_states
        .iter()
        .filter(|state| sources.contains(state))
        .for_each(|state| report.push(Finding::HaltStateWithRules(state.clone())));

    report
}

/// Checks a candidate rule against the rules it would join.
pub fn validate_rule(rule: &Transition, existing: &[Transition]) -> Report {
    let mut report = Report::default();

    if let Some(duplicate) = existing
        .iter()
        .find(|r| r.current_state == rule.current_state && r.read_symbol == rule.read_symbol)
    {
        report.push(Finding::ConflictingRule(duplicate.clone()));
    }

    if !rule.read_symbol.is_binary() {
        report.push(Finding::NonStandardReadSymbol(rule.read_symbol));
    }

    if !rule.write_symbol.is_binary() {
        report.push(Finding::NonStandardWriteSymbol(rule.write_symbol));
    }

    if rule.is_self_loop() {
        report.push(Finding::SelfLoop(rule.current_state.clone()));
    }

    report
}

fn check_duplicates(set: &RuleSet) -> Vec<Finding> {
    set.table
        .duplicates()
        .into_iter()
        .map(|rule| Finding::DuplicateRule {
            state: rule.current_state.clone(),
            symbol: rule.read_symbol,
        })
        .collect()
}

fn check_halt_states(set: &RuleSet) -> Vec<Finding> {
    let mut halts = set.halt_states.iter().cloned();

    match (halts.next(), halts.next()) {
        (None, _) => vec![Finding::NoHaltState],
        (Some(state), None) => vec![Finding::HaltState(state)],
        _ => vec![Finding::MultipleHaltStates(
            set.halt_states.iter().cloned().collect(),
        )],
    }
}

/// Every active state should handle every binary symbol the machine uses.
fn check_coverage(set: &RuleSet) -> Vec<Finding> {
    let binary: Vec<Symbol> = set.symbols.iter().copied().filter(|s| s.is_binary()).collect();

    set.active_states
        .iter()
        .flat_map(|&state| binary.iter().map(move |&symbol| (state, symbol)))
        .filter(|(state, symbol)| set.table.lookup(state, *symbol).is_none())
        .map(|(state, symbol)| Finding::MissingRule {
            state: state.clone(),
            symbol,
        })
        .collect()
}

fn check_symbols(set: &RuleSet) -> Vec<Finding> {
    let standard = set.symbols.len() == 2
        && set.symbols.contains(&Symbol::ZERO)
        && set.symbols.contains(&Symbol::ONE);

    if standard {
        return Vec::new();
    }

    vec![Finding::NonStandardSymbols(set.symbols.iter().copied().collect())]
}

fn check_self_loops(set: &RuleSet) -> Vec<Finding> {
    let loops: BTreeSet<State> = set
        .rules
        .iter()
        .filter(|rule| rule.is_self_loop())
        .map(|rule| rule.current_state.clone())
        .collect();

    if loops.is_empty() {
        return Vec::new();
    }

    vec![Finding::SelfLoops(loops.into_iter().collect())]
}

fn summarize(set: &RuleSet) -> Vec<Finding> {
    vec![Finding::Summary {
        rules: set.rules.len(),
        states: set.active_states.len(),
        symbols: set.symbols.len(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn sigma2_rules() -> Vec<Transition> {
        vec![
            Transition::new("A", '0', '1', Direction::Right, "B"),
            Transition::new("A", '1', '1', Direction::Left, "B"),
            Transition::new("B", '0', '1', Direction::Left, "A"),
            Transition::new("B", '1', '1', Direction::Right, "halt"),
        ]
    }

    #[test]
    fn test_valid_machine() {
        let report = validate(&sigma2_rules());

        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
        assert_eq!(
            report.info,
            vec![
                Finding::HaltState(State::new("halt")),
                Finding::Summary {
                    rules: 4,
                    states: 2,
                    symbols: 2
                },
            ]
        );
        assert_eq!(report.info[1].to_string(), "4 rules, 2 active states, 2 symbols");
    }

    #[test]
    fn test_no_rules() {
        let report = validate(&[]);

        assert!(!report.is_valid());
        assert_eq!(report.errors, vec![Finding::NoRules]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_rule() {
        let mut rules = sigma2_rules();
        rules.push(Transition::new("A", '0', '0', Direction::Left, "B"));

        let report = validate(&rules);

        assert!(!report.is_valid());
        assert_eq!(
            report.errors,
            vec![Finding::DuplicateRule {
                state: State::new("A"),
                symbol: Symbol::ZERO
            }]
        );
    }

    #[test]
    fn test_no_halt_state() {
        let rules = vec![
            Transition::new("A", '0', '1', Direction::Right, "B"),
            Transition::new("B", '0', '1', Direction::Left, "A"),
        ];

        let report = validate(&rules);

        assert!(report.errors.contains(&Finding::NoHaltState));
        assert_eq!(
            Finding::NoHaltState.to_string(),
            "No halt state detected, the machine may run forever"
        );
    }

    #[test]
    fn test_multiple_halt_states_and_missing_coverage() {
        let rules = vec![
            Transition::new("A", '0', '1', Direction::Right, "X"),
            Transition::new("A", '1', '1', Direction::Left, "Y"),
            Transition::new("B", '0', '1', Direction::Left, "A"),
        ];

        let report = validate(&rules);

        assert!(report.is_valid());
        assert!(report.warnings.contains(&Finding::MultipleHaltStates(vec![
            State::new("X"),
            State::new("Y")
        ])));
        assert!(report.warnings.contains(&Finding::MissingRule {
            state: State::new("B"),
            symbol: Symbol::ONE
        }));
        assert_eq!(
            report.warnings[0].to_string(),
            "Multiple halt states detected: X, Y"
        );
    }

    #[test]
    fn test_non_standard_symbols() {
        let rules = vec![Transition::new("A", '0', 'x', Direction::Right, "halt")];

        let report = validate(&rules);

        assert!(report.warnings.contains(&Finding::NonStandardSymbols(vec![
            Symbol::ZERO,
            Symbol::new('x')
        ])));
    }

    #[test]
    fn test_single_symbol_machine_is_non_standard() {
        let rules = vec![Transition::new("A", '0', '0', Direction::Right, "halt")];

        let report = validate(&rules);

        assert!(report
            .warnings
            .iter()
            .any(|f| matches!(f, Finding::NonStandardSymbols(_))));
    }

    #[test]
    fn test_self_loops() {
        let rules = vec![
            Transition::new("A", '0', '1', Direction::Right, "A"),
            Transition::new("A", '1', '1', Direction::Right, "halt"),
        ];

        let report = validate(&rules);

        assert!(report
            .warnings
            .contains(&Finding::SelfLoops(vec![State::new("A")])));
    }

    #[test]
    fn test_analyze_machine_level_checks() {
        let machine = TuringMachine::new(
            "Odd",
            vec![
                Transition::new("A", '0', '1', Direction::Right, "halt"),
                Transition::new("A", '1', '1', Direction::Right, "halt"),
                Transition::new("halt", '0', '1', Direction::Right, "Z"),
                Transition::new("halt", '1', '1', Direction::Right, "Z"),
            ],
            "Start",
        );

        let report = analyze(&machine);

        assert!(report
            .warnings
            .contains(&Finding::InitialStateWithoutRules(State::new("Start"))));
        assert!(report
            .warnings
            .contains(&Finding::HaltStateWithRules(State::new("halt"))));
    }

    #[test]
    fn test_validate_rule() {
        let existing = sigma2_rules();

        let conflict = validate_rule(
            &Transition::new("A", '0', '0', Direction::Left, "A"),
            &existing,
        );
        assert!(!conflict.is_valid());
        assert_eq!(
            conflict.errors,
            vec![Finding::ConflictingRule(existing[0].clone())]
        );
        assert!(conflict.warnings.contains(&Finding::SelfLoop(State::new("A"))));

        let fresh = validate_rule(
            &Transition::new("C", '2', '1', Direction::Right, "A"),
            &existing,
        );
        assert!(fresh.is_valid());
        assert_eq!(
            fresh.warnings,
            vec![Finding::NonStandardReadSymbol(Symbol::new('2'))]
        );
    }

    #[test]
    fn test_severity_order() {
        let report = validate(&[Transition::new("A", '0', 'x', Direction::Right, "A")]);

        let severities: Vec<Severity> = report.findings().map(Finding::severity).collect();
        let mut sorted = severities.clone();
        sorted.sort();
        assert_eq!(severities, sorted);
    }
}
