//! This module converts machines to and from the compact standard notation used to share
//! Busy Beaver candidates, e.g. `1RB1LB_1LA1RZ`, and exports machines back to the textual
//! rule format.
//!
//! In standard notation each state gets one `_`-separated group, in order, starting with the
//! initial state as `A`. A group holds the actions for reading `0` and `1`, each written as
//! `<write><L|R><next>`, or `---` when the action is undefined. The halt state is `Z`, so
//! states use the letters `A` to `Y`.

use crate::table::TransitionTable;
use crate::types::{
    BusyBeaverError, Direction, State, Symbol, Transition, TuringMachine, DEFAULT_HALT_STATE,
};
use std::collections::HashMap;

const UNDEFINED_ACTION: &str = "---";
const HALT_LETTER: char = 'Z';
/// `Z` is reserved for the halt state.
const MAX_STATES: usize = 25;

/// Encodes a binary machine in standard notation.
///
/// States are lettered in order of first appearance in the rules, with the initial state
/// first. Every declared halt state is written as `Z`.
///
/// # Arguments
///
/// * `machine` - The machine to encode.
///
/// # Returns
///
/// * `Ok(String)` with the encoded machine.
/// * `Err(BusyBeaverError::Encoding)` if the machine uses symbols other than `0` and `1`,
///   uses the `N` direction, or has more than 25 states.
pub fn encode(machine: &TuringMachine) -> Result<String, BusyBeaverError> {
    check_encodable(machine)?;

    let states = state_order(machine);
    if states.len() > MAX_STATES {
        return Err(BusyBeaverError::Encoding(format!(
            "{} states do not fit in standard notation, the limit is {MAX_STATES}",
            states.len()
        )));
    }

    let letters: HashMap<&State, char> = states.iter().copied().zip('A'..HALT_LETTER).collect();
    let table = TransitionTable::new(machine.rules.clone());

    let groups: Vec<String> = states
        .iter()
        .map(|state| {
            [Symbol::ZERO, Symbol::ONE]
                .into_iter()
                .map(|symbol| match table.lookup(state, symbol) {
                    Some(rule) => encode_action(rule, machine, &letters),
                    None => UNDEFINED_ACTION.to_string(),
                })
                .collect()
        })
        .collect();

    Ok(groups.join("_"))
}

fn check_encodable(machine: &TuringMachine) -> Result<(), BusyBeaverError> {
    for rule in &machine.rules {
        if !rule.read_symbol.is_binary() || !rule.write_symbol.is_binary() {
            return Err(BusyBeaverError::Encoding(format!(
                "Rule \"{rule}\" uses a non-binary symbol"
            )));
        }
        if rule.direction == Direction::Stay {
            return Err(BusyBeaverError::Encoding(format!(
                "Rule \"{rule}\" does not move the head"
            )));
        }
    }

    Ok(())
}

/// Non-halt states, initial state first, then in order of first appearance.
fn state_order(machine: &TuringMachine) -> Vec<&State> {
    let mut order: Vec<&State> = Vec::new();

    let mentioned = machine
        .rules
        .iter()
        .flat_map(|rule| [&rule.current_state, &rule.next_state]);

    for state in std::iter::once(&machine.initial_state).chain(mentioned) {
        if !machine.is_halt_state(state) && !order.contains(&state) {
            order.push(state);
        }
    }

    order
}

fn encode_action(
    rule: &Transition,
    machine: &TuringMachine,
    letters: &HashMap<&State, char>,
) -> String {
    let next = if machine.is_halt_state(&rule.next_state) {
        HALT_LETTER
    } else {
        letters.get(&rule.next_state).copied().unwrap_or(HALT_LETTER)
    };

    format!("{}{}{}", rule.write_symbol, rule.direction, next)
}

/// Decodes standard notation into a machine.
///
/// States are named `A`, `B`, ... in group order, `A` is the initial state and both `Z` and
/// `H` decode to the `halt` state. The code itself becomes the machine's name.
pub fn decode(code: &str) -> Result<TuringMachine, BusyBeaverError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(BusyBeaverError::Encoding("Empty machine code".to_string()));
    }

    let groups: Vec<&str> = code.split('_').collect();
    if groups.len() > MAX_STATES {
        return Err(BusyBeaverError::Encoding(format!(
            "{} states do not fit in standard notation, the limit is {MAX_STATES}",
            groups.len()
        )));
    }

    let letters: Vec<char> = ('A'..HALT_LETTER).take(groups.len()).collect();
    let mut rules = Vec::new();

    for (group, &letter) in groups.iter().zip(&letters) {
        let chars: Vec<char> = group.chars().collect();
        if chars.len() != 6 {
            return Err(BusyBeaverError::Encoding(format!(
                "Group \"{group}\" for state {letter} must hold exactly two 3-character actions"
            )));
        }

        for (action, read) in chars.chunks(3).zip([Symbol::ZERO, Symbol::ONE]) {
            if let Some(rule) = decode_action(action, letter, read, &letters)? {
                rules.push(rule);
            }
        }
    }

    Ok(TuringMachine::new(code, rules, State::new("A")))
}

fn decode_action(
    action: &[char],
    state: char,
    read: Symbol,
    letters: &[char],
) -> Result<Option<Transition>, BusyBeaverError> {
    let &[write, direction, next] = action else {
        return Err(BusyBeaverError::Encoding(format!(
            "Malformed action for state {state}"
        )));
    };

    if action.iter().collect::<String>() == UNDEFINED_ACTION {
        return Ok(None);
    }

    let invalid = |what: &str, found: char| {
        BusyBeaverError::Encoding(format!(
            "Invalid {what} '{found}' in action for state {state} reading {read}"
        ))
    };

    let write = Symbol::new(write);
    if !write.is_binary() {
        return Err(invalid("symbol", write.as_char()));
    }

    let direction = match direction {
        'L' => Direction::Left,
        'R' => Direction::Right,
        other => return Err(invalid("direction", other)),
    };

    let next = match next {
        HALT_LETTER => State::new(DEFAULT_HALT_STATE),
        letter if letters.contains(&letter) => State::from(letter.to_string()),
        // Older listings use `H` when there are fewer than eight states.
        'H' => State::new(DEFAULT_HALT_STATE),
        other => return Err(invalid("state", other)),
    };

    Ok(Some(Transition::new(
        State::from(state.to_string()),
        read,
        write,
        direction,
        next,
    )))
}

/// Exports a machine in the textual rule format, with its metadata as `# Key: value` lines.
pub fn to_text(machine: &TuringMachine) -> String {
    let mut lines = vec![format!("# Name: {}", machine.name)];

    if let Some(description) = &machine.description {
        lines.push(format!("# Description: {description}"));
    }

    lines.push(format!("# Initial: {}", machine.initial_state));

    if !machine.halt_states.is_empty() {
        let halts: Vec<&str> = machine.halt_states.iter().map(State::as_str).collect();
        lines.push(format!("# Halt: {}", halts.join(", ")));
    }

    lines.extend(machine.rules.iter().map(ToString::to_string));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
