//! This module defines the `Engine`, which executes a `TuringMachine` one step at a time.
//! It owns the machine's `MachineConfiguration` (state, tape, head, step count and halt
//! status) and is the only thing that mutates it.

use crate::table::TransitionTable;
use crate::tape::Tape;
use crate::types::{Halt, State, Step, Transition, TuringMachine};
use serde::Serialize;
use tracing::debug;

/// The mutable execution state of a machine.
///
/// A fresh configuration has an empty tape, the head at position 0 and the machine's
/// initial state. Presentation code only ever sees snapshots of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfiguration {
    pub current_state: State,
    pub tape: Tape,
    pub head_position: i64,
    pub step_count: u64,
    pub is_halted: bool,
    pub halt_state: Option<State>,
}

impl MachineConfiguration {
    /// Creates the starting configuration for `machine`.
    pub fn initial(machine: &TuringMachine) -> Self {
        Self {
            current_state: machine.initial_state.clone(),
            tape: Tape::default(),
            head_position: 0,
            step_count: 0,
            is_halted: false,
            halt_state: None,
        }
    }

    /// The number of `1`s currently on the tape.
    pub fn score(&self) -> usize {
        self.tape.score()
    }
}

/// Executes a Turing machine.
///
/// The engine is either ready or halted. `step` is the only operation that advances the
/// machine; once halted it becomes a no-op until `reset` or `load`.
#[derive(Debug, Clone)]
pub struct Engine {
    machine: TuringMachine,
    table: TransitionTable,
    config: MachineConfiguration,
    halt: Option<Halt>,
}

impl Engine {
    /// Creates an engine ready to run `machine` from its initial configuration.
    pub fn new(machine: TuringMachine) -> Self {
        Self {
            table: TransitionTable::new(machine.rules.clone()),
            config: MachineConfiguration::initial(&machine),
            machine,
            halt: None,
        }
    }

    /// Executes a single step.
    ///
    /// Reads the symbol under the head and applies the matching rule: write, move, change
    /// state and count the step. If no rule matches, the machine halts in its current
    /// state without touching the tape and without counting a step.
    ///
    /// # Returns
    ///
    /// * `Step::Continue` if a rule was applied and the machine is not halted.
    /// * `Step::Halt(_)` if the machine halted on this step or was already halted.
    pub fn step(&mut self) -> Step {
        if let Some(halt) = &self.halt {
            return Step::Halt(halt.clone());
        }

        let symbol = self.config.tape.read(self.config.head_position);

        let Some(rule) = self.table.lookup(&self.config.current_state, symbol) else {
            let state = self.config.current_state.clone();
            debug!(
                state = %state,
                %symbol,
                steps = self.config.step_count,
                "no rule defined, halting"
            );
            return self.halt_with(Halt::Undefined(state));
        };

        let write = rule.write_symbol;
        let offset = rule.direction.offset();
        let next = rule.next_state.clone();

        self.config.tape.write(self.config.head_position, write);
        self.config.head_position += offset;
        self.config.step_count += 1;

        if self.machine.is_halt_state(&next) {
            self.config.current_state = next.clone();
            debug!(
                state = %next,
                steps = self.config.step_count,
                score = self.config.score(),
                "reached halt state"
            );
            return self.halt_with(Halt::Reached(next));
        }

        self.config.current_state = next;
        Step::Continue
    }

    fn halt_with(&mut self, halt: Halt) -> Step {
        self.config.is_halted = true;
        self.config.halt_state = Some(halt.state().clone());
        self.halt = Some(halt.clone());
        Step::Halt(halt)
    }

    /// Steps until the machine halts or `max_steps` rules have been applied.
    ///
    /// Returns `Step::Continue` when the bound is exhausted, which means the machine may
    /// still be running; it is not marked halted.
    pub fn run(&mut self, max_steps: u64) -> Step {
        for _ in 0..max_steps {
            if let halt @ Step::Halt(_) = self.step() {
                return halt;
            }
        }

        // A machine can also halt on the step right after the bound is used up, but that
        // step was not requested.
        match &self.halt {
            Some(halt) => Step::Halt(halt.clone()),
            None => Step::Continue,
        }
    }

    /// Discards the current configuration and starts over from the held machine.
    pub fn reset(&mut self) {
        self.config = MachineConfiguration::initial(&self.machine);
        self.halt = None;
    }

    /// Replaces the machine and resets. No validation is performed.
    pub fn load(&mut self, machine: TuringMachine) {
        debug!(name = %machine.name, rules = machine.rules.len(), "loading machine");
        self.table = TransitionTable::new(machine.rules.clone());
        self.machine = machine;
        self.reset();
    }

    /// Replaces the rule set of the held machine without touching the configuration.
    ///
    /// A halted machine stays halted.
    pub fn update_rules(&mut self, rules: Vec<Transition>) {
        self.table = TransitionTable::new(rules.clone());
        self.machine.rules = rules;
    }

    /// Returns the rule that the next `step` would apply.
    pub fn transition(&self) -> Option<&Transition> {
        if self.halt.is_some() {
            return None;
        }

        let symbol = self.config.tape.read(self.config.head_position);
        self.table.lookup(&self.config.current_state, symbol)
    }

    pub fn configuration(&self) -> &MachineConfiguration {
        &self.config
    }

    /// Returns an owned copy of the current configuration.
    pub fn snapshot(&self) -> MachineConfiguration {
        self.config.clone()
    }

    pub fn machine(&self) -> &TuringMachine {
        &self.machine
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn state(&self) -> &State {
        &self.config.current_state
    }

    pub fn tape(&self) -> &Tape {
        &self.config.tape
    }

    pub fn head(&self) -> i64 {
        self.config.head_position
    }

    pub fn step_count(&self) -> u64 {
        self.config.step_count
    }

    pub fn score(&self) -> usize {
        self.config.score()
    }

    pub fn is_halted(&self) -> bool {
        self.config.is_halted
    }

    /// Returns why the machine halted, if it has.
    pub fn halt(&self) -> Option<&Halt> {
        self.halt.as_ref()
    }
}
