//! Property-based invariant tests for the execution engine.
//!
//! These tests run arbitrary binary machines and check what must hold for any of them:
//!
//! 1. Execution is deterministic.
//! 2. A step moves the head by at most one cell and its write is visible.
//! 3. A halted machine never changes again.
//! 4. The score always equals the number of `1`s on the tape.
//! 5. Reset restores the initial configuration.
//! 6. Standard notation survives a decode/encode cycle.

use beaver::{
    decode, encode, Direction, Engine, Halt, MachineConfiguration, Step, Symbol, Transition,
    TuringMachine,
};
use proptest::prelude::*;

const LABELS: [&str; 4] = ["A", "B", "C", "D"];

// ── Helpers ─────────────────────────────────────────────────────────────

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Left),
        Just(Direction::Right),
        Just(Direction::Stay),
    ]
}

fn symbol_strategy() -> impl Strategy<Value = Symbol> {
    prop_oneof![Just(Symbol::ZERO), Just(Symbol::ONE)]
}

/// A machine with up to four states. Each (state, symbol) pair has a rule with high
/// probability; `next` index `states` means the halt state.
fn machine_strategy() -> impl Strategy<Value = TuringMachine> {
    (1usize..=4).prop_flat_map(|states| {
        let action = (symbol_strategy(), direction_strategy(), 0..=states);
        prop::collection::vec(prop::option::weighted(0.9, action), states * 2).prop_map(
            move |actions| {
                let rules = actions
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, action)| {
                        let (write, direction, next) = action?;
                        let read = if i % 2 == 0 { Symbol::ZERO } else { Symbol::ONE };
                        let next = if next < states { LABELS[next] } else { "halt" };
                        Some(Transition::new(LABELS[i / 2], read, write, direction, next))
                    })
                    .collect();
                TuringMachine::new("Arbitrary", rules, "A")
            },
        )
    })
}

fn ones(config: &MachineConfiguration) -> usize {
    config
        .tape
        .iter()
        .filter(|(_, symbol)| *symbol == Symbol::ONE)
        .count()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn execution_is_deterministic(machine in machine_strategy(), steps in 0u64..300) {
        let mut a = Engine::new(machine.clone());
        let mut b = Engine::new(machine);

        let outcome_a = a.run(steps);
        let outcome_b = b.run(steps);

        prop_assert_eq!(outcome_a, outcome_b);
        prop_assert_eq!(a.snapshot(), b.snapshot());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Steps are atomic and local
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn step_moves_at_most_one_cell(machine in machine_strategy(), steps in 1usize..200) {
        let mut engine = Engine::new(machine);

        for _ in 0..steps {
            let before = engine.snapshot();
            let rule = engine.transition().cloned();

            engine.step();
            let after = engine.snapshot();

            match rule {
                Some(rule) => {
                    prop_assert_eq!(
                        after.head_position - before.head_position,
                        rule.direction.offset()
                    );
                    prop_assert_eq!(after.tape.read(before.head_position), rule.write_symbol);
                    prop_assert_eq!(after.step_count, before.step_count + 1);
                    prop_assert_eq!(&after.current_state, &rule.next_state);
                }
                None => {
                    prop_assert_eq!(after.head_position, before.head_position);
                    prop_assert_eq!(&after.tape, &before.tape);
                    prop_assert_eq!(after.step_count, before.step_count);
                    prop_assert!(after.is_halted);
                }
            }

            if after.is_halted {
                break;
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Halting is final
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn halted_machine_is_frozen(machine in machine_strategy(), extra in 1usize..20) {
        let mut engine = Engine::new(machine);

        if let Step::Halt(halt) = engine.run(500) {
            let frozen = engine.snapshot();

            for _ in 0..extra {
                prop_assert_eq!(engine.step(), Step::Halt(halt.clone()));
            }
            prop_assert_eq!(engine.snapshot(), frozen);
            prop_assert!(engine.transition().is_none());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Score counts ones
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn score_counts_ones(machine in machine_strategy(), steps in 0u64..300) {
        let mut engine = Engine::new(machine);
        engine.run(steps);

        let config = engine.snapshot();
        prop_assert_eq!(engine.score(), ones(&config));
        prop_assert_eq!(config.score(), engine.tape().count(Symbol::ONE));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Reset is idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reset_restores_initial_configuration(machine in machine_strategy(), steps in 0u64..300) {
        let initial = MachineConfiguration::initial(&machine);
        let mut engine = Engine::new(machine);

        engine.run(steps);
        engine.reset();
        prop_assert_eq!(engine.snapshot(), initial.clone());
        prop_assert!(engine.halt().is_none());

        engine.reset();
        prop_assert_eq!(engine.snapshot(), initial);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Standard notation
// ═════════════════════════════════════════════════════════════════════════

fn code_strategy() -> impl Strategy<Value = String> {
    (1usize..=5).prop_flat_map(|states| {
        let letters: Vec<char> = ('A'..='Z').take(states).chain(['Z']).collect();
        let action = prop_oneof![
            1 => Just("---".to_string()),
            9 => ("[01]", "[LR]", prop::sample::select(letters))
                .prop_map(|(write, direction, next)| format!("{write}{direction}{next}")),
        ];
        prop::collection::vec((action.clone(), action), states).prop_map(|groups| {
            groups
                .into_iter()
                .map(|(zero, one)| format!("{zero}{one}"))
                .collect::<Vec<_>>()
                .join("_")
        })
    })
}

proptest! {
    #[test]
    fn decoded_code_encodes_back(code in code_strategy()) {
        let machine = decode(&code).unwrap();

        // Encoding drops states no rule mentions and may reletter the rest, so compare
        // executions instead of strings.
        let reencoded = encode(&machine).unwrap();
        let mut decoded = Engine::new(machine);
        let mut cycled = Engine::new(decode(&reencoded).unwrap());

        let (a, b) = (decoded.run(200), cycled.run(200));
        prop_assert_eq!(a.is_halt(), b.is_halt());
        prop_assert_eq!(
            matches!(a, Step::Halt(Halt::Reached(_))),
            matches!(b, Step::Halt(Halt::Reached(_)))
        );
        prop_assert_eq!(decoded.step_count(), cycled.step_count());
        prop_assert_eq!(decoded.score(), cycled.score());
        prop_assert_eq!(decoded.head(), cycled.head());
    }
}
