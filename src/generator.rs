//! This module generates random Busy Beaver candidates.
//!
//! A generated machine with `n` states uses the labels `0` to `n - 1`; the last one is the
//! halt state. Every other state gets one rule for each of `0` and `1`. The caller supplies
//! the random number generator, so seeded generators give reproducible machines.

use crate::types::{BusyBeaverError, Direction, State, Symbol, Transition, TuringMachine};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The largest machine the generator will build.
pub const MAX_GENERATED_STATES: usize = 10;

/// Probabilities used while generating rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Chance that a rule enters the halt state.
    pub halt_probability: f64,
    /// Chance that a rule enters the halt state when its source state has no halt rule yet.
    /// Only used by the optimized generator.
    pub first_halt_probability: f64,
    /// Chance that a rule not entering the halt state moves to a different state.
    pub change_state_probability: f64,
    pub left_probability: f64,
    pub right_probability: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            halt_probability: 0.3,
            first_halt_probability: 0.5,
            change_state_probability: 0.7,
            left_probability: 0.4,
            right_probability: 0.4,
        }
    }
}

impl GeneratorConfig {
    fn check(&self) -> Result<(), BusyBeaverError> {
        let probabilities = [
            ("haltProbability", self.halt_probability),
            ("firstHaltProbability", self.first_halt_probability),
            ("changeStateProbability", self.change_state_probability),
            ("leftProbability", self.left_probability),
            ("rightProbability", self.right_probability),
        ];

        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(BusyBeaverError::Generator(format!(
                    "{name} must be between 0 and 1, got {p}"
                )));
            }
        }

        if self.left_probability + self.right_probability > 1.0 {
            return Err(BusyBeaverError::Generator(
                "leftProbability and rightProbability must not add up to more than 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builds random machines from a `GeneratorConfig`.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

/// The labels and halt state shared by both strategies.
struct Layout {
    states: Vec<State>,
    halt: State,
}

impl Layout {
    fn new(count: usize) -> Self {
        let states: Vec<State> = (0..count).map(|i| State::from(i.to_string())).collect();
        let halt = states[count - 1].clone();
        Self { states, halt }
    }

    fn active(&self) -> &[State] {
        &self.states[..self.states.len() - 1]
    }
}

impl Generator {
    /// Creates a generator after checking that every probability lies in `[0, 1]` and that
    /// the left and right probabilities leave room for each other.
    pub fn new(config: GeneratorConfig) -> Result<Self, BusyBeaverError> {
        config.check()?;
        Ok(Self { config })
    }

    /// Returns the probabilities in use.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generates a machine with `states` states, the last of which halts.
    ///
    /// # Arguments
    ///
    /// * `states` - Between 1 and `MAX_GENERATED_STATES`, halt state included.
    /// * `rng` - The source of randomness.
    ///
    /// # Returns
    ///
    /// * `Ok(TuringMachine)` with `2 * (states - 1)` rules.
    /// * `Err(BusyBeaverError::Generator)` if `states` is out of range.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        states: usize,
        rng: &mut R,
    ) -> Result<TuringMachine, BusyBeaverError> {
        let layout = checked_layout(states)?;
        let mut rules = Vec::with_capacity(2 * layout.active().len());

        for state in layout.active() {
            for read in [Symbol::ZERO, Symbol::ONE] {
                let next = self.next_state(state, &layout, rng);
                rules.push(self.rule(state, read, next, rng));
            }
        }

        Ok(build(states, rules, &layout))
    }

    /// Like [`Generator::generate`], but steers away from trivial machines: a state without a
    /// halt rule is more likely to get one, and rarely targeted states are preferred.
    pub fn generate_optimized<R: Rng + ?Sized>(
        &self,
        states: usize,
        rng: &mut R,
    ) -> Result<TuringMachine, BusyBeaverError> {
        let layout = checked_layout(states)?;
        let mut rules = Vec::with_capacity(2 * layout.active().len());
        let mut usage: HashMap<State, u32> = HashMap::new();
        let mut halt_rules: HashMap<State, u32> = HashMap::new();

        for state in layout.active() {
            for read in [Symbol::ZERO, Symbol::ONE] {
                let has_halt_rule = halt_rules.get(state).is_some_and(|&n| n > 0);
                let next = self.weighted_next_state(has_halt_rule, &layout, &usage, rng)?;

                *usage.entry(next.clone()).or_default() += 1;
                if next == layout.halt {
                    *halt_rules.entry(state.clone()).or_default() += 1;
                }

                rules.push(self.rule(state, read, next, rng));
            }
        }

        Ok(build(states, rules, &layout))
    }

    /// Generates `count` machines, numbering their names `#1`, `#2`, ...
    pub fn generate_many<R: Rng + ?Sized>(
        &self,
        states: usize,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<TuringMachine>, BusyBeaverError> {
        (1..=count)
            .map(|i| {
                let mut machine = self.generate(states, rng)?;
                machine.name = format!("{} #{i}", machine.name);
                Ok(machine)
            })
            .collect()
    }

    fn rule<R: Rng + ?Sized>(
        &self,
        state: &State,
        read: Symbol,
        next: State,
        rng: &mut R,
    ) -> Transition {
        let write = if rng.gen_bool(0.5) { Symbol::ONE } else { Symbol::ZERO };
        Transition::new(state, read, write, self.direction(rng), next)
    }

    fn direction<R: Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        let roll: f64 = rng.gen();

        if roll < self.config.left_probability {
            Direction::Left
        } else if roll < self.config.left_probability + self.config.right_probability {
            Direction::Right
        } else {
            Direction::Stay
        }
    }

    fn next_state<R: Rng + ?Sized>(&self, current: &State, layout: &Layout, rng: &mut R) -> State {
        if rng.gen_bool(self.config.halt_probability) {
            return layout.halt.clone();
        }

        let others: Vec<&State> = layout.active().iter().filter(|s| *s != current).collect();

        if !others.is_empty() && rng.gen_bool(self.config.change_state_probability) {
            if let Some(&state) = others.choose(rng) {
                return state.clone();
            }
        }

        layout
            .active()
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| layout.halt.clone())
    }

    fn weighted_next_state<R: Rng + ?Sized>(
        &self,
        has_halt_rule: bool,
        layout: &Layout,
        usage: &HashMap<State, u32>,
        rng: &mut R,
    ) -> Result<State, BusyBeaverError> {
        let halt_probability = if has_halt_rule {
            self.config.halt_probability
        } else {
            self.config.first_halt_probability
        };

        if rng.gen_bool(halt_probability) {
            return Ok(layout.halt.clone());
        }

        let weights = layout
            .active()
            .iter()
            .map(|state| 1.0 / (usage.get(state).copied().unwrap_or(0) as f64 + 1.0));
        let index = WeightedIndex::new(weights)
            .map_err(|e| BusyBeaverError::Generator(format!("Invalid state weights: {e}")))?;

        Ok(layout.active()[index.sample(rng)].clone())
    }
}

fn checked_layout(states: usize) -> Result<Layout, BusyBeaverError> {
    if !(1..=MAX_GENERATED_STATES).contains(&states) {
        return Err(BusyBeaverError::Generator(format!(
            "Number of states must be between 1 and {MAX_GENERATED_STATES}, got {states}"
        )));
    }

    Ok(Layout::new(states))
}

fn build(states: usize, rules: Vec<Transition>, layout: &Layout) -> TuringMachine {
    TuringMachine::new(
        format!("Busy Beaver {states} states (generated)"),
        rules,
        layout.states[0].clone(),
    )
    .with_description(format!("Randomly generated Busy Beaver candidate with {states} states"))
    .with_halt_states([layout.halt.clone()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::validate;
    use rand::rngs::StdRng;
    use std::collections::BTreeSet;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_generate_structure() {
        let machine = Generator::default().generate(4, &mut seeded()).unwrap();

        assert_eq!(machine.rules.len(), 6);
        assert_eq!(machine.initial_state.as_str(), "0");
        assert_eq!(machine.halt_states, BTreeSet::from([State::new("3")]));
        assert_eq!(machine.name, "Busy Beaver 4 states (generated)");

        let keys: BTreeSet<(&str, Symbol)> = machine
            .rules
            .iter()
            .map(|r| (r.current_state.as_str(), r.read_symbol))
            .collect();
        assert_eq!(keys.len(), 6);

        let labels = ["0", "1", "2", "3"];
        for rule in &machine.rules {
            assert_ne!(rule.current_state.as_str(), "3");
            assert!(labels.contains(&rule.next_state.as_str()));
            assert!(rule.write_symbol.is_binary());
        }

        // Generated rules never collide.
        let report = validate(&machine.rules);
        assert!(!report
            .errors
            .iter()
            .any(|f| matches!(f, crate::analyzer::Finding::DuplicateRule { .. })));
    }

    #[test]
    fn test_generate_is_reproducible() {
        let generator = Generator::default();

        let a = generator.generate(5, &mut seeded()).unwrap();
        let b = generator.generate(5, &mut seeded()).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_state_count_bounds() {
        let generator = Generator::default();

        assert!(matches!(
            generator.generate(0, &mut seeded()),
            Err(BusyBeaverError::Generator(_))
        ));
        assert!(generator.generate(11, &mut seeded()).is_err());
        assert!(generator.generate_optimized(11, &mut seeded()).is_err());
        assert!(generator.generate(1, &mut seeded()).unwrap().rules.is_empty());
        assert_eq!(generator.generate(10, &mut seeded()).unwrap().rules.len(), 18);
    }

    #[test]
    fn test_config_extremes() {
        let always_halt = Generator::new(GeneratorConfig {
            halt_probability: 1.0,
            left_probability: 0.0,
            right_probability: 0.0,
            ..GeneratorConfig::default()
        })
        .unwrap();

        let machine = always_halt.generate(3, &mut seeded()).unwrap();

        assert!(machine.rules.iter().all(|r| r.next_state.as_str() == "2"));
        assert!(machine.rules.iter().all(|r| r.direction == Direction::Stay));
    }

    #[test]
    fn test_never_halting_config_avoids_self_loops() {
        let wandering = Generator::new(GeneratorConfig {
            halt_probability: 0.0,
            change_state_probability: 1.0,
            ..GeneratorConfig::default()
        })
        .unwrap();

        let machine = wandering.generate(6, &mut seeded()).unwrap();

        assert!(machine.rules.iter().all(|r| !r.is_self_loop()));
        assert!(machine.rules.iter().all(|r| r.next_state.as_str() != "5"));
    }

    #[test]
    fn test_invalid_config() {
        let too_likely = GeneratorConfig {
            halt_probability: 1.5,
            ..GeneratorConfig::default()
        };
        let overfull = GeneratorConfig {
            left_probability: 0.7,
            right_probability: 0.7,
            ..GeneratorConfig::default()
        };

        assert!(Generator::new(too_likely).is_err());
        assert!(Generator::new(overfull).is_err());
    }

    #[test]
    fn test_optimized_gives_every_state_a_halt_chance() {
        let eager = Generator::new(GeneratorConfig {
            halt_probability: 0.0,
            first_halt_probability: 1.0,
            ..GeneratorConfig::default()
        })
        .unwrap();

        let machine = eager.generate_optimized(4, &mut seeded()).unwrap();

        // The first rule of each state halts, the second one never does.
        for pair in machine.rules.chunks(2) {
            assert_eq!(pair[0].next_state.as_str(), "3");
            assert_ne!(pair[1].next_state.as_str(), "3");
        }
    }

    #[test]
    fn test_generate_many_numbers_names() {
        let machines = Generator::default().generate_many(3, 3, &mut seeded()).unwrap();

        let names: Vec<&str> = machines.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Busy Beaver 3 states (generated) #1",
                "Busy Beaver 3 states (generated) #2",
                "Busy Beaver 3 states (generated) #3",
            ]
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: GeneratorConfig = serde_json::from_str(r#"{ "haltProbability": 0.1 }"#).unwrap();

        assert_eq!(config.halt_probability, 0.1);
        assert_eq!(config.left_probability, 0.4);
    }
}
