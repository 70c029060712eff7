//! This module provides the `Scheduler`, which runs an `Engine` continuously at a chosen
//! speed. Steps are executed in batches sized by speed tier; between batches the scheduler
//! yields back to the tokio runtime, and at low speeds it sleeps after every step.

use crate::machine::{Engine, MachineConfiguration};
use crate::types::{
    BusyBeaverError, Halt, State, Step, Transition, TuringMachine, MAX_EXECUTION_STEPS,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// Steps per batch for every speed at or above `min_speed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedTier {
    pub min_speed: f64,
    pub batch: u64,
}

impl SpeedTier {
    pub const fn new(min_speed: f64, batch: u64) -> Self {
        Self { min_speed, batch }
    }
}

/// Runtime knobs of the scheduler.
///
/// Every field is optional in JSON; missing fields take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Batch sizes by speed. The tier with the highest `min_speed` not above the current
    /// speed wins.
    pub tiers: Vec<SpeedTier>,
    /// Speeds below this run one step at a time with a real delay between steps.
    pub realtime_below: f64,
    /// Lower bound for the delay between real-time steps.
    pub min_delay_ms: u64,
    /// The slowest accepted speed. Invalid speeds are clamped to it.
    pub min_speed: f64,
    /// The speed a new scheduler starts with.
    pub initial_speed: f64,
    /// Steps a single `run` may execute before it is forced to stop.
    pub max_steps: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                SpeedTier::new(50_000.0, 25_000),
                SpeedTier::new(25_000.0, 10_000),
                SpeedTier::new(10_000.0, 5_000),
                SpeedTier::new(1_000.0, 1_000),
                SpeedTier::new(50.0, 100),
                SpeedTier::new(10.0, 10),
            ],
            realtime_below: 10.0,
            min_delay_ms: 1,
            min_speed: 0.1,
            initial_speed: 1.0,
            max_steps: MAX_EXECUTION_STEPS,
        }
    }
}

impl SchedulerConfig {
    /// Parses a configuration from JSON, filling in defaults for missing fields.
    pub fn from_json(json: &str) -> Result<Self, BusyBeaverError> {
        let config: SchedulerConfig = serde_json::from_str(json)?;

        if !config.min_speed.is_finite() || config.min_speed <= 0.0 {
            return Err(BusyBeaverError::Validation(format!(
                "minSpeed must be a positive number, got {}",
                config.min_speed
            )));
        }

        Ok(config)
    }

    fn clamp_speed(&self, speed: f64) -> f64 {
        if speed.is_finite() && speed >= self.min_speed {
            speed
        } else {
            warn!(speed, min_speed = self.min_speed, "speed out of range, clamping");
            self.min_speed
        }
    }
}

/// How much work the scheduler does before handing control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Execute up to this many steps, then yield.
    Batch(u64),
    /// Execute one step, then sleep.
    Realtime(Duration),
}

impl Pace {
    /// Picks the pace for `speed` steps per second.
    pub fn for_speed(speed: f64, config: &SchedulerConfig) -> Self {
        if speed < config.realtime_below {
            let millis = (1000.0 / speed).max(config.min_delay_ms as f64);
            let delay = Duration::try_from_secs_f64(millis / 1000.0)
                .unwrap_or(Duration::from_millis(config.min_delay_ms));
            return Pace::Realtime(delay);
        }

        let batch = config
            .tiers
            .iter()
            .filter(|tier| speed >= tier.min_speed)
            .max_by(|a, b| a.min_speed.total_cmp(&b.min_speed))
            .map_or(1, |tier| tier.batch.max(1));

        Pace::Batch(batch)
    }

    /// The number of steps in one quantum.
    pub fn steps(&self) -> u64 {
        match self {
            Pace::Batch(batch) => *batch,
            Pace::Realtime(_) => 1,
        }
    }
}

/// Whether a run loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Stopped,
    Running,
}

/// How a call to [`Scheduler::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The machine halted.
    Halted(Halt),
    /// The run was stopped, reset or superseded by another run.
    Stopped,
    /// The step ceiling was reached. The machine is not halted.
    ForcedStop { steps: u64 },
    /// Another run is already in progress.
    AlreadyRunning,
}

/// A summary published to subscribers after every batch and command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub step_count: u64,
    pub state: State,
    pub head: i64,
    pub score: usize,
    pub is_halted: bool,
    pub status: Status,
}

#[derive(Debug)]
struct Shared {
    engine: Engine,
    status: Status,
    speed: f64,
    run_id: u64,
}

impl Shared {
    fn progress(&self) -> Progress {
        let config = self.engine.configuration();
        Progress {
            step_count: config.step_count,
            state: config.current_state.clone(),
            head: config.head_position,
            score: config.score(),
            is_halted: config.is_halted,
            status: self.status,
        }
    }
}

enum Quantum {
    Done(Pace),
    Halted(Halt),
    Ceiling,
    Cancelled,
}

/// A cloneable handle that drives a shared engine.
///
/// All clones control the same engine. The engine lock is held for one batch or one
/// command at a time and never across an await point.
#[derive(Debug, Clone)]
pub struct Scheduler {
    shared: Arc<Mutex<Shared>>,
    config: Arc<SchedulerConfig>,
    progress: Arc<watch::Sender<Progress>>,
    /// Bumped by every `stop`, so a sleeping run loop wakes up early.
    stops: Arc<watch::Sender<u64>>,
}

/// Marks a run as stopped if its future is dropped before the loop exits.
struct RunGuard<'a> {
    scheduler: &'a Scheduler,
    run_id: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let abandoned = self.scheduler.with(|shared| {
            let abandoned = shared.run_id == self.run_id && shared.status == Status::Running;
            if abandoned {
                shared.status = Status::Stopped;
            }
            abandoned
        });

        if abandoned {
            debug!(run_id = self.run_id, "run dropped before finishing");
            self.scheduler.publish();
        }
    }
}

impl Scheduler {
    /// Creates a stopped scheduler for `machine` with the default configuration.
    pub fn new(machine: TuringMachine) -> Self {
        Self::with_config(machine, SchedulerConfig::default())
    }

    /// Creates a stopped scheduler for `machine`, paced by `config`.
    ///
    /// The initial speed is clamped like any other speed.
    pub fn with_config(machine: TuringMachine, config: SchedulerConfig) -> Self {
        let shared = Shared {
            engine: Engine::new(machine),
            status: Status::Stopped,
            speed: config.clamp_speed(config.initial_speed),
            run_id: 0,
        };
        let (progress, _) = watch::channel(shared.progress());
        let (stops, _) = watch::channel(0);

        Self {
            shared: Arc::new(Mutex::new(shared)),
            config: Arc::new(config),
            progress: Arc::new(progress),
            stops: Arc::new(stops),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut shared)
    }

    fn publish(&self) {
        let progress = self.with(|shared| shared.progress());
        self.progress.send_replace(progress);
    }

    /// Runs the machine until it halts, is stopped, or hits the step ceiling.
    ///
    /// # Returns
    ///
    /// * `RunOutcome::AlreadyRunning` immediately if a run is in progress.
    /// * `RunOutcome::Halted` once the engine halts.
    /// * `RunOutcome::Stopped` if `stop`, `reset`, `load` or a newer run ended this one.
    /// * `RunOutcome::ForcedStop` after `max_steps` steps without halting.
    ///
    /// Dropping the returned future before it completes stops the run.
    pub async fn run(&self) -> RunOutcome {
        // Subscribed before starting, so any later `stop` counts as a change.
        let mut stops = self.stops.subscribe();

        let started = self.with(|shared| {
            if shared.status == Status::Running {
                return None;
            }
            shared.status = Status::Running;
            shared.run_id += 1;
            Some((shared.run_id, shared.speed))
        });

        let Some((run_id, speed)) = started else {
            return RunOutcome::AlreadyRunning;
        };
        let _guard = RunGuard {
            scheduler: self,
            run_id,
        };

        debug!(run_id, speed, "run started");
        self.publish();

        let max_steps = self.config.max_steps;
        let mut executed: u64 = 0;

        loop {
            let quantum = self.with(|shared| {
                if shared.status != Status::Running || shared.run_id != run_id {
                    return Quantum::Cancelled;
                }

                let pace = Pace::for_speed(shared.speed, &self.config);

                for _ in 0..pace.steps() {
                    if executed >= max_steps {
                        shared.status = Status::Stopped;
                        return Quantum::Ceiling;
                    }

                    match shared.engine.step() {
                        Step::Continue => executed += 1,
                        Step::Halt(halt) => {
                            shared.status = Status::Stopped;
                            return Quantum::Halted(halt);
                        }
                    }
                }

                Quantum::Done(pace)
            });

            match quantum {
                Quantum::Done(pace) => {
                    trace!(run_id, executed, ?pace, "batch complete");
                    self.publish();

                    match pace {
                        Pace::Batch(_) => tokio::task::yield_now().await,
                        Pace::Realtime(delay) => {
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = stops.changed() => {}
                            }
                        }
                    }
                }
                Quantum::Halted(halt) => {
                    debug!(run_id, state = %halt.state(), "run finished, machine halted");
                    self.publish();
                    return RunOutcome::Halted(halt);
                }
                Quantum::Ceiling => {
                    warn!(run_id, steps = executed, "step ceiling reached, forcing stop");
                    self.publish();
                    return RunOutcome::ForcedStop { steps: executed };
                }
                Quantum::Cancelled => {
                    debug!(run_id, executed, "run cancelled");
                    return RunOutcome::Stopped;
                }
            }
        }
    }

    /// Stops the active run before its next batch. The configuration is left as of the
    /// last completed step.
    pub fn stop(&self) {
        let stopped = self.with(|shared| {
            let was_running = shared.status == Status::Running;
            shared.status = Status::Stopped;
            was_running
        });
        self.stops.send_modify(|count| *count += 1);

        if stopped {
            debug!("run stopped");
        }
        self.publish();
    }

    /// Stops and returns the engine to the initial configuration.
    pub fn reset(&self) {
        self.stop();
        self.with(|shared| shared.engine.reset());
        debug!("scheduler reset");
        self.publish();
    }

    /// Stops and replaces the machine.
    pub fn load(&self, machine: TuringMachine) {
        self.stop();
        self.with(|shared| shared.engine.load(machine));
        self.publish();
    }

    /// Replaces the rules of the current machine. A running loop picks them up at its next
    /// batch.
    pub fn update_rules(&self, rules: Vec<Transition>) {
        self.with(|shared| shared.engine.update_rules(rules));
        self.publish();
    }

    /// Executes a single step outside of any run loop.
    pub fn step(&self) -> Step {
        let step = self.with(|shared| shared.engine.step());
        self.publish();
        step
    }

    /// Sets the speed in steps per second, effective from the next batch.
    pub fn set_speed(&self, speed: f64) {
        let speed = self.config.clamp_speed(speed);
        self.with(|shared| shared.speed = speed);
    }

    pub fn speed(&self) -> f64 {
        self.with(|shared| shared.speed)
    }

    pub fn status(&self) -> Status {
        self.with(|shared| shared.status)
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    /// Returns a copy of the engine's configuration.
    pub fn snapshot(&self) -> MachineConfiguration {
        self.with(|shared| shared.engine.snapshot())
    }

    pub fn machine(&self) -> TuringMachine {
        self.with(|shared| shared.engine.machine().clone())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Subscribes to progress updates. The receiver always holds the latest value.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }
}
