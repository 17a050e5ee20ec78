//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the combat engine
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A fight must replay exactly from a seed and a command script, or
//! snapshots, balance batches and bug reports are worthless.
//! Sources of non-determinism include:
//!
//! - **Unseeded randomness**: every roll goes through the engine's seeded
//!   [`mud_core::rng::GameRng`].
//!
//! - **`HashMap` iteration order**: the world and wait-list use ordered
//!   maps and the roster keeps insertion order.
//!
//! - **Hooks**: registered hooks are not part of a snapshot and must be
//!   re-registered after a restore.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual rules (hit, damage, death, bash)
//! 2. **Property tests**: random command scripts still replay exactly
//! 3. **Integration tests**: whole fights are reproducible
//! 4. **Parallel tests**: N engines on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use mud_core::commands::CombatCommand;
use mud_core::engine::CombatEngine;
use mud_core::ids::CharId;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of pulses simulated.
    pub pulses: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs agreed, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Combat is non-deterministic!\n\
                 Runs: {}\n\
                 Pulses: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.pulses,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel engine runs.
#[derive(Debug, Clone)]
pub struct ParallelRunResult {
    /// Final state hash from each engine.
    pub hashes: Vec<u64>,
    /// Number of pulses each engine ran.
    pub pulses: u64,
    /// Number of engines run.
    pub num_runs: usize,
}

impl ParallelRunResult {
    /// Check if all engines produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all engines matched.
    ///
    /// # Panics
    ///
    /// Panics if engines produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel fights diverged!\n\
                 Engines: {}\n\
                 Pulses: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_runs,
                self.pulses,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// A command issued by one character at one pulse of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCommand {
    /// Pulse the command is issued before.
    pub at_pulse: u64,
    /// Issuer.
    pub actor: CharId,
    /// The command.
    pub command: CombatCommand,
}

/// Run a state multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `pulses` - Number of pulses per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one pulse
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use mud_test_utils::determinism::verify_determinism;
/// use mud_test_utils::fixtures::duel;
///
/// let result = verify_determinism(
///     3,
///     100,
///     || duel(42).0,
///     |engine| { engine.pulse(); },
///     |engine| engine.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    pulses: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..pulses {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        pulses,
    }
}

/// Run an engine twice with identical setup and compare final hashes.
pub fn verify_engine_determinism<F>(setup_fn: F, num_pulses: u64) -> bool
where
    F: Fn() -> CombatEngine,
{
    verify_determinism(
        2,
        num_pulses,
        &setup_fn,
        |engine| {
            engine.pulse();
        },
        CombatEngine::state_hash,
    )
    .is_deterministic
}

/// Advance `engine` by `num_pulses`, issuing scripted commands as their
/// pulse comes up. Rejected commands are part of the replay too.
pub fn run_script(engine: &mut CombatEngine, script: &[ScriptedCommand], num_pulses: u64) {
    for pulse in 0..num_pulses {
        for scripted in script.iter().filter(|s| s.at_pulse == pulse) {
            if let Err(e) = engine.execute(scripted.actor, scripted.command.clone()) {
                tracing::trace!(actor = %scripted.actor, error = %e, "Scripted command failed");
            }
        }
        engine.pulse();
    }
}

/// Run N engines on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_engines_scoped<F>(setup_fn: F, num_runs: usize, num_pulses: u64) -> ParallelRunResult
where
    F: Fn() -> CombatEngine + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_runs)
            .map(|_| {
                s.spawn(|| {
                    let mut engine = setup_fn();
                    for _ in 0..num_pulses {
                        engine.pulse();
                    }
                    engine.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("engine thread panicked"))
            .collect()
    });

    ParallelRunResult {
        hashes,
        pulses: num_pulses,
        num_runs,
    }
}

/// Compare two engine runs pulse by pulse, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(pulse)` if they diverge at that pulse.
pub fn find_first_divergence<F>(setup_fn: F, num_pulses: u64) -> Option<u64>
where
    F: Fn() -> CombatEngine,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for pulse in 1..=num_pulses {
        a.pulse();
        b.pulse();

        if a.state_hash() != b.state_hash() {
            return Some(pulse);
        }
    }

    None
}

/// Verify that a snapshot round-trip preserves engine state exactly, and
/// that the restored engine keeps fighting exactly like the engine it was taken from.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_pulses: u64) -> bool
where
    F: Fn() -> CombatEngine,
{
    let mut engine = setup_fn();

    for _ in 0..num_pulses {
        engine.pulse();
    }

    let Ok(bytes) = engine.serialize() else {
        return false;
    };
    let Ok(mut restored) = CombatEngine::deserialize(&bytes) else {
        return false;
    };

    if engine.state_hash() != restored.state_hash() {
        return false;
    }

    for _ in 0..num_pulses {
        engine.pulse();
        restored.pulse();
    }

    engine.state_hash() == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use mud_core::commands::{CombatCommand, Target};
    use mud_core::ids::CharId;
    use mud_core::position::Position;
    use proptest::prelude::*;

    use super::ScriptedCommand;

    /// A target among `ids`, by id or not at all.
    pub fn arb_target(ids: Vec<CharId>) -> BoxedStrategy<Target> {
        prop_oneof![
            1 => Just(Target::None),
            4 => proptest::sample::select(ids).prop_map(Target::Character),
        ]
        .boxed()
    }

    /// Postures a player may ask for.
    pub fn arb_posture() -> impl Strategy<Value = Position> {
        prop_oneof![
            Just(Position::Standing),
            Just(Position::Sitting),
            Just(Position::Resting),
            Just(Position::Sleeping),
        ]
    }

    /// Any ordinary melee command aimed at one of `ids`.
    pub fn arb_command(ids: Vec<CharId>) -> impl Strategy<Value = CombatCommand> {
        let target = arb_target(ids);
        prop_oneof![
            4 => target.clone().prop_map(CombatCommand::Hit),
            1 => target.clone().prop_map(CombatCommand::Kick),
            1 => target.clone().prop_map(CombatCommand::Swing),
            1 => target.clone().prop_map(CombatCommand::Rescue),
            1 => target.clone().prop_map(|t| CombatCommand::Bash { target: t, door: None }),
            1 => target.prop_map(CombatCommand::Assist),
            1 => Just(CombatCommand::Flee),
            1 => Just(CombatCommand::Disengage),
            1 => Just(CombatCommand::TwoHand),
            1 => arb_posture().prop_map(CombatCommand::Posture),
        ]
    }

    /// A script of up to `max_len` commands issued by `ids` against each
    /// other within the first `horizon` pulses.
    pub fn arb_script(
        ids: Vec<CharId>,
        max_len: usize,
        horizon: u64,
    ) -> impl Strategy<Value = Vec<ScriptedCommand>> {
        let one = (
            0..horizon.max(1),
            proptest::sample::select(ids.clone()),
            arb_command(ids),
        )
            .prop_map(|(at_pulse, actor, command)| ScriptedCommand {
                at_pulse,
                actor,
                command,
            });
        proptest::collection::vec(one, 0..max_len)
    }

    /// Vitality values (1-500).
    pub fn arb_vitality() -> impl Strategy<Value = i32> {
        1i32..500i32
    }

    /// Raw damage values, including ones past the per-call ceiling.
    pub fn arb_damage() -> impl Strategy<Value = i32> {
        0i32..1000i32
    }

    /// Character levels.
    pub fn arb_level() -> impl Strategy<Value = i32> {
        1i32..40i32
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{brawl, duel};
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_identical() {
        let result = verify_determinism(3, 10, || 0u64, |s| *s += 1, |s| *s);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![10, 10, 10]);
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_verify_determinism_detects_drift() {
        use std::cell::Cell;
        let counter = Cell::new(0u64);
        let result = verify_determinism(
            3,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |s| *s,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 3);
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&"orc"), compute_hash(&"orc"));
        assert_ne!(compute_hash(&1u32), compute_hash(&2u32));
    }

    #[test]
    fn test_duel_determinism() {
        assert!(verify_engine_determinism(|| duel(42).0, 300));
    }

    #[test]
    fn test_brawl_determinism() {
        let result = verify_determinism(
            4,
            400,
            || brawl(7, 3, 4).0,
            |engine| {
                engine.pulse();
            },
            CombatEngine::state_hash,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = duel(1).0;
        let mut b = duel(2).0;
        for _ in 0..200 {
            a.pulse();
            b.pulse();
        }
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(|| brawl(9, 2, 2).0, 200), None);
    }

    #[test]
    fn test_parallel_engines_agree() {
        run_parallel_engines_scoped(|| brawl(11, 3, 3).0, 4, 200).assert_deterministic();
    }

    #[test]
    fn test_snapshot_mid_fight() {
        assert!(verify_serialization_determinism(|| duel(5).0, 150));
    }

    #[test]
    fn test_scripted_fight_replays() {
        let script = vec![
            ScriptedCommand {
                at_pulse: 3,
                actor: CharId(1),
                command: CombatCommand::Kick(mud_core::commands::Target::None),
            },
            ScriptedCommand {
                at_pulse: 20,
                actor: CharId(1),
                command: CombatCommand::Flee,
            },
        ];
        let run = || {
            let mut engine = duel(13).0;
            run_script(&mut engine, &script, 100);
            engine.state_hash()
        };
        assert_eq!(run(), run());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_random_scripts_replay(
            seed in any::<u64>(),
            script in arb_script(vec![CharId(1), CharId(2), CharId(3), CharId(4)], 12, 60),
        ) {
            let run = || {
                let mut engine = brawl(seed, 2, 2).0;
                run_script(&mut engine, &script, 80);
                engine
            };
            let a = run();
            let b = run();
            prop_assert_eq!(a.state_hash(), b.state_hash());
            prop_assert!(a.roster_invariant_holds());
        }
    }
}
