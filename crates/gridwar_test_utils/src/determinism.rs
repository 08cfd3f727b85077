//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Every server (and every replay) must arrive at the same state from the
//! same snapshot and the same message batches. Sources of non-determinism
//! include:
//!
//! - **Floating-point math**: pixel targets and overlays use
//!   [`gridwar_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Every table in the store is ordered by entity id.
//!
//! - **Batch order**: messages are processed in arrival order and records
//!   in array order, never re-sorted.
//!
//! A script is a list of batches; batch `n` is fed to tick `n`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use gridwar_core::protocol::InboundMessage;
use gridwar_core::simulation::Simulation;

/// Message batches, one per tick.
pub type Script = Vec<Vec<InboundMessage>>;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a script against a fresh simulation from `setup`.
pub fn run_script<F>(setup: F, script: &[Vec<InboundMessage>]) -> Simulation
where
    F: Fn() -> Simulation,
{
    let mut sim = setup();
    for batch in script {
        sim.tick(batch);
    }
    sim
}

/// Run a script `runs` times and compare the final state hashes.
pub fn verify_script_determinism<F>(
    runs: usize,
    setup: F,
    script: &[Vec<InboundMessage>],
) -> DeterminismResult
where
    F: Fn() -> Simulation,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| run_script(&setup, script).state_hash())
        .collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: script.len() as u64,
    }
}

/// Run the same script on `num_sims` scoped threads.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_scripts_scoped<F>(
    setup: F,
    script: &[Vec<InboundMessage>],
    num_sims: usize,
) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| s.spawn(|| run_script(&setup, script).state_hash()))
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: script.len() as u64,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// Returns `None` if the runs agree throughout, `Some(tick)` for the first
/// tick after which their hashes differ (0 for the initial state).
pub fn find_first_divergence<F>(setup: F, script: &[Vec<InboundMessage>]) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup();
    let mut sim2 = setup();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for (tick, batch) in (1u64..).zip(script) {
        sim1.tick(batch);
        sim2.tick(batch);

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that snapshotting mid-script and resuming from the snapshot
/// ends in the same state as an uninterrupted run.
pub fn verify_snapshot_resume<F>(setup: F, script: &[Vec<InboundMessage>], split: usize) -> bool
where
    F: Fn() -> Simulation,
{
    let split = split.min(script.len());
    let uninterrupted = run_script(&setup, script).state_hash();

    let first_half = run_script(&setup, &script[..split]);
    let Ok(bytes) = first_half.serialize() else {
        return false;
    };
    let Ok(mut resumed) = Simulation::deserialize(&bytes) else {
        return false;
    };
    for batch in &script[split..] {
        resumed.tick(batch);
    }

    resumed.state_hash() == uninterrupted
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for command scripts.
///
/// Generated records deliberately include the junk a hostile or buggy
/// client would send: unknown directions, foreign unit ids, missing
/// fields and wrong types.
pub mod strategies {
    use gridwar_core::components::EntityId;
    use gridwar_core::protocol::InboundMessage;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Direction strings, valid and not.
    pub fn arb_direction() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => prop::sample::select(vec!["N", "S", "E", "W", "north", "South"])
                .prop_map(String::from),
            1 => "[a-z]{0,6}",
        ]
    }

    /// Unit ids drawn from `ids` plus a few that do not exist.
    pub fn arb_unit_id(ids: Vec<EntityId>) -> impl Strategy<Value = EntityId> + Clone {
        prop_oneof![
            4 => prop::sample::select(ids),
            1 => 900u64..910,
        ]
    }

    /// One command record of any kind, referencing units in `ids`.
    pub fn arb_command_record(ids: Vec<EntityId>) -> impl Strategy<Value = Value> {
        let unit = arb_unit_id(ids);
        prop_oneof![
            (unit.clone(), arb_direction())
                .prop_map(|(unit, dir)| json!({"command": "MOVE", "unit": unit, "dir": dir})),
            prop::sample::select(vec!["worker", "scout", "tank", "dragon"])
                .prop_map(|t| json!({"command": "CREATE", "type": t})),
            ("[A-Za-z]{1,8}", proptest::option::of(unit.clone())).prop_map(|(name, unit)| {
                match unit {
                    Some(unit) => json!({"command": "IDENTIFY", "name": name, "unit": unit}),
                    None => json!({"command": "IDENTIFY", "name": name}),
                }
            }),
            (unit.clone(), -3i32..4, -3i32..4).prop_map(
                |(unit, dx, dy)| json!({"command": "SHOOT", "unit": unit, "dx": dx, "dy": dy})
            ),
            (unit.clone(), unit.clone()).prop_map(
                |(unit, target)| json!({"command": "MELEE", "unit": unit, "target": target})
            ),
            (unit.clone(), arb_direction())
                .prop_map(|(unit, dir)| json!({"command": "GATHER", "unit": unit, "dir": dir})),
            unit.prop_map(|unit| json!({"unit": unit})),
            Just(json!({"command": "MOVE", "unit": "seven", "dir": "N"})),
        ]
    }

    /// A message from one of `players`.
    pub fn arb_message(
        players: Vec<&'static str>,
        ids: Vec<EntityId>,
    ) -> impl Strategy<Value = InboundMessage> {
        (
            prop::sample::select(players),
            proptest::collection::vec(arb_command_record(ids), 0..6),
        )
            .prop_map(|(player, commands)| InboundMessage::new(player, commands))
    }

    /// A script of up to `max_ticks` batches.
    pub fn arb_script(
        players: Vec<&'static str>,
        ids: Vec<EntityId>,
        max_ticks: usize,
    ) -> impl Strategy<Value = Vec<Vec<InboundMessage>>> {
        proptest::collection::vec(
            proptest::collection::vec(arb_message(players, ids), 0..3),
            1..max_ticks,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{cmd, message, Skirmish};
    use proptest::prelude::*;

    fn skirmish() -> Simulation {
        Skirmish::new().sim
    }

    fn sample_script() -> Script {
        let s = Skirmish::new();
        vec![
            vec![message(
                "P1",
                vec![
                    cmd::gather(s.p1_worker, "E"),
                    cmd::move_unit(s.p1_soldier, "N"),
                ],
            )],
            vec![],
            vec![
                message("P2", vec![cmd::create("tank"), cmd::shoot(s.p2_soldier, 1, 1)]),
                message("P1", vec![cmd::identify("Alpha", None)]),
            ],
        ]
    }

    #[test]
    fn test_script_is_deterministic() {
        verify_script_determinism(3, skirmish, &sample_script()).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(skirmish, &sample_script()), None);
    }

    #[test]
    fn test_parallel_runs_agree() {
        let result = run_parallel_scripts_scoped(skirmish, &sample_script(), 4);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_snapshot_resume_matches() {
        let script = sample_script();
        for split in 0..=script.len() {
            assert!(verify_snapshot_resume(skirmish, &script, split));
        }
    }

    #[test]
    fn test_different_scripts_differ() {
        let a = run_script(skirmish, &sample_script()).state_hash();
        let b = run_script(skirmish, &[]).state_hash();
        assert_ne!(a, b);
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u8, "x")), compute_hash(&(1u8, "x")));
    }

    proptest! {
        /// Arbitrary junk from both players replays identically.
        #[test]
        fn prop_random_scripts_are_deterministic(
            script in strategies::arb_script(vec!["P1", "P2", "P3"], (1..=7).collect(), 8),
        ) {
            let result = verify_script_determinism(2, skirmish, &script);
            prop_assert!(result.is_deterministic);
        }

        /// Snapshots taken anywhere resume to the same state.
        #[test]
        fn prop_snapshot_resume(
            script in strategies::arb_script(vec!["P1", "P2"], (1..=7).collect(), 6),
            split in 0usize..6,
        ) {
            prop_assert!(verify_snapshot_resume(skirmish, &script, split));
        }
    }
}
