//! Property tests over arbitrary, mostly hostile, command batches.

use gridwar_core::components::{EntityId, Label, Position, Resource, ResourceCarrier, Unit};
use gridwar_core::config::SimulationConfig;
use gridwar_core::simulation::Simulation;
use gridwar_core::world::ComponentSet;
use gridwar_test_utils::determinism::strategies::{arb_message, arb_script};
use gridwar_test_utils::fixtures::Skirmish;
use gridwar_test_utils::proptest::prelude::*;

type Row = (
    Option<ComponentSet>,
    Option<Unit>,
    Option<Position>,
    Option<Label>,
    Option<ResourceCarrier>,
);

fn row(sim: &Simulation, id: EntityId) -> Row {
    let world = sim.world();
    (
        world.signature(id),
        world.get::<Unit>(id).copied(),
        world.get::<Position>(id).copied(),
        world.get::<Label>(id).cloned(),
        world.get::<ResourceCarrier>(id).copied(),
    )
}

fn strict_skirmish() -> (Skirmish, Vec<EntityId>) {
    let mut s = Skirmish::new();
    s.sim = s.sim.with_config(SimulationConfig {
        identify_requires_ownership: true,
        ..SimulationConfig::default()
    });
    let p1 = vec![s.p1_base, s.p1_worker, s.p1_soldier];
    (s, p1)
}

proptest! {
    /// Nothing another player sends touches P1's entities.
    #[test]
    fn prop_intruders_cannot_touch_p1(
        script in arb_script(vec!["P2", "P3"], (1..=7).collect(), 6),
    ) {
        let (mut s, p1) = strict_skirmish();
        let before: Vec<Row> = p1.iter().map(|&id| row(&s.sim, id)).collect();

        for batch in &script {
            s.sim.tick(batch);
        }

        let after: Vec<Row> = p1.iter().map(|&id| row(&s.sim, id)).collect();
        prop_assert_eq!(before, after);
        prop_assert!(s.sim.world().contains(s.deposit));
    }

    /// Every record yields exactly one report, in order.
    #[test]
    fn prop_one_report_per_record(
        batch in proptest::collection::vec(arb_message(vec!["P1", "P2"], (1..=7).collect()), 0..4),
    ) {
        let mut s = Skirmish::new();
        let events = s.sim.tick(&batch);

        let expected: Vec<(&str, usize)> = batch
            .iter()
            .flat_map(|m| (0..m.commands.len()).map(move |i| (m.connection_id.as_str(), i)))
            .collect();
        let reported: Vec<(&str, usize)> = events
            .reports
            .iter()
            .map(|r| (r.player.as_str(), r.index))
            .collect();
        prop_assert_eq!(expected, reported);
    }

    /// Deposits only shrink, and a removed deposit stays removed.
    #[test]
    fn prop_deposits_never_grow(
        script in arb_script(vec!["P1", "P2"], (1..=7).collect(), 8),
    ) {
        let mut s = Skirmish::new();
        let mut last = s.sim.world().get::<Resource>(s.deposit).map(|r| r.total);

        for batch in &script {
            s.sim.tick(batch);
            let now = s.sim.world().get::<Resource>(s.deposit).map(|r| r.total);
            prop_assert!(last.is_some() || now.is_none(), "deposit reappeared");
            if let (Some(before), Some(after)) = (last, now) {
                prop_assert!(after <= before);
            }
            last = now;
        }
    }
}
