//! Test fixtures and helpers.
//!
//! Pre-built game states and entity configurations
//! for consistent testing.

use fixed::types::I32F32;
use gridwar_core::components::{
    Attack, Base, EntityId, Label, PlayerId, PlayerOwned, Position, ResourceCarrier, Unit,
    UnitStatus,
};
use gridwar_core::map::{CellType, MapInfo};
use gridwar_core::protocol::InboundMessage;
use gridwar_core::simulation::Simulation;
use serde_json::Value;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Builder for a populated [`Simulation`].
///
/// ```
/// use gridwar_test_utils::fixtures::Scenario;
///
/// let mut scenario = Scenario::new(8, 8).player("P1");
/// let worker = scenario.worker("P1", 2, 2);
/// let sim = scenario.build();
/// assert!(sim.world().contains(worker));
/// ```
#[derive(Debug, Clone)]
pub struct Scenario {
    sim: Simulation,
}

impl Scenario {
    /// An open `width` x `height` map with no players.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            sim: Simulation::new(MapInfo::new(width, height)),
        }
    }

    /// A map from ASCII rows (`#` blocked, `.` open).
    ///
    /// # Panics
    ///
    /// Panics if the layout is invalid.
    #[must_use]
    pub fn from_ascii(layout: &str) -> Self {
        let map = MapInfo::from_ascii(layout).expect("fixture map layout is valid");
        Self {
            sim: Simulation::new(map),
        }
    }

    /// Register a connected player.
    #[must_use]
    pub fn player(mut self, id: &str) -> Self {
        self.sim.register_player(PlayerId::new(id));
        self
    }

    /// Block a tile.
    #[must_use]
    pub fn block(mut self, x: i32, y: i32) -> Self {
        self.sim.map_mut().set_cell(x, y, CellType::Blocked);
        self
    }

    /// Spawn a unit with just {Unit, Position, PlayerOwned}.
    pub fn unit(&mut self, owner: &str, x: i32, y: i32) -> EntityId {
        self.sim
            .world_mut()
            .spawn()
            .with(Unit::new())
            .with(Position::new(x, y))
            .with(PlayerOwned::new(owner))
            .id()
    }

    /// Spawn a harvester with an empty carrier.
    pub fn worker(&mut self, owner: &str, x: i32, y: i32) -> EntityId {
        let id = self.unit(owner, x, y);
        self.attach(id, ResourceCarrier::empty());
        self.attach(id, Label::new("worker"));
        id
    }

    /// Spawn a unit able to SHOOT and MELEE.
    pub fn soldier(&mut self, owner: &str, x: i32, y: i32) -> EntityId {
        let id = self.unit(owner, x, y);
        self.attach(id, Attack);
        self.attach(id, Label::new("soldier"));
        id
    }

    /// Spawn a player's base.
    pub fn base(&mut self, owner: &str, x: i32, y: i32) -> EntityId {
        let id = self.unit(owner, x, y);
        self.attach(id, Base);
        self.attach(id, Label::new("base"));
        id
    }

    /// Spawn a resource deposit.
    ///
    /// # Panics
    ///
    /// Panics if the tile cannot hold a resource.
    pub fn resource(&mut self, x: i32, y: i32, value: i32, total: i32) -> EntityId {
        self.sim
            .place_resource(x, y, value, total)
            .expect("fixture resource tile is free")
    }

    /// Force a unit's status.
    ///
    /// # Panics
    ///
    /// Panics if the entity has no [`Unit`].
    pub fn set_status(&mut self, id: EntityId, status: UnitStatus) {
        self.sim
            .world_mut()
            .get_mut::<Unit>(id)
            .expect("fixture entity is a unit")
            .status = status;
    }

    /// Attach any component.
    ///
    /// # Panics
    ///
    /// Panics if the entity does not exist.
    pub fn attach<C: gridwar_core::world::Component>(&mut self, id: EntityId, component: C) {
        self.sim
            .world_mut()
            .add_component(id, component)
            .expect("fixture entity exists");
    }

    /// The simulation being built.
    pub fn sim(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Simulation {
        self.sim
    }
}

/// The standard two-player setup used across integration tests.
///
/// P1 owns a base at (1,1), a worker at (3,3) next to a 5/5 deposit at
/// (4,3), and a soldier at (5,5). P2 owns a base at (8,8) and a soldier at
/// (6,6). The map is 10x10 and open.
#[derive(Debug, Clone)]
pub struct Skirmish {
    /// The simulation.
    pub sim: Simulation,
    /// P1's base.
    pub p1_base: EntityId,
    /// P1's worker.
    pub p1_worker: EntityId,
    /// P1's soldier.
    pub p1_soldier: EntityId,
    /// The deposit east of P1's worker.
    pub deposit: EntityId,
    /// P2's base.
    pub p2_base: EntityId,
    /// P2's soldier.
    pub p2_soldier: EntityId,
}

impl Skirmish {
    /// Build the setup.
    #[must_use]
    pub fn new() -> Self {
        let mut scenario = Scenario::new(10, 10).player("P1").player("P2");
        let p1_base = scenario.base("P1", 1, 1);
        let p1_worker = scenario.worker("P1", 3, 3);
        let deposit = scenario.resource(4, 3, 5, 5);
        let p1_soldier = scenario.soldier("P1", 5, 5);
        let p2_base = scenario.base("P2", 8, 8);
        let p2_soldier = scenario.soldier("P2", 6, 6);
        Self {
            sim: scenario.build(),
            p1_base,
            p1_worker,
            p1_soldier,
            deposit,
            p2_base,
            p2_soldier,
        }
    }
}

impl Default for Skirmish {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap command records into a message from `player`.
#[must_use]
pub fn message(player: &str, commands: Vec<Value>) -> InboundMessage {
    InboundMessage::new(player, commands)
}

/// Command record builders.
pub mod cmd {
    use gridwar_core::components::EntityId;
    use serde_json::{json, Value};

    /// `MOVE`.
    #[must_use]
    pub fn move_unit(unit: EntityId, dir: &str) -> Value {
        json!({"command": "MOVE", "unit": unit, "dir": dir})
    }

    /// `CREATE`.
    #[must_use]
    pub fn create(unit_type: &str) -> Value {
        json!({"command": "CREATE", "type": unit_type})
    }

    /// `IDENTIFY`, renaming a unit or (with `None`) the issuer's base.
    #[must_use]
    pub fn identify(name: &str, unit: Option<EntityId>) -> Value {
        match unit {
            Some(unit) => json!({"command": "IDENTIFY", "name": name, "unit": unit}),
            None => json!({"command": "IDENTIFY", "name": name}),
        }
    }

    /// `SHOOT`.
    #[must_use]
    pub fn shoot(unit: EntityId, dx: i32, dy: i32) -> Value {
        json!({"command": "SHOOT", "unit": unit, "dx": dx, "dy": dy})
    }

    /// `MELEE`.
    #[must_use]
    pub fn melee(unit: EntityId, target: EntityId) -> Value {
        json!({"command": "MELEE", "unit": unit, "target": target})
    }

    /// `GATHER`.
    #[must_use]
    pub fn gather(unit: EntityId, dir: &str) -> Value {
        json!({"command": "GATHER", "unit": unit, "dir": dir})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwar_core::world::ComponentSet;

    #[test]
    fn test_skirmish_layout() {
        let s = Skirmish::new();
        let world = s.sim.world();
        assert!(world
            .signature(s.p1_base)
            .unwrap()
            .contains(ComponentSet::BASE | ComponentSet::LABEL));
        assert!(world.has::<ResourceCarrier>(s.p1_worker));
        assert!(world.has::<Attack>(s.p2_soldier));
        assert_eq!(s.sim.map().resource_at(4, 3), Some(s.deposit));
        assert_eq!(s.sim.fog().len(), 2);
    }

    #[test]
    fn test_cmd_builders() {
        assert_eq!(cmd::move_unit(7, "N")["dir"], "N");
        assert!(cmd::identify("x", None).get("unit").is_none());
        assert_eq!(cmd::shoot(1, 2, 3)["dy"], 3);
    }
}
