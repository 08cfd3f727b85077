//! Core simulation host.
//!
//! [`Simulation`] owns every piece of authoritative state: the entity
//! store, the map, the per-player fog and the data the command stage reads.
//! Each call to [`Simulation::tick`] drains one batch of inbound messages
//! through the command stage and advances the tick counter.
//!
//! # Determinism
//!
//! - No floating-point math (pixel space uses [`Fixed`](crate::math::Fixed))
//! - No system randomness
//! - Every table is ordered, so iteration follows entity id order
//! - Same snapshot plus same message batches always gives the same state
//!
//! # Example
//!
//! ```
//! use gridwar_core::map::MapInfo;
//! use gridwar_core::protocol::InboundMessage;
//! use gridwar_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(MapInfo::new(16, 16));
//! let msg = InboundMessage::from_json(
//!     r#"{"connection_id":"P1","commands":[{"command":"CREATE","type":"worker"}]}"#,
//! )
//! .unwrap();
//!
//! let events = sim.tick(&[msg]);
//! assert_eq!(sim.get_tick(), 1);
//! assert_eq!(events.reports.len(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::commands::{command_system, CommandContext, CommandReport, Effect, Rejection};
use crate::components::{EntityId, Label, PlayerId, Resource};
use crate::config::SimulationConfig;
use crate::data::UnitCatalog;
use crate::error::{GameError, Result};
use crate::fog::{FogOfWar, TileInfo};
use crate::map::MapInfo;
use crate::protocol::InboundMessage;
use crate::world::World;

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// What happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// The tick that was processed.
    pub tick: u64,
    /// One report per command record, in processing order.
    pub reports: Vec<CommandReport>,
}

impl TickEvents {
    /// Effects of the commands that were applied.
    pub fn applied(&self) -> impl Iterator<Item = &Effect> {
        self.reports.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    /// Rejections, recoveries included.
    pub fn rejected(&self) -> impl Iterator<Item = &Rejection> {
        self.reports.iter().filter_map(|r| r.outcome.as_ref().err())
    }

    /// Resource entities removed this tick.
    pub fn depleted(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.applied().filter_map(|effect| match effect {
            Effect::Harvested {
                resource,
                depleted: true,
                ..
            } => Some(*resource),
            _ => None,
        })
    }
}

/// The authoritative game state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Current simulation tick.
    tick: u64,
    world: World,
    map: MapInfo,
    fog: FogOfWar,
    catalog: UnitCatalog,
    config: SimulationConfig,
}

impl Simulation {
    /// Create a simulation on `map` with the default catalog and config.
    #[must_use]
    pub fn new(map: MapInfo) -> Self {
        Self {
            tick: 0,
            world: World::new(),
            map,
            fog: FogOfWar::new(),
            catalog: UnitCatalog::default(),
            config: SimulationConfig::default(),
        }
    }

    /// Replace the unit catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: UnitCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the config.
    #[must_use]
    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// The entity store.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The entity store, mutably. Used for setup and by execution systems.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The map.
    #[must_use]
    pub fn map(&self) -> &MapInfo {
        &self.map
    }

    /// The map, mutably.
    pub fn map_mut(&mut self) -> &mut MapInfo {
        &mut self.map
    }

    /// Per-player fog state.
    #[must_use]
    pub fn fog(&self) -> &FogOfWar {
        &self.fog
    }

    /// Per-player fog state, mutably.
    pub fn fog_mut(&mut self) -> &mut FogOfWar {
        &mut self.fog
    }

    /// The unit catalog.
    #[must_use]
    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// The config.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Register a connected player. Idempotent.
    pub fn register_player(&mut self, player: PlayerId) -> &mut TileInfo {
        self.fog.register_player(player)
    }

    /// Register every sender of `messages` not yet known, returning the
    /// newly registered ids in arrival order.
    pub fn register_senders(&mut self, messages: &[InboundMessage]) -> Vec<PlayerId> {
        let mut added = Vec::new();
        for message in messages {
            if self.fog.tile_info(&message.connection_id).is_none() {
                self.fog.register_player(message.connection_id.clone());
                added.push(message.connection_id.clone());
            }
        }
        added
    }

    /// Forget a disconnected player's fog state. Their entities stay.
    pub fn unregister_player(&mut self, player: &PlayerId) -> Option<TileInfo> {
        self.fog.unregister_player(player)
    }

    /// Spawn a resource deposit and occupy its tile.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidMap`] if the tile is out of bounds,
    /// blocked or already occupied, or if `value` or `total` is not
    /// positive.
    pub fn place_resource(&mut self, x: i32, y: i32, value: i32, total: i32) -> Result<EntityId> {
        if value <= 0 || total <= 0 {
            return Err(GameError::InvalidMap(format!(
                "resource at ({x}, {y}) needs a positive yield and amount, got {value}/{total}"
            )));
        }
        if self.map.is_blocked(x, y) {
            return Err(GameError::InvalidMap(format!(
                "cannot place resource on ({x}, {y})"
            )));
        }
        let id = self
            .world
            .spawn()
            .with(Resource::new(value, total))
            .with(Label::new(format!("{value}/{total}")))
            .id();
        self.map.place_resource(x, y, id);
        Ok(id)
    }

    /// Advance the simulation by one tick, processing `messages` in order.
    pub fn tick(&mut self, messages: &[InboundMessage]) -> TickEvents {
        let tick = self.tick;

        let mut ctx = CommandContext {
            tick,
            map: &mut self.map,
            fog: &mut self.fog,
            catalog: &self.catalog,
            config: &self.config,
        };
        let reports = command_system(&mut self.world, &mut ctx, messages);

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents { tick, reports }
    }

    /// Remove an entity, clearing any map tile it occupies.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] if the entity doesn't exist.
    pub fn despawn_entity(&mut self, id: EntityId) -> Result<()> {
        if !self.world.remove_entity(id) {
            return Err(GameError::EntityNotFound(id));
        }
        let occupied: Vec<_> = self
            .map
            .resource_tiles()
            .filter(|(_, occupant)| *occupant == id)
            .map(|(tile, _)| tile)
            .collect();
        for (x, y) in occupied {
            self.map.remove_resource_at(x, y);
        }
        Ok(())
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes. The
    /// catalog and config are inputs, not state, and are left out.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.world.hash(&mut hasher);
        self.map.hash(&mut hasher);
        self.fog.hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the simulation state for replay or snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::Serialization(format!("Failed to deserialize simulation: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{PlayerOwned, Position, ResourceCarrier, Unit};
    use crate::world::ComponentSet;
    use serde_json::json;

    fn worker(sim: &mut Simulation, owner: &str, x: i32, y: i32) -> EntityId {
        sim.world_mut()
            .spawn()
            .with(Unit::new())
            .with(Position::new(x, y))
            .with(PlayerOwned::new(owner))
            .with(ResourceCarrier::empty())
            .id()
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::new(MapInfo::new(4, 4));
        assert_eq!(sim.get_tick(), 0);

        let events = sim.tick(&[]);
        assert_eq!(events.tick, 0);
        assert_eq!(sim.get_tick(), 1);

        sim.tick(&[]);
        assert_eq!(sim.get_tick(), 2);
    }

    #[test]
    fn test_register_senders_once() {
        let mut sim = Simulation::new(MapInfo::new(4, 4));
        sim.register_player(PlayerId::new("P1"));
        let batch = [
            InboundMessage::new("P2", Vec::new()),
            InboundMessage::new("P1", Vec::new()),
            InboundMessage::new("P2", Vec::new()),
        ];

        assert_eq!(sim.register_senders(&batch), vec![PlayerId::new("P2")]);
        assert!(sim.register_senders(&batch).is_empty());
        assert_eq!(sim.fog().len(), 2);
    }

    #[test]
    fn test_place_resource_blocks_tile() {
        let mut sim = Simulation::new(MapInfo::new(4, 4));
        let id = sim.place_resource(1, 1, 5, 10).unwrap();

        assert_eq!(sim.map().resource_at(1, 1), Some(id));
        assert_eq!(sim.world().get::<Label>(id).unwrap().text, "5/10");
        assert!(sim.place_resource(1, 1, 5, 10).is_err());
        assert!(sim.place_resource(9, 9, 5, 10).is_err());
    }

    #[test]
    fn test_place_resource_rejects_non_positive_amounts() {
        let mut sim = Simulation::new(MapInfo::new(4, 4));

        for (value, total) in [(-3, 10), (0, 10), (5, 0), (5, -1)] {
            assert!(
                matches!(
                    sim.place_resource(2, 2, value, total),
                    Err(GameError::InvalidMap(_))
                ),
                "{value}/{total}"
            );
        }
        assert_eq!(sim.map().resource_at(2, 2), None);
        assert_eq!(sim.world().find(ComponentSet::RESOURCE).count(), 0);
    }

    #[test]
    fn test_despawn_clears_occupancy() {
        let mut sim = Simulation::new(MapInfo::new(4, 4));
        let id = sim.place_resource(2, 3, 5, 10).unwrap();

        sim.despawn_entity(id).unwrap();
        assert_eq!(sim.map().resource_at(2, 3), None);
        assert!(matches!(
            sim.despawn_entity(id),
            Err(GameError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_depleted_events() {
        let mut sim = Simulation::new(MapInfo::new(4, 4));
        sim.register_player(PlayerId::new("P1"));
        let unit = worker(&mut sim, "P1", 0, 0);
        let deposit = sim.place_resource(1, 0, 5, 5).unwrap();

        let msg = InboundMessage::new(
            "P1",
            vec![json!({"command": "GATHER", "unit": unit, "dir": "E"})],
        );
        let events = sim.tick(&[msg]);

        assert_eq!(events.depleted().collect::<Vec<_>>(), vec![deposit]);
        assert_eq!(events.rejected().count(), 0);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_hash() {
        let mut sim = Simulation::new(MapInfo::new(6, 6));
        sim.register_player(PlayerId::new("P1"));
        worker(&mut sim, "P1", 2, 2);
        sim.place_resource(3, 2, 4, 40).unwrap();
        sim.tick(&[]);

        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(restored.state_hash(), sim.state_hash());
        assert_eq!(restored.get_tick(), 1);
    }

    #[test]
    fn test_hash_changes_with_state() {
        let mut sim = Simulation::new(MapInfo::new(6, 6));
        let before = sim.state_hash();
        worker(&mut sim, "P1", 2, 2);
        assert_ne!(sim.state_hash(), before);
    }

    #[test]
    fn test_deserialize_garbage_fails() {
        assert!(matches!(
            Simulation::deserialize(&[1, 2, 3]),
            Err(GameError::Serialization(_))
        ));
    }
}
