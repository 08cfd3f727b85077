//! Command intake and validation.
//!
//! Once per tick the simulation hands this stage the batch of inbound
//! messages. Messages are processed in arrival order and the records inside
//! a message in array order, so an earlier command's effect is visible to
//! every later one (a second MOVE for the same unit sees the first one's
//! pending [`MovementCommand`]).
//!
//! Each record ends in exactly one [`CommandOutcome`]:
//!
//! - `Ok(effect)`: a deferred command component was attached, or (GATHER,
//!   IDENTIFY) the change was applied in place.
//! - `Err(rejection)`: nothing changed. The one exception is
//!   [`Rejection::InvalidDirection`], where the unit is first reset to idle
//!   and flagged dirty so the client re-syncs it.
//!
//! Nothing here is reported back to the client. Diagnostics are emitted
//! from the outcomes once a record has been handled.

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::components::{
    tile_to_pixel, CreateCommand, EntityId, Label, MeleeCommand, MovementCommand, PlayerId,
    PlayerOwned, Position, Resource, ResourceCarrier, ShootCommand, Unit, UnitStatus,
};
use crate::config::SimulationConfig;
use crate::data::UnitCatalog;
use crate::direction::{Direction, InvalidDirection};
use crate::fog::FogOfWar;
use crate::map::{MapInfo, TileCoord};
use crate::protocol::{CommandKind, CommandParseError, InboundMessage, PlayerCommand};
use crate::world::{Component, ComponentSet, World};

/// Everything besides the entity store that command handlers read or write.
#[derive(Debug)]
pub struct CommandContext<'a> {
    /// Tick being processed, for diagnostics.
    pub tick: u64,
    /// The simulation's map.
    pub map: &'a mut MapInfo,
    /// Per-player fog state.
    pub fog: &'a mut FogOfWar,
    /// Unit types CREATE may name.
    pub catalog: &'a UnitCatalog,
    /// Tunables.
    pub config: &'a SimulationConfig,
}

/// A command that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// A [`MovementCommand`] towards `target` was attached.
    MovementQueued {
        /// Moving unit.
        unit: EntityId,
        /// Destination tile.
        target: TileCoord,
    },
    /// A [`CreateCommand`] was attached to the issuer's base.
    CreateQueued {
        /// The base.
        base: EntityId,
        /// Catalog tag.
        unit_type: String,
        /// Build duration in ticks.
        build_time: u32,
    },
    /// A label was overwritten.
    Renamed {
        /// Relabelled entity.
        entity: EntityId,
        /// New label text.
        text: String,
    },
    /// A [`ShootCommand`] was attached.
    ShootQueued {
        /// Shooting unit.
        unit: EntityId,
        /// Horizontal offset.
        dx: i32,
        /// Vertical offset.
        dy: i32,
    },
    /// A [`MeleeCommand`] was attached.
    MeleeQueued {
        /// Attacking unit.
        unit: EntityId,
        /// Target entity.
        target: EntityId,
    },
    /// A harvest was applied.
    Harvested {
        /// Harvesting unit.
        unit: EntityId,
        /// Harvested resource entity.
        resource: EntityId,
        /// Tile of the resource.
        tile: TileCoord,
        /// Amount now carried.
        amount: i32,
        /// Amount left in the deposit.
        remaining: i32,
        /// Whether the deposit was removed.
        depleted: bool,
    },
}

/// Why a command was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The record could not be parsed.
    #[error("malformed command: {0}")]
    Malformed(#[from] CommandParseError),

    /// The entity does not exist or lacks a component the command needs.
    #[error("entity {0} not found or missing required components")]
    EntityNotFound(EntityId),

    /// The issuer owns no suitable base.
    #[error("player {0} has no base")]
    NoBase(PlayerId),

    /// The entity belongs to someone else.
    #[error("entity {entity} is not owned by {player}")]
    NotOwner {
        /// Targeted entity.
        entity: EntityId,
        /// Issuing player.
        player: PlayerId,
    },

    /// The unit is busy.
    #[error("unit {unit} is {status}")]
    UnitNotIdle {
        /// The unit.
        unit: EntityId,
        /// Its current status.
        status: UnitStatus,
    },

    /// The destination tile cannot be entered.
    #[error("target tile ({x}, {y}) is blocked")]
    TargetBlocked {
        /// Tile column.
        x: i32,
        /// Tile row.
        y: i32,
    },

    /// The unit already has a movement command.
    #[error("unit {0} already has a pending movement command")]
    MovementPending(EntityId),

    /// The carrier must be emptied before gathering again.
    #[error("unit {unit} is already carrying {load}")]
    CarrierLoaded {
        /// The unit.
        unit: EntityId,
        /// Its current load.
        load: i32,
    },

    /// CREATE named a type missing from the catalog.
    #[error("unknown unit type {0:?}")]
    UnknownUnitType(String),

    /// GATHER pointed at a tile with no resource.
    #[error("no resource at ({x}, {y})")]
    NoResourceAtTarget {
        /// Tile column.
        x: i32,
        /// Tile row.
        y: i32,
    },

    /// The direction was missing or unknown. The unit was reset to idle.
    #[error("invalid direction {direction:?} for unit {unit}")]
    InvalidDirection {
        /// The reset unit.
        unit: EntityId,
        /// The direction as sent, if any.
        direction: Option<String>,
    },
}

impl Rejection {
    /// Whether the rejection still changed state (the unit reset).
    #[must_use]
    pub const fn is_recovery(&self) -> bool {
        matches!(self, Self::InvalidDirection { .. })
    }
}

/// Result of handling one command record.
pub type CommandOutcome = Result<Effect, Rejection>;

/// Outcome of one record of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    /// Issuing connection.
    pub player: PlayerId,
    /// Position of the record inside its message.
    pub index: usize,
    /// Command kind, when the record parsed.
    pub kind: Option<CommandKind>,
    /// What happened.
    pub outcome: CommandOutcome,
}

/// Validate and apply a batch of inbound messages.
///
/// Returns one report per command record, in processing order.
pub fn command_system(
    world: &mut World,
    ctx: &mut CommandContext<'_>,
    messages: &[InboundMessage],
) -> Vec<CommandReport> {
    let mut reports = Vec::new();

    for message in messages {
        let player = &message.connection_id;
        for (index, record) in message.commands.iter().enumerate() {
            let (kind, outcome) = match PlayerCommand::parse(record) {
                Ok(command) => (Some(command.kind()), execute(world, ctx, player, command)),
                Err(err) => (None, Err(Rejection::Malformed(err))),
            };

            let report = CommandReport {
                player: player.clone(),
                index,
                kind,
                outcome,
            };
            log_report(ctx.tick, &report);
            reports.push(report);
        }
    }

    reports
}

/// Validate and apply a single parsed command issued by `player`.
pub fn execute(
    world: &mut World,
    ctx: &mut CommandContext<'_>,
    player: &PlayerId,
    command: PlayerCommand,
) -> CommandOutcome {
    match command {
        PlayerCommand::Move { unit, direction } => move_unit(world, ctx, player, unit, direction),
        PlayerCommand::Create { unit_type } => create(world, ctx.catalog, player, &unit_type),
        PlayerCommand::Identify { name, unit } => identify(world, ctx.config, player, name, unit),
        PlayerCommand::Shoot { unit, dx, dy } => {
            let unit = armed_unit(world, player, unit)?;
            attach(world, unit, ShootCommand { id: unit, dx, dy })?;
            Ok(Effect::ShootQueued { unit, dx, dy })
        }
        PlayerCommand::Melee { unit, target } => {
            let unit = armed_unit(world, player, unit)?;
            attach(world, unit, MeleeCommand { id: unit, target })?;
            Ok(Effect::MeleeQueued { unit, target })
        }
        PlayerCommand::Gather { unit, direction } => gather(world, ctx, player, unit, direction),
    }
}

fn log_report(tick: u64, report: &CommandReport) {
    let player = &report.player;
    let kind = report.kind.map_or("?", CommandKind::as_str);

    match &report.outcome {
        Ok(effect) => {
            trace!(tick, %player, kind, ?effect, "command applied");
            if let Effect::Harvested {
                resource,
                tile,
                depleted: true,
                ..
            } = effect
            {
                info!(tick, %player, resource, x = tile.0, y = tile.1, "resource depleted");
            }
        }
        Err(rejection) if rejection.is_recovery() => {
            warn!(tick, %player, kind, reason = %rejection, "unit reset to idle");
        }
        Err(rejection) => {
            debug!(tick, %player, kind, index = report.index, reason = %rejection, "command rejected");
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn move_unit(
    world: &mut World,
    ctx: &CommandContext<'_>,
    player: &PlayerId,
    unit: EntityId,
    direction: Result<Direction, InvalidDirection>,
) -> CommandOutcome {
    let unit = resolve(
        world,
        unit,
        ComponentSet::UNIT | ComponentSet::POSITION | ComponentSet::PLAYER_OWNED,
    )?;
    authorize(world, unit, player)?;
    let direction = direction_or_reset(world, unit, direction)?;

    let (x, y) = tile_of(world, unit)?;
    let (tx, ty) = direction.step(x, y);
    if ctx.map.is_blocked(tx, ty) {
        return Err(Rejection::TargetBlocked { x: tx, y: ty });
    }
    let status = status_of(world, unit)?;
    if matches!(status, UnitStatus::Moving | UnitStatus::Dead) {
        return Err(Rejection::UnitNotIdle { unit, status });
    }
    if world.has::<MovementCommand>(unit) {
        return Err(Rejection::MovementPending(unit));
    }

    let target_vec = tile_to_pixel(tx, ty, ctx.config.tile_size)
        .ok_or(Rejection::TargetBlocked { x: tx, y: ty })?;
    attach(world, unit, MovementCommand { target_vec })?;
    Ok(Effect::MovementQueued {
        unit,
        target: (tx, ty),
    })
}

fn create(
    world: &mut World,
    catalog: &UnitCatalog,
    player: &PlayerId,
    unit_type: &str,
) -> CommandOutcome {
    let data = catalog
        .get(unit_type)
        .ok_or_else(|| Rejection::UnknownUnitType(unit_type.to_string()))?;
    let base = find_base(world, player, ComponentSet::empty())?;
    require_idle(world, base)?;

    attach(
        world,
        base,
        CreateCommand {
            unit_type: data.id.clone(),
            build_time: data.create_time,
        },
    )?;
    Ok(Effect::CreateQueued {
        base,
        unit_type: data.id.clone(),
        build_time: data.create_time,
    })
}

fn identify(
    world: &mut World,
    config: &SimulationConfig,
    player: &PlayerId,
    name: String,
    unit: Option<EntityId>,
) -> CommandOutcome {
    match unit {
        Some(unit) => {
            let entity = resolve(
                world,
                unit,
                ComponentSet::UNIT | ComponentSet::PLAYER_OWNED | ComponentSet::LABEL,
            )?;
            if config.identify_requires_ownership {
                authorize(world, entity, player)?;
            }
            relabel(world, entity, name)
        }
        None => {
            let base = find_base(world, player, ComponentSet::LABEL)?;
            relabel(world, base, format!("{name} ({player})"))
        }
    }
}

fn gather(
    world: &mut World,
    ctx: &mut CommandContext<'_>,
    player: &PlayerId,
    unit: EntityId,
    direction: Result<Direction, InvalidDirection>,
) -> CommandOutcome {
    let unit = resolve(
        world,
        unit,
        ComponentSet::UNIT
            | ComponentSet::POSITION
            | ComponentSet::RESOURCE_CARRIER
            | ComponentSet::PLAYER_OWNED,
    )?;
    authorize(world, unit, player)?;
    require_idle(world, unit)?;
    let load = world.get::<ResourceCarrier>(unit).map_or(0, |c| c.resource);
    if load != 0 {
        return Err(Rejection::CarrierLoaded { unit, load });
    }
    let direction = direction_or_reset(world, unit, direction)?;

    let (x, y) = tile_of(world, unit)?;
    let (tx, ty) = direction.step(x, y);
    let no_resource = Rejection::NoResourceAtTarget { x: tx, y: ty };
    let resource = ctx.map.resource_at(tx, ty).ok_or_else(|| no_resource.clone())?;
    let mut deposit = world
        .get::<Resource>(resource)
        .copied()
        .filter(Resource::is_harvestable)
        .ok_or(no_resource)?;

    // Every fallible step happens before the first in-place mutation, so a
    // failed harvest leaves nothing half-applied.
    let amount = deposit.harvest();
    attach(world, unit, ctx.config.harvest_overlay(amount))?;
    attach(
        world,
        resource,
        Label::new(format!("{}/{}", deposit.value, deposit.total)),
    )?;

    if let Some(row) = world.get_mut::<Resource>(resource) {
        *row = deposit;
    }
    if let Some(carrier) = world.get_mut::<ResourceCarrier>(unit) {
        carrier.resource = amount;
    }
    if let Some(row) = world.get_mut::<Unit>(unit) {
        row.reset_idle();
    }
    ctx.fog.dirty_tile_for_all(tx, ty);

    let depleted = deposit.is_depleted();
    if depleted {
        ctx.map.remove_resource_at(tx, ty);
        world.remove_entity(resource);
    }

    Ok(Effect::Harvested {
        unit,
        resource,
        tile: (tx, ty),
        amount,
        remaining: deposit.total,
        depleted,
    })
}

// ============================================================================
// Guards
// ============================================================================

fn resolve(world: &World, id: EntityId, required: ComponentSet) -> Result<EntityId, Rejection> {
    world
        .find_by_id(id, required)
        .ok_or(Rejection::EntityNotFound(id))
}

fn authorize(world: &World, entity: EntityId, player: &PlayerId) -> Result<(), Rejection> {
    match world.get::<PlayerOwned>(entity) {
        Some(owner) if owner.is_owned_by(player) => Ok(()),
        _ => Err(Rejection::NotOwner {
            entity,
            player: player.clone(),
        }),
    }
}

fn status_of(world: &World, unit: EntityId) -> Result<UnitStatus, Rejection> {
    world
        .get::<Unit>(unit)
        .map(|u| u.status)
        .ok_or(Rejection::EntityNotFound(unit))
}

fn require_idle(world: &World, unit: EntityId) -> Result<(), Rejection> {
    let status = status_of(world, unit)?;
    if status.is_idle() {
        Ok(())
    } else {
        Err(Rejection::UnitNotIdle { unit, status })
    }
}

fn tile_of(world: &World, unit: EntityId) -> Result<TileCoord, Rejection> {
    world
        .get::<Position>(unit)
        .map(|p| (p.tile_x, p.tile_y))
        .ok_or(Rejection::EntityNotFound(unit))
}

/// SHOOT and MELEE share their guards.
fn armed_unit(world: &World, player: &PlayerId, unit: EntityId) -> Result<EntityId, Rejection> {
    let unit = resolve(
        world,
        unit,
        ComponentSet::UNIT
            | ComponentSet::POSITION
            | ComponentSet::PLAYER_OWNED
            | ComponentSet::ATTACK,
    )?;
    authorize(world, unit, player)?;
    require_idle(world, unit)?;
    Ok(unit)
}

/// The issuer's base, also carrying every component in `extra`.
fn find_base(world: &World, player: &PlayerId, extra: ComponentSet) -> Result<EntityId, Rejection> {
    let required = ComponentSet::BASE | ComponentSet::UNIT | ComponentSet::PLAYER_OWNED | extra;
    world
        .find(required)
        .find(|&id| {
            world
                .get::<PlayerOwned>(id)
                .is_some_and(|owner| owner.is_owned_by(player))
        })
        .ok_or_else(|| Rejection::NoBase(player.clone()))
}

fn direction_or_reset(
    world: &mut World,
    unit: EntityId,
    direction: Result<Direction, InvalidDirection>,
) -> Result<Direction, Rejection> {
    direction.map_err(|InvalidDirection(raw)| {
        if let Some(row) = world.get_mut::<Unit>(unit) {
            row.reset_idle();
        }
        Rejection::InvalidDirection {
            unit,
            direction: raw,
        }
    })
}

fn attach<C: Component>(world: &mut World, id: EntityId, component: C) -> Result<(), Rejection> {
    world
        .add_component(id, component)
        .map(|_| ())
        .map_err(|_| Rejection::EntityNotFound(id))
}

fn relabel(world: &mut World, entity: EntityId, text: String) -> CommandOutcome {
    let label = world
        .get_mut::<Label>(entity)
        .ok_or(Rejection::EntityNotFound(entity))?;
    label.text.clone_from(&text);
    Ok(Effect::Renamed { entity, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Attack, Base};
    use serde_json::json;

    struct Harness {
        world: World,
        map: MapInfo,
        fog: FogOfWar,
        catalog: UnitCatalog,
        config: SimulationConfig,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                world: World::new(),
                map: MapInfo::new(8, 8),
                fog: FogOfWar::new(),
                catalog: UnitCatalog::default(),
                config: SimulationConfig::default(),
            }
        }

        fn soldier(&mut self, owner: &str, x: i32, y: i32) -> EntityId {
            self.world
                .spawn()
                .with(Unit::new())
                .with(Position::new(x, y))
                .with(PlayerOwned::new(owner))
                .with(Attack)
                .id()
        }

        fn run(&mut self, player: &str, commands: Vec<serde_json::Value>) -> Vec<CommandReport> {
            let mut ctx = CommandContext {
                tick: 0,
                map: &mut self.map,
                fog: &mut self.fog,
                catalog: &self.catalog,
                config: &self.config,
            };
            command_system(
                &mut self.world,
                &mut ctx,
                &[InboundMessage::new(player, commands)],
            )
        }
    }

    #[test]
    fn test_move_attaches_pixel_target() {
        let mut h = Harness::new();
        let unit = h.soldier("P1", 3, 3);

        let reports = h.run("P1", vec![json!({"command": "MOVE", "unit": unit, "dir": "N"})]);

        assert_eq!(
            reports[0].outcome,
            Ok(Effect::MovementQueued {
                unit,
                target: (3, 2)
            })
        );
        let cmd = h.world.get::<MovementCommand>(unit).unwrap();
        assert_eq!(Some(cmd.target_vec), tile_to_pixel(3, 2, 32));
    }

    #[test]
    fn test_shoot_and_melee_require_attack() {
        let mut h = Harness::new();
        let soldier = h.soldier("P1", 1, 1);
        let worker = h
            .world
            .spawn()
            .with(Unit::new())
            .with(Position::new(2, 2))
            .with(PlayerOwned::new("P1"))
            .id();

        let reports = h.run(
            "P1",
            vec![
                json!({"command": "SHOOT", "unit": soldier, "dx": 2, "dy": -1}),
                json!({"command": "MELEE", "unit": worker, "target": soldier}),
            ],
        );

        assert_eq!(
            h.world.get::<ShootCommand>(soldier),
            Some(&ShootCommand {
                id: soldier,
                dx: 2,
                dy: -1
            })
        );
        assert_eq!(reports[1].outcome, Err(Rejection::EntityNotFound(worker)));
        assert!(!h.world.has::<MeleeCommand>(worker));
    }

    #[test]
    fn test_malformed_record_does_not_block_siblings() {
        let mut h = Harness::new();
        let unit = h.soldier("P1", 3, 3);

        let reports = h.run(
            "P1",
            vec![
                json!({"unit": unit}),
                json!({"command": "MELEE", "unit": unit, "target": 99}),
            ],
        );

        assert!(matches!(
            reports[0].outcome,
            Err(Rejection::Malformed(CommandParseError::MissingKind))
        ));
        assert_eq!(reports[0].kind, None);
        assert!(reports[1].outcome.is_ok());
        assert_eq!(reports[1].index, 1);
    }

    #[test]
    fn test_create_uses_catalog_build_time() {
        let mut h = Harness::new();
        let base = h
            .world
            .spawn()
            .with(Base)
            .with(Unit::new())
            .with(PlayerOwned::new("P1"))
            .id();

        let reports = h.run(
            "P1",
            vec![
                json!({"command": "CREATE", "type": "dragon"}),
                json!({"command": "CREATE", "type": "tank"}),
            ],
        );

        assert_eq!(
            reports[0].outcome,
            Err(Rejection::UnknownUnitType("dragon".into()))
        );
        assert_eq!(
            h.world.get::<CreateCommand>(base),
            Some(&CreateCommand {
                unit_type: "tank".into(),
                build_time: 15
            })
        );
    }

    #[test]
    fn test_identify_ownership_switch() {
        let mut h = Harness::new();
        let unit = h.soldier("P1", 0, 0);
        h.world.add_component(unit, Label::new("old")).unwrap();

        h.run("P2", vec![json!({"command": "IDENTIFY", "unit": unit, "name": "x"})]);
        assert_eq!(h.world.get::<Label>(unit).unwrap().text, "x");

        h.config.identify_requires_ownership = true;
        let reports = h.run("P2", vec![json!({"command": "IDENTIFY", "unit": unit, "name": "y"})]);
        assert!(matches!(reports[0].outcome, Err(Rejection::NotOwner { .. })));
        assert_eq!(h.world.get::<Label>(unit).unwrap().text, "x");
    }

    #[test]
    fn test_recovery_flag() {
        assert!(Rejection::InvalidDirection {
            unit: 1,
            direction: None
        }
        .is_recovery());
        assert!(!Rejection::MovementPending(1).is_recovery());
    }
}
