//! ECS component definitions.
//!
//! Components are pure data with no behavior. The set of components an
//! entity carries decides which commands apply to it: a unit without
//! [`Attack`] can never shoot, an entity without [`ResourceCarrier`] can
//! never gather.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Connection identity of a player.
///
/// Assigned by the transport layer, never by the client payload. This is
/// the value compared against [`PlayerOwned::id`] for every command.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create a player id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Unit State
// ============================================================================

/// Lifecycle status of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Waiting for orders. The only status that accepts new commands.
    #[default]
    Idle,
    /// Executing a movement command.
    Moving,
    /// Destroyed; kept around until cleanup.
    Dead,
}

impl UnitStatus {
    /// Check if the unit can accept a new command.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::Dead => "dead",
        };
        f.write_str(name)
    }
}

/// Core unit component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Unit {
    /// Current status.
    pub status: UnitStatus,
    /// Set when the unit's state must be re-sent to clients.
    pub dirty: bool,
}

impl Unit {
    /// Create an idle, clean unit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: UnitStatus::Idle,
            dirty: false,
        }
    }

    /// Create a unit with the given status.
    #[must_use]
    pub const fn with_status(status: UnitStatus) -> Self {
        Self {
            status,
            dirty: false,
        }
    }

    /// Force the unit back to idle and flag it for re-send.
    pub fn reset_idle(&mut self) {
        self.status = UnitStatus::Idle;
        self.dirty = true;
    }
}

/// Tile position. Tile coordinates are authoritative; pixel coordinates
/// are derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Tile column.
    pub tile_x: i32,
    /// Tile row.
    pub tile_y: i32,
}

impl Position {
    /// Create a position on the given tile.
    #[must_use]
    pub const fn new(tile_x: i32, tile_y: i32) -> Self {
        Self { tile_x, tile_y }
    }

    /// Pixel-space location of this tile, or `None` if it overflows.
    #[must_use]
    pub fn pixel(self, tile_size: i32) -> Option<Vec2Fixed> {
        tile_to_pixel(self.tile_x, self.tile_y, tile_size)
    }
}

/// Convert tile coordinates into pixel space, or `None` if the result
/// does not fit in [`Fixed`].
#[must_use]
pub fn tile_to_pixel(tile_x: i32, tile_y: i32, tile_size: i32) -> Option<Vec2Fixed> {
    Vec2Fixed::from_ints(tile_x, tile_y).checked_scale(Fixed::from_num(tile_size))
}

/// Ownership component. The sole authorization source for commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerOwned {
    /// Owning connection.
    pub id: PlayerId,
}

impl PlayerOwned {
    /// Create an ownership component.
    #[must_use]
    pub fn new(id: impl Into<PlayerId>) -> Self {
        Self { id: id.into() }
    }

    /// Check whether `player` owns this entity.
    #[must_use]
    pub fn is_owned_by(&self, player: &PlayerId) -> bool {
        self.id == *player
    }
}

/// Marker: the entity can issue SHOOT and MELEE commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Attack;

/// Marker: the entity is a player's base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Base;

/// Display name shown above an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Label {
    /// Label text.
    pub text: String,
}

impl Label {
    /// Create a label.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Load carried by a harvesting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceCarrier {
    /// Amount currently held. Zero means empty.
    pub resource: i32,
}

impl ResourceCarrier {
    /// Create an empty carrier.
    #[must_use]
    pub const fn empty() -> Self {
        Self { resource: 0 }
    }

    /// Check if the carrier holds nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.resource == 0
    }
}

/// A harvestable deposit occupying a map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Yield per harvest.
    pub value: i32,
    /// Amount remaining. Never increases.
    pub total: i32,
}

impl Resource {
    /// Create a deposit.
    #[must_use]
    pub const fn new(value: i32, total: i32) -> Self {
        Self { value, total }
    }

    /// Take one harvest from the deposit, returning the yield.
    ///
    /// The carrier always receives the full `value`; `total` may go
    /// negative on the final harvest.
    pub fn harvest(&mut self) -> i32 {
        self.total -= self.value;
        self.value
    }

    /// Whether a harvest can be taken: both yield and amount are positive.
    #[must_use]
    pub const fn is_harvestable(&self) -> bool {
        self.value > 0 && self.total > 0
    }

    /// Check if the deposit is exhausted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.total <= 0
    }
}

/// Overlay image tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageTag {
    /// Small load overlay.
    #[serde(rename = "small_res1")]
    SmallResource,
    /// Large load overlay.
    #[serde(rename = "large_res1")]
    LargeResource,
}

impl ImageTag {
    /// Asset name of the image.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SmallResource => "small_res1",
            Self::LargeResource => "large_res1",
        }
    }
}

/// Visual overlay drawn on top of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decorated {
    /// Overlay image.
    pub image: ImageTag,
    /// Overlay scale relative to the entity sprite.
    #[serde(with = "fixed_serde")]
    pub scale: Fixed,
    /// Pixel offset from the entity origin.
    pub offset: Vec2Fixed,
}

// ============================================================================
// Deferred Commands
// ============================================================================
//
// Attached by the command stage, consumed and removed by the execution
// systems on later ticks.

/// Move to an adjacent tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementCommand {
    /// Destination in pixel space.
    pub target_vec: Vec2Fixed,
}

/// Build a unit at a base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreateCommand {
    /// Catalog tag of the unit type.
    pub unit_type: String,
    /// Build duration in ticks.
    pub build_time: u32,
}

/// Fire at a tile offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShootCommand {
    /// Shooting unit.
    pub id: EntityId,
    /// Horizontal tile offset.
    pub dx: i32,
    /// Vertical tile offset.
    pub dy: i32,
}

/// Strike a specific entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeleeCommand {
    /// Attacking unit.
    pub id: EntityId,
    /// Target entity.
    pub target: EntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_idle_marks_dirty() {
        let mut unit = Unit::with_status(UnitStatus::Moving);
        unit.reset_idle();
        assert_eq!(unit.status, UnitStatus::Idle);
        assert!(unit.dirty);
    }

    #[test]
    fn test_resource_harvest_depletes() {
        let mut resource = Resource::new(5, 12);
        assert_eq!(resource.harvest(), 5);
        assert_eq!(resource.total, 7);
        assert!(!resource.is_depleted());

        resource.harvest();
        assert_eq!(resource.harvest(), 5);
        assert_eq!(resource.total, -3);
        assert!(resource.is_depleted());
    }

    #[test]
    fn test_position_pixel() {
        let pos = Position::new(3, 2);
        assert_eq!(pos.pixel(32), Some(Vec2Fixed::from_ints(96, 64)));
        assert_eq!(Position::new(i32::MAX, 0).pixel(32), None);
    }

    #[test]
    fn test_ownership() {
        let owned = PlayerOwned::new("P1");
        assert!(owned.is_owned_by(&PlayerId::new("P1")));
        assert!(!owned.is_owned_by(&PlayerId::new("P2")));
    }

    #[test]
    fn test_player_id_serializes_transparently() {
        let json = serde_json::to_string(&PlayerId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
