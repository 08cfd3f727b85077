//! # Gridwar Core
//!
//! Authoritative command stage for a tile-based real-time strategy server.
//!
//! Clients submit intents (move, build, attack, rename, harvest) tagged with
//! the connection they arrived on. Each tick this crate accepts only the
//! intents the sender is entitled to issue and turns them into either a
//! deferred command component for a later execution system or, for
//! harvesting, an immediate atomic state change.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No networking
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`world`] - Typed component store
//! - [`components`] - Component definitions
//! - [`map`] / [`fog`] - Tile map and per-player fog invalidation
//! - [`protocol`] - Inbound messages and the parsed command type
//! - [`commands`] - Validation and dispatch
//! - [`simulation`] - Tick host, state hash and snapshots
//! - [`replay`] - Recording and verified playback

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod commands;
pub mod components;
pub mod config;
pub mod data;
pub mod direction;
pub mod error;
pub mod fog;
pub mod map;
pub mod math;
pub mod protocol;
pub mod replay;
pub mod simulation;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::{
        command_system, CommandContext, CommandOutcome, CommandReport, Effect, Rejection,
    };
    pub use crate::components::*;
    pub use crate::config::SimulationConfig;
    pub use crate::data::{UnitCatalog, UnitTypeData};
    pub use crate::direction::Direction;
    pub use crate::error::{GameError, Result};
    pub use crate::fog::{FogOfWar, TileInfo};
    pub use crate::map::{CellType, MapInfo, TileCoord};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::protocol::{CommandKind, InboundMessage, PlayerCommand};
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::world::{ComponentSet, World};
}
