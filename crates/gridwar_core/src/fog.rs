//! Per-player fog-of-war invalidation.
//!
//! Each connected player owns a [`TileInfo`] that collects the tiles whose
//! visible content changed since the last time that player's view was sent.
//! The command stage only ever marks tiles dirty; whatever builds the
//! outbound tile updates drains them with [`TileInfo::take_dirty`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::components::PlayerId;
use crate::map::TileCoord;

/// Fog state of a single player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileInfo {
    dirty: BTreeSet<TileCoord>,
}

impl TileInfo {
    /// Create a fog state with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a tile as needing re-send.
    pub fn dirty_tile(&mut self, x: i32, y: i32) {
        self.dirty.insert((x, y));
    }

    /// Check if a tile is pending re-send.
    #[must_use]
    pub fn is_dirty(&self, x: i32, y: i32) -> bool {
        self.dirty.contains(&(x, y))
    }

    /// Number of pending tiles.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Drain pending tiles in coordinate order.
    pub fn take_dirty(&mut self) -> Vec<TileCoord> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }
}

/// Fog states of every connected player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FogOfWar {
    players: BTreeMap<PlayerId, TileInfo>,
}

impl FogOfWar {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player, returning their fog state.
    ///
    /// Registering an already known player keeps their pending tiles.
    pub fn register_player(&mut self, player: PlayerId) -> &mut TileInfo {
        self.players.entry(player).or_default()
    }

    /// Forget a player's fog state.
    pub fn unregister_player(&mut self, player: &PlayerId) -> Option<TileInfo> {
        self.players.remove(player)
    }

    /// Fog state of a player.
    #[must_use]
    pub fn tile_info(&self, player: &PlayerId) -> Option<&TileInfo> {
        self.players.get(player)
    }

    /// Fog state of a player, mutably.
    pub fn tile_info_mut(&mut self, player: &PlayerId) -> Option<&mut TileInfo> {
        self.players.get_mut(player)
    }

    /// Mark a tile dirty for every registered player.
    pub fn dirty_tile_for_all(&mut self, x: i32, y: i32) {
        for tile_info in self.players.values_mut() {
            tile_info.dirty_tile(x, y);
        }
    }

    /// Registered players in id order.
    pub fn players(&self) -> impl Iterator<Item = &PlayerId> {
        self.players.keys()
    }

    /// Number of registered players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Check if no player is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
