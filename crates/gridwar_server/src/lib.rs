//! # Gridwar Server
//!
//! Headless host for the command stage.
//!
//! The transport hands decoded messages to an [`inbox::Inbox`]; a
//! [`runner::TickRunner`] drains it once per tick at a fixed rate and feeds
//! the batch to the simulation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use gridwar_core::components::PlayerId;

pub mod data_loader;
pub mod error;
pub mod inbox;
pub mod runner;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Messages the inbox buffers before senders wait.
    pub inbox_capacity: usize,
    /// Map size when no snapshot is given.
    pub map_width: u32,
    /// Map size when no snapshot is given.
    pub map_height: u32,
    /// Bincode snapshot to start from.
    pub snapshot: Option<PathBuf>,
    /// RON [`gridwar_core::config::SimulationConfig`].
    pub sim_config: Option<PathBuf>,
    /// RON unit catalog.
    pub catalog: Option<PathBuf>,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Where to write a replay on shutdown.
    pub replay_out: Option<PathBuf>,
    /// Connection every stdin line is attributed to. When unset, stdin is
    /// trusted to name the sender of each line.
    pub stdin_player: Option<PlayerId>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: gridwar_core::simulation::TICK_RATE,
            inbox_capacity: 1024,
            map_width: 32,
            map_height: 32,
            snapshot: None,
            sim_config: None,
            catalog: None,
            max_ticks: None,
            replay_out: None,
            stdin_player: None,
        }
    }
}

impl ServerConfig {
    /// Wall-clock length of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.tick_rate.max(1)))
    }

    /// How stdin lines are attributed.
    #[must_use]
    pub fn stdin_identity(&self) -> inbox::LineIdentity {
        match &self.stdin_player {
            Some(player) => inbox::LineIdentity::Connection(player.clone()),
            None => inbox::LineIdentity::Trusted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tick_duration() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_duration().as_millis(), 50);
    }

    #[test]
    fn test_zero_tick_rate_is_clamped() {
        let config = ServerConfig {
            tick_rate: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.tick_duration().as_millis(), 1000);
    }

    #[test]
    fn test_stdin_identity() {
        assert_eq!(
            ServerConfig::default().stdin_identity(),
            inbox::LineIdentity::Trusted
        );
        let config = ServerConfig {
            stdin_player: Some(PlayerId::new("P1")),
            ..ServerConfig::default()
        };
        assert_eq!(
            config.stdin_identity(),
            inbox::LineIdentity::Connection(PlayerId::new("P1"))
        );
    }
}
