//! Replay recording and playback.
//!
//! A replay stores the initial simulation snapshot and every non-empty
//! batch of inbound messages keyed by the tick that consumed it. Because
//! the simulation is deterministic, re-running those batches against the
//! snapshot reproduces the game exactly, which [`ReplayPlayer::verify`]
//! checks against the recorded final hash.
//!
//! Playback registers each sender with the fog on its first message, the
//! same way the server host does, so fog state replays too.
//!
//! Messages are kept as JSON lines rather than decoded records: command
//! records are free-form JSON and the binary container cannot describe
//! them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::protocol::InboundMessage;
use crate::simulation::Simulation;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// The messages consumed by one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayTick {
    /// Tick that consumed the batch.
    pub tick: u64,
    /// Messages in arrival order, one JSON line each.
    pub messages: Vec<String>,
}

impl ReplayTick {
    /// Decode the batch.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MessageDecode`] if a line is corrupt.
    pub fn decode(&self) -> Result<Vec<InboundMessage>> {
        self.messages
            .iter()
            .map(|line| InboundMessage::from_json(line))
            .collect()
    }
}

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// Recorded batches in tick order. Ticks without messages are omitted.
    pub ticks: Vec<ReplayTick>,
    /// Final tick when the game ended.
    pub final_tick: u64,
    /// Final state hash for verification.
    pub final_hash: u64,
}

impl Replay {
    /// Create a new replay from a simulation's initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, initial_state: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            initial_state: initial_state.serialize()?,
            ticks: Vec::new(),
            final_tick: 0,
            final_hash: 0,
        })
    }

    /// Record the batch consumed by `tick`. Empty batches are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if `tick` is not after the last
    /// recorded one, or a serialization error if a message cannot be encoded.
    pub fn record_tick(&mut self, tick: u64, messages: &[InboundMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        if let Some(last) = self.ticks.last() {
            if tick <= last.tick {
                return Err(GameError::InvalidState(format!(
                    "replay tick {tick} recorded after tick {}",
                    last.tick
                )));
            }
        }
        let messages = messages
            .iter()
            .map(InboundMessage::to_json)
            .collect::<Result<Vec<_>>>()?;
        self.ticks.push(ReplayTick { tick, messages });
        Ok(())
    }

    /// Finalize the replay with end-game state.
    pub fn finalize(&mut self, final_tick: u64, final_hash: u64) {
        self.final_tick = final_tick;
        self.final_hash = final_hash;
    }

    /// Encode the replay.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize replay: {e}")))
    }

    /// Decode a replay, checking the format version.
    ///
    /// # Errors
    /// Returns an error if deserialization fails or the version differs.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::Serialization(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::ReplayVersionMismatch {
                expected: REPLAY_VERSION,
                found: replay.version,
            });
        }

        Ok(replay)
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Get the initial simulation state for playback.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// The batch consumed by `tick`, if one was recorded.
    #[must_use]
    pub fn batch_at_tick(&self, tick: u64) -> Option<&ReplayTick> {
        self.ticks
            .binary_search_by_key(&tick, |t| t.tick)
            .ok()
            .map(|index| &self.ticks[index])
    }

    /// Get the total duration of the replay in ticks.
    #[must_use]
    pub const fn duration(&self) -> u64 {
        self.final_tick
    }

    /// Total number of recorded messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.ticks.iter().map(|t| t.messages.len()).sum()
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    simulation: Simulation,
    /// Index of the next recorded batch.
    batch_index: usize,
    /// Whether playback is paused.
    pub paused: bool,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let simulation = replay.restore_initial_state()?;
        Ok(Self {
            replay,
            simulation,
            batch_index: 0,
            paused: false,
        })
    }

    fn step(&mut self) -> Result<()> {
        let tick = self.simulation.get_tick();
        let messages = match self.replay.ticks.get(self.batch_index) {
            Some(batch) if batch.tick == tick => {
                self.batch_index += 1;
                batch.decode()?
            }
            _ => Vec::new(),
        };
        self.simulation.register_senders(&messages);
        self.simulation.tick(&messages);
        Ok(())
    }

    /// Advance the replay by one tick.
    ///
    /// Returns true if there are more ticks to play.
    ///
    /// # Errors
    /// Returns an error if a recorded batch cannot be decoded.
    pub fn advance(&mut self) -> Result<bool> {
        if !self.paused && !self.is_finished() {
            self.step()?;
        }
        Ok(!self.is_finished())
    }

    /// Seek to a specific tick, replaying from the start.
    ///
    /// # Errors
    /// Returns an error if state restoration or decoding fails.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        self.simulation = self.replay.restore_initial_state()?;
        self.batch_index = self
            .replay
            .ticks
            .partition_point(|t| t.tick < self.simulation.get_tick());

        let target = target_tick.min(self.replay.final_tick);
        while self.simulation.get_tick() < target {
            self.step()?;
        }
        Ok(())
    }

    /// Get the current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.simulation.get_tick()
    }

    /// Get a reference to the current simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.simulation.get_tick() >= self.replay.final_tick
    }

    /// Verify the replay produces the expected final hash.
    ///
    /// # Errors
    /// Returns an error if state restoration or decoding fails.
    pub fn verify(&mut self) -> Result<bool> {
        self.seek(self.replay.final_tick)?;
        Ok(self.simulation.state_hash() == self.replay.final_hash)
    }

    /// Toggle pause state.
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }
}
