//! Fixed-rate tick loop.

use std::time::Duration;

use gridwar_core::replay::Replay;
use gridwar_core::simulation::{Simulation, TickEvents};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::Result;
use crate::inbox::Inbox;

/// Totals over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks processed.
    pub ticks: u64,
    /// Commands applied.
    pub applied: usize,
    /// Commands rejected, recoveries included.
    pub rejected: usize,
    /// State hash after the last tick.
    pub state_hash: u64,
}

/// Drives a [`Simulation`] from an [`Inbox`].
#[derive(Debug)]
pub struct TickRunner {
    sim: Simulation,
    inbox: Inbox,
    replay: Option<Replay>,
    summary: RunSummary,
}

impl TickRunner {
    /// Create a runner.
    #[must_use]
    pub fn new(sim: Simulation, inbox: Inbox) -> Self {
        let state_hash = sim.state_hash();
        Self {
            sim,
            inbox,
            replay: None,
            summary: RunSummary {
                state_hash,
                ..RunSummary::default()
            },
        }
    }

    /// Record every batch into a replay starting from the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the starting snapshot cannot be serialized.
    pub fn record_replay(mut self, scenario_id: &str) -> Result<Self> {
        self.replay = Some(Replay::new(scenario_id, &self.sim)?);
        Ok(self)
    }

    /// The simulation.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Totals so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Drain the inbox and run one tick on the batch.
    ///
    /// Senders are registered with the fog before the batch runs, so a
    /// player's first message already gets tile updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be recorded into the replay.
    pub fn run_tick(&mut self) -> Result<TickEvents> {
        let batch = self.inbox.drain();
        for player in self.sim.register_senders(&batch) {
            info!(%player, "player registered");
        }
        if let Some(replay) = &mut self.replay {
            replay.record_tick(self.sim.get_tick(), &batch)?;
        }

        let events = self.sim.tick(&batch);

        let applied = events.applied().count();
        let rejected = events.rejected().count();
        self.summary.ticks += 1;
        self.summary.applied += applied;
        self.summary.rejected += rejected;
        self.summary.state_hash = self.sim.state_hash();
        if !batch.is_empty() {
            debug!(
                tick = events.tick,
                messages = batch.len(),
                applied,
                rejected,
                "tick processed"
            );
        }

        Ok(events)
    }

    /// Tick every `period` until `max_ticks` is reached or the inbox is
    /// finished, then return the simulation and the replay, if recording.
    ///
    /// # Errors
    ///
    /// Returns an error if a batch cannot be recorded.
    pub async fn run(
        mut self,
        period: Duration,
        max_ticks: Option<u64>,
    ) -> Result<(Simulation, Option<Replay>, RunSummary)> {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if max_ticks.is_some_and(|max| self.summary.ticks >= max) {
                info!(ticks = self.summary.ticks, "tick limit reached");
                break;
            }
            ticker.tick().await;
            self.run_tick()?;
            if self.inbox.is_finished() {
                info!(ticks = self.summary.ticks, "inbox closed");
                break;
            }
        }

        if let Some(replay) = &mut self.replay {
            replay.finalize(self.sim.get_tick(), self.summary.state_hash);
        }
        Ok((self.sim, self.replay, self.summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::inbox;
    use gridwar_core::components::{MovementCommand, PlayerId};
    use gridwar_core::replay::ReplayPlayer;
    use gridwar_test_utils::fixtures::{cmd, message, Skirmish};

    #[tokio::test]
    async fn test_run_tick_registers_senders() {
        let s = Skirmish::new();
        let (tx, rx) = inbox(16);
        let mut runner = TickRunner::new(s.sim, rx);

        tx.send(message("P3", vec![])).await.unwrap();
        runner.run_tick().unwrap();

        assert!(runner
            .simulation()
            .fog()
            .tile_info(&PlayerId::new("P3"))
            .is_some());
    }

    #[tokio::test]
    async fn test_batches_split_by_tick() {
        let s = Skirmish::new();
        let (tx, rx) = inbox(16);
        let mut runner = TickRunner::new(s.sim, rx);

        tx.send(message("P1", vec![cmd::move_unit(s.p1_soldier, "N")]))
            .await
            .unwrap();
        let first = runner.run_tick().unwrap();
        let second = runner.run_tick().unwrap();

        assert_eq!(first.reports.len(), 1);
        assert!(second.reports.is_empty());
        assert!(runner
            .simulation()
            .world()
            .has::<MovementCommand>(s.p1_soldier));
        assert_eq!(runner.summary().ticks, 2);
        assert_eq!(runner.summary().applied, 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_inbox_closes_and_replay_verifies() {
        let s = Skirmish::new();
        let (tx, rx) = inbox(16);
        let runner = TickRunner::new(s.sim, rx).record_replay("skirmish").unwrap();

        tx.send(message(
            "P1",
            vec![
                cmd::gather(s.p1_worker, "E"),
                cmd::move_unit(s.p1_soldier, "up"),
            ],
        ))
        .await
        .unwrap();
        drop(tx);

        let (sim, replay, summary) = runner
            .run(Duration::from_millis(1), Some(100))
            .await
            .unwrap();

        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.state_hash, sim.state_hash());

        let mut player = ReplayPlayer::new(replay.unwrap()).unwrap();
        assert!(player.verify().unwrap());
    }

    #[tokio::test]
    async fn test_run_respects_tick_limit() {
        let s = Skirmish::new();
        let (_tx, rx) = inbox(16);
        let runner = TickRunner::new(s.sim, rx);

        let (sim, replay, summary) = runner.run(Duration::from_millis(1), Some(3)).await.unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(sim.get_tick(), 3);
        assert!(replay.is_none());
    }
}
