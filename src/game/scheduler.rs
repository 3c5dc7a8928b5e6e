//! Fixed-rate tick loop per active room

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::ws::protocol::ServerMsg;

use super::engine::TickOutcome;
use super::room::{Room, RoomPhase, RoomRegistry};
use super::state::Slot;

/// What a single scheduled tick did to its room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStep {
    /// State advanced and broadcast; keep ticking
    Broadcast,
    /// Winner declared, room torn down
    Finished(Slot),
    /// Every member disconnected, room torn down
    Abandoned,
    /// Room was no longer active when the tick fired
    Stopped,
}

impl TickStep {
    fn keeps_running(self) -> bool {
        self == TickStep::Broadcast
    }
}

/// Drives every active room at the configured frame rate
pub struct RoomScheduler {
    registry: Arc<RoomRegistry>,
    tick_interval: Duration,
}

impl RoomScheduler {
    pub fn new(registry: Arc<RoomRegistry>, tick_interval: Duration) -> Self {
        Self {
            registry,
            tick_interval,
        }
    }

    /// Start ticking an active room. The handle is stored under the room lock
    /// before the first tick can run, and a room is never started twice.
    pub fn start(self: &Arc<Self>, room: Arc<Room>) {
        let mut inner = room.lock();
        if inner.phase != RoomPhase::Active || inner.timer.is_some() {
            return;
        }

        let scheduler = self.clone();
        let task_room = room.clone();
        let handle = tokio::spawn(async move { scheduler.run(task_room).await });
        inner.timer = Some(handle.abort_handle());

        info!(
            room_id = %room.id(),
            tick_us = self.tick_interval.as_micros() as u64,
            "Tick loop started"
        );
    }

    async fn run(&self, room: Arc<Room>) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; simulate one interval after start.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let step = self.tick_room(&room);
            if !step.keeps_running() {
                debug!(room_id = %room.id(), ?step, "Tick loop stopped");
                break;
            }
        }
    }

    /// Advance one room by one tick and publish the result. The tick that ends
    /// the match is the one that clears the timer, so no later tick can broadcast.
    pub fn tick_room(&self, room: &Room) -> TickStep {
        let step = {
            let mut inner = room.lock();
            if inner.phase != RoomPhase::Active {
                return TickStep::Stopped;
            }

            if inner.members.is_empty() {
                inner.phase = RoomPhase::Finished;
                inner.timer.take();
                TickStep::Abandoned
            } else {
                let inner = &mut *inner;
                let outcome = self
                    .registry
                    .engine()
                    .advance_tick(&mut inner.state, &mut inner.rng);
                inner.tick += 1;

                match outcome {
                    TickOutcome::Continue => {
                        trace!(room_id = %room.id(), tick = inner.tick, "Tick");
                        room.broadcast(ServerMsg::GameState {
                            tick: inner.tick,
                            state: inner.state.clone(),
                        });
                        TickStep::Broadcast
                    }
                    TickOutcome::Winner(winner) => {
                        inner.phase = RoomPhase::Finished;
                        inner.timer.take();
                        room.broadcast(ServerMsg::GameOver {
                            winner: winner.number(),
                        });
                        TickStep::Finished(winner)
                    }
                }
            }
        };

        match step {
            TickStep::Finished(winner) => {
                info!(room_id = %room.id(), winner = %winner, "Match finished");
                self.registry.remove(&room.id());
            }
            TickStep::Abandoned => {
                info!(room_id = %room.id(), "All members left, ending match");
                self.registry.remove(&room.id());
            }
            _ => {}
        }

        step
    }
}
