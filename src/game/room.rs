//! Room registry and admission control

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

use super::engine::SimulationEngine;
use super::state::{SimulationState, Slot};

/// Transport-level identity of one connected participant
pub type ConnectionId = Uuid;

/// Seats per room
pub const ROOM_CAPACITY: usize = 2;

/// Opaque room token, doubling as the join code shown to slot 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomId(Uuid);

impl RoomId {
    /// Fresh random token (UUID v4, 122 random bits)
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Room lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// One member, waiting for an opponent
    Waiting,
    /// Two members, tick loop running
    Active,
    /// Winner declared or room abandoned; no further ticks or input
    Finished,
}

/// Mutable part of a room, guarded by the room lock
pub struct RoomInner {
    pub phase: RoomPhase,
    /// Connected members in join order
    pub members: Vec<ConnectionId>,
    pub state: SimulationState,
    pub rng: ChaCha8Rng,
    pub tick: u64,
    /// Tick loop of an active room; taken exactly once when the room stops
    pub(crate) timer: Option<AbortHandle>,
}

/// One match instance
pub struct Room {
    id: RoomId,
    seed: u64,
    inner: Mutex<RoomInner>,
    events_tx: broadcast::Sender<ServerMsg>,
}

impl Room {
    fn new(id: RoomId, seed: u64, creator: ConnectionId, engine: &SimulationEngine) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let state = engine.new_state(&mut rng);
        let (events_tx, _) = broadcast::channel(64);

        Self {
            id,
            seed,
            inner: Mutex::new(RoomInner {
                phase: RoomPhase::Waiting,
                members: vec![creator],
                state,
                rng,
                tick: 0,
                timer: None,
            }),
            events_tx,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Lock the room. Ticks, input and membership changes all go through here.
    pub fn lock(&self) -> MutexGuard<'_, RoomInner> {
        self.inner.lock()
    }

    pub fn phase(&self) -> RoomPhase {
        self.inner.lock().phase
    }

    /// Receive every message broadcast to this room from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// Send to all subscribers; a room nobody listens to drops the message
    pub fn broadcast(&self, msg: ServerMsg) {
        let _ = self.events_tx.send(msg);
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// Admission errors surfaced to the joining client
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room has no live members")]
    UnknownRoom,

    #[error("Room is full")]
    RoomFull,
}

/// Registry of every live room
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<Room>>,
    engine: SimulationEngine,
}

impl RoomRegistry {
    pub fn new(engine: SimulationEngine) -> Self {
        Self {
            rooms: DashMap::new(),
            engine,
        }
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Open a waiting room with `creator` seated as slot 1
    pub fn create_room(&self, creator: ConnectionId) -> Arc<Room> {
        self.create_room_with_seed(creator, rand::random())
    }

    pub fn create_room_with_seed(&self, creator: ConnectionId, seed: u64) -> Arc<Room> {
        let room = loop {
            let id = RoomId::generate();
            if !self.rooms.contains_key(&id) {
                break Arc::new(Room::new(id, seed, creator, &self.engine));
            }
        };
        self.rooms.insert(room.id(), room.clone());

        info!(
            room_id = %room.id(),
            connection_id = %creator,
            seed = room.seed(),
            "Room created"
        );
        room
    }

    /// Seat `joiner` as slot 2. The member check and the seat happen under the
    /// room lock, so concurrent joiners cannot both win.
    pub fn join(&self, id: &RoomId, joiner: ConnectionId) -> Result<(Arc<Room>, Slot), RoomError> {
        let room = self.get(id).ok_or(RoomError::UnknownRoom)?;

        {
            let mut inner = room.lock();
            match (inner.phase, inner.members.len()) {
                (_, 0) => return Err(RoomError::UnknownRoom),
                (RoomPhase::Waiting, n) if n < ROOM_CAPACITY => {
                    inner.members.push(joiner);
                    inner.phase = RoomPhase::Active;
                }
                _ => return Err(RoomError::RoomFull),
            }
        }

        info!(room_id = %id, connection_id = %joiner, "Room active");
        Ok((room, Slot::Two))
    }

    pub fn get(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Evict a room and stop its tick loop if one is still running. Idempotent.
    pub fn remove(&self, id: &RoomId) -> Option<Arc<Room>> {
        let (_, room) = self.rooms.remove(id)?;
        {
            let mut inner = room.lock();
            inner.phase = RoomPhase::Finished;
            if let Some(timer) = inner.timer.take() {
                timer.abort();
            }
        }

        info!(room_id = %id, "Room removed from registry");
        Some(room)
    }

    /// Drop a member after disconnect. A waiting room left empty is reclaimed;
    /// an active room is left to its tick loop, which reclaims it once empty.
    pub fn leave(&self, id: &RoomId, member: ConnectionId) {
        let Some(room) = self.get(id) else {
            return;
        };

        let reclaim = {
            let mut inner = room.lock();
            inner.members.retain(|m| *m != member);
            debug!(
                room_id = %id,
                connection_id = %member,
                remaining = inner.members.len(),
                "Member left room"
            );
            inner.phase == RoomPhase::Waiting && inner.members.is_empty()
        };

        if reclaim {
            self.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn count_in_phase(&self, phase: RoomPhase) -> usize {
        self.rooms
            .iter()
            .filter(|r| r.value().phase() == phase)
            .count()
    }
}
