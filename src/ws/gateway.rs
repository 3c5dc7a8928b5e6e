//! Session gateway - maps inbound commands onto rooms

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::game::{
    ConnectionId, InputTranslator, RoomError, RoomId, RoomPhase, RoomRegistry, RoomScheduler,
    Slot,
};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Where a connection sits for the duration of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBinding {
    pub room_id: RoomId,
    pub slot: Slot,
}

/// What the transport should do after a command
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Sent to the originating connection only, in order
    pub replies: Vec<ServerMsg>,
    /// Room feed the connection should listen to from now on
    pub subscription: Option<broadcast::Receiver<ServerMsg>>,
}

impl Dispatch {
    fn reply(msg: ServerMsg) -> Self {
        Self {
            replies: vec![msg],
            subscription: None,
        }
    }
}

/// Boundary between connections and rooms. Owns the identity mapping.
pub struct SessionGateway {
    registry: Arc<RoomRegistry>,
    scheduler: Arc<RoomScheduler>,
    bindings: DashMap<ConnectionId, SessionBinding>,
}

impl SessionGateway {
    pub fn new(registry: Arc<RoomRegistry>, scheduler: Arc<RoomScheduler>) -> Self {
        Self {
            registry,
            scheduler,
            bindings: DashMap::new(),
        }
    }

    pub fn binding(&self, connection: &ConnectionId) -> Option<SessionBinding> {
        self.bindings.get(connection).map(|b| *b)
    }

    /// Route one command from `connection`
    pub fn handle(&self, connection: ConnectionId, msg: ClientMsg) -> Dispatch {
        match msg {
            ClientMsg::NewGame => self.new_game(connection),
            ClientMsg::JoinGame { code } => self.join_game(connection, &code),
            ClientMsg::Keydown { key } => {
                self.keydown(connection, &key);
                Dispatch::default()
            }
        }
    }

    /// Forget a connection and free its seat
    pub fn disconnect(&self, connection: ConnectionId) {
        self.detach(connection);
    }

    fn new_game(&self, connection: ConnectionId) -> Dispatch {
        self.detach(connection);

        let room = self.registry.create_room(connection);
        self.bindings.insert(
            connection,
            SessionBinding {
                room_id: room.id(),
                slot: Slot::One,
            },
        );

        Dispatch {
            replies: vec![
                ServerMsg::GameCode {
                    code: room.id().to_string(),
                },
                ServerMsg::Init {
                    number: Slot::One.number(),
                },
            ],
            subscription: Some(room.subscribe()),
        }
    }

    /// A rejected join leaves the caller's current seat untouched.
    fn join_game(&self, connection: ConnectionId, code: &str) -> Dispatch {
        let Ok(room_id) = code.parse::<RoomId>() else {
            debug!(connection_id = %connection, code, "Malformed room code");
            return Dispatch::reply(ServerMsg::UnknownGame);
        };

        if self.binding(&connection).is_some_and(|b| b.room_id == room_id) {
            info!(connection_id = %connection, room_id = %room_id, "Join rejected: already seated");
            return Dispatch::reply(ServerMsg::TooManyPlayers);
        }

        match self.registry.join(&room_id, connection) {
            Ok((room, slot)) => {
                self.detach(connection);
                self.bindings.insert(connection, SessionBinding { room_id, slot });
                // Subscribe before the first tick can fire.
                let subscription = room.subscribe();
                self.scheduler.start(room);

                Dispatch {
                    replies: vec![ServerMsg::Init {
                        number: slot.number(),
                    }],
                    subscription: Some(subscription),
                }
            }
            Err(RoomError::UnknownRoom) => {
                info!(connection_id = %connection, room_id = %room_id, "Join rejected: unknown room");
                Dispatch::reply(ServerMsg::UnknownGame)
            }
            Err(RoomError::RoomFull) => {
                info!(connection_id = %connection, room_id = %room_id, "Join rejected: room full");
                Dispatch::reply(ServerMsg::TooManyPlayers)
            }
        }
    }

    /// Record movement intent; the next tick resolves it
    fn keydown(&self, connection: ConnectionId, key: &str) {
        let Some(binding) = self.binding(&connection) else {
            debug!(connection_id = %connection, "Input from unbound identity dropped");
            return;
        };
        let Some(room) = self.registry.get(&binding.room_id) else {
            return;
        };

        let velocity = InputTranslator::translate(key);
        let mut inner = room.lock();
        if inner.phase == RoomPhase::Finished {
            return;
        }
        self.registry
            .engine()
            .apply_input(&mut inner.state, binding.slot, velocity);
    }

    fn detach(&self, connection: ConnectionId) {
        if let Some((_, binding)) = self.bindings.remove(&connection) {
            self.registry.leave(&binding.room_id, connection);
        }
    }
}
