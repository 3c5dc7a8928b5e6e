//! Game simulation modules

pub mod engine;
pub mod input;
pub mod room;
pub mod scheduler;
pub mod state;

pub use engine::{GameMode, GameRules, SimulationEngine};
pub use input::InputTranslator;
pub use room::{ConnectionId, RoomError, RoomId, RoomPhase, RoomRegistry};
pub use scheduler::RoomScheduler;
pub use state::{SimulationState, Slot};
