//! WebSocket transport and session gateway

pub mod gateway;
pub mod handler;
pub mod protocol;

pub use gateway::SessionGateway;
