//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameRules, RoomRegistry, RoomScheduler, SimulationEngine};
use crate::ws::SessionGateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub room_registry: Arc<RoomRegistry>,
    pub gateway: Arc<SessionGateway>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Rooms share one rule engine
        let engine = SimulationEngine::new(GameRules::from_config(&config));
        let room_registry = Arc::new(RoomRegistry::new(engine));

        // One tick loop per active room, all at the configured rate
        let scheduler = Arc::new(RoomScheduler::new(
            room_registry.clone(),
            config.tick_interval(),
        ));

        let gateway = Arc::new(SessionGateway::new(room_registry.clone(), scheduler));

        Self {
            config,
            room_registry,
            gateway,
        }
    }
}
