//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::GameMode;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Allowed client origins for CORS (comma-separated, may be empty)
    pub client_origin: String,

    /// Rule set every room is simulated with
    pub game_mode: GameMode,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Width and height of the square play grid
    pub grid_size: i32,
    /// Random draws before food placement falls back to a grid scan
    pub food_placement_attempts: u32,
    /// Extent at which a participant wins in growth mode
    pub growth_win_extent: u32,
    /// Extent gained per food in growth mode
    pub growth_increment: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),

            game_mode: parse_or("GAME_MODE", GameMode::Snake)?,
            tick_rate: parse_or("TICK_RATE", 10)?,
            grid_size: parse_or("GRID_SIZE", 20)?,
            food_placement_attempts: parse_or("FOOD_PLACEMENT_ATTEMPTS", 64)?,
            growth_win_extent: parse_or("GROWTH_WIN_EXTENT", 6)?,
            growth_increment: parse_or("GROWTH_INCREMENT", 1)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_interval().is_zero() {
            return Err(ConfigError::InvalidValue("TICK_RATE"));
        }
        // Spawn cells sit two cells in from each edge.
        if self.grid_size < 5 {
            return Err(ConfigError::InvalidValue("GRID_SIZE"));
        }
        if self.growth_increment == 0 {
            return Err(ConfigError::InvalidValue("GROWTH_INCREMENT"));
        }
        Ok(())
    }

    /// Interval between two ticks of a room
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate.max(1)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            log_level: "info".to_string(),
            log_json: false,
            client_origin: String::new(),
            game_mode: GameMode::Snake,
            tick_rate: 10,
            grid_size: 20,
            food_placement_attempts: 64,
            growth_win_extent: 6,
            growth_increment: 1,
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
