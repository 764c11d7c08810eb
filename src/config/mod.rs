//! Configuration module - environment variable parsing for the process
//! shell, plus the immutable arena tuning passed into each room.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS (permissive when unset)
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting providers supply PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,
}

/// Immutable game tuning for one arena room. Constructed once at room start
/// and passed by reference to the phase machine and tick loop; nothing in the
/// simulation reads ambient global state.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Side length of the square world
    pub world_size: f32,
    /// Actor capacity; the waiting phase fills the remainder with bots
    pub room_size: usize,

    pub player_speed: f32,
    pub player_radius: f32,
    /// Proximity within which an interacting actor can deflect a rocket
    pub deflect_radius: f32,
    /// Interact presses only attempt deflection while held less than this
    pub interact_window_ms: f32,

    pub rocket_radius: f32,
    pub rocket_start_speed: f32,
    pub rocket_max_speed: f32,
    /// Multiplicative speed growth per deflection (0.05 = +5%)
    pub rocket_speed_increase: f32,
    /// Homing turn rate is `(speed / divisor) * dt` as a lerp fraction
    pub rocket_turn_divisor: f32,
    pub rocket_spawn_interval: Duration,

    pub waiting_duration: Duration,
    pub countdown_duration: Duration,
    pub playing_duration: Duration,
    pub finish_duration: Duration,

    /// Bots roll `0..bot_roll_sides` once per tick for each decision
    pub bot_roll_sides: u32,
    /// Roll above this picks a new wander target
    pub bot_wander_threshold: u32,
    /// Roll above this attempts a deflection
    pub bot_deflect_threshold: u32,
    /// Within this distance of the wander target, snap exactly onto it
    pub bot_arrive_distance: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            world_size: 800.0,
            room_size: 5,

            player_speed: 120.0,
            player_radius: 10.0,
            deflect_radius: 48.0,
            interact_window_ms: 120.0,

            rocket_radius: 5.0,
            rocket_start_speed: 140.0,
            rocket_max_speed: 340.0,
            rocket_speed_increase: 0.05,
            rocket_turn_divisor: 70.0,
            rocket_spawn_interval: Duration::from_secs(2),

            waiting_duration: Duration::from_secs(5),
            countdown_duration: Duration::from_secs(3),
            playing_duration: Duration::from_secs(60),
            finish_duration: Duration::from_secs(5),

            bot_roll_sides: 200,
            bot_wander_threshold: 198,
            bot_deflect_threshold: 180,
            bot_arrive_distance: 1.0,
        }
    }
}
