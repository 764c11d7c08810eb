//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Match phase as replicated to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    /// Waiting for players
    Waiting,
    /// Countdown before play, actors frozen
    Countdown,
    /// Rockets live
    Playing,
    /// Round over, actors frozen
    Finish,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join the arena. A non-empty name is required.
    Join { name: String },

    /// Current key state. Overwrites the player's input flags; only sent on
    /// change, not per frame.
    Input {
        up: bool,
        down: bool,
        left: bool,
        right: bool,
        interact: bool,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the arena
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { player_id: Uuid, server_time: u64 },

    /// Confirmation of a successful join
    Joined {
        room_id: Uuid,
        /// Seed of the room's deterministic RNG
        seed: u64,
    },

    /// World state diff, sent at the patch rate
    Patch(WorldPatch),

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Phase metadata replicated alongside entity patches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetaState {
    pub phase: PhaseName,
    /// Total phase duration in milliseconds
    pub duration_ms: u64,
    /// Whole seconds elapsed in the current phase, for client display
    pub elapsed_secs: u32,
}

/// Full player record, sent when a player enters a client's view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub speed: f32,
    pub dead: bool,
    pub frozen: bool,
}

/// Full bot record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotEntry {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub radius: f32,
    pub speed: f32,
    pub dead: bool,
    pub frozen: bool,
    pub difficulty: u8,
}

/// Full rocket record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocketEntry {
    pub id: Uuid,
    pub target_id: Uuid,
    pub x: f32,
    pub y: f32,
    /// Display heading in radians
    pub rotation: f32,
    pub radius: f32,
    pub speed: f32,
}

/// Changed fields for a player since the last patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerDelta {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
}

/// Changed fields for a bot since the last patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotDelta {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen: Option<bool>,
}

/// Changed fields for a rocket since the last patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocketDelta {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<Uuid>,
}

/// Diff for one entity map. `added` carries full records so clients can run
/// add handlers, `removed` carries ids for remove handlers, and `changed`
/// carries partial field updates - the three are distinguishable by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapPatch<F, D> {
    #[serde(skip_serializing_if = "Vec::is_empty", default = "Vec::new")]
    pub added: Vec<F>,
    #[serde(skip_serializing_if = "Vec::is_empty", default = "Vec::new")]
    pub removed: Vec<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty", default = "Vec::new")]
    pub changed: Vec<D>,
}

impl<F, D> Default for MapPatch<F, D> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }
}

impl<F, D> MapPatch<F, D> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// A world state diff, broadcast at the patch rate. Contains only what
/// changed since the previous patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldPatch {
    /// Server tick the patch was taken at
    pub tick: u64,
    /// Server timestamp in unix milliseconds
    pub server_time: u64,
    /// Phase metadata, present only when it changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PhaseMetaState>,
    pub players: MapPatch<PlayerEntry, PlayerDelta>,
    pub bots: MapPatch<BotEntry, BotDelta>,
    pub rockets: MapPatch<RocketEntry, RocketDelta>,
}
