//! Game simulation modules

pub mod arena;
pub mod bot;
pub mod phase;
pub mod rocket;
pub mod snapshot;
pub mod world;

pub use arena::{ArenaRoom, RoomHandle, RoomRegistry};
pub use world::{Bot, Player, Rocket, WorldState};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Client message received over WebSocket, tagged with the session's player
/// id before entering the room's input queue. Replies that concern only the
/// sending session (join confirmations, errors, pongs) go back over
/// `reply_tx`; the room's broadcast channel carries patches alone.
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: Uuid,
    pub msg: ClientMsg,
    pub reply_tx: mpsc::Sender<ServerMsg>,
}
