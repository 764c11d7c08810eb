//! Application state shared across routes

use std::sync::Arc;

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::config::{ArenaConfig, Config};
use crate::game::arena::{ArenaRoom, RoomHandle, RoomRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena_config: ArenaConfig,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            arena_config: ArenaConfig::default(),
            rooms: Arc::new(RoomRegistry::new()),
        }
    }

    /// Join an existing room with a free slot, or spin up a fresh one. Each
    /// room owns a tick task that unregisters itself when the room closes.
    pub fn get_or_create_room(&self) -> RoomHandle {
        if let Some(handle) = self.rooms.find_available_room(self.arena_config.room_size) {
            return handle;
        }

        let id = Uuid::new_v4();
        let seed = rand::thread_rng().gen::<u64>();
        let (room, handle) = ArenaRoom::new(id, seed, self.arena_config.clone());

        self.rooms.insert(handle.clone());

        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            room.run().await;
            rooms.remove(&id);
            info!(room_id = %id, "room unregistered");
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::new(Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".into(),
            client_origin: None,
        })
    }

    #[tokio::test]
    async fn creates_a_room_on_first_request() {
        let state = test_state();
        assert_eq!(state.rooms.active_rooms(), 0);

        let handle = state.get_or_create_room();
        assert_eq!(state.rooms.active_rooms(), 1);
        assert_eq!(state.rooms.get(&handle.id).map(|h| h.seed), Some(handle.seed));
    }

    #[tokio::test]
    async fn reuses_a_room_with_open_slots() {
        let state = test_state();
        let first = state.get_or_create_room();
        let second = state.get_or_create_room();
        assert_eq!(first.id, second.id);
        assert_eq!(state.rooms.active_rooms(), 1);
    }
}
