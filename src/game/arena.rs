//! Arena rooms and the authoritative tick loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::util::time::{tick_delta, PATCH_TPS, SIMULATION_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::phase::PhaseMachine;
use super::snapshot::PatchBuilder;
use super::world::{Player, WorldState};
use super::PlayerInput;

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub seed: u64,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub patch_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Find a room with an open slot
    pub fn find_available_room(&self, room_size: usize) -> Option<RoomHandle> {
        for entry in self.rooms.iter() {
            if entry.value().player_count() < room_size {
                return Some(entry.value().clone());
            }
        }
        None
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One authoritative arena room, owned by its tick task
pub struct ArenaRoom {
    id: Uuid,
    seed: u64,
    tick: u64,
    config: ArenaConfig,
    world: WorldState,
    machine: PhaseMachine,
    rng: ChaCha8Rng,
    input_rx: mpsc::Receiver<PlayerInput>,
    patch_tx: broadcast::Sender<ServerMsg>,
    patch_builder: PatchBuilder,
    player_count: Arc<AtomicUsize>,
    /// True once any player has ever joined, so a fresh room is not torn
    /// down before its first client arrives
    had_players: bool,
}

impl ArenaRoom {
    pub fn new(id: Uuid, seed: u64, config: ArenaConfig) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (patch_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id,
            seed,
            input_tx,
            patch_tx: patch_tx.clone(),
            player_count: player_count.clone(),
        };

        let mut world = WorldState::new(&config);
        let machine = PhaseMachine::new(&mut world, &config);

        let room = Self {
            id,
            seed,
            tick: 0,
            config,
            world,
            machine,
            rng: ChaCha8Rng::seed_from_u64(seed),
            input_rx,
            patch_tx,
            patch_builder: PatchBuilder::new(SIMULATION_TPS / PATCH_TPS),
            player_count,
            had_players: false,
        };

        (room, handle)
    }

    /// Run the authoritative tick loop until the room empties out.
    pub async fn run(mut self) {
        info!(room_id = %self.id, seed = self.seed, "room started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            self.step();

            if self.had_players && self.world.connected_player_count() == 0 {
                info!(room_id = %self.id, "all players left, closing room");
                break;
            }
        }
    }

    /// One full server tick: drain inputs, simulate, maybe broadcast.
    /// Split out of `run` so tests can drive the room without the clock.
    fn step(&mut self) {
        self.process_inputs();

        self.tick += 1;
        self.machine
            .tick(&mut self.world, &mut self.rng, &self.config, tick_delta());

        if self.patch_builder.should_send() {
            let patch = self.patch_builder.build(self.tick, &self.world);
            let _ = self.patch_tx.send(ServerMsg::Patch(patch));
        }
    }

    /// Drain all pending client messages
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input.msg {
                ClientMsg::Join { name } => {
                    self.handle_join(input.player_id, name, &input.reply_tx);
                }
                ClientMsg::Input {
                    up,
                    down,
                    left,
                    right,
                    interact,
                } => {
                    self.handle_input(input.player_id, up, down, left, right, interact);
                }
                ClientMsg::Ping { t } => {
                    let _ = input.reply_tx.try_send(ServerMsg::Pong { t });
                }
                ClientMsg::Leave => {
                    self.handle_leave(input.player_id);
                }
            }
        }
    }

    fn handle_join(&mut self, player_id: Uuid, name: String, reply_tx: &mpsc::Sender<ServerMsg>) {
        if self.world.players.contains_key(&player_id) {
            warn!(room_id = %self.id, player_id = %player_id, "player already in room");
            return;
        }

        let name = name.trim().to_string();
        if name.is_empty() {
            let _ = reply_tx.try_send(ServerMsg::Error {
                code: "invalid_name".to_string(),
                message: "A non-empty name is required".to_string(),
            });
            return;
        }

        if self.world.connected_player_count() >= self.config.room_size {
            let _ = reply_tx.try_send(ServerMsg::Error {
                code: "room_full".to_string(),
                message: "Room is full".to_string(),
            });
            return;
        }

        let margin = self.config.player_radius;
        let x = self.rng.gen_range(margin..self.config.world_size - margin);
        let y = self.rng.gen_range(margin..self.config.world_size - margin);

        self.world
            .players
            .insert(player_id, Player::new(player_id, name, x, y, &self.config));
        self.had_players = true;
        self.player_count
            .store(self.world.connected_player_count(), Ordering::Relaxed);

        // Re-key the diff so the next patch is a keyframe for the newcomer.
        self.patch_builder.reset();

        let _ = reply_tx.try_send(ServerMsg::Joined {
            room_id: self.id,
            seed: self.seed,
        });

        info!(
            room_id = %self.id,
            player_id = %player_id,
            player_count = self.world.connected_player_count(),
            "player joined room"
        );

        self.machine
            .player_joined(&mut self.world, &mut self.rng, &self.config);
    }

    fn handle_input(
        &mut self,
        player_id: Uuid,
        up: bool,
        down: bool,
        left: bool,
        right: bool,
        interact: bool,
    ) {
        match self.world.players.get_mut(&player_id) {
            Some(player) if !player.dead => {
                player.input.up = up;
                player.input.down = down;
                player.input.left = left;
                player.input.right = right;
                player.input.interact = interact;
            }
            Some(_) => {
                debug!(room_id = %self.id, player_id = %player_id, "ignoring input from dead player");
            }
            None => {
                debug!(room_id = %self.id, player_id = %player_id, "ignoring input from unknown player");
            }
        }
    }

    /// A leaver is marked dead rather than deleted, so in-flight rockets
    /// retarget the same way they do for any other death. The entry is
    /// swept with the corpses at the end of the finish phase.
    fn handle_leave(&mut self, player_id: Uuid) {
        let Some(player) = self.world.players.get_mut(&player_id) else {
            return;
        };
        if !player.connected {
            return;
        }
        player.connected = false;
        player.dead = true;

        self.player_count
            .store(self.world.connected_player_count(), Ordering::Relaxed);

        info!(
            room_id = %self.id,
            player_id = %player_id,
            player_count = self.world.connected_player_count(),
            "player left room"
        );

        self.machine.player_left(&mut self.world);
    }

    #[cfg(test)]
    pub fn phase(&self) -> super::phase::PhaseKind {
        self.machine.kind()
    }

    #[cfg(test)]
    pub fn world(&self) -> &WorldState {
        &self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::phase::PhaseKind;

    fn session() -> (mpsc::Sender<ServerMsg>, mpsc::Receiver<ServerMsg>) {
        mpsc::channel(16)
    }

    fn join_msg(player_id: Uuid, name: &str, reply_tx: &mpsc::Sender<ServerMsg>) -> PlayerInput {
        PlayerInput {
            player_id,
            msg: ClientMsg::Join {
                name: name.to_string(),
            },
            reply_tx: reply_tx.clone(),
        }
    }

    #[tokio::test]
    async fn join_emits_joined_and_a_keyframe_patch() {
        let (mut room, handle) = ArenaRoom::new(Uuid::new_v4(), 42, ArenaConfig::default());
        let mut rx = handle.patch_tx.subscribe();
        let (reply_tx, mut reply_rx) = session();
        let player_id = Uuid::new_v4();

        handle
            .input_tx
            .send(join_msg(player_id, "alice", &reply_tx))
            .await
            .unwrap();
        room.step();

        match reply_rx.try_recv().unwrap() {
            ServerMsg::Joined { room_id, seed } => {
                assert_eq!(room_id, handle.id);
                assert_eq!(seed, 42);
            }
            other => panic!("expected Joined, got {:?}", other),
        }

        // The keyframe patch is forced onto the next cadence check.
        match rx.try_recv().unwrap() {
            ServerMsg::Patch(patch) => {
                assert_eq!(patch.players.added.len(), 1);
                assert_eq!(patch.players.added[0].id, player_id);
                assert_eq!(patch.players.added[0].name, "alice");
                assert!(patch.meta.is_some());
            }
            other => panic!("expected Patch, got {:?}", other),
        }

        assert_eq!(handle.player_count(), 1);
    }

    #[tokio::test]
    async fn join_rejects_blank_names() {
        let (mut room, handle) = ArenaRoom::new(Uuid::new_v4(), 1, ArenaConfig::default());
        let (reply_tx, mut reply_rx) = session();

        handle
            .input_tx
            .send(join_msg(Uuid::new_v4(), "   ", &reply_tx))
            .await
            .unwrap();
        room.step();

        match reply_rx.try_recv().unwrap() {
            ServerMsg::Error { code, .. } => assert_eq!(code, "invalid_name"),
            other => panic!("expected Error, got {:?}", other),
        }
        assert_eq!(handle.player_count(), 0);
    }

    #[tokio::test]
    async fn join_rejects_when_room_is_full() {
        let (mut room, handle) = ArenaRoom::new(Uuid::new_v4(), 1, ArenaConfig::default());
        let (reply_tx, _reply_rx) = session();
        let (late_tx, mut late_rx) = session();

        for i in 0..5 {
            handle
                .input_tx
                .send(join_msg(Uuid::new_v4(), &format!("p{}", i), &reply_tx))
                .await
                .unwrap();
        }
        handle
            .input_tx
            .send(join_msg(Uuid::new_v4(), "late", &late_tx))
            .await
            .unwrap();
        room.step();

        assert_eq!(handle.player_count(), 5);

        // The rejection reaches only the sixth session.
        match late_rx.try_recv().unwrap() {
            ServerMsg::Error { code, .. } => assert_eq!(code, "room_full"),
            other => panic!("expected Error, got {:?}", other),
        }
        // Full room ends the waiting phase immediately.
        assert_eq!(room.phase(), PhaseKind::Countdown);
    }

    #[tokio::test]
    async fn ping_answers_with_pong() {
        let (mut room, handle) = ArenaRoom::new(Uuid::new_v4(), 1, ArenaConfig::default());
        let (reply_tx, mut reply_rx) = session();

        handle
            .input_tx
            .send(PlayerInput {
                player_id: Uuid::new_v4(),
                msg: ClientMsg::Ping { t: 12345 },
                reply_tx,
            })
            .await
            .unwrap();
        room.step();

        match reply_rx.try_recv().unwrap() {
            ServerMsg::Pong { t } => assert_eq!(t, 12345),
            other => panic!("expected Pong, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn per_session_replies_stay_off_the_broadcast_channel() {
        let (mut room, handle) = ArenaRoom::new(Uuid::new_v4(), 5, ArenaConfig::default());
        let mut broadcast_rx = handle.patch_tx.subscribe();
        let (reply_tx, mut reply_rx) = session();

        handle
            .input_tx
            .send(join_msg(Uuid::new_v4(), "alice", &reply_tx))
            .await
            .unwrap();
        handle
            .input_tx
            .send(PlayerInput {
                player_id: Uuid::new_v4(),
                msg: ClientMsg::Ping { t: 7 },
                reply_tx: reply_tx.clone(),
            })
            .await
            .unwrap();
        handle
            .input_tx
            .send(join_msg(Uuid::new_v4(), "", &reply_tx))
            .await
            .unwrap();
        room.step();

        assert!(matches!(reply_rx.try_recv().unwrap(), ServerMsg::Joined { .. }));
        assert!(matches!(reply_rx.try_recv().unwrap(), ServerMsg::Pong { t: 7 }));
        assert!(matches!(reply_rx.try_recv().unwrap(), ServerMsg::Error { .. }));

        // Other subscribers see patches alone.
        while let Ok(msg) = broadcast_rx.try_recv() {
            assert!(matches!(msg, ServerMsg::Patch(_)));
        }
    }

    #[tokio::test]
    async fn leave_marks_the_player_dead_in_the_next_patch() {
        let (mut room, handle) = ArenaRoom::new(Uuid::new_v4(), 7, ArenaConfig::default());
        let mut rx = handle.patch_tx.subscribe();
        let (reply_tx, _reply_rx) = session();
        let player_id = Uuid::new_v4();

        handle
            .input_tx
            .send(join_msg(player_id, "bob", &reply_tx))
            .await
            .unwrap();
        room.step();
        while rx.try_recv().is_ok() {}

        handle
            .input_tx
            .send(PlayerInput {
                player_id,
                msg: ClientMsg::Leave,
                reply_tx: reply_tx.clone(),
            })
            .await
            .unwrap();
        for _ in 0..3 {
            room.step();
        }

        let mut saw_death = false;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Patch(patch) = msg {
                for delta in &patch.players.changed {
                    if delta.id == player_id && delta.dead == Some(true) {
                        saw_death = true;
                    }
                }
            }
        }
        assert!(saw_death);
        assert_eq!(handle.player_count(), 0);

        // The entry lingers as a corpse until the finish-phase sweep.
        let player = &room.world().players[&player_id];
        assert!(player.dead);
        assert!(!player.connected);
    }

    #[tokio::test]
    async fn input_flags_overwrite_player_state() {
        let (mut room, handle) = ArenaRoom::new(Uuid::new_v4(), 3, ArenaConfig::default());
        let (reply_tx, _reply_rx) = session();
        let player_id = Uuid::new_v4();

        handle
            .input_tx
            .send(join_msg(player_id, "carol", &reply_tx))
            .await
            .unwrap();
        room.step();

        handle
            .input_tx
            .send(PlayerInput {
                player_id,
                msg: ClientMsg::Input {
                    up: true,
                    down: false,
                    left: false,
                    right: true,
                    interact: false,
                },
                reply_tx: reply_tx.clone(),
            })
            .await
            .unwrap();
        room.step();

        let player = &room.world().players[&player_id];
        assert!(player.input.up);
        assert!(player.input.right);
        assert!(!player.input.down);
    }
}
