//! Entity records and the authoritative world state

use std::collections::HashMap;

use rand::Rng;
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::util::vec2::Vec2;
use crate::ws::protocol::{PhaseMetaState, PhaseName};

/// Pressed key state for one player, overwritten by input messages
#[derive(Debug, Clone, Copy, Default)]
pub struct InputFlags {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub interact: bool,
}

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub speed: f32,
    pub input: InputFlags,
    pub dead: bool,
    /// Movement and interaction suppressed; set by phase transitions
    pub frozen: bool,
    /// False once the session drops. Disconnected players are marked dead
    /// and kept in the map until the finish-phase sweep.
    pub connected: bool,
    /// Milliseconds the interact key has been held, capped by the interact
    /// window; resets on release
    pub interact_held_ms: f32,
}

impl Player {
    pub fn new(id: Uuid, name: String, x: f32, y: f32, config: &ArenaConfig) -> Self {
        Self {
            id,
            name,
            x,
            y,
            radius: config.player_radius,
            speed: config.player_speed,
            input: InputFlags::default(),
            dead: false,
            frozen: false,
            connected: true,
            interact_held_ms: 0.0,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.x = pos.x;
        self.y = pos.y;
    }
}

/// Bot state. Same spatial shape as a player, steering towards a wander
/// target instead of input flags.
#[derive(Debug, Clone)]
pub struct Bot {
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
    /// Reserved for future AI tuning; does not alter behavior yet
    pub difficulty: u8,
}

impl Bot {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.x = pos.x;
        self.y = pos.y;
    }

    pub fn target_position(&self) -> Vec2 {
        Vec2::new(self.target_x, self.target_y)
    }

    pub fn set_target(&mut self, pos: Vec2) {
        self.target_x = pos.x;
        self.target_y = pos.y;
    }
}

/// Homing rocket. `target_id` is a weak reference by id into the actor maps,
/// re-resolved every tick - the target can die or disconnect between ticks.
#[derive(Debug, Clone)]
pub struct Rocket {
    pub id: Uuid,
    pub target_id: Uuid,
    pub x: f32,
    pub y: f32,
    /// Current heading, unit vector
    pub direction: Vec2,
    /// Display angle in radians, derived from `direction`
    pub rotation: f32,
    pub radius: f32,
    pub speed: f32,
    /// False marks the rocket for removal at the next sweep
    pub active: bool,
}

impl Rocket {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.x = pos.x;
        self.y = pos.y;
    }

    pub fn set_direction(&mut self, dir: Vec2) {
        self.direction = dir;
        self.rotation = dir.angle();
    }
}

/// Position and size of a living actor, captured by value so rocket updates
/// can run without holding a borrow into the actor maps.
#[derive(Debug, Clone, Copy)]
pub struct ActorInfo {
    pub id: Uuid,
    pub position: Vec2,
    pub radius: f32,
}

/// The aggregate world owned by one room. Exposes collection bookkeeping
/// only; all gameplay rules live in the phase machine.
pub struct WorldState {
    pub width: f32,
    pub height: f32,
    pub meta: PhaseMetaState,
    pub players: HashMap<Uuid, Player>,
    pub bots: HashMap<Uuid, Bot>,
    pub rockets: HashMap<Uuid, Rocket>,
}

impl WorldState {
    pub fn new(config: &ArenaConfig) -> Self {
        Self {
            width: config.world_size,
            height: config.world_size,
            meta: PhaseMetaState {
                phase: PhaseName::Waiting,
                duration_ms: config.waiting_duration.as_millis() as u64,
                elapsed_secs: 0,
            },
            players: HashMap::new(),
            bots: HashMap::new(),
            rockets: HashMap::new(),
        }
    }

    /// Resolve an actor id to a living player or bot.
    pub fn living_actor(&self, id: Uuid) -> Option<ActorInfo> {
        if let Some(player) = self.players.get(&id) {
            if player.dead {
                return None;
            }
            return Some(ActorInfo {
                id,
                position: player.position(),
                radius: player.radius,
            });
        }
        if let Some(bot) = self.bots.get(&id) {
            if bot.dead {
                return None;
            }
            return Some(ActorInfo {
                id,
                position: bot.position(),
                radius: bot.radius,
            });
        }
        None
    }

    /// Mark a player or bot dead. Returns false if the id resolves to
    /// nothing.
    pub fn mark_actor_dead(&mut self, id: Uuid) -> bool {
        if let Some(player) = self.players.get_mut(&id) {
            player.dead = true;
            return true;
        }
        if let Some(bot) = self.bots.get_mut(&id) {
            bot.dead = true;
            return true;
        }
        false
    }

    pub fn connected_player_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    pub fn living_actor_count(&self) -> usize {
        self.players.values().filter(|p| !p.dead).count()
            + self.bots.values().filter(|b| !b.dead).count()
    }

    /// Pick a uniformly random living actor id - players and bots alike -
    /// excluding the given ids. Returns None when no candidate exists.
    pub fn random_living_actor<R: Rng>(&self, rng: &mut R, exclude: &[Uuid]) -> Option<Uuid> {
        let candidates: Vec<Uuid> = self
            .players
            .values()
            .filter(|p| !p.dead && !exclude.contains(&p.id))
            .map(|p| p.id)
            .chain(
                self.bots
                    .values()
                    .filter(|b| !b.dead && !exclude.contains(&b.id))
                    .map(|b| b.id),
            )
            .collect();

        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.gen_range(0..candidates.len())])
    }

    pub fn set_all_frozen(&mut self, frozen: bool) {
        for player in self.players.values_mut() {
            player.frozen = frozen;
        }
        for bot in self.bots.values_mut() {
            bot.frozen = frozen;
        }
    }
}
