//! Match phase state machine and the always-on common rules
//!
//! One phase is current at a time and cycles
//! Waiting -> Countdown -> Playing -> Finish -> Waiting. The common rules
//! (movement, interact-to-deflect, bot wandering) run every tick regardless
//! of phase; Countdown and Finish suppress them through the `frozen` flag on
//! each actor rather than by disabling the common pass.

use std::time::Duration;

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::util::vec2::Vec2;
use crate::ws::protocol::{PhaseMetaState, PhaseName};

use super::bot::{spawn_bot, update_bot};
use super::rocket::{deflect_rockets, spawn_rocket, update_rocket, RocketOutcome};
use super::world::WorldState;

/// Current match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Waiting,
    Countdown,
    Playing,
    Finish,
}

impl PhaseKind {
    pub fn name(self) -> PhaseName {
        match self {
            PhaseKind::Waiting => PhaseName::Waiting,
            PhaseKind::Countdown => PhaseName::Countdown,
            PhaseKind::Playing => PhaseName::Playing,
            PhaseKind::Finish => PhaseName::Finish,
        }
    }
}

/// A cooperative timer driven by the tick clock. Never an OS timer, so it
/// cannot fire concurrently with tick logic.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    duration: Duration,
    elapsed: Duration,
}

impl PhaseTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            elapsed: Duration::ZERO,
        }
    }

    pub fn advance(&mut self, dt: Duration) {
        self.elapsed += dt;
    }

    pub fn expired(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn restart(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

/// The phase machine: current phase kind, its timer, and the rocket spawn
/// timer owned by the playing phase.
pub struct PhaseMachine {
    kind: PhaseKind,
    timer: PhaseTimer,
    rocket_spawn: Option<PhaseTimer>,
}

impl PhaseMachine {
    /// Start in the waiting phase.
    pub fn new(world: &mut WorldState, config: &ArenaConfig) -> Self {
        let mut machine = Self {
            kind: PhaseKind::Waiting,
            timer: PhaseTimer::new(config.waiting_duration),
            rocket_spawn: None,
        };
        machine.apply_meta(world);
        info!(phase = ?machine.kind, "phase started");
        machine
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// Whole seconds elapsed in the current phase.
    pub fn elapsed_secs(&self) -> u32 {
        self.timer.elapsed().as_secs() as u32
    }

    /// Advance the match by one fixed tick: phase timer, common rules, then
    /// the current phase's own rules and exit conditions.
    pub fn tick<R: Rng>(
        &mut self,
        world: &mut WorldState,
        rng: &mut R,
        config: &ArenaConfig,
        dt: f32,
    ) {
        self.timer.advance(Duration::from_secs_f32(dt));

        // Republish the phase clock only on whole-second changes.
        let elapsed_secs = self.elapsed_secs();
        if world.meta.elapsed_secs != elapsed_secs {
            world.meta.elapsed_secs = elapsed_secs;
        }

        common_tick(world, rng, config, dt);

        if self.kind == PhaseKind::Playing {
            self.playing_tick(world, rng, config, dt);
            if world.living_actor_count() <= 1 {
                info!("one or zero living actors remain, ending playing phase");
                self.end_phase(world, rng, config);
                return;
            }
        }

        if self.timer.expired() {
            self.end_phase(world, rng, config);
        }
    }

    /// Hook called after a player is added to the world.
    pub fn player_joined<R: Rng>(
        &mut self,
        world: &mut WorldState,
        rng: &mut R,
        config: &ArenaConfig,
    ) {
        if self.kind == PhaseKind::Waiting && world.connected_player_count() >= config.room_size {
            info!("room reached capacity, ending waiting phase early");
            self.end_phase(world, rng, config);
        }
    }

    /// Hook called after a player leaves. The playing phase notices the
    /// shrunken actor pool on its next tick; no phase reacts directly.
    pub fn player_left(&mut self, _world: &mut WorldState) {}

    /// Playing-phase rules: cooperative rocket spawn timer, rocket homing
    /// and collision, then the inactive-rocket sweep.
    fn playing_tick<R: Rng>(
        &mut self,
        world: &mut WorldState,
        rng: &mut R,
        config: &ArenaConfig,
        dt: f32,
    ) {
        let mut spawned = false;
        if let Some(spawn_timer) = &mut self.rocket_spawn {
            spawn_timer.advance(Duration::from_secs_f32(dt));
            if spawn_timer.expired() {
                if spawn_rocket(world, rng, config) {
                    spawned = true;
                } else {
                    // Empty actor pool: retry on the next scheduled spawn.
                    spawn_timer.restart();
                }
            }
        }
        if spawned {
            // One rocket in flight at a time; the timer restarts on the
            // next confirmed hit.
            self.rocket_spawn = None;
        }

        let rocket_ids: Vec<Uuid> = world
            .rockets
            .values()
            .filter(|r| r.active)
            .map(|r| r.id)
            .collect();

        for rocket_id in rocket_ids {
            if let RocketOutcome::Hit(_) = update_rocket(world, rng, config, rocket_id, dt) {
                self.rocket_spawn = Some(PhaseTimer::new(config.rocket_spawn_interval));
            }
        }

        let living = world.living_actor_count();
        world.rockets.retain(|_, rocket| rocket.active && living > 0);
    }

    /// Run the current phase's exit actions and advance to the next phase.
    fn end_phase<R: Rng>(&mut self, world: &mut WorldState, rng: &mut R, config: &ArenaConfig) {
        info!(phase = ?self.kind, "phase ended");
        match self.kind {
            PhaseKind::Waiting => {
                if world.connected_player_count() == 0 {
                    // Nobody to play against bots; idle until someone joins.
                    self.timer.restart();
                    return;
                }
                // Corpses left by mid-waiting leavers would otherwise count
                // against the bot fill and start the round under capacity.
                world.players.retain(|_, player| player.connected);
                let bots_to_spawn = config.room_size.saturating_sub(world.players.len());
                for _ in 0..bots_to_spawn {
                    spawn_bot(world, rng, config);
                }
                self.enter(PhaseKind::Countdown, world, config);
            }
            PhaseKind::Countdown => {
                world.set_all_frozen(false);
                self.enter(PhaseKind::Playing, world, config);
            }
            PhaseKind::Playing => {
                self.rocket_spawn = None;
                self.enter(PhaseKind::Finish, world, config);
            }
            PhaseKind::Finish => {
                info!(count = world.bots.len(), "destroying all bots");
                world.bots.clear();
                // Corpses kept around for the round get swept now: entries
                // without a session are removed, connected players revive
                // for the next round.
                world.players.retain(|_, player| player.connected);
                for player in world.players.values_mut() {
                    player.dead = false;
                    player.frozen = false;
                    player.interact_held_ms = 0.0;
                }
                self.enter(PhaseKind::Waiting, world, config);
            }
        }
    }

    /// Entry actions for the next phase.
    fn enter(&mut self, next: PhaseKind, world: &mut WorldState, config: &ArenaConfig) {
        self.kind = next;
        self.timer = PhaseTimer::new(match next {
            PhaseKind::Waiting => config.waiting_duration,
            PhaseKind::Countdown => config.countdown_duration,
            PhaseKind::Playing => config.playing_duration,
            PhaseKind::Finish => config.finish_duration,
        });
        self.rocket_spawn = None;

        match next {
            PhaseKind::Waiting => {}
            PhaseKind::Countdown => {
                world.set_all_frozen(true);
            }
            PhaseKind::Playing => {
                self.rocket_spawn = Some(PhaseTimer::new(config.rocket_spawn_interval));
            }
            PhaseKind::Finish => {
                world.set_all_frozen(true);
                let rocket_ids: Vec<Uuid> = world.rockets.keys().copied().collect();
                info!(count = rocket_ids.len(), "destroying all rockets");
                world.rockets.clear();
            }
        }

        self.apply_meta(world);
        info!(phase = ?next, "phase started");
    }

    fn apply_meta(&self, world: &mut WorldState) {
        world.meta = PhaseMetaState {
            phase: self.kind.name(),
            duration_ms: self.timer.duration().as_millis() as u64,
            elapsed_secs: 0,
        };
    }
}

/// The always-on common pass: player movement and interaction, then bot
/// behavior. Dead and frozen actors are skipped.
fn common_tick<R: Rng>(world: &mut WorldState, rng: &mut R, config: &ArenaConfig, dt: f32) {
    let player_ids: Vec<Uuid> = world
        .players
        .values()
        .filter(|p| !p.dead && !p.frozen)
        .map(|p| p.id)
        .collect();
    for player_id in player_ids {
        update_player(world, rng, config, player_id, dt);
    }

    let bot_ids: Vec<Uuid> = world
        .bots
        .values()
        .filter(|b| !b.dead && !b.frozen)
        .map(|b| b.id)
        .collect();
    for bot_id in bot_ids {
        update_bot(world, rng, config, bot_id, dt);
    }
}

/// Resolve one player's input flags into movement and interaction.
fn update_player<R: Rng>(
    world: &mut WorldState,
    rng: &mut R,
    config: &ArenaConfig,
    player_id: Uuid,
    dt: f32,
) {
    let attempt_deflect = {
        let Some(player) = world.players.get_mut(&player_id) else {
            return;
        };

        // Up/down and left/right are exclusive pairs; diagonals normalize so
        // diagonal speed equals axis speed.
        let mut move_direction = Vec2::ZERO;
        if player.input.up {
            move_direction.y = -1.0;
        } else if player.input.down {
            move_direction.y = 1.0;
        }
        if player.input.left {
            move_direction.x = -1.0;
        } else if player.input.right {
            move_direction.x = 1.0;
        }

        if move_direction != Vec2::ZERO {
            let step = player.speed * dt;
            let min_bounds = player.radius;
            let max_bounds = config.world_size - player.radius;

            let new_position = player
                .position()
                .add(move_direction.normalize().scale(step))
                .clamp_axes(min_bounds, max_bounds);
            player.set_position(new_position);
        }

        if player.input.interact && player.interact_held_ms < config.interact_window_ms {
            true
        } else {
            if !player.input.interact && player.interact_held_ms != 0.0 {
                player.interact_held_ms = 0.0;
            }
            false
        }
    };

    if attempt_deflect {
        deflect_rockets(world, rng, config, player_id);
        if let Some(player) = world.players.get_mut(&player_id) {
            player.interact_held_ms += dt * 1000.0;
        }
    }
}
