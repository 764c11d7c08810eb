//! Bot spawning and wander behavior

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::util::vec2::Vec2;

use super::rocket::deflect_rockets;
use super::world::{Bot, WorldState};

/// Names assigned to freshly spawned bots
const BOT_NAMES: &[&str] = &[
    "bot-bush", "bot-bear", "bot-deer", "bot-owl", "bot-seal", "bot-ant", "bot-neo", "bot-horn",
    "bot-nova", "bot-corn", "bot-egg", "bot-kale", "bot-net", "bot-song", "bot-alto", "bot-pig",
    "bot-yoda", "bot-fly", "bot-cow", "bot-dog", "bot-ham", "bot-bat", "bot-red", "bot-bane",
    "bot-mars", "bot-ice", "bot-clef", "bot-fog", "bot-sun", "bot-fern", "bot-rice", "bot-rye",
    "bot-judo", "bot-lime", "bot-pork", "bot-tea", "bot-drum", "bot-beat", "bot-rat", "bot-log",
    "bot-rose", "bot-harp",
];

pub fn random_bot_name<R: Rng>(rng: &mut R) -> String {
    BOT_NAMES[rng.gen_range(0..BOT_NAMES.len())].to_string()
}

/// Spawn one bot at a random position with a random wander target.
pub fn spawn_bot<R: Rng>(world: &mut WorldState, rng: &mut R, config: &ArenaConfig) -> Uuid {
    let bot_id = Uuid::new_v4();
    let name = random_bot_name(rng);
    let difficulty = rng.gen_range(0..8);

    info!(bot_id = %bot_id, name = %name, difficulty, "bot joined room");

    // Spawn and wander inside the same bounds movement clamps to, so a
    // snap-onto-target can never leave the world.
    let margin = config.player_radius;
    world.bots.insert(
        bot_id,
        Bot {
            id: bot_id,
            name,
            x: rng.gen_range(margin..world.width - margin),
            y: rng.gen_range(margin..world.height - margin),
            target_x: rng.gen_range(margin..world.width - margin),
            target_y: rng.gen_range(margin..world.height - margin),
            radius: config.player_radius,
            speed: config.player_speed,
            dead: false,
            frozen: false,
            difficulty,
        },
    );
    bot_id
}

/// One tick of bot behavior: occasionally attempt a deflection, steer
/// towards the wander target, snap on arrival, and occasionally reroll the
/// target.
pub fn update_bot<R: Rng>(
    world: &mut WorldState,
    rng: &mut R,
    config: &ArenaConfig,
    bot_id: Uuid,
    dt: f32,
) {
    if rng.gen_range(0..config.bot_roll_sides) > config.bot_deflect_threshold {
        deflect_rockets(world, rng, config, bot_id);
    }

    let Some(bot) = world.bots.get_mut(&bot_id) else {
        return;
    };

    let position = bot.position();
    let target = bot.target_position();

    let step = bot.speed * dt;
    let min_bounds = bot.radius;
    let max_bounds = config.world_size - bot.radius;

    let direction = Vec2::direction(position, target).normalize();
    let new_position = position
        .add(direction.scale(step))
        .clamp_axes(min_bounds, max_bounds);

    if new_position.distance(target) < config.bot_arrive_distance {
        bot.set_position(target);
    } else {
        bot.set_position(new_position);
    }

    // Decide whether the bot should pick a new point to move to.
    if rng.gen_range(0..config.bot_roll_sides) > config.bot_wander_threshold {
        let next = Vec2::new(
            rng.gen_range(min_bounds..max_bounds),
            rng.gen_range(min_bounds..max_bounds),
        );
        if let Some(bot) = world.bots.get_mut(&bot_id) {
            bot.set_target(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn spawned_bot_is_inside_world_bounds() {
        let config = ArenaConfig::default();
        let mut world = WorldState::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let id = spawn_bot(&mut world, &mut rng, &config);
        let bot = &world.bots[&id];
        let min = config.player_radius;
        let max = config.world_size - config.player_radius;
        assert!(bot.x >= min && bot.x <= max);
        assert!(bot.y >= min && bot.y <= max);
        assert!(bot.difficulty < 8);
    }

    #[test]
    fn bot_moves_towards_target_at_constant_speed() {
        let config = ArenaConfig::default();
        let mut world = WorldState::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let id = spawn_bot(&mut world, &mut rng, &config);
        {
            let bot = world.bots.get_mut(&id).unwrap();
            bot.set_position(Vec2::new(100.0, 100.0));
            bot.set_target(Vec2::new(700.0, 100.0));
        }

        let dt = 1.0 / 60.0;
        update_bot(&mut world, &mut rng, &config, id, dt);

        let bot = &world.bots[&id];
        let moved = bot.x - 100.0;
        // Allow for a rerolled wander target on an unlucky seed tick.
        if bot.target_x == 700.0 {
            assert!((moved - config.player_speed * dt).abs() < 1e-3);
            assert_eq!(bot.y, 100.0);
        }
    }

    #[test]
    fn bot_snaps_onto_target_when_close() {
        let config = ArenaConfig::default();
        let mut world = WorldState::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let id = spawn_bot(&mut world, &mut rng, &config);
        {
            let bot = world.bots.get_mut(&id).unwrap();
            bot.set_position(Vec2::new(300.0, 300.0));
            bot.set_target(Vec2::new(300.5, 300.0));
        }

        update_bot(&mut world, &mut rng, &config, id, 1.0 / 60.0);
        let bot = &world.bots[&id];
        // Either it snapped onto the old target, or a reroll moved the
        // target; in both cases the position must sit exactly on a target.
        if bot.target_x == 300.5 {
            assert_eq!(bot.position(), Vec2::new(300.5, 300.0));
        }
    }
}
