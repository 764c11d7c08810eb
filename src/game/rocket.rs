//! Rocket spawning, homing, retargeting, and deflection

use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::util::vec2::{circles_overlap, lerp_angle, Vec2};

use super::world::{Rocket, WorldState};

/// Result of advancing one rocket for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RocketOutcome {
    /// Still in flight
    Flying,
    /// Confirmed hit on the given actor; the rocket is now inactive
    Hit(Uuid),
    /// No target candidates remained; the rocket is now inactive
    Deactivated,
}

/// Spawn one rocket at the world center with a random heading and a random
/// living target. Returns false (logged, no state change) when no living
/// actor exists; the caller reschedules the spawn.
pub fn spawn_rocket<R: Rng>(world: &mut WorldState, rng: &mut R, config: &ArenaConfig) -> bool {
    info!("attempting to spawn one rocket");

    let Some(target_id) = world.random_living_actor(rng, &[]) else {
        warn!("unable to spawn rocket, no living actors");
        return false;
    };

    let rocket_id = Uuid::new_v4();
    let direction = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU));

    info!(rocket_id = %rocket_id, target_id = %target_id, "rocket has got target");

    let mut rocket = Rocket {
        id: rocket_id,
        target_id,
        x: config.world_size / 2.0,
        y: config.world_size / 2.0,
        direction,
        rotation: 0.0,
        radius: config.rocket_radius,
        speed: config.rocket_start_speed,
        active: true,
    };
    rocket.set_direction(direction);
    world.rockets.insert(rocket_id, rocket);
    true
}

/// Advance one rocket: revalidate the target, blend the heading towards it
/// with a bounded turn rate, move, and resolve collision.
pub fn update_rocket<R: Rng>(
    world: &mut WorldState,
    rng: &mut R,
    config: &ArenaConfig,
    rocket_id: Uuid,
    dt: f32,
) -> RocketOutcome {
    let (target_id, position, direction, speed, radius) = match world.rockets.get(&rocket_id) {
        Some(rocket) => (
            rocket.target_id,
            rocket.position(),
            rocket.direction,
            rocket.speed,
            rocket.radius,
        ),
        None => return RocketOutcome::Flying,
    };

    // Targets are weak references by id; they can die or disconnect between
    // ticks, so resolve-or-retarget before anything else.
    let Some(target) = world.living_actor(target_id) else {
        warn!(rocket_id = %rocket_id, target_id = %target_id, "rocket target is gone, retargeting");
        return if retarget_rocket(world, rng, rocket_id, &[target_id]) {
            RocketOutcome::Flying
        } else {
            RocketOutcome::Deactivated
        };
    };

    let step = speed * dt;
    let overlap_distance = radius + target.radius;

    let direction_to_target = Vec2::direction(position, target.position).normalize();
    let turn = (speed / config.rocket_turn_divisor) * dt;
    let new_angle = lerp_angle(direction.angle(), direction_to_target.angle(), turn);
    let new_direction = Vec2::from_angle(new_angle);

    let distance_to_target = position.distance(target.position);

    // Clamp the advance to the overlap distance when already inside it, so a
    // fast rocket cannot tunnel past its target in one tick.
    let (new_position, mut collided) = if distance_to_target <= overlap_distance {
        (position.add(new_direction.scale(overlap_distance)), true)
    } else {
        (position.add(new_direction.scale(step)), false)
    };

    collided = collided || circles_overlap(new_position, radius, target.position, target.radius);

    if let Some(rocket) = world.rockets.get_mut(&rocket_id) {
        rocket.set_position(new_position);
        rocket.set_direction(new_direction);
    }

    if collided {
        info!(rocket_id = %rocket_id, target_id = %target.id, "rocket hit its target");
        world.mark_actor_dead(target.id);
        if let Some(rocket) = world.rockets.get_mut(&rocket_id) {
            rocket.active = false;
        }
        return RocketOutcome::Hit(target.id);
    }

    RocketOutcome::Flying
}

/// Reassign the rocket's pursuit to a random living actor outside `exclude`.
/// With no candidate the rocket is deactivated (terminal, not an error).
pub fn retarget_rocket<R: Rng>(
    world: &mut WorldState,
    rng: &mut R,
    rocket_id: Uuid,
    exclude: &[Uuid],
) -> bool {
    match world.random_living_actor(rng, exclude) {
        Some(new_target_id) => {
            if let Some(rocket) = world.rockets.get_mut(&rocket_id) {
                info!(
                    rocket_id = %rocket_id,
                    old_target_id = %rocket.target_id,
                    new_target_id = %new_target_id,
                    "rocket is being retargeted"
                );
                rocket.target_id = new_target_id;
            }
            true
        }
        None => {
            warn!(rocket_id = %rocket_id, "no new target for rocket, destroying rocket");
            if let Some(rocket) = world.rockets.get_mut(&rocket_id) {
                rocket.active = false;
            }
            false
        }
    }
}

/// Attempt to deflect every rocket currently targeting `actor_id`. A rocket
/// within the deflect radius reverses away from the actor, retargets, and
/// speeds up multiplicatively towards the hard cap.
pub fn deflect_rockets<R: Rng>(
    world: &mut WorldState,
    rng: &mut R,
    config: &ArenaConfig,
    actor_id: Uuid,
) {
    let Some(actor) = world.living_actor(actor_id) else {
        return;
    };

    let targeting: Vec<Uuid> = world
        .rockets
        .values()
        .filter(|r| r.active && r.target_id == actor_id)
        .map(|r| r.id)
        .collect();

    for rocket_id in targeting {
        let (position, radius) = match world.rockets.get(&rocket_id) {
            Some(rocket) => (rocket.position(), rocket.radius),
            None => continue,
        };

        if !circles_overlap(position, radius, actor.position, config.deflect_radius) {
            continue;
        }

        retarget_rocket(world, rng, rocket_id, &[actor_id]);

        if let Some(rocket) = world.rockets.get_mut(&rocket_id) {
            // Reflect the heading away from the deflecting actor.
            let away = Vec2::direction(position, actor.position).normalize().invert();
            rocket.set_direction(away);

            if rocket.speed < config.rocket_max_speed {
                let boosted = rocket.speed * (1.0 + config.rocket_speed_increase);
                rocket.speed = boosted.min(config.rocket_max_speed).round();
            }
            info!(
                rocket_id = %rocket_id,
                actor_id = %actor_id,
                speed = rocket.speed,
                "rocket deflected by actor"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::Player;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(actor_positions: &[(f32, f32)]) -> (WorldState, Vec<Uuid>, ChaCha8Rng, ArenaConfig) {
        let config = ArenaConfig::default();
        let mut world = WorldState::new(&config);
        let mut ids = Vec::new();
        for (i, (x, y)) in actor_positions.iter().enumerate() {
            let id = Uuid::new_v4();
            world
                .players
                .insert(id, Player::new(id, format!("p{}", i), *x, *y, &config));
            ids.push(id);
        }
        (world, ids, ChaCha8Rng::seed_from_u64(42), config)
    }

    fn add_rocket(world: &mut WorldState, config: &ArenaConfig, target_id: Uuid, x: f32, y: f32) -> Uuid {
        let id = Uuid::new_v4();
        let mut rocket = Rocket {
            id,
            target_id,
            x,
            y,
            direction: Vec2::new(1.0, 0.0),
            rotation: 0.0,
            radius: config.rocket_radius,
            speed: config.rocket_start_speed,
            active: true,
        };
        rocket.set_direction(Vec2::new(1.0, 0.0));
        world.rockets.insert(id, rocket);
        id
    }

    #[test]
    fn spawn_fails_without_living_actors() {
        let (mut world, _, mut rng, config) = setup(&[]);
        assert!(!spawn_rocket(&mut world, &mut rng, &config));
        assert!(world.rockets.is_empty());
    }

    #[test]
    fn spawn_targets_a_living_actor_at_world_center() {
        let (mut world, ids, mut rng, config) = setup(&[(100.0, 100.0)]);
        assert!(spawn_rocket(&mut world, &mut rng, &config));

        let rocket = world.rockets.values().next().unwrap();
        assert_eq!(rocket.target_id, ids[0]);
        assert_eq!(rocket.x, config.world_size / 2.0);
        assert_eq!(rocket.y, config.world_size / 2.0);
        assert!(rocket.active);
    }

    #[test]
    fn point_blank_rocket_confirms_hit_and_kills_target() {
        let (mut world, ids, mut rng, config) = setup(&[(400.0, 400.0)]);
        let rocket_id = add_rocket(&mut world, &config, ids[0], 405.0, 400.0);

        let outcome = update_rocket(&mut world, &mut rng, &config, rocket_id, 1.0 / 60.0);
        assert_eq!(outcome, RocketOutcome::Hit(ids[0]));
        assert!(world.players[&ids[0]].dead);
        assert!(!world.rockets[&rocket_id].active);
    }

    #[test]
    fn homing_turn_is_bounded() {
        // Target is directly behind the rocket; a single tick must not snap
        // the heading around.
        let (mut world, ids, mut rng, config) = setup(&[(100.0, 400.0)]);
        let rocket_id = add_rocket(&mut world, &config, ids[0], 600.0, 400.0);

        update_rocket(&mut world, &mut rng, &config, rocket_id, 1.0 / 60.0);

        let rocket = &world.rockets[&rocket_id];
        let turned = rocket.direction.angle().abs();
        let full_reversal = std::f32::consts::PI;
        assert!(turned > 0.0, "heading should have started turning");
        assert!(turned < full_reversal * 0.5, "heading must not snap to the target");
    }

    #[test]
    fn dead_target_triggers_retarget_to_other_actor() {
        let (mut world, ids, mut rng, config) = setup(&[(100.0, 100.0), (700.0, 700.0)]);
        let rocket_id = add_rocket(&mut world, &config, ids[0], 400.0, 400.0);

        world.players.get_mut(&ids[0]).unwrap().dead = true;
        let outcome = update_rocket(&mut world, &mut rng, &config, rocket_id, 1.0 / 60.0);

        assert_eq!(outcome, RocketOutcome::Flying);
        assert_eq!(world.rockets[&rocket_id].target_id, ids[1]);
    }

    #[test]
    fn retarget_with_no_candidates_deactivates() {
        let (mut world, ids, mut rng, config) = setup(&[(100.0, 100.0)]);
        let rocket_id = add_rocket(&mut world, &config, ids[0], 400.0, 400.0);

        world.players.get_mut(&ids[0]).unwrap().dead = true;
        let outcome = update_rocket(&mut world, &mut rng, &config, rocket_id, 1.0 / 60.0);

        assert_eq!(outcome, RocketOutcome::Deactivated);
        assert!(!world.rockets[&rocket_id].active);
    }

    #[test]
    fn deflection_changes_target_and_never_slows_the_rocket() {
        let (mut world, ids, mut rng, config) = setup(&[(400.0, 400.0), (700.0, 700.0)]);
        let rocket_id = add_rocket(&mut world, &config, ids[0], 420.0, 400.0);
        let speed_before = world.rockets[&rocket_id].speed;

        deflect_rockets(&mut world, &mut rng, &config, ids[0]);

        let rocket = &world.rockets[&rocket_id];
        assert_eq!(rocket.target_id, ids[1]);
        assert!(rocket.speed >= speed_before);
        // Heading points away from the deflector.
        assert!(rocket.direction.x > 0.0);
    }

    #[test]
    fn deflection_speed_is_capped() {
        let (mut world, ids, mut rng, config) = setup(&[(400.0, 400.0), (700.0, 700.0)]);
        let rocket_id = add_rocket(&mut world, &config, ids[0], 420.0, 400.0);
        world.rockets.get_mut(&rocket_id).unwrap().speed = config.rocket_max_speed - 1.0;

        deflect_rockets(&mut world, &mut rng, &config, ids[0]);
        assert!(world.rockets[&rocket_id].speed <= config.rocket_max_speed);
    }

    #[test]
    fn out_of_range_interact_does_not_deflect() {
        let (mut world, ids, mut rng, config) = setup(&[(400.0, 400.0), (700.0, 700.0)]);
        let rocket_id = add_rocket(&mut world, &config, ids[0], 100.0, 100.0);

        deflect_rockets(&mut world, &mut rng, &config, ids[0]);
        assert_eq!(world.rockets[&rocket_id].target_id, ids[0]);
    }
}
