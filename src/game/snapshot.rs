//! Patch building: diffing world state for network transmission
//!
//! The simulation runs at 60 ticks per second but clients only receive a
//! patch every third tick. A patch carries adds (full records), removes
//! (ids), and changes (per-field deltas) against the previous patch, so a
//! steady-state patch is mostly positions.

use std::collections::HashMap;

use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{
    BotDelta, BotEntry, MapPatch, PhaseMetaState, PlayerDelta, PlayerEntry, RocketDelta,
    RocketEntry, WorldPatch,
};

use super::world::WorldState;

/// The view of the world as of the last patch, kept for diffing
#[derive(Debug, Clone, Default)]
struct WorldView {
    meta: Option<PhaseMetaState>,
    players: HashMap<Uuid, PlayerEntry>,
    bots: HashMap<Uuid, BotEntry>,
    rockets: HashMap<Uuid, RocketEntry>,
}

/// Builds world patches at the patch cadence
pub struct PatchBuilder {
    /// Ticks since the last patch was sent
    ticks_since_patch: u32,
    /// Patch interval in ticks
    patch_interval: u32,
    prev: WorldView,
}

impl PatchBuilder {
    pub fn new(patch_interval: u32) -> Self {
        Self {
            ticks_since_patch: 0,
            patch_interval,
            prev: WorldView::default(),
        }
    }

    /// Check if it's time to send a patch
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_patch += 1;
        if self.ticks_since_patch >= self.patch_interval {
            self.ticks_since_patch = 0;
            true
        } else {
            false
        }
    }

    /// Force a patch on the next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_patch = self.patch_interval;
    }

    /// Forget the previous view so the next patch re-adds every entity.
    /// Clients treat an add for a known id as an upsert, which makes this
    /// the keyframe mechanism for newly connected clients.
    pub fn reset(&mut self) {
        self.prev = WorldView::default();
        self.force_next();
    }

    /// Diff the world against the previous view and advance the view.
    pub fn build(&mut self, tick: u64, world: &WorldState) -> WorldPatch {
        let current = capture(world);

        let meta = if self.prev.meta.as_ref() != Some(&current.meta) {
            Some(current.meta.clone())
        } else {
            None
        };

        let players = diff_map(
            &self.prev.players,
            &current.players,
            |prev: &PlayerEntry, curr: &PlayerEntry| PlayerDelta {
                id: curr.id,
                x: changed(prev.x, curr.x),
                y: changed(prev.y, curr.y),
                speed: changed(prev.speed, curr.speed),
                dead: changed(prev.dead, curr.dead),
                frozen: changed(prev.frozen, curr.frozen),
            },
        );

        let bots = diff_map(
            &self.prev.bots,
            &current.bots,
            |prev: &BotEntry, curr: &BotEntry| BotDelta {
                id: curr.id,
                x: changed(prev.x, curr.x),
                y: changed(prev.y, curr.y),
                target_x: changed(prev.target_x, curr.target_x),
                target_y: changed(prev.target_y, curr.target_y),
                speed: changed(prev.speed, curr.speed),
                dead: changed(prev.dead, curr.dead),
                frozen: changed(prev.frozen, curr.frozen),
            },
        );

        let rockets = diff_map(
            &self.prev.rockets,
            &current.rockets,
            |prev: &RocketEntry, curr: &RocketEntry| RocketDelta {
                id: curr.id,
                x: changed(prev.x, curr.x),
                y: changed(prev.y, curr.y),
                rotation: changed(prev.rotation, curr.rotation),
                speed: changed(prev.speed, curr.speed),
                target_id: changed(prev.target_id, curr.target_id),
            },
        );

        self.prev = WorldView {
            meta: Some(current.meta),
            players: current.players,
            bots: current.bots,
            rockets: current.rockets,
        };

        WorldPatch {
            tick,
            server_time: unix_millis(),
            meta,
            players,
            bots,
            rockets,
        }
    }
}

/// A field delta: Some only when the value changed.
fn changed<T: PartialEq>(prev: T, curr: T) -> Option<T> {
    if prev != curr {
        Some(curr)
    } else {
        None
    }
}

/// Snapshot of the world as wire entries
struct CapturedView {
    meta: PhaseMetaState,
    players: HashMap<Uuid, PlayerEntry>,
    bots: HashMap<Uuid, BotEntry>,
    rockets: HashMap<Uuid, RocketEntry>,
}

fn capture(world: &WorldState) -> CapturedView {
    CapturedView {
        meta: world.meta.clone(),
        players: world
            .players
            .values()
            .map(|p| {
                (
                    p.id,
                    PlayerEntry {
                        id: p.id,
                        name: p.name.clone(),
                        x: p.x,
                        y: p.y,
                        radius: p.radius,
                        speed: p.speed,
                        dead: p.dead,
                        frozen: p.frozen,
                    },
                )
            })
            .collect(),
        bots: world
            .bots
            .values()
            .map(|b| {
                (
                    b.id,
                    BotEntry {
                        id: b.id,
                        name: b.name.clone(),
                        x: b.x,
                        y: b.y,
                        target_x: b.target_x,
                        target_y: b.target_y,
                        radius: b.radius,
                        speed: b.speed,
                        dead: b.dead,
                        frozen: b.frozen,
                        difficulty: b.difficulty,
                    },
                )
            })
            .collect(),
        rockets: world
            .rockets
            .values()
            .map(|r| {
                (
                    r.id,
                    RocketEntry {
                        id: r.id,
                        target_id: r.target_id,
                        x: r.x,
                        y: r.y,
                        rotation: r.rotation,
                        radius: r.radius,
                        speed: r.speed,
                    },
                )
            })
            .collect(),
    }
}

/// Diff two id-keyed maps into added (full records), removed (ids), and
/// changed (field deltas, only for entries with at least one changed field).
fn diff_map<F, D>(
    prev: &HashMap<Uuid, F>,
    curr: &HashMap<Uuid, F>,
    delta: impl Fn(&F, &F) -> D,
) -> MapPatch<F, D>
where
    F: Clone + PartialEq,
    D: PartialEq + Default + HasId,
{
    let mut patch = MapPatch::default();

    for (id, entry) in curr {
        match prev.get(id) {
            None => patch.added.push(entry.clone()),
            Some(prev_entry) if prev_entry != entry => {
                let d = delta(prev_entry, entry);
                if d != D::default_with_id(d.id()) {
                    patch.changed.push(d);
                }
            }
            Some(_) => {}
        }
    }

    for id in prev.keys() {
        if !curr.contains_key(id) {
            patch.removed.push(*id);
        }
    }

    patch
}

/// Deltas carry their entity id even when no field changed; comparing
/// against an id-only default filters out empty deltas.
pub trait HasId: Sized {
    fn id(&self) -> Uuid;
    fn default_with_id(id: Uuid) -> Self;
}

macro_rules! impl_has_id {
    ($ty:ty) => {
        impl HasId for $ty {
            fn id(&self) -> Uuid {
                self.id
            }
            fn default_with_id(id: Uuid) -> Self {
                Self {
                    id,
                    ..Default::default()
                }
            }
        }
    };
}

impl_has_id!(PlayerDelta);
impl_has_id!(BotDelta);
impl_has_id!(RocketDelta);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::game::world::Player;
    use crate::util::time::{PATCH_TPS, SIMULATION_TPS};

    fn world_with_one_player() -> (WorldState, Uuid) {
        let config = ArenaConfig::default();
        let mut world = WorldState::new(&config);
        let id = Uuid::new_v4();
        world
            .players
            .insert(id, Player::new(id, "tester".into(), 100.0, 100.0, &config));
        (world, id)
    }

    #[test]
    fn cadence_is_every_third_tick() {
        let mut builder = PatchBuilder::new(SIMULATION_TPS / PATCH_TPS);
        let sends: Vec<bool> = (0..9).map(|_| builder.should_send()).collect();
        assert_eq!(
            sends,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn first_patch_adds_everything_including_meta() {
        let (world, id) = world_with_one_player();
        let mut builder = PatchBuilder::new(3);

        let patch = builder.build(1, &world);
        assert!(patch.meta.is_some());
        assert_eq!(patch.players.added.len(), 1);
        assert_eq!(patch.players.added[0].id, id);
        assert!(patch.players.changed.is_empty());
        assert!(patch.bots.is_empty());
        assert!(patch.rockets.is_empty());
    }

    #[test]
    fn unchanged_world_produces_empty_patch() {
        let (world, _) = world_with_one_player();
        let mut builder = PatchBuilder::new(3);
        builder.build(1, &world);

        let patch = builder.build(2, &world);
        assert!(patch.meta.is_none());
        assert!(patch.players.is_empty());
        assert!(patch.bots.is_empty());
        assert!(patch.rockets.is_empty());
    }

    #[test]
    fn moved_player_yields_position_only_delta() {
        let (mut world, id) = world_with_one_player();
        let mut builder = PatchBuilder::new(3);
        builder.build(1, &world);

        world.players.get_mut(&id).unwrap().x = 150.0;
        let patch = builder.build(2, &world);

        assert_eq!(patch.players.changed.len(), 1);
        let delta = &patch.players.changed[0];
        assert_eq!(delta.id, id);
        assert_eq!(delta.x, Some(150.0));
        assert_eq!(delta.y, None);
        assert_eq!(delta.dead, None);
    }

    #[test]
    fn removed_player_appears_in_removed() {
        let (mut world, id) = world_with_one_player();
        let mut builder = PatchBuilder::new(3);
        builder.build(1, &world);

        world.players.remove(&id);
        let patch = builder.build(2, &world);
        assert_eq!(patch.players.removed, vec![id]);
        assert!(patch.players.added.is_empty());
    }

    #[test]
    fn reset_readds_all_entities() {
        let (world, id) = world_with_one_player();
        let mut builder = PatchBuilder::new(3);
        builder.build(1, &world);

        builder.reset();
        assert!(builder.should_send());
        let patch = builder.build(2, &world);
        assert_eq!(patch.players.added.len(), 1);
        assert_eq!(patch.players.added[0].id, id);
        assert!(patch.meta.is_some());
    }

    #[test]
    fn meta_only_present_on_change() {
        let (mut world, _) = world_with_one_player();
        let mut builder = PatchBuilder::new(3);
        builder.build(1, &world);

        world.meta.elapsed_secs = 1;
        let patch = builder.build(2, &world);
        assert!(patch.meta.is_some());

        let patch = builder.build(3, &world);
        assert!(patch.meta.is_none());
    }
}
