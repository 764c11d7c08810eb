//! Client-side snapshot interpolation
//!
//! Patches arrive at 20 Hz while clients render at display rate, so rendered
//! entities replay the server's history with a short delay. Each entity owns
//! an [`Interpolator`] fed with the partial state changes decoded from
//! patches; `tick` advances the replay clock and yields the state to render.
//!
//! Partial changes are materialized into absolute snapshots at enqueue time,
//! so the queue always holds complete states and the blend step is a plain
//! lerp. Progress through a pair of snapshots is tracked per snapshot id;
//! when a frame overshoots a pair, the overflow is carried into the next
//! pair in the same call rather than dropped.
//!
//! The dead flag lives outside the queue: a death renders the moment it is
//! decoded, while the queued positions keep draining one snapshot per frame
//! without smoothing, so a corpse lands on its last authoritative position
//! instead of gliding there.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use crate::util::vec2::lerp_angle;
use crate::ws::protocol::{
    BotDelta, BotEntry, PlayerDelta, PlayerEntry, RocketDelta, RocketEntry,
};

/// A gap this long since the previous patch means the entity's history is
/// stale and replaying it would rubber-band, so the queue is dropped.
const STALE_AFTER_MS: f64 = 80.0;

/// Renderable state of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub speed: f32,
    pub dead: bool,
}

/// A partial state change decoded from a patch. Absent fields keep their
/// previous value.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateChange {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub rotation: Option<f32>,
    pub speed: Option<f32>,
    pub dead: Option<bool>,
}

impl From<&PlayerDelta> for StateChange {
    fn from(d: &PlayerDelta) -> Self {
        Self {
            x: d.x,
            y: d.y,
            rotation: None,
            speed: d.speed,
            dead: d.dead,
        }
    }
}

impl From<&BotDelta> for StateChange {
    fn from(d: &BotDelta) -> Self {
        Self {
            x: d.x,
            y: d.y,
            rotation: None,
            speed: d.speed,
            dead: d.dead,
        }
    }
}

impl From<&RocketDelta> for StateChange {
    fn from(d: &RocketDelta) -> Self {
        Self {
            x: d.x,
            y: d.y,
            rotation: d.rotation,
            speed: d.speed,
            dead: None,
        }
    }
}

impl From<&PlayerEntry> for StateChange {
    fn from(e: &PlayerEntry) -> Self {
        Self {
            x: Some(e.x),
            y: Some(e.y),
            rotation: None,
            speed: Some(e.speed),
            dead: Some(e.dead),
        }
    }
}

impl From<&BotEntry> for StateChange {
    fn from(e: &BotEntry) -> Self {
        Self {
            x: Some(e.x),
            y: Some(e.y),
            rotation: None,
            speed: Some(e.speed),
            dead: Some(e.dead),
        }
    }
}

impl From<&RocketEntry> for StateChange {
    fn from(e: &RocketEntry) -> Self {
        Self {
            x: Some(e.x),
            y: Some(e.y),
            rotation: Some(e.rotation),
            speed: Some(e.speed),
            dead: None,
        }
    }
}

/// The queue-replicated fields; `dead` is deliberately not one of them
#[derive(Debug, Clone, Copy)]
struct SnapshotFields {
    x: f32,
    y: f32,
    rotation: f32,
    speed: f32,
}

/// An absolute snapshot queued for replay
#[derive(Debug, Clone, Copy)]
struct TimedSnapshot {
    id: u64,
    at_ms: f64,
    fields: SnapshotFields,
}

/// Replays one entity's patch history a beat behind the server
pub struct Interpolator {
    queue: VecDeque<TimedSnapshot>,
    /// Replay progress in milliseconds, keyed by the id of the snapshot
    /// being approached
    elapsed: HashMap<u64, f32>,
    /// Overshoot from a consumed pair, seeding the next pair's progress
    carry: f32,
    next_id: u64,
    last_push_ms: Option<f64>,
    /// Most recently materialized absolute fields, used to fill absent
    /// fields of the next partial change
    latest: SnapshotFields,
    current: SnapshotFields,
    dead: bool,
}

impl Interpolator {
    /// Start from the entity's first full record.
    pub fn new(initial: EntityState) -> Self {
        let fields = SnapshotFields {
            x: initial.x,
            y: initial.y,
            rotation: initial.rotation,
            speed: initial.speed,
        };
        Self {
            queue: VecDeque::new(),
            elapsed: HashMap::new(),
            carry: 0.0,
            next_id: 0,
            last_push_ms: None,
            latest: fields,
            current: fields,
            dead: initial.dead,
        }
    }

    /// Enqueue a state change stamped with the patch's server time.
    pub fn push(&mut self, change: StateChange, at_ms: f64) {
        if let Some(last) = self.last_push_ms {
            if at_ms - last > STALE_AFTER_MS {
                self.queue.clear();
                self.elapsed.clear();
                self.carry = 0.0;
            }
        }
        self.last_push_ms = Some(at_ms);

        // Life state renders the moment it is decoded, independent of the
        // position queue.
        if let Some(dead) = change.dead {
            self.dead = dead;
        }

        let fields = SnapshotFields {
            x: change.x.unwrap_or(self.latest.x),
            y: change.y.unwrap_or(self.latest.y),
            rotation: change.rotation.unwrap_or(self.latest.rotation),
            speed: change.speed.unwrap_or(self.latest.speed),
        };
        self.latest = fields;

        // An empty queue means there is no history to replay from, so the
        // snapshot doubles as the render state and the replay base.
        if self.queue.is_empty() {
            self.current = fields;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.queue.push_back(TimedSnapshot { id, at_ms, fields });
    }

    /// Advance the replay clock by one render frame and return the state to
    /// draw. Consumes as many queued pairs as the frame covers.
    pub fn tick(&mut self, dt_ms: f32) -> EntityState {
        // Dead entities drain one snapshot per frame, applied directly.
        if self.dead {
            if let Some(snapshot) = self.queue.pop_front() {
                self.elapsed.remove(&snapshot.id);
                self.current = snapshot.fields;
            }
            self.carry = 0.0;
            return self.state();
        }

        let mut dt = dt_ms;

        loop {
            if self.queue.len() < 2 {
                break;
            }

            let from = self.queue[0];
            let to = self.queue[1];
            let gap = (to.at_ms - from.at_ms) as f32;

            if gap <= 0.0 {
                self.elapsed.remove(&to.id);
                self.current = to.fields;
                self.queue.pop_front();
                continue;
            }

            let carry = std::mem::take(&mut self.carry);
            let progress = self.elapsed.entry(to.id).or_insert(carry);
            *progress += dt;
            let rate = *progress / gap;

            if rate < 1.0 {
                self.current = blend(&from.fields, &to.fields, rate);
                break;
            }

            // Overshot this pair: land on `to` and spend the remainder on
            // the next pair.
            dt = *progress - gap;
            self.elapsed.remove(&to.id);
            self.current = to.fields;
            self.queue.pop_front();

            if self.queue.len() < 2 {
                self.carry = dt;
                break;
            }
        }

        self.state()
    }

    pub fn state(&self) -> EntityState {
        EntityState {
            x: self.current.x,
            y: self.current.y,
            rotation: self.current.rotation,
            speed: self.current.speed,
            dead: self.dead,
        }
    }

    /// Queued snapshots not yet fully replayed
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

fn blend(from: &SnapshotFields, to: &SnapshotFields, rate: f32) -> SnapshotFields {
    SnapshotFields {
        x: from.x + (to.x - from.x) * rate,
        y: from.y + (to.y - from.y) * rate,
        rotation: lerp_angle(from.rotation, to.rotation, rate),
        speed: to.speed,
    }
}

/// Interpolators for every replicated entity in a patch stream, keyed by
/// entity id
#[derive(Default)]
pub struct InterpolationSet {
    entities: HashMap<Uuid, Interpolator>,
}

impl InterpolationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert from a full record in a patch's `added` list.
    pub fn add(&mut self, id: Uuid, change: StateChange, at_ms: f64) {
        match self.entities.get_mut(&id) {
            Some(interp) => interp.push(change, at_ms),
            None => {
                let initial = EntityState {
                    x: change.x.unwrap_or(0.0),
                    y: change.y.unwrap_or(0.0),
                    rotation: change.rotation.unwrap_or(0.0),
                    speed: change.speed.unwrap_or(0.0),
                    dead: change.dead.unwrap_or(false),
                };
                self.entities.insert(id, Interpolator::new(initial));
            }
        }
    }

    /// Apply a field delta from a patch's `changed` list. Deltas for ids
    /// that never got an add are dropped.
    pub fn change(&mut self, id: Uuid, change: StateChange, at_ms: f64) {
        if let Some(interp) = self.entities.get_mut(&id) {
            interp.push(change, at_ms);
        }
    }

    pub fn remove(&mut self, id: &Uuid) {
        self.entities.remove(id);
    }

    /// Advance every entity one render frame.
    pub fn tick(&mut self, dt_ms: f32) {
        for interp in self.entities.values_mut() {
            interp.tick(dt_ms);
        }
    }

    pub fn state(&self, id: &Uuid) -> Option<EntityState> {
        self.entities.get(id).map(|i| i.state())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
