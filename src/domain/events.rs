// Discrete occurrences computed per state, which a rewind may take back.

use super::types::{EntityId, Point, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Computed by dead reckoning; a rewind may retract it.
    ProjectileExploded,
    /// Authoritative removal of a ship.
    ShipDestroyed,
}

impl EventKind {
    pub fn is_simulated(&self) -> bool {
        matches!(self, EventKind::ProjectileExploded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub kind: EventKind,
    pub entity: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub at: Tick,
    pub pos: Point,
}

/// Per-state view of one discrete happening.
///
/// Consumers must poll every tick: an occurrence can disappear after the
/// state is rewound and replayed with different input.
pub trait Event {
    fn has_occurred(&self, state: usize) -> bool;

    /// Tick of the occurrence in `state`; `None` unless it occurred.
    fn occurred_at(&self, state: usize) -> Option<Tick>;
}

#[derive(Debug, Clone)]
pub struct TrackedEvent {
    key: EventKey,
    occurrences: Vec<Option<Occurrence>>,
}

impl TrackedEvent {
    pub fn key(&self) -> EventKey {
        self.key
    }

    pub fn occurrence(&self, state: usize) -> Option<Occurrence> {
        self.occurrences.get(state).copied().flatten()
    }
}

impl Event for TrackedEvent {
    fn has_occurred(&self, state: usize) -> bool {
        self.occurrence(state).is_some()
    }

    fn occurred_at(&self, state: usize) -> Option<Tick> {
        self.occurrence(state).map(|o| o.at)
    }
}

/// All events known to a state ladder, one occurrence slot per state.
#[derive(Debug, Clone)]
pub struct EventLog {
    state_count: usize,
    events: BTreeMap<EventKey, TrackedEvent>,
}

impl EventLog {
    pub fn new(state_count: usize) -> Self {
        Self {
            state_count,
            events: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: EventKey) -> Option<&TrackedEvent> {
        self.events.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedEvent> {
        self.events.values()
    }

    pub(crate) fn record(&mut self, state: usize, key: EventKey, occurrence: Occurrence) {
        let state_count = self.state_count;
        let event = self.events.entry(key).or_insert_with(|| TrackedEvent {
            key,
            occurrences: vec![None; state_count],
        });
        event.occurrences[state] = Some(occurrence);
    }

    /// Takes back simulated occurrences of `entity` at or after `from` in `state`.
    pub(crate) fn retract(&mut self, state: usize, entity: EntityId, from: Tick) {
        for (key, event) in self.events.iter_mut() {
            if key.entity != entity || !key.kind.is_simulated() {
                continue;
            }
            if let Some(slot) = event.occurrences.get_mut(state) {
                if slot.is_some_and(|o| o.at >= from) {
                    *slot = None;
                }
            }
        }
    }

    /// Drops every event of a purged entity.
    pub(crate) fn forget(&mut self, entity: EntityId) {
        self.events.retain(|key, _| key.entity != entity);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerChange {
    Spawned { key: EventKey, occurrence: Occurrence },
    Retracted { key: EventKey, occurrence: Occurrence },
}

/// Follows the events of a single state on behalf of an effect spawner.
#[derive(Debug, Clone)]
pub struct EventTracker {
    state: usize,
    spawned: BTreeMap<EventKey, Occurrence>,
}

impl EventTracker {
    pub fn new(state: usize) -> Self {
        Self {
            state,
            spawned: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> usize {
        self.state
    }

    /// Diffs the log against what was reported last time.
    ///
    /// An occurrence that moved to a different tick is reported as a
    /// retraction followed by a new spawn.
    pub fn poll(&mut self, log: &EventLog) -> Vec<TrackerChange> {
        let mut changes = Vec::new();

        let spawned = std::mem::take(&mut self.spawned);
        for (key, occurrence) in spawned {
            match log.get(key).and_then(|e| e.occurrence(self.state)) {
                Some(current) if current == occurrence => {
                    self.spawned.insert(key, occurrence);
                }
                _ => changes.push(TrackerChange::Retracted { key, occurrence }),
            }
        }

        for event in log.iter() {
            let Some(occurrence) = event.occurrence(self.state) else {
                continue;
            };
            if self.spawned.contains_key(&event.key) {
                continue;
            }
            self.spawned.insert(event.key, occurrence);
            changes.push(TrackerChange::Spawned {
                key: event.key,
                occurrence,
            });
        }

        changes
    }
}
