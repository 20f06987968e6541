// One simulation timeline of the state ladder.

use super::entity::EntityRecord;
use super::events::{EventKey, EventKind, EventLog, Occurrence};
use super::systems::{SimContext, Step, perform_dead_reckoning};
use super::types::{EntityId, EntityKind, Point, Sample, SimInput, Tick};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A world copy running `delay` ticks behind the leading state.
#[derive(Debug, Clone)]
pub struct State {
    index: usize,
    delay: Tick,
    tick_now: Tick,
    history_length: usize,
    entities: BTreeMap<EntityId, EntityRecord>,
    // Entities whose dirty mark is set, in no particular order.
    dirty_list: Vec<EntityId>,
    // Inputs for ticks this state has not reached yet.
    pending: BTreeMap<Tick, Vec<SimInput>>,
}

impl State {
    pub fn new(index: usize, delay: Tick, tick_now: Tick, history_length: usize) -> Self {
        Self {
            index,
            delay,
            tick_now,
            history_length,
            entities: BTreeMap::new(),
            dirty_list: Vec::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn delay(&self) -> Tick {
        self.delay
    }

    pub fn tick_now(&self) -> Tick {
        self.tick_now
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    pub fn dirty_entities(&self) -> &[EntityId] {
        &self.dirty_list
    }

    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Whether `id` does not exist at this state's current tick.
    pub fn is_non_existent(&self, id: EntityId) -> bool {
        self.entity(id)
            .is_none_or(|record| record.is_non_existent(self.tick_now))
    }

    /// Lowers the dirty mark of `id`, linking it into the dirty list if it was clean.
    pub fn mark_dirty_position_path(&mut self, id: EntityId, tick: Tick) -> bool {
        let Some(record) = self.entities.get_mut(&id) else {
            return false;
        };
        let newly_dirty = record.mark_dirty_position_path(tick);
        if newly_dirty {
            self.dirty_list.push(id);
        }
        newly_dirty
    }

    pub fn soft_remove(&mut self, id: EntityId, tick: Tick) -> bool {
        self.entities
            .get_mut(&id)
            .is_some_and(|record| record.soft_remove(tick))
    }

    pub fn hard_remove(&mut self, id: EntityId, tick: Tick) -> bool {
        let Some(record) = self.entities.get_mut(&id) else {
            return false;
        };
        let changed = record.hard_remove(tick);
        self.dirty_list.retain(|dirty| *dirty != id);
        changed
    }

    /// Applies `input` now if this state already passed its tick, or parks it.
    pub(crate) fn submit(&mut self, input: SimInput, events: &mut EventLog) {
        if input.tick() > self.tick_now {
            self.pending.entry(input.tick()).or_default().push(input);
            return;
        }
        self.apply_input(input, events);
    }

    fn apply_input(&mut self, input: SimInput, events: &mut EventLog) {
        match input {
            SimInput::Update(update) => {
                let Some(record) = self.entities.get_mut(&update.entity) else {
                    debug!(
                        state = self.index,
                        entity = update.entity,
                        tick = update.tick,
                        "update for unknown entity"
                    );
                    return;
                };
                // A simulated removal is only a prediction; the update may contradict it.
                if update.tick < record.created_at() || record.is_confirmed_removed(update.tick) {
                    debug!(
                        state = self.index,
                        entity = update.entity,
                        tick = update.tick,
                        "update outside entity lifetime"
                    );
                    return;
                }
                let bounces = record.sample_at(update.tick).map_or(0, |s| s.bounces);
                record.insert_authoritative(
                    update.tick,
                    Sample {
                        pos: update.pos,
                        vel: update.vel,
                        bounces,
                    },
                );
                if update.direct {
                    record.confirm_move(update.tick);
                }
                self.mark_dirty_position_path(update.entity, update.tick);
            }
            SimInput::Spawn {
                entity,
                kind,
                tick,
                pos,
                vel,
            } => {
                if self.entities.contains_key(&entity) {
                    debug!(state = self.index, entity, tick, "duplicate spawn");
                    return;
                }
                let record = EntityRecord::new(
                    entity,
                    kind,
                    self.index,
                    tick,
                    Sample::new(pos, vel),
                    self.history_length,
                );
                self.entities.insert(entity, record);
                self.mark_dirty_position_path(entity, tick);
            }
            SimInput::Remove { entity, tick } => {
                let Some(record) = self.entities.get_mut(&entity) else {
                    debug!(state = self.index, entity, tick, "remove for unknown entity");
                    return;
                };
                if !record.soft_remove(tick) || !record.kind().is_ship() {
                    return;
                }
                let pos = record
                    .sample_at(tick)
                    .or_else(|| record.history().highest().and_then(|h| record.sample_at(h)))
                    .map_or(Point::ZERO, |s| s.pos);
                events.record(
                    self.index,
                    EventKey {
                        kind: EventKind::ShipDestroyed,
                        entity,
                    },
                    Occurrence { at: tick, pos },
                );
                // Hit tests already run against the ship may have read it after its removal.
                if tick < self.tick_now {
                    self.mark_projectiles_dirty(entity, tick, self.tick_now);
                }
            }
        }
    }

    /// Advances one tick: due inputs, dirty-path resimulation, then forward simulation.
    ///
    /// `deeper` holds the states trailing this one, already advanced for this
    /// round. Returns the number of resimulated entities.
    pub(crate) fn tick(
        &mut self,
        deeper: &[State],
        ctx: SimContext<'_>,
        events: &mut EventLog,
    ) -> usize {
        self.tick_now += 1;
        let now = self.tick_now;

        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() > now {
                break;
            }
            for input in entry.remove() {
                self.apply_input(input, events);
            }
        }

        let mut resimulated = 0;
        while let Some(id) = self.pop_dirty() {
            if self.resimulate(id, deeper, ctx, events) {
                resimulated += 1;
            }
        }

        // Ships first: projectile hit tests read ship positions at the same tick.
        let mut order: Vec<(u8, EntityId)> = self
            .entities
            .values()
            .filter(|record| !record.is_non_existent(now))
            .map(|record| (record.kind().rank(), record.id()))
            .collect();
        order.sort_unstable();
        for (_, id) in order {
            let prev = self
                .entities
                .get(&id)
                .and_then(|record| record.sample_at(now - 1));
            self.step_record(id, now, prev, ctx, events);
        }

        for record in self.entities.values_mut() {
            record.prune_authoritative();
        }

        resimulated
    }

    // Oldest dirty mark first; ships before projectiles on equal marks.
    fn pop_dirty(&mut self) -> Option<EntityId> {
        let entities = &self.entities;
        self.dirty_list.retain(|id| {
            entities
                .get(id)
                .is_some_and(|record| record.dirty_mark().is_some())
        });

        let (position, _) = self
            .dirty_list
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                let record = entities.get(id)?;
                Some((position, (record.dirty_mark()?, record.kind().rank(), *id)))
            })
            .min_by_key(|(_, key)| *key)?;

        Some(self.dirty_list.swap_remove(position))
    }

    /// Recomputes the path of `id` from its dirty mark up to the previous tick.
    fn resimulate(
        &mut self,
        id: EntityId,
        deeper: &[State],
        ctx: SimContext<'_>,
        events: &mut EventLog,
    ) -> bool {
        let now = self.tick_now;
        let Some(record) = self.entities.get_mut(&id) else {
            return false;
        };
        let Some(mark) = record.dirty_mark() else {
            return false;
        };
        record.clear_dirty();
        assert!(
            record.created_at() <= now,
            "entity {id} in the dirty list of state {} is created at {} after tick {now}",
            self.index,
            record.created_at(),
        );
        let kind = record.kind();

        // Marked for the current tick: forward simulation covers it.
        let end = now - 1;
        if mark > end {
            return false;
        }

        let Some((start, prev)) = self.resimulation_start(id, mark, deeper) else {
            debug!(state = self.index, entity = id, mark, "no base sample to resimulate from");
            return false;
        };

        if let Some(record) = self.entities.get_mut(&id) {
            record.rewind(start);
        }
        events.retract(self.index, id, start);

        let mut prev = prev;
        for tick in start..=end {
            match self.step_record(id, tick, prev, ctx, events) {
                Some(sample) => prev = Some(sample),
                None => break,
            }
        }
        debug!(state = self.index, entity = id, from = start, to = end, "resimulated path");

        if kind.is_ship() {
            self.mark_projectiles_dirty(id, start, end);
        }
        true
    }

    /// First tick to recompute and the sample preceding it.
    fn resimulation_start(
        &self,
        id: EntityId,
        mark: Tick,
        deeper: &[State],
    ) -> Option<(Tick, Option<Sample>)> {
        let record = self.entities.get(&id)?;
        if record.authoritative_at(mark).is_some() {
            return Some((mark, None));
        }

        let prev_tick = mark.checked_sub(1)?;
        if let Some(prev) = record.sample_at(prev_tick) {
            return Some((mark, Some(prev)));
        }

        // Deeper states reach further back for the same entity.
        let deeper_prev = deeper
            .iter()
            .filter_map(|state| state.entity(id))
            .filter(|other| other.is_linked())
            .find_map(|other| other.sample_at(prev_tick));
        if let Some(prev) = deeper_prev {
            return Some((mark, Some(prev)));
        }

        let history = record.history();
        let base = if prev_tick < history.lowest()? {
            history.lowest()?
        } else {
            history.highest()?
        };
        warn!(
            state = self.index,
            entity = id,
            mark,
            base,
            "dirty mark outside history, resimulating from nearest sample"
        );
        Some((base + 1, Some(record.sample_at(base)?)))
    }

    // Projectile hit tests read ship positions, so a changed ship path
    // invalidates every projectile that may have crossed it.
    fn mark_projectiles_dirty(&mut self, ship: EntityId, from: Tick, to: Tick) {
        let affected: Vec<EntityId> = self
            .entities
            .values()
            .filter(|record| match record.kind() {
                EntityKind::Projectile { owner, .. } => owner != ship,
                EntityKind::Ship => false,
            })
            .filter(|record| record.is_linked() && record.created_at() <= to)
            .filter(|record| record.soft_remove_tick().is_none_or(|removed| removed >= from))
            .map(EntityRecord::id)
            .collect();

        for projectile in affected {
            self.mark_dirty_position_path(projectile, from);
        }
    }

    /// Stores the sample of `id` at `tick`. Returns `None` once the entity stops existing.
    fn step_record(
        &mut self,
        id: EntityId,
        tick: Tick,
        prev: Option<Sample>,
        ctx: SimContext<'_>,
        events: &mut EventLog,
    ) -> Option<Sample> {
        let record = self.entities.get(&id)?;
        if record.is_non_existent(tick) {
            return None;
        }
        let kind = record.kind();
        let step = match record.authoritative_at(tick) {
            Some(sample) => Step {
                sample,
                explosion: None,
            },
            None => {
                let prev = prev?;
                let ships = if kind.is_ship() {
                    Vec::new()
                } else {
                    self.ships_at(tick)
                };
                perform_dead_reckoning(kind, tick, prev, &ships, ctx)
            }
        };

        let record = self.entities.get_mut(&id)?;
        record.store(tick, step.sample);
        if let Some(explosion) = step.explosion {
            record.simulated_remove(tick);
            events.record(
                self.index,
                EventKey {
                    kind: EventKind::ProjectileExploded,
                    entity: id,
                },
                Occurrence {
                    at: tick,
                    pos: explosion.pos,
                },
            );
            debug!(state = self.index, entity = id, tick, cause = ?explosion.cause, "projectile exploded");
            return None;
        }
        Some(step.sample)
    }

    fn ships_at(&self, tick: Tick) -> Vec<(EntityId, Point)> {
        self.entities
            .values()
            .filter(|record| record.kind().is_ship() && !record.is_non_existent(tick))
            .filter_map(|record| record.sample_at(tick).map(|s| (record.id(), s.pos)))
            .collect()
    }

    /// Unlinks records removed at or before `horizon` and drops the ones unlinked earlier.
    pub(crate) fn collect_garbage(&mut self, horizon: Tick) -> Vec<EntityId> {
        let purged: Vec<EntityId> = self
            .entities
            .values()
            .filter(|record| record.hard_remove_tick().is_some_and(|t| t <= horizon))
            .map(EntityRecord::id)
            .collect();
        for id in &purged {
            self.entities.remove(id);
        }

        let expired: Vec<(EntityId, Tick)> = self
            .entities
            .values()
            .filter(|record| record.hard_remove_tick().is_none())
            .filter_map(|record| {
                let removed = record.soft_remove_tick()?;
                (removed <= horizon).then_some((record.id(), removed))
            })
            .collect();
        for (id, removed) in expired {
            self.hard_remove(id, removed);
        }

        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::map::OpenSpace;
    use crate::domain::tuning::projectile::ProjectileTuning;
    use crate::domain::tuning::ship::ShipTuning;

    #[test]
    #[should_panic(expected = "created at")]
    fn when_dirty_entry_is_created_after_current_tick_then_ticking_panics() {
        let mut state = State::new(0, 0, 5, 16);
        let mut record = EntityRecord::new(
            1,
            EntityKind::Ship,
            0,
            10,
            Sample::new(Point::ZERO, Point::new(1, 0)),
            16,
        );
        record.mark_dirty_position_path(10);
        state.entities.insert(1, record);
        state.dirty_list.push(1);

        let ship = ShipTuning::default();
        let projectile = ProjectileTuning::default();
        let ctx = SimContext {
            map: &OpenSpace,
            ship: &ship,
            projectile: &projectile,
        };
        state.tick(&[], ctx, &mut EventLog::new(1));
    }

    #[test]
    fn when_input_is_ahead_of_the_state_then_it_is_parked_until_due() {
        let mut state = State::new(0, 0, 5, 16);
        let mut events = EventLog::new(1);
        let ship = ShipTuning::default();
        let projectile = ProjectileTuning::default();
        let ctx = SimContext {
            map: &OpenSpace,
            ship: &ship,
            projectile: &projectile,
        };

        state.submit(
            SimInput::Spawn {
                entity: 1,
                kind: EntityKind::Ship,
                tick: 7,
                pos: Point::ZERO,
                vel: Point::ZERO,
            },
            &mut events,
        );
        assert_eq!(state.pending_len(), 1);
        assert!(state.entity(1).is_none());

        state.tick(&[], ctx, &mut events);
        assert!(state.entity(1).is_none());
        state.tick(&[], ctx, &mut events);

        assert_eq!(state.pending_len(), 0);
        assert!(state.entity(1).is_some_and(|r| r.created_at() == 7));
        assert!(!state.is_non_existent(1));
    }
}
