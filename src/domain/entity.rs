// Per-state record of one simulated entity.

use super::dirty::DirtyPath;
use super::history::HistoricBuffer;
use super::types::{EntityId, EntityKind, Sample, Tick};
use std::collections::BTreeMap;

/// One (entity, state) pair's materialized object.
///
/// The same logical entity has one record per state; records find each other
/// through the entity id, as long as they are still linked into the
/// cross-state index.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    id: EntityId,
    kind: EntityKind,
    state: usize,
    created_at: Tick,

    // Removal caused by an authoritative input; only ever moves earlier.
    confirmed_removal: Option<Tick>,
    // Removal computed by dead reckoning; lifted again by a rewind.
    simulated_removal: Option<Tick>,
    hard_removed_at: Option<Tick>,
    linked: bool,

    history: HistoricBuffer<Sample>,
    // Samples that resimulation must reproduce instead of dead reckoning.
    authoritative: BTreeMap<Tick, Sample>,
    dirty: DirtyPath,
    last_confirmed_move: Option<Tick>,
}

impl EntityRecord {
    pub fn new(
        id: EntityId,
        kind: EntityKind,
        state: usize,
        created_at: Tick,
        initial: Sample,
        history_length: usize,
    ) -> Self {
        let mut history = HistoricBuffer::new(history_length);
        history.set(created_at, initial);
        let mut authoritative = BTreeMap::new();
        authoritative.insert(created_at, initial);

        Self {
            id,
            kind,
            state,
            created_at,
            confirmed_removal: None,
            simulated_removal: None,
            hard_removed_at: None,
            linked: true,
            history,
            authoritative,
            dirty: DirtyPath::default(),
            last_confirmed_move: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Index of the state owning this record.
    pub fn state_index(&self) -> usize {
        self.state
    }

    pub fn created_at(&self) -> Tick {
        self.created_at
    }

    /// Earliest tick at which the entity no longer exists, if known.
    pub fn soft_remove_tick(&self) -> Option<Tick> {
        min_tick(self.confirmed_removal, self.simulated_removal)
    }

    pub fn hard_remove_tick(&self) -> Option<Tick> {
        self.hard_removed_at
    }

    fn removal_tick(&self) -> Option<Tick> {
        min_tick(self.soft_remove_tick(), self.hard_removed_at)
    }

    pub fn is_removed(&self, tick: Tick) -> bool {
        self.removal_tick().is_some_and(|removed| tick >= removed)
    }

    /// Whether an authoritative removal, not a predicted one, covers `tick`.
    pub fn is_confirmed_removed(&self, tick: Tick) -> bool {
        min_tick(self.confirmed_removal, self.hard_removed_at).is_some_and(|removed| tick >= removed)
    }

    pub fn is_non_existent(&self, tick: Tick) -> bool {
        tick < self.created_at || self.is_removed(tick)
    }

    /// Whether other states can still reach this record.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Sets or lowers the removal tick. Later ticks than a known removal are ignored.
    pub fn soft_remove(&mut self, tick: Tick) -> bool {
        lower(&mut self.confirmed_removal, tick)
    }

    /// Like [`Self::soft_remove`], and also unlinks the record and drops its dirty mark.
    pub fn hard_remove(&mut self, tick: Tick) -> bool {
        let changed = lower(&mut self.hard_removed_at, tick);
        self.linked = false;
        self.dirty.clear();
        changed
    }

    pub(crate) fn simulated_remove(&mut self, tick: Tick) {
        lower(&mut self.simulated_removal, tick);
    }

    pub fn history(&self) -> &HistoricBuffer<Sample> {
        &self.history
    }

    pub fn sample_at(&self, tick: Tick) -> Option<Sample> {
        self.history.get(tick)
    }

    pub fn authoritative_at(&self, tick: Tick) -> Option<Sample> {
        self.authoritative.get(&tick).copied()
    }

    pub(crate) fn insert_authoritative(&mut self, tick: Tick, sample: Sample) {
        self.authoritative.insert(tick, sample);
    }

    /// Records a confirmed move of a directly controlled entity.
    pub(crate) fn confirm_move(&mut self, tick: Tick) {
        self.last_confirmed_move = Some(self.last_confirmed_move.map_or(tick, |t| t.max(tick)));
    }

    pub fn last_confirmed_move(&self) -> Option<Tick> {
        self.last_confirmed_move
    }

    pub(crate) fn store(&mut self, tick: Tick, sample: Sample) {
        self.history.set(tick, sample);
    }

    /// Lowers the dirty mark, never below the creation tick.
    /// Returns true if the record was clean and must be linked into the dirty list.
    pub fn mark_dirty_position_path(&mut self, tick: Tick) -> bool {
        if !self.linked {
            return false;
        }
        self.dirty.mark_dirty(tick.max(self.created_at))
    }

    pub fn is_dirty(&self, tick: Tick) -> bool {
        self.dirty.is_dirty(tick)
    }

    pub fn dirty_mark(&self) -> Option<Tick> {
        self.dirty.mark()
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Forgets everything derived from dead reckoning at or after `tick`.
    pub(crate) fn rewind(&mut self, tick: Tick) {
        if self.simulated_removal.is_some_and(|removed| removed >= tick) {
            self.simulated_removal = None;
        }
        self.history.discard_after(tick.saturating_sub(1));
        if tick == 0 {
            self.history.clear();
        }
    }

    /// Drops authoritative samples that fell out of the history window.
    pub(crate) fn prune_authoritative(&mut self) {
        if let Some(lowest) = self.history.lowest() {
            self.authoritative = self.authoritative.split_off(&lowest);
        }
    }
}

fn min_tick(a: Option<Tick>, b: Option<Tick>) -> Option<Tick> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn lower(slot: &mut Option<Tick>, tick: Tick) -> bool {
    match *slot {
        Some(existing) if existing <= tick => false,
        _ => {
            *slot = Some(tick);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Point;

    fn ship(created_at: Tick) -> EntityRecord {
        EntityRecord::new(
            1,
            EntityKind::Ship,
            0,
            created_at,
            Sample::new(Point::new(0, 0), Point::new(1, 0)),
            32,
        )
    }

    #[test]
    fn when_tick_precedes_creation_then_entity_does_not_exist() {
        let record = ship(90);

        assert!(record.is_non_existent(0));
        assert!(record.is_non_existent(89));
        assert!(!record.is_non_existent(90));
        assert!(!record.is_non_existent(1_000));
    }

    #[test]
    fn when_soft_removed_twice_then_earliest_removal_wins() {
        let mut record = ship(90);

        assert!(record.soft_remove(105));
        assert!(record.soft_remove(104));

        assert!(record.is_removed(104));
        assert!(!record.is_removed(103));
        assert_eq!(record.soft_remove_tick(), Some(104));
    }

    #[test]
    fn when_later_soft_removal_arrives_then_it_is_ignored() {
        let mut record = ship(90);
        record.soft_remove(104);

        assert!(!record.soft_remove(110));
        assert!(!record.soft_remove(104));

        assert_eq!(record.soft_remove_tick(), Some(104));
        assert!(record.is_linked());
    }

    #[test]
    fn when_hard_removed_then_record_is_unlinked_and_clean() {
        let mut record = ship(90);
        record.mark_dirty_position_path(95);

        assert!(record.hard_remove(100));
        assert!(!record.hard_remove(120));

        assert!(!record.is_linked());
        assert_eq!(record.dirty_mark(), None);
        assert_eq!(record.hard_remove_tick(), Some(100));
        assert!(record.is_non_existent(100));
        assert!(!record.is_non_existent(99));
        assert!(!record.mark_dirty_position_path(95));
    }

    #[test]
    fn when_dirty_mark_precedes_creation_then_it_is_clamped() {
        let mut record = ship(90);

        assert!(record.mark_dirty_position_path(85));

        assert!(!record.is_dirty(89));
        assert!(record.is_dirty(90));
        assert!(!record.mark_dirty_position_path(95));
        assert_eq!(record.dirty_mark(), Some(90));
    }

    #[test]
    fn when_rewound_then_simulated_removal_is_lifted_but_confirmed_one_stays() {
        let mut record = ship(90);
        record.simulated_remove(100);

        record.rewind(95);
        assert_eq!(record.soft_remove_tick(), None);

        record.soft_remove(120);
        record.simulated_remove(110);
        record.rewind(95);
        assert_eq!(record.soft_remove_tick(), Some(120));
    }

    #[test]
    fn when_removal_is_only_simulated_then_it_is_not_confirmed() {
        let mut record = ship(90);
        record.simulated_remove(100);

        assert!(record.is_removed(100));
        assert!(!record.is_confirmed_removed(100));

        record.soft_remove(110);
        assert!(!record.is_confirmed_removed(109));
        assert!(record.is_confirmed_removed(110));
    }

    #[test]
    fn when_authoritative_samples_age_out_then_they_are_pruned() {
        let mut record = EntityRecord::new(1, EntityKind::Ship, 0, 0, Sample::default(), 4);
        for tick in 1..=10 {
            record.store(tick, Sample::default());
        }
        record.insert_authoritative(8, Sample::default());

        record.prune_authoritative();

        assert_eq!(record.authoritative_at(0), None);
        assert!(record.authoritative_at(8).is_some());
    }
}
