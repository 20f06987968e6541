// Ordered collection of trailing states advanced in lock-step.

use super::entity::EntityRecord;
use super::events::EventLog;
use super::history::HistoricBuffer;
use super::map::CollisionMap;
use super::state::State;
use super::systems::SimContext;
use super::tuning::projectile::ProjectileTuning;
use super::tuning::ship::ShipTuning;
use super::types::{EntityId, Point, Sample, SimInput, Tick};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Shape of a state ladder and the tuning its states simulate with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderSettings {
    /// Delay of every state behind the leading one, strictly ascending.
    pub delays: Vec<Tick>,
    /// Ticks of history each entity record keeps.
    pub history_length: usize,
    /// Tick of the leading state at construction.
    pub initial_tick: Tick,
    pub ship: ShipTuning,
    pub projectile: ProjectileTuning,
}

impl Default for LadderSettings {
    fn default() -> Self {
        Self {
            delays: vec![0, 8, 32],
            history_length: 128,
            initial_tick: 0,
            ship: ShipTuning::default(),
            projectile: ProjectileTuning::default(),
        }
    }
}

/// Errors returned when validating ladder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// At least one state is required.
    NoStates,
    /// Delays must grow strictly from the leading state to the deepest one.
    DelaysNotAscending,
    /// Entity records need room for at least one sample.
    ZeroHistory,
}

impl LadderSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.delays.is_empty() {
            return Err(SettingsError::NoStates);
        }
        if self.delays.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SettingsError::DelaysNotAscending);
        }
        if self.history_length == 0 {
            return Err(SettingsError::ZeroHistory);
        }
        Ok(())
    }
}

/// N copies of the world, each running a fixed delay behind the leading one.
///
/// Inputs are handed to every state; a state that already passed the input's
/// tick marks the affected path dirty and resimulates it on its next tick.
pub struct StateLadder {
    states: Vec<State>,
    events: EventLog,
    lead_tick: Tick,
    history_length: usize,
    ship: ShipTuning,
    projectile: ProjectileTuning,
    map: Box<dyn CollisionMap>,
}

impl StateLadder {
    pub fn new(
        settings: LadderSettings,
        map: impl CollisionMap + 'static,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;

        let states: Vec<State> = settings
            .delays
            .iter()
            .enumerate()
            .map(|(index, &delay)| {
                State::new(
                    index,
                    delay,
                    settings.initial_tick.saturating_sub(delay),
                    settings.history_length,
                )
            })
            .collect();
        info!(
            states = states.len(),
            history_length = settings.history_length,
            lead_tick = settings.initial_tick,
            "state ladder ready"
        );

        Ok(Self {
            events: EventLog::new(states.len()),
            states,
            lead_tick: settings.initial_tick,
            history_length: settings.history_length,
            ship: settings.ship,
            projectile: settings.projectile,
            map: Box::new(map),
        })
    }

    pub fn lead_tick(&self) -> Tick {
        self.lead_tick
    }

    pub fn history_length(&self) -> usize {
        self.history_length
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, index: usize) -> Option<&State> {
        self.states.get(index)
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Hands a decoded input to every state, deepest first.
    pub fn apply(&mut self, input: SimInput) {
        for state in self.states.iter_mut().rev() {
            state.submit(input, &mut self.events);
        }
    }

    /// Spawns a projectile fired by `owner` at `tick`.
    ///
    /// Lifetime and wall bounces come from the ladder's projectile tuning.
    pub fn fire(&mut self, entity: EntityId, owner: EntityId, tick: Tick, pos: Point, vel: Point) {
        let kind = self.projectile.kind(owner, tick);
        self.apply(SimInput::Spawn {
            entity,
            kind,
            tick,
            pos,
            vel,
        });
    }

    /// Advances the leading tick by one and every state that is due with it.
    ///
    /// Deeper states tick first so that shallower ones can fall back to their
    /// freshly recomputed history. Returns the number of resimulated paths.
    pub fn tick(&mut self) -> usize {
        self.lead_tick += 1;
        let ctx = SimContext {
            map: self.map.as_ref(),
            ship: &self.ship,
            projectile: &self.projectile,
        };

        let mut resimulated = 0;
        for index in (0..self.states.len()).rev() {
            let (shallow, deep) = self.states.split_at_mut(index + 1);
            let state = &mut shallow[index];
            let target = self.lead_tick.saturating_sub(state.delay());
            while state.tick_now() < target {
                resimulated += state.tick(deep, ctx, &mut self.events);
            }
        }

        if resimulated > 0 {
            debug!(lead_tick = self.lead_tick, resimulated, "resimulated dirty paths");
        }
        resimulated
    }

    /// Record representing `id` at `tick`, as seen from state `state`.
    ///
    /// Without `search_other_states` the state's own record is returned as long
    /// as the entity exists at `tick`. With it, the record must also hold a
    /// sample for `tick`; if it does not, deeper states are asked in order.
    pub fn get_entity_at(
        &self,
        state: usize,
        id: EntityId,
        tick: Tick,
        include_soft_removed: bool,
        search_other_states: bool,
    ) -> Option<&EntityRecord> {
        let (own, deeper) = self.states.get(state..)?.split_first()?;
        let exists = |record: &EntityRecord| {
            tick >= record.created_at() && (include_soft_removed || !record.is_removed(tick))
        };

        if let Some(record) = own.entity(id) {
            if !exists(record) {
                return None;
            }
            if !search_other_states || record.history().covers(tick) {
                return Some(record);
            }
        } else if !search_other_states {
            return None;
        }

        deeper
            .iter()
            .filter_map(|other| other.entity(id))
            .filter(|record| record.is_linked())
            .find(|record| record.history().covers(tick))
            .filter(|record| exists(*record))
    }

    /// Historic position of `id` at `tick`, falling back to deeper states.
    pub fn position_at(&self, state: usize, id: EntityId, tick: Tick) -> Option<Point> {
        self.get_entity_at(state, id, tick, false, true)?
            .sample_at(tick)
            .map(|s| s.pos)
    }

    /// History of `id` across every state, confirmed ticks preferred.
    ///
    /// The deepest record fills the buffer first; shallower records only add
    /// the newer ticks the deeper ones have not reached yet.
    pub fn blended_history(&self, id: EntityId) -> Option<HistoricBuffer<Sample>> {
        let mut records = self
            .states
            .iter()
            .rev()
            .filter_map(|state| state.entity(id))
            .filter(|record| record.is_linked());
        let deepest = records.next()?;

        let deepest_delay = self.states.last().map_or(0, State::delay) as usize;
        let mut blended = HistoricBuffer::new(self.history_length + deepest_delay);
        blended.overwrite(deepest.history());
        for record in records {
            blended.overwrite(record.history());
        }
        Some(blended)
    }

    pub fn mark_dirty_position_path(&mut self, state: usize, id: EntityId, tick: Tick) -> bool {
        self.states
            .get_mut(state)
            .is_some_and(|s| s.mark_dirty_position_path(id, tick))
    }

    pub fn soft_remove(&mut self, state: usize, id: EntityId, tick: Tick) -> bool {
        self.states
            .get_mut(state)
            .is_some_and(|s| s.soft_remove(id, tick))
    }

    pub fn hard_remove(&mut self, state: usize, id: EntityId, tick: Tick) -> bool {
        self.states
            .get_mut(state)
            .is_some_and(|s| s.hard_remove(id, tick))
    }

    /// Unlinks removals that aged out of every state's window, and drops
    /// records unlinked by an earlier pass.
    pub fn collect_garbage(&mut self) -> Vec<EntityId> {
        let deepest_now = self.states.last().map_or(0, State::tick_now);
        let horizon = deepest_now.saturating_sub(self.history_length as Tick);
        if horizon == 0 {
            return Vec::new();
        }

        let mut purged: Vec<EntityId> = self
            .states
            .iter_mut()
            .flat_map(|state| state.collect_garbage(horizon))
            .collect();
        purged.sort_unstable();
        purged.dedup();
        purged.retain(|id| self.states.iter().all(|state| state.entity(*id).is_none()));

        for id in &purged {
            self.events.forget(*id);
        }
        if !purged.is_empty() {
            info!(count = purged.len(), horizon, "purged removed entities");
        }
        purged
    }
}
