// Gradually adjusted gap between the simulated tick and the rendered one.

use super::ladder::StateLadder;
use super::tuning::render::RenderTuning;
use super::types::{EntityId, EntityKind, Point, Tick};
use serde::Serialize;
use std::collections::BTreeMap;

/// Ratios with a denominator below this are treated as undefined.
const MIN_SPAN: f64 = 1e-6;

/// How the desired delay of one rendered entity is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayPolicy {
    /// The local viewer's own ship, always rendered at the current tick.
    Local,
    /// A remote ship driven by confirmed moves.
    Controlled { last_confirmed_move: Option<Tick> },
    /// An entity extrapolated relative to the ship it is based on.
    DeadReckoned {
        /// Tracked ship the delay is borrowed from.
        reference: Option<EntityId>,
        /// Current delay of that ship.
        reference_delay: Tick,
        /// Distance from this entity to the rendered position of the reference.
        shadow_distance: f64,
        /// Distance from the local viewer to the rendered position of the reference.
        span: f64,
        /// Distance from this entity to the local viewer.
        viewer_distance: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unset,
    Tracking,
}

/// Per-entity render delay smoother.
#[derive(Debug, Clone)]
pub struct RenderDelay {
    phase: Phase,
    current: Tick,
    last_step: Tick,
    last_viewer_distance: Option<f64>,
    reference: Option<EntityId>,
}

impl Default for RenderDelay {
    fn default() -> Self {
        Self {
            phase: Phase::Unset,
            current: 0,
            last_step: 0,
            last_viewer_distance: None,
            reference: None,
        }
    }
}

impl RenderDelay {
    pub fn current(&self) -> Tick {
        self.current
    }

    /// Updates the delay for tick `now` and returns the tick to render.
    pub fn evaluate(
        &mut self,
        now: Tick,
        created_at: Tick,
        policy: DelayPolicy,
        tuning: &RenderTuning,
    ) -> Tick {
        let desired = desired_delay(now, policy, tuning);

        let mut next = match self.phase {
            Phase::Unset => {
                self.last_step = now;
                desired
            }
            Phase::Tracking => self.smooth(now, desired, tuning.update_every),
        };

        if let DelayPolicy::DeadReckoned {
            reference,
            viewer_distance,
            ..
        } = policy
        {
            let holds = self.phase == Phase::Tracking
                && !tuning.maximize_local_time
                && reference == self.reference;
            if holds {
                let moving_away = self
                    .last_viewer_distance
                    .is_some_and(|last| viewer_distance > last);
                next = if moving_away {
                    next.max(self.current)
                } else {
                    next.min(self.current)
                };
            }
            self.reference = reference;
            self.last_viewer_distance = Some(viewer_distance);
        }

        self.current = next
            .min(tuning.highest_delay)
            .min(now.saturating_sub(created_at));
        self.phase = Phase::Tracking;
        now - self.current
    }

    // One tick towards `desired` per `update_every` ticks.
    fn smooth(&mut self, now: Tick, desired: Tick, update_every: Tick) -> Tick {
        if update_every == 0 {
            return desired;
        }
        if desired == self.current || now < self.last_step + update_every {
            return self.current;
        }
        self.last_step = now;
        if desired > self.current {
            self.current + 1
        } else {
            self.current - 1
        }
    }
}

fn desired_delay(now: Tick, policy: DelayPolicy, tuning: &RenderTuning) -> Tick {
    match policy {
        DelayPolicy::Local => 0,
        DelayPolicy::Controlled { last_confirmed_move } => {
            let latency = last_confirmed_move.map_or(0, |t| now.saturating_sub(t));
            latency.saturating_mul(tuning.latency_factor) / 1000 + tuning.fixed_delay
        }
        DelayPolicy::DeadReckoned {
            reference_delay,
            shadow_distance,
            span,
            ..
        } => {
            if span.abs() < MIN_SPAN {
                return 0;
            }
            let share = (1.0 - shadow_distance / span).max(0.0);
            let delay = reference_delay as f64 * share;
            if delay.is_finite() {
                delay.round() as Tick
            } else {
                0
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub delay: Tick,
    pub rendering_at: Tick,
    pub pos: Option<Point>,
}

/// Everything the renderer needs for one frame of one state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderFrame {
    pub tick: Tick,
    pub entities: Vec<RenderedEntity>,
}

/// Render delays of every entity in a state, seen by one local viewer.
#[derive(Debug, Clone)]
pub struct RenderDelays {
    viewer: Option<EntityId>,
    tuning: RenderTuning,
    smoothers: BTreeMap<EntityId, RenderDelay>,
    // dependent entity -> ship its delay is based on
    based_on: BTreeMap<EntityId, EntityId>,
}

impl RenderDelays {
    pub fn new(viewer: Option<EntityId>, tuning: RenderTuning) -> Self {
        Self {
            viewer,
            tuning,
            smoothers: BTreeMap::new(),
            based_on: BTreeMap::new(),
        }
    }

    pub fn viewer(&self) -> Option<EntityId> {
        self.viewer
    }

    pub fn set_viewer(&mut self, viewer: Option<EntityId>) {
        self.viewer = viewer;
    }

    pub fn delay_of(&self, id: EntityId) -> Option<Tick> {
        self.smoothers.get(&id).map(RenderDelay::current)
    }

    /// Tracked ship the delay of `id` was derived from in the last evaluation.
    pub fn based_on(&self, id: EntityId) -> Option<EntityId> {
        self.based_on.get(&id).copied()
    }

    /// Computes the rendered tick and position of every live entity of `state`.
    ///
    /// Ships are evaluated before everything else, since dead-reckoned
    /// entities borrow the delay of their nearest ship.
    pub fn evaluate(&mut self, ladder: &StateLadder, state: usize) -> RenderFrame {
        let Some(sim) = ladder.states().get(state) else {
            return RenderFrame::default();
        };
        let now = sim.tick_now();

        let mut live: Vec<_> = sim
            .entities()
            .filter(|record| !record.is_non_existent(now))
            .map(|record| (record.kind().rank(), record.id(), record.kind(), record.created_at()))
            .collect();
        live.sort_unstable_by_key(|(rank, id, ..)| (*rank, *id));

        self.smoothers
            .retain(|id, _| live.iter().any(|(_, live_id, ..)| live_id == id));
        self.based_on.clear();

        let viewer_pos = self.viewer.and_then(|viewer| ladder.position_at(state, viewer, now));
        let mut shadows: Vec<(EntityId, Tick, Point)> = Vec::new();
        let mut frame = RenderFrame {
            tick: now,
            entities: Vec::with_capacity(live.len()),
        };

        for (_, id, kind, created_at) in live {
            let policy = match kind {
                EntityKind::Ship if Some(id) == self.viewer => DelayPolicy::Local,
                EntityKind::Ship => DelayPolicy::Controlled {
                    last_confirmed_move: sim.entity(id).and_then(|r| r.last_confirmed_move()),
                },
                EntityKind::Projectile { .. } => {
                    let pos = ladder.position_at(state, id, now);
                    self.dead_reckoned_policy(id, pos, viewer_pos, &shadows)
                }
            };

            let smoother = self.smoothers.entry(id).or_default();
            let rendering_at = smoother.evaluate(now, created_at, policy, &self.tuning);
            let delay = smoother.current();
            let pos = ladder
                .get_entity_at(state, id, rendering_at, false, true)
                .and_then(|record| record.sample_at(rendering_at))
                .map(|s| s.pos);

            if kind.is_ship() && Some(id) != self.viewer {
                if let Some(pos) = pos {
                    shadows.push((id, delay, pos));
                }
            }
            frame.entities.push(RenderedEntity {
                id,
                kind,
                delay,
                rendering_at,
                pos,
            });
        }

        frame
    }

    fn dead_reckoned_policy(
        &mut self,
        id: EntityId,
        pos: Option<Point>,
        viewer_pos: Option<Point>,
        shadows: &[(EntityId, Tick, Point)],
    ) -> DelayPolicy {
        let viewer_distance = match (pos, viewer_pos) {
            (Some(pos), Some(viewer)) => pos.distance(viewer),
            _ => 0.0,
        };
        let nearest = pos.and_then(|pos| {
            shadows
                .iter()
                .min_by_key(|(ship, _, shadow)| (shadow.distance_sq(pos), *ship))
                .map(|&(ship, delay, shadow)| (ship, delay, shadow, pos))
        });

        let Some((ship, reference_delay, shadow, pos)) = nearest else {
            return DelayPolicy::DeadReckoned {
                reference: None,
                reference_delay: 0,
                shadow_distance: 0.0,
                span: 0.0,
                viewer_distance,
            };
        };
        self.based_on.insert(id, ship);

        DelayPolicy::DeadReckoned {
            reference: Some(ship),
            reference_delay,
            shadow_distance: shadow.distance(pos),
            span: viewer_pos.map_or(0.0, |viewer| viewer.distance(shadow)),
            viewer_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::LadderSettings;
    use crate::domain::map::OpenSpace;
    use crate::domain::tuning::projectile::ProjectileTuning;
    use crate::domain::tuning::ship::ShipTuning;
    use crate::domain::types::{AuthoritativeUpdate, SimInput};

    fn tuning(update_every: Tick) -> RenderTuning {
        RenderTuning {
            latency_factor: 1000,
            fixed_delay: 2,
            update_every,
            maximize_local_time: false,
            highest_delay: 32,
        }
    }

    fn reckoned(shadow_distance: f64, viewer_distance: f64) -> DelayPolicy {
        DelayPolicy::DeadReckoned {
            reference: Some(7),
            reference_delay: 10,
            shadow_distance,
            span: 100.0,
            viewer_distance,
        }
    }

    #[test]
    fn when_ship_is_controlled_then_delay_follows_its_move_latency() {
        let mut delay = RenderDelay::default();
        let policy = DelayPolicy::Controlled {
            last_confirmed_move: Some(90),
        };

        let rendering_at = delay.evaluate(100, 0, policy, &tuning(0));

        assert_eq!(delay.current(), 12);
        assert_eq!(rendering_at, 88);
    }

    #[test]
    fn when_smoothing_then_delay_moves_one_tick_per_interval() {
        let mut delay = RenderDelay::default();
        let tuning = tuning(4);
        let policy = |last| DelayPolicy::Controlled {
            last_confirmed_move: Some(last),
        };

        delay.evaluate(100, 0, policy(90), &tuning);
        assert_eq!(delay.current(), 12);

        delay.evaluate(101, 0, policy(100), &tuning);
        assert_eq!(delay.current(), 12);
        delay.evaluate(104, 0, policy(103), &tuning);
        assert_eq!(delay.current(), 11);
        delay.evaluate(105, 0, policy(104), &tuning);
        assert_eq!(delay.current(), 11);
        delay.evaluate(108, 0, policy(107), &tuning);
        assert_eq!(delay.current(), 10);
    }

    #[test]
    fn when_delay_is_large_then_it_is_clipped_to_highest_and_creation() {
        let mut delay = RenderDelay::default();
        let policy = DelayPolicy::Controlled {
            last_confirmed_move: Some(50),
        };

        assert_eq!(delay.evaluate(100, 0, policy, &tuning(0)), 68);
        assert_eq!(delay.evaluate(100, 95, policy, &tuning(0)), 95);
    }

    #[test]
    fn when_local_viewer_then_delay_is_zero() {
        let mut delay = RenderDelay::default();

        assert_eq!(delay.evaluate(100, 0, DelayPolicy::Local, &tuning(0)), 100);
    }

    #[test]
    fn when_ratio_is_degenerate_then_desired_delay_is_zero() {
        let tuning = tuning(0);
        let policy = |shadow_distance, span| DelayPolicy::DeadReckoned {
            reference: Some(7),
            reference_delay: 10,
            shadow_distance,
            span,
            viewer_distance: 50.0,
        };

        assert_eq!(desired_delay(100, policy(20.0, 100.0), &tuning), 8);
        assert_eq!(desired_delay(100, policy(150.0, 100.0), &tuning), 0);
        assert_eq!(desired_delay(100, policy(20.0, 0.0), &tuning), 0);
        assert_eq!(desired_delay(100, policy(f64::NAN, 100.0), &tuning), 0);
        assert_eq!(desired_delay(100, policy(f64::INFINITY, f64::INFINITY), &tuning), 0);
    }

    #[test]
    fn when_moving_away_from_viewer_then_delay_never_decreases() {
        let mut delay = RenderDelay::default();
        let tuning = tuning(0);

        delay.evaluate(100, 0, reckoned(20.0, 100.0), &tuning);
        assert_eq!(delay.current(), 8);

        delay.evaluate(101, 0, reckoned(60.0, 120.0), &tuning);
        assert_eq!(delay.current(), 8);

        delay.evaluate(102, 0, reckoned(0.0, 140.0), &tuning);
        assert_eq!(delay.current(), 10);
    }

    #[test]
    fn when_approaching_viewer_then_delay_may_decrease() {
        let mut delay = RenderDelay::default();
        let tuning = tuning(0);
        delay.evaluate(100, 0, reckoned(20.0, 100.0), &tuning);

        delay.evaluate(101, 0, reckoned(60.0, 80.0), &tuning);

        assert_eq!(delay.current(), 4);
    }

    #[test]
    fn when_reference_changes_or_local_time_is_maximized_then_hysteresis_is_skipped() {
        let mut delay = RenderDelay::default();
        let mut tuning = tuning(0);
        delay.evaluate(100, 0, reckoned(20.0, 100.0), &tuning);

        let switched = DelayPolicy::DeadReckoned {
            reference: Some(8),
            reference_delay: 10,
            shadow_distance: 60.0,
            span: 100.0,
            viewer_distance: 120.0,
        };
        delay.evaluate(101, 0, switched, &tuning);
        assert_eq!(delay.current(), 4);

        let mut delay = RenderDelay::default();
        tuning.maximize_local_time = true;
        delay.evaluate(100, 0, reckoned(20.0, 100.0), &tuning);
        delay.evaluate(101, 0, reckoned(60.0, 120.0), &tuning);
        assert_eq!(delay.current(), 4);
    }

    fn frame_ladder() -> StateLadder {
        let settings = LadderSettings {
            delays: vec![0],
            history_length: 64,
            initial_tick: 0,
            ship: ShipTuning {
                friction: 0,
                radius: 10,
            },
            projectile: ProjectileTuning {
                hit_radius: 2,
                lifetime: 1_000,
                max_bounces: 0,
            },
        };
        let mut ladder = StateLadder::new(settings, OpenSpace).expect("settings should be valid");
        for (entity, x) in [(1, 0), (2, 1_000)] {
            ladder.apply(SimInput::Spawn {
                entity,
                kind: EntityKind::Ship,
                tick: 0,
                pos: Point::new(x, 0),
                vel: Point::ZERO,
            });
        }
        for _ in 0..10 {
            ladder.tick();
        }
        ladder.apply(SimInput::Update(AuthoritativeUpdate {
            entity: 2,
            tick: 5,
            pos: Point::new(1_000, 0),
            vel: Point::ZERO,
            direct: true,
        }));
        ladder.apply(SimInput::Spawn {
            entity: 3,
            kind: EntityKind::Projectile {
                owner: 2,
                max_bounces: 0,
                expires_at: 1_000,
            },
            tick: 8,
            pos: Point::new(900, 0),
            vel: Point::new(-10, 0),
        });
        ladder.tick();
        ladder
    }

    #[test]
    fn when_frame_is_evaluated_then_each_kind_gets_its_policy() {
        let ladder = frame_ladder();
        let mut delays = RenderDelays::new(
            Some(1),
            RenderTuning {
                fixed_delay: 0,
                update_every: 0,
                ..RenderTuning::default()
            },
        );

        let frame = delays.evaluate(&ladder, 0);

        assert_eq!(frame.tick, 11);
        let rendered: Vec<(EntityId, Tick, Option<Point>)> = frame
            .entities
            .iter()
            .map(|e| (e.id, e.rendering_at, e.pos))
            .collect();
        assert_eq!(
            rendered,
            vec![
                (1, 11, Some(Point::new(0, 0))),
                (2, 5, Some(Point::new(1_000, 0))),
                (3, 8, Some(Point::new(900, 0))),
            ]
        );
        assert_eq!(delays.based_on(3), Some(2));
        assert_eq!(delays.based_on(2), None);
        assert_eq!(delays.delay_of(2), Some(6));
    }

    #[test]
    fn when_frame_is_serialized_then_renderer_fields_are_present() {
        let ladder = frame_ladder();
        let mut delays = RenderDelays::new(Some(1), RenderTuning::default());

        let frame = delays.evaluate(&ladder, 0);
        let json = serde_json::to_value(&frame).expect("frame should serialize");

        assert_eq!(json["tick"], 11);
        assert_eq!(json["entities"][0]["id"], 1);
        assert_eq!(json["entities"][0]["kind"]["type"], "ship");
        assert_eq!(json["entities"][0]["pos"]["x"], 0);
    }

    #[test]
    fn when_state_is_unknown_then_frame_is_empty() {
        let ladder = frame_ladder();
        let mut delays = RenderDelays::new(None, RenderTuning::default());

        assert_eq!(delays.evaluate(&ladder, 5), RenderFrame::default());
    }
}
