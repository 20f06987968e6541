// Domain layer: deterministic simulation types and rules.

pub mod dirty;
pub mod entity;
pub mod events;
pub mod history;
pub mod ladder;
pub mod map;
pub mod render_delay;
pub mod state;
pub mod systems;
pub mod tuning;
pub mod types;

pub use entity::EntityRecord;
pub use events::{Event, EventKey, EventKind, EventLog, EventTracker, Occurrence, TrackerChange};
pub use history::HistoricBuffer;
pub use ladder::{LadderSettings, SettingsError, StateLadder};
pub use map::{BoundedArena, CollisionMap, OpenSpace};
pub use render_delay::{DelayPolicy, RenderDelay, RenderDelays, RenderFrame, RenderedEntity};
pub use state::State;
pub use types::{AuthoritativeUpdate, EntityId, EntityKind, Point, Sample, SimInput, Tick};
