//! Research tasks and the per-community stop maps they are reported on.

pub mod clock;
pub mod map;
pub mod stop;
pub mod task;

pub use clock::Clock;
pub use map::ResearchMap;
pub use stop::{AssignedTask, EventOverlay, Stop, StopId};
pub use task::{Task, TaskId, TaskRegistry};
