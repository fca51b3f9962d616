//! Per-community sessions and the state shared by every handler.

pub mod report;
pub mod state;
pub mod sweep;

pub use report::ReportOutcome;
pub use state::{BotState, SharedState};
pub use sweep::run_sweep;
