//! Common utilities and types shared across the application.

pub mod error;
pub mod resources;
pub mod text;
pub mod types;

pub use error::{CommandError, MapError, StopCandidate, StoreError, TradeError};
pub use resources::{Catalog, RewardCategory};
pub use types::{Bounds, CommunityId, Coordinates, UserId};
