//! Fuzzy matching of user input against the Pokemon catalog.

pub mod entity;
pub mod ratio;

pub use entity::EntityMatcher;
pub use ratio::partial_ratio;
