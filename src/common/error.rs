//! Error types for the application.

use thiserror::Error;

/// Research map and task list errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("No stop found with the given string.")]
    StopNotFound,

    #[error(
        "Multiple stops found with this name. Stops without nicknames have been given temporary nicknames, please add unique nicknames now. Nicknames for these stops include: {}.",
        candidate_labels(.candidates)
    )]
    MultipleStopsFound { candidates: Vec<StopCandidate> },

    #[error("No task found with the given string.")]
    TaskNotFound,

    #[error("Failed to assign {task} to {stop} as it already had task {current}")]
    TaskAlreadyAssigned {
        stop: String,
        task: String,
        current: String,
    },

    #[error("This stop is outside of the boundary set in your map. Contact your maintainer if you feel this is an error with the boundary.")]
    StopOutsideBoundary,

    #[error("The map boundary has not been set up yet.")]
    BoundsNotSet,

    #[error("Boundary too large, must be less than one degree of latitude and longitude.")]
    BoundsTooLarge,

    #[error("Map location out of map boundary.")]
    LocationNotInBounds,

    #[error("Invalid time zone '{zone}', use an IANA name such as America/New_York.")]
    InvalidTimezone { zone: String },

    #[error("This nickname is already associated with {owner}")]
    NicknameInUse { owner: String },
}

/// A stop tied for a lookup, as reported back to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct StopCandidate {
    pub id: u64,
    pub name: String,
    pub nicknames: Vec<String>,
}

impl StopCandidate {
    fn label(&self) -> &str {
        self.nicknames.first().map(String::as_str).unwrap_or(&self.name)
    }
}

fn candidate_labels(candidates: &[StopCandidate]) -> String {
    candidates
        .iter()
        .map(StopCandidate::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trade offer errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    #[error("Offer group '{name}' already exists.")]
    OfferExists { name: String },

    #[error("Unable to find offer '{name}'")]
    OfferNotFound { name: String },

    #[error("Unknown trader, add an offer first.")]
    UserNotFound,

    #[error("Trainer name '{name}' is already used")]
    NameInUse { name: String },
}

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors surfaced to users by the command layer.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Map(#[from] MapError),

    #[error("{0}")]
    Trade(#[from] TradeError),

    #[error("Failed to save: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Usage(String),

    #[error("Sorry, you can't do that.")]
    NotPermitted,
}

/// Result type alias for research operations.
pub type MapResult<T> = std::result::Result<T, MapError>;

/// Result type alias for trade operations.
pub type TradeResult<T> = std::result::Result<T, TradeError>;

/// Result type alias for persistence operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_stops_message_lists_nicknames() {
        let err = MapError::MultipleStopsFound {
            candidates: vec![
                StopCandidate {
                    id: 1,
                    name: "Park".to_string(),
                    nicknames: vec!["Temp1".to_string()],
                },
                StopCandidate {
                    id: 2,
                    name: "Park".to_string(),
                    nicknames: vec!["North Park".to_string()],
                },
            ],
        };
        assert!(err.to_string().ends_with("Temp1, North Park."));
    }
}
