use chrono::{DateTime, Utc};

/// Source of the current instant for a research map.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Clock {
    #[default]
    System,
    /// Frozen at the given instant. Used to simulate day changes.
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }
}
