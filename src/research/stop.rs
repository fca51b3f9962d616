//! Stops and their task/overlay state machine.
//!
//! A stop is either empty or carries exactly one assigned task. Assigning a
//! task to an assigned stop is an error; only a reset empties it again. The
//! event overlay is layered on top of either state and masks the displayed
//! category and icon until it is cleared.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::{MapError, MapResult};
use crate::common::text::title_case;
use crate::common::Coordinates;

use super::task::Task;

/// Visible category of a stop under an event overlay.
pub const OVERLAY_CATEGORY: &str = "Shadow";

/// Prefix of auto-generated disambiguation nicknames.
pub const TEMP_NICKNAME_PREFIX: &str = "Temp";

/// Whether a nickname is an auto-generated `Temp<N>` placeholder.
pub fn is_temp_nickname(nickname: &str) -> bool {
    nickname
        .strip_prefix(TEMP_NICKNAME_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Map-assigned identity of a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopId(pub u64);

/// Quest and reward copied from the task assigned to a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedTask {
    pub quest: String,
    pub reward: String,
}

/// Temporary takeover state of a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOverlay {
    pub label: String,
    pub started: DateTime<Utc>,
    pub saved_category: Option<String>,
    pub saved_icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub nicknames: Vec<String>,
    pub coordinates: Coordinates,
    pub task: Option<AssignedTask>,
    /// Displayed category; the overlay category while an overlay is active.
    pub category: Option<String>,
    pub icon: Option<String>,
    pub last_edit: NaiveDate,
    pub overlay: Option<EventOverlay>,
}

impl Stop {
    pub fn new(id: StopId, name: &str, coordinates: Coordinates, today: NaiveDate) -> Self {
        Self {
            id,
            name: name.to_string(),
            nicknames: Vec::new(),
            coordinates,
            task: None,
            category: None,
            icon: None,
            last_edit: today,
            overlay: None,
        }
    }

    pub fn has_task(&self) -> bool {
        self.task.is_some()
    }

    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_edit != today
    }

    /// Clear the task and the overlay.
    pub fn reset(&mut self, today: NaiveDate) {
        self.task = None;
        self.category = None;
        self.icon = None;
        self.overlay = None;
        self.last_edit = today;
    }

    /// Assign a task. Fails without touching the stop if one is already assigned.
    pub fn set_task(&mut self, task: &Task, today: NaiveDate) -> MapResult<()> {
        if let Some(current) = &self.task {
            return Err(MapError::TaskAlreadyAssigned {
                stop: self.name.clone(),
                task: task.reward.clone(),
                current: current.quest.clone(),
            });
        }

        self.task = Some(AssignedTask {
            quest: task.quest.clone(),
            reward: task.reward.clone(),
        });
        self.last_edit = today;

        let category = task.category.name().to_string();
        match self.overlay.as_mut() {
            Some(overlay) => {
                overlay.saved_category = Some(category);
                overlay.saved_icon = Some(task.icon.clone());
            }
            None => {
                self.category = Some(category);
                self.icon = Some(task.icon.clone());
            }
        }
        Ok(())
    }

    /// Activate or refresh the overlay. The saved slots are filled only on first activation.
    pub fn set_overlay(&mut self, subject: Option<&str>, now: DateTime<Utc>) {
        let (label, icon) = match subject {
            Some(subject) => (format!("a shadow {}", subject), subject.to_uppercase()),
            None => (
                "an unknown shadow pokemon".to_string(),
                OVERLAY_CATEGORY.to_string(),
            ),
        };

        match self.overlay.as_mut() {
            Some(overlay) => overlay.label = label,
            None => {
                self.overlay = Some(EventOverlay {
                    label,
                    started: now,
                    saved_category: self.category.take(),
                    saved_icon: self.icon.take(),
                });
            }
        }
        self.category = Some(OVERLAY_CATEGORY.to_string());
        self.icon = Some(icon);
    }

    /// Restore the category and icon saved when the overlay was activated.
    pub fn clear_overlay(&mut self) -> bool {
        match self.overlay.take() {
            Some(overlay) => {
                self.category = overlay.saved_category;
                self.icon = overlay.saved_icon;
                true
            }
            None => false,
        }
    }

    /// Add a nickname, consuming a lone temporary one.
    pub fn add_nickname(&mut self, nickname: &str) {
        let nickname = title_case(nickname.trim());
        if self.nicknames.len() == 1 && is_temp_nickname(&self.nicknames[0]) {
            self.nicknames[0] = nickname;
        } else if !self.nicknames.contains(&nickname) {
            self.nicknames.push(nickname);
        }
    }
}
