//! Research task definitions and the task registry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::{MapError, MapResult};
use crate::common::text::{fold_key, title_case};
use crate::common::RewardCategory;
use crate::store::Backup;

/// Registry-assigned identity of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

/// A quest/reward pairing that can be assigned to a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Display form of the reward, e.g. "Bulbasaur or Squirtle".
    pub reward: String,
    pub quest: String,
    pub category: RewardCategory,
    pub shiny: bool,
    /// Possible reward outcomes, in the order given.
    pub rewards: Vec<String>,
    pub nicknames: Vec<String>,
    /// One of `rewards`, shown as the map icon.
    pub icon: String,
}

impl Task {
    /// Parse a reward string into a task. The id is assigned when the task is registered.
    pub fn new(reward: &str, quest: &str, shiny: bool) -> Self {
        let titled = title_case(reward.trim());
        let quest = quest.trim().to_string();
        let category = RewardCategory::classify(&titled);

        let mut nicknames = Vec::new();
        match category {
            RewardCategory::RareCandy => nicknames.push(format!("{} RC", quest)),
            RewardCategory::SilverPinap => nicknames.push(format!("{} SP", quest)),
            _ => {}
        }

        let (reward, rewards) = if titled.contains(" Or ") {
            let rewards = titled.split(" Or ").map(str::to_string).collect();
            (titled.replace(" Or ", " or "), rewards)
        } else if titled.contains("Gen 1 Starter") {
            let rewards = ["Bulbasaur", "Squirtle", "Charmander"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            (titled, rewards)
        } else {
            (titled.clone(), vec![titled])
        };
        let icon = rewards.first().cloned().unwrap_or_default();

        Self {
            id: TaskId(0),
            reward,
            quest,
            category,
            shiny,
            rewards,
            nicknames,
            icon,
        }
    }

    /// Select which alternate reward is shown as the icon. Returns false if it is not one of them.
    pub fn set_icon(&mut self, icon: &str) -> bool {
        let key = fold_key(icon);
        match self.rewards.iter().find(|r| fold_key(r) == key) {
            Some(reward) => {
                self.icon = reward.clone();
                true
            }
            None => false,
        }
    }

    fn matches(&self, key: &str) -> bool {
        fold_key(&self.reward) == key
            || fold_key(&self.quest) == key
            || self.rewards.iter().any(|r| fold_key(r) == key)
            || self.has_nickname(key)
    }

    fn has_nickname(&self, key: &str) -> bool {
        self.nicknames.iter().any(|n| fold_key(n) == key)
    }

    pub fn describe(&self) -> String {
        format!("{} for a {}", self.quest, self.reward)
    }
}

/// The known research tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    next_id: u64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Register a task, assigning it a fresh identity.
    pub fn add_task(&mut self, mut task: Task) -> TaskId {
        self.next_id += 1;
        task.id = TaskId(self.next_id);
        let id = task.id;
        debug!(reward = %task.reward, quest = %task.quest, "Task added");
        self.tasks.push(task);
        id
    }

    /// Find a task by reward, quest, alternate reward or nickname.
    ///
    /// `"<key>:<quest>"` returns a copy of the matched task with its quest replaced;
    /// the registry entry is left untouched.
    pub fn find_task(&self, query: &str) -> MapResult<Task> {
        let (key, quest_override) = match query.split_once(':') {
            Some((key, quest)) => (key, Some(quest.trim())),
            None => (query, None),
        };
        let index = self.position(key)?;
        let mut task = self.tasks[index].clone();
        if let Some(quest) = quest_override {
            task.quest = title_case(quest);
        }
        Ok(task)
    }

    /// Remove the task with the given identity.
    pub fn remove_task(&mut self, id: TaskId) -> MapResult<Task> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(MapError::TaskNotFound)?;
        Ok(self.tasks.remove(index))
    }

    /// Add a nickname to a registered task.
    pub fn add_nickname(&mut self, id: TaskId, nickname: &str) -> MapResult<()> {
        let key = fold_key(nickname);
        if let Some(owner) = self.tasks.iter().find(|t| t.id != id && t.has_nickname(&key)) {
            return Err(MapError::NicknameInUse {
                owner: format!("the task: {}", owner.describe()),
            });
        }
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(MapError::TaskNotFound)?;
        if !task.has_nickname(&key) {
            task.nicknames.push(nickname.trim().to_string());
        }
        Ok(())
    }

    /// Set the icon of a registered task.
    pub fn set_icon(&mut self, id: TaskId, icon: &str) -> MapResult<bool> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(MapError::TaskNotFound)?;
        Ok(task.set_icon(icon))
    }

    /// Empty the registry. Requires the backup taken beforehand.
    pub fn clear(&mut self, backup: &Backup) {
        debug!(backup = %backup.path().display(), tasks = self.tasks.len(), "Task list cleared");
        self.tasks.clear();
    }

    fn position(&self, key: &str) -> MapResult<usize> {
        let key = fold_key(key);
        if key.is_empty() {
            return Err(MapError::TaskNotFound);
        }
        self.tasks
            .iter()
            .position(|t| t.matches(&key))
            .ok_or(MapError::TaskNotFound)
    }
}
