//! Game resources: the Pokemon catalog, known forms and reward categories.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

const POKEMON_DATA: &str = include_str!("../../data/pokemon.txt");
const FORMS_DATA: &str = include_str!("../../data/forms.txt");

/// Pokemon with lettered or numbered variants written as `Name-X`.
pub const NUMBERED_POKEMON: [&str; 2] = ["Unown", "Spinda"];

/// Immutable reference data: canonical names in national index order plus known forms.
#[derive(Debug, Clone)]
pub struct Catalog {
    names: Vec<String>,
    names_by_key: HashMap<String, usize>,
    forms: Vec<String>,
    forms_by_key: HashMap<String, usize>,
    multiword_parts: HashSet<String>,
}

impl Catalog {
    /// Build the catalog from the data files bundled into the binary.
    pub fn bundled() -> Self {
        Self::from_lines(POKEMON_DATA, FORMS_DATA)
    }

    /// Build a catalog from newline separated name and form lists.
    pub fn from_lines(names: &str, forms: &str) -> Self {
        let names: Vec<String> = non_empty_lines(names).collect();
        let forms: Vec<String> = non_empty_lines(forms).collect();

        let names_by_key = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_lowercase(), i))
            .collect();
        let forms_by_key = forms
            .iter()
            .enumerate()
            .map(|(i, form)| (form.to_lowercase(), i))
            .collect();
        let multiword_parts = names
            .iter()
            .filter(|name| name.contains(' '))
            .flat_map(|name| name.split(' ').map(str::to_lowercase).collect::<Vec<_>>())
            .collect();

        Self {
            names,
            names_by_key,
            forms,
            forms_by_key,
            multiword_parts,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn forms(&self) -> &[String] {
        &self.forms
    }

    /// Exact, case-insensitive canonical name lookup.
    pub fn name(&self, key: &str) -> Option<&str> {
        self.names_by_key
            .get(&key.to_lowercase())
            .map(|&i| self.names[i].as_str())
    }

    /// Exact, case-insensitive form lookup.
    pub fn form(&self, key: &str) -> Option<&str> {
        self.forms_by_key
            .get(&key.to_lowercase())
            .map(|&i| self.forms[i].as_str())
    }

    /// Lookup by national index number (1-based).
    pub fn by_number(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    /// Whether a single word is part of a name that contains spaces ("Mr." in "Mr. Mime").
    pub fn is_multiword_part(&self, word: &str) -> bool {
        self.multiword_parts.contains(&word.to_lowercase())
    }

    /// Whether any known form is a variant of the given canonical name.
    pub fn has_forms(&self, name: &str) -> bool {
        self.forms
            .iter()
            .any(|form| form.rsplit(' ').next() == Some(name))
    }

    /// The descriptors of every known form of a canonical name ("Party Hat" for Pikachu).
    pub fn form_descriptors(&self, name: &str) -> Vec<String> {
        let suffix = format!(" {}", name);
        self.forms
            .iter()
            .filter_map(|form| form.strip_suffix(&suffix))
            .map(str::to_string)
            .collect()
    }
}

fn non_empty_lines(data: &str) -> impl Iterator<Item = String> + '_ {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

/// Research reward categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardCategory {
    Encounter,
    Stardust,
    RareCandy,
    SilverPinap,
    Tm,
    Item,
}

/// Reward words that mark a task as an item reward.
const ITEM_WORDS: [&str; 9] = [
    "Berry", "Razz", "Nanab", "Pinap", "Ball", "Potion", "Revive", "Stone", "Scale",
];

impl RewardCategory {
    /// Classify a title-cased reward string.
    pub fn classify(reward: &str) -> Self {
        if reward.contains("Rare") {
            Self::RareCandy
        } else if reward.contains("Silver") {
            Self::SilverPinap
        } else if reward.contains("Stardust") {
            Self::Stardust
        } else if reward.split(' ').any(|word| word == "Tm") {
            Self::Tm
        } else if ITEM_WORDS.iter().any(|word| reward.contains(word)) {
            Self::Item
        } else {
            Self::Encounter
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Encounter => "Encounter",
            Self::Stardust => "Stardust",
            Self::RareCandy => "Rare Candy",
            Self::SilverPinap => "Silver Pinap",
            Self::Tm => "TM",
            Self::Item => "Item",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_order() {
        let catalog = Catalog::bundled();
        assert_eq!(catalog.by_number(1), Some("Bulbasaur"));
        assert_eq!(catalog.by_number(25), Some("Pikachu"));
        assert_eq!(catalog.by_number(0), None);
        assert_eq!(catalog.names().len(), 493);
    }

    #[test]
    fn test_exact_lookups_ignore_case() {
        let catalog = Catalog::bundled();
        assert_eq!(catalog.name("pikachu"), Some("Pikachu"));
        assert_eq!(catalog.form("party hat pikachu"), Some("Party Hat Pikachu"));
        assert_eq!(catalog.name("party hat pikachu"), None);
    }

    #[test]
    fn test_multiword_parts() {
        let catalog = Catalog::bundled();
        assert!(catalog.is_multiword_part("mime"));
        assert!(catalog.is_multiword_part("Mr."));
        assert!(!catalog.is_multiword_part("Pikachu"));
    }

    #[test]
    fn test_form_descriptors() {
        let catalog = Catalog::bundled();
        let descriptors = catalog.form_descriptors("Giratina");
        assert_eq!(descriptors, vec!["Altered Forme", "Origin Forme"]);
        assert!(catalog.has_forms("Pikachu"));
        assert!(!catalog.has_forms("Bulbasaur"));
    }

    #[test]
    fn test_reward_category() {
        assert_eq!(RewardCategory::classify("Rare Candy"), RewardCategory::RareCandy);
        assert_eq!(RewardCategory::classify("Silver Pinap"), RewardCategory::SilverPinap);
        assert_eq!(RewardCategory::classify("500 Stardust"), RewardCategory::Stardust);
        assert_eq!(RewardCategory::classify("Fast Tm"), RewardCategory::Tm);
        assert_eq!(RewardCategory::classify("Golden Razz Berry"), RewardCategory::Item);
        assert_eq!(RewardCategory::classify("Pikachu"), RewardCategory::Encounter);
    }
}
