//! Resolution of user-typed Pokemon names against the catalog.

use std::sync::Arc;

use tracing::debug;

use crate::common::text::title_case;
use crate::common::Catalog;

use super::ratio::partial_ratio;

/// Minimum score a fuzzy name match must exceed.
pub const ENTITY_THRESHOLD: u8 = 80;

/// Minimum score a fuzzy form match must exceed.
pub const FORM_THRESHOLD: u8 = 90;

/// Suffix words tried between a descriptor and a name when looking up forms.
const FORM_JOINERS: [&str; 4] = ["Hat", "Forme", "Cloak", "Sea"];

/// Resolves tokens to canonical names and forms.
///
/// Holds no mutable state; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    catalog: Arc<Catalog>,
}

impl EntityMatcher {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve a token to a canonical name or a known form.
    ///
    /// Tries, in order: national index number, exact name, exact form, then a
    /// partial-ratio scan of the names. A fuzzy tie at the best score is ambiguous
    /// and yields `None`.
    pub fn match_entity(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if let Ok(number) = token.parse::<usize>() {
            return self.catalog.by_number(number).map(str::to_string);
        }
        if let Some(name) = self.catalog.name(token) {
            return Some(name.to_string());
        }
        if let Some(form) = self.catalog.form(token) {
            return Some(form.to_string());
        }

        let best = best_unique(self.catalog.names(), |name| partial_ratio(token, name))
            .filter(|(_, score)| *score > ENTITY_THRESHOLD);
        match best {
            Some((name, score)) => {
                debug!(token, name, score, "Fuzzy entity match");
                Some(name.to_string())
            }
            None => None,
        }
    }

    /// Resolve a costume or form from a descriptor and a canonical name,
    /// e.g. ("Pikachu", "party") -> "Party Hat Pikachu".
    pub fn match_form(&self, name: &str, descriptor: &str) -> Option<String> {
        let descriptor = title_case(descriptor.trim());
        let name = title_case(name.trim());
        if descriptor.is_empty() {
            return None;
        }

        let mut inputs = vec![format!("{} {}", descriptor, name)];
        inputs.extend(
            FORM_JOINERS
                .iter()
                .map(|joiner| format!("{} {} {}", descriptor, joiner, name)),
        );

        let mut best: Option<(&str, u8)> = None;
        for form in self.catalog.forms() {
            let score = inputs
                .iter()
                .map(|input| partial_ratio(input, form))
                .max()
                .unwrap_or(0);
            if score > FORM_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
                best = Some((form, score));
            }
        }
        best.map(|(form, _)| form.to_string())
    }

    /// Known form descriptors of a name, after resolving the name itself.
    pub fn all_forms(&self, token: &str) -> Vec<String> {
        self.match_entity(token)
            .map(|name| self.catalog.form_descriptors(&name))
            .unwrap_or_default()
    }
}

/// Highest scoring candidate, or `None` when two candidates share the top score.
fn best_unique<'a>(
    candidates: &'a [String],
    score: impl Fn(&str) -> u8,
) -> Option<(&'a str, u8)> {
    let mut best: Option<(&str, u8)> = None;
    let mut tied = false;
    for candidate in candidates {
        let s = score(candidate);
        match best {
            Some((_, top)) if s < top => {}
            Some((_, top)) if s == top => tied = true,
            _ => {
                best = Some((candidate, s));
                tied = false;
            }
        }
    }
    if tied {
        None
    } else {
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> EntityMatcher {
        EntityMatcher::new(Arc::new(Catalog::bundled()))
    }

    #[test]
    fn test_exact_name_any_case() {
        assert_eq!(matcher().match_entity("pIkAcHu").as_deref(), Some("Pikachu"));
    }

    #[test]
    fn test_exact_form() {
        assert_eq!(
            matcher().match_entity("origin forme giratina").as_deref(),
            Some("Origin Forme Giratina")
        );
    }

    #[test]
    fn test_by_national_number() {
        assert_eq!(matcher().match_entity("6").as_deref(), Some("Charizard"));
        assert_eq!(matcher().match_entity("9999"), None);
    }

    #[test]
    fn test_fuzzy_typo() {
        assert_eq!(matcher().match_entity("Charmandor").as_deref(), Some("Charmander"));
    }

    #[test]
    fn test_ambiguous_tie_is_not_found() {
        // Contained in both Mr. Mime and Mime Jr.
        assert_eq!(matcher().match_entity("Mime"), None);
    }

    #[test]
    fn test_garbage_not_found() {
        assert_eq!(matcher().match_entity("xyzzyq"), None);
        assert_eq!(matcher().match_entity("  "), None);
    }

    #[test]
    fn test_match_form_with_joiner() {
        let m = matcher();
        assert_eq!(m.match_form("Pikachu", "party").as_deref(), Some("Party Hat Pikachu"));
        assert_eq!(m.match_form("Giratina", "origin").as_deref(), Some("Origin Forme Giratina"));
        assert_eq!(m.match_form("Shellos", "east").as_deref(), Some("East Sea Shellos"));
    }

    #[test]
    fn test_match_form_unknown() {
        assert_eq!(matcher().match_form("Bulbasaur", "Charmander"), None);
    }

    #[test]
    fn test_all_forms() {
        let forms = matcher().all_forms("shaymin");
        assert_eq!(forms, vec!["Land Forme", "Sky Forme"]);
    }

    #[test]
    fn test_best_unique_tie() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(best_unique(&names, |_| 90), None);
        assert_eq!(best_unique(&names, |n| if n == "b" { 95 } else { 90 }), Some(("b", 95)));
    }
}
