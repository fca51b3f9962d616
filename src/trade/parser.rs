//! Free-text entity lists ("shiny alolan vulpix, unown a") to canonical labels.

use reqwest::Url;
use tracing::{debug, warn};

use crate::common::resources::NUMBERED_POKEMON;
use crate::common::text::title_case;
use crate::common::Catalog;
use crate::matcher::EntityMatcher;

/// LeekDuck form code suffix for Alolan variants ("26_61").
const LEEKDUCK_ALOLAN: &str = "61";

/// LeekDuck numbers Spinda patterns from 11.
const LEEKDUCK_SPINDA_OFFSET: u32 = 10;

/// Outcome of cleaning a token list. Never an error: whatever could not be
/// resolved is handed back in `unresolved` for the caller to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedList {
    pub entities: Vec<String>,
    pub unresolved: Vec<String>,
}

#[derive(Debug, Default)]
struct Modifiers {
    shiny: bool,
    alolan: bool,
    galarian: bool,
    /// The modifier tokens as typed, reported if no entity follows.
    tokens: Vec<String>,
}

impl Modifiers {
    fn label(&self, entity: &str, all_shiny: bool) -> String {
        let mut label = String::new();
        if self.shiny || all_shiny {
            label.push_str("Shiny ");
        }
        if self.alolan {
            label.push_str("Alolan ");
        } else if self.galarian {
            label.push_str("Galarian ");
        }
        label.push_str(entity);
        label
    }
}

/// Resolve user tokens to canonical entity labels.
///
/// `Shiny`, `Alolan` and `Galarian` apply to the next resolved entity;
/// `Shinies` (or `all_shiny`) makes every entity shiny. Tokens that do not
/// resolve are held as descriptors and retried as a form of the next entity.
/// A LeekDuck shiny export URL as the first token is imported instead.
pub fn clean_entity_list<S: AsRef<str>>(
    matcher: &EntityMatcher,
    tokens: &[S],
    all_shiny: bool,
) -> CleanedList {
    let catalog = matcher.catalog();
    let tokens: Vec<&str> = tokens
        .iter()
        .map(|t| t.as_ref().trim().trim_matches(','))
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(url) = tokens.first().filter(|t| t.to_lowercase().contains("leekduck")) {
        return leekduck_export(catalog, url);
    }

    let mut out = CleanedList::default();
    let mut all_shiny = all_shiny;
    let mut modifiers = Modifiers::default();
    let mut descriptors: Vec<String> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        let next = tokens.get(i + 1).copied();
        let titled = title_case(token);
        i += 1;

        if titled == "Shiny" {
            modifiers.shiny = true;
            modifiers.tokens.push(titled);
            continue;
        }
        if titled == "Shinies" {
            all_shiny = true;
            continue;
        }
        if titled.contains("Alola") {
            modifiers.alolan = true;
            modifiers.tokens.push(titled);
            continue;
        }
        if titled.contains("Galar") {
            modifiers.galarian = true;
            modifiers.tokens.push(titled);
            continue;
        }

        // Multi-word names: "Mr. Mime", "Mime Jr.".
        let mut entity = None;
        if catalog.is_multiword_part(token) {
            if let Some(name) = next.and_then(|n| catalog.name(&format!("{} {}", token, n))) {
                entity = Some(name.to_string());
                i += 1;
            }
        }
        let entity = entity.or_else(|| matcher.match_entity(token)).or_else(|| {
            if !catalog.is_multiword_part(token) {
                return None;
            }
            let previous = descriptors.last()?;
            let joined = matcher.match_entity(&format!("{} {}", previous, token))?;
            descriptors.pop();
            Some(joined)
        });

        let Some(mut entity) = entity else {
            descriptors.push(titled);
            continue;
        };

        let suffix = variant_suffix(token);
        if !descriptors.is_empty() {
            if let Some(form) = matcher.match_form(&entity, &descriptors.join(" ")) {
                entity = form;
                descriptors.clear();
            }
        }

        if NUMBERED_POKEMON.contains(&entity.as_str()) {
            if let Some(suffix) = suffix {
                entity = format!("{}-{}", entity, suffix.to_uppercase());
            } else if let Some(letter) = next.filter(|n| n.chars().count() == 1) {
                entity = format!("{}-{}", entity, letter.to_uppercase());
                i += 1;
            }
        } else if let Some(suffix) = suffix.filter(|_| entity == "Giratina") {
            let suffix = suffix.to_uppercase();
            if suffix.starts_with('O') {
                entity = "Origin Forme Giratina".to_string();
            } else if suffix.starts_with('A') {
                entity = "Altered Forme Giratina".to_string();
            }
        } else if let Some(next) = next
            .filter(|n| is_form_word(n))
            .filter(|_| catalog.has_forms(&entity))
        {
            if let Some(form) = matcher.match_form(&entity, next) {
                if form != entity {
                    entity = form;
                    i += 1;
                }
            }
        }

        out.entities.push(modifiers.label(&entity, all_shiny));
        out.unresolved.append(&mut descriptors);
        modifiers = Modifiers::default();
    }

    out.unresolved.append(&mut descriptors);
    out.unresolved.append(&mut modifiers.tokens);
    if !out.unresolved.is_empty() {
        debug!(unresolved = ?out.unresolved, "Unresolved entity tokens");
    }
    out
}

/// Whether a following token may describe a form. Numbers and single
/// characters only qualify after Unown or Spinda.
fn is_form_word(token: &str) -> bool {
    token.chars().count() > 1 && !token.chars().all(|c| c.is_ascii_digit())
}

/// Import a LeekDuck shiny export (`https://leekduck.com/shiny/?dex=1-26_61-327_13`).
///
/// Every entry is labelled shiny. Codes are a national number, optionally with
/// an Alolan (`_61`) or Spinda pattern (`327_<n + 10>`) suffix, or a number
/// followed by `Fall` for the fall costume. Unknown codes are reported unresolved.
fn leekduck_export(catalog: &Catalog, url: &str) -> CleanedList {
    let mut out = CleanedList::default();
    let dex = Url::parse(url).ok().filter(|u| {
        u.host_str()
            .is_some_and(|host| host.to_lowercase().contains("leekduck"))
    });
    let Some(dex) = dex.and_then(|u| {
        u.query_pairs()
            .find(|(key, _)| key == "dex")
            .map(|(_, value)| value.into_owned())
    }) else {
        warn!(url, "Not a LeekDuck shiny export");
        out.unresolved.push(url.to_string());
        return out;
    };

    for code in dex.split('-').map(str::trim).filter(|c| !c.is_empty()) {
        match leekduck_entry(catalog, code) {
            Some(entity) => out.entities.push(format!("Shiny {}", entity)),
            None => out.unresolved.push(code.to_string()),
        }
    }
    debug!(
        imported = out.entities.len(),
        unresolved = ?out.unresolved,
        "LeekDuck export imported"
    );
    out
}

fn dex_name<'a>(catalog: &'a Catalog, number: &str) -> Option<&'a str> {
    number.parse::<usize>().ok().and_then(|n| catalog.by_number(n))
}

fn leekduck_entry(catalog: &Catalog, code: &str) -> Option<String> {
    if let Some((number, variant)) = code.split_once('_') {
        let entity = dex_name(catalog, number)?;
        if entity == "Spinda" {
            let pattern = variant.parse::<u32>().ok()?.checked_sub(LEEKDUCK_SPINDA_OFFSET)?;
            return Some(format!("Spinda-{}", pattern));
        }
        return (variant == LEEKDUCK_ALOLAN).then(|| format!("Alolan {}", entity));
    }
    if let Some(number) = code.strip_suffix("Fall") {
        let form = format!("Fall Costume {}", dex_name(catalog, number)?);
        return catalog.form(&form).map(str::to_string);
    }
    dex_name(catalog, code).map(str::to_string)
}

/// The single-character variant after a dash: "Unown-a" -> "a".
fn variant_suffix(token: &str) -> Option<&str> {
    let (_, suffix) = token.rsplit_once('-')?;
    (suffix.chars().count() == 1).then_some(suffix)
}
