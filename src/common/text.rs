//! Text normalisation shared by stop, task and entity lookups.

/// Title-case a string: the first letter of every alphabetic run is
/// upper-cased, the rest lower-cased.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_alpha = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Replace typographic apostrophes with plain ones.
pub fn normalize_apostrophes(input: &str) -> String {
    input.replace(['\u{2019}', '\u{2018}'], "'")
}

/// Case-fold a lookup key: trims, lower-cases and folds `é` and curly apostrophes.
pub fn fold_key(input: &str) -> String {
    normalize_apostrophes(input.trim())
        .to_lowercase()
        .replace('é', "e")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case_words() {
        assert_eq!(title_case("town hall"), "Town Hall");
        assert_eq!(title_case("RARE candy"), "Rare Candy");
        assert_eq!(title_case("catch 5 pokemon"), "Catch 5 Pokemon");
    }

    #[test]
    fn test_title_case_after_punctuation() {
        assert_eq!(title_case("ho-oh"), "Ho-Oh");
    }

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key("  Pokémon’s Park "), "pokemon's park");
    }
}
