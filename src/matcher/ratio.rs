//! Approximate string similarity.

use strsim::normalized_levenshtein;

/// Best similarity between the shorter string and every equally long window
/// of the longer one, on a 0..=100 scale, ignoring case.
///
/// A string fully contained in the other scores 100.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return 0;
    }

    let needle: String = short.iter().collect();
    let best = long
        .windows(short.len())
        .map(|window| {
            let window: String = window.iter().collect();
            normalized_levenshtein(&needle, &window)
        })
        .fold(0.0_f64, f64::max);

    to_score(best)
}

fn to_score(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(partial_ratio("Pikachu", "PIKACHU"), 100);
    }

    #[test]
    fn test_substring_scores_full() {
        assert_eq!(partial_ratio("Town Hall", "Old Town Hall Fountain"), 100);
        assert_eq!(partial_ratio("Party Hat Pikachu", "pikachu"), 100);
    }

    #[test]
    fn test_single_typo() {
        let score = partial_ratio("Pikachi", "Pikachu");
        assert!(score > 80 && score < 100, "score was {}", score);
    }

    #[test]
    fn test_unrelated_strings_score_low() {
        assert!(partial_ratio("Bulbasaur", "Magikarp") < 50);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(partial_ratio("", "Pikachu"), 0);
    }

    #[test]
    fn test_multibyte_characters() {
        assert_eq!(partial_ratio("Nidoran♀", "nidoran♀"), 100);
    }
}
