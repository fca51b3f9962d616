//! Reply text helpers.

/// Discord's limit on message content, in characters.
pub const DISCORD_MAX_MESSAGE: usize = 2000;

/// Find the last UTF-8 char boundary at or before `byte_index` in `s`.
fn floor_char_boundary(s: &str, byte_index: usize) -> usize {
    if byte_index >= s.len() {
        return s.len();
    }
    let mut i = byte_index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Split a reply into chunks that fit within the max length (in bytes).
///
/// Prefers line breaks, then spaces. Never splits in the middle of a
/// multi-byte UTF-8 character.
pub fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        remaining = remaining.trim_start();
        if remaining.is_empty() {
            break;
        }

        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let split_at = floor_char_boundary(remaining, max_len);

        // Force at least one character when max_len is smaller than it.
        if split_at == 0 {
            let first_char_end = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
            chunks.push(remaining[..first_char_end].to_string());
            remaining = &remaining[first_char_end..];
            continue;
        }

        let chunk = &remaining[..split_at];
        match chunk.rfind('\n').or_else(|| chunk.rfind(' ')) {
            Some(idx) if idx > 0 => {
                chunks.push(remaining[..idx].to_string());
                remaining = &remaining[idx + 1..];
            }
            _ => {
                chunks.push(chunk.to_string());
                remaining = &remaining[split_at..];
            }
        }
    }

    chunks
}

/// "A", "A or B", "A, B, or C".
pub fn join_alternatives<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [first, second] => format!("{} or {}", first.as_ref(), second.as_ref()),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{}, or {}", init.join(", "), last.as_ref())
        }
    }
}

/// A Discord user mention.
pub fn mention(user: u64) -> String {
    format!("<@{}>", user)
}
