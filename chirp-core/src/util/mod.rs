mod id;

pub use id::*;

use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Truncates a string to at most `max` characters, never splitting a character.
/// An ellipsis is appended when something was cut off.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let ellipsis = "...";
    let keep = max.saturating_sub(ellipsis.len());
    let mut result: String = text.chars().take(keep).collect();

    result.truncate(result.trim_end().len());
    result.push_str(ellipsis);
    result
}
