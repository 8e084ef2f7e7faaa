//! Built-in prompts and title cleanup.

/// System prompt used for chat turns when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant! Keep your responses \
concise and helpful. When a tool result says setup is required, tell the user what they \
need to connect instead of guessing the data.";

/// System prompt for the one-shot chat title summarization call.
pub const TITLE_SYSTEM_PROMPT: &str = "\
- you will generate a short title based on the first message a user begins a conversation with
- ensure it is not more than 80 characters long
- the title should be a summary of the user's message
- do not use quotes or colons";

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 80;

/// Normalize a generated title: first line, no quotes or colons, capped length.
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|line| !line.is_empty())?;
    let cleaned: String = line
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | ':' | '`'))
        .take(MAX_TITLE_CHARS)
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
