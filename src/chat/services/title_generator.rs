//! Prompt construction and cleanup for conversation auto-titling.

/// Truncate text to at most `max_len` characters.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

/// Build the title-generation prompt from the first exchange. Both sides are
/// truncated so an enormous first message cannot blow up the request.
pub fn build_title_prompt(user_prompt: &str, assistant_response: &str) -> String {
    format!(
        "بناءً على الحوار التالي، اقترح عنوانًا قصيرًا وموجزًا (4 كلمات كحد أقصى) لهذه المحادثة. \
أجب بالعنوان فقط دون أي مقدمات أو نصوص إضافية.\n\n\
المستخدم: \"{}\"\nالمساعد: \"{}\"",
        truncate_text(user_prompt, 500),
        truncate_text(assistant_response, 500)
    )
}

/// Clean the model's raw title output: first line only, surrounding quotes
/// stripped, capped at 100 characters. Returns an empty string when nothing
/// usable remains, which callers treat as "keep the provisional title".
pub fn clean_title(raw_title: &str) -> String {
    // First line before quote stripping, so a quoted title followed by
    // extra lines does not keep its trailing quote.
    let cleaned = raw_title
        .trim()
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string();

    if cleaned.chars().count() > 100 {
        let mut capped: String = cleaned.chars().take(97).collect();
        capped.push_str("...");
        capped
    } else {
        cleaned
    }
}
