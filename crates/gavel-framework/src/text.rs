//! Text helpers for outgoing messages.

/// Platform limit for a single message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Splits `text` into chunks of at most [`MAX_MESSAGE_LENGTH`] characters,
/// breaking on line boundaries. A single over-long line is hard-split.
pub fn split_message(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > MAX_MESSAGE_LENGTH && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > MAX_MESSAGE_LENGTH {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(MAX_MESSAGE_LENGTH) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Escapes the characters legacy Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Truncates to the message limit, marking the cut.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_MESSAGE_LENGTH - 1).collect();
    truncated.push('…');
    truncated
}
