//! Command parsing.
//!
//! Recognises `/name`, `/name@bot` and, when enabled, `!name` at the very
//! start of a message. Names are lower-cased; arguments are split on
//! whitespace, with the untouched remainder kept in
//! [`raw_args`](ParsedCommand::raw_args) for commands that take free text.

/// A command extracted from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lower-cased command name without prefix or `@bot` suffix.
    pub name: String,
    pub args: Vec<String>,
    /// Text after the command token, leading whitespace trimmed.
    pub raw_args: String,
}

/// Parses a command addressed to this bot.
///
/// Returns `None` for non-commands and for commands addressed to a different
/// bot (`/help@other_bot`).
pub fn parse_command(text: &str, bot_username: &str, allow_excl: bool) -> Option<ParsedCommand> {
    let mut chars = text.chars();
    match chars.next()? {
        '/' => {}
        '!' if allow_excl => {}
        _ => return None,
    }
    let body = chars.as_str();

    let (head, rest) = match body.find(char::is_whitespace) {
        Some(index) => body.split_at(index),
        None => (body, ""),
    };

    let name = match head.split_once('@') {
        Some((name, target)) => {
            if !target.eq_ignore_ascii_case(bot_username) {
                return None;
            }
            name
        }
        None => head,
    };

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    let raw_args = rest.trim_start().to_string();
    Some(ParsedCommand {
        name: name.to_lowercase(),
        args: raw_args.split_whitespace().map(str::to_string).collect(),
        raw_args,
    })
}
