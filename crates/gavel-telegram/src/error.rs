//! Telegram transport errors.

use gavel_core::ApiError;
use thiserror::Error;

/// Errors raised while talking to the Bot API or serving the webhook.
#[derive(Error, Debug)]
pub enum TelegramError {
    /// The HTTP request itself failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false`.
    #[error("Bot API error {code}: {description}")]
    Api {
        code: u16,
        description: String,
        retry_after: Option<u64>,
    },

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client was closed.
    #[error("Client is closed")]
    Closed,
}

impl TelegramError {
    pub fn api(code: u16, description: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::Api {
            code,
            description: description.into(),
            retry_after,
        }
    }

    /// Seconds the server asked us to wait, if this is a flood-wait reply.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<TelegramError> for ApiError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Http(e) if e.is_timeout() => ApiError::Timeout,
            TelegramError::Http(e) if e.is_decode() => ApiError::Decode(e.to_string()),
            TelegramError::Http(e) => ApiError::network(e.to_string()),
            TelegramError::Api {
                code: 429,
                retry_after,
                ..
            } => ApiError::RateLimited {
                retry_after: retry_after.unwrap_or(1),
            },
            TelegramError::Api {
                code: 403,
                description,
                ..
            } => ApiError::Forbidden(description),
            TelegramError::Api {
                code: 400,
                description,
                ..
            } => ApiError::bad_request(description),
            TelegramError::Api {
                code, description, ..
            } => ApiError::Other(format!("{code}: {description}")),
            TelegramError::Decode(e) => ApiError::Decode(e.to_string()),
            TelegramError::Io(e) => ApiError::network(e.to_string()),
            TelegramError::Closed => ApiError::NotConnected,
        }
    }
}

/// Result type for Telegram operations.
pub type TelegramResult<T> = Result<T, TelegramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            ApiError::from(TelegramError::api(429, "Too Many Requests", Some(7))),
            ApiError::RateLimited { retry_after: 7 }
        ));
        assert!(matches!(
            ApiError::from(TelegramError::api(403, "bot was kicked", None)),
            ApiError::Forbidden(d) if d == "bot was kicked"
        ));
        assert!(matches!(
            ApiError::from(TelegramError::api(400, "chat not found", None)),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(TelegramError::api(502, "Bad Gateway", None)),
            ApiError::Other(_)
        ));
        assert!(matches!(
            ApiError::from(TelegramError::Closed),
            ApiError::NotConnected
        ));
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(TelegramError::api(429, "", Some(3)).retry_after(), Some(3));
        assert_eq!(TelegramError::Closed.retry_after(), None);
    }
}
