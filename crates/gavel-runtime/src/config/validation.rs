//! Startup checks for everything a misconfiguration would otherwise break
//! at runtime.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    DispatchConfig, GavelConfig, LogOutput, RetryConfig, TransportMode, WebhookConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &GavelConfig) -> ConfigResult<()> {
    if config.bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    if config.bot.owner_id == 0 {
        return Err(ConfigError::missing_field("bot.owner_id"));
    }
    require_scheme("bot.api_url", &config.bot.api_url, &["http://", "https://"])?;

    validate_dispatch(&config.dispatch)?;

    if config.flood.limit == 0 {
        return Err(ConfigError::invalid("flood.limit", "must be greater than 0"));
    }
    if config.flood.window_ms == 0 {
        return Err(ConfigError::invalid("flood.window_ms", "must be greater than 0"));
    }

    validate_retry(&config.transport.retry)?;
    if config.transport.mode == TransportMode::Webhook {
        validate_webhook(&config.transport.webhook)?;
    }

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> ConfigResult<()> {
    for (key, value) in [
        ("dispatch.workers", dispatch.workers as u64),
        ("dispatch.queue_capacity", dispatch.queue_capacity as u64),
        ("dispatch.handler_timeout_secs", dispatch.handler_timeout_secs),
    ] {
        if value == 0 {
            return Err(ConfigError::invalid(key, "must be greater than 0"));
        }
    }
    Ok(())
}

fn validate_retry(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::invalid(
            "transport.retry.initial_delay_ms",
            "must be greater than 0",
        ));
    }
    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::invalid(
            "transport.retry.max_delay_ms",
            "must not be below initial_delay_ms",
        ));
    }
    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::invalid(
            "transport.retry.backoff_multiplier",
            "must be at least 1.0",
        ));
    }
    Ok(())
}

/// Telegram only delivers to HTTPS endpoints.
fn validate_webhook(webhook: &WebhookConfig) -> ConfigResult<()> {
    if webhook.url.is_empty() {
        return Err(ConfigError::missing_field("transport.webhook.url"));
    }
    require_scheme("transport.webhook.url", &webhook.url, &["https://"])?;

    if webhook.port == 0 {
        return Err(ConfigError::invalid("transport.webhook.port", "must not be 0"));
    }
    if !webhook.path.starts_with('/') {
        return Err(ConfigError::invalid("transport.webhook.path", "must start with '/'"));
    }
    if let Some(cert) = &webhook.cert_path {
        if !cert.exists() {
            return Err(ConfigError::invalid(
                "transport.webhook.cert_path",
                format!("{} does not exist", cert.display()),
            ));
        }
    }
    Ok(())
}

fn require_scheme(key: &str, url: &str, schemes: &[&str]) -> ConfigResult<()> {
    if !schemes.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(ConfigError::invalid_url(
            key,
            url,
            format!("must start with one of {schemes:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GavelConfig {
        let mut config = GavelConfig::default();
        config.bot.token = "123:abc".to_string();
        config.bot.owner_id = 42;
        config
    }

    #[test]
    fn test_valid_minimal_config() {
        tokio_test::assert_ok!(validate_config(&valid()));
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = valid();
        config.bot.token.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { key }) if key == "bot.token"
        ));

        let mut config = valid();
        config.bot.owner_id = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { key }) if key == "bot.owner_id"
        ));
    }

    #[test]
    fn test_zero_pool_sizes() {
        let mut config = valid();
        config.dispatch.workers = 0;
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.key(), Some("dispatch.workers"));

        let mut config = valid();
        config.dispatch.queue_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_webhook_requires_https_and_valid_route() {
        let mut config = valid();
        config.transport.mode = TransportMode::Webhook;
        config.transport.webhook.url = "http://example.com".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        config.transport.webhook.url = "https://example.com".to_string();
        tokio_test::assert_ok!(validate_config(&config));

        config.transport.webhook.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.key(), Some("transport.webhook.port"));

        config.transport.webhook.port = 8443;
        config.transport.webhook.path = "hook".to_string();
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.key(), Some("transport.webhook.path"));
    }

    #[test]
    fn test_polling_ignores_webhook_section() {
        let mut config = valid();
        config.transport.webhook.port = 0;
        tokio_test::assert_ok!(validate_config(&config));
    }

    #[test]
    fn test_invalid_retry_bounds() {
        let mut config = valid();
        config.transport.retry.max_delay_ms = 10;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.transport.retry.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_err());
    }
}
