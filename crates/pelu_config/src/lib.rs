use pelu_config_static::ensure_dotenv_loaded;
pub use pelu_config_static::models::*;
use thiserror::Error;

/// Errors raised while loading or validating [`AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("configuration validation error: {0}")]
    Validation(String),
}

/// Loads `AppConfig` from files + environment and validates feature-flag
/// consistency before handing it to the caller.
pub fn load_config() -> Result<AppConfig, ConfigurationError> {
    let _dotenv_path = ensure_dotenv_loaded();

    let config = pelu_config_static::load_config()?;
    validate_config(&config)?;

    Ok(config)
}

/// Checks that every `use_*` flag has its companion sub-config present, and
/// that per-shop fields are internally consistent.
fn validate_config(config: &AppConfig) -> Result<(), ConfigurationError> {
    if config.server.port == 0 {
        return Err(ConfigurationError::Validation(
            "server port cannot be 0".to_string(),
        ));
    }

    if config.use_messaging && config.messaging.is_none() {
        return Err(ConfigurationError::Validation(
            "messaging is enabled but no messaging configuration is provided".to_string(),
        ));
    }

    if config.use_gcal && config.gcal.is_none() {
        return Err(ConfigurationError::Validation(
            "gcal is enabled but no gcal configuration is provided".to_string(),
        ));
    }

    if config.use_nlp && config.nlp.is_none() {
        return Err(ConfigurationError::Validation(
            "nlp is enabled but no nlp configuration is provided".to_string(),
        ));
    }

    if matches!(config.kv.backend, StorageBackend::Redis) && config.kv.redis_url.is_none() {
        return Err(ConfigurationError::Validation(
            "kv backend is redis but no redis_url is provided".to_string(),
        ));
    }

    for shop in &config.shops {
        if shop.num_staff == 0 {
            return Err(ConfigurationError::Validation(format!(
                "shop {} has num_staff == 0",
                shop.id
            )));
        }
        if shop.slot_step_minutes == 0 {
            return Err(ConfigurationError::Validation(format!(
                "shop {} has slot_step_minutes == 0",
                shop.id
            )));
        }
        if shop.tz.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigurationError::Validation(format!(
                "shop {} has an unrecognized tz {:?}",
                shop.id, shop.tz
            )));
        }
        if shop.staff_selection_required && !shop.enable_staff_selection {
            return Err(ConfigurationError::Validation(format!(
                "shop {} requires staff selection but does not enable it",
                shop.id
            )));
        }
    }

    Ok(())
}
