//! Feature flag handling.
//!
//! Feature flags come in two layers: compile-time (`#[cfg(feature = "...")]`)
//! and runtime (the `use_*` booleans on `AppConfig`, each paired with an
//! `Option<*Config>` that must be present for the flag to take effect).

use pelu_config::AppConfig;
use std::sync::Arc;

/// `true` only when the caller asked for the feature AND its sub-config is present.
pub fn is_feature_enabled<T>(
    _config: &Arc<AppConfig>,
    use_feature: bool,
    feature_config: Option<&T>,
) -> bool {
    use_feature && feature_config.is_some()
}

#[cfg(feature = "gcal")]
pub fn is_gcal_enabled(config: &Arc<AppConfig>) -> bool {
    is_feature_enabled(config, config.use_gcal, config.gcal.as_ref())
}

#[cfg(feature = "messaging")]
pub fn is_messaging_enabled(config: &Arc<AppConfig>) -> bool {
    is_feature_enabled(config, config.use_messaging, config.messaging.as_ref())
}

#[cfg(feature = "nlp")]
pub fn is_nlp_enabled(config: &Arc<AppConfig>) -> bool {
    is_feature_enabled(config, config.use_nlp, config.nlp.as_ref())
}
