// Declare modules within this crate
pub mod handlers; // HTTP request handlers shared across crates
pub mod routes; // Route definitions shared across crates
pub mod error; // Error handling
pub mod http; // HTTP utilities
pub mod services; // Service abstractions
pub mod logging; // Logging utilities
pub mod features; // Feature flag handling

pub use routes::routes;

pub use error::{
    conflict, config_error, external_service_error, internal_error, not_found, validation_error,
    Context, HttpStatusCode, PeluError,
};

pub use http::{
    client::{create_client, delete, get, patch, post, put, HTTP_CLIENT},
    handle_json_result, handle_result, map_error, map_json_error, IntoHttpResponse,
};

pub use logging::{init_logging, resolve_log_dir};

pub use features::is_feature_enabled;

#[cfg(feature = "gcal")]
pub use features::is_gcal_enabled;

#[cfg(feature = "messaging")]
pub use features::is_messaging_enabled;

#[cfg(feature = "nlp")]
pub use features::is_nlp_enabled;
