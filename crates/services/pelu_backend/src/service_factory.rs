//! Service factory implementation.
//!
//! Provides the backend's implementation of `ServiceFactory`, wiring the
//! calendar, NLP and messaging clients from runtime configuration.

use std::sync::Arc;

use pelu_common::is_feature_enabled;
use pelu_common::services::{
    BoxedError, CalendarService, MessagingService, NlpService, ServiceFactory,
};
use pelu_config::AppConfig;
use tracing::{error, info};

use pelu_calendar::{auth::create_calendar_hub, service::GoogleCalendarService};
use pelu_messaging::outbound::WhatsAppMessagingService;
use pelu_nlp::client::HttpNlpInterpreter;

/// Service factory implementation.
///
/// Constructs the calendar, NLP and messaging clients once at startup based
/// on `AppConfig`'s `use_*` flags and their paired sub-configs, and hands
/// them out as trait objects for the dialogue engine and webhook dispatcher.
pub struct PeluServiceFactory {
    calendar_service: Option<Arc<dyn CalendarService<Error = BoxedError>>>,
    nlp_service: Option<Arc<dyn NlpService<Error = BoxedError>>>,
    messaging_service: Option<Arc<dyn MessagingService<Error = BoxedError>>>,
}

impl PeluServiceFactory {
    pub async fn new(config: Arc<AppConfig>) -> Self {
        let calendar_service = if is_feature_enabled(&config, config.use_gcal, config.gcal.as_ref()) {
            info!("initializing Google Calendar service");
            match create_calendar_hub(config.gcal.as_ref().unwrap()).await {
                Ok(hub) => {
                    let service: Arc<dyn CalendarService<Error = BoxedError>> =
                        Arc::new(GoogleCalendarService::new(Arc::new(hub)));
                    Some(service)
                }
                Err(e) => {
                    error!("failed to initialize Google Calendar service: {e}. Calendar features disabled.");
                    None
                }
            }
        } else {
            None
        };

        let nlp_service = if is_feature_enabled(&config, config.use_nlp, config.nlp.as_ref()) {
            let service: Arc<dyn NlpService<Error = BoxedError>> =
                Arc::new(HttpNlpInterpreter::new(config.nlp.as_ref().unwrap()));
            Some(service)
        } else {
            None
        };

        let messaging_service = if is_feature_enabled(&config, config.use_messaging, config.messaging.as_ref()) {
            let service: Arc<dyn MessagingService<Error = BoxedError>> =
                Arc::new(WhatsAppMessagingService::new(&config));
            Some(service)
        } else {
            None
        };

        Self { calendar_service, nlp_service, messaging_service }
    }
}

impl ServiceFactory for PeluServiceFactory {
    fn calendar_service(&self) -> Option<Arc<dyn CalendarService<Error = BoxedError>>> {
        self.calendar_service.clone()
    }

    fn nlp_service(&self) -> Option<Arc<dyn NlpService<Error = BoxedError>>> {
        self.nlp_service.clone()
    }

    fn messaging_service(&self) -> Option<Arc<dyn MessagingService<Error = BoxedError>>> {
        self.messaging_service.clone()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Mock service factory for testing: every service absent.
    #[derive(Default)]
    pub struct MockServiceFactory;

    impl ServiceFactory for MockServiceFactory {
        fn calendar_service(&self) -> Option<Arc<dyn CalendarService<Error = BoxedError>>> {
            None
        }

        fn nlp_service(&self) -> Option<Arc<dyn NlpService<Error = BoxedError>>> {
            None
        }

        fn messaging_service(&self) -> Option<Arc<dyn MessagingService<Error = BoxedError>>> {
            None
        }
    }
}
