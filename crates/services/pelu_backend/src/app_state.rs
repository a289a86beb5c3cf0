//! Shared state for the booking engine's HTTP surface.

use std::sync::Arc;

use pelu_common::services::ServiceFactory;
use pelu_config::AppConfig;
use pelu_db::repositories::{SqlProfessionalRepository, SqlReservationRepository, SqlServiceRepository};
use pelu_db::DbClient;
use pelu_dialogue::DialogueEngine;
use pelu_kv::KvStore;

use crate::service_factory::PeluServiceFactory;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service_factory: Arc<dyn ServiceFactory>,
    pub db: DbClient,
    pub kv: Arc<dyn KvStore>,
    pub engine: Arc<DialogueEngine>,
}

impl AppState {
    /// Wires the DB, KV and external service clients from `config` into a
    /// single `DialogueEngine`, ready to be shared across axum handlers.
    pub async fn new(config: Arc<AppConfig>) -> Result<Self, Box<dyn std::error::Error>> {
        let db = DbClient::new(&config).await?;
        let kv = pelu_kv::build_kv_store(&config).await?;
        let service_factory = Arc::new(PeluServiceFactory::new(config.clone()).await);

        let services = SqlServiceRepository::new(db.clone());
        let professionals = SqlProfessionalRepository::new(db.clone());
        let reservations = SqlReservationRepository::new(db.clone());

        let engine = Arc::new(DialogueEngine::new(
            kv.clone(),
            services,
            professionals,
            reservations,
            service_factory.calendar_service(),
            service_factory.nlp_service(),
        ));

        Ok(Self { config, service_factory, db, kv, engine })
    }
}
