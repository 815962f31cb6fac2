pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::services::{
    attempt_service::AttemptService, report_service::ReportService, test_service::TestService,
};
use crate::store::{
    postgres::{PgAttemptStore, PgCatalog},
    AttemptStore, Catalog,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub attempt_service: AttemptService,
    pub report_service: ReportService,
    pub test_service: TestService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(pool: PgPool, jwt_secret: &str) -> Self {
        Self::with_stores(
            Arc::new(PgCatalog::new(pool.clone())),
            Arc::new(PgAttemptStore::new(pool)),
            jwt_secret,
        )
    }

    pub fn with_stores(
        catalog: Arc<dyn Catalog>,
        attempts: Arc<dyn AttemptStore>,
        jwt_secret: &str,
    ) -> Self {
        Self {
            attempt_service: AttemptService::new(catalog.clone(), attempts.clone()),
            report_service: ReportService::new(attempts),
            test_service: TestService::new(catalog),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
