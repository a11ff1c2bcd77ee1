// src/api/state.rs
use crate::config::AppConfig;
use crate::host::HostController;
use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: Client,
    pub host: Arc<HostController>,
    pub db_pool: Option<Arc<SqlitePool>>,
}

impl AppState {
    pub fn new(config: AppConfig, host: HostController, db_pool: Option<SqlitePool>) -> Self {
        Self {
            config: Arc::new(config),
            client: Client::new(),
            host: Arc::new(host),
            db_pool: db_pool.map(Arc::new),
        }
    }
}
