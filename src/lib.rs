use std::sync::Arc;

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use services::{auth::Authenticator, db_loader::Warehouse, profiler::Profiler};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub profiler: Arc<Profiler>,
    pub authenticator: Arc<dyn Authenticator>,
    pub warehouse: Arc<dyn Warehouse>,
}

impl AppState {
    pub fn new(
        config: config::Config,
        authenticator: Arc<dyn Authenticator>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        let profiler = Arc::new(Profiler::new(config.top_n));
        Self {
            config,
            profiler,
            authenticator,
            warehouse,
        }
    }
}
