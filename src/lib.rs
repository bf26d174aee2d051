pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod pagination;
pub mod sources;
pub mod telemetry;

use std::sync::Arc;

use aggregator::Aggregator;
use config::Config;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn from_config(config: Config) -> error::Result<Self> {
        let aggregator = Aggregator::from_config(&config)?;
        Ok(AppState {
            config: Arc::new(config),
            aggregator: Arc::new(aggregator),
        })
    }
}
