pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod statistics;

use std::sync::Arc;

use crate::cache::FragmentCache;
use crate::config::AppConfig;
use crate::db::PredictionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PredictionStore>,
    pub cache: Arc<dyn FragmentCache>,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
