use std::sync::Arc;

use predictions::api::router::create_router;
use predictions::cache::{FragmentCache, MemoryFragmentCache};
use predictions::config::AppConfig;
use predictions::db::{self, MemoryStore, PgStore, PredictionStore};
use predictions::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let store: Arc<dyn PredictionStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            tracing::info!("Database connected, migrations applied");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, predictions are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let cache: Arc<dyn FragmentCache> =
        Arc::new(MemoryFragmentCache::with_capacity(config.fragment_cache_capacity));

    tracing::info!(
        identity_header = %config.identity_header,
        proxy_token = config.proxy_token.is_some(),
        login_path = %config.login_path,
        "Requester resolution configured"
    );

    let state = AppState {
        store,
        cache,
        metrics_handle: predictions::metrics::init_metrics(),
        config,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
