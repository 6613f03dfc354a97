pub mod memory;
pub mod notification_repo;
pub mod pg;
pub mod prediction_repo;
pub mod response_repo;
pub mod store;

pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::{CreateError, PredictionStore, StoreError};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
