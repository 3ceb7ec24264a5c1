use std::sync::Arc;
use std::time::Duration;

use dashboard_core::store::{self, PgStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::Result;

/// Connect, run migrations and seed the well-known roles.
pub async fn connect(database_url: &str, max_connections: u32, query_timeout: Duration) -> Result<Arc<PgStore>> {
    info!(max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    let store = PgStore::new(pool).with_timeout(query_timeout);

    info!("running database migrations");
    store.migrate().await?;
    if store::initialize(&store).await? == 0 {
        warn!("no accounts yet; create one with `dashboard user new --role admin`");
    }

    Ok(Arc::new(store))
}
