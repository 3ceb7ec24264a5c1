use std::sync::Arc;

use dashboard_api::config::ApiConfig;
use dashboard_api::{AppState, router};
use dashboard_core::auth::sweep::spawn_sweep_task;
use dashboard_core::mail::{LogMailer, Mailer, SmtpMailer};
use dashboard_core::store::Store;
use tracing::{info, warn};

use crate::cli::ServerArgs;
use crate::{Result, db};

pub async fn run(database: Option<String>, args: ServerArgs) -> Result<()> {
    let mut config = ApiConfig::from_env();
    if let Some(database) = database {
        config.database_url = database;
    }
    args.apply(&mut config);

    info!(bind_addr = %config.bind_addr, dev = config.dev, "starting dashboard server");

    let store: Arc<dyn Store> = db::connect(&config.database_url, args.max_connections, config.store_timeout).await?;

    let mailer: Arc<dyn Mailer> = if config.dev {
        info!("dev mode: outgoing mail is logged, not sent");
        Arc::new(LogMailer)
    } else {
        Arc::new(SmtpMailer::new(&config.smtp)?)
    };

    let sweep = spawn_sweep_task(store.clone(), config.sweep_interval);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let app = router(AppState::new(store, mailer, config));

    info!(addr = %local_addr, "REST API listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweep.abort();
    served?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
