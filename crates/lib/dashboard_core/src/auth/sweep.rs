//! Periodic removal of stale tokens, sessions and OAuth states.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use super::tokens;
use crate::models::token::TOKEN_EXPIRY;
use crate::store::{OAuthStateStore, SessionStore, Store};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Run one sweep. Failures are logged and never propagated.
pub async fn sweep_once(store: &dyn Store) {
    tokens::sweep(store, TOKEN_EXPIRY).await;

    let now = Utc::now();
    match store.sweep_expired_sessions(now).await {
        Ok(0) => {}
        Ok(n) => info!(removed = n, "swept expired sessions"),
        Err(e) => error!(error = %e, "session sweep failed"),
    }
    match store.sweep_expired_oauth_states(now).await {
        Ok(0) => {}
        Ok(n) => info!(removed = n, "swept expired oauth states"),
        Err(e) => error!(error = %e, "oauth state sweep failed"),
    }
}

/// Spawn a task that sweeps every `every`. A zero interval falls back to
/// [`DEFAULT_SWEEP_INTERVAL`].
pub fn spawn_sweep_task(store: Arc<dyn Store>, every: Duration) -> tokio::task::JoinHandle<()> {
    let every = if every.is_zero() {
        warn!(default = ?DEFAULT_SWEEP_INTERVAL, "zero sweep interval, using default");
        DEFAULT_SWEEP_INTERVAL
    } else {
        every
    };
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            sweep_once(store.as_ref()).await;
        }
    })
}
