//! Cooperative cancellation shared by the prober, fetcher and coordinator.
//!
//! A single token is created per job. The shell cancels it (Ctrl+C here, a
//! button in a GUI) and the core checks it before every probe step, every
//! fetch attempt and every outcome it consumes.

use tracing::warn;

pub use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first Ctrl+C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested, stopping download");
            token.cancel();
        }
    });
}
