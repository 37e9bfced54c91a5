//! Background maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use shelfmark_auth::VerificationService;

/// Periodically deletes verification tokens past expiry.
pub fn spawn_token_sweep(
    verification: Arc<VerificationService>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match verification.sweep_expired().await {
                Ok(counts) if counts.total() > 0 => {
                    tracing::info!(
                        email_verification = counts.email_verification,
                        password_reset = counts.password_reset,
                        "Expired verification tokens swept"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Token sweep failed");
                }
            }
        }
    })
}
