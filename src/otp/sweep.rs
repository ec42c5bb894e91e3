use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::repo::OtpCode;

/// Periodically delete expired OTP rows. Failures are logged and the loop
/// keeps running; nothing is surfaced to request handlers.
pub fn spawn_expired_sweep(db: PgPool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            match OtpCode::delete_expired(&db).await {
                Ok(0) => {}
                Ok(n) => info!(deleted = n, "swept expired otp codes"),
                Err(e) => error!(error = %e, "otp sweep failed"),
            }
        }
    })
}
