use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_token_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::sla_breach_sweep_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Cleanup expired single-use tokens (runs every hour)
    async fn expired_token_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;

            match tasks::cleanup_expired_tokens(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired tokens", count);
                    }
                }
                Err(e) => error!("Failed to cleanup expired tokens: {}", e),
            }
        }
    }

    /// Flag tickets past their first-response SLA (runs every 15 minutes)
    async fn sla_breach_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(900));

        loop {
            interval.tick().await;

            match tasks::sweep_sla_breaches(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("SLA sweep: {} open tickets past their due date", count);
                    }
                }
                Err(e) => error!("Failed to sweep SLA breaches: {}", e),
            }
        }
    }
}
