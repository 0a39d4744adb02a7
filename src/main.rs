/// Support desk service
///
/// Ticket intake, conversation threads, SLA tracking, satisfaction
/// ratings, and the password reset flow for the customer portal.

mod api;
mod attachments;
mod auth;
mod categories;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod mailer;
mod notify;
mod server;
mod tickets;

use config::ServerConfig;
use context::AppContext;
use error::DeskResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> DeskResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supportdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Support Desk v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;

    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}
