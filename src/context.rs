/// Application context and dependency injection
use crate::{
    attachments::{AttachmentStore, DiskAttachmentStore},
    auth::{AccountManager, TokenFlow},
    categories::CategoryManager,
    config::ServerConfig,
    db,
    error::DeskResult,
    mailer::Mailer,
    notify::Notifier,
    tickets::{RatingTracker, SequenceAllocator, ThreadManager, TicketManager},
};
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: sqlx::SqlitePool,
    pub categories: Arc<CategoryManager>,
    pub tickets: Arc<TicketManager>,
    pub thread: Arc<ThreadManager>,
    pub ratings: Arc<RatingTracker>,
    pub accounts: Arc<AccountManager>,
    pub tokens: Arc<TokenFlow>,
    pub mailer: Arc<Mailer>,
    pub attachment_store: Arc<dyn AttachmentStore>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> DeskResult<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        tokio::fs::create_dir_all(&config.storage.attachment_directory).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        let notifier = Notifier::new(
            pool.clone(),
            Arc::clone(&mailer),
            config.service.public_url.clone(),
        );

        let categories = Arc::new(CategoryManager::new(pool.clone()));
        let tickets = Arc::new(TicketManager::new(
            pool.clone(),
            SequenceAllocator::new(pool.clone()),
            Arc::clone(&categories),
            notifier.clone(),
        ));
        let thread = Arc::new(ThreadManager::new(pool.clone(), notifier.clone()));
        let ratings = Arc::new(RatingTracker::new(pool.clone(), notifier));

        let accounts = Arc::new(AccountManager::new(pool.clone()));
        let tokens = Arc::new(TokenFlow::new(pool.clone(), Arc::clone(&accounts)));

        let attachment_store: Arc<dyn AttachmentStore> = Arc::new(DiskAttachmentStore::new(
            config.storage.attachment_directory.clone(),
        ));

        if config.admin.api_token.is_none() {
            tracing::warn!("DESK_ADMIN_API_TOKEN not set, admin API is disabled");
        }

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            categories,
            tickets,
            thread,
            ratings,
            accounts,
            tokens,
            mailer,
            attachment_store,
        })
    }
}
