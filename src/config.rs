/// Configuration management for the support desk service
use crate::error::{DeskError, DeskResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub email: Option<EmailConfig>,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Public base URL used in outbound email links
    pub public_url: String,
    pub attachment_upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub attachment_directory: PathBuf,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer token required on /api/admin routes; admin API is disabled
    /// when unset
    pub api_token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> DeskResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("DESK_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DESK_PORT")
            .unwrap_or_else(|_| "8710".to_string())
            .parse()
            .map_err(|_| DeskError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("DESK_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let attachment_upload_limit = env::var("DESK_ATTACHMENT_UPLOAD_LIMIT")
            .unwrap_or_else(|_| "5242880".to_string())
            .parse()
            .unwrap_or(5_242_880);

        let data_directory: PathBuf = env::var("DESK_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("DESK_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("supportdesk.sqlite"));
        let attachment_directory = env::var("DESK_ATTACHMENT_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("attachments"));

        let email = if let Ok(smtp_url) = env::var("DESK_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("DESK_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("support@{}", hostname)),
            })
        } else {
            None
        };

        let api_token = env::var("DESK_ADMIN_API_TOKEN").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                attachment_upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                database,
                attachment_directory,
            },
            email,
            admin: AdminConfig { api_token },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> DeskResult<()> {
        if self.service.hostname.is_empty() {
            return Err(DeskError::Validation("Hostname cannot be empty".to_string()));
        }

        if let Some(token) = &self.admin.api_token {
            if token.len() < 16 {
                return Err(DeskError::Validation(
                    "Admin API token must be at least 16 characters".to_string(),
                ));
            }
        }

        Ok(())
    }
}
