/// Portal account store
///
/// Deliberately minimal: the support desk only needs accounts as the
/// owners of single-use tokens in the password reset flow. Session
/// management and authorization live elsewhere in the platform.
use crate::{
    db::models::Account,
    error::{DeskError, DeskResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Account manager service
#[derive(Clone)]
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a portal account
    pub async fn register(&self, email: &str, password: &str) -> DeskResult<Account> {
        Self::validate_email(email)?;
        Self::validate_password(password)?;

        if self.email_exists(email).await? {
            return Err(DeskError::Conflict("Email already registered".to_string()));
        }

        let password_hash = Self::hash_password(password)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO account (email, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(email)
        .bind(&password_hash)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Account {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            password_hash,
            created_at: now,
        })
    }

    /// Get account by email
    pub async fn get_by_email(&self, email: &str) -> DeskResult<Account> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at FROM account WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DeskError::NotFound("Account not found".to_string()))?;

        Ok(Account {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        })
    }

    /// Replace an account's password
    pub async fn set_password(&self, account_id: i64, new_password: &str) -> DeskResult<()> {
        Self::validate_password(new_password)?;

        let password_hash = Self::hash_password(new_password)?;
        let result = sqlx::query("UPDATE account SET password_hash = ?1 WHERE id = ?2")
            .bind(&password_hash)
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound("Account not found".to_string()));
        }

        Ok(())
    }

    /// Verify a password against an account's stored hash
    pub fn verify_password(account: &Account, password: &str) -> DeskResult<bool> {
        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| DeskError::Internal(format!("Corrupt password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    async fn email_exists(&self, email: &str) -> DeskResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    fn hash_password(password: &str) -> DeskResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DeskError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string())
    }

    fn validate_email(email: &str) -> DeskResult<()> {
        if !email.contains('@') {
            return Err(DeskError::Validation("Invalid email format".to_string()));
        }
        Ok(())
    }

    fn validate_password(password: &str) -> DeskResult<()> {
        if password.len() < 8 {
            return Err(DeskError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_register_and_verify() {
        let accounts = AccountManager::new(test_pool().await);

        let account = accounts
            .register("owner@ashatraders.example", "correct horse battery")
            .await
            .unwrap();

        let fetched = accounts.get_by_email("owner@ashatraders.example").await.unwrap();
        assert_eq!(fetched.id, account.id);
        assert!(AccountManager::verify_password(&fetched, "correct horse battery").unwrap());
        assert!(!AccountManager::verify_password(&fetched, "wrong").unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let accounts = AccountManager::new(test_pool().await);

        accounts.register("owner@example.com", "password123").await.unwrap();
        let result = accounts.register("owner@example.com", "password456").await;
        assert!(matches!(result, Err(DeskError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_set_password_replaces_hash() {
        let accounts = AccountManager::new(test_pool().await);

        let account = accounts.register("owner@example.com", "password123").await.unwrap();
        accounts.set_password(account.id, "new password 9").await.unwrap();

        let fetched = accounts.get_by_email("owner@example.com").await.unwrap();
        assert!(!AccountManager::verify_password(&fetched, "password123").unwrap());
        assert!(AccountManager::verify_password(&fetched, "new password 9").unwrap());
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let accounts = AccountManager::new(test_pool().await);
        let result = accounts.register("owner@example.com", "short").await;
        assert!(matches!(result, Err(DeskError::Validation(_))));
    }
}
