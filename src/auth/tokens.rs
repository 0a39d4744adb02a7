/// Single-use token flow for password resets
///
/// Two artifact kinds back the flow: a short numeric OTP emailed to the
/// account holder, and a reset token issued once the OTP verifies. Both
/// are stored hashed, expire, and are consumed exactly once. Issuing a
/// fresh artifact invalidates any prior unconsumed one of the same kind,
/// so at most one live token per (account, purpose) exists at a time.
use crate::{
    auth::AccountManager,
    error::{DeskError, DeskResult},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const PURPOSE_OTP: &str = "password_otp";
const PURPOSE_RESET: &str = "password_reset";

const OTP_TTL_MINUTES: i64 = 10;
const RESET_TTL_MINUTES: i64 = 60;

/// Single-use token service
#[derive(Clone)]
pub struct TokenFlow {
    db: SqlitePool,
    accounts: Arc<AccountManager>,
}

impl TokenFlow {
    pub fn new(db: SqlitePool, accounts: Arc<AccountManager>) -> Self {
        Self { db, accounts }
    }

    /// Start a password reset: issue a fresh OTP for the account
    ///
    /// Returns None when no account matches the email. Callers must
    /// respond identically either way so the endpoint cannot be used to
    /// enumerate registered addresses.
    pub async fn request_reset(&self, email: &str) -> DeskResult<Option<String>> {
        let account = match self.accounts.get_by_email(email).await {
            Ok(account) => account,
            Err(DeskError::NotFound(_)) => {
                tracing::debug!("Password reset requested for unknown email");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.issue(account.id, PURPOSE_OTP, &code, Duration::minutes(OTP_TTL_MINUTES))
            .await?;

        tracing::info!(account_id = account.id, "Password reset OTP issued");
        Ok(Some(code))
    }

    /// Verify an OTP and exchange it for a reset token
    ///
    /// The OTP is consumed even though the password has not changed yet;
    /// a second presentation of the same code must fail.
    pub async fn verify_otp(&self, email: &str, code: &str) -> DeskResult<String> {
        let account = self
            .accounts
            .get_by_email(email)
            .await
            .map_err(|_| DeskError::VerificationFailed)?;

        self.consume(account.id, PURPOSE_OTP, code).await?;

        let reset_token = Uuid::new_v4().to_string();
        self.issue(
            account.id,
            PURPOSE_RESET,
            &reset_token,
            Duration::minutes(RESET_TTL_MINUTES),
        )
        .await?;

        tracing::info!(account_id = account.id, "OTP verified, reset token issued");
        Ok(reset_token)
    }

    /// Complete a password reset with a previously issued reset token
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> DeskResult<()> {
        let account_id = self.find_owner(PURPOSE_RESET, reset_token).await?;

        self.consume(account_id, PURPOSE_RESET, reset_token).await?;
        self.accounts.set_password(account_id, new_password).await?;

        tracing::info!(account_id, "Password reset completed");
        Ok(())
    }

    /// Delete tokens past their expiry. Returns the number removed.
    pub async fn cleanup_expired(&self) -> DeskResult<u64> {
        let result = sqlx::query("DELETE FROM auth_token WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Store a hashed token, invalidating prior unconsumed ones of the
    /// same purpose
    async fn issue(
        &self,
        account_id: i64,
        purpose: &str,
        secret: &str,
        ttl: Duration,
    ) -> DeskResult<()> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE auth_token SET consumed = 1, consumed_at = ?1
             WHERE account_id = ?2 AND purpose = ?3 AND consumed = 0",
        )
        .bind(now)
        .bind(account_id)
        .bind(purpose)
        .execute(&self.db)
        .await?;

        sqlx::query(
            "INSERT INTO auth_token (id, account_id, purpose, secret_hash, created_at, expires_at, consumed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(account_id)
        .bind(purpose)
        .bind(hash_secret(secret))
        .bind(now)
        .bind(now + ttl)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Atomically consume the token matching the presented secret
    async fn consume(&self, account_id: i64, purpose: &str, secret: &str) -> DeskResult<()> {
        let row = sqlx::query(
            "SELECT id, expires_at, consumed FROM auth_token
             WHERE account_id = ?1 AND purpose = ?2 AND secret_hash = ?3
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(account_id)
        .bind(purpose)
        .bind(hash_secret(secret))
        .fetch_optional(&self.db)
        .await?
        .ok_or(DeskError::VerificationFailed)?;

        let token_id: String = row.get("id");
        let expires_at: DateTime<Utc> = row.get("expires_at");
        let consumed: bool = row.get("consumed");

        if consumed {
            return Err(DeskError::TokenAlreadyConsumed);
        }
        if expires_at < Utc::now() {
            return Err(DeskError::TokenExpired);
        }

        // The guard repeats consumed = 0 so a concurrent presentation of
        // the same secret succeeds for exactly one caller.
        let result = sqlx::query(
            "UPDATE auth_token SET consumed = 1, consumed_at = ?1
             WHERE id = ?2 AND consumed = 0",
        )
        .bind(Utc::now())
        .bind(token_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::TokenAlreadyConsumed);
        }

        Ok(())
    }

    async fn find_owner(&self, purpose: &str, secret: &str) -> DeskResult<i64> {
        let row = sqlx::query(
            "SELECT account_id FROM auth_token
             WHERE purpose = ?1 AND secret_hash = ?2
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(purpose)
        .bind(hash_secret(secret))
        .fetch_optional(&self.db)
        .await?
        .ok_or(DeskError::VerificationFailed)?;

        Ok(row.get("account_id"))
    }
}

fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn setup() -> (TokenFlow, Arc<AccountManager>) {
        let pool = test_pool().await;
        let accounts = Arc::new(AccountManager::new(pool.clone()));
        accounts
            .register("owner@ashatraders.example", "original pass")
            .await
            .unwrap();
        (TokenFlow::new(pool, accounts.clone()), accounts)
    }

    #[tokio::test]
    async fn test_full_reset_flow() {
        let (tokens, accounts) = setup().await;

        let code = tokens
            .request_reset("owner@ashatraders.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code.len(), 6);

        let reset_token = tokens
            .verify_otp("owner@ashatraders.example", &code)
            .await
            .unwrap();
        tokens.reset_password(&reset_token, "brand new pass").await.unwrap();

        let account = accounts.get_by_email("owner@ashatraders.example").await.unwrap();
        assert!(AccountManager::verify_password(&account, "brand new pass").unwrap());
        assert!(!AccountManager::verify_password(&account, "original pass").unwrap());
    }

    #[tokio::test]
    async fn test_otp_replay_rejected() {
        let (tokens, _) = setup().await;

        let code = tokens
            .request_reset("owner@ashatraders.example")
            .await
            .unwrap()
            .unwrap();

        tokens.verify_otp("owner@ashatraders.example", &code).await.unwrap();
        assert!(matches!(
            tokens.verify_otp("owner@ashatraders.example", &code).await,
            Err(DeskError::TokenAlreadyConsumed)
        ));
    }

    #[tokio::test]
    async fn test_wrong_code_fails_verification() {
        let (tokens, _) = setup().await;

        tokens.request_reset("owner@ashatraders.example").await.unwrap();
        assert!(matches!(
            tokens.verify_otp("owner@ashatraders.example", "000000").await,
            Err(DeskError::VerificationFailed)
        ));
    }

    #[tokio::test]
    async fn test_unknown_email_yields_no_code() {
        let (tokens, _) = setup().await;
        let result = tokens.request_reset("nobody@example.com").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_new_otp_invalidates_prior() {
        let (tokens, _) = setup().await;

        let first = tokens
            .request_reset("owner@ashatraders.example")
            .await
            .unwrap()
            .unwrap();
        let second = tokens
            .request_reset("owner@ashatraders.example")
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            tokens.verify_otp("owner@ashatraders.example", &first).await,
            Err(DeskError::TokenAlreadyConsumed) | Err(DeskError::VerificationFailed)
        ));
        tokens.verify_otp("owner@ashatraders.example", &second).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_token_rejected_and_cleaned_up() {
        let (tokens, accounts) = setup().await;
        let account = accounts.get_by_email("owner@ashatraders.example").await.unwrap();

        // Backdate a token past its expiry
        sqlx::query(
            "INSERT INTO auth_token (id, account_id, purpose, secret_hash, created_at, expires_at, consumed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(account.id)
        .bind(PURPOSE_OTP)
        .bind(hash_secret("123456"))
        .bind(Utc::now() - Duration::minutes(30))
        .bind(Utc::now() - Duration::minutes(20))
        .execute(&tokens.db)
        .await
        .unwrap();

        assert!(matches!(
            tokens.verify_otp("owner@ashatraders.example", "123456").await,
            Err(DeskError::TokenExpired)
        ));

        let removed = tokens.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_reset_token_single_use() {
        let (tokens, _) = setup().await;

        let code = tokens
            .request_reset("owner@ashatraders.example")
            .await
            .unwrap()
            .unwrap();
        let reset_token = tokens
            .verify_otp("owner@ashatraders.example", &code)
            .await
            .unwrap();

        tokens.reset_password(&reset_token, "first new pass").await.unwrap();
        assert!(matches!(
            tokens.reset_password(&reset_token, "second new pass").await,
            Err(DeskError::TokenAlreadyConsumed)
        ));
    }
}
