/// Background task implementations
use crate::{context::AppContext, error::DeskResult};
use chrono::Utc;

/// Remove single-use tokens past their expiry
pub async fn cleanup_expired_tokens(ctx: &AppContext) -> DeskResult<u64> {
    ctx.tokens.cleanup_expired().await
}

/// Count open-side tickets with no first response past their due date.
///
/// The sweep only reports; breach is derived state and the queue UI
/// computes it per ticket. Logging here gives operators a periodic
/// headline number without a metrics stack.
pub async fn sweep_sla_breaches(ctx: &AppContext) -> DeskResult<u64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ticket
         WHERE deleted_at IS NULL
           AND status IN ('open', 'in_progress', 'awaiting_response')
           AND first_response_at IS NULL
           AND due_date < ?1",
    )
    .bind(Utc::now())
    .fetch_one(&ctx.db)
    .await?;

    Ok(count as u64)
}
