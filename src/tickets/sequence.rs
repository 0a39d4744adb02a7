/// Per-day ticket sequence allocation
///
/// Issues strictly increasing sequence numbers per UTC calendar day for
/// identifier construction. Allocation claims a `(day, seq)` row in the
/// `ticket_seq` table; the primary key rejects a slot already taken by a
/// concurrent caller, in which case the allocator retries with the next
/// candidate. Claimed slots are never released, so a tombstoned ticket's
/// identifier can never be reissued.
use crate::error::{DeskError, DeskResult};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

/// Retry budget before surfacing an allocation conflict
const DEFAULT_MAX_RETRIES: u32 = 10;

/// Daily sequence allocator
#[derive(Clone)]
pub struct SequenceAllocator {
    db: SqlitePool,
    max_retries: u32,
}

impl SequenceAllocator {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[cfg(test)]
    pub fn with_max_retries(db: SqlitePool, max_retries: u32) -> Self {
        Self { db, max_retries }
    }

    /// Claim the next unused positive sequence for `day`.
    ///
    /// Two concurrent callers never receive the same number: the claim is
    /// an INSERT protected by the (day, seq) primary key, retried with the
    /// next candidate on a uniqueness violation.
    pub async fn next_seq(&self, day: NaiveDate) -> DeskResult<i64> {
        let day_key = day.format("%Y-%m-%d").to_string();

        for attempt in 0..self.max_retries {
            let candidate: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM ticket_seq WHERE day = ?1",
            )
            .bind(&day_key)
            .fetch_one(&self.db)
            .await?;

            let claim = sqlx::query(
                "INSERT INTO ticket_seq (day, seq, claimed_at) VALUES (?1, ?2, ?3)",
            )
            .bind(&day_key)
            .bind(candidate)
            .bind(Utc::now())
            .execute(&self.db)
            .await;

            match claim {
                Ok(_) => return Ok(candidate),
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    tracing::debug!(
                        day = %day_key,
                        candidate,
                        attempt,
                        "Sequence slot already claimed, retrying"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(day = %day_key, retries = self.max_retries, "Sequence allocation exhausted retries");
        Err(DeskError::AllocationConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_sequences_increase_within_a_day() {
        let allocator = SequenceAllocator::new(test_pool().await);
        let d = day(2025, 12, 17);

        assert_eq!(allocator.next_seq(d).await.unwrap(), 1);
        assert_eq!(allocator.next_seq(d).await.unwrap(), 2);
        assert_eq!(allocator.next_seq(d).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sequences_reset_per_day() {
        let allocator = SequenceAllocator::new(test_pool().await);

        assert_eq!(allocator.next_seq(day(2025, 12, 17)).await.unwrap(), 1);
        assert_eq!(allocator.next_seq(day(2025, 12, 18)).await.unwrap(), 1);
        assert_eq!(allocator.next_seq(day(2025, 12, 17)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_distinct() {
        let allocator = SequenceAllocator::new(test_pool().await);
        let d = day(2025, 12, 17);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move { allocator.next_seq(d).await }));
        }

        let mut seqs = Vec::new();
        for handle in handles {
            seqs.push(handle.await.unwrap().unwrap());
        }

        seqs.sort_unstable();
        let expected: Vec<i64> = (1..=20).collect();
        assert_eq!(seqs, expected);
    }

    #[tokio::test]
    async fn test_allocation_continues_past_existing_claims() {
        let pool = test_pool().await;
        let allocator = SequenceAllocator::with_max_retries(pool.clone(), 3);
        let d = day(2025, 12, 17);

        for seq in 1..=3 {
            sqlx::query("INSERT INTO ticket_seq (day, seq, claimed_at) VALUES (?1, ?2, ?3)")
                .bind("2025-12-17")
                .bind(seq)
                .bind(Utc::now())
                .execute(&pool)
                .await
                .unwrap();
        }

        assert_eq!(allocator.next_seq(d).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_zero_retry_budget_surfaces_conflict() {
        let allocator = SequenceAllocator::with_max_retries(test_pool().await, 0);

        match allocator.next_seq(day(2025, 12, 17)).await {
            Err(DeskError::AllocationConflict) => {}
            other => panic!("expected AllocationConflict, got {:?}", other.map(|_| ())),
        }
    }
}
