use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgPool, Row};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("db: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// A claimed job handed to a worker.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub job_type: String,
    pub args: serde_json::Value,
    pub error_count: i32,
}

/// Producer-side seam; the sync pipeline only ever enqueues through this.
#[async_trait]
pub trait Enqueuer: Send + Sync {
    async fn enqueue(&self, job_type: &str, args: serde_json::Value) -> Result<(), QueueError>;
}

#[derive(Debug, Clone)]
pub struct QueueClient {
    pool: PgPool,
}

// Same claim shape as the accounts state machine: the select runs inside
// the update statement, skip-locked so concurrent pollers fan out over
// distinct rows.
const CLAIM_NEXT_JOB_SQL: &str = r#"
    UPDATE jobs
    SET locked_at = $1
    FROM (
        SELECT id FROM jobs
        WHERE run_at <= $1
          AND (locked_at IS NULL OR locked_at <= $2)
        ORDER BY run_at ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
    ) AS next_job
    WHERE jobs.id = next_job.id
    RETURNING jobs.id, jobs.job_type, jobs.args, jobs.error_count
"#;

impl QueueClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claims the next due job, taking over jobs whose worker lease expired
    /// at `lease_expired_before` (crashed mid-run).
    pub(crate) async fn claim_next(
        &self,
        now: DateTime<Utc>,
        lease_expired_before: DateTime<Utc>,
    ) -> Result<Option<Job>, QueueError> {
        let row = sqlx::query(CLAIM_NEXT_JOB_SQL)
            .bind(now)
            .bind(lease_expired_before)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Job {
                id: row.try_get("id")?,
                job_type: row.try_get("job_type")?,
                args: row.try_get("args")?,
                error_count: row.try_get("error_count")?,
            })
        })
        .transpose()
    }

    pub(crate) async fn complete(&self, job_id: i64) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Releases a failed job back to the queue at `retry_at`.
    pub(crate) async fn fail(
        &self,
        job_id: i64,
        last_error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        sqlx::query(
            "UPDATE jobs SET locked_at = NULL, error_count = error_count + 1, \
             last_error = $2, run_at = $3 WHERE id = $1",
        )
        .bind(job_id)
        .bind(last_error)
        .bind(retry_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Enqueuer for QueueClient {
    async fn enqueue(&self, job_type: &str, args: serde_json::Value) -> Result<(), QueueError> {
        sqlx::query("INSERT INTO jobs (job_type, args, run_at) VALUES ($1, $2, $3)")
            .bind(job_type)
            .bind(args)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Delay before the `n`-th retry: 10s doubling per attempt, capped at an
/// hour.
pub(crate) fn retry_backoff(error_count: i32) -> Duration {
    const BASE_SECS: i64 = 10;
    const MAX_SECS: i64 = 3600;

    let exp = error_count.clamp(0, 30) as u32;
    let secs = BASE_SECS.saturating_mul(1_i64 << exp).min(MAX_SECS);
    Duration::seconds(secs)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(0), Duration::seconds(10));
        assert_eq!(retry_backoff(1), Duration::seconds(20));
        assert_eq!(retry_backoff(5), Duration::seconds(320));
        assert_eq!(retry_backoff(12), Duration::seconds(3600));
        assert_eq!(retry_backoff(30), Duration::seconds(3600));
    }

    #[test]
    fn backoff_tolerates_negative_counts() {
        assert_eq!(retry_backoff(-3), Duration::seconds(10));
    }
}
