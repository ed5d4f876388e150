use anyhow::Context;
use chrono::{Datelike, NaiveDate};

// Session-scoped advisory lock; keeps two evaluation runs for the same date from interleaving
// their site_evaluations rows.
const LOCK_NAMESPACE: i64 = 0x4352_4953_5059; // "CRISPY"

pub fn run_lock_key(as_of_date: NaiveDate) -> i64 {
    LOCK_NAMESPACE ^ i64::from(as_of_date.num_days_from_ce())
}

pub async fn try_acquire_run_lock(
    conn: &mut sqlx::PgConnection,
    as_of_date: NaiveDate,
) -> anyhow::Result<bool> {
    let key = run_lock_key(as_of_date);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire run lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_run_lock(
    conn: &mut sqlx::PgConnection,
    as_of_date: NaiveDate,
) -> anyhow::Result<()> {
    let key = run_lock_key(as_of_date);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to release run lock (key={key})"))?;
    Ok(())
}
