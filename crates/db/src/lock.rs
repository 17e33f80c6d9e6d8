//! Lease lock for scheduled jobs running on several replicas.
//!
//! A lock is a row in `shedlock`. Acquiring upserts the row and only succeeds
//! when the previous lease has expired.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Statement};
use thiserror::Error;
use tracing::{debug, warn};

const ACQUIRE_SQL: &str = r"
INSERT INTO shedlock (name, lock_until, locked_at, locked_by)
VALUES ($1, $2, $3, $4)
ON CONFLICT (name) DO UPDATE
SET lock_until = EXCLUDED.lock_until,
    locked_at = EXCLUDED.locked_at,
    locked_by = EXCLUDED.locked_by
WHERE shedlock.lock_until <= EXCLUDED.locked_at
";

const RELEASE_SQL: &str = r"
UPDATE shedlock SET lock_until = $1
WHERE name = $2 AND locked_by = $3 AND locked_at = $4
";

/// Lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Hands out leases on named locks for one instance.
#[derive(Debug, Clone)]
pub struct LeaseLock {
    db: DatabaseConnection,
    instance: String,
}

/// A held lease. Call [`LockGuard::release`] when the work is done.
#[derive(Debug)]
#[must_use = "a lease is held until it is released or expires"]
pub struct LockGuard {
    db: DatabaseConnection,
    name: String,
    instance: String,
    locked_at: DateTime<Utc>,
    lock_at_least: TimeDelta,
}

impl LeaseLock {
    /// Creates a lock provider; `instance` is written to `locked_by`.
    #[must_use]
    pub fn new(db: DatabaseConnection, instance: impl Into<String>) -> Self {
        Self {
            db,
            instance: instance.into(),
        }
    }

    /// Tries to take the lease on `name`.
    ///
    /// Returns `None` when another holder's lease has not expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the database statement fails.
    pub async fn try_acquire(
        &self,
        name: &str,
        lock_at_most: TimeDelta,
        lock_at_least: TimeDelta,
    ) -> Result<Option<LockGuard>, LockError> {
        // Postgres keeps microseconds; release matches on locked_at.
        let now = Utc::now().trunc_subsecs(6);
        let until = now
            .checked_add_signed(lock_at_most)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if !self.upsert(name, now, until).await? {
            return Ok(None);
        }

        Ok(Some(LockGuard {
            db: self.db.clone(),
            name: name.to_string(),
            instance: self.instance.clone(),
            locked_at: now,
            lock_at_least,
        }))
    }

    /// Takes the lease on `name` until `until` and never releases it early.
    ///
    /// Used for once-per-window work: whoever wins the window owns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database statement fails.
    pub async fn try_acquire_until(
        &self,
        name: &str,
        until: DateTime<Utc>,
    ) -> Result<bool, LockError> {
        let now = Utc::now();
        if until <= now {
            return Ok(false);
        }
        self.upsert(name, now, until).await
    }

    async fn upsert(
        &self,
        name: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<bool, LockError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                ACQUIRE_SQL,
                [
                    name.into(),
                    until.into(),
                    now.into(),
                    self.instance.clone().into(),
                ],
            ))
            .await?;

        let acquired = result.rows_affected() == 1;
        debug!(lock = name, acquired, "Lease lock attempt");
        Ok(acquired)
    }
}

impl LockGuard {
    /// Lock name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ends the lease, keeping it at least until `locked_at + lock_at_least`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database statement fails.
    pub async fn release(self) -> Result<(), LockError> {
        let until = release_until(Utc::now(), self.locked_at, self.lock_at_least);
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                RELEASE_SQL,
                [
                    until.into(),
                    self.name.clone().into(),
                    self.instance.clone().into(),
                    self.locked_at.into(),
                ],
            ))
            .await?;

        if result.rows_affected() == 0 {
            warn!(lock = %self.name, "Lease expired before release");
        }
        Ok(())
    }
}

fn release_until(
    now: DateTime<Utc>,
    locked_at: DateTime<Utc>,
    lock_at_least: TimeDelta,
) -> DateTime<Utc> {
    locked_at
        .checked_add_signed(lock_at_least)
        .map_or(now, |minimum| now.max(minimum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_release_keeps_minimum_hold() {
        let locked_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let now = locked_at + TimeDelta::seconds(2);
        assert_eq!(
            release_until(now, locked_at, TimeDelta::seconds(10)),
            locked_at + TimeDelta::seconds(10)
        );
    }

    #[test]
    fn test_release_after_minimum_hold_is_immediate() {
        let locked_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let now = locked_at + TimeDelta::seconds(45);
        assert_eq!(release_until(now, locked_at, TimeDelta::seconds(10)), now);
    }
}
