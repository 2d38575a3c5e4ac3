#![forbid(unsafe_code)]

use super::*;
use rusqlite::{ErrorCode, OptionalExtension, params};
use sl_core::ids::{JobId, SessionId};

impl SqliteStore {
    /// Registers a job row with no recorded claim. Scheduling and lease
    /// arbitration live outside this crate; embedding frameworks use this
    /// edge to seed the registry the claim check reads.
    pub fn job_create(&mut self, id: JobId) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let insert = tx.execute(
            "INSERT INTO jobs(id, claim_session, created_at_ms, updated_at_ms) \
             VALUES (?1, NULL, ?2, ?2)",
            params![id.as_i64(), now_ms],
        );
        if let Err(err) = insert {
            if is_constraint_violation(&err) {
                return Err(StoreError::JobAlreadyExists(id));
            }
            return Err(StoreError::Sql(err));
        }

        tx.commit()?;
        Ok(())
    }

    /// Records `session` as the job's owner. Overwrites a previous claim
    /// unconditionally: which session deserves the job is the scheduler's
    /// decision, the registry only stores the outcome.
    pub fn job_claim(&mut self, id: JobId, session: &SessionId) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            "UPDATE jobs SET claim_session=?2, updated_at_ms=?3 WHERE id=?1",
            params![id.as_i64(), session.as_bytes(), now_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownJob(id));
        }

        tx.commit()?;
        Ok(())
    }

    /// Clears the recorded owner, returning the job to the unclaimed state.
    pub fn job_release(&mut self, id: JobId) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let changed = tx.execute(
            "UPDATE jobs SET claim_session=NULL, updated_at_ms=?2 WHERE id=?1",
            params![id.as_i64(), now_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownJob(id));
        }

        tx.commit()?;
        Ok(())
    }

    pub fn job_claim_session(&self, id: JobId) -> Result<Option<SessionId>, StoreError> {
        let row: Option<Option<Vec<u8>>> = self
            .conn
            .query_row(
                "SELECT claim_session FROM jobs WHERE id=?1",
                params![id.as_i64()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(stored) = row else {
            return Err(StoreError::UnknownJob(id));
        };

        match stored {
            Some(bytes) => {
                let session = SessionId::try_new(bytes)
                    .map_err(|_| StoreError::InvalidInput("stored claim session is invalid"))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}
