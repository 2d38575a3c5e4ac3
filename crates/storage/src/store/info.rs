#![forbid(unsafe_code)]

use super::*;
use rusqlite::types::ValueRef;
use rusqlite::{OptionalExtension, Row, Transaction, params};
use sl_core::ids::SessionId;
use sl_core::model::Job;
use tracing::debug;

pub const LEGACY_PAYLOAD_KEY: &[u8] = b"legacy_payload";
pub const LEGACY_PROGRESS_KEY: &[u8] = b"legacy_progress";

/// Per-job view of the `job_info` table. Every operation runs inside the
/// borrowed transaction on behalf of the bound job; the handle holds no
/// state of its own, so atomicity across a sequence of calls is exactly the
/// caller's transaction boundary.
pub struct InfoStorage<'a> {
    job: &'a Job,
    tx: &'a Transaction<'a>,
}

impl<'a> InfoStorage<'a> {
    pub fn new(job: &'a Job, tx: &'a Transaction<'a>) -> Self {
        Self { job, tx }
    }

    fn check_claim_session(&self, session: &SessionId) -> Result<(), StoreError> {
        let row: Option<Option<Vec<u8>>> = self
            .tx
            .query_row(
                "SELECT claim_session FROM jobs WHERE id=?1",
                params![self.job.id().as_i64()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(stored) = row else {
            return Err(StoreError::UnknownJob(self.job.id()));
        };

        let Some(stored) = stored else {
            // Row exists but nothing holds the claim: the normal bypass for
            // jobs whose ownership has not been assigned (or was released).
            debug!(
                job_id = self.job.id().as_i64(),
                "job has no recorded claim session; writing without fencing"
            );
            return Ok(());
        };

        if stored != session.as_bytes() {
            return Err(StoreError::ClaimMismatch {
                expected: hex(session.as_bytes()),
                stored: hex(&stored),
            });
        }

        Ok(())
    }

    fn ensure_claim(&self) -> Result<(), StoreError> {
        match self.job.session() {
            Some(session) => self.check_claim_session(session),
            None => {
                debug!(
                    job_id = self.job.id().as_i64(),
                    "writing job info with no session id"
                );
                Ok(())
            }
        }
    }

    /// Fetches the newest revision recorded for `info_key`, if any.
    pub fn get(&self, info_key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut stmt = self.tx.prepare(
            "SELECT value FROM job_info \
             WHERE job_id=?1 AND info_key=?2 \
             ORDER BY written DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![self.job.id().as_i64(), info_key])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(blob_column(row, 0, "value")?))
    }

    /// Replaces whatever is recorded under `info_key` with `value`: claim
    /// check, delete every prior revision, insert the new row. After return,
    /// exactly one revision exists for the key; the caller's commit or
    /// rollback finalizes or discards the whole triple.
    pub fn write(&self, info_key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_claim()?;

        // Clear out any older revisions first; latest-wins must not depend
        // on readers tie-breaking duplicate `written` values.
        self.tx.execute(
            "DELETE FROM job_info WHERE job_id=?1 AND info_key=?2",
            params![self.job.id().as_i64(), info_key],
        )?;

        self.tx.execute(
            "INSERT INTO job_info(job_id, info_key, written, value) VALUES (?1, ?2, ?3, ?4)",
            params![self.job.id().as_i64(), info_key, now_ms(), value],
        )?;

        Ok(())
    }

    /// Removes every revision recorded under `info_key`. Fenced like
    /// `write`; removing an absent key succeeds.
    pub fn delete(&self, info_key: &[u8]) -> Result<(), StoreError> {
        self.ensure_claim()?;

        self.tx.execute(
            "DELETE FROM job_info WHERE job_id=?1 AND info_key=?2",
            params![self.job.id().as_i64(), info_key],
        )?;

        Ok(())
    }

    /// Walks all records whose key starts with `prefix` in ascending key
    /// order, invoking `visit` once per distinct key with that key's newest
    /// value. An error from `visit` aborts the scan and is returned
    /// unchanged.
    pub fn iterate(
        &self,
        prefix: &[u8],
        mut visit: impl FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        // The sort is the de-duplication contract: ascending key, newest
        // revision first, so the first row seen per key is the one to keep.
        let mut stmt = self.tx.prepare(
            "SELECT info_key, value FROM job_info \
             WHERE job_id=?1 AND substr(info_key, 1, ?2) = ?3 \
             ORDER BY info_key ASC, written DESC",
        )?;
        let mut rows = stmt.query(params![
            self.job.id().as_i64(),
            prefix.len() as i64,
            prefix
        ])?;

        let mut prev_key: Option<Vec<u8>> = None;
        while let Some(row) = rows.next()? {
            let info_key = blob_column(row, 0, "info_key")?;
            if prev_key.as_deref() == Some(info_key.as_slice()) {
                continue;
            }

            let value = blob_column(row, 1, "value")?;
            visit(&info_key, &value)?;
            prev_key = Some(info_key);
        }

        Ok(())
    }

    pub fn get_legacy_payload(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.get(LEGACY_PAYLOAD_KEY)
    }

    pub fn write_legacy_payload(&self, payload: &[u8]) -> Result<(), StoreError> {
        self.write(LEGACY_PAYLOAD_KEY, payload)
    }

    pub fn get_legacy_progress(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.get(LEGACY_PROGRESS_KEY)
    }

    pub fn write_legacy_progress(&self, progress: &[u8]) -> Result<(), StoreError> {
        self.write(LEGACY_PROGRESS_KEY, progress)
    }
}

fn blob_column(row: &Row<'_>, index: usize, column: &'static str) -> Result<Vec<u8>, StoreError> {
    match row.get_ref(index)? {
        ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
        other => Err(StoreError::Assertion {
            column,
            actual: other.data_type(),
        }),
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
