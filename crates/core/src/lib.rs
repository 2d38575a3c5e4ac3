#![forbid(unsafe_code)]

pub mod ids {
    /// Numeric identity of a background job. Assigned by the scheduling
    /// layer; this crate only validates and carries it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct JobId(i64);

    impl JobId {
        pub fn as_i64(self) -> i64 {
            self.0
        }

        pub fn try_new(value: i64) -> Result<Self, JobIdError> {
            if value <= 0 {
                return Err(JobIdError::NonPositive);
            }
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum JobIdError {
        NonPositive,
    }

    impl JobIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::NonPositive => "job id must be positive",
            }
        }
    }

    const MAX_SESSION_ID_LEN: usize = 128;

    /// Opaque identity of the worker session currently responsible for a
    /// job. Compared only for byte equality; never parsed.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct SessionId(Vec<u8>);

    impl SessionId {
        pub fn as_bytes(&self) -> &[u8] {
            &self.0
        }

        pub fn into_bytes(self) -> Vec<u8> {
            self.0
        }

        pub fn try_new(value: impl Into<Vec<u8>>) -> Result<Self, SessionIdError> {
            let value = value.into();
            if value.is_empty() {
                return Err(SessionIdError::Empty);
            }
            if value.len() > MAX_SESSION_ID_LEN {
                return Err(SessionIdError::TooLong);
            }
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum SessionIdError {
        Empty,
        TooLong,
    }

    impl SessionIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "session id must not be empty",
                Self::TooLong => "session id is too long",
            }
        }
    }
}

pub mod model {
    use crate::ids::{JobId, SessionId};

    /// Caller-side handle for one background job: the id plus the session
    /// the worker currently believes it owns. A handle without a session is
    /// the unclaimed-but-locally-owned state (e.g. initial setup before the
    /// scheduler assigns ownership).
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Job {
        id: JobId,
        session: Option<SessionId>,
    }

    impl Job {
        pub fn new(id: JobId) -> Self {
            Self { id, session: None }
        }

        pub fn with_session(id: JobId, session: SessionId) -> Self {
            Self {
                id,
                session: Some(session),
            }
        }

        pub fn id(&self) -> JobId {
            self.id
        }

        pub fn session(&self) -> Option<&SessionId> {
            self.session.as_ref()
        }
    }
}
