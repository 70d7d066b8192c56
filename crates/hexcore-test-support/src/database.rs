//! Scripted transactional backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::transaction::Database;

/// Shared, ordered log of named steps.
///
/// Used to observe the order in which middleware, handlers and the backend
/// run.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    /// Appends a step.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push(&self, step: impl Into<String>) {
        self.0.lock().unwrap().push(step.into());
    }

    /// Steps recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Backend that logs `begin`/`commit`/`rollback` and fails on request.
#[derive(Debug, Default)]
pub struct ScriptedDatabase {
    /// Where calls are logged.
    pub log: CallLog,
    /// Fail every `begin`.
    pub fail_begin: bool,
    /// Fail every `commit`.
    pub fail_commit: bool,
    /// Fail every `rollback`.
    pub fail_rollback: bool,
}

impl ScriptedDatabase {
    /// A backend that logs into `log` and never fails.
    #[must_use]
    pub fn logging_to(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Database for ScriptedDatabase {
    type Handle = ();

    async fn begin(&self) -> Result<(), DomainError> {
        self.log.push("begin");
        if self.fail_begin {
            return Err(DomainError::Infrastructure("begin refused".to_owned()));
        }
        Ok(())
    }

    async fn commit(&self, _handle: ()) -> Result<(), DomainError> {
        self.log.push("commit");
        if self.fail_commit {
            return Err(DomainError::Infrastructure("commit refused".to_owned()));
        }
        Ok(())
    }

    async fn rollback(&self, _handle: ()) -> Result<(), DomainError> {
        self.log.push("rollback");
        if self.fail_rollback {
            return Err(DomainError::Infrastructure("rollback refused".to_owned()));
        }
        Ok(())
    }
}
