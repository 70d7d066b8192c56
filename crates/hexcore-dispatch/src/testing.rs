//! Requests and handlers shared by the middleware tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hexcore_core::cache::CachePolicy;
use hexcore_core::error::DomainError;
use hexcore_core::request::{Handler, Message, Request, RequestKind};
use hexcore_core::transaction::RequestContext;
use hexcore_test_support::{CallLog, ScriptedDatabase};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Calls(pub u32);

/// Query with a configurable cache policy and validity.
#[derive(Debug, Default)]
pub(crate) struct Probe {
    pub cache: Option<CachePolicy>,
    pub invalid: bool,
}

impl Message for Probe {
    fn validate(&self) -> Result<(), DomainError> {
        if self.invalid {
            return Err(DomainError::Validation("probe is invalid".into()));
        }
        Ok(())
    }

    fn cache_policy(&self) -> Option<CachePolicy> {
        self.cache.clone()
    }
}

impl Request for Probe {
    type Output = Calls;
    const KIND: RequestKind = RequestKind::Query;
}

/// Command that invalidates the given keys.
#[derive(Debug, Default)]
pub(crate) struct Touch {
    pub keys: Vec<String>,
}

impl Message for Touch {
    fn invalidates(&self) -> Vec<String> {
        self.keys.clone()
    }
}

impl Request for Touch {
    type Output = Calls;
    const KIND: RequestKind = RequestKind::Command;
}

/// Counts calls, optionally sleeps, and plays back scripted failures before
/// succeeding.
#[derive(Debug, Default)]
pub(crate) struct ScriptedHandler {
    pub calls: AtomicU32,
    pub failures: Mutex<VecDeque<DomainError>>,
    pub delay: Option<Duration>,
    pub transactional: bool,
    pub log: CallLog,
}

impl ScriptedHandler {
    pub(crate) fn failing_with(errors: Vec<DomainError>) -> Self {
        Self {
            failures: Mutex::new(errors.into()),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn run(&self, ctx: &RequestContext<ScriptedDatabase>) -> Result<Calls, DomainError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.push(if ctx.in_transaction() {
            "handler(tx)"
        } else {
            "handler"
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failures.lock().unwrap().pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(Calls(n)),
        }
    }
}

#[async_trait]
impl Handler<Probe, ScriptedDatabase> for ScriptedHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext<ScriptedDatabase>,
        _request: &Probe,
    ) -> Result<Calls, DomainError> {
        self.run(ctx).await
    }

    fn requires_transaction(&self) -> bool {
        self.transactional
    }
}

#[async_trait]
impl Handler<Touch, ScriptedDatabase> for ScriptedHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext<ScriptedDatabase>,
        _request: &Touch,
    ) -> Result<Calls, DomainError> {
        self.run(ctx).await
    }

    fn requires_transaction(&self) -> bool {
        self.transactional
    }
}

/// Shares one handler between several registrations.
pub(crate) struct Shared(pub std::sync::Arc<ScriptedHandler>);

#[async_trait]
impl<R> Handler<R, ScriptedDatabase> for Shared
where
    R: Request,
    ScriptedHandler: Handler<R, ScriptedDatabase>,
{
    async fn handle(
        &self,
        ctx: &mut RequestContext<ScriptedDatabase>,
        request: &R,
    ) -> Result<R::Output, DomainError> {
        Handler::<R, ScriptedDatabase>::handle(self.0.as_ref(), ctx, request).await
    }

    fn requires_transaction(&self) -> bool {
        Handler::<R, ScriptedDatabase>::requires_transaction(self.0.as_ref())
    }
}
