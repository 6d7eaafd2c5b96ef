//! Named tracker that runs remote calls and publishes their lifecycle.
//!
//! # Responsibility
//! - Flip to `Pending` as soon as a call is started.
//! - Settle to exactly one terminal status per call and hand the outcome
//!   back to the caller.
//! - Publish every transition through a `watch` channel.
//!
//! # Invariants
//! - Each transition is a single `send_modify`, so observers never see a
//!   half-written state.
//! - With overlapping calls the state reflects the most recently settled one.
//! - `run_and_apply` runs its `apply` step before `Fulfilled` is published.
//! - A call is `Pending` from the moment it is invoked, not first polled.

use crate::client::{TransportError, TransportResult};
use crate::query::state::{QueryError, QuerySnapshot, QueryState, QueryStatus};
use log::{debug, warn};
use std::cell::Cell;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

pub struct QueryTracker<T> {
    name: &'static str,
    state: watch::Sender<QueryState<T>>,
    next_seq: Cell<u64>,
    timeout: Option<Duration>,
}

impl<T: Clone> QueryTracker<T> {
    pub fn new(name: &'static str) -> Self {
        Self::with_state(name, QueryState::idle(None))
    }

    /// Tracker whose idle state already carries `value`.
    pub fn seeded(name: &'static str, value: T) -> Self {
        Self::with_state(name, QueryState::idle(Some(value)))
    }

    fn with_state(name: &'static str, initial: QueryState<T>) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            name,
            state,
            next_seq: Cell::new(0),
            timeout: None,
        }
    }

    /// Settles calls that outlive `timeout` as `TransportError::Timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> QueryStatus {
        self.state.borrow().status()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    pub fn value(&self) -> Option<T> {
        self.state.borrow().value().cloned()
    }

    pub fn error(&self) -> Option<QueryError> {
        self.state.borrow().error().cloned()
    }

    /// Copy of the full current state.
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        self.state.borrow().snapshot()
    }

    /// Receiver that wakes on every transition.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Runs the call produced by `factory` and tracks it.
    ///
    /// The state is `Pending` as soon as this returns, before the future is
    /// first polled. Dropping the future unpolled hands the state back.
    ///
    /// # Errors
    /// Returns the transport failure wrapped with this tracker's name after
    /// the state has moved to `Rejected`.
    pub fn run<'a, F, Fut>(&'a self, factory: F) -> impl Future<Output = Result<T, QueryError>> + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = TransportResult<T>> + 'a,
        T: 'a,
    {
        self.run_and_apply(factory, T::clone)
    }

    /// Like `run`, but `apply` sees the value before `Fulfilled` is
    /// published. Stores reconcile in `apply`, so anything waiting for the
    /// call to leave `Pending` observes reconciled data.
    pub fn run_and_apply<'a, F, Fut, A, R>(
        &'a self,
        factory: F,
        apply: A,
    ) -> impl Future<Output = Result<R, QueryError>> + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = TransportResult<T>> + 'a,
        A: FnOnce(&T) -> R + 'a,
        R: 'a,
        T: 'a,
    {
        let call = InFlightCall::begin(self);
        async move {
            let outcome = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, factory()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(TransportError::Timeout(
                        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    )),
                },
                None => factory().await,
            };
            call.settle(outcome, apply)
        }
    }
}

/// One started call; settles exactly once or hands `Pending` back on drop.
struct InFlightCall<'a, T> {
    tracker: &'a QueryTracker<T>,
    seq: u64,
    settled: bool,
}

impl<'a, T: Clone> InFlightCall<'a, T> {
    fn begin(tracker: &'a QueryTracker<T>) -> Self {
        let seq = tracker.next_seq.get() + 1;
        tracker.next_seq.set(seq);
        tracker.state.send_modify(QueryState::begin);
        debug!(
            "event=query_start module=query name={} seq={} status=pending",
            tracker.name, seq
        );
        Self {
            tracker,
            seq,
            settled: false,
        }
    }

    fn settle<R>(
        mut self,
        outcome: TransportResult<T>,
        apply: impl FnOnce(&T) -> R,
    ) -> Result<R, QueryError> {
        self.settled = true;
        let (tracker, seq) = (self.tracker, self.seq);
        match outcome {
            Ok(value) => {
                let applied = apply(&value);
                tracker.state.send_modify(|state| state.fulfill(seq, value));
                debug!(
                    "event=query_settle module=query name={} seq={} status=ok",
                    tracker.name, seq
                );
                Ok(applied)
            }
            Err(cause) => {
                let error = QueryError::new(tracker.name, cause);
                warn!(
                    "event=query_settle module=query name={} seq={} status=error error_code={}",
                    tracker.name,
                    seq,
                    error.cause.code()
                );
                tracker
                    .state
                    .send_modify(|state| state.reject(seq, error.clone()));
                Err(error)
            }
        }
    }
}

impl<T> Drop for InFlightCall<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.state.send_modify(QueryState::abandon);
            debug!(
                "event=query_abandon module=query name={} seq={}",
                self.tracker.name, self.seq
            );
        }
    }
}
