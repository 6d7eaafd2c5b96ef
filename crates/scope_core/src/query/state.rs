//! Lifecycle value of one tracked remote operation.
//!
//! # Invariants
//! - `Fulfilled` implies a value and no error.
//! - `Rejected` implies an error.
//! - `Idle`/`Pending` keep whatever value/error the last settled call left,
//!   so views can keep showing stale data while a refresh runs.

use crate::client::TransportError;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Idle,
    Pending,
    Fulfilled,
    Rejected,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

/// Failure of a tracked operation: which operation, and the transport cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub operation: &'static str,
    pub cause: TransportError,
}

impl QueryError {
    pub fn new(operation: &'static str, cause: TransportError) -> Self {
        Self { operation, cause }
    }

    /// Human-readable message for display next to the failed form.
    pub fn message(&self) -> String {
        self.cause.to_string()
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.cause)
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

/// Flags the view layer renders for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySnapshot {
    pub pending: bool,
    pub fulfilled: bool,
    pub rejected: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    status: QueryStatus,
    value: Option<T>,
    error: Option<QueryError>,
    /// Sequence number of the call that produced the current terminal state.
    seq: u64,
    settled: u64,
    in_flight: usize,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle(None)
    }
}

impl<T> QueryState<T> {
    /// Idle state, optionally seeded with a value the view can show before
    /// the first call.
    pub fn idle(seed: Option<T>) -> Self {
        Self {
            status: QueryStatus::Idle,
            value: seed,
            error: None,
            seq: 0,
            settled: 0,
            in_flight: 0,
        }
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(QueryError::message)
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Number of calls that reached a terminal status.
    pub fn settled_count(&self) -> u64 {
        self.settled
    }

    /// Calls started and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == QueryStatus::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.status == QueryStatus::Rejected
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            pending: self.is_pending(),
            fulfilled: self.is_fulfilled(),
            rejected: self.is_rejected(),
            error_message: if self.is_rejected() {
                self.error_message()
            } else {
                None
            },
        }
    }

    pub(crate) fn begin(&mut self) {
        self.status = QueryStatus::Pending;
        self.in_flight += 1;
    }

    pub(crate) fn fulfill(&mut self, seq: u64, value: T) {
        self.status = QueryStatus::Fulfilled;
        self.value = Some(value);
        self.error = None;
        self.settle(seq);
    }

    pub(crate) fn reject(&mut self, seq: u64, error: QueryError) {
        self.status = QueryStatus::Rejected;
        self.error = Some(error);
        self.settle(seq);
    }

    /// A started call went away without settling. Once nothing else is in
    /// flight the status returns to the last terminal one.
    pub(crate) fn abandon(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 && self.is_pending() {
            self.status = if self.error.is_some() {
                QueryStatus::Rejected
            } else if self.settled > 0 {
                QueryStatus::Fulfilled
            } else {
                QueryStatus::Idle
            };
        }
    }

    fn settle(&mut self, seq: u64) {
        self.seq = seq;
        self.settled += 1;
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}
