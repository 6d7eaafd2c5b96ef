//! Gate that keeps mutations from racing the initial load.
//!
//! # Invariants
//! - An effect starts immediately when the governing load is not pending.
//! - A deferred effect starts exactly once, after the first settlement of
//!   the load that was pending when it was queued (success or failure).
//! - The load writes its data before settling (see
//!   `QueryTracker::run_and_apply`), so deferred effects never see
//!   half-loaded collections and are never overwritten by that load.

use crate::query::state::QueryState;
use crate::query::tracker::QueryTracker;
use log::debug;
use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;
use tokio::sync::watch;

pub struct MutationGuard<T> {
    load: watch::Receiver<QueryState<T>>,
    deferred: Rc<Cell<usize>>,
}

impl<T: Clone> MutationGuard<T> {
    /// Guard governed by `load`.
    pub fn new(load: &QueryTracker<T>) -> Self {
        Self {
            load: load.subscribe(),
            deferred: Rc::new(Cell::new(0)),
        }
    }

    /// Effects currently waiting for the load to settle.
    pub fn deferred_count(&self) -> usize {
        self.deferred.get()
    }

    pub fn is_deferring(&self) -> bool {
        self.load.borrow().is_pending()
    }

    /// Runs `effect` once the governing load is no longer pending.
    pub async fn run_after_load<F, Fut>(&self, effect: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.wait_for_load().await;
        effect().await
    }

    /// Resolves when the governing load is not pending.
    pub async fn wait_for_load(&self) {
        let mut load = self.load.clone();
        let baseline = {
            let state = load.borrow_and_update();
            if !state.is_pending() {
                return;
            }
            state.settled_count()
        };

        let _slot = DeferredSlot::enter(&self.deferred);
        debug!(
            "event=mutation_deferred module=query deferred={}",
            self.deferred.get()
        );
        // Err means the tracker is gone, so there is nothing left to wait for.
        let _ = load
            .wait_for(|state| !state.is_pending() || state.settled_count() > baseline)
            .await;
        debug!("event=mutation_released module=query");
    }
}

/// Keeps `deferred_count` accurate even if a waiting future is dropped.
struct DeferredSlot {
    counter: Rc<Cell<usize>>,
}

impl DeferredSlot {
    fn enter(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        Self {
            counter: Rc::clone(counter),
        }
    }
}

impl Drop for DeferredSlot {
    fn drop(&mut self) {
        self.counter.set(self.counter.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::MutationGuard;
    use crate::client::TransportError;
    use crate::query::tracker::QueryTracker;
    use std::cell::RefCell;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn runs_immediately_when_load_is_idle() {
        let load: QueryTracker<u32> = QueryTracker::new("load");
        let guard = MutationGuard::new(&load);

        let ran = guard.run_after_load(|| async { "ran" }).await;
        assert_eq!(ran, "ran");
        assert_eq!(guard.deferred_count(), 0);
    }

    #[tokio::test]
    async fn defers_until_load_settles_then_runs_each_effect_once() {
        let load: QueryTracker<u32> = QueryTracker::new("load");
        let guard = MutationGuard::new(&load);
        let log = RefCell::new(Vec::new());
        let (release, gate) = oneshot::channel::<()>();

        let loading = load.run_and_apply(
            move || async move {
                let _ = gate.await;
                Ok(1)
            },
            |_| log.borrow_mut().push("load applied"),
        );
        let first = guard.run_after_load(|| async { log.borrow_mut().push("first") });
        let second = guard.run_after_load(|| async { log.borrow_mut().push("second") });
        let driver = async {
            tokio::task::yield_now().await;
            assert_eq!(guard.deferred_count(), 2);
            assert!(log.borrow().is_empty());
            release.send(()).unwrap();
        };

        let (loaded, (), (), ()) = tokio::join!(loading, first, second, driver);
        loaded.unwrap();

        let log = log.into_inner();
        assert_eq!(log[0], "load applied");
        assert_eq!(log.len(), 3);
        assert!(log.contains(&"first"));
        assert!(log.contains(&"second"));
        assert_eq!(guard.deferred_count(), 0);
    }

    #[tokio::test]
    async fn failed_load_still_releases_deferred_effects() {
        let load: QueryTracker<u32> = QueryTracker::new("load");
        let guard = MutationGuard::new(&load);
        let (release, gate) = oneshot::channel::<()>();

        let loading = load.run(move || async move {
            let _ = gate.await;
            Err(TransportError::Network("offline".to_string()))
        });
        let effect = guard.run_after_load(|| async { 7 });
        let driver = async {
            tokio::task::yield_now().await;
            assert!(guard.is_deferring());
            release.send(()).unwrap();
        };

        let (loaded, value, ()) = tokio::join!(loading, effect, driver);
        assert!(loaded.is_err());
        assert_eq!(value, 7);
    }
}
