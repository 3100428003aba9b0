//! Correlation of outbound commands with the inbound update stream.
//!
//! Devices never answer commands directly; evidence that a command took
//! effect arrives, eventually, inside the regular update stream. A
//! [`Correlator`] keeps a table of pending waits, scans every inbound
//! envelope against them, and resolves each wait exactly once: with the
//! matched records, or not at all (the caller's timeout decides).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::{check_conflicts, PinFilter};
use crate::types::{PinUpdate, RawUpdate};

/// How a wait treats matches spread over several envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Every remaining filter must be satisfied within one envelope.
    /// Partial clearance by an envelope is discarded, not accumulated.
    #[default]
    Strict,
    /// Matches are kept across envelopes; satisfied filters leave the
    /// remaining set until it empties.
    Accumulate,
}

struct Waiter {
    device_id: String,
    remaining: Vec<PinFilter>,
    matched: Vec<PinUpdate>,
    policy: WaitPolicy,
    tx: Option<oneshot::Sender<Vec<PinUpdate>>>,
}

impl Waiter {
    /// Scan one envelope's pin records. Returns the result to resolve with,
    /// if this envelope completed the wait.
    fn observe(&mut self, pins: &[PinUpdate]) -> Option<Vec<PinUpdate>> {
        match self.policy {
            WaitPolicy::Strict => {
                let mut hits = Vec::new();
                let mut satisfied = vec![false; self.remaining.len()];
                for (i, filter) in self.remaining.iter().enumerate() {
                    for pin in pins {
                        if filter.matches(pin) {
                            hits.push(pin.clone());
                            satisfied[i] = true;
                        }
                    }
                }
                satisfied.iter().all(|&s| s).then_some(hits)
            }
            WaitPolicy::Accumulate => {
                let mut still_unmet = Vec::new();
                for filter in self.remaining.drain(..) {
                    let mut hit = false;
                    for pin in pins {
                        if filter.matches(pin) {
                            self.matched.push(pin.clone());
                            hit = true;
                        }
                    }
                    if !hit {
                        still_unmet.push(filter);
                    }
                }
                self.remaining = still_unmet;
                self.remaining
                    .is_empty()
                    .then(|| std::mem::take(&mut self.matched))
            }
        }
    }
}

/// Table of pending waits over the inbound update stream.
///
/// Waits are independent finite-state instances; any number may be active
/// concurrently, across any mix of devices. All table accesses are short and
/// non-async, so a plain mutex suffices. Cloning shares the table.
#[derive(Clone, Default)]
pub struct Correlator {
    inner: Arc<CorrelatorInner>,
}

#[derive(Default)]
struct CorrelatorInner {
    waiters: Mutex<HashMap<u64, Waiter>>,
    next_id: AtomicU64,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for updates of `device_id` satisfying `filters`.
    ///
    /// The filter set is conflict-checked first; an ambiguous set never
    /// enters the table. An empty set is vacuously satisfied and resolves
    /// immediately with no records.
    pub fn register(
        &self,
        device_id: &str,
        filters: Vec<PinFilter>,
        policy: WaitPolicy,
    ) -> Result<WaitHandle> {
        check_conflicts(&filters)?;

        let (tx, rx) = oneshot::channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        if filters.is_empty() {
            let _ = tx.send(Vec::new());
        } else {
            let waiter = Waiter {
                device_id: device_id.to_owned(),
                remaining: filters,
                matched: Vec::new(),
                policy,
                tx: Some(tx),
            };
            self.inner
                .waiters
                .lock()
                .expect("waiter table poisoned")
                .insert(id, waiter);
        }

        Ok(WaitHandle {
            id,
            rx,
            correlator: self.clone(),
        })
    }

    /// Feed one inbound envelope to every wait scoped to its device.
    ///
    /// Runs synchronously within the dispatch path, so a whole envelope is
    /// evaluated atomically with respect to every other envelope.
    pub fn process(&self, device_id: &str, update: &RawUpdate) {
        let Some(pins) = update.pins.as_deref() else {
            return;
        };

        let mut table = self.inner.waiters.lock().expect("waiter table poisoned");
        let mut resolved = Vec::new();

        for (&id, waiter) in table.iter_mut() {
            if waiter.device_id != device_id {
                continue;
            }
            if let Some(result) = waiter.observe(pins) {
                if let Some(tx) = waiter.tx.take() {
                    // The receiver may already be gone (caller timed out
                    // between delivery and this scan); either way the wait
                    // is finished.
                    let _ = tx.send(result);
                }
                resolved.push(id);
            }
        }

        for id in resolved {
            table.remove(&id);
            debug!("wait {} resolved", id);
        }
    }

    /// Remove a wait from the table. Safe to call after resolution; double
    /// removal is a no-op.
    fn deregister(&self, id: u64) {
        self.inner
            .waiters
            .lock()
            .expect("waiter table poisoned")
            .remove(&id);
    }

    /// Number of registered, unresolved waits.
    pub fn waiter_count(&self) -> usize {
        self.inner
            .waiters
            .lock()
            .expect("waiter table poisoned")
            .len()
    }
}

/// Handle to one pending wait.
///
/// Dropping the handle deregisters the wait; every outcome (resolution,
/// timeout, caller cancellation) removes the table entry exactly once.
pub struct WaitHandle {
    id: u64,
    rx: oneshot::Receiver<Vec<PinUpdate>>,
    correlator: Correlator,
}

impl WaitHandle {
    /// Await the matched records, up to `timeout` if one is given.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<Vec<PinUpdate>> {
        let rx = &mut self.rx;
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                // `self` drops on return and deregisters the waiter.
                Err(_) => return Err(Error::Timeout(limit)),
            },
            None => rx.await,
        };
        outcome.map_err(|_| Error::Cancelled)
    }
}

impl Drop for WaitHandle {
    fn drop(&mut self) {
        self.correlator.deregister(self.id);
    }
}
