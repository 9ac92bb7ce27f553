//! Single-Flight Token Fetch
//!
//! Coalesces concurrent fetches for one credential store into a single
//! request whose outcome every waiter shares.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{CarrierError, TransportError};
use crate::types::Credential;

/// Outcome of one token fetch, clonable to every waiter.
pub type FetchResult = Result<Arc<Credential>, CarrierError>;

/// Handle on an in-flight fetch.
pub type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// At most one fetch in flight per store.
///
/// The fetch runs on its own task, so a waiter that gives up does not cancel
/// it for the others; a credential it obtains is still installed.
#[derive(Default)]
pub struct SingleFlight {
    slot: Mutex<Option<(u64, SharedFetch)>>,
    generation: AtomicU64,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the fetch in progress, or start `fetch` if there is none.
    pub fn run<F>(self: &Arc<Self>, fetch: F) -> SharedFetch
    where
        F: Future<Output = FetchResult> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some((_, in_flight)) = slot.as_ref() {
            tracing::trace!("joining in-flight token fetch");
            return in_flight.clone();
        }

        let id = self.generation.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);
        // The slot is filled before this lock is released, so `finish` below
        // can never run ahead of it.
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            this.finish(id);
            result
        });

        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(CarrierError::Transport(TransportError::Other {
                    message: format!("token fetch task failed: {}", e),
                })),
            }
        }
        .boxed()
        .shared();

        *slot = Some((id, shared.clone()));
        shared
    }

    /// Whether a fetch is currently running.
    pub fn in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn finish(&self, id: u64) {
        let mut slot = self.slot.lock();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
    }
}
