// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::backoff::{Backoff, Config};

type Run = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs a fallible background operation until it succeeds, with at most one run in flight.
///
/// Calling [`SingleFlight::start`] while a run is still in progress does nothing, the ongoing
/// run will eventually succeed and bring everything up-to-date. Failed attempts are logged and
/// retried forever with exponential backoff until the run succeeds or gets aborted by its owner.
#[derive(Clone)]
pub struct SingleFlight {
    name: &'static str,
    in_flight: Arc<AtomicBool>,
    current: Arc<Mutex<Option<AbortHandle>>>,
    handle: Handle,
    run: Run,
}

impl SingleFlight {
    /// Create a new primitive for the given action.
    ///
    /// Runs are spawned on the runtime of the given `handle`. The `name` is only used for
    /// logging.
    pub fn new<F, Fut, E>(name: &'static str, handle: Handle, config: Config, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let action = Arc::new(action);

        let run: Run = Arc::new(move || {
            let action = action.clone();
            let config = config.clone();
            async move { retry(name, config, action.as_ref()).await }.boxed()
        });

        Self {
            name,
            in_flight: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
            handle,
            run,
        }
    }

    /// Launch a run unless one is already in flight.
    ///
    /// Returns `true` if a new run was launched.
    pub fn start(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(name = self.name, "run already in flight");
            return false;
        }

        // Clears the flag when the task ends, no matter if it completed, panicked or got aborted.
        let guard = InFlightGuard(self.in_flight.clone());
        let run = (self.run)();

        let mut current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let task = self.handle.spawn(async move {
            let _guard = guard;
            run.await;
        });
        *current = Some(task.abort_handle());

        true
    }

    /// Cancel the run in flight, if any.
    ///
    /// Owners call this when they shut down, otherwise a run keeps retrying against an
    /// unreachable upstream forever. Later calls to [`SingleFlight::start`] launch new runs.
    pub fn abort(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = current {
            if !task.is_finished() {
                debug!(name = self.name, "abort run in flight");
            }
            task.abort();
        }
    }

    /// Returns `true` while a run is in progress.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Debug for SingleFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("name", &self.name)
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn retry<F, Fut, E>(name: &'static str, config: Config, action: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut backoff = Backoff::new(config, ChaCha20Rng::from_seed(rand::random()));

    loop {
        match action().await {
            Ok(()) => {
                debug!(name, attempts = backoff.attempt() + 1, "run completed");
                return;
            }
            Err(err) => {
                let delay = backoff.next_delay();
                warn!(
                    name,
                    attempt = backoff.attempt(),
                    retry_in = ?delay,
                    "run failed: {}",
                    err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
