//! Single-slot cancellable timer for non-authoritative persistence.
//!
//! Each [`Debouncer::schedule`] call replaces the pending value and restarts
//! the idle window. When the window elapses the latest value is handed to the
//! sink, unless a previous sink call is still running, in which case the value
//! is dropped.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{debug, trace, warn};
use tokio::{task::JoinHandle, time::sleep};

use crate::Result;

type PersistFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type PersistFn<T> = Arc<dyn Fn(T) -> PersistFuture + Send + Sync>;

pub struct Debouncer<T> {
    interval: Duration,
    pending: Option<JoinHandle<()>>,
    in_flight: Arc<AtomicBool>,
    sink: PersistFn<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Creates a debouncer that persists values through `sink` after `interval` of quiet.
    ///
    /// Must be used from within a tokio runtime.
    pub fn new<F, Fut>(interval: Duration, sink: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            interval,
            pending: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            sink: Arc::new(move |value| -> PersistFuture { Box::pin(sink(value)) }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replaces any pending value with `value` and restarts the idle window
    pub fn schedule(&mut self, value: T) {
        if self.cancel() {
            trace!("Debounce window restarted");
        }

        let interval = self.interval;
        let in_flight = Arc::clone(&self.in_flight);
        let sink = Arc::clone(&self.sink);

        self.pending = Some(tokio::spawn(async move {
            sleep(interval).await;

            if in_flight.swap(true, Ordering::SeqCst) {
                debug!("Persistence already in flight, dropping update");
                return;
            }

            // runs detached so cancelling the timer never interrupts a write
            tokio::spawn(async move {
                if let Err(e) = sink(value).await {
                    warn!("Debounced persistence failed: {}", e);
                }
                in_flight.store(false, Ordering::SeqCst);
            });
        }));
    }

    /// Cancels the pending timer, returning whether one was pending
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
