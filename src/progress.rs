//! Progress events and cooperative cancellation for streaming operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::error::{CryptError, CryptResult};

/// Emitted after each processed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes in the chunk just processed.
    pub chunk_len: usize,
    /// Cumulative bytes processed so far.
    pub processed: u64,
    /// Total bytes expected, when the input size is known up front.
    pub total: Option<u64>,
}

impl ProgressEvent {
    /// Completed fraction in `0.0..=1.0`, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.processed as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Receives progress events.
pub trait Progress {
    fn on_progress(&mut self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_progress(&mut self, _event: ProgressEvent) {}
}

/// Never blocks the worker: when the receiver lags behind, events are
/// dropped rather than queued.
impl Progress for Sender<ProgressEvent> {
    fn on_progress(&mut self, event: ProgressEvent) {
        match self.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(ev)) => trace!(processed = ev.processed, "progress event dropped"),
        }
    }
}

impl Progress for std::sync::mpsc::Sender<ProgressEvent> {
    fn on_progress(&mut self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

struct Callback<F>(F);

impl<F: FnMut(ProgressEvent)> Progress for Callback<F> {
    fn on_progress(&mut self, event: ProgressEvent) {
        (self.0)(event)
    }
}

#[derive(Debug, Default)]
struct CancelState {
    flag: AtomicBool,
    notify: Notify,
}

/// Shared flag checked between chunks; async work can also wait on it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<CancelState>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call from any thread, including signal handlers' threads.
    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // register before checking the flag so a concurrent cancel is not missed
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Progress sink plus cancellation flag for one operation.
pub struct Monitor {
    sink: Box<dyn Progress + Send>,
    cancel: CancelToken,
    processed: u64,
    total: Option<u64>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::silent()
    }
}

impl Monitor {
    pub fn new(sink: impl Progress + Send + 'static, cancel: CancelToken) -> Self {
        Self {
            sink: Box::new(sink),
            cancel,
            processed: 0,
            total: None,
        }
    }

    /// Reports nothing and is never cancelled.
    pub fn silent() -> Self {
        Self::new(NoProgress, CancelToken::new())
    }

    pub fn with_callback(callback: impl FnMut(ProgressEvent) + Send + 'static) -> Self {
        Self::new(Callback(callback), CancelToken::new())
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub(crate) fn start(&mut self, total: Option<u64>) {
        self.processed = 0;
        self.total = total;
    }

    pub(crate) fn advance(&mut self, chunk_len: usize) {
        self.processed += chunk_len as u64;
        self.sink.on_progress(ProgressEvent {
            chunk_len,
            processed: self.processed,
            total: self.total,
        });
    }

    pub(crate) fn checkpoint(&self) -> CryptResult<()> {
        if self.cancel.is_cancelled() {
            return Err(CryptError::Cancelled);
        }
        Ok(())
    }
}
