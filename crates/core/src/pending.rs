// One-shot completion signal for asynchronous loads

use crate::error::{AudioError, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Create a connected completer/pending pair
pub fn pending<T>() -> (Completer<T>, Pending<T>) {
    let (tx, rx) = mpsc::channel();
    (Completer { tx }, Pending { rx })
}

/// Producer side of a one-shot completion
pub struct Completer<T> {
    tx: Sender<Result<T>>,
}

impl<T> Completer<T> {
    /// Resolve the pending side. A dropped `Pending` is not an error.
    pub fn complete(self, result: Result<T>) {
        let _ = self.tx.send(result);
    }
}

/// Consumer side of a one-shot completion
///
/// The result can be taken once. Polling again after it was taken, or after
/// the completer was dropped unresolved, yields `AudioError::Cancelled`.
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// A pending that is already resolved
    pub fn ready(result: Result<T>) -> Self {
        let (completer, pending) = pending();
        completer.complete(result);
        pending
    }

    /// Block until the operation completes
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or(Err(AudioError::Cancelled))
    }

    /// Block for at most `timeout`; `None` means still in flight
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(AudioError::Cancelled)),
        }
    }

    /// Non-blocking poll
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AudioError::Cancelled)),
        }
    }
}
