//! One-shot background loads.
//!
//! A worker thread computes a single value and hands it back over a
//! channel. Dropping the [`Pending`] handle abandons the load: the worker's
//! result is discarded when it arrives, which is how components ignore
//! responses that land after a refresh or after `destroy()`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use log::warn;

/// Handle to a value being produced on a worker thread
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<T>,
}

/// Result of polling a [`Pending`] load
#[derive(Debug, PartialEq)]
pub enum Poll<T> {
    Ready(T),
    NotReady,
    /// The worker died without producing a value
    Lost,
}

impl<T: Send + 'static> Pending<T> {
    pub fn spawn<F>(name: &str, job: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // The receiver may already be gone
                let _ = tx.send(job());
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn {name} worker: {e}");
        }
        Pending { rx }
    }
}

impl<T> Pending<T> {
    /// Non-blocking check for the result
    pub fn poll(&self) -> Poll<T> {
        match self.rx.try_recv() {
            Ok(value) => Poll::Ready(value),
            Err(TryRecvError::Empty) => Poll::NotReady,
            Err(TryRecvError::Disconnected) => Poll::Lost,
        }
    }

    /// Block up to `timeout` for the result
    pub fn wait(&self, timeout: Duration) -> Poll<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Poll::Ready(value),
            Err(RecvTimeoutError::Timeout) => Poll::NotReady,
            Err(RecvTimeoutError::Disconnected) => Poll::Lost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_delivered() {
        let pending = Pending::spawn("test", || 41 + 1);
        assert_eq!(pending.wait(Duration::from_secs(5)), Poll::Ready(42));
    }

    #[test]
    fn test_panicking_worker_is_lost() {
        let pending: Pending<i32> = Pending::spawn("test", || panic!("worker failed"));
        assert_eq!(pending.wait(Duration::from_secs(5)), Poll::Lost);
    }

    #[test]
    fn test_dropped_handle_discards_result() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let pending = Pending::spawn("test", move || {
            let _ = gate_rx.recv();
            1
        });
        drop(pending);
        // Worker finishes after the handle is gone without panicking
        gate_tx.send(()).unwrap();
    }
}
