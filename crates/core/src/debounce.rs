//! Timers that coalesce bursts of events into one action.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Runs only the most recently scheduled action, `delay` after it was scheduled.
///
/// Scheduling again before the delay elapses supersedes the pending action.
/// An action whose delay has already elapsed is never cancelled.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == ticket {
                action.await;
            }
        });
    }

    /// Drop whatever is pending.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Deadline that moves forward on every `touch`. Used where the action needs
/// `&mut` access to its owner and so cannot run on a spawned task.
#[derive(Debug, Clone)]
pub struct DeadlineGate {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DeadlineGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn touch(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once, when the deadline has passed. Clears the gate.
    pub fn take_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Wait for the pending deadline, then clear it. Returns false if nothing was pending.
    pub async fn wait(&mut self) -> bool {
        match self.deadline.take() {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                true
            }
            None => false,
        }
    }
}
