//! Edge-triggered notifications.
//!
//! An [`EdgeSignal`] fires "occurrences". A listener only completes for an
//! occurrence that happens *after* it was created, so a waiter that registers
//! late never mistakes an old firing for a new one.
//!
//! Internally this is a generation counter carried over a `tokio::sync::watch`
//! channel: every `notify()` bumps the generation and each listener remembers
//! the generation it was created at.

use futures_util::future::select_all;
use tokio::sync::watch;

/// Source side of an edge notification.
#[derive(Debug)]
pub struct EdgeSignal {
    generation: watch::Sender<u64>,
}

impl EdgeSignal {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    /// Fire one occurrence, waking every current listener.
    pub fn notify(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    /// Create a listener for the next occurrence.
    pub fn listen(&self) -> EdgeListener {
        EdgeListener {
            generation: self.generation.subscribe(),
        }
    }

    /// Number of occurrences fired so far.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }
}

impl Default for EdgeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for the next occurrence of an [`EdgeSignal`].
#[derive(Debug)]
pub struct EdgeListener {
    generation: watch::Receiver<u64>,
}

impl EdgeListener {
    /// Complete once the signal fires after this listener's last observation.
    ///
    /// Calling `wait` again waits for the occurrence after that. The sender
    /// lives as long as its owner, so a closed channel can only mean the owner
    /// is gone; in that case this never completes.
    pub async fn wait(&mut self) {
        if self.generation.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Whether an occurrence fired since this listener last observed one.
    pub fn has_fired(&self) -> bool {
        self.generation.has_changed().unwrap_or(false)
    }
}

/// Complete as soon as any of `listeners` sees an occurrence.
///
/// Never completes for an empty slice.
pub async fn wait_any(listeners: &mut [EdgeListener]) {
    if listeners.is_empty() {
        return std::future::pending().await;
    }
    select_all(listeners.iter_mut().map(|listener| Box::pin(listener.wait()))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_listener_ignores_earlier_firings() {
        let signal = EdgeSignal::new();
        signal.notify();

        let mut listener = signal.listen();
        assert!(!listener.has_fired());

        let mut wait = task::spawn(listener.wait());
        assert_pending!(wait.poll());
    }

    #[test]
    fn test_listener_wakes_on_next_firing() {
        let signal = EdgeSignal::new();
        let mut listener = signal.listen();

        {
            let mut wait = task::spawn(listener.wait());
            assert_pending!(wait.poll());

            signal.notify();
            assert!(wait.is_woken());
            assert_ready!(wait.poll());
        }

        // The firing was consumed; the next wait needs a new occurrence.
        assert!(!listener.has_fired());
        let mut wait = task::spawn(listener.wait());
        assert_pending!(wait.poll());
    }

    #[test]
    fn test_every_listener_sees_the_occurrence() {
        let signal = EdgeSignal::new();
        let first = signal.listen();
        let second = signal.listen();

        signal.notify();

        assert!(first.has_fired());
        assert!(second.has_fired());
        assert_eq!(signal.generation(), 1);
    }

    #[test]
    fn test_wait_any_wakes_on_either_signal() {
        let a = EdgeSignal::new();
        let b = EdgeSignal::new();
        let mut listeners = [a.listen(), b.listen()];

        let mut wait = task::spawn(wait_any(&mut listeners));
        assert_pending!(wait.poll());

        b.notify();
        assert_ready!(wait.poll());
    }
}
