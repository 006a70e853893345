//! Sliding-window admission with FIFO waiters.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::time::{Instant, sleep_until};

/// Dispatch timestamps of the last `window`.
///
/// A dispatch at `t` occupies quota over `[t, t + window)`.
#[derive(Debug, Clone)]
pub(crate) struct SlidingWindow {
    limit: usize,
    window: Duration,
    dispatched: VecDeque<Instant>,
}

impl SlidingWindow {
    pub(crate) fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            dispatched: VecDeque::with_capacity(limit),
        }
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.dispatched.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.dispatched.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records a dispatch at `now` if quota remains, otherwise returns the
    /// instant at which the oldest dispatch leaves the window.
    ///
    /// `Err(None)` means that instant is past what `Instant` can represent,
    /// so quota never frees up.
    pub(crate) fn try_acquire(&mut self, now: Instant) -> Result<(), Option<Instant>> {
        self.expire(now);
        if self.dispatched.len() < self.limit {
            self.dispatched.push_back(now);
            Ok(())
        } else {
            // `limit > 0`, so a full window has a front.
            Err(self
                .dispatched
                .front()
                .map_or(Some(now), |&oldest| oldest.checked_add(self.window)))
        }
    }

    pub(crate) fn in_window(&mut self, now: Instant) -> usize {
        self.expire(now);
        self.dispatched.len()
    }
}

/// Admits callers one at a time, in arrival order, against a [`SlidingWindow`].
///
/// The head of the queue holds `queue` while it sleeps for quota, so later
/// callers cannot overtake it. `window` is only locked to read or update
/// timestamps. Dropping an [`Admission::acquire`] future before it resolves
/// leaves the window untouched.
#[derive(Debug)]
pub(crate) struct Admission {
    queue: tokio::sync::Mutex<()>,
    window: Mutex<SlidingWindow>,
}

impl Admission {
    pub(crate) fn new(limit: usize, window: Duration) -> Self {
        Self {
            queue: tokio::sync::Mutex::new(()),
            window: Mutex::new(SlidingWindow::new(limit, window)),
        }
    }

    /// Waits for quota and consumes one unit of it, returning the admission instant.
    pub(crate) async fn acquire(&self) -> Instant {
        let _turn = self.queue.lock().await;
        loop {
            let now = Instant::now();
            let attempt = self
                .window
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_acquire(now);
            match attempt {
                Ok(()) => return now,
                Err(Some(retry_at)) => {
                    trace!(wait_ms = retry_at.saturating_duration_since(now).as_millis(), "Waiting for quota");
                    sleep_until(retry_at).await;
                }
                Err(None) => {
                    trace!("Window outlasts the clock; waiting until dropped");
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    pub(crate) fn in_window(&self) -> usize {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_window(Instant::now())
    }
}
