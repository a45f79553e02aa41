//! Interval trigger for the change detector.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs a callback every `interval`, at most one timer at a time.
///
/// The first callback fires one full interval after `start`, not
/// immediately. An interval of `None` means the timer never runs.
pub struct RefreshTimer {
    interval: Option<Duration>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval: interval.filter(|d| !d.is_zero()),
            handle: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the timer. Returns `false` when disabled or already running.
    pub fn start<F, Fut>(&mut self, mut on_tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(period) = self.interval else {
            tracing::info!("auto refresh disabled");
            return false;
        };
        if self.is_running() {
            return false;
        }
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await; // consume the first immediate tick
            loop {
                interval.tick().await;
                on_tick().await;
            }
        }));
        tracing::info!(interval_secs = period.as_secs(), "auto refresh started");
        true
    }

    /// Cancel the timer. Safe to call without `start`, or more than once.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::debug!("auto refresh stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
