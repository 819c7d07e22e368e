//! Restart the installation when a sensor goes silent.
//!
//! Sensors report continuously while powered, so a sensor that has not been
//! heard from for minutes has usually lost its network link. Restarting the
//! hub (or the host) is the recovery that works in practice.

use crate::restart::Restart;
use log::{error, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval};

/// Watchdog timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Silence after which a sensor counts as disconnected.
    pub timeout: Duration,
    /// How often the sensors are checked.
    pub poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3 * 60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Tracks when each known sensor was last heard from.
pub struct ConnectionWatchdog {
    config: WatchdogConfig,
    last_seen: Mutex<HashMap<i32, Instant>>,
}

impl ConnectionWatchdog {
    /// Every sensor starts out as "just seen".
    pub fn new(sensor_ids: impl IntoIterator<Item = i32>, config: WatchdogConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            last_seen: Mutex::new(sensor_ids.into_iter().map(|id| (id, now)).collect()),
        }
    }

    /// Record traffic from a sensor. Unknown ids are ignored.
    pub fn seen(&self, sensor_id: i32) {
        if let Some(last_seen) = self.last_seen.lock().get_mut(&sensor_id) {
            *last_seen = Instant::now();
        }
    }

    /// Sensors silent for longer than the timeout, sorted by id.
    pub fn missing(&self) -> Vec<i32> {
        let now = Instant::now();
        let mut missing: Vec<i32> = self
            .last_seen
            .lock()
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) > self.config.timeout)
            .map(|(id, _)| *id)
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Poll forever, invoking `restart` on every cycle that finds a silent sensor.
    pub async fn run(&self, restart: &dyn Restart) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a check only
        // happens after a full interval.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let missing = self.missing();
            if missing.is_empty() {
                continue;
            }

            warn!(
                "[Watchdog] Sensors silent for {:?}: {:?}",
                self.config.timeout, missing
            );
            if let Err(e) = restart.restart().await {
                error!("[Watchdog] Restart failed: {}", e);
            }
            // A slow restart must not leave overdue checks queued behind it.
            ticker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct CountingRestart {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Restart for CountingRestart {
        async fn restart(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlowRestart {
        calls: AtomicUsize,
        takes: Duration,
    }

    #[async_trait]
    impl Restart for SlowRestart {
        async fn restart(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.takes).await;
            Ok(())
        }
    }

    fn config() -> WatchdogConfig {
        WatchdogConfig {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reports_silent_sensors() {
        let watchdog = ConnectionWatchdog::new([3, 1, 2], config());

        sleep(Duration::from_secs(8)).await;
        watchdog.seen(2);
        watchdog.seen(99);
        assert!(watchdog.missing().is_empty());

        sleep(Duration::from_secs(3)).await;
        assert_eq!(watchdog.missing(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_once_per_cycle_while_silent() {
        let watchdog = Arc::new(ConnectionWatchdog::new([1], config()));
        let restart = Arc::new(CountingRestart::default());

        let task = {
            let watchdog = watchdog.clone();
            let restart = restart.clone();
            tokio::spawn(async move { watchdog.run(restart.as_ref()).await })
        };

        sleep(Duration::from_millis(9500)).await;
        assert_eq!(restart.calls.load(Ordering::SeqCst), 0);

        // Checks at 11s, 12s and 13s each find the sensor missing.
        sleep(Duration::from_millis(4000)).await;
        assert_eq!(restart.calls.load(Ordering::SeqCst), 3);

        watchdog.seen(1);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(restart.calls.load(Ordering::SeqCst), 3);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_restart_waits_a_full_interval_before_next_check() {
        let watchdog = Arc::new(ConnectionWatchdog::new([1], config()));
        let restart = Arc::new(SlowRestart {
            calls: AtomicUsize::new(0),
            takes: Duration::from_secs(5),
        });

        let task = {
            let watchdog = watchdog.clone();
            let restart = restart.clone();
            tokio::spawn(async move { watchdog.run(restart.as_ref()).await })
        };

        // First restart at 11s returns at 16s; the next check is at 17s, not
        // straight away at 16s.
        sleep(Duration::from_millis(16_500)).await;
        assert_eq!(restart.calls.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(restart.calls.load(Ordering::SeqCst), 2);

        task.abort();
    }
}
