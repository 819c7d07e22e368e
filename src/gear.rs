//! Charge state of one physical gear.
//!
//! Turning a gear charges it; leaving it alone lets it discharge again. A
//! fully charged gear waits much longer before it starts to discharge, so a
//! charge that was earned stays lit for a while.

use crate::counter::SaturatingCounter;
use crate::edge::{EdgeListener, EdgeSignal};
use log::{debug, trace};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Highest charge a gear can hold.
pub const MAX_CHARGE: i32 = 255;

/// Timings of the autonomous discharge behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DischargeTiming {
    /// Idle time before a partially charged gear starts to discharge.
    pub idle_timeout: Duration,
    /// Idle time before a fully charged gear starts to discharge.
    pub charged_idle_timeout: Duration,
    /// Interval between discharge steps.
    pub tick: Duration,
}

impl Default for DischargeTiming {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(1),
            charged_idle_timeout: Duration::from_secs(30),
            tick: Duration::from_millis(100),
        }
    }
}

/// One sensor's accumulated charge.
#[derive(Debug)]
pub struct Gear {
    id: i32,
    sensitivity: i32,
    counter: Mutex<SaturatingCounter>,
    touched: EdgeSignal,
    charged: EdgeSignal,
}

impl Gear {
    pub fn new(id: i32, sensitivity: i32) -> Self {
        Self::with_max(id, sensitivity, MAX_CHARGE)
    }

    pub fn with_max(id: i32, sensitivity: i32, max: i32) -> Self {
        Self {
            id,
            sensitivity,
            counter: Mutex::new(SaturatingCounter::new(0, 0, max)),
            touched: EdgeSignal::new(),
            charged: EdgeSignal::new(),
        }
    }

    /// Sensor id this gear is attached to.
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn sensitivity(&self) -> i32 {
        self.sensitivity
    }

    /// Current charge.
    pub fn value(&self) -> i32 {
        self.counter.lock().value()
    }

    /// Current charge as an 8-bit level for the light effects.
    pub fn level(&self) -> u8 {
        let counter = self.counter.lock();
        let span = (counter.max() - counter.min()).max(1) as i64;
        let level = (counter.value() - counter.min()) as i64 * 255 / span;
        level.clamp(0, 255) as u8
    }

    pub fn is_discharged(&self) -> bool {
        self.counter.lock().is_min()
    }

    pub fn is_charged(&self) -> bool {
        self.counter.lock().is_max()
    }

    /// Apply a turn reported by the sensor. Direction does not matter.
    pub fn turned(&self, delta: i32) {
        let amount = delta.unsigned_abs().saturating_mul(self.sensitivity.unsigned_abs());
        if amount == 0 {
            return;
        }

        let charged = {
            let mut counter = self.counter.lock();
            counter.add(i32::try_from(amount).unwrap_or(i32::MAX));
            counter.is_max()
        };
        trace!("[Gear {}] turned by {}, charge {}", self.id, delta, self.value());

        self.touched.notify();
        if charged {
            debug!("[Gear {}] fully charged", self.id);
            self.charged.notify();
        }
    }

    /// Drop all charge.
    pub fn reset(&self) {
        self.counter.lock().set(0);
    }

    /// Listener for the next touch of this gear.
    pub fn touched(&self) -> EdgeListener {
        self.touched.listen()
    }

    /// Listener for the next time this gear reaches full charge.
    pub fn charged(&self) -> EdgeListener {
        self.charged.listen()
    }

    /// Run the discharge behaviour forever.
    ///
    /// Cancel by dropping the future.
    pub async fn discharge(&self, timing: DischargeTiming) {
        loop {
            self.wait_start_discharging(&timing).await;
            self.discharge_until_touched(&timing).await;
        }
    }

    /// Return once the gear holds charge and has been left alone long enough.
    async fn wait_start_discharging(&self, timing: &DischargeTiming) {
        loop {
            let mut touched = self.touched();
            if self.is_discharged() {
                touched.wait().await;
                continue;
            }

            let idle = if self.is_charged() {
                timing.charged_idle_timeout
            } else {
                timing.idle_timeout
            };
            if timeout(idle, touched.wait()).await.is_err() {
                return;
            }
        }
    }

    async fn discharge_until_touched(&self, timing: &DischargeTiming) {
        debug!("[Gear {}] discharging from {}", self.id, self.value());
        let touched = self.touched();
        let step = i32::try_from(self.sensitivity.unsigned_abs().max(1)).unwrap_or(i32::MAX);
        while !(self.is_discharged() || touched.has_fired()) {
            self.counter.lock().sub(step);
            sleep(timing.tick).await;
        }
        debug!("[Gear {}] stopped discharging at {}", self.id, self.value());
    }
}
