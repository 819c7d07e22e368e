//! Periodic per-sensor traffic counts, for checking sensors during setup.

use log::info;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::interval;

#[derive(Debug)]
pub struct SensorDiagnostics {
    seen: Mutex<BTreeMap<i32, u64>>,
}

impl SensorDiagnostics {
    /// Count reports for the given sensors only.
    pub fn new(sensor_ids: impl IntoIterator<Item = i32>) -> Self {
        Self {
            seen: Mutex::new(sensor_ids.into_iter().map(|id| (id, 0)).collect()),
        }
    }

    /// Count one report from `sensor_id`. Unknown ids are ignored.
    pub fn seen(&self, sensor_id: i32) {
        if let Some(count) = self.seen.lock().get_mut(&sensor_id) {
            *count += 1;
        }
    }

    /// Counts since the last report, by sensor id, e.g. `1: 40, 7: 0`.
    /// Silent sensors are listed with a zero count.
    pub fn take_report(&self) -> String {
        let mut seen = self.seen.lock();
        let report = seen
            .iter()
            .map(|(id, count)| format!("{id}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        seen.values_mut().for_each(|count| *count = 0);
        report
    }

    /// Log the report every `period`, forever.
    pub async fn run(&self, period: Duration) {
        let mut ticker = interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            info!("[Sensor] Seen sensors: {}", self.take_report());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_is_sorted_and_cleared() {
        let diagnostics = SensorDiagnostics::new([7, 1, 3]);
        diagnostics.seen(7);
        diagnostics.seen(1);
        diagnostics.seen(7);

        assert_eq!(diagnostics.take_report(), "1: 1, 3: 0, 7: 2");
        assert_eq!(diagnostics.take_report(), "1: 0, 3: 0, 7: 0");
    }

    #[test]
    fn test_unknown_sensors_are_not_tracked() {
        let diagnostics = SensorDiagnostics::new([1]);
        for id in 100..1100 {
            diagnostics.seen(id);
        }
        diagnostics.seen(1);

        assert_eq!(diagnostics.take_report(), "1: 1");
    }
}
