//! The realtime send loop: compute a frame, send it, repeat at a fixed cadence.

use crate::effect::EffectPipeline;
use crate::error::HubError;
use crate::gear::Gear;
use crate::wled::RealtimeSink;
use log::{error, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

/// Time between frames.
pub const FRAME_PERIOD: Duration = Duration::from_millis(20);

/// Stream frames until cancelled.
///
/// Frames are started every `period` no matter how long computing and
/// sending took. Send failures drop that frame; an encoding error means the
/// strip cannot be represented on the wire at all and ends the loop.
pub async fn stream_frames(
    gears: &[Arc<Gear>],
    pipeline: &Mutex<EffectPipeline>,
    sink: &mut dyn RealtimeSink,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let now = ticker.tick().await;
        let levels: Vec<u8> = gears.iter().map(|gear| gear.level()).collect();
        let colours = pipeline.lock().calculate_at(&levels, now);

        match sink.send_frame(&colours).await {
            Ok(()) => {}
            Err(HubError::Dnrgb(e)) => {
                error!("[WLED] Cannot encode frame, stopping stream: {}", e);
                return;
            }
            Err(e) => warn!("[WLED] Dropped frame: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Colour, Effect, Striped};
    use crate::error::Result;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<Vec<Colour>>>>,
    }

    #[async_trait]
    impl RealtimeSink for RecordingSink {
        async fn send_frame(&mut self, colours: &[Colour]) -> Result<()> {
            self.frames.lock().push(colours.to_vec());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_follow_gear_levels_at_fixed_rate() {
        let gear = Arc::new(Gear::new(1, 255));
        let gears = vec![gear.clone()];
        let pipeline = Mutex::new(EffectPipeline::new(
            Effect::Striped(Striped::new(&[Colour::new(0, 255, 0)])),
            3,
        ));
        let mut sink = RecordingSink::default();
        let frames = sink.frames.clone();

        let streaming = stream_frames(&gears, &pipeline, &mut sink, FRAME_PERIOD);
        let _ = tokio::time::timeout(Duration::from_millis(1010), async {
            tokio::join!(streaming, async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                gear.turned(1);
            });
        })
        .await;

        let frames = frames.lock();
        assert!((50..=52).contains(&frames.len()), "{} frames", frames.len());
        assert_eq!(frames[0], vec![Colour::BLACK; 3]);
        assert_eq!(frames.last().unwrap(), &vec![Colour::new(0, 255, 0); 3]);
    }
}
