//! Sound collaborator and the charging soundscape.
//!
//! While the installation charges, every gear drives the volume of its own
//! looping track. One-shot cues mark a gear reaching full charge and the
//! whole installation completing.

use crate::gear::Gear;
use log::{debug, info, warn};
use rand::seq::index::sample;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Fade applied to loop tracks when the soundscape stops.
pub const LOOP_FADE_OUT: Duration = Duration::from_millis(500);

/// How often loop volumes follow the gears.
pub const VOLUME_PERIOD: Duration = Duration::from_millis(100);

/// One-shot sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// A gear reached full charge.
    Ding,
    /// Every gear reached full charge.
    Finale,
}

/// Audio playback, implemented by whatever mixer the host provides.
///
/// Calls return immediately; playback continues in the background.
pub trait Audio: Send + Sync {
    /// Number of loop tracks available.
    fn loop_tracks(&self) -> usize;
    fn play_loop(&self, track: usize, volume: f32);
    fn set_volume(&self, track: usize, volume: f32);
    fn stop(&self, track: usize, fade: Duration);
    fn play_once(&self, cue: Cue);
}

/// Audio backend for hosts without sound output. Logs what would be played.
#[derive(Debug, Clone)]
pub struct LoggingAudio {
    tracks: usize,
}

impl LoggingAudio {
    pub fn new(tracks: usize) -> Self {
        Self { tracks }
    }
}

impl Audio for LoggingAudio {
    fn loop_tracks(&self) -> usize {
        self.tracks
    }

    fn play_loop(&self, track: usize, volume: f32) {
        debug!("[Audio] Loop {} at {:.2}", track, volume);
    }

    fn set_volume(&self, track: usize, volume: f32) {
        log::trace!("[Audio] Loop {} volume {:.2}", track, volume);
    }

    fn stop(&self, track: usize, fade: Duration) {
        debug!("[Audio] Stop loop {} over {:?}", track, fade);
    }

    fn play_once(&self, cue: Cue) {
        info!("[Audio] {:?}", cue);
    }
}

/// Fades the given tracks out when dropped, so cancelling the soundscape
/// always silences it.
struct FadeOutOnDrop {
    audio: Arc<dyn Audio>,
    tracks: Vec<usize>,
}

impl Drop for FadeOutOnDrop {
    fn drop(&mut self) {
        for &track in &self.tracks {
            self.audio.stop(track, LOOP_FADE_OUT);
        }
    }
}

/// Play one random loop per gear, its volume following the gear's charge.
/// Runs until cancelled.
pub async fn play_gear_loops(gears: &[Arc<Gear>], audio: Arc<dyn Audio>) {
    let available = audio.loop_tracks();
    if available < gears.len() {
        warn!(
            "[Audio] {} loop tracks for {} gears, soundscape disabled",
            available,
            gears.len()
        );
        return;
    }

    let tracks = sample(&mut rand::thread_rng(), available, gears.len()).into_vec();
    let _fade_out = FadeOutOnDrop {
        audio: audio.clone(),
        tracks: tracks.clone(),
    };

    for (gear, &track) in gears.iter().zip(&tracks) {
        audio.play_loop(track, volume(gear));
    }

    let mut ticker = interval(VOLUME_PERIOD);
    loop {
        ticker.tick().await;
        for (gear, &track) in gears.iter().zip(&tracks) {
            audio.set_volume(track, volume(gear));
        }
    }
}

/// Play a ding every time `gear` becomes fully charged. Runs until cancelled.
pub async fn ding_on_full_charge(gear: &Gear, audio: &dyn Audio) {
    loop {
        gear.charged().wait().await;
        audio.play_once(Cue::Ding);
    }
}

fn volume(gear: &Gear) -> f32 {
    f32::from(gear.level()) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play(usize),
        Volume(usize, f32),
        Stop(usize),
        Once(Cue),
    }

    #[derive(Default)]
    struct RecordingAudio {
        calls: Mutex<Vec<Call>>,
    }

    impl Audio for RecordingAudio {
        fn loop_tracks(&self) -> usize {
            3
        }
        fn play_loop(&self, track: usize, _volume: f32) {
            self.calls.lock().push(Call::Play(track));
        }
        fn set_volume(&self, track: usize, volume: f32) {
            self.calls.lock().push(Call::Volume(track, volume));
        }
        fn stop(&self, track: usize, _fade: Duration) {
            self.calls.lock().push(Call::Stop(track));
        }
        fn play_once(&self, cue: Cue) {
            self.calls.lock().push(Call::Once(cue));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_follow_gears_and_fade_on_cancel() {
        let gears = vec![Arc::new(Gear::new(1, 255)), Arc::new(Gear::new(2, 1))];
        let audio = Arc::new(RecordingAudio::default());

        let task = {
            let gears = gears.clone();
            let audio: Arc<dyn Audio> = audio.clone();
            tokio::spawn(async move { play_gear_loops(&gears, audio).await })
        };

        gears[0].turned(1);
        tokio::time::sleep(Duration::from_millis(250)).await;
        task.abort();
        let _ = task.await;

        let calls = audio.calls.lock();
        let plays: Vec<usize> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Play(t) => Some(*t),
                _ => None,
            })
            .collect();
        assert_eq!(plays.len(), 2);
        assert_ne!(plays[0], plays[1]);
        assert!(calls.contains(&Call::Volume(plays[0], 1.0)));
        assert!(calls.contains(&Call::Volume(plays[1], 0.0)));
        assert!(calls.contains(&Call::Stop(plays[0])));
        assert!(calls.contains(&Call::Stop(plays[1])));
    }

    #[tokio::test]
    async fn test_too_few_tracks_disables_soundscape() {
        let gears: Vec<_> = (0..4).map(|id| Arc::new(Gear::new(id, 1))).collect();
        let audio = Arc::new(RecordingAudio::default());
        play_gear_loops(&gears, audio.clone()).await;
        assert!(audio.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ding_on_each_full_charge() {
        let gear = Arc::new(Gear::new(1, 255));
        let audio = Arc::new(RecordingAudio::default());

        let task = {
            let gear = gear.clone();
            let audio = audio.clone();
            tokio::spawn(async move { ding_on_full_charge(&gear, audio.as_ref()).await })
        };
        tokio::task::yield_now().await;

        gear.turned(1);
        tokio::task::yield_now().await;
        gear.reset();
        gear.turned(1);
        tokio::task::yield_now().await;
        task.abort();

        let dings = audio
            .calls
            .lock()
            .iter()
            .filter(|c| **c == Call::Once(Cue::Ding))
            .count();
        assert_eq!(dings, 2);
    }
}
