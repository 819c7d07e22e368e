use async_trait::async_trait;
use nostmack_hub::audio::{Audio, Cue};
use nostmack_hub::effect::{Colour, Effect, EffectPipeline, Striped};
use nostmack_hub::error::Result;
use nostmack_hub::gear::Gear;
use nostmack_hub::machine::{InstallationState, Machine, MachineConfig};
use nostmack_hub::sensor_link::{self, SensorEvent, SensorLink};
use nostmack_hub::wled::{LightingController, RealtimeSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

#[derive(Default)]
struct MockLighting {
    presets: Mutex<Vec<u8>>,
    live: AtomicUsize,
    frames: Arc<AtomicUsize>,
}

#[async_trait]
impl LightingController for MockLighting {
    async fn set_preset(&self, preset: u8) -> Result<()> {
        self.presets.lock().push(preset);
        Ok(())
    }

    async fn set_live(&self) -> Result<()> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_realtime(&self) -> Result<Box<dyn RealtimeSink>> {
        Ok(Box::new(CountingSink {
            frames: self.frames.clone(),
        }))
    }
}

struct CountingSink {
    frames: Arc<AtomicUsize>,
}

#[async_trait]
impl RealtimeSink for CountingSink {
    async fn send_frame(&mut self, _colours: &[Colour]) -> Result<()> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct SilentAudio {
    finales: AtomicUsize,
}

impl Audio for SilentAudio {
    fn loop_tracks(&self) -> usize {
        8
    }
    fn play_loop(&self, _track: usize, _volume: f32) {}
    fn set_volume(&self, _track: usize, _volume: f32) {}
    fn stop(&self, _track: usize, _fade: Duration) {}
    fn play_once(&self, cue: Cue) {
        if cue == Cue::Finale {
            self.finales.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct Harness {
    machine: Arc<Machine>,
    lighting: Arc<MockLighting>,
    audio: Arc<SilentAudio>,
    events: mpsc::Sender<SensorEvent>,
}

impl Harness {
    /// Start a machine with one gear per `(sensor_id, sensitivity)` and let it
    /// settle in idle.
    async fn start(gears: &[(i32, i32)]) -> Self {
        let lighting = Arc::new(MockLighting::default());
        let audio = Arc::new(SilentAudio::default());
        let colours = vec![Colour::new(255, 0, 0); gears.len()];
        let machine = Machine::new(
            gears.iter().map(|&(id, s)| Arc::new(Gear::new(id, s))).collect(),
            EffectPipeline::new(Effect::Striped(Striped::new(&colours)), 8),
            lighting.clone(),
            audio.clone(),
            MachineConfig::default(),
        );

        let (events, rx) = mpsc::channel(16);
        let running = machine.clone();
        tokio::spawn(async move { running.run(rx).await });
        sleep(Duration::from_millis(10)).await;

        Self {
            machine,
            lighting,
            audio,
            events,
        }
    }

    async fn turn(&self, sensor_id: i32, delta: i16) {
        self.events
            .send(SensorEvent { sensor_id, delta })
            .await
            .unwrap();
    }

    fn state(&self) -> InstallationState {
        self.machine.state().get()
    }

    fn presets(&self) -> Vec<u8> {
        self.lighting.presets.lock().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_touch_in_idle_starts_charging_once() {
    let hub = Harness::start(&[(1, 1), (2, 1)]).await;
    assert_eq!(hub.state(), InstallationState::Idle);
    assert_eq!(hub.presets(), vec![1]);

    for _ in 0..3 {
        hub.turn(1, 3).await;
    }
    sleep(Duration::from_millis(100)).await;

    assert_eq!(hub.state(), InstallationState::Charging);
    assert_eq!(hub.machine.state().change_count(), 1);
    assert_eq!(hub.lighting.live.load(Ordering::SeqCst), 1);
    assert_eq!(hub.machine.gears()[0].value(), 9);
    assert!(hub.lighting.frames.load(Ordering::SeqCst) > 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_delta_and_unknown_sensor_stay_idle() {
    let hub = Harness::start(&[(1, 1)]).await;

    hub.turn(1, 0).await;
    hub.turn(99, 5).await;
    sleep(Duration::from_millis(100)).await;

    assert_eq!(hub.state(), InstallationState::Idle);
    assert_eq!(hub.machine.state().change_count(), 0);
    assert_eq!(hub.machine.gears()[0].value(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_charge_celebrates_then_returns_to_idle() {
    let hub = Harness::start(&[(1, 255), (2, 255)]).await;

    hub.turn(1, 1).await;
    hub.turn(2, -1).await;
    sleep(Duration::from_millis(100)).await;

    assert_eq!(hub.state(), InstallationState::Charged);
    assert!(hub.machine.gears().iter().all(|g| g.is_discharged()));
    assert_eq!(hub.audio.finales.load(Ordering::SeqCst), 1);

    // Input during the dwell changes nothing.
    sleep(Duration::from_secs(10)).await;
    hub.turn(1, 5).await;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(hub.state(), InstallationState::Charged);
    assert_eq!(hub.machine.gears()[0].value(), 0);

    sleep(Duration::from_secs(21)).await;
    assert_eq!(hub.state(), InstallationState::Idle);
    assert_eq!(hub.presets(), vec![1, 2, 1]);
    assert_eq!(hub.machine.state().change_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_discharged_gears_return_to_idle_after_cooldown() {
    let hub = Harness::start(&[(1, 10)]).await;

    hub.turn(1, 1).await;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(hub.state(), InstallationState::Charging);

    // Empty after about 1.1s; noticed by the next poll, then 5s of quiet.
    sleep(Duration::from_secs(3)).await;
    assert!(hub.machine.gears()[0].is_discharged());
    assert_eq!(hub.state(), InstallationState::Charging);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(hub.state(), InstallationState::Idle);
    assert_eq!(hub.presets(), vec![1, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_touch_during_cooldown_keeps_charging() {
    let hub = Harness::start(&[(1, 10)]).await;

    hub.turn(1, 1).await;
    sleep(Duration::from_millis(100)).await;

    // Drained and inside the 5s cooldown.
    sleep(Duration::from_secs(3)).await;
    assert!(hub.machine.gears()[0].is_discharged());
    hub.turn(1, 1).await;

    // Past the end of the first cooldown.
    sleep(Duration::from_millis(4500)).await;
    assert_eq!(hub.state(), InstallationState::Charging);
    assert_eq!(hub.machine.state().change_count(), 1);

    // Drains again and a quiet cooldown follows.
    sleep(Duration::from_secs(6)).await;
    assert_eq!(hub.state(), InstallationState::Idle);
    assert_eq!(hub.presets(), vec![1, 1]);
}

#[tokio::test]
async fn test_udp_reports_drive_the_machine() {
    let link = SensorLink::bind("127.0.0.1:0").await.unwrap();
    let addr = link.local_addr().unwrap();

    let lighting = Arc::new(MockLighting::default());
    let machine = Machine::new(
        vec![Arc::new(Gear::new(7, 4))],
        EffectPipeline::new(Effect::Striped(Striped::new(&[Colour::new(0, 0, 255)])), 4),
        lighting,
        Arc::new(SilentAudio::default()),
        MachineConfig::default(),
    );

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(link.run(tx));
    let running = machine.clone();
    tokio::spawn(async move { running.run(rx).await });

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&[1, 2, 3], addr).await.unwrap();
    let frame = sensor_link::encode(SensorEvent {
        sensor_id: 7,
        delta: 2,
    });
    sender.send_to(&frame, addr).await.unwrap();

    for _ in 0..200 {
        if machine.state().get() == InstallationState::Charging {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(machine.state().get(), InstallationState::Charging);
    assert_eq!(machine.gears()[0].value(), 8);
}
