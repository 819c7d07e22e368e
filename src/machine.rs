//! The installation state machine.
//!
//! ```text
//!            nonzero touch              every gear full
//!   Idle ─────────────────▶ Charging ──────────────────▶ Charged
//!    ▲                        │                             │
//!    └── all discharged and ──┘                             │
//!        untouched for cooldown                             │
//!    ▲                                                      │
//!    └──────────────────── dwell elapsed ───────────────────┘
//! ```
//!
//! Each state owns a [`StateScope`] of tasks. The supervisor tears the whole
//! scope down, and waits for it, before the next state's tasks start.

use crate::audio::{self, Audio, Cue};
use crate::edge::{EdgeListener, EdgeSignal, wait_any};
use crate::effect::EffectPipeline;
use crate::gear::{DischargeTiming, Gear};
use crate::scope::StateScope;
use crate::sensor_link::SensorEvent;
use crate::streaming::{self, FRAME_PERIOD};
use crate::wled::{LightingController, RealtimeSink};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, IntoStaticStr};
use tokio::sync::mpsc;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoStaticStr)]
pub enum InstallationState {
    #[default]
    Idle,
    Charging,
    Charged,
}

/// Current state plus a notification for every change.
#[derive(Debug, Default)]
pub struct MachineState {
    state: Mutex<InstallationState>,
    changed: EdgeSignal,
}

impl MachineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> InstallationState {
        *self.state.lock()
    }

    pub fn to_idle(&self) -> bool {
        self.transition(InstallationState::Idle)
    }

    pub fn to_charging(&self) -> bool {
        self.transition(InstallationState::Charging)
    }

    pub fn to_charged(&self) -> bool {
        self.transition(InstallationState::Charged)
    }

    /// Listener for the next state change.
    pub fn changed(&self) -> EdgeListener {
        self.changed.listen()
    }

    /// Number of state changes so far.
    pub fn change_count(&self) -> u64 {
        self.changed.generation()
    }

    /// Move to `next`. Staying in the same state is not a change and
    /// notifies nobody.
    fn transition(&self, next: InstallationState) -> bool {
        let previous = {
            let mut state = self.state.lock();
            if *state == next {
                return false;
            }
            std::mem::replace(&mut *state, next)
        };
        info!("[Machine] {} -> {}", previous, next);
        self.changed.notify();
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineTimings {
    pub discharge: DischargeTiming,
    pub frame_period: Duration,
    /// How often the discharge watcher checks for all gears at zero.
    pub discharged_poll: Duration,
    /// Quiet time with every gear at zero before going back to idle.
    pub cooldown: Duration,
    /// Time spent celebrating before going back to idle.
    pub charged_dwell: Duration,
    /// Delay between attempts to open the realtime channel.
    pub realtime_retry: Duration,
}

impl Default for MachineTimings {
    fn default() -> Self {
        Self {
            discharge: DischargeTiming::default(),
            frame_period: FRAME_PERIOD,
            discharged_poll: Duration::from_secs(1),
            cooldown: Duration::from_secs(5),
            charged_dwell: Duration::from_secs(30),
            realtime_retry: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    pub idle_preset: u8,
    pub charged_preset: u8,
    pub timings: MachineTimings,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            idle_preset: 1,
            charged_preset: 2,
            timings: MachineTimings::default(),
        }
    }
}

pub struct Machine {
    gears: Vec<Arc<Gear>>,
    pipeline: Arc<Mutex<EffectPipeline>>,
    lighting: Arc<dyn LightingController>,
    audio: Arc<dyn Audio>,
    state: Arc<MachineState>,
    config: MachineConfig,
}

impl Machine {
    pub fn new(
        gears: Vec<Arc<Gear>>,
        pipeline: EffectPipeline,
        lighting: Arc<dyn LightingController>,
        audio: Arc<dyn Audio>,
        config: MachineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            gears,
            pipeline: Arc::new(Mutex::new(pipeline)),
            lighting,
            audio,
            state: Arc::new(MachineState::new()),
            config,
        })
    }

    pub fn gears(&self) -> &[Arc<Gear>] {
        &self.gears
    }

    pub fn state(&self) -> &Arc<MachineState> {
        &self.state
    }

    /// Apply one sensor event.
    pub fn handle_event(&self, event: SensorEvent) {
        let state = self.state.get();
        if state == InstallationState::Charged {
            trace!("[Machine] Ignoring sensor {} while charged", event.sensor_id);
            return;
        }

        let Some(gear) = self.gears.iter().find(|g| g.id() == event.sensor_id) else {
            warn!("[Machine] Unknown sensor id {}", event.sensor_id);
            return;
        };

        if state == InstallationState::Idle && event.delta != 0 {
            self.state.to_charging();
        }
        gear.turned(i32::from(event.delta));
    }

    /// Consume sensor events and drive the states until the event channel
    /// closes.
    pub async fn run(self: &Arc<Self>, mut events: mpsc::Receiver<SensorEvent>) {
        tokio::select! {
            _ = self.intake(&mut events) => {
                info!("[Machine] Sensor events closed, stopping");
            }
            _ = self.supervise() => {}
        }
    }

    async fn intake(&self, events: &mut mpsc::Receiver<SensorEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
    }

    async fn supervise(self: &Arc<Self>) {
        loop {
            let mut changed = self.state.changed();
            let state = self.state.get();

            debug!("[Machine] Starting {} tasks", state);
            let mut scope = StateScope::new(state.into());
            self.enter(state, &mut scope);

            changed.wait().await;

            debug!("[Machine] Stopping {} tasks", state);
            scope.shutdown().await;
        }
    }

    fn enter(self: &Arc<Self>, state: InstallationState, scope: &mut StateScope) {
        match state {
            InstallationState::Idle => self.enter_idle(scope),
            InstallationState::Charging => self.enter_charging(scope),
            InstallationState::Charged => self.enter_charged(scope),
        }
    }

    fn enter_idle(self: &Arc<Self>, scope: &mut StateScope) {
        let machine = self.clone();
        scope.spawn("idle preset", async move {
            if let Err(e) = machine.lighting.set_preset(machine.config.idle_preset).await {
                warn!("[Machine] Failed to show idle preset: {}", e);
            }
        });
    }

    fn enter_charging(self: &Arc<Self>, scope: &mut StateScope) {
        let machine = self.clone();
        scope.spawn("stream", async move { machine.stream().await });

        for gear in &self.gears {
            let discharging = gear.clone();
            let timing = self.config.timings.discharge;
            scope.spawn("discharge", async move { discharging.discharge(timing).await });

            let gear = gear.clone();
            let audio = self.audio.clone();
            scope.spawn("ding", async move {
                audio::ding_on_full_charge(&gear, audio.as_ref()).await
            });
        }

        let machine = self.clone();
        scope.spawn("charged watch", async move { machine.watch_charged().await });

        let machine = self.clone();
        scope.spawn("discharged watch", async move { machine.watch_discharged().await });

        let gears = self.gears.clone();
        let audio = self.audio.clone();
        scope.spawn("sound", async move { audio::play_gear_loops(&gears, audio).await });
    }

    fn enter_charged(self: &Arc<Self>, scope: &mut StateScope) {
        let machine = self.clone();
        scope.spawn("celebrate", async move { machine.celebrate().await });
    }

    async fn stream(&self) {
        if let Err(e) = self.lighting.set_live().await {
            warn!("[Machine] Failed to switch lights to live mode: {}", e);
        }
        let mut sink = self.open_realtime().await;
        streaming::stream_frames(
            &self.gears,
            &self.pipeline,
            sink.as_mut(),
            self.config.timings.frame_period,
        )
        .await;
    }

    async fn open_realtime(&self) -> Box<dyn RealtimeSink> {
        loop {
            match self.lighting.open_realtime().await {
                Ok(sink) => return sink,
                Err(e) => {
                    error!("[Machine] Failed to open realtime channel: {}", e);
                    sleep(self.config.timings.realtime_retry).await;
                }
            }
        }
    }

    async fn watch_charged(&self) {
        loop {
            let mut charged: Vec<EdgeListener> = self.gears.iter().map(|g| g.charged()).collect();
            if self.gears.iter().all(|g| g.is_charged()) {
                self.state.to_charged();
                return;
            }
            wait_any(&mut charged).await;
        }
    }

    async fn watch_discharged(&self) {
        let timings = &self.config.timings;
        loop {
            if !self.gears.iter().all(|g| g.is_discharged()) {
                sleep(timings.discharged_poll).await;
                continue;
            }

            let touched: Vec<EdgeListener> = self.gears.iter().map(|g| g.touched()).collect();
            sleep(timings.cooldown).await;
            if touched.iter().any(|t| t.has_fired()) {
                debug!("[Machine] Touched during cooldown");
                continue;
            }

            self.state.to_idle();
            return;
        }
    }

    async fn celebrate(&self) {
        for gear in &self.gears {
            gear.reset();
        }
        self.audio.play_once(Cue::Finale);
        if let Err(e) = self.lighting.set_preset(self.config.charged_preset).await {
            warn!("[Machine] Failed to show charged preset: {}", e);
        }
        sleep(self.config.timings.charged_dwell).await;
        self.state.to_idle();
    }
}
