//! Light effects: gear charge levels in, one colour per LED out.
//!
//! Effects form a closed set of variants in [`Effect`]. Composite effects
//! (stripes, layers) own their inner effects, and every effect keeps its own
//! evolving state (particles, flashes, random generators). Time only moves
//! forward through the `dt` passed to [`Effect::calculate`], so effects behave
//! the same in the live installation and in tests.

pub mod animation;
pub mod colour;
pub mod gamma;
pub mod seeds;
pub mod steampunk;

pub use colour::{Colour, GEAR_COLOURS};
pub use seeds::{SeedConfig, SeedEffect};
pub use steampunk::SteampunkCharging;

use animation::{AnimatedValue, Animation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString, VariantNames};
use tokio::time::Instant;

/// Remap a raw gear level so that a barely turned gear is already visible.
///
/// 0 and 255 are kept; everything in between lands in `50..=200`.
pub fn scale_gear_value(value: u8) -> u8 {
    match value {
        0 => 0,
        255 => 255,
        v => (f32::from(v) / 254.0 * 150.0).round() as u8 + 50,
    }
}

fn scaled_gear_values(gear_values: &[u8]) -> Vec<u8> {
    gear_values.iter().copied().map(scale_gear_value).collect()
}

fn check_gear_count(gear_values: &[u8], colours: &[Colour]) {
    assert_eq!(
        gear_values.len(),
        colours.len(),
        "Received wrong number of gear values"
    );
}

/// Normally distributed sample with mean 0 (Box-Muller).
pub(crate) fn gauss(rng: &mut impl Rng, sigma: f64) -> f64 {
    let u1 = 1.0 - rng.r#gen::<f64>();
    let u2 = rng.r#gen::<f64>();
    sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// How two layers are combined pixel by pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    Add,
    Subtract,
}

impl Blend {
    fn apply(self, below: Colour, above: Colour) -> Colour {
        match self {
            Blend::Add => below.add(above),
            Blend::Subtract => below.subtract(above),
        }
    }
}

/// Pixels take the gears' colours in turn, each dimmed by its gear's charge.
#[derive(Debug, Clone)]
pub struct Striped {
    colours: Vec<Colour>,
}

impl Striped {
    pub fn new(colours: &[Colour]) -> Self {
        Self {
            colours: colours.to_vec(),
        }
    }

    fn calculate(&self, gear_values: &[u8], led_count: usize) -> Vec<Colour> {
        check_gear_count(gear_values, &self.colours);
        if self.colours.is_empty() {
            return vec![Colour::BLACK; led_count];
        }

        let values = scaled_gear_values(gear_values);
        (0..led_count)
            .map(|i| {
                let gear = i % self.colours.len();
                self.colours[gear].scale(f32::from(values[gear]) / 255.0)
            })
            .collect()
    }
}

/// One contiguous band of pixels per gear.
#[derive(Debug, Clone)]
pub struct Sectored {
    colours: Vec<Colour>,
}

impl Sectored {
    pub fn new(colours: &[Colour]) -> Self {
        Self {
            colours: colours.to_vec(),
        }
    }

    fn calculate(&self, gear_values: &[u8], led_count: usize) -> Vec<Colour> {
        check_gear_count(gear_values, &self.colours);
        let mut lights = vec![Colour::BLACK; led_count];
        if self.colours.is_empty() {
            return lights;
        }

        let values = scaled_gear_values(gear_values);
        let sector_length = led_count.div_ceil(self.colours.len());
        for (sector, (value, colour)) in values.iter().zip(&self.colours).enumerate() {
            let start = (sector * sector_length).min(led_count);
            let end = ((sector + 1) * sector_length).min(led_count);
            lights[start..end].fill(colour.scale(f32::from(*value) / 255.0));
        }
        lights
    }
}

/// Paints fixed-colour stripes over an inner effect.
///
/// Starting at `offset`, runs of `width` pixels are overwritten every
/// `width + spacing` pixels.
#[derive(Debug, Clone)]
pub struct StaticStripe {
    inner: Box<Effect>,
    colour: Colour,
    width: usize,
    spacing: usize,
    offset: usize,
}

impl StaticStripe {
    pub fn new(inner: Effect, colour: Colour, width: usize, spacing: usize, offset: usize) -> Self {
        Self {
            inner: Box::new(inner),
            colour,
            width,
            spacing,
            offset,
        }
    }

    fn calculate(&mut self, gear_values: &[u8], led_count: usize, dt: Duration) -> Vec<Colour> {
        let mut lights = self.inner.calculate(gear_values, led_count, dt);
        let period = (self.width + self.spacing).max(1);
        let mut start = self.offset;
        while start < lights.len() {
            let end = (start + self.width).min(lights.len());
            lights[start..end].fill(self.colour);
            start += period;
        }
        lights
    }
}

/// Random per-pixel flicker of one colour.
#[derive(Debug, Clone)]
pub struct Shimmer {
    colour: Colour,
    rng: StdRng,
}

impl Shimmer {
    pub fn new(colour: Colour) -> Self {
        Self::with_rng(colour, StdRng::from_entropy())
    }

    pub fn with_rng(colour: Colour, rng: StdRng) -> Self {
        Self { colour, rng }
    }

    fn calculate(&mut self, led_count: usize) -> Vec<Colour> {
        (0..led_count)
            .map(|_| self.colour.scale(self.rng.r#gen::<f32>()))
            .collect()
    }
}

/// Flashes the whole strip in a gear's colour when that gear becomes fully
/// charged. The flash is dropped if the gear loses charge before it ends.
#[derive(Debug, Clone)]
pub struct PulseOnFullCharge {
    colours: Vec<Colour>,
    pulses: Vec<Option<AnimatedValue>>,
    ramp: Duration,
    dissipate: Duration,
}

impl PulseOnFullCharge {
    pub fn new(colours: &[Colour]) -> Self {
        Self::with_timing(colours, Duration::from_millis(400), Duration::from_millis(1000))
    }

    pub fn with_timing(colours: &[Colour], ramp: Duration, dissipate: Duration) -> Self {
        Self {
            colours: colours.to_vec(),
            pulses: vec![None; colours.len()],
            ramp,
            dissipate,
        }
    }

    fn calculate(&mut self, gear_values: &[u8], led_count: usize, dt: Duration) -> Vec<Colour> {
        check_gear_count(gear_values, &self.colours);

        for pulse in self.pulses.iter_mut().flatten() {
            pulse.tick(dt);
        }

        let mut lights = vec![Colour::BLACK; led_count];
        for ((value, colour), pulse) in scaled_gear_values(gear_values)
            .into_iter()
            .zip(&self.colours)
            .zip(self.pulses.iter_mut())
        {
            if value == u8::MAX {
                pulse.get_or_insert_with(|| {
                    AnimatedValue::new(Animation::ramp_then_dissipate(self.ramp, self.dissipate))
                });
            } else {
                *pulse = None;
            }

            if let Some(pulse) = pulse {
                let flash = colour.scale(pulse.value());
                for light in lights.iter_mut() {
                    *light = light.add(flash);
                }
            }
        }
        lights
    }
}

/// Several effects blended on top of each other, first to last.
#[derive(Debug, Clone)]
pub struct Layered {
    effects: Vec<Effect>,
    blend: Blend,
}

impl Layered {
    pub fn new(effects: Vec<Effect>, blend: Blend) -> Self {
        Self { effects, blend }
    }

    fn calculate(&mut self, gear_values: &[u8], led_count: usize, dt: Duration) -> Vec<Colour> {
        let mut effects = self.effects.iter_mut();
        let Some(first) = effects.next() else {
            return vec![Colour::BLACK; led_count];
        };

        let mut lights = first.calculate(gear_values, led_count, dt);
        for effect in effects {
            let layer = effect.calculate(gear_values, led_count, dt);
            for (light, colour) in lights.iter_mut().zip(layer) {
                *light = self.blend.apply(*light, colour);
            }
        }
        lights
    }
}

/// Every light effect the installation can show.
#[derive(Debug, Clone)]
pub enum Effect {
    Striped(Striped),
    Sectored(Sectored),
    StaticStripe(StaticStripe),
    Shimmer(Shimmer),
    PulseOnFullCharge(PulseOnFullCharge),
    Seeds(SeedEffect),
    Steampunk(SteampunkCharging),
    Layered(Layered),
}

impl Effect {
    /// Compute `led_count` colours for the given gear levels, `dt` after the
    /// previous calculation.
    ///
    /// Panics if `gear_values` does not have one entry per configured colour.
    pub fn calculate(&mut self, gear_values: &[u8], led_count: usize, dt: Duration) -> Vec<Colour> {
        match self {
            Effect::Striped(effect) => effect.calculate(gear_values, led_count),
            Effect::Sectored(effect) => effect.calculate(gear_values, led_count),
            Effect::StaticStripe(effect) => effect.calculate(gear_values, led_count, dt),
            Effect::Shimmer(effect) => effect.calculate(led_count),
            Effect::PulseOnFullCharge(effect) => effect.calculate(gear_values, led_count, dt),
            Effect::Seeds(effect) => effect.calculate(gear_values, led_count, dt),
            Effect::Steampunk(effect) => effect.calculate(gear_values, led_count),
            Effect::Layered(effect) => effect.calculate(gear_values, led_count, dt),
        }
    }

    pub fn layered(effects: Vec<Effect>, blend: Blend) -> Effect {
        Effect::Layered(Layered::new(effects, blend))
    }

    /// Interleave two effects. `left` is blacked out in runs of `left_width`
    /// pixels from the start of the strip, `right` everywhere else, so each
    /// shows through where the other is masked.
    pub fn alternating_stripes(left: Effect, left_width: usize, right: Effect, right_width: usize) -> Effect {
        Effect::layered(
            vec![
                Effect::StaticStripe(StaticStripe::new(
                    left,
                    Colour::BLACK,
                    left_width,
                    right_width,
                    0,
                )),
                Effect::StaticStripe(StaticStripe::new(
                    right,
                    Colour::BLACK,
                    right_width,
                    left_width,
                    left_width,
                )),
            ],
            Blend::Add,
        )
    }

    /// Dim `effect` by random flicker of up to `intensity` (0..=1).
    pub fn shimmer(effect: Effect, intensity: f32) -> Effect {
        let level = (intensity.clamp(0.0, 1.0) * 255.0) as u8;
        Effect::layered(
            vec![effect, Effect::Shimmer(Shimmer::new(Colour::new(level, level, level)))],
            Blend::Subtract,
        )
    }

    /// The installation's signature effect: full-charge flashes over bands of
    /// stripes interleaved with bands of drifting seeds.
    pub fn flowing_memento(colours: &[Colour], led_count: usize) -> Effect {
        Effect::layered(
            vec![
                Effect::PulseOnFullCharge(PulseOnFullCharge::new(colours)),
                Effect::alternating_stripes(
                    Effect::Striped(Striped::new(colours)),
                    5,
                    Effect::Seeds(SeedEffect::new(colours, led_count, SeedConfig::default())),
                    20,
                ),
            ],
            Blend::Add,
        )
    }
}

/// Effects selectable from configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, VariantNames, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    Striped,
    Sectored,
    Steampunk,
    #[default]
    FlowingMemento,
}

impl EffectKind {
    pub fn build(self, colours: &[Colour], led_count: usize) -> Effect {
        match self {
            EffectKind::Striped => Effect::Striped(Striped::new(colours)),
            EffectKind::Sectored => Effect::Sectored(Sectored::new(colours)),
            EffectKind::Steampunk => Effect::Steampunk(SteampunkCharging::new(colours)),
            EffectKind::FlowingMemento => Effect::flowing_memento(colours, led_count),
        }
    }
}

/// An effect bound to a strip length, with gamma correction applied to
/// everything it produces. This is what the streaming loop drives.
#[derive(Debug, Clone)]
pub struct EffectPipeline {
    effect: Effect,
    led_count: usize,
    last_frame: Option<Instant>,
}

impl EffectPipeline {
    pub fn new(effect: Effect, led_count: usize) -> Self {
        Self {
            effect,
            led_count,
            last_frame: None,
        }
    }

    /// Calculate the frame for `now`.
    ///
    /// Time since the previous frame counts in full, also across pauses in
    /// streaming, so flashes and seeds left over from an earlier charging
    /// session have run out when streaming resumes.
    pub fn calculate_at(&mut self, gear_values: &[u8], now: Instant) -> Vec<Colour> {
        let dt = self
            .last_frame
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_frame = Some(now);
        self.calculate(gear_values, dt)
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn calculate(&mut self, gear_values: &[u8], dt: Duration) -> Vec<Colour> {
        self.effect
            .calculate(gear_values, self.led_count, dt)
            .into_iter()
            .map(gamma::correct)
            .collect()
    }
}
