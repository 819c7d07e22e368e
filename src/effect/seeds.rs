//! Seeds: short-lived glowing spots that bloom and fade along the strip.
//!
//! New seeds are planted at a fixed rate near the home band of a random gear.
//! Each seed lights a small neighbourhood with a parabolic falloff of its
//! gear's colour, brightened by how much that gear is charged.

use super::animation::{AnimatedValue, Animation};
use super::{Colour, check_gear_count, gauss, scaled_gear_values};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedConfig {
    /// Number of pixels one seed lights up.
    pub influence_size: usize,
    /// Time for a seed to reach full brightness.
    pub ramp: Duration,
    /// Mean time for a seed to fade out again.
    pub dissipate: Duration,
    /// Standard deviation of the fade time.
    pub dissipate_jitter: Duration,
    /// A new seed is planted every `spawn_interval`.
    pub spawn_interval: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            influence_size: 31,
            ramp: Duration::from_millis(500),
            dissipate: Duration::from_millis(5000),
            dissipate_jitter: Duration::from_millis(1000),
            spawn_interval: Duration::from_millis(50),
        }
    }
}

impl SeedConfig {
    /// Upper bound on live seeds: one full envelope's worth of plantings.
    pub fn max_seeds(&self) -> usize {
        let lifetime = (self.ramp + self.dissipate).as_nanos();
        let interval = self.spawn_interval.as_nanos().max(1);
        ((lifetime / interval) as usize).max(1)
    }
}

#[derive(Debug, Clone)]
struct Seed {
    position: usize,
    gear: usize,
    intensity: AnimatedValue,
}

impl Seed {
    fn influence(&self, offset: usize, size: usize) -> f32 {
        let half = size as f32 / 2.0;
        let distance = (size / 2) as f32 - offset as f32;
        (1.0 - distance * distance / (half * half)).max(0.0) * self.intensity.value()
    }
}

#[derive(Debug, Clone)]
pub struct SeedEffect {
    colours: Vec<Colour>,
    led_count: usize,
    config: SeedConfig,
    seeds: Vec<Seed>,
    since_last_seed: Duration,
    rng: StdRng,
}

impl SeedEffect {
    pub fn new(colours: &[Colour], led_count: usize, config: SeedConfig) -> Self {
        Self::with_rng(colours, led_count, config, StdRng::from_entropy())
    }

    pub fn with_rng(colours: &[Colour], led_count: usize, config: SeedConfig, rng: StdRng) -> Self {
        Self {
            colours: colours.to_vec(),
            led_count,
            config,
            seeds: Vec::new(),
            since_last_seed: Duration::ZERO,
            rng,
        }
    }

    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }

    fn plant_seed(&mut self) {
        let gear = self.rng.gen_range(0..self.colours.len());
        let band_start = self.led_count / self.colours.len() * gear;
        let spread = gauss(&mut self.rng, self.led_count as f64 / 16.0) as i64;
        let position = (band_start as i64 + spread).rem_euclid(self.led_count as i64) as usize;

        let jitter = gauss(&mut self.rng, self.config.dissipate_jitter.as_secs_f64());
        let dissipate = Duration::from_secs_f64((self.config.dissipate.as_secs_f64() + jitter).max(0.0));

        self.seeds.push(Seed {
            position,
            gear,
            intensity: AnimatedValue::new(Animation::ramp_then_dissipate(self.config.ramp, dissipate)),
        });
    }

    fn plant_due_seeds(&mut self, dt: Duration) {
        let interval = self.config.spawn_interval.max(Duration::from_millis(1));
        self.since_last_seed += dt;

        let due = self.since_last_seed.as_nanos() / interval.as_nanos();
        self.since_last_seed =
            Duration::from_nanos((self.since_last_seed.as_nanos() % interval.as_nanos()) as u64);

        let room = self.config.max_seeds().saturating_sub(self.seeds.len());
        let count = usize::try_from(due).unwrap_or(usize::MAX).min(room);
        for _ in 0..count {
            self.plant_seed();
        }
    }

    pub(super) fn calculate(&mut self, gear_values: &[u8], led_count: usize, dt: Duration) -> Vec<Colour> {
        check_gear_count(gear_values, &self.colours);
        assert_eq!(self.led_count, led_count, "Seed effect configured for a different strip length");

        let mut lights = vec![Colour::BLACK; led_count];
        if self.colours.is_empty() || led_count == 0 {
            return lights;
        }

        self.plant_due_seeds(dt);
        for seed in &mut self.seeds {
            seed.intensity.tick(dt);
        }

        let size = self.config.influence_size;
        let mut layers = vec![vec![0.0f32; led_count]; self.colours.len()];
        for seed in &self.seeds {
            let layer = &mut layers[seed.gear];
            for offset in 0..size {
                layer[(seed.position + offset) % led_count] += seed.influence(offset, size);
            }
        }

        let values = scaled_gear_values(gear_values);
        for ((layer, colour), value) in layers.iter().zip(&self.colours).zip(values) {
            let charge = f32::from(value) / 255.0;
            for (light, intensity) in lights.iter_mut().zip(layer) {
                *light = light.add(colour.scale(intensity * charge));
            }
        }

        self.seeds.retain(|seed| !seed.intensity.finished());
        lights
    }
}
