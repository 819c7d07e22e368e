//! Gears arranged around a ring, each pouring its colour outwards as it
//! charges. Where two gears' pools meet, the overlap takes a blend colour.

use super::Colour;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_2, TAU};

const OVERLAP_FALLBACK: Colour = Colour::new(180, 100, 200);

#[derive(Debug, Clone)]
pub struct SteampunkCharging {
    colours: Vec<Colour>,
    /// Gear value at which a gear reaches its full spread.
    turn: f32,
    /// Spread at full charge, as a fraction of a quarter ring.
    max_spread: f32,
    min_brightness: f32,
    /// Angle of each gear's pool centre, in radians.
    centres: Vec<f32>,
    /// Falloff exponent per gear; higher is a flatter, more liquid edge.
    falloff: Vec<f32>,
}

impl SteampunkCharging {
    pub fn new(colours: &[Colour]) -> Self {
        Self::with_rng(colours, StdRng::from_entropy())
    }

    pub fn with_rng(colours: &[Colour], mut rng: StdRng) -> Self {
        let count = colours.len().max(1) as f32;
        let centres = (0..colours.len())
            .map(|i| (TAU * i as f32 / count + rng.gen_range(-0.2..0.2)).rem_euclid(TAU))
            .collect();
        let falloff = (0..colours.len()).map(|_| rng.gen_range(1.5..2.5)).collect();

        Self {
            colours: colours.to_vec(),
            turn: 1.0,
            max_spread: 1.0,
            min_brightness: 40.0,
            centres,
            falloff,
        }
    }

    fn overlap_colour(gears: &[usize]) -> Colour {
        match gears {
            [0, 1] => Colour::new(255, 128, 64),
            [0, 2] => Colour::new(128, 255, 64),
            [1, 2] => Colour::new(64, 128, 255),
            _ => OVERLAP_FALLBACK,
        }
    }

    pub(super) fn calculate(&self, gear_values: &[u8], led_count: usize) -> Vec<Colour> {
        super::check_gear_count(gear_values, &self.colours);

        // Per LED: brightness contributed by each gear, keyed by gear index.
        let mut pools: Vec<BTreeMap<usize, f32>> = vec![BTreeMap::new(); led_count];

        for (gear, &value) in gear_values.iter().enumerate() {
            if value == 0 {
                continue;
            }

            let fraction = (f32::from(value) / (self.turn * 255.0)).min(1.0);
            let spread = fraction * self.max_spread * FRAC_PI_2;
            let centre_brightness = self.min_brightness + fraction * (255.0 - self.min_brightness);

            for (led, pool) in pools.iter_mut().enumerate() {
                let angle = TAU * led as f32 / led_count as f32;
                let diff = (angle - self.centres[gear]).abs();
                let distance = diff.min(TAU - diff);
                if distance > spread {
                    continue;
                }

                let fade = (1.0 - (distance / spread).powf(self.falloff[gear])).clamp(0.0, 1.0);
                let brightness = self.min_brightness + fade * (centre_brightness - self.min_brightness);
                pool.insert(gear, brightness);
            }
        }

        pools
            .iter()
            .map(|pool| match (pool.first_key_value(), pool.len()) {
                (None, _) => Colour::BLACK,
                (Some((&gear, &brightness)), 1) => {
                    truncate_scale(self.colours[gear], brightness / 255.0)
                }
                _ => {
                    let gears: Vec<usize> = pool.keys().copied().collect();
                    let brightness = pool.values().sum::<f32>().min(255.0);
                    truncate_scale(Self::overlap_colour(&gears), brightness / 255.0)
                }
            })
            .collect()
    }
}

fn truncate_scale(colour: Colour, scale: f32) -> Colour {
    colour.map(|channel| (f32::from(channel) * scale).clamp(0.0, 255.0) as u8)
}
