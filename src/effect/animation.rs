//! Intensity envelopes for transient light effects.

use std::time::Duration;

/// An intensity curve over time, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Animation {
    /// Rise linearly from 0 to 1.
    Ramp(Duration),
    /// Stay at 1.
    Hold(Duration),
    /// Fall linearly from 1 to 0.
    Dissipate(Duration),
    /// Play each animation after the previous one.
    Sequence(Vec<Animation>),
}

impl Animation {
    /// Ramp up, then fade out: the usual shape of a flash.
    pub fn ramp_then_dissipate(ramp: Duration, dissipate: Duration) -> Self {
        Animation::Sequence(vec![Animation::Ramp(ramp), Animation::Dissipate(dissipate)])
    }

    pub fn total_time(&self) -> Duration {
        match self {
            Animation::Ramp(time) | Animation::Hold(time) | Animation::Dissipate(time) => *time,
            Animation::Sequence(animations) => animations.iter().map(Animation::total_time).sum(),
        }
    }

    /// Intensity at `progress`. Zero once the animation is over.
    pub fn value(&self, progress: Duration) -> f32 {
        match self {
            Animation::Ramp(time) => {
                if progress > *time {
                    0.0
                } else if time.is_zero() {
                    1.0
                } else {
                    progress.as_secs_f32() / time.as_secs_f32()
                }
            }
            Animation::Hold(time) => {
                if progress > *time {
                    0.0
                } else {
                    1.0
                }
            }
            Animation::Dissipate(time) => {
                if progress > *time || time.is_zero() {
                    0.0
                } else {
                    (*time - progress).as_secs_f32() / time.as_secs_f32()
                }
            }
            Animation::Sequence(animations) => {
                let mut progress = progress;
                for animation in animations {
                    let total = animation.total_time();
                    if progress <= total {
                        return animation.value(progress);
                    }
                    progress -= total;
                }
                0.0
            }
        }
    }
}

/// An [`Animation`] together with how far it has played.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedValue {
    animation: Animation,
    progress: Duration,
}

impl AnimatedValue {
    pub fn new(animation: Animation) -> Self {
        Self {
            animation,
            progress: Duration::ZERO,
        }
    }

    pub fn finished(&self) -> bool {
        self.progress > self.animation.total_time()
    }

    pub fn tick(&mut self, dt: Duration) {
        if !self.finished() {
            self.progress += dt;
        }
    }

    pub fn value(&self) -> f32 {
        self.animation.value(self.progress)
    }
}
