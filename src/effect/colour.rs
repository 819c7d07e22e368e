use serde::{Deserialize, Serialize};

/// An RGB colour with 8-bit channels.
///
/// All arithmetic saturates at the channel range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn add(self, other: Colour) -> Colour {
        Colour::new(
            self.r.saturating_add(other.r),
            self.g.saturating_add(other.g),
            self.b.saturating_add(other.b),
        )
    }

    pub fn subtract(self, other: Colour) -> Colour {
        Colour::new(
            self.r.saturating_sub(other.r),
            self.g.saturating_sub(other.g),
            self.b.saturating_sub(other.b),
        )
    }

    /// Multiply every channel by `intensity`, rounding to the nearest level.
    pub fn scale(self, intensity: f32) -> Colour {
        let scale = |channel: u8| (f32::from(channel) * intensity).round().clamp(0.0, 255.0) as u8;
        self.map(scale)
    }

    pub fn map(self, f: impl Fn(u8) -> u8) -> Colour {
        Colour::new(f(self.r), f(self.g), f(self.b))
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<(u8, u8, u8)> for Colour {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Colour::new(r, g, b)
    }
}

/// Colours assigned to the gears, in gear order.
pub const GEAR_COLOURS: [Colour; 5] = [
    Colour::new(255, 0, 0),
    Colour::new(0, 255, 0),
    Colour::new(0, 255, 255),
    Colour::new(0, 0, 255),
    Colour::new(255, 0, 255),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_saturates() {
        let a = Colour::new(200, 10, 0);
        let b = Colour::new(100, 10, 0);
        assert_eq!(a.add(b), Colour::new(255, 20, 0));
    }

    #[test]
    fn test_subtract_saturates() {
        let a = Colour::new(50, 10, 0);
        let b = Colour::new(100, 5, 1);
        assert_eq!(a.subtract(b), Colour::new(0, 5, 0));
    }

    #[test]
    fn test_scale_rounds_and_clamps() {
        let c = Colour::new(255, 100, 3);
        assert_eq!(c.scale(0.5), Colour::new(128, 50, 2));
        assert_eq!(c.scale(0.0), Colour::BLACK);
        assert_eq!(c.scale(4.0), Colour::new(255, 255, 12));
        assert_eq!(c.scale(-1.0), Colour::BLACK);
    }
}
