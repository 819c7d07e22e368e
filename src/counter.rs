/// Integer that clamps to `[min, max]` instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaturatingCounter {
    value: i32,
    min: i32,
    max: i32,
}

impl SaturatingCounter {
    /// Create a counter. `value` is clamped into range.
    pub fn new(value: i32, min: i32, max: i32) -> Self {
        assert!(min <= max, "counter range is empty: {min}..={max}");
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn set(&mut self, value: i32) {
        self.value = value.clamp(self.min, self.max);
    }

    pub fn add(&mut self, amount: i32) {
        self.value = self.value.saturating_add(amount).clamp(self.min, self.max);
    }

    pub fn sub(&mut self, amount: i32) {
        self.value = self.value.saturating_sub(amount).clamp(self.min, self.max);
    }

    pub fn is_min(&self) -> bool {
        self.value == self.min
    }

    pub fn is_max(&self) -> bool {
        self.value == self.max
    }
}
