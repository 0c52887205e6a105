//! Whole-frame single color patterns

use ledflow_core::{Frame, PatternSource, Rgb};

/// Every pixel the same color, every frame
pub struct SolidPattern {
    pixel_count: usize,
    color: Rgb,
    step: u64,
}

impl SolidPattern {
    pub fn new(pixel_count: usize, color: Rgb) -> Self {
        Self {
            pixel_count,
            color,
            step: 0,
        }
    }

    /// Frames advanced since creation or the last reset
    pub fn step(&self) -> u64 {
        self.step
    }
}

impl PatternSource for SolidPattern {
    fn generate_frame(&self) -> Frame {
        vec![self.color; self.pixel_count]
    }

    fn advance(&mut self) {
        self.step = self.step.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.step = 0;
    }

    fn name(&self) -> &str {
        "solid"
    }
}

/// All pixels on for even steps, off for odd steps
pub struct StrobePattern {
    pixel_count: usize,
    color: Rgb,
    step: u64,
}

impl StrobePattern {
    pub fn new(pixel_count: usize, color: Rgb) -> Self {
        Self {
            pixel_count,
            color,
            step: 0,
        }
    }

    pub fn is_on(&self) -> bool {
        self.step % 2 == 0
    }
}

impl PatternSource for StrobePattern {
    fn generate_frame(&self) -> Frame {
        let color = if self.is_on() { self.color } else { Rgb::BLACK };
        vec![color; self.pixel_count]
    }

    fn advance(&mut self) {
        self.step = self.step.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.step = 0;
    }

    fn name(&self) -> &str {
        "strobe"
    }
}
