//! A single lit pixel travelling along all fixtures

use ledflow_core::{Frame, PatternSource, Rgb};

pub struct ChasePattern {
    pixel_count: usize,
    color: Rgb,
    step: usize,
}

impl ChasePattern {
    pub fn new(pixel_count: usize, color: Rgb) -> Self {
        Self {
            pixel_count,
            color,
            step: 0,
        }
    }

    /// Index of the lit pixel
    pub fn position(&self) -> usize {
        if self.pixel_count == 0 {
            0
        } else {
            self.step % self.pixel_count
        }
    }
}

impl PatternSource for ChasePattern {
    fn generate_frame(&self) -> Frame {
        let mut frame = vec![Rgb::BLACK; self.pixel_count];
        if let Some(pixel) = frame.get_mut(self.position()) {
            *pixel = self.color;
        }
        frame
    }

    fn advance(&mut self) {
        self.step = self.step.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.step = 0;
    }

    fn name(&self) -> &str {
        "chase"
    }
}
