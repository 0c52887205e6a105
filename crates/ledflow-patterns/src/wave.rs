//! Sine wave of brightness travelling along the pixels

use std::f32::consts::TAU;

use ledflow_core::{Frame, PatternSource, Rgb};

pub struct WavePattern {
    pixel_count: usize,
    color: Rgb,
    frequency: f32,
    amplitude: f32,
    step: u64,
}

impl WavePattern {
    pub fn new(pixel_count: usize, color: Rgb, frequency: f32, amplitude: f32) -> Self {
        Self {
            pixel_count,
            color,
            frequency,
            amplitude,
            step: 0,
        }
    }

    /// Brightness of pixel `index`, clamped to 0.0..=1.0
    pub fn brightness_at(&self, index: usize) -> f32 {
        let position = index as f32 / self.pixel_count.max(1) as f32;
        let time = self.step as f32 / 100.0;
        let level = 0.5 + self.amplitude * (TAU * (position + time * self.frequency)).sin();
        level.clamp(0.0, 1.0)
    }
}

impl PatternSource for WavePattern {
    fn generate_frame(&self) -> Frame {
        (0..self.pixel_count)
            .map(|i| self.color.scale(self.brightness_at(i)))
            .collect()
    }

    fn advance(&mut self) {
        self.step = self.step.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.step = 0;
    }

    fn name(&self) -> &str {
        "wave"
    }
}
