//! Hue gradient across all pixels, drifting over time

use ledflow_core::{Frame, PatternSource, Rgb};
use palette::{FromColor, Hsv, Srgb};

pub struct RainbowPattern {
    pixel_count: usize,
    speed: f32,
    step: u64,
}

impl RainbowPattern {
    /// `speed` is how far the gradient shifts per step, in hundredths of the color wheel
    pub fn new(pixel_count: usize, speed: f32) -> Self {
        Self {
            pixel_count,
            speed,
            step: 0,
        }
    }

    /// Hue of pixel `index` at the current step, in 0.0..1.0 turns
    pub fn hue_at(&self, index: usize) -> f32 {
        let position = index as f32 / self.pixel_count.max(1) as f32;
        let drift = self.step as f32 * self.speed / 100.0;
        (position + drift).rem_euclid(1.0)
    }
}

fn hue_to_rgb(turns: f32) -> Rgb {
    let rgb = Srgb::from_color(Hsv::new(turns * 360.0, 1.0, 1.0));
    let channel = |c: f32| (c * 255.0).clamp(0.0, 255.0) as u8;
    Rgb::new(channel(rgb.red), channel(rgb.green), channel(rgb.blue))
}

impl PatternSource for RainbowPattern {
    fn generate_frame(&self) -> Frame {
        (0..self.pixel_count)
            .map(|i| hue_to_rgb(self.hue_at(i)))
            .collect()
    }

    fn advance(&mut self) {
        self.step = self.step.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.step = 0;
    }

    fn name(&self) -> &str {
        "rainbow"
    }
}
