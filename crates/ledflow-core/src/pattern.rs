//! Pixel colors and the pattern capability driven by the frame scheduler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ControlError;

/// One RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const CYAN: Rgb = Rgb::new(0, 255, 255);
    pub const MAGENTA: Rgb = Rgb::new(255, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale brightness, `factor` is clamped to 0.0..=1.0
    pub fn scale(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let apply = |c: u8| (c as f32 * factor) as u8;
        Self::new(apply(self.r), apply(self.g), apply(self.b))
    }

    /// DMX channel values in R-G-B order
    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ControlError;

    /// Accepts a color name (`red`, `white`, ...) or `#rrggbb`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let named = match s.trim().to_ascii_lowercase().as_str() {
            "black" => Some(Rgb::BLACK),
            "white" => Some(Rgb::WHITE),
            "red" => Some(Rgb::RED),
            "green" => Some(Rgb::GREEN),
            "blue" => Some(Rgb::BLUE),
            "yellow" => Some(Rgb::YELLOW),
            "cyan" => Some(Rgb::CYAN),
            "magenta" => Some(Rgb::MAGENTA),
            _ => None,
        };
        if let Some(color) = named {
            return Ok(color);
        }

        let digits = s.trim().trim_start_matches('#');
        match hex::decode(digits).as_deref() {
            Ok([r, g, b]) => Ok(Rgb::new(*r, *g, *b)),
            _ => Err(ControlError::InvalidParameter(format!("Invalid color: {}", s))),
        }
    }
}

/// One complete set of pixel colors for all fixtures, in registration order
pub type Frame = Vec<Rgb>;

/// Flatten pixels into DMX channel values
pub fn pixels_to_channels(pixels: &[Rgb]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.channels()).collect()
}

/// A pixel pattern generator.
///
/// The scheduler calls [`generate_frame`](PatternSource::generate_frame) and then
/// [`advance`](PatternSource::advance) once per tick, always from the same task,
/// so implementations never see concurrent calls.
pub trait PatternSource {
    /// Produce the frame for the current step.
    ///
    /// Must not change state and must return exactly as many pixels as the
    /// pattern was constructed for.
    fn generate_frame(&self) -> Frame;

    /// Move to the next step
    fn advance(&mut self);

    /// Return to step 0, keeping parameters
    fn reset(&mut self);

    /// Name used in logs
    fn name(&self) -> &str {
        "pattern"
    }
}

impl<P: PatternSource + ?Sized> PatternSource for Box<P> {
    fn generate_frame(&self) -> Frame {
        (**self).generate_frame()
    }

    fn advance(&mut self) {
        (**self).advance()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_names() {
        assert_eq!("red".parse::<Rgb>().unwrap(), Rgb::RED);
        assert_eq!("Magenta".parse::<Rgb>().unwrap(), Rgb::MAGENTA);
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!("#ff8000".parse::<Rgb>().unwrap(), Rgb::new(255, 128, 0));
        assert_eq!("00ff7f".parse::<Rgb>().unwrap(), Rgb::new(0, 255, 127));
        assert!("#ff80".parse::<Rgb>().is_err());
        assert!("chartreuse".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let color = Rgb::new(18, 52, 86);
        assert_eq!(color.to_string(), "#123456");
        assert_eq!(color.to_string().parse::<Rgb>().unwrap(), color);
    }

    #[test]
    fn test_scale() {
        assert_eq!(Rgb::WHITE.scale(0.5), Rgb::new(127, 127, 127));
        assert_eq!(Rgb::RED.scale(2.0), Rgb::RED);
        assert_eq!(Rgb::RED.scale(-1.0), Rgb::BLACK);
    }

    #[test]
    fn test_pixels_to_channels() {
        let channels = pixels_to_channels(&[Rgb::RED, Rgb::BLUE]);
        assert_eq!(channels, vec![255, 0, 0, 0, 0, 255]);
    }
}
