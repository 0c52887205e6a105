//! LedFlow Patterns - built-in animations
//!
//! Every pattern implements [`ledflow_core::PatternSource`] and produces frames
//! of a fixed pixel count, chosen when it is created:
//!
//! ```rust
//! use ledflow_core::{PatternSource, Rgb};
//! use ledflow_patterns::{create_pattern, PatternKind, PatternOptions};
//!
//! let options = PatternOptions {
//!     color: Rgb::RED,
//!     ..PatternOptions::default()
//! };
//! let mut chase = create_pattern(PatternKind::Chase, 4, &options);
//! assert_eq!(chase.generate_frame()[0], Rgb::RED);
//!
//! chase.advance();
//! assert_eq!(chase.generate_frame()[1], Rgb::RED);
//! ```

use std::fmt;
use std::str::FromStr;

use ledflow_core::{PatternSource, Rgb};
use serde::{Deserialize, Serialize};

pub mod chase;
pub mod error;
pub mod rainbow;
pub mod solid;
pub mod wave;

pub use chase::ChasePattern;
pub use error::PatternError;
pub use rainbow::RainbowPattern;
pub use solid::{SolidPattern, StrobePattern};
pub use wave::WavePattern;

/// The built-in animations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Chase,
    Strobe,
    Rainbow,
    Wave,
    Solid,
}

impl PatternKind {
    pub const ALL: [PatternKind; 5] = [
        PatternKind::Chase,
        PatternKind::Strobe,
        PatternKind::Rainbow,
        PatternKind::Wave,
        PatternKind::Solid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PatternKind::Chase => "chase",
            PatternKind::Strobe => "strobe",
            PatternKind::Rainbow => "rainbow",
            PatternKind::Wave => "wave",
            PatternKind::Solid => "solid",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PatternKind {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        PatternKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| PatternError::UnknownPattern(s.to_string()))
    }
}

/// Parameters shared by the built-in patterns. Each pattern reads the ones it uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternOptions {
    pub color: Rgb,
    /// Rainbow hue drift, in hundredths of the wheel per step
    pub speed: f32,
    /// Wave periods travelled per 100 steps
    pub frequency: f32,
    /// Wave brightness swing around 0.5
    pub amplitude: f32,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            speed: 1.0,
            frequency: 1.0,
            amplitude: 0.5,
        }
    }
}

/// Build a pattern for `pixel_count` pixels
pub fn create_pattern(
    kind: PatternKind,
    pixel_count: usize,
    options: &PatternOptions,
) -> Box<dyn PatternSource + Send> {
    tracing::debug!("Creating {} pattern for {} pixels", kind, pixel_count);
    match kind {
        PatternKind::Chase => Box::new(ChasePattern::new(pixel_count, options.color)),
        PatternKind::Strobe => Box::new(StrobePattern::new(pixel_count, options.color)),
        PatternKind::Rainbow => Box::new(RainbowPattern::new(pixel_count, options.speed)),
        PatternKind::Wave => Box::new(WavePattern::new(
            pixel_count,
            options.color,
            options.frequency,
            options.amplitude,
        )),
        PatternKind::Solid => Box::new(SolidPattern::new(pixel_count, options.color)),
    }
}
