//! Core data types for scriptfilter
//!
//! - [`Rational`] - a `num/den` time base, converted to seconds the way a
//!   rational-to-double conversion does (`num as f64 / den as f64`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rational number, used as a stream time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Value as a double. A zero denominator yields NaN or an infinity.
    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Convert a timestamp in this time base to seconds.
    ///
    /// A missing timestamp maps to NaN.
    pub fn to_seconds(self, ts: Option<i64>) -> f64 {
        match ts {
            Some(ts) => ts as f64 * self.as_f64(),
            None => f64::NAN,
        }
    }

    /// Time base for a constant frame rate (`1/fps`), clamped to
    /// `1..=i32::MAX`.
    pub fn from_fps(fps: u32) -> Self {
        Self::new(1, i32::try_from(fps.max(1)).unwrap_or(i32::MAX))
    }

    pub fn is_valid(self) -> bool {
        self.den != 0
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
