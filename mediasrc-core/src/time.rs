//! Rational frame rates and media timestamps

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

/// Frame rate as a rational `numerator / denominator` frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Frames
    pub numerator: u32,
    /// Per this many seconds
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Whole-number frame rate (`fps / 1`)
    pub const fn fps(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    /// Both terms must be non-zero
    pub fn is_valid(&self) -> bool {
        self.numerator != 0 && self.denominator != 0
    }

    /// Frame rate as a float, for display and logging
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of one frame, expressed in a timescale of `numerator` ticks per second
    pub fn frame_duration(&self) -> MediaTime {
        MediaTime::new(self.denominator as i64, self.numerator)
    }

    /// Presentation time of frame `index`
    pub fn frame_time(&self, index: u64) -> MediaTime {
        MediaTime::new(index as i64 * self.denominator as i64, self.numerator)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A timestamp of `value / timescale` seconds
///
/// Comparison and equality are exact across differing timescales.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "RawMediaTime")]
pub struct MediaTime {
    value: i64,
    timescale: u32,
}

/// Wire form; deserialized values go through [`MediaTime::new`]
#[derive(Deserialize)]
struct RawMediaTime {
    value: i64,
    timescale: u32,
}

impl From<RawMediaTime> for MediaTime {
    fn from(raw: RawMediaTime) -> Self {
        MediaTime::new(raw.value, raw.timescale)
    }
}

impl MediaTime {
    /// Zero seconds
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    /// Create a new timestamp. A zero timescale is treated as 1.
    pub fn new(value: i64, timescale: u32) -> Self {
        Self {
            value,
            timescale: timescale.max(1),
        }
    }

    /// Tick count
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Ticks per second; never zero
    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    /// Timestamp in seconds as a float
    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// Timestamp as a [`Duration`], saturating negative values to zero
    pub fn as_duration(&self) -> Duration {
        if self.value <= 0 {
            return Duration::ZERO;
        }
        let nanos = (self.value as i128 * 1_000_000_000) / self.timescale as i128;
        Duration::from_nanos(nanos.min(u64::MAX as i128) as u64)
    }

    /// Rescale into another timescale, rounding toward zero
    pub fn rescale(&self, timescale: u32) -> MediaTime {
        let timescale = timescale.max(1);
        let value = (self.value as i128 * timescale as i128) / self.timescale as i128;
        MediaTime::new(value as i64, timescale)
    }

    /// Exact sum of two timestamps. Shares the timescale when both agree.
    pub fn checked_add(&self, other: MediaTime) -> Option<MediaTime> {
        if self.timescale == other.timescale {
            return self
                .value
                .checked_add(other.value)
                .map(|v| MediaTime::new(v, self.timescale));
        }
        let timescale = self.timescale.checked_mul(other.timescale)?;
        let lhs = self.value.checked_mul(other.timescale as i64)?;
        let rhs = other.value.checked_mul(self.timescale as i64)?;
        lhs.checked_add(rhs).map(|v| MediaTime::new(v, timescale))
    }

    fn cross(&self, other: &MediaTime) -> (i128, i128) {
        (
            self.value as i128 * other.timescale as i128,
            other.value as i128 * self.timescale as i128,
        )
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(other);
        a == b
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.cross(other);
        a.cmp(&b)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}
