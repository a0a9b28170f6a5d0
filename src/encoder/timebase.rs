use serde::{Deserialize, Serialize};

/// A rational time unit, `num / den` seconds per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// One tick per frame at `frame_rate` fps.
    pub const fn from_frame_rate(frame_rate: u32) -> Self {
        Self {
            num: 1,
            den: frame_rate as i32,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Converts `ts` from this time base into `to`.
    pub fn rescale_to(&self, ts: i64, to: TimeBase) -> i64 {
        rescale(ts, *self, to)
    }
}

impl std::fmt::Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Rescales a timestamp between time bases, rounding half away from zero.
///
/// `ts * from / to` evaluated in 128-bit so large timestamps never overflow.
/// Results outside `i64` saturate.
pub fn rescale(ts: i64, from: TimeBase, to: TimeBase) -> i64 {
    if from == to {
        return ts;
    }
    let num = ts as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    if den == 0 {
        return ts;
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };

    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };

    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
