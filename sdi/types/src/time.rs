/*!
    Rational numbers and presentation timestamps.
*/

use std::fmt;

/**
    A rational number, used for timebases and frame rates.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /**
        Returns the value as a float, or zero for a zero denominator.
    */
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /**
        Returns the fraction in lowest terms with a positive denominator.
    */
    pub const fn reduced(self) -> Self {
        let (mut a, mut b) = (self.num.unsigned_abs(), self.den.unsigned_abs());
        while b != 0 {
            (a, b) = (b, a % b);
        }
        if a == 0 {
            return self;
        }
        let g = a as i32;
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g,
            den: sign * self.den / g,
        }
    }

    /**
        Returns the reciprocal (a frame duration becomes a frame rate).
    */
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// The pipeline's presentation clock: 90 kHz ticks.
pub const CLOCK_90KHZ: Rational = Rational::new(1, 90_000);

/**
    A presentation timestamp in ticks of [`CLOCK_90KHZ`].
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);

impl Pts {
    /// Ticks per second of the presentation clock.
    pub const TIME_SCALE: i64 = 90_000;

    /**
        Convert a duration expressed in `time_scale` units into 90 kHz ticks.

        Rounds towards zero, the way a driver reporting at a different scale
        would truncate.
    */
    pub fn rescale(value: i64, time_scale: i64) -> Self {
        if time_scale == Self::TIME_SCALE || time_scale == 0 {
            return Self(value);
        }
        let ticks = value as i128 * Self::TIME_SCALE as i128 / time_scale as i128;
        Self(ticks as i64)
    }

    /**
        Returns the timestamp in seconds.
    */
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / Self::TIME_SCALE as f64
    }
}
