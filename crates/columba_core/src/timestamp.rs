//! Timestamp representation and millisecond marshaling.
//!
//! Timestamps are stored as whole seconds plus a nanosecond part. Callers
//! outside the engine speak signed milliseconds since the epoch.

use crate::error::{CoreError, CoreResult};
use std::fmt;

const NANOS_PER_SECOND: i32 = 1_000_000_000;
const NANOS_PER_MILLI: i32 = 1_000_000;

/// A point in time as `(seconds, nanoseconds)` since the Unix epoch.
///
/// Both parts carry the same sign, and the nanosecond part is strictly
/// less than one second in magnitude. `-1.5s` is `(-1, -500_000_000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    seconds: i64,
    nanoseconds: i32,
}

impl Timestamp {
    /// Creates a timestamp, validating the sign and range rules.
    ///
    /// # Errors
    ///
    /// Fails with `IllegalArgument` if `|nanoseconds| >= 1e9` or the two
    /// parts have opposite signs.
    pub fn new(seconds: i64, nanoseconds: i32) -> CoreResult<Self> {
        if nanoseconds <= -NANOS_PER_SECOND || nanoseconds >= NANOS_PER_SECOND {
            return Err(CoreError::illegal_argument(format!(
                "nanoseconds {nanoseconds} out of range for a timestamp"
            )));
        }
        if (seconds > 0 && nanoseconds < 0) || (seconds < 0 && nanoseconds > 0) {
            return Err(CoreError::illegal_argument(format!(
                "timestamp parts must share a sign, got {seconds}s and {nanoseconds}ns"
            )));
        }
        Ok(Self {
            seconds,
            nanoseconds,
        })
    }

    /// Whole seconds since the epoch.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.seconds
    }

    /// Sub-second part in nanoseconds.
    #[must_use]
    pub const fn nanoseconds(self) -> i32 {
        self.nanoseconds
    }

    /// Converts boundary milliseconds into a timestamp.
    ///
    /// Division truncates toward zero, so negative inputs produce negative
    /// nanosecond parts and the sign rule always holds.
    #[must_use]
    pub const fn from_milliseconds(milliseconds: i64) -> Self {
        let seconds = milliseconds / 1000;
        let nanoseconds = (milliseconds % 1000) as i32 * NANOS_PER_MILLI;
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Converts into boundary milliseconds.
    ///
    /// Sub-millisecond precision is truncated. The multiplication is not
    /// range checked; seconds beyond `i64::MAX / 1000` wrap.
    #[must_use]
    pub const fn to_milliseconds(self) -> i64 {
        self.seconds
            .wrapping_mul(1000)
            .wrapping_add((self.nanoseconds / NANOS_PER_MILLI) as i64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds == 0 && self.nanoseconds < 0 {
            write!(f, "-0.{:09}s", self.nanoseconds.unsigned_abs())
        } else {
            write!(f, "{}.{:09}s", self.seconds, self.nanoseconds.unsigned_abs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn positive_millis() {
        let ts = Timestamp::from_milliseconds(1_500);
        assert_eq!(ts.seconds(), 1);
        assert_eq!(ts.nanoseconds(), 500_000_000);
        assert_eq!(ts.to_milliseconds(), 1_500);
    }

    #[test]
    fn negative_millis_keep_sign() {
        let ts = Timestamp::from_milliseconds(-1_500);
        assert_eq!(ts.seconds(), -1);
        assert_eq!(ts.nanoseconds(), -500_000_000);
        assert_eq!(ts.to_milliseconds(), -1_500);
        assert_eq!(Timestamp::from_milliseconds(-1).to_string(), "-0.001000000s");
    }

    #[test]
    fn sub_millisecond_precision_truncates() {
        let ts = Timestamp::new(2, 999_999).unwrap();
        assert_eq!(ts.to_milliseconds(), 2_000);
        let ts = Timestamp::new(-2, -999_999).unwrap();
        assert_eq!(ts.to_milliseconds(), -2_000);
    }

    #[test]
    fn validation() {
        assert!(Timestamp::new(1, -1).is_err());
        assert!(Timestamp::new(-1, 1).is_err());
        assert!(Timestamp::new(0, 1_000_000_000).is_err());
        assert!(Timestamp::new(0, -5).is_ok());
        assert!(Timestamp::new(i64::MIN, -999_999_999).is_ok());
    }

    #[test]
    fn overflow_wraps_instead_of_panicking() {
        let ts = Timestamp::new(i64::MAX, 0).unwrap();
        assert_eq!(ts.to_milliseconds(), i64::MAX.wrapping_mul(1000));
    }

    #[test]
    fn ordering_follows_time() {
        let earlier = Timestamp::from_milliseconds(-10);
        let later = Timestamp::from_milliseconds(10);
        assert!(earlier < later);
    }

    proptest! {
        #[test]
        fn millisecond_round_trip(ms in any::<i64>()) {
            prop_assert_eq!(Timestamp::from_milliseconds(ms).to_milliseconds(), ms);
        }

        #[test]
        fn from_milliseconds_is_always_well_formed(ms in any::<i64>()) {
            let ts = Timestamp::from_milliseconds(ms);
            prop_assert!(Timestamp::new(ts.seconds(), ts.nanoseconds()).is_ok());
        }
    }
}
