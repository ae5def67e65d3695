//! Timestamp codec and duration conversion utilities.
//!
//! LRC timestamps are written as `minutes:seconds.fraction` where the
//! fraction may have between one and five digits. Every width is
//! normalized to millisecond precision by right-padding or truncating the
//! fraction to exactly three digits, so `12.34` is 12 340 ms and `12.345`
//! is 12 345 ms.

use crate::error::CoreError;
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

/// Fraction widths accepted inside `[mm:ss.f]` line tags.
pub const LINE_TAG_FRACTION_DIGITS: RangeInclusive<usize> = 1..=5;

/// Fraction widths accepted inside `<mm:ss.f>` karaoke tags.
pub const WORD_TAG_FRACTION_DIGITS: RangeInclusive<usize> = 2..=3;

/// A non-negative offset into the track, in whole milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

/// Fraction width used when rendering a [`Timestamp`] as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Two digits (hundredths), the classic LRC form.
    Centis,
    /// Three digits (milliseconds).
    Millis,
}

impl Timestamp {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Position in seconds, as a media clock would report it.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Shift by a signed millisecond amount, saturating at zero.
    #[must_use]
    pub const fn shifted(self, delta_ms: i64) -> Self {
        if delta_ms >= 0 {
            Self(self.0.saturating_add(delta_ms.unsigned_abs()))
        } else {
            Self(self.0.saturating_sub(delta_ms.unsigned_abs()))
        }
    }

    /// Parse the inside of a timestamp tag (no brackets) with the given
    /// accepted fraction widths. Returns `None` when the text does not
    /// follow the `m+:ss.f+` grammar.
    #[must_use]
    pub fn parse_tag_body(body: &str, fraction_digits: &RangeInclusive<usize>) -> Option<Self> {
        let (minutes, rest) = body.split_once(':')?;
        let (seconds, fraction) = rest.split_once('.')?;

        if minutes.is_empty() || !all_digits(minutes) {
            return None;
        }
        if seconds.len() != 2 || !all_digits(seconds) {
            return None;
        }
        if !fraction_digits.contains(&fraction.len()) || !all_digits(fraction) {
            return None;
        }

        let minutes: u64 = minutes.parse().ok()?;
        let seconds: u64 = seconds.parse().ok()?;
        let millis = normalize_fraction(fraction)?;

        minutes
            .checked_mul(60_000)?
            .checked_add(seconds * 1000)?
            .checked_add(millis)
            .map(Self)
    }

    /// Render as `mm:ss.ff` or `mm:ss.fff`.
    #[must_use]
    pub fn format(self, precision: Precision) -> String {
        let minutes = self.0 / 60_000;
        let seconds = (self.0 / 1000) % 60;
        let millis = self.0 % 1000;
        match precision {
            Precision::Centis => format!("{minutes:02}:{seconds:02}.{:02}", millis / 10),
            Precision::Millis => format!("{minutes:02}:{seconds:02}.{millis:03}"),
        }
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .unwrap_or(trimmed);

        Self::parse_tag_body(body, &LINE_TAG_FRACTION_DIGITS).ok_or_else(|| {
            CoreError::TimestampParse {
                input: s.to_string(),
            }
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = if self.0 % 10 == 0 {
            Precision::Centis
        } else {
            Precision::Millis
        };
        f.write_str(&self.format(precision))
    }
}

impl From<Duration> for Timestamp {
    fn from(duration: Duration) -> Self {
        Self(duration.as_millis_u64())
    }
}

impl From<Timestamp> for Duration {
    fn from(ts: Timestamp) -> Self {
        Self::from_millis(ts.0)
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Pad or truncate a fraction to three digits and read it as milliseconds.
fn normalize_fraction(fraction: &str) -> Option<u64> {
    let mut digits: String = fraction.chars().take(3).collect();
    while digits.len() < 3 {
        digits.push('0');
    }
    digits.parse().ok()
}

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    ///
    /// In practice, this is always safe because durations exceeding `u64::MAX`
    /// milliseconds would represent ~584 million years.
    fn as_millis_u64(&self) -> u64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(body: &str) -> Option<u64> {
        Timestamp::parse_tag_body(body, &LINE_TAG_FRACTION_DIGITS).map(Timestamp::as_millis)
    }

    #[test]
    fn test_two_digit_fraction_is_hundredths() {
        assert_eq!(line("00:12.34"), Some(12_340));
        assert_eq!(line("01:02.05"), Some(62_050));
    }

    #[test]
    fn test_three_digit_fraction_is_millis() {
        assert_eq!(line("00:12.345"), Some(12_345));
        assert_eq!(line("00:00.007"), Some(7));
    }

    #[test]
    fn test_other_fraction_widths() {
        assert_eq!(line("00:01.5"), Some(1_500));
        assert_eq!(line("00:01.1234"), Some(1_123));
        assert_eq!(line("00:01.12345"), Some(1_123));
        assert_eq!(line("00:01.123456"), None);
    }

    #[test]
    fn test_minutes_width() {
        assert_eq!(line("3:00.00"), Some(180_000));
        assert_eq!(line("120:00.00"), Some(7_200_000));
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(line("00:1.00"), None);
        assert_eq!(line("00:12"), None);
        assert_eq!(line("ab:12.00"), None);
        assert_eq!(line(":12.00"), None);
        assert_eq!(line("00:12.x0"), None);
        assert_eq!(line("00:12.-1"), None);
    }

    #[test]
    fn test_word_tag_widths() {
        let word = |b: &str| Timestamp::parse_tag_body(b, &WORD_TAG_FRACTION_DIGITS);
        assert_eq!(word("00:01.50"), Some(Timestamp::from_millis(1_500)));
        assert_eq!(word("00:01.505"), Some(Timestamp::from_millis(1_505)));
        assert_eq!(word("00:01.5"), None);
    }

    #[test]
    fn test_from_str_accepts_brackets() {
        let ts: Timestamp = "[00:10.00]".parse().unwrap();
        assert_eq!(ts.as_millis(), 10_000);
        assert!("10 seconds".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_round_trip_both_widths() {
        for &(min, sec) in &[(0_u64, 0_u64), (1, 59), (12, 5), (99, 30)] {
            for frac in [0_u64, 7, 10, 99, 990] {
                let ms = min * 60_000 + sec * 1000 + frac;
                let ts = Timestamp::from_millis(ms);
                let text = ts.to_string();
                assert_eq!(text.parse::<Timestamp>().unwrap(), ts, "{text}");
            }
        }
    }

    #[test]
    fn test_format_precision() {
        let ts = Timestamp::from_millis(83_450);
        assert_eq!(ts.format(Precision::Centis), "01:23.45");
        assert_eq!(ts.format(Precision::Millis), "01:23.450");
        assert_eq!(Timestamp::from_millis(83_456).to_string(), "01:23.456");
    }

    #[test]
    fn test_shifted_saturates() {
        let ts = Timestamp::from_millis(300);
        assert_eq!(ts.shifted(200).as_millis(), 500);
        assert_eq!(ts.shifted(-500), Timestamp::ZERO);
    }

    #[test]
    fn test_as_millis_u64() {
        let duration = Duration::from_millis(1234);
        assert_eq!(duration.as_millis_u64(), 1234);
    }
}
