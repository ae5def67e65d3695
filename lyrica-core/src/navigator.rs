//! Random access over a timeline: lookups by time or text, and clock
//! repositioning relative to the tracker's cursor.
//!
//! Every operation works on lyric lines, so karaoke boundary markers are
//! never returned as hits. Misses and out-of-range requests return `None`
//! and leave the cursor and clock untouched.

use crate::clock::MediaClock;
use crate::time::Timestamp;
use crate::timeline::Timeline;
use crate::tracker::PlaybackTracker;
use serde::Serialize;
use tracing::debug;

const LOG_TARGET: &str = "lyrica::navigator";

/// A lyric line with its display text, start time and line index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LyricHit {
    pub text: String,
    pub time: Timestamp,
    pub index: usize,
}

/// A time given either in milliseconds or as `mm:ss.ff` text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeQuery {
    Millis(u64),
    Text(String),
}

impl TimeQuery {
    /// Decode the query; malformed text yields `None`.
    #[must_use]
    pub fn resolve(&self) -> Option<Timestamp> {
        match self {
            Self::Millis(ms) => Some(Timestamp::from_millis(*ms)),
            Self::Text(text) => match text.parse() {
                Ok(ts) => Some(ts),
                Err(e) => {
                    debug!(target: LOG_TARGET, "Ignoring time query: {}", e);
                    None
                }
            },
        }
    }
}

impl From<u64> for TimeQuery {
    fn from(ms: u64) -> Self {
        Self::Millis(ms)
    }
}

impl From<Timestamp> for TimeQuery {
    fn from(ts: Timestamp) -> Self {
        Self::Millis(ts.as_millis())
    }
}

impl From<&str> for TimeQuery {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Target of [`PlaybackTracker::go_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoTo {
    /// The line active at this time.
    Time(TimeQuery),
    /// The `occurrence`-th line (0-based) whose text matches exactly.
    Lyric { text: String, occurrence: usize },
    /// A line index.
    Index(usize),
}

impl Timeline {
    fn hit(&self, line: usize) -> Option<LyricHit> {
        Some(LyricHit {
            text: self.lyric(line)?.display_text().into_owned(),
            time: self.line_time(line)?,
            index: line,
        })
    }

    /// Find the lyric for a time.
    ///
    /// With `exact`, only a line starting exactly at `time` matches.
    /// Otherwise the line with the greatest start time not after `time`
    /// is returned.
    pub fn search_by_time(&self, time: impl Into<TimeQuery>, exact: bool) -> Option<LyricHit> {
        let time = time.into().resolve()?;
        let mut lines = 0..self.line_count();

        let line = if exact {
            lines.find(|&l| self.line_time(l) == Some(time))?
        } else {
            let exceeding = lines
                .find(|&l| self.line_time(l).is_some_and(|t| t > time))
                .unwrap_or(self.line_count());
            exceeding.checked_sub(1)?
        };

        self.hit(line)
    }

    /// Every line whose displayed text equals `text`, in timeline order.
    #[must_use]
    pub fn search_by_text(&self, text: &str) -> Vec<LyricHit> {
        self.lyrics()
            .iter()
            .enumerate()
            .filter(|(_, lyric)| lyric.display_text() == text)
            .filter_map(|(line, _)| self.hit(line))
            .collect()
    }
}

impl PlaybackTracker {
    /// The active lyric line, if any.
    #[must_use]
    pub fn current(&self) -> Option<LyricHit> {
        let current = self.cursor().current()?;
        self.timeline().hit(current.line)
    }

    /// Jump `distance` lines forward (at least one).
    pub fn next(&self, distance: usize, clock: &dyn MediaClock) -> Option<LyricHit> {
        let from = self.cursor().current().map_or(0, |c| c.line);
        let target = from.checked_add(distance.max(1))?;
        self.seek_to_line(target, clock)
    }

    /// Jump `distance` lines backward (at least one).
    pub fn previous(&self, distance: usize, clock: &dyn MediaClock) -> Option<LyricHit> {
        let from = self.cursor().current().map_or(0, |c| c.line);
        let target = from.checked_sub(distance.max(1))?;
        self.seek_to_line(target, clock)
    }

    /// Return to the previously active line.
    pub fn last(&self, clock: &dyn MediaClock) -> Option<LyricHit> {
        let last = self.cursor().last()?;
        self.seek_to_line(last.line, clock)
    }

    /// Jump to a time, a lyric text occurrence, or a line index.
    pub fn go_to(&self, target: &GoTo, clock: &dyn MediaClock) -> Option<LyricHit> {
        let timeline = self.timeline();
        let line = match target {
            GoTo::Time(query) => timeline.search_by_time(query.clone(), false)?.index,
            GoTo::Lyric { text, occurrence } => {
                timeline.search_by_text(text).get(*occurrence)?.index
            }
            GoTo::Index(index) => *index,
        };
        self.seek_to_line(line, clock)
    }

    fn seek_to_line(&self, line: usize, clock: &dyn MediaClock) -> Option<LyricHit> {
        let hit = self.timeline().hit(line)?;
        let position = self.clock_position_for(hit.time);
        debug!(
            target: LOG_TARGET,
            "Repositioning clock to {:.3}s for line {}", position, line
        );
        clock.seek_to(position);
        Some(hit)
    }

    /// Clock seconds that land just after `time` on the lyric axis.
    #[allow(clippy::cast_precision_loss)]
    fn clock_position_for(&self, time: Timestamp) -> f64 {
        let time_ms = i64::try_from(time.as_millis()).unwrap_or(i64::MAX);
        let bias_ms = i64::try_from(self.settings().seek_bias_ms).unwrap_or(0);
        let clock_ms = time_ms
            .saturating_sub(self.timeline().offset_ms())
            .saturating_add(bias_ms)
            .max(0);
        clock_ms as f64 / 1000.0
    }
}
