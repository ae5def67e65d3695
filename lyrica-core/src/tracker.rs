//! Playback tracker: follows a media clock over a [`Timeline`].
//!
//! Each tick compares the clock against the last observed position. Small
//! movements are treated as continuous playback and advance the cursor by
//! at most one entry (O(1)); anything larger is a discontinuity (seek,
//! stall, drift after pause) and triggers a full resynchronization.

use crate::lrc::LyricText;
use crate::time::Timestamp;
use crate::timeline::{KaraokePosition, Timeline};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const LOG_TARGET: &str = "lyrica::tracker";

/// Default tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Default distance below which a tick counts as continuous playback.
pub const DEFAULT_INCREMENTAL_THRESHOLD_MS: u64 = 70;

/// Default forward bias applied when the navigator repositions the clock.
pub const DEFAULT_SEEK_BIAS_MS: u64 = 200;

/// Tunable tracker timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub tick_interval: Duration,
    pub incremental_threshold_ms: u64,
    pub seek_bias_ms: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            incremental_threshold_ms: DEFAULT_INCREMENTAL_THRESHOLD_MS,
            seek_bias_ms: DEFAULT_SEEK_BIAS_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No clock attached.
    Idle,
    /// Clock attached but not playing; ticks are ignored.
    Paused,
    /// Clock attached and playing.
    Tracking,
}

/// How an [`ActiveChange`] was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Continuous playback crossed the next entry.
    Advance,
    /// Full rescan after a discontinuity or explicit seek.
    Resync,
}

/// A lyric line identified by index and start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LyricRef {
    pub line: usize,
    pub time: Timestamp,
}

/// Notification for the renderer: a new entry became active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveChange {
    pub line: usize,
    /// Active sub-segment in tracked karaoke mode.
    pub sub: Option<usize>,
    /// Index into [`Timeline::times`].
    pub flat_index: usize,
    pub time: Timestamp,
    pub lyric: LyricText,
    pub kind: ChangeKind,
}

/// Result of a tick that changed what is displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerUpdate {
    Active(ActiveChange),
    /// The clock moved before the first lyric; nothing is active anymore.
    Cleared,
}

/// Mutable tracking state for one timeline.
#[derive(Debug, Clone, Default)]
pub struct PlaybackCursor {
    /// Flat index of the entry emitted most recently.
    pub(crate) active: Option<usize>,
    /// Flat index of the next entry continuous playback will reach.
    pub(crate) next: usize,
    pub(crate) current: Option<LyricRef>,
    /// Line that was active before `current`.
    pub(crate) last: Option<LyricRef>,
    pub(crate) last_observed_ms: i64,
}

impl PlaybackCursor {
    fn for_timeline(timeline: &Timeline) -> Self {
        let mut cursor = Self::default();
        // A lyric at 0:00 is showing before playback starts
        if timeline.line_time(0) == Some(Timestamp::ZERO) {
            cursor.active = Some(0);
            cursor.current = Some(LyricRef {
                line: 0,
                time: Timestamp::ZERO,
            });
        }
        cursor
    }

    #[must_use]
    pub const fn active_index(&self) -> Option<usize> {
        self.active
    }

    #[must_use]
    pub const fn current(&self) -> Option<LyricRef> {
        self.current
    }

    #[must_use]
    pub const fn last(&self) -> Option<LyricRef> {
        self.last
    }
}

/// Tick-driven tracker owning the cursor for one [`Timeline`].
#[derive(Debug)]
pub struct PlaybackTracker {
    timeline: Arc<Timeline>,
    cursor: PlaybackCursor,
    state: TrackerState,
    settings: TrackerSettings,
}

impl PlaybackTracker {
    #[must_use]
    pub fn new(timeline: Arc<Timeline>, settings: TrackerSettings) -> Self {
        let cursor = PlaybackCursor::for_timeline(&timeline);
        Self {
            timeline,
            cursor,
            state: TrackerState::Idle,
            settings,
        }
    }

    #[must_use]
    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    #[must_use]
    pub const fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    #[must_use]
    pub const fn state(&self) -> TrackerState {
        self.state
    }

    #[must_use]
    pub const fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Clock attached; start in `Paused` or `Tracking` depending on the clock.
    pub fn attach(&mut self, playing: bool) {
        info!(target: LOG_TARGET, "Tracker attached (playing: {})", playing);
        self.state = if playing {
            TrackerState::Tracking
        } else {
            TrackerState::Paused
        };
    }

    /// Clock detached; the cursor is discarded.
    pub fn detach(&mut self) {
        info!(target: LOG_TARGET, "Tracker detached");
        self.state = TrackerState::Idle;
        self.cursor = PlaybackCursor::for_timeline(&self.timeline);
    }

    pub fn play(&mut self) {
        if self.state != TrackerState::Idle {
            self.state = TrackerState::Tracking;
        }
    }

    pub fn pause(&mut self) {
        if self.state != TrackerState::Idle {
            self.state = TrackerState::Paused;
        }
    }

    /// One tick at clock position `position_secs`.
    pub fn tick(&mut self, position_secs: f64) -> Option<TrackerUpdate> {
        if self.state != TrackerState::Tracking || self.timeline.is_empty() {
            return None;
        }

        let now = self.lyric_time_ms(position_secs);
        let distance = now.abs_diff(self.cursor.last_observed_ms);

        if distance < self.settings.incremental_threshold_ms {
            self.cursor.last_observed_ms = now;
            let next = self.cursor.next;
            let due = self
                .timeline
                .times()
                .get(next)
                .is_some_and(|t| time_ms(*t) <= now);
            due.then(|| TrackerUpdate::Active(self.emit(next, ChangeKind::Advance)))
        } else {
            debug!(
                target: LOG_TARGET,
                "Discontinuity of {} ms, rescanning at {} ms", distance, now
            );
            self.rescan_at_ms(now)
        }
    }

    /// Full resynchronization at `position_secs`, regardless of distance.
    /// Used for `seeked` notifications and navigator repositioning.
    pub fn rescan(&mut self, position_secs: f64) -> Option<TrackerUpdate> {
        if self.state == TrackerState::Idle || self.timeline.is_empty() {
            return None;
        }
        let now = self.lyric_time_ms(position_secs);
        self.rescan_at_ms(now)
    }

    /// Clock seconds mapped onto the lyric time axis.
    #[allow(clippy::cast_possible_truncation)]
    fn lyric_time_ms(&self, position_secs: f64) -> i64 {
        let clock_ms = if position_secs.is_finite() {
            (position_secs * 1000.0).round() as i64
        } else {
            0
        };
        clock_ms.saturating_add(self.timeline.offset_ms())
    }

    fn rescan_at_ms(&mut self, now: i64) -> Option<TrackerUpdate> {
        self.cursor.last_observed_ms = now;

        let reached = self
            .timeline
            .times()
            .partition_point(|t| time_ms(*t) <= now);

        if let Some(index) = reached.checked_sub(1) {
            // Already emitted and still showing
            if self.cursor.active == Some(index) && self.cursor.next == index + 1 {
                return None;
            }
            return Some(TrackerUpdate::Active(self.emit(index, ChangeKind::Resync)));
        }

        self.cursor.next = 0;
        let was_active = self.cursor.active.take().is_some();
        if let Some(current) = self.cursor.current.take() {
            self.cursor.last = Some(current);
        }
        was_active.then_some(TrackerUpdate::Cleared)
    }

    fn emit(&mut self, flat_index: usize, kind: ChangeKind) -> ActiveChange {
        let hint = self.cursor.current.map_or(0, |c| c.line);
        let KaraokePosition { line, sub } = self
            .timeline
            .karaoke_match_index_from(flat_index, hint)
            .unwrap_or(KaraokePosition {
                line: flat_index,
                sub: None,
            });
        let line_time = self.timeline.line_time(line).unwrap_or_default();

        let entered = LyricRef {
            line,
            time: line_time,
        };
        if self.cursor.current != Some(entered) {
            self.cursor.last = self.cursor.current.replace(entered);
        }
        self.cursor.active = Some(flat_index);
        self.cursor.next = flat_index + 1;

        ActiveChange {
            line,
            sub,
            flat_index,
            time: self.timeline.times()[flat_index],
            lyric: self
                .timeline
                .lyric(line)
                .cloned()
                .unwrap_or_else(|| LyricText::from("")),
            kind,
        }
    }
}

fn time_ms(time: Timestamp) -> i64 {
    i64::try_from(time.as_millis()).unwrap_or(i64::MAX)
}
