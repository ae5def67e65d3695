//! Media clock interface and a simulated clock implementation.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Playback notifications a media clock publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Play,
    Pause,
    /// The position jumped (user seek or programmatic reposition).
    Seeked,
}

/// A source of playback position, such as an audio element or a player
/// backend.
///
/// Positions are in seconds. Implementations publish [`ClockEvent`]s to
/// every subscriber.
pub trait MediaClock: Send + Sync {
    /// Current playback position in seconds.
    fn current_position(&self) -> f64;

    /// Move playback to `seconds`.
    fn seek_to(&self, seconds: f64);

    /// Whether the clock is currently advancing.
    fn is_playing(&self) -> bool;

    /// Subscribe to play/pause/seeked notifications.
    fn subscribe(&self) -> broadcast::Receiver<ClockEvent>;
}

#[derive(Debug)]
struct ClockState {
    /// Position at `anchor_instant`, in seconds
    anchor_position: f64,
    /// `None` while paused
    anchor_instant: Option<Instant>,
}

/// Clock that advances with [`tokio::time`], so it follows paused test time.
///
/// Position is the anchor plus time elapsed since the anchor while playing,
/// clamped to the optional track duration.
#[derive(Debug)]
pub struct SimulatedClock {
    state: Mutex<ClockState>,
    duration: Option<f64>,
    event_tx: broadcast::Sender<ClockEvent>,
}

impl SimulatedClock {
    #[must_use]
    pub fn new(duration: Option<f64>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(ClockState {
                anchor_position: 0.0,
                anchor_instant: None,
            }),
            duration,
            event_tx,
        }
    }

    /// Start advancing from the current position.
    pub fn play(&self) {
        {
            let mut state = self.lock();
            if state.anchor_instant.is_some() {
                return;
            }
            state.anchor_instant = Some(Instant::now());
        }
        let _ = self.event_tx.send(ClockEvent::Play);
    }

    /// Freeze at the current position.
    pub fn pause(&self) {
        {
            let mut state = self.lock();
            let Some(anchor) = state.anchor_instant.take() else {
                return;
            };
            state.anchor_position = self.clamp(state.anchor_position + anchor.elapsed().as_secs_f64());
        }
        let _ = self.event_tx.send(ClockEvent::Pause);
    }

    /// Whether the clock has reached the end of the track.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.duration
            .is_some_and(|duration| self.current_position() >= duration)
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clamp(&self, position: f64) -> f64 {
        let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MediaClock for SimulatedClock {
    fn current_position(&self) -> f64 {
        let state = self.lock();
        let elapsed = state
            .anchor_instant
            .map_or(0.0, |anchor| anchor.elapsed().as_secs_f64());
        self.clamp(state.anchor_position + elapsed)
    }

    fn seek_to(&self, seconds: f64) {
        {
            let mut state = self.lock();
            state.anchor_position = self.clamp(seconds);
            if state.anchor_instant.is_some() {
                state.anchor_instant = Some(Instant::now());
            }
        }
        let _ = self.event_tx.send(ClockEvent::Seeked);
    }

    fn is_playing(&self) -> bool {
        self.lock().anchor_instant.is_some()
    }

    fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.event_tx.subscribe()
    }
}
