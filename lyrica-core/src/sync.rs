//! Tokio host for a [`PlaybackTracker`].
//!
//! The engine owns the tracker behind a single lock so tick tasks, clock
//! notifications and navigator calls never interleave. While attached, a
//! listener task follows the clock's play/pause/seeked events and runs at
//! most one tick task at a time.

use crate::clock::{ClockEvent, MediaClock};
use crate::navigator::{GoTo, LyricHit, TimeQuery};
use crate::timeline::{Timeline, TimelineData};
use crate::tracker::{ActiveChange, PlaybackTracker, TrackerSettings, TrackerState, TrackerUpdate};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lyrica::sync";

/// Events emitted by the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A clock was attached
    Attached,
    /// The clock was detached; nothing fires until the next attach
    Detached,
    /// A new lyric (or karaoke sub-segment) became active
    ActiveChanged(ActiveChange),
    /// Playback moved before the first lyric
    Cleared,
    /// A new timeline replaced the previous one
    TimelineReplaced { lines: usize },
}

/// Listener task and the token that stops it and its tick task.
#[derive(Debug)]
struct Session {
    cancel_token: CancellationToken,
    listener: JoinHandle<()>,
}

impl Session {
    fn stop(self) {
        self.cancel_token.cancel();
        self.listener.abort();
    }
}

/// Engine that keeps a tracker in step with a media clock
pub struct SyncEngine {
    clock: Arc<dyn MediaClock>,
    tracker: Mutex<PlaybackTracker>,
    tick_interval: Duration,
    /// Held for the whole of attach, detach and timeline replacement
    control: Mutex<()>,
    session: StdMutex<Option<Session>>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a detached engine for `timeline`
    #[must_use]
    pub fn new(
        clock: Arc<dyn MediaClock>,
        timeline: Arc<Timeline>,
        settings: TrackerSettings,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);

        Arc::new(Self {
            clock,
            tick_interval: settings.tick_interval,
            tracker: Mutex::new(PlaybackTracker::new(timeline, settings)),
            control: Mutex::new(()),
            session: StdMutex::new(None),
            event_tx,
        })
    }

    /// Subscribe to sync events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn MediaClock> {
        &self.clock
    }

    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.lock_session().is_some()
    }

    pub async fn state(&self) -> TrackerState {
        self.tracker.lock().await.state()
    }

    pub async fn timeline(&self) -> Arc<Timeline> {
        Arc::clone(self.tracker.lock().await.timeline())
    }

    /// Start following the clock. Replaces any existing session.
    pub async fn attach(self: &Arc<Self>) {
        let _control = self.control.lock().await;
        self.attach_session().await;
    }

    async fn attach_session(self: &Arc<Self>) {
        self.detach_session().await;

        // Subscribe before reading the clock so no notification is lost
        let events = self.clock.subscribe();
        let cancel_token = CancellationToken::new();
        {
            let mut tracker = self.tracker.lock().await;
            tracker.attach(self.clock.is_playing());
            let _ = self.event_tx.send(SyncEvent::Attached);
            let update = tracker.rescan(self.clock.current_position());
            self.publish(update);
        }

        let listener = tokio::spawn(listen(Arc::downgrade(self), events, cancel_token.clone()));

        let replaced = self.lock_session().replace(Session {
            cancel_token,
            listener,
        });
        if let Some(session) = replaced {
            warn!(target: LOG_TARGET, "Stopping a session that was still running");
            session.stop();
        }
    }

    /// Stop following the clock and discard the cursor.
    ///
    /// The listener and tick tasks are cancelled before the tracker is
    /// reset, so no change is emitted after this returns.
    pub async fn detach(&self) {
        let _control = self.control.lock().await;
        self.detach_session().await;
    }

    async fn detach_session(&self) {
        let Some(session) = self.lock_session().take() else {
            return;
        };
        session.stop();

        self.tracker.lock().await.detach();
        let _ = self.event_tx.send(SyncEvent::Detached);
    }

    /// Swap in a new timeline. A running session is restarted on it.
    pub async fn replace_timeline(self: &Arc<Self>, timeline: Arc<Timeline>) {
        let _control = self.control.lock().await;
        let was_attached = self.is_attached();
        self.detach_session().await;

        let lines = timeline.line_count();
        {
            let mut tracker = self.tracker.lock().await;
            let settings = *tracker.settings();
            *tracker = PlaybackTracker::new(timeline, settings);
        }
        info!(target: LOG_TARGET, "Timeline replaced ({} lines)", lines);
        let _ = self.event_tx.send(SyncEvent::TimelineReplaced { lines });

        if was_attached {
            self.attach_session().await;
        }
    }

    /// Bulk snapshot of the current timeline, serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub async fn data_json(&self) -> crate::error::Result<String> {
        let timeline = self.timeline().await;
        let data: TimelineData<'_> = timeline.data();
        Ok(serde_json::to_string(&data)?)
    }

    /// The active lyric line
    pub async fn current(&self) -> Option<LyricHit> {
        self.tracker.lock().await.current()
    }

    pub async fn search_by_time(&self, time: impl Into<TimeQuery>, exact: bool) -> Option<LyricHit> {
        let query = time.into();
        self.timeline().await.search_by_time(query, exact)
    }

    pub async fn search_by_text(&self, text: &str) -> Vec<LyricHit> {
        self.timeline().await.search_by_text(text)
    }

    /// Jump `distance` lines forward
    pub async fn next(&self, distance: usize) -> Option<LyricHit> {
        self.navigate(|tracker, clock| tracker.next(distance, clock))
            .await
    }

    /// Jump `distance` lines backward
    pub async fn previous(&self, distance: usize) -> Option<LyricHit> {
        self.navigate(|tracker, clock| tracker.previous(distance, clock))
            .await
    }

    /// Return to the previously active line
    pub async fn last(&self) -> Option<LyricHit> {
        self.navigate(PlaybackTracker::last).await
    }

    pub async fn go_to(&self, target: &GoTo) -> Option<LyricHit> {
        self.navigate(|tracker, clock| tracker.go_to(target, clock))
            .await
    }

    /// Run a repositioning query and resynchronize right away rather than
    /// waiting for the seeked notification.
    async fn navigate<F>(&self, op: F) -> Option<LyricHit>
    where
        F: FnOnce(&PlaybackTracker, &dyn MediaClock) -> Option<LyricHit>,
    {
        let mut tracker = self.tracker.lock().await;
        let hit = op(&*tracker, self.clock.as_ref())?;
        let update = tracker.rescan(self.clock.current_position());
        self.publish(update);
        Some(hit)
    }

    async fn resync(&self) {
        let mut tracker = self.tracker.lock().await;
        let update = tracker.rescan(self.clock.current_position());
        self.publish(update);
    }

    /// One tick; returns false once `cancel_token` has fired.
    async fn tick(&self, cancel_token: &CancellationToken) -> bool {
        let mut tracker = self.tracker.lock().await;
        // Detach may have won the race for the lock
        if cancel_token.is_cancelled() {
            return false;
        }
        let update = tracker.tick(self.clock.current_position());
        self.publish(update);
        true
    }

    fn publish(&self, update: Option<TrackerUpdate>) {
        let event = match update {
            Some(TrackerUpdate::Active(change)) => SyncEvent::ActiveChanged(change),
            Some(TrackerUpdate::Cleared) => SyncEvent::Cleared,
            None => return,
        };
        let _ = self.event_tx.send(event);
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Follow clock notifications until cancelled or the engine is dropped.
async fn listen(
    engine: Weak<SyncEngine>,
    mut events: broadcast::Receiver<ClockEvent>,
    cancel_token: CancellationToken,
) {
    info!(target: LOG_TARGET, "Clock listener started");

    let mut ticker: Option<CancellationToken> = None;
    if engine.upgrade().is_some_and(|e| e.clock.is_playing()) {
        ticker = Some(spawn_ticker(&engine, &cancel_token));
    }

    loop {
        let event = tokio::select! {
            biased;
            () = cancel_token.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(strong) = engine.upgrade() else {
            break;
        };

        match event {
            Ok(ClockEvent::Play) => {
                strong.tracker.lock().await.play();
                if ticker.is_none() {
                    ticker = Some(spawn_ticker(&engine, &cancel_token));
                }
            }
            Ok(ClockEvent::Pause) => {
                if let Some(token) = ticker.take() {
                    token.cancel();
                }
                strong.tracker.lock().await.pause();
            }
            Ok(ClockEvent::Seeked) => strong.resync().await,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(target: LOG_TARGET, "Missed {} clock event(s), resynchronizing", skipped);
                // A missed play or pause leaves the tick task out of step
                if strong.clock.is_playing() {
                    strong.tracker.lock().await.play();
                    if ticker.is_none() {
                        ticker = Some(spawn_ticker(&engine, &cancel_token));
                    }
                } else {
                    if let Some(token) = ticker.take() {
                        token.cancel();
                    }
                    strong.tracker.lock().await.pause();
                }
                strong.resync().await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(target: LOG_TARGET, "Clock event channel closed");
                break;
            }
        }
    }

    if let Some(token) = ticker {
        token.cancel();
    }
    info!(target: LOG_TARGET, "Clock listener stopped");
}

/// Spawn the tick task. It stops when the returned token or the session
/// token is cancelled.
fn spawn_ticker(engine: &Weak<SyncEngine>, session_token: &CancellationToken) -> CancellationToken {
    let token = session_token.child_token();
    tokio::spawn(run_ticker(engine.clone(), token.clone()));
    token
}

async fn run_ticker(engine: Weak<SyncEngine>, cancel_token: CancellationToken) {
    let Some(tick_interval) = engine.upgrade().map(|e| e.tick_interval()) else {
        return;
    };
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(target: LOG_TARGET, "Tick task started ({:?})", tick_interval);

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => break,
            _ = interval.tick() => {}
        }
        let Some(strong) = engine.upgrade() else {
            break;
        };
        if !strong.tick(&cancel_token).await {
            break;
        }
    }
    debug!(target: LOG_TARGET, "Tick task stopped");
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(session) = self.lock_session().take() {
            session.stop();
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::lrc::KaraokeMode;

    const ABCD: &str = "[00:00.00]a\n[00:01.00]b\n[00:02.00]c\n[00:03.00]d";

    fn engine(input: &str) -> (Arc<SimulatedClock>, Arc<SyncEngine>) {
        let clock = Arc::new(SimulatedClock::new(Some(10.0)));
        let timeline = Arc::new(Timeline::parse(input, KaraokeMode::Disabled, None));
        let engine = SyncEngine::new(clock.clone(), timeline, TrackerSettings::default());
        (clock, engine)
    }

    fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn active_texts(events: &[SyncEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::ActiveChanged(change) => {
                    Some(change.lyric.display_text().into_owned())
                }
                _ => None,
            })
            .collect()
    }

    /// Let spawned tasks observe the clock after advancing paused time.
    async fn run_for(duration: Duration) {
        let step = Duration::from_millis(10);
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            tokio::time::advance(step).await;
            tokio::task::yield_now().await;
            elapsed += step;
        }
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_emits_each_line_once() {
        let (clock, engine) = engine(ABCD);
        let mut rx = engine.subscribe();

        engine.attach().await;
        clock.play();
        run_for(Duration::from_millis(3_500)).await;

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&SyncEvent::Attached));
        assert_eq!(active_texts(&events), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_ticking() {
        let (clock, engine) = engine(ABCD);
        let mut rx = engine.subscribe();

        engine.attach().await;
        clock.play();
        run_for(Duration::from_millis(500)).await;
        clock.pause();
        run_for(Duration::from_millis(3_000)).await;

        assert_eq!(active_texts(&drain(&mut rx)), vec!["a"]);
        assert_eq!(engine.state().await, TrackerState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_resyncs_immediately() {
        let (clock, engine) = engine(ABCD);
        engine.attach().await;
        let mut rx = engine.subscribe();

        clock.seek_to(2.5);
        run_for(Duration::from_millis(20)).await;

        let events = drain(&mut rx);
        assert_eq!(active_texts(&events), vec!["c"]);
        assert_eq!(engine.current().await.map(|hit| hit.index), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_silences_engine() {
        let (clock, engine) = engine(ABCD);
        engine.attach().await;
        clock.play();
        run_for(Duration::from_millis(100)).await;

        engine.detach().await;
        assert!(!engine.is_attached());
        assert_eq!(engine.state().await, TrackerState::Idle);

        let mut rx = engine.subscribe();
        run_for(Duration::from_millis(3_000)).await;
        clock.seek_to(0.5);
        run_for(Duration::from_millis(20)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_seeks_and_rescans() {
        let (clock, engine) = engine(ABCD);
        engine.attach().await;
        let mut rx = engine.subscribe();

        let hit = engine.next(2).await.unwrap();
        assert_eq!(hit.text, "c");
        assert!((clock.current_position() - 2.2).abs() < 1e-6);
        assert_eq!(engine.current().await.map(|h| h.index), Some(2));

        assert_eq!(engine.next(5).await, None);
        let back = engine.last().await.unwrap();
        assert_eq!(back.index, 0);

        let events = drain(&mut rx);
        assert_eq!(active_texts(&events).first().map(String::as_str), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_timeline_restarts_session() {
        let (clock, engine) = engine(ABCD);
        engine.attach().await;
        let mut rx = engine.subscribe();

        let replacement = Arc::new(Timeline::parse(
            "[00:00.50]x\n[00:01.50]y",
            KaraokeMode::Disabled,
            None,
        ));
        engine.replace_timeline(replacement).await;
        assert!(engine.is_attached());

        clock.play();
        run_for(Duration::from_millis(1_600)).await;

        let events = drain(&mut rx);
        assert_eq!(events[0], SyncEvent::Detached);
        assert_eq!(events[1], SyncEvent::TimelineReplaced { lines: 2 });
        assert_eq!(events[2], SyncEvent::Attached);
        assert_eq!(active_texts(&events), vec!["x", "y"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_attach_leaves_no_listener() {
        let (_clock, engine) = engine(ABCD);

        // Both attaches queue up behind the held tracker lock
        let tracker = engine.tracker.lock().await;
        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.attach().await }
        });
        let second = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.attach().await }
        });
        run_for(Duration::from_millis(20)).await;
        drop(tracker);
        first.await.unwrap();
        second.await.unwrap();
        assert!(engine.is_attached());

        engine.detach().await;
        run_for(Duration::from_millis(20)).await;
        assert!(!engine.is_attached());
        assert_eq!(Arc::weak_count(&engine), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_play_is_recovered() {
        let (clock, engine) = engine(ABCD);
        engine.attach().await;
        run_for(Duration::from_millis(10)).await;
        let mut rx = engine.subscribe();

        // Overflow the clock channel so the play notification is dropped
        clock.play();
        for _ in 0..20 {
            clock.seek_to(0.0);
        }
        run_for(Duration::from_millis(2_100)).await;

        assert_eq!(engine.state().await, TrackerState::Tracking);
        let texts = active_texts(&drain(&mut rx));
        assert_eq!(texts.last().map(String::as_str), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_timeline_is_inert() {
        let (clock, engine) = engine("not lyrics at all");
        engine.attach().await;
        let mut rx = engine.subscribe();
        clock.play();
        run_for(Duration::from_millis(500)).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(engine.next(1).await, None);
        assert_eq!(engine.previous(1).await, None);
        assert_eq!(engine.last().await, None);
        assert_eq!(engine.go_to(&GoTo::Index(0)).await, None);
        assert_eq!(engine.current().await, None);
    }

    #[tokio::test]
    async fn test_data_json_snapshot() {
        let (_clock, engine) = engine("[ti:Song]\n[00:01.00]one");
        let json = engine.data_json().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lyrics"][0], "one");
        assert_eq!(value["times"][0], 1000);
        assert_eq!(value["metadata"]["ti"], "Song");
    }
}
