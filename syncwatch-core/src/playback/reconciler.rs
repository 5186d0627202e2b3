use std::time::Instant;

use chrono::{DateTime, Utc};
use log::debug;

use crate::{Config, PlaybackCommand, SessionId, SyncEvent, SyncEventKind};

/// A play, pause, or seek performed by the user of this client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalAction {
    Play,
    Pause,
    Seek(f32),
}

/// The per-client reconciliation state machine.
///
/// Consumes local intent and remote events, and decides what the local
/// media element should do. This type is pure state; publishing and store
/// writes live in [`RoomSession`](crate::RoomSession).
#[derive(Debug)]
pub struct Reconciler {
    config: Config,
    identity: SessionId,
    /// The engine's belief of the correct position, in seconds. Remote
    /// events overwrite it, local observation advances it.
    target_time: f32,
    is_playing: bool,
    /// Set once the first play happens, locally or remotely.
    has_started: bool,
    /// While in the future, drift checks are disarmed so a just-applied
    /// jump is not fought by the corrector.
    suppress_until: Option<Instant>,
    /// Ordering key of the newest remote event applied. Anything older
    /// loses, making conflicting peers resolve deterministically no matter
    /// the delivery order.
    last_applied: Option<(DateTime<Utc>, SessionId)>,
}

impl Reconciler {
    pub fn new(config: Config, identity: SessionId, playback_time: f32, is_playing: bool) -> Self {
        Self {
            config,
            identity,
            target_time: playback_time.max(0.0),
            is_playing,
            has_started: false,
            suppress_until: None,
            last_applied: None,
        }
    }

    pub fn target_time(&self) -> f32 {
        self.target_time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    /// Applies a user action optimistically and returns the event to
    /// broadcast. The user's own action is never delayed by the network.
    pub fn apply_local(
        &mut self,
        action: LocalAction,
        emitted_at: DateTime<Utc>,
        now: Instant,
    ) -> SyncEvent {
        let kind = match action {
            LocalAction::Play => {
                self.is_playing = true;
                self.has_started = true;
                SyncEventKind::Play
            }
            LocalAction::Pause => {
                self.is_playing = false;
                SyncEventKind::Pause
            }
            LocalAction::Seek(position) => {
                self.target_time = position.max(0.0);
                // The element is about to jump to the new position
                self.suppress_until = Some(now + self.config.correction_guard);
                SyncEventKind::Seek
            }
        };

        SyncEvent {
            kind,
            time: self.target_time,
            sender_id: self.identity.clone(),
            emitted_at,
        }
    }

    /// Applies an event received from the channel. Returns the command the
    /// media element should execute, or `None` when the event is discarded.
    pub fn apply_remote(&mut self, event: &SyncEvent, now: Instant) -> Option<PlaybackCommand> {
        // A client must never react to its own broadcast coming back.
        if event.sender_id == self.identity {
            return None;
        }

        // Near-simultaneous conflicting peers resolve by highest
        // (emitted_at, sender). Equal keys re-apply, which is idempotent.
        let key = (event.emitted_at, event.sender_id.clone());

        if let Some(last) = &self.last_applied {
            if key < *last {
                debug!("discarding outdated event from {}", event.sender_id);
                return None;
            }
        }

        self.last_applied = Some(key);

        let command = match event.kind {
            SyncEventKind::Play => {
                self.is_playing = true;
                self.has_started = true;
                self.target_time = event.time.max(0.0);

                PlaybackCommand::Play {
                    position: self.target_time,
                }
            }
            SyncEventKind::Pause => {
                // Pause does not imply a position correction by itself
                self.is_playing = false;

                PlaybackCommand::Pause
            }
            SyncEventKind::Seek => {
                // Explicit peer intent wins outright, no threshold gate
                self.target_time = event.time.max(0.0);

                PlaybackCommand::Seek {
                    position: self.target_time,
                }
            }
        };

        if event.kind != SyncEventKind::Pause {
            // The element is about to jump; the next observation must not
            // read that jump as drift.
            self.suppress_until = Some(now + self.config.correction_guard);
        }

        Some(command)
    }

    /// Feeds an observed media position into the engine. While playing,
    /// returns the position to force the element back to when it silently
    /// drifted past the threshold, arming the re-entrancy guard.
    pub fn observe(&mut self, position: f32, now: Instant) -> Option<f32> {
        if !self.is_playing {
            self.target_time = position.max(0.0);
            return None;
        }

        if self.is_suppressed(now) {
            return None;
        }

        let drift = (position - self.target_time).abs();

        if drift > self.config.drift_threshold {
            self.suppress_until = Some(now + self.config.correction_guard);
            return Some(self.target_time);
        }

        self.target_time = position.max(0.0);
        None
    }

    fn is_suppressed(&self, now: Instant) -> bool {
        self.suppress_until.map_or(false, |until| now < until)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    fn reconciler(identity: &str) -> Reconciler {
        Reconciler::new(Config::default(), SessionId::from(identity), 0.0, false)
    }

    fn event(kind: SyncEventKind, time: f32, sender: &str, millis: i64) -> SyncEvent {
        SyncEvent {
            kind,
            time,
            sender_id: SessionId::from(sender),
            emitted_at: Utc.timestamp_millis_opt(millis).unwrap(),
        }
    }

    /// Moves past any armed guard window.
    fn later(engine: &Reconciler, now: Instant) -> Instant {
        now + engine.config.correction_guard
    }

    #[test]
    fn test_own_events_are_discarded() {
        let mut engine = reconciler("a");
        let now = Instant::now();

        let echo = event(SyncEventKind::Play, 12.5, "a", 1000);

        assert_eq!(engine.apply_remote(&echo, now), None);
        assert!(!engine.is_playing(), "own echo must not change state");
        assert_eq!(engine.target_time(), 0.0);
    }

    #[test]
    fn test_remote_play_wins_over_local_position() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        // Paused at 10 seconds
        engine.observe(10.0, now);
        assert_eq!(engine.target_time(), 10.0);

        let play = event(SyncEventKind::Play, 12.5, "a", 1000);
        let command = engine.apply_remote(&play, now);

        assert_eq!(command, Some(PlaybackCommand::Play { position: 12.5 }));
        assert!(engine.is_playing());
        assert!(engine.has_started());
        assert_eq!(engine.target_time(), 12.5, "peer position wins, not 10.0");
    }

    #[test]
    fn test_remote_pause_leaves_position_untouched() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        let play = event(SyncEventKind::Play, 30.0, "a", 1000);
        engine.apply_remote(&play, now);

        let pause = event(SyncEventKind::Pause, 99.0, "a", 2000);
        let command = engine.apply_remote(&pause, now);

        assert_eq!(command, Some(PlaybackCommand::Pause));
        assert!(!engine.is_playing());
        assert_eq!(engine.target_time(), 30.0, "pause must not move the position");
    }

    #[test]
    fn test_remote_seek_applies_while_paused() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        let seek = event(SyncEventKind::Seek, 55.0, "a", 1000);
        let command = engine.apply_remote(&seek, now);

        assert_eq!(command, Some(PlaybackCommand::Seek { position: 55.0 }));
        assert!(!engine.is_playing(), "seek does not change the flag");
        assert_eq!(engine.target_time(), 55.0);
    }

    #[test]
    fn test_duplicate_seek_is_idempotent() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        let seek = event(SyncEventKind::Seek, 55.0, "a", 1000);

        let first = engine.apply_remote(&seek, now);
        let time_after_first = engine.target_time();
        let second = engine.apply_remote(&seek, now);

        assert_eq!(first, second, "a duplicated event re-applies the same command");
        assert_eq!(engine.target_time(), time_after_first);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_outdated_event_loses() {
        let mut engine = reconciler("c");
        let now = Instant::now();

        let newer = event(SyncEventKind::Seek, 80.0, "a", 2000);
        let older = event(SyncEventKind::Pause, 10.0, "b", 1000);

        engine.apply_remote(&newer, now);
        let command = engine.apply_remote(&older, now);

        assert_eq!(command, None, "late delivery must not roll state back");
        assert_eq!(engine.target_time(), 80.0);
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_sender() {
        let mut engine = reconciler("c");
        let now = Instant::now();

        let from_b = event(SyncEventKind::Seek, 20.0, "b", 1000);
        let from_a = event(SyncEventKind::Seek, 40.0, "a", 1000);

        engine.apply_remote(&from_b, now);

        // "a" sorts below "b" at the same timestamp, so it loses
        assert_eq!(engine.apply_remote(&from_a, now), None);
        assert_eq!(engine.target_time(), 20.0);
    }

    #[test]
    fn test_drift_correction_beyond_threshold() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        let play = event(SyncEventKind::Play, 100.0, "a", 1000);
        engine.apply_remote(&play, now);

        // Past the guard window the element still lags behind the target
        let check = later(&engine, now);
        let correction = engine.observe(97.9, check);

        assert_eq!(correction, Some(100.0));
    }

    #[test]
    fn test_no_drift_correction_at_exact_threshold() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        let play = event(SyncEventKind::Play, 100.0, "a", 1000);
        engine.apply_remote(&play, now);

        let check = later(&engine, now);
        let correction = engine.observe(98.0, check);

        assert_eq!(correction, None, "the threshold comparison is strict");
    }

    #[test]
    fn test_correction_guard_blocks_back_to_back_corrections() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        let play = event(SyncEventKind::Play, 100.0, "a", 1000);
        engine.apply_remote(&play, now);

        let check = later(&engine, now);
        assert_eq!(engine.observe(50.0, check), Some(100.0));

        // Within the fresh guard the stale position is not fought again
        let inside_guard = check + Duration::from_millis(100);
        assert_eq!(engine.observe(50.0, inside_guard), None);

        // Once the guard expires and the element still lags, correct again
        let after_guard = later(&engine, check);
        assert_eq!(engine.observe(50.0, after_guard), Some(100.0));
    }

    #[test]
    fn test_observation_advances_target_while_playing() {
        let mut engine = reconciler("a");
        let now = Instant::now();

        engine.apply_local(LocalAction::Play, Utc::now(), now);

        assert_eq!(engine.observe(0.5, now), None);
        assert_eq!(engine.observe(1.0, now), None);
        assert_eq!(engine.target_time(), 1.0);
    }

    #[test]
    fn test_local_actions_build_events() {
        let mut engine = reconciler("a");
        let now = Instant::now();
        let at = Utc.timestamp_millis_opt(5000).unwrap();

        engine.observe(12.5, now);
        let play = engine.apply_local(LocalAction::Play, at, now);

        assert_eq!(play.kind, SyncEventKind::Play);
        assert_eq!(play.time, 12.5);
        assert_eq!(play.sender_id.as_str(), "a");
        assert_eq!(play.emitted_at, at);
        assert!(engine.is_playing());
        assert!(engine.has_started());

        let seek = engine.apply_local(LocalAction::Seek(42.0), at, now);
        assert_eq!(seek.kind, SyncEventKind::Seek);
        assert_eq!(seek.time, 42.0);
        assert_eq!(engine.target_time(), 42.0);

        let pause = engine.apply_local(LocalAction::Pause, at, now);
        assert_eq!(pause.kind, SyncEventKind::Pause);
        assert_eq!(pause.time, 42.0);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_negative_positions_are_clamped() {
        let mut engine = reconciler("b");
        let now = Instant::now();

        let seek = event(SyncEventKind::Seek, -3.0, "a", 1000);
        let command = engine.apply_remote(&seek, now);

        assert_eq!(command, Some(PlaybackCommand::Seek { position: 0.0 }));
        assert_eq!(engine.target_time(), 0.0);
    }
}
