//! The replicated fields of one match and the only path that writes them.
//!
//! On the host every write goes through [`ReplicatedState::commit`], which
//! stages the value, journals it for observers and queues it for broadcast.
//! On a peer the same structure is a mirror fed by
//! [`ReplicatedState::replicate`]. In both cases observers only run on
//! [`ReplicatedState::flush`], after a whole command's writes are in place,
//! so nobody sees a new score next to a stale serve counter.

use crate::error::CoreError;
use crate::replicated::{Authority, ReplicatedValue};
use crate::session::serve_side;
use crate::types::{BallState, SessionState, Side};
use log::error;
use serde::{Deserialize, Serialize};

/// One committed write, as it travels between participants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldUpdate {
    Session(SessionState),
    HostScore(u32),
    GuestScore(u32),
    ServeCounter(u32),
    Deuce(bool),
    /// Remaining match time in seconds.
    Timer(f32),
    Ball(BallState),
    Winner(Option<Side>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Session,
    HostScore,
    GuestScore,
    ServeCounter,
    Deuce,
    Timer,
    Ball,
    Winner,
}

impl FieldUpdate {
    fn field(&self) -> Field {
        match self {
            FieldUpdate::Session(_) => Field::Session,
            FieldUpdate::HostScore(_) => Field::HostScore,
            FieldUpdate::GuestScore(_) => Field::GuestScore,
            FieldUpdate::ServeCounter(_) => Field::ServeCounter,
            FieldUpdate::Deuce(_) => Field::Deuce,
            FieldUpdate::Timer(_) => Field::Timer,
            FieldUpdate::Ball(_) => Field::Ball,
            FieldUpdate::Winner(_) => Field::Winner,
        }
    }
}

/// Read-only view of the score fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreBoard {
    pub host_score: u32,
    pub guest_score: u32,
    pub serve_counter: u32,
    pub deuce: bool,
}

impl ScoreBoard {
    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.host_score,
            Side::Guest => self.guest_score,
        }
    }

    pub fn serve_side(&self) -> Side {
        serve_side(self.serve_counter, self.deuce)
    }
}

/// Presentation hooks. Every method defaults to doing nothing.
pub trait SessionListener: Send {
    fn on_session_state_changed(&mut self, _previous: SessionState, _current: SessionState) {}
    fn on_score_changed(&mut self, _side: Side, _score: u32) {}
    fn on_timer_changed(&mut self, _remaining_seconds: f32) {}
    fn on_ball_state_changed(&mut self, _previous: BallState, _current: BallState) {}
    fn on_serve_side_changed(&mut self, _side: Side) {}
    /// `None` when a restart clears the previous result.
    fn on_winner_changed(&mut self, _winner: Option<Side>) {}
}

pub struct ReplicatedState {
    pub session: ReplicatedValue<SessionState>,
    pub host_score: ReplicatedValue<u32>,
    pub guest_score: ReplicatedValue<u32>,
    pub serve_counter: ReplicatedValue<u32>,
    pub deuce: ReplicatedValue<bool>,
    pub timer: ReplicatedValue<f32>,
    pub ball: ReplicatedValue<BallState>,
    pub winner: ReplicatedValue<Option<Side>>,

    authority: Authority,
    journal: Vec<Field>,
    outbox: Vec<FieldUpdate>,
    listeners: Vec<Box<dyn SessionListener>>,
    announced_serve_side: Side,
}

impl ReplicatedState {
    pub fn new(authority: Authority, match_duration: f32) -> Self {
        Self {
            session: ReplicatedValue::new(SessionState::Inactive, authority),
            host_score: ReplicatedValue::new(0, authority),
            guest_score: ReplicatedValue::new(0, authority),
            serve_counter: ReplicatedValue::new(0, authority),
            deuce: ReplicatedValue::new(false, authority),
            timer: ReplicatedValue::new(match_duration, authority),
            ball: ReplicatedValue::new(BallState::Held, authority),
            winner: ReplicatedValue::new(None, authority),
            authority,
            journal: Vec::new(),
            outbox: Vec::new(),
            listeners: Vec::new(),
            announced_serve_side: serve_side(0, false),
        }
    }

    pub fn authoritative(match_duration: f32) -> Self {
        Self::new(Authority::Authoritative, match_duration)
    }

    pub fn mirror() -> Self {
        Self::new(Authority::Mirror, 0.0)
    }

    pub fn is_authoritative(&self) -> bool {
        self.authority == Authority::Authoritative
    }

    pub fn add_listener(&mut self, listener: Box<dyn SessionListener>) {
        self.listeners.push(listener);
    }

    /// Wires a presentation sink that may be absent at startup.
    ///
    /// A missing sink disables presentation only; the match keeps running.
    pub fn connect_presentation(
        &mut self,
        sink: Option<Box<dyn SessionListener>>,
    ) -> Result<(), CoreError> {
        match sink {
            Some(listener) => {
                self.add_listener(listener);
                Ok(())
            }
            None => {
                let err = CoreError::MissingCollaborator {
                    component: "presentation",
                    collaborator: "session listener",
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Stages one authoritative write and queues it for broadcast.
    pub fn commit(&mut self, update: FieldUpdate) -> Result<(), CoreError> {
        self.stage(update, Authority::Authoritative)?;
        self.outbox.push(update);
        Ok(())
    }

    /// Applies a batch committed by the authority, then notifies observers.
    ///
    /// The batch is rejected as a whole on the authoritative copy.
    pub fn replicate(&mut self, updates: &[FieldUpdate]) -> Result<(), CoreError> {
        if self.is_authoritative() {
            return Err(CoreError::NotAuthorized {
                operation: "replicate onto the authoritative state",
            });
        }
        for update in updates {
            self.stage(*update, Authority::Mirror)?;
        }
        self.flush();
        Ok(())
    }

    fn stage(&mut self, update: FieldUpdate, origin: Authority) -> Result<(), CoreError> {
        let staged = match (update, origin) {
            (FieldUpdate::Session(v), Authority::Authoritative) => self.session.stage(v),
            (FieldUpdate::Session(v), Authority::Mirror) => self.session.stage_replicated(v),
            (FieldUpdate::HostScore(v), Authority::Authoritative) => self.host_score.stage(v),
            (FieldUpdate::HostScore(v), Authority::Mirror) => self.host_score.stage_replicated(v),
            (FieldUpdate::GuestScore(v), Authority::Authoritative) => self.guest_score.stage(v),
            (FieldUpdate::GuestScore(v), Authority::Mirror) => {
                self.guest_score.stage_replicated(v)
            }
            (FieldUpdate::ServeCounter(v), Authority::Authoritative) => {
                self.serve_counter.stage(v)
            }
            (FieldUpdate::ServeCounter(v), Authority::Mirror) => {
                self.serve_counter.stage_replicated(v)
            }
            (FieldUpdate::Deuce(v), Authority::Authoritative) => self.deuce.stage(v),
            (FieldUpdate::Deuce(v), Authority::Mirror) => self.deuce.stage_replicated(v),
            (FieldUpdate::Timer(v), Authority::Authoritative) => self.timer.stage(v),
            (FieldUpdate::Timer(v), Authority::Mirror) => self.timer.stage_replicated(v),
            (FieldUpdate::Ball(v), Authority::Authoritative) => self.ball.stage(v),
            (FieldUpdate::Ball(v), Authority::Mirror) => self.ball.stage_replicated(v),
            (FieldUpdate::Winner(v), Authority::Authoritative) => self.winner.stage(v),
            (FieldUpdate::Winner(v), Authority::Mirror) => self.winner.stage_replicated(v),
        };
        staged?;
        self.journal.push(update.field());
        Ok(())
    }

    /// Delivers all staged writes to field observers and listeners in
    /// commit order, then announces a serve side change if there was one.
    pub fn flush(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        for field in journal {
            match field {
                Field::Session => {
                    if let Some((prev, cur)) = self.session.flush_one() {
                        for listener in self.listeners.iter_mut() {
                            listener.on_session_state_changed(prev, cur);
                        }
                    }
                }
                Field::HostScore => {
                    if let Some((_, cur)) = self.host_score.flush_one() {
                        for listener in self.listeners.iter_mut() {
                            listener.on_score_changed(Side::Home, cur);
                        }
                    }
                }
                Field::GuestScore => {
                    if let Some((_, cur)) = self.guest_score.flush_one() {
                        for listener in self.listeners.iter_mut() {
                            listener.on_score_changed(Side::Guest, cur);
                        }
                    }
                }
                Field::ServeCounter => {
                    self.serve_counter.flush_one();
                }
                Field::Deuce => {
                    self.deuce.flush_one();
                }
                Field::Timer => {
                    if let Some((_, cur)) = self.timer.flush_one() {
                        for listener in self.listeners.iter_mut() {
                            listener.on_timer_changed(cur);
                        }
                    }
                }
                Field::Ball => {
                    if let Some((prev, cur)) = self.ball.flush_one() {
                        for listener in self.listeners.iter_mut() {
                            listener.on_ball_state_changed(prev, cur);
                        }
                    }
                }
                Field::Winner => {
                    if let Some((_, winner)) = self.winner.flush_one() {
                        for listener in self.listeners.iter_mut() {
                            listener.on_winner_changed(winner);
                        }
                    }
                }
            }
        }

        let serving = self.serve_side();
        if serving != self.announced_serve_side {
            self.announced_serve_side = serving;
            for listener in self.listeners.iter_mut() {
                listener.on_serve_side_changed(serving);
            }
        }
    }

    /// Committed writes not yet handed to the transport.
    pub fn take_outbox(&mut self) -> Vec<FieldUpdate> {
        std::mem::take(&mut self.outbox)
    }

    /// Every field's current value, for late joiners and gap recovery.
    pub fn snapshot(&self) -> Vec<FieldUpdate> {
        vec![
            FieldUpdate::Session(*self.session.get()),
            FieldUpdate::HostScore(*self.host_score.get()),
            FieldUpdate::GuestScore(*self.guest_score.get()),
            FieldUpdate::ServeCounter(*self.serve_counter.get()),
            FieldUpdate::Deuce(*self.deuce.get()),
            FieldUpdate::Timer(*self.timer.get()),
            FieldUpdate::Ball(*self.ball.get()),
            FieldUpdate::Winner(*self.winner.get()),
        ]
    }

    pub fn session_state(&self) -> SessionState {
        *self.session.get()
    }

    pub fn ball_state(&self) -> BallState {
        *self.ball.get()
    }

    pub fn remaining_time(&self) -> f32 {
        *self.timer.get()
    }

    pub fn winner(&self) -> Option<Side> {
        *self.winner.get()
    }

    pub fn scoreboard(&self) -> ScoreBoard {
        ScoreBoard {
            host_score: *self.host_score.get(),
            guest_score: *self.guest_score.get(),
            serve_counter: *self.serve_counter.get(),
            deuce: *self.deuce.get(),
        }
    }

    pub fn serve_side(&self) -> Side {
        self.scoreboard().serve_side()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Session(SessionState, SessionState),
        Score(Side, u32),
        Timer(f32),
        Ball(BallState, BallState),
        ServeSide(Side),
        Winner(Option<Side>),
    }

    struct Recorder(Arc<Mutex<Vec<Seen>>>);

    impl SessionListener for Recorder {
        fn on_session_state_changed(&mut self, previous: SessionState, current: SessionState) {
            self.0.lock().push(Seen::Session(previous, current));
        }
        fn on_score_changed(&mut self, side: Side, score: u32) {
            self.0.lock().push(Seen::Score(side, score));
        }
        fn on_timer_changed(&mut self, remaining_seconds: f32) {
            self.0.lock().push(Seen::Timer(remaining_seconds));
        }
        fn on_ball_state_changed(&mut self, previous: BallState, current: BallState) {
            self.0.lock().push(Seen::Ball(previous, current));
        }
        fn on_serve_side_changed(&mut self, side: Side) {
            self.0.lock().push(Seen::ServeSide(side));
        }
        fn on_winner_changed(&mut self, winner: Option<Side>) {
            self.0.lock().push(Seen::Winner(winner));
        }
    }

    fn with_recorder(state: &mut ReplicatedState) -> Arc<Mutex<Vec<Seen>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        state.add_listener(Box::new(Recorder(Arc::clone(&seen))));
        seen
    }

    #[test]
    fn test_commit_defers_notification_until_flush() {
        let mut state = ReplicatedState::authoritative(60.0);
        let seen = with_recorder(&mut state);

        state.commit(FieldUpdate::HostScore(1)).unwrap();
        state.commit(FieldUpdate::ServeCounter(2)).unwrap();
        assert!(seen.lock().is_empty());
        assert_eq!(state.scoreboard().host_score, 1);

        state.flush();
        assert_eq!(
            *seen.lock(),
            vec![Seen::Score(Side::Home, 1), Seen::ServeSide(Side::Guest)]
        );
        assert_eq!(
            state.take_outbox(),
            vec![FieldUpdate::HostScore(1), FieldUpdate::ServeCounter(2)]
        );
        assert!(state.take_outbox().is_empty());
    }

    #[test]
    fn test_mirror_cannot_commit() {
        let mut mirror = ReplicatedState::mirror();
        let result = mirror.commit(FieldUpdate::GuestScore(5));
        assert!(matches!(result, Err(CoreError::NotAuthorized { .. })));
        assert_eq!(mirror.scoreboard().guest_score, 0);
        assert!(mirror.take_outbox().is_empty());
    }

    #[test]
    fn test_authority_cannot_replicate() {
        let mut state = ReplicatedState::authoritative(60.0);
        let result = state.replicate(&[FieldUpdate::HostScore(9)]);
        assert!(result.is_err());
        assert_eq!(state.scoreboard().host_score, 0);
    }

    #[test]
    fn test_mirror_converges_from_outbox() {
        let mut host = ReplicatedState::authoritative(120.0);
        let mut peer = ReplicatedState::mirror();
        let seen = with_recorder(&mut peer);

        host.commit(FieldUpdate::Session(SessionState::Active)).unwrap();
        host.commit(FieldUpdate::GuestScore(4)).unwrap();
        host.commit(FieldUpdate::Winner(Some(Side::Guest))).unwrap();
        host.flush();

        peer.replicate(&host.take_outbox()).unwrap();

        assert_eq!(peer.session_state(), SessionState::Active);
        assert_eq!(peer.scoreboard().guest_score, 4);
        assert_eq!(peer.winner(), Some(Side::Guest));
        assert_eq!(
            *seen.lock(),
            vec![
                Seen::Session(SessionState::Inactive, SessionState::Active),
                Seen::Score(Side::Guest, 4),
                Seen::Winner(Some(Side::Guest)),
            ]
        );
    }

    #[test]
    fn test_mirror_restart_clears_winner_for_listeners() {
        let mut peer = ReplicatedState::mirror();
        peer.replicate(&[
            FieldUpdate::HostScore(11),
            FieldUpdate::Winner(Some(Side::Home)),
            FieldUpdate::Session(SessionState::Ended),
        ])
        .unwrap();
        let seen = with_recorder(&mut peer);

        peer.replicate(&[
            FieldUpdate::HostScore(0),
            FieldUpdate::GuestScore(0),
            FieldUpdate::ServeCounter(0),
            FieldUpdate::Deuce(false),
            FieldUpdate::Timer(300.0),
            FieldUpdate::Winner(None),
            FieldUpdate::Ball(BallState::Held),
            FieldUpdate::Session(SessionState::Active),
        ])
        .unwrap();

        assert_eq!(peer.winner(), None);
        let seen = seen.lock();
        assert!(seen.contains(&Seen::Winner(None)));
        assert!(seen.contains(&Seen::Score(Side::Home, 0)));
        assert_eq!(
            seen.last(),
            Some(&Seen::Session(SessionState::Ended, SessionState::Active))
        );
    }

    #[test]
    fn test_snapshot_restores_mirror() {
        let mut host = ReplicatedState::authoritative(90.0);
        host.commit(FieldUpdate::HostScore(7)).unwrap();
        host.commit(FieldUpdate::Deuce(true)).unwrap();
        host.commit(FieldUpdate::Ball(BallState::Waiting)).unwrap();
        host.flush();

        let mut peer = ReplicatedState::mirror();
        peer.replicate(&host.snapshot()).unwrap();

        assert_eq!(peer.scoreboard(), host.scoreboard());
        assert_eq!(peer.ball_state(), BallState::Waiting);
        assert_eq!(peer.remaining_time(), 90.0);
    }

    #[test]
    fn test_timer_and_ball_notifications() {
        let mut peer = ReplicatedState::mirror();
        let seen = with_recorder(&mut peer);

        peer.replicate(&[
            FieldUpdate::Timer(42.5),
            FieldUpdate::Ball(BallState::Serving),
        ])
        .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                Seen::Timer(42.5),
                Seen::Ball(BallState::Held, BallState::Serving)
            ]
        );
    }

    #[test]
    fn test_missing_presentation_is_reported() {
        let mut state = ReplicatedState::mirror();
        let result = state.connect_presentation(None);
        assert!(matches!(
            result,
            Err(CoreError::MissingCollaborator { .. })
        ));

        // The state keeps working without a sink
        state.replicate(&[FieldUpdate::HostScore(1)]).unwrap();
        assert_eq!(state.scoreboard().host_score, 1);
    }
}
