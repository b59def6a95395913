//! Match lifecycle, clock, points and serve rotation.
//!
//! Every method here assumes it runs on the authoritative actor with the
//! caller already checked by the [`CommandRouter`](crate::router::CommandRouter).
//! Writes land in the session's [`ReplicatedState`] and become visible when
//! the caller invokes [`Session::publish`].

use crate::ball::{Ball, RigidBody};
use crate::config::MatchConfig;
use crate::error::CoreError;
use crate::math::Vec3;
use crate::state::{FieldUpdate, ReplicatedState, ScoreBoard};
use crate::types::{BallState, SessionState, Side, StateLabel};
use log::{debug, info, warn};

/// Serve counter values before the rotation wraps.
pub const SERVE_CYCLE: u32 = 4;
pub const DEUCE_SERVE_CYCLE: u32 = 2;

/// Side that serves next. Two serves each, or one each once in deuce.
pub fn serve_side(serve_counter: u32, deuce: bool) -> Side {
    let home = if deuce {
        serve_counter % DEUCE_SERVE_CYCLE == 0
    } else {
        serve_counter % SERVE_CYCLE < 2
    };
    if home {
        Side::Home
    } else {
        Side::Guest
    }
}

/// Winner for the given score, if any. Home is checked first.
pub fn winner(board: &ScoreBoard, config: &MatchConfig) -> Option<Side> {
    let wins = |own: u32, other: u32| {
        own >= config.points_to_win && own >= other.saturating_add(config.win_margin)
    };
    if wins(board.host_score, board.guest_score) {
        Some(Side::Home)
    } else if wins(board.guest_score, board.host_score) {
        Some(Side::Guest)
    } else {
        None
    }
}

pub struct Session {
    config: MatchConfig,
    state: ReplicatedState,
    ball: Ball,
}

impl Session {
    pub fn new(config: MatchConfig, body: Option<Box<dyn RigidBody>>) -> Self {
        let state = ReplicatedState::authoritative(config.match_duration);
        let mut ball = Ball::new(config.ball.clone(), config.scoring_rule, body);
        ball.reset(config.serve_location(state.serve_side()));
        Self {
            config,
            state,
            ball,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn state(&self) -> &ReplicatedState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ReplicatedState {
        &mut self.state
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn session_state(&self) -> SessionState {
        self.state.session_state()
    }

    pub fn serve_side(&self) -> Side {
        self.state.serve_side()
    }

    /// Notifies observers of everything committed since the last call and
    /// returns those writes for replication.
    pub fn publish(&mut self) -> Vec<FieldUpdate> {
        self.state.flush();
        self.state.take_outbox()
    }

    fn require(&self, expected: SessionState, event: &'static str) -> Result<(), CoreError> {
        let current = self.session_state();
        if current != expected {
            return Err(CoreError::InvalidTransition {
                from: StateLabel::Session(current),
                event,
            });
        }
        Ok(())
    }

    fn set_session(&mut self, next: SessionState) -> Result<(), CoreError> {
        let previous = self.session_state();
        self.state.commit(FieldUpdate::Session(next))?;
        info!("Session {:?} -> {:?}", previous, next);
        Ok(())
    }

    /// Commits the ball's flight state if it moved since the last commit.
    fn sync_ball(&mut self) -> Result<(), CoreError> {
        let current = self.ball.state();
        if current != self.state.ball_state() {
            self.state.commit(FieldUpdate::Ball(current))?;
        }
        Ok(())
    }

    fn place_ball(&mut self) -> Result<(), CoreError> {
        let location = self.config.serve_location(self.serve_side());
        self.ball.reset(location);
        self.sync_ball()
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        self.require(SessionState::Inactive, "start")?;
        self.place_ball()?;
        self.set_session(SessionState::Active)
    }

    pub fn serve(&mut self) -> Result<(), CoreError> {
        self.require(SessionState::Active, "serve")?;
        self.ball.serve(self.serve_side())?;
        self.sync_ball()
    }

    pub fn pause(&mut self) -> Result<(), CoreError> {
        self.require(SessionState::Active, "pause")?;
        self.ball.freeze();
        self.set_session(SessionState::Paused)
    }

    pub fn resume(&mut self) -> Result<(), CoreError> {
        self.require(SessionState::Paused, "resume")?;
        self.ball.thaw();
        self.set_session(SessionState::Active)
    }

    /// Clears the score and clock and starts a fresh match from any state.
    pub fn restart(&mut self) -> Result<(), CoreError> {
        self.state.commit(FieldUpdate::HostScore(0))?;
        self.state.commit(FieldUpdate::GuestScore(0))?;
        self.state.commit(FieldUpdate::ServeCounter(0))?;
        self.state.commit(FieldUpdate::Deuce(false))?;
        self.state.commit(FieldUpdate::Timer(self.config.match_duration))?;
        self.state.commit(FieldUpdate::Winner(None))?;
        self.place_ball()?;
        self.set_session(SessionState::Active)
    }

    /// Retires the ball and ends the match.
    pub fn end_game(&mut self, winner: Option<Side>) -> Result<(), CoreError> {
        if self.session_state() == SessionState::Ended {
            return Ok(());
        }
        self.place_ball()?;
        if let Some(side) = winner {
            self.state.commit(FieldUpdate::Winner(Some(side)))?;
            info!("{} wins", side);
        }
        self.set_session(SessionState::Ended)
    }

    /// Advances the clock and the ball by one fixed tick.
    pub fn on_fixed_tick(&mut self, dt: f32) -> Result<(), CoreError> {
        if self.session_state() != SessionState::Active {
            return Ok(());
        }

        let remaining = (self.state.remaining_time() - dt).max(0.0);
        self.state.commit(FieldUpdate::Timer(remaining))?;

        self.ball.tick(dt);
        self.sync_ball()?;

        if remaining <= 0.0 {
            info!("Match time expired");
            self.end_game(None)?;
        }
        Ok(())
    }

    pub fn on_paddle_contact(
        &mut self,
        side: Side,
        normal: Vec3,
        velocity: Vec3,
    ) -> Result<(), CoreError> {
        if self.session_state() != SessionState::Active {
            return Ok(());
        }
        if self.ball.on_paddle_contact(side, normal, velocity) {
            debug!("{} paddle hit", side);
        }
        Ok(())
    }

    pub fn on_table_side_entered(&mut self, side: Side) -> Result<(), CoreError> {
        if self.session_state() != SessionState::Active {
            return Ok(());
        }
        self.ball.on_table_side_entered(side);
        self.sync_ball()
    }

    /// Ends the rally. Awards a point when the contact record is complete,
    /// otherwise just puts the ball back.
    pub fn on_floor_contact(&mut self) -> Result<(), CoreError> {
        if self.session_state() != SessionState::Active {
            return Ok(());
        }
        match self.ball.state() {
            BallState::Held => Ok(()),
            BallState::Serving => self.place_ball(),
            BallState::Waiting | BallState::Active => match self.ball.settle_rally() {
                Ok(side) => self.award_point(side),
                Err(CoreError::IncompleteContactMemory { .. }) => self.place_ball(),
                Err(err) => Err(err),
            },
        }
    }

    fn award_point(&mut self, side: Side) -> Result<(), CoreError> {
        let mut board = self.state.scoreboard();
        match side {
            Side::Home => board.host_score += 1,
            Side::Guest => board.guest_score += 1,
        }
        let threshold = self.config.deuce_threshold;
        let entering_deuce =
            !board.deuce && board.host_score >= threshold && board.guest_score >= threshold;
        board.deuce |= entering_deuce;
        let cycle = if board.deuce {
            DEUCE_SERVE_CYCLE
        } else {
            SERVE_CYCLE
        };
        board.serve_counter = (board.serve_counter + 1) % cycle;

        self.state
            .commit(FieldUpdate::ServeCounter(board.serve_counter))?;
        self.state.commit(match side {
            Side::Home => FieldUpdate::HostScore(board.host_score),
            Side::Guest => FieldUpdate::GuestScore(board.guest_score),
        })?;
        if entering_deuce {
            self.state.commit(FieldUpdate::Deuce(true))?;
            info!("Deuce");
        }
        info!(
            "Point to {}: {} - {}",
            side, board.host_score, board.guest_score
        );

        match winner(&board, &self.config) {
            Some(side) => self.end_game(Some(side)),
            None => self.place_ball(),
        }
    }

    /// The only other participant left. Pauses without a command.
    pub fn on_participant_disconnected(&mut self) -> Result<(), CoreError> {
        if self.session_state() == SessionState::Active {
            warn!("Opponent disconnected, pausing");
            return self.pause();
        }
        Ok(())
    }
}
