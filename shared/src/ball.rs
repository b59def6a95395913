//! Flight state machine of the live ball.
//!
//! The ball never integrates motion itself. It decides when to hand the
//! external rigid body a velocity or a force, and reacts to contacts that the
//! simulator has already detected:
//!
//! ```text
//! Held --serve--> Serving --tick--> Waiting --opponent half--> Active
//!  ^                                                             |
//!  +------------------------- reset ----------------------------+
//! ```

use crate::config::BallConfig;
use crate::error::CoreError;
use crate::math::Vec3;
use crate::scoring::{ContactMemory, ScoringEngine, ScoringRule};
use crate::types::{BallState, Side, StateLabel};
use log::{debug, error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How a vector passed to [`RigidBody::apply_force`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// Continuous force, scaled by mass and tick length.
    Force,
    /// Continuous acceleration, scaled by tick length only.
    Acceleration,
    /// Instant change of momentum.
    Impulse,
    /// Instant change of velocity.
    VelocityChange,
}

/// The external simulator's handle on the ball body.
pub trait RigidBody: Send {
    fn velocity(&self) -> Vec3;
    /// Replaces the current velocity.
    fn apply_velocity(&mut self, velocity: Vec3);
    fn apply_force(&mut self, force: Vec3, mode: ForceMode);
    fn set_gravity_enabled(&mut self, enabled: bool);
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
}

/// Paddle speed of a console hit.
pub const SWING_SPEED: f32 = 6.0;

/// Contact produced by swinging `side`'s paddle through a ball moving at
/// `ball_velocity`: the paddle faces the opponent, tilted slightly upward.
/// Returns the contact normal and the ball velocity relative to the paddle.
pub fn paddle_swing(side: Side, ball_velocity: Vec3, swing_speed: f32) -> (Vec3, Vec3) {
    let towards_opponent = match side {
        Side::Home => Vec3::FORWARD,
        Side::Guest => Vec3::FORWARD.scale(-1.0),
    };
    let normal = towards_opponent.add(&Vec3::UP.scale(0.3)).normalize();
    let incoming = ball_velocity.sub(&normal.scale(swing_speed));
    (normal, incoming)
}

pub struct Ball {
    config: BallConfig,
    state: BallState,
    body: Option<Box<dyn RigidBody>>,
    scoring: ScoringEngine,
    serving_side: Side,
    /// Seconds of unpaused flight time, used for the collision cooldown.
    clock: f32,
    rng: StdRng,
    /// Velocity captured by [`Ball::freeze`].
    frozen: Option<Vec3>,
}

impl Ball {
    /// Creates a held ball. Without a body the ball disables itself and
    /// every later operation is a no-op.
    pub fn new(config: BallConfig, rule: ScoringRule, body: Option<Box<dyn RigidBody>>) -> Self {
        if body.is_none() {
            error!(
                "{}",
                CoreError::MissingCollaborator {
                    component: "ball",
                    collaborator: "rigid body",
                }
            );
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            state: BallState::Held,
            body,
            scoring: ScoringEngine::new(rule),
            serving_side: Side::Home,
            clock: 0.0,
            rng,
            frozen: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.body.is_some()
    }

    pub fn state(&self) -> BallState {
        self.state
    }

    pub fn contacts(&self) -> &ContactMemory {
        self.scoring.memory()
    }

    pub fn serving_side(&self) -> Side {
        self.serving_side
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, BallState::Waiting | BallState::Active)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn position(&self) -> Vec3 {
        self.body.as_ref().map_or(Vec3::ZERO, |body| body.position())
    }

    pub fn velocity(&self) -> Vec3 {
        self.body.as_ref().map_or(Vec3::ZERO, |body| body.velocity())
    }

    /// Begins a serve for `side`. Repeating it while the serve is already
    /// under way changes nothing.
    pub fn serve(&mut self, side: Side) -> Result<(), CoreError> {
        if self.body.is_none() {
            return Err(CoreError::MissingCollaborator {
                component: "ball",
                collaborator: "rigid body",
            });
        }
        match self.state {
            BallState::Held => {
                self.serving_side = side;
                self.scoring.clear();
                self.state = BallState::Serving;
                debug!("{} serving", side);
                Ok(())
            }
            BallState::Serving | BallState::Waiting => {
                debug!("Serve already under way, ignoring");
                Ok(())
            }
            BallState::Active => Err(CoreError::InvalidTransition {
                from: StateLabel::Ball(self.state),
                event: "serve",
            }),
        }
    }

    /// Advances one fixed tick: launches a pending serve and shapes the
    /// flight of an active ball.
    pub fn tick(&mut self, dt: f32) {
        if self.frozen.is_some() {
            return;
        }
        let Some(body) = self.body.as_mut() else {
            return;
        };
        self.clock += dt;

        match self.state {
            BallState::Serving => {
                body.apply_velocity(Vec3::UP.scale(self.config.serve_impulse));
                body.set_gravity_enabled(true);
                self.state = BallState::Waiting;
            }
            BallState::Active => Self::assist(&self.config, body.as_mut()),
            BallState::Held | BallState::Waiting => {}
        }
    }

    fn assist(config: &BallConfig, body: &mut dyn RigidBody) {
        let velocity = body.velocity();
        if velocity == Vec3::ZERO {
            return;
        }

        let target = velocity.clamp_magnitude(config.min_velocity, config.max_velocity);
        let blended = velocity.lerp(&target, config.smoothing);
        body.apply_velocity(blended);

        let forward = config.opponent_axis.normalize();
        if blended.dot(&forward) > 0.0 {
            let lateral = forward.cross(&Vec3::UP).normalize();
            let offset = body.position().dot(&lateral);
            body.apply_force(
                lateral.scale(-offset * config.assist_strength),
                ForceMode::Acceleration,
            );
        }
    }

    /// Bounces the ball off a paddle. Returns whether the contact was
    /// processed, as opposed to being ignored or debounced.
    pub fn on_paddle_contact(&mut self, side: Side, normal: Vec3, incoming: Vec3) -> bool {
        if !self.is_in_flight() || self.frozen.is_some() {
            return false;
        }
        let Some(body) = self.body.as_mut() else {
            return false;
        };
        if let Some(at) = self.scoring.memory().last_collision_at {
            if self.clock - at < self.config.collision_cooldown {
                debug!("Paddle contact within cooldown, ignoring");
                return false;
            }
        }

        let spread = self.config.max_perturbation.abs();
        let jitter = Vec3::new(
            self.rng.gen_range(-spread..=spread),
            self.rng.gen_range(-spread..=spread),
            self.rng.gen_range(-spread..=spread),
        );
        let mut outgoing = incoming.reflect(&normal).add(&jitter);
        if outgoing.magnitude() < self.config.min_velocity {
            outgoing = if outgoing == Vec3::ZERO {
                normal.normalize().scale(self.config.min_velocity)
            } else {
                outgoing.clamp_magnitude(self.config.min_velocity, f32::MAX)
            };
        }
        body.apply_velocity(outgoing);
        self.scoring.record_paddle(side, self.clock);
        true
    }

    /// Tags the half the ball is over. Returns whether this entry put a
    /// served ball into play.
    pub fn on_table_side_entered(&mut self, side: Side) -> bool {
        if !self.is_in_flight() || self.body.is_none() {
            return false;
        }
        self.scoring.record_table_side(side);
        if self.state == BallState::Waiting && side == self.serving_side.opponent() {
            self.state = BallState::Active;
            return true;
        }
        false
    }

    /// Settles the rally after a floor contact and clears contact memory.
    pub fn settle_rally(&mut self) -> Result<Side, CoreError> {
        self.scoring.on_floor_contact()
    }

    /// Holds the ball still at `position`, ready for the next serve.
    pub fn reset(&mut self, position: Vec3) {
        self.state = BallState::Held;
        self.frozen = None;
        self.scoring.clear();
        if let Some(body) = self.body.as_mut() {
            body.set_gravity_enabled(false);
            body.apply_velocity(Vec3::ZERO);
            body.set_position(position);
        }
    }

    /// Stops the ball in place, keeping its velocity for [`Ball::thaw`].
    pub fn freeze(&mut self) {
        if self.frozen.is_some() {
            return;
        }
        if let Some(body) = self.body.as_mut() {
            self.frozen = Some(body.velocity());
            body.apply_velocity(Vec3::ZERO);
            body.set_gravity_enabled(false);
        }
    }

    pub fn thaw(&mut self) {
        let Some(velocity) = self.frozen.take() else {
            return;
        };
        let in_flight = self.is_in_flight();
        if let Some(body) = self.body.as_mut() {
            body.apply_velocity(velocity);
            body.set_gravity_enabled(in_flight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct BodyState {
        position: Vec3,
        velocity: Vec3,
        gravity: bool,
        forces: Vec<(Vec3, ForceMode)>,
        velocity_writes: usize,
    }

    #[derive(Clone, Default)]
    struct TestBody(Arc<Mutex<BodyState>>);

    impl RigidBody for TestBody {
        fn velocity(&self) -> Vec3 {
            self.0.lock().velocity
        }
        fn apply_velocity(&mut self, velocity: Vec3) {
            let mut body = self.0.lock();
            body.velocity = velocity;
            body.velocity_writes += 1;
        }
        fn apply_force(&mut self, force: Vec3, mode: ForceMode) {
            self.0.lock().forces.push((force, mode));
        }
        fn set_gravity_enabled(&mut self, enabled: bool) {
            self.0.lock().gravity = enabled;
        }
        fn position(&self) -> Vec3 {
            self.0.lock().position
        }
        fn set_position(&mut self, position: Vec3) {
            self.0.lock().position = position;
        }
    }

    fn ball_with(config: BallConfig) -> (Ball, TestBody) {
        let body = TestBody::default();
        let ball = Ball::new(config, ScoringRule::LandingSide, Some(Box::new(body.clone())));
        (ball, body)
    }

    fn active_ball(config: BallConfig) -> (Ball, TestBody) {
        let (mut ball, body) = ball_with(config);
        ball.serve(Side::Home).unwrap();
        ball.tick(0.016);
        assert!(ball.on_table_side_entered(Side::Guest));
        (ball, body)
    }

    #[test]
    fn test_serve_launches_on_next_tick() {
        let (mut ball, body) = ball_with(BallConfig::default());

        ball.serve(Side::Home).unwrap();
        assert_eq!(ball.state(), BallState::Serving);
        assert_eq!(body.0.lock().velocity, Vec3::ZERO);

        ball.tick(0.016);
        assert_eq!(ball.state(), BallState::Waiting);
        let state = body.0.lock();
        assert_approx_eq!(state.velocity.y, 5.0, 1e-6);
        assert!(state.gravity);
    }

    #[test]
    fn test_double_serve_gives_one_impulse() {
        let (mut ball, body) = ball_with(BallConfig::default());

        ball.serve(Side::Home).unwrap();
        ball.serve(Side::Home).unwrap();
        ball.tick(0.016);
        ball.serve(Side::Home).unwrap();
        ball.tick(0.016);

        assert_eq!(body.0.lock().velocity_writes, 1);
        assert_eq!(ball.state(), BallState::Waiting);
    }

    #[test]
    fn test_serve_while_active_is_invalid() {
        let (mut ball, _body) = active_ball(BallConfig::default());
        let err = ball.serve(Side::Guest).unwrap_err();
        assert!(err.is_guard_failure());
        assert_eq!(ball.state(), BallState::Active);
    }

    #[test]
    fn test_only_opponent_half_activates() {
        let (mut ball, _body) = ball_with(BallConfig::default());
        ball.serve(Side::Guest).unwrap();
        ball.tick(0.016);

        assert!(!ball.on_table_side_entered(Side::Guest));
        assert_eq!(ball.state(), BallState::Waiting);
        assert!(ball.on_table_side_entered(Side::Home));
        assert_eq!(ball.state(), BallState::Active);
    }

    #[test]
    fn test_assist_clamps_and_smooths() {
        let config = BallConfig {
            smoothing: 0.5,
            ..BallConfig::default()
        };
        let (mut ball, body) = active_ball(config);
        body.0.lock().velocity = Vec3::new(0.0, 0.0, -20.0);

        ball.tick(0.016);

        // Halfway from 20 towards the 12 cap, moving away from the opponent
        let state = body.0.lock();
        assert_approx_eq!(state.velocity.z, -16.0, 1e-4);
        assert!(state.forces.is_empty());
    }

    #[test]
    fn test_assist_leaves_zero_velocity() {
        let (mut ball, body) = active_ball(BallConfig::default());
        body.0.lock().velocity = Vec3::ZERO;
        let writes = body.0.lock().velocity_writes;

        ball.tick(0.016);

        let state = body.0.lock();
        assert_eq!(state.velocity, Vec3::ZERO);
        assert_eq!(state.velocity_writes, writes);
    }

    #[test]
    fn test_assist_pulls_towards_centre_line() {
        let (mut ball, body) = active_ball(BallConfig::default());
        {
            let mut state = body.0.lock();
            state.velocity = Vec3::new(0.0, 0.0, 5.0);
            state.position = Vec3::new(0.5, 1.0, 0.3);
        }

        ball.tick(0.016);

        let state = body.0.lock();
        let (force, mode) = state.forces[0];
        assert_eq!(mode, ForceMode::Acceleration);
        assert_approx_eq!(force.x, -0.05, 1e-6);
        assert_approx_eq!(force.z, 0.0, 1e-6);
    }

    #[test]
    fn test_paddle_contact_reflects_and_enforces_min_speed() {
        let config = BallConfig {
            max_perturbation: 0.0,
            ..BallConfig::default()
        };
        let (mut ball, body) = active_ball(config);

        let processed = ball.on_paddle_contact(
            Side::Guest,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
        );

        assert!(processed);
        let velocity = body.0.lock().velocity;
        assert_approx_eq!(velocity.z, -2.0, 1e-5);
        assert_eq!(ball.contacts().last_paddle, Some(Side::Guest));
    }

    #[test]
    fn test_paddle_contact_perturbation_is_bounded() {
        let (mut ball, body) = active_ball(BallConfig::default());
        let incoming = Vec3::new(0.0, 0.0, 8.0);

        ball.on_paddle_contact(Side::Guest, Vec3::new(0.0, 0.0, -1.0), incoming);

        let velocity = body.0.lock().velocity;
        assert!(velocity.x.abs() <= 0.3);
        assert!(velocity.y.abs() <= 0.3);
        assert!((velocity.z + 8.0).abs() <= 0.3);
    }

    #[test]
    fn test_cooldown_debounces_duplicate_contacts() {
        let (mut ball, _body) = active_ball(BallConfig::default());
        let normal = Vec3::new(0.0, 0.0, -1.0);
        let incoming = Vec3::new(0.0, 0.0, 6.0);

        assert!(ball.on_paddle_contact(Side::Guest, normal, incoming));
        assert!(!ball.on_paddle_contact(Side::Guest, normal, incoming));

        ball.tick(0.2);
        assert!(ball.on_paddle_contact(Side::Home, normal.scale(-1.0), incoming));
        assert_eq!(ball.contacts().last_paddle, Some(Side::Home));
    }

    #[test]
    fn test_contacts_ignored_while_held() {
        let (mut ball, _body) = ball_with(BallConfig::default());
        assert!(!ball.on_paddle_contact(Side::Home, Vec3::UP, Vec3::UP));
        assert!(!ball.on_table_side_entered(Side::Guest));
        assert_eq!(*ball.contacts(), ContactMemory::default());
    }

    #[test]
    fn test_freeze_and_thaw_restore_motion() {
        let (mut ball, body) = active_ball(BallConfig::default());
        body.0.lock().velocity = Vec3::new(1.0, 2.0, 3.0);

        ball.freeze();
        assert!(ball.is_frozen());
        assert_eq!(body.0.lock().velocity, Vec3::ZERO);
        assert!(!body.0.lock().gravity);

        // Ticks do nothing while frozen
        ball.tick(1.0);
        assert_eq!(body.0.lock().velocity, Vec3::ZERO);

        ball.thaw();
        assert_eq!(body.0.lock().velocity, Vec3::new(1.0, 2.0, 3.0));
        assert!(body.0.lock().gravity);
    }

    #[test]
    fn test_reset_holds_ball() {
        let (mut ball, body) = active_ball(BallConfig::default());
        ball.on_paddle_contact(Side::Home, Vec3::FORWARD, Vec3::new(0.0, 0.0, -5.0));

        ball.reset(Vec3::new(0.0, 1.0, -1.2));

        assert_eq!(ball.state(), BallState::Held);
        assert_eq!(*ball.contacts(), ContactMemory::default());
        let state = body.0.lock();
        assert_eq!(state.velocity, Vec3::ZERO);
        assert_eq!(state.position, Vec3::new(0.0, 1.0, -1.2));
        assert!(!state.gravity);
    }

    #[test]
    fn test_paddle_swing_sends_ball_to_opponent() {
        let (normal, incoming) = paddle_swing(Side::Home, Vec3::new(0.0, -1.0, 0.0), 6.0);
        assert!(incoming.reflect(&normal).z > 0.0);

        let (normal, incoming) = paddle_swing(Side::Guest, Vec3::new(0.0, -1.0, -3.0), 6.0);
        assert!(incoming.reflect(&normal).z < 0.0);
    }

    #[test]
    fn test_missing_body_disables_ball() {
        let mut ball = Ball::new(BallConfig::default(), ScoringRule::LandingSide, None);

        assert!(!ball.is_enabled());
        assert!(matches!(
            ball.serve(Side::Home),
            Err(CoreError::MissingCollaborator { .. })
        ));
        ball.tick(0.016);
        assert_eq!(ball.state(), BallState::Held);
        assert_eq!(ball.position(), Vec3::ZERO);
    }
}
