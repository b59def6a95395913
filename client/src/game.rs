use log::{debug, error, info, warn};
use shared::ball::{paddle_swing, SWING_SPEED};
use shared::{
    BallState, FieldUpdate, Packet, ReplicatedState, ScoreBoard, SessionListener, SessionState,
    Side, Vec3,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const BALL_BUFFER_LEN: usize = 32;
const BALL_GRAVITY: f32 = 9.81;

/// Extrapolation stops this long after the last ball snapshot.
const MAX_EXTRAPOLATION: Duration = Duration::from_millis(250);

/// Outcome of applying one sequenced update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    /// Older than what the mirror already holds; dropped.
    Stale,
    /// Earlier updates went missing. Dropped; ask for a snapshot.
    Gap,
    /// Dropped while a requested snapshot is still outstanding.
    Resyncing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallSample {
    pub tick: u32,
    pub state: BallState,
    pub position: Vec3,
    pub velocity: Vec3,
    pub received_at: Instant,
}

/// A peer's read-only view of the match plus the locally predicted ball.
///
/// Nothing here feeds back into scoring; the ball prediction is for
/// display and for aiming console swings.
pub struct PeerGame {
    state: ReplicatedState,
    client_id: Option<u32>,
    side: Option<Side>,
    last_sequence: Option<u32>,
    awaiting_snapshot: bool,
    ball_samples: VecDeque<BallSample>,
}

impl PeerGame {
    pub fn new() -> Self {
        Self {
            state: ReplicatedState::mirror(),
            client_id: None,
            side: None,
            last_sequence: None,
            awaiting_snapshot: false,
            ball_samples: VecDeque::with_capacity(BALL_BUFFER_LEN),
        }
    }

    /// Creates a mirror driving `presentation`. Without a sink the mirror
    /// still tracks the match.
    pub fn with_presentation(presentation: Option<Box<dyn SessionListener>>) -> Self {
        let mut game = Self::new();
        if game.state.connect_presentation(presentation).is_err() {
            warn!("Continuing without a scoreboard");
        }
        game
    }

    pub fn state(&self) -> &ReplicatedState {
        &self.state
    }

    pub fn session_state(&self) -> SessionState {
        self.state.session_state()
    }

    pub fn scoreboard(&self) -> ScoreBoard {
        self.state.scoreboard()
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    /// True between a missed update and the snapshot that repairs it.
    pub fn awaiting_snapshot(&self) -> bool {
        self.awaiting_snapshot
    }

    pub fn set_seat(&mut self, client_id: u32, side: Option<Side>) {
        self.client_id = Some(client_id);
        self.side = side;
        match side {
            Some(side) => info!("Playing the {} side", side),
            None => info!("No seat free, watching"),
        }
    }

    /// Applies one `StateUpdate`. Only the update directly after the last
    /// one seen is applied; after a gap the mirror holds its last
    /// consistent state until a snapshot arrives.
    pub fn apply_update(&mut self, sequence: u32, updates: &[FieldUpdate]) -> Delivery {
        if let Some(last) = self.last_sequence {
            let ahead = sequence.wrapping_sub(last) as i32;
            if ahead <= 0 {
                debug!("Dropping stale update {} (have {})", sequence, last);
                return Delivery::Stale;
            }
            if self.awaiting_snapshot {
                debug!("Dropping update {} until resynchronised", sequence);
                return Delivery::Resyncing;
            }
            if ahead > 1 {
                warn!("Missed updates {}..{}", last.wrapping_add(1), sequence);
                self.awaiting_snapshot = true;
                return Delivery::Gap;
            }
        }

        self.replicate(updates);
        self.last_sequence = Some(sequence);
        Delivery::Applied
    }

    /// Applies a full `StateSnapshot` unless a newer update already arrived.
    pub fn apply_snapshot(&mut self, sequence: u32, updates: &[FieldUpdate]) -> bool {
        if let Some(last) = self.last_sequence {
            if (sequence.wrapping_sub(last) as i32) < 0 {
                debug!("Dropping stale snapshot {} (have {})", sequence, last);
                return false;
            }
        }
        self.replicate(updates);
        self.last_sequence = Some(sequence);
        self.awaiting_snapshot = false;
        true
    }

    fn replicate(&mut self, updates: &[FieldUpdate]) {
        if let Err(e) = self.state.replicate(updates) {
            error!("Failed to apply replicated state: {}", e);
        }
    }

    /// Buffers a ball snapshot. Samples older than the newest are dropped.
    pub fn record_ball(
        &mut self,
        tick: u32,
        state: BallState,
        position: Vec3,
        velocity: Vec3,
        received_at: Instant,
    ) {
        if let Some(latest) = self.ball_samples.back() {
            if (tick.wrapping_sub(latest.tick) as i32) <= 0 {
                return;
            }
        }
        self.ball_samples.push_back(BallSample {
            tick,
            state,
            position,
            velocity,
            received_at,
        });
        while self.ball_samples.len() > BALL_BUFFER_LEN {
            self.ball_samples.pop_front();
        }
    }

    pub fn latest_ball(&self) -> Option<&BallSample> {
        self.ball_samples.back()
    }

    /// Predicted ball position and velocity at `now`, extrapolated from the
    /// newest snapshot while the ball is in flight.
    pub fn predicted_ball(&self, now: Instant) -> Option<(Vec3, Vec3)> {
        let sample = self.ball_samples.back()?;
        let in_flight = matches!(sample.state, BallState::Waiting | BallState::Active);
        if !in_flight || self.session_state() != SessionState::Active {
            return Some((sample.position, sample.velocity));
        }

        let dt = now
            .saturating_duration_since(sample.received_at)
            .min(MAX_EXTRAPOLATION)
            .as_secs_f32();
        let gravity = Vec3::new(0.0, -BALL_GRAVITY, 0.0);
        let position = sample
            .position
            .add(&sample.velocity.scale(dt))
            .add(&gravity.scale(0.5 * dt * dt));
        let velocity = sample.velocity.add(&gravity.scale(dt));
        Some((position, velocity))
    }

    /// Paddle contact for a console swing, aimed at the predicted ball.
    /// Seatless peers have no paddle.
    pub fn hit(&self, now: Instant) -> Option<Packet> {
        let side = self.side?;
        let ball_velocity = self
            .predicted_ball(now)
            .map_or(Vec3::ZERO, |(_, velocity)| velocity);
        let (normal, velocity) = paddle_swing(side, ball_velocity, SWING_SPEED);
        Some(Packet::PaddleContact { normal, velocity })
    }
}

impl Default for PeerGame {
    fn default() -> Self {
        Self::new()
    }
}
