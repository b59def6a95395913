use crate::physics::{Contact, KinematicBody, TableGeometry};
use log::{debug, error, info};
use shared::ball::{paddle_swing, SWING_SPEED};
use shared::{
    Command, CommandRouter, CoreError, FieldUpdate, MatchConfig, Packet, Participant, RigidBody,
    Session, SessionState, Side, Vec3,
};

/// The authoritative match: session, command routing and the simulated ball.
pub struct HostGame {
    session: Session,
    router: CommandRouter,
    body: KinematicBody,
    table: TableGeometry,
    pub tick: u32,
    sequence: u32,
    auto_start: bool,
}

impl HostGame {
    pub fn new(config: MatchConfig, auto_start: bool) -> Self {
        let body = KinematicBody::new(config.host_serve_location);
        let session = Session::new(config, Some(Box::new(body.clone())));
        Self {
            session,
            router: CommandRouter::new(),
            body,
            table: TableGeometry::default(),
            tick: 0,
            sequence: 0,
            auto_start,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Registers a newly connected peer and returns the seat it got.
    pub fn join(&mut self, client_id: u32) -> Option<Side> {
        let side = self.router.seat(client_id);
        let idle = self.session.session_state() == SessionState::Inactive;
        if side.is_some() && self.auto_start && idle {
            info!("Auto-starting match");
            self.router.request_start(Participant::Host);
        }
        side
    }

    /// Drops a peer. Losing the seated opponent pauses the match.
    pub fn leave(&mut self, client_id: u32) -> Vec<Packet> {
        if !self.router.vacate(client_id) {
            return Vec::new();
        }
        if let Err(e) = self.session.on_participant_disconnected() {
            error!("Disconnect handling failed: {}", e);
        }
        let batch = self.session.publish();
        self.stamp(vec![batch])
    }

    /// Queues a command for the next tick.
    pub fn request(&mut self, from: Participant, command: Command) {
        debug!("{:?} requests {}", from, command);
        self.router.request_change(from, command);
    }

    /// Applies a paddle contact for the side `from` plays.
    pub fn paddle_contact(
        &mut self,
        from: Participant,
        normal: Vec3,
        velocity: Vec3,
    ) -> Vec<Packet> {
        let Some(side) = self.router.side_of(from) else {
            debug!("Ignoring paddle contact from seatless {:?}", from);
            return Vec::new();
        };
        report(self.session.on_paddle_contact(side, normal, velocity));
        let batch = self.session.publish();
        self.stamp(vec![batch])
    }

    /// Console hit by the host.
    pub fn swing(&mut self) -> Vec<Packet> {
        let (normal, incoming) = paddle_swing(Side::Home, self.body.velocity(), SWING_SPEED);
        self.paddle_contact(Participant::Host, normal, incoming)
    }

    /// Runs queued commands, steps the simulator and the match clock, and
    /// returns the state updates to broadcast.
    pub fn tick(&mut self, dt: f32) -> Vec<Packet> {
        let mut batches = self.router.dispatch(&mut self.session);

        match self.table.step(&self.body, dt) {
            Some(Contact::TableSide(side)) => {
                report(self.session.on_table_side_entered(side));
            }
            Some(Contact::Floor) => {
                report(self.session.on_floor_contact());
            }
            None => {}
        }
        report(self.session.on_fixed_tick(dt));
        batches.push(self.session.publish());

        self.tick = self.tick.wrapping_add(1);
        self.stamp(batches)
    }

    /// Wraps non-empty batches into sequenced update packets.
    fn stamp(&mut self, batches: Vec<Vec<FieldUpdate>>) -> Vec<Packet> {
        batches
            .into_iter()
            .filter(|batch| !batch.is_empty())
            .map(|updates| {
                self.sequence = self.sequence.wrapping_add(1);
                Packet::StateUpdate {
                    sequence: self.sequence,
                    updates,
                }
            })
            .collect()
    }

    /// Full state for a late joiner or a peer that missed an update.
    pub fn snapshot(&self) -> Packet {
        Packet::StateSnapshot {
            sequence: self.sequence,
            updates: self.session.state().snapshot(),
        }
    }

    pub fn ball_snapshot(&self) -> Packet {
        let ball = self.session.ball();
        Packet::BallSnapshot {
            tick: self.tick,
            state: ball.state(),
            position: ball.position(),
            velocity: ball.velocity(),
        }
    }
}

fn report(result: Result<(), CoreError>) {
    if let Err(e) = result {
        if e.is_guard_failure() {
            debug!("{}", e);
        } else {
            error!("{}", e);
        }
    }
}
