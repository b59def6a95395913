use log::debug;
use parking_lot::Mutex;
use shared::{ForceMode, RigidBody, Side, Vec3};
use std::sync::Arc;

pub const GRAVITY: f32 = 9.81;

///Motion state of a simulated ball body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub velocity: Vec3,
    ///Acceleration applied during the next step only.
    pub pending_acceleration: Vec3,
    pub mass: f32,
    pub gravity: f32,
    pub gravity_enabled: bool,
}

impl Default for BodyState {
    fn default() -> Self {
        BodyState {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            pending_acceleration: Vec3::ZERO,
            mass: 0.0027,
            gravity: GRAVITY,
            gravity_enabled: false,
        }
    }
}

///Shared handle on a point-mass body.
/// The ball holds one clone as its rigid body, the simulator steps another.
#[derive(Debug, Clone, Default)]
pub struct KinematicBody {
    inner: Arc<Mutex<BodyState>>,
}

impl KinematicBody {
    pub fn new(position: Vec3) -> Self {
        let body = KinematicBody::default();
        body.inner.lock().position = position;
        body
    }

    pub fn state(&self) -> BodyState {
        *self.inner.lock()
    }

    ///Integrates one step and returns the positions before and after it.
    pub fn simulate(&self, dt: f32) -> (Vec3, Vec3) {
        let mut body = self.inner.lock();
        let mut total_acceleration = body.pending_acceleration;
        if body.gravity_enabled {
            total_acceleration.y -= body.gravity;
        }
        body.pending_acceleration = Vec3::ZERO;

        body.velocity = body.velocity.add(&total_acceleration.scale(dt));

        let before = body.position;
        body.position = body.position.add(&body.velocity.scale(dt));
        (before, body.position)
    }

    fn with<R>(&self, f: impl FnOnce(&mut BodyState) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl RigidBody for KinematicBody {
    fn velocity(&self) -> Vec3 {
        self.inner.lock().velocity
    }

    fn apply_velocity(&mut self, velocity: Vec3) {
        self.with(|body| body.velocity = velocity);
    }

    fn apply_force(&mut self, force: Vec3, mode: ForceMode) {
        self.with(|body| {
            let inverse_mass = if body.mass > 0.0 { 1.0 / body.mass } else { 0.0 };
            match mode {
                ForceMode::Force => {
                    body.pending_acceleration =
                        body.pending_acceleration.add(&force.scale(inverse_mass))
                }
                ForceMode::Acceleration => {
                    body.pending_acceleration = body.pending_acceleration.add(&force)
                }
                ForceMode::Impulse => body.velocity = body.velocity.add(&force.scale(inverse_mass)),
                ForceMode::VelocityChange => body.velocity = body.velocity.add(&force),
            }
        });
    }

    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.with(|body| body.gravity_enabled = enabled);
    }

    fn position(&self) -> Vec3 {
        self.inner.lock().position
    }

    fn set_position(&mut self, position: Vec3) {
        self.with(|body| body.position = position);
    }
}

///A contact event reported to the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    TableSide(Side),
    Floor,
}

///Table tennis table centred on the origin, net across z = 0.
/// Home owns the negative z half.
#[derive(Debug, Clone, Copy)]
pub struct TableGeometry {
    pub surface_height: f32,
    pub half_length: f32,
    pub half_width: f32,
    pub floor_height: f32,
    ///Fraction of vertical speed kept on a table bounce.
    pub restitution: f32,
}

impl Default for TableGeometry {
    fn default() -> Self {
        TableGeometry {
            surface_height: 0.76,
            half_length: 1.37,
            half_width: 0.7625,
            floor_height: 0.0,
            restitution: 0.9,
        }
    }
}

impl TableGeometry {
    ///Half of the table under `position`, if it is over the table at all.
    pub fn side_at(&self, position: Vec3) -> Option<Side> {
        let over_table =
            position.x.abs() <= self.half_width && position.z.abs() <= self.half_length;
        if !over_table {
            return None;
        }
        if position.z < 0.0 {
            Some(Side::Home)
        } else {
            Some(Side::Guest)
        }
    }

    ///Classifies the motion from `before` to `after`.
    pub fn detect(&self, before: Vec3, after: Vec3) -> Option<Contact> {
        if after.y <= self.floor_height {
            return Some(Contact::Floor);
        }
        let crossed_surface = before.y >= self.surface_height && after.y < self.surface_height;
        if crossed_surface {
            return self.side_at(after).map(Contact::TableSide);
        }
        None
    }

    ///Advances `body` by one step, bouncing it off the table surface and
    /// stopping it on the floor.
    pub fn step(&self, body: &KinematicBody, dt: f32) -> Option<Contact> {
        let (before, after) = body.simulate(dt);
        let contact = self.detect(before, after);
        match contact {
            Some(Contact::TableSide(side)) => {
                debug!("Bounce on {} half at {:?}", side, after);
                body.with(|state| {
                    state.position.y = self.surface_height;
                    state.velocity.y = state.velocity.y.abs() * self.restitution;
                });
            }
            Some(Contact::Floor) => {
                body.with(|state| {
                    state.position.y = self.floor_height;
                    state.velocity = Vec3::ZERO;
                    state.gravity_enabled = false;
                });
            }
            None => {}
        }
        contact
    }
}
