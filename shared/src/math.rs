use serde::{Deserialize, Serialize};

///Represents a vector in 3D space.
/// +y is up, +z points from the Home end of the table towards the Guest end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const FORWARD: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        self.dot(self).sqrt()
    }

    ///Returns the normalized vector, or zero for a zero-length vector.
    pub fn normalize(&self) -> Vec3 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec3::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    ///Returns the difference of two vectors.
    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    ///Mirrors the vector about a surface with the given normal.
    /// A zero normal leaves the vector untouched.
    pub fn reflect(&self, normal: &Vec3) -> Vec3 {
        let n = normal.normalize();
        if n == Vec3::ZERO {
            return *self;
        }
        self.sub(&n.scale(2.0 * self.dot(&n)))
    }

    ///Linear blend from `self` towards `target`; `t` is clamped to [0, 1].
    pub fn lerp(&self, target: &Vec3, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        self.add(&target.sub(self).scale(t))
    }

    ///Rescales the vector so its magnitude lies in `[min, max]`.
    /// The zero vector has no direction and is returned as-is.
    pub fn clamp_magnitude(&self, min: f32, max: f32) -> Vec3 {
        let mag = self.magnitude();
        if mag == 0.0 {
            return *self;
        }
        let clamped = mag.clamp(min, max.max(min));
        self.scale(clamped / mag)
    }
}
