//! Verlet point mass.

use crate::vector::Vector2;

/// Radius used when a particle is created without an explicit one.
pub const DEFAULT_RADIUS: f64 = 4.0;

/// Fraction of the implicit velocity kept each integration step (cheap drag).
pub const DEFAULT_VELOCITY_RETENTION: f64 = 0.99;

/// A point mass. Velocity is implicit: `position - previous_position`.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vector2,
    pub previous_position: Vector2,
    /// Pinned particles are never moved by integration, springs or clamping.
    pub pinned: bool,
    pub force_accum: Vector2,
    pub radius: f64,
    pub mass: f64,
}

impl Particle {
    pub fn new(position: Vector2) -> Self {
        Self {
            position,
            previous_position: position,
            pinned: false,
            force_accum: Vector2::ZERO,
            radius: DEFAULT_RADIUS,
            mass: 1.0,
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    #[inline]
    pub fn apply_force(&mut self, force: Vector2) {
        if !self.pinned {
            self.force_accum += force;
        }
    }

    /// One Verlet step. The force accumulator is always consumed.
    pub fn integrate(&mut self, dt: f64, velocity_retention: f64) {
        let force = std::mem::replace(&mut self.force_accum, Vector2::ZERO);
        if self.pinned || dt <= 0.0 {
            return;
        }
        let mass = if self.mass > 0.0 { self.mass } else { 1.0 };
        let inertia = (self.position - self.previous_position) * velocity_retention;
        let next = self.position + inertia + force * (dt * dt / mass);
        self.previous_position = self.position;
        self.position = next;
    }

    /// Displacement over the last step.
    #[inline]
    pub fn velocity(&self) -> Vector2 {
        self.position - self.previous_position
    }

    /// Overwrite the implicit velocity by moving `previous_position`.
    #[inline]
    pub fn set_velocity(&mut self, velocity: Vector2) {
        self.previous_position = self.position - velocity;
    }

    #[inline]
    pub fn translate(&mut self, delta: Vector2) {
        self.position += delta;
        self.previous_position += delta;
    }

    /// Keep the particle's disk inside `[0, width] x [0, height]`.
    ///
    /// Side walls reflect horizontal velocity scaled by `restitution`; the
    /// floor and ceiling stop vertical motion dead.
    pub fn clamp_to_bounds(&mut self, width: f64, height: f64, restitution: f64) {
        if self.pinned {
            return;
        }
        let r = self.radius.max(0.0);
        let v = self.velocity();

        let (left, right) = (r, width - r);
        if left <= right {
            if self.position.x < left {
                self.position.x = left;
                self.previous_position.x = left + v.x * restitution;
            } else if self.position.x > right {
                self.position.x = right;
                self.previous_position.x = right + v.x * restitution;
            }
        }

        let (top, floor) = (r, height - r);
        if top <= floor {
            if self.position.y > floor {
                self.position.y = floor;
                self.previous_position.y = floor;
            } else if self.position.y < top {
                self.position.y = top;
                self.previous_position.y = top;
            }
        }
    }
}
