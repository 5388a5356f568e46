//! Physics world: owns every soft body and advances them with sub-stepping.

use crate::body::{BodyId, SoftBody};
use crate::particle::DEFAULT_VELOCITY_RETENTION;
use crate::vector::Vector2;
use thiserror::Error;

pub const DEFAULT_SUB_STEPS: u32 = 8;
pub const DEFAULT_WALL_RESTITUTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("world bounds must be positive, got {width}x{height}")]
    InvalidBounds { width: f64, height: f64 },
    #[error("sub-step count must be at least 1")]
    ZeroSubSteps,
}

/// Numeric knobs for [`PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    pub gravity: Vector2,
    pub sub_steps: u32,
    pub velocity_retention: f64,
    pub wall_restitution: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vector2::new(0.0, 500.0),
            sub_steps: DEFAULT_SUB_STEPS,
            velocity_retention: DEFAULT_VELOCITY_RETENTION,
            wall_restitution: DEFAULT_WALL_RESTITUTION,
        }
    }
}

/// All bodies of a session. The falling piece is one of `bodies`, marked by
/// `active`, so it can be promoted to settled in place.
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    bodies: Vec<SoftBody>,
    pub gravity: Vector2,
    bounds: WorldBounds,
    sub_steps: u32,
    pub velocity_retention: f64,
    pub wall_restitution: f64,
    active: Option<BodyId>,
    next_id: u64,
}

impl PhysicsWorld {
    pub fn new(bounds: WorldBounds, config: PhysicsConfig) -> Result<Self, ConfigError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(bounds.width) || !positive(bounds.height) {
            return Err(ConfigError::InvalidBounds {
                width: bounds.width,
                height: bounds.height,
            });
        }
        if config.sub_steps == 0 {
            return Err(ConfigError::ZeroSubSteps);
        }
        Ok(Self {
            bodies: Vec::new(),
            gravity: config.gravity,
            bounds,
            sub_steps: config.sub_steps,
            velocity_retention: config.velocity_retention,
            wall_restitution: config.wall_restitution,
            active: None,
            next_id: 1,
        })
    }

    #[inline]
    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    #[inline]
    pub fn sub_steps(&self) -> u32 {
        self.sub_steps
    }

    #[inline]
    pub fn bodies(&self) -> &[SoftBody] {
        &self.bodies
    }

    /// Take ownership of `body`, giving it a fresh id. Callers that spawn a
    /// falling piece follow up with [`PhysicsWorld::set_active`].
    pub fn add_body(&mut self, mut body: SoftBody) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        body.id = id;
        self.bodies.push(body);
        id
    }

    pub fn body(&self, id: BodyId) -> Option<&SoftBody> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut SoftBody> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    /// Mark `id` as the falling piece. Returns false if no such body exists.
    pub fn set_active(&mut self, id: BodyId) -> bool {
        let Some(body) = self.body_mut(id) else {
            return false;
        };
        body.is_static = false;
        self.active = Some(id);
        true
    }

    #[inline]
    pub fn active_id(&self) -> Option<BodyId> {
        self.active
    }

    pub fn active_body(&self) -> Option<&SoftBody> {
        self.active.and_then(|id| self.body(id))
    }

    pub fn active_body_mut(&mut self) -> Option<&mut SoftBody> {
        let id = self.active?;
        self.body_mut(id)
    }

    /// Turn the active body into a settled one.
    pub fn promote_active(&mut self) -> Option<BodyId> {
        let id = self.active.take()?;
        if let Some(body) = self.body_mut(id) {
            body.is_static = true;
        }
        Some(id)
    }

    pub fn settled_bodies(&self) -> impl Iterator<Item = &SoftBody> {
        let active = self.active;
        self.bodies.iter().filter(move |b| Some(b.id) != active)
    }

    pub fn settled_bodies_mut(&mut self) -> impl Iterator<Item = &mut SoftBody> {
        let active = self.active;
        self.bodies.iter_mut().filter(move |b| Some(b.id) != active)
    }

    /// Detach settled bodies with no particles left; returns their ids.
    pub fn remove_empty_bodies(&mut self) -> Vec<BodyId> {
        let active = self.active;
        let mut removed = Vec::new();
        self.bodies.retain(|b| {
            let drop = b.is_empty() && Some(b.id) != active;
            if drop {
                removed.push(b.id);
            }
            !drop
        });
        removed
    }

    pub fn particle_count(&self) -> usize {
        self.bodies.iter().map(|b| b.particles().len()).sum()
    }

    /// Kinetic energy measured in per-step displacement units.
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies
            .iter()
            .flat_map(SoftBody::particles)
            .map(|p| 0.5 * p.mass * p.velocity().length_squared())
            .sum()
    }

    /// Length of one sub-step for a frame of `dt`.
    #[inline]
    pub fn sub_step_dt(&self, dt: f64) -> f64 {
        dt / f64::from(self.sub_steps)
    }

    /// Advance the simulation by `dt` seconds in `sub_steps` equal slices:
    /// gravity, Verlet integration, one spring force pass, bound clamping.
    pub fn step(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let h = self.sub_step_dt(dt);
        let WorldBounds { width, height } = self.bounds;
        for _ in 0..self.sub_steps {
            for body in &mut self.bodies {
                body.apply_acceleration(self.gravity);
                body.integrate(h, self.velocity_retention);
                body.resolve_springs(h);
                body.clamp_to_bounds(width, height, self.wall_restitution);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;

    const DT: f64 = 1.0 / 60.0;

    fn world(gravity: Vector2) -> PhysicsWorld {
        let config = PhysicsConfig {
            gravity,
            ..PhysicsConfig::default()
        };
        PhysicsWorld::new(
            WorldBounds {
                width: 400.0,
                height: 800.0,
            },
            config,
        )
        .unwrap()
    }

    fn square(origin: Vector2, size: f64, stiffness: f64, damping: f64) -> SoftBody {
        let mut body = SoftBody::new(0);
        for (x, y) in [(0.0, 0.0), (size, 0.0), (0.0, size), (size, size)] {
            body.add_particle(Particle::new(origin + Vector2::new(x, y)));
        }
        for (a, b) in [(0, 1), (2, 3), (0, 2), (1, 3), (0, 3), (1, 2)] {
            body.connect(a, b, stiffness, damping);
        }
        body
    }

    #[test]
    fn test_rejects_bad_config() {
        let bounds = WorldBounds {
            width: 0.0,
            height: 10.0,
        };
        assert!(matches!(
            PhysicsWorld::new(bounds, PhysicsConfig::default()),
            Err(ConfigError::InvalidBounds { .. })
        ));
        let bounds = WorldBounds {
            width: 10.0,
            height: 10.0,
        };
        let config = PhysicsConfig {
            sub_steps: 0,
            ..PhysicsConfig::default()
        };
        assert_eq!(
            PhysicsWorld::new(bounds, config).unwrap_err(),
            ConfigError::ZeroSubSteps
        );
    }

    #[test]
    fn test_spring_rest_state_is_stable() {
        let mut w = world(Vector2::ZERO);
        let mut body = SoftBody::new(0);
        let a = body.add_particle(Particle::new(Vector2::new(100.0, 100.0)));
        let b = body.add_particle(Particle::new(Vector2::new(130.0, 140.0)));
        assert!(body.connect(a, b, 500.0, 5.0));
        let id = w.add_body(body);
        for _ in 0..2000 {
            w.step(DT);
        }
        let ps = w.body(id).unwrap().particles();
        assert!((ps[0].position.distance(ps[1].position) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_energy_bounded_without_gravity() {
        let mut w = world(Vector2::ZERO);
        let mut body = square(Vector2::new(150.0, 300.0), 40.0, 3000.0, 2400.0);
        // start deformed but at rest
        for (i, p) in body.particles_mut().iter_mut().enumerate() {
            let nudge = Vector2::new(if i % 2 == 0 { -4.0 } else { 4.0 }, 0.0);
            p.position += nudge;
            p.previous_position = p.position;
        }
        w.add_body(body);
        let mut peak = 0.0_f64;
        for _ in 0..1000 {
            w.step(DT);
            let e = w.kinetic_energy();
            assert!(e.is_finite());
            peak = peak.max(e);
        }
        assert!(peak < 10.0, "peak energy {peak}");
        assert!(w.kinetic_energy() <= peak);
    }

    #[test]
    fn test_particle_never_ends_below_floor() {
        let mut w = world(Vector2::new(0.0, 500.0));
        let mut body = SoftBody::new(0);
        let i = body.add_particle(Particle::new(Vector2::new(200.0, 780.0)));
        body.particles_mut()[i].set_velocity(Vector2::new(0.0, 50.0));
        let id = w.add_body(body);
        for _ in 0..120 {
            w.step(DT);
            let p = &w.body(id).unwrap().particles()[0];
            assert!(p.position.y <= 800.0);
        }
    }

    #[test]
    fn test_square_drop_comes_to_rest_on_floor() {
        let mut w = world(Vector2::new(0.0, 500.0));
        let id = w.add_body(square(Vector2::ZERO, 10.0, 0.3, 0.05));
        for _ in 0..1800 {
            w.step(DT);
        }
        let body = w.body(id).unwrap();
        for p in body.particles() {
            assert!(p.position.y <= 800.0);
            assert!(p.position.y >= 800.0 - p.radius - 1e-9, "y = {}", p.position.y);
            assert_eq!(p.velocity().y, 0.0);
        }
        let before: Vec<_> = body.particles().iter().map(|p| p.position).collect();
        for _ in 0..60 {
            w.step(DT);
        }
        let body = w.body(id).unwrap();
        for (p, old) in body.particles().iter().zip(before) {
            assert!((p.position - old).length() < 0.5, "still drifting");
            assert!(p.velocity().length() < 1e-2);
        }
    }

    #[test]
    fn test_promote_and_remove_empty() {
        let mut w = world(Vector2::ZERO);
        let settled = w.add_body(SoftBody::new(1));
        let falling = w.add_body(SoftBody::new(2));
        assert!(w.set_active(falling));
        assert_eq!(w.settled_bodies().count(), 1);
        // the active body survives even when empty
        assert_eq!(w.remove_empty_bodies(), vec![settled]);
        assert_eq!(w.promote_active(), Some(falling));
        assert!(w.body(falling).unwrap().is_static);
        assert_eq!(w.remove_empty_bodies(), vec![falling]);
        assert!(w.bodies().is_empty());
    }
}
