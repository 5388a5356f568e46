//! Soft body: a particle arena plus springs indexing into it.

use crate::particle::Particle;
use crate::spring::Spring;
use crate::vector::Vector2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vector2,
    pub max: Vector2,
}

/// One piece on the board. Owns its particles and springs exclusively.
///
/// Springs only ever reference indices of `particles`; the arena can only
/// shrink through [`SoftBody::remove_particles`], which prunes and remaps
/// springs in the same call.
#[derive(Debug, Clone)]
pub struct SoftBody {
    pub(crate) id: BodyId,
    particles: Vec<Particle>,
    springs: Vec<Spring>,
    /// Palette index used by the grid and renderer.
    pub color: u8,
    /// Set once the body is promoted from active to settled.
    pub is_static: bool,
}

impl SoftBody {
    pub fn new(color: u8) -> Self {
        Self {
            id: BodyId(0),
            particles: Vec::new(),
            springs: Vec::new(),
            color,
            is_static: false,
        }
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    #[inline]
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn add_particle(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Spring between `a` and `b` resting at their current distance.
    /// Returns false (and adds nothing) for out-of-range or coincident endpoints.
    pub fn connect(&mut self, a: usize, b: usize, stiffness: f64, damping: f64) -> bool {
        if a == b || a >= self.particles.len() || b >= self.particles.len() {
            return false;
        }
        let rest = self.particles[a].position.distance(self.particles[b].position);
        if rest <= f64::EPSILON {
            return false;
        }
        self.springs.push(Spring::new(a, b, rest, stiffness, damping));
        true
    }

    /// Shift positions and previous positions alike so velocity is unchanged.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        let delta = Vector2::new(dx, dy);
        for p in &mut self.particles {
            p.translate(delta);
        }
    }

    /// Rotate about the centroid. Velocity and pending forces are zeroed
    /// afterwards so a spin input never flings the body.
    pub fn rotate(&mut self, angle: f64) {
        let Some(center) = self.centroid() else {
            return;
        };
        for p in &mut self.particles {
            if p.pinned {
                continue;
            }
            p.position = p.position.rotate_about(center, angle);
            p.previous_position = p.position;
            p.force_accum = Vector2::ZERO;
        }
    }

    pub fn centroid(&self) -> Option<Vector2> {
        if self.particles.is_empty() {
            return None;
        }
        let sum = self
            .particles
            .iter()
            .fold(Vector2::ZERO, |acc, p| acc + p.position);
        Some(sum / self.particles.len() as f64)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.particles.first()?.position;
        let init = BoundingBox {
            min: first,
            max: first,
        };
        Some(self.particles.iter().fold(init, |bb, p| BoundingBox {
            min: Vector2::new(bb.min.x.min(p.position.x), bb.min.y.min(p.position.y)),
            max: Vector2::new(bb.max.x.max(p.position.x), bb.max.y.max(p.position.y)),
        }))
    }

    /// Largest particle radius, 0 for an empty body.
    pub fn max_radius(&self) -> f64 {
        self.particles.iter().map(|p| p.radius).fold(0.0, f64::max)
    }

    /// Largest per-step displacement of any particle.
    pub fn max_speed(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| p.velocity().length())
            .fold(0.0, f64::max)
    }

    /// Cap every particle's per-step displacement at `max`.
    pub fn limit_speed(&mut self, max: f64) {
        for p in &mut self.particles {
            let v = p.velocity();
            let len = v.length();
            if len > max {
                p.set_velocity(v * (max / len));
            }
        }
    }

    pub fn apply_acceleration(&mut self, acceleration: Vector2) {
        for p in &mut self.particles {
            let force = acceleration * p.mass;
            p.apply_force(force);
        }
    }

    pub fn integrate(&mut self, dt: f64, velocity_retention: f64) {
        for p in &mut self.particles {
            p.integrate(dt, velocity_retention);
        }
    }

    pub fn resolve_springs(&mut self, dt: f64) {
        for s in &self.springs {
            s.apply_constraint_force(&mut self.particles, dt);
        }
    }

    pub fn clamp_to_bounds(&mut self, width: f64, height: f64, restitution: f64) {
        for p in &mut self.particles {
            p.clamp_to_bounds(width, height, restitution);
        }
    }

    /// Remove every particle matching `doomed`, pruning the springs that touch
    /// them first, then compacting the arena and remapping surviving springs.
    /// Returns the removed particles in their original order.
    pub fn remove_particles<F>(&mut self, mut doomed: F) -> Vec<Particle>
    where
        F: FnMut(&Particle) -> bool,
    {
        let marked: Vec<bool> = self.particles.iter().map(&mut doomed).collect();
        if !marked.contains(&true) {
            return Vec::new();
        }

        self.springs.retain(|s| {
            let (a, b) = s.endpoints();
            !marked[a] && !marked[b]
        });

        let mut new_index = vec![usize::MAX; marked.len()];
        let mut kept = Vec::with_capacity(self.particles.len());
        let mut removed = Vec::new();
        for (i, (p, gone)) in self.particles.drain(..).zip(marked).enumerate() {
            if gone {
                removed.push(p);
            } else {
                new_index[i] = kept.len();
                // forces from pruned springs must not outlive them
                kept.push(Particle {
                    force_accum: Vector2::ZERO,
                    ..p
                });
            }
        }
        self.particles = kept;
        for s in &mut self.springs {
            s.remap(&new_index);
        }
        removed
    }

    /// Every spring references two distinct particles of this body.
    pub fn is_consistent(&self) -> bool {
        let n = self.particles.len();
        self.springs.iter().all(|s| {
            let (a, b) = s.endpoints();
            a < n && b < n && a != b
        })
    }
}
