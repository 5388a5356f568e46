//! Damped Hooke spring between two particles of the same body.

use crate::particle::Particle;

/// Endpoints are indices into the owning body's particle arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    a: usize,
    b: usize,
    pub rest_length: f64,
    pub stiffness: f64,
    pub damping: f64,
}

impl Spring {
    pub fn new(a: usize, b: usize, rest_length: f64, stiffness: f64, damping: f64) -> Self {
        debug_assert!(a != b, "spring endpoints must differ");
        debug_assert!(rest_length > 0.0, "spring rest length must be positive");
        Self {
            a,
            b,
            rest_length,
            stiffness,
            damping,
        }
    }

    #[inline]
    pub fn endpoints(&self) -> (usize, usize) {
        (self.a, self.b)
    }

    /// Rewrite endpoints after the particle arena was compacted.
    pub(crate) fn remap(&mut self, new_index: &[usize]) {
        self.a = new_index[self.a];
        self.b = new_index[self.b];
    }

    /// Accumulate spring and damping forces on both endpoints.
    ///
    /// The damping term uses the implicit Verlet velocity, i.e. the
    /// displacement over the last step, so `damping` is per step. With
    /// `dt <= 0` only the elastic part is applied.
    pub fn apply_constraint_force(&self, particles: &mut [Particle], dt: f64) {
        let (pa, pb) = (&particles[self.a], &particles[self.b]);
        let delta = pb.position - pa.position;
        let dist = delta.length();
        if dist <= f64::EPSILON || !delta.is_finite() {
            return;
        }
        let dir = delta.normalize();
        let displacement = dist - self.rest_length;
        let damping = if dt > 0.0 {
            self.damping * (pb.velocity() - pa.velocity()).dot(dir)
        } else {
            0.0
        };
        let force = dir * (self.stiffness * displacement + damping);
        particles[self.a].apply_force(force);
        particles[self.b].apply_force(-force);
    }

    /// Current length relative to rest length minus one.
    pub fn strain(&self, particles: &[Particle]) -> f64 {
        let dist = particles[self.a].position.distance(particles[self.b].position);
        dist / self.rest_length - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector2;

    fn pair(distance: f64) -> Vec<Particle> {
        vec![
            Particle::new(Vector2::new(0.0, 0.0)),
            Particle::new(Vector2::new(distance, 0.0)),
        ]
    }

    #[test]
    fn test_stretched_spring_pulls_together() {
        let mut ps = pair(12.0);
        Spring::new(0, 1, 10.0, 2.0, 0.0).apply_constraint_force(&mut ps, 0.01);
        assert!((ps[0].force_accum.x - 4.0).abs() < 1e-12);
        assert!((ps[1].force_accum.x + 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_strain_is_relative_stretch() {
        let ps = pair(15.0);
        let s = Spring::new(0, 1, 10.0, 1.0, 0.0);
        assert!((s.strain(&ps) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_coincident_endpoints_are_skipped() {
        let mut ps = pair(0.0);
        Spring::new(0, 1, 10.0, 2.0, 0.5).apply_constraint_force(&mut ps, 0.01);
        assert_eq!(ps[0].force_accum, Vector2::ZERO);
        assert_eq!(ps[1].force_accum, Vector2::ZERO);
    }

    #[test]
    fn test_pinned_endpoint_takes_no_force() {
        let mut ps = pair(8.0);
        ps[0].pinned = true;
        Spring::new(0, 1, 10.0, 1.0, 0.0).apply_constraint_force(&mut ps, 0.01);
        assert_eq!(ps[0].force_accum, Vector2::ZERO);
        assert!((ps[1].force_accum.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_damping_resists_separation() {
        let mut ps = pair(10.0);
        ps[1].set_velocity(Vector2::new(0.1, 0.0));
        Spring::new(0, 1, 10.0, 0.0, 1.0).apply_constraint_force(&mut ps, 0.1);
        // relative velocity 0.1 along +x pulls b back
        assert!((ps[1].force_accum.x + 0.1).abs() < 1e-12);
        assert!((ps[0].force_accum.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_damping_does_not_scale_with_step_length() {
        let mut ps = pair(10.0);
        ps[1].set_velocity(Vector2::new(0.1, 0.0));
        let spring = Spring::new(0, 1, 10.0, 0.0, 0.05);
        spring.apply_constraint_force(&mut ps, 1.0 / 480.0);
        assert!((ps[0].force_accum.x - 0.005).abs() < 1e-12);

        let mut coarse = pair(10.0);
        coarse[1].set_velocity(Vector2::new(0.1, 0.0));
        spring.apply_constraint_force(&mut coarse, 1.0 / 60.0);
        assert_eq!(coarse[0].force_accum, ps[0].force_accum);
    }
}
