//! Line clears: sample settled bodies into the grid, find full rows and cut
//! the matching particles (and their springs) out of the bodies.

use crate::grid::OccupancyGrid;
use crate::world::PhysicsWorld;

/// How settled bodies are turned into cell occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    /// One sample per particle.
    #[default]
    Particles,
    /// Particles plus points every half cell along each spring, so a sparse
    /// or stretched body still covers the cells between its particles.
    Springs,
}

/// Receives clear events as they happen.
pub trait ClearObserver {
    fn particle_removed(&mut self, _x: f64, _y: f64, _color: u8) {}
    fn row_cleared(&mut self, _row: usize) {}
}

impl ClearObserver for () {}

#[derive(Debug, Clone, PartialEq)]
pub enum ClearEvent {
    ParticleRemoved { x: f64, y: f64, color: u8 },
    RowCleared(usize),
}

impl ClearObserver for Vec<ClearEvent> {
    fn particle_removed(&mut self, x: f64, y: f64, color: u8) {
        self.push(ClearEvent::ParticleRemoved { x, y, color });
    }

    fn row_cleared(&mut self, row: usize) {
        self.push(ClearEvent::RowCleared(row));
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineClearManager {
    pub sampling: SamplingMode,
    pub rows_cleared_total: u64,
}

impl LineClearManager {
    pub fn new(sampling: SamplingMode) -> Self {
        Self {
            sampling,
            rows_cleared_total: 0,
        }
    }

    /// Rebuild `grid` from the current positions of every settled body.
    /// The active body never contributes.
    pub fn sample(&self, world: &PhysicsWorld, grid: &mut OccupancyGrid) {
        grid.clear();
        let spacing = grid.cell_size() * 0.5;
        for body in world.settled_bodies() {
            let color = body.color;
            let particles = body.particles();
            for p in particles {
                if let Some((row, col)) = grid.cell_at(p.position.x, p.position.y) {
                    grid.lock_cell(row, col, color);
                }
            }
            if self.sampling == SamplingMode::Springs {
                for s in body.springs() {
                    let (a, b) = s.endpoints();
                    let (pa, pb) = (particles[a].position, particles[b].position);
                    let len = pa.distance(pb);
                    let steps = (len / spacing).floor() as usize;
                    for i in 1..steps {
                        let t = i as f64 / steps as f64;
                        let q = pa + (pb - pa) * t;
                        if let Some((row, col)) = grid.cell_at(q.x, q.y) {
                            grid.lock_cell(row, col, color);
                        }
                    }
                }
            }
        }
    }

    /// Run one clear pass. Returns the number of rows cleared.
    pub fn step<O: ClearObserver>(
        &mut self,
        world: &mut PhysicsWorld,
        grid: &mut OccupancyGrid,
        observer: &mut O,
    ) -> usize {
        self.sample(world, grid);
        let full = grid.full_rows();
        if full.is_empty() {
            return 0;
        }
        for &row in &full {
            observer.row_cleared(row);
        }

        let in_cleared_band = |y: f64| grid.row_of(y).is_some_and(|r| full.contains(&r));
        let mut removed_particles = 0usize;
        for body in world.settled_bodies_mut() {
            let color = body.color;
            let removed = body.remove_particles(|p| in_cleared_band(p.position.y));
            debug_assert!(body.is_consistent());
            removed_particles += removed.len();
            for p in removed {
                observer.particle_removed(p.position.x, p.position.y, color);
            }
        }
        for &row in &full {
            grid.clear_row(row);
        }
        let detached = world.remove_empty_bodies();

        log::debug!(
            "cleared rows {:?}: {} particles removed, {} bodies detached",
            full,
            removed_particles,
            detached.len()
        );
        self.rows_cleared_total += full.len() as u64;
        full.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::SoftBody;
    use crate::particle::Particle;
    use crate::vector::Vector2;
    use crate::world::{PhysicsConfig, WorldBounds};

    const CELL: f64 = 40.0;
    const ROWS: usize = 20;
    const COLS: usize = 10;

    fn setup() -> (PhysicsWorld, OccupancyGrid) {
        let world = PhysicsWorld::new(
            WorldBounds {
                width: COLS as f64 * CELL,
                height: ROWS as f64 * CELL,
            },
            PhysicsConfig {
                gravity: Vector2::ZERO,
                ..PhysicsConfig::default()
            },
        )
        .unwrap();
        (world, OccupancyGrid::new(ROWS, COLS, CELL).unwrap())
    }

    fn center(row: usize, col: usize) -> Vector2 {
        Vector2::new((col as f64 + 0.5) * CELL, (row as f64 + 0.5) * CELL)
    }

    /// Horizontal bar of particles at cell centres of `row`, columns `cols`,
    /// plus a second strand one row above, cross-linked.
    fn slab(row: usize, cols: std::ops::Range<usize>, color: u8) -> SoftBody {
        let mut body = SoftBody::new(color);
        let mut prev: Option<(usize, usize)> = None;
        for col in cols {
            let low = body.add_particle(Particle::new(center(row, col)));
            let high = body.add_particle(Particle::new(center(row - 1, col)));
            body.connect(low, high, 100.0, 1.0);
            if let Some((pl, ph)) = prev {
                body.connect(pl, low, 100.0, 1.0);
                body.connect(ph, high, 100.0, 1.0);
                body.connect(pl, high, 100.0, 1.0);
            }
            prev = Some((low, high));
        }
        body
    }

    /// Single strand of particles at cell centres of `row`.
    fn bar(row: usize, cols: std::ops::Range<usize>, color: u8) -> SoftBody {
        let mut body = SoftBody::new(color);
        for col in cols {
            let i = body.add_particle(Particle::new(center(row, col)));
            if i > 0 {
                body.connect(i - 1, i, 50.0, 0.5);
            }
        }
        body
    }

    fn particles_in_row(world: &PhysicsWorld, grid: &OccupancyGrid, row: usize) -> usize {
        world
            .bodies()
            .iter()
            .flat_map(|b| b.particles())
            .filter(|p| grid.row_of(p.position.y) == Some(row))
            .count()
    }

    #[test]
    fn test_full_row_is_cleared() {
        let (mut world, mut grid) = setup();
        let kept = world.add_body(slab(19, 0..6, 1));
        let gone = world.add_body(bar(19, 6..10, 2));
        let mut events = Vec::new();
        let mut lcm = LineClearManager::default();
        assert_eq!(lcm.step(&mut world, &mut grid, &mut events), 1);
        assert_eq!(particles_in_row(&world, &grid, 19), 0);
        assert_eq!(particles_in_row(&world, &grid, 18), 6);
        assert!(world.body(gone).is_none());
        assert_eq!(world.body(kept).unwrap().particles().len(), 6);
        assert_eq!(events[0], ClearEvent::RowCleared(19));
        let removed = events
            .iter()
            .filter(|e| matches!(e, ClearEvent::ParticleRemoved { .. }))
            .count();
        assert_eq!(removed, 10);
        for body in world.bodies() {
            assert!(body.is_consistent());
            // horizontal links of the upper strand survive
            assert!(!body.springs().is_empty());
        }
        assert_eq!(lcm.rows_cleared_total, 1);
    }

    #[test]
    fn test_partial_row_is_kept() {
        let (mut world, mut grid) = setup();
        world.add_body(slab(19, 0..9, 1));
        let mut lcm = LineClearManager::default();
        assert_eq!(lcm.step(&mut world, &mut grid, &mut ()), 0);
        assert_eq!(particles_in_row(&world, &grid, 19), 9);
        assert_eq!(grid.row_fill(19), 9);
    }

    #[test]
    fn test_active_body_is_ignored() {
        let (mut world, mut grid) = setup();
        world.add_body(bar(19, 0..5, 1));
        let active = world.add_body(bar(19, 5..10, 2));
        world.set_active(active);
        let mut lcm = LineClearManager::default();
        assert_eq!(lcm.step(&mut world, &mut grid, &mut ()), 0);
        world.promote_active();
        assert_eq!(lcm.step(&mut world, &mut grid, &mut ()), 1);
    }

    #[test]
    fn test_body_fully_inside_band_is_detached() {
        let (mut world, mut grid) = setup();
        let id = world.add_body(bar(19, 0..10, 3));
        let keeper = world.add_body(slab(18, 2..4, 1));
        let mut lcm = LineClearManager::default();
        assert_eq!(lcm.step(&mut world, &mut grid, &mut ()), 1);
        assert!(world.body(id).is_none());
        assert!(world.body(keeper).is_some());
    }

    #[test]
    fn test_spring_sampling_fills_gaps() {
        let (mut world, mut grid) = setup();
        let mut sparse = SoftBody::new(4);
        let a = sparse.add_particle(Particle::new(center(19, 0)));
        let b = sparse.add_particle(Particle::new(center(19, 9)));
        sparse.connect(a, b, 10.0, 0.0);
        world.add_body(sparse);

        let by_particles = LineClearManager::new(SamplingMode::Particles);
        by_particles.sample(&world, &mut grid);
        assert_eq!(grid.row_fill(19), 2);

        let mut by_springs = LineClearManager::new(SamplingMode::Springs);
        assert_eq!(by_springs.step(&mut world, &mut grid, &mut ()), 1);
        assert!(world.bodies().is_empty());
    }

    /// Tiny LCG so the random clears are reproducible.
    struct Lcg(u32);

    impl Lcg {
        fn next(&mut self) -> u32 {
            self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            self.0 >> 16
        }
    }

    #[test]
    fn test_random_clears_never_leave_dangling_springs() {
        let mut rng = Lcg(0xC0FF_EE11);
        for _round in 0..25 {
            let (mut world, mut grid) = setup();
            for _ in 0..6 {
                let mut body = SoftBody::new((rng.next() % 7) as u8);
                let n = 4 + (rng.next() % 12) as usize;
                for _ in 0..n {
                    let row = (rng.next() as usize) % ROWS;
                    let col = (rng.next() as usize) % COLS;
                    body.add_particle(Particle::new(center(row, col)));
                }
                for _ in 0..n * 2 {
                    let a = (rng.next() as usize) % n;
                    let b = (rng.next() as usize) % n;
                    body.connect(a, b, 10.0, 0.1);
                }
                world.add_body(body);
            }
            for _ in 0..8 {
                // force a random row full with a filler body
                let row = (rng.next() as usize) % ROWS;
                world.add_body(bar(row, 0..COLS, 0));
                let before = particles_in_row(&world, &grid, row);
                let cleared = LineClearManager::default().step(&mut world, &mut grid, &mut ());
                assert!(cleared >= 1);
                assert!(before >= COLS);
                assert_eq!(particles_in_row(&world, &grid, row), 0);
                for body in world.bodies() {
                    assert!(body.is_consistent());
                    assert!(!body.is_empty());
                }
            }
        }
    }
}
