//! Piece shapes and the factory that turns them into soft bodies.

use crate::body::SoftBody;
use crate::particle::Particle;
use crate::vector::Vector2;

/// Tetromino kinds (I, O, T, S, Z, J, L).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

/// Spring parameters shared by every piece of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub stiffness: f64,
    pub damping: f64,
    /// Bend springs across straight runs are this fraction of `stiffness`.
    pub bend_ratio: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            stiffness: 3000.0,
            damping: 2400.0,
            bend_ratio: 0.5,
        }
    }
}

impl PieceKind {
    pub const ALL: [Self; 7] = [Self::I, Self::O, Self::T, Self::S, Self::Z, Self::J, Self::L];

    /// 4 cells relative to origin (0,0); each (dx, dy), y down.
    pub fn cells(&self) -> &'static [(i8, i8); 4] {
        match self {
            Self::I => &[(0, 0), (1, 0), (2, 0), (3, 0)],
            Self::O => &[(0, 0), (1, 0), (0, 1), (1, 1)],
            Self::T => &[(0, 0), (1, 0), (2, 0), (1, 1)],
            Self::S => &[(1, 0), (2, 0), (0, 1), (1, 1)],
            Self::Z => &[(0, 0), (1, 0), (1, 1), (2, 1)],
            Self::J => &[(0, 0), (0, 1), (1, 1), (2, 1)],
            Self::L => &[(2, 0), (0, 1), (1, 1), (2, 1)],
        }
    }

    /// Width of the shape in cells.
    pub fn span(&self) -> i8 {
        self.cells().iter().map(|(dx, _)| *dx).max().unwrap_or(0) + 1
    }

    /// Palette index 0..7 for `Theme::piece_color`.
    pub fn color_index(&self) -> u8 {
        match self {
            Self::S => 0, // Green
            Self::O => 1, // Yellow
            Self::Z => 2, // Red
            Self::J => 3, // Blue
            Self::T => 4, // Magenta
            Self::I => 5, // Cyan
            Self::L => 6, // Orange
        }
    }

    /// Build the mass-spring body for this shape with its top-left cell at
    /// `origin`. One particle per cell centre, radius half a cell; springs to
    /// every 8-neighbour plus bend springs along straight runs.
    pub fn build(&self, origin: Vector2, cell_size: f64, material: &Material) -> SoftBody {
        let cells = self.cells();
        let mut body = SoftBody::new(self.color_index());
        for &(dx, dy) in cells {
            let center = origin
                + Vector2::new(
                    (f64::from(dx) + 0.5) * cell_size,
                    (f64::from(dy) + 0.5) * cell_size,
                );
            body.add_particle(Particle::new(center).with_radius(cell_size * 0.5));
        }

        let has = |x: i8, y: i8| cells.contains(&(x, y));
        for (i, &(ax, ay)) in cells.iter().enumerate() {
            for (j, &(bx, by)) in cells.iter().enumerate().skip(i + 1) {
                let (ddx, ddy) = (bx - ax, by - ay);
                if ddx.abs() <= 1 && ddy.abs() <= 1 {
                    body.connect(i, j, material.stiffness, material.damping);
                } else if ddx == 0 || ddy == 0 {
                    let (sx, sy) = (ddx.signum(), ddy.signum());
                    let steps = ddx.abs().max(ddy.abs());
                    let straight = (1..steps).all(|k| has(ax + sx * k, ay + sy * k));
                    if straight {
                        body.connect(
                            i,
                            j,
                            material.stiffness * material.bend_ratio,
                            material.damping,
                        );
                    }
                }
            }
        }
        body
    }
}

/// Bag of 7 pieces (random order, then refill).
#[derive(Debug, Clone)]
pub struct Bag {
    queue: Vec<PieceKind>,
    rng: u32,
}

impl Bag {
    pub fn new(seed: u32) -> Self {
        let mut b = Self {
            queue: Vec::with_capacity(14),
            rng: seed,
        };
        b.refill();
        b
    }

    fn refill(&mut self) {
        let mut all = PieceKind::ALL.to_vec();
        // Fisher–Yates shuffle
        for i in (1..all.len()).rev() {
            let j = (self.next_rand() as usize) % (i + 1);
            all.swap(i, j);
        }
        self.queue.extend(all);
    }

    fn next_rand(&mut self) -> u32 {
        self.rng = self.rng.wrapping_mul(1_103_515_245).wrapping_add(12345);
        self.rng >> 16
    }

    pub fn next(&mut self) -> PieceKind {
        if self.queue.len() < 2 {
            self.refill();
        }
        self.queue.remove(0)
    }
}

impl Default for Bag {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}
