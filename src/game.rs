//! Game session: physics world, occupancy grid, active piece, line clears, score.

use crate::GameConfig;
use crate::grid::{GridError, OccupancyGrid};
use crate::line_clear::{ClearObserver, LineClearManager};
use crate::pieces::{Bag, Material, PieceKind};
use crate::vector::Vector2;
use crate::world::{ConfigError, PhysicsWorld, WorldBounds};
use std::f64::consts::FRAC_PI_2;
use thiserror::Error;

/// Spawn zone: settled mass in the top N rows ends the game.
const SPAWN_ZONE_ROWS: usize = 2;

/// Score per simultaneous clear (1, 2, 3, 4+ rows), multiplied by level.
const LINE_SCORES: [u32; 4] = [100, 300, 500, 800];

/// Active-piece fall speed at level 1, in cells per second.
const BASE_FALL_CELLS_PER_SEC: f64 = 2.5;

/// Seconds a spark from a destroyed particle stays visible.
const SPARK_LIFETIME: f64 = 0.6;

/// Slack when deciding whether the active piece touches the floor.
const FLOOR_EPSILON: f64 = 0.5;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),
    #[error("invalid physics config: {0}")]
    World(#[from] ConfigError),
}

/// Short-lived visual left behind by a particle removed in a line clear.
#[derive(Debug, Clone, PartialEq)]
pub struct Spark {
    pub position: Vector2,
    pub velocity: Vector2,
    pub color: u8,
    pub age: f64,
}

/// What happened during one [`GameSession::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub rows_cleared: usize,
    pub settled: bool,
}

/// Collects clear events into sparks and a list of cleared rows.
struct ClearEffects<'a> {
    sparks: &'a mut Vec<Spark>,
    rows: &'a mut Vec<usize>,
}

impl ClearObserver for ClearEffects<'_> {
    fn particle_removed(&mut self, x: f64, y: f64, color: u8) {
        // alternate drift direction so a cleared row bursts outwards
        let side = if self.sparks.len() % 2 == 0 { -1.0 } else { 1.0 };
        self.sparks.push(Spark {
            position: Vector2::new(x, y),
            velocity: Vector2::new(side * 30.0, -60.0),
            color,
            age: 0.0,
        });
    }

    fn row_cleared(&mut self, row: usize) {
        self.rows.push(row);
    }
}

/// Everything one game owns. No globals: the app passes this around by reference.
#[derive(Debug)]
pub struct GameSession {
    pub world: PhysicsWorld,
    pub grid: OccupancyGrid,
    clears: LineClearManager,
    bag: Bag,
    pub next_pieces: Vec<PieceKind>,
    pub active_kind: Option<PieceKind>,
    material: Material,
    /// Seconds the active piece must rest on the floor before it settles.
    lock_delay: f64,
    landed_for: f64,
    relaxed: bool,
    initial_level: u32,
    pub score: u32,
    pub level: u32,
    pub lines_cleared: u32,
    pub pieces_settled: u32,
    pub game_over: bool,
    pub sparks: Vec<Spark>,
    /// Rows cleared by the most recent tick (for the flash effect).
    pub last_cleared_rows: Vec<usize>,
}

impl GameSession {
    pub fn new(config: &GameConfig) -> Result<Self, SessionError> {
        let grid = OccupancyGrid::new(config.rows, config.cols, config.cell_size)?;
        let bounds = WorldBounds {
            width: grid.world_width(),
            height: grid.world_height(),
        };
        let world = PhysicsWorld::new(bounds, config.physics)?;
        let mut bag = Bag::new(config.seed);
        let next_pieces = vec![bag.next(), bag.next(), bag.next()];
        let initial_level = config.initial_level.max(1);
        let mut session = Self {
            world,
            grid,
            clears: LineClearManager::new(config.sampling),
            bag,
            next_pieces,
            active_kind: None,
            material: config.material,
            lock_delay: config.lock_delay_ms as f64 / 1000.0,
            landed_for: 0.0,
            relaxed: config.relaxed,
            initial_level,
            score: 0,
            level: initial_level,
            lines_cleared: 0,
            pieces_settled: 0,
            game_over: false,
            sparks: Vec::new(),
            last_cleared_rows: Vec::new(),
        };
        session.spawn_next();
        log::info!(
            "session started: {}x{} cells of {} units, {} sub-steps",
            config.cols,
            config.rows,
            config.cell_size,
            session.world.sub_steps()
        );
        Ok(session)
    }

    /// Active-piece fall speed cap in world units per second.
    pub fn fall_speed(&self) -> f64 {
        let cells = if self.relaxed {
            BASE_FALL_CELLS_PER_SEC
        } else {
            BASE_FALL_CELLS_PER_SEC * (1.0 + f64::from(self.level.saturating_sub(1)) * 0.15)
        };
        cells * self.grid.cell_size()
    }

    /// One frame: integrate, settle the active piece if it has rested long
    /// enough, then run line clears against the settled bodies.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        let mut report = TickReport::default();
        if self.game_over {
            return report;
        }
        self.world.step(dt);

        if self.update_active(dt) {
            self.lock_active();
            report.settled = true;
        }

        self.last_cleared_rows.clear();
        let mut effects = ClearEffects {
            sparks: &mut self.sparks,
            rows: &mut self.last_cleared_rows,
        };
        let rows = self.clears.step(&mut self.world, &mut self.grid, &mut effects);
        if rows > 0 {
            self.award(rows);
        }
        report.rows_cleared = rows;
        self.tick_sparks(dt);
        report
    }

    /// Cap the active piece's fall speed and track how long it has rested on
    /// the floor. Returns true once it should settle.
    fn update_active(&mut self, dt: f64) -> bool {
        let max_step = self.fall_speed() * self.world.sub_step_dt(dt);
        let floor = self.world.bounds().height;
        let Some(body) = self.world.active_body_mut() else {
            return false;
        };
        body.limit_speed(max_step);
        let resting = body
            .particles()
            .iter()
            .any(|p| p.position.y + p.radius >= floor - FLOOR_EPSILON);
        if resting {
            self.landed_for += dt.max(0.0);
        } else {
            self.landed_for = 0.0;
        }
        resting && self.landed_for >= self.lock_delay
    }

    /// Promote the active piece to settled and bring in the next one, unless
    /// settled mass already reaches into the spawn zone.
    fn lock_active(&mut self) {
        let Some(id) = self.world.promote_active() else {
            return;
        };
        self.pieces_settled += 1;
        self.landed_for = 0.0;
        let kind = self.active_kind.take();
        let speed = self.world.body(id).map_or(0.0, |b| b.max_speed());
        log::debug!(
            "body {:?} settled ({:?}), residual speed {:.3}, world kinetic energy {:.3}",
            id,
            kind,
            speed,
            self.world.kinetic_energy()
        );

        self.clears.sample(&self.world, &mut self.grid);
        if self.spawn_zone_blocked() {
            self.game_over = true;
            log::info!(
                "game over: score {}, lines {}, level {}",
                self.score,
                self.lines_cleared,
                self.level
            );
            return;
        }
        self.spawn_next();
    }

    fn spawn_zone_blocked(&self) -> bool {
        (0..SPAWN_ZONE_ROWS.min(self.grid.rows())).any(|r| self.grid.row_fill(r) > 0)
    }

    fn spawn_next(&mut self) {
        let kind = self.next_pieces.remove(0);
        self.next_pieces.push(self.bag.next());

        let cell = self.grid.cell_size();
        let span = usize::try_from(kind.span()).unwrap_or(1);
        let col = self.grid.cols().saturating_sub(span) / 2;
        let origin = Vector2::new(col as f64 * cell, 0.0);
        let body = kind.build(origin, cell, &self.material);
        let id = self.world.add_body(body);
        self.world.set_active(id);
        self.active_kind = Some(kind);
        self.landed_for = 0.0;
        log::debug!("spawned {:?} as {:?}", kind, id);
    }

    fn award(&mut self, rows: usize) {
        let base = LINE_SCORES[rows.clamp(1, LINE_SCORES.len()) - 1];
        self.score = self.score.saturating_add(base.saturating_mul(self.level));
        self.lines_cleared = self.lines_cleared.saturating_add(rows as u32);
        self.level = self.initial_level.saturating_add(self.lines_cleared / 10);
        log::info!(
            "cleared {} row(s) {:?}: score {}, level {}",
            rows,
            self.last_cleared_rows,
            self.score,
            self.level
        );
    }

    fn tick_sparks(&mut self, dt: f64) {
        self.sparks.retain_mut(|s| {
            s.age += dt;
            s.position += s.velocity * dt;
            s.age < SPARK_LIFETIME
        });
    }

    /// Shift the active piece one cell left (`-1`) or right (`1`). Refused if
    /// any particle would leave the world.
    pub fn move_active(&mut self, dir: i32) -> bool {
        if self.game_over {
            return false;
        }
        let dx = f64::from(dir.signum()) * self.grid.cell_size();
        let width = self.world.bounds().width;
        let Some(body) = self.world.active_body_mut() else {
            return false;
        };
        let r = body.max_radius();
        let Some(bb) = body.bounding_box() else {
            return false;
        };
        if bb.min.x + dx - r < -FLOOR_EPSILON || bb.max.x + dx + r > width + FLOOR_EPSILON {
            return false;
        }
        body.translate(dx, 0.0);
        true
    }

    /// Quarter turn about the centroid, nudged back inside the side walls.
    pub fn rotate_active(&mut self, clockwise: bool) -> bool {
        if self.game_over {
            return false;
        }
        let width = self.world.bounds().width;
        let Some(body) = self.world.active_body_mut() else {
            return false;
        };
        // y points down, so a positive angle turns clockwise on screen
        body.rotate(if clockwise { FRAC_PI_2 } else { -FRAC_PI_2 });
        let r = body.max_radius();
        if let Some(bb) = body.bounding_box() {
            if bb.min.x - r < 0.0 {
                body.translate(r - bb.min.x, 0.0);
            } else if bb.max.x + r > width {
                body.translate(width - (bb.max.x + r), 0.0);
            }
        }
        true
    }

    /// Push the active piece down by half a cell, stopping at the floor.
    pub fn soft_drop(&mut self) -> bool {
        if self.game_over {
            return false;
        }
        let step = self.grid.cell_size() * 0.5;
        let room = self.room_below();
        let Some(body) = self.world.active_body_mut() else {
            return false;
        };
        let dy = step.min(room);
        if dy <= 0.0 {
            return false;
        }
        body.translate(0.0, dy);
        self.score = self.score.saturating_add(1);
        true
    }

    /// Drop the active piece onto the floor and settle it immediately.
    pub fn hard_drop(&mut self) {
        if self.game_over {
            return;
        }
        let room = self.room_below();
        let cell = self.grid.cell_size();
        log::debug!("hard drop of {:?} by {:.1} units", self.world.active_id(), room);
        let Some(body) = self.world.active_body_mut() else {
            return;
        };
        if room > 0.0 {
            body.translate(0.0, room);
            self.score = self.score.saturating_add((room / cell) as u32 * 2);
        }
        for p in body.particles_mut() {
            p.previous_position = p.position;
        }
        self.lock_active();
    }

    /// Distance the active piece can travel down before touching the floor.
    fn room_below(&self) -> f64 {
        let floor = self.world.bounds().height;
        self.world
            .active_body()
            .map(|b| {
                b.particles()
                    .iter()
                    .map(|p| floor - (p.position.y + p.radius))
                    .fold(f64::INFINITY, f64::min)
            })
            .filter(|room| room.is_finite())
            .unwrap_or(0.0)
            .max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::SoftBody;
    use crate::particle::Particle;

    const DT: f64 = 1.0 / 60.0;

    fn session() -> GameSession {
        GameSession::new(&GameConfig::default()).unwrap()
    }

    fn weightless() -> GameSession {
        let mut config = GameConfig::default();
        config.physics.gravity = Vector2::ZERO;
        GameSession::new(&config).unwrap()
    }

    fn settled_bar(s: &GameSession, row: usize, cols: std::ops::Range<usize>) -> SoftBody {
        let cell = s.grid.cell_size();
        let mut body = SoftBody::new(2);
        for col in cols {
            let c = Vector2::new((col as f64 + 0.5) * cell, (row as f64 + 0.5) * cell);
            let i = body.add_particle(Particle::new(c).with_radius(cell * 0.5));
            if i > 0 {
                body.connect(i - 1, i, 1000.0, 10.0);
            }
        }
        body.is_static = true;
        body
    }

    #[test]
    fn test_rejects_invalid_grid() {
        let config = GameConfig {
            cols: 0,
            ..GameConfig::default()
        };
        assert!(matches!(
            GameSession::new(&config),
            Err(SessionError::Grid(_))
        ));
    }

    #[test]
    fn test_spawn_is_active_and_inside() {
        let s = session();
        let body = s.world.active_body().unwrap();
        let bb = body.bounding_box().unwrap();
        assert!(bb.min.x >= 0.0 && bb.max.x <= s.world.bounds().width);
        assert!(bb.min.y >= 0.0);
        assert_eq!(s.next_pieces.len(), 3);
        assert!(s.active_kind.is_some());
    }

    #[test]
    fn test_move_stops_at_walls() {
        let mut s = weightless();
        let mut moves = 0;
        while s.move_active(-1) {
            moves += 1;
            assert!(moves < 20);
        }
        let body = s.world.active_body().unwrap();
        let bb = body.bounding_box().unwrap();
        assert!((bb.min.x - body.max_radius()).abs() < 1e-9);
        while s.move_active(1) {}
        let body = s.world.active_body().unwrap();
        let bb = body.bounding_box().unwrap();
        assert!((bb.max.x + body.max_radius() - s.world.bounds().width).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_keeps_piece_inside() {
        let mut s = weightless();
        while s.move_active(1) {}
        for _ in 0..4 {
            assert!(s.rotate_active(true));
            let body = s.world.active_body().unwrap();
            let bb = body.bounding_box().unwrap();
            assert!(bb.max.x + body.max_radius() <= s.world.bounds().width + 1e-9);
            for p in body.particles() {
                assert_eq!(p.position, p.previous_position);
            }
        }
    }

    #[test]
    fn test_hard_drop_settles_and_spawns() {
        let mut s = session();
        let first = s.world.active_id().unwrap();
        s.hard_drop();
        assert!(!s.game_over);
        let second = s.world.active_id().unwrap();
        assert_ne!(first, second);
        assert!(s.world.body(first).unwrap().is_static);
        assert!(s.score > 0);
        assert_eq!(s.pieces_settled, 1);
    }

    #[test]
    fn test_piece_settles_after_lock_delay() {
        let mut s = session();
        let first = s.world.active_id().unwrap();
        let mut settled = false;
        for _ in 0..60 * 30 {
            if s.tick(DT).settled {
                settled = true;
                break;
            }
        }
        assert!(settled);
        assert!(s.world.body(first).unwrap().is_static);
        let body = s.world.body(first).unwrap();
        let floor = s.world.bounds().height;
        assert!(body.particles().iter().any(|p| p.position.y + p.radius >= floor - 1.0));
    }

    #[test]
    fn test_full_row_scores_and_sparks() {
        let mut s = weightless();
        let bottom = s.grid.rows() - 1;
        let left = settled_bar(&s, bottom, 0..5);
        let right = settled_bar(&s, bottom, 5..10);
        s.world.add_body(left);
        s.world.add_body(right);
        let report = s.tick(DT);
        assert_eq!(report.rows_cleared, 1);
        assert_eq!(s.last_cleared_rows, vec![bottom]);
        assert_eq!(s.lines_cleared, 1);
        assert_eq!(s.score, 100);
        assert_eq!(s.sparks.len(), 10);
        // only the active piece is left
        assert_eq!(s.world.bodies().len(), 1);
    }

    #[test]
    fn test_sparks_expire() {
        let mut s = weightless();
        let bottom = s.grid.rows() - 1;
        let bar = settled_bar(&s, bottom, 0..10);
        s.world.add_body(bar);
        s.tick(DT);
        assert!(!s.sparks.is_empty());
        for _ in 0..60 {
            s.tick(DT);
        }
        assert!(s.sparks.is_empty());
    }

    #[test]
    fn test_level_rises_every_ten_lines() {
        let mut s = weightless();
        s.award(4);
        s.award(4);
        s.award(2);
        assert_eq!(s.lines_cleared, 10);
        assert_eq!(s.level, 2);
        assert_eq!(s.score, 800 + 800 + 300);
    }

    #[test]
    fn test_score_saturates_instead_of_overflowing() {
        let mut s = weightless();
        s.level = u32::MAX;
        s.award(4);
        assert_eq!(s.score, u32::MAX);
        s.award(1);
        assert_eq!(s.score, u32::MAX);
        s.hard_drop();
        assert_eq!(s.score, u32::MAX);
    }

    #[test]
    fn test_mass_in_spawn_zone_ends_game() {
        let mut s = weightless();
        let blocker = settled_bar(&s, 0, 0..2);
        s.world.add_body(blocker);
        s.hard_drop();
        assert!(s.game_over);
        assert!(s.world.active_id().is_none());
        assert_eq!(s.tick(DT), TickReport::default());
        assert!(!s.move_active(1));
    }
}
