//! World → terminal drawing on a braille canvas.
//!
//! A braille cell holds 2x4 dots and a terminal cell is about twice as tall as
//! it is wide, so canvas dots are close to square. The viewport works in dots.

use crate::game::GameSession;
use crate::grid::OccupancyGrid;
use crate::theme::Theme;
use crate::vector::Vector2;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::symbols::Marker;
use ratatui::widgets::Block;
use ratatui::widgets::canvas::{Canvas, Context, Line as CanvasLine, Points};

/// Springs stretched or squashed past this fraction of their rest length are
/// drawn highlighted.
const STRAIN_HIGHLIGHT: f64 = 0.2;

/// Braille dots per terminal cell, horizontally and vertically.
pub const DOTS_X: u16 = 2;
pub const DOTS_Y: u16 = 4;

/// Uniform scale plus centring offset from world units to canvas dots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Viewport {
    /// Largest scale at which the whole world fits, centred. `None` for
    /// empty canvases or worlds.
    pub fn fit(canvas_w: f64, canvas_h: f64, world_w: f64, world_h: f64) -> Option<Self> {
        if !(canvas_w > 0.0 && canvas_h > 0.0 && world_w > 0.0 && world_h > 0.0) {
            return None;
        }
        let scale = (canvas_w / world_w).min(canvas_h / world_h);
        Some(Self {
            scale,
            offset_x: (canvas_w - world_w * scale) * 0.5,
            offset_y: (canvas_h - world_h * scale) * 0.5,
            canvas_width: canvas_w,
            canvas_height: canvas_h,
        })
    }

    /// World point (y down) to canvas point (y up, as ratatui's canvas expects).
    pub fn to_canvas(&self, p: Vector2) -> (f64, f64) {
        (
            self.offset_x + p.x * self.scale,
            self.canvas_height - (self.offset_y + p.y * self.scale),
        )
    }

    /// Terminal rows (relative to the canvas top) covered by the world band
    /// `[top, bottom)`.
    pub fn row_span(&self, top: f64, bottom: f64) -> (u16, u16) {
        let dots = f64::from(DOTS_Y);
        let first = ((self.offset_y + top * self.scale) / dots).floor().max(0.0);
        let last = ((self.offset_y + bottom * self.scale) / dots).ceil().max(first);
        (first as u16, last as u16)
    }

    /// Terminal columns (relative to the canvas left edge) covered by the world.
    pub fn column_span(&self, world_w: f64) -> (u16, u16) {
        let dots = f64::from(DOTS_X);
        let first = (self.offset_x / dots).floor().max(0.0);
        let last = ((self.offset_x + world_w * self.scale) / dots).ceil().max(first);
        (first as u16, last as u16)
    }
}

/// Terminal cells (width, height) of a board that shows the world undistorted
/// within at most `max_w` x `max_h` cells.
pub fn board_cells(world_w: f64, world_h: f64, max_w: u16, max_h: u16) -> (u16, u16) {
    if world_w <= 0.0 || world_h <= 0.0 || max_w == 0 || max_h == 0 {
        return (0, 0);
    }
    let dots_w = f64::from(max_w) * f64::from(DOTS_X);
    let dots_h = f64::from(max_h) * f64::from(DOTS_Y);
    let scale = (dots_w / world_w).min(dots_h / world_h);
    let w = (world_w * scale / f64::from(DOTS_X)).round().clamp(1.0, f64::from(max_w));
    let h = (world_h * scale / f64::from(DOTS_Y)).round().clamp(1.0, f64::from(max_h));
    (w as u16, h as u16)
}

/// Paint one locked cell as a filled rectangle: horizontal strokes one dot apart.
fn fill_cell(
    ctx: &mut Context,
    vp: &Viewport,
    grid: &OccupancyGrid,
    row: usize,
    col: usize,
    color: Color,
) {
    let size = grid.cell_size();
    let (x1, top) = vp.to_canvas(Vector2::new(col as f64 * size, row as f64 * size));
    let (x2, bottom) =
        vp.to_canvas(Vector2::new((col + 1) as f64 * size, (row + 1) as f64 * size));
    // shave half a dot so neighbouring cells stay distinguishable
    let (x1, x2) = (x1 + 0.5, x2 - 0.5);
    let mut y = bottom + 0.5;
    while y < top {
        ctx.draw(&CanvasLine {
            x1,
            y1: y,
            x2,
            y2: y,
            color,
        });
        y += 1.0;
    }
}

/// Draw locked cells, every body's springs and the clear sparks inside `block`.
pub fn draw_world(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    area: Rect,
    block: Block<'_>,
) {
    let inner = block.inner(area);
    let canvas_w = f64::from(inner.width) * f64::from(DOTS_X);
    let canvas_h = f64::from(inner.height) * f64::from(DOTS_Y);
    let bounds = session.world.bounds();
    let Some(vp) = Viewport::fit(canvas_w, canvas_h, bounds.width, bounds.height) else {
        frame.render_widget(block, area);
        return;
    };

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .background_color(theme.bg)
        .x_bounds([0.0, canvas_w])
        .y_bounds([0.0, canvas_h])
        .paint(|ctx| {
            for (row, col, color) in session.grid.locked_cells() {
                fill_cell(ctx, &vp, &session.grid, row, col, theme.piece_color(color));
            }
            ctx.layer();

            for body in session.world.bodies() {
                let color = theme.piece_color(body.color);
                let particles = body.particles();
                for spring in body.springs() {
                    let (a, b) = spring.endpoints();
                    let (x1, y1) = vp.to_canvas(particles[a].position);
                    let (x2, y2) = vp.to_canvas(particles[b].position);
                    let color = if spring.strain(particles).abs() > STRAIN_HIGHLIGHT {
                        theme.main_fg
                    } else {
                        color
                    };
                    ctx.draw(&CanvasLine { x1, y1, x2, y2, color });
                }
                // lone particles have no spring to show them
                if body.springs().is_empty() {
                    let coords: Vec<_> =
                        particles.iter().map(|p| vp.to_canvas(p.position)).collect();
                    ctx.draw(&Points { coords: &coords, color });
                }
            }

            for spark in &session.sparks {
                let coords = [vp.to_canvas(spark.position)];
                ctx.draw(&Points {
                    coords: &coords,
                    color: theme.piece_color(spark.color),
                });
            }
        });
    frame.render_widget(canvas, area);
}
