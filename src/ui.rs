//! Layout and drawing: playfield, sidebar, pause, game over, line-clear flash.

use crate::GameMode;
use crate::app::{GameOverReason, Screen};
use crate::game::GameSession;
use crate::pieces::PieceKind;
use crate::render::{self, Viewport};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the line-clear flash (TachyonFX) in ms.
const LINE_CLEAR_FADE_MS: u32 = 350;

/// Next preview: mini cells are two columns wide so blocks look square.
const NEXT_PREVIEW_COUNT: usize = 3;
const NEXT_MINI_CELL_W: u16 = 2;
const NEXT_MINI_CELL_H: u16 = 1;

/// What the HUD shows besides the session itself.
#[derive(Debug, Clone, Copy)]
pub struct Hud {
    pub screen: Screen,
    pub paused: bool,
    pub game_over_reason: Option<GameOverReason>,
    pub mode: GameMode,
    pub clear_lines: u32,
    pub time_limit: u32,
    /// Play time so far; pauses do not count.
    pub elapsed: Duration,
}

/// Line-clear flash state owned by the app between frames.
#[derive(Default)]
pub struct ClearFlash {
    pub rows: Vec<usize>,
    pub effect: Option<Effect>,
    pub last_process: Option<Instant>,
}

impl ClearFlash {
    /// Start a new flash over `rows`, replacing any running one.
    pub fn start(&mut self, rows: &[usize]) {
        self.rows = rows.to_vec();
        self.effect = None;
        self.last_process = None;
    }

    pub fn is_active(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Drop the flash once its effect has run to completion.
    pub fn finish_if_done(&mut self) {
        if self.effect.as_ref().is_some_and(Effect::done) {
            *self = Self::default();
        }
    }
}

/// Draw the current screen, with the pause overlay and line-clear flash on top.
pub fn draw(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    hud: &Hud,
    flash: &mut ClearFlash,
    now: Instant,
) {
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), area);
    let (board_area, sidebar_area) = game_layout(area, session);
    draw_playfield(frame, session, theme, hud, board_area);
    draw_sidebar(frame, session, theme, hud, sidebar_area);

    if flash.is_active() {
        apply_line_clear_effect(frame, session, theme, board_area, flash, now);
    }
    match hud.screen {
        Screen::Playing if hud.paused => draw_pause_overlay(frame, theme, area),
        Screen::Playing => {}
        Screen::GameOver => draw_game_over(frame, session, theme, hud, area),
    }
}

/// Board (with border) and sidebar rects, centred in `area`.
fn game_layout(area: Rect, session: &GameSession) -> (Rect, Rect) {
    let bounds = session.world.bounds();
    let (bw, bh) = render::board_cells(
        bounds.width,
        bounds.height,
        area.width.saturating_sub(SIDEBAR_WIDTH + 2),
        area.height.saturating_sub(2),
    );
    let (pw, ph) = (bw + 2, bh + 2);
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert[1]);
    (inner[0], inner[1])
}

fn format_clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn playfield_title(session: &GameSession, hud: &Hud) -> String {
    match hud.mode {
        GameMode::Timed => {
            let remaining =
                Duration::from_secs(u64::from(hud.time_limit)).saturating_sub(hud.elapsed);
            format!(" Jellytris  Time: {} ", format_clock(remaining))
        }
        GameMode::Clear => format!(
            " Jellytris  {}  | {}/{} ",
            format_clock(hud.elapsed),
            session.lines_cleared,
            hud.clear_lines
        ),
        GameMode::Endless => " Jellytris ".to_string(),
    }
}

fn draw_playfield(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    hud: &Hud,
    area: Rect,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(
            playfield_title(session, hud),
            Style::default().fg(theme.title),
        ));
    render::draw_world(frame, session, theme, area, block);
}

/// Buffer positions covered by the cleared rows, inside the board.
fn clearing_buffer_positions(
    session: &GameSession,
    board: Rect,
    rows: &[usize],
) -> HashSet<(u16, u16)> {
    let bounds = session.world.bounds();
    let canvas_w = f64::from(board.width) * f64::from(render::DOTS_X);
    let canvas_h = f64::from(board.height) * f64::from(render::DOTS_Y);
    let mut set = HashSet::new();
    let Some(vp) = Viewport::fit(canvas_w, canvas_h, bounds.width, bounds.height) else {
        return set;
    };
    let (x0, x1) = vp.column_span(bounds.width);
    for &row in rows {
        let (top, bottom) = session.grid.row_band(row);
        let (y0, y1) = vp.row_span(top, bottom);
        for y in y0..y1.min(board.height) {
            for x in x0..x1.min(board.width) {
                set.insert((board.x + x, board.y + y));
            }
        }
    }
    set
}

/// Flash the cleared rows: fade from the text colour back to the background.
fn apply_line_clear_effect(
    frame: &mut Frame,
    session: &GameSession,
    theme: &Theme,
    board_area: Rect,
    flash: &mut ClearFlash,
    now: Instant,
) {
    let board = Block::default().borders(Borders::ALL).inner(board_area);
    let delta = flash
        .last_process
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    flash.last_process = Some(now);

    if flash.effect.is_none() {
        let set = clearing_buffer_positions(session, board, &flash.rows);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            set.contains(&(pos.x, pos.y))
        }));
        let effect = fx::fade_from(
            theme.main_fg,
            theme.main_fg,
            (LINE_CLEAR_FADE_MS, Interpolation::Linear),
        )
        .with_filter(filter)
        .with_area(board);
        flash.effect = Some(effect);
    }

    if let Some(effect) = flash.effect.as_mut() {
        frame.render_effect(effect, board, TfxDuration::from_millis(delta_ms));
    }
}

fn centered_popup(area: Rect, w: u16, h: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w.min(area.width),
        height: h.min(area.height),
    }
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup = centered_popup(area, 28, 6);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P: Resume    Q: Quit ",
            Style::default().fg(theme.inactive_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line))
            .style(Style::default().bg(theme.bg)),
    );
    Clear.render(popup, frame.buffer_mut());
    p.render(popup, frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, session: &GameSession, theme: &Theme, hud: &Hud, area: Rect) {
    let popup = centered_popup(area, 30, 11);
    let title = match hud.game_over_reason {
        Some(GameOverReason::TimeUp) => " Time's up! ",
        Some(GameOverReason::ClearedGoal) => " Cleared! ",
        _ => " Game Over ",
    };
    let fg = Style::default().fg(theme.main_fg);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title,
            Style::default().fg(Color::White).bg(theme.piece_color(2)).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" Score: {} ", session.score), fg)),
        Line::from(Span::styled(format!(" Lines: {} ", session.lines_cleared), fg)),
        Line::from(Span::styled(format!(" Pieces: {} ", session.pieces_settled), fg)),
    ];
    if hud.mode != GameMode::Endless {
        lines.push(Line::from(Span::styled(
            format!(" Time: {} ", format_clock(hud.elapsed)),
            fg,
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " R: Restart    Q: Quit ",
        Style::default().fg(theme.inactive_fg),
    )));
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line))
            .style(Style::default().bg(theme.bg))
            .title(Span::styled(" Jellytris ", Style::default().fg(theme.title))),
    );
    Clear.render(popup, frame.buffer_mut());
    p.render(popup, frame.buffer_mut());
}

/// Progress bar for the current mode: time used, lines towards the goal, or
/// the fill of the fullest row in endless play.
fn mode_progress(session: &GameSession, hud: &Hud) -> (String, f64) {
    match hud.mode {
        GameMode::Timed => {
            let limit = f64::from(hud.time_limit.max(1));
            ("Time".to_string(), hud.elapsed.as_secs_f64() / limit)
        }
        GameMode::Clear => {
            let goal = f64::from(hud.clear_lines.max(1));
            ("Goal".to_string(), f64::from(session.lines_cleared) / goal)
        }
        GameMode::Endless => {
            let grid = &session.grid;
            let best = (0..grid.rows()).map(|r| grid.row_fill(r)).max().unwrap_or(0);
            ("Best row".to_string(), best as f64 / grid.cols() as f64)
        }
    }
}

fn draw_sidebar(frame: &mut Frame, session: &GameSession, theme: &Theme, hud: &Hud, area: Rect) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Next (border + title + preview)
            Constraint::Length(1), // gap
            Constraint::Length(7), // Stats
            Constraint::Length(1), // gap
            Constraint::Length(4), // Mode gauge
            Constraint::Length(1), // gap
            Constraint::Length(4), // Keys
        ])
        .split(area);

    // --- Next ---
    let next_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let next_inner = next_block.inner(chunks[0]);
    next_block.render(chunks[0], frame.buffer_mut());
    let next_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(2)])
        .split(next_inner);
    Paragraph::new(Line::from(Span::styled("Next", title_style)))
        .render(next_layout[0], frame.buffer_mut());
    draw_next_preview(frame, session, theme, next_layout[1]);

    // --- Stats ---
    let stats_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats_lines = vec![
        stat("Score: ", session.score.to_string()),
        stat("Level: ", session.level.to_string()),
        stat("Lines: ", session.lines_cleared.to_string()),
        stat("Pieces: ", session.pieces_settled.to_string()),
        stat("Particles: ", session.world.particle_count().to_string()),
    ];
    Paragraph::new(Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Mode ---
    let mode_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let mode_inner = mode_block.inner(chunks[4]);
    mode_block.render(chunks[4], frame.buffer_mut());
    let mode_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(mode_inner);
    let (label, ratio) = mode_progress(session, hud);
    Paragraph::new(Line::from(Span::styled(label, title_style)))
        .render(mode_layout[0], frame.buffer_mut());
    let ratio = ratio.clamp(0.0, 1.0);
    let bar_color = if ratio > 0.8 {
        theme.piece_color(2)
    } else if ratio > 0.5 {
        theme.piece_color(1)
    } else {
        theme.piece_color(0)
    };
    Gauge::default()
        .ratio(ratio)
        .gauge_style(Style::default().fg(bar_color).bg(theme.div_line))
        .render(mode_layout[1], frame.buffer_mut());

    // --- Keys ---
    let hint = Style::default().fg(theme.inactive_fg);
    Paragraph::new(vec![
        Line::from(Span::styled("←→ move  ↑ rotate", hint)),
        Line::from(Span::styled("↓ soft  ␣ hard drop", hint)),
        Line::from(Span::styled("p pause  r restart", hint)),
    ])
    .block(Block::default().borders(Borders::ALL).border_style(border_style))
    .render(chunks[6], frame.buffer_mut());
}

/// Upcoming pieces side by side.
fn draw_next_preview(frame: &mut Frame, session: &GameSession, theme: &Theme, area: Rect) {
    let pw = area.width / NEXT_PREVIEW_COUNT as u16;
    for (i, kind) in session.next_pieces.iter().take(NEXT_PREVIEW_COUNT).enumerate() {
        let sub_area = Rect {
            x: area.x + i as u16 * pw,
            y: area.y,
            width: pw,
            height: area.height,
        };
        draw_single_piece_preview(frame, theme, sub_area, *kind);
    }
}

fn draw_single_piece_preview(frame: &mut Frame, theme: &Theme, area: Rect, kind: PieceKind) {
    let color = theme.piece_color(kind.color_index());
    let cells = kind.cells();
    let bw = kind.span() as u16;
    let bh = cells.iter().map(|(_, dy)| *dy).max().unwrap_or(0) as u16 + 1;
    // the I piece does not fit a third of the panel at full width
    let cell_w = if bw * NEXT_MINI_CELL_W <= area.width {
        NEXT_MINI_CELL_W
    } else {
        1
    };
    let off_x = area.width.saturating_sub(bw * cell_w) / 2;
    let off_y = area.height.saturating_sub(bh * NEXT_MINI_CELL_H) / 2;

    for &(dx, dy) in cells {
        let r = Rect {
            x: area.x + off_x + dx as u16 * cell_w,
            y: area.y + off_y + dy as u16 * NEXT_MINI_CELL_H,
            width: cell_w,
            height: NEXT_MINI_CELL_H,
        };
        if r.right() <= area.right() && r.bottom() <= area.bottom() {
            Paragraph::new("█".repeat(usize::from(cell_w)))
                .style(Style::default().fg(color))
                .render(r, frame.buffer_mut());
        }
    }
}
