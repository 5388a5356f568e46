//! App: terminal init, main loop, fixed-step ticking and key handling.

use crate::game::GameSession;
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, ClearFlash, Hud};
use crate::{Args, GameConfig, GameMode};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

/// Most physics steps run per loop iteration; a longer stall drops time.
const MAX_STEPS_PER_FRAME: u32 = 5;

/// Slowest frame rate the loop accepts.
const MIN_FPS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    /// Settled mass reached the spawn rows. Bodies do not collide with each
    /// other, so settled jelly never stacks that high from ordinary drops and
    /// endless mode normally ends only when the player quits.
    StackOverflow,
    TimeUp,
    ClearedGoal,
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    session: GameSession,
    screen: Screen,
    paused: bool,
    game_over_reason: Option<GameOverReason>,
    /// Fixed physics step in seconds.
    step: Duration,
    /// Unsimulated wall time carried to the next frame.
    accumulator: Duration,
    /// Simulated play time (excludes pauses).
    elapsed: Duration,
    flash: ClearFlash,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let session = GameSession::new(&config)?;
        let step = Duration::from_secs_f64(1.0 / args.fps.max(MIN_FPS));
        Ok(Self {
            args,
            config,
            theme,
            session,
            screen: Screen::Playing,
            paused: false,
            game_over_reason: None,
            step,
            accumulator: Duration::ZERO,
            elapsed: Duration::ZERO,
            flash: ClearFlash::default(),
        })
    }

    fn reset_game(&mut self) -> Result<()> {
        // new seed per restart so the piece order differs
        self.config.seed = self.config.seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
        self.session = GameSession::new(&self.config)?;
        self.screen = Screen::Playing;
        self.paused = false;
        self.game_over_reason = None;
        self.accumulator = Duration::ZERO;
        self.elapsed = Duration::ZERO;
        self.flash = ClearFlash::default();
        log::info!("game restarted");
        Ok(())
    }

    fn apply_action(&mut self, action: Action) {
        let s = &mut self.session;
        match action {
            Action::MoveLeft => {
                s.move_active(-1);
            }
            Action::MoveRight => {
                s.move_active(1);
            }
            Action::RotateCw => {
                s.rotate_active(true);
            }
            Action::RotateCcw => {
                s.rotate_active(false);
            }
            Action::SoftDrop => {
                s.soft_drop();
            }
            Action::HardDrop => s.hard_drop(),
            Action::Pause | Action::Restart | Action::Quit | Action::None => {}
        }
    }

    /// Advance the simulation by whole fixed steps covering `frame_time`.
    fn advance(&mut self, frame_time: Duration) {
        self.accumulator += frame_time;
        let mut steps = 0;
        while self.accumulator >= self.step {
            if steps == MAX_STEPS_PER_FRAME {
                self.accumulator = Duration::ZERO;
                break;
            }
            self.accumulator -= self.step;
            self.elapsed += self.step;
            steps += 1;
            let report = self.session.tick(self.step.as_secs_f64());
            if report.rows_cleared > 0 && !self.args.no_animation {
                self.flash.start(&self.session.last_cleared_rows);
            }
            if self.check_game_over() {
                break;
            }
        }
    }

    fn check_game_over(&mut self) -> bool {
        let reason = if self.session.game_over {
            Some(GameOverReason::StackOverflow)
        } else if self.args.mode == GameMode::Timed
            && self.elapsed >= Duration::from_secs(u64::from(self.args.time_limit))
        {
            Some(GameOverReason::TimeUp)
        } else if self.args.mode == GameMode::Clear
            && self.session.lines_cleared >= self.args.clear_lines
        {
            Some(GameOverReason::ClearedGoal)
        } else {
            None
        };
        if let Some(reason) = reason {
            log::info!("game over ({:?}) with score {}", reason, self.session.score);
            self.screen = Screen::GameOver;
            self.game_over_reason = Some(reason);
        }
        reason.is_some()
    }

    /// Handle one action. Returns false when the app should exit.
    fn handle_action(&mut self, action: Action) -> Result<bool> {
        match (self.screen, action) {
            (_, Action::Quit) => return Ok(false),
            (_, Action::Restart) => self.reset_game()?,
            (Screen::Playing, Action::Pause) => {
                self.paused = !self.paused;
                self.accumulator = Duration::ZERO;
            }
            (Screen::Playing, _) if !self.paused => {
                self.apply_action(action);
                self.check_game_over();
            }
            _ => {}
        }
        Ok(true)
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
                PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        // Release events let held keys stop cleanly; not every terminal supports it.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal = DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let mut last_frame = Instant::now();
        loop {
            let now = Instant::now();
            let hud = Hud {
                screen: self.screen,
                paused: self.paused,
                game_over_reason: self.game_over_reason,
                mode: self.args.mode,
                clear_lines: self.args.clear_lines,
                time_limit: self.args.time_limit,
                elapsed: self.elapsed,
            };
            terminal.draw(|f| ui::draw(f, &self.session, &self.theme, &hud, &mut self.flash, now))?;
            self.flash.finish_if_done();

            let timeout = self.step.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    let action = key_to_action(key);
                    let accepted = match key.kind {
                        KeyEventKind::Press => true,
                        KeyEventKind::Repeat => action.repeats(),
                        KeyEventKind::Release => false,
                    };
                    if accepted && !self.handle_action(action)? {
                        return Ok(());
                    }
                }
            }

            let frame_now = Instant::now();
            let frame_time = frame_now.duration_since(last_frame);
            last_frame = frame_now;
            if self.screen == Screen::Playing && !self.paused {
                self.advance(frame_time);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn app(extra: &[&str]) -> App {
        let mut argv = vec!["jellytris"];
        argv.extend_from_slice(extra);
        let args = Args::parse_from(argv);
        let config = GameConfig::from_args(&args);
        App::new(args, config, Theme::default()).unwrap()
    }

    #[test]
    fn test_advance_runs_whole_steps_only() {
        let mut a = app(&["--fps", "50"]);
        a.advance(Duration::from_millis(50));
        assert_eq!(a.elapsed, Duration::from_millis(40));
        assert_eq!(a.accumulator, Duration::from_millis(10));
    }

    #[test]
    fn test_advance_caps_steps_after_stall() {
        let mut a = app(&["--fps", "50"]);
        a.advance(Duration::from_secs(2));
        assert_eq!(a.elapsed, Duration::from_millis(100));
        assert_eq!(a.accumulator, Duration::ZERO);
    }

    #[test]
    fn test_timed_mode_ends() {
        let mut a = app(&["--mode", "timed", "--time-limit", "0"]);
        a.advance(Duration::from_millis(20));
        assert_eq!(a.screen, Screen::GameOver);
        assert_eq!(a.game_over_reason, Some(GameOverReason::TimeUp));
    }

    #[test]
    fn test_pause_quit_and_restart() {
        let mut a = app(&[]);
        assert!(a.handle_action(Action::Pause).unwrap());
        assert!(a.paused);
        let before = a.session.world.active_body().unwrap().centroid();
        a.handle_action(Action::MoveLeft).unwrap();
        assert_eq!(a.session.world.active_body().unwrap().centroid(), before);
        a.handle_action(Action::HardDrop).unwrap();
        assert_eq!(a.session.pieces_settled, 0);
        a.handle_action(Action::Pause).unwrap();
        a.handle_action(Action::HardDrop).unwrap();
        assert_eq!(a.session.pieces_settled, 1);
        a.handle_action(Action::Restart).unwrap();
        assert_eq!(a.session.pieces_settled, 0);
        assert!(!a.handle_action(Action::Quit).unwrap());
    }
}
