//! # Screen Modes
//!
//! The application is always in exactly one [`Mode`]. Input arrives as
//! windowing-agnostic [`ModeEvent`]s and [`Mode::on_event`] is the single
//! transition table. Play state is carried inside [`Mode::Play`] and is
//! built fresh every time play mode is entered.

use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::chart::Chart;
use crate::session::PlaySession;

/// Entries of the title menu, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Library,
    Tuner,
    FreePlay,
    Settings,
    Play,
}

pub const MENU: [MenuItem; 5] = [
    MenuItem::Library,
    MenuItem::Tuner,
    MenuItem::FreePlay,
    MenuItem::Settings,
    MenuItem::Play,
];

impl MenuItem {
    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::Library => "Library",
            MenuItem::Tuner => "Tuner",
            MenuItem::FreePlay => "Free Play",
            MenuItem::Settings => "Settings",
            MenuItem::Play => "Play",
        }
    }
}

/// Operator input, independent of any windowing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    Up,
    Down,
    Confirm,
    Back,
    /// Pointer over a menu row.
    Hover(usize),
    /// Pointer click on a menu row.
    Click(usize),
    TogglePause,
    OffsetUp,
    OffsetDown,
    Quit,
}

/// What a transition may need besides the current mode.
#[derive(Debug, Clone)]
pub struct ModeContext {
    pub chart: Arc<Chart>,
    pub now: Instant,
    /// Latency offset a new play session starts with.
    pub offset_ms: i64,
    /// Offset change per OffsetUp/OffsetDown.
    pub offset_step_ms: i64,
}

#[derive(Debug, Clone)]
pub enum Mode {
    Title { selected: usize },
    Library,
    Tuner,
    FreePlay,
    Settings,
    Play(PlaySession),
    Exit,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Title { selected: 0 }
    }
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Title { .. } => "Title",
            Mode::Library => "Library",
            Mode::Tuner => "Tuner",
            Mode::FreePlay => "Free Play",
            Mode::Settings => "Settings",
            Mode::Play(_) => "Play",
            Mode::Exit => "Exit",
        }
    }

    /// Enters the screen behind a menu item.
    pub fn enter(item: MenuItem, ctx: &ModeContext) -> Mode {
        match item {
            MenuItem::Library => Mode::Library,
            MenuItem::Tuner => Mode::Tuner,
            MenuItem::FreePlay => Mode::FreePlay,
            MenuItem::Settings => Mode::Settings,
            MenuItem::Play => Mode::Play(PlaySession::start(Arc::clone(&ctx.chart), ctx.now, ctx.offset_ms)),
        }
    }

    /// The transition table.
    pub fn on_event(self, event: ModeEvent, ctx: &ModeContext) -> Mode {
        if event == ModeEvent::Quit {
            return Mode::Exit;
        }

        let before = self.name();
        let next = match self {
            Mode::Title { selected } => match event {
                ModeEvent::Up => Mode::Title {
                    selected: (selected + MENU.len() - 1) % MENU.len(),
                },
                ModeEvent::Down => Mode::Title {
                    selected: (selected + 1) % MENU.len(),
                },
                ModeEvent::Hover(row) if row < MENU.len() => Mode::Title { selected: row },
                ModeEvent::Confirm => Mode::enter(MENU[selected % MENU.len()], ctx),
                ModeEvent::Click(row) if row < MENU.len() => Mode::enter(MENU[row], ctx),
                ModeEvent::Back => Mode::Exit,
                _ => Mode::Title { selected },
            },
            Mode::Play(mut session) => match event {
                ModeEvent::Back => Mode::Title { selected: 0 },
                ModeEvent::TogglePause => {
                    session.toggle_pause(ctx.now);
                    Mode::Play(session)
                }
                ModeEvent::OffsetUp => {
                    session.adjust_offset(ctx.offset_step_ms);
                    Mode::Play(session)
                }
                ModeEvent::OffsetDown => {
                    session.adjust_offset(-ctx.offset_step_ms);
                    Mode::Play(session)
                }
                _ => Mode::Play(session),
            },
            Mode::Exit => Mode::Exit,
            other => match event {
                ModeEvent::Back => Mode::Title { selected: 0 },
                _ => other,
            },
        };

        if before != next.name() {
            info!("Mode {} -> {}", before, next.name());
        }
        next
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Mode::Exit)
    }

    pub fn play_session(&self) -> Option<&PlaySession> {
        match self {
            Mode::Play(session) => Some(session),
            _ => None,
        }
    }

    pub fn play_session_mut(&mut self) -> Option<&mut PlaySession> {
        match self {
            Mode::Play(session) => Some(session),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::NoteEvent;
    use std::time::Duration;

    fn ctx(now: Instant) -> ModeContext {
        ModeContext {
            chart: Arc::new(Chart {
                notes: vec![NoteEvent::new(0, 1, 0, 100), NoteEvent::new(500, 1, 0, 100)],
                ..Chart::default()
            }),
            now,
            offset_ms: 0,
            offset_step_ms: 5,
        }
    }

    fn selected(mode: &Mode) -> usize {
        match mode {
            Mode::Title { selected } => *selected,
            other => panic!("expected title, got {}", other.name()),
        }
    }

    #[test]
    fn menu_navigation_wraps() {
        let ctx = ctx(Instant::now());
        let mode = Mode::default().on_event(ModeEvent::Up, &ctx);
        assert_eq!(selected(&mode), MENU.len() - 1);
        let mode = mode.on_event(ModeEvent::Down, &ctx);
        assert_eq!(selected(&mode), 0);
    }

    #[test]
    fn hover_highlights_only_existing_rows() {
        let ctx = ctx(Instant::now());
        let mode = Mode::default().on_event(ModeEvent::Hover(1), &ctx);
        assert_eq!(selected(&mode), 1);
        let mode = mode.on_event(ModeEvent::Hover(17), &ctx);
        assert_eq!(selected(&mode), 1);
    }

    #[test]
    fn click_enters_the_row() {
        let ctx = ctx(Instant::now());
        let mode = Mode::default().on_event(ModeEvent::Click(2), &ctx);
        assert!(matches!(mode, Mode::FreePlay));
        let mode = Mode::default().on_event(ModeEvent::Click(9), &ctx);
        assert_eq!(selected(&mode), 0);
    }

    #[test]
    fn confirm_enters_selected_item() {
        let ctx = ctx(Instant::now());
        let mode = Mode::Title { selected: 1 }.on_event(ModeEvent::Confirm, &ctx);
        assert!(matches!(mode, Mode::Tuner));
        let mode = mode.on_event(ModeEvent::Back, &ctx);
        assert_eq!(selected(&mode), 0);
    }

    #[test]
    fn back_on_title_exits_and_quit_exits_anywhere() {
        let ctx = ctx(Instant::now());
        assert!(Mode::default().on_event(ModeEvent::Back, &ctx).is_exit());
        assert!(Mode::Settings.on_event(ModeEvent::Quit, &ctx).is_exit());
        let play = Mode::enter(MenuItem::Play, &ctx);
        assert!(play.on_event(ModeEvent::Quit, &ctx).is_exit());
    }

    #[test]
    fn play_controls_reach_the_session() {
        let t0 = Instant::now();
        let mut ctx = ctx(t0);
        let mut mode = Mode::enter(MenuItem::Play, &ctx);

        mode = mode.on_event(ModeEvent::OffsetUp, &ctx);
        mode = mode.on_event(ModeEvent::OffsetUp, &ctx);
        mode = mode.on_event(ModeEvent::OffsetDown, &ctx);
        assert_eq!(mode.play_session().unwrap().offset_ms(), 5);

        ctx.now = t0 + Duration::from_millis(100);
        mode = mode.on_event(ModeEvent::TogglePause, &ctx);
        assert!(mode.play_session().unwrap().is_paused());

        // Menu events are ignored while playing.
        mode = mode.on_event(ModeEvent::Down, &ctx);
        assert!(mode.play_session().is_some());
    }

    #[test]
    fn reentering_play_starts_a_fresh_session() {
        let t0 = Instant::now();
        let mut ctx = ctx(t0);
        let mut mode = Mode::enter(MenuItem::Play, &ctx);

        let session = mode.play_session_mut().unwrap();
        session.tick(t0 + Duration::from_secs(2), None);
        assert_eq!(session.stats().misses, 2);

        mode = mode.on_event(ModeEvent::Back, &ctx);
        ctx.now = t0 + Duration::from_secs(3);
        mode = mode.on_event(ModeEvent::Click(4), &ctx);

        let session = mode.play_session_mut().unwrap();
        assert_eq!(session.stats().hits + session.stats().misses, 0);
        assert_eq!(session.snapshot().cursor, 0);
        session.tick(ctx.now, None);
        assert_eq!(session.snapshot().chart_time_ms, 0);
    }
}
