//! Terminal lifecycle and the dashboard event loop.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::watch;

use monitor_core::time_utils::TimezoneHandler;
use monitor_runtime::state::MultiPlatformState;

use crate::dashboard;
use crate::themes::Theme;

/// Root state for the dashboard TUI.
pub struct App {
    theme: Theme,
    tz: TimezoneHandler,
}

impl App {
    /// Construct the app from the CLI's theme name and display timezone.
    pub fn new(theme_name: &str, timezone: &str) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
            tz: TimezoneHandler::new(timezone),
        }
    }

    /// Run the dashboard until the user quits or the driver goes away.
    ///
    /// Keyboard handling uses `crossterm::event::poll` with a 250 ms
    /// timeout, so the loop redraws promptly when a new snapshot lands on
    /// the watch channel without a dedicated render timer. Exits on `q`,
    /// `Esc`, or Ctrl-C.
    pub async fn run(self, rx: watch::Receiver<MultiPlatformState>) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal, rx);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(
        &self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        rx: watch::Receiver<MultiPlatformState>,
    ) -> io::Result<()> {
        let poll_timeout = Duration::from_millis(250);

        loop {
            {
                let snapshot = rx.borrow();
                terminal.draw(|frame| {
                    dashboard::render(frame, &snapshot, &self.theme, &self.tz)
                })?;
            }

            if event::poll(poll_timeout)? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(());
                        }
                        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
