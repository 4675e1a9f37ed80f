use ratatui::style::{Color, Modifier, Style};

use monitor_core::alerts::AlertLevel;

/// Terminal background type detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundType {
    Dark,
    Light,
}

/// Detect the terminal background from the `COLORFGBG` environment
/// variable (`"foreground;background"`; 0-6 dark, 7-15 light). Dark is the
/// safe default when the variable is absent or unparseable.
pub fn detect_background() -> BackgroundType {
    if let Ok(val) = std::env::var("COLORFGBG") {
        if let Some(bg) = val.split(';').next_back() {
            if let Ok(bg_num) = bg.parse::<u8>() {
                return if bg_num <= 6 {
                    BackgroundType::Dark
                } else {
                    BackgroundType::Light
                };
            }
        }
    }
    BackgroundType::Dark
}

/// All styles the dashboard draws with.
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub border: Style,

    pub text: Style,
    pub dim: Style,
    pub label: Style,
    pub value: Style,

    pub healthy: Style,
    pub info: Style,
    pub warning: Style,
    pub critical: Style,
    pub danger: Style,

    /// Filled bar portion below 50 %.
    pub bar_low: Style,
    /// Filled bar portion between 50 % and 90 %.
    pub bar_medium: Style,
    /// Filled bar portion at or above 90 %.
    pub bar_high: Style,
    pub bar_empty: Style,
    pub bar_label: Style,
}

impl Theme {
    /// Dark-background terminal theme (default).
    pub fn dark() -> Self {
        Self {
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            border: Style::default().fg(Color::DarkGray),

            text: Style::default().fg(Color::White),
            dim: Style::default().fg(Color::DarkGray),
            label: Style::default().fg(Color::Gray),
            value: Style::default().fg(Color::White).add_modifier(Modifier::BOLD),

            healthy: Style::default().fg(Color::Green),
            info: Style::default().fg(Color::Cyan),
            warning: Style::default().fg(Color::Yellow),
            critical: Style::default().fg(Color::LightRed),
            danger: Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),

            bar_low: Style::default().fg(Color::Green),
            bar_medium: Style::default().fg(Color::Yellow),
            bar_high: Style::default().fg(Color::Red),
            bar_empty: Style::default().fg(Color::DarkGray),
            bar_label: Style::default().fg(Color::Gray),
        }
    }

    /// Light-background terminal theme.
    pub fn light() -> Self {
        Self {
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            border: Style::default().fg(Color::Gray),

            text: Style::default().fg(Color::Black),
            dim: Style::default().fg(Color::Gray),
            label: Style::default().fg(Color::DarkGray),
            value: Style::default().fg(Color::Black).add_modifier(Modifier::BOLD),

            healthy: Style::default().fg(Color::Green),
            info: Style::default().fg(Color::Blue),
            warning: Style::default().fg(Color::Magenta),
            critical: Style::default().fg(Color::Red),
            danger: Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),

            bar_low: Style::default().fg(Color::Green),
            bar_medium: Style::default().fg(Color::Magenta),
            bar_high: Style::default().fg(Color::Red),
            bar_empty: Style::default().fg(Color::Gray),
            bar_label: Style::default().fg(Color::DarkGray),
        }
    }

    /// Resolve a theme name from the CLI (`"auto"` detects the background).
    pub fn from_name(name: &str) -> Self {
        match name {
            "dark" => Self::dark(),
            "light" => Self::light(),
            _ => match detect_background() {
                BackgroundType::Dark => Self::dark(),
                BackgroundType::Light => Self::light(),
            },
        }
    }

    /// Fill style for a usage bar at `percentage`.
    pub fn bar_style(&self, percentage: f64) -> Style {
        if percentage >= 90.0 {
            self.bar_high
        } else if percentage >= 50.0 {
            self.bar_medium
        } else {
            self.bar_low
        }
    }

    /// Style for an alert line at `level`.
    pub fn alert_style(&self, level: AlertLevel) -> Style {
        match level {
            AlertLevel::Info => self.info,
            AlertLevel::Warning => self.warning,
            AlertLevel::Critical => self.critical,
            AlertLevel::Danger => self.danger,
        }
    }
}
