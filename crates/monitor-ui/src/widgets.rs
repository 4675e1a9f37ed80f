use ratatui::text::{Line, Span};

use crate::themes::Theme;

const FILLED: char = '\u{2588}'; // █
const EMPTY: char = '\u{2591}'; // ░

/// Horizontal usage bar: coloured fill, dim remainder, and a trailing
/// `pct (current/limit)` label.
pub struct UsageBar<'a> {
    percentage: f64,
    label: String,
    theme: &'a Theme,
    width: u16,
}

impl<'a> UsageBar<'a> {
    /// Build a bar from a current/limit pair and pre-formatted counts.
    pub fn new(percentage: f64, current: &str, limit: &str, theme: &'a Theme) -> Self {
        Self {
            percentage,
            label: format!(" {:.1}% ({current} / {limit})", percentage),
            theme,
            width: 40,
        }
    }

    /// Override the bar width in columns (excluding the label).
    pub fn width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }

    /// Render as a [`Line`] for embedding in any paragraph-style widget.
    pub fn to_line(self) -> Line<'a> {
        let clamped = self.percentage.clamp(0.0, 100.0);
        let filled = ((clamped / 100.0) * f64::from(self.width)).round() as u16;
        let empty = self.width.saturating_sub(filled);

        let filled_str: String = std::iter::repeat_n(FILLED, filled as usize).collect();
        let empty_str: String = std::iter::repeat_n(EMPTY, empty as usize).collect();

        Line::from(vec![
            Span::styled(filled_str, self.theme.bar_style(self.percentage)),
            Span::styled(empty_str, self.theme.bar_empty),
            Span::styled(self.label, self.theme.bar_label),
        ])
    }
}
