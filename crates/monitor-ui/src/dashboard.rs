//! The realtime multi-provider dashboard view.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use monitor_core::formatting::{format_currency, format_number, format_tokens, format_time, percentage};
use monitor_core::time_utils::TimezoneHandler;
use monitor_runtime::state::{MonitorState, MultiPlatformState};

use crate::themes::Theme;
use crate::widgets::UsageBar;

/// Draw the full dashboard for the latest snapshot.
pub fn render(
    frame: &mut Frame,
    snapshot: &MultiPlatformState,
    theme: &Theme,
    tz: &TimezoneHandler,
) {
    let states: Vec<&MonitorState> = snapshot.states().collect();

    let mut constraints = vec![Constraint::Length(1)];
    if states.is_empty() {
        constraints.push(Constraint::Min(3));
    } else {
        for _ in &states {
            constraints.push(Constraint::Min(10));
        }
    }
    constraints.push(Constraint::Length(1));

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    render_header(frame, rows[0], snapshot, theme, tz);

    if states.is_empty() {
        let idle = Paragraph::new(Line::from(Span::styled(
            "Waiting for the first snapshot...",
            theme.dim,
        )));
        frame.render_widget(idle, rows[1]);
    } else {
        for (i, state) in states.iter().enumerate() {
            render_provider_panel(frame, rows[i + 1], state, theme, tz);
        }
    }

    render_footer(frame, rows[rows.len() - 1], snapshot, theme);
}

fn render_header(
    frame: &mut Frame,
    area: Rect,
    snapshot: &MultiPlatformState,
    theme: &Theme,
    tz: &TimezoneHandler,
) {
    let line = Line::from(vec![
        Span::styled("GenAI Usage Monitor", theme.header),
        Span::styled(
            format!("  updated {}", tz.clock(snapshot.last_update)),
            theme.dim,
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_provider_panel(
    frame: &mut Frame,
    area: Rect,
    state: &MonitorState,
    theme: &Theme,
    tz: &TimezoneHandler,
) {
    let title = format!(
        " {} | plan {} ",
        state.provider.as_str().to_uppercase(),
        state.plan_limits.name
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border)
        .title(Span::styled(title, theme.header));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(provider_lines(state, theme, tz));
    frame.render_widget(paragraph, inner);
}

/// The text body of one provider panel.
fn provider_lines<'a>(
    state: &'a MonitorState,
    theme: &'a Theme,
    tz: &TimezoneHandler,
) -> Vec<Line<'a>> {
    let mut lines = Vec::new();

    // Usage bars against the plan limits.
    let tokens_used = state.session_stats.total_tokens();
    match state.plan_limits.token_limit {
        Some(limit) => {
            let pct = percentage(tokens_used as f64, limit as f64);
            lines.push(bar_line(
                "Tokens",
                UsageBar::new(pct, &format_tokens(tokens_used), &format_tokens(limit), theme),
                theme,
            ));
        }
        None => lines.push(Line::from(vec![
            Span::styled("Tokens ", theme.label),
            Span::styled(format_tokens(tokens_used), theme.value),
            Span::styled("  (unlimited)", theme.dim),
        ])),
    }
    match state.plan_limits.cost_limit {
        Some(limit) => {
            let pct = percentage(state.session_stats.cost_usd, limit);
            lines.push(bar_line(
                "Cost",
                UsageBar::new(
                    pct,
                    &format_currency(state.session_stats.cost_usd),
                    &format_currency(limit),
                    theme,
                ),
                theme,
            ));
        }
        None => lines.push(Line::from(vec![
            Span::styled("Cost   ", theme.label),
            Span::styled(format_currency(state.session_stats.cost_usd), theme.value),
            Span::styled("  (unlimited)", theme.dim),
        ])),
    }

    // Burn rate and projection.
    let burn = &state.burn_rate;
    let mut burn_text = format!(
        "Burn: {} tok/min · {}/min",
        format_number(burn.tokens_per_minute, 0),
        format_currency(burn.cost_per_minute),
    );
    if let Some(minutes) = burn.time_to_limit() {
        burn_text.push_str(&format!(" · ~{} to limit", format_time(minutes)));
    }
    burn_text.push_str(&format!(" · confidence {:.0}%", burn.confidence * 100.0));
    lines.push(Line::from(Span::styled(burn_text, theme.text)));

    // Session window.
    match &state.active_block {
        Some(block) => lines.push(Line::from(vec![
            Span::styled("Session ", theme.label),
            Span::styled(
                format!("{} → {}", tz.clock(block.start_time), tz.clock(block.end_time)),
                theme.value,
            ),
            Span::styled(
                format!("  {} calls", block.records.len()),
                theme.dim,
            ),
        ])),
        None => lines.push(Line::from(Span::styled("No active session", theme.dim))),
    }

    lines.push(Line::from(vec![
        Span::styled("Today   ", theme.label),
        Span::styled(
            format!(
                "{} tokens · {} over {} calls",
                format_tokens(state.today_stats.total_tokens()),
                format_currency(state.today_stats.cost_usd),
                state.today_stats.call_count
            ),
            theme.text,
        ),
    ]));

    // P90 annotation for custom plans.
    if let Some(p90) = &state.p90 {
        lines.push(Line::from(Span::styled(
            format!(
                "Custom limit from P90: {} ({:?}, confidence {:.0}%)",
                format_tokens(p90.limit),
                p90.source,
                p90.confidence * 100.0
            ),
            theme.dim,
        )));
    }

    // Model breakdown of the active block, heaviest first.
    if let Some(block) = &state.active_block {
        let mut models: Vec<(&String, u64)> = block
            .per_model_stats
            .iter()
            .map(|(name, stats)| (name, stats.tokens.total()))
            .collect();
        models.sort_by(|a, b| b.1.cmp(&a.1));
        if !models.is_empty() {
            let widest = models.iter().map(|(name, _)| name.width()).max().unwrap_or(0);
            let text = models
                .iter()
                .take(3)
                .map(|(name, tokens)| {
                    format!("{:<widest$} {}", name, format_tokens(*tokens))
                })
                .collect::<Vec<_>>()
                .join("  ·  ");
            lines.push(Line::from(vec![
                Span::styled("Models  ", theme.label),
                Span::styled(text, theme.text),
            ]));
        }
    }

    // Alerts, most severe first.
    let mut alerts: Vec<_> = state.active_alerts.iter().collect();
    alerts.sort_by(|a, b| b.level.cmp(&a.level));
    for alert in alerts.iter().take(3) {
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", alert.level.label()),
                theme.alert_style(alert.level),
            ),
            Span::styled(alert.message.as_str(), theme.text),
            Span::styled(
                format!("  {}", alert.recommended_action),
                theme.dim,
            ),
        ]));
    }

    if state.should_reset {
        lines.push(Line::from(Span::styled(
            format!("RESET RECOMMENDED: {}", state.reset_reason),
            theme.danger,
        )));
    }

    if !state.source_healthy {
        lines.push(Line::from(Span::styled(
            "source unavailable, showing last known data",
            theme.warning,
        )));
    } else if state.skipped_lines_last_tick > 0 {
        lines.push(Line::from(Span::styled(
            format!("{} lines skipped last tick", state.skipped_lines_last_tick),
            theme.dim,
        )));
    }

    lines.push(Line::from(vec![
        Span::styled("Health ", theme.label),
        Span::styled(
            format!("{}/100", state.health_score),
            health_style(state.health_score, theme),
        ),
        Span::styled(
            format!(
                "  cache hit {:.0}%  saved {}",
                state.window_stats.cache_hit_rate() * 100.0,
                format_currency(state.window_stats.cache_savings)
            ),
            theme.dim,
        ),
    ]));

    lines
}

fn bar_line<'a>(label: &'a str, bar: UsageBar<'a>, theme: &'a Theme) -> Line<'a> {
    let mut spans = vec![Span::styled(format!("{label:<7}"), theme.label)];
    spans.extend(bar.to_line().spans);
    Line::from(spans)
}

fn health_style(score: u8, theme: &Theme) -> ratatui::style::Style {
    if score >= 75 {
        theme.healthy
    } else if score >= 40 {
        theme.warning
    } else {
        theme.danger
    }
}

fn render_footer(frame: &mut Frame, area: Rect, snapshot: &MultiPlatformState, theme: &Theme) {
    let line = Line::from(vec![
        Span::styled(
            format!(
                "Σ {} tokens · {}",
                format_tokens(snapshot.total_tokens()),
                format_currency(snapshot.total_cost())
            ),
            theme.value,
        ),
        Span::styled("   q to quit", theme.dim),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
