//! Color scheme and styling for the TUI dashboard.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders},
};

pub const HEADER_BG: Color = Color::Rgb(30, 30, 46);
pub const HEADER_FG: Color = Color::Rgb(180, 190, 254);

pub const TABLE_HEADER_FG: Color = Color::Rgb(137, 180, 250);

pub const SUCCESS_COLOR: Color = Color::Rgb(166, 227, 161);
pub const ERROR_COLOR: Color = Color::Rgb(243, 139, 168);
pub const WARNING_COLOR: Color = Color::Rgb(249, 226, 175);
pub const HEDGE_COLOR: Color = Color::Rgb(203, 166, 247);

pub const BORDER_COLOR: Color = Color::Rgb(69, 71, 90);
pub const TEXT_COLOR: Color = Color::Rgb(205, 214, 244);
pub const MUTED_COLOR: Color = Color::Rgb(127, 132, 156);

pub fn header_style() -> Style {
    Style::default()
        .bg(HEADER_BG)
        .fg(HEADER_FG)
        .add_modifier(Modifier::BOLD)
}

pub fn table_header_style() -> Style {
    Style::default()
        .fg(TABLE_HEADER_FG)
        .add_modifier(Modifier::BOLD)
}

pub fn border_style() -> Style {
    Style::default().fg(BORDER_COLOR)
}

pub fn success_style() -> Style {
    Style::default()
        .fg(SUCCESS_COLOR)
        .add_modifier(Modifier::BOLD)
}

pub fn error_style() -> Style {
    Style::default()
        .fg(ERROR_COLOR)
        .add_modifier(Modifier::BOLD)
}

pub fn highlight_style() -> Style {
    Style::default()
        .fg(WARNING_COLOR)
        .add_modifier(Modifier::BOLD)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED_COLOR)
}

pub fn text_style() -> Style {
    Style::default().fg(TEXT_COLOR)
}

/// Style for anything produced by a speculative attempt.
pub fn hedge_style() -> Style {
    Style::default()
        .fg(HEDGE_COLOR)
        .add_modifier(Modifier::BOLD)
}

/// Green under `good`, yellow under `bad`, red above.
pub fn threshold_style(value: f64, good: f64, bad: f64) -> Style {
    if value < good {
        success_style()
    } else if value < bad {
        highlight_style()
    } else {
        error_style()
    }
}

pub fn panel_block(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .title_style(text_style().add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(border_style())
}
