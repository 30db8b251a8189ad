//! UI rendering functions for the TUI dashboard.

use std::collections::VecDeque;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use super::styles::*;
use crate::app::{App, CallOutcome};

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let size = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(5),
        ])
        .split(size);

    let body_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(main_layout[2]);

    draw_header(frame, main_layout[0], app);
    draw_session_stats(frame, main_layout[1], app);
    draw_outcomes_table(frame, body_layout[0], app);
    draw_detail_panel(frame, body_layout[1], app);
    draw_keybinds(frame, main_layout[3]);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let title = format!(" Hedged HTTP Client :: {} ", app.target);
    let block = Block::default()
        .title(title)
        .title_style(header_style())
        .borders(Borders::ALL)
        .border_style(border_style());

    frame.render_widget(block, area);
}

fn format_uptime(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn bar(ratio: f64, width: usize) -> String {
    let filled = ((ratio.clamp(0.0, 1.0)) * width as f64) as usize;
    format!(
        "[{}{}]",
        "█".repeat(filled),
        "░".repeat(width.saturating_sub(filled))
    )
}

fn draw_session_stats(frame: &mut Frame, area: Rect, app: &App) {
    let uptime_str = format_uptime(app.session_uptime().as_secs());
    let success_rate = app.success_rate();

    let text = vec![
        Line::from(vec![
            Span::raw("Session: ").style(muted_style()),
            Span::raw(format!("Uptime: {} ", uptime_str)).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Total Calls: {} ", app.total_calls)).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Success: {} ", app.total_successes)).style(success_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Errors: {}", app.total_errors)).style(if app.total_errors > 0 {
                error_style()
            } else {
                text_style()
            }),
        ]),
        Line::from(vec![
            Span::raw("Performance: ").style(muted_style()),
            Span::raw(format!("{:.1} calls/s ", app.calls_per_second())).style(highlight_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw(format!("Avg Latency: {:.0}ms ", app.average_latency())).style(text_style()),
            Span::raw("│ ").style(muted_style()),
            Span::raw("Success Rate: ").style(muted_style()),
            Span::raw(bar(success_rate / 100.0, 15)).style(if success_rate > 95.0 {
                success_style()
            } else if success_rate > 80.0 {
                highlight_style()
            } else {
                error_style()
            }),
            Span::raw(format!(" {:.1}%", success_rate)).style(text_style()),
        ]),
    ];

    let paragraph = Paragraph::new(text).block(panel_block(" Session Analytics "));
    frame.render_widget(paragraph, area);
}

fn draw_outcomes_table(frame: &mut Frame, area: Rect, app: &App) {
    let stats = &app.stats_snapshot;
    let settled = (stats.primary_wins
        + stats.speculative_wins
        + stats.failures
        + stats.timeouts
        + stats.cancellations)
        .max(1) as f64;

    let header = Row::new(
        ["Outcome", "Count", "Share"]
            .into_iter()
            .map(|h| Cell::from(h).style(table_header_style())),
    )
    .height(1)
    .bottom_margin(1);

    let rows_data = [
        ("Primary wins", stats.primary_wins, success_style()),
        ("Speculative wins", stats.speculative_wins, hedge_style()),
        ("Failed (all attempts)", stats.failures, error_style()),
        ("Timed out", stats.timeouts, error_style()),
        ("Cancelled", stats.cancellations, muted_style()),
    ];

    let mut rows: Vec<Row> = rows_data
        .iter()
        .map(|(label, count, style)| {
            let share = *count as f64 / settled;
            Row::new(vec![
                Cell::from(*label),
                Cell::from(count.to_string()).style(*style),
                Cell::from(format!("{} {:.0}%", bar(share, 10), share * 100.0)).style(*style),
            ])
        })
        .collect();

    rows.push(Row::new(vec![
        Cell::from("Hedges dispatched"),
        Cell::from(stats.hedges.to_string()).style(hedge_style()),
        Cell::from(format!("withdrawn: {}", stats.withdrawn)).style(muted_style()),
    ]));
    rows.push(Row::new(vec![
        Cell::from("Latency trend"),
        Cell::from(format!("{:.1}", stats.avg_latency_ms)),
        Cell::from(create_mini_sparkline(&app.latency_history))
            .style(threshold_style(app.average_latency(), 200.0, 500.0)),
    ]));
    rows.push(Row::new(vec![
        Cell::from("Wait time trend"),
        Cell::from(format!("{}", app.wait_time_ms())),
        Cell::from(create_mini_sparkline(&app.wait_history))
            .style(hedge_style()),
    ]));

    let title = format!(" Race Outcomes (hedge win rate {:.0}%) ", app.hedge_win_rate());

    let table = Table::new(
        rows,
        [
            Constraint::Length(22),
            Constraint::Length(8),
            Constraint::Min(18),
        ],
    )
    .header(header)
    .block(panel_block(&title))
    .column_spacing(2);

    frame.render_widget(table, area);
}

fn create_mini_sparkline(history: &VecDeque<u64>) -> String {
    let data: Vec<u64> = history.iter().copied().collect();
    if data.is_empty() {
        return "───────────".to_string();
    }

    let chars = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max_val = *data.iter().max().unwrap_or(&1);
    let min_val = *data.iter().min().unwrap_or(&0);
    let range = if max_val > min_val {
        max_val - min_val
    } else {
        1
    };

    let skip = data.len().saturating_sub(16);
    data[skip..]
        .iter()
        .map(|&val| {
            let normalized = ((val - min_val) as f64 / range as f64 * 7.0) as usize;
            chars[normalized.min(7)]
        })
        .collect()
}

fn draw_detail_panel(frame: &mut Frame, area: Rect, app: &App) {
    let constraints = if app.batch_mode {
        vec![
            Constraint::Length(6),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(6),
        ]
    } else {
        vec![
            Constraint::Length(6),
            Constraint::Min(0),
            Constraint::Length(6),
        ]
    };

    let detail_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    draw_config_section(frame, detail_layout[0], app);
    draw_last_call_section(frame, detail_layout[1], app);

    if app.batch_mode {
        draw_batch_progress(frame, detail_layout[2], app);
        draw_engine_section(frame, detail_layout[3], app);
    } else {
        draw_engine_section(frame, detail_layout[2], app);
    }
}

fn on_off(flag: bool) -> Span<'static> {
    if flag {
        Span::raw("ON").style(success_style())
    } else {
        Span::raw("OFF").style(muted_style())
    }
}

fn draw_config_section(frame: &mut Frame, area: Rect, app: &App) {
    let batch_status = if app.batch_mode {
        format!("ON ({}/{})", app.batch_current, app.batch_count)
    } else {
        format!("OFF (count: {})", app.batch_count)
    };

    let text = vec![
        Line::from(vec![
            Span::raw("Method     : ").style(muted_style()),
            Span::raw(app.method.to_string()).style(highlight_style()),
        ]),
        Line::from(vec![
            Span::raw("Force hedge: ").style(muted_style()),
            on_off(app.force_hedge),
            Span::raw("  Idempotency: ").style(muted_style()),
            on_off(app.auto_idempotency),
        ]),
        Line::from(vec![
            Span::raw("Batch      : ").style(muted_style()),
            Span::raw(batch_status).style(if app.batch_mode {
                success_style()
            } else {
                muted_style()
            }),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(panel_block("   Configuration "))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn draw_last_call_section(frame: &mut Frame, area: Rect, app: &App) {
    let (winner_str, winner_style) = match app.last_outcome {
        Some(CallOutcome::Primary) => ("primary", success_style()),
        Some(CallOutcome::Speculative) => ("speculative (hedged)", hedge_style()),
        Some(CallOutcome::Failed) => ("none", error_style()),
        None => ("-", muted_style()),
    };

    let last_latency_str = app
        .last_latency_ms
        .map(|ms| format!("{:.1} ms", ms))
        .unwrap_or_else(|| "-".into());

    let latency_style = app
        .last_latency_ms
        .map(|ms| threshold_style(ms, 200.0, 500.0))
        .unwrap_or_else(muted_style);

    let text = vec![
        Line::from(vec![
            Span::raw("Result  : ").style(muted_style()),
            Span::raw(&app.last_message).style(text_style()),
        ]),
        Line::from(vec![
            Span::raw("Winner  : ").style(muted_style()),
            Span::raw(winner_str).style(winner_style),
        ]),
        Line::from(vec![
            Span::raw("Latency : ").style(muted_style()),
            Span::raw(last_latency_str).style(latency_style),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(panel_block("  Last Call "))
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

fn draw_batch_progress(frame: &mut Frame, area: Rect, app: &App) {
    let progress = if app.batch_count > 0 {
        (app.batch_current as f64 / app.batch_count as f64 * 100.0) as u16
    } else {
        0
    };

    let gauge = Gauge::default()
        .block(panel_block("  Batch Progress "))
        .gauge_style(success_style())
        .percent(progress.min(100))
        .label(format!("{}/{}", app.batch_current, app.batch_count));

    frame.render_widget(gauge, area);
}

fn draw_engine_section(frame: &mut Frame, area: Rect, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3)])
        .split(area);

    let tail_str = app
        .tail_probability()
        .map(|p| format!("{:.0}%", p * 100.0))
        .unwrap_or_else(|| "n/a".into());

    let text = vec![Line::from(vec![
        Span::raw("Wait: ").style(muted_style()),
        Span::raw(format!("{} ms", app.wait_time_ms())).style(hedge_style()),
        Span::raw("  │  Samples: ").style(muted_style()),
        Span::raw(app.tracker.len().to_string()).style(text_style()),
        Span::raw("  │  Slow tail: ").style(muted_style()),
        Span::raw(tail_str).style(text_style()),
    ])];

    let paragraph = Paragraph::new(text)
        .block(panel_block("  Hedge Engine "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, layout[0]);

    let ratio = app.budget_ratio();
    let gauge = Gauge::default()
        .block(panel_block("  Hedge Budget "))
        .gauge_style(threshold_style(1.0 - ratio, 0.5, 0.9))
        .ratio(ratio)
        .label(format!(
            "{:.2}/{:.0} tokens",
            app.budget.tokens(),
            app.budget.max_tokens()
        ));
    frame.render_widget(gauge, layout[1]);
}

fn draw_keybinds(frame: &mut Frame, area: Rect) {
    let keybinds = vec![
        Line::from(vec![
            Span::raw("  ").style(muted_style()),
            Span::raw("r").style(highlight_style()),
            Span::raw(" Run call  │  ").style(muted_style()),
            Span::raw("b").style(highlight_style()),
            Span::raw(" Toggle batch  │  ").style(muted_style()),
            Span::raw(",/.").style(highlight_style()),
            Span::raw(" Batch count  │  ").style(muted_style()),
            Span::raw("m").style(highlight_style()),
            Span::raw(" GET/POST").style(muted_style()),
        ]),
        Line::from(vec![
            Span::raw("  ").style(muted_style()),
            Span::raw("f").style(highlight_style()),
            Span::raw(" Force hedge  │  ").style(muted_style()),
            Span::raw("i").style(highlight_style()),
            Span::raw(" Idempotency  │  ").style(muted_style()),
            Span::raw("+/-").style(highlight_style()),
            Span::raw(" Slow tail  │  ").style(muted_style()),
            Span::raw("s").style(highlight_style()),
            Span::raw(" Reset stats  │  ").style(muted_style()),
            Span::raw("q").style(highlight_style()),
            Span::raw(" Quit").style(muted_style()),
        ]),
    ];

    let paragraph = Paragraph::new(keybinds)
        .block(panel_block("  Keybinds "))
        .alignment(Alignment::Left);

    frame.render_widget(paragraph, area);
}
