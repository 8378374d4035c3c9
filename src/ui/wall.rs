//! Product wall rendering
//!
//! Draws the working set as a grid of tiles plus a one-line footer with
//! rotation and cache status. Rows that don't fit the terminal stay
//! off-screen; the app uses [`visible_slot_count`] to tell the rotation
//! engine which slots can be seen.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use rust_decimal::Decimal;

use crate::app::App;
use crate::config::ViewKind;
use crate::data::DisplayItem;

/// Smallest tile height in rows, borders included
pub const MIN_TILE_HEIGHT: u16 = 5;

/// Area left for tiles once the footer is taken off
pub fn wall_area(area: Rect) -> Rect {
    Rect {
        height: area.height.saturating_sub(1),
        ..area
    }
}

/// Tile rectangles for the slots that fit inside `area`, in slot order
///
/// Tiles share the width evenly. Rows grow to fill the height but never
/// shrink below [`MIN_TILE_HEIGHT`]; whole rows that don't fit are left out.
pub fn grid_geometry(area: Rect, capacity: usize, columns: usize) -> Vec<Rect> {
    if capacity == 0 || area.width == 0 || area.height < MIN_TILE_HEIGHT {
        return Vec::new();
    }
    let columns = columns.clamp(1, usize::from(area.width));
    let rows = capacity.div_ceil(columns);
    let tile_width = area.width / columns as u16;
    let tile_height = (area.height / rows as u16).max(MIN_TILE_HEIGHT);
    let visible_rows = usize::from(area.height / tile_height).min(rows);

    (0..capacity.min(visible_rows * columns))
        .map(|slot| {
            let column = (slot % columns) as u16;
            let row = (slot / columns) as u16;
            Rect::new(
                area.x + column * tile_width,
                area.y + row * tile_height,
                tile_width,
                tile_height,
            )
        })
        .collect()
}

/// Number of leading slots that are on screen
pub fn visible_slot_count(area: Rect, capacity: usize, columns: usize) -> usize {
    grid_geometry(area, capacity, columns).len()
}

fn format_price(price: Decimal) -> String {
    format!("€{}", price.round_dp(2))
}

fn price_line(item: &DisplayItem) -> Line<'static> {
    let product = &item.product;
    let mut spans = Vec::new();
    match product.price {
        Some(price) => spans.push(Span::styled(
            format_price(price),
            Style::default()
                .fg(if product.is_on_sale { Color::Red } else { Color::White })
                .add_modifier(Modifier::BOLD),
        )),
        None => spans.push(Span::styled("--", Style::default().fg(Color::DarkGray))),
    }
    if product.is_on_sale {
        if let Some(compare_at) = product.compare_at_price {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                format_price(compare_at),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT),
            ));
        }
        spans.push(Span::styled(" SALE", Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

/// Tile body: price, details and the image reference an image loader fetches
pub(super) fn tile_lines(item: &DisplayItem) -> Vec<Line<'static>> {
    let product = &item.product;
    let mut lines = vec![price_line(item)];
    let details = if product.vendor.is_empty() {
        product.category().to_string()
    } else {
        format!("{} · {}", product.category(), product.vendor)
    };
    lines.push(Line::from(Span::styled(details, Style::default().fg(Color::Gray))));
    if let Some(url) = item.resource_url() {
        lines.push(Line::from(Span::styled(url, Style::default().fg(Color::DarkGray))));
    }
    lines
}

pub(super) fn render_tile(frame: &mut Frame, item: &DisplayItem, area: Rect, newest: bool) {
    let border_style = if newest {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .title(format!(" {} ", item.caption()))
        .borders(Borders::ALL)
        .border_style(border_style);
    let paragraph = Paragraph::new(tile_lines(item))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

/// Top categories as `Name count` pairs
fn category_summary(app: &App, limit: usize) -> Option<String> {
    let counts = app.distribution.category_counts();
    if counts.is_empty() {
        return None;
    }
    let mut summary: Vec<String> = counts
        .iter()
        .take(limit)
        .map(|(category, count)| format!("{category} {count}"))
        .collect();
    if counts.len() > limit {
        summary.push(format!("+{}", counts.len() - limit));
    }
    Some(summary.join(", "))
}

pub(super) fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let engine = &app.engine;
    let view = app.views.current();
    let mut spans = vec![Span::styled(
        format!("[{}{}] ", view.name(), if app.views.auto_switch() { "" } else { ", manual" }),
        Style::default().fg(Color::Magenta),
    )];
    if view == ViewKind::Grid {
        spans.extend([
            Span::styled(
                format!("{} shown", engine.working_set().len()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw(format!(" · {} queued", engine.backlog().len())),
            Span::raw(format!(" · cycle {}", engine.cycle())),
        ]);
    } else {
        spans.extend([
            Span::styled(
                format!("{} in view", app.view_products().len()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw(format!(" · round {}", app.distribution.cycle_info().cycle)),
        ]);
    }
    if let Some(source) = app.source {
        spans.push(Span::raw(format!(" · {source}")));
    }
    if let Some(version) = &app.cache_version {
        spans.push(Span::raw(format!(" · cache {version}")));
    }
    if let Some(status) = app.precache {
        if !status.is_complete {
            spans.push(Span::raw(format!(" · images {}%", status.percentage)));
        }
    }
    if let Some(summary) = category_summary(app, 3) {
        spans.push(Span::raw(format!(" · {summary}")));
    }
    if app.dev_mode {
        spans.push(Span::styled(" · DEV", Style::default().fg(Color::Magenta)));
    }
    if let Some(message) = &app.status_message {
        spans.push(Span::styled(
            format!(" │ {message}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    spans.push(Span::styled(" │ ? Help", Style::default().fg(Color::DarkGray)));

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

/// Renders the product wall
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let engine = &app.engine;
    let working_set = engine.working_set();
    let newest = working_set.iter().filter_map(|item| item.epoch).max();
    let tiles = grid_geometry(chunks[0], working_set.len(), engine.columns());

    for (item, area) in working_set.iter().zip(tiles) {
        let is_newest = newest.is_some() && item.epoch == newest;
        render_tile(frame, item, area, is_newest);
    }

    render_footer(frame, app, chunks[1]);
}
