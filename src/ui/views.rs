//! Marquee and slideshow views
//!
//! Both draw the slice of products the distribution assigned to the current
//! view and advance with [`App::view_step`].

use std::sync::Arc;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::wall::{self, MIN_TILE_HEIGHT};
use crate::app::App;
use crate::data::{DisplayItem, Product, SlotInfo};

/// Products of each marquee column, in scroll order
///
/// Products are dealt round-robin; even columns scroll up, odd columns down.
pub fn marquee_columns(products: &[Arc<Product>], columns: usize, step: usize) -> Vec<Vec<Arc<Product>>> {
    let columns = columns.max(1);
    (0..columns)
        .map(|column| {
            let dealt: Vec<Arc<Product>> = products.iter().skip(column).step_by(columns).cloned().collect();
            if dealt.is_empty() {
                return dealt;
            }
            let offset = step % dealt.len();
            let start = if column % 2 == 0 {
                offset
            } else {
                (dealt.len() - offset) % dealt.len()
            };
            dealt.iter().cycle().skip(start).take(dealt.len()).cloned().collect()
        })
        .collect()
}

fn split_footer(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    (chunks[0], chunks[1])
}

/// Renders the marquee view
pub fn render_marquee(frame: &mut Frame, app: &App) {
    let (body, footer) = split_footer(frame.area());
    let columns = app.config().views.marquee_columns.max(1);
    let products = app.view_products();
    let column_width = body.width / columns as u16;
    let rows = usize::from(body.height / MIN_TILE_HEIGHT);

    for (column, items) in marquee_columns(&products, columns, app.view_step).into_iter().enumerate() {
        for (row, product) in items.into_iter().take(rows).enumerate() {
            let area = Rect::new(
                body.x + column as u16 * column_width,
                body.y + row as u16 * MIN_TILE_HEIGHT,
                column_width,
                MIN_TILE_HEIGHT,
            );
            let item = DisplayItem::new(product, SlotInfo::new(row * columns + column, columns), 1.0, None);
            wall::render_tile(frame, &item, area, false);
        }
    }

    wall::render_footer(frame, app, footer);
}

/// Renders the slideshow view: one product filling the screen
pub fn render_slideshow(frame: &mut Frame, app: &App) {
    let (body, footer) = split_footer(frame.area());
    let products = app.view_products();

    if let Some(product) = products.get(app.view_step % products.len().max(1)) {
        let position = app.view_step % products.len() + 1;
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                product.title.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        let item = DisplayItem::new(Arc::clone(product), SlotInfo::new(0, 1), 1.0, None);
        lines.extend(wall::tile_lines(&item));
        if let Some(alt) = product.image_alt.as_deref().filter(|alt| !alt.is_empty()) {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                alt.to_string(),
                Style::default().fg(Color::Gray),
            )));
        }

        let block = Block::default()
            .title(format!(" {position} / {} ", products.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let paragraph = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, body);
    }

    wall::render_footer(frame, app, footer);
}
