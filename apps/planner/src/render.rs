//! Plain-text rendering of the controller view and session events.

use std::fmt::Write as _;

use client_core::{CatalogView, ControllerView, ItemView, SessionEvent};

pub fn render_catalog(view: &ControllerView) -> String {
    let mut out = String::new();
    match &view.catalog {
        CatalogView::Loading => out.push_str("Loading menu...\n"),
        CatalogView::Empty => out.push_str("Nothing to select: the menu is empty.\n"),
        CatalogView::Unavailable(message) => {
            let _ = writeln!(out, "Menu unavailable: {message}");
        }
        CatalogView::Ready => {
            out.push_str("Select Food Items\n");
            for item in &view.items {
                let _ = writeln!(out, "{}", render_item(item));
            }
        }
    }
    out
}

pub fn render_view(view: &ControllerView) -> String {
    let mut out = render_catalog(view);

    if view.pending {
        out.push_str("Optimizing...\n");
    }

    if let Some(error) = &view.error {
        let _ = writeln!(out, "Error: {}", error.message);
    }

    if let Some(result) = &view.result {
        out.push_str("Result\n");
        out.push_str("Optimal Selection:\n");
        for row in &result.rows {
            let _ = writeln!(out, "  {}: {}", row.name, format_number(row.quantity));
        }
        let _ = writeln!(out, "Total Cost: {}", format_number(result.total_cost));
    }
    out
}

/// One-line notice for an event, or `None` when the event needs no output.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::CatalogLoaded { items, dropped } if dropped.is_empty() => {
            format!("menu loaded ({items} items)")
        }
        SessionEvent::CatalogLoaded { items, dropped } => {
            let dropped: Vec<_> = dropped.iter().map(|id| id.as_str()).collect();
            format!(
                "menu loaded ({items} items); no longer offered: {}",
                dropped.join(", ")
            )
        }
        SessionEvent::CatalogFailed(message) => format!("menu unavailable: {message}"),
        SessionEvent::SelectionChanged { item, selected } => {
            format!("[{}] {item}", if *selected { "x" } else { " " })
        }
        SessionEvent::Submitted { items, .. } => {
            let items: Vec<_> = items.iter().map(|id| id.as_str()).collect();
            format!("optimizing {}...", items.join(", "))
        }
        SessionEvent::SubmitRejected => {
            "an optimization is already running; wait for it to finish".to_string()
        }
        SessionEvent::Succeeded { .. } | SessionEvent::Failed { .. } => return None,
        SessionEvent::ResponseDiscarded { .. } => return None,
    };
    Some(line)
}

fn render_item(item: &ItemView) -> String {
    let mut line = format!("[{}] {}", if item.selected { "x" } else { " " }, item.name);
    if !item.attributes.is_empty() {
        let attributes: Vec<String> = item
            .attributes
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        let _ = write!(line, " ({})", attributes.join(", "));
    }
    if let Some(media) = &item.media {
        let _ = write!(line, " <{media}>");
    }
    line
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    let formatted = format!("{value:.2}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
