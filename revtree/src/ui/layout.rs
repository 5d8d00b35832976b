//! Responsive layout for revtree.
//!
//! Pure layout arithmetic, recomputed inside `terminal.draw()` on every render
//! so each frame reflects the current terminal size.
//!
//! At `>= 100` columns the tree takes 60% of the width and a details panel the
//! rest; narrower terminals show the tree alone. `Spacing::Overlap(1)` combined
//! with `Block::merge_borders(MergeStrategy::Fuzzy)` makes adjacent panel
//! borders share a single column.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use crate::app::{AppState, Mode};
use crate::theme::Theme;

/// Returns `[tree, details, status_bar]` panel `Rect`s for the current frame.
///
/// The details `Rect` has zero width on narrow terminals.
pub fn compute_layout(frame: &Frame) -> [Rect; 3] {
    let term_width = frame.area().width;

    let [main_area, status_bar] =
        frame.area().layout(&Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]));

    let horizontal = if term_width >= 100 {
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
            .spacing(Spacing::Overlap(1))
    } else {
        Layout::horizontal([Constraint::Fill(1), Constraint::Length(0)])
    };

    let [tree, details] = main_area.layout(&horizontal);
    [tree, details, status_bar]
}

/// Returns the inner `Rect` of a panel after removing the 1-cell border on each side.
pub fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin { vertical: 1, horizontal: 1 })
}

/// Builds a bordered `Block` for a panel.
///
/// `BorderType::Thick` marks the panel receiving keys. `MergeStrategy::Fuzzy`
/// is required because `Exact` produces incorrect junctions when mixing
/// `Thick` and `Plain` borders.
pub fn panel_block<'a>(title: &'a str, is_focused: bool, theme: &'a Theme) -> Block<'a> {
    let border_style = if is_focused {
        Style::default().fg(theme.border_active)
    } else {
        Style::default().fg(theme.border_inactive)
    };
    let border_type = if is_focused { BorderType::Thick } else { BorderType::Plain };

    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(border_style)
        .merge_borders(MergeStrategy::Fuzzy)
}

/// Renders the 1-row status bar at the bottom of the terminal.
///
/// Shows the mode indicator, the diff mode, review progress, and either the
/// pending status message or a loading hint.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let (mode_text, mode_fg) = match state.mode {
        Mode::Normal => (" NORMAL ", theme.status_mode_normal),
        Mode::HelpOverlay => (" HELP ", theme.status_mode_help),
    };
    let (reviewed, total) = state.progress();

    let mut spans = vec![
        Span::styled(mode_text, Style::default().fg(mode_fg).add_modifier(Modifier::BOLD)),
        Span::raw(format!(" {} ", state.diff_mode.label())),
        Span::raw(format!(" {reviewed}/{total} reviewed ")),
    ];
    if let Some(message) = &state.status {
        spans.push(Span::styled(format!(" {message}"), Style::default().fg(theme.marker_pending)));
    } else if state.loading {
        spans.push(Span::raw(" listing changes..."));
    } else if !state.tree.source().is_loaded() {
        spans.push(Span::raw(" loading reviews..."));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}
