//! Help overlay renderer for revtree.
//!
//! `render_help_overlay()` draws a centred modal box over the panel layout,
//! erasing the background with ratatui's `Clear` widget inside the same
//! `terminal.draw()` closure as the other panels.

use ratatui::{
    Frame,
    layout::Constraint,
    style::Style,
    text::{Line, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::theme::Theme;

/// Renders the help overlay, scrolled vertically by `help_scroll` rows.
///
/// Skipped on terminals narrower than 60 columns to avoid a zero-height `Rect`.
pub fn render_help_overlay(frame: &mut Frame, theme: &Theme, help_scroll: u16) {
    if frame.area().width < 60 {
        return;
    }

    let overlay_area = frame.area().centered(Constraint::Percentage(80), Constraint::Percentage(80));
    frame.render_widget(Clear, overlay_area);

    let block = Block::bordered()
        .title(" Help: j/k scroll, ? or Esc to dismiss ")
        .border_style(Style::default().fg(theme.border_active));

    frame.render_widget(
        Paragraph::new(build_help_text())
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((help_scroll, 0)),
        overlay_area,
    );
}

fn build_help_text() -> Text<'static> {
    Text::from(vec![
        Line::from("Navigation"),
        Line::from("  j / k         Move down / up one row"),
        Line::from("  g / G         Jump to top / bottom"),
        Line::from("  Ctrl-d / u    Move half a page down / up"),
        Line::from(""),
        Line::from("Review"),
        Line::from("  Space / x     Toggle the selected file, or the whole directory"),
        Line::from("                ([x] unchecks everything below, otherwise checks it)"),
        Line::from(""),
        Line::from("Markers"),
        Line::from("  [x]  every file below is reviewed"),
        Line::from("  [-]  some files below are reviewed"),
        Line::from("  [ ]  nothing below is reviewed"),
        Line::from("  [?]  reviewed flags are still loading"),
        Line::from(""),
        Line::from("Diff Mode  (Tab cycles through all modes)"),
        Line::from("  Unstaged  ->  Staged  ->  Branch vs main"),
        Line::from("  r             Re-read the list of changed files"),
        Line::from(""),
        Line::from("General"),
        Line::from("  ?             Open / close this help overlay"),
        Line::from("  q / Esc       Quit"),
    ])
}
