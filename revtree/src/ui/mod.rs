//! UI rendering module for revtree.
//!
//! `render()` is the single entry point called by the event loop's
//! `terminal.draw()` closure. Layout arithmetic lives in `layout.rs`, the tree
//! panel in `file_tree.rs`, and the help overlay in `help.rs`.

mod layout;
pub mod file_tree;
pub mod help;
pub mod keybindings;

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};
use revtree_core::{CheckState, NodeRef};

use crate::app::{AppState, Mode};
use crate::theme::Theme;
use layout::{compute_layout, inner_rect, panel_block, render_status_bar};

/// Renders one complete frame: tree panel, details panel, and status bar.
///
/// Called exactly once per `AppEvent::Render` inside `terminal.draw()`. The tree
/// panel's inner height is written back into `state` so that half-page moves
/// triggered by the next keypress use the current size.
pub fn render(frame: &mut Frame, state: &mut AppState, theme: &Theme) {
    let [tree, details, status_bar] = compute_layout(frame);
    state.viewport_height = inner_rect(tree).height;

    file_tree::render_tree(frame, tree, state, theme);
    if details.width > 0 {
        render_details(frame, details, state, theme);
    }
    render_status_bar(frame, status_bar, state, theme);

    if state.mode == Mode::HelpOverlay {
        help::render_help_overlay(frame, theme, state.help_scroll);
    }
}

/// Renders the details of the selected row: path, state and, for directories,
/// the counters the marker is derived from.
fn render_details(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let block = panel_block("Details", false, theme);
    let session = state.tree.session();
    let dim = Style::default().fg(theme.border_inactive);

    let lines: Vec<Line> = match state.selected_node() {
        Some(NodeRef::Leaf(id)) => match session.leaf(id) {
            Some(leaf) => {
                let state_text = match leaf.state().checked() {
                    Some(true) => "reviewed",
                    Some(false) => "not reviewed",
                    None => "loading",
                };
                let mut lines = vec![
                    Line::from(leaf.key().to_owned()),
                    Line::from(vec![Span::styled("state    ", dim), Span::raw(state_text)]),
                ];
                if let Some(f) = state.files.get(leaf.key()) {
                    lines.push(Line::from(vec![
                        Span::styled("change   ", dim),
                        Span::raw(format!("{}  +{} -{}", f.status, f.added, f.removed)),
                    ]));
                }
                if let Some(deferred) = leaf.deferred() {
                    let text = if deferred { "mark reviewed" } else { "mark not reviewed" };
                    lines.push(Line::from(vec![Span::styled("queued   ", dim), Span::raw(text)]));
                }
                lines
            }
            None => Vec::new(),
        },
        Some(NodeRef::Aggregate(id)) => match session.aggregate(id) {
            Some(dir) => {
                let state_text = match dir.check_state() {
                    CheckState::Checked => "all reviewed",
                    CheckState::Partial => "partly reviewed",
                    CheckState::Unchecked => "none reviewed",
                };
                vec![
                    Line::from(dir.label().to_owned()),
                    Line::from(vec![Span::styled("state    ", dim), Span::raw(state_text)]),
                    Line::from(vec![
                        Span::styled("children ", dim),
                        Span::raw(dir.child_count().to_string()),
                    ]),
                    Line::from(vec![
                        Span::styled("loading  ", dim),
                        Span::raw(dir.pending_count().to_string()),
                    ]),
                ]
            }
            None => Vec::new(),
        },
        None => vec![Line::styled("Nothing selected", dim)],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
