//! Tree panel renderer for revtree.
//!
//! Renders `AppState.rows` (the depth-first walk of the session) as an indented
//! list. Every row starts with its review marker, taken from the presentation
//! the engine last pushed for that node:
//!
//! - `[x]` every file below is reviewed
//! - `[-]` some are
//! - `[ ]` none are
//! - `[?]` a flag below is still loading
//!
//! File rows additionally carry their status badge and `+N -N` counts.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};
use revtree_core::{NodePresentation, NodeRef};

use crate::app::{node_label, AppState};
use crate::git::types::FileSummary;
use crate::theme::Theme;
use crate::ui::layout::panel_block;

/// Renders the tree panel with the selection highlight from `state.list_state`.
pub fn render_tree(frame: &mut Frame, area: Rect, state: &mut AppState, theme: &Theme) {
    let (reviewed, total) = state.progress();
    let title = if total > 0 { format!("Files ({reviewed}/{total})") } else { "Files".to_owned() };
    let block = panel_block(&title, true, theme);

    let items: Vec<ListItem> = if state.rows.is_empty() {
        let msg = if state.loading { "Loading..." } else { "No changes" };
        vec![ListItem::new(Line::raw(msg))]
    } else {
        let session = state.tree.session();
        let view = state.tree.sink();
        state
            .rows
            .iter()
            .map(|&(node, depth)| {
                let mark = view.mark(node).unwrap_or_default();
                let file = match node {
                    NodeRef::Leaf(id) => session.leaf(id).and_then(|leaf| state.files.get(leaf.key())),
                    NodeRef::Aggregate(_) => None,
                };
                let is_dir = matches!(node, NodeRef::Aggregate(_));
                tree_item(node_label(session, node), depth, mark, file, is_dir, theme)
            })
            .collect()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(theme.border_active).add_modifier(Modifier::BOLD));

    frame.render_stateful_widget(list, area, &mut state.list_state);
}

/// Returns the marker text and color for one presentation.
///
/// Pending wins over the other markers: a half-loaded directory must not look
/// settled.
pub fn marker(mark: NodePresentation, theme: &Theme) -> (&'static str, ratatui::style::Color) {
    if mark.pending {
        ("[?] ", theme.marker_pending)
    } else if mark.checked {
        ("[x] ", theme.marker_checked)
    } else if mark.partial {
        ("[-] ", theme.marker_partial)
    } else {
        ("[ ] ", theme.marker_unchecked)
    }
}

fn tree_item<'a>(
    label: &'a str,
    depth: usize,
    mark: NodePresentation,
    file: Option<&FileSummary>,
    is_dir: bool,
    theme: &Theme,
) -> ListItem<'a> {
    let (marker_text, marker_color) = marker(mark, theme);
    let mut spans = vec![
        Span::raw("  ".repeat(depth)),
        Span::styled(marker_text, Style::default().fg(marker_color)),
    ];

    if let Some(f) = file {
        let badge_color = match f.status {
            'A' => theme.file_added,
            'D' => theme.file_removed,
            _ => theme.file_modified,
        };
        spans.push(Span::styled(format!("{} ", f.status), Style::default().fg(badge_color)));
    }

    if is_dir {
        spans.push(Span::styled(format!("{label}/"), Style::default().add_modifier(Modifier::BOLD)));
    } else {
        spans.push(Span::raw(label));
    }

    if let Some(f) = file.filter(|f| f.added > 0 || f.removed > 0) {
        spans.push(Span::styled(
            format!("  +{} -{}", f.added, f.removed),
            Style::default().fg(theme.border_inactive),
        ));
    }
    ListItem::new(Line::from(spans))
}
