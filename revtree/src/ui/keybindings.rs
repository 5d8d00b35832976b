//! Keybinding dispatcher for revtree.
//!
//! Translates raw crossterm `KeyEvent`s into `AppState` mutations and returns a
//! `KeyAction` telling the event loop whether to continue or quit. The
//! dispatcher branches first on `state.mode` so that HelpOverlay and Normal have
//! isolated handler functions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{AppState, Mode};

/// Control-flow signal returned from the key dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Continue the event loop and redraw.
    Continue,
    /// Restore the terminal and exit.
    Quit,
}

/// Dispatches a key event to the handler matching the current mode.
///
/// Any key press clears the status bar message left by the previous command.
pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyAction {
    state.status = None;
    match state.mode {
        Mode::HelpOverlay => handle_help(key, state),
        Mode::Normal => handle_normal(key, state),
    }
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

fn handle_normal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    if let Some(action) = handle_move_key(key, state) {
        return action;
    }

    match key.code {
        KeyCode::Char(' ') | KeyCode::Char('x') => state.toggle_selected(),
        KeyCode::Tab => state.cycle_diff_mode(),
        KeyCode::Char('r') => state.request_listing(),
        KeyCode::Char('?') => {
            state.help_scroll = 0;
            state.mode = Mode::HelpOverlay;
        }
        KeyCode::Char('q') | KeyCode::Esc => return KeyAction::Quit,
        _ => {}
    }
    KeyAction::Continue
}

/// Handles selection keys: j / k / g / G, arrows, and Ctrl-d / Ctrl-u.
///
/// Returns `None` when the key should fall through to the rest of the Normal
/// handler.
fn handle_move_key(key: KeyEvent, state: &mut AppState) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.select_next(1),
        KeyCode::Char('k') | KeyCode::Up => state.select_prev(1),
        KeyCode::Char('g') | KeyCode::Home => state.select_first(),
        KeyCode::Char('G') | KeyCode::End => state.select_last(),
        KeyCode::Char('d') if ctrl => state.half_page_down(),
        KeyCode::Char('u') if ctrl => state.half_page_up(),
        _ => return None,
    }
    Some(KeyAction::Continue)
}

// ---------------------------------------------------------------------------
// HelpOverlay mode
// ---------------------------------------------------------------------------

/// Handles a key event while the help overlay is visible.
///
/// `?`, `Esc`, or `q` dismisses the overlay; j / k / g / G scroll it.
fn handle_help(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            state.help_scroll = state.help_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            state.help_scroll = state.help_scroll.saturating_sub(1);
        }
        KeyCode::Char('g') => state.help_scroll = 0,
        KeyCode::Char('G') => state.help_scroll = u16::MAX,
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q') => state.mode = Mode::Normal,
        _ => {}
    }
    KeyAction::Continue
}

// ---------------------------------------------------------------------------
// Mouse events
// ---------------------------------------------------------------------------

/// Handles the scroll wheel: moves the selection, or scrolls the help overlay
/// when it is open, by 3 rows.
pub fn handle_mouse(mouse: MouseEvent, state: &mut AppState) -> KeyAction {
    let help = state.mode == Mode::HelpOverlay;
    match mouse.kind {
        MouseEventKind::ScrollUp if help => state.help_scroll = state.help_scroll.saturating_sub(3),
        MouseEventKind::ScrollDown if help => state.help_scroll = state.help_scroll.saturating_add(3),
        MouseEventKind::ScrollUp => state.select_prev(3),
        MouseEventKind::ScrollDown => state.select_next(3),
        _ => {}
    }
    KeyAction::Continue
}
