//! revtree: mark changed files as reviewed, one file or one directory at a time.
//!
//! Entry point for the `revtree` binary. Wires together the terminal lifecycle
//! (`tui`), the event bus (`event`), the git thread (`git`), the reviewed-flag
//! store (`store` over `revtree-core`'s SQLite database) and the UI (`ui`).
//!
//! # Startup sequence
//!
//! 1. Load config and start logging to a file; both happen before the terminal
//!    is taken over so their errors can still reach stderr. Neither is fatal:
//!    a read-only checkout still gets a working UI over in-memory flags.
//! 2. `install_panic_hook()`, then `register_sigterm()`, then `init_tui()`.
//! 3. Open the database. On failure reviewed flags live in memory only.
//! 4. Spawn the git thread and request the first listing.
//!
//! `restore_tui()` runs after the event loop exits on every non-panic path
//! (q key, SIGTERM, channel close, draw error).

mod app;
mod config;
mod event;
mod git;
mod logging;
mod store;
mod theme;
mod tui;
mod ui;

use std::path::Path;
use std::sync::atomic::Ordering;

use event::AppEvent;
use ui::keybindings::{handle_key, handle_mouse, KeyAction};

/// Ticks (4 Hz) between two automatic re-listings of the working tree.
const REFRESH_TICKS: u32 = 8;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = config::Config::load();

    let db_path = Path::new(&config.db_path);
    let data_dir = db_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let _log_guard = logging::init_logging(data_dir, &config.log_level);
    let theme = theme::Theme::from_name(&config.theme);

    let repo_path = std::env::current_dir()?.canonicalize()?.to_string_lossy().into_owned();
    tracing::info!(repo = %repo_path, policy = ?config.bulk_policy, "starting");

    tui::install_panic_hook();
    let term_flag = tui::register_sigterm()?;
    let mut terminal = tui::init_tui()?;

    let handler = event::EventHandler::new();
    event::spawn_event_task(handler.tx.clone());
    let mut rx = handler.rx;

    let source = match revtree_core::db::open_db(&config.db_path).await {
        Ok(conn) => store::ReviewSource::sqlite(conn, handler.tx.clone()),
        Err(e) => {
            tracing::error!(path = %config.db_path, error = %e, "cannot open review database; flags will not be saved");
            store::ReviewSource::memory()
        }
    };
    let mut state =
        app::AppState::new(source, config.bulk_policy, config.compact_directories, repo_path.clone());
    if state.tree.source().connection().is_none() {
        state.status = Some("review database unavailable; flags will not be saved".to_owned());
    }

    let (git_tx, git_rx) = crossbeam_channel::unbounded();
    let worker_events = handler.tx.clone();
    std::thread::spawn(move || git::worker::git_worker_loop(repo_path, git_rx, worker_events));
    state.git_tx = Some(git_tx);
    state.request_listing();

    let mut ticks: u32 = 0;

    // Exits only via `break` so `restore_tui()` is always reached.
    'event_loop: loop {
        tokio::select! {
            // Heartbeat: SIGTERM is checked at least every 50ms even when no
            // events arrive.
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else {
                    break 'event_loop;
                };
                match event {
                    AppEvent::Render => {
                        if let Err(e) = terminal.draw(|frame| ui::render(frame, &mut state, &theme)) {
                            tracing::error!(error = %e, "draw failed");
                            break 'event_loop;
                        }
                    }
                    AppEvent::Key(key) => {
                        if handle_key(key, &mut state) == KeyAction::Quit {
                            break 'event_loop;
                        }
                    }
                    AppEvent::Mouse(mouse) => {
                        handle_mouse(mouse, &mut state);
                    }
                    AppEvent::Tick => {
                        ticks = ticks.wrapping_add(1);
                        if ticks % REFRESH_TICKS == 0 && !state.loading {
                            state.request_listing();
                        }
                    }
                    AppEvent::GitResult(payload) => {
                        if let Some(load) = state.apply_git_result(*payload) {
                            if let Some(conn) = state.tree.source().connection() {
                                store::spawn_session_load(conn, load, handler.tx.clone());
                            }
                        }
                    }
                    AppEvent::ReviewsLoaded { identity, session_id, rows } => {
                        state.apply_reviews(&identity, session_id, rows);
                    }
                    AppEvent::ReviewWritten { identity, key, checked } => {
                        state.apply_review_written(&identity, &key, checked);
                    }
                    // Picked up by frame.area() on the next Render.
                    AppEvent::Resize(_, _) => {}
                }
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }

    let source = state.tree.source();
    if let (Some(conn), Some(session_id)) = (source.connection(), source.session_id()) {
        if let Err(e) = revtree_core::db::update_session_timestamp(&conn, session_id).await {
            tracing::warn!(error = %e, "failed to stamp review session");
        }
    }

    tui::restore_tui()?;
    tracing::info!("exiting");
    Ok(())
}
