//! Event bus for revtree.
//!
//! All user input, timer ticks, and background-task results (git listings,
//! review rows loaded from SQLite, confirmed review writes) are normalised into
//! a single `AppEvent` enum and sent over a tokio unbounded MPSC channel. The
//! main loop receives from this channel and dispatches accordingly.
//!
//! Two independent intervals drive the render and logic cycles:
//! - **Render interval** (33 ms, about 30 FPS): triggers a `terminal.draw()` call.
//! - **Tick interval** (250 ms): drives the periodic refresh of the changed-file list.
//!
//! Keeping them independent allows tuning render frequency (e.g., drop to 20 FPS
//! on battery) without affecting logic frequency, and vice-versa.

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use revtree_core::types::FileReviewState;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

/// All events the application can receive from any source.
///
/// Results from background work carry the identity of the review session they
/// were started for; the main loop drops them when that session is gone.
#[derive(Debug)]
pub enum AppEvent {
    /// A key press from the terminal (`KeyEventKind::Press` only).
    ///
    /// Release and repeat events are filtered in [`spawn_event_task`] to avoid
    /// double-firing on Windows, which synthesises both press and release for
    /// every keystroke.
    Key(KeyEvent),
    /// A mouse event from the terminal (click, scroll, move).
    Mouse(MouseEvent),
    /// Terminal was resized to (columns, rows).
    Resize(u16, u16),
    /// Logic tick (4 Hz / 250 ms).
    Tick,
    /// Render tick: triggers a `terminal.draw()` call (about 30 FPS / 33 ms).
    Render,
    /// Result from the git background thread.
    GitResult(Box<crate::git::types::GitResultPayload>),
    /// Stored review rows for a session, loaded after the session started.
    ReviewsLoaded {
        identity: String,
        session_id: String,
        rows: Vec<FileReviewState>,
    },
    /// A reviewed flag was committed to SQLite.
    ReviewWritten {
        identity: String,
        key: String,
        checked: bool,
    },
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The sender (`tx`) is cloned and distributed to background tasks;
/// the receiver (`rx`) is owned by the main event loop.
pub struct EventHandler {
    /// Send half; clone this for each background task that produces events.
    pub tx: mpsc::UnboundedSender<AppEvent>,
    /// Receive half, owned by the main loop; call `.recv().await` to block
    /// until the next event.
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    /// Creates a new `EventHandler` with a fresh unbounded channel.
    ///
    /// Unbounded: producers are terminal input, timers and one reply per
    /// background request, all of which the main loop keeps up with.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the background tokio task that drives the unified event channel.
///
/// The task runs until the `tx` sender is dropped (i.e., the `EventHandler` is
/// dropped). Two fully independent `tokio::time::interval` timers drive the
/// render and logic cycles; crossterm input is polled via `EventStream`.
///
/// `reader.next().fuse()` keeps `tokio::select!` from polling a completed
/// future if the crossterm stream ends. Only `KeyEventKind::Press` is
/// forwarded, since Windows reports both press and release. The task exits
/// once the receiver is gone.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis(250));
        let mut render_interval = interval(Duration::from_millis(33));
        let mut reader = EventStream::new();

        loop {
            let tick_tick = tick_interval.tick();
            let render_tick = render_interval.tick();
            let crossterm_event = reader.next().fuse();

            let sent = tokio::select! {
                _ = tick_tick => tx.send(AppEvent::Tick),
                _ = render_tick => tx.send(AppEvent::Render),
                maybe_event = crossterm_event => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        tx.send(AppEvent::Key(key))
                    }
                    Some(Ok(Event::Resize(w, h))) => tx.send(AppEvent::Resize(w, h)),
                    Some(Ok(Event::Mouse(mouse))) => tx.send(AppEvent::Mouse(mouse)),
                    _ => Ok(()),
                },
            };
            if sent.is_err() {
                break;
            }
        }
    });
}
