//! Terminal lifecycle management for revtree.
//!
//! The TUI renders to stderr so that stdout stays clean for shell pipelines.

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use signal_hook::consts::SIGTERM;
use signal_hook::flag::register;
use std::io::{stderr, BufWriter, Stderr};
use std::panic;
use std::sync::{atomic::AtomicBool, Arc};

/// CrosstermBackend over a buffered stderr writer.
///
/// `BufWriter<Stderr>` batches escape sequences into fewer write(2) syscalls,
/// reducing flicker at the 30 FPS render interval.
pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

/// Enables raw mode, enters the alternate screen and turns on mouse capture.
///
/// Call [`restore_tui`] at every exit path. If a step after enabling raw mode
/// fails, the terminal is restored before the error is returned.
///
/// # Errors
///
/// Returns `Err` if `enable_raw_mode`, `execute!`, or `Terminal::new` fails.
pub fn init_tui() -> std::io::Result<Tui> {
    let mut out = BufWriter::new(stderr());
    enable_raw_mode()?;
    let terminal = execute!(out, EnterAlternateScreen, EnableMouseCapture)
        .and_then(|()| Terminal::new(CrosstermBackend::new(out)));
    if terminal.is_err() {
        let _ = restore_tui();
    }
    terminal
}

/// Restores the terminal to its pre-TUI state.
///
/// Idempotent. Must run at every exit path, the panic hook included, because
/// ratatui 0.30 does not restore the terminal on `Drop`.
///
/// # Errors
///
/// Returns `Err` if `disable_raw_mode` or `execute!` fails. The panic hook
/// ignores it; cleanup there is best effort.
pub fn restore_tui() -> std::io::Result<()> {
    disable_raw_mode()?;
    execute!(stderr(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

/// Installs a panic hook that restores the terminal before printing the panic.
///
/// Must be called before [`init_tui`]. Chains onto the previously installed
/// hook so the default panic printer still runs.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_tui();
        original_hook(panic_info);
    }));
}

/// Registers a SIGTERM handler that sets the returned flag.
///
/// The main event loop polls the flag and leaves through its normal exit path.
///
/// # Errors
///
/// Returns `Err` if the OS refuses to register the handler.
pub fn register_sigterm() -> std::io::Result<Arc<AtomicBool>> {
    let term = Arc::new(AtomicBool::new(false));
    register(SIGTERM, Arc::clone(&term))?;
    Ok(term)
}
