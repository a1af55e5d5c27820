//! Local terminal control: availability, geometry and raw mode.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use crossterm::terminal;
use tracing::debug;

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Geometry {
    /// Sentinel meaning "unknown, let the remote side choose".
    pub const UNKNOWN: Geometry = Geometry { cols: 0, rows: 0 };

    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

/// Operations the session needs from the local terminal.
pub trait LocalTerminal: Send + Sync + 'static {
    /// Fail when no terminal device is attached.
    fn open(&self) -> io::Result<()>;
    fn size(&self) -> io::Result<Geometry>;
    fn enable_raw_mode(&self) -> io::Result<()>;
    fn disable_raw_mode(&self) -> io::Result<()>;
}

/// The process's controlling terminal via crossterm.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrosstermTerminal;

impl LocalTerminal for CrosstermTerminal {
    fn open(&self) -> io::Result<()> {
        if io::stdin().is_terminal() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "standard input is not a terminal",
            ))
        }
    }

    fn size(&self) -> io::Result<Geometry> {
        let (cols, rows) = terminal::size()?;
        Ok(Geometry::new(cols, rows))
    }

    fn enable_raw_mode(&self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        terminal::disable_raw_mode()
    }
}

/// Current size, or [`Geometry::UNKNOWN`] when the query fails.
pub fn query_geometry<T: LocalTerminal + ?Sized>(terminal: &T) -> Geometry {
    match terminal.size() {
        Ok(geometry) => geometry,
        Err(e) => {
            debug!(error = %e, "terminal size query failed; using remote default");
            Geometry::UNKNOWN
        }
    }
}

/// Raw mode lifetime guard: the terminal's prior mode is restored exactly
/// once, by [`RawModeGuard::restore`] or on drop (including unwinding).
pub struct RawModeGuard<T: LocalTerminal> {
    terminal: Arc<T>,
    active: bool,
}

impl<T: LocalTerminal> RawModeGuard<T> {
    /// Enable raw mode and return the guard that undoes it.
    pub fn acquire(terminal: Arc<T>) -> io::Result<Self> {
        terminal.enable_raw_mode()?;
        Ok(Self {
            terminal,
            active: true,
        })
    }

    /// Restore the prior mode now. Later calls and the drop are no-ops.
    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.terminal.disable_raw_mode()
    }
}

impl<T: LocalTerminal> Drop for RawModeGuard<T> {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
