// SPDX-License-Identifier: MIT
//
// Terminal control — raw mode, geometry discovery, and RAII cleanup.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), isatty, and raw fd writes. These are
// the standard POSIX interfaces for terminal control — there is no safe
// alternative. Each unsafe block is minimal and documented.
#![allow(unsafe_code)]
//
// This module owns the terminal's raw state. Entering raw mode returns a
// guard; dropping it restores the saved line discipline, so every exit
// path — normal quit, early error return, panic via the installed hook —
// puts the terminal back the way it was found.
//
// Geometry discovery lives here too because both paths talk to the same
// driver: the fast path asks the kernel via ioctl, and the fallback asks
// the terminal itself by parking the cursor in the bottom-right corner
// and requesting a position report.

use std::io::{self, Write};
use std::sync::{Mutex, Once};

use crate::ansi;
use crate::error::{Error, Result};
use crate::input::ByteSource;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
///
/// Resolved once at startup and treated as immutable for the run. Both
/// discovery paths reject zero dimensions, so `rows >= 1 && cols >= 1`
/// holds for every value handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of rows (height in character cells).
    pub rows: u16,
    /// Number of columns (width in character cells).
    pub cols: u16,
}

// ─── Raw mode configuration ─────────────────────────────────────────────────

/// Tunables for raw mode.
///
/// The read timeout is the only knob: it bounds how long a raw `read`
/// waits before returning empty, which is also the interval that
/// disambiguates a lone Escape keypress from the start of an escape
/// sequence. Units are tenths of a second (the termios VTIME unit).
#[derive(Debug, Clone, Copy)]
pub struct RawConfig {
    /// VTIME value: bounded read timeout in tenths of a second.
    pub read_timeout_tenths: u8,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            read_timeout_tenths: 1,
        }
    }
}

// ─── Terminal queries ───────────────────────────────────────────────────────

/// Check whether stdin is connected to a terminal (TTY).
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

/// Query the terminal size via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if stdout is not a terminal or the driver reports zero
/// columns (some terminals answer the ioctl but with an empty geometry).
#[cfg(unix)]
fn probe_winsize() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            rows: ws.ws_row,
            cols: ws.ws_col,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
fn probe_winsize() -> Option<Size> {
    None
}

/// Determine the usable screen size.
///
/// Primary path: `ioctl(TIOCGWINSZ)`. When that fails or reports zero
/// columns, the fallback pushes the cursor to the bottom-right corner
/// with clamping moves and asks the terminal where it ended up via a
/// DSR 6 cursor report. Requires raw mode to be active — the report
/// arrives unbuffered on stdin through `src`.
///
/// # Errors
///
/// [`Error::WindowSize`] when both paths fail, [`Error::Terminal`] if
/// the query could not even be written.
pub fn window_size(src: &mut impl ByteSource) -> Result<Size> {
    if let Some(size) = probe_winsize() {
        return Ok(size);
    }
    fallback_size(src, &mut io::stdout().lock())
}

/// The query-based fallback: park the cursor at the extreme bottom-right,
/// request a cursor report, and parse the reply.
fn fallback_size(src: &mut impl ByteSource, w: &mut impl Write) -> Result<Size> {
    ansi::cursor_far_right_down(w)?;
    ansi::request_cursor_report(w)?;
    w.flush()?;

    // Collect the reply up to the terminating `R`. Bounded reads mean a
    // dead or non-ANSI terminal yields a timeout, not a hang; an
    // implausibly long reply is cut off rather than trusted.
    let mut reply = Vec::with_capacity(16);
    loop {
        match src.read_byte()? {
            Some(b'R') => break,
            Some(byte) => {
                reply.push(byte);
                if reply.len() > 32 {
                    return Err(Error::WindowSize);
                }
            }
            None => return Err(Error::WindowSize),
        }
    }

    parse_cursor_report(&reply).ok_or(Error::WindowSize)
}

/// Parse the body of a cursor position report: `ESC [ rows ; cols`.
///
/// The terminating `R` has already been consumed. Any deviation —
/// missing prefix, non-digits, absent separator, zero dimensions —
/// yields `None` so the caller fails loudly instead of acting on a
/// garbled reply.
fn parse_cursor_report(reply: &[u8]) -> Option<Size> {
    let body = reply.strip_prefix(b"\x1b[")?;
    let sep = body.iter().position(|&b| b == b';')?;
    let rows = parse_u16(&body[..sep])?;
    let cols = parse_u16(&body[sep + 1..])?;
    if rows == 0 || cols == 0 {
        return None;
    }
    Some(Size { rows, cols })
}

/// Strict decimal parse: all bytes must be digits, value must fit.
fn parse_u16(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() {
        return None;
    }
    let mut value: u16 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value
            .checked_mul(10)?
            .checked_add(u16::from(byte - b'0'))?;
    }
    Some(value)
}

// ─── Panic-safe terminal restore ────────────────────────────────────────────

/// Global backup of original termios for panic recovery.
///
/// The [`RawMode`] guard owns its own copy, but the panic hook can't
/// access it. This global backup — behind a [`Mutex`], not `static mut` —
/// lets the hook restore the line discipline without the guard.
#[cfg(unix)]
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

/// Restore termios from the global backup. Best-effort, ignores errors.
#[cfg(unix)]
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some(ref original) = *guard {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, original);
            }
        }
    }
}

/// Screen restore sequence for emergency use: clear the screen, park the
/// cursor at the top-left, and make it visible again, so the panic
/// message that follows prints on a clean, usable terminal.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[2J\x1b[H\x1b[?25h";

/// Panic hook guard — ensures the hook is installed at most once per process.
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install a panic hook that restores the terminal before printing the error.
///
/// Without this, a panic in raw mode leaves the user's terminal broken:
/// no echo, no line editing, no way to read the error message. The hook
/// writes [`EMERGENCY_RESTORE`] directly to fd 1 (bypassing Rust's stdout
/// lock to avoid deadlock), restores termios, then delegates to the
/// original panic handler.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();

            #[cfg(unix)]
            restore_termios_from_backup();

            original(info);
        }));
    });
}

/// Write the restore sequence directly to stdout's file descriptor.
///
/// Bypasses Rust's `io::stdout()` lock to avoid deadlocking if the panic
/// occurred while the lock was held (e.g., mid-frame flush).
fn emergency_restore() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let _ = io::stdout().write_all(EMERGENCY_RESTORE);
        let _ = io::stdout().flush();
    }
}

// ─── Raw mode ───────────────────────────────────────────────────────────────

/// Raw-mode guard with RAII cleanup.
///
/// [`enter`](Self::enter) captures the current line discipline and applies
/// the raw configuration; dropping the guard restores the capture. The
/// guard is the only component allowed to mutate terminal configuration —
/// hold it for the whole interactive session.
///
/// # Example
///
/// ```no_run
/// use kalam_term::terminal::{RawConfig, RawMode};
///
/// let _guard = RawMode::enter(RawConfig::default())?;
/// // ... render frames, decode keys ...
/// // Line discipline is restored when the guard drops.
/// # Ok::<(), kalam_term::Error>(())
/// ```
pub struct RawMode {
    /// Original termios saved before entering raw mode.
    #[cfg(unix)]
    original: libc::termios,
}

impl RawMode {
    /// Enter raw mode.
    ///
    /// Applies byte-at-a-time input (no line assembly, no echo, no signal
    /// keys, no flow control), disables output post-processing, and sets
    /// the bounded-timeout read policy (`VMIN = 0`, `VTIME` from
    /// `config`). Also installs the panic hook (once per process).
    ///
    /// # Errors
    ///
    /// [`Error::NotATty`] when stdin is not a terminal;
    /// [`Error::Terminal`] when a termios call fails. Both are fatal —
    /// they happen before any state worth preserving exists.
    #[cfg(unix)]
    pub fn enter(config: RawConfig) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        if !is_tty() {
            return Err(Error::NotATty);
        }

        install_panic_hook();

        let fd = io::stdin().as_raw_fd();

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error().into());
            }

            let original = termios;

            // Save to the global backup for the panic hook.
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(original);
            }

            // Byte-at-a-time input: no break signal, no CR translation,
            // no parity check, no bit stripping, no flow control.
            termios.c_iflag &=
                !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
            // Written bytes pass through unmodified (no "\n" → "\r\n").
            termios.c_oflag &= !libc::OPOST;
            termios.c_cflag |= libc::CS8;
            // No echo, no line assembly, no Ctrl-V quoting, no signal keys
            // (Ctrl-C / Ctrl-Z arrive as plain bytes).
            termios.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);

            // VMIN=0 + VTIME=n: read() returns after n tenths of a second
            // with zero bytes if nothing was typed, instead of blocking.
            termios.c_cc[libc::VMIN] = 0;
            termios.c_cc[libc::VTIME] = config.read_timeout_tenths;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error().into());
            }

            Ok(Self { original })
        }
    }

    /// Raw mode is unavailable off-unix; `is_tty` is false there anyway.
    #[cfg(not(unix))]
    pub fn enter(_config: RawConfig) -> Result<Self> {
        Err(Error::NotATty)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = io::stdin().as_raw_fd();
            // Best-effort: there is nothing useful to do if restore fails
            // on the way out.
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const self.original);
            }

            // Restored — the panic hook no longer needs the backup.
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
