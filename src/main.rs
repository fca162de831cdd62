// SPDX-License-Identifier: MIT
//
// kalam — a small terminal text editor in the making.
//
// This binary wires the kalam-term crate into an interactive loop:
//
//   stdin bytes → read_key → dispatch → cursor mutation
//   draw_frame → RenderBuffer → one write to stdout
//
// The current stage is the terminal-control skeleton: raw mode, key
// decoding, geometry discovery, and the batched render cycle. There is
// no text buffer yet — every row renders as a `~` fill marker, the way
// a screen editor marks lines past the end of the document.
//
// Startup order matters: the `--version` check runs before raw mode is
// ever entered, and geometry resolution runs after, because the
// cursor-report fallback needs unbuffered reads. Once the loop starts,
// the raw-mode guard owns the terminal until the process exits.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, trace};

use kalam_term::ansi;
use kalam_term::input::{self, ByteSource, KeyEvent, SpecialKey, StdinSource};
use kalam_term::output::RenderBuffer;
use kalam_term::terminal::{self, RawConfig, RawMode, Size};

/// Package version baked in at compile time.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The quit chord: Ctrl-Q.
const QUIT: u8 = input::ctrl(b'q');

// ─── Editor state ───────────────────────────────────────────────────────────

/// Cursor position inside the viewport, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cursor {
    row: u16,
    col: u16,
}

/// One-cell movement direction.
#[derive(Debug, Clone, Copy)]
enum Dir {
    Up,
    Down,
    Left,
    Right,
}

/// What the loop does after a dispatched key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Keep running.
    Continue,
    /// Leave the loop; the process exits.
    Quit,
}

/// The editor state: viewport geometry fixed at startup, plus the cursor.
///
/// Passed explicitly into every draw and dispatch step — no globals, so
/// both steps are plain functions of their inputs and test directly.
struct Editor {
    size: Size,
    cursor: Cursor,
}

impl Editor {
    const fn new(size: Size) -> Self {
        Self {
            size,
            cursor: Cursor { row: 0, col: 0 },
        }
    }

    // ── Frame rendering ─────────────────────────────────────────────────

    /// Compose one frame into `out`.
    ///
    /// The cursor is hidden for the duration of the repaint and the whole
    /// frame goes out in a single write, so a slow terminal never shows a
    /// half-painted screen or a cursor jumping from row to row.
    fn draw_frame(&self, out: &mut RenderBuffer) -> io::Result<()> {
        ansi::cursor_hide(out)?;
        ansi::cursor_home(out)?;
        self.draw_rows(out)?;
        ansi::cursor_to(out, self.cursor.row, self.cursor.col)?;
        ansi::cursor_show(out)
    }

    /// Paint every viewport row: fill marker, then clear to end of line.
    ///
    /// The separator goes *between* rows, not after the last one — a
    /// trailing `\r\n` on the bottom row would make the terminal scroll
    /// and leave a blank line under the viewport.
    fn draw_rows(&self, out: &mut RenderBuffer) -> io::Result<()> {
        for row in 0..self.size.rows {
            if row == self.size.rows / 3 {
                self.draw_banner(out)?;
            } else {
                out.write_all(b"~")?;
            }
            ansi::clear_line_right(out)?;
            if row + 1 < self.size.rows {
                out.write_all(b"\r\n")?;
            }
        }
        Ok(())
    }

    /// The banner row: a centered name/version line shown while there is
    /// no document to display, truncated to the viewport width.
    fn draw_banner(&self, out: &mut RenderBuffer) -> io::Result<()> {
        let mut banner = format!("kalam editor -- version {VERSION}");
        banner.truncate(usize::from(self.size.cols));
        let padding = (usize::from(self.size.cols) - banner.len()) / 2;
        if padding > 0 {
            out.write_all(b"~")?;
            for _ in 1..padding {
                out.write_all(b" ")?;
            }
        }
        out.write_all(banner.as_bytes())
    }

    // ── Key dispatch ────────────────────────────────────────────────────

    /// Apply one decoded key to the editor state.
    fn dispatch(&mut self, key: KeyEvent) -> Action {
        match key {
            KeyEvent::Ctrl(QUIT) => Action::Quit,
            KeyEvent::Special(special) => {
                self.handle_special(special);
                Action::Continue
            }
            // Text insertion arrives with the buffer layer.
            KeyEvent::Char(_) | KeyEvent::Ctrl(_) => Action::Continue,
        }
    }

    fn handle_special(&mut self, key: SpecialKey) {
        match key {
            SpecialKey::ArrowUp => self.move_cursor(Dir::Up),
            SpecialKey::ArrowDown => self.move_cursor(Dir::Down),
            SpecialKey::ArrowLeft => self.move_cursor(Dir::Left),
            SpecialKey::ArrowRight => self.move_cursor(Dir::Right),
            SpecialKey::Home => self.cursor.col = 0,
            SpecialKey::End => self.cursor.col = self.size.cols - 1,
            // Page moves repeat a one-row step across the viewport height,
            // so they clamp exactly like the arrows do.
            SpecialKey::PageUp => {
                for _ in 0..self.size.rows {
                    self.move_cursor(Dir::Up);
                }
            }
            SpecialKey::PageDown => {
                for _ in 0..self.size.rows {
                    self.move_cursor(Dir::Down);
                }
            }
            SpecialKey::Delete | SpecialKey::Escape => {}
        }
    }

    /// One-cell cursor movement, clamped at the viewport edges. Moves at
    /// a boundary are no-ops — never a wrap, never an error.
    fn move_cursor(&mut self, dir: Dir) {
        match dir {
            Dir::Up => self.cursor.row = self.cursor.row.saturating_sub(1),
            Dir::Down => {
                if self.cursor.row + 1 < self.size.rows {
                    self.cursor.row += 1;
                }
            }
            Dir::Left => self.cursor.col = self.cursor.col.saturating_sub(1),
            Dir::Right => {
                if self.cursor.col + 1 < self.size.cols {
                    self.cursor.col += 1;
                }
            }
        }
    }

    // ── The loop ────────────────────────────────────────────────────────

    /// The editor loop: paint, decode one key, dispatch.
    ///
    /// Returns when the quit chord arrives. The screen is cleared on the
    /// way out so the shell gets a clean terminal back; nothing is
    /// painted after the quit key is seen.
    fn run(&mut self, src: &mut impl ByteSource, sink: &mut impl Write) -> Result<()> {
        let mut out = RenderBuffer::new();
        loop {
            self.draw_frame(&mut out)?;
            out.flush_to(sink)?;

            let key = input::read_key(src)?;
            trace!(?key, "decoded");

            if self.dispatch(key) == Action::Quit {
                debug!("quit chord received");
                ansi::clear_screen(&mut out)?;
                ansi::cursor_home(&mut out)?;
                out.flush_to(sink)?;
                return Ok(());
            }
        }
    }
}

// ─── Startup plumbing ───────────────────────────────────────────────────────

/// `--version` short-circuits the editor entirely: print the banner and
/// return before raw mode is ever entered.
fn print_version() {
    println!("kalam v{VERSION}");
    println!("MIT licensed. This program comes with no warranty of any kind.");
}

/// Set up file logging when `KALAM_LOG` is present.
///
/// Stdout carries frames and stderr only the final fatal diagnostic, so
/// logs go to `kalam.log` in the working directory. The variable's value
/// is the usual tracing filter syntax (`debug`, `kalam=trace`, …).
fn init_logging() -> Result<()> {
    let Ok(filter) = env::var("KALAM_LOG") else {
        return Ok(());
    };

    let file = fs::File::create("kalam.log").context("creating kalam.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Raw-mode tunables, with the `KALAM_READ_TIMEOUT` override (tenths of
/// a second). The timeout's only observable effect is Escape-key
/// latency, so it is a knob rather than a constant; unparseable or zero
/// values fall back to the default.
fn raw_config() -> RawConfig {
    let mut config = RawConfig::default();
    let tenths = env::var("KALAM_READ_TIMEOUT")
        .ok()
        .and_then(|value| value.parse::<u8>().ok());
    if let Some(tenths) = tenths {
        if tenths > 0 {
            config.read_timeout_tenths = tenths;
        }
    }
    config
}

fn try_main() -> Result<()> {
    init_logging()?;

    let _raw = RawMode::enter(raw_config()).context("entering raw mode")?;
    let mut src = StdinSource;

    let size = terminal::window_size(&mut src).context("resolving window size")?;
    info!(rows = size.rows, cols = size.cols, "terminal ready");

    let mut editor = Editor::new(size);
    editor.run(&mut src, &mut io::stdout().lock())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.get(1).is_some_and(|arg| arg == "--version") {
        print_version();
        return;
    }

    if let Err(e) = try_main() {
        // The raw-mode guard has restored the line discipline by the time
        // the error unwinds here; clear whatever half-frame is left so the
        // diagnostic prints on a usable screen.
        {
            let mut stdout = io::stdout().lock();
            let _ = ansi::clear_screen(&mut stdout);
            let _ = ansi::cursor_home(&mut stdout);
            let _ = stdout.flush();
        }
        eprintln!("kalam: {e:#}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Scripted byte source: `Some(b)` delivers a byte, `None` a timeout.
    struct Script {
        items: VecDeque<Option<u8>>,
    }

    impl Script {
        fn bytes(data: &[u8]) -> Self {
            Self {
                items: data.iter().map(|&b| Some(b)).collect(),
            }
        }
    }

    impl ByteSource for Script {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            Ok(self.items.pop_front().unwrap_or(None))
        }
    }

    /// Helper: an editor over a fixed viewport.
    const fn editor(rows: u16, cols: u16) -> Editor {
        Editor::new(Size { rows, cols })
    }

    /// Helper: compose one frame and return it as a string.
    fn frame(editor: &Editor) -> String {
        let mut out = RenderBuffer::new();
        editor.draw_frame(&mut out).unwrap();
        String::from_utf8(out.as_bytes().to_vec()).unwrap()
    }

    /// Helper: feed a sequence of keys through dispatch.
    fn feed(editor: &mut Editor, keys: &[SpecialKey]) {
        for &key in keys {
            editor.dispatch(KeyEvent::Special(key));
        }
    }

    // ── Frame composition ───────────────────────────────────────────────

    #[test]
    fn frame_has_one_fill_marker_per_row() {
        let text = frame(&editor(24, 80));
        assert_eq!(text.matches('~').count(), 24);
    }

    #[test]
    fn frame_has_one_fewer_separator_than_rows() {
        let text = frame(&editor(24, 80));
        assert_eq!(text.matches("\r\n").count(), 23);
    }

    #[test]
    fn frame_clears_every_row() {
        let text = frame(&editor(24, 80));
        assert_eq!(text.matches("\x1b[K").count(), 24);
    }

    #[test]
    fn frame_hides_homes_then_shows() {
        let text = frame(&editor(24, 80));
        assert!(text.starts_with("\x1b[?25l\x1b[H"));
        assert!(text.ends_with("\x1b[?25h"));
    }

    #[test]
    fn frame_repositions_cursor_one_indexed() {
        let mut e = editor(24, 80);
        e.cursor = Cursor { row: 2, col: 5 };
        let text = frame(&e);
        assert!(text.contains("\x1b[3;6H"));
    }

    #[test]
    fn frame_shows_version_banner() {
        let text = frame(&editor(24, 80));
        assert!(text.contains("kalam editor -- version"));
    }

    #[test]
    fn banner_truncates_to_narrow_viewport() {
        let text = frame(&editor(6, 10));
        assert!(text.contains("kalam edit"));
        assert!(!text.contains("kalam edito"));
    }

    #[test]
    fn single_row_frame_has_no_separator() {
        let text = frame(&editor(1, 10));
        assert_eq!(text.matches("\r\n").count(), 0);
    }

    // ── Cursor movement ─────────────────────────────────────────────────

    #[test]
    fn arrows_move_one_cell() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::ArrowDown, SpecialKey::ArrowRight]);
        assert_eq!(e.cursor, Cursor { row: 1, col: 1 });
        feed(&mut e, &[SpecialKey::ArrowUp, SpecialKey::ArrowLeft]);
        assert_eq!(e.cursor, Cursor { row: 0, col: 0 });
    }

    #[test]
    fn left_is_idempotent_at_origin() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::ArrowLeft, SpecialKey::ArrowLeft]);
        assert_eq!(e.cursor.col, 0);
    }

    #[test]
    fn up_is_idempotent_at_origin() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::ArrowUp, SpecialKey::ArrowUp]);
        assert_eq!(e.cursor.row, 0);
    }

    #[test]
    fn right_clamps_at_last_column() {
        let mut e = editor(4, 3);
        feed(
            &mut e,
            &[
                SpecialKey::ArrowRight,
                SpecialKey::ArrowRight,
                SpecialKey::ArrowRight,
                SpecialKey::ArrowRight,
            ],
        );
        assert_eq!(e.cursor.col, 2);
    }

    #[test]
    fn down_clamps_at_last_row() {
        let mut e = editor(3, 4);
        feed(
            &mut e,
            &[
                SpecialKey::ArrowDown,
                SpecialKey::ArrowDown,
                SpecialKey::ArrowDown,
                SpecialKey::ArrowDown,
            ],
        );
        assert_eq!(e.cursor.row, 2);
    }

    #[test]
    fn home_jumps_to_first_column() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::ArrowRight, SpecialKey::ArrowRight]);
        feed(&mut e, &[SpecialKey::Home]);
        assert_eq!(e.cursor.col, 0);
    }

    #[test]
    fn end_jumps_to_last_column() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::End]);
        assert_eq!(e.cursor.col, 79);
    }

    #[test]
    fn page_down_lands_on_last_row() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::PageDown]);
        assert_eq!(e.cursor.row, 23);
    }

    #[test]
    fn page_up_returns_to_first_row() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::PageDown, SpecialKey::ArrowUp]);
        feed(&mut e, &[SpecialKey::PageUp]);
        assert_eq!(e.cursor.row, 0);
    }

    #[test]
    fn delete_and_escape_are_noops() {
        let mut e = editor(24, 80);
        feed(&mut e, &[SpecialKey::Delete, SpecialKey::Escape]);
        assert_eq!(e.cursor, Cursor { row: 0, col: 0 });
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    #[test]
    fn quit_chord_terminates() {
        let mut e = editor(24, 80);
        assert_eq!(e.dispatch(KeyEvent::Ctrl(QUIT)), Action::Quit);
    }

    #[test]
    fn other_control_chords_are_noops() {
        let mut e = editor(24, 80);
        assert_eq!(
            e.dispatch(KeyEvent::Ctrl(input::ctrl(b'a'))),
            Action::Continue
        );
        assert_eq!(e.cursor, Cursor { row: 0, col: 0 });
    }

    #[test]
    fn printable_keys_are_noops_for_now() {
        let mut e = editor(24, 80);
        assert_eq!(e.dispatch(KeyEvent::Char(b'x')), Action::Continue);
        assert_eq!(e.cursor, Cursor { row: 0, col: 0 });
    }

    // ── The loop ────────────────────────────────────────────────────────

    #[test]
    fn run_quits_on_ctrl_q_and_clears_screen() {
        let mut e = editor(4, 10);
        let mut src = Script::bytes(&[QUIT]);
        let mut sink = Vec::new();

        e.run(&mut src, &mut sink).unwrap();

        let text = String::from_utf8(sink).unwrap();
        // Exactly one frame was painted, then the screen was cleared.
        assert_eq!(text.matches("\x1b[?25l").count(), 1);
        assert!(text.ends_with("\x1b[2J\x1b[H"));
    }

    #[test]
    fn run_renders_one_frame_per_key() {
        let mut e = editor(4, 10);
        let mut input_bytes = Vec::from(&b"\x1b[C"[..]);
        input_bytes.push(QUIT);
        let mut src = Script::bytes(&input_bytes);
        let mut sink = Vec::new();

        e.run(&mut src, &mut sink).unwrap();

        let text = String::from_utf8(sink).unwrap();
        // One frame before the arrow, one before the quit — and nothing
        // after the quit chord.
        assert_eq!(text.matches("\x1b[?25l").count(), 2);
        assert_eq!(e.cursor, Cursor { row: 0, col: 1 });
    }

    #[test]
    fn run_propagates_read_failures() {
        struct Broken;
        impl ByteSource for Broken {
            fn read_byte(&mut self) -> io::Result<Option<u8>> {
                Err(io::Error::other("stream gone"))
            }
        }

        let mut e = editor(4, 10);
        let mut sink = Vec::new();
        assert!(e.run(&mut Broken, &mut sink).is_err());
    }
}
