// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Key decoding — raw stdin bytes to logical key events.
//
// In raw mode the terminal delivers one byte per keypress for printable
// and control keys, and a multi-byte escape sequence for everything else
// (arrows, Home/End, PageUp/PageDown, Delete). The wrinkle is that the
// Escape key itself sends the same 0x1B byte that starts every sequence.
//
// The disambiguation relies on timing: a terminal emits a sequence as one
// burst, while a human pressing Escape sends the byte alone. Reads happen
// under raw mode's bounded-timeout policy (VMIN=0, VTIME>0), so "nothing
// arrived within the interval" is an observable outcome — modeled here as
// `Ok(None)` from [`ByteSource::read_byte`] — and a lone ESC resolves to
// the Escape key instead of hanging.
//
// Decoding after an ESC is a small finite-state machine over at most
// three lookahead bytes, stepped by a pure function so each timeout
// boundary (after one byte, after two) is testable on its own. Unknown
// sequences are swallowed into Escape: terminal input is noisy (paste
// bursts, unsupported keys) and must never crash the loop or leak
// sequence bytes into the event stream one at a time.

use std::io;

use crate::error::Result;

/// The escape byte that introduces every sequence — and the Escape key.
const ESC: u8 = 0x1b;

// ─── Events ─────────────────────────────────────────────────────────────────

/// A decoded key event. Produced fresh per keypress, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// A printable byte, delivered as typed.
    Char(u8),
    /// A control combination, as the raw byte the terminal sent
    /// (value below `0x20`, or DEL).
    Ctrl(u8),
    /// A named non-printable key.
    Special(SpecialKey),
}

/// Named keys produced by escape sequences, or by a lone Escape press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKey {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    Escape,
}

/// The byte produced by holding Ctrl with a letter key.
///
/// Terminals transmit Ctrl-modified letters as the letter with the top
/// three bits cleared: Ctrl-Q is `0x11`, Ctrl-A is `0x01`.
#[must_use]
pub const fn ctrl(byte: u8) -> u8 {
    byte & 0x1f
}

// ─── Byte source ────────────────────────────────────────────────────────────

/// One-byte-at-a-time input with a bounded wait.
///
/// `Ok(None)` means the interval elapsed with nothing to read — the
/// signal that separates a human pressing Escape from the burst of an
/// escape sequence. Implementations must only error on genuine failures,
/// never on the timeout itself.
pub trait ByteSource {
    /// Read one byte, waiting at most the configured interval.
    ///
    /// # Errors
    ///
    /// Propagates unrecoverable read failures from the underlying stream.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

/// [`ByteSource`] over the process's standard input.
///
/// Relies on raw mode's `VMIN = 0` / `VTIME > 0` read policy: a raw
/// `read` returns zero bytes after the interval when nothing was typed.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinSource;

#[cfg(unix)]
impl ByteSource for StdinSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        loop {
            // SAFETY: one-byte read into a valid local buffer.
            let n = unsafe {
                libc::read(
                    libc::STDIN_FILENO,
                    (&raw mut byte).cast::<libc::c_void>(),
                    1,
                )
            };
            match n {
                1 => return Ok(Some(byte)),
                // VTIME expired with no input.
                0 => return Ok(None),
                _ => {
                    let err = io::Error::last_os_error();
                    let transient = matches!(
                        err.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    );
                    if !transient {
                        return Err(err);
                    }
                }
            }
        }
    }
}

/// Non-unix fallback: blocking reads, no timeout (lone ESC cannot be
/// disambiguated, but the decoder still terminates on the next byte).
#[cfg(not(unix))]
impl ByteSource for StdinSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        use std::io::Read;

        let mut byte = [0u8; 1];
        match io::stdin().lock().read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }
}

// ─── Decoder state machine ──────────────────────────────────────────────────

/// Decoder state after an escape byte, advanced one lookahead byte at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Got `ESC`; the next byte decides the sequence kind.
    SawEscape,
    /// Got `ESC [`; expecting a digit or a final letter.
    SawBracket,
    /// Got `ESC [ <digit>`; expecting the `~` terminator.
    SawDigit(u8),
    /// Got `ESC O`; expecting `H` or `F`.
    SawO,
}

/// One machine step: either a finished event or a state to continue in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Emit(KeyEvent),
    Next(State),
}

/// Advance the escape-sequence machine by one lookahead byte.
///
/// `None` is a timeout. Whatever was consumed so far resolves to Escape —
/// most importantly in `SawEscape`, where a pause after a bare ESC means
/// the user pressed the Escape key itself.
const fn step(state: State, byte: Option<u8>) -> Step {
    let byte = match byte {
        Some(byte) => byte,
        None => return Step::Emit(KeyEvent::Special(SpecialKey::Escape)),
    };

    match state {
        State::SawEscape => match byte {
            b'[' => Step::Next(State::SawBracket),
            b'O' => Step::Next(State::SawO),
            _ => Step::Emit(KeyEvent::Special(SpecialKey::Escape)),
        },
        State::SawBracket => match byte {
            d @ b'0'..=b'9' => Step::Next(State::SawDigit(d)),
            b'A' => Step::Emit(KeyEvent::Special(SpecialKey::ArrowUp)),
            b'B' => Step::Emit(KeyEvent::Special(SpecialKey::ArrowDown)),
            b'C' => Step::Emit(KeyEvent::Special(SpecialKey::ArrowRight)),
            b'D' => Step::Emit(KeyEvent::Special(SpecialKey::ArrowLeft)),
            b'H' => Step::Emit(KeyEvent::Special(SpecialKey::Home)),
            b'F' => Step::Emit(KeyEvent::Special(SpecialKey::End)),
            _ => Step::Emit(KeyEvent::Special(SpecialKey::Escape)),
        },
        State::SawDigit(d) => match byte {
            b'~' => Step::Emit(KeyEvent::Special(match d {
                b'1' | b'7' => SpecialKey::Home,
                b'3' => SpecialKey::Delete,
                b'4' | b'8' => SpecialKey::End,
                b'5' => SpecialKey::PageUp,
                b'6' => SpecialKey::PageDown,
                _ => SpecialKey::Escape,
            })),
            _ => Step::Emit(KeyEvent::Special(SpecialKey::Escape)),
        },
        State::SawO => match byte {
            b'H' => Step::Emit(KeyEvent::Special(SpecialKey::Home)),
            b'F' => Step::Emit(KeyEvent::Special(SpecialKey::End)),
            _ => Step::Emit(KeyEvent::Special(SpecialKey::Escape)),
        },
    }
}

/// Classify a single non-escape byte.
///
/// Control bytes are everything below `0x20` plus DEL (`0x7F`); the rest
/// of the 8-bit range is delivered as a printable byte.
const fn classify(byte: u8) -> KeyEvent {
    if byte < 0x20 || byte == 0x7f {
        KeyEvent::Ctrl(byte)
    } else {
        KeyEvent::Char(byte)
    }
}

/// Decode one key event, blocking until a key arrives.
///
/// Timeouts while waiting for the *first* byte are swallowed — the caller
/// asked for a key, so we keep waiting. Timeouts *inside* an escape
/// sequence are meaningful and resolve it (see [`step`]).
///
/// # Errors
///
/// Propagates unrecoverable read failures; timeouts never error.
pub fn read_key(src: &mut impl ByteSource) -> Result<KeyEvent> {
    let first = loop {
        if let Some(byte) = src.read_byte()? {
            break byte;
        }
    };

    if first != ESC {
        return Ok(classify(first));
    }

    let mut state = State::SawEscape;
    loop {
        match step(state, src.read_byte()?) {
            Step::Emit(key) => return Ok(key),
            Step::Next(next) => state = next,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
