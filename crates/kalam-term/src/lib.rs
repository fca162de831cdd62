// SPDX-License-Identifier: MIT
//
// kalam-term — terminal control layer for kalam.
//
// The parts of a screen editor that talk to the terminal itself: a
// raw-mode guard that owns the line discipline for the process lifetime,
// a geometry resolver with a cursor-report fallback, a key decoder that
// turns raw escape-sequence bytes into a closed set of events, and a
// render buffer that delivers each frame to stdout in a single write.
//
// This crate intentionally avoids external TUI frameworks (ratatui,
// crossterm) in favor of direct terminal control via ANSI escape
// sequences and raw termios. Every byte sent to the terminal is
// accounted for. Every escape code is earned.

pub mod ansi;
pub mod error;
pub mod input;
pub mod output;
pub mod terminal;

pub use error::{Error, Result};
