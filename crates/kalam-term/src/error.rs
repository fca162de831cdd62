// SPDX-License-Identifier: MIT
//
// Error type for the terminal layer.
//
// Everything here is fatal: these failures happen while taking control of
// the terminal, before any document state exists, so the only sane
// response is to restore the terminal and exit. Unrecognized *input* is
// deliberately not represented — an unknown escape sequence decodes to a
// harmless Escape event instead of surfacing as an error.

use std::io;

/// Failures while acquiring, querying, or reading the terminal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A termios call or a raw read on the terminal failed.
    #[error("terminal configuration failed: {0}")]
    Terminal(#[from] io::Error),

    /// Standard input is not connected to a terminal.
    #[error("standard input is not a terminal")]
    NotATty,

    /// Both the ioctl query and the cursor-report fallback failed.
    #[error("could not determine window size")]
    WindowSize,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let err: Error = io::Error::other("boom").into();
        assert!(matches!(err, Error::Terminal(_)));
    }

    #[test]
    fn display_names_the_failure() {
        let err: Error = io::Error::other("boom").into();
        let msg = err.to_string();
        assert!(msg.contains("terminal configuration failed"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn window_size_display() {
        assert_eq!(
            Error::WindowSize.to_string(),
            "could not determine window size"
        );
    }

    #[test]
    fn not_a_tty_display() {
        assert_eq!(
            Error::NotATty.to_string(),
            "standard input is not a terminal"
        );
    }
}
