// SPDX-License-Identifier: MIT
//
// Output buffering — one write per frame.
//
// A frame is composed of many small pieces: cursor visibility toggles,
// per-row fill markers, line clears, a final reposition. Writing each
// piece to stdout as it is produced lets the terminal repaint mid-frame,
// which shows up as tearing and a wandering cursor. The `RenderBuffer`
// accumulates every byte of the frame in memory so the whole thing can be
// delivered in a single write() syscall and then discarded.

use std::io::{self, Write};

/// A byte buffer that accumulates a frame for a single `write()` syscall.
///
/// Append with the `Write` impl (the ANSI emitters all take `impl Write`),
/// then drain with [`flush_stdout`](Self::flush_stdout) or
/// [`flush_to`](Self::flush_to). The buffer is cleared after each drain
/// but keeps its allocation for the next frame.
///
/// Default capacity: 4 KB — a full frame of fill markers and per-row
/// clears fits without reallocation.
pub struct RenderBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 4096;

impl RenderBuffer {
    /// Create an empty buffer with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes (for testing and debugging).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write the accumulated frame to stdout and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout fails.
    pub fn flush_stdout(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&self.buf)?;
            stdout.flush()?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Write the accumulated frame to an arbitrary writer and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for RenderBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Intentionally a no-op. Real flushing via flush_stdout() / flush_to().
        Ok(())
    }
}

impl Default for RenderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty() {
        let buf = RenderBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn write_trait_accumulates() {
        let mut buf = RenderBuffer::new();
        write!(buf, "row {}", 42).unwrap();
        assert_eq!(buf.as_bytes(), b"row 42");
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn write_is_append_only() {
        let mut buf = RenderBuffer::new();
        buf.write_all(b"\x1b[?25l").unwrap();
        buf.write_all(b"~\x1b[K").unwrap();
        assert_eq!(buf.as_bytes(), b"\x1b[?25l~\x1b[K");
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut buf = RenderBuffer::new();
        write!(buf, "some frame data").unwrap();
        let cap = buf.buf.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.buf.capacity(), cap);
    }

    #[test]
    fn flush_to_drains_in_one_piece() {
        let mut buf = RenderBuffer::new();
        write!(buf, "frame data").unwrap();

        let mut dest = Vec::new();
        buf.flush_to(&mut dest).unwrap();

        assert_eq!(dest, b"frame data");
        assert!(buf.is_empty()); // cleared after flush
    }

    #[test]
    fn flush_to_empty_is_noop() {
        let mut buf = RenderBuffer::new();
        let mut dest = Vec::new();
        buf.flush_to(&mut dest).unwrap();
        assert!(dest.is_empty());
    }

    #[test]
    fn flush_reuses_buffer_across_frames() {
        let mut buf = RenderBuffer::new();
        let mut dest = Vec::new();

        write!(buf, "frame one").unwrap();
        buf.flush_to(&mut dest).unwrap();
        write!(buf, "frame two").unwrap();
        buf.flush_to(&mut dest).unwrap();

        assert_eq!(dest, b"frame oneframe two");
    }

    #[test]
    fn inner_flush_is_noop() {
        let mut buf = RenderBuffer::new();
        write!(buf, "pending").unwrap();
        buf.flush().unwrap();
        // Contents survive a Write::flush; only the drain calls clear.
        assert_eq!(buf.as_bytes(), b"pending");
    }
}
