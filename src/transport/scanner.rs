//! Incremental matchers for the module's plain-text pairing tokens.
//!
//! Bytes are pushed one at a time so callers can stop reading exactly at
//! the end of a match. Nothing after a marker is ever consumed, which
//! keeps the following line or command in the module's buffer.

use log::warn;

/// Sentinel the module prints when a TCP client connects.
pub const OPEN_MARKER: &str = "*OPEN*";
/// Sentinel the module prints when the client disconnects.
pub const CLOSE_MARKER: &str = "*CLOS*";
/// Broadcast response from the server; the address line follows.
pub const SERVER_MARKER: &str = "*SERVER*\n";

/// Sliding-window detector for a fixed byte sequence.
///
/// On a mismatch the scanner falls back to the longest suffix of the
/// bytes seen so far that is still a prefix of the marker, so a match
/// that starts inside a failed partial match is not missed
/// (`**OPEN*` still matches `*OPEN*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerScanner<'m> {
    marker: &'m [u8],
    matched: usize,
}

impl<'m> MarkerScanner<'m> {
    pub const fn new(marker: &'m str) -> Self {
        Self {
            marker: marker.as_bytes(),
            matched: 0,
        }
    }

    /// Feed one byte. Returns `true` when it completes the marker; the
    /// scanner then starts over.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.marker.is_empty() {
            return true;
        }
        loop {
            if self.marker[self.matched] == byte {
                self.matched += 1;
                break;
            }
            if self.matched == 0 {
                break;
            }
            self.matched = border(&self.marker[..self.matched]);
        }
        if self.matched == self.marker.len() {
            self.matched = 0;
            return true;
        }
        false
    }

    /// Pull bytes from `next` until the marker completes or the source
    /// runs dry. At most `budget` bytes are consumed.
    pub fn scan(&mut self, budget: usize, mut next: impl FnMut() -> Option<u8>) -> bool {
        for _ in 0..budget {
            match next() {
                Some(b) if self.push(b) => return true,
                Some(_) => {}
                None => break,
            }
        }
        false
    }

    pub fn reset(&mut self) {
        self.matched = 0;
    }
}

/// Length of the longest proper prefix of `s` that is also a suffix.
fn border(s: &[u8]) -> usize {
    (1..s.len())
        .rev()
        .find(|&k| s[..k] == s[s.len() - k..])
        .unwrap_or(0)
}

/// Accumulates one `\n`-terminated line.
///
/// Bytes beyond `N` are dropped (the line is truncated, not split). A
/// trailing `\r` is stripped.
#[derive(Debug, Default)]
pub struct LineReader<const N: usize> {
    buf: heapless::Vec<u8, N>,
    truncated: bool,
}

impl<const N: usize> LineReader<N> {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            truncated: false,
        }
    }

    /// Feed one byte; returns the finished line on `\n`.
    pub fn push(&mut self, byte: u8) -> Option<heapless::String<N>> {
        if byte == b'\n' {
            return Some(self.finish());
        }
        if self.buf.push(byte).is_err() {
            self.truncated = true;
        }
        None
    }

    /// Pull bytes from `next` until a line completes or the source runs
    /// dry. At most `budget` bytes are consumed.
    pub fn read(
        &mut self,
        budget: usize,
        mut next: impl FnMut() -> Option<u8>,
    ) -> Option<heapless::String<N>> {
        for _ in 0..budget {
            let b = next()?;
            if let Some(line) = self.push(b) {
                return Some(line);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.truncated = false;
    }

    fn finish(&mut self) -> heapless::String<N> {
        if self.truncated {
            warn!("line longer than {} bytes, tail dropped", N);
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        let mut line = heapless::String::new();
        for ch in String::from_utf8_lossy(&self.buf).chars() {
            if line.push(ch).is_err() {
                break;
            }
        }
        self.clear();
        line
    }
}
