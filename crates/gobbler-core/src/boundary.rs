//! Line boundary detection.
//!
//! Splits a character stream into lines, accepting `\n`, `\r` and `\r\n` as
//! terminators. A terminator only closes its line once the *next* character
//! (or the end of the stream) arrives, which is how doubled terminators are
//! told apart:
//!
//! - `\r\n` is one terminator
//! - `\n\n`, `\r\r` and `\n\r` close an extra, empty line
//!
//! ```
//! use gobbler_core::LineSplitter;
//!
//! assert_eq!(LineSplitter::split("a\r\nb\n\nc"), vec!["a", "b", "", "c"]);
//! ```

/// What the previous character was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// Nothing has been read yet.
    #[default]
    Start,
    /// Any character that is not a line terminator.
    Ordinary,
    CarriageReturn,
    LineFeed,
}

impl Boundary {
    /// Whether a line is waiting to be closed by the next character.
    fn pending_close(self) -> bool {
        matches!(self, Boundary::CarriageReturn | Boundary::LineFeed)
    }
}

/// Incremental line splitter.
///
/// Feed characters with [`push`](Self::push); each call returns the line
/// that the character closed, if any. Call [`finish`](Self::finish) at the
/// end of the stream to flush the last line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    state: Boundary,
    line: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one character.
    ///
    /// The returned line is complete and excludes its terminator. The buffer
    /// is cleared before `c` is appended, so the returned line never
    /// contains `c`.
    pub fn push(&mut self, c: char) -> Option<String> {
        let (closes, next) = match c {
            '\r' => (self.state.pending_close(), Boundary::CarriageReturn),
            // CR LF is a single terminator
            '\n' => (self.state == Boundary::LineFeed, Boundary::LineFeed),
            _ => (self.state.pending_close(), Boundary::Ordinary),
        };

        let completed = closes.then(|| std::mem::take(&mut self.line));
        if next == Boundary::Ordinary {
            self.line.push(c);
        }
        self.state = next;
        completed
    }

    /// Flush the last line at the end of the stream.
    ///
    /// Returns `None` only when no character was ever pushed; otherwise the
    /// remaining buffer is returned even if it is empty.
    pub fn finish(self) -> Option<String> {
        match self.state {
            Boundary::Start => None,
            _ => Some(self.line),
        }
    }

    /// The partial line accumulated so far.
    pub fn pending(&self) -> &str {
        &self.line
    }

    #[cfg(test)]
    fn state(&self) -> Boundary {
        self.state
    }

    /// Split a complete string into lines.
    pub fn split(text: &str) -> Vec<String> {
        let mut splitter = Self::new();
        let mut lines: Vec<String> = text.chars().filter_map(|c| splitter.push(c)).collect();
        lines.extend(splitter.finish());
        lines
    }
}

// ============================================================================
// TESTS
// ============================================================================
