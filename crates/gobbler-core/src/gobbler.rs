//! The drive loop.
//!
//! A [`Gobbler`] owns one character source and an ordered set of
//! listeners. [`Gobbler::gobble`] drains the source to the end, splitting it
//! into lines as it goes, and consumes the gobbler: the source is dropped
//! on every exit path, including read and listener failures.
//!
//! # Example
//!
//! ```
//! use gobbler_core::{Charset, Gobbler, LineCollector};
//!
//! let lines = LineCollector::new();
//! Gobbler::new(&b"first\r\nsecond"[..], Charset::Utf8)
//!     .listener(lines.clone())
//!     .gobble()
//!     .unwrap();
//!
//! assert_eq!(lines.lines(), vec!["first", "second"]);
//! ```

use std::io::{self, Read};

use crate::boundary::LineSplitter;
use crate::decode::{Charset, DecodedChars};
use crate::error::GobbleError;
use crate::listener::{BoxedListener, Listeners, StreamListener};

/// Counts of events delivered by a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GobbleSummary {
    pub chars: usize,
    pub lines: usize,
}

/// Drains a character source, notifying listeners of characters and lines.
pub struct Gobbler<'a, S> {
    source: S,
    listeners: Listeners<'a>,
}

impl<'a, R: Read> Gobbler<'a, DecodedChars<R>> {
    /// Gobble a byte stream, decoding it with `charset`.
    pub fn new(reader: R, charset: Charset) -> Self {
        Self::from_chars(DecodedChars::new(reader, charset))
    }
}

impl<'a, S> Gobbler<'a, S>
where
    S: Iterator<Item = io::Result<char>>,
{
    /// Gobble an already decoded character source.
    pub fn from_chars(source: S) -> Self {
        Self {
            source,
            listeners: Listeners::new(),
        }
    }

    /// Register a listener. Listeners are notified in registration order.
    pub fn listener(mut self, listener: impl StreamListener + Send + 'a) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Register several boxed listeners, keeping their order.
    pub fn listeners(mut self, listeners: impl IntoIterator<Item = BoxedListener<'a>>) -> Self {
        self.listeners.extend(listeners);
        self
    }

    /// Drain the source to the end.
    ///
    /// For each character the line it closes (if any) is delivered first,
    /// then the character itself. At the end of a non-empty stream the last
    /// line is flushed. A read error is returned as-is without flushing;
    /// events already delivered stand.
    pub fn gobble(self) -> Result<GobbleSummary, GobbleError> {
        let Self {
            source,
            mut listeners,
        } = self;
        let mut summary = GobbleSummary::default();

        log::debug!("Gobbling stream with {} listener(s)", listeners.len());
        match drive(source, &mut listeners, &mut summary) {
            Ok(()) => {
                log::debug!(
                    "Stream drained: {} chars, {} lines",
                    summary.chars,
                    summary.lines
                );
                Ok(summary)
            }
            Err(e) => {
                log::warn!("Gobbling aborted after {} chars: {}", summary.chars, e);
                Err(e)
            }
        }
    }
}

fn drive<S>(
    source: S,
    listeners: &mut Listeners<'_>,
    summary: &mut GobbleSummary,
) -> Result<(), GobbleError>
where
    S: Iterator<Item = io::Result<char>>,
{
    let mut splitter = LineSplitter::new();

    // The loop owns the source, so it is dropped before any error escapes
    for c in source {
        let c = c?;
        if let Some(line) = splitter.push(c) {
            listeners.line(&line)?;
            summary.lines += 1;
        }
        listeners.char(c)?;
        summary.chars += 1;
    }

    if let Some(line) = splitter.finish() {
        listeners.line(&line)?;
        summary.lines += 1;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
