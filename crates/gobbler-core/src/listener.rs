//! Stream listeners and their fan-out.
//!
//! A [`StreamListener`] observes a gobble session through two callbacks:
//! [`on_char`](StreamListener::on_char) for every character read (line
//! terminators included) and [`on_line`](StreamListener::on_line) for every
//! completed line (terminators excluded). Both default to doing nothing, so
//! a listener only implements what it needs.
//!
//! Listeners run synchronously on the gobbling thread. Returning an error
//! stops the session.

use std::io::Write;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use crate::error::{GobbleError, ListenerError};
use crate::process::{StreamKind, StreamLine};

/// Result of a listener callback.
pub type ListenerResult = Result<(), ListenerError>;

/// Observer of character and line events.
pub trait StreamListener {
    fn on_char(&mut self, c: char) -> ListenerResult {
        let _ = c;
        Ok(())
    }

    fn on_line(&mut self, line: &str) -> ListenerResult {
        let _ = line;
        Ok(())
    }
}

impl<L: StreamListener + ?Sized> StreamListener for &mut L {
    fn on_char(&mut self, c: char) -> ListenerResult {
        (**self).on_char(c)
    }

    fn on_line(&mut self, line: &str) -> ListenerResult {
        (**self).on_line(line)
    }
}

impl<L: StreamListener + ?Sized> StreamListener for Box<L> {
    fn on_char(&mut self, c: char) -> ListenerResult {
        (**self).on_char(c)
    }

    fn on_line(&mut self, line: &str) -> ListenerResult {
        (**self).on_line(line)
    }
}

/// A listener that may be moved to a gobbler thread.
pub type BoxedListener<'a> = Box<dyn StreamListener + Send + 'a>;

/// Ordered set of listeners. Events reach listeners in registration order.
#[derive(Default)]
pub struct Listeners<'a> {
    listeners: Vec<BoxedListener<'a>>,
}

impl<'a> Listeners<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, listener: impl StreamListener + Send + 'a) {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver a character to every listener, stopping at the first failure.
    pub fn char(&mut self, c: char) -> Result<(), GobbleError> {
        for listener in &mut self.listeners {
            listener.on_char(c).map_err(GobbleError::Listener)?;
        }
        Ok(())
    }

    /// Deliver a line to every listener, stopping at the first failure.
    pub fn line(&mut self, line: &str) -> Result<(), GobbleError> {
        for listener in &mut self.listeners {
            listener.on_line(line).map_err(GobbleError::Listener)?;
        }
        Ok(())
    }
}

impl<'a> Extend<BoxedListener<'a>> for Listeners<'a> {
    fn extend<I: IntoIterator<Item = BoxedListener<'a>>>(&mut self, iter: I) {
        self.listeners.extend(iter);
    }
}

impl<'a> IntoIterator for Listeners<'a> {
    type Item = BoxedListener<'a>;
    type IntoIter = std::vec::IntoIter<BoxedListener<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.listeners.into_iter()
    }
}

impl<'a> From<Vec<BoxedListener<'a>>> for Listeners<'a> {
    fn from(listeners: Vec<BoxedListener<'a>>) -> Self {
        Self { listeners }
    }
}

// ============================================================================
// CLOSURE ADAPTERS
// ============================================================================

/// Listener built from a line callback. See [`on_line`].
pub struct LineFn<F>(F);

/// Listener built from a character callback. See [`on_char`].
pub struct CharFn<F>(F);

/// Wrap a closure as a listener that only observes lines.
pub fn on_line<F>(f: F) -> LineFn<F>
where
    F: FnMut(&str) -> ListenerResult,
{
    LineFn(f)
}

/// Wrap a closure as a listener that only observes characters.
pub fn on_char<F>(f: F) -> CharFn<F>
where
    F: FnMut(char) -> ListenerResult,
{
    CharFn(f)
}

impl<F> StreamListener for LineFn<F>
where
    F: FnMut(&str) -> ListenerResult,
{
    fn on_line(&mut self, line: &str) -> ListenerResult {
        (self.0)(line)
    }
}

impl<F> StreamListener for CharFn<F>
where
    F: FnMut(char) -> ListenerResult,
{
    fn on_char(&mut self, c: char) -> ListenerResult {
        (self.0)(c)
    }
}

// ============================================================================
// READY-MADE LISTENERS
// ============================================================================

/// Collects completed lines. Clones share the same storage, so one clone
/// can be handed to a gobbler and another kept for reading.
#[derive(Debug, Clone, Default)]
pub struct LineCollector {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines collected so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl StreamListener for LineCollector {
    fn on_line(&mut self, line: &str) -> ListenerResult {
        self.lines
            .lock()
            .map_err(|_| "line collector poisoned")?
            .push(line.to_string());
        Ok(())
    }
}

/// Collects every character, terminators included.
#[derive(Debug, Clone, Default)]
pub struct TextCollector {
    text: Arc<Mutex<String>>,
}

impl TextCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl StreamListener for TextCollector {
    fn on_char(&mut self, c: char) -> ListenerResult {
        self.text
            .lock()
            .map_err(|_| "text collector poisoned")?
            .push(c);
        Ok(())
    }
}

/// Forwards each line to the `log` facade.
#[derive(Debug, Clone)]
pub struct LogListener {
    label: String,
    level: log::Level,
}

impl LogListener {
    /// Log lines at `Info`, prefixed with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            level: log::Level::Info,
        }
    }

    pub fn level(mut self, level: log::Level) -> Self {
        self.level = level;
        self
    }
}

impl StreamListener for LogListener {
    fn on_line(&mut self, line: &str) -> ListenerResult {
        log::log!(self.level, "{}: {}", self.label, line);
        Ok(())
    }
}

/// Writes each line to a writer, one per output line.
pub struct WriterListener<W> {
    writer: W,
    prefix: String,
}

impl<W: Write> WriterListener<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            prefix: String::new(),
        }
    }

    /// Prepend `prefix` to every written line.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StreamListener for WriterListener<W> {
    fn on_line(&mut self, line: &str) -> ListenerResult {
        writeln!(self.writer, "{}{}", self.prefix, line)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Sends each line into a channel, tagged with the stream it came from.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    stream: StreamKind,
    sender: Sender<StreamLine>,
}

impl ChannelListener {
    pub fn new(stream: StreamKind, sender: Sender<StreamLine>) -> Self {
        Self { stream, sender }
    }
}

impl StreamListener for ChannelListener {
    fn on_line(&mut self, line: &str) -> ListenerResult {
        self.sender
            .send(StreamLine {
                stream: self.stream,
                line: line.to_string(),
            })
            .map_err(|_| format!("{} receiver disconnected", self.stream))?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
