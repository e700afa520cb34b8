//! # gobbler-core
//!
//! Drain a byte stream (typically a child's stdout or stderr) while
//! notifying listeners of every character and every complete line.
//!
//! ## Key Concepts
//!
//! - **Gobbler**: Owns one source and drains it to the end in one session
//! - **LineSplitter**: Decides where lines end across `\n`, `\r` and `\r\n`
//! - **StreamListener**: Observer with `on_char` and `on_line` callbacks
//! - **GobbledProcess**: A child whose output streams are gobbled on threads

pub mod boundary;
pub mod decode;
pub mod error;
pub mod gobbler;
pub mod listener;
pub mod logging;
pub mod process;
pub mod shell;

// Re-export commonly used types
pub use boundary::LineSplitter;
pub use decode::{Charset, DecodedChars};
pub use error::{CharsetError, GobbleError, ListenerError, ProcessError};
pub use gobbler::{GobbleSummary, Gobbler};
pub use listener::{on_char, on_line, LineCollector, Listeners, StreamListener, TextCollector};
pub use process::{GobbledProcess, ProcessConfig, ProcessExit, StreamKind, StreamLine};
