//! Error types for gobbling and process management.

use std::io;

use thiserror::Error;

use crate::process::StreamKind;

/// Error raised by a listener callback.
///
/// Listeners may fail for any reason (a closed pipe, a full disk), so the
/// core carries their errors opaquely.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a gobble session stopped early.
#[derive(Error, Debug)]
pub enum GobbleError {
    /// The underlying source failed mid-stream.
    #[error("Failed to read stream: {0}")]
    Read(#[from] io::Error),

    /// A listener refused an event.
    #[error("Listener failed: {0}")]
    Listener(#[source] ListenerError),
}

/// A charset label that does not name a supported encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported charset: {0}")]
pub struct CharsetError(pub String);

/// Errors from spawning and draining a child process.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Failed to spawn: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed to capture {0}")]
    MissingPipe(StreamKind),

    #[error("Failed to start {stream} gobbler: {source}")]
    Thread {
        stream: StreamKind,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write stdin: {0}")]
    Stdin(#[source] io::Error),

    #[error("Failed to wait for process: {0}")]
    Wait(#[source] io::Error),

    #[error("Gobbling {stream} failed: {source}")]
    Gobble {
        stream: StreamKind,
        #[source]
        source: GobbleError,
    },

    #[error("{0} gobbler panicked")]
    Panicked(StreamKind),
}
