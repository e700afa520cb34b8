//! `gobble` - run a command and drain its output line by line.
//!
//! The child's stdout and stderr are each gobbled on their own thread and
//! echoed as they arrive, so the child never blocks on a full pipe. With no
//! command, `gobble` drains its own stdin instead.
//!
//! ```text
//! gobble --json -- cargo build
//! gobble --log-dir /tmp/logs --charset latin1 legacy-tool --verbose
//! some-producer | gobble --tag
//! ```
//!
//! Set `RUST_LOG=debug` to see every line and session summary in the log.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gobbler_core::listener::{ListenerResult, LogListener, WriterListener};
use gobbler_core::logging::{open_log_file, LogFileListener, LogHandle};
use gobbler_core::process::{self, ProcessExit};
use gobbler_core::{
    Charset, Gobbler, Listeners, ProcessConfig, StreamKind, StreamLine, StreamListener,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "gobble", version, about = "Drain a command's output line by line")]
struct Cli {
    /// Charset used to decode output (UTF-8, ISO-8859-1, US-ASCII, UTF-16LE, UTF-16BE)
    #[arg(long, default_value = "UTF-8")]
    charset: Charset,

    /// Print one JSON object per line instead of plain text
    #[arg(long)]
    json: bool,

    /// Prefix plain-text lines with the stream they came from
    #[arg(long)]
    tag: bool,

    /// Also append every line to a log file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Run the command through a shell prefix, e.g. "/bin/sh -c"
    #[arg(long, value_name = "PREFIX")]
    shell: Option<String>,

    /// Command to run; stdin is gobbled when omitted
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

/// JSON record printed for the child's exit in `--json` mode.
#[derive(Serialize)]
struct ExitRecord {
    exit: ProcessExit,
}

/// Prints each line as a JSON [`StreamLine`].
struct JsonListener<W> {
    stream: StreamKind,
    writer: W,
}

impl<W: Write> StreamListener for JsonListener<W> {
    fn on_line(&mut self, line: &str) -> ListenerResult {
        let record = StreamLine {
            stream: self.stream,
            line: line.to_string(),
        };
        // One write per record keeps records whole when both streams print
        let json = serde_json::to_string(&record)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl Cli {
    /// Listeners for one of the child's streams.
    fn listeners_for(
        &self,
        stream: StreamKind,
        log_file: Option<&LogHandle>,
    ) -> Listeners<'static> {
        let mut listeners = Listeners::new();
        listeners.push(LogListener::new(stream.to_string()).level(log::Level::Debug));

        if self.json {
            listeners.push(JsonListener {
                stream,
                writer: io::stdout(),
            });
        } else {
            let prefix = if self.tag {
                format!("[{stream}] ")
            } else {
                String::new()
            };
            // Mirror the child: its stderr goes to our stderr
            match stream {
                StreamKind::Stdout => {
                    listeners.push(WriterListener::new(io::stdout()).prefix(prefix))
                }
                StreamKind::Stderr => {
                    listeners.push(WriterListener::new(io::stderr()).prefix(prefix))
                }
            }
        }

        if let Some(handle) = log_file {
            let label = stream.to_string().to_uppercase();
            listeners.push(LogFileListener::new(handle.clone(), label));
        }
        listeners
    }
}

/// Map a child's exit to our own exit code, the way shells do.
fn exit_code(exit: &ProcessExit) -> u8 {
    match (exit.code, exit.signal) {
        (Some(code), _) => u8::try_from(code).unwrap_or(1),
        (None, Some(signal)) => u8::try_from(128 + signal).unwrap_or(1),
        (None, None) => 1,
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let log_file = match &cli.log_dir {
        Some(dir) => Some(open_log_file(dir, &format!("gobble-{}", std::process::id()))?),
        None => None,
    };

    let Some((program, args)) = cli.command.split_first() else {
        log::debug!("No command given, gobbling stdin as {}", cli.charset);
        let listeners = cli.listeners_for(StreamKind::Stdout, log_file.as_ref());
        Gobbler::new(io::stdin(), cli.charset)
            .listeners(listeners)
            .gobble()?;
        return Ok(ExitCode::SUCCESS);
    };

    let mut config = ProcessConfig::new(program.clone(), args.to_vec()).charset(cli.charset);
    if let Some(prefix) = &cli.shell {
        config = config.shell_prefix(prefix.clone());
    }

    let outcome = process::run(config, |stream| cli.listeners_for(stream, log_file.as_ref()))?;
    log::info!(
        "{} exited with {:?} ({} stdout lines, {} stderr lines)",
        program,
        outcome.exit,
        outcome.stdout.lines,
        outcome.stderr.lines
    );

    if cli.json {
        println!("{}", serde_json::to_string(&ExitRecord { exit: outcome.exit })?);
    }
    Ok(ExitCode::from(exit_code(&outcome.exit)))
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            log::error!("gobble failed: {e}");
            eprintln!("gobble: {e}");
            ExitCode::from(2)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
