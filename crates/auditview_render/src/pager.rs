//! Terminal pagers.
//!
//! A [`Pager`] is the write destination of a render run. [`PaginatedPager`]
//! pipes output into an interactive pager process (`$PAGER`, `less` or
//! `more`); [`FallbackPager`] is used when none of those can be found and
//! stops after a fixed number of lines.

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::debug;

/// Pagers tried, in order, when the environment does not name one
pub const DEFAULT_PAGERS: [&str; 2] = ["less", "more"];

/// Lines the fallback pager writes before truncating output
pub const FALLBACK_LINE_COUNT: usize = 100;

/// Write destination backed by a pager
pub trait Pager {
    /// Write raw output, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::Truncated`] when the pager accepts no more output
    /// and [`PagerError::Io`] when writing fails.
    fn write(&mut self, data: &[u8]) -> Result<usize, PagerError>;

    /// Whether the reading side has gone away. Never blocks.
    fn is_closed(&mut self) -> bool;

    /// Signal end of output and wait for the pager to finish.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError`] if the pager could not be shut down cleanly.
    fn close(&mut self) -> Result<(), PagerError>;
}

impl<P: Pager + ?Sized> Pager for Box<P> {
    fn write(&mut self, data: &[u8]) -> Result<usize, PagerError> {
        (**self).write(data)
    }

    fn is_closed(&mut self) -> bool {
        (**self).is_closed()
    }

    fn close(&mut self) -> Result<(), PagerError> {
        (**self).close()
    }
}

/// Pager errors
#[derive(Debug, thiserror::Error)]
pub enum PagerError {
    /// No pager program could be resolved
    #[error(
        "no terminal pager available. Please configure a terminal pager by setting the $PAGER environment variable or install \"less\" or \"more\""
    )]
    NotFound,

    /// Output budget of the fallback pager is used up
    #[error("output truncated after {written} bytes: no terminal pager available")]
    Truncated {
        /// Bytes written by the call that hit the budget
        written: usize,
    },

    /// Spawning or talking to the pager failed
    #[error("pager i/o error: {0}")]
    Io(#[from] io::Error),

    /// The thread waiting on the pager process panicked
    #[error("pager watcher thread panicked")]
    WatcherPanicked,
}

/// A resolved pager program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerCommand {
    /// Absolute path of the program
    pub program: PathBuf,
    /// Arguments passed to the program
    pub args: Vec<String>,
}

impl PagerCommand {
    /// Resolve a pager from the environment variable `env_var`, falling back
    /// to [`DEFAULT_PAGERS`].
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::NotFound`] if no candidate is on the `PATH`.
    pub fn from_env(env_var: &str) -> Result<Self, PagerError> {
        Self::resolve(std::env::var(env_var).ok().as_deref())
    }

    /// Resolve a pager, trying `configured` before [`DEFAULT_PAGERS`].
    ///
    /// The first word of `configured` is the program and the remaining words
    /// are its arguments, e.g. `less -R`.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::NotFound`] if no candidate is on the `PATH`.
    pub fn resolve(configured: Option<&str>) -> Result<Self, PagerError> {
        if let Some(configured) = configured {
            let mut words = configured.split_whitespace();
            if let Some(program) = words.next() {
                match which::which(program) {
                    Ok(path) => {
                        return Ok(Self {
                            program: path,
                            args: words.map(str::to_string).collect(),
                        });
                    }
                    Err(err) => debug!(pager = program, error = %err, "configured pager not found"),
                }
            }
        }

        DEFAULT_PAGERS
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|program| Self {
                program,
                args: Vec::new(),
            })
            .ok_or(PagerError::NotFound)
    }
}

/// Writer piped into an interactive pager process.
///
/// A watcher thread waits for the process to exit and fires a one-shot
/// completion signal. [`Pager::is_closed`] polls that signal;
/// [`Pager::close`] closes the pipe and waits for it.
pub struct PaginatedPager {
    stdin: Option<ChildStdin>,
    done: Option<oneshot::Receiver<Option<ExitStatus>>>,
    watcher: Option<JoinHandle<()>>,
    closed: bool,
}

impl PaginatedPager {
    /// Resolve and start the pager named by `env_var`, writing to our stdout.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::NotFound`] if no pager can be resolved and
    /// [`PagerError::Io`] if it cannot be started.
    pub fn from_env(env_var: &str) -> Result<Self, PagerError> {
        let command = PagerCommand::from_env(env_var)?;
        Self::spawn(&command, Stdio::inherit())
    }

    /// Start `command` with its stdin piped and its stdout sent to `stdout`.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::Io`] if the process or its watcher thread cannot
    /// be started.
    pub fn spawn(command: &PagerCommand, stdout: Stdio) -> Result<Self, PagerError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take();
        debug!(pager = %command.program.display(), pid = child.id(), "started pager");

        let (tx, rx) = oneshot::channel();
        let watcher = thread::Builder::new()
            .name("pager-watcher".to_string())
            .spawn(move || {
                let status = child.wait().ok();
                // the receiver is gone once the pager has been closed
                let _ = tx.send(status);
            })?;

        Ok(Self {
            stdin,
            done: Some(rx),
            watcher: Some(watcher),
            closed: false,
        })
    }

    fn mark_closed(&mut self, status: Option<ExitStatus>) {
        if let Some(status) = status {
            debug!(%status, "pager exited");
        }
        self.closed = true;
        self.done = None;
    }
}

impl Pager for PaginatedPager {
    fn write(&mut self, data: &[u8]) -> Result<usize, PagerError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pager input is closed"))?;
        stdin.write_all(data)?;
        Ok(data.len())
    }

    fn is_closed(&mut self) -> bool {
        if self.closed {
            return true;
        }
        let polled = match self.done.as_mut() {
            Some(rx) => rx.try_recv(),
            None => Err(TryRecvError::Closed),
        };
        match polled {
            Ok(status) => self.mark_closed(status),
            Err(TryRecvError::Closed) => self.mark_closed(None),
            Err(TryRecvError::Empty) => {}
        }
        self.closed
    }

    fn close(&mut self) -> Result<(), PagerError> {
        // dropping the pipe sends EOF, which lets the pager exit
        drop(self.stdin.take());

        if !self.closed {
            if let Some(rx) = self.done.take() {
                let status = rx.blocking_recv().ok().flatten();
                self.mark_closed(status);
            }
            self.closed = true;
        }

        match self.watcher.take() {
            Some(watcher) => watcher.join().map_err(|_| PagerError::WatcherPanicked),
            None => Ok(()),
        }
    }
}

/// Pager used when no interactive pager is available.
///
/// Writes straight through to `writer` until `lines_left` newlines have been
/// written, then refuses further output with [`PagerError::Truncated`].
pub struct FallbackPager<W> {
    writer: W,
    lines_left: usize,
}

impl<W: Write> FallbackPager<W> {
    /// Create a fallback pager with the default line budget
    pub fn new(writer: W) -> Self {
        Self::with_line_count(writer, FALLBACK_LINE_COUNT)
    }

    /// Create a fallback pager that writes at most `lines` lines
    pub fn with_line_count(writer: W, lines: usize) -> Self {
        Self {
            writer,
            lines_left: lines,
        }
    }

    /// Lines that can still be written
    pub fn lines_left(&self) -> usize {
        self.lines_left
    }

    /// Consume the pager, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Pager for FallbackPager<W> {
    fn write(&mut self, data: &[u8]) -> Result<usize, PagerError> {
        if self.lines_left == 0 {
            return Err(PagerError::Truncated { written: 0 });
        }

        let payload: Cow<'_, [u8]> = if count_lines(data) > self.lines_left {
            let mut kept = data
                .split(|byte| *byte == b'\n')
                .take(self.lines_left)
                .collect::<Vec<_>>()
                .join(&b'\n');
            kept.push(b'\n');
            Cow::Owned(kept)
        } else {
            Cow::Borrowed(data)
        };

        self.lines_left -= count_lines(&payload);
        self.writer.write_all(&payload)?;

        if self.lines_left == 0 {
            self.writer.flush()?;
            debug!(bytes = payload.len(), "fallback pager line budget used up");
            return Err(PagerError::Truncated {
                written: payload.len(),
            });
        }
        Ok(payload.len())
    }

    fn is_closed(&mut self) -> bool {
        self.lines_left == 0
    }

    fn close(&mut self) -> Result<(), PagerError> {
        self.writer.flush()?;
        Ok(())
    }
}

fn count_lines(data: &[u8]) -> usize {
    data.iter().filter(|byte| **byte == b'\n').count()
}
