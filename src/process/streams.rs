//! Process Streams
//!
//! Bridges blocking pipe reads to the session through a channel: one reader
//! thread per OS stream forwards complete lines, and the session waits on the
//! channel with a deadline instead of polling the pipes.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Which OS stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Stdout,
    Stderr,
}

/// Message sent by a reader thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Line { origin: Origin, text: String },
    Closed(Origin),
    Failed { origin: Origin, reason: String },
}

/// Result of waiting for the next line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    Line { origin: Origin, text: String },
    /// Every stream has closed
    EndOfStream,
    /// The deadline passed with the streams still open
    TimedOut,
}

/// Sending half handed to reader threads
pub type LineSender = Sender<StreamItem>;

/// Receiving half of a process's output
#[derive(Debug)]
pub struct LineSource {
    rx: Receiver<StreamItem>,
    open_streams: usize,
}

impl LineSource {
    /// Create a source that reports end of stream after `streams` `Closed` messages
    pub fn channel(streams: usize) -> (LineSender, LineSource) {
        let (tx, rx) = channel();
        (
            tx,
            LineSource {
                rx,
                open_streams: streams,
            },
        )
    }

    /// Number of streams that have not reported closing yet
    pub fn open_streams(&self) -> usize {
        self.open_streams
    }

    /// Wait for the next line until `deadline`
    pub fn recv_until(&mut self, deadline: Instant) -> LineRead {
        loop {
            if self.open_streams == 0 {
                return LineRead::EndOfStream;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(StreamItem::Line { origin, text }) => return LineRead::Line { origin, text },
                Ok(StreamItem::Closed(origin)) => {
                    trace!("{:?} closed", origin);
                    self.open_streams -= 1;
                }
                Ok(StreamItem::Failed { origin, reason }) => {
                    warn!("Read from {:?} failed: {}", origin, reason);
                    self.open_streams -= 1;
                }
                Err(RecvTimeoutError::Timeout) => return LineRead::TimedOut,
                Err(RecvTimeoutError::Disconnected) => {
                    self.open_streams = 0;
                    return LineRead::EndOfStream;
                }
            }
        }
    }

    /// Wait for the next line with a relative timeout
    pub fn recv_timeout(&mut self, timeout: Duration) -> LineRead {
        self.recv_until(Instant::now() + timeout)
    }
}

/// Spawn a reader thread that forwards `reader` line by line
pub fn pump_lines<R>(reader: R, origin: Origin, tx: LineSender) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("p4wire-{:?}", origin).to_lowercase())
        .spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::with_capacity(256);
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => {
                        let _ = tx.send(StreamItem::Closed(origin));
                        break;
                    }
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\n', '\r'])
                            .to_string();
                        if tx.send(StreamItem::Line { origin, text }).is_err() {
                            debug!("{:?} reader: receiver dropped, stopping", origin);
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(StreamItem::Failed {
                            origin,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
            trace!("{:?} reader thread exiting", origin);
        })
}

/// Write side of the child's stdin
pub struct StdinSink {
    writer: Box<dyn Write + Send>,
}

impl StdinSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Write, flush, then close the pipe
    pub fn deliver<F>(mut self, write: F) -> io::Result<()>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        write(&mut self.writer)?;
        self.writer.flush()
        // dropping `self` closes the pipe
    }
}

impl std::fmt::Debug for StdinSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StdinSink")
    }
}
