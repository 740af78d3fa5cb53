//! Request/response exchange over one half-duplex serial line.
//!
//! [`Transport`] owns a single serial handle and implements the exchange
//! contract: newline-terminated commands, bounded read timeouts, a fixed
//! retry budget, and handling of the instrument's in-band `ERROR` reply.
//! It knows nothing about instrument semantics beyond the error sentinel.
//!
//! One exchange is in flight at a time per handle; concurrent use of a
//! single `Transport` from multiple threads is out of contract.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use arrayvec::ArrayVec;
use log::{debug, warn};
use snafu::Snafu;

use crate::buffer::LineBuffer;
use crate::reply;
use crate::scpi;

/// Error type for this module.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The command doesn't fit in the 256-byte wire frame.
    #[snafu(display("command too long for the wire: {cmd:?}"))]
    CommandTooLong { cmd: String },
    /// Writing to the line failed twice in a row.
    #[snafu(display("serial write failed after retry: {source}"))]
    WriteFailed { source: std::io::Error },
    /// The line returned a hard I/O error while reading.
    #[snafu(display("serial read failed: {source}"))]
    ReadFailed { source: std::io::Error },
    /// No response arrived within the whole retry budget.
    #[snafu(display("no response from instrument after {attempts} attempts"))]
    ReadTimeout { attempts: u32 },
    /// The instrument signalled the in-band error sentinel.
    #[snafu(display("instrument reported an error: {detail}"))]
    InstrumentError { detail: String },
    /// A response arrived but could not be interpreted.
    #[snafu(display("malformed reply: {source}"))]
    BadReply { source: reply::Error },
}

/// Timing and retry policy for one serial handle.
///
/// The defaults match the instruments' tested behaviour; tests shrink the
/// durations to keep the suite fast.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Write/read cycles before giving up on a response.
    pub attempts: u32,
    /// How long to wait for a complete reply line in one attempt.
    pub read_timeout: Duration,
    /// Back-off before the single write retry.
    pub write_retry_delay: Duration,
    /// Minimum spacing between the last successful read and the next
    /// write, so the half-duplex line is not overrun.
    pub write_spacing: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            attempts: 3,
            read_timeout: Duration::from_secs(1),
            write_retry_delay: Duration::from_secs(4),
            write_spacing: Duration::from_millis(100),
        }
    }
}

// The C-heritage wire frame size; commands and replies both fit in it.
const FRAME_SIZE: usize = 256;

/// One serial handle plus its exchange state.
pub struct Transport<IO> {
    io: IO,
    config: TransportConfig,
    rx: LineBuffer,
    last_read: Option<Instant>,
}

impl<IO: Read + Write> Transport<IO> {
    pub fn new(io: IO) -> Transport<IO> {
        Transport::with_config(io, TransportConfig::default())
    }

    pub fn with_config(io: IO, config: TransportConfig) -> Transport<IO> {
        Transport {
            io,
            config,
            rx: LineBuffer::new(),
            last_read: None,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Consume the transport and return the underlying handle.
    pub fn into_inner(self) -> IO {
        self.io
    }

    /// Exchange one command for at most one response.
    ///
    /// With `expect_response` set, up to [`TransportConfig::attempts`]
    /// write/read cycles are performed and the terminator-stripped reply
    /// is returned. Without it, a timed-out read counts as success, but a
    /// reply that does arrive is still inspected for the error sentinel.
    ///
    /// # Errors
    /// [`Error::WriteFailed`], [`Error::ReadTimeout`] or
    /// [`Error::InstrumentError`] per the failure taxonomy.
    pub fn execute(
        &mut self,
        cmd: &str,
        expect_response: bool,
    ) -> Result<Option<String>, Error> {
        // A fresh exchange; partial data from an earlier timeout is stale.
        self.rx.clear();

        for _ in 0..self.config.attempts {
            self.write_line(cmd)?;

            match self.read_line()? {
                Some(line) if reply::is_error_sentinel(&line) => {
                    let detail = self.drain_system_error();
                    warn!("{cmd:?} rejected, instrument reports: {detail}");
                    return InstrumentSnafu { detail }.fail();
                }
                Some(line) => return Ok(Some(line)),
                None if !expect_response => return Ok(None),
                None => continue,
            }
        }

        ReadTimeoutSnafu {
            attempts: self.config.attempts,
        }
        .fail()
    }

    /// Issue a command with no expected response.
    pub fn send(&mut self, cmd: &str) -> Result<(), Error> {
        self.execute(cmd, false).map(|_| ())
    }

    /// Issue a query and return its reply.
    pub fn query(&mut self, cmd: &str) -> Result<String, Error> {
        self.execute(cmd, true)?.ok_or(Error::ReadTimeout {
            attempts: self.config.attempts,
        })
    }

    /// Issue a query whose reply is a decimal register value.
    pub fn query_register(&mut self, cmd: &str) -> Result<u16, Error> {
        reply::register(&self.query(cmd)?).map_err(|source| Error::BadReply { source })
    }

    /// Issue a query whose reply is a numeric reading.
    pub fn query_reading(&mut self, cmd: &str) -> Result<f64, Error> {
        reply::reading(&self.query(cmd)?).map_err(|source| Error::BadReply { source })
    }

    /// Retrieve the diagnostic behind an `ERROR` reply. Exactly one
    /// follow-up `:SYST:ERR?` exchange, with no sentinel handling of its
    /// own, so the drain can never recurse.
    fn drain_system_error(&mut self) -> String {
        let drained = self
            .write_line(scpi::SYSTEM_ERROR)
            .and_then(|_| self.read_line());
        match drained {
            Ok(Some(detail)) => detail,
            Ok(None) => "no detail available".to_owned(),
            Err(err) => format!("error queue unreadable: {err}"),
        }
    }

    /// Write `cmd` plus the line terminator, honouring the inter-write
    /// spacing and retrying once after a back-off.
    fn write_line(&mut self, cmd: &str) -> Result<(), Error> {
        let mut frame = ArrayVec::<u8, FRAME_SIZE>::new();
        if frame.try_extend_from_slice(cmd.as_bytes()).is_err() || frame.try_push(b'\n').is_err()
        {
            return CommandTooLongSnafu { cmd }.fail();
        }

        self.wait_for_spacing();

        debug!("SEND ({}): {cmd}", frame.len());
        if let Err(first) = self.try_write(&frame) {
            debug!("write failed ({first}), retrying after back-off");
            std::thread::sleep(self.config.write_retry_delay);
            self.try_write(&frame)
                .map_err(|source| Error::WriteFailed { source })?;
        }
        Ok(())
    }

    fn try_write(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.io.write_all(frame)?;
        self.io.flush()
    }

    /// Read one complete line within the configured timeout.
    /// `Ok(None)` means the timeout elapsed with no complete line.
    fn read_line(&mut self) -> Result<Option<String>, Error> {
        let deadline = Instant::now() + self.config.read_timeout;
        let mut chunk = [0_u8; 64];

        loop {
            if let Some(line) = self.rx.take_line() {
                self.last_read = Some(Instant::now());
                let line = String::from_utf8_lossy(&line).into_owned();
                debug!("RECV ({}): {line}", line.len());
                return Ok(Some(line));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.io.read(&mut chunk) {
                Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                Ok(n) => self.rx.push(&chunk[..n]),
                Err(err) => match err.kind() {
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {
                        continue;
                    }
                    _ => return Err(Error::ReadFailed { source: err }),
                },
            }
        }
    }

    fn wait_for_spacing(&self) {
        if let Some(last_read) = self.last_read {
            let elapsed = last_read.elapsed();
            if elapsed < self.config.write_spacing {
                std::thread::sleep(self.config.write_spacing - elapsed);
            }
        }
    }
}

impl<IO> core::fmt::Debug for Transport<IO> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("last_read", &self.last_read)
            .finish()
    }
}
