//! Newline framing over a non-blocking byte source.

use log::{debug, warn};
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Wait between reads while the source has nothing to deliver.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Longest record accepted, terminator included.
pub const DEFAULT_MAX_LINE_LEN: usize = 256;

const CHUNK_SIZE: usize = 256;

/// Accumulates bytes from a source until a full `\n`-terminated record is
/// available.
///
/// Bytes received after a terminator are kept for the next [`pull`]. A record
/// longer than the limit is dropped together with everything up to its
/// terminator, so the following record starts clean.
///
/// [`pull`]: LineAssembler::pull
#[derive(Debug)]
pub struct LineAssembler {
    buf: Vec<u8>,
    max_line_len: usize,
    retry_delay: Duration,
    discarding: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN, DEFAULT_RETRY_DELAY)
    }
}

fn is_no_data(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl LineAssembler {
    pub fn new(max_line_len: usize, retry_delay: Duration) -> Self {
        Self {
            buf: Vec::with_capacity(max_line_len),
            max_line_len,
            retry_delay,
            discarding: false,
        }
    }

    /// Blocks until one record is complete and returns it, terminator
    /// included.
    ///
    /// "No data yet" from the source (`WouldBlock`, `TimedOut` or an empty
    /// read) is retried after the retry delay and never returned. Any other
    /// read error is returned immediately.
    pub fn pull<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<String> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if let Some(line) = self.take_line()? {
                return Ok(line);
            }

            match source.read(&mut chunk) {
                Ok(0) => thread::sleep(self.retry_delay),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if is_no_data(&e) => thread::sleep(self.retry_delay),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Bytes received but not yet returned.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn take_line(&mut self) -> Result<Option<String>> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                debug!("resynchronized, dropped {} trailing bytes", line.len());
                continue;
            }
            if line.len() > self.max_line_len {
                warn!("dropped {} byte line", line.len());
                return Err(Error::LineTooLong {
                    limit: self.max_line_len,
                });
            }
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }

        if self.buf.len() > self.max_line_len {
            self.buf.clear();
            if !self.discarding {
                self.discarding = true;
                warn!("no terminator within {} bytes, discarding until next line", self.max_line_len);
                return Err(Error::LineTooLong {
                    limit: self.max_line_len,
                });
            }
        }

        Ok(None)
    }
}
