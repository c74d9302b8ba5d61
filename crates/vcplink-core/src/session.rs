//! Drives one sensor: request continuous output, then turn each received
//! line into a [`Capture`].

use log::{debug, info, warn};
use std::io::{Read, Write};
use std::time::Duration;
use vcplink_decode::{parse, validate, InfoReading, LineError, Reading, ValidatedLine};

use crate::assembler::{LineAssembler, DEFAULT_MAX_LINE_LEN, DEFAULT_RETRY_DELAY};
use crate::capture::Capture;
use crate::error::{Error, Result};
use crate::serial_service::LineEnding;

/// Sample period requested from the sensor.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub poll_interval_ms: u32,
    pub line_ending: LineEnding,
    pub max_line_len: usize,
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            line_ending: LineEnding::CRLF,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// The `POLL <ms>` command asking the sensor to emit a data record every
/// `interval_ms` milliseconds.
pub fn poll_command(interval_ms: u32, line_ending: LineEnding) -> Vec<u8> {
    let mut cmd = format!("POLL {interval_ms}").into_bytes();
    cmd.extend_from_slice(line_ending.as_bytes());
    cmd
}

pub struct Session<P> {
    port: P,
    assembler: LineAssembler,
    poll_command: Vec<u8>,
    poll_interval_ms: u32,
    polled: bool,
    identity: Option<InfoReading>,
}

impl<P: Read + Write> Session<P> {
    pub fn new(port: P, cfg: &SessionConfig) -> Self {
        Self {
            port,
            assembler: LineAssembler::new(cfg.max_line_len, cfg.retry_delay),
            poll_command: poll_command(cfg.poll_interval_ms, cfg.line_ending),
            poll_interval_ms: cfg.poll_interval_ms,
            polled: false,
            identity: None,
        }
    }

    /// Reads the next line and checks its grammar and checksum.
    ///
    /// The poll command is sent before the first read, and only then, even
    /// when writing it fails.
    pub fn next_line(&mut self) -> Result<ValidatedLine> {
        if !self.polled {
            self.polled = true;
            self.send_poll()?;
        }

        let raw = self.assembler.pull(&mut self.port)?;
        validate(&raw).map_err(|e| {
            match &e {
                LineError::Format { text } => {
                    debug!("discarding malformed line {:?}", text)
                }
                LineError::Integrity { .. } => warn!("{e}"),
            }
            Error::from(e)
        })
    }

    /// Runs one full assemble, validate and parse cycle.
    pub fn next_capture(&mut self) -> Result<Capture> {
        let line = self.next_line()?;
        let reading = parse(&line).map_err(|e| {
            warn!("discarding record {:?}: {e}", line.as_str());
            Error::from(e)
        })?;

        if let Reading::Info(info) = &reading {
            debug!("sensor {} {}: {}", info.model, info.serial, info.message);
            self.identity = Some(info.clone());
        }
        Ok(Capture::now(reading))
    }

    /// The most recent info record, if any.
    pub fn identity(&self) -> Option<&InfoReading> {
        self.identity.as_ref()
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    fn send_poll(&mut self) -> Result<()> {
        self.port.write_all(&self.poll_command)?;
        self.port.flush()?;
        info!("requested a reading every {} ms", self.poll_interval_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use vcplink_decode::{encode, DataReading, RecordError};

    #[derive(Default)]
    struct FakePort {
        incoming: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
        fail_writes: bool,
    }

    impl FakePort {
        fn with_lines<S: AsRef<str>>(lines: &[S]) -> Self {
            Self {
                incoming: lines
                    .iter()
                    .map(|l| Ok(l.as_ref().as_bytes().to_vec()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.incoming.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session(port: FakePort) -> Session<FakePort> {
        let cfg = SessionConfig {
            retry_delay: Duration::ZERO,
            ..Default::default()
        };
        Session::new(port, &cfg)
    }

    #[test]
    fn test_poll_command_bytes() {
        assert_eq!(poll_command(1000, LineEnding::CRLF), b"POLL 1000\r\n");
        assert_eq!(poll_command(250, LineEnding::LF), b"POLL 250\n");
    }

    #[test]
    fn test_polls_exactly_once() {
        let data = encode("D,PTH450,E24753,,101264,Pa,23.53,C,38.47,%");
        let mut s = session(FakePort::with_lines(&[&data, &data, &data]));
        for _ in 0..3 {
            s.next_capture().unwrap();
        }
        assert_eq!(s.get_ref().written, b"POLL 1000\r\n");
    }

    #[test]
    fn test_write_failure_reported_once() {
        let data = encode("D,x,y,,1013,Pa,21.50,C,45.25,%");
        let mut port = FakePort::with_lines(&[&data]);
        port.fail_writes = true;
        let mut s = session(port);

        assert!(matches!(s.next_capture(), Err(Error::Io(_))));
        // Not retried: the next call goes straight to reading.
        assert!(s.next_capture().is_ok());
    }

    #[test]
    fn test_info_then_data() {
        let info = encode("I,PTH450,E24753,Poll rate set to 1000 ms");
        let data = encode("D,PTH450,E24753,,101264,Pa,23.53,C,38.47,%");
        let mut s = session(FakePort::with_lines(&[&info, &data]));

        assert!(s.identity().is_none());
        let first = s.next_capture().unwrap();
        assert!(matches!(first.reading, Reading::Info(_)));
        assert_eq!(s.identity().unwrap().serial, "E24753");

        let second = s.next_capture().unwrap();
        assert_eq!(
            second.reading,
            Reading::Data(DataReading {
                pressure: 101264,
                temperature: 23.53,
                humidity: 38.47,
            })
        );
        assert!(second.to_text(s.identity()).starts_with("PTH450 E24753 @ "));
    }

    #[test]
    fn test_line_errors_surface_per_line() {
        let good = encode("D,x,y,,1013,Pa,21.50,C,45.25,%");
        let bad_field = encode("D,x,y,,high,Pa,21.50,C,45.25,%");
        let mut s = session(FakePort::with_lines(&[
            "noise without trailer\r\n".to_string(),
            "D,x,y,,1013,Pa,21.50,C,45.25,%*ffff\r\n".to_string(),
            bad_field,
            good,
        ]));

        assert!(matches!(s.next_capture(), Err(Error::Line(LineError::Format { .. }))));
        match s.next_capture() {
            Err(Error::Line(LineError::Integrity { text, .. })) => {
                assert_eq!(text, "D,x,y,,1013,Pa,21.50,C,45.25,%*ffff\r\n")
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
        assert!(matches!(
            s.next_capture(),
            Err(Error::Record(RecordError::InvalidField { field: "pressure", .. }))
        ));
        assert!(s.next_capture().is_ok());
    }

    #[test]
    fn test_same_line_same_reading() {
        let data = encode("D,x,y,,1013,Pa,21.50,C,45.25,%");
        let mut s = session(FakePort::with_lines(&[&data, &data]));
        let a = s.next_capture().unwrap();
        let b = s.next_capture().unwrap();
        assert_eq!(a.reading, b.reading);
    }
}
