use std::io;

use thiserror::Error;
use vcplink_decode::{LineError, RecordError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A record grew past the assembler's limit and was dropped.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    #[error(transparent)]
    Line(#[from] LineError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl Error {
    /// Whether the error concerns a single received line rather than the link.
    pub fn is_line_level(&self) -> bool {
        matches!(
            self,
            Self::LineTooLong { .. } | Self::Line(_) | Self::Record(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
