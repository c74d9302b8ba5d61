//! Decoding for the sensor's checksummed ASCII line protocol.
//!
//! A received line goes through [`line::validate`] (grammar, then
//! CRC-16/XMODEM) and then [`reading::parse`] (info or data record).

pub mod checksum;
pub mod line;
pub mod reading;

pub use checksum::crc16_xmodem;
pub use line::{encode, validate, LineError, ValidatedLine};
pub use reading::{parse, DataReading, InfoReading, Reading, RecordError};
