//! Core functionalities: serial I/O, line framing, sensor session.

pub mod assembler;
pub mod capture;
pub mod error;
pub mod serial_service;
pub mod session;

pub use assembler::LineAssembler;
pub use capture::Capture;
pub use error::{Error, Result};
pub use serial_service::{SerialConfig, SerialService, PortInfo, LineEnding};
pub use session::{Session, SessionConfig};
