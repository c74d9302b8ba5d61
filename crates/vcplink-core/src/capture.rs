//! Accepted readings stamped with local time, and their text rendering.

use chrono::{DateTime, Local, SubsecRound};
use serde::Serialize;
use vcplink_decode::{InfoReading, Reading};

/// `YYYY-MM-DD HH:MM:SS`
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A reading together with the local time it was accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capture {
    pub timestamp: DateTime<Local>,
    pub reading: Reading,
}

impl Capture {
    pub fn new(reading: Reading, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            reading,
        }
    }

    pub fn now(reading: Reading) -> Self {
        Self::new(reading, Local::now())
    }

    pub fn time_string(&self) -> String {
        self.timestamp.format(TIME_FORMAT).to_string()
    }

    /// Human-readable rendering. Data readings are labelled with the sensor
    /// identity from the last info record, when one has been seen.
    pub fn to_text(&self, identity: Option<&InfoReading>) -> String {
        match &self.reading {
            Reading::Info(info) => info.message.clone(),
            Reading::Data(data) => {
                let device = match identity {
                    Some(info) => format!("{} {}", info.model, info.serial),
                    None => "unidentified sensor".to_string(),
                };
                format!(
                    "{device} @ {}\nP = {} Pa\nT = {:.2} C\nH = {:.2} %",
                    self.time_string(),
                    data.pressure,
                    data.temperature,
                    data.humidity
                )
            }
        }
    }
}
