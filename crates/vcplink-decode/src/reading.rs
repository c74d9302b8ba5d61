//! Record classification and field extraction.
//!
//! Info records (`I,<model>,<serial>,<message>`) are parsed best-effort.
//! Data records follow a fixed positional layout:
//!
//! ```text
//! D,PTH450,E24753,,101264,Pa,23.53,C,38.47,%
//! |   |      |   | |      |  |     | |     |
//! 0   1      2   3 4      5  6     7 8     9
//! ```
//!
//! and are rejected as a whole if any field is out of shape.

use serde::Serialize;
use thiserror::Error;

use crate::line::ValidatedLine;

const INFO_TAG: char = 'I';
const FIELD_SEPARATOR: char = ',';
const DATA_FIELD_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    Info(InfoReading),
    Data(DataReading),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfoReading {
    pub model: String,
    pub serial: String,
    pub message: String,
}

/// One PTH sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataReading {
    /// Pascals
    pub pressure: i32,
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity, percent
    pub humidity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("data record has {found} fields, expected 10")]
    FieldCount { found: usize },
    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Classifies a validated line by its first character and extracts its fields.
pub fn parse(line: &ValidatedLine) -> Result<Reading, RecordError> {
    let text = line.as_str();
    if text.starts_with(INFO_TAG) {
        Ok(Reading::Info(parse_info(text)))
    } else {
        parse_data(text).map(Reading::Data)
    }
}

fn parse_info(text: &str) -> InfoReading {
    let mut fields = text.split(FIELD_SEPARATOR).skip(1).map(str::to_string);
    InfoReading {
        model: fields.next().unwrap_or_default(),
        serial: fields.next().unwrap_or_default(),
        message: fields.next().unwrap_or_default(),
    }
}

fn parse_data(text: &str) -> Result<DataReading, RecordError> {
    let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
    if fields.len() != DATA_FIELD_COUNT {
        return Err(RecordError::FieldCount {
            found: fields.len(),
        });
    }

    expect_shape("tag", fields[0], |f| f.chars().count() == 1)?;
    expect_shape("model", fields[1], |f| !f.is_empty())?;
    expect_shape("serial", fields[2], |f| !f.is_empty())?;
    expect_shape("reserved", fields[3], str::is_empty)?;
    let pressure = parse_number("pressure", fields[4])?;
    expect_literal("pressure unit", fields[5], "Pa")?;
    let temperature = parse_number("temperature", fields[6])?;
    expect_literal("temperature unit", fields[7], "C")?;
    let humidity = parse_number("humidity", fields[8])?;
    expect_literal("humidity unit", fields[9], "%")?;

    Ok(DataReading {
        pressure,
        temperature,
        humidity,
    })
}

fn invalid(field: &'static str, value: &str) -> RecordError {
    RecordError::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn expect_shape(
    field: &'static str,
    value: &str,
    ok: impl Fn(&str) -> bool,
) -> Result<(), RecordError> {
    if ok(value) {
        Ok(())
    } else {
        Err(invalid(field, value))
    }
}

fn expect_literal(field: &'static str, value: &str, literal: &str) -> Result<(), RecordError> {
    expect_shape(field, value, |v| v == literal)
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, RecordError> {
    value.parse().map_err(|_| invalid(field, value))
}
