//! `vcplink`: print readings from a PTH sensor in VCP mode.
//!
//! ```bash
//! vcplink --list-ports
//! vcplink --port /dev/ttyACM0 --count 10
//! vcplink --format json --poll-interval 5000
//! ```

mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::io::{Read, Write};
use std::path::PathBuf;
use vcplink_core::{Capture, Error, SerialService, Session};
use vcplink_decode::{InfoReading, LineError};

use crate::settings::{OutputFormat, Settings, MIN_LINE_LEN};

#[derive(Parser, Debug)]
#[command(name = "vcplink", version, about = "Reads checksummed PTH sensor lines from a serial port")]
struct Cli {
    /// Serial device of the sensor
    #[arg(short, long, env = "VCPLINK_PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Sample period to request from the sensor, in milliseconds
    #[arg(short = 'i', long)]
    poll_interval: Option<u32>,

    /// Stop after this many readings
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Longest accepted line in bytes
    #[arg(long, value_parser = parse_line_len)]
    max_line_len: Option<usize>,

    /// Settings file (defaults to <config dir>/vcplink/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    save_config: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_line_len(value: &str) -> std::result::Result<usize, String> {
    let len: usize = value.parse().map_err(|e| format!("{e}"))?;
    if len < MIN_LINE_LEN {
        return Err(format!("must be at least {MIN_LINE_LEN}"));
    }
    Ok(len)
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.port = port.clone();
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(interval) = self.poll_interval {
            settings.poll_interval_ms = interval;
        }
        if let Some(count) = self.count {
            settings.count = Some(count);
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        if let Some(len) = self.max_line_len {
            settings.max_line_len = len;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if cli.list_ports {
        list_ports();
        return Ok(());
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);
    settings.validate()?;

    if cli.save_config {
        let path = cli
            .config
            .clone()
            .or_else(Settings::default_path)
            .context("could not determine config directory")?;
        settings.save(&path)?;
        info!("saved settings to {}", path.display());
        return Ok(());
    }

    let service = SerialService::open(settings.serial_config())
        .with_context(|| format!("could not open {}", settings.port))?;
    let mut session = Session::new(service, &settings.session_config());

    run(&mut session, &settings, &mut std::io::stdout().lock())?;

    session.into_inner().close();
    Ok(())
}

/// Reads until `settings.count` readings have been written to `out`.
///
/// Rejected lines are skipped. Link errors are logged and the loop carries
/// on after the retry delay.
fn run<P: Read + Write>(
    session: &mut Session<P>,
    settings: &Settings,
    out: &mut impl Write,
) -> Result<()> {
    let mut accepted = 0;
    while settings.count.map_or(true, |n| accepted < n) {
        match session.next_capture() {
            Ok(capture) => {
                print_capture(out, &capture, session.identity(), settings.format)?;
                accepted += 1;
            }
            Err(Error::Line(LineError::Integrity { text, .. })) => {
                writeln!(out, "Integrity error: {}", text.trim_end())?;
            }
            // Logged by the session.
            Err(e) if e.is_line_level() => {}
            Err(e) => {
                error!("{e}");
                std::thread::sleep(settings.retry_delay());
            }
        }
    }
    Ok(())
}

fn print_capture(
    out: &mut impl Write,
    capture: &Capture,
    identity: Option<&InfoReading>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "\n{}", capture.to_text(identity))?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(capture)?)?,
    }
    Ok(())
}

fn list_ports() {
    let ports = SerialService::list_ports();
    println!("Available serial ports:");
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        println!("  {port}");
    }
}
