//! Host side of the relay's serial text link
//!
//! This module finds the relay device among the USB serial ports, talks to it
//! with the same line protocol the bridge speaks, and checks the packets an
//! echo device sends back.

mod validate;

pub use self::validate::{
    compare_fields, random_structured, validate, Mismatch, ValidateMode, ValidateOptions,
};

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::{SerialPort, SerialPortInfo, SerialPortType, UsbPortInfo};
use tracing::{debug, info};

use crate::core::{Error, LinkConfig, Result};
use crate::protocol::{CgpArgs, LinkLine};

/// Pause after a read that returned no data
pub const EMPTY_READ_PAUSE: Duration = Duration::from_millis(50);

/// Text matched against port descriptions when auto-selecting a device
const DEVICE_HINT: &str = "micro:bit";

/// Serial ports backed by a USB device
pub fn usb_serial_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .filter(|port| matches!(port.port_type, SerialPortType::UsbPort(_)))
        .collect())
}

fn usb_info(port: &SerialPortInfo) -> Option<&UsbPortInfo> {
    match &port.port_type {
        SerialPortType::UsbPort(info) => Some(info),
        _ => None,
    }
}

fn short_name(port: &SerialPortInfo) -> &str {
    port.port_name.rsplit('/').next().unwrap_or(&port.port_name)
}

fn description(port: &SerialPortInfo) -> String {
    let Some(info) = usb_info(port) else {
        return String::new();
    };
    [info.product.as_deref(), info.manufacturer.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats ports as a Path / Name / Description table
pub fn render_port_table(ports: &[SerialPortInfo]) -> String {
    if ports.is_empty() {
        return "No USB serial ports found.\n".to_string();
    }
    let header = format!("{:<24} {:<12} Description", "Path", "Name");
    let mut table = format!("{}\n{}\n", header, "-".repeat(header.len()));
    for port in ports {
        let description = description(port);
        table.push_str(&format!(
            "{:<24} {:<12} {}\n",
            port.port_name,
            short_name(port),
            if description.is_empty() { "-" } else { &description }
        ));
    }
    table
}

/// First port whose description mentions the relay hardware
pub fn select_device(ports: &[SerialPortInfo]) -> Option<String> {
    ports
        .iter()
        .find(|port| {
            let text = format!("{} {}", description(port), short_name(port));
            text.to_lowercase().contains(DEVICE_HINT)
        })
        .map(|port| port.port_name.clone())
}

/// Uses the given path or auto-selects a relay among the USB serial ports
pub fn resolve_device(path: Option<&str>) -> Result<String> {
    if let Some(path) = path {
        return Ok(path.to_string());
    }
    let ports = usb_serial_ports()?;
    if ports.is_empty() {
        return Err(Error::link("no USB serial ports detected, select a device explicitly"));
    }
    debug!("available USB serial ports:\n{}", render_port_table(&ports));
    let device = select_device(&ports)
        .ok_or_else(|| Error::link("no micro:bit detected, select a device explicitly"))?;
    info!(%device, "selected relay device");
    Ok(device)
}

/// Line-protocol client for a relay attached over a serial port
pub struct RelayClient<T: Read + Write = Box<dyn SerialPort>> {
    port: T,
    pending: Vec<u8>,
}

impl RelayClient<Box<dyn SerialPort>> {
    /// Opens the configured (or auto-selected) serial device
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let device = resolve_device(config.device.as_deref())?;
        let port = serialport::new(&device, config.baud_rate)
            .timeout(config.timeout)
            .open()
            .map_err(|e| Error::link(format!("failed to open {}: {}", device, e)))?;
        info!(%device, baud = config.baud_rate, "serial link open");
        Ok(RelayClient::new(port))
    }
}

impl<T: Read + Write> RelayClient<T> {
    /// Wraps an already open port
    pub fn new(port: T) -> Self {
        RelayClient {
            port,
            pending: Vec::new(),
        }
    }

    /// Writes one line and returns its text
    pub fn write_line(&mut self, line: &LinkLine) -> Result<String> {
        let text = line.to_string();
        self.port.write_all(text.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        debug!(">> {}", text);
        Ok(text)
    }

    /// Sends `s: <hex>` for the given bytes
    pub fn send(&mut self, bytes: &[u8]) -> Result<String> {
        self.write_line(&LinkLine::Send(bytes.to_vec()))
    }

    /// Sends `s:` with a hex string supplied by the caller
    pub fn send_hex(&mut self, text: &str) -> Result<String> {
        let cleaned: String = text.split_whitespace().collect();
        let bytes = hex::decode(cleaned)?;
        self.send(&bytes)
    }

    /// Sends a `cgp:` command
    pub fn tune(&mut self, args: CgpArgs) -> Result<String> {
        self.write_line(&LinkLine::Tune(args))
    }

    fn take_line(&mut self) -> Option<LinkLine> {
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let text = String::from_utf8_lossy(&raw);
            let text = text.trim();
            if !text.is_empty() {
                debug!("<< {}", text);
                return Some(LinkLine::parse(text));
            }
        }
        None
    }

    /// Reads what the port has; returns the byte count
    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(n) => {
                self.pending.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Waits for the next non-empty line
    ///
    /// Returns `None` once the deadline passes; without a timeout it waits
    /// indefinitely.
    pub fn next_line(&mut self, timeout: Option<Duration>) -> Result<Option<LinkLine>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if self.fill()? > 0 {
                continue;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(None);
            }
            thread::sleep(EMPTY_READ_PAUSE);
        }
    }

    /// Waits for the next `r:` report, skipping other lines
    pub fn wait_for_received(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_line(Some(remaining))? {
                Some(LinkLine::Received(bytes)) => return Ok(Some(bytes)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    /// Collects every line that arrives within the given time
    pub fn drain(&mut self, duration: Duration) -> Result<Vec<LinkLine>> {
        let deadline = Instant::now() + duration;
        let mut lines = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_line(Some(remaining))? {
                Some(line) => lines.push(line),
                None => return Ok(lines),
            }
        }
    }
}
