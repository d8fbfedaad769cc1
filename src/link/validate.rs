use std::fmt;
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use crate::core::{Error, Result};
use crate::protocol::{decode, Payload, PayloadType, MAX_PACKET_SIZE};
use crate::util::random_payload;
use super::RelayClient;

/// What is sent to the relay and how the echo is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateMode {
    /// One random structured payload of every variant per round, compared field by field
    Packets,
    /// Random bytes filling the largest packet, compared byte for byte
    Random,
    /// The given bytes twice over, compared byte for byte
    Words(Vec<u8>),
}

/// Pacing for a validation run
#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    /// Rounds to run
    pub count: u32,
    /// Pause after each validated packet
    pub interval: Duration,
    /// How long to wait for each echo
    pub timeout: Duration,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        ValidateOptions {
            count: 10,
            interval: Duration::from_millis(250),
            timeout: Duration::from_secs(2),
        }
    }
}

/// One field whose echoed value differs from the sent one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub field: &'static str,
    pub sent: i64,
    pub received: i64,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sent={} received={}", self.field, self.sent, self.received)
    }
}

/// Fields of `received` that differ from `sent`
pub fn compare_fields(sent: &Payload, received: &Payload) -> Vec<Mismatch> {
    sent.fields()
        .into_iter()
        .zip(received.fields())
        .filter(|((_, a), (_, b))| a != b)
        .map(|((field, sent), (_, received))| Mismatch {
            field,
            sent,
            received,
        })
        .collect()
}

/// A random payload of the given variant, header fields included
pub fn random_structured<R: Rng + ?Sized>(kind: PayloadType, rng: &mut R) -> Payload {
    let mut payload = random_payload(kind, rng);
    let frame = payload.frame_mut();
    frame.set_timestamp(rng.gen());
    frame.set_origin_id(rng.gen());
    payload
}

/// Sends packets through a relay with an echo device on the air and checks
/// every echo; returns the number of packets validated
///
/// The first missing or mismatching echo ends the run with a protocol error.
pub fn validate<T, R>(
    client: &mut RelayClient<T>,
    mode: &ValidateMode,
    options: &ValidateOptions,
    rng: &mut R,
) -> Result<usize>
where
    T: Read + Write,
    R: Rng + ?Sized,
{
    if let ValidateMode::Words(words) = mode {
        if words.len() * 2 > MAX_PACKET_SIZE {
            return Err(Error::PacketTooLarge {
                size: words.len() * 2,
                max: MAX_PACKET_SIZE,
            });
        }
    }

    let mut validated = 0;
    for round in 0..options.count {
        debug!(round = round + 1, count = options.count, "validation round");
        match mode {
            ValidateMode::Packets => {
                for kind in PayloadType::ALL {
                    let payload = random_structured(kind, rng);
                    check_structured(client, &payload, options.timeout)?;
                    validated += 1;
                    pause(options.interval);
                }
            }
            ValidateMode::Random => {
                let mut bytes = [0u8; MAX_PACKET_SIZE];
                rng.fill(&mut bytes[..]);
                check_bytes(client, &bytes, options.timeout)?;
                validated += 1;
                pause(options.interval);
            }
            ValidateMode::Words(words) => {
                check_bytes(client, &[words.as_slice(), words.as_slice()].concat(), options.timeout)?;
                validated += 1;
                pause(options.interval);
            }
        }
    }
    Ok(validated)
}

fn pause(interval: Duration) {
    if !interval.is_zero() {
        thread::sleep(interval);
    }
}

fn await_echo<T: Read + Write>(
    client: &mut RelayClient<T>,
    sent: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>> {
    client.send(sent)?;
    client
        .wait_for_received(timeout)?
        .ok_or_else(|| Error::protocol(format!("timed out waiting for echo of {}", hex::encode(sent))))
}

fn check_structured<T: Read + Write>(
    client: &mut RelayClient<T>,
    payload: &Payload,
    timeout: Duration,
) -> Result<()> {
    let name = payload.kind().name();
    let echo = await_echo(client, &payload.to_bytes(), timeout)?;
    let received = decode(&echo)
        .ok_or_else(|| Error::protocol(format!("expected {} echo, got undecodable bytes", name)))?;
    if received.kind() != payload.kind() {
        return Err(Error::protocol(format!(
            "expected {} echo, got {}",
            name,
            received.kind().name()
        )));
    }

    let mismatches = compare_fields(payload, &received);
    if !mismatches.is_empty() {
        let details: Vec<String> = mismatches.iter().map(Mismatch::to_string).collect();
        return Err(Error::protocol(format!(
            "field mismatch for {}: {}",
            name,
            details.join(", ")
        )));
    }
    info!(kind = name, "validated {}", hex::encode(payload.to_bytes()));
    Ok(())
}

fn check_bytes<T: Read + Write>(client: &mut RelayClient<T>, sent: &[u8], timeout: Duration) -> Result<()> {
    let echo = await_echo(client, sent, timeout)?;
    if !echo.starts_with(sent) {
        return Err(Error::protocol(format!(
            "echo mismatch: sent {} received {}",
            hex::encode(sent),
            hex::encode(&echo)
        )));
    }
    info!(len = sent.len(), "validated {}", hex::encode(sent));
    Ok(())
}
