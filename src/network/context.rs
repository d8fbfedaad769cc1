use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::{Error, OriginId, Result, Tuning, MAX_CHANNEL, MAX_POWER};
use crate::protocol::{Frame, HereIAm, Payload, MAX_RAW_PACKET, SIGNAL_SIZE};
use super::peers::{PeerRecord, PeerTable};
use super::radio::Radio;

/// Single owner of the radio, its tuning and the peer table
struct RadioContext {
    radio: Box<dyn Radio>,
    tuning: Tuning,
    peers: PeerTable,
    origin_id: OriginId,
    epoch: Instant,
}

impl RadioContext {
    /// Sender-local clock in milliseconds, wrapping at 32 bits
    fn clock(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn stamp(&self, frame: &mut Frame) {
        frame.set_timestamp(self.clock());
        frame.set_origin_id(self.origin_id.get());
    }

    fn transmit(&mut self, raw: &[u8]) -> Result<()> {
        if raw.len() > MAX_RAW_PACKET {
            return Err(Error::PacketTooLarge {
                size: raw.len(),
                max: MAX_RAW_PACKET,
            });
        }
        self.radio.send(raw)
    }
}

/// Appends the zeroed signal word the transport overwrites on receive
fn padded(packet: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(packet.len() + SIGNAL_SIZE);
    raw.extend_from_slice(packet);
    raw.resize(packet.len() + SIGNAL_SIZE, 0);
    raw
}

/// Shared handle to the radio context
///
/// Tuning and peer-table state are only reachable through these methods, so a
/// channel or group change always clears the peer table. The lock is never held
/// across an await point.
#[derive(Clone)]
pub struct RadioHandle {
    inner: Arc<Mutex<RadioContext>>,
}

impl RadioHandle {
    /// Takes ownership of a transport and applies the initial tuning
    pub fn new<R: Radio + 'static>(radio: R, origin_id: OriginId, tuning: Tuning) -> Result<Self> {
        tuning.validate()?;
        let mut radio: Box<dyn Radio> = Box::new(radio);
        radio.set_include_origin_id(true)?;
        radio.set_channel(tuning.channel)?;
        radio.set_group(tuning.group)?;
        radio.set_power(tuning.power)?;

        info!(origin = %origin_id, %tuning, "radio context ready");
        Ok(RadioHandle {
            inner: Arc::new(Mutex::new(RadioContext {
                radio,
                tuning,
                peers: PeerTable::new(),
                origin_id,
                epoch: Instant::now(),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RadioContext> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn origin_id(&self) -> OriginId {
        self.lock().origin_id
    }

    /// Current (channel, group, power)
    pub fn tuning(&self) -> Tuning {
        self.lock().tuning
    }

    /// Retunes the channel; returns whether it changed
    ///
    /// A change clears the peer table. Setting the current value is a no-op.
    pub fn set_channel(&self, channel: u8) -> Result<bool> {
        if channel > MAX_CHANNEL {
            return Err(Error::config(format!(
                "channel {} out of range 0..={}",
                channel, MAX_CHANNEL
            )));
        }
        let mut ctx = self.lock();
        if ctx.tuning.channel == channel {
            return Ok(false);
        }
        ctx.radio.set_channel(channel)?;
        ctx.tuning.channel = channel;
        ctx.peers.clear();
        info!(channel, "channel changed, peer table cleared");
        Ok(true)
    }

    /// Retunes the group; returns whether it changed
    ///
    /// A change clears the peer table. Setting the current value is a no-op.
    pub fn set_group(&self, group: u8) -> Result<bool> {
        let mut ctx = self.lock();
        if ctx.tuning.group == group {
            return Ok(false);
        }
        ctx.radio.set_group(group)?;
        ctx.tuning.group = group;
        ctx.peers.clear();
        info!(group, "group changed, peer table cleared");
        Ok(true)
    }

    /// Sets the transmit power; returns whether it changed
    pub fn set_power(&self, power: u8) -> Result<bool> {
        if power > MAX_POWER {
            return Err(Error::config(format!(
                "power {} out of range 0..={}",
                power, MAX_POWER
            )));
        }
        let mut ctx = self.lock();
        if ctx.tuning.power == power {
            return Ok(false);
        }
        ctx.radio.set_power(power)?;
        ctx.tuning.power = power;
        info!(power, "transmit power changed");
        Ok(true)
    }

    /// Stamps the header with the local clock and origin, then transmits
    pub fn send_payload(&self, payload: &mut Payload) -> Result<()> {
        let mut ctx = self.lock();
        ctx.stamp(payload.frame_mut());
        let raw = padded(&payload.to_bytes());
        ctx.transmit(&raw)
    }

    /// Sends a payload on another channel and group, then retunes back
    ///
    /// Only the radio is retuned; the recorded tuning and the peer table are
    /// left alone, and no receive handler can observe the detour.
    pub fn send_payload_on(&self, channel: u8, group: u8, payload: &mut Payload) -> Result<()> {
        let mut ctx = self.lock();
        ctx.stamp(payload.frame_mut());
        let raw = padded(&payload.to_bytes());
        let home = ctx.tuning;
        if home.channel == channel && home.group == group {
            return ctx.transmit(&raw);
        }

        let mut sent = ctx.radio.set_channel(channel);
        if sent.is_ok() {
            sent = ctx.radio.set_group(group);
        }
        if sent.is_ok() {
            sent = ctx.transmit(&raw);
        }

        // Both halves are restored even when the detour failed part way
        let restore_channel = ctx.radio.set_channel(home.channel);
        let restore_group = ctx.radio.set_group(home.group);
        if let Err(e) = &sent {
            warn!(channel, group, "detour send failed: {}", e);
        }
        sent?;
        restore_channel?;
        restore_group?;
        debug!(channel, group, "sent on detour tuning");
        Ok(())
    }

    /// Transmits caller-built bytes followed by the 4-byte signal pad
    pub fn send_raw(&self, packet: &[u8]) -> Result<()> {
        let raw = padded(packet);
        self.lock().transmit(&raw)
    }

    /// Transmits a buffer exactly as given
    pub fn send_exact(&self, raw: &[u8]) -> Result<()> {
        self.lock().transmit(raw)
    }

    /// Records a received beacon in the peer table
    pub fn record_peer(&self, beacon: &HereIAm) -> PeerRecord {
        self.lock().peers.insert(beacon)
    }

    /// All known peers ordered by origin identifier
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.lock().peers.records()
    }

    pub fn find_peer(&self, origin_id: OriginId) -> Option<PeerRecord> {
        self.lock().peers.get(origin_id).cloned()
    }

    pub fn find_peers_by_class(&self, class_id: u8) -> Vec<PeerRecord> {
        self.lock().peers.find_by_class(class_id)
    }

    pub fn peer_count(&self) -> usize {
        self.lock().peers.len()
    }

    pub fn clear_peers(&self) {
        self.lock().peers.clear();
    }
}
