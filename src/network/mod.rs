//! Radio transport and node management module
//!
//! This module owns the radio tuning state and the peer table, runs the beacon
//! and channel discovery protocol, and routes received frames to handlers.

mod context;
mod discovery;
pub mod medium;
mod peers;
mod radio;
pub mod udp;

pub use self::context::RadioHandle;
pub use self::discovery::{candidate_for, BeaconOutcome, BeaconState, Negotiator, PeerHandler};
pub use self::medium::{SimMedium, SimRadio, Transmission};
pub use self::peers::{PeerRecord, PeerTable};
pub use self::radio::{
    frame_channel, signal_for_power, FrameReceiver, FrameSender, Radio, BASE_SIGNAL,
    FRAME_QUEUE_DEPTH,
};
pub use self::udp::UdpRadio;

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::core::{Config, OriginId, Result, Tuning};
use crate::protocol::{decode, Dispatcher, Payload, PayloadType};

/// A radio context with its negotiator and receive handlers
///
/// Cloning yields another handle onto the same node.
#[derive(Clone)]
pub struct RadioNode {
    handle: RadioHandle,
    negotiator: Negotiator,
    dispatcher: Arc<Mutex<Dispatcher>>,
}

impl RadioNode {
    /// Creates a node using the configured identity, tuning and negotiation
    pub fn new<R: Radio + 'static>(radio: R, config: &Config) -> Result<Self> {
        config.validate()?;
        Self::with_origin(radio, config.node.origin(), config.node.tuning, config)
    }

    /// Creates a node with an explicit origin identifier
    pub fn with_origin<R: Radio + 'static>(
        radio: R,
        origin_id: OriginId,
        tuning: Tuning,
        config: &Config,
    ) -> Result<Self> {
        let handle = RadioHandle::new(radio, origin_id, tuning)?;
        let negotiator = Negotiator::new(handle.clone(), config.negotiation.clone())?;
        Ok(RadioNode {
            handle,
            negotiator,
            dispatcher: Arc::new(Mutex::new(Dispatcher::new())),
        })
    }

    pub fn handle(&self) -> &RadioHandle {
        &self.handle
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Registers the handler for one payload variant
    ///
    /// Handlers run with the dispatcher locked and must not register handlers.
    /// A handler that panics is logged and skipped; the node keeps receiving.
    pub fn on<F>(&self, kind: PayloadType, handler: F)
    where
        F: FnMut(&Payload) -> Result<()> + Send + 'static,
    {
        self.dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on(kind, handler);
    }

    /// Registers the handler that fires for every decoded payload
    pub fn on_any<F>(&self, handler: F)
    where
        F: FnMut(&Payload) -> Result<()> + Send + 'static,
    {
        self.dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_any(handler);
    }

    /// Handles one received raw buffer
    ///
    /// Beacons update the peer table before any handler runs. Foreign or short
    /// buffers are dropped and yield `None`.
    pub fn receive(&self, raw: &[u8]) -> Option<Payload> {
        let payload = decode(raw)?;
        if let Payload::HereIAm(beacon) = &payload {
            self.negotiator.observe(beacon);
        }
        self.dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .notify(&payload);
        Some(payload)
    }

    /// Processes received frames until the transport closes its queue
    pub async fn run(self, mut frames: FrameReceiver) -> Result<()> {
        info!(origin = %self.handle.origin_id(), "radio node receiving");
        while let Some(frame) = frames.recv().await {
            if self.receive(&frame).is_none() {
                debug!(len = frame.len(), "dropped undecodable frame");
            }
        }
        info!("radio transport closed");
        Ok(())
    }
}
