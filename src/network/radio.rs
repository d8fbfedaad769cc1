use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::Result;
use crate::protocol::SIGNAL_SIZE;

/// Frames queued between a transport and its consumer
pub const FRAME_QUEUE_DEPTH: usize = 64;

/// Where a transport delivers received raw buffers
pub type FrameSender = mpsc::Sender<Bytes>;

/// Consumer side of a transport's receive queue
pub type FrameReceiver = mpsc::Receiver<Bytes>;

/// Creates the receive queue handed to a transport at construction
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    mpsc::channel(FRAME_QUEUE_DEPTH)
}

/// Best-effort delivery: a full or closed queue drops the frame
pub(crate) fn deliver(frames: &FrameSender, frame: Bytes) {
    if let Err(e) = frames.try_send(frame) {
        debug!("dropping received frame: {}", e);
    }
}

/// Signal reported for a frame sent at power 0; each power step adds 8
pub const BASE_SIGNAL: i32 = -100;

/// Received signal strength for a sender's transmit power
pub fn signal_for_power(power: u8) -> i32 {
    BASE_SIGNAL + 8 * i32::from(power)
}

/// Copy of a received frame with the signal written into its last 4 bytes
///
/// Frames shorter than the signal word are returned unchanged.
pub(crate) fn with_signal(frame: &[u8], signal: i32) -> Bytes {
    let mut delivered = BytesMut::from(frame);
    if delivered.len() >= SIGNAL_SIZE {
        let tail = delivered.len() - SIGNAL_SIZE;
        delivered[tail..].copy_from_slice(&signal.to_le_bytes());
    }
    delivered.freeze()
}

/// A broadcast-within-channel-and-group radio transport
///
/// Transports deliver received buffers into the [`FrameSender`] they were built
/// with. The last 4 bytes of every delivered buffer carry the signal strength,
/// so senders pad their packets by 4 bytes.
pub trait Radio: Send {
    /// Transmits one raw buffer on the current channel and group
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    fn set_channel(&mut self, channel: u8) -> Result<()>;

    fn set_group(&mut self, group: u8) -> Result<()>;

    fn set_power(&mut self, power: u8) -> Result<()>;

    /// Asks the transport to attach the sender's identity itself; packets here
    /// carry it in the header, so most transports ignore this.
    fn set_include_origin_id(&mut self, _include: bool) -> Result<()> {
        Ok(())
    }
}

impl<R: Radio + ?Sized> Radio for Box<R> {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }

    fn set_channel(&mut self, channel: u8) -> Result<()> {
        (**self).set_channel(channel)
    }

    fn set_group(&mut self, group: u8) -> Result<()> {
        (**self).set_group(group)
    }

    fn set_power(&mut self, power: u8) -> Result<()> {
        (**self).set_power(power)
    }

    fn set_include_origin_id(&mut self, include: bool) -> Result<()> {
        (**self).set_include_origin_id(include)
    }
}
