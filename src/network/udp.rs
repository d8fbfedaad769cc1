use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket as StdUdpSocket};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::{Error, OriginId, Result, UdpConfig};
use crate::protocol::MAX_RAW_PACKET;
use super::radio::{
    deliver, frame_channel, signal_for_power, with_signal, FrameReceiver, FrameSender, Radio,
};

/// First byte of every emulated radio datagram
pub const DATAGRAM_MAGIC: u8 = 0xB7;

/// magic + station + channel + group + power
const DATAGRAM_HEADER: usize = 8;

/// Emulated radio frame as carried in one multicast datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub station: u32,
    pub channel: u8,
    pub group: u8,
    pub power: u8,
    pub frame: Bytes,
}

impl Datagram {
    /// The frame as a receiver sees it, signal word filled from the sender's power
    pub fn received_frame(&self) -> Bytes {
        with_signal(&self.frame, signal_for_power(self.power))
    }
}

/// Encodes a radio frame for the multicast group
pub fn wrap_datagram(station: u32, channel: u8, group: u8, power: u8, frame: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(DATAGRAM_HEADER + frame.len());
    buf.put_u8(DATAGRAM_MAGIC);
    buf.put_u32_le(station);
    buf.put_u8(channel);
    buf.put_u8(group);
    buf.put_u8(power);
    buf.put_slice(frame);
    buf.freeze()
}

/// Decodes a datagram; foreign traffic yields `None`
pub fn unwrap_datagram(data: &[u8]) -> Option<Datagram> {
    if data.len() < DATAGRAM_HEADER || data[0] != DATAGRAM_MAGIC {
        return None;
    }
    let frame = &data[DATAGRAM_HEADER..];
    if frame.len() > MAX_RAW_PACKET {
        return None;
    }
    Some(Datagram {
        station: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
        channel: data[5],
        group: data[6],
        power: data[7],
        frame: Bytes::copy_from_slice(frame),
    })
}

/// Builds the multicast socket shared by every emulated station on a host
fn multicast_socket(config: &UdpConfig) -> Result<StdUdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let bind = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
    socket.bind(&SocketAddr::V4(bind).into())?;
    socket.join_multicast_v4(&config.multicast_addr, &config.interface)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

#[derive(Debug)]
struct Shared {
    channel: AtomicU8,
    group: AtomicU8,
}

/// Radio transport emulated over IPv4 UDP multicast
///
/// Every station on the multicast group hears every datagram; receivers keep
/// only frames sent by another station on their own channel and group.
pub struct UdpRadio {
    socket: StdUdpSocket,
    target: SocketAddr,
    station: u32,
    power: u8,
    shared: Arc<Shared>,
    receiver: JoinHandle<()>,
}

impl UdpRadio {
    /// Joins the multicast group and starts the receive task
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &UdpConfig, station: OriginId) -> Result<(Self, FrameReceiver)> {
        let socket = multicast_socket(config)?;
        let recv_socket = UdpSocket::from_std(socket.try_clone()?)?;
        let shared = Arc::new(Shared {
            channel: AtomicU8::new(0),
            group: AtomicU8::new(0),
        });
        let (tx, rx) = frame_channel();
        let receiver = tokio::spawn(receive_loop(
            recv_socket,
            station.get(),
            Arc::clone(&shared),
            tx,
        ));

        info!(
            group = %config.multicast_addr,
            port = config.port,
            station = %station,
            "udp radio joined multicast group"
        );
        Ok((
            UdpRadio {
                socket,
                target: SocketAddr::V4(SocketAddrV4::new(config.multicast_addr, config.port)),
                station: station.get(),
                power: 7,
                shared,
                receiver,
            },
            rx,
        ))
    }
}

async fn receive_loop(socket: UdpSocket, station: u32, shared: Arc<Shared>, frames: FrameSender) {
    let mut buf = [0u8; 512];
    loop {
        let len = match socket.recv_from(&mut buf).await {
            Ok((len, _)) => len,
            Err(e) => {
                warn!("udp radio receive failed: {}", e);
                continue;
            }
        };
        let Some(datagram) = unwrap_datagram(&buf[..len]) else {
            debug!(len, "ignoring foreign datagram");
            continue;
        };
        if datagram.station == station
            || datagram.channel != shared.channel.load(Ordering::Acquire)
            || datagram.group != shared.group.load(Ordering::Acquire)
        {
            continue;
        }
        deliver(&frames, datagram.received_frame());
        if frames.is_closed() {
            break;
        }
    }
}

impl Radio for UdpRadio {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_RAW_PACKET {
            return Err(Error::PacketTooLarge {
                size: frame.len(),
                max: MAX_RAW_PACKET,
            });
        }
        let datagram = wrap_datagram(
            self.station,
            self.shared.channel.load(Ordering::Acquire),
            self.shared.group.load(Ordering::Acquire),
            self.power,
            frame,
        );
        let sent = self.socket.send_to(&datagram, self.target)?;
        if sent != datagram.len() {
            return Err(Error::radio(format!(
                "short datagram write: {} of {} bytes",
                sent,
                datagram.len()
            )));
        }
        Ok(())
    }

    fn set_channel(&mut self, channel: u8) -> Result<()> {
        self.shared.channel.store(channel, Ordering::Release);
        Ok(())
    }

    fn set_group(&mut self, group: u8) -> Result<()> {
        self.shared.group.store(group, Ordering::Release);
        Ok(())
    }

    fn set_power(&mut self, power: u8) -> Result<()> {
        self.power = power;
        Ok(())
    }
}

impl Drop for UdpRadio {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}
