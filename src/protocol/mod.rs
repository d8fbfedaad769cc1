//! Protocol implementation module
//!
//! This module defines the binary radio packet framework (buffer accessors,
//! header, typed payload variants and the type registry) and the line-oriented
//! text protocol spoken over the relay's link.

pub mod buffer;
pub mod codec;
pub mod header;
pub mod message;
pub mod payload;
pub mod registry;

pub use self::buffer::{ByteBuffer, NumberFormat};
pub use self::codec::LinkCodec;
pub use self::header::{
    Frame, PacketHeader, HEADER_SIZE, MAX_PACKET_SIZE, MAX_RAW_PACKET, SIGNAL_SIZE,
};
pub use self::message::{CgpArgs, LinkLine};
pub use self::payload::{BotCommand, BotStatus, Display, HereIAm, Joystick, Lamp, TypedPayload};
pub use self::registry::{decode, new_by_type, Dispatcher, Handler, Payload, PayloadType};
