//! Core types and traits for rradio
//!
//! This module contains the fundamental building blocks used throughout the library:
//! errors, configuration and the radio tuning triple.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{Error, Result};
pub use self::types::{
    Config,
    LinkConfig,
    NegotiationConfig,
    NodeConfig,
    OriginId,
    RelayConfig,
    Tuning,
    UdpConfig,
};

/// Highest radio channel accepted by the transport
pub const MAX_CHANNEL: u8 = 83;

/// Highest transmit power level accepted by the transport
pub const MAX_POWER: u8 = 7;

/// Default baud rate of the relay's serial text link
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
