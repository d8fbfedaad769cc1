use std::io;
use thiserror::Error;

/// Custom error types for rradio
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Radio error: {0}")]
    Radio(String),

    #[error("Link error: {0}")]
    Link(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Negotiation error: {0}")]
    Negotiation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Packet too large: {size} bytes exceeds the {max} byte radio limit")]
    PacketTooLarge {
        /// Size of the rejected buffer
        size: usize,
        /// Largest raw buffer the transport accepts
        max: usize,
    },

    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new radio error
    pub fn radio(msg: impl Into<String>) -> Self {
        Error::Radio(msg.into())
    }

    /// Creates a new text link error
    pub fn link(msg: impl Into<String>) -> Self {
        Error::Link(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new negotiation error
    pub fn negotiation(msg: impl Into<String>) -> Self {
        Error::Negotiation(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::Link(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::radio("test error");
        assert!(matches!(err, Error::Radio(_)));
        assert_eq!(err.to_string(), "Radio error: test error");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));

        let hex_err = hex::decode("abc").unwrap_err();
        let err: Error = hex_err.into();
        assert!(matches!(err, Error::Hex(_)));
    }

    #[test]
    fn test_packet_too_large_message() {
        let err = Error::PacketTooLarge { size: 40, max: 32 };
        assert_eq!(
            err.to_string(),
            "Packet too large: 40 bytes exceeds the 32 byte radio limit"
        );
    }
}
