//! rradio: short-range radio packet framework
//!
//! This library implements fixed-layout binary payloads for a broadcast radio,
//! a beacon protocol that lets nodes find a collision-free channel and group
//! without coordination, and a relay that bridges the radio to a text link.
pub mod core;

pub mod link;
pub mod network;
pub mod protocol;
pub mod relay;
pub mod util;

// Re-export commonly used items
pub use core::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
