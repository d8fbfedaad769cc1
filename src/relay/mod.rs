//! Relay bridge between a text link and the radio
//!
//! The bridge reads `s:` and `cgp:` commands from a line-oriented link,
//! reports received radio traffic as `r:` lines, and switches between
//! Normal, Echo and Chatter modes on device triggers.

mod bridge;

pub use self::bridge::RelayBridge;

use std::fmt;

/// Relay operating mode; exactly one is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Report received frames on the text link
    #[default]
    Normal,
    /// Retransmit every received frame unchanged
    Echo,
    /// Additionally transmit a random payload every chatter interval
    Chatter,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Echo => write!(f, "echo"),
            Mode::Chatter => write!(f, "chatter"),
        }
    }
}

/// Device input events that toggle the relay mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Toggles Echo mode
    Echo,
    /// Toggles Chatter mode
    Chatter,
}

impl Mode {
    /// Mode reached from `self` when `trigger` fires
    pub fn toggled(self, trigger: Trigger) -> Mode {
        match (self, trigger) {
            (Mode::Echo, Trigger::Echo) | (Mode::Chatter, Trigger::Chatter) => Mode::Normal,
            (_, Trigger::Echo) => Mode::Echo,
            (_, Trigger::Chatter) => Mode::Chatter,
        }
    }
}
