use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Error, Result, DEFAULT_BAUD_RATE, MAX_CHANNEL, MAX_POWER};

/// Stable per-device identifier carried in every packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OriginId(pub u32);

impl OriginId {
    /// Draws a random origin identifier for hosts without a hardware serial
    pub fn random() -> Self {
        OriginId(rand::random())
    }

    /// Returns the raw wire value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Radio tuning triple; channel and group partition which peers are reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuning {
    /// Radio channel (0..=83)
    pub channel: u8,
    /// Radio group (0..=255)
    pub group: u8,
    /// Transmit power (0..=7)
    pub power: u8,
}

impl Tuning {
    /// Creates a tuning triple, rejecting values the transport cannot use
    pub fn new(channel: u8, group: u8, power: u8) -> Result<Self> {
        let tuning = Tuning { channel, group, power };
        tuning.validate()?;
        Ok(tuning)
    }

    /// Checks the channel and power ranges
    pub fn validate(&self) -> Result<()> {
        if self.channel > MAX_CHANNEL {
            return Err(Error::config(format!(
                "channel {} out of range 0..={}",
                self.channel, MAX_CHANNEL
            )));
        }
        if self.power > MAX_POWER {
            return Err(Error::config(format!(
                "power {} out of range 0..={}",
                self.power, MAX_POWER
            )));
        }
        Ok(())
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            channel: 7,
            group: 0,
            power: 6,
        }
    }
}

impl fmt::Display for Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.channel, self.group, self.power)
    }
}

/// Identity and initial tuning of the local node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fixed origin identifier; a random one is drawn when absent
    pub origin_id: Option<u32>,
    /// Device class advertised in beacons
    pub class_id: u8,
    /// Tuning applied at startup
    pub tuning: Tuning,
}

impl NodeConfig {
    /// Resolves the configured origin identifier or draws a random one
    pub fn origin(&self) -> OriginId {
        self.origin_id.map(OriginId).unwrap_or_else(OriginId::random)
    }
}

/// Configuration for the beacon loop and channel discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Period of the beacon loop
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub beacon_interval: Duration,
    /// Every n-th beacon is repeated on the broadcast channel
    pub broadcast_every: u32,
    /// Universally known discovery channel
    pub broadcast_channel: u8,
    /// Universally known discovery group
    pub broadcast_group: u8,
    /// How long a candidate channel is watched for conflicting peers
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub probe_timeout: Duration,
    /// Poll period while probing
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub probe_poll: Duration,
    /// Lowest candidate channel
    pub channel_min: u8,
    /// Highest candidate channel
    pub channel_max: u8,
    /// Lowest candidate group
    pub group_min: u8,
    /// Highest candidate group
    pub group_max: u8,
    /// Flags advertised in beacons
    pub beacon_flags: u16,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        NegotiationConfig {
            beacon_interval: Duration::from_millis(2000),
            broadcast_every: 10,
            broadcast_channel: 7,
            broadcast_group: 0,
            probe_timeout: Duration::from_secs(5),
            probe_poll: Duration::from_millis(100),
            channel_min: 0,
            channel_max: MAX_CHANNEL,
            group_min: 1,
            group_max: 255,
            beacon_flags: 0,
        }
    }
}

impl NegotiationConfig {
    /// Checks that the candidate ranges are usable
    pub fn validate(&self) -> Result<()> {
        if self.channel_min > self.channel_max || self.channel_max > MAX_CHANNEL {
            return Err(Error::config(format!(
                "invalid channel range {}..={}",
                self.channel_min, self.channel_max
            )));
        }
        if self.group_min > self.group_max {
            return Err(Error::config(format!(
                "invalid group range {}..={}",
                self.group_min, self.group_max
            )));
        }
        if self.broadcast_channel > MAX_CHANNEL {
            return Err(Error::config(format!(
                "broadcast channel {} out of range",
                self.broadcast_channel
            )));
        }
        if self.broadcast_every == 0 {
            return Err(Error::config("broadcast_every must be at least 1"));
        }
        if self.beacon_interval.is_zero() || self.probe_poll.is_zero() {
            return Err(Error::config("beacon and probe periods must be non-zero"));
        }
        Ok(())
    }
}

/// Configuration for the relay bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Whether the chatter trigger may enable random traffic generation
    pub chatter_enabled: bool,
    /// Period of chatter transmissions
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub chatter_interval: Duration,
    /// Write decoded payloads to the text link after each `r:` line
    pub log_decoded: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            chatter_enabled: false,
            chatter_interval: Duration::from_millis(3000),
            log_decoded: true,
        }
    }
}

/// Serial text link settings used by the host-side client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device path; auto-detected when absent
    pub device: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout of a single serial read
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            device: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(100),
        }
    }
}

/// Multicast settings of the UDP radio emulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    /// Multicast group standing in for the shared ether
    pub multicast_addr: Ipv4Addr,
    /// UDP port
    pub port: u16,
    /// Interface used to join the group
    pub interface: Ipv4Addr,
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            multicast_addr: Ipv4Addr::new(239, 255, 42, 99),
            port: 4242,
            interface: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Configuration for an rradio node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local node identity and tuning
    pub node: NodeConfig,
    /// Beacon and channel discovery settings
    pub negotiation: NegotiationConfig,
    /// Relay bridge settings
    pub relay: RelayConfig,
    /// Host serial link settings
    pub link: LinkConfig,
    /// UDP radio emulation settings
    pub udp: UdpConfig,
}

impl Config {
    /// Parses a TOML document; missing sections take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Validates every section
    pub fn validate(&self) -> Result<()> {
        self.node.tuning.validate()?;
        self.negotiation.validate()?;
        if self.relay.chatter_interval.is_zero() {
            return Err(Error::config("chatter_interval must be non-zero"));
        }
        if self.link.baud_rate == 0 {
            return Err(Error::config("baud_rate must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_limits() {
        assert!(Tuning::new(83, 255, 7).is_ok());
        assert!(matches!(Tuning::new(84, 0, 0), Err(Error::Config(_))));
        assert!(matches!(Tuning::new(0, 0, 8), Err(Error::Config(_))));
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(OriginId(0xBEEF).to_string(), "0000beef");
    }

    #[test]
    fn test_config_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.negotiation.beacon_interval, Duration::from_millis(2000));
        assert_eq!(config.relay.chatter_interval, Duration::from_millis(3000));
        assert_eq!(config.link.baud_rate, 115_200);
    }

    #[test]
    fn test_config_from_toml() {
        let text = r#"
            [node]
            origin_id = 1234
            class_id = 3
            tuning = { channel = 12, group = 40, power = 5 }

            [negotiation]
            probe_timeout = 2500
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.node.origin(), OriginId(1234));
        assert_eq!(config.node.class_id, 3);
        assert_eq!(config.node.tuning, Tuning { channel: 12, group: 40, power: 5 });
        assert_eq!(config.negotiation.probe_timeout, Duration::from_millis(2500));
        assert_eq!(config.negotiation.broadcast_every, 10);
    }

    #[test]
    fn test_config_rejects_bad_ranges() {
        let text = r#"
            [negotiation]
            channel_min = 50
            channel_max = 10
        "#;
        assert!(matches!(Config::from_toml_str(text), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.node.tuning, config.node.tuning);
        assert_eq!(parsed.negotiation.probe_poll, config.negotiation.probe_poll);
    }
}
