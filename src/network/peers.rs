use std::collections::HashMap;

use tokio::time::Instant;

use crate::core::OriginId;
use crate::protocol::{HereIAm, TypedPayload};

/// Snapshot of a peer taken from its latest beacon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Peer's origin identifier
    pub origin_id: OriginId,
    /// Device class advertised
    pub class_id: u8,
    /// Group the peer says it listens on
    pub group: u16,
    /// Channel the peer says it listens on
    pub channel: u16,
    /// Advertised flags
    pub flags: u16,
    /// Advertised icon
    pub image: u32,
    /// Sender clock when the beacon left
    pub timestamp: u32,
    /// Signal strength of the beacon
    pub signal: i32,
    /// Local time the beacon arrived
    pub last_seen: Instant,
}

impl PeerRecord {
    /// Builds a record from a received beacon
    pub fn from_beacon(beacon: &HereIAm) -> Self {
        PeerRecord {
            origin_id: OriginId(beacon.origin_id()),
            class_id: beacon.class_id(),
            group: beacon.group(),
            channel: beacon.channel(),
            flags: beacon.flags(),
            image: beacon.image(),
            timestamp: beacon.timestamp(),
            signal: beacon.signal(),
            last_seen: Instant::now(),
        }
    }

    /// Whether the peer advertises the given channel and group
    pub fn is_tuned_to(&self, channel: u8, group: u8) -> bool {
        self.channel == u16::from(channel) && self.group == u16::from(group)
    }
}

/// Latest beacon per origin identifier
///
/// Entries never expire one by one; the whole table is cleared when the local
/// channel or group changes.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<OriginId, PeerRecord>,
}

impl PeerTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for the beacon's origin
    pub fn insert(&mut self, beacon: &HereIAm) -> PeerRecord {
        let record = PeerRecord::from_beacon(beacon);
        self.peers.insert(record.origin_id, record.clone());
        record
    }

    pub fn get(&self, origin_id: OriginId) -> Option<&PeerRecord> {
        self.peers.get(&origin_id)
    }

    /// Peers advertising a device class
    pub fn find_by_class(&self, class_id: u8) -> Vec<PeerRecord> {
        let mut found: Vec<PeerRecord> = self
            .peers
            .values()
            .filter(|record| record.class_id == class_id)
            .cloned()
            .collect();
        found.sort_by_key(|record| record.origin_id);
        found
    }

    /// All records ordered by origin identifier
    pub fn records(&self) -> Vec<PeerRecord> {
        let mut records: Vec<PeerRecord> = self.peers.values().cloned().collect();
        records.sort_by_key(|record| record.origin_id);
        records
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }
}
