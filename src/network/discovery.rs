use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::{Error, NegotiationConfig, OriginId, Result, Tuning};
use crate::protocol::{HereIAm, Payload};
use crate::util::scramble;
use super::context::RadioHandle;
use super::peers::PeerRecord;

/// Callback run after a received beacon has been recorded
pub type PeerHandler = Box<dyn FnMut(&PeerRecord) + Send>;

/// Beacon loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconState {
    /// No device class supplied yet
    Idle,
    /// Beacons go out every period
    Running { class_id: u8 },
    /// Outbound beacons stopped; received beacons are still recorded
    Paused { class_id: u8 },
}

impl BeaconState {
    pub fn class_id(&self) -> Option<u8> {
        match *self {
            BeaconState::Idle => None,
            BeaconState::Running { class_id } | BeaconState::Paused { class_id } => Some(class_id),
        }
    }
}

/// What a single beacon tick transmitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconOutcome {
    /// Not running
    Skipped,
    /// Sent on the private channel and group
    Private,
    /// Also repeated on the broadcast channel and group
    PrivateAndBroadcast,
}

#[derive(Debug)]
struct Beacon {
    state: BeaconState,
    ticks: u64,
    last_sent: Option<(u8, u8)>,
}

fn span(min: u8, max: u8, what: &str) -> Result<u32> {
    max.checked_sub(min)
        .map(|width| u32::from(width) + 1)
        .ok_or_else(|| Error::config(format!("invalid {} range {}..={}", what, min, max)))
}

/// Deterministic first candidate derived from the origin identifier
pub fn candidate_for(origin_id: OriginId, config: &NegotiationConfig) -> Result<(u8, u8)> {
    let h = scramble(origin_id.get());
    let channels = span(config.channel_min, config.channel_max, "channel")?;
    let groups = span(config.group_min, config.group_max, "group")?;
    let channel = u32::from(config.channel_min) + (h & 0xFFFF) % channels;
    let group = u32::from(config.group_min) + (h >> 16) % groups;
    Ok((channel as u8, group as u8))
}

/// Beaconing and channel discovery for one node
///
/// Clones share the beacon state and the peer handler.
#[derive(Clone)]
pub struct Negotiator {
    handle: RadioHandle,
    config: NegotiationConfig,
    beacon: Arc<Mutex<Beacon>>,
    on_peer: Arc<Mutex<Option<PeerHandler>>>,
}

impl Negotiator {
    /// Creates an idle negotiator over a radio context
    ///
    /// Fails when the configuration does not validate.
    pub fn new(handle: RadioHandle, config: NegotiationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Negotiator {
            handle,
            config,
            beacon: Arc::new(Mutex::new(Beacon {
                state: BeaconState::Idle,
                ticks: 0,
                last_sent: None,
            })),
            on_peer: Arc::new(Mutex::new(None)),
        })
    }

    fn beacon(&self) -> MutexGuard<'_, Beacon> {
        self.beacon.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle(&self) -> &RadioHandle {
        &self.handle
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn state(&self) -> BeaconState {
        self.beacon().state
    }

    /// Starts beaconing as the given device class
    ///
    /// Only the first call has an effect; returns whether it did.
    pub fn start(&self, class_id: u8) -> bool {
        let mut beacon = self.beacon();
        if beacon.state != BeaconState::Idle {
            debug!(class_id, "beacon already started");
            return false;
        }
        beacon.state = BeaconState::Running { class_id };
        info!(class_id, "beaconing started");
        true
    }

    /// Stops outbound beacons
    pub fn pause(&self) {
        let mut beacon = self.beacon();
        if let BeaconState::Running { class_id } = beacon.state {
            beacon.state = BeaconState::Paused { class_id };
            info!(class_id, "beaconing paused");
        }
    }

    /// Resumes outbound beacons after [`Negotiator::pause`]
    pub fn resume(&self) {
        let mut beacon = self.beacon();
        if let BeaconState::Paused { class_id } = beacon.state {
            beacon.state = BeaconState::Running { class_id };
            info!(class_id, "beaconing resumed");
        }
    }

    /// Registers the handler run for every received beacon
    pub fn on_peer<F>(&self, handler: F)
    where
        F: FnMut(&PeerRecord) + Send + 'static,
    {
        *self.on_peer.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(handler));
    }

    /// Records a received beacon, then runs the peer handler
    pub fn observe(&self, beacon: &HereIAm) -> PeerRecord {
        let record = self.handle.record_peer(beacon);
        debug!(
            origin = %record.origin_id,
            class_id = record.class_id,
            channel = record.channel,
            group = record.group,
            "beacon received"
        );

        // The handler runs outside the slot lock so it may call back in
        let taken = self.on_peer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut handler) = taken {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&record))).is_err() {
                warn!(origin = %record.origin_id, "peer handler panicked");
            }
            let mut slot = self.on_peer.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
        record
    }

    /// Sends one beacon
    ///
    /// Every `broadcast_every`-th beacon, and the first after a channel or
    /// group change, is repeated on the broadcast channel and group.
    pub fn tick(&self) -> Result<BeaconOutcome> {
        let tuning = self.handle.tuning();
        let (class_id, broadcast) = {
            let mut beacon = self.beacon();
            let BeaconState::Running { class_id } = beacon.state else {
                return Ok(BeaconOutcome::Skipped);
            };
            let current = (tuning.channel, tuning.group);
            let broadcast = beacon.ticks % u64::from(self.config.broadcast_every) == 0
                || beacon.last_sent != Some(current);
            beacon.ticks += 1;
            beacon.last_sent = Some(current);
            (class_id, broadcast)
        };

        let mut here = HereIAm::new();
        here.set_class_id(class_id);
        here.set_channel(u16::from(tuning.channel));
        here.set_group(u16::from(tuning.group));
        here.set_flags(self.config.beacon_flags);
        let mut payload = Payload::HereIAm(here);

        self.handle.send_payload(&mut payload)?;
        if !broadcast {
            return Ok(BeaconOutcome::Private);
        }
        self.handle.send_payload_on(
            self.config.broadcast_channel,
            self.config.broadcast_group,
            &mut payload,
        )?;
        Ok(BeaconOutcome::PrivateAndBroadcast)
    }

    /// Drives [`Negotiator::tick`] every beacon period, forever
    pub async fn run(self) -> Result<()> {
        let mut ticker = interval(self.config.beacon_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick() {
                warn!("beacon failed: {}", e);
            }
        }
    }

    /// Whether a same-class peer currently advertises the candidate
    fn conflict(&self, class_id: u8, channel: u8, group: u8) -> Option<PeerRecord> {
        self.handle
            .find_peers_by_class(class_id)
            .into_iter()
            .find(|peer| peer.is_tuned_to(channel, group) && peer.origin_id != self.handle.origin_id())
    }

    /// Tunes to a candidate and watches it for conflicting peers
    ///
    /// Returns `true` when no same-class peer showed up within the probe
    /// timeout. Exits early on the first conflict.
    pub async fn probe(&self, class_id: u8, channel: u8, group: u8) -> Result<bool> {
        self.handle.clear_peers();
        self.handle.set_channel(channel)?;
        self.handle.set_group(group)?;

        let deadline = Instant::now() + self.config.probe_timeout;
        loop {
            if let Some(peer) = self.conflict(class_id, channel, group) {
                info!(channel, group, peer = %peer.origin_id, "candidate occupied");
                return Ok(false);
            }
            if Instant::now() >= deadline {
                return Ok(true);
            }
            sleep(self.config.probe_poll).await;
        }
    }

    /// Finds a channel and group no other node of the same class is using
    ///
    /// Starts from the candidate derived from the origin identifier and draws
    /// random candidates after each conflict. Has no iteration bound. Fails
    /// when this node already beacons as another class.
    pub async fn find_free_channel<R>(&self, class_id: u8, rng: &mut R) -> Result<Tuning>
    where
        R: Rng + ?Sized,
    {
        if let Some(current) = self.state().class_id() {
            if current != class_id {
                return Err(Error::negotiation(format!(
                    "already beaconing as class {}, cannot negotiate for class {}",
                    current, class_id
                )));
            }
        }
        let (mut channel, mut group) = candidate_for(self.handle.origin_id(), &self.config)?;
        let mut attempts = 1u32;
        loop {
            debug!(channel, group, attempts, "probing candidate");
            if self.probe(class_id, channel, group).await? {
                let tuning = self.handle.tuning();
                info!(%tuning, attempts, "free channel found");
                return Ok(tuning);
            }
            channel = rng.gen_range(self.config.channel_min..=self.config.channel_max);
            group = rng.gen_range(self.config.group_min..=self.config.group_max);
            attempts += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::medium::SimMedium;
    use crate::network::radio::FrameReceiver;
    use crate::protocol::{decode, TypedPayload};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn negotiator(medium: &SimMedium, origin: u32) -> (Negotiator, FrameReceiver) {
        let (radio, frames) = medium.attach();
        let handle = RadioHandle::new(radio, OriginId(origin), Tuning::default()).unwrap();
        (Negotiator::new(handle, NegotiationConfig::default()).unwrap(), frames)
    }

    fn pump(negotiator: Negotiator, mut frames: FrameReceiver) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Some(Payload::HereIAm(beacon)) = decode(&frame) {
                    negotiator.observe(&beacon);
                }
            }
        })
    }

    #[test]
    fn test_candidate_is_stable_and_in_range() {
        let config = NegotiationConfig::default();
        let a = candidate_for(OriginId(0xdead_beef), &config).unwrap();
        assert_eq!(a, candidate_for(OriginId(0xdead_beef), &config).unwrap());
        for origin in [0u32, 1, 42, u32::MAX] {
            let (channel, group) = candidate_for(OriginId(origin), &config).unwrap();
            assert!(channel <= config.channel_max);
            assert!(group >= config.group_min);
        }
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let config = NegotiationConfig {
            channel_min: 50,
            channel_max: 10,
            ..NegotiationConfig::default()
        };
        assert!(matches!(candidate_for(OriginId(1), &config), Err(Error::Config(_))));

        let config = NegotiationConfig {
            group_min: 9,
            group_max: 3,
            ..NegotiationConfig::default()
        };
        assert!(matches!(candidate_for(OriginId(1), &config), Err(Error::Config(_))));

        let medium = SimMedium::new();
        let (radio, _frames) = medium.attach();
        let handle = RadioHandle::new(radio, OriginId(1), Tuning::default()).unwrap();
        let config = NegotiationConfig {
            channel_min: 50,
            channel_max: 10,
            ..NegotiationConfig::default()
        };
        assert!(matches!(Negotiator::new(handle, config), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_broadcast_period_rejected() {
        let medium = SimMedium::new();
        let (radio, _frames) = medium.attach();
        let handle = RadioHandle::new(radio, OriginId(1), Tuning::default()).unwrap();
        let config = NegotiationConfig {
            broadcast_every: 0,
            ..NegotiationConfig::default()
        };
        assert!(matches!(Negotiator::new(handle.clone(), config), Err(Error::Config(_))));

        let negotiator = Negotiator::new(handle, NegotiationConfig::default()).unwrap();
        negotiator.start(2);
        assert_eq!(negotiator.tick().unwrap(), BeaconOutcome::PrivateAndBroadcast);
    }

    #[tokio::test]
    async fn test_negotiation_for_other_class_rejected() {
        let medium = SimMedium::new();
        let (negotiator, _frames) = negotiator(&medium, 1);
        negotiator.start(3);
        let mut rng = StdRng::seed_from_u64(1);
        let result = negotiator.find_free_channel(4, &mut rng).await;
        assert!(matches!(result, Err(Error::Negotiation(_))));
        assert_eq!(negotiator.handle().tuning(), Tuning::default());
    }

    #[test]
    fn test_start_is_idempotent() {
        let medium = SimMedium::new();
        let (negotiator, _frames) = negotiator(&medium, 1);
        assert_eq!(negotiator.tick().unwrap(), BeaconOutcome::Skipped);
        assert!(negotiator.start(3));
        assert!(!negotiator.start(9));
        assert_eq!(negotiator.state(), BeaconState::Running { class_id: 3 });
    }

    #[test]
    fn test_broadcast_schedule() {
        let medium = SimMedium::new();
        let (negotiator, _frames) = negotiator(&medium, 1);
        negotiator.handle.set_channel(40).unwrap();
        negotiator.start(3);

        let outcomes: Vec<_> = (0..11).map(|_| negotiator.tick().unwrap()).collect();
        assert_eq!(outcomes[0], BeaconOutcome::PrivateAndBroadcast);
        assert!(outcomes[1..10].iter().all(|o| *o == BeaconOutcome::Private));
        assert_eq!(outcomes[10], BeaconOutcome::PrivateAndBroadcast);

        negotiator.handle.set_channel(41).unwrap();
        assert_eq!(negotiator.tick().unwrap(), BeaconOutcome::PrivateAndBroadcast);
        assert_eq!(negotiator.tick().unwrap(), BeaconOutcome::Private);

        let log = medium.transmissions();
        assert_eq!(log.len(), 16);
        let broadcasts = log.iter().filter(|t| t.channel == 7 && t.group == 0).count();
        assert_eq!(broadcasts, 3);
        assert_eq!(negotiator.handle.tuning().channel, 41);
    }

    #[test]
    fn test_pause_stops_beacons_but_not_receive() {
        let medium = SimMedium::new();
        let (negotiator, _frames) = negotiator(&medium, 1);
        negotiator.start(3);
        negotiator.pause();
        assert_eq!(negotiator.state(), BeaconState::Paused { class_id: 3 });
        assert_eq!(negotiator.tick().unwrap(), BeaconOutcome::Skipped);

        let mut beacon = HereIAm::new();
        beacon.frame_mut().set_origin_id(77);
        negotiator.observe(&beacon);
        assert_eq!(negotiator.handle.peer_count(), 1);

        negotiator.resume();
        assert_ne!(negotiator.tick().unwrap(), BeaconOutcome::Skipped);
    }

    #[test]
    fn test_peer_handler_sees_recorded_peer() {
        let medium = SimMedium::new();
        let (negotiator, _frames) = negotiator(&medium, 1);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let inner = negotiator.clone();
        negotiator.on_peer(move |record| {
            assert!(inner.handle.find_peer(record.origin_id).is_some());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut beacon = HereIAm::new();
        beacon.frame_mut().set_origin_id(5);
        negotiator.observe(&beacon);
        negotiator.observe(&beacon);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_free_channel() {
        let medium = SimMedium::new();
        let (negotiator, _frames) = negotiator(&medium, 1);
        let started = Instant::now();
        assert!(negotiator.probe(3, 20, 30).await.unwrap());
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(negotiator.handle.tuning().channel, 20);
        assert_eq!(negotiator.handle.tuning().group, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_free_channel_leaves_occupied_candidate() {
        let medium = SimMedium::new();
        let (a, a_frames) = negotiator(&medium, 0x0bad_cafe);
        let initial = candidate_for(OriginId(0x0bad_cafe), a.config()).unwrap();

        let (squatter, _squatter_frames) = negotiator(&medium, 0x5eed);
        squatter.handle.set_channel(initial.0).unwrap();
        squatter.handle.set_group(initial.1).unwrap();
        squatter.start(3);
        let beacons = tokio::spawn(squatter.clone().run());
        let receiver = pump(a.clone(), a_frames);

        let mut rng = StdRng::seed_from_u64(42);
        let tuning = a.find_free_channel(3, &mut rng).await.unwrap();
        assert_ne!((tuning.channel, tuning.group), initial);
        assert_eq!(a.handle.tuning(), tuning);

        beacons.abort();
        receiver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_class_is_not_a_conflict() {
        let medium = SimMedium::new();
        let (a, a_frames) = negotiator(&medium, 0x0bad_cafe);
        let initial = candidate_for(OriginId(0x0bad_cafe), a.config()).unwrap();

        let (other, _other_frames) = negotiator(&medium, 0x5eed);
        other.handle.set_channel(initial.0).unwrap();
        other.handle.set_group(initial.1).unwrap();
        other.start(4);
        let beacons = tokio::spawn(other.clone().run());
        let receiver = pump(a.clone(), a_frames);

        let mut rng = StdRng::seed_from_u64(42);
        let tuning = a.find_free_channel(3, &mut rng).await.unwrap();
        assert_eq!((tuning.channel, tuning.group), initial);
        assert!(a.handle.peer_count() >= 1);

        beacons.abort();
        receiver.abort();
    }
}
