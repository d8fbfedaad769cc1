use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::core::Result;
use super::radio::{
    deliver, frame_channel, signal_for_power, with_signal, FrameReceiver, FrameSender, Radio,
};

/// One frame put on the air, as seen by the medium
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    /// Index of the sending station
    pub station: usize,
    pub channel: u8,
    pub group: u8,
    /// Exact bytes handed to `send`
    pub frame: Bytes,
}

struct Station {
    channel: u8,
    group: u8,
    power: u8,
    frames: FrameSender,
}

#[derive(Default)]
struct Ether {
    stations: Vec<Station>,
    log: Vec<Transmission>,
}

impl Ether {
    fn broadcast(&mut self, from: usize, channel: u8, group: u8, power: u8, frame: &[u8]) {
        let signal = signal_for_power(power);
        for (index, station) in self.stations.iter().enumerate() {
            if index == from || station.channel != channel || station.group != group {
                continue;
            }
            deliver(&station.frames, with_signal(frame, signal));
        }
        self.log.push(Transmission {
            station: from,
            channel,
            group,
            frame: Bytes::copy_from_slice(frame),
        });
    }
}

/// In-memory radio medium shared by simulated stations
///
/// A frame reaches every other station tuned to the sender's channel and group.
/// Stations never hear their own transmissions.
#[derive(Clone, Default)]
pub struct SimMedium {
    ether: Arc<Mutex<Ether>>,
}

impl SimMedium {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Ether> {
        self.ether.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a station tuned to channel 0, group 0 at full power
    pub fn attach(&self) -> (SimRadio, FrameReceiver) {
        let (tx, rx) = frame_channel();
        let mut ether = self.lock();
        ether.stations.push(Station {
            channel: 0,
            group: 0,
            power: 7,
            frames: tx,
        });
        let radio = SimRadio {
            medium: self.clone(),
            station: ether.stations.len() - 1,
        };
        (radio, rx)
    }

    /// Everything transmitted so far, in order
    pub fn transmissions(&self) -> Vec<Transmission> {
        self.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Puts a frame on the air from outside any attached station
    pub fn inject(&self, channel: u8, group: u8, frame: &[u8]) {
        self.lock().broadcast(usize::MAX, channel, group, 7, frame);
    }
}

/// A station attached to a [`SimMedium`]
pub struct SimRadio {
    medium: SimMedium,
    station: usize,
}

impl SimRadio {
    pub fn station(&self) -> usize {
        self.station
    }

    fn update<F: FnOnce(&mut Station)>(&self, f: F) {
        let mut ether = self.medium.lock();
        if let Some(station) = ether.stations.get_mut(self.station) {
            f(station);
        }
    }
}

impl Radio for SimRadio {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let mut ether = self.medium.lock();
        let (channel, group, power) = match ether.stations.get(self.station) {
            Some(s) => (s.channel, s.group, s.power),
            None => return Ok(()),
        };
        ether.broadcast(self.station, channel, group, power, frame);
        Ok(())
    }

    fn set_channel(&mut self, channel: u8) -> Result<()> {
        self.update(|s| s.channel = channel);
        Ok(())
    }

    fn set_group(&mut self, group: u8) -> Result<()> {
        self.update(|s| s.group = group);
        Ok(())
    }

    fn set_power(&mut self, power: u8) -> Result<()> {
        self.update(|s| s.power = power);
        Ok(())
    }
}
