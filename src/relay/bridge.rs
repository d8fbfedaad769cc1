use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::core::{RelayConfig, Result};
use crate::network::{FrameReceiver, RadioNode};
use crate::protocol::{CgpArgs, LinkCodec, LinkLine};
use crate::util::{random_kind, random_payload};
use super::{Mode, Trigger};

/// Bridges a line-oriented text link and a radio node
pub struct RelayBridge {
    node: RadioNode,
    config: RelayConfig,
    mode: Mode,
    rng: StdRng,
}

impl RelayBridge {
    /// Creates a bridge in Normal mode
    pub fn new(node: RadioNode, config: RelayConfig) -> Self {
        Self::with_rng(node, config, StdRng::from_entropy())
    }

    /// Creates a bridge drawing chatter payloads from the given generator
    pub fn with_rng(node: RadioNode, config: RelayConfig, rng: StdRng) -> Self {
        RelayBridge {
            node,
            config,
            mode: Mode::Normal,
            rng,
        }
    }

    pub fn node(&self) -> &RadioNode {
        &self.node
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Applies a device trigger and returns the resulting mode
    ///
    /// The chatter trigger is ignored unless chatter is enabled.
    pub fn trigger(&mut self, trigger: Trigger) -> Mode {
        let next = self.mode.toggled(trigger);
        if next == Mode::Chatter && !self.config.chatter_enabled {
            warn!("chatter is disabled, ignoring trigger");
            return self.mode;
        }
        if next != self.mode {
            info!(from = %self.mode, to = %next, "relay mode changed");
            self.mode = next;
        }
        self.mode
    }

    /// Handles one command line; returns the reply to write back, if any
    pub fn handle_line(&mut self, line: LinkLine) -> Option<LinkLine> {
        match line {
            LinkLine::Send(bytes) => {
                if let Err(e) = self.node.handle().send_raw(&bytes) {
                    warn!(len = bytes.len(), "send rejected: {}", e);
                }
                None
            }
            LinkLine::Tune(args) => Some(LinkLine::Tune(self.apply_tuning(args))),
            LinkLine::Malformed { line, reason } => {
                warn!(%line, "skipping malformed command: {}", reason);
                None
            }
            LinkLine::Received(_) => {
                warn!("r: is an output prefix, ignoring");
                None
            }
            LinkLine::Other { command, .. } => {
                warn!(%command, "unknown command");
                None
            }
            LinkLine::Log(text) => {
                debug!(%text, "ignoring text without a command");
                None
            }
        }
    }

    /// Applies each given setting, leaving rejected ones unchanged
    fn apply_tuning(&self, args: CgpArgs) -> CgpArgs {
        let handle = self.node.handle();
        if let Some(channel) = args.channel {
            if let Err(e) = handle.set_channel(channel) {
                warn!("cgp: {}", e);
            }
        }
        if let Some(group) = args.group {
            if let Err(e) = handle.set_group(group) {
                warn!("cgp: {}", e);
            }
        }
        if let Some(power) = args.power {
            if let Err(e) = handle.set_power(power) {
                warn!("cgp: {}", e);
            }
        }
        let tuning = handle.tuning();
        CgpArgs {
            channel: Some(tuning.channel),
            group: Some(tuning.group),
            power: Some(tuning.power),
        }
    }

    /// Handles one received radio frame; returns the lines to report
    pub fn handle_frame(&mut self, frame: &[u8]) -> Vec<LinkLine> {
        let payload = self.node.receive(frame);
        if self.mode == Mode::Echo {
            match self.node.handle().send_exact(frame) {
                Ok(()) => info!(len = frame.len(), "echoed frame"),
                Err(e) => warn!("echo failed: {}", e),
            }
            return Vec::new();
        }

        let mut lines = vec![LinkLine::Received(frame.to_vec())];
        match payload {
            Some(payload) if self.config.log_decoded => lines.push(LinkLine::Log(payload.to_string())),
            Some(_) => {}
            None => debug!(len = frame.len(), "received undecodable frame"),
        }
        lines
    }

    /// Transmits one random payload of a random variant
    pub fn chatter(&mut self) -> Result<()> {
        let kind = random_kind(&mut self.rng);
        let mut payload = random_payload(kind, &mut self.rng);
        self.node.handle().send_payload(&mut payload)?;
        debug!(kind = kind.name(), "chatter sent");
        Ok(())
    }

    /// Runs the bridge until the text link reaches end of file
    pub async fn run<R, W>(
        mut self,
        reader: R,
        writer: W,
        mut frames: FrameReceiver,
        mut triggers: mpsc::Receiver<Trigger>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, LinkCodec::new());
        let mut sink = FramedWrite::new(writer, LinkCodec::new());
        let mut chatter = interval(self.config.chatter_interval);
        chatter.set_missed_tick_behavior(MissedTickBehavior::Delay);
        chatter.reset();
        let mut frames_open = true;
        let mut triggers_open = true;

        info!(mode = %self.mode, "relay bridge running");
        loop {
            tokio::select! {
                line = lines.next() => match line {
                    Some(Ok(line)) => {
                        if let Some(reply) = self.handle_line(line) {
                            sink.send(reply).await?;
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        info!("text link closed");
                        break;
                    }
                },

                frame = frames.recv(), if frames_open => match frame {
                    Some(frame) => {
                        for line in self.handle_frame(&frame) {
                            sink.feed(line).await?;
                        }
                        sink.flush().await?;
                    }
                    None => {
                        warn!("radio receive queue closed");
                        frames_open = false;
                    }
                },

                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(trigger) => {
                        let before = self.mode;
                        if self.trigger(trigger) == Mode::Chatter && before != Mode::Chatter {
                            chatter.reset();
                        }
                    }
                    None => triggers_open = false,
                },

                _ = chatter.tick(), if self.mode == Mode::Chatter => {
                    if let Err(e) = self.chatter() {
                        warn!("chatter failed: {}", e);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, OriginId, Tuning};
    use crate::network::{Radio, SimMedium};
    use crate::protocol::{decode, BotStatus, TypedPayload};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn new_bridge(medium: &SimMedium, config: RelayConfig) -> (RelayBridge, FrameReceiver) {
        let (radio, frames) = medium.attach();
        let node =
            RadioNode::with_origin(radio, OriginId(0xa), Tuning::default(), &Config::default())
                .unwrap();
        (RelayBridge::with_rng(node, config, StdRng::seed_from_u64(1)), frames)
    }

    #[test]
    fn test_send_command_pads_signal_word() {
        let medium = SimMedium::new();
        let (mut bridge, _frames) = new_bridge(&medium, RelayConfig::default());
        assert!(bridge.handle_line(LinkLine::parse("s: 010203")).is_none());
        assert!(bridge.handle_line(LinkLine::parse("s: 0g")).is_none());

        let log = medium.transmissions();
        assert_eq!(log.len(), 1);
        assert_eq!(&log[0].frame[..], &[1, 2, 3, 0, 0, 0, 0]);
    }

    #[test]
    fn test_cgp_command() {
        let medium = SimMedium::new();
        let (mut bridge, _frames) = new_bridge(&medium, RelayConfig::default());
        let reply = bridge.handle_line(LinkLine::parse("cgp: 10 . 5")).unwrap();
        assert_eq!(reply.to_string(), "cgp: 10 0 5");

        let reply = bridge.handle_line(LinkLine::parse("cgp: . . .")).unwrap();
        assert_eq!(reply.to_string(), "cgp: 10 0 5");

        let reply = bridge.handle_line(LinkLine::parse("cgp: 99 3")).unwrap();
        assert_eq!(reply.to_string(), "cgp: 10 3 5");
    }

    #[test]
    fn test_echo_retransmits_unmodified() {
        let medium = SimMedium::new();
        let (mut bridge, _frames) = new_bridge(&medium, RelayConfig::default());
        assert_eq!(bridge.trigger(Trigger::Echo), Mode::Echo);

        let mut raw = BotStatus::new().to_bytes().to_vec();
        raw.extend_from_slice(&(-61i32).to_le_bytes());
        assert!(bridge.handle_frame(&raw).is_empty());

        let log = medium.transmissions();
        assert_eq!(log.len(), 1);
        assert_eq!(&log[0].frame[..], &raw[..]);

        assert_eq!(bridge.trigger(Trigger::Echo), Mode::Normal);
        let lines = bridge.handle_frame(&raw);
        assert_eq!(lines[0], LinkLine::Received(raw.clone()));
        assert!(lines[1].to_string().starts_with("BotStatus("));
        assert_eq!(medium.transmissions().len(), 1);
    }

    #[test]
    fn test_chatter_gated_by_config() {
        let medium = SimMedium::new();
        let (mut bridge, _frames) = new_bridge(&medium, RelayConfig::default());
        assert_eq!(bridge.trigger(Trigger::Chatter), Mode::Normal);

        let config = RelayConfig {
            chatter_enabled: true,
            ..RelayConfig::default()
        };
        let (mut bridge, _frames) = new_bridge(&medium, config);
        assert_eq!(bridge.trigger(Trigger::Chatter), Mode::Chatter);
        bridge.chatter().unwrap();

        let log = medium.transmissions();
        let sent = decode(&log[0].frame).unwrap();
        assert_eq!(sent.header().origin_id, 0xa);
    }

    #[tokio::test]
    async fn test_cgp_over_link() {
        let medium = SimMedium::new();
        let (bridge, frames) = new_bridge(&medium, RelayConfig::default());
        let node = bridge.node().clone();
        let reader = tokio_test::io::Builder::new().read(b"cgp: 10 . 5\n").build();
        let writer = tokio_test::io::Builder::new().write(b"cgp: 10 0 5\n").build();
        let (_trigger_tx, triggers) = mpsc::channel(1);

        bridge.run(reader, writer, frames, triggers).await.unwrap();
        assert_eq!(node.handle().tuning(), Tuning::new(10, 0, 5).unwrap());
    }

    #[tokio::test]
    async fn test_received_frames_reported() {
        let medium = SimMedium::new();
        let (bridge, frames) = new_bridge(&medium, RelayConfig::default());
        let (mut peer, _peer_frames) = medium.attach();
        peer.set_channel(Tuning::default().channel).unwrap();
        peer.set_group(Tuning::default().group).unwrap();

        let (client, link) = tokio::io::duplex(1024);
        let (link_rx, link_tx) = tokio::io::split(link);
        let (_trigger_tx, triggers) = mpsc::channel(1);
        let task = tokio::spawn(bridge.run(link_rx, link_tx, frames, triggers));

        let mut status = BotStatus::new();
        status.set_buttons(1);
        let mut raw = status.to_bytes().to_vec();
        raw.extend_from_slice(&[0; 4]);
        peer.send(&raw).unwrap();

        let (client_rx, mut client_tx) = tokio::io::split(client);
        let mut lines = BufReader::new(client_rx).lines();
        let first = tokio::time::timeout(Duration::from_secs(1), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match LinkLine::parse(&first) {
            LinkLine::Received(bytes) => {
                assert_eq!(bytes.len(), raw.len());
                assert_eq!(&bytes[..BotStatus::PACKET_SIZE], &raw[..BotStatus::PACKET_SIZE]);
            }
            other => panic!("unexpected line {:?}", other),
        }
        let second = lines.next_line().await.unwrap().unwrap();
        assert!(second.starts_with("BotStatus("));
        assert!(second.contains("buttons=0x01"));

        client_tx.shutdown().await.unwrap();
        drop(client_tx);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_chatter_runs_on_interval() {
        let medium = SimMedium::new();
        let config = RelayConfig {
            chatter_enabled: true,
            ..RelayConfig::default()
        };
        let (bridge, frames) = new_bridge(&medium, config);
        let (client, link) = tokio::io::duplex(1024);
        let (link_rx, link_tx) = tokio::io::split(link);
        let (trigger_tx, triggers) = mpsc::channel(1);
        let task = tokio::spawn(bridge.run(link_rx, link_tx, frames, triggers));

        trigger_tx.send(Trigger::Chatter).await.unwrap();
        tokio::time::sleep(Duration::from_millis(7_500)).await;
        let sent = medium.transmissions();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|t| decode(&t.frame).is_some()));

        trigger_tx.send(Trigger::Chatter).await.unwrap();
        tokio::time::sleep(Duration::from_millis(7_500)).await;
        assert_eq!(medium.transmissions().len(), 2);

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_received_prefix_ignored() {
        let medium = SimMedium::new();
        let (mut bridge, _frames) = new_bridge(&medium, RelayConfig::default());
        assert!(bridge.handle_line(LinkLine::parse("r: 0102")).is_none());
        assert!(bridge.handle_line(LinkLine::parse("hello")).is_none());
        assert!(medium.transmissions().is_empty());
    }
}
