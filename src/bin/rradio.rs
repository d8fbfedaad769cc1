use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rradio::core::{Config, Result};
use rradio::link::{
    render_port_table, usb_serial_ports, validate, RelayClient, ValidateMode, ValidateOptions,
};
use rradio::network::{RadioNode, UdpRadio};
use rradio::relay::{RelayBridge, Trigger};

#[derive(Parser, Debug)]
#[command(name = "rradio", version, about = "Short-range radio packet tools")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List USB serial ports
    Ports,
    /// Bridge stdin/stdout to the UDP radio emulation
    Relay {
        /// Start in echo mode
        #[arg(long, conflicts_with = "chatter")]
        echo: bool,
        /// Start in chatter mode
        #[arg(long)]
        chatter: bool,
        /// Also beacon as the configured device class
        #[arg(long)]
        beacon: bool,
    },
    /// Find a free channel over the UDP radio emulation, then beacon on it
    Negotiate {
        /// Device class to negotiate for; defaults to the configured one
        #[arg(long)]
        class: Option<u8>,
    },
    /// Send hex payloads through a relay on a serial port
    Send {
        /// Serial device; auto-detected when omitted
        #[arg(long, short)]
        device: Option<String>,
        /// Packet bytes as hex
        hex: String,
        /// Number of times to send
        #[arg(long, short, default_value_t = 1)]
        count: u32,
        /// Milliseconds between sends
        #[arg(long, short, default_value_t = 250)]
        interval: u64,
    },
    /// Send payloads through a relay and check what an echo device sends back
    Validate {
        /// Serial device; auto-detected when omitted
        #[arg(long, short)]
        device: Option<String>,
        /// Send random bytes filling the largest packet
        #[arg(long, short, conflicts_with = "words")]
        rand: bool,
        /// Send these hex bytes twice over
        #[arg(long, short)]
        words: Option<String>,
        /// Number of rounds; a structured round covers every payload type
        #[arg(long, short, default_value_t = 10)]
        count: u32,
        /// Milliseconds between packets
        #[arg(long, short, default_value_t = 250)]
        interval: u64,
        /// Milliseconds to wait for each echo
        #[arg(long, default_value_t = 2000)]
        timeout: u64,
    },
    /// Print lines received from a relay on a serial port
    Monitor {
        /// Serial device; auto-detected when omitted
        #[arg(long, short)]
        device: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("rradio error: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Ports => {
            print!("{}", render_port_table(&usb_serial_ports()?));
            Ok(())
        }
        Command::Relay { echo, chatter, beacon } => {
            if chatter {
                config.relay.chatter_enabled = true;
            }
            relay(config, echo, chatter, beacon).await
        }
        Command::Negotiate { class } => {
            let class_id = class.unwrap_or(config.node.class_id);
            negotiate(config, class_id).await
        }
        Command::Send { device, hex, count, interval } => {
            config.link.device = device.or(config.link.device);
            tokio::task::spawn_blocking(move || send(config, &hex, count, interval))
                .await
                .map_err(|e| rradio::Error::invalid_state(e.to_string()))?
        }
        Command::Validate { device, rand, words, count, interval, timeout } => {
            config.link.device = device.or(config.link.device);
            let mode = match words {
                Some(text) => {
                    let cleaned: String = text.split_whitespace().collect();
                    ValidateMode::Words(hex::decode(cleaned)?)
                }
                None if rand => ValidateMode::Random,
                None => ValidateMode::Packets,
            };
            let options = ValidateOptions {
                count,
                interval: Duration::from_millis(interval),
                timeout: Duration::from_millis(timeout),
            };
            tokio::task::spawn_blocking(move || validate_relay(config, mode, options))
                .await
                .map_err(|e| rradio::Error::invalid_state(e.to_string()))?
        }
        Command::Monitor { device } => {
            config.link.device = device.or(config.link.device);
            tokio::task::spawn_blocking(move || monitor(config))
                .await
                .map_err(|e| rradio::Error::invalid_state(e.to_string()))?
        }
    }
}

fn udp_node(config: &Config) -> Result<(RadioNode, rradio::network::FrameReceiver)> {
    let origin = config.node.origin();
    let (radio, frames) = UdpRadio::open(&config.udp, origin)?;
    let node = RadioNode::with_origin(radio, origin, config.node.tuning, config)?;
    Ok((node, frames))
}

async fn relay(config: Config, echo: bool, chatter: bool, beacon: bool) -> Result<()> {
    let (node, frames) = udp_node(&config)?;
    if beacon {
        node.negotiator().start(config.node.class_id);
        tokio::spawn(node.negotiator().clone().run());
    }

    let mut bridge = RelayBridge::new(node, config.relay.clone());
    if echo {
        bridge.trigger(Trigger::Echo);
    }
    if chatter {
        bridge.trigger(Trigger::Chatter);
    }

    // No device buttons on a host; the sender only keeps the queue open
    let (_triggers_tx, triggers) = mpsc::channel(4);
    bridge
        .run(tokio::io::stdin(), tokio::io::stdout(), frames, triggers)
        .await
}

async fn negotiate(config: Config, class_id: u8) -> Result<()> {
    let (node, frames) = udp_node(&config)?;
    let receiver = tokio::spawn(node.clone().run(frames));
    let negotiator = node.negotiator().clone();
    negotiator.on_peer(|peer| {
        info!(origin = %peer.origin_id, class_id = peer.class_id, signal = peer.signal, "peer seen");
    });

    let mut rng = StdRng::from_entropy();
    let tuning = negotiator.find_free_channel(class_id, &mut rng).await?;
    println!("cgp: {}", tuning);

    negotiator.start(class_id);
    negotiator.run().await?;
    receiver.abort();
    Ok(())
}

fn send(config: Config, hex: &str, count: u32, interval: u64) -> Result<()> {
    let mut client = RelayClient::open(&config.link)?;
    for line in client.drain(Duration::from_millis(200))? {
        println!("<< {}", line);
    }
    for index in 0..count {
        println!(">> {}", client.send_hex(hex)?);
        let wait = if index + 1 < count {
            Duration::from_millis(interval)
        } else {
            Duration::from_millis(500)
        };
        for line in client.drain(wait)? {
            println!("<< {}", line);
        }
    }
    Ok(())
}

fn validate_relay(config: Config, mode: ValidateMode, options: ValidateOptions) -> Result<()> {
    let mut client = RelayClient::open(&config.link)?;
    for line in client.drain(Duration::from_millis(200))? {
        println!("<< {}", line);
    }
    let mut rng = StdRng::from_entropy();
    let validated = validate(&mut client, &mode, &options, &mut rng)?;
    println!("validated {} packet(s)", validated);
    Ok(())
}

fn monitor(config: Config) -> Result<()> {
    let mut client = RelayClient::open(&config.link)?;
    loop {
        match client.next_line(None)? {
            Some(line) => println!("{}", line),
            None => warn!("link read returned without a line"),
        }
    }
}
