use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::core::Result;
use super::header::{Frame, PacketHeader};
use super::payload::{BotCommand, BotStatus, Display, HereIAm, Joystick, Lamp, TypedPayload};

/// Wire tags of the payload variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PayloadType {
    HereIAm = 10,
    Display = 11,
    BotCommand = 20,
    BotStatus = 21,
    Joystick = 30,
}

impl PayloadType {
    /// Every registered variant
    pub const ALL: [PayloadType; 5] = [
        PayloadType::HereIAm,
        PayloadType::Display,
        PayloadType::BotCommand,
        PayloadType::BotStatus,
        PayloadType::Joystick,
    ];

    pub fn from_u8(tag: u8) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|entry| entry.kind.as_u8() == tag)
            .map(|entry| entry.kind)
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PayloadType::HereIAm => "HereIAm",
            PayloadType::Display => "Display",
            PayloadType::BotCommand => "BotCommand",
            PayloadType::BotStatus => "BotStatus",
            PayloadType::Joystick => "Joystick",
        }
    }
}

/// A decoded payload of any registered variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Joystick(Joystick),
    BotCommand(BotCommand),
    BotStatus(BotStatus),
    Display(Display),
    HereIAm(HereIAm),
}

impl Payload {
    pub fn kind(&self) -> PayloadType {
        match self {
            Payload::Joystick(_) => PayloadType::Joystick,
            Payload::BotCommand(_) => PayloadType::BotCommand,
            Payload::BotStatus(_) => PayloadType::BotStatus,
            Payload::Display(_) => PayloadType::Display,
            Payload::HereIAm(_) => PayloadType::HereIAm,
        }
    }

    pub fn frame(&self) -> &Frame {
        match self {
            Payload::Joystick(p) => p.frame(),
            Payload::BotCommand(p) => p.frame(),
            Payload::BotStatus(p) => p.frame(),
            Payload::Display(p) => p.frame(),
            Payload::HereIAm(p) => p.frame(),
        }
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        match self {
            Payload::Joystick(p) => p.frame_mut(),
            Payload::BotCommand(p) => p.frame_mut(),
            Payload::BotStatus(p) => p.frame_mut(),
            Payload::Display(p) => p.frame_mut(),
            Payload::HereIAm(p) => p.frame_mut(),
        }
    }

    pub fn header(&self) -> PacketHeader {
        self.frame().header()
    }

    pub fn signal(&self) -> i32 {
        self.frame().signal()
    }

    /// Wire bytes, exactly the variant's packet size
    pub fn to_bytes(&self) -> Bytes {
        self.frame().to_bytes()
    }

    /// Every header and payload field as a name and value, in wire order
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        const MOTORS: [&str; BotCommand::MOTOR_COUNT] = ["motor1", "motor2", "motor3", "motor4"];
        const SERVOS: [&str; BotCommand::SERVO_COUNT] = ["servo1", "servo2"];

        let header = self.header();
        let mut fields = vec![
            ("packet_type", i64::from(header.packet_type)),
            ("time", i64::from(header.timestamp)),
            ("origin", i64::from(header.origin_id)),
        ];
        match self {
            Payload::Joystick(p) => {
                let (ax, ay, az) = p.accel();
                fields.extend([
                    ("x", i64::from(p.x())),
                    ("y", i64::from(p.y())),
                    ("buttons", i64::from(p.buttons())),
                    ("accel_x", i64::from(ax)),
                    ("accel_y", i64::from(ay)),
                    ("accel_z", i64::from(az)),
                ]);
            }
            Payload::BotCommand(p) => {
                fields.push(("command_type", i64::from(p.command_type())));
                for (index, name) in MOTORS.into_iter().enumerate() {
                    fields.push((name, i64::from(p.motor(index))));
                }
                fields.push(("duration", i64::from(p.duration())));
                for (index, name) in SERVOS.into_iter().enumerate() {
                    fields.push((name, i64::from(p.servo(index))));
                }
                fields.push(("data", i64::from(p.data())));
            }
            Payload::BotStatus(p) => {
                let (ax, ay, az) = p.accel();
                fields.extend([
                    ("buttons", i64::from(p.buttons())),
                    ("accel_x", i64::from(ax)),
                    ("accel_y", i64::from(ay)),
                    ("accel_z", i64::from(az)),
                ]);
            }
            Payload::Display(p) => {
                fields.extend([
                    ("tone", i64::from(p.tone())),
                    ("duration", i64::from(p.duration())),
                    ("image", i64::from(p.image())),
                ]);
                for lamp in Lamp::ALL {
                    fields.push((lamp.name(), i64::from(p.color(lamp))));
                }
            }
            Payload::HereIAm(p) => {
                fields.extend([
                    ("class_id", i64::from(p.class_id())),
                    ("group", i64::from(p.group())),
                    ("channel", i64::from(p.channel())),
                    ("flags", i64::from(p.flags())),
                    ("image", i64::from(p.image())),
                ]);
            }
        }
        fields
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Joystick(p) => fmt::Display::fmt(p, f),
            Payload::BotCommand(p) => fmt::Display::fmt(p, f),
            Payload::BotStatus(p) => fmt::Display::fmt(p, f),
            Payload::Display(p) => fmt::Display::fmt(p, f),
            Payload::HereIAm(p) => fmt::Display::fmt(p, f),
        }
    }
}

/// One row of the registration table
struct Entry {
    kind: PayloadType,
    create: fn() -> Payload,
    decode: fn(&[u8]) -> Option<Payload>,
}

fn create_joystick() -> Payload {
    Payload::Joystick(Joystick::empty())
}

fn create_bot_command() -> Payload {
    Payload::BotCommand(BotCommand::empty())
}

fn create_bot_status() -> Payload {
    Payload::BotStatus(BotStatus::empty())
}

fn create_display() -> Payload {
    Payload::Display(Display::empty())
}

fn create_here_i_am() -> Payload {
    Payload::HereIAm(HereIAm::empty())
}

fn decode_joystick(raw: &[u8]) -> Option<Payload> {
    Joystick::from_buffer(raw).map(Payload::Joystick)
}

fn decode_bot_command(raw: &[u8]) -> Option<Payload> {
    BotCommand::from_buffer(raw).map(Payload::BotCommand)
}

fn decode_bot_status(raw: &[u8]) -> Option<Payload> {
    BotStatus::from_buffer(raw).map(Payload::BotStatus)
}

fn decode_display(raw: &[u8]) -> Option<Payload> {
    Display::from_buffer(raw).map(Payload::Display)
}

fn decode_here_i_am(raw: &[u8]) -> Option<Payload> {
    HereIAm::from_buffer(raw).map(Payload::HereIAm)
}

static REGISTRY: [Entry; 5] = [
    Entry {
        kind: PayloadType::HereIAm,
        create: create_here_i_am,
        decode: decode_here_i_am,
    },
    Entry {
        kind: PayloadType::Display,
        create: create_display,
        decode: decode_display,
    },
    Entry {
        kind: PayloadType::BotCommand,
        create: create_bot_command,
        decode: decode_bot_command,
    },
    Entry {
        kind: PayloadType::BotStatus,
        create: create_bot_status,
        decode: decode_bot_status,
    },
    Entry {
        kind: PayloadType::Joystick,
        create: create_joystick,
        decode: decode_joystick,
    },
];

fn entry(tag: u8) -> Option<&'static Entry> {
    REGISTRY.iter().find(|entry| entry.kind.as_u8() == tag)
}

/// Constructs a zero-filled payload for a wire tag
pub fn new_by_type(tag: u8) -> Option<Payload> {
    entry(tag).map(|entry| (entry.create)())
}

/// Decodes a raw buffer by its leading type byte
///
/// Unknown tags and short buffers decode to `None`.
pub fn decode(raw: &[u8]) -> Option<Payload> {
    let tag = *raw.first()?;
    let payload = entry(tag).and_then(|entry| (entry.decode)(raw));
    if payload.is_none() {
        debug!(tag, len = raw.len(), "ignoring undecodable packet");
    }
    payload
}

/// Callback invoked for dispatched payloads
pub type Handler = Box<dyn FnMut(&Payload) -> Result<()> + Send>;

/// Per-variant handler slots plus one handler that sees every payload
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<PayloadType, Handler>,
    any: Option<Handler>,
}

impl Dispatcher {
    /// Creates a dispatcher with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for one variant, replacing any previous one
    pub fn on<F>(&mut self, kind: PayloadType, handler: F)
    where
        F: FnMut(&Payload) -> Result<()> + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Registers the handler that fires for every dispatched payload
    pub fn on_any<F>(&mut self, handler: F)
    where
        F: FnMut(&Payload) -> Result<()> + Send + 'static,
    {
        self.any = Some(Box::new(handler));
    }

    /// Removes the handler for one variant
    pub fn clear(&mut self, kind: PayloadType) {
        self.handlers.remove(&kind);
    }

    /// Decodes a raw buffer and notifies the handlers
    pub fn dispatch(&mut self, raw: &[u8]) -> Option<Payload> {
        let payload = decode(raw)?;
        self.notify(&payload);
        Some(payload)
    }

    /// Runs the variant handler, then the catch-all handler
    ///
    /// A failing or panicking handler is logged and does not stop the other one.
    pub fn notify(&mut self, payload: &Payload) {
        if let Some(handler) = self.handlers.get_mut(&payload.kind()) {
            run_handler(handler, payload, "payload");
        }
        if let Some(handler) = self.any.as_mut() {
            run_handler(handler, payload, "catch-all");
        }
    }
}

fn run_handler(handler: &mut Handler, payload: &Payload, slot: &str) {
    let kind = payload.kind().name();
    match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(kind, "{} handler failed: {}", slot, e),
        Err(_) => error!(kind, "{} handler panicked", slot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_type_tags() {
        assert_eq!(PayloadType::from_u8(10), Some(PayloadType::HereIAm));
        assert_eq!(PayloadType::from_u8(30), Some(PayloadType::Joystick));
        assert_eq!(PayloadType::from_u8(255), None);
        for kind in PayloadType::ALL {
            assert_eq!(PayloadType::from_u8(kind.as_u8()), Some(kind));
        }
    }

    #[test]
    fn test_new_by_type() {
        for kind in PayloadType::ALL {
            let payload = new_by_type(kind.as_u8()).unwrap();
            assert_eq!(payload.kind(), kind);
            assert_eq!(payload.header().packet_type, kind.as_u8());
            assert!(payload.to_bytes()[1..].iter().all(|b| *b == 0));
        }
        assert!(new_by_type(0).is_none());
    }

    #[test]
    fn test_dispatch_matches_variant() {
        for kind in PayloadType::ALL {
            let raw = new_by_type(kind.as_u8()).unwrap().to_bytes();
            let decoded = decode(&raw).unwrap();
            assert_eq!(decoded.kind(), kind);
        }
        let mut unknown = vec![0u8; 28];
        unknown[0] = 255;
        assert!(decode(&unknown).is_none());
        assert!(decode(&[]).is_none());
    }

    #[test]
    fn test_fields_in_wire_order() {
        let mut status = BotStatus::new();
        status.set_buttons(5);
        status.set_accel(-1, 2, -3);
        status.frame_mut().set_origin_id(0xabcd);
        let fields = Payload::BotStatus(status).fields();
        assert_eq!(
            fields,
            vec![
                ("packet_type", 21),
                ("time", 0),
                ("origin", 0xabcd),
                ("buttons", 5),
                ("accel_x", -1),
                ("accel_y", 2),
                ("accel_z", -3),
            ]
        );

        let command = Payload::BotCommand(BotCommand::new()).fields();
        let names: Vec<&str> = command.iter().map(|(name, _)| *name).collect();
        assert_eq!(names[3..5], ["command_type", "motor1"]);
        assert_eq!(names.last(), Some(&"data"));
    }

    #[test]
    fn test_dispatch_rejects_short() {
        let raw = new_by_type(PayloadType::BotCommand.as_u8()).unwrap().to_bytes();
        assert!(decode(&raw[..raw.len() - 1]).is_none());
    }

    #[test]
    fn test_handlers_fire() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();

        let log = Arc::clone(&seen);
        dispatcher.on(PayloadType::Joystick, move |p| {
            log.lock().unwrap().push(format!("joystick:{}", p.kind().name()));
            Ok(())
        });
        let log = Arc::clone(&seen);
        dispatcher.on_any(move |p| {
            log.lock().unwrap().push(format!("any:{}", p.kind().name()));
            Ok(())
        });

        let stick = Joystick::new().to_bytes();
        let status = BotStatus::new().to_bytes();
        assert!(dispatcher.dispatch(&stick).is_some());
        assert!(dispatcher.dispatch(&status).is_some());
        assert!(dispatcher.dispatch(&[99, 1, 2]).is_none());

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["joystick:Joystick", "any:Joystick", "any:BotStatus"]
        );
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let count = Arc::new(Mutex::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.on(PayloadType::Joystick, |_| panic!("joystick handler bug"));
        let counter = Arc::clone(&count);
        dispatcher.on_any(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let stick = Joystick::new().to_bytes();
        assert!(dispatcher.dispatch(&stick).is_some());
        assert!(dispatcher.dispatch(&stick).is_some());
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_failing_handler_is_isolated() {
        let count = Arc::new(Mutex::new(0));
        let mut dispatcher = Dispatcher::new();
        dispatcher.on(PayloadType::BotStatus, |_| Err(Error::protocol("boom")));
        let counter = Arc::clone(&count);
        dispatcher.on_any(move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let status = BotStatus::new().to_bytes();
        dispatcher.dispatch(&status);
        dispatcher.dispatch(&status);
        assert_eq!(*count.lock().unwrap(), 2);
    }
}
