use std::fmt;

use bytes::Bytes;

use super::buffer::NumberFormat;
use super::header::{Frame, PacketHeader, HEADER_SIZE};
use super::registry::PayloadType;

/// Common behaviour of every fixed-layout payload
pub trait TypedPayload: Sized {
    /// Wire tag of the variant
    const KIND: PayloadType;
    /// Bytes following the header
    const PAYLOAD_LEN: usize;
    /// Header plus payload
    const PACKET_SIZE: usize = HEADER_SIZE + Self::PAYLOAD_LEN;

    /// Wraps an already validated frame
    fn from_frame(frame: Frame) -> Self;

    fn frame(&self) -> &Frame;

    fn frame_mut(&mut self) -> &mut Frame;

    /// Fresh zero-filled payload with the type byte set
    fn empty() -> Self {
        Self::from_frame(Frame::new(Self::KIND.as_u8(), Self::PAYLOAD_LEN))
    }

    /// Adopts a received buffer; `None` when it is too short or carries another type
    fn from_buffer(raw: &[u8]) -> Option<Self> {
        Frame::adopt(raw, Self::KIND.as_u8(), Self::PAYLOAD_LEN).map(Self::from_frame)
    }

    /// Wire bytes, exactly `PACKET_SIZE` long
    fn to_bytes(&self) -> Bytes {
        self.frame().to_bytes()
    }

    fn header(&self) -> PacketHeader {
        self.frame().header()
    }

    fn origin_id(&self) -> u32 {
        self.frame().origin_id()
    }

    fn timestamp(&self) -> u32 {
        self.frame().timestamp()
    }

    /// Signal strength reported by the transport on receive
    fn signal(&self) -> i32 {
        self.frame().signal()
    }
}

fn write_header(f: &mut fmt::Formatter<'_>, name: &str, frame: &Frame) -> fmt::Result {
    write!(
        f,
        "{}(type={}, time={}, origin={:08x}",
        name,
        frame.packet_type(),
        frame.timestamp(),
        frame.origin_id()
    )
}

const ACCEL_LIMIT: i16 = 1023;
const STICK_MAX: u16 = 1023;

/// Analog stick, buttons and accelerometer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joystick {
    frame: Frame,
}

impl Joystick {
    const X: usize = 0;
    const Y: usize = 2;
    const BUTTONS: usize = 4;
    const ACCEL: usize = 5;

    /// Number of button bits carried
    pub const BUTTON_COUNT: u32 = 7;

    pub fn new() -> Self {
        Self::empty()
    }

    pub fn x(&self) -> u16 {
        self.frame.get_u16(Self::X)
    }

    /// Sets the horizontal position, clamped to 0..=1023
    pub fn set_x(&mut self, x: u16) {
        self.frame.set_u16(Self::X, x.min(STICK_MAX));
    }

    pub fn y(&self) -> u16 {
        self.frame.get_u16(Self::Y)
    }

    /// Sets the vertical position, clamped to 0..=1023
    pub fn set_y(&mut self, y: u16) {
        self.frame.set_u16(Self::Y, y.min(STICK_MAX));
    }

    pub fn buttons(&self) -> u8 {
        self.frame.get_u8(Self::BUTTONS)
    }

    /// Sets all seven button bits at once
    pub fn set_buttons(&mut self, buttons: u8) {
        self.frame.set_u8(Self::BUTTONS, buttons & 0x7F);
    }

    /// Whether button `index` (0..7) is held
    pub fn button_pressed(&self, index: u32) -> bool {
        index < Self::BUTTON_COUNT
            && self.frame.get_bit(Self::BUTTONS, NumberFormat::UInt8LE, index) == 1
    }

    pub fn set_button(&mut self, index: u32, pressed: bool) {
        if index < Self::BUTTON_COUNT {
            self.frame
                .set_bit(Self::BUTTONS, NumberFormat::UInt8LE, index, pressed);
        }
    }

    /// Accelerometer reading as (x, y, z)
    pub fn accel(&self) -> (i16, i16, i16) {
        (
            self.frame.get_i16(Self::ACCEL),
            self.frame.get_i16(Self::ACCEL + 2),
            self.frame.get_i16(Self::ACCEL + 4),
        )
    }

    /// Stores an accelerometer reading, each axis clamped to -1023..=1023
    pub fn set_accel(&mut self, x: i16, y: i16, z: i16) {
        for (slot, value) in [x, y, z].into_iter().enumerate() {
            self.frame.set_i16(
                Self::ACCEL + slot * 2,
                value.clamp(-ACCEL_LIMIT, ACCEL_LIMIT),
            );
        }
    }
}

impl Default for Joystick {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedPayload for Joystick {
    const KIND: PayloadType = PayloadType::Joystick;
    const PAYLOAD_LEN: usize = 11;

    fn from_frame(frame: Frame) -> Self {
        Joystick { frame }
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

impl fmt::Display for Joystick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ax, ay, az) = self.accel();
        write_header(f, "Joystick", &self.frame)?;
        write!(
            f,
            ", x={}, y={}, buttons=0x{:02x}, accel_x={}, accel_y={}, accel_z={})",
            self.x(),
            self.y(),
            self.buttons(),
            ax,
            ay,
            az
        )
    }
}

/// Motor and servo actuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    frame: Frame,
}

impl BotCommand {
    const COMMAND_TYPE: usize = 0;
    const MOTORS: usize = 1;
    const DURATION: usize = 9;
    const SERVOS: usize = 11;
    const DATA: usize = 15;

    pub const MOTOR_COUNT: usize = 4;
    pub const SERVO_COUNT: usize = 2;

    pub fn new() -> Self {
        Self::empty()
    }

    pub fn command_type(&self) -> u8 {
        self.frame.get_u8(Self::COMMAND_TYPE)
    }

    pub fn set_command_type(&mut self, command_type: u8) {
        self.frame.set_u8(Self::COMMAND_TYPE, command_type);
    }

    /// Speed of motor `index` (0..4); unknown motors read as 0
    pub fn motor(&self, index: usize) -> i16 {
        if index < Self::MOTOR_COUNT {
            self.frame.get_i16(Self::MOTORS + index * 2)
        } else {
            0
        }
    }

    pub fn set_motor(&mut self, index: usize, speed: i16) {
        if index < Self::MOTOR_COUNT {
            self.frame.set_i16(Self::MOTORS + index * 2, speed);
        }
    }

    pub fn duration(&self) -> i16 {
        self.frame.get_i16(Self::DURATION)
    }

    pub fn set_duration(&mut self, duration: i16) {
        self.frame.set_i16(Self::DURATION, duration);
    }

    /// Position of servo `index` (0..2); unknown servos read as 0
    pub fn servo(&self, index: usize) -> i16 {
        if index < Self::SERVO_COUNT {
            self.frame.get_i16(Self::SERVOS + index * 2)
        } else {
            0
        }
    }

    pub fn set_servo(&mut self, index: usize, position: i16) {
        if index < Self::SERVO_COUNT {
            self.frame.set_i16(Self::SERVOS + index * 2, position);
        }
    }

    /// Auxiliary 32-bit data word
    pub fn data(&self) -> i32 {
        self.frame.get_i32(Self::DATA)
    }

    pub fn set_data(&mut self, data: i32) {
        self.frame.set_i32(Self::DATA, data);
    }
}

impl Default for BotCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedPayload for BotCommand {
    const KIND: PayloadType = PayloadType::BotCommand;
    const PAYLOAD_LEN: usize = 19;

    fn from_frame(frame: Frame) -> Self {
        BotCommand { frame }
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(f, "BotCommand", &self.frame)?;
        write!(f, ", command_type={}", self.command_type())?;
        for index in 0..Self::MOTOR_COUNT {
            write!(f, ", motor{}={}", index + 1, self.motor(index))?;
        }
        write!(
            f,
            ", duration={}, servo1={}, servo2={}, data={})",
            self.duration(),
            self.servo(0),
            self.servo(1),
            self.data()
        )
    }
}

/// Telemetry echoed back by a bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotStatus {
    frame: Frame,
}

impl BotStatus {
    const BUTTONS: usize = 0;
    const ACCEL: usize = 1;

    pub fn new() -> Self {
        Self::empty()
    }

    pub fn buttons(&self) -> u8 {
        self.frame.get_u8(Self::BUTTONS)
    }

    pub fn set_buttons(&mut self, buttons: u8) {
        self.frame.set_u8(Self::BUTTONS, buttons);
    }

    pub fn accel(&self) -> (i16, i16, i16) {
        (
            self.frame.get_i16(Self::ACCEL),
            self.frame.get_i16(Self::ACCEL + 2),
            self.frame.get_i16(Self::ACCEL + 4),
        )
    }

    pub fn set_accel(&mut self, x: i16, y: i16, z: i16) {
        self.frame.set_i16(Self::ACCEL, x);
        self.frame.set_i16(Self::ACCEL + 2, y);
        self.frame.set_i16(Self::ACCEL + 4, z);
    }
}

impl Default for BotStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedPayload for BotStatus {
    const KIND: PayloadType = PayloadType::BotStatus;
    const PAYLOAD_LEN: usize = 7;

    fn from_frame(frame: Frame) -> Self {
        BotStatus { frame }
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ax, ay, az) = self.accel();
        write_header(f, "BotStatus", &self.frame)?;
        write!(
            f,
            ", buttons=0x{:02x}, accel_x={}, accel_y={}, accel_z={})",
            self.buttons(),
            ax,
            ay,
            az
        )
    }
}

/// Color slots carried by a [`Display`] payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lamp {
    HeadLeft,
    HeadRight,
    NeoLeft,
    NeoRight,
}

impl Lamp {
    pub const ALL: [Lamp; 4] = [Lamp::HeadLeft, Lamp::HeadRight, Lamp::NeoLeft, Lamp::NeoRight];

    fn offset(self) -> usize {
        match self {
            Lamp::HeadLeft => 6,
            Lamp::HeadRight => 9,
            Lamp::NeoLeft => 12,
            Lamp::NeoRight => 15,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lamp::HeadLeft => "head_lamp_left",
            Lamp::HeadRight => "head_lamp_right",
            Lamp::NeoLeft => "neo_left",
            Lamp::NeoRight => "neo_right",
        }
    }
}

/// Tone, 5x5 image and lamp colors for visual/audio feedback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    frame: Frame,
}

impl Display {
    const TONE: usize = 0;
    const DURATION: usize = 1;
    const IMAGE: usize = 2;

    /// Image bits in use (5x5 pixels)
    pub const IMAGE_MASK: u32 = 0x01FF_FFFF;

    pub fn new() -> Self {
        Self::empty()
    }

    /// Packed tone: `octave << 4 | note`
    pub fn tone(&self) -> u8 {
        self.frame.get_u8(Self::TONE)
    }

    pub fn set_tone(&mut self, tone: u8) {
        self.frame.set_u8(Self::TONE, tone);
    }

    pub fn octave(&self) -> u8 {
        self.tone() >> 4
    }

    pub fn note(&self) -> u8 {
        self.tone() & 0x0F
    }

    /// Packs an octave and note into the tone byte
    pub fn set_note(&mut self, octave: u8, note: u8) {
        self.set_tone(((octave & 0x0F) << 4) | (note & 0x0F));
    }

    pub fn duration(&self) -> u8 {
        self.frame.get_u8(Self::DURATION)
    }

    pub fn set_duration(&mut self, duration: u8) {
        self.frame.set_u8(Self::DURATION, duration);
    }

    /// 25-bit bitmap, pixel (x, y) at bit `y * 5 + x`
    pub fn image(&self) -> u32 {
        self.frame.get_u32(Self::IMAGE)
    }

    pub fn set_image(&mut self, image: u32) {
        self.frame.set_u32(Self::IMAGE, image & Self::IMAGE_MASK);
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        x < 5 && y < 5 && self.frame.get_bit(Self::IMAGE, NumberFormat::UInt32LE, y * 5 + x) == 1
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        if x < 5 && y < 5 {
            self.frame
                .set_bit(Self::IMAGE, NumberFormat::UInt32LE, y * 5 + x, on);
        }
    }

    /// Lamp color as `0xRRGGBB`
    pub fn color(&self, lamp: Lamp) -> u32 {
        let offset = lamp.offset();
        (u32::from(self.frame.get_u8(offset)) << 16)
            | (u32::from(self.frame.get_u8(offset + 1)) << 8)
            | u32::from(self.frame.get_u8(offset + 2))
    }

    /// Stores a `0xRRGGBB` color; the top byte is ignored
    pub fn set_color(&mut self, lamp: Lamp, rgb: u32) {
        let offset = lamp.offset();
        self.frame.set_u8(offset, (rgb >> 16) as u8);
        self.frame.set_u8(offset + 1, (rgb >> 8) as u8);
        self.frame.set_u8(offset + 2, rgb as u8);
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedPayload for Display {
    const KIND: PayloadType = PayloadType::Display;
    const PAYLOAD_LEN: usize = 18;

    fn from_frame(frame: Frame) -> Self {
        Display { frame }
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(f, "Display", &self.frame)?;
        write!(
            f,
            ", tone={}, duration={}, image=0x{:07x}",
            self.tone(),
            self.duration(),
            self.image()
        )?;
        for lamp in Lamp::ALL {
            write!(f, ", {}=0x{:06x}", lamp.name(), self.color(lamp))?;
        }
        write!(f, ")")
    }
}

/// Negotiation beacon announcing a node's class and tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HereIAm {
    frame: Frame,
}

impl HereIAm {
    const CLASS_ID: usize = 0;
    const GROUP: usize = 1;
    const CHANNEL: usize = 3;
    const FLAGS: usize = 5;
    const IMAGE: usize = 7;

    pub fn new() -> Self {
        Self::empty()
    }

    /// Device category
    pub fn class_id(&self) -> u8 {
        self.frame.get_u8(Self::CLASS_ID)
    }

    pub fn set_class_id(&mut self, class_id: u8) {
        self.frame.set_u8(Self::CLASS_ID, class_id);
    }

    pub fn group(&self) -> u16 {
        self.frame.get_u16(Self::GROUP)
    }

    pub fn set_group(&mut self, group: u16) {
        self.frame.set_u16(Self::GROUP, group);
    }

    pub fn channel(&self) -> u16 {
        self.frame.get_u16(Self::CHANNEL)
    }

    pub fn set_channel(&mut self, channel: u16) {
        self.frame.set_u16(Self::CHANNEL, channel);
    }

    pub fn flags(&self) -> u16 {
        self.frame.get_u16(Self::FLAGS)
    }

    pub fn set_flags(&mut self, flags: u16) {
        self.frame.set_u16(Self::FLAGS, flags);
    }

    /// Icon the node shows for itself
    pub fn image(&self) -> u32 {
        self.frame.get_u32(Self::IMAGE)
    }

    pub fn set_image(&mut self, image: u32) {
        self.frame.set_u32(Self::IMAGE, image);
    }
}

impl Default for HereIAm {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedPayload for HereIAm {
    const KIND: PayloadType = PayloadType::HereIAm;
    const PAYLOAD_LEN: usize = 11;

    fn from_frame(frame: Frame) -> Self {
        HereIAm { frame }
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

impl fmt::Display for HereIAm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(f, "HereIAm", &self.frame)?;
        write!(
            f,
            ", class_id={}, group={}, channel={}, flags=0x{:04x}, image=0x{:08x})",
            self.class_id(),
            self.group(),
            self.channel(),
            self.flags(),
            self.image()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::MAX_PACKET_SIZE;

    fn stamped<P: TypedPayload>(mut payload: P) -> P {
        payload.frame_mut().set_timestamp(123_456);
        payload.frame_mut().set_origin_id(0xCAFE_F00D);
        payload
    }

    #[test]
    fn test_packet_sizes() {
        assert_eq!(Joystick::PACKET_SIZE, 20);
        assert_eq!(BotCommand::PACKET_SIZE, 28);
        assert_eq!(BotStatus::PACKET_SIZE, 16);
        assert_eq!(Display::PACKET_SIZE, 27);
        assert_eq!(HereIAm::PACKET_SIZE, 20);
        for size in [
            Joystick::PACKET_SIZE,
            BotCommand::PACKET_SIZE,
            BotStatus::PACKET_SIZE,
            Display::PACKET_SIZE,
            HereIAm::PACKET_SIZE,
        ] {
            assert!(size <= MAX_PACKET_SIZE);
        }
    }

    #[test]
    fn test_joystick_round_trip() {
        let mut stick = Joystick::new();
        stick.set_x(1023);
        stick.set_y(0);
        stick.set_buttons(0x7F);
        stick.set_accel(-1023, 17, 1023);
        let stick = stamped(stick);

        let decoded = Joystick::from_buffer(&stick.to_bytes()).unwrap();
        assert_eq!(decoded.x(), 1023);
        assert_eq!(decoded.y(), 0);
        assert_eq!(decoded.buttons(), 0x7F);
        assert_eq!(decoded.accel(), (-1023, 17, 1023));
        assert_eq!(decoded.timestamp(), 123_456);
        assert_eq!(decoded.origin_id(), 0xCAFE_F00D);
    }

    #[test]
    fn test_joystick_clamps_and_buttons() {
        let mut stick = Joystick::new();
        stick.set_x(5000);
        stick.set_accel(i16::MIN, i16::MAX, 0);
        assert_eq!(stick.x(), 1023);
        assert_eq!(stick.accel(), (-1023, 1023, 0));

        stick.set_button(2, true);
        stick.set_button(6, true);
        stick.set_button(7, true);
        assert_eq!(stick.buttons(), 0b0100_0100);
        assert!(stick.button_pressed(2));
        assert!(!stick.button_pressed(3));
        assert!(!stick.button_pressed(7));
    }

    #[test]
    fn test_bot_command_round_trip() {
        let mut cmd = BotCommand::new();
        cmd.set_command_type(3);
        cmd.set_motor(0, i16::MIN);
        cmd.set_motor(1, -1);
        cmd.set_motor(2, 512);
        cmd.set_motor(3, i16::MAX);
        cmd.set_duration(1500);
        cmd.set_servo(0, 90);
        cmd.set_servo(1, -90);
        cmd.set_data(-123_456_789);
        let cmd = stamped(cmd);

        let decoded = BotCommand::from_buffer(&cmd.to_bytes()).unwrap();
        assert_eq!(decoded.command_type(), 3);
        assert_eq!(
            (0..4).map(|i| decoded.motor(i)).collect::<Vec<_>>(),
            vec![i16::MIN, -1, 512, i16::MAX]
        );
        assert_eq!(decoded.duration(), 1500);
        assert_eq!((decoded.servo(0), decoded.servo(1)), (90, -90));
        assert_eq!(decoded.data(), -123_456_789);
        assert_eq!(decoded.motor(4), 0);
    }

    #[test]
    fn test_bot_status_round_trip() {
        let mut status = BotStatus::new();
        status.set_buttons(0xA5);
        status.set_accel(-300, 0, 300);
        let decoded = BotStatus::from_buffer(&status.to_bytes()).unwrap();
        assert_eq!(decoded.buttons(), 0xA5);
        assert_eq!(decoded.accel(), (-300, 0, 300));
    }

    #[test]
    fn test_display_round_trip() {
        let mut display = Display::new();
        display.set_note(4, 9);
        display.set_duration(250);
        display.set_image(0x01F8_C63F);
        display.set_color(Lamp::HeadLeft, 0xFF0000);
        display.set_color(Lamp::HeadRight, 0x00FF00);
        display.set_color(Lamp::NeoLeft, 0x0000FF);
        display.set_color(Lamp::NeoRight, 0x123456);
        let display = stamped(display);

        let decoded = Display::from_buffer(&display.to_bytes()).unwrap();
        assert_eq!(decoded.tone(), 0x49);
        assert_eq!((decoded.octave(), decoded.note()), (4, 9));
        assert_eq!(decoded.duration(), 250);
        assert_eq!(decoded.image(), 0x01F8_C63F);
        assert_eq!(decoded.color(Lamp::HeadLeft), 0xFF0000);
        assert_eq!(decoded.color(Lamp::HeadRight), 0x00FF00);
        assert_eq!(decoded.color(Lamp::NeoLeft), 0x0000FF);
        assert_eq!(decoded.color(Lamp::NeoRight), 0x123456);
    }

    #[test]
    fn test_display_pixels() {
        let mut display = Display::new();
        display.set_image(u32::MAX);
        assert_eq!(display.image(), Display::IMAGE_MASK);

        display.set_image(0);
        display.set_pixel(4, 4, true);
        display.set_pixel(1, 0, true);
        display.set_pixel(5, 0, true);
        assert_eq!(display.image(), (1 << 24) | (1 << 1));
        assert!(display.pixel(4, 4));
        assert!(!display.pixel(0, 0));
        assert!(!display.pixel(5, 0));
    }

    #[test]
    fn test_here_i_am_round_trip() {
        let mut beacon = HereIAm::new();
        beacon.set_class_id(7);
        beacon.set_group(200);
        beacon.set_channel(42);
        beacon.set_flags(0x8001);
        beacon.set_image(0xDEAD_BEEF);
        let beacon = stamped(beacon);

        let decoded = HereIAm::from_buffer(&beacon.to_bytes()).unwrap();
        assert_eq!(decoded.class_id(), 7);
        assert_eq!(decoded.group(), 200);
        assert_eq!(decoded.channel(), 42);
        assert_eq!(decoded.flags(), 0x8001);
        assert_eq!(decoded.image(), 0xDEAD_BEEF);
        assert_eq!(decoded, beacon);
    }

    #[test]
    fn test_short_buffers_rejected() {
        let joystick = Joystick::new().to_bytes();
        let command = BotCommand::new().to_bytes();
        let status = BotStatus::new().to_bytes();
        let display = Display::new().to_bytes();
        let beacon = HereIAm::new().to_bytes();

        assert!(Joystick::from_buffer(&joystick[..joystick.len() - 1]).is_none());
        assert!(BotCommand::from_buffer(&command[..command.len() - 1]).is_none());
        assert!(BotStatus::from_buffer(&status[..status.len() - 1]).is_none());
        assert!(Display::from_buffer(&display[..display.len() - 1]).is_none());
        assert!(HereIAm::from_buffer(&beacon[..beacon.len() - 1]).is_none());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let status = BotStatus::new().to_bytes();
        let mut padded = status.to_vec();
        padded.resize(32, 0);
        assert!(Joystick::from_buffer(&padded).is_none());
    }

    #[test]
    fn test_display_format() {
        let mut status = BotStatus::new();
        status.set_buttons(1);
        status.set_accel(1, 2, 3);
        assert_eq!(
            status.to_string(),
            "BotStatus(type=21, time=0, origin=00000000, buttons=0x01, accel_x=1, accel_y=2, accel_z=3)"
        );
    }
}
