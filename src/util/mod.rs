//! Utility module
//!
//! This module provides the identifier scrambler used for channel candidates
//! and random structured payloads used for traffic generation.

use rand::Rng;

use crate::protocol::{
    BotCommand, BotStatus, Display, HereIAm, Joystick, Lamp, Payload, PayloadType,
};

/// MurmurHash3 32-bit finalizer
pub fn scramble(value: u32) -> u32 {
    let mut h = value;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Picks a payload variant uniformly
pub fn random_kind<R: Rng + ?Sized>(rng: &mut R) -> PayloadType {
    PayloadType::ALL[rng.gen_range(0..PayloadType::ALL.len())]
}

/// Builds a payload of the given variant with every field randomized
///
/// Header fields are left zero; senders stamp them on transmit.
pub fn random_payload<R: Rng + ?Sized>(kind: PayloadType, rng: &mut R) -> Payload {
    match kind {
        PayloadType::Joystick => {
            let mut p = Joystick::new();
            p.set_x(rng.gen_range(0..=1023));
            p.set_y(rng.gen_range(0..=1023));
            p.set_buttons(rng.gen::<u8>() & 0x7F);
            p.set_accel(
                rng.gen_range(-1023..=1023),
                rng.gen_range(-1023..=1023),
                rng.gen_range(-1023..=1023),
            );
            Payload::Joystick(p)
        }
        PayloadType::BotCommand => {
            let mut p = BotCommand::new();
            p.set_command_type(rng.gen());
            for i in 0..BotCommand::MOTOR_COUNT {
                p.set_motor(i, rng.gen());
            }
            p.set_duration(rng.gen());
            for i in 0..BotCommand::SERVO_COUNT {
                p.set_servo(i, rng.gen());
            }
            p.set_data(rng.gen());
            Payload::BotCommand(p)
        }
        PayloadType::BotStatus => {
            let mut p = BotStatus::new();
            p.set_buttons(rng.gen());
            p.set_accel(rng.gen(), rng.gen(), rng.gen());
            Payload::BotStatus(p)
        }
        PayloadType::Display => {
            let mut p = Display::new();
            p.set_tone(rng.gen());
            p.set_duration(rng.gen());
            p.set_image(rng.gen());
            for lamp in Lamp::ALL {
                p.set_color(lamp, rng.gen_range(0..=0x00FF_FFFF));
            }
            Payload::Display(p)
        }
        PayloadType::HereIAm => {
            let mut p = HereIAm::new();
            p.set_class_id(rng.gen());
            p.set_group(rng.gen());
            p.set_channel(rng.gen());
            p.set_flags(rng.gen());
            p.set_image(rng.gen());
            Payload::HereIAm(p)
        }
    }
}
