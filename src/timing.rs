//! Delay model.
//!
//! All delays are in seconds. The base delay comes from the speed setting;
//! the character class scales it and a uniform draw adds human variance.

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::charset::classify;

pub const MIN_SPEED: u32 = 1;
pub const MAX_SPEED: u32 = 10;
pub const DEFAULT_SPEED: u32 = 5;

pub const VARIANCE_MIN: f64 = 0.85;
pub const VARIANCE_MAX: f64 = 1.20;

const ESTIMATE_PADDING: f64 = 1.1;

// Seconds per character for speeds 1..=10.
const BASE_DELAYS: [f64; 10] = [
    0.300, 0.250, 0.200, 0.150, 0.120, 0.100, 0.080, 0.060, 0.040, 0.020,
];

pub fn is_valid_speed(speed: u32) -> bool {
    (MIN_SPEED..=MAX_SPEED).contains(&speed)
}

/// Base per-character delay. Out-of-range speeds use the speed-5 value.
pub fn base_delay(speed: u32) -> f64 {
    let speed = if is_valid_speed(speed) {
        speed
    } else {
        DEFAULT_SPEED
    };
    BASE_DELAYS[(speed - MIN_SPEED) as usize]
}

pub fn delay_for(c: char, speed: u32) -> f64 {
    base_delay(speed) * classify(c).delay_factor()
}

pub fn apply_variance(delay: f64) -> f64 {
    apply_variance_with(delay, &mut rand::thread_rng())
}

pub fn apply_variance_with<R: Rng + ?Sized>(delay: f64, rng: &mut R) -> f64 {
    let factor = Uniform::new_inclusive(VARIANCE_MIN, VARIANCE_MAX).sample(rng);
    delay * factor
}

/// Cheap upper-bound estimate of a run, in seconds.
///
/// Deliberately ignores per-character classes: every character is charged the
/// base delay plus a flat 10%.
pub fn estimate_total(text: &str, speed: u32) -> f64 {
    text.chars().count() as f64 * base_delay(speed) * ESTIMATE_PADDING
}

pub fn speed_label(speed: u32) -> String {
    let name = match speed {
        1 => "Very Slow",
        2 => "Slow",
        3 => "Moderate Slow",
        4 => "Below Medium",
        5 => "Medium",
        6 => "Above Medium",
        7 => "Moderate Fast",
        8 => "Fast",
        9 => "Very Fast",
        10 => "Ultra Fast",
        _ => return speed.to_string(),
    };
    format!("{speed} ({name})")
}
