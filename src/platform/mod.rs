//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Wall clock time
//! - RNG seeding

/// Milliseconds since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Milliseconds since the Unix epoch
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Seed for the board RNG when the host doesn't supply one
pub fn time_seed() -> u64 {
    // Mix the sub-millisecond bits in so quick restarts differ
    let ms = now_ms();
    (ms as u64) ^ ((ms.fract() * 1e6) as u64).rotate_left(32)
}
