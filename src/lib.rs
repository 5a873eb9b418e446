//! Survivor Arena - deterministic simulation core for a wave survival game
//!
//! Core modules:
//! - `sim`: Per-tick simulation (player, projectiles, enemy AI, damage, waves, upgrades)
//! - `engine`: Host-facing facade (start run, tick, upgrade choice, wave advance)
//! - `tuning`: Data-driven game balance and static tables
//! - `error`: Configuration errors and rejected host actions

pub mod engine;
pub mod error;
pub mod sim;
pub mod tuning;

pub use engine::Engine;
pub use error::{ConfigError, Rejected};
pub use tuning::SimConfig;

use glam::Vec2;

/// Simulation constants that are not part of the tunable configuration
pub mod consts {
    /// Nominal tick rate the per-tick blend factors are calibrated against
    pub const NOMINAL_TICK_RATE: f32 = 60.0;

    /// Arena dimensions (world units, y grows downward)
    pub const ARENA_WIDTH: f32 = 1600.0;
    pub const ARENA_HEIGHT: f32 = 900.0;
    /// Projectiles further than this outside the arena are discarded
    pub const ARENA_MARGIN: f32 = 120.0;

    /// Player hitbox
    pub const PLAYER_WIDTH: f32 = 28.0;
    pub const PLAYER_HEIGHT: f32 = 44.0;

    /// Projectile hitboxes
    pub const PLAYER_SHOT_SIZE: f32 = 10.0;
    pub const ENEMY_SHOT_SIZE: f32 = 12.0;
    pub const BOMB_SIZE: f32 = 16.0;
    pub const SHRAPNEL_SIZE: f32 = 6.0;

    /// Projectile lifetimes in seconds
    pub const PLAYER_SHOT_TTL: f32 = 2.5;
    pub const ENEMY_SHOT_TTL: f32 = 6.0;

    /// Spread between multishot projectiles (radians)
    pub const MULTISHOT_SPREAD: f32 = 0.12;

    /// Pickups
    pub const PICKUP_SIZE: f32 = 14.0;
    pub const PICKUP_TTL: f32 = 12.0;
    pub const HEALING_ORB_AMOUNT: f32 = 15.0;
    pub const FRAGMENT_DAMAGE_PER_STACK: f32 = 0.05;
    pub const FRAGMENT_MAX_STACKS: u32 = 10;
    pub const FRAGMENT_DURATION: f32 = 10.0;

    /// Fraction of max HP restored when a wave is cleared
    pub const WAVE_CLEAR_HEAL_FRACTION: f32 = 0.25;

    /// Defense can never fully negate a hit
    pub const MAX_DEFENSE: f32 = 0.8;
    pub const MAX_DODGE: f32 = 0.6;
}

/// Frame-rate independent blend factor for a per-nominal-tick blend `k`
#[inline]
pub fn blend_factor(k: f32, dt: f32) -> f32 {
    let k = k.clamp(0.0, 1.0);
    1.0 - (1.0 - k).powf(dt * consts::NOMINAL_TICK_RATE)
}

/// Unit direction from `from` to `to`, or `fallback` when the points coincide
#[inline]
pub fn direction_to(from: Vec2, to: Vec2, fallback: Vec2) -> Vec2 {
    let d = to - from;
    if d.length_squared() < 1e-6 {
        fallback
    } else {
        d.normalize()
    }
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}
