//! Pickups: healing orbs and entropic fragments
//!
//! Dropped by kills, fall onto the ground contour, collected on overlap,
//! gone after `PICKUP_TTL` seconds.

use glam::Vec2;
use rand::Rng;

use super::events::{BuffKind, GameEvent, SoundCue, TextStyle};
use super::geometry::intersects;
use super::state::*;
use crate::consts::*;
use crate::tuning::SimConfig;

/// Share of drops that are healing orbs (the rest are fragments)
const HEALING_ORB_SHARE: f32 = 0.7;

/// Drop chance after luck
pub fn drop_chance(base: f32, luck: f32) -> f32 {
    (base * (1.0 + luck.max(0.0) * 0.5)).clamp(0.0, 1.0)
}

/// Roll for a drop at `center`, pushing a pickup on success
pub fn roll_drop(state: &mut GameState, center: Vec2) {
    let chance = drop_chance(state.player.stats.pickup_chance, state.player.stats.luck);
    if !state.rng.random_bool(chance as f64) {
        return;
    }
    let kind = if state.rng.random::<f32>() < HEALING_ORB_SHARE {
        PickupKind::HealingOrb {
            amount: HEALING_ORB_AMOUNT,
        }
    } else {
        PickupKind::EntropicFragment { stacks: 1 }
    };
    let id = state.next_entity_id();
    state.pickups.push(Pickup {
        id,
        kind,
        pos: center - Vec2::splat(PICKUP_SIZE / 2.0),
        vel: Vec2::new(0.0, -120.0),
        ttl: PICKUP_TTL,
        grounded: false,
    });
}

/// Fall, expire and collect
pub fn update_pickups(state: &mut GameState, cfg: &SimConfig, dt: f32) {
    let player_rect = state.player.rect();
    let mut collected = Vec::new();

    let ground = &state.ground;
    state.pickups.retain_mut(|p| {
        p.ttl -= dt;
        if p.ttl <= 0.0 {
            return false;
        }
        if !p.grounded {
            p.vel.y = (p.vel.y + cfg.gravity * dt).min(cfg.terminal_velocity);
            p.pos += p.vel * dt;
            p.grounded = ground.resolve_landing(&mut p.pos, &mut p.vel, Vec2::splat(PICKUP_SIZE));
        }
        if intersects(p.rect(), player_rect) {
            collected.push(p.kind);
            return false;
        }
        true
    });

    for kind in collected {
        let pos = state.player.center();
        match kind {
            PickupKind::HealingOrb { amount } => {
                let healed = state.player.stats.heal(amount);
                state.log.text(pos, format!("+{healed:.0}"), TextStyle::Heal);
                state.log.sound(SoundCue::Heal);
                state.log.event(GameEvent::PickupCollected {
                    heal: healed,
                    fragments: 0,
                });
            }
            PickupKind::EntropicFragment { stacks } => {
                state.player.add_buff(BuffKind::Fragment, FRAGMENT_DURATION, stacks, 1.0);
                state.log.text(pos, "FRAGMENT", TextStyle::Info);
                state.log.sound(SoundCue::Pickup);
                state.log.event(GameEvent::PickupCollected {
                    heal: 0.0,
                    fragments: stacks,
                });
            }
        }
    }
}
