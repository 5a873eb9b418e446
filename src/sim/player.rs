//! Player controller
//!
//! Movement and jumping against the ground contour, rate-limited shooting,
//! and the timers the player owns: shield recharge, buffs, regeneration and
//! the periodic abilities (lightning, gravity well, friction sparks).

use glam::Vec2;
use rand::Rng;

use super::events::{BuffKind, GameEvent, SoundCue, TextStyle};
use super::geometry::Rect;
use super::state::*;
use super::tick::Intents;
use crate::consts::*;
use crate::tuning::SimConfig;
use crate::{direction_to, rotate};

/// A jump is refused while already rising faster than this fraction of jump power
const RISING_JUMP_GUARD: f32 = 0.8;
/// Width of a lightning column
const LIGHTNING_WIDTH: f32 = 40.0;
const GRAVITY_WELL_DURATION: f32 = 1.5;

/// Seconds between shots with every modifier folded in
pub fn effective_fire_interval(player: &Player) -> f32 {
    (player.weapon.fire_interval * player.stats.fire_rate_mult * player.buff_fire_interval_mult()).max(0.01)
}

/// Run the player controller for one tick
pub fn update_player(prev: &GameState, next: &mut GameState, intents: &Intents, cfg: &SimConfig, dt: f32) {
    let before = next.player.pos;

    move_and_jump(next, intents, cfg, dt);

    let travelled = (next.player.pos.x - before.x).abs();
    update_friction(next, travelled);
    update_timers(next, dt);
    update_lightning(prev, next, dt);
    update_gravity_well(prev, next, intents, dt);

    if intents.fire_held {
        try_fire(prev, next, intents);
    }
}

fn move_and_jump(state: &mut GameState, intents: &Intents, cfg: &SimConfig, dt: f32) {
    let p = &mut state.player;
    let axis = if intents.move_axis.is_finite() {
        intents.move_axis.clamp(-1.0, 1.0)
    } else {
        0.0
    };

    p.vel.x = axis * p.stats.speed;
    if axis != 0.0 {
        p.facing = axis.signum();
    }

    if intents.jump_requested && p.jumps_left > 0 && p.vel.y >= -RISING_JUMP_GUARD * p.stats.jump_power {
        p.vel.y = -p.stats.jump_power;
        p.jumps_left -= 1;
        p.grounded = false;
        state.log.sound(SoundCue::Jump);
    }

    p.vel.y = (p.vel.y + cfg.gravity * dt).min(cfg.terminal_velocity);
    p.pos += p.vel * dt;
    p.pos.x = p.pos.x.clamp(0.0, ARENA_WIDTH - p.size.x);

    let size = p.size;
    if state.ground.resolve_landing(&mut p.pos, &mut p.vel, size) {
        p.grounded = true;
        p.jumps_left = p.stats.max_jumps;
    } else {
        p.grounded = false;
    }
    p.jumps_left = p.jumps_left.min(p.stats.max_jumps);
}

/// One spark per `distance_per_charge` travelled on the ground
fn update_friction(state: &mut GameState, travelled: f32) {
    let Some(friction) = state.player.stats.friction else {
        return;
    };
    if !state.player.grounded {
        return;
    }
    state.player.friction_distance += travelled;
    let per_charge = friction.distance_per_charge.max(1.0);
    while state.player.friction_distance >= per_charge {
        state.player.friction_distance -= per_charge;
        let feet = Vec2::new(state.player.center().x, state.player.rect().bottom() - friction.radius / 2.0);
        let id = state.next_entity_id();
        state.effects.push(TemporaryEffect::blast(
            id,
            EffectKind::FrictionSpark,
            feet,
            friction.radius,
            Affects::Enemies,
            friction.damage,
            0.2,
        ));
    }
}

fn update_timers(state: &mut GameState, dt: f32) {
    let p = &mut state.player;

    let regen = p.stats.regen * dt;
    if regen > 0.0 {
        p.stats.heal(regen);
    }

    if let Some(shield) = p.stats.shield.as_mut() {
        if shield.recharge(dt) {
            state.log.event(GameEvent::ShieldRestored);
            state.log.sound(SoundCue::ShieldReady);
        }
    }

    let mut expired = Vec::new();
    p.buffs.retain_mut(|b| {
        b.remaining -= dt;
        if b.remaining <= 0.0 {
            expired.push(b.kind);
            false
        } else {
            true
        }
    });
    for buff in expired {
        state.log.event(GameEvent::BuffExpired { buff });
    }
}

/// Strike up to `strikes_per_cycle` distinct random enemies each cycle
fn update_lightning(prev: &GameState, next: &mut GameState, dt: f32) {
    let Some(mut lightning) = next.player.stats.lightning else {
        return;
    };
    lightning.timer -= dt;
    if lightning.timer <= 0.0 {
        lightning.timer = lightning.cooldown.max(0.1);
        let mut targets: Vec<(EntityId, Vec2, f32)> = prev
            .enemies
            .iter()
            .filter(|e| e.is_targetable())
            .map(|e| (e.id, e.center(), e.rect().bottom()))
            .collect();
        let strikes = (lightning.strikes_per_cycle as usize).min(targets.len());
        for _ in 0..strikes {
            let pick = next.rng.random_range(0..targets.len());
            let (_, center, bottom) = targets.swap_remove(pick);
            let id = next.next_entity_id();
            let column = Rect::new(center.x - LIGHTNING_WIDTH / 2.0, 0.0, LIGHTNING_WIDTH, bottom);
            next.effects.push(TemporaryEffect::new(
                id,
                EffectKind::LightningStrike,
                column,
                Affects::Enemies,
                Some(lightning.damage),
                0.25,
            ));
        }
        if strikes > 0 {
            next.log.sound(SoundCue::Lightning);
        }
    }
    next.player.stats.lightning = Some(lightning);
}

/// Drop a well on the enemy nearest the aim point
fn update_gravity_well(prev: &GameState, next: &mut GameState, intents: &Intents, dt: f32) {
    let Some(mut well) = next.player.stats.gravity_well else {
        return;
    };
    well.timer -= dt;
    if well.timer <= 0.0 {
        let target = prev
            .nearest_targetable(intents.aim, &[])
            .and_then(|id| prev.enemy(id))
            .map(|e| e.center());
        if let Some(center) = target {
            well.timer = well.cooldown.max(0.1);
            let id = next.next_entity_id();
            let mut effect = TemporaryEffect::blast(
                id,
                EffectKind::GravityWell,
                center,
                well.radius,
                Affects::Enemies,
                well.damage,
                GRAVITY_WELL_DURATION,
            );
            effect.pull = well.pull;
            next.effects.push(effect);
        } else {
            // Hold the charge until something shows up
            well.timer = 0.0;
        }
    }
    next.player.stats.gravity_well = Some(well);
}

fn try_fire(prev: &GameState, next: &mut GameState, intents: &Intents) {
    let now = next.now;
    let interval = effective_fire_interval(&next.player) as f64;
    if now - next.player.last_shot_time < interval {
        return;
    }
    next.player.last_shot_time = now;

    let p = &next.player;
    let origin = p.center();
    let dir = direction_to(origin, intents.aim, Vec2::new(p.facing, 0.0));
    let speed = p.weapon.projectile_speed * p.stats.projectile_speed_mult.max(0.1);
    let damage = p.stats.damage * p.weapon.damage_mult * p.buff_damage_mult();
    let count = p.stats.projectile_count.max(1);
    let pierce = p.stats.pierce + p.weapon.pierce_bonus;
    let bounces = p.stats.bounces;
    let kind = p.weapon.projectile;
    let explosion = p.weapon.explosion_radius.map(|radius| Explosion {
        radius,
        damage: damage * 0.5,
    });
    let homing = p.stats.homing;
    let initial_target = homing.and_then(|_| prev.nearest_targetable(intents.aim, &[]));

    if dir.x != 0.0 {
        next.player.facing = dir.x.signum();
    }

    for i in 0..count {
        let offset = (i as f32 - (count - 1) as f32 / 2.0) * MULTISHOT_SPREAD;
        let id = next.next_entity_id();
        let mut shot = Projectile::new(
            id,
            Owner::Player,
            kind,
            origin,
            rotate(dir, offset) * speed,
            PLAYER_SHOT_SIZE,
            damage,
        );
        shot.pierce_left = pierce;
        shot.bounces_left = bounces;
        shot.explosion = explosion;
        if let Some(h) = homing {
            shot.turn_rate = h.strength;
            shot.homing = initial_target.map(HomingTarget::Enemy);
        }
        next.projectiles.push(shot);
    }
    next.log.sound(SoundCue::Shoot);
}

/// Apply a timed haste buff (fire interval multiplier)
pub fn grant_haste(state: &mut GameState, duration: f32, factor: f32) {
    let pos = state.player.center();
    state.player.add_buff(BuffKind::Haste, duration, 1, factor.clamp(0.1, 1.0));
    state.log.text(pos, "HASTE", TextStyle::Info);
}
