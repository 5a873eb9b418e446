//! Projectile motion
//!
//! Motion only: homing steering, gravity, integration, lifetime and bounds.
//! Hits, pierce and bounces are resolved in `damage`.

use glam::Vec2;

use super::events::SoundCue;
use super::state::*;
use crate::consts::*;
use crate::tuning::SimConfig;
use crate::{blend_factor, direction_to};

/// Steering blend for caster orbs
pub const CASTER_TURN_RATE: f32 = 0.05;
/// Boss orbs turn slower than anything else
pub const BOSS_TURN_RATE: f32 = 0.03;
/// Bombs fall slower than bodies
const BOMB_GRAVITY_SCALE: f32 = 0.6;

/// Blend `vel` toward `desired_dir` keeping its speed.
///
/// `turn_rate` is the blend per nominal tick; the effective factor is
/// corrected for `dt` so turning speed does not depend on the tick rate.
pub fn steer(vel: Vec2, desired_dir: Vec2, turn_rate: f32, dt: f32) -> Vec2 {
    let speed = vel.length();
    if speed <= f32::EPSILON {
        return vel;
    }
    let k = blend_factor(turn_rate, dt);
    let blended = vel * (1.0 - k) + desired_dir * speed * k;
    match blended.try_normalize() {
        Some(dir) => dir * speed,
        None => vel,
    }
}

/// Point the projectile is homing on. Stale enemy ids (gone, dying,
/// untargetable, a boss whose fight has not started) are cleared.
fn homing_point(prev: &GameState, p: &mut Projectile) -> Option<Vec2> {
    match p.homing {
        Some(HomingTarget::Enemy(id)) => match prev.enemy(id) {
            Some(e) if e.is_targetable() => Some(e.center()),
            _ => {
                p.homing = None;
                None
            }
        },
        Some(HomingTarget::Player) => Some(prev.player.center()),
        None => None,
    }
}

#[inline]
fn out_of_bounds(p: &Projectile) -> bool {
    let c = p.center();
    c.x < -ARENA_MARGIN
        || c.x > ARENA_WIDTH + ARENA_MARGIN
        || c.y < -ARENA_MARGIN * 3.0
        || c.y > ARENA_HEIGHT + ARENA_MARGIN
}

/// Advance every projectile by `dt`
pub fn update_projectiles(prev: &GameState, next: &mut GameState, cfg: &SimConfig, dt: f32) {
    let mut projectiles = std::mem::take(&mut next.projectiles);

    projectiles.retain_mut(|p| {
        p.ttl -= dt;
        if p.ttl <= 0.0 {
            return false;
        }

        if p.turn_rate > 0.0 {
            // Player shots whose target vanished look for a new one
            if p.homing.is_none() && p.owner == Owner::Player {
                p.homing = prev
                    .nearest_targetable(p.center(), &p.hit_ids)
                    .map(HomingTarget::Enemy);
            }
            if let Some(target) = homing_point(prev, p) {
                let dir = direction_to(p.center(), target, p.vel.normalize_or_zero());
                p.vel = steer(p.vel, dir, p.turn_rate, dt);
            }
        }

        if p.gravity {
            p.vel.y = (p.vel.y + cfg.gravity * BOMB_GRAVITY_SCALE * dt).min(cfg.terminal_velocity);
        }

        p.pos += p.vel * dt;

        if p.gravity {
            let c = p.center();
            if p.rect().bottom() >= next.ground.height_at(c.x) {
                if let Some(ex) = p.explosion {
                    let affects = match p.owner {
                        Owner::Player => Affects::Enemies,
                        Owner::Enemy => Affects::Player,
                    };
                    let id = next.next_entity_id();
                    let mut blast =
                        TemporaryEffect::blast(id, EffectKind::Explosion, c, ex.radius, affects, ex.damage, 0.25);
                    blast.chain_depth = p.chain_depth;
                    next.effects.push(blast);
                    next.log.sound(SoundCue::Explosion);
                }
                return false;
            }
        }

        !out_of_bounds(p)
    });

    next.projectiles = projectiles;
}
