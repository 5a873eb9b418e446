//! Enemy AI
//!
//! One behavior per [`Archetype`] variant, selected at spawn. Each archetype
//! has a movement intent (re-evaluated on its retarget cooldown) and an
//! attack intent (cooldown gated, blocked by stun and silence). Spawned
//! projectiles, effects and minions go straight into the working state; heals
//! are collected and applied after every enemy has thought.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use super::boss::{BossAction, BossBrain};
use super::events::{SoundCue, TextStyle};
use super::geometry::{Rect, intersects};
use super::projectile::{BOSS_TURN_RATE, CASTER_TURN_RATE};
use super::state::*;
use super::wave;
use crate::consts::*;
use crate::tuning::SimConfig;
use crate::{direction_to, rotate};

/// Fall speed for aerial enemies flying in from above
const AERIAL_ENTRY_SPEED: f32 = 220.0;
const BAT_CRUISE_Y: f32 = 260.0;
const BOMBER_ALTITUDE: f32 = 170.0;
const HOP_POWER: f32 = 520.0;
const SNIPER_RANGE: (f32, f32) = (360.0, 480.0);
const SNIPER_AIM_TIME: f32 = 0.6;
const SNIPER_SHOT_SPEED: f32 = 720.0;
const DASH_WINDUP: f32 = 0.45;
const DASH_DURATION: f32 = 0.35;
const DASH_SPEED_MULT: f32 = 4.0;
const DASH_TRIGGER_RANGE: f32 = 500.0;
const HEAL_RANGE: f32 = 320.0;
/// Heal pulse as a fraction of the target's max HP
const HEAL_FRACTION: f32 = 0.12;
const CASTER_RANGE: (f32, f32) = (220.0, 320.0);
const CASTER_ORB_SPEED: f32 = 200.0;
const PHANTOM_BLINK: f32 = 0.5;
const PHANTOM_SMOKE_RADIUS: f32 = 70.0;
const PHANTOM_SMOKE_DURATION: f32 = 3.0;
const TURRET_SPREAD: f32 = 0.2;
const ENEMY_SHOT_SPEED: f32 = 320.0;
const BOSS_ORB_SPEED: f32 = 260.0;
/// Score bonus per wave past the first
const SCORE_GROWTH: f32 = 0.1;

/// Behavior payload for a freshly spawned enemy
pub fn new_archetype<R: Rng + ?Sized>(kind: ArchetypeKind, rng: &mut R) -> Archetype {
    match kind {
        ArchetypeKind::Walker => Archetype::Walker,
        ArchetypeKind::Brute => Archetype::Brute,
        ArchetypeKind::Hopper => Archetype::Hopper,
        ArchetypeKind::Bat => Archetype::Bat {
            bob_phase: rng.random_range(0.0..TAU),
        },
        ArchetypeKind::Ufo => Archetype::Ufo {
            drift_dir: if rng.random_bool(0.5) { 1.0 } else { -1.0 },
            target_y: rng.random_range(120.0..260.0),
        },
        ArchetypeKind::Sniper => Archetype::Sniper { aim_remaining: None },
        ArchetypeKind::Dasher => Archetype::Dasher {
            dash: DashState::Roaming,
        },
        ArchetypeKind::Healer => Archetype::Healer {
            healing_target: None,
            heal_timer: 0.0,
        },
        ArchetypeKind::Bomber => Archetype::Bomber,
        ArchetypeKind::Splitter => Archetype::Splitter { generation: 0 },
        ArchetypeKind::Caster => Archetype::Caster {
            hover_y: rng.random_range(200.0..320.0),
        },
        ArchetypeKind::Phantom => Archetype::Phantom { blink_remaining: 0.0 },
        ArchetypeKind::Turret => Archetype::Turret,
        ArchetypeKind::Boss => Archetype::Boss(Box::new(BossBrain::new())),
    }
}

/// Build an enemy scaled for the current wave, with a fresh id
pub fn build_enemy(state: &mut GameState, cfg: &SimConfig, kind: ArchetypeKind, pos: Vec2) -> Enemy {
    let archetype = new_archetype(kind, &mut state.rng);
    let stats = cfg.archetype(kind);
    let (hp_scale, damage_scale) = wave::stat_scales(&cfg.waves, state.wave);
    let id = state.next_entity_id();
    let mut enemy = Enemy::spawn(id, archetype, &stats, pos, hp_scale, damage_scale);
    let growth = 1.0 + SCORE_GROWTH * state.wave.saturating_sub(1) as f32;
    enemy.score = (stats.score as f32 * growth).round() as u64;
    enemy
}

/// Height aerial archetypes settle at after flying in
fn cruise_height(archetype: &Archetype) -> f32 {
    match archetype {
        Archetype::Ufo { target_y, .. } => *target_y,
        Archetype::Caster { hover_y } => *hover_y,
        Archetype::Bomber => BOMBER_ALTITUDE,
        _ => BAT_CRUISE_Y,
    }
}

/// Per-tick read-only context
struct Ctx<'a> {
    prev: &'a GameState,
    cfg: &'a SimConfig,
    player: Vec2,
    now: f64,
    dt: f32,
}

/// Run every enemy's AI for one tick
pub fn update_enemies(prev: &GameState, next: &mut GameState, cfg: &SimConfig, dt: f32) {
    let ctx = Ctx {
        prev,
        cfg,
        player: prev.player.center(),
        now: next.now,
        dt,
    };

    let mut enemies = std::mem::take(&mut next.enemies);
    let mut spawned = Vec::new();
    let mut heals: BTreeMap<EntityId, f32> = BTreeMap::new();

    for e in enemies.iter_mut() {
        if let Vitality::Dying { remaining } = &mut e.vitality {
            *remaining -= dt;
            continue;
        }

        apply_gravity_wells(e, next, dt);

        if e.entering {
            enter(e, next, cfg, dt);
            continue;
        }

        think(e, &ctx, next, &mut spawned, &mut heals);
        integrate(e, next, cfg, dt);
    }

    for (id, amount) in heals {
        if let Some(target) = enemies.iter_mut().find(|e| e.id == id && e.is_alive()) {
            target.hp = (target.hp + amount).min(target.max_hp);
        }
    }

    // Finished death animations
    enemies.retain(|e| !matches!(e.vitality, Vitality::Dying { remaining } if remaining <= 0.0));

    enemies.extend(spawned);
    next.enemies = enemies;
}

fn apply_gravity_wells(e: &mut Enemy, state: &GameState, dt: f32) {
    if e.kind() == ArchetypeKind::Boss {
        return;
    }
    for fx in state
        .effects
        .iter()
        .filter(|fx| fx.kind == EffectKind::GravityWell && fx.is_armed())
    {
        if intersects(fx.rect, e.rect()) {
            let pull = direction_to(e.center(), fx.rect.center(), Vec2::ZERO) * fx.pull * dt;
            e.pos += pull;
        }
    }
}

/// Falling or flying in from off-screen. No AI until settled.
fn enter(e: &mut Enemy, state: &mut GameState, cfg: &SimConfig, dt: f32) {
    if e.kind().is_grounded() {
        e.vel.x = 0.0;
        e.vel.y = (e.vel.y + cfg.gravity * dt).min(cfg.terminal_velocity);
        e.pos += e.vel * dt;
        let size = e.size;
        if state.ground.resolve_landing(&mut e.pos, &mut e.vel, size) {
            e.grounded = true;
            e.entering = false;
            if let Archetype::Boss(brain) = &mut e.archetype {
                brain.awake = true;
                log::info!("Boss {} landed on wave {}", e.id, state.wave);
                state.log.sound(SoundCue::BossRoar);
            }
        }
    } else {
        let cruise = cruise_height(&e.archetype);
        e.vel = Vec2::new(0.0, AERIAL_ENTRY_SPEED);
        e.pos.y += AERIAL_ENTRY_SPEED * dt;
        if e.pos.y >= cruise {
            e.pos.y = cruise;
            e.vel = Vec2::ZERO;
            e.entering = false;
        }
    }
}

fn enemy_shot(state: &mut GameState, kind: ProjectileKind, from: Vec2, vel: Vec2, size: f32, damage: f32) -> Projectile {
    let id = state.next_entity_id();
    Projectile::new(id, Owner::Enemy, kind, from, vel, size, damage)
}

fn think(e: &mut Enemy, ctx: &Ctx, next: &mut GameState, spawned: &mut Vec<Enemy>, heals: &mut BTreeMap<EntityId, f32>) {
    let dt = ctx.dt;
    let speed_factor = e.status.speed_factor(ctx.now);
    let can_act = e.status.can_act(ctx.now);
    let center = e.center();
    let dx = ctx.player.x - center.x;
    let to_player = direction_to(center, ctx.player, Vec2::X);

    e.attack_timer = (e.attack_timer - dt).max(0.0);
    e.retarget_timer -= dt;
    if e.retarget_timer <= 0.0 {
        e.retarget_timer = e.retarget_cooldown.max(0.05);
        e.heading = if dx.abs() < 4.0 { 0.0 } else { dx.signum() };
    }
    let walk = e.heading * e.speed * speed_factor;
    let ready = can_act && e.attack_timer <= 0.0;

    let mut boss_actions = Vec::new();

    match &mut e.archetype {
        Archetype::Walker | Archetype::Brute | Archetype::Splitter { .. } => {
            e.vel.x = walk;
        }

        Archetype::Hopper => {
            if e.grounded {
                e.vel.x = 0.0;
                if ready {
                    e.vel.y = -HOP_POWER;
                    e.vel.x = walk;
                    e.grounded = false;
                    e.attack_timer = e.attack_cooldown;
                }
            } else {
                e.vel.x = walk;
            }
        }

        Archetype::Bat { bob_phase } => {
            *bob_phase = (*bob_phase + dt * 4.0) % TAU;
            let dy = (ctx.player.y - center.y).clamp(-e.speed, e.speed);
            e.vel = Vec2::new(walk, (dy + bob_phase.sin() * 60.0) * speed_factor);
        }

        Archetype::Ufo { drift_dir, target_y } => {
            if e.pos.x <= 0.0 {
                *drift_dir = 1.0;
            } else if e.pos.x + e.size.x >= ARENA_WIDTH {
                *drift_dir = -1.0;
            }
            e.vel = Vec2::new(
                *drift_dir * e.speed * speed_factor,
                (*target_y - e.pos.y).clamp(-e.speed, e.speed) * speed_factor,
            );
            if ready && dx.abs() < 200.0 {
                let from = Vec2::new(center.x, e.pos.y + e.size.y);
                let shot = enemy_shot(next, ProjectileKind::EnemyShot, from, Vec2::new(0.0, ENEMY_SHOT_SPEED), ENEMY_SHOT_SIZE, e.damage);
                next.projectiles.push(shot);
                next.log.sound(SoundCue::EnemyShoot);
                e.attack_timer = e.attack_cooldown;
            }
        }

        Archetype::Sniper { aim_remaining } => {
            let (near, far) = SNIPER_RANGE;
            e.vel.x = if dx.abs() < near {
                -dx.signum() * e.speed * speed_factor
            } else if dx.abs() > far {
                dx.signum() * e.speed * speed_factor
            } else {
                0.0
            };
            match aim_remaining {
                // Stun or silence cancels the shot
                Some(_) if !can_act => *aim_remaining = None,
                Some(t) => {
                    e.vel.x = 0.0;
                    *t -= dt;
                    if *t <= 0.0 {
                        *aim_remaining = None;
                        let shot = enemy_shot(next, ProjectileKind::SniperShot, center, to_player * SNIPER_SHOT_SPEED, ENEMY_SHOT_SIZE * 0.75, e.damage);
                        next.projectiles.push(shot);
                        next.log.sound(SoundCue::EnemyShoot);
                        e.attack_timer = e.attack_cooldown;
                    }
                }
                None if ready => *aim_remaining = Some(SNIPER_AIM_TIME),
                None => {}
            }
        }

        Archetype::Dasher { dash } => match dash {
            DashState::Roaming => {
                e.vel.x = walk * 0.6;
                if ready && dx.abs() < DASH_TRIGGER_RANGE {
                    *dash = DashState::WindUp { remaining: DASH_WINDUP };
                }
            }
            DashState::WindUp { remaining } => {
                e.vel.x = 0.0;
                *remaining -= dt;
                if !can_act {
                    *dash = DashState::Roaming;
                } else if *remaining <= 0.0 {
                    let dir = if dx == 0.0 { 1.0 } else { dx.signum() };
                    *dash = DashState::Dashing {
                        remaining: DASH_DURATION,
                        dir,
                    };
                }
            }
            DashState::Dashing { remaining, dir } => {
                e.vel.x = *dir * e.speed * DASH_SPEED_MULT * speed_factor;
                *remaining -= dt;
                if *remaining <= 0.0 || speed_factor == 0.0 {
                    *dash = DashState::Roaming;
                    e.attack_timer = e.attack_cooldown;
                }
            }
        },

        Archetype::Healer {
            healing_target,
            heal_timer,
        } => {
            // Keep the current target until it dies or wanders off
            let current = healing_target.and_then(|id| {
                ctx.prev
                    .enemy(id)
                    .filter(|t| t.is_alive() && t.center().distance(center) <= HEAL_RANGE)
            });
            let target = match current {
                Some(t) => Some(t),
                None => ctx
                    .prev
                    .enemies
                    .iter()
                    .filter(|t| {
                        t.id != e.id
                            && t.is_alive()
                            && !t.entering
                            && t.hp_fraction() < 1.0
                            && t.center().distance(center) <= HEAL_RANGE
                    })
                    .min_by(|a, b| a.hp_fraction().total_cmp(&b.hp_fraction()).then(a.id.cmp(&b.id))),
            };
            *healing_target = target.map(|t| t.id);

            e.vel.x = match target {
                Some(t) if (t.center().x - center.x).abs() > 120.0 => {
                    (t.center().x - center.x).signum() * e.speed * speed_factor
                }
                Some(_) => 0.0,
                None if dx.abs() < 300.0 => -dx.signum() * e.speed * speed_factor,
                None => 0.0,
            };

            *heal_timer = (*heal_timer - dt).max(0.0);
            if let Some(t) = target {
                if can_act && *heal_timer <= 0.0 {
                    *heals.entry(t.id).or_insert(0.0) += t.max_hp * HEAL_FRACTION;
                    *heal_timer = e.attack_cooldown;
                    let a = center;
                    let b = t.center();
                    let rect = Rect::new(a.x.min(b.x), a.y.min(b.y) - 4.0, (a.x - b.x).abs().max(8.0), (a.y - b.y).abs() + 8.0);
                    let id = next.next_entity_id();
                    let mut beam = TemporaryEffect::new(id, EffectKind::HealingBeam, rect, Affects::Nothing, None, 0.3);
                    beam.link = Some(t.id);
                    next.effects.push(beam);
                    next.log.text(b, format!("+{:.0}", t.max_hp * HEAL_FRACTION), TextStyle::Heal);
                }
            }
        }

        Archetype::Bomber => {
            e.vel = Vec2::new(walk, (BOMBER_ALTITUDE - e.pos.y).clamp(-e.speed, e.speed) * speed_factor);
            if ready && dx.abs() < 60.0 {
                let from = Vec2::new(center.x, e.pos.y + e.size.y);
                let mut bomb = enemy_shot(next, ProjectileKind::Bomb, from, Vec2::new(0.0, 60.0), BOMB_SIZE, e.damage);
                bomb.gravity = true;
                bomb.explosion = Some(Explosion {
                    radius: 56.0,
                    damage: e.damage,
                });
                next.projectiles.push(bomb);
                e.attack_timer = e.attack_cooldown;
            }
        }

        Archetype::Caster { hover_y } => {
            let (near, far) = CASTER_RANGE;
            let vx = if dx.abs() > far {
                dx.signum()
            } else if dx.abs() < near {
                -dx.signum()
            } else {
                0.0
            };
            e.vel = Vec2::new(
                vx * e.speed * speed_factor,
                (*hover_y - e.pos.y).clamp(-e.speed, e.speed) * speed_factor,
            );
            if ready {
                let mut orb = enemy_shot(next, ProjectileKind::HomingOrb, center, to_player * CASTER_ORB_SPEED, ENEMY_SHOT_SIZE, e.damage);
                orb.homing = Some(HomingTarget::Player);
                orb.turn_rate = CASTER_TURN_RATE;
                next.projectiles.push(orb);
                next.log.sound(SoundCue::EnemyShoot);
                e.attack_timer = e.attack_cooldown;
            }
        }

        Archetype::Phantom { blink_remaining } => {
            if *blink_remaining > 0.0 {
                e.vel.x = 0.0;
                *blink_remaining -= dt;
                if *blink_remaining <= 0.0 {
                    *blink_remaining = 0.0;
                    let side = if next.rng.random_bool(0.5) { 1.0 } else { -1.0 };
                    e.pos.x = (ctx.player.x + side * 90.0 - e.size.x / 2.0).clamp(0.0, ARENA_WIDTH - e.size.x);
                    e.attack_timer = e.attack_cooldown;
                }
            } else {
                e.vel.x = walk;
                if ready {
                    let id = next.next_entity_id();
                    next.effects.push(TemporaryEffect::new(
                        id,
                        EffectKind::VisionObscure,
                        Rect::from_center(center, Vec2::splat(PHANTOM_SMOKE_RADIUS * 2.0)),
                        Affects::Nothing,
                        None,
                        PHANTOM_SMOKE_DURATION,
                    ));
                    *blink_remaining = PHANTOM_BLINK;
                }
            }
        }

        Archetype::Turret => {
            e.vel.x = 0.0;
            if ready {
                for offset in [-TURRET_SPREAD, 0.0, TURRET_SPREAD] {
                    let vel = rotate(to_player, offset) * ENEMY_SHOT_SPEED;
                    let shot = enemy_shot(next, ProjectileKind::EnemyShot, center, vel, ENEMY_SHOT_SIZE, e.damage);
                    next.projectiles.push(shot);
                }
                next.log.sound(SoundCue::EnemyShoot);
                e.attack_timer = e.attack_cooldown;
            }
        }

        Archetype::Boss(brain) => {
            e.vel.x = if brain.is_rooted() { 0.0 } else { walk };
            let hp_fraction = if e.max_hp > 0.0 { e.hp / e.max_hp } else { 0.0 };
            boss_actions = brain.update(dt, hp_fraction, can_act, &mut next.rng);
        }
    }

    for action in boss_actions {
        run_boss_action(e, action, ctx, next, spawned);
    }
}

fn run_boss_action(e: &mut Enemy, action: BossAction, ctx: &Ctx, next: &mut GameState, spawned: &mut Vec<Enemy>) {
    let center = e.center();
    match action {
        BossAction::Enraged => {
            e.speed *= 1.25;
            next.log.text(center, "ENRAGED", TextStyle::Info);
            next.log.sound(SoundCue::BossRoar);
        }
        BossAction::FireOrb => {
            let dir = direction_to(center, ctx.player, Vec2::X);
            let mut orb = enemy_shot(next, ProjectileKind::BossOrb, center, dir * BOSS_ORB_SPEED, ENEMY_SHOT_SIZE * 1.5, e.damage * 0.6);
            orb.homing = Some(HomingTarget::Player);
            orb.turn_rate = BOSS_TURN_RATE;
            next.projectiles.push(orb);
            next.log.sound(SoundCue::EnemyShoot);
        }
        BossAction::SummonMinions { count } => {
            for i in 0..count {
                let offset = (i as f32 - (count - 1) as f32 / 2.0) * 70.0;
                let pos = Vec2::new(center.x + offset, e.pos.y - 40.0);
                let mut minion = build_enemy(next, ctx.cfg, ArchetypeKind::Bat, pos);
                minion.minion = true;
                minion.entering = false;
                spawned.push(minion);
            }
        }
        BossAction::Beam => {
            let (x, w) = if ctx.player.x >= center.x {
                (center.x, ARENA_WIDTH - center.x)
            } else {
                (0.0, center.x)
            };
            let id = next.next_entity_id();
            let mut beam = TemporaryEffect::new(
                id,
                EffectKind::BossBeam,
                Rect::new(x, center.y - 24.0, w, 48.0),
                Affects::Player,
                Some(e.damage * 1.2),
                0.6,
            );
            beam.link = Some(e.id);
            next.effects.push(beam);
            next.log.sound(SoundCue::BossBeam);
        }
        BossAction::Slam => {
            let bottom = e.rect().bottom();
            let id = next.next_entity_id();
            next.effects.push(TemporaryEffect::new(
                id,
                EffectKind::GroundSlam,
                Rect::new(center.x - 280.0, bottom - 60.0, 560.0, 70.0),
                Affects::Player,
                Some(e.damage * 1.5),
                0.25,
            ));
            next.log.sound(SoundCue::BossSlam);
        }
    }
}

fn integrate(e: &mut Enemy, state: &GameState, cfg: &SimConfig, dt: f32) {
    if e.kind().is_grounded() {
        e.vel.y = (e.vel.y + cfg.gravity * dt).min(cfg.terminal_velocity);
        e.pos += e.vel * dt;
        let size = e.size;
        e.grounded = state.ground.resolve_landing(&mut e.pos, &mut e.vel, size);
    } else {
        e.pos += e.vel * dt;
        let floor = state.ground.height_at(e.center().x) - e.size.y;
        e.pos.y = e.pos.y.clamp(0.0, floor);
    }
    e.pos.x = e.pos.x.clamp(0.0, ARENA_WIDTH - e.size.x);
}
