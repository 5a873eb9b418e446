//! Wave orchestration
//!
//! Wave sizing and scaling, enemy spawning, the meteor shower world event
//! and the wave-clear transition into the upgrade choice.

use glam::Vec2;
use rand::Rng;

use super::enemy::build_enemy;
use super::events::{GameEvent, SoundCue, TextStyle};
use super::geometry::Rect;
use super::state::*;
use super::upgrade::{UpgradeRegistry, draw_choices};
use crate::consts::*;
use crate::tuning::{SimConfig, WaveTuning};

/// Every fifth wave is a boss wave
pub const BOSS_WAVE_EVERY: u32 = 5;
/// Delay before the first spawn of a wave
const WAVE_START_DELAY: f32 = 1.0;
/// Share of meteors aimed at the player
const METEOR_AIMED_SHARE: f64 = 0.5;
/// How long an impact zone stays dangerous
pub const METEOR_IMPACT_DURATION: f32 = 0.3;
/// Horizontal spawn inset from the arena edges
const SPAWN_INSET: f32 = 40.0;

/// Regular enemies that must die to clear a non-boss wave
pub fn enemies_required(wave: u32) -> u32 {
    match wave {
        0 | 1 => 5,
        2 => 7,
        n => 7 + 3 * (n - 2),
    }
}

#[inline]
pub fn is_boss_wave(wave: u32) -> bool {
    wave > 0 && wave % BOSS_WAVE_EVERY == 0
}

/// Kills needed to clear `wave` (boss waves need the boss only)
pub fn kills_required(wave: u32) -> u32 {
    if is_boss_wave(wave) { 1 } else { enemies_required(wave) }
}

/// (hp, damage) multipliers for enemies spawned on `wave`
pub fn stat_scales(t: &WaveTuning, wave: u32) -> (f32, f32) {
    let past = wave.saturating_sub(1) as f32;
    (1.0 + t.hp_growth * past, 1.0 + t.damage_growth * past)
}

/// Seconds between spawns on `wave`
pub fn spawn_interval(t: &WaveTuning, wave: u32) -> f32 {
    let decayed = t.spawn_interval * t.spawn_interval_decay.powi(wave.saturating_sub(1) as i32);
    decayed.max(t.min_spawn_interval)
}

pub fn is_meteor_wave(t: &WaveTuning, wave: u32) -> bool {
    !is_boss_wave(wave) && t.meteor_every > 0 && wave % t.meteor_every == t.meteor_offset
}

/// Reset per-wave counters and announce the wave
pub fn start_wave(state: &mut GameState, cfg: &SimConfig) {
    let wave = state.wave;
    let boss = is_boss_wave(wave);
    state.wave_kills = 0;
    state.wave_spawned = 0;
    state.boss_spawned = false;
    state.boss_killed = false;
    state.spawn_timer = WAVE_START_DELAY;
    state.pending_choices.clear();
    state.phase = GamePhase::Playing;

    log::info!(
        "Wave {wave} started: {} kills required{}",
        kills_required(wave),
        if boss { " (boss)" } else { "" }
    );
    state.log.event(GameEvent::WaveStarted { wave, boss });

    state.meteor_shower = None;
    if is_meteor_wave(&cfg.waves, wave) {
        log::info!("Meteor shower on wave {wave}");
        state.meteor_shower = Some(MeteorShower {
            next_in: cfg.waves.meteor_interval,
        });
        state.log.event(GameEvent::MeteorShowerStarted { wave });
        let pos = state.player.center() - Vec2::new(0.0, 60.0);
        state.log.text(pos, "METEOR SHOWER", TextStyle::Info);
    }
}

/// Move on to the next wave after the upgrade was taken
pub fn advance_wave(state: &mut GameState, cfg: &SimConfig) {
    state.wave += 1;
    start_wave(state, cfg);
}

/// Kinds that can spawn on `wave`, in table order
fn unlocked_kinds(cfg: &SimConfig, wave: u32) -> Vec<ArchetypeKind> {
    cfg.archetypes
        .iter()
        .filter(|a| a.kind != ArchetypeKind::Boss && a.unlock_wave <= wave)
        .map(|a| a.kind)
        .collect()
}

/// Spawn enemies from above the arena until the wave's quota is out
pub fn update_spawning(state: &mut GameState, cfg: &SimConfig, dt: f32) {
    state.spawn_timer -= dt;
    if state.spawn_timer > 0.0 {
        return;
    }

    if is_boss_wave(state.wave) {
        if !state.boss_spawned {
            let stats = cfg.archetype(ArchetypeKind::Boss);
            let pos = Vec2::new((ARENA_WIDTH - stats.width) / 2.0, -200.0);
            let boss = build_enemy(state, cfg, ArchetypeKind::Boss, pos);
            log::info!("Boss {} spawned on wave {}", boss.id, state.wave);
            state.enemies.push(boss);
            state.boss_spawned = true;
            state.wave_spawned = 1;
        }
        return;
    }

    let alive = state.enemies.iter().filter(|e| e.is_alive()).count() as u32;
    if state.wave_spawned >= enemies_required(state.wave) || alive >= cfg.waves.max_alive {
        return;
    }

    let kinds = unlocked_kinds(cfg, state.wave);
    if kinds.is_empty() {
        return;
    }
    let kind = kinds[state.rng.random_range(0..kinds.len())];
    let stats = cfg.archetype(kind);
    let max_x = (ARENA_WIDTH - SPAWN_INSET - stats.width).max(SPAWN_INSET);
    let x = state.rng.random_range(SPAWN_INSET..=max_x);
    let enemy = build_enemy(state, cfg, kind, Vec2::new(x, -stats.height - 20.0));
    log::trace!("Spawned {:?} {} at x={x:.0}", kind, enemy.id);
    state.enemies.push(enemy);
    state.wave_spawned += 1;
    state.spawn_timer = spawn_interval(&cfg.waves, state.wave);
}

/// Place meteor warning zones on the shower's interval
pub fn update_meteors(state: &mut GameState, cfg: &SimConfig, dt: f32) {
    let Some(shower) = state.meteor_shower.as_mut() else {
        return;
    };
    shower.next_in -= dt;
    if shower.next_in > 0.0 {
        return;
    }
    shower.next_in += cfg.waves.meteor_interval;

    let radius = cfg.waves.meteor_radius;
    let x = if state.rng.random_bool(METEOR_AIMED_SHARE) {
        state.player.center().x
    } else {
        state.rng.random_range(radius..=ARENA_WIDTH - radius)
    };
    let id = state.next_entity_id();
    let zone = meteor_zone(state, x, radius);
    state.effects.push(TemporaryEffect::new(
        id,
        EffectKind::MeteorWarning,
        zone,
        Affects::Nothing,
        None,
        cfg.waves.meteor_warning,
    ));
    state.log.sound(SoundCue::MeteorWarning);
}

/// Impact zone for a meteor landing at `x`, resting on the ground
pub fn meteor_zone(state: &GameState, x: f32, radius: f32) -> Rect {
    let ground = state.ground.height_at(x);
    Rect::from_center(Vec2::new(x, ground - radius), Vec2::splat(radius * 2.0))
}

/// Turn an expired warning into a damaging impact
pub fn meteor_impact(state: &mut GameState, cfg: &SimConfig, warning: &TemporaryEffect) {
    let id = state.next_entity_id();
    state.effects.push(TemporaryEffect::new(
        id,
        EffectKind::MeteorImpact,
        warning.rect,
        Affects::Both,
        Some(cfg.waves.meteor_damage),
        METEOR_IMPACT_DURATION,
    ));
    state.log.sound(SoundCue::MeteorImpact);
}

/// Has the current wave's requirement been met?
pub fn wave_requirement_met(state: &GameState) -> bool {
    if is_boss_wave(state.wave) {
        state.boss_killed
    } else {
        state.wave_kills >= enemies_required(state.wave)
    }
}

/// Clear the wave if its requirement is met. Hostiles are removed, the
/// player heals, levels up and is offered upgrades. Returns true on clear.
pub fn check_wave_complete(state: &mut GameState, cfg: &SimConfig, registry: &UpgradeRegistry) -> bool {
    if !state.phase.is_running() || !wave_requirement_met(state) {
        return false;
    }

    let wave = state.wave;
    state.enemies.clear();
    state.projectiles.retain(|p| p.owner == Owner::Player);
    state.effects.retain(|fx| fx.affects == Affects::Enemies);
    state.meteor_shower = None;

    let heal = state.player.stats.max_hp * WAVE_CLEAR_HEAL_FRACTION;
    let healed = state.player.stats.heal(heal);
    let pos = state.player.center();
    if healed > 0.0 {
        state.log.text(pos, format!("+{healed:.0}"), TextStyle::Heal);
    }

    state.level += 1;
    log::info!("Wave {wave} cleared, level {}", state.level);
    state.log.event(GameEvent::WaveCleared { wave });
    state.log.event(GameEvent::LevelUp { level: state.level });
    state.log.sound(SoundCue::WaveClear);
    state.log.sound(SoundCue::LevelUp);

    state.rerolls_left = state.player.stats.rerolls;
    let count = state.player.stats.upgrade_choices as usize;
    let luck = state.player.stats.luck;
    state.pending_choices = draw_choices(
        registry,
        &state.player.owned_upgrades,
        luck,
        count,
        &cfg.rarity,
        &mut state.rng,
    );
    state.phase = if state.pending_choices.is_empty() {
        log::info!("No upgrades left to offer");
        GamePhase::WaveCleared
    } else {
        GamePhase::UpgradeChoice
    };
    true
}
