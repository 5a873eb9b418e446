//! Fixed timestep simulation tick
//!
//! Advances the world by one step. The tick is transactional: systems read
//! the committed state and write into a working copy that replaces it only
//! once the whole pipeline has run.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::damage::resolve_damage;
use super::enemy::update_enemies;
use super::events::{GameEvent, SoundCue};
use super::pickup::update_pickups;
use super::player::update_player;
use super::projectile::update_projectiles;
use super::state::{EffectKind, GamePhase, GameState, TemporaryEffect};
use super::upgrade::UpgradeRegistry;
use super::wave;
use crate::tuning::SimConfig;

/// Player intents for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Intents {
    /// Horizontal movement in [-1, 1]
    pub move_axis: f32,
    /// Aim point in world coordinates
    pub aim: Vec2,
    pub fire_held: bool,
    pub jump_requested: bool,
}

/// Advance the game state by one timestep.
///
/// Pipeline: clock, spawning, player, pickups, projectiles, enemy AI,
/// damage, effect and status expiry, game over, wave completion. Paused
/// phases leave the state untouched.
pub fn tick(state: &mut GameState, intents: &Intents, dt: f32, cfg: &SimConfig, upgrades: &UpgradeRegistry) {
    if !state.phase.is_running() {
        return;
    }

    let prev = state.clone();
    let mut next = prev.clone();

    next.now += dt as f64;
    next.tick += 1;

    wave::update_spawning(&mut next, cfg, dt);
    wave::update_meteors(&mut next, cfg, dt);

    update_player(&prev, &mut next, intents, cfg, dt);
    update_pickups(&mut next, cfg, dt);
    update_projectiles(&prev, &mut next, cfg, dt);
    update_enemies(&prev, &mut next, cfg, dt);

    resolve_damage(&mut next, cfg);

    expire_effects(&mut next, cfg, dt);
    let now = next.now;
    for e in &mut next.enemies {
        e.status.expire(now);
    }

    if !check_game_over(&mut next) {
        wave::check_wave_complete(&mut next, cfg, upgrades);
    }

    next.normalize_order();
    log::trace!(
        "tick {} t={:.3} enemies={} projectiles={} effects={}",
        next.tick,
        next.now,
        next.enemies.len(),
        next.projectiles.len(),
        next.effects.len()
    );

    *state = next;
}

/// Count effect timers down. Meteor warnings that run out become impacts.
fn expire_effects(state: &mut GameState, cfg: &SimConfig, dt: f32) {
    let mut expired_warnings: Vec<TemporaryEffect> = Vec::new();
    state.effects.retain_mut(|fx| {
        fx.remaining -= dt;
        fx.arm_delay = (fx.arm_delay - dt).max(0.0);
        if fx.remaining > 0.0 {
            return true;
        }
        if fx.kind == EffectKind::MeteorWarning {
            expired_warnings.push(fx.clone());
        }
        false
    });
    for warning in &expired_warnings {
        wave::meteor_impact(state, cfg, warning);
    }
}

/// Enter `GameOver` when the player has no HP left. Returns true if the run ended.
fn check_game_over(state: &mut GameState) -> bool {
    if state.player.stats.hp > 0.0 {
        return false;
    }
    state.phase = GamePhase::GameOver;
    log::info!(
        "Game over on wave {} with score {} ({} kills)",
        state.wave,
        state.score,
        state.kills
    );
    state.log.event(GameEvent::GameOver {
        score: state.score,
        wave: state.wave,
    });
    state.log.sound(SoundCue::GameOver);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Affects, ArchetypeKind};
    use crate::sim::testutil::{spawn_enemy, test_state};

    const DT: f32 = 1.0 / 60.0;

    fn registry() -> UpgradeRegistry {
        UpgradeRegistry::builtin().unwrap()
    }

    #[test]
    fn test_tick_advances_clock() {
        let cfg = SimConfig::default();
        let reg = registry();
        let mut state = test_state();
        tick(&mut state, &Intents::default(), DT, &cfg, &reg);
        assert_eq!(state.tick, 1);
        assert!((state.now - DT as f64).abs() < 1e-9);
    }

    #[test]
    fn test_paused_phase_is_frozen() {
        let cfg = SimConfig::default();
        let reg = registry();
        let mut state = test_state();
        state.phase = GamePhase::UpgradeChoice;
        let pos = state.player.pos;
        tick(&mut state, &Intents { move_axis: 1.0, ..Default::default() }, DT, &cfg, &reg);
        assert_eq!(state.tick, 0);
        assert_eq!(state.player.pos, pos);
    }

    #[test]
    fn test_game_over_is_terminal() {
        let cfg = SimConfig::default();
        let reg = registry();
        let mut state = test_state();
        state.player.stats.hp = 1.0;
        state.player.stats.dodge_chance = 0.0;
        let at = state.player.pos;
        spawn_enemy(&mut state, ArchetypeKind::Brute, at);

        tick(&mut state, &Intents::default(), DT, &cfg, &reg);
        assert_eq!(state.phase, GamePhase::GameOver);
        let overs = state
            .log
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::GameOver { .. }))
            .count();
        assert_eq!(overs, 1);

        let frozen = state.tick;
        tick(&mut state, &Intents::default(), DT, &cfg, &reg);
        assert_eq!(state.tick, frozen);
    }

    #[test]
    fn test_meteor_warning_becomes_impact() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        let id = state.next_entity_id();
        let zone = wave::meteor_zone(&state, 1200.0, 40.0);
        state.effects.push(TemporaryEffect::new(id, EffectKind::MeteorWarning, zone, Affects::Nothing, None, 0.01));
        expire_effects(&mut state, &cfg, DT);
        assert_eq!(state.effects.len(), 1);
        assert_eq!(state.effects[0].kind, EffectKind::MeteorImpact);
        assert_eq!(state.effects[0].rect, zone);
    }

    #[test]
    fn test_same_seed_same_run() {
        let cfg = SimConfig::default();
        let reg = registry();
        let run = || {
            let mut state = test_state();
            wave::start_wave(&mut state, &cfg);
            let intents = Intents {
                move_axis: 0.3,
                aim: Vec2::new(900.0, 300.0),
                fire_held: true,
                jump_requested: false,
            };
            for _ in 0..600 {
                tick(&mut state, &intents, DT, &cfg, &reg);
            }
            (state.score, state.kills, state.enemies.len(), state.player.stats.hp, state.player.pos)
        };
        assert_eq!(run(), run());
    }
}
