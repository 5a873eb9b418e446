//! Host-facing engine facade
//!
//! Owns the validated configuration, the upgrade registry and the current
//! run. Every host action goes through here; refused actions come back as
//! [`Rejected`] and leave the run untouched.

use glam::Vec2;

use crate::consts::PLAYER_HEIGHT;
use crate::error::{ConfigError, Rejected};
use crate::sim::events::{GameEvent, SoundCue};
use crate::sim::geometry::GroundProfile;
use crate::sim::snapshot::WorldSnapshot;
use crate::sim::state::{GamePhase, GameState, Player, Stats, UpgradeId};
use crate::sim::tick::{Intents, tick};
use crate::sim::upgrade::{UpgradeRegistry, apply_upgrade, draw_choices};
use crate::sim::wave;
use crate::tuning::SimConfig;

/// Player spawn x
const SPAWN_X: f32 = 200.0;

pub struct Engine {
    config: SimConfig,
    upgrades: UpgradeRegistry,
    ground: GroundProfile,
    run: Option<GameState>,
}

impl Engine {
    /// Validate configuration and the built-in upgrade table
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        Self::with_upgrades(config, UpgradeRegistry::builtin()?)
    }

    /// Engine with a custom (already validated) upgrade registry
    pub fn with_upgrades(config: SimConfig, upgrades: UpgradeRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        let ground = config.ground()?;
        log::info!(
            "Engine ready: {} weapons, {} accessories, {} upgrades",
            config.weapons.len(),
            config.accessories.len(),
            upgrades.len()
        );
        Ok(Self {
            config,
            upgrades,
            ground,
            run: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn upgrades(&self) -> &UpgradeRegistry {
        &self.upgrades
    }

    /// Current run, if one was started
    pub fn state(&self) -> Option<&GameState> {
        self.run.as_ref()
    }

    /// Start a fresh run, replacing any previous one
    pub fn start_run(&mut self, weapon: &str, accessory: &str, seed: u64) -> Result<WorldSnapshot, Rejected> {
        let weapon_def = self
            .config
            .weapon(weapon)
            .cloned()
            .ok_or_else(|| reject(Rejected::UnknownWeapon(weapon.to_string())))?;
        let accessory_def = self
            .config
            .accessory(accessory)
            .ok_or_else(|| reject(Rejected::UnknownAccessory(accessory.to_string())))?;

        let ground = self.ground.clone();
        let mut stats = Stats::new(&self.config.player);
        stats.apply_accessory(accessory_def);
        let spawn_y = ground.height_at(SPAWN_X) - PLAYER_HEIGHT;
        let player = Player::new(stats, weapon_def, accessory.to_string(), Vec2::new(SPAWN_X, spawn_y));

        let mut state = GameState::new(seed, player, ground);
        log::info!("Run started: weapon={weapon} accessory={accessory} seed={seed}");
        state.log.event(GameEvent::RunStarted {
            weapon: weapon.to_string(),
            accessory: accessory.to_string(),
        });
        wave::start_wave(&mut state, &self.config);

        let snapshot = WorldSnapshot::capture(&mut state, &self.upgrades);
        self.run = Some(state);
        Ok(snapshot)
    }

    /// Advance the run by `dt` seconds (clamped to the configured range)
    pub fn tick(&mut self, dt: f32, intents: &Intents) -> Result<WorldSnapshot, Rejected> {
        let state = self.run.as_mut().ok_or(Rejected::NoRun)?;
        let dt = self.config.clamp_dt(dt);
        tick(state, intents, dt, &self.config, &self.upgrades);
        Ok(WorldSnapshot::capture(state, &self.upgrades))
    }

    /// Take one of the offered upgrades
    pub fn apply_upgrade(&mut self, id: &str) -> Result<(), Rejected> {
        let state = self.run.as_mut().ok_or(Rejected::NoRun)?;
        match state.phase {
            GamePhase::UpgradeChoice => {}
            GamePhase::GameOver => return Err(reject(Rejected::RunEnded)),
            _ => return Err(reject(Rejected::NoChoicePending)),
        }
        if !state.pending_choices.iter().any(|c| c == id) {
            return Err(reject(Rejected::NotOffered(id.to_string())));
        }

        let applied = apply_upgrade(&self.upgrades, &mut state.player, id).map_err(reject)?;
        log::info!("Upgrade {} -> level {}", applied.id, applied.level);
        for (granted, level) in &applied.granted {
            log::debug!("  granted {granted} -> level {level}");
        }
        state.log.event(GameEvent::UpgradeApplied {
            id: applied.id,
            level: applied.level,
        });
        state.log.sound(SoundCue::UpgradeApplied);
        state.pending_choices.clear();
        state.phase = GamePhase::WaveCleared;
        Ok(())
    }

    /// Replace the offered upgrades with a fresh draw
    pub fn reroll_upgrades(&mut self) -> Result<Vec<UpgradeId>, Rejected> {
        let state = self.run.as_mut().ok_or(Rejected::NoRun)?;
        if state.phase != GamePhase::UpgradeChoice {
            return Err(reject(Rejected::NoChoicePending));
        }
        if state.rerolls_left == 0 {
            return Err(reject(Rejected::NoRerolls));
        }
        state.rerolls_left -= 1;
        let count = state.player.stats.upgrade_choices as usize;
        let luck = state.player.stats.luck;
        state.pending_choices = draw_choices(
            &self.upgrades,
            &state.player.owned_upgrades,
            luck,
            count,
            &self.config.rarity,
            &mut state.rng,
        );
        log::debug!("Rerolled upgrades: {:?}", state.pending_choices);
        Ok(state.pending_choices.clone())
    }

    /// Start the next wave after the upgrade was taken
    pub fn confirm_wave_advance(&mut self) -> Result<(), Rejected> {
        let state = self.run.as_mut().ok_or(Rejected::NoRun)?;
        match state.phase {
            GamePhase::WaveCleared => {
                wave::advance_wave(state, &self.config);
                Ok(())
            }
            GamePhase::GameOver => Err(reject(Rejected::RunEnded)),
            _ => Err(reject(Rejected::NotAwaitingAdvance)),
        }
    }
}

fn reject(r: Rejected) -> Rejected {
    log::debug!("Rejected: {r}");
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(SimConfig::default()).unwrap()
    }

    fn clear_wave(engine: &mut Engine) {
        let state = engine.run.as_mut().unwrap();
        state.wave_kills = wave::kills_required(state.wave);
        engine.tick(0.016, &Intents::default()).unwrap();
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut cfg = SimConfig::default();
        cfg.weapons.clear();
        assert!(matches!(Engine::new(cfg), Err(ConfigError::EmptyTable { .. })));
    }

    #[test]
    fn test_start_run_validates_selection() {
        let mut e = engine();
        assert_eq!(
            e.start_run("banana", "none", 1).unwrap_err(),
            Rejected::UnknownWeapon("banana".into())
        );
        assert_eq!(
            e.start_run("arcane_staff", "cape", 1).unwrap_err(),
            Rejected::UnknownAccessory("cape".into())
        );
        assert!(e.state().is_none());

        let snap = e.start_run("arcane_staff", "iron_amulet", 1).unwrap();
        assert_eq!(snap.wave, 1);
        assert_eq!(snap.phase, GamePhase::Playing);
        assert_eq!(snap.player.max_hp, 130.0);
        assert!(matches!(snap.events[0], GameEvent::RunStarted { .. }));
    }

    #[test]
    fn test_actions_without_run() {
        let mut e = engine();
        assert_eq!(e.tick(0.016, &Intents::default()).unwrap_err(), Rejected::NoRun);
        assert_eq!(e.apply_upgrade("vitality").unwrap_err(), Rejected::NoRun);
        assert_eq!(e.confirm_wave_advance().unwrap_err(), Rejected::NoRun);
    }

    #[test]
    fn test_upgrade_flow() {
        let mut e = engine();
        e.start_run("arcane_staff", "none", 3).unwrap();
        assert_eq!(e.apply_upgrade("vitality").unwrap_err(), Rejected::NoChoicePending);

        clear_wave(&mut e);
        let state = e.state().unwrap();
        assert_eq!(state.phase, GamePhase::UpgradeChoice);
        let offered = state.pending_choices.clone();

        let not_offered = e
            .upgrades()
            .iter()
            .map(|d| d.id)
            .find(|id| !offered.iter().any(|o| o == id))
            .unwrap();
        assert_eq!(
            e.apply_upgrade(not_offered).unwrap_err(),
            Rejected::NotOffered(not_offered.to_string())
        );
        assert_eq!(e.confirm_wave_advance().unwrap_err(), Rejected::NotAwaitingAdvance);

        e.apply_upgrade(&offered[0]).unwrap();
        let state = e.state().unwrap();
        assert_eq!(state.phase, GamePhase::WaveCleared);
        assert_eq!(state.player.upgrade_level(&offered[0]), 1);

        // Frozen until the host confirms
        let snap = e.tick(0.016, &Intents::default()).unwrap();
        assert_eq!(snap.phase, GamePhase::WaveCleared);
        e.confirm_wave_advance().unwrap();
        assert_eq!(e.state().unwrap().wave, 2);
        assert_eq!(e.state().unwrap().phase, GamePhase::Playing);
    }

    #[test]
    fn test_reroll_consumes_charges() {
        let mut e = engine();
        e.start_run("arcane_staff", "none", 9).unwrap();
        assert_eq!(e.reroll_upgrades().unwrap_err(), Rejected::NoChoicePending);
        clear_wave(&mut e);

        let rerolls = e.state().unwrap().rerolls_left;
        assert!(rerolls >= 1);
        for _ in 0..rerolls {
            let choices = e.reroll_upgrades().unwrap();
            assert_eq!(choices.len(), 3);
        }
        assert_eq!(e.reroll_upgrades().unwrap_err(), Rejected::NoRerolls);
    }

    #[test]
    fn test_dt_is_clamped() {
        let mut e = engine();
        e.start_run("storm_wand", "none", 5).unwrap();
        let snap = e.tick(10.0, &Intents::default()).unwrap();
        assert!((snap.time - e.config().max_dt as f64).abs() < 1e-6);
        let snap = e.tick(f32::NAN, &Intents::default()).unwrap();
        assert!((snap.time - (e.config().max_dt + e.config().min_dt) as f64).abs() < 1e-6);
    }
}
