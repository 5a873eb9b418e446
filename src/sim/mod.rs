//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Seeded RNG only, stored in the state
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or platform dependencies

pub mod boss;
pub mod damage;
pub mod enemy;
pub mod events;
pub mod geometry;
pub mod pickup;
pub mod player;
pub mod projectile;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod tick;
pub mod upgrade;
pub mod wave;

pub use boss::{BossBrain, BossPattern};
pub use events::{FloatingText, GameEvent, SoundCue, TextStyle};
pub use geometry::{GroundProfile, Rect, intersects};
pub use snapshot::WorldSnapshot;
pub use state::{ArchetypeKind, EntityId, GamePhase, GameState, Player, Stats, UpgradeId};
pub use status::StatusEffects;
pub use tick::{Intents, tick};
pub use upgrade::{Rarity, UpgradeDef, UpgradeRegistry, apply_upgrade, draw_choices};

#[cfg(test)]
pub(crate) mod testutil {
    use glam::Vec2;

    use super::enemy::build_enemy;
    use super::state::*;
    use crate::consts::PLAYER_HEIGHT;
    use crate::tuning::SimConfig;

    /// Fresh wave-1 state with the default config, player standing at x=200
    pub fn test_state() -> GameState {
        let cfg = SimConfig::default();
        let mut stats = Stats::new(&cfg.player);
        if let Some(acc) = cfg.accessory("none") {
            stats.apply_accessory(acc);
        }
        let ground = cfg.ground().unwrap();
        let spawn = Vec2::new(200.0, ground.height_at(214.0) - PLAYER_HEIGHT);
        let mut player = Player::new(stats, cfg.weapons[0].clone(), "none".into(), spawn);
        player.grounded = true;
        GameState::new(1, player, ground)
    }

    /// Spawn a settled (not entering) enemy at `pos`
    pub fn spawn_enemy(state: &mut GameState, kind: ArchetypeKind, pos: Vec2) -> EntityId {
        let cfg = SimConfig::default();
        let mut enemy = build_enemy(state, &cfg, kind, pos);
        enemy.entering = false;
        enemy.grounded = true;
        if let Archetype::Boss(brain) = &mut enemy.archetype {
            brain.awake = true;
        }
        let id = enemy.id;
        state.enemies.push(enemy);
        id
    }
}
