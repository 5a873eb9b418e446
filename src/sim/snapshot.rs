//! Renderable world snapshot
//!
//! What the host sees after each tick: HUD fields, a flat view of every
//! entity, and the sound cues, floating texts and game events emitted since
//! the previous snapshot.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::boss::BossPattern;
use super::events::{BuffKind, FloatingText, GameEvent, SoundCue};
use super::state::*;
use super::status::StatusFlags;
use super::upgrade::{Rarity, UpgradeRegistry};
use super::wave;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffView {
    pub kind: BuffKind,
    pub remaining: f32,
    pub stacks: u32,
}

/// Player HUD and body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub pos: Vec2,
    pub size: Vec2,
    pub facing: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub grounded: bool,
    pub invulnerable: bool,
    /// `None` without the shield upgrade
    pub shield_ready: Option<bool>,
    pub weapon: String,
    pub accessory: String,
    pub buffs: Vec<BuffView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyView {
    pub id: EntityId,
    pub archetype: ArchetypeKind,
    pub pos: Vec2,
    pub size: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub dying: bool,
    pub targetable: bool,
    pub status: StatusFlags,
    /// Active boss pattern, if any
    pub pattern: Option<BossPattern>,
    pub enraged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub id: EntityId,
    pub owner: Owner,
    pub kind: ProjectileKind,
    pub pos: Vec2,
    pub size: Vec2,
    pub vel: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectView {
    pub id: EntityId,
    pub kind: EffectKind,
    pub pos: Vec2,
    pub size: Vec2,
    pub remaining: f32,
    pub link: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupView {
    pub id: EntityId,
    pub kind: PickupKind,
    pub pos: Vec2,
}

/// An offered upgrade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceView {
    pub id: UpgradeId,
    pub name: String,
    pub rarity: Rarity,
    /// Level the player would reach by taking it
    pub next_level: u32,
}

/// Everything the host needs to render one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub time: f64,
    pub phase: GamePhase,
    pub wave: u32,
    pub boss_wave: bool,
    pub level: u32,
    pub score: u64,
    pub kills: u64,
    pub wave_kills: u32,
    pub kills_required: u32,
    pub meteor_shower: bool,
    pub player: PlayerView,
    pub enemies: Vec<EnemyView>,
    pub projectiles: Vec<ProjectileView>,
    pub effects: Vec<EffectView>,
    pub pickups: Vec<PickupView>,
    pub sounds: Vec<SoundCue>,
    pub texts: Vec<FloatingText>,
    pub events: Vec<GameEvent>,
    pub choices: Vec<ChoiceView>,
    pub rerolls_left: u32,
}

impl WorldSnapshot {
    /// Build a snapshot, draining the state's event log
    pub fn capture(state: &mut GameState, registry: &UpgradeRegistry) -> Self {
        let log = state.log.drain();
        let now = state.now;
        let p = &state.player;

        let player = PlayerView {
            pos: p.pos,
            size: p.size,
            facing: p.facing,
            hp: p.stats.hp,
            max_hp: p.stats.max_hp,
            grounded: p.grounded,
            invulnerable: p.is_invulnerable(now),
            shield_ready: p.stats.shield.map(|s| s.active),
            weapon: p.weapon.id.clone(),
            accessory: p.accessory.clone(),
            buffs: p
                .buffs
                .iter()
                .map(|b| BuffView {
                    kind: b.kind,
                    remaining: b.remaining,
                    stacks: b.stacks,
                })
                .collect(),
        };

        let enemies = state
            .enemies
            .iter()
            .map(|e| {
                let (pattern, enraged) = match &e.archetype {
                    Archetype::Boss(brain) => (brain.current_pattern(), brain.enraged),
                    _ => (None, false),
                };
                EnemyView {
                    id: e.id,
                    archetype: e.kind(),
                    pos: e.pos,
                    size: e.size,
                    hp: e.hp,
                    max_hp: e.max_hp,
                    dying: !e.is_alive(),
                    targetable: e.is_targetable(),
                    status: e.status.flags(now),
                    pattern,
                    enraged,
                }
            })
            .collect();

        let projectiles = state
            .projectiles
            .iter()
            .map(|pr| ProjectileView {
                id: pr.id,
                owner: pr.owner,
                kind: pr.kind,
                pos: pr.pos,
                size: pr.size,
                vel: pr.vel,
            })
            .collect();

        let effects = state
            .effects
            .iter()
            .map(|fx| EffectView {
                id: fx.id,
                kind: fx.kind,
                pos: Vec2::new(fx.rect.x, fx.rect.y),
                size: Vec2::new(fx.rect.w, fx.rect.h),
                remaining: fx.remaining,
                link: fx.link,
            })
            .collect();

        let pickups = state
            .pickups
            .iter()
            .map(|pk| PickupView {
                id: pk.id,
                kind: pk.kind,
                pos: pk.pos,
            })
            .collect();

        let choices = state
            .pending_choices
            .iter()
            .filter_map(|id| registry.get(id))
            .map(|def| ChoiceView {
                id: def.id.to_string(),
                name: def.name.to_string(),
                rarity: def.rarity,
                next_level: state.player.upgrade_level(def.id) + 1,
            })
            .collect();

        Self {
            tick: state.tick,
            time: now,
            phase: state.phase,
            wave: state.wave,
            boss_wave: wave::is_boss_wave(state.wave),
            level: state.level,
            score: state.score,
            kills: state.kills,
            wave_kills: state.wave_kills,
            kills_required: wave::kills_required(state.wave),
            meteor_shower: state.meteor_shower.is_some(),
            player,
            enemies,
            projectiles,
            effects,
            pickups,
            sounds: log.sounds,
            texts: log.texts,
            events: log.events,
            choices,
            rerolls_left: state.rerolls_left,
        }
    }
}
