//! Game state and core simulation types
//!
//! The committed world lives in [`GameState`]. A tick clones it, runs every
//! system against the working copy and commits the copy at the end.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::boss::BossBrain;
use super::events::{BuffKind, EventLog};
use super::geometry::{GroundProfile, Rect};
use super::status::StatusEffects;
use crate::consts::*;
use crate::tuning::{AccessoryDef, ArchetypeStats, PlayerTuning, WeaponDef};

/// Stable entity identifier. References between entities are ids, never handles.
pub type EntityId = u32;

/// Upgrade identifier (key of the upgrade registry)
pub type UpgradeId = String;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Wave cleared, waiting for the player to pick an upgrade
    UpgradeChoice,
    /// Upgrade taken, waiting for the host to start the next wave
    WaveCleared,
    /// Run ended
    GameOver,
}

impl GamePhase {
    /// Does gameplay state advance in this phase?
    pub fn is_running(self) -> bool {
        self == GamePhase::Playing
    }
}

// ---------------------------------------------------------------------------
// Player modifier bag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShieldState {
    pub active: bool,
    pub cooldown_remaining: f32,
    pub max_cooldown: f32,
}

impl ShieldState {
    pub fn new(max_cooldown: f32) -> Self {
        Self {
            active: true,
            cooldown_remaining: 0.0,
            max_cooldown,
        }
    }

    /// Absorb one hit. Returns false if the shield was already down.
    pub fn break_shield(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.cooldown_remaining = self.max_cooldown;
        true
    }

    /// Advance the recharge timer. Returns true when the shield came back up.
    pub fn recharge(&mut self, dt: f32) -> bool {
        if self.active {
            return false;
        }
        self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
        if self.cooldown_remaining <= 0.0 {
            self.active = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightningMod {
    pub strikes_per_cycle: u32,
    pub cooldown: f32,
    pub timer: f32,
    pub damage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomingMod {
    /// Per-nominal-tick steering blend
    pub strength: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShrapnelMod {
    pub count: u32,
    pub damage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainExplosionMod {
    pub radius: f32,
    pub damage: f32,
}

/// Chance-based status proc on hit. `magnitude` is the slow factor for
/// frost and the damage amplification for curse; unused otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnHitStatus {
    pub chance: f32,
    pub duration: f32,
    pub magnitude: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityWellMod {
    pub cooldown: f32,
    pub timer: f32,
    pub radius: f32,
    pub damage: f32,
    pub pull: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrictionMod {
    pub distance_per_charge: f32,
    pub damage: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HasteOnKill {
    pub chance: f32,
    pub duration: f32,
    /// Fire interval multiplier while hasted
    pub factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplosiveRounds {
    pub radius: f32,
    /// Explosion damage as a fraction of the projectile's damage
    pub damage_frac: f32,
}

/// The player's modifier bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub max_hp: f32,
    pub hp: f32,
    pub speed: f32,
    pub damage: f32,
    /// Multiplier on the weapon's fire interval (lower fires faster)
    pub fire_rate_mult: f32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    /// Fraction of incoming damage negated, capped at `MAX_DEFENSE`
    pub defense: f32,
    pub pierce: u32,
    pub bounces: u32,
    pub max_jumps: u32,
    pub jump_power: f32,
    pub projectile_speed_mult: f32,
    pub projectile_count: u32,
    /// Fraction of dealt damage returned as healing
    pub lifesteal: f32,
    pub dodge_chance: f32,
    pub luck: f32,
    /// Flat damage reflected to a contact attacker
    pub thorns: f32,
    /// HP regenerated per second
    pub regen: f32,
    pub pickup_chance: f32,
    pub rerolls: u32,
    pub upgrade_choices: u32,
    pub invulnerability_duration: f32,

    pub shield: Option<ShieldState>,
    pub lightning: Option<LightningMod>,
    pub homing: Option<HomingMod>,
    pub shrapnel: Option<ShrapnelMod>,
    pub chain_explosion: Option<ChainExplosionMod>,
    pub frost: Option<OnHitStatus>,
    pub stun: Option<OnHitStatus>,
    pub silence: Option<OnHitStatus>,
    pub curse: Option<OnHitStatus>,
    /// Chance that a hit does not use up pierce
    pub ghost_shot: Option<f32>,
    pub gravity_well: Option<GravityWellMod>,
    pub friction: Option<FrictionMod>,
    pub haste_on_kill: Option<HasteOnKill>,
    pub explosive_rounds: Option<ExplosiveRounds>,
}

impl Stats {
    pub fn new(t: &PlayerTuning) -> Self {
        Self {
            max_hp: t.base_hp,
            hp: t.base_hp,
            speed: t.base_speed,
            damage: t.base_damage,
            fire_rate_mult: 1.0,
            crit_chance: t.crit_chance,
            crit_multiplier: t.crit_multiplier,
            defense: 0.0,
            pierce: 0,
            bounces: 0,
            max_jumps: t.max_jumps,
            jump_power: t.jump_power,
            projectile_speed_mult: 1.0,
            projectile_count: 1,
            lifesteal: 0.0,
            dodge_chance: 0.0,
            luck: 0.0,
            thorns: 0.0,
            regen: 0.0,
            pickup_chance: t.pickup_chance,
            rerolls: t.rerolls_per_wave,
            upgrade_choices: t.upgrade_choices,
            invulnerability_duration: t.invulnerability_duration,
            shield: None,
            lightning: None,
            homing: None,
            shrapnel: None,
            chain_explosion: None,
            frost: None,
            stun: None,
            silence: None,
            curse: None,
            ghost_shot: None,
            gravity_well: None,
            friction: None,
            haste_on_kill: None,
            explosive_rounds: None,
        }
    }

    /// Fold an accessory's bonuses into the bag
    pub fn apply_accessory(&mut self, acc: &AccessoryDef) {
        self.max_hp = (self.max_hp + acc.max_hp).max(1.0);
        self.hp = self.max_hp;
        self.speed *= acc.speed_mult.max(0.1);
        self.damage *= acc.damage_mult.max(0.1);
        self.crit_chance = (self.crit_chance + acc.crit_chance).clamp(0.0, 1.0);
        self.defense = (self.defense + acc.defense).clamp(0.0, MAX_DEFENSE);
        self.luck = (self.luck + acc.luck).max(0.0);
        self.max_jumps += acc.extra_jumps;
        self.dodge_chance = (self.dodge_chance + acc.dodge_chance).clamp(0.0, MAX_DODGE);
        self.lifesteal = (self.lifesteal + acc.lifesteal).max(0.0);
    }

    /// Restore HP, clamped to max. Returns the amount actually healed.
    pub fn heal(&mut self, amount: f32) -> f32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0.0)).min(self.max_hp);
        self.hp - before
    }

    /// Remove HP, clamped at zero
    pub fn lose_hp(&mut self, amount: f32) {
        self.hp = (self.hp - amount.max(0.0)).max(0.0);
    }

    /// Raise max HP and heal by the same amount
    pub fn add_max_hp(&mut self, amount: f32) {
        self.max_hp = (self.max_hp + amount).max(1.0);
        self.hp = (self.hp + amount.max(0.0)).min(self.max_hp);
    }

    pub fn hp_fraction(&self) -> f32 {
        if self.max_hp <= 0.0 {
            0.0
        } else {
            self.hp / self.max_hp
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A timed buff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    pub kind: BuffKind,
    pub remaining: f32,
    /// Fragment stacks (1 for other buffs)
    pub stacks: u32,
    /// Strength (fire interval factor for haste)
    pub factor: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    /// +1 facing right, -1 facing left
    pub facing: f32,
    pub grounded: bool,
    pub jumps_left: u32,
    pub stats: Stats,
    /// Upgrade levels; also the source of truth for level caps and gating
    pub owned_upgrades: BTreeMap<UpgradeId, u32>,
    /// The single timestamp that governs all incoming damage
    pub invulnerable_until: f64,
    pub last_shot_time: f64,
    pub buffs: Vec<Buff>,
    /// Ground distance travelled since the last friction charge
    pub friction_distance: f32,
    pub weapon: WeaponDef,
    pub accessory: String,
}

impl Player {
    pub fn new(stats: Stats, weapon: WeaponDef, accessory: String, spawn: Vec2) -> Self {
        let jumps = stats.max_jumps;
        Self {
            pos: spawn,
            vel: Vec2::ZERO,
            size: Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT),
            facing: 1.0,
            grounded: false,
            jumps_left: jumps,
            stats,
            owned_upgrades: BTreeMap::new(),
            invulnerable_until: f64::NEG_INFINITY,
            last_shot_time: f64::NEG_INFINITY,
            buffs: Vec::new(),
            friction_distance: 0.0,
            weapon,
            accessory,
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.pos, self.size)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.pos + self.size / 2.0
    }

    #[inline]
    pub fn is_invulnerable(&self, now: f64) -> bool {
        now < self.invulnerable_until
    }

    pub fn upgrade_level(&self, id: &str) -> u32 {
        self.owned_upgrades.get(id).copied().unwrap_or(0)
    }

    /// Damage multiplier from fragment stacks
    pub fn buff_damage_mult(&self) -> f32 {
        let stacks: u32 = self
            .buffs
            .iter()
            .filter(|b| b.kind == BuffKind::Fragment)
            .map(|b| b.stacks)
            .sum();
        1.0 + stacks.min(FRAGMENT_MAX_STACKS) as f32 * FRAGMENT_DAMAGE_PER_STACK
    }

    /// Fire interval multiplier from haste (strongest haste wins)
    pub fn buff_fire_interval_mult(&self) -> f32 {
        self.buffs
            .iter()
            .filter(|b| b.kind == BuffKind::Haste)
            .map(|b| b.factor)
            .fold(1.0, f32::min)
    }

    /// Add or refresh a buff
    pub fn add_buff(&mut self, kind: BuffKind, duration: f32, stacks: u32, factor: f32) {
        if let Some(b) = self.buffs.iter_mut().find(|b| b.kind == kind) {
            b.remaining = b.remaining.max(duration);
            b.factor = b.factor.min(factor);
            if kind == BuffKind::Fragment {
                b.stacks = (b.stacks + stacks).min(FRAGMENT_MAX_STACKS);
            }
        } else {
            self.buffs.push(Buff {
                kind,
                remaining: duration,
                stacks: stacks.clamp(1, FRAGMENT_MAX_STACKS),
                factor,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Enemies
// ---------------------------------------------------------------------------

/// Fieldless archetype tag (table keys, events, snapshots)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeKind {
    Walker,
    Brute,
    Hopper,
    Bat,
    Ufo,
    Sniper,
    Dasher,
    Healer,
    Bomber,
    Splitter,
    Caster,
    Phantom,
    Turret,
    Boss,
}

impl ArchetypeKind {
    pub const ALL: [ArchetypeKind; 14] = [
        ArchetypeKind::Walker,
        ArchetypeKind::Brute,
        ArchetypeKind::Hopper,
        ArchetypeKind::Bat,
        ArchetypeKind::Ufo,
        ArchetypeKind::Sniper,
        ArchetypeKind::Dasher,
        ArchetypeKind::Healer,
        ArchetypeKind::Bomber,
        ArchetypeKind::Splitter,
        ArchetypeKind::Caster,
        ArchetypeKind::Phantom,
        ArchetypeKind::Turret,
        ArchetypeKind::Boss,
    ];

    /// Ground archetypes are subject to gravity and stand on the contour
    pub fn is_grounded(self) -> bool {
        matches!(
            self,
            ArchetypeKind::Walker
                | ArchetypeKind::Brute
                | ArchetypeKind::Hopper
                | ArchetypeKind::Sniper
                | ArchetypeKind::Dasher
                | ArchetypeKind::Healer
                | ArchetypeKind::Splitter
                | ArchetypeKind::Phantom
                | ArchetypeKind::Turret
                | ArchetypeKind::Boss
        )
    }

    /// Archetypes that play a death animation before removal
    pub fn has_death_animation(self) -> bool {
        matches!(
            self,
            ArchetypeKind::Brute | ArchetypeKind::Ufo | ArchetypeKind::Boss
        )
    }
}

/// Dash cycle for the dasher archetype
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DashState {
    Roaming,
    WindUp { remaining: f32 },
    Dashing { remaining: f32, dir: f32 },
}

/// Per-archetype behavior payload. Each variant carries only what it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Archetype {
    Walker,
    Brute,
    Hopper,
    Bat { bob_phase: f32 },
    Ufo { drift_dir: f32, target_y: f32 },
    Sniper { aim_remaining: Option<f32> },
    Dasher { dash: DashState },
    Healer { healing_target: Option<EntityId>, heal_timer: f32 },
    Bomber,
    Splitter { generation: u8 },
    Caster { hover_y: f32 },
    /// `blink_remaining > 0` while mid-blink (untargetable)
    Phantom { blink_remaining: f32 },
    Turret,
    Boss(Box<BossBrain>),
}

impl Archetype {
    pub fn kind(&self) -> ArchetypeKind {
        match self {
            Archetype::Walker => ArchetypeKind::Walker,
            Archetype::Brute => ArchetypeKind::Brute,
            Archetype::Hopper => ArchetypeKind::Hopper,
            Archetype::Bat { .. } => ArchetypeKind::Bat,
            Archetype::Ufo { .. } => ArchetypeKind::Ufo,
            Archetype::Sniper { .. } => ArchetypeKind::Sniper,
            Archetype::Dasher { .. } => ArchetypeKind::Dasher,
            Archetype::Healer { .. } => ArchetypeKind::Healer,
            Archetype::Bomber => ArchetypeKind::Bomber,
            Archetype::Splitter { .. } => ArchetypeKind::Splitter,
            Archetype::Caster { .. } => ArchetypeKind::Caster,
            Archetype::Phantom { .. } => ArchetypeKind::Phantom,
            Archetype::Turret => ArchetypeKind::Turret,
            Archetype::Boss(_) => ArchetypeKind::Boss,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Vitality {
    Alive,
    /// Death animation playing; no longer targetable or damageable
    Dying { remaining: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EntityId,
    pub archetype: Archetype,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub speed: f32,
    pub damage: f32,
    pub score: u64,
    pub vitality: Vitality,
    pub status: StatusEffects,
    pub attack_timer: f32,
    pub attack_cooldown: f32,
    pub retarget_timer: f32,
    pub retarget_cooldown: f32,
    /// Desired horizontal heading chosen at the last retarget
    pub heading: f32,
    /// Falling in from off-screen; ignores AI until it settles
    pub entering: bool,
    pub grounded: bool,
    /// Summoned by the boss; not counted toward wave requirements
    pub minion: bool,
}

impl Enemy {
    /// Build an enemy from its base stats, scaled for the wave
    pub fn spawn(
        id: EntityId,
        archetype: Archetype,
        stats: &ArchetypeStats,
        pos: Vec2,
        hp_scale: f32,
        damage_scale: f32,
    ) -> Self {
        let hp = (stats.hp * hp_scale).max(1.0);
        Self {
            id,
            archetype,
            pos,
            vel: Vec2::ZERO,
            size: Vec2::new(stats.width, stats.height),
            hp,
            max_hp: hp,
            speed: stats.speed,
            damage: stats.damage * damage_scale,
            score: stats.score,
            vitality: Vitality::Alive,
            status: StatusEffects::default(),
            attack_timer: stats.attack_cooldown,
            attack_cooldown: stats.attack_cooldown,
            retarget_timer: 0.0,
            retarget_cooldown: stats.retarget_cooldown,
            heading: 0.0,
            entering: true,
            grounded: false,
            minion: false,
        }
    }

    #[inline]
    pub fn kind(&self) -> ArchetypeKind {
        self.archetype.kind()
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.pos, self.size)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.pos + self.size / 2.0
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        matches!(self.vitality, Vitality::Alive)
    }

    pub fn hp_fraction(&self) -> f32 {
        if self.max_hp <= 0.0 {
            0.0
        } else {
            (self.hp / self.max_hp).clamp(0.0, 1.0)
        }
    }

    /// Can projectiles and effects target this enemy?
    pub fn is_targetable(&self) -> bool {
        if !self.is_alive() {
            return false;
        }
        match &self.archetype {
            Archetype::Phantom { blink_remaining } => *blink_remaining <= 0.0,
            Archetype::Boss(brain) => !self.entering && brain.fight_active(),
            _ => true,
        }
    }

    /// Does this enemy deal contact damage right now?
    pub fn deals_contact_damage(&self) -> bool {
        self.is_alive() && !self.entering && self.damage > 0.0
    }
}

// ---------------------------------------------------------------------------
// Projectiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Player,
    Enemy,
}

/// Visual/behavior tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    Bolt,
    Ember,
    Spark,
    Shrapnel,
    EnemyShot,
    SniperShot,
    HomingOrb,
    BossOrb,
    Bomb,
}

/// Homing target. Enemy targets are weak ids resolved by lookup each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomingTarget {
    Enemy(EntityId),
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Explosion {
    pub radius: f32,
    pub damage: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: Owner,
    pub kind: ProjectileKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub damage: f32,
    pub pierce_left: u32,
    pub bounces_left: u32,
    pub homing: Option<HomingTarget>,
    /// Steering blend per nominal tick (0 = no homing)
    pub turn_rate: f32,
    pub explosion: Option<Explosion>,
    /// Affected by gravity (bombs)
    pub gravity: bool,
    pub ttl: f32,
    /// Enemies already struck by this projectile
    pub hit_ids: Vec<EntityId>,
    /// Chain-explosion depth of the kill that spawned it
    pub chain_depth: u32,
}

impl Projectile {
    /// Plain projectile with no behavior fields set
    pub fn new(id: EntityId, owner: Owner, kind: ProjectileKind, center: Vec2, vel: Vec2, size: f32, damage: f32) -> Self {
        Self {
            id,
            owner,
            kind,
            pos: center - Vec2::splat(size / 2.0),
            vel,
            size: Vec2::splat(size),
            damage,
            pierce_left: 0,
            bounces_left: 0,
            homing: None,
            turn_rate: 0.0,
            explosion: None,
            gravity: false,
            ttl: if owner == Owner::Player {
                PLAYER_SHOT_TTL
            } else {
                ENEMY_SHOT_TTL
            },
            hit_ids: Vec::new(),
            chain_depth: 0,
        }
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.pos, self.size)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.pos + self.size / 2.0
    }
}

// ---------------------------------------------------------------------------
// Temporary effects (AOE zones)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Explosion,
    LightningStrike,
    GravityWell,
    VisionObscure,
    MeteorWarning,
    MeteorImpact,
    HealingBeam,
    BossBeam,
    GroundSlam,
    FrictionSpark,
}

/// Who an effect can damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Affects {
    Enemies,
    Player,
    Both,
    Nothing,
}

impl Affects {
    pub fn enemies(self) -> bool {
        matches!(self, Affects::Enemies | Affects::Both)
    }

    pub fn player(self) -> bool {
        matches!(self, Affects::Player | Affects::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryEffect {
    pub id: EntityId,
    pub kind: EffectKind,
    pub rect: Rect,
    pub affects: Affects,
    pub damage: Option<f32>,
    /// Seconds left before the effect is retired
    pub remaining: f32,
    /// Seconds before the effect starts dealing damage
    pub arm_delay: f32,
    /// Enemies this instance has already damaged (at most once each)
    pub hit_enemy_ids: BTreeSet<EntityId>,
    pub hit_player: bool,
    pub chain_depth: u32,
    /// Gravity-well pull strength (units/s toward the center)
    pub pull: f32,
    /// Linked entity (healing beam target, beam owner)
    pub link: Option<EntityId>,
}

impl TemporaryEffect {
    pub fn new(id: EntityId, kind: EffectKind, rect: Rect, affects: Affects, damage: Option<f32>, duration: f32) -> Self {
        Self {
            id,
            kind,
            rect,
            affects,
            damage,
            remaining: duration,
            arm_delay: 0.0,
            hit_enemy_ids: BTreeSet::new(),
            hit_player: false,
            chain_depth: 0,
            pull: 0.0,
            link: None,
        }
    }

    /// Circular-ish blast approximated by a square AABB
    pub fn blast(id: EntityId, kind: EffectKind, center: Vec2, radius: f32, affects: Affects, damage: f32, duration: f32) -> Self {
        Self::new(
            id,
            kind,
            Rect::from_center(center, Vec2::splat(radius * 2.0)),
            affects,
            Some(damage),
            duration,
        )
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.arm_delay <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Pickups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PickupKind {
    HealingOrb { amount: f32 },
    EntropicFragment { stacks: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub id: EntityId,
    pub kind: PickupKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub ttl: f32,
    pub grounded: bool,
}

impl Pickup {
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.pos, Vec2::splat(PICKUP_SIZE))
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Meteor shower world event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeteorShower {
    pub next_in: f32,
}

/// Complete committed world state for one run
#[derive(Debug, Clone)]
pub struct GameState {
    pub seed: u64,
    pub rng: Pcg32,
    /// World clock in seconds
    pub now: f64,
    pub tick: u64,
    pub phase: GamePhase,
    /// Current wave (1-based)
    pub wave: u32,
    pub level: u32,
    pub score: u64,
    pub kills: u64,
    /// Kills that count toward the current wave's requirement
    pub wave_kills: u32,
    /// Enemies spawned toward the current wave's requirement
    pub wave_spawned: u32,
    pub boss_spawned: bool,
    pub boss_killed: bool,
    pub spawn_timer: f32,
    pub meteor_shower: Option<MeteorShower>,
    pub ground: GroundProfile,
    pub player: Player,
    /// Sorted by id for deterministic iteration
    pub enemies: Vec<Enemy>,
    pub projectiles: Vec<Projectile>,
    pub effects: Vec<TemporaryEffect>,
    pub pickups: Vec<Pickup>,
    /// Upgrade ids offered while in `UpgradeChoice`
    pub pending_choices: Vec<UpgradeId>,
    pub rerolls_left: u32,
    /// Output of the tick in progress
    pub log: EventLog,
    next_id: EntityId,
}

impl GameState {
    pub fn new(seed: u64, player: Player, ground: GroundProfile) -> Self {
        let rerolls = player.stats.rerolls;
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            now: 0.0,
            tick: 0,
            phase: GamePhase::Playing,
            wave: 1,
            level: 1,
            score: 0,
            kills: 0,
            wave_kills: 0,
            wave_spawned: 0,
            boss_spawned: false,
            boss_killed: false,
            spawn_timer: 0.0,
            meteor_shower: None,
            ground,
            player,
            enemies: Vec::new(),
            projectiles: Vec::new(),
            effects: Vec::new(),
            pickups: Vec::new(),
            pending_choices: Vec::new(),
            rerolls_left: rerolls,
            log: EventLog::default(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }

    pub fn enemy_mut(&mut self, id: EntityId) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|e| e.id == id)
    }

    /// Is a boss on the field and past its entrance?
    pub fn boss_fight_active(&self) -> bool {
        self.enemies
            .iter()
            .any(|e| e.kind() == ArchetypeKind::Boss && e.is_targetable())
    }

    /// Nearest targetable enemy to `point`, ties broken by id
    pub fn nearest_targetable(&self, point: Vec2, exclude: &[EntityId]) -> Option<EntityId> {
        self.enemies
            .iter()
            .filter(|e| e.is_targetable() && !exclude.contains(&e.id))
            .map(|e| (e.center().distance_squared(point), e.id))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    /// Ensure entity lists are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.enemies.sort_by_key(|e| e.id);
        self.projectiles.sort_by_key(|p| p.id);
        self.effects.sort_by_key(|e| e.id);
        self.pickups.sort_by_key(|p| p.id);
    }
}
