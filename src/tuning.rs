//! Data-driven game balance
//!
//! Static configuration supplied at start-up: physics and timing values,
//! weapon/accessory tables and per-archetype base stats. Tables are data,
//! not behavior. Everything is validated once, before a run begins.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sim::geometry::GroundProfile;
use crate::sim::state::{ArchetypeKind, ProjectileKind};
use crate::sim::upgrade::Rarity;

/// Player base values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTuning {
    pub base_hp: f32,
    pub base_speed: f32,
    pub base_damage: f32,
    pub jump_power: f32,
    pub max_jumps: u32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    pub invulnerability_duration: f32,
    pub pickup_chance: f32,
    pub upgrade_choices: u32,
    pub rerolls_per_wave: u32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            base_hp: 100.0,
            base_speed: 260.0,
            base_damage: 10.0,
            jump_power: 620.0,
            max_jumps: 1,
            crit_chance: 0.05,
            crit_multiplier: 1.5,
            invulnerability_duration: 0.8,
            pickup_chance: 0.08,
            upgrade_choices: 3,
            rerolls_per_wave: 1,
        }
    }
}

/// Wave pacing and world events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveTuning {
    /// Seconds between spawns on wave 1
    pub spawn_interval: f32,
    /// Spawn interval multiplier per wave
    pub spawn_interval_decay: f32,
    pub min_spawn_interval: f32,
    /// Cap on simultaneously alive enemies
    pub max_alive: u32,
    /// Enemy HP growth per wave past the first
    pub hp_growth: f32,
    /// Enemy damage growth per wave past the first
    pub damage_growth: f32,
    /// Meteor showers run on waves where `wave % meteor_every == meteor_offset`
    pub meteor_every: u32,
    pub meteor_offset: u32,
    pub meteor_interval: f32,
    pub meteor_warning: f32,
    pub meteor_damage: f32,
    pub meteor_radius: f32,
}

impl Default for WaveTuning {
    fn default() -> Self {
        Self {
            spawn_interval: 1.6,
            spawn_interval_decay: 0.93,
            min_spawn_interval: 0.45,
            max_alive: 14,
            hp_growth: 0.15,
            damage_growth: 0.08,
            meteor_every: 4,
            meteor_offset: 3,
            meteor_interval: 2.2,
            meteor_warning: 1.2,
            meteor_damage: 22.0,
            meteor_radius: 48.0,
        }
    }
}

/// Draw weight per rarity tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityWeights {
    pub common: f32,
    pub uncommon: f32,
    pub rare: f32,
    pub epic: f32,
    pub legendary: f32,
    pub celestial: f32,
    /// How strongly luck shifts weight toward higher tiers
    pub luck_tier_scale: f32,
}

impl Default for RarityWeights {
    fn default() -> Self {
        Self {
            common: 100.0,
            uncommon: 55.0,
            rare: 25.0,
            epic: 10.0,
            legendary: 4.0,
            celestial: 1.0,
            luck_tier_scale: 0.5,
        }
    }
}

impl RarityWeights {
    pub fn base(&self, rarity: Rarity) -> f32 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Uncommon => self.uncommon,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
            Rarity::Celestial => self.celestial,
        }
    }

    /// Luck-adjusted weight: luck shrinks Common and grows every tier above
    /// it, proportionally more for higher tiers.
    pub fn weight(&self, rarity: Rarity, luck: f32) -> f32 {
        let luck = luck.max(0.0);
        let base = self.base(rarity);
        match rarity.tier() {
            0 => base / (1.0 + luck),
            tier => base * (1.0 + luck * tier as f32 * self.luck_tier_scale),
        }
    }
}

/// Weapon ("staff") definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponDef {
    pub id: String,
    pub name: String,
    pub damage_mult: f32,
    /// Seconds between shots before modifiers
    pub fire_interval: f32,
    pub projectile_speed: f32,
    pub pierce_bonus: u32,
    pub projectile: ProjectileKind,
    /// Built-in blast radius on impact (damage = half the shot)
    pub explosion_radius: Option<f32>,
}

/// Accessory bonuses folded into the modifier bag at run start
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryDef {
    pub id: String,
    pub name: String,
    pub max_hp: f32,
    pub speed_mult: f32,
    pub damage_mult: f32,
    pub crit_chance: f32,
    pub defense: f32,
    pub luck: f32,
    pub extra_jumps: u32,
    pub dodge_chance: f32,
    pub lifesteal: f32,
}

/// Base stats per enemy archetype (wave 1 values)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeStats {
    pub kind: ArchetypeKind,
    pub hp: f32,
    pub speed: f32,
    pub damage: f32,
    pub width: f32,
    pub height: f32,
    pub score: u64,
    pub attack_cooldown: f32,
    pub retarget_cooldown: f32,
    /// First wave this archetype can spawn on
    pub unlock_wave: u32,
}

impl ArchetypeStats {
    /// Built-in base stats for an archetype
    pub fn default_for(kind: ArchetypeKind) -> Self {
        use ArchetypeKind::*;
        #[rustfmt::skip]
        let (hp, speed, damage, width, height, score, attack, retarget, unlock) = match kind {
            Walker   => (30.0,   90.0,  10.0, 28.0,  32.0,  10, 0.0, 0.5, 1),
            Brute    => (120.0,  50.0,  25.0, 48.0,  56.0,  30, 0.0, 0.8, 3),
            Hopper   => (40.0,  170.0,  12.0, 30.0,  26.0,  15, 1.4, 0.6, 2),
            Bat      => (20.0,  140.0,   8.0, 26.0,  18.0,  12, 0.0, 0.4, 1),
            Ufo      => (60.0,   80.0,  12.0, 50.0,  24.0,  25, 2.0, 1.0, 4),
            Sniper   => (35.0,   70.0,  18.0, 26.0,  40.0,  25, 3.0, 1.0, 6),
            Dasher   => (50.0,   80.0,  20.0, 34.0,  30.0,  20, 2.5, 0.5, 4),
            Healer   => (45.0,   70.0,   0.0, 30.0,  34.0,  30, 2.0, 1.0, 7),
            Bomber   => (40.0,  100.0,  20.0, 40.0,  24.0,  25, 2.2, 0.8, 8),
            Splitter => (60.0,   70.0,  12.0, 40.0,  40.0,  20, 0.0, 0.6, 6),
            Caster   => (45.0,   60.0,  14.0, 30.0,  36.0,  25, 3.5, 1.2, 9),
            Phantom  => (40.0,  100.0,  15.0, 30.0,  40.0,  30, 4.0, 0.5, 11),
            Turret   => (80.0,    0.0,  10.0, 36.0,  36.0,  20, 2.4, 1.0, 8),
            Boss     => (1500.0, 70.0,  30.0, 120.0, 120.0, 500, 1.2, 1.5, 5),
        };
        Self {
            kind,
            hp,
            speed,
            damage,
            width,
            height,
            score,
            attack_cooldown: attack,
            retarget_cooldown: retarget,
            unlock_wave: unlock,
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Clamp range for per-tick delta time (seconds)
    pub min_dt: f32,
    pub max_dt: f32,
    pub gravity: f32,
    pub terminal_velocity: f32,
    /// Ground contour nodes `[x, y]`, sorted by x
    pub ground_nodes: Vec<[f32; 2]>,
    /// Recursion cap for chained explosions
    pub max_chain_depth: u32,
    pub player: PlayerTuning,
    pub waves: WaveTuning,
    pub rarity: RarityWeights,
    pub weapons: Vec<WeaponDef>,
    pub accessories: Vec<AccessoryDef>,
    pub archetypes: Vec<ArchetypeStats>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            min_dt: 0.008,
            max_dt: 0.05,
            gravity: 1500.0,
            terminal_velocity: 900.0,
            ground_nodes: vec![
                [0.0, 780.0],
                [200.0, 760.0],
                [400.0, 790.0],
                [600.0, 740.0],
                [800.0, 770.0],
                [1000.0, 730.0],
                [1200.0, 780.0],
                [1400.0, 750.0],
                [1600.0, 780.0],
            ],
            max_chain_depth: 3,
            player: PlayerTuning::default(),
            waves: WaveTuning::default(),
            rarity: RarityWeights::default(),
            weapons: default_weapons(),
            accessories: default_accessories(),
            archetypes: ArchetypeKind::ALL
                .iter()
                .map(|&k| ArchetypeStats::default_for(k))
                .collect(),
        }
    }
}

fn default_weapons() -> Vec<WeaponDef> {
    vec![
        WeaponDef {
            id: "arcane_staff".into(),
            name: "Arcane Staff".into(),
            damage_mult: 1.0,
            fire_interval: 0.35,
            projectile_speed: 720.0,
            pierce_bonus: 1,
            projectile: ProjectileKind::Bolt,
            explosion_radius: None,
        },
        WeaponDef {
            id: "ember_staff".into(),
            name: "Ember Staff".into(),
            damage_mult: 1.3,
            fire_interval: 0.55,
            projectile_speed: 560.0,
            pierce_bonus: 0,
            projectile: ProjectileKind::Ember,
            explosion_radius: Some(48.0),
        },
        WeaponDef {
            id: "storm_wand".into(),
            name: "Storm Wand".into(),
            damage_mult: 0.6,
            fire_interval: 0.16,
            projectile_speed: 900.0,
            pierce_bonus: 0,
            projectile: ProjectileKind::Spark,
            explosion_radius: None,
        },
    ]
}

fn default_accessories() -> Vec<AccessoryDef> {
    let base = AccessoryDef {
        speed_mult: 1.0,
        damage_mult: 1.0,
        ..Default::default()
    };
    vec![
        AccessoryDef {
            id: "none".into(),
            name: "Nothing".into(),
            ..base.clone()
        },
        AccessoryDef {
            id: "feather_boots".into(),
            name: "Feather Boots".into(),
            extra_jumps: 1,
            speed_mult: 1.1,
            ..base.clone()
        },
        AccessoryDef {
            id: "iron_amulet".into(),
            name: "Iron Amulet".into(),
            max_hp: 30.0,
            defense: 0.1,
            speed_mult: 0.95,
            ..base.clone()
        },
        AccessoryDef {
            id: "clover_charm".into(),
            name: "Clover Charm".into(),
            luck: 0.5,
            ..base.clone()
        },
        AccessoryDef {
            id: "hunter_lens".into(),
            name: "Hunter's Lens".into(),
            crit_chance: 0.15,
            ..base.clone()
        },
        AccessoryDef {
            id: "blood_ring".into(),
            name: "Blood Ring".into(),
            lifesteal: 0.05,
            max_hp: -10.0,
            ..base
        },
    ]
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32, expected: &'static str) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected,
            value,
        })
    }
}

impl SimConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed configuration before a run begins
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("min_dt", self.min_dt, 0.001, 0.25, "in [0.001, 0.25]")?;
        check_range("max_dt", self.max_dt, self.min_dt, 0.25, "in [min_dt, 0.25]")?;
        check_range("gravity", self.gravity, 1.0, 1e5, "positive")?;
        check_range("terminal_velocity", self.terminal_velocity, 1.0, 1e5, "positive")?;
        check_range("max_chain_depth", self.max_chain_depth as f32, 0.0, 16.0, "at most 16")?;
        self.ground()?;

        let p = &self.player;
        check_range("player.base_hp", p.base_hp, 1.0, 1e6, "positive")?;
        check_range("player.base_speed", p.base_speed, 0.0, 1e4, "non-negative")?;
        check_range("player.crit_chance", p.crit_chance, 0.0, 1.0, "in [0, 1]")?;
        check_range("player.crit_multiplier", p.crit_multiplier, 1.0, 100.0, "at least 1")?;
        check_range("player.invulnerability_duration", p.invulnerability_duration, 0.0, 10.0, "in [0, 10]")?;
        check_range("player.upgrade_choices", p.upgrade_choices as f32, 1.0, 10.0, "in [1, 10]")?;

        let w = &self.waves;
        check_range("waves.spawn_interval", w.spawn_interval, 0.01, 60.0, "positive")?;
        check_range("waves.min_spawn_interval", w.min_spawn_interval, 0.01, 60.0, "positive")?;
        check_range("waves.max_alive", w.max_alive as f32, 1.0, 1000.0, "in [1, 1000]")?;
        check_range("waves.meteor_every", w.meteor_every as f32, 1.0, 1000.0, "at least 1")?;

        for rarity in Rarity::ALL {
            check_range("rarity weight", self.rarity.base(rarity), 0.0001, 1e6, "positive")?;
        }

        if self.weapons.is_empty() {
            return Err(ConfigError::EmptyTable { table: "weapon" });
        }
        if self.accessories.is_empty() {
            return Err(ConfigError::EmptyTable { table: "accessory" });
        }
        for (i, weapon) in self.weapons.iter().enumerate() {
            if self.weapons[..i].iter().any(|o| o.id == weapon.id) {
                return Err(ConfigError::DuplicateId {
                    table: "weapon",
                    id: weapon.id.clone(),
                });
            }
            check_range("weapon.fire_interval", weapon.fire_interval, 0.01, 10.0, "in [0.01, 10]")?;
            check_range("weapon.projectile_speed", weapon.projectile_speed, 1.0, 1e4, "positive")?;
        }
        for (i, acc) in self.accessories.iter().enumerate() {
            if self.accessories[..i].iter().any(|o| o.id == acc.id) {
                return Err(ConfigError::DuplicateId {
                    table: "accessory",
                    id: acc.id.clone(),
                });
            }
        }
        for kind in ArchetypeKind::ALL {
            if !self.archetypes.iter().any(|a| a.kind == kind) {
                return Err(ConfigError::MissingArchetype(format!("{kind:?}")));
            }
        }
        Ok(())
    }

    /// Ground contour built from `ground_nodes`
    pub fn ground(&self) -> Result<GroundProfile, ConfigError> {
        let nodes = self
            .ground_nodes
            .iter()
            .map(|&[x, y]| Vec2::new(x, y))
            .collect();
        GroundProfile::new(nodes).ok_or(ConfigError::GroundProfile)
    }

    pub fn weapon(&self, id: &str) -> Option<&WeaponDef> {
        self.weapons.iter().find(|w| w.id == id)
    }

    pub fn accessory(&self, id: &str) -> Option<&AccessoryDef> {
        self.accessories.iter().find(|a| a.id == id)
    }

    /// Base stats for an archetype (validated to be present)
    pub fn archetype(&self, kind: ArchetypeKind) -> ArchetypeStats {
        self.archetypes
            .iter()
            .find(|a| a.kind == kind)
            .copied()
            .unwrap_or_else(|| ArchetypeStats::default_for(kind))
    }

    /// Clamp a host-supplied delta time into the configured range
    pub fn clamp_dt(&self, dt: f32) -> f32 {
        if dt.is_finite() {
            dt.clamp(self.min_dt, self.max_dt)
        } else {
            self.min_dt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_with_partial_fields() {
        let cfg = SimConfig::from_json(r#"{ "max_chain_depth": 5 }"#).unwrap();
        assert_eq!(cfg.max_chain_depth, 5);
        assert_eq!(cfg.weapons.len(), SimConfig::default().weapons.len());
    }

    #[test]
    fn test_malformed_config_fails_fast() {
        assert!(matches!(
            SimConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));

        let mut cfg = SimConfig::default();
        cfg.ground_nodes = vec![[10.0, 0.0], [5.0, 0.0]];
        assert_eq!(cfg.validate(), Err(ConfigError::GroundProfile));

        let mut cfg = SimConfig::default();
        cfg.weapons.push(cfg.weapons[0].clone());
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateId { .. })));

        let mut cfg = SimConfig::default();
        cfg.archetypes.retain(|a| a.kind != ArchetypeKind::Healer);
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingArchetype(_))));
    }

    #[test]
    fn test_clamp_dt() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.clamp_dt(5.0), cfg.max_dt);
        assert_eq!(cfg.clamp_dt(0.0), cfg.min_dt);
        assert_eq!(cfg.clamp_dt(f32::NAN), cfg.min_dt);
        assert_eq!(cfg.clamp_dt(0.016), 0.016);
    }

    #[test]
    fn test_luck_shifts_weight_upward() {
        let w = RarityWeights::default();
        assert!(w.weight(Rarity::Common, 1.0) < w.weight(Rarity::Common, 0.0));
        let rare_gain = w.weight(Rarity::Rare, 1.0) / w.weight(Rarity::Rare, 0.0);
        let celestial_gain = w.weight(Rarity::Celestial, 1.0) / w.weight(Rarity::Celestial, 0.0);
        assert!(celestial_gain > rare_gain && rare_gain > 1.0);
    }
}
