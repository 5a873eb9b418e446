//! Upgrade / modifier system
//!
//! A registry of modifier functions keyed by id, a rarity-weighted draw with
//! luck adjustment and `requires` gating, and composite upgrades that grant
//! several levels of another upgrade by re-running its `apply` function.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::*;
use crate::consts::{MAX_DEFENSE, MAX_DODGE};
use crate::error::{ConfigError, Rejected};
use crate::tuning::RarityWeights;

/// Rarity tier, ordered from most to least common
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Celestial,
}

impl Rarity {
    pub const ALL: [Rarity; 6] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Celestial,
    ];

    /// 0 for Common up to 5 for Celestial
    pub fn tier(self) -> u32 {
        self as u32
    }
}

/// Modifier function: mutate the bag for reaching `level` (1-based)
pub type ApplyFn = fn(&mut Stats, u32);

/// Immutable upgrade definition
#[derive(Debug, Clone)]
pub struct UpgradeDef {
    pub id: &'static str,
    pub name: &'static str,
    pub rarity: Rarity,
    pub max_level: Option<u32>,
    pub requires: &'static [&'static str],
    /// Composite: also grant this many levels of another upgrade
    pub grants: Option<(&'static str, u32)>,
    pub apply: ApplyFn,
}

impl UpgradeDef {
    fn at_max(&self, level: u32) -> bool {
        self.max_level.is_some_and(|max| level >= max)
    }
}

/// Result of applying an upgrade, including levels granted by a composite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedUpgrade {
    pub id: UpgradeId,
    pub level: u32,
    pub granted: Vec<(UpgradeId, u32)>,
}

/// Validated, immutable set of upgrade definitions
#[derive(Debug, Clone)]
pub struct UpgradeRegistry {
    defs: Vec<UpgradeDef>,
    index: BTreeMap<&'static str, usize>,
}

impl UpgradeRegistry {
    /// Build a registry, rejecting duplicate ids, dangling `requires`/`grants`
    /// references, self-dependencies and zero level caps.
    pub fn new(defs: Vec<UpgradeDef>) -> Result<Self, ConfigError> {
        if defs.is_empty() {
            return Err(ConfigError::EmptyTable { table: "upgrade" });
        }
        let mut index = BTreeMap::new();
        for (i, def) in defs.iter().enumerate() {
            if index.insert(def.id, i).is_some() {
                return Err(ConfigError::DuplicateId {
                    table: "upgrade",
                    id: def.id.to_string(),
                });
            }
        }
        for def in &defs {
            if def.max_level == Some(0) {
                return Err(ConfigError::ZeroMaxLevel(def.id.to_string()));
            }
            for req in def.requires {
                if *req == def.id {
                    return Err(ConfigError::SelfDependency(def.id.to_string()));
                }
                if !index.contains_key(req) {
                    return Err(ConfigError::UnknownRequirement {
                        upgrade: def.id.to_string(),
                        missing: req.to_string(),
                    });
                }
            }
            if let Some((target, _)) = def.grants {
                if target == def.id {
                    return Err(ConfigError::SelfDependency(def.id.to_string()));
                }
                if !index.contains_key(target) {
                    return Err(ConfigError::UnknownGrant {
                        upgrade: def.id.to_string(),
                        missing: target.to_string(),
                    });
                }
            }
        }
        Ok(Self { defs, index })
    }

    /// The built-in upgrade table
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(builtin_upgrades())
    }

    pub fn get(&self, id: &str) -> Option<&UpgradeDef> {
        self.index.get(id).map(|&i| &self.defs[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpgradeDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Below its level cap and every requirement owned
    pub fn is_available(&self, def: &UpgradeDef, owned: &BTreeMap<UpgradeId, u32>) -> bool {
        let level = owned.get(def.id).copied().unwrap_or(0);
        !def.at_max(level)
            && def
                .requires
                .iter()
                .all(|req| owned.get(*req).copied().unwrap_or(0) > 0)
    }

    /// Candidate pool in table order
    pub fn candidates(&self, owned: &BTreeMap<UpgradeId, u32>) -> Vec<&UpgradeDef> {
        self.defs
            .iter()
            .filter(|d| self.is_available(d, owned))
            .collect()
    }
}

/// Draw up to `count` distinct upgrade ids, weighted by luck-adjusted
/// rarity, without replacement. The result is sorted by rarity ascending
/// (draw order kept within a tier). Used for both wave-clear offers and
/// rerolls.
pub fn draw_choices<R: Rng + ?Sized>(
    registry: &UpgradeRegistry,
    owned: &BTreeMap<UpgradeId, u32>,
    luck: f32,
    count: usize,
    weights: &RarityWeights,
    rng: &mut R,
) -> Vec<UpgradeId> {
    let mut pool: Vec<(&UpgradeDef, f32)> = registry
        .candidates(owned)
        .into_iter()
        .map(|d| (d, weights.weight(d.rarity, luck).max(0.0)))
        .collect();

    let mut picked: Vec<&UpgradeDef> = Vec::with_capacity(count);
    while picked.len() < count && !pool.is_empty() {
        let total: f32 = pool.iter().map(|(_, w)| w).sum();
        let idx = if total > 0.0 {
            let mut roll = rng.random::<f32>() * total;
            let mut chosen = pool.len() - 1;
            for (i, (_, w)) in pool.iter().enumerate() {
                if roll < *w {
                    chosen = i;
                    break;
                }
                roll -= w;
            }
            chosen
        } else {
            rng.random_range(0..pool.len())
        };
        picked.push(pool.remove(idx).0);
    }

    picked.sort_by_key(|d| d.rarity);
    picked.into_iter().map(|d| d.id.to_string()).collect()
}

/// Raise `id` by one level on the player, running its modifier function.
/// Composite upgrades then re-run the granted upgrade's own `apply` once per
/// granted level, at increasing levels, stopping at that upgrade's cap.
pub fn apply_upgrade(registry: &UpgradeRegistry, player: &mut Player, id: &str) -> Result<AppliedUpgrade, Rejected> {
    let def = registry
        .get(id)
        .ok_or_else(|| Rejected::NotOffered(id.to_string()))?;
    let level = player.upgrade_level(def.id);
    if def.at_max(level) {
        return Err(Rejected::MaxLevel(id.to_string()));
    }

    let new_level = level + 1;
    player.owned_upgrades.insert(def.id.to_string(), new_level);
    (def.apply)(&mut player.stats, new_level);

    let mut granted = Vec::new();
    if let Some((target_id, stacks)) = def.grants {
        if let Some(target) = registry.get(target_id) {
            for _ in 0..stacks {
                let lvl = player.upgrade_level(target.id);
                if target.at_max(lvl) {
                    break;
                }
                player.owned_upgrades.insert(target.id.to_string(), lvl + 1);
                (target.apply)(&mut player.stats, lvl + 1);
                granted.push((target.id.to_string(), lvl + 1));
            }
        }
    }

    clamp_stats(&mut player.stats);
    player.jumps_left = player.jumps_left.min(player.stats.max_jumps);

    Ok(AppliedUpgrade {
        id: def.id.to_string(),
        level: new_level,
        granted,
    })
}

/// Keep stacked modifiers inside their legal ranges
fn clamp_stats(s: &mut Stats) {
    s.max_hp = s.max_hp.max(1.0);
    s.hp = s.hp.clamp(0.0, s.max_hp);
    s.speed = s.speed.max(0.0);
    s.damage = s.damage.max(0.0);
    s.fire_rate_mult = s.fire_rate_mult.max(0.15);
    s.crit_chance = s.crit_chance.clamp(0.0, 1.0);
    s.crit_multiplier = s.crit_multiplier.max(1.0);
    s.defense = s.defense.clamp(0.0, MAX_DEFENSE);
    s.dodge_chance = s.dodge_chance.clamp(0.0, MAX_DODGE);
    s.lifesteal = s.lifesteal.clamp(0.0, 1.0);
    s.luck = s.luck.max(0.0);
    s.pickup_chance = s.pickup_chance.clamp(0.0, 1.0);
    if let Some(l) = s.lightning.as_mut() {
        l.cooldown = l.cooldown.max(0.25);
    }
    if let Some(g) = s.gravity_well.as_mut() {
        g.cooldown = g.cooldown.max(0.5);
    }
    if let Some(shield) = s.shield.as_mut() {
        shield.max_cooldown = shield.max_cooldown.max(1.0);
        shield.cooldown_remaining = shield.cooldown_remaining.clamp(0.0, shield.max_cooldown);
    }
}

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

fn lightning_level(s: &mut Stats, level: u32) {
    let l = s.lightning.get_or_insert(LightningMod {
        strikes_per_cycle: 1,
        cooldown: 3.0,
        timer: 3.0,
        damage: 18.0,
    });
    if level > 1 {
        // Odd levels add a strike, even levels shorten the cycle
        if level % 2 == 1 {
            l.strikes_per_cycle += 1;
        } else {
            l.cooldown *= 0.85;
        }
        l.damage += 4.0;
    }
}

fn shield_level(s: &mut Stats, level: u32) {
    match s.shield.as_mut() {
        Some(shield) if level > 1 => shield.max_cooldown *= 0.8,
        Some(_) => {}
        None => s.shield = Some(ShieldState::new(12.0)),
    }
}

fn on_hit(slot: &mut Option<OnHitStatus>, base: OnHitStatus, chance_step: f32) {
    match slot.as_mut() {
        Some(s) => s.chance = (s.chance + chance_step).min(1.0),
        None => *slot = Some(base),
    }
}

#[rustfmt::skip]
fn builtin_upgrades() -> Vec<UpgradeDef> {
    use Rarity::*;
    vec![
        // Common
        UpgradeDef { id: "vitality", name: "Vitality", rarity: Common, max_level: None, requires: &[], grants: None,
            apply: |s, _| s.add_max_hp(20.0) },
        UpgradeDef { id: "swiftness", name: "Swiftness", rarity: Common, max_level: Some(5), requires: &[], grants: None,
            apply: |s, _| s.speed *= 1.07 },
        UpgradeDef { id: "sharpened", name: "Sharpened", rarity: Common, max_level: None, requires: &[], grants: None,
            apply: |s, level| s.damage += 1.5 + 0.5 * level as f32 },
        UpgradeDef { id: "rapid_fire", name: "Rapid Fire", rarity: Common, max_level: Some(8), requires: &[], grants: None,
            apply: |s, _| s.fire_rate_mult *= 0.92 },
        UpgradeDef { id: "iron_skin", name: "Iron Skin", rarity: Common, max_level: Some(8), requires: &[], grants: None,
            apply: |s, _| s.defense = (s.defense + 0.04).min(MAX_DEFENSE) },
        UpgradeDef { id: "lucky_charm", name: "Lucky Charm", rarity: Common, max_level: Some(6), requires: &[], grants: None,
            apply: |s, _| s.luck += 0.15 },
        UpgradeDef { id: "spring_boots", name: "Spring Boots", rarity: Common, max_level: Some(4), requires: &[], grants: None,
            apply: |s, _| s.jump_power += 50.0 },
        UpgradeDef { id: "velocity", name: "Velocity", rarity: Common, max_level: Some(5), requires: &[], grants: None,
            apply: |s, _| s.projectile_speed_mult += 0.1 },
        UpgradeDef { id: "regeneration", name: "Regeneration", rarity: Common, max_level: Some(5), requires: &[], grants: None,
            apply: |s, level| s.regen += 0.5 * level as f32 },

        // Uncommon
        UpgradeDef { id: "double_jump", name: "Double Jump", rarity: Uncommon, max_level: Some(2), requires: &[], grants: None,
            apply: |s, _| s.max_jumps += 1 },
        UpgradeDef { id: "precision", name: "Precision", rarity: Uncommon, max_level: Some(6), requires: &[], grants: None,
            apply: |s, _| s.crit_chance = (s.crit_chance + 0.05).min(1.0) },
        UpgradeDef { id: "piercing", name: "Piercing", rarity: Uncommon, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| s.pierce += 1 },
        UpgradeDef { id: "ricochet", name: "Ricochet", rarity: Uncommon, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| s.bounces += 1 },
        UpgradeDef { id: "evasion", name: "Evasion", rarity: Uncommon, max_level: Some(5), requires: &[], grants: None,
            apply: |s, _| s.dodge_chance = (s.dodge_chance + 0.04).min(MAX_DODGE) },
        UpgradeDef { id: "vampirism", name: "Vampirism", rarity: Uncommon, max_level: Some(5), requires: &[], grants: None,
            apply: |s, _| s.lifesteal += 0.02 },
        UpgradeDef { id: "thorns", name: "Thorns", rarity: Uncommon, max_level: Some(5), requires: &[], grants: None,
            apply: |s, level| s.thorns += 5.0 + 3.0 * level as f32 },
        UpgradeDef { id: "fortune", name: "Fortune", rarity: Uncommon, max_level: Some(2), requires: &[], grants: None,
            apply: |s, _| s.rerolls += 1 },
        UpgradeDef { id: "scavenger", name: "Scavenger", rarity: Uncommon, max_level: Some(4), requires: &[], grants: None,
            apply: |s, _| s.pickup_chance += 0.04 },

        // Rare
        UpgradeDef { id: "homing", name: "Seeker Bolts", rarity: Rare, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| match s.homing.as_mut() {
                Some(h) => h.strength = (h.strength + 0.015).min(0.1),
                None => s.homing = Some(HomingMod { strength: 0.06 }),
            } },
        UpgradeDef { id: "shield", name: "Arcane Shield", rarity: Rare, max_level: Some(4), requires: &[], grants: None,
            apply: shield_level },
        UpgradeDef { id: "thunderbolt", name: "Thunderbolt", rarity: Rare, max_level: Some(7), requires: &[], grants: None,
            apply: lightning_level },
        UpgradeDef { id: "shrapnel", name: "Shrapnel", rarity: Rare, max_level: Some(5), requires: &[], grants: None,
            apply: |s, _| match s.shrapnel.as_mut() {
                Some(m) => { m.count += 1; m.damage += 2.0; }
                None => s.shrapnel = Some(ShrapnelMod { count: 3, damage: 5.0 }),
            } },
        UpgradeDef { id: "frost_rounds", name: "Frost Rounds", rarity: Rare, max_level: Some(4), requires: &[], grants: None,
            apply: |s, _| {
                on_hit(&mut s.frost, OnHitStatus { chance: 0.25, duration: 1.5, magnitude: 0.6 }, 0.1);
                if let Some(f) = s.frost.as_mut() { f.magnitude = (f.magnitude * 0.95).max(0.3); }
            } },
        UpgradeDef { id: "multishot", name: "Multishot", rarity: Rare, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| { s.projectile_count += 1; s.damage *= 0.92; } },
        UpgradeDef { id: "stunning_blow", name: "Stunning Blow", rarity: Rare, max_level: Some(4), requires: &[], grants: None,
            apply: |s, _| on_hit(&mut s.stun, OnHitStatus { chance: 0.1, duration: 0.6, magnitude: 0.0 }, 0.05) },

        // Epic
        UpgradeDef { id: "chain_reaction", name: "Chain Reaction", rarity: Epic, max_level: Some(3), requires: &["shrapnel"], grants: None,
            apply: |s, _| match s.chain_explosion.as_mut() {
                Some(c) => { c.radius += 10.0; c.damage += 5.0; }
                None => s.chain_explosion = Some(ChainExplosionMod { radius: 60.0, damage: 15.0 }),
            } },
        UpgradeDef { id: "storm_caller", name: "Storm Caller", rarity: Epic, max_level: Some(2), requires: &["thunderbolt"], grants: None,
            apply: |s, level| {
                lightning_level(s, 1);
                if let Some(l) = s.lightning.as_mut() {
                    l.strikes_per_cycle += 2;
                    l.cooldown *= if level == 1 { 0.8 } else { 0.9 };
                }
            } },
        UpgradeDef { id: "hex", name: "Hex", rarity: Epic, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| {
                on_hit(&mut s.curse, OnHitStatus { chance: 0.2, duration: 3.0, magnitude: 0.25 }, 0.1);
            } },
        UpgradeDef { id: "gravity_well", name: "Gravity Well", rarity: Epic, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| match s.gravity_well.as_mut() {
                Some(g) => { g.cooldown *= 0.85; g.damage += 8.0; }
                None => s.gravity_well = Some(GravityWellMod { cooldown: 6.0, timer: 6.0, radius: 110.0, damage: 20.0, pull: 260.0 }),
            } },
        UpgradeDef { id: "friction", name: "Friction", rarity: Epic, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| match s.friction.as_mut() {
                Some(f) => { f.distance_per_charge *= 0.8; f.damage += 6.0; }
                None => s.friction = Some(FrictionMod { distance_per_charge: 240.0, damage: 14.0, radius: 40.0 }),
            } },
        UpgradeDef { id: "silencer", name: "Silencer", rarity: Epic, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| on_hit(&mut s.silence, OnHitStatus { chance: 0.2, duration: 2.0, magnitude: 0.0 }, 0.1) },
        UpgradeDef { id: "explosive_rounds", name: "Explosive Rounds", rarity: Epic, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| match s.explosive_rounds.as_mut() {
                Some(e) => { e.radius += 8.0; e.damage_frac += 0.15; }
                None => s.explosive_rounds = Some(ExplosiveRounds { radius: 36.0, damage_frac: 0.4 }),
            } },

        // Legendary
        UpgradeDef { id: "ghost_shot", name: "Ghost Shot", rarity: Legendary, max_level: Some(3), requires: &["piercing"], grants: None,
            apply: |s, level| s.ghost_shot = Some(0.15 + 0.1 * level as f32) },
        UpgradeDef { id: "executioner", name: "Executioner", rarity: Legendary, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| s.crit_multiplier += 0.5 },
        UpgradeDef { id: "adrenaline", name: "Adrenaline", rarity: Legendary, max_level: Some(3), requires: &[], grants: None,
            apply: |s, _| match s.haste_on_kill.as_mut() {
                Some(h) => { h.chance = (h.chance + 0.1).min(1.0); h.duration += 1.0; }
                None => s.haste_on_kill = Some(HasteOnKill { chance: 0.15, duration: 3.0, factor: 0.6 }),
            } },
        UpgradeDef { id: "titan", name: "Titan", rarity: Legendary, max_level: Some(2), requires: &[], grants: None,
            apply: |s, _| { s.add_max_hp(60.0); s.defense = (s.defense + 0.05).min(MAX_DEFENSE); s.speed *= 0.95; } },

        // Celestial (ascensions)
        UpgradeDef { id: "thunder_ascension", name: "Ascension: Thunder", rarity: Celestial, max_level: Some(1), requires: &["thunderbolt"], grants: Some(("thunderbolt", 5)),
            apply: |s, _| { if let Some(l) = s.lightning.as_mut() { l.damage *= 1.5; } } },
        UpgradeDef { id: "blade_ascension", name: "Ascension: Blade", rarity: Celestial, max_level: Some(1), requires: &["sharpened"], grants: Some(("sharpened", 8)),
            apply: |s, _| s.crit_multiplier += 0.25 },
        UpgradeDef { id: "aegis_ascension", name: "Ascension: Aegis", rarity: Celestial, max_level: Some(1), requires: &["shield"], grants: Some(("shield", 3)),
            apply: |s, _| s.invulnerability_duration += 0.4 },
    ]
}
