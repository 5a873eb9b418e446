//! Damage resolution
//!
//! One pass per tick, in a fixed order:
//! 1. player projectiles vs enemies (closest first, then by id)
//! 2. area effects vs enemies, at most once per enemy per effect
//! 3. accumulated damage applied once per enemy; kills committed once,
//!    including chained explosions up to `max_chain_depth`
//! 4. incoming damage to the player in id order
//!
//! Damage is summed per enemy before any HP changes, so two hits in the same
//! tick can never kill the same enemy twice.

use std::collections::{BTreeMap, BTreeSet};
use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use super::enemy::build_enemy;
use super::events::{GameEvent, SoundCue, TextStyle};
use super::geometry::intersects;
use super::pickup::roll_drop;
use super::player::grant_haste;
use super::state::*;
use crate::consts::*;
use crate::direction_to;
use crate::tuning::SimConfig;

/// Damage queued against one enemy this pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct QueuedHit {
    amount: f32,
    /// Deepest chain depth among the sources; a kill inherits it
    depth: u32,
}

/// Damage queued per enemy, applied once
type DamageMap = BTreeMap<EntityId, QueuedHit>;

const SHRAPNEL_SPEED: f32 = 420.0;
const SPLITTER_MAX_GENERATION: u8 = 1;
const SPLITTER_CHILD_SCALE: f32 = 0.7;
const SPLITTER_CHILD_HP: f32 = 0.4;

/// Where a hit on the player came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Projectile,
    Contact(EntityId),
    Effect,
}

/// Resolve every collision of the tick
pub fn resolve_damage(next: &mut GameState, cfg: &SimConfig) {
    let mut hits = DamageMap::new();
    let mut exploded = BTreeSet::new();

    let lifesteal = player_projectile_hits(next, &mut hits);
    if lifesteal > 0.0 {
        let healed = next.player.stats.heal(lifesteal);
        if healed >= 1.0 {
            let pos = next.player.center();
            next.log.text(pos, format!("+{healed:.0}"), TextStyle::Heal);
        }
    }

    effect_hits_on_enemies(next, &mut hits);
    commit_damage(next, cfg, hits, &mut exploded);

    let thorns = player_incoming(next);
    commit_damage(next, cfg, thorns, &mut exploded);

    // Non-animated kills leave immediately
    next.enemies
        .retain(|e| !matches!(e.vitality, Vitality::Dying { remaining } if remaining <= 0.0));
}

/// Queue `amount` against an enemy, amplified by its curse
fn queue_hit(state: &GameState, hits: &mut DamageMap, id: EntityId, amount: f32, depth: u32) -> f32 {
    let factor = state
        .enemy(id)
        .map_or(1.0, |e| e.status.damage_taken_factor(state.now));
    let dealt = amount.max(0.0) * factor;
    let hit = hits.entry(id).or_default();
    hit.amount += dealt;
    hit.depth = hit.depth.max(depth);
    dealt
}

/// Step 1. Returns the lifesteal earned.
fn player_projectile_hits(state: &mut GameState, hits: &mut DamageMap) -> f32 {
    let mut projectiles = std::mem::take(&mut state.projectiles);
    let mut consumed: BTreeSet<EntityId> = BTreeSet::new();
    let mut lifesteal = 0.0;

    for p in projectiles.iter_mut().filter(|p| p.owner == Owner::Player) {
        let rect = p.rect();
        let mut targets: Vec<(f32, EntityId)> = state
            .enemies
            .iter()
            .filter(|e| e.is_targetable() && !p.hit_ids.contains(&e.id) && intersects(rect, e.rect()))
            .map(|e| (e.rect().distance_sq_to(&rect), e.id))
            .collect();
        targets.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut spent = false;
        for (_, id) in targets {
            let stats = &state.player.stats;
            let crit = state.rng.random::<f32>() < stats.crit_chance;
            let raw = if crit { p.damage * stats.crit_multiplier } else { p.damage };
            let lifesteal_frac = stats.lifesteal;
            let dealt = queue_hit(state, hits, id, raw, p.chain_depth);
            p.hit_ids.push(id);
            lifesteal += dealt * lifesteal_frac;

            if let Some(e) = state.enemy(id) {
                let at = e.center();
                let (style, cue) = if crit {
                    (TextStyle::Crit, SoundCue::Crit)
                } else {
                    (TextStyle::Damage, SoundCue::Hit)
                };
                state.log.text(at, format!("{dealt:.0}"), style);
                state.log.sound(cue);
                apply_procs(state, id, at, dealt, p.chain_depth);
            }

            if p.pierce_left == 0 {
                spent = true;
                break;
            }
            let spared = state
                .player
                .stats
                .ghost_shot
                .is_some_and(|chance| state.rng.random::<f32>() < chance);
            if !spared {
                p.pierce_left -= 1;
            }
        }

        if spent {
            if let Some(ex) = p.explosion {
                let id = state.next_entity_id();
                let mut blast =
                    TemporaryEffect::blast(id, EffectKind::Explosion, p.center(), ex.radius, Affects::Enemies, ex.damage, 0.25);
                blast.hit_enemy_ids.extend(p.hit_ids.last().copied());
                blast.chain_depth = p.chain_depth;
                state.effects.push(blast);
                state.log.sound(SoundCue::Explosion);
            }
            if p.bounces_left > 0 {
                p.bounces_left -= 1;
                bounce(state, p);
            } else {
                consumed.insert(p.id);
            }
        }
    }

    projectiles.retain(|p| !consumed.contains(&p.id));
    state.projectiles = projectiles;
    lifesteal
}

/// Re-aim a spent projectile at the nearest enemy it has not hit, or send it back
fn bounce(state: &GameState, p: &mut Projectile) {
    let speed = p.vel.length();
    let from = p.center();
    match state
        .nearest_targetable(from, &p.hit_ids)
        .and_then(|id| state.enemy(id))
    {
        Some(target) => {
            p.vel = direction_to(from, target.center(), -p.vel.normalize_or_zero()) * speed;
        }
        None => p.vel = -p.vel,
    }
}

/// On-hit status procs and explosive rounds
fn apply_procs(state: &mut GameState, id: EntityId, at: Vec2, dealt: f32, chain_depth: u32) {
    let now = state.now;
    let stats = state.player.stats.clone();
    let mut roll = |chance: f32| state.rng.random::<f32>() < chance;

    let frost = stats.frost.filter(|s| roll(s.chance));
    let stun = stats.stun.filter(|s| roll(s.chance));
    let silence = stats.silence.filter(|s| roll(s.chance));
    let curse = stats.curse.filter(|s| roll(s.chance));

    if let Some(e) = state.enemy_mut(id) {
        if let Some(s) = frost {
            e.status.apply_slow(now, s.duration, s.magnitude);
        }
        if let Some(s) = stun {
            e.status.apply_stun(now, s.duration);
        }
        if let Some(s) = silence {
            e.status.apply_silence(now, s.duration);
        }
        if let Some(s) = curse {
            e.status.apply_curse(now, s.duration, s.magnitude);
        }
    }

    if let Some(er) = stats.explosive_rounds {
        let fx_id = state.next_entity_id();
        let mut blast = TemporaryEffect::blast(
            fx_id,
            EffectKind::Explosion,
            at,
            er.radius,
            Affects::Enemies,
            dealt * er.damage_frac,
            0.2,
        );
        blast.hit_enemy_ids.insert(id);
        blast.chain_depth = chain_depth;
        state.effects.push(blast);
    }
}

/// Step 2. Effects hit each enemy at most once over their whole lifetime.
fn effect_hits_on_enemies(state: &mut GameState, hits: &mut DamageMap) {
    let mut effects = std::mem::take(&mut state.effects);
    for fx in effects
        .iter_mut()
        .filter(|fx| fx.affects.enemies() && fx.is_armed())
    {
        let Some(damage) = fx.damage else {
            continue;
        };
        let struck: Vec<EntityId> = state
            .enemies
            .iter()
            .filter(|e| e.is_targetable() && !fx.hit_enemy_ids.contains(&e.id) && intersects(fx.rect, e.rect()))
            .map(|e| e.id)
            .collect();
        for id in struck {
            fx.hit_enemy_ids.insert(id);
            let dealt = queue_hit(state, hits, id, damage, fx.chain_depth);
            if let Some(e) = state.enemy(id) {
                let at = e.center();
                state.log.text(at, format!("{dealt:.0}"), TextStyle::Damage);
            }
        }
    }
    state.effects = effects;
}

/// Step 3. Apply queued damage once per enemy and commit kills. A kill
/// inherits the chain depth of the hit that caused it; chain explosions
/// queue another round until `max_chain_depth`.
fn commit_damage(state: &mut GameState, cfg: &SimConfig, mut hits: DamageMap, exploded: &mut BTreeSet<EntityId>) {
    while !hits.is_empty() {
        let batch = std::mem::take(&mut hits);
        let mut killed = Vec::new();
        for (id, hit) in batch {
            let Some(e) = state.enemy_mut(id) else {
                continue;
            };
            if !e.is_alive() {
                continue;
            }
            e.hp = (e.hp - hit.amount).max(0.0);
            if e.hp <= 0.0 {
                // The alive -> dying edge happens exactly once
                e.vitality = Vitality::Dying {
                    remaining: death_animation(e.kind()),
                };
                killed.push((id, hit.depth));
            }
        }
        for (id, depth) in killed {
            on_kill(state, cfg, id, depth, exploded, &mut hits);
        }
    }
}

fn death_animation(kind: ArchetypeKind) -> f32 {
    match kind {
        ArchetypeKind::Boss => 1.5,
        k if k.has_death_animation() => 0.6,
        _ => 0.0,
    }
}

/// Kill side effects. Runs once per enemy.
fn on_kill(state: &mut GameState, cfg: &SimConfig, id: EntityId, depth: u32, exploded: &mut BTreeSet<EntityId>, hits: &mut DamageMap) {
    let Some(e) = state.enemy(id) else {
        return;
    };
    let kind = e.kind();
    let center = e.center();
    let score = e.score;
    let minion = e.minion;
    let size = e.size;
    let max_hp = e.max_hp;
    let generation = match e.archetype {
        Archetype::Splitter { generation } => Some(generation),
        _ => None,
    };

    state.score += score;
    state.kills += 1;
    if !minion {
        state.wave_kills += 1;
    }
    state.log.event(GameEvent::EnemyKilled {
        id,
        archetype: kind,
        score,
    });
    state.log.sound(SoundCue::EnemyDeath);
    state.log.text(center - Vec2::new(0.0, 20.0), format!("+{score}"), TextStyle::Info);

    if kind == ArchetypeKind::Boss {
        state.boss_killed = true;
        log::info!("Boss defeated on wave {}", state.wave);
        state.log.event(GameEvent::BossDefeated { wave: state.wave });
        state.log.sound(SoundCue::BossDefeated);
    }

    roll_drop(state, center);

    let stats = &state.player.stats;
    let shrapnel = stats.shrapnel;
    let haste = stats.haste_on_kill;
    let chain = stats.chain_explosion;

    if let Some(s) = shrapnel {
        let offset = state.rng.random_range(0.0..TAU);
        for i in 0..s.count {
            let angle = offset + TAU * i as f32 / s.count.max(1) as f32;
            let pid = state.next_entity_id();
            let mut shard = Projectile::new(
                pid,
                Owner::Player,
                ProjectileKind::Shrapnel,
                center,
                Vec2::from_angle(angle) * SHRAPNEL_SPEED,
                SHRAPNEL_SIZE,
                s.damage,
            );
            shard.ttl = 0.6;
            shard.hit_ids.push(id);
            shard.chain_depth = depth;
            state.projectiles.push(shard);
        }
    }

    if let Some(h) = haste {
        if state.rng.random::<f32>() < h.chance {
            grant_haste(state, h.duration, h.factor);
        }
    }

    if let Some(generation) = generation.filter(|g| *g < SPLITTER_MAX_GENERATION) {
        for side in [-1.0f32, 1.0] {
            let pos = center + Vec2::new(side * size.x * 0.4, -size.y * 0.5);
            let mut child = build_enemy(state, cfg, ArchetypeKind::Splitter, pos);
            child.archetype = Archetype::Splitter {
                generation: generation + 1,
            };
            child.size = size * SPLITTER_CHILD_SCALE;
            child.max_hp = (max_hp * SPLITTER_CHILD_HP).max(1.0);
            child.hp = child.max_hp;
            child.vel = Vec2::new(side * 150.0, -300.0);
            child.entering = false;
            child.minion = true;
            state.enemies.push(child);
        }
    }

    if let Some(ch) = chain {
        if depth < cfg.max_chain_depth && exploded.insert(id) {
            let fx_id = state.next_entity_id();
            let mut blast =
                TemporaryEffect::blast(fx_id, EffectKind::Explosion, center, ch.radius, Affects::Enemies, ch.damage, 0.25);
            blast.chain_depth = depth + 1;
            let struck: Vec<EntityId> = state
                .enemies
                .iter()
                .filter(|o| o.is_targetable() && intersects(blast.rect, o.rect()))
                .map(|o| o.id)
                .collect();
            for other in struck {
                blast.hit_enemy_ids.insert(other);
                queue_hit(state, hits, other, ch.damage, depth + 1);
            }
            state.effects.push(blast);
            state.log.sound(SoundCue::Explosion);
        }
    }
}

/// Step 4. Returns thorns damage to feed back into the enemy pass.
fn player_incoming(state: &mut GameState) -> DamageMap {
    let now = state.now;
    let player_rect = state.player.rect();
    let mut sources: Vec<(EntityId, f32, Source)> = Vec::new();

    let mut absorbed = BTreeSet::new();
    for p in state
        .projectiles
        .iter()
        .filter(|p| p.owner == Owner::Enemy && intersects(p.rect(), player_rect))
    {
        sources.push((p.id, p.damage, Source::Projectile));
        absorbed.insert(p.id);
    }
    for e in state
        .enemies
        .iter()
        .filter(|e| e.deals_contact_damage() && intersects(e.rect(), player_rect))
    {
        sources.push((e.id, e.damage, Source::Contact(e.id)));
    }
    for fx in state.effects.iter_mut().filter(|fx| {
        fx.affects.player() && fx.is_armed() && !fx.hit_player && fx.damage.is_some() && intersects(fx.rect, player_rect)
    }) {
        fx.hit_player = true;
        sources.push((fx.id, fx.damage.unwrap_or(0.0), Source::Effect));
    }
    // Enemy shots break on the player whether or not they hurt
    state.projectiles.retain(|p| !absorbed.contains(&p.id));

    sources.sort_by_key(|s| s.0);

    let mut thorns = DamageMap::new();
    for (_, raw, source) in sources {
        if state.player.is_invulnerable(now) {
            continue;
        }
        let pos = state.player.center();
        let stats = &state.player.stats;
        let dodge = stats.dodge_chance.clamp(0.0, 1.0);
        let invuln = stats.invulnerability_duration.max(0.0) as f64;
        let defense = stats.defense.clamp(0.0, MAX_DEFENSE);
        let thorns_dmg = stats.thorns;

        if dodge > 0.0 && state.rng.random::<f32>() < dodge {
            state.log.event(GameEvent::Dodged);
            state.log.sound(SoundCue::Dodge);
            state.log.text(pos, "DODGE", TextStyle::Dodge);
            continue;
        }

        if let Some(shield) = state.player.stats.shield.as_mut() {
            if shield.break_shield() {
                state.player.invulnerable_until = now + invuln;
                state.log.event(GameEvent::ShieldBroken);
                state.log.sound(SoundCue::ShieldBreak);
                state.log.text(pos, "BLOCKED", TextStyle::Blocked);
                continue;
            }
        }

        let amount = raw.max(0.0) * (1.0 - defense);
        state.player.stats.lose_hp(amount);
        state.player.invulnerable_until = now + invuln;
        let hp = state.player.stats.hp;
        state.log.event(GameEvent::PlayerDamaged { amount, hp });
        state.log.sound(SoundCue::PlayerHurt);
        state.log.text(pos, format!("-{amount:.0}"), TextStyle::PlayerDamage);

        if let Source::Contact(enemy) = source {
            if thorns_dmg > 0.0 {
                queue_hit(state, &mut thorns, enemy, thorns_dmg, 0);
            }
        }
    }
    thorns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::BuffKind;
    use crate::sim::status::StatusFlags;
    use crate::sim::testutil::{spawn_enemy, test_state};

    fn player_shot(state: &mut GameState, at: Vec2, damage: f32) -> EntityId {
        let id = state.next_entity_id();
        let p = Projectile::new(id, Owner::Player, ProjectileKind::Bolt, at, Vec2::new(1.0, 0.0), PLAYER_SHOT_SIZE, damage);
        state.projectiles.push(p);
        id
    }

    fn no_crit(state: &mut GameState) {
        state.player.stats.crit_chance = 0.0;
        state.player.stats.pickup_chance = 0.0;
    }

    #[test]
    fn test_crit_scenario_two_hits() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        state.player.stats.crit_chance = 1.0;
        state.player.stats.crit_multiplier = 1.5;
        state.player.stats.pickup_chance = 0.0;
        let id = spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(800.0, 300.0));
        state.enemy_mut(id).unwrap().hp = 20.0;
        let at = state.enemy(id).unwrap().center();

        player_shot(&mut state, at, 10.0);
        resolve_damage(&mut state, &cfg);
        let e = state.enemy(id).unwrap();
        assert!(e.is_alive());
        assert_eq!(e.hp, 5.0);

        player_shot(&mut state, at, 10.0);
        resolve_damage(&mut state, &cfg);
        assert!(state.enemy(id).is_none());
        assert_eq!(state.kills, 1);
    }

    #[test]
    fn test_pierce_exhausted_on_third_hit() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let ids: Vec<EntityId> = (0..4)
            .map(|i| spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0 + i as f32 * 2.0, 300.0)))
            .collect();
        let at = state.enemy(ids[0]).unwrap().center();
        let shot = player_shot(&mut state, at, 1.0);
        state.projectiles[0].pierce_left = 2;

        resolve_damage(&mut state, &cfg);
        assert!(state.projectiles.iter().all(|p| p.id != shot));
        let damaged = ids
            .iter()
            .filter(|id| {
                let e = state.enemy(**id).unwrap();
                e.hp < e.max_hp
            })
            .count();
        assert_eq!(damaged, 3);
    }

    #[test]
    fn test_pierce_survives_until_budget_spent() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let id = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 1.0);
        state.projectiles[0].pierce_left = 2;

        resolve_damage(&mut state, &cfg);
        assert_eq!(state.projectiles.len(), 1);
        assert_eq!(state.projectiles[0].pierce_left, 1);
        // Same enemy is never struck twice by one projectile
        resolve_damage(&mut state, &cfg);
        let e = state.enemy(id).unwrap();
        assert_eq!(e.max_hp - e.hp, 1.0);
    }

    #[test]
    fn test_same_tick_hits_sum_and_kill_once() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let id = spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(800.0, 300.0));
        state.enemy_mut(id).unwrap().hp = 15.0;
        let score = state.enemy(id).unwrap().score;
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 10.0);
        player_shot(&mut state, at, 10.0);

        resolve_damage(&mut state, &cfg);
        assert_eq!(state.kills, 1);
        assert_eq!(state.score, score);
        let killed = state
            .log
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::EnemyKilled { .. }))
            .count();
        assert_eq!(killed, 1);
    }

    #[test]
    fn test_effect_hits_each_enemy_once() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        let a = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let b = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(830.0, 300.0));
        let center = state.enemy(a).unwrap().center();
        let fx = state.next_entity_id();
        state
            .effects
            .push(TemporaryEffect::blast(fx, EffectKind::Explosion, center, 100.0, Affects::Enemies, 7.0, 1.0));

        for _ in 0..5 {
            resolve_damage(&mut state, &cfg);
        }
        for id in [a, b] {
            let e = state.enemy(id).unwrap();
            assert_eq!(e.max_hp - e.hp, 7.0);
        }
        assert_eq!(state.effects[0].hit_enemy_ids.len(), 2);
    }

    #[test]
    fn test_curse_amplifies_damage() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let id = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        state.enemy_mut(id).unwrap().status.apply_curse(0.0, 5.0, 0.5);
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 10.0);
        resolve_damage(&mut state, &cfg);
        let e = state.enemy(id).unwrap();
        assert!((e.max_hp - e.hp - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_invulnerability_blocks_repeat_hits() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        state.player.stats.dodge_chance = 0.0;
        let at = state.player.pos;
        for _ in 0..3 {
            spawn_enemy(&mut state, ArchetypeKind::Walker, at);
        }
        let hp = state.player.stats.hp;
        resolve_damage(&mut state, &cfg);
        let after = state.player.stats.hp;
        let until = state.player.invulnerable_until;
        assert_eq!(hp - after, state.enemies[0].damage);
        assert!((until - (state.now + state.player.stats.invulnerability_duration as f64)).abs() < 1e-9);

        resolve_damage(&mut state, &cfg);
        assert_eq!(state.player.stats.hp, after);
        assert_eq!(state.player.invulnerable_until, until);
    }

    #[test]
    fn test_shield_blocks_and_grants_invulnerability() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        state.player.stats.shield = Some(ShieldState::new(5.0));
        let at = state.player.pos;
        spawn_enemy(&mut state, ArchetypeKind::Walker, at);
        let hp = state.player.stats.hp;
        resolve_damage(&mut state, &cfg);
        assert_eq!(state.player.stats.hp, hp);
        assert!(state.player.is_invulnerable(state.now));
        assert!(!state.player.stats.shield.unwrap().active);
        assert!(state.log.events.contains(&GameEvent::ShieldBroken));
    }

    #[test]
    fn test_dodge_skips_damage() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        state.player.stats.dodge_chance = 1.0;
        let at = state.player.pos;
        spawn_enemy(&mut state, ArchetypeKind::Walker, at);
        let hp = state.player.stats.hp;
        resolve_damage(&mut state, &cfg);
        assert_eq!(state.player.stats.hp, hp);
        assert!(!state.player.is_invulnerable(state.now));
    }

    #[test]
    fn test_defense_and_thorns() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        state.player.stats.defense = 0.5;
        state.player.stats.thorns = 4.0;
        let at = state.player.pos;
        let id = spawn_enemy(&mut state, ArchetypeKind::Brute, at);
        let dmg = state.enemy(id).unwrap().damage;
        let hp = state.player.stats.hp;
        resolve_damage(&mut state, &cfg);
        assert!((hp - state.player.stats.hp - dmg * 0.5).abs() < 1e-4);
        let e = state.enemy(id).unwrap();
        assert_eq!(e.max_hp - e.hp, 4.0);
    }

    #[test]
    fn test_enemy_shot_consumed_by_player() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        let at = state.player.center();
        let id = state.next_entity_id();
        state.projectiles.push(Projectile::new(id, Owner::Enemy, ProjectileKind::EnemyShot, at, Vec2::ZERO, ENEMY_SHOT_SIZE, 5.0));
        let hp = state.player.stats.hp;
        resolve_damage(&mut state, &cfg);
        assert!(state.projectiles.is_empty());
        assert_eq!(hp - state.player.stats.hp, 5.0);
    }

    #[test]
    fn test_chain_explosions_bounded_and_once_per_enemy() {
        let mut cfg = SimConfig::default();
        cfg.max_chain_depth = 2;
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.chain_explosion = Some(ChainExplosionMod {
            radius: 40.0,
            damage: 100.0,
        });
        // A row of weak enemies 50 units apart: each blast reaches only its neighbours
        let ids: Vec<EntityId> = (0..6)
            .map(|i| spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(300.0 + i as f32 * 50.0, 300.0)))
            .collect();
        let at = state.enemy(ids[0]).unwrap().center();
        player_shot(&mut state, at, 1000.0);

        resolve_damage(&mut state, &cfg);
        // Depth 0 kill -> blast kills #1 (depth 1) -> blast kills #2 (depth 2, no blast)
        assert_eq!(state.kills, 3);
        let blasts = state
            .effects
            .iter()
            .filter(|fx| fx.kind == EffectKind::Explosion)
            .count();
        assert_eq!(blasts, 2);
        assert!(state.enemy(ids[3]).is_some_and(|e| e.is_alive()));
    }

    #[test]
    fn test_kill_at_max_depth_starts_no_chain() {
        let mut cfg = SimConfig::default();
        cfg.max_chain_depth = 1;
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.chain_explosion = Some(ChainExplosionMod {
            radius: 40.0,
            damage: 100.0,
        });
        let ids: Vec<EntityId> = (0..3)
            .map(|i| spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(300.0 + i as f32 * 50.0, 300.0)))
            .collect();
        let at = state.enemy(ids[0]).unwrap().center();
        let fx = state.next_entity_id();
        let mut lingering = TemporaryEffect::blast(fx, EffectKind::Explosion, at, 10.0, Affects::Enemies, 1000.0, 0.25);
        lingering.chain_depth = 1;
        state.effects.push(lingering);

        resolve_damage(&mut state, &cfg);
        assert_eq!(state.kills, 1);
        assert_eq!(state.effects.len(), 1);
        assert!(state.enemy(ids[1]).is_some_and(|e| e.hp == e.max_hp));
    }

    #[test]
    fn test_shallow_effect_kill_still_chains() {
        let mut cfg = SimConfig::default();
        cfg.max_chain_depth = 1;
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.chain_explosion = Some(ChainExplosionMod {
            radius: 40.0,
            damage: 100.0,
        });
        let ids: Vec<EntityId> = (0..3)
            .map(|i| spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(300.0 + i as f32 * 50.0, 300.0)))
            .collect();
        let at = state.enemy(ids[0]).unwrap().center();
        let fx = state.next_entity_id();
        state
            .effects
            .push(TemporaryEffect::blast(fx, EffectKind::Explosion, at, 10.0, Affects::Enemies, 1000.0, 0.25));

        resolve_damage(&mut state, &cfg);
        assert_eq!(state.kills, 2);
        let chained: Vec<_> = state.effects.iter().filter(|fx| fx.chain_depth == 1).collect();
        assert_eq!(chained.len(), 1);
        assert!(state.enemy(ids[2]).is_some_and(|e| e.is_alive()));
    }

    #[test]
    fn test_shrapnel_inherits_kill_depth() {
        let mut cfg = SimConfig::default();
        cfg.max_chain_depth = 1;
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.shrapnel = Some(ShrapnelMod { count: 3, damage: 5.0 });
        let id = spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        let fx = state.next_entity_id();
        let mut blast = TemporaryEffect::blast(fx, EffectKind::Explosion, at, 10.0, Affects::Enemies, 1000.0, 0.25);
        blast.chain_depth = 1;
        state.effects.push(blast);

        resolve_damage(&mut state, &cfg);
        let shards: Vec<_> = state
            .projectiles
            .iter()
            .filter(|p| p.kind == ProjectileKind::Shrapnel)
            .collect();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(|p| p.chain_depth == 1));
    }

    #[test]
    fn test_lifesteal_heals_fraction_of_damage() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.lifesteal = 0.5;
        state.player.stats.hp = state.player.stats.max_hp - 20.0;
        let id = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 10.0);

        resolve_damage(&mut state, &cfg);
        assert!((state.player.stats.max_hp - state.player.stats.hp - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_ghost_shot_spares_pierce() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.ghost_shot = Some(1.0);
        let id = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 1.0);
        state.projectiles[0].pierce_left = 2;

        resolve_damage(&mut state, &cfg);
        assert_eq!(state.projectiles.len(), 1);
        assert_eq!(state.projectiles[0].pierce_left, 2);
        assert_eq!(state.projectiles[0].hit_ids, vec![id]);
    }

    #[test]
    fn test_shrapnel_spawned_on_kill() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.shrapnel = Some(ShrapnelMod { count: 3, damage: 5.0 });
        let id = spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 1000.0);

        resolve_damage(&mut state, &cfg);
        let shards: Vec<_> = state
            .projectiles
            .iter()
            .filter(|p| p.kind == ProjectileKind::Shrapnel)
            .collect();
        assert_eq!(shards.len(), 3);
        assert!(shards.iter().all(|p| p.owner == Owner::Player && p.hit_ids.contains(&id) && p.chain_depth == 0));
    }

    #[test]
    fn test_explosive_rounds_splash_neighbours() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.explosive_rounds = Some(ExplosiveRounds {
            radius: 120.0,
            damage_frac: 0.5,
        });
        let struck = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let neighbour = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(880.0, 300.0));
        let at = state.enemy(struck).unwrap().center();
        player_shot(&mut state, at, 10.0);

        resolve_damage(&mut state, &cfg);
        let blast = state
            .effects
            .iter()
            .find(|fx| fx.kind == EffectKind::Explosion)
            .unwrap();
        assert_eq!(blast.damage, Some(5.0));
        assert!(blast.hit_enemy_ids.contains(&struck));
        let s = state.enemy(struck).unwrap();
        assert_eq!(s.max_hp - s.hp, 10.0);
        let n = state.enemy(neighbour).unwrap();
        assert_eq!(n.max_hp - n.hp, 5.0);
    }

    #[test]
    fn test_hit_applies_status_procs() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let sure = OnHitStatus {
            chance: 1.0,
            duration: 2.0,
            magnitude: 0.5,
        };
        state.player.stats.frost = Some(sure);
        state.player.stats.stun = Some(sure);
        state.player.stats.silence = Some(sure);
        state.player.stats.curse = Some(sure);
        let id = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 1.0);

        resolve_damage(&mut state, &cfg);
        let e = state.enemy(id).unwrap();
        assert_eq!(
            e.status.flags(state.now),
            StatusFlags {
                stunned: true,
                slowed: true,
                silenced: true,
                cursed: true,
            }
        );
        assert_eq!(e.status.stunned_until, Some(state.now + 2.0));
    }

    #[test]
    fn test_haste_granted_on_kill() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        state.player.stats.haste_on_kill = Some(HasteOnKill {
            chance: 1.0,
            duration: 3.0,
            factor: 0.5,
        });
        let id = spawn_enemy(&mut state, ArchetypeKind::Walker, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 1000.0);

        resolve_damage(&mut state, &cfg);
        let haste = state.player.buffs.iter().find(|b| b.kind == BuffKind::Haste).unwrap();
        assert_eq!(haste.factor, 0.5);
        assert_eq!(haste.remaining, 3.0);
    }

    #[test]
    fn test_splitter_splits_once() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let id = spawn_enemy(&mut state, ArchetypeKind::Splitter, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 10_000.0);
        resolve_damage(&mut state, &cfg);
        let children: Vec<_> = state.enemies.iter().filter(|e| e.kind() == ArchetypeKind::Splitter).collect();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.minion && matches!(c.archetype, Archetype::Splitter { generation: 1 })));
        assert_eq!(state.wave_kills, 1);
    }

    #[test]
    fn test_brute_plays_death_animation() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let id = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let at = state.enemy(id).unwrap().center();
        player_shot(&mut state, at, 10_000.0);
        resolve_damage(&mut state, &cfg);
        let e = state.enemy(id).unwrap();
        assert!(matches!(e.vitality, Vitality::Dying { .. }));
        assert!(!e.is_targetable());

        // A dying enemy takes no further damage or kill credit
        player_shot(&mut state, at, 10_000.0);
        resolve_damage(&mut state, &cfg);
        assert_eq!(state.kills, 1);
    }

    #[test]
    fn test_bounce_retargets_unhit_enemy() {
        let cfg = SimConfig::default();
        let mut state = test_state();
        no_crit(&mut state);
        let first = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(800.0, 300.0));
        let second = spawn_enemy(&mut state, ArchetypeKind::Brute, Vec2::new(400.0, 300.0));
        let at = state.enemy(first).unwrap().center();
        player_shot(&mut state, at, 1.0);
        state.projectiles[0].vel = Vec2::new(500.0, 0.0);
        state.projectiles[0].bounces_left = 1;

        resolve_damage(&mut state, &cfg);
        assert_eq!(state.projectiles.len(), 1);
        let p = &state.projectiles[0];
        assert_eq!(p.bounces_left, 0);
        assert!(p.vel.x < 0.0);
        assert!((p.vel.length() - 500.0).abs() < 1e-3);
        assert!(state.enemy(second).is_some());
    }
}
