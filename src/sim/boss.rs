//! Boss pattern state machine
//!
//! Idle -> {HomingVolley, MinionSummon, Beam, GroundSlam} -> Idle, with a
//! cooldown per pattern and an enrage phase below half HP. The brain only
//! decides; the enemy AI turns [`BossAction`]s into projectiles, minions and
//! effects.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// HP fraction below which the boss enrages
pub const ENRAGE_THRESHOLD: f32 = 0.5;
/// Cooldown and rest multiplier while enraged
pub const ENRAGE_COOLDOWN_MULT: f32 = 0.6;
/// Rest between patterns
const IDLE_REST: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BossPattern {
    HomingVolley,
    MinionSummon,
    Beam,
    GroundSlam,
}

impl BossPattern {
    pub const ALL: [BossPattern; 4] = [
        BossPattern::HomingVolley,
        BossPattern::MinionSummon,
        BossPattern::Beam,
        BossPattern::GroundSlam,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Timing for one run of the pattern
    fn timing(self) -> PatternTiming {
        match self {
            BossPattern::HomingVolley => PatternTiming {
                cooldown: 5.0,
                windup: 0.3,
                steps: 5,
                step_interval: 0.3,
                recovery: 0.5,
            },
            BossPattern::MinionSummon => PatternTiming {
                cooldown: 12.0,
                windup: 0.6,
                steps: 1,
                step_interval: 0.0,
                recovery: 0.8,
            },
            BossPattern::Beam => PatternTiming {
                cooldown: 8.0,
                windup: 0.8,
                steps: 1,
                step_interval: 0.0,
                recovery: 1.2,
            },
            BossPattern::GroundSlam => PatternTiming {
                cooldown: 7.0,
                windup: 0.6,
                steps: 1,
                step_interval: 0.0,
                recovery: 0.5,
            },
        }
    }
}

struct PatternTiming {
    cooldown: f32,
    windup: f32,
    steps: u32,
    step_interval: f32,
    recovery: f32,
}

/// What the boss wants to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossAction {
    /// Crossed the enrage threshold
    Enraged,
    /// One homing orb aimed at the player
    FireOrb,
    SummonMinions { count: u32 },
    Beam,
    Slam,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BossState {
    Idle {
        rest: f32,
    },
    Attacking {
        pattern: BossPattern,
        windup: f32,
        steps_left: u32,
        step_timer: f32,
        recovery: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossBrain {
    pub state: BossState,
    /// Remaining cooldown per pattern, indexed by `BossPattern`
    pub cooldowns: [f32; 4],
    pub last_pattern: Option<BossPattern>,
    pub enraged: bool,
    /// Set once the entrance is over
    pub awake: bool,
}

impl Default for BossBrain {
    fn default() -> Self {
        Self::new()
    }
}

impl BossBrain {
    pub fn new() -> Self {
        Self {
            state: BossState::Idle { rest: IDLE_REST },
            cooldowns: [0.0; 4],
            last_pattern: None,
            enraged: false,
            awake: false,
        }
    }

    /// Is the fight running (boss targetable and acting)?
    #[inline]
    pub fn fight_active(&self) -> bool {
        self.awake
    }

    pub fn current_pattern(&self) -> Option<BossPattern> {
        match self.state {
            BossState::Idle { .. } => None,
            BossState::Attacking { pattern, .. } => Some(pattern),
        }
    }

    /// Standing still for a wind-up (beam and slam telegraph)
    pub fn is_rooted(&self) -> bool {
        matches!(
            self.state,
            BossState::Attacking {
                pattern: BossPattern::Beam | BossPattern::GroundSlam,
                ..
            }
        )
    }

    fn cooldown_mult(&self) -> f32 {
        if self.enraged { ENRAGE_COOLDOWN_MULT } else { 1.0 }
    }

    /// Pick a ready pattern uniformly at random, never the last one used.
    /// Returns `None` when nothing but the last pattern is ready.
    pub fn select_pattern<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<BossPattern> {
        let ready: Vec<BossPattern> = BossPattern::ALL
            .into_iter()
            .filter(|p| self.cooldowns[p.index()] <= 0.0 && Some(*p) != self.last_pattern)
            .collect();
        if ready.is_empty() {
            None
        } else {
            Some(ready[rng.random_range(0..ready.len())])
        }
    }

    fn begin(&mut self, pattern: BossPattern) {
        let t = pattern.timing();
        self.cooldowns[pattern.index()] = t.cooldown * self.cooldown_mult();
        self.last_pattern = Some(pattern);
        self.state = BossState::Attacking {
            pattern,
            windup: t.windup,
            steps_left: if self.enraged && pattern == BossPattern::HomingVolley {
                t.steps + 2
            } else {
                t.steps
            },
            step_timer: 0.0,
            recovery: t.recovery,
        };
        log::debug!("Boss pattern {:?} (enraged: {})", pattern, self.enraged);
    }

    /// Advance the brain by `dt`. `can_act` is false while stunned or
    /// silenced, which interrupts a running pattern.
    pub fn update<R: Rng + ?Sized>(&mut self, dt: f32, hp_fraction: f32, can_act: bool, rng: &mut R) -> Vec<BossAction> {
        let mut actions = Vec::new();
        if !self.awake {
            return actions;
        }

        if !self.enraged && hp_fraction < ENRAGE_THRESHOLD {
            self.enraged = true;
            for cd in self.cooldowns.iter_mut() {
                *cd *= ENRAGE_COOLDOWN_MULT;
            }
            log::debug!("Boss enraged at {:.0}% HP", hp_fraction * 100.0);
            actions.push(BossAction::Enraged);
        }

        for cd in self.cooldowns.iter_mut() {
            *cd = (*cd - dt).max(0.0);
        }

        let rest_after = IDLE_REST * self.cooldown_mult();
        match &mut self.state {
            BossState::Idle { rest } => {
                *rest = (*rest - dt).max(0.0);
                if *rest <= 0.0 && can_act {
                    if let Some(pattern) = self.select_pattern(rng) {
                        self.begin(pattern);
                    }
                }
            }
            BossState::Attacking {
                pattern,
                windup,
                steps_left,
                step_timer,
                recovery,
            } => {
                if !can_act {
                    log::debug!("Boss pattern {:?} interrupted", pattern);
                    self.state = BossState::Idle { rest: rest_after };
                    return actions;
                }
                if *windup > 0.0 {
                    *windup -= dt;
                } else if *steps_left > 0 {
                    *step_timer -= dt;
                    if *step_timer <= 0.0 {
                        actions.push(match pattern {
                            BossPattern::HomingVolley => BossAction::FireOrb,
                            BossPattern::MinionSummon => BossAction::SummonMinions {
                                count: if self.enraged { 3 } else { 2 },
                            },
                            BossPattern::Beam => BossAction::Beam,
                            BossPattern::GroundSlam => BossAction::Slam,
                        });
                        *steps_left -= 1;
                        *step_timer = pattern.timing().step_interval;
                    }
                } else {
                    *recovery -= dt;
                    if *recovery <= 0.0 {
                        self.state = BossState::Idle { rest: rest_after };
                    }
                }
            }
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn awake_brain() -> BossBrain {
        BossBrain {
            awake: true,
            ..BossBrain::new()
        }
    }

    #[test]
    fn test_dormant_until_awake() {
        let mut brain = BossBrain::new();
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..200 {
            assert!(brain.update(0.05, 1.0, true, &mut rng).is_empty());
        }
        assert!(!brain.fight_active());
        assert!(brain.current_pattern().is_none());
    }

    #[test]
    fn test_selection_excludes_last_pattern() {
        let mut rng = Pcg32::seed_from_u64(42);
        let mut brain = awake_brain();
        brain.last_pattern = Some(BossPattern::Beam);
        for _ in 0..500 {
            let p = brain.select_pattern(&mut rng).unwrap();
            assert_ne!(p, BossPattern::Beam);
        }
    }

    #[test]
    fn test_only_last_ready_stays_idle() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut brain = awake_brain();
        brain.cooldowns = [5.0, 5.0, 0.0, 5.0];
        brain.last_pattern = Some(BossPattern::Beam);
        assert_eq!(brain.select_pattern(&mut rng), None);

        brain.state = BossState::Idle { rest: 0.0 };
        brain.update(0.01, 1.0, true, &mut rng);
        assert!(matches!(brain.state, BossState::Idle { .. }));
    }

    #[test]
    fn test_never_repeats_pattern_back_to_back() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut brain = awake_brain();
        let mut history = Vec::new();
        let mut was_idle = true;
        for _ in 0..4000 {
            brain.update(0.05, 1.0, true, &mut rng);
            match brain.current_pattern() {
                Some(p) if was_idle => {
                    history.push(p);
                    was_idle = false;
                }
                None => was_idle = true,
                _ => {}
            }
        }
        assert!(history.len() > 5);
        assert!(history.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_volley_fires_all_orbs() {
        let mut rng = Pcg32::seed_from_u64(9);
        let mut brain = awake_brain();
        brain.state = BossState::Idle { rest: 0.0 };
        brain.cooldowns = [0.0, 9.0, 9.0, 9.0];
        let mut orbs = 0;
        for _ in 0..100 {
            orbs += brain
                .update(0.02, 1.0, true, &mut rng)
                .iter()
                .filter(|a| **a == BossAction::FireOrb)
                .count();
        }
        assert_eq!(orbs, 5);
    }

    #[test]
    fn test_enrage_once_and_shortens_cooldowns() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut brain = awake_brain();
        brain.cooldowns = [10.0; 4];
        let actions = brain.update(0.0, 0.4, true, &mut rng);
        assert_eq!(actions, vec![BossAction::Enraged]);
        assert!((brain.cooldowns[0] - 6.0).abs() < 1e-5);
        assert!(brain.update(0.0, 0.3, true, &mut rng).is_empty());

        brain.cooldowns = [0.0, 9.0, 9.0, 9.0];
        brain.state = BossState::Idle { rest: 0.0 };
        brain.update(0.0, 0.3, true, &mut rng);
        assert_eq!(brain.current_pattern(), Some(BossPattern::HomingVolley));
        assert!((brain.cooldowns[0] - 5.0 * ENRAGE_COOLDOWN_MULT).abs() < 1e-5);
    }

    #[test]
    fn test_stun_interrupts_pattern() {
        let mut rng = Pcg32::seed_from_u64(11);
        let mut brain = awake_brain();
        brain.state = BossState::Idle { rest: 0.0 };
        brain.update(0.01, 1.0, true, &mut rng);
        assert!(brain.current_pattern().is_some());
        let actions = brain.update(0.01, 1.0, false, &mut rng);
        assert!(actions.is_empty());
        assert!(brain.current_pattern().is_none());
    }
}
