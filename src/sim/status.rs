//! Status-effect ledger
//!
//! Per-entity timers for stun, slow, silence and curse. Timers are absolute
//! world timestamps. Expired entries are cleared lazily by the query methods
//! and in bulk by [`StatusEffects::expire`] at the end of each tick.

use serde::{Deserialize, Serialize};

/// Slow: movement speed multiplied by `factor` until `until`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slow {
    pub until: f64,
    pub factor: f32,
}

/// Curse: damage taken multiplied by `1 + amplify` until `until`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Curse {
    pub until: f64,
    pub amplify: f32,
}

/// Status flags reported to the host for rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub stunned: bool,
    pub slowed: bool,
    pub silenced: bool,
    pub cursed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffects {
    pub stunned_until: Option<f64>,
    pub slow: Option<Slow>,
    pub silenced_until: Option<f64>,
    pub curse: Option<Curse>,
}

impl StatusEffects {
    /// Stun until `now + duration`. A longer running stun is kept.
    pub fn apply_stun(&mut self, now: f64, duration: f32) {
        let until = now + duration.max(0.0) as f64;
        self.stunned_until = Some(self.stunned_until.map_or(until, |u| u.max(until)));
    }

    /// Slow to `factor` of normal speed; the stronger slow wins, duration refreshes
    pub fn apply_slow(&mut self, now: f64, duration: f32, factor: f32) {
        let until = now + duration.max(0.0) as f64;
        let factor = factor.clamp(0.05, 1.0);
        self.slow = Some(match self.slow {
            Some(s) => Slow {
                until: s.until.max(until),
                factor: s.factor.min(factor),
            },
            None => Slow { until, factor },
        });
    }

    pub fn apply_silence(&mut self, now: f64, duration: f32) {
        let until = now + duration.max(0.0) as f64;
        self.silenced_until = Some(self.silenced_until.map_or(until, |u| u.max(until)));
    }

    pub fn apply_curse(&mut self, now: f64, duration: f32, amplify: f32) {
        let until = now + duration.max(0.0) as f64;
        let amplify = amplify.max(0.0);
        self.curse = Some(match self.curse {
            Some(c) => Curse {
                until: c.until.max(until),
                amplify: c.amplify.max(amplify),
            },
            None => Curse { until, amplify },
        });
    }

    /// True while stunned; clears the timer once it has run out
    pub fn is_stunned(&mut self, now: f64) -> bool {
        match self.stunned_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.stunned_until = None;
                false
            }
            None => false,
        }
    }

    pub fn is_silenced(&mut self, now: f64) -> bool {
        match self.silenced_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.silenced_until = None;
                false
            }
            None => false,
        }
    }

    /// Movement multiplier from stun and slow (0 while stunned)
    pub fn speed_factor(&mut self, now: f64) -> f32 {
        if self.is_stunned(now) {
            return 0.0;
        }
        match self.slow {
            Some(s) if now < s.until => s.factor,
            Some(_) => {
                self.slow = None;
                1.0
            }
            None => 1.0,
        }
    }

    /// Can this entity use abilities (neither stunned nor silenced)?
    pub fn can_act(&mut self, now: f64) -> bool {
        // Evaluate both so both timers get the lazy clear
        let stunned = self.is_stunned(now);
        let silenced = self.is_silenced(now);
        !stunned && !silenced
    }

    /// Multiplier applied to incoming damage
    pub fn damage_taken_factor(&self, now: f64) -> f32 {
        match self.curse {
            Some(c) if now < c.until => 1.0 + c.amplify,
            _ => 1.0,
        }
    }

    /// Read-only stun check (no lazy clear)
    pub fn stunned_at(&self, now: f64) -> bool {
        self.stunned_until.is_some_and(|u| now < u)
    }

    /// Drop every expired timer
    pub fn expire(&mut self, now: f64) {
        if self.stunned_until.is_some_and(|u| now >= u) {
            self.stunned_until = None;
        }
        if self.slow.is_some_and(|s| now >= s.until) {
            self.slow = None;
        }
        if self.silenced_until.is_some_and(|u| now >= u) {
            self.silenced_until = None;
        }
        if self.curse.is_some_and(|c| now >= c.until) {
            self.curse = None;
        }
    }

    pub fn flags(&self, now: f64) -> StatusFlags {
        StatusFlags {
            stunned: self.stunned_at(now),
            slowed: self.slow.is_some_and(|s| now < s.until),
            silenced: self.silenced_until.is_some_and(|u| now < u),
            cursed: self.curse.is_some_and(|c| now < c.until),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stun_blocks_movement_and_abilities() {
        let mut s = StatusEffects::default();
        s.apply_stun(1.0, 0.5);
        assert_eq!(s.speed_factor(1.2), 0.0);
        assert!(!s.can_act(1.2));
        // Lazy expiry on query
        assert_eq!(s.speed_factor(1.6), 1.0);
        assert!(s.stunned_until.is_none());
    }

    #[test]
    fn test_silence_blocks_abilities_not_movement() {
        let mut s = StatusEffects::default();
        s.apply_silence(0.0, 2.0);
        assert_eq!(s.speed_factor(1.0), 1.0);
        assert!(!s.can_act(1.0));
        assert!(s.can_act(2.0));
        assert!(s.silenced_until.is_none());
    }

    #[test]
    fn test_slow_keeps_strongest_factor() {
        let mut s = StatusEffects::default();
        s.apply_slow(0.0, 1.0, 0.5);
        s.apply_slow(0.5, 1.0, 0.8);
        assert_eq!(s.speed_factor(1.2), 0.5);
        assert_eq!(s.speed_factor(1.5), 1.0);
    }

    #[test]
    fn test_curse_amplifies_until_expiry() {
        let mut s = StatusEffects::default();
        s.apply_curse(0.0, 3.0, 0.25);
        assert!((s.damage_taken_factor(1.0) - 1.25).abs() < 1e-6);
        assert_eq!(s.damage_taken_factor(3.0), 1.0);
        s.expire(3.0);
        assert!(s.curse.is_none());
    }

    #[test]
    fn test_expire_sweeps_all_timers() {
        let mut s = StatusEffects::default();
        s.apply_stun(0.0, 1.0);
        s.apply_slow(0.0, 1.0, 0.5);
        s.apply_silence(0.0, 1.0);
        s.apply_curse(0.0, 1.0, 0.1);
        s.expire(0.5);
        assert!(s.flags(0.5).stunned);
        s.expire(1.0);
        assert_eq!(s, StatusEffects::default());
    }
}
