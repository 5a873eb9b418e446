//! Per-tick output stream: game events, sound cues and floating text
//!
//! Everything here is presentation-facing. The log is drained into each
//! snapshot and starts empty on the next tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{ArchetypeKind, EntityId};

/// Sound cue identifiers for the host's audio layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Shoot,
    Jump,
    Hit,
    Crit,
    EnemyDeath,
    EnemyShoot,
    Explosion,
    Lightning,
    PlayerHurt,
    ShieldBreak,
    ShieldReady,
    Dodge,
    Pickup,
    Heal,
    MeteorWarning,
    MeteorImpact,
    BossRoar,
    BossBeam,
    BossSlam,
    BossDefeated,
    WaveClear,
    LevelUp,
    UpgradeApplied,
    GameOver,
}

/// Floating feedback text style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    Damage,
    Crit,
    PlayerDamage,
    Heal,
    Dodge,
    Blocked,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingText {
    pub pos: Vec2,
    pub text: String,
    pub style: TextStyle,
}

/// Buffs that can expire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffKind {
    Haste,
    Fragment,
}

/// Gameplay events emitted during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    RunStarted { weapon: String, accessory: String },
    WaveStarted { wave: u32, boss: bool },
    EnemyKilled { id: EntityId, archetype: ArchetypeKind, score: u64 },
    BossDefeated { wave: u32 },
    PlayerDamaged { amount: f32, hp: f32 },
    ShieldBroken,
    ShieldRestored,
    Dodged,
    PickupCollected { heal: f32, fragments: u32 },
    BuffExpired { buff: BuffKind },
    MeteorShowerStarted { wave: u32 },
    WaveCleared { wave: u32 },
    LevelUp { level: u32 },
    UpgradeApplied { id: String, level: u32 },
    GameOver { score: u64, wave: u32 },
}

/// Output accumulated over one tick
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<GameEvent>,
    pub sounds: Vec<SoundCue>,
    pub texts: Vec<FloatingText>,
}

impl EventLog {
    pub fn event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn sound(&mut self, cue: SoundCue) {
        self.sounds.push(cue);
    }

    pub fn text(&mut self, pos: Vec2, text: impl Into<String>, style: TextStyle) {
        self.texts.push(FloatingText {
            pos,
            text: text.into(),
            style,
        });
    }

    /// Take everything logged so far, leaving the log empty
    pub fn drain(&mut self) -> EventLog {
        std::mem::take(self)
    }
}
