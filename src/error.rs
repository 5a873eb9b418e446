//! Error types
//!
//! `ConfigError` is fatal and only surfaces before a run begins.
//! `Rejected` reports a host action the simulation refused; state is untouched.

use thiserror::Error;

/// Invalid static configuration (tables, tuning values, upgrade registry)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f32,
    },
    #[error("ground profile needs at least two nodes sorted by x")]
    GroundProfile,
    #[error("{table} table is empty")]
    EmptyTable { table: &'static str },
    #[error("duplicate {table} id `{id}`")]
    DuplicateId { table: &'static str, id: String },
    #[error("missing base stats for archetype {0}")]
    MissingArchetype(String),
    #[error("upgrade `{upgrade}` requires unknown upgrade `{missing}`")]
    UnknownRequirement { upgrade: String, missing: String },
    #[error("upgrade `{upgrade}` grants unknown upgrade `{missing}`")]
    UnknownGrant { upgrade: String, missing: String },
    #[error("upgrade `{0}` depends on itself")]
    SelfDependency(String),
    #[error("upgrade `{0}` has a max level of zero")]
    ZeroMaxLevel(String),
}

/// A host action that the simulation declined
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("no run in progress")]
    NoRun,
    #[error("the run has ended")]
    RunEnded,
    #[error("unknown weapon `{0}`")]
    UnknownWeapon(String),
    #[error("unknown accessory `{0}`")]
    UnknownAccessory(String),
    #[error("no upgrade choice is pending")]
    NoChoicePending,
    #[error("upgrade `{0}` is not among the offered choices")]
    NotOffered(String),
    #[error("upgrade `{0}` is already at max level")]
    MaxLevel(String),
    #[error("no rerolls left")]
    NoRerolls,
    #[error("not waiting for a wave advance")]
    NotAwaitingAdvance,
}
