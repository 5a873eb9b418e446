//! Survivor Arena headless runner
//!
//! Plays a run on autopilot and prints the final snapshot as JSON.
//!
//! Usage: `survivor-arena [--seed N] [--weapon ID] [--accessory ID] [--ticks N] [--config FILE]`

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use glam::Vec2;
use survivor_arena::sim::{GameEvent, GamePhase, Intents, WorldSnapshot};
use survivor_arena::{Engine, SimConfig};

const SIM_DT: f32 = 1.0 / 60.0;
/// Distance the autopilot tries to keep from the nearest enemy
const KEEP_AWAY: f32 = 260.0;
/// Jump when a threat is this close
const JUMP_RANGE: f32 = 90.0;

#[derive(Parser, Debug)]
#[command(name = "survivor-arena")]
#[command(about = "Play a deterministic survival arena run on autopilot")]
struct Args {
    /// Run seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value = "arcane_staff")]
    weapon: String,
    #[arg(long, default_value = "none")]
    accessory: String,
    /// Ticks to simulate before stopping (60 per second)
    #[arg(long, default_value_t = 60 * 60 * 5)]
    ticks: u64,
    /// JSON file overriding the default tuning
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Move away from the nearest enemy, aim at it, fire, hop over close threats
fn autopilot(snap: &WorldSnapshot) -> Intents {
    let me = snap.player.pos + snap.player.size / 2.0;
    let nearest = snap
        .enemies
        .iter()
        .filter(|e| e.targetable)
        .map(|e| e.pos + e.size / 2.0)
        .min_by(|a, b| a.distance_squared(me).total_cmp(&b.distance_squared(me)));

    let Some(target) = nearest else {
        return Intents {
            aim: me + Vec2::new(snap.player.facing * 100.0, 0.0),
            ..Default::default()
        };
    };

    let offset = target - me;
    let move_axis = if offset.x.abs() < KEEP_AWAY {
        -offset.x.signum()
    } else {
        0.0
    };
    Intents {
        move_axis,
        aim: target,
        fire_held: true,
        jump_requested: offset.length() < JUMP_RANGE,
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig, String> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            SimConfig::from_json(&json).map_err(|e| e.to_string())
        }
        None => Ok(SimConfig::default()),
    }
}

fn run(args: &Args) -> Result<WorldSnapshot, String> {
    let config = load_config(args.config.as_deref())?;
    let mut engine = Engine::new(config).map_err(|e| e.to_string())?;
    let mut snap = engine
        .start_run(&args.weapon, &args.accessory, args.seed)
        .map_err(|e| e.to_string())?;

    for _ in 0..args.ticks {
        let intents = autopilot(&snap);
        snap = engine.tick(SIM_DT, &intents).map_err(|e| e.to_string())?;

        for event in &snap.events {
            match event {
                GameEvent::LevelUp { level } => log::info!("Level {level}"),
                GameEvent::BossDefeated { wave } => log::info!("Boss down on wave {wave}"),
                _ => {}
            }
        }

        match snap.phase {
            GamePhase::Playing => {}
            GamePhase::UpgradeChoice => {
                if let Some(choice) = snap.choices.first() {
                    log::info!("Taking {} ({:?})", choice.name, choice.rarity);
                    engine.apply_upgrade(&choice.id).map_err(|e| e.to_string())?;
                }
                engine.confirm_wave_advance().map_err(|e| e.to_string())?;
            }
            GamePhase::WaveCleared => {
                engine.confirm_wave_advance().map_err(|e| e.to_string())?;
            }
            GamePhase::GameOver => break,
        }
    }
    Ok(snap)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!(
        "Survivor Arena (headless) seed={} weapon={} accessory={}",
        args.seed,
        args.weapon,
        args.accessory
    );

    match run(&args) {
        Ok(snap) => {
            log::info!(
                "Finished: wave {} level {} score {} kills {}",
                snap.wave,
                snap.level,
                snap.score,
                snap.kills
            );
            match serde_json::to_string_pretty(&snap) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::error!("cannot serialize snapshot: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["survivor-arena"]).unwrap();
        assert_eq!(args.seed, 42);
        assert_eq!(args.weapon, "arcane_staff");
        assert_eq!(args.accessory, "none");
        assert_eq!(args.ticks, 18_000);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_flags_and_bad_seed() {
        let args = Args::try_parse_from([
            "survivor-arena",
            "--seed",
            "7",
            "--weapon",
            "storm_wand",
            "--ticks",
            "600",
            "--config",
            "tuning.json",
        ])
        .unwrap();
        assert_eq!(args.seed, 7);
        assert_eq!(args.weapon, "storm_wand");
        assert_eq!(args.ticks, 600);
        assert_eq!(args.config, Some(PathBuf::from("tuning.json")));

        assert!(Args::try_parse_from(["survivor-arena", "--seed", "abc"]).is_err());
    }
}
