//! Skirmish duel runner
//!
//! Runs seeded duels between two humanoids and prints a JSON summary.

use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;

use skirmish::combat::Loadout;
use skirmish::core::config::{config, set_config, CombatConfig};
use skirmish::core::error::{CombatError, Result};
use skirmish::core::types::RoomId;
use skirmish::entity::{Creature, LivingEntity};
use skirmish::simulation::{CombatArena, CombatStats};
use skirmish::world::RoomGraph;

/// Duel runner - seeded one-on-one fights for balancing
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run seeded duels and report win rates")]
struct Args {
    /// Number of duels to fight
    #[arg(long, default_value_t = 100)]
    duels: u32,

    /// Base seed; duel n uses seed + n
    #[arg(long)]
    seed: Option<u64>,

    /// Loadout of the first fighter (brawler, swordsman, axeman, halberdier, knight)
    #[arg(long, default_value = "swordsman")]
    first: String,

    /// Loadout of the second fighter
    #[arg(long, default_value = "axeman")]
    second: String,

    /// Average stat of both fighters
    #[arg(long, default_value_t = 20)]
    stats: i32,

    /// Combat skill level of both fighters
    #[arg(long, default_value_t = 40)]
    skill: i32,

    /// Ticks before a duel is called a draw
    #[arg(long, default_value_t = 20_000)]
    max_ticks: u64,

    /// Combat tunables as TOML
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum Winner {
    First,
    Second,
    Draw,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct DuelResult {
    seed: u64,
    winner: Winner,
    ticks: u64,
    stats: CombatStats,
}

#[derive(Debug, Serialize)]
struct Summary {
    duels: u32,
    seed: u64,
    first: String,
    second: String,
    first_wins: usize,
    second_wins: usize,
    draws: usize,
    mean_rounds: f64,
    hit_rate: f64,
    criticals: u64,
    flees: u64,
}

fn parse_loadout(name: &str) -> Result<Loadout> {
    Loadout::parse(name).ok_or_else(|| CombatError::Config(format!("unknown loadout '{name}'")))
}

fn duel(
    config: &CombatConfig,
    args: &Args,
    first: Loadout,
    second: Loadout,
    seed: u64,
) -> Result<DuelResult> {
    let mut arena = CombatArena::new(config.clone(), RoomGraph::new(), seed)?;
    let a = arena.register(Creature::humanoid("First", args.stats, RoomId(0)).trained(args.skill));
    let b = arena.register(Creature::humanoid("Second", args.stats, RoomId(0)).trained(args.skill));
    arena.equip_loadout(a, first)?;
    arena.equip_loadout(b, second)?;

    arena.attack(a, b, false)?;
    let ticks = arena.run_until_idle(args.max_ticks);
    arena.drain_messages();

    let dead = |id| arena.entity(id).is_some_and(|e| e.is_ghost());
    let winner = match (dead(a), dead(b)) {
        (false, true) => Winner::First,
        (true, false) => Winner::Second,
        _ => Winner::Draw,
    };
    tracing::debug!(seed, ?winner, ticks, "duel finished");

    Ok(DuelResult {
        seed,
        winner,
        ticks,
        stats: *arena.stats(),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skirmish=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let loaded = match &args.config {
        Some(path) => CombatConfig::load(path)?,
        None => CombatConfig::default(),
    };
    loaded.validate()?;
    if set_config(loaded).is_err() {
        tracing::warn!("combat config was already installed");
    }
    let config = config();

    let first = parse_loadout(&args.first)?;
    let second = parse_loadout(&args.second)?;
    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(duels = args.duels, seed, ?first, ?second, "starting duels");

    let results: Vec<DuelResult> = (0..args.duels)
        .into_par_iter()
        .map(|n| duel(config, &args, first, second, seed.wrapping_add(u64::from(n))))
        .collect::<Result<_>>()?;

    let count = |w: Winner| results.iter().filter(|r| r.winner == w).count();
    let totals = results.iter().fold(CombatStats::default(), |mut acc, r| {
        acc.rounds += r.stats.rounds;
        acc.attacks += r.stats.attacks;
        acc.hits += r.stats.hits;
        acc.criticals += r.stats.criticals;
        acc.flees += r.stats.flees;
        acc
    });
    let summary = Summary {
        duels: args.duels,
        seed,
        first: args.first.clone(),
        second: args.second.clone(),
        first_wins: count(Winner::First),
        second_wins: count(Winner::Second),
        draws: count(Winner::Draw),
        mean_rounds: if results.is_empty() {
            0.0
        } else {
            totals.rounds as f64 / results.len() as f64
        },
        hit_rate: totals.hit_rate(),
        criticals: totals.criticals,
        flees: totals.flees,
    };

    let json = serde_json::to_string_pretty(&summary)?;
    println!("{json}");
    Ok(())
}
