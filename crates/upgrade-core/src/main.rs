//! Quality Upgrade Simulation
//!
//! Runs the demo colony: structures marked for a better tier are rebuilt by
//! workers, workbench bills re-craft items, and every step is logged as JSONL.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use bevy_ecs::prelude::*;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use upgrade_core::components::intent::IntentState;
use upgrade_core::components::thing::{ThingDef, ThingId, ThingQuality, UpgradableKind};
use upgrade_core::components::world::WorldState;
use upgrade_core::config::{UpgradeSettings, DEFAULT_CONFIG_PATH};
use upgrade_core::events::EventLogger;
use upgrade_core::persistence::{load_from_file, save_to_file};
use upgrade_core::setup::{self, colony_structures, create_colony_map, create_stockpiles};
use upgrade_core::systems::{apply_settings, intent_state, ActiveIntentTracker};
use upgrade_core::{apply_option, build_schedule, run_ticks, upgrade_options};
use upgrade_events::Quality;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "upgrade_sim")]
#[command(about = "Quality upgrade orchestration on a demo colony")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 3000)]
    ticks: u64,

    /// Settings file (TOML). Missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Mark every structure for this tier before running
    #[arg(long)]
    target: Option<Quality>,

    /// Keep structures at the target tier once reached
    #[arg(long)]
    keep: bool,

    /// Event log output (JSONL)
    #[arg(long, default_value = "upgrade_events.jsonl")]
    events: PathBuf,

    /// Write a save file after the run
    #[arg(long)]
    save: Option<PathBuf>,

    /// Start from a save file instead of a fresh colony
    #[arg(long)]
    load: Option<PathBuf>,
}

fn build_world(args: &Args, settings: UpgradeSettings) -> Result<World, String> {
    match &args.load {
        Some(path) => {
            let mut world = World::new();
            setup::insert_resources(&mut world, settings, args.seed);
            world.insert_resource(create_colony_map());
            world.insert_resource(create_stockpiles());
            load_from_file(&mut world, path).map_err(|e| format!("could not load {}: {}", path.display(), e))?;
            println!("Loaded save from {}", path.display());
            Ok(world)
        }
        None => {
            let (world, summary) = setup::demo_world(args.seed, settings);
            println!(
                "Spawned {} structures, {} items, {} material stacks, {} workers",
                summary.structures, summary.items, summary.material_stacks, summary.workers
            );
            Ok(world)
        }
    }
}

fn mark_structures(world: &mut World, target: Quality, keep: bool) {
    let structures = colony_structures(world);
    let options = upgrade_options(world, &structures);
    let Some(option) = options.iter().find(|o| o.desired == target && o.keep == keep) else {
        let offered: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        eprintln!("  Warning: no option for {} (offered: {:?})", target, offered);
        return;
    };
    let marked = apply_option(world, &structures, option);
    println!("  {}: {} structures marked", option.label, marked);
}

fn print_summary(world: &mut World) {
    let tick = world.resource::<WorldState>().current_tick;
    println!();
    println!("=== Tick {} ===", tick);

    let mut query = world.query::<(Entity, &ThingId, &ThingDef, &ThingQuality, &UpgradableKind)>();
    let mut rows: Vec<_> = query
        .iter(world)
        .map(|(entity, id, def, quality, kind)| (id.0, entity, def.def_name.clone(), quality.0, *kind))
        .collect();
    rows.sort_by_key(|row| row.0);

    let mut by_quality: BTreeMap<Quality, usize> = BTreeMap::new();
    for (id, entity, name, quality, kind) in &rows {
        *by_quality.entry(*quality).or_default() += 1;
        if *kind == UpgradableKind::Structure {
            let state = match intent_state(world, *entity) {
                IntentState::Inactive => "",
                IntentState::Scheduled => " (scheduled)",
                IntentState::Watching => " (watching)",
            };
            println!("  #{:<4} {:<14} {}{}", id, name, quality, state);
        }
    }

    println!("Quality distribution:");
    for (quality, count) in by_quality {
        println!("  {:<12} {}", quality.to_string(), count);
    }

    let tracked = world.resource::<ActiveIntentTracker>().len();
    let logged = world
        .get_resource::<EventLogger>()
        .map(|l| l.event_count())
        .unwrap_or(0);
    println!("Active intents: {}", tracked);
    println!("Events logged: {}", logged);
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    println!("Quality Upgrade Simulation");
    println!("==========================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", args.ticks);
    println!();

    let settings = match UpgradeSettings::load_or_default(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: invalid config {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut world = match build_world(&args, settings.clone()) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    apply_settings(&mut world, settings);

    match EventLogger::new(&args.events) {
        Ok(logger) => {
            world.insert_resource(logger);
            println!("Logging events to {}", args.events.display());
        }
        Err(e) => {
            eprintln!("  Warning: could not open event log {}: {}", args.events.display(), e);
            world.insert_resource(EventLogger::null());
        }
    }

    if let Some(target) = args.target {
        mark_structures(&mut world, target, args.keep);
    }

    let mut schedule = build_schedule();
    println!("Running {} ticks...", args.ticks);
    run_ticks(&mut world, &mut schedule, args.ticks);

    if let Some(mut logger) = world.get_resource_mut::<EventLogger>() {
        if let Err(e) = logger.flush() {
            eprintln!("  Warning: could not flush event log: {}", e);
        }
    }

    print_summary(&mut world);

    if let Some(path) = &args.save {
        if let Err(e) = save_to_file(&mut world, path) {
            eprintln!("Error: could not save {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        println!("Saved to {}", path.display());
    }

    ExitCode::SUCCESS
}
