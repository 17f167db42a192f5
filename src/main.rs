mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use fieldsim::config::Config;
use fieldsim::datasources::load_climate;
use fieldsim::db::Database;
use fieldsim::logic::{run_simulation, BucketModel, PolicyEngine, SimulationDriver};
use fieldsim::models::{ResultId, RunResults};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Init) => {
            let (config, path) = Config::setup_interactive(cli.config.clone())?;
            info!(path = %path.display(), run = %config.run.name, "Wrote starter configuration");
            Ok(())
        }
        Some(Commands::Check) => check(&cli),
        Some(Commands::Schedule) => schedule(&cli),
        Some(Commands::Run { ref json, no_db }) => run(&cli, json.clone(), no_db),
        None => run(&cli, None, false),
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    if !Config::exists(cli.config.as_ref()) {
        bail!("No configuration found. Run `fieldsim init` or pass --config.");
    }
    Config::load(cli.config.clone()).context("Failed to load configuration")
}

fn build_driver(config: &Config) -> Result<SimulationDriver> {
    let central = config
        .central_parameters()
        .context("Failed to load auxiliary tables")?;
    let driver = SimulationDriver::new(
        config.general.clone(),
        config.site.clone(),
        &config.computation_layers(),
        central,
        Box::new(BucketModel),
    )?;
    Ok(driver)
}

fn run(cli: &Cli, json: Option<PathBuf>, no_db: bool) -> Result<()> {
    let config = load_config(cli)?;
    let climate_path = config.climate_path();
    let climate = load_climate(&climate_path)
        .with_context(|| format!("Failed to load climate from {}", climate_path.display()))?;
    let rotation = config.rotation().context("Invalid rotation")?;
    let mut driver = build_driver(&config)?;
    let engine = PolicyEngine::new(&config.general);

    let results = run_simulation(
        &mut driver,
        &rotation,
        &climate,
        config.run.start,
        config.run.end,
        &engine,
    )
    .with_context(|| format!("Run '{}' aborted", config.run.name))?;

    if config.output.database && !no_db {
        let db = Database::open(cli.data_dir.as_ref())?;
        let run_id = db.save_run(&config.run.name, config.run.start, config.run.end, &results)?;
        println!("Stored run {} in {}", run_id, db.path().display());
    }

    if let Some(path) = json.or_else(|| config.output.json.clone()) {
        let content = serde_json::to_string_pretty(&results)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote results to {}", path.display());
    }

    print_summary(&results);
    Ok(())
}

fn check(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    println!("Configuration OK: run '{}' {} .. {}", config.run.name, config.run.start, config.run.end);

    let climate_path = config.climate_path();
    let climate = load_climate(&climate_path)
        .with_context(|| format!("Failed to load climate from {}", climate_path.display()))?;
    let missing = config
        .run
        .start
        .iter_days()
        .take_while(|d| *d <= config.run.end)
        .filter(|d| climate.get(*d).is_none())
        .count();
    if missing > 0 {
        println!("Climate: {} days, {} missing in run period", climate.len(), missing);
    } else {
        println!("Climate: {} days, run period covered", climate.len());
    }

    let rotation = config.rotation().context("Invalid rotation")?;
    println!("Rotation: {} schedule(s)", rotation.len());

    build_driver(&config)?;
    let engine = PolicyEngine::new(&config.general);
    for (id, name) in engine.list_policies() {
        println!("Policy: {} ({})", name, id);
    }

    if missing > 0 {
        bail!("climate data does not cover the run period");
    }
    Ok(())
}

fn schedule(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    for schedule in config.rotation().context("Invalid rotation")? {
        let irrigated = if schedule.irrigate_crop() { ", irrigated" } else { "" };
        println!("{} (#{}{})", schedule.name(), schedule.custom_id(), irrigated);
        for step in schedule.steps() {
            println!("  {}", step);
        }
    }
    Ok(())
}

fn print_summary(results: &RunResults) {
    println!();
    println!(
        "{:<12} {:<10} {:>12} {:>10} {:>10}",
        "crop", "harvest", "yield", "N fert", "days"
    );
    for record in &results.crop_results {
        let value = |id| record.get(id).unwrap_or(0.0);
        println!(
            "{:<12} {:<10} {:>12.1} {:>10.1} {:>10.0}",
            record.crop_id,
            record.date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
            value(ResultId::PrimaryYield),
            value(ResultId::SumFertiliser),
            value(ResultId::DaysWithCrop),
        );
    }
    let leached: f64 = results
        .series(ResultId::YearlyNLeaching)
        .iter()
        .map(|v| v.value)
        .sum();
    println!();
    println!("N leached over run: {:.1} kg N/ha", leached);
}
