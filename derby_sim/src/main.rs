//! Derby Simulator CLI
//!
//! Run deterministic race meet scenarios, or watch a meet in real time.

use clap::Parser;
use derby_core::{DerbyError, RaceSession, SessionConfig, SessionStatus};
use derby_env::{DerbyContext, TokioContext};
use derby_sim::scenarios::ScenarioId;
use derby_sim::{ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Derby race meet simulator
#[derive(Parser, Debug)]
#[command(name = "derby-sim")]
#[command(about = "Run deterministic race meet simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (full_meet, pause_resume, early_stop, short_card, empty_field, thin_field, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Rounds per meet (overrides the config file)
    #[arg(short, long)]
    rounds: Option<usize>,

    /// Competitors per round (overrides the config file)
    #[arg(long)]
    roster_size: Option<usize>,

    /// Simulation tick rate in Hz
    #[arg(long, default_value = "60")]
    tick_rate: u32,

    /// Maximum virtual duration per scenario in seconds
    #[arg(short, long, default_value = "600")]
    duration: f64,

    /// Run one meet on the real clock instead of the scenarios
    #[arg(long)]
    live: bool,

    /// Session configuration as JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export simulation frames to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// Loads the config file if any, then applies command line overrides.
fn load_config(args: &Args) -> Result<SessionConfig, DerbyError> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| {
                DerbyError::InvalidConfig(format!("{}: {}", path.display(), e))
            })?;
            SessionConfig::from_json(&json)?
        }
        None => SessionConfig::default(),
    };

    if let Some(rounds) = args.rounds {
        config.round_count = rounds;
    }
    if let Some(roster_size) = args.roster_size {
        config.roster_size = roster_size;
    }
    config.validate()?;
    Ok(config)
}

/// Runs one meet against the real clock until it completes or Ctrl-C.
async fn run_live(config: SessionConfig, json: bool) -> Result<SessionStatus, DerbyError> {
    let context = TokioContext::shared();
    let mut session = RaceSession::with_board(context.clone(), config)?;
    session.generate_program()?;

    let mut signals = session.subscribe();
    context.spawn("signal-log", async move {
        // Ends when the session drops its bus
        while let Ok(signal) = signals.recv().await {
            info!("{:?}", signal);
        }
    });

    for round in session.schedule() {
        let entrants: Vec<String> = round.roster.iter().map(|c| c.to_string()).collect();
        info!("{}: {}", round.lap(), entrants.join(", "));
    }

    session.start()?;
    let finished = tokio::select! {
        status = session.run() => Some(status),
        _ = tokio::signal::ctrl_c() => None,
    };
    let status = match finished {
        Some(status) => status,
        None => {
            warn!("Interrupted");
            session.stop()
        }
    };

    if json {
        match serde_json::to_string_pretty(session.results()) {
            Ok(out) => println!("{}", out),
            Err(e) => error!("Failed to encode results: {}", e),
        }
    } else {
        for (result, round) in session.results().iter().zip(session.schedule()) {
            let order: Vec<String> = result.standing.iter().map(|c| c.to_string()).collect();
            info!("{} | {}", round.lap(), order.join(" > "));
        }
    }

    Ok(status)
}

/// Runs a single scenario and writes its frames to `path`.
fn run_with_export(runner: &ScenarioRunner, scenario: ScenarioId, path: &str) -> ScenarioResult {
    let (result, export) = runner.run_with_export(scenario);

    if let Err(e) = export.write_to_file(path) {
        error!("Failed to write export: {:?}", e);
    } else {
        info!("Exported {} frames to {}", export.frames.len(), path);
    }
    result
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_max_level(level);
    let installed = match EnvFilter::try_from_default_env() {
        Ok(filter) if !args.verbose => {
            tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())
        }
        _ => tracing::subscriber::set_global_default(builder.finish()),
    };
    installed.expect("Failed to set tracing subscriber");

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if args.live {
        match run_live(config, args.json).await {
            Ok(status) => info!("Meet ended: {:?}", status),
            Err(e) if e.is_configuration() => {
                error!("Configuration rejected: {}", e);
                std::process::exit(1);
            }
            Err(e) => {
                error!("Meet failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if !args.json {
        info!("Derby Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    } else {
        args.seed
    };

    let runner_for = |seed: u64| {
        ScenarioRunner::new(seed)
            .with_config(config.clone())
            .with_tick_rate(args.tick_rate)
            .with_duration(args.duration)
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let result = run_with_export(&runner_for(base_seed), scenarios[0], export_path);
        if result.passed {
            info!("✓ {} (seed={}) PASSED - exported to {}", scenarios[0].name(), base_seed, export_path);
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = runner_for(seed);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "rounds_completed": r.rounds_completed,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{}", out),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
