use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use in_out_regime::utils::init_from_config;
use in_out_regime::{BacktestEngine, Config, SyntheticMarket, TradingSession};
use std::path::PathBuf;
use tracing::info;

/// Backtest the in/out regime strategy on daily closes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (defaults to CONFIG_FILE or config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON array of sessions to replay instead of a synthetic market
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Synthetic sessions to generate
    #[arg(long, default_value_t = 756)]
    sessions: usize,

    /// Synthetic market seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// First synthetic session date (YYYY-MM-DD)
    #[arg(long, default_value = "2018-01-01")]
    start: NaiveDate,

    /// Where to write the JSON results
    #[arg(short, long, default_value = "backtest_results.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().context("loading layered config")?,
    };
    init_from_config(&config.logging)?;

    println!("╔════════════════════════════════════════════════╗");
    println!("║         IN/OUT REGIME BACKTEST                 ║");
    println!("╚════════════════════════════════════════════════╝");
    println!();

    let sessions: Vec<TradingSession> = match &args.input {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading sessions from {}", path.display()))?;
            serde_json::from_str(&raw).context("parsing session JSON")?
        }
        None => {
            info!(sessions = args.sessions, seed = args.seed, "generating synthetic market");
            SyntheticMarket::new(config.universe.all_instruments(), args.seed).generate(args.start, args.sessions)
        }
    };

    println!("Loaded {} sessions", sessions.len());
    println!("Running backtest...");

    let mut engine = BacktestEngine::new(&config)?;
    let results = engine.run(&sessions)?;
    results.print_summary();

    let json = serde_json::to_string_pretty(&results)?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("writing results to {}", args.output.display()))?;
    println!("Results saved to: {}", args.output.display());

    Ok(())
}
