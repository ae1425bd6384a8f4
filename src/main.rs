use anyhow::{Context, Result};
use clap::Parser;
use joinsim::scanner::ProcessScanner;
use joinsim::{run_script_file, run_statement, JoinSimulator, RouteOptions, SimulatorConfig};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "joinsim")]
#[command(about = "Simulates INNER JOIN on top of a SQL engine that can only scan single tables")]
struct Args {
    /// The statement to run (read from stdin when omitted)
    query: Vec<String>,

    /// JSON configuration file (schema, markers, engine)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine binary (overrides config and JOINSIM_ENGINE_PATH)
    #[arg(short, long)]
    engine: Option<PathBuf>,

    /// Print the full outcome as JSON instead of result lines
    #[arg(long)]
    json: bool,

    /// Report non-join statements instead of forwarding them to the engine
    #[arg(long)]
    no_passthrough: bool,

    /// Print the equivalent comma-join statement (or rewritten script) and exit
    #[arg(long)]
    rewrite: bool,

    /// Rewrite every INNER JOIN line of a SQL script and run it through the engine
    #[arg(long, value_name = "PATH")]
    rewrite_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let code = run(args).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(args: Args) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => SimulatorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SimulatorConfig::default(),
    }
    .with_env_overrides();
    if let Some(engine) = args.engine.clone() {
        config.engine.path = engine;
    }

    let options = RouteOptions {
        json: args.json,
        passthrough: !args.no_passthrough,
        rewrite: args.rewrite,
    };
    let scanner = ProcessScanner::new(config.engine.clone());
    let simulator = JoinSimulator::new(config, scanner);
    let mut stdout = std::io::stdout().lock();

    if let Some(path) = &args.rewrite_file {
        return run_script_file(&simulator, path, options, &mut stdout)
            .await
            .with_context(|| format!("Failed to process script {}", path.display()));
    }

    let sql = read_query(&args.query)?;
    let code = run_statement(&simulator, &sql, options, &mut stdout)
        .await
        .context("Failed to write result")?;
    Ok(code)
}

fn read_query(words: &[String]) -> Result<String> {
    if !words.is_empty() {
        return Ok(words.join(" ").trim().to_string());
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read query from stdin")?;
    Ok(input.trim().to_string())
}
