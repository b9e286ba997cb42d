use clap::{Parser, Subcommand};
use client::ApiSession;
use harness::{
    default_groups, HarnessConfig, RunReport, RunSummary, Runner, ScenarioRegistry,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Integration test harness for the seal-shop backend API")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios (all of them when none are named)
    Run {
        scenarios: Vec<String>,
        /// API base URL, including the /api prefix
        #[arg(long)]
        base_url: Option<String>,
        /// Per-request timeout
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Minimum pass rate (percent) for a zero exit code
        #[arg(long)]
        threshold: Option<f64>,
        /// Write a JSON report to this path
        #[arg(long)]
        report: Option<PathBuf>,
        /// Leave created records on the backend
        #[arg(long)]
        no_cleanup: bool,
        /// Maximum requests in flight for concurrent scenarios
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List available scenarios
    List,
    /// Health check
    Health {
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = HarnessConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            scenarios,
            base_url,
            timeout_secs,
            threshold,
            report,
            no_cleanup,
            concurrency,
        } => {
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            if let Some(timeout_secs) = timeout_secs {
                config.timeout_secs = timeout_secs;
            }
            if let Some(threshold) = threshold {
                config.pass_threshold = threshold;
            }
            if let Some(report) = report {
                config.report = Some(report);
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if no_cleanup {
                config.cleanup = false;
            }
            config.validate()?;

            let code = run(&config, &scenarios).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::List => {
            list_scenarios(&ScenarioRegistry::with_defaults());
        }
        Commands::Health { base_url } => {
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            config.validate()?;
            health_check(&config).await?;
        }
    }

    Ok(())
}

async fn run(config: &HarnessConfig, scenarios: &[String]) -> Result<i32, Box<dyn std::error::Error>> {
    let session = ApiSession::http(config.client_config())?;
    println!("🚀 Testing {}", session.base_url());
    info!("Starting run against {}", session.base_url());

    let runner = Runner::new(session.clone(), ScenarioRegistry::with_defaults())
        .with_settings(config.run_settings());
    let outcome = runner.run(scenarios).await?;

    let policy = config.policy();
    let summary = RunSummary::from_results(&outcome.results, &default_groups());
    println!("\n{}", summary.render(&policy));

    if let Some(cleanup) = &outcome.cleanup {
        println!(
            "🧹 Cleanup: {}/{} deleted",
            cleanup.deleted, cleanup.attempted
        );
        for failure in &cleanup.failed {
            println!("  ✗ {}", failure);
        }
    }

    if let Some(path) = &config.report {
        RunReport::new(session.base_url(), &outcome, summary.clone()).write(path)?;
        println!("📄 Report written to {}", path.display());
    }

    Ok(policy.exit_code(&summary))
}

fn list_scenarios(registry: &ScenarioRegistry) {
    println!("Available scenarios:");
    let scenarios = registry.list();

    if scenarios.is_empty() {
        println!("  No scenarios registered.");
    } else {
        for (name, description) in scenarios {
            println!("  - {}: {}", name, description);
        }
    }
}

async fn health_check(config: &HarnessConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Performing health check...");

    let session = ApiSession::http(
        config
            .client_config()
            .with_timeout(config.timeout().min(Duration::from_secs(10))),
    )?;
    let exchange = session.get(config.health_path.as_str()).await;

    if exchange.is_success() {
        println!(
            "✓ Health check passed. Backend at {} is reachable.",
            session.base_url()
        );
        info!("Health check successful");
        Ok(())
    } else {
        let summary = exchange.summary();
        println!("✗ Health check failed: {}", summary);
        error!("Health check failed: {}", summary);
        Err(summary.into())
    }
}
