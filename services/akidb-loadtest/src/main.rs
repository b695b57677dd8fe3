use akidb_loadgen::config::LoggingConfig;
use akidb_loadgen::{
    parse_duration, Backend, InMemoryVectorService, LoadTestConfig, LoadTestOrchestrator,
    ReportFormat, RestConnector, TestReport,
};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "akidb-loadtest")]
#[command(about = "High-throughput insert and search load generator for AkiDB", long_about = None)]
#[command(version)]
struct Cli {
    /// Target service address (host:port or URL)
    #[arg(long, env = "AKIDB_LOADTEST_ADDRESS")]
    address: Option<String>,

    /// Insertion phase duration (e.g. 30s, 2m, 1m30s)
    #[arg(long, value_parser = parse_duration)]
    duration: Option<Duration>,

    /// Search phase duration (defaults to a quarter of --duration)
    #[arg(long, value_parser = parse_duration)]
    search_duration: Option<Duration>,

    /// Pressure level: low, medium, high, extreme or a configured tier
    #[arg(long)]
    pressure: Option<String>,

    /// Ramp batch size linearly from 10% to the maximum
    #[arg(long)]
    ramp_up: bool,

    /// Log throughput every progress interval while phases run
    #[arg(long)]
    real_time: bool,

    /// Override the worker count of the pressure level
    #[arg(long)]
    workers: Option<usize>,

    /// Override the batch size of the pressure level
    #[arg(long)]
    batch_size: Option<usize>,

    /// Seed for vector generation
    #[arg(long)]
    seed: Option<u64>,

    /// Vector dimension
    #[arg(long)]
    dimension: Option<usize>,

    /// Collection created and dropped by the run
    #[arg(long)]
    collection: Option<String>,

    /// Target backend: rest or memory
    #[arg(long)]
    backend: Option<Backend>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report format: table, markdown or json
    #[arg(long, default_value = "table")]
    report_format: ReportFormat,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: pretty or json
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    init_logging(&config.logging);

    let run_config = config.run_config();
    info!("Starting AkiDB load test");
    info!("Address: {} ({})", run_config.address, config.target.backend);
    info!(
        "Pressure: {} ({} workers, batch {})",
        run_config.profile.label().to_uppercase(),
        run_config.profile.workers,
        run_config.profile.batch_size
    );
    info!(
        "Insert for {:?}, search for {:?}, ramp-up {}",
        run_config.duration,
        run_config.effective_search_duration(),
        if run_config.ramp_up { "on" } else { "off" }
    );

    let mut orchestrator = LoadTestOrchestrator::new(run_config);
    let result = match config.target.backend {
        Backend::Memory => {
            let service = Arc::new(InMemoryVectorService::new());
            orchestrator.run(&service).await
        }
        Backend::Rest => {
            let connector = RestConnector {
                timeout: Duration::from_secs(config.target.timeout_seconds),
                max_in_flight: config.target.max_in_flight_requests,
            };
            orchestrator.run(&connector).await
        }
    };

    match result.map_err(anyhow::Error::from).and_then(|report| emit(&report, &cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n❌ Load test failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// File, then environment, then command-line flags.
fn build_config(cli: &Cli) -> anyhow::Result<LoadTestConfig> {
    let mut config = match &cli.config {
        Some(path) => LoadTestConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LoadTestConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(address) = &cli.address {
        config.target.address = address.clone();
    }
    if let Some(backend) = cli.backend {
        config.target.backend = backend;
    }
    if let Some(collection) = &cli.collection {
        config.target.collection = collection.clone();
    }
    if let Some(duration) = cli.duration {
        config.run.duration = duration;
    }
    if let Some(search_duration) = cli.search_duration {
        config.run.search_duration = Some(search_duration);
    }
    if let Some(pressure) = &cli.pressure {
        config.run.pressure = pressure.clone();
    }
    if cli.ramp_up {
        config.run.ramp_up = true;
    }
    if cli.real_time {
        config.run.real_time = true;
    }
    if let Some(seed) = cli.seed {
        config.run.seed = seed;
    }
    if let Some(dimension) = cli.dimension {
        config.workload.dimension = dimension;
    }
    if cli.workers.is_some() {
        config.workload.workers = cli.workers;
    }
    if cli.batch_size.is_some() {
        config.workload.batch_size = cli.batch_size;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    config.validate()?;
    Ok(config)
}

fn emit(report: &TestReport, cli: &Cli) -> anyhow::Result<()> {
    match &cli.output {
        Some(path) => {
            report
                .write_to(path, cli.report_format)
                .with_context(|| format!("writing report to {}", path.display()))?;
            println!("\n✅ Load test complete!");
            println!("  Vectors inserted: {}", report.insert.units);
            println!("  Insert throughput: {:.0} vectors/sec", report.insert.throughput());
            println!("  Search throughput: {:.1} searches/sec", report.search.throughput());
            println!("  Report: {}", path.display());
        }
        None => {
            let rendered = report.render(cli.report_format)?;
            println!("{}", rendered);
        }
    }
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_compound_durations() {
        let cli = Cli::try_parse_from([
            "akidb-loadtest",
            "--duration",
            "1m30s",
            "--pressure",
            "HIGH",
            "--ramp-up",
            "--backend",
            "memory",
        ])
        .unwrap();

        assert_eq!(cli.duration, Some(Duration::from_secs(90)));
        assert!(cli.ramp_up);

        let config = build_config(&cli).unwrap();
        assert_eq!(config.target.backend, Backend::Memory);
        assert_eq!(config.run_config().profile.workers, 50);
    }

    #[test]
    fn test_cli_rejects_bad_duration() {
        let result = Cli::try_parse_from(["akidb-loadtest", "--duration", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_dimension_is_config_error() {
        let cli = Cli::try_parse_from(["akidb-loadtest", "--dimension", "0"]).unwrap();
        assert!(build_config(&cli).is_err());
    }
}
