//! speedwatch - unattended internet speed monitoring daemon.

use clap::{Args, Parser, Subcommand};
use speedwatch::{
    ConnectivityMonitor, Event, Measurement, MonitorConfig, PollingLoop, Provisioner,
    SpeedtestRunner, DEFAULT_RETRY_DELAY_MS, DEFAULT_SAMPLE_INTERVAL_MS,
    DEFAULT_SUCCESS_INTERVAL_MS,
};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "speedwatch")]
#[command(about = "Unattended internet speed monitoring")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Periodically measures connection quality with the Ookla speedtest CLI \
and publishes the latest reading")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory for the measurement tool and its downloads
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Pause between successful measurements in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_SUCCESS_INTERVAL_MS)]
    interval: u64,

    /// Pause after a failed cycle in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_MS)]
    retry_delay: u64,

    /// Connectivity sampling period in milliseconds
    #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL_MS)]
    sample_rate: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitoring daemon (default)
    Run,

    /// Take a single measurement and exit
    Measure(MeasureArgs),
}

#[derive(Args)]
struct MeasureArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Measure(args)) => measure_command(&cli, args).await?,
        Some(Commands::Run) | None => run_command(&cli).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn config_from(cli: &Cli) -> MonitorConfig {
    MonitorConfig::new(&cli.data_dir)
        .with_success_interval_ms(cli.interval)
        .with_retry_delay_ms(cli.retry_delay)
        .with_sample_interval_ms(cli.sample_rate)
}

async fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = config_from(cli);
    info!("starting speedwatch monitor in {}", config.data_dir.display());

    let mut connectivity = ConnectivityMonitor::new(&config);
    connectivity.start();
    info!("connectivity sampler started");

    let runner = SpeedtestRunner::new(&config);
    let (poll, handle) = PollingLoop::new(&config, connectivity, runner);
    let mut events = handle.subscribe();
    let loop_task = tokio::spawn(poll.run());

    // show the placeholder until the first cycle completes
    handle.request_data().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(Event::DataUpdated(measurement)) => print_measurement_line(&measurement),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    // dropping the loop also drops the connectivity sampler and any
    // in-flight tool process
    loop_task.abort();

    Ok(())
}

async fn measure_command(cli: &Cli, args: &MeasureArgs) -> anyhow::Result<()> {
    let config = config_from(cli);

    let provisioner = Provisioner::new(&config);
    provisioner.ensure_binary().await?;

    let runner = SpeedtestRunner::new(&config);
    let report = runner.run().await?;
    let measurement = Measurement::from_report(&report);

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&measurement)?);
        }
        "pretty" => {
            print_pretty_measurement(&measurement);
        }
        _ => {
            error!("Unsupported format: {}. Use 'json' or 'pretty'", args.format);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_measurement_line(measurement: &Measurement) {
    if measurement.connected {
        println!(
            "down {} MB/s | up {} MB/s | ping {} ms | jitter {} ms | {} via {} ({})",
            measurement.download_display(),
            measurement.upload_display(),
            measurement.ping_display(),
            measurement.jitter_display(),
            measurement.isp,
            measurement.server,
            measurement.client
        );
    } else {
        println!("no measurement yet");
    }
}

fn print_pretty_measurement(measurement: &Measurement) {
    println!(
        "Speed measurement ({})",
        chrono::DateTime::from_timestamp_millis(measurement.timestamp as i64)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("==========================================");
    println!();
    println!("  Client:   {}", measurement.client);
    println!("  ISP:      {}", measurement.isp);
    println!("  Server:   {}", measurement.server);
    println!("  Ping:     {} ms", measurement.ping_display());
    println!("  Jitter:   {} ms", measurement.jitter_display());
    println!("  Download: {} MB/s", measurement.download_display());
    println!("  Upload:   {} MB/s", measurement.upload_display());
}
