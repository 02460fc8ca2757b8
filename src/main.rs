use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use heatshed::cluster::run_local;
use heatshed::config::{ClusterConfig, DEFAULT_SENSOR_PATH};
use heatshed::report::RunReport;
use heatshed::shutdown::install_shutdown_handler;
use heatshed::thermal::{RampSensor, SysfsSensor, TemperatureSensor};

#[derive(Parser, Debug)]
#[command(name = "heatshed")]
#[command(version)]
#[command(about = "A thermally-gated work dispatcher for small compute clusters")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run one dispatch cycle across an in-process cluster
    Run(RunArgs),

    /// Take a single temperature sample and print it
    Sensor(SensorArgs),
}

// =============================================================================
// Run Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct RunArgs {
    /// Total number of tasks to dispatch (ids 0..tasks)
    #[arg(long, default_value = "1000")]
    tasks: u64,

    /// Number of worker ranks, including the coordinator
    #[arg(long, default_value = "4")]
    workers: u32,

    /// Ranks hosted per physical node
    #[arg(long, default_value = "4")]
    cores_per_node: u32,

    /// Thermal admission threshold, in the sensor's Fahrenheit scale
    #[arg(long, default_value = "70.0")]
    threshold_f: f64,

    /// Sleep between gate re-checks while throttled (milliseconds)
    #[arg(long, default_value = "500")]
    poll_interval_ms: u64,

    /// Maximum temperature samples archived per node
    #[arg(long, default_value = "1000")]
    max_recordings: usize,

    /// Milli-degree sensor file to read
    #[arg(long, default_value = DEFAULT_SENSOR_PATH)]
    sensor_path: PathBuf,

    /// Use the synthetic ramp sensor instead of the sysfs file
    #[arg(long)]
    synthetic: bool,

    /// Per-worker collection timeout in seconds (0 waits forever)
    #[arg(long, default_value = "60")]
    aggregation_timeout_secs: u64,

    /// Write the full run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Parser, Debug)]
struct SensorArgs {
    /// Milli-degree sensor file to read
    #[arg(long, default_value = DEFAULT_SENSOR_PATH)]
    path: PathBuf,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_cluster(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClusterConfig::new(args.tasks, args.workers)
        .with_cores_per_node(args.cores_per_node)
        .with_threshold_f(args.threshold_f)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms))
        .with_max_recordings(args.max_recordings)
        .with_sensor_path(args.sensor_path.clone())
        .with_aggregation_timeout(match args.aggregation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        });

    let cancel = install_shutdown_handler();

    let synthetic = args.synthetic;
    let sensor_path = config.thermal.sensor_path.clone();
    let make_sensor = move |_rank, _node| -> Box<dyn TemperatureSensor> {
        if synthetic {
            Box::new(RampSensor::default())
        } else {
            Box::new(SysfsSensor::new(sensor_path.clone()))
        }
    };

    let report = run_local(config, make_sensor, cancel).await?;

    if let Some(path) = &args.report {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "run report written");
    }

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Table => print_report_table(&report),
    }
    Ok(())
}

fn print_report_table(report: &RunReport) {
    println!("Run {}", report.run_id);
    println!("{}", "=".repeat(52));
    println!("Tasks completed: {}", report.result.len());
    println!("Duration:        {} ms", report.duration().num_milliseconds());
    println!();
    println!(
        "{:<6} {:<6} {:<14} {:<14} TASKS",
        "RANK", "NODE", "PROCESSOR", "RANGE"
    );
    println!("{}", "-".repeat(52));
    for worker in &report.workers {
        println!(
            "{:<6} {:<6} {:<14} {:<14} {}",
            worker.rank,
            worker.node.to_string(),
            worker.processor,
            worker.range.to_string(),
            worker.tasks_completed
        );
    }
    println!();
    println!("{:<6} {:<9} {:<8} THROTTLE EVENTS", "NODE", "SAMPLES", "PEAK");
    println!("{}", "-".repeat(44));
    for node in &report.nodes {
        let peak = node
            .peak_fahrenheit
            .map(|f| format!("{f:.1}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<9} {:<8} {}",
            node.node.to_string(),
            node.samples_recorded,
            peak,
            node.throttle_events.len()
        );
    }
}

fn read_sensor(args: SensorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut sensor = SysfsSensor::new(args.path);
    let fahrenheit = sensor.sample()?;
    println!("{fahrenheit:.2}");
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Run(run_args) => {
            run_cluster(run_args).await?;
        }
        Commands::Sensor(sensor_args) => {
            read_sensor(sensor_args)?;
        }
    }

    Ok(())
}
