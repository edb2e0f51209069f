//! ---
//! fds_section: "01-core-functionality"
//! fds_subsection: "binary"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Binary entrypoint for the pump field device simulator."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use fds_common::config::AppConfig;
use fds_common::logging::init_tracing;
use fds_device::{Location, LoopbackTransport, PumpDeviceSpec};
use fds_fleet::{FleetOrchestrator, FleetSpec};
use fds_telemetry::export::{write_training_data, TrainingScenario};
use fds_telemetry::generate_pump_telemetry;
use tokio::signal;
use tracing::{error, info, warn};

/// Transition length used for the gradual-failure training dataset.
const GRADUAL_TRAINING_ITERATIONS: usize = 2_500;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Pump field device simulator daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Generate and send pump device telemetry")]
    Run,
    #[command(about = "Generate anomaly-model training data in CSV files")]
    Generate {
        #[arg(long, default_value = "target/training-data")]
        output_dir: PathBuf,
        #[arg(long, help = "Override the configured sample size")]
        sample_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/fdsd.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("fdsd", &config.logging)?;
    match &loaded.source {
        Some(source) => info!(config_path = %source.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults and environment"),
    }

    let command = match cli.command {
        Some(command) => command,
        None => prompt_for_operation()?,
    };

    match command {
        Commands::Run => run_fleet(config).await,
        Commands::Generate {
            output_dir,
            sample_size,
        } => generate_training_data(&config, &output_dir, sample_size),
    }
}

/// Line-oriented menu shown when no subcommand is supplied.
fn prompt_for_operation() -> Result<Commands> {
    println!("Pump Telemetry Generator");
    println!("=============");
    println!("** Enter 1 to generate and send pump device telemetry.");
    println!("** Enter 2 to generate anomaly model training data in CSV files.");
    println!("=============");
    println!();
    println!("Press Ctrl+C to cancel while the generator is running.");
    println!();

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("Enter the number of the operation you would like to perform > ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(anyhow!("stdin closed before an operation was selected"));
        }
        match line.trim() {
            "1" => return Ok(Commands::Run),
            "2" => {
                return Ok(Commands::Generate {
                    output_dir: PathBuf::from("target/training-data"),
                    sample_size: None,
                })
            }
            other => println!("Invalid input '{other}'. Please enter 1 or 2"),
        }
    }
}

/// Build the three-pump scenario, start the fleet, and wait for completion or
/// an operator interrupt.
async fn run_fleet(config: AppConfig) -> Result<()> {
    config.validate()?;
    let simulation = &config.simulation;
    let sample_size = simulation.sample_size;
    let fail_over = simulation.fail_over_iterations;
    let seed = simulation.seed;

    info!(sample_size, fail_over, "setting up simulated pump devices and generating sample data");

    let key = |index: usize| {
        config
            .provisioning
            .device_keys
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("DEVICE_{}_KEY must be provided", index + 1))
    };

    // One pump degrades gradually, one never fails, one fails abruptly; the
    // healthy pumps run long enough to cover the first one's ramp.
    let devices = vec![
        PumpDeviceSpec {
            device_number: 1,
            device_key: key(0)?,
            serial_number: "DEVICE001".to_owned(),
            ip_address: "192.168.1.1".to_owned(),
            location: Location::new(10.9145, 76.9486),
            telemetry: generate_pump_telemetry(sample_size, true, fail_over, seed)?,
        },
        PumpDeviceSpec {
            device_number: 2,
            device_key: key(1)?,
            serial_number: "DEVICE002".to_owned(),
            ip_address: "192.168.1.2".to_owned(),
            location: Location::new(11.2321, 77.1067),
            telemetry: generate_pump_telemetry(sample_size + fail_over, false, 0, seed + 1)?,
        },
        PumpDeviceSpec {
            device_number: 3,
            device_key: key(2)?,
            serial_number: "DEVICE003".to_owned(),
            ip_address: "192.168.1.3".to_owned(),
            location: Location::new(10.5823, 76.9347),
            telemetry: generate_pump_telemetry(sample_size + fail_over, true, 0, seed + 2)?,
        },
    ];

    // Cloud connectivity is out of scope for the simulator; the loopback hub
    // stands in for the provisioning and telemetry transport.
    let transport = LoopbackTransport::new();
    info!(endpoint = %config.provisioning.dps_endpoint, "transport ready");

    let fleet = Arc::new(
        FleetOrchestrator::start(
            FleetSpec {
                id_scope: config.provisioning.id_scope.clone(),
                dps_endpoint: config.provisioning.dps_endpoint.clone(),
                cycle_interval: simulation.cycle_interval,
                devices,
            },
            transport,
        )
        .await,
    );

    // The waiter runs as its own task so an interrupt does not unwind its
    // in-progress joins; after cancel_all the same task drains the loops
    // still winding down.
    let waiter = fleet.clone();
    let mut completion = tokio::spawn(async move { waiter.await_completion().await });
    tokio::select! {
        result = &mut completion => {
            if let Err(err) = result {
                error!(error = %err, "completion task failed");
            }
            info!("all device runs completed");
        }
        result = signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "failed to listen for interrupt");
            }
            warn!("stopped generator; no more events are being sent");
            fleet.cancel_all();
            if let Err(err) = completion.await {
                error!(error = %err, "completion task failed");
            }
        }
    }

    info!(total_messages = fleet.total_messages_sent(), "done sending generated pump data");
    Ok(())
}

/// Produce the three offline training datasets through the same synthesis
/// path the live fleet uses.
fn generate_training_data(
    config: &AppConfig,
    output_dir: &PathBuf,
    sample_size: Option<usize>,
) -> Result<()> {
    let sample_size = sample_size.unwrap_or(config.simulation.sample_size);
    let seed = config.simulation.seed;
    info!(sample_size, output_dir = %output_dir.display(), "generating data for model training; this may take a while");

    info!("generating data with no failures");
    write_training_data(output_dir, TrainingScenario::NoFailure, sample_size, 0, seed)?;
    info!("generating data with immediate failures");
    write_training_data(
        output_dir,
        TrainingScenario::ImmediateFailure,
        sample_size,
        0,
        seed,
    )?;
    info!("generating data with gradual failures");
    write_training_data(
        output_dir,
        TrainingScenario::GradualFailure,
        sample_size,
        GRADUAL_TRAINING_ITERATIONS,
        seed,
    )?;

    info!("generation complete");
    Ok(())
}
