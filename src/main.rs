use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use wifi_heatmap::config::{self, Config};
use wifi_heatmap::dataset::{DatasetSummary, Metric, ScatteredMetricDataset};
use wifi_heatmap::error::AppError;
use wifi_heatmap::interpolation::{self, DenseField, EdgePolicy, GridSpec, Method};
use wifi_heatmap::measure::{self, Collaborators, CyclePlan, MonitorSchedule};
use wifi_heatmap::platform::capture::SystemCapture;
use wifi_heatmap::probe::command::{Iperf3Transport, PingTransport};
use wifi_heatmap::record::{self, Coordinates};
use wifi_heatmap::{api, state};

/// Upper bound for a single status or gateway command.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "wifi-heatmap", about = "WiFi site survey measurements and heatmap fields")]
struct Cli {
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Take one measurement at a floor position and store it.
    Measure {
        #[arg(long)]
        x: Option<f64>,
        #[arg(long)]
        y: Option<f64>,
    },
    /// Measure repeatedly at one position until stopped.
    Monitor {
        #[arg(long)]
        x: Option<f64>,
        #[arg(long)]
        y: Option<f64>,
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
        /// Runs until Ctrl-C when unset.
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Interpolate stored measurements and print the field as JSON.
    Field {
        #[arg(long, default_value = "rssi")]
        metric: Metric,
        #[arg(long)]
        method: Option<Method>,
        #[arg(long)]
        edge_policy: Option<EdgePolicy>,
        #[arg(long)]
        nx: Option<usize>,
        #[arg(long)]
        ny: Option<usize>,
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print counts and per-metric ranges of stored measurements.
    Summary,
    /// Serve the stored measurements over HTTP.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = config::load_from_path(&cli.config)?;
    init_tracing(config.log_level());
    tracing::info!(config_path = %cli.config.display(), "wifi-heatmap starting");

    match cli.command {
        Command::Measure { x, y } => {
            let path = measure_once(&config, coordinates(x, y)?)?;
            println!("{}", path.display());
        }
        Command::Monitor {
            x,
            y,
            interval_secs,
            duration_secs,
        } => {
            let schedule = MonitorSchedule {
                interval: Duration::from_secs(interval_secs),
                duration: duration_secs.map(Duration::from_secs),
                max_cycles: None,
            };
            for path in monitor(&config, coordinates(x, y)?, schedule).await? {
                println!("{}", path.display());
            }
        }
        Command::Field {
            metric,
            method,
            edge_policy,
            nx,
            ny,
            output,
        } => {
            let mut spec = config.grid_spec();
            spec.method = method.unwrap_or(spec.method);
            spec.edge_policy = edge_policy.unwrap_or(spec.edge_policy);
            spec.resolution_x = nx.unwrap_or(spec.resolution_x);
            spec.resolution_y = ny.unwrap_or(spec.resolution_y);

            let field = compute_field(&config.output_dir(), metric, &spec)?;
            write_json(&field, output.as_deref())?;
        }
        Command::Summary => {
            let records = record::load_dir(&config.output_dir())?;
            write_json(&DatasetSummary::from_records(&records), None)?;
        }
        Command::Serve { port } => serve(&config, port).await?,
    }

    Ok(())
}

fn coordinates(x: Option<f64>, y: Option<f64>) -> Result<Coordinates, AppError> {
    match (x, y) {
        (Some(x), Some(y)) => Ok(Coordinates::new(x, y)),
        _ => Err(AppError::MissingCoordinates),
    }
}

fn cycle_plan(config: &Config) -> Result<CyclePlan, AppError> {
    let platform = config
        .platform()
        .ok_or_else(|| AppError::UnsupportedPlatform(std::env::consts::OS.to_string()))?;
    let interface = config
        .interface()
        .unwrap_or_else(|| platform.default_interface().to_string());
    tracing::info!(platform = %platform, interface = %interface, "Measurement platform resolved");

    Ok(CyclePlan {
        platform,
        interface,
        target_host: config.target_host(),
        settings: config.probe_settings(),
    })
}

/// Owned system-backed transports for one process.
struct SystemTransports {
    capture: SystemCapture,
    echo: PingTransport,
    throughput: Iperf3Transport,
}

impl SystemTransports {
    fn new(plan: &CyclePlan) -> Self {
        Self {
            capture: SystemCapture::new(plan.platform, plan.interface.clone(), CAPTURE_TIMEOUT),
            echo: PingTransport::new(plan.platform),
            throughput: Iperf3Transport,
        }
    }

    fn collaborators(&mut self) -> Collaborators<'_> {
        Collaborators {
            capture: &mut self.capture,
            echo: &mut self.echo,
            throughput: &mut self.throughput,
        }
    }
}

fn measure_once(config: &Config, coordinates: Coordinates) -> Result<PathBuf, AppError> {
    let plan = cycle_plan(config)?;
    let mut transports = SystemTransports::new(&plan);
    let mut io = transports.collaborators();
    let (_, path) = measure::measure_and_store(&mut io, &plan, coordinates, &config.output_dir())?;
    Ok(path)
}

async fn monitor(
    config: &Config,
    coordinates: Coordinates,
    schedule: MonitorSchedule,
) -> Result<Vec<PathBuf>, AppError> {
    let plan = cycle_plan(config)?;
    let output_dir = config.output_dir();

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c_stop = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current cycle");
            ctrl_c_stop.store(true, Ordering::Relaxed);
        }
    });

    let stored = tokio::task::spawn_blocking(move || {
        let mut transports = SystemTransports::new(&plan);
        let mut io = transports.collaborators();
        measure::monitor(&mut io, &plan, coordinates, &output_dir, schedule, &stop)
    })
    .await?;
    Ok(stored)
}

fn compute_field(
    records_dir: &Path,
    metric: Metric,
    spec: &GridSpec,
) -> Result<DenseField, AppError> {
    let records = record::load_dir(records_dir)?;
    let dataset = ScatteredMetricDataset::from_records(&records, metric);
    let field = interpolation::interpolate(&dataset, spec)?;
    if let Some((min, max)) = field.value_range() {
        tracing::info!(
            metric = %metric,
            min,
            max,
            undefined = field.undefined_cells(),
            "Field computed"
        );
    }
    Ok(field)
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(path = %path.display(), "Output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn serve(config: &Config, port: Option<u16>) -> Result<(), AppError> {
    let state = Arc::new(RwLock::new(state::AppState::new(
        config.output_dir(),
        config.grid_spec(),
    )));

    match state.write() {
        Ok(mut guard) => match guard.reload(SystemTime::now()) {
            Ok(count) => tracing::info!(
                count,
                dir = %guard.records_dir().display(),
                "Measurements loaded"
            ),
            Err(err) => tracing::warn!(error = %err, "No measurements loaded, starting empty"),
        },
        Err(_) => return Err(AppError::StateLock),
    }

    let app = api::router(Arc::clone(&state));
    let port = port.unwrap_or_else(|| config.server_port());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
