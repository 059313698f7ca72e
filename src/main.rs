//! Scroll Odometer CLI
//!
//! Measures how far you scroll, in meters.

use clap::{Parser, Subcommand};
use scroll_odometer::{
    collector::{EventSource, EventStream},
    config::Config,
    core::DeltaExtractor,
    ledger::{DayKey, LeaderboardPeriod, Ledger, RestoreRequest},
    service::{EventOutcome, ScrollService},
    transparency::{create_shared_log_with_persistence, TransparencyLog},
    SharedClock, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "gateway")]
use scroll_odometer::{BlockingGatewayClient, GatewayConfig, GatewaySink};

#[derive(Parser)]
#[command(name = "scroll-odometer")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Measures scroll distance and keeps daily, lifetime and per-app totals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process host events from stdin or a file
    Start {
        /// JSON-lines event file ("-" or omitted for stdin)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Forward samples to the presentation gateway (requires gateway feature)
        #[arg(long)]
        gateway: bool,

        /// Gateway port (config file or runtime dir if not specified)
        #[arg(long)]
        gateway_port: Option<u16>,

        /// Gateway token (config file or runtime dir if not specified)
        #[arg(long)]
        gateway_token: Option<String>,
    },

    /// Show running totals and processing statistics
    Status,

    /// Show the 7-day history
    Week {
        /// First day of the window (Y-M-D); this week's Monday by default
        #[arg(long)]
        start: Option<String>,
    },

    /// Show per-app distance, largest first
    Leaderboard {
        /// Sum the week starting on this day (Y-M-D) instead of today
        #[arg(long)]
        week: Option<String>,
    },

    /// Overwrite the running totals
    Restore {
        #[arg(long)]
        daily_distance: f64,

        #[arg(long)]
        daily_scrolls: i64,

        #[arg(long)]
        lifetime_distance: f64,

        #[arg(long)]
        lifetime_scrolls: i64,

        /// Day the daily totals belong to (Y-M-D); today by default
        #[arg(long)]
        date: Option<String>,
    },

    /// Add distance to an app's total
    AppDistance {
        /// Application id
        app: String,

        /// Meters to add
        distance: f64,

        /// Day to credit (Y-M-D); today by default
        #[arg(long)]
        date: Option<String>,
    },

    /// Record a 0.1 m test sample through the normal path
    TestSample,

    /// Show configuration
    Config,

    /// Serve the ledger over HTTP (requires server feature)
    Serve {
        /// Port to bind on 127.0.0.1 (0 for random)
        #[arg(long, default_value = "8787")]
        port: u16,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            input,
            gateway,
            gateway_port,
            gateway_token,
        } => {
            cmd_start(input, gateway, gateway_port, gateway_token);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Week { start } => {
            cmd_week(start.as_deref());
        }
        Commands::Leaderboard { week } => {
            cmd_leaderboard(week.as_deref());
        }
        Commands::Restore {
            daily_distance,
            daily_scrolls,
            lifetime_distance,
            lifetime_scrolls,
            date,
        } => {
            let date_key = date.as_deref().map(parse_day_or_exit);
            cmd_restore(RestoreRequest {
                daily_distance,
                daily_scrolls,
                lifetime_distance,
                lifetime_scrolls,
                date_key,
            });
        }
        Commands::AppDistance {
            app,
            distance,
            date,
        } => {
            cmd_app_distance(&app, distance, date.as_deref());
        }
        Commands::TestSample => {
            cmd_test_sample();
        }
        Commands::Config => {
            cmd_config();
        }
        Commands::Serve { port } => {
            cmd_serve(port);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scroll_odometer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}), using defaults");
            Config::default()
        }
    }
}

fn open_ledger_or_exit(config: &Config, clock: SharedClock) -> Arc<Ledger> {
    match config.open_ledger(clock) {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            eprintln!("Error opening ledger at {:?}: {e}", config.ledger_path());
            std::process::exit(1);
        }
    }
}

fn parse_day_or_exit(raw: &str) -> DayKey {
    match raw.parse() {
        Ok(day) => day,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn build_service(config: &Config) -> ScrollService {
    let clock = config.clock();
    let ledger = open_ledger_or_exit(config, clock.clone());
    let extractor = DeltaExtractor::new(config.extraction, clock);
    let log = create_shared_log_with_persistence(config.transparency_path());
    ScrollService::new(extractor, ledger, log)
}

#[allow(unused_variables)]
fn cmd_start(
    input: Option<PathBuf>,
    enable_gateway: bool,
    gateway_port: Option<u16>,
    gateway_token: Option<String>,
) {
    println!("Scroll Odometer v{VERSION}");
    println!();

    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let mut service = build_service(&config);
    let session_id = uuid::Uuid::new_v4();

    let source = EventSource::from_arg(input.as_deref());
    println!("Starting odometer...");
    match &source {
        EventSource::Stdin => println!("  Input: stdin (JSON lines)"),
        EventSource::File(path) => println!("  Input: {path:?}"),
    }
    println!("  Ledger: {:?}", config.ledger_path());
    println!(
        "  Timezone: {}",
        config.timezone.as_deref().unwrap_or("local")
    );
    println!("  Session ID: {session_id}");

    #[cfg(feature = "gateway")]
    if enable_gateway || config.gateway.is_some() {
        match create_gateway_client(&config, gateway_port, gateway_token) {
            Ok(client) => {
                println!("  Gateway forwarding: enabled");
                println!("  Device ID: {}", client.device_id());

                match client.test_connection() {
                    Ok(true) => println!("  Gateway connection: OK"),
                    Ok(false) => eprintln!("Warning: Gateway health check failed"),
                    Err(e) => eprintln!("Warning: Could not connect to gateway: {e}"),
                }
                service.attach_sink(Box::new(GatewaySink::new(client)));
            }
            Err(e) => {
                eprintln!("Warning: Gateway initialization failed: {e}");
                eprintln!("Continuing with local persistence only.");
            }
        }
    } else {
        println!("  Gateway forwarding: disabled");
    }

    #[cfg(not(feature = "gateway"))]
    if enable_gateway {
        eprintln!("Warning: --gateway flag ignored (gateway feature not enabled at compile time)");
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let mut stream = EventStream::new(source);
    if let Err(e) = stream.start() {
        eprintln!("Error starting event stream: {e}");
        std::process::exit(1);
    }
    service.on_connected();

    let receiver = stream.receiver().clone();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => match service.handle_event(&event) {
                EventOutcome::Recorded {
                    sample, summary, ..
                } => {
                    if let Some(previous) = &summary.rolled_over_from {
                        println!("[{}] New day, archived {previous}", summary.day);
                    }
                    println!(
                        "[{}] +{:.4} m from {} | today {:.2} m ({} scrolls) | lifetime {:.2} m",
                        summary.day,
                        sample.distance_m,
                        sample.app_id,
                        summary.daily_distance,
                        summary.daily_scrolls,
                        summary.lifetime_distance
                    );
                }
                EventOutcome::PersistFailed { error, .. } => {
                    eprintln!("Error persisting sample: {error}");
                }
                EventOutcome::NoSample => {}
            },
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if !stream.is_running() && receiver.is_empty() {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                eprintln!("Event stream disconnected unexpectedly");
                break;
            }
        }
    }

    println!();
    println!("Stopping odometer...");
    stream.stop();
    service.on_destroy();

    let log = service.transparency();
    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }

    println!();
    println!("{}", log.summary());
}

fn cmd_status() {
    let config = load_config();
    let ledger = open_ledger_or_exit(&config, config.clock());
    let totals = ledger.totals();

    println!("Scroll Odometer Status");
    println!("======================");
    println!();
    println!("Today ({}):", ledger.today());
    println!("  Distance: {:.2} m", totals.daily_distance);
    println!("  Scrolls: {}", totals.daily_scrolls);
    println!("Lifetime:");
    println!("  Distance: {:.2} m", totals.lifetime_distance);
    println!("  Scrolls: {}", totals.lifetime_scrolls);
    println!(
        "Last active day: {}",
        totals.last_date_key.as_deref().unwrap_or("never")
    );
    println!();

    let stats_path = config.transparency_path();
    if stats_path.exists() {
        let stats = TransparencyLog::with_persistence(stats_path).stats();
        println!("Cumulative Statistics:");
        println!("  Events received: {}", stats.events_received);
        println!("  Scroll events: {}", stats.scroll_events);
        println!("  Samples recorded: {}", stats.samples_recorded);
        println!("  Invalid reports skipped: {}", stats.events_rejected);
        println!("  Persistence failures: {}", stats.persist_failures);
        println!("  Forwarding failures: {}", stats.sink_failures);
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_week(start: Option<&str>) {
    let config = load_config();
    let ledger = open_ledger_or_exit(&config, config.clock());
    let start = start
        .map(parse_day_or_exit)
        .unwrap_or_else(|| ledger.today().week_start());

    println!("Week of {start}");
    println!();
    let mut total = 0.0;
    for day in ledger.weekly(start) {
        total += day.distance;
        println!(
            "  {:<10} {:>3}  {:>9.2} m  {:>6} scrolls",
            day.day.to_string(),
            day.day.weekday(),
            day.distance,
            day.scrolls
        );
    }
    println!();
    println!("  Total: {total:.2} m");
}

fn cmd_leaderboard(week: Option<&str>) {
    let config = load_config();
    let ledger = open_ledger_or_exit(&config, config.clock());

    let period = match week.map(parse_day_or_exit) {
        Some(start) => {
            println!("Leaderboard for the week of {start}");
            LeaderboardPeriod::Week(start)
        }
        None => {
            println!("Leaderboard for {}", ledger.today());
            LeaderboardPeriod::Today
        }
    };
    println!();

    let board = ledger.leaderboard(period);
    if board.is_empty() {
        println!("No app distance recorded.");
        return;
    }
    for (rank, entry) in board.iter().enumerate() {
        println!("  {:>2}. {:<40} {:>9.2} m", rank + 1, entry.app_id, entry.distance);
    }
}

fn cmd_restore(request: RestoreRequest) {
    let config = load_config();
    let ledger = open_ledger_or_exit(&config, config.clock());
    match ledger.restore(&request) {
        Ok(()) => println!("Totals restored."),
        Err(e) => {
            eprintln!("Error restoring totals: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_app_distance(app: &str, distance: f64, date: Option<&str>) {
    let config = load_config();
    let ledger = open_ledger_or_exit(&config, config.clock());
    let day = date.map(parse_day_or_exit);
    match ledger.record_app_distance(app, distance, day) {
        Ok(true) => println!("Added {distance} m to {app}."),
        Ok(false) => println!("Nothing recorded (empty app id or non-positive distance)."),
        Err(e) => {
            eprintln!("Error saving app distance: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_test_sample() {
    let config = load_config();
    let mut service = build_service(&config);
    let now = chrono::Utc::now().timestamp_millis();

    match service.inject_test_sample(now) {
        EventOutcome::Recorded { summary, .. } => {
            println!(
                "Test sample recorded: today {:.2} m ({} scrolls)",
                summary.daily_distance, summary.daily_scrolls
            );
        }
        EventOutcome::PersistFailed { error, .. } => {
            eprintln!("Test sample failed: {error}");
            std::process::exit(1);
        }
        EventOutcome::NoSample => {}
    }

    if let Err(e) = service.transparency().save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing config: {e}"),
    }
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) {
    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    // No gateway sink here: its blocking client cannot run inside the server runtime.
    let service = build_service(&config);
    let log = Arc::clone(service.transparency());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async move {
        let server_config = scroll_odometer::server::ServerConfig::new(port);
        let (addr, shutdown) = match scroll_odometer::server::run(server_config, service).await {
            Ok(bound) => bound,
            Err(e) => {
                eprintln!("Error starting server: {e}");
                std::process::exit(1);
            }
        };
        println!("Serving on http://{addr} (Ctrl+C to stop)");

        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Warning: Could not listen for Ctrl+C: {e}");
        }
        let _ = shutdown.send(());
    });

    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_port: u16) {
    eprintln!("Error: serve requires the server feature (cargo build --features server)");
    std::process::exit(1);
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}

/// Create gateway client from CLI args, the config file, or the runtime directory.
#[cfg(feature = "gateway")]
fn create_gateway_client(
    config: &Config,
    port: Option<u16>,
    token: Option<String>,
) -> Result<BlockingGatewayClient, scroll_odometer::GatewayError> {
    let settings = config.gateway.as_ref();
    let port = port.or(settings.map(|s| s.port));
    let token = token.or(settings.map(|s| s.token.clone()));
    let host = settings
        .map(|s| s.host.clone())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    if let (Some(p), Some(t)) = (port, token) {
        return BlockingGatewayClient::new(GatewayConfig::new(host, p, t));
    }

    BlockingGatewayClient::from_runtime()
}
