//! oled_status - Raspberry Pi OLED status daemon binary
//!
//! Runs the display/alarm loop, or prints a one-shot status report.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use oled_status::telemetry::discover_md_device;
use oled_status::{
    button_channel, AlarmRules, ButtonEvent, Config, DefaultButton, DefaultBuzzer, Display,
    GlancesSource, LogDisplay, MdadmSource, Need, PageContext, Scheduler, Screen, StatusError,
    StatusReport, SystemSource, Telemetry,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "oled_status")]
#[command(about = "Raspberry Pi OLED status display with RAID and temperature alarms")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Glances API base URL
    #[arg(long)]
    glances_url: Option<String>,

    /// Mount point of the monitored array
    #[arg(long)]
    raid_mount: Option<String>,

    /// BCM pin of the navigation button
    #[arg(long)]
    button_pin: Option<u8>,

    /// BCM pin of the buzzer
    #[arg(long)]
    buzzer_pin: Option<u8>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the display and alarms until SIGINT/SIGTERM (default)
    Run,

    /// Refresh every source once, print a status report and exit
    Snapshot(SnapshotArgs),
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = load_config(&cli)?;

    match &cli.command {
        Some(Commands::Snapshot(args)) => snapshot_command(&config, args).await,
        Some(Commands::Run) | None => run_command(&config).await,
    }
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

/// Config file (or defaults), then command-line overrides, then validation.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(url) = &cli.glances_url {
        config = config.with_glances_url(url);
    }
    if let Some(mount) = &cli.raid_mount {
        config = config.with_raid_mount(mount);
    }
    if let Some(pin) = cli.button_pin {
        config = config.with_button_pin(pin);
    }
    if let Some(pin) = cli.buzzer_pin {
        config = config.with_buzzer_pin(pin);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn discover_md(config: &Config) -> Option<String> {
    discover_md_device(&config.raid_mount, Path::new("/proc"), Path::new("/dev"))
}

async fn run_command(config: &Config) -> anyhow::Result<()> {
    info!("Starting oled_status...");

    let mut display = LogDisplay::new();
    if let Err(e) = display.show(&Screen::message("Loading...", None)) {
        error!("Display unavailable: {}", e);
    }

    let Some(md_name) = discover_md(config) else {
        error!("No md array found for {}", config.raid_mount);
        let _ = display.show_error("RAID not found", Some(&config.raid_mount));
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = display.clear();
        return Err(StatusError::raid_error(format!(
            "no md array backs {}",
            config.raid_mount
        ))
        .into());
    };
    info!("Monitoring /dev/{} mounted at {}", md_name, config.raid_mount);

    let (presses, buttons) = button_channel();
    let (buzzer, button) = match init_gpio(config, presses) {
        Ok(hardware) => hardware,
        Err(e) => {
            let _ = display.clear();
            return Err(e).context("GPIO initialisation failed");
        }
    };

    let glances = GlancesSource::new(&config.glances_url, config.fetch_timeout())?;
    let telemetry = Telemetry::new(
        glances,
        MdadmSource::new(md_name.clone()),
        SystemSource::default(),
        Some(md_name),
        config.fetch_timeout(),
    );

    info!("Configuration:");
    info!("  - Glances: {}", config.glances_url);
    info!("  - Button pin: {}, buzzer pin: {}", config.button_pin, config.buzzer_pin);
    info!(
        "  - Data/alarm/display: {}ms/{}ms/{}ms",
        config.data_interval_ms, config.alarm_interval_ms, config.display_interval_ms
    );

    let mut scheduler =
        Scheduler::new(config, telemetry, display, buzzer, buttons).with_button(button);
    scheduler.run(shutdown_signal()).await?;

    info!("Stopped");
    Ok(())
}

fn init_gpio(
    config: &Config,
    presses: mpsc::Sender<ButtonEvent>,
) -> oled_status::Result<(DefaultBuzzer, DefaultButton)> {
    let buzzer = DefaultBuzzer::new(config.buzzer_pin)?;
    let button = DefaultButton::listen(config.button_pin, presses)?;

    #[cfg(feature = "gpio")]
    info!("GPIO enabled");

    #[cfg(not(feature = "gpio"))]
    info!("GPIO not available (feature not compiled)");

    Ok((buzzer, button))
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

async fn snapshot_command(config: &Config, args: &SnapshotArgs) -> anyhow::Result<()> {
    let md_name = discover_md(config);
    if md_name.is_none() {
        error!("No md array found for {}", config.raid_mount);
    }

    let mut telemetry = Telemetry::new(
        GlancesSource::new(&config.glances_url, config.fetch_timeout())?,
        MdadmSource::new(md_name.clone().unwrap_or_default()),
        SystemSource::default(),
        md_name.clone(),
        config.fetch_timeout(),
    );

    let needs: Vec<Need> = Need::everything(Duration::ZERO)
        .into_iter()
        .filter(|need| md_name.is_some() || !matches!(need, Need::Raid(..)))
        .collect();
    let fetched = telemetry
        .refresh(&needs, oled_status::scheduler::now())
        .await;
    info!("Fetched {} values", fetched);

    let report = StatusReport::build(
        telemetry.capture(),
        &AlarmRules::from_config(config),
        &PageContext::from_config(config),
    );

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", report),
    }

    Ok(())
}
