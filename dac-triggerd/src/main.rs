use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dac_trigger::{
    init_logging, spawn_input_watchers, JsonFileStore, LoggingMode, TracingStatus, TriggerConfig,
    TriggerService,
};
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};
use trigger_gpio::{CdevGpio, GpioPort, MockGpio, PinMap, DEFAULT_CHIP};

pub mod bridge;

use bridge::{serve_requests, JsonLinesTransport, LineWriter, OUTPUT_QUEUE};

/// DAC trigger daemon
///
/// Powers a DAC up and down with a zone's playback and an external trigger
/// input. Zone events and settings requests are read from stdin as JSON
/// lines; pause/play commands and settings replies are written to stdout the
/// same way.
#[derive(Parser, Debug)]
#[command(name = "dac-triggerd")]
#[command(about = "Drive DAC power from zone playback and an external trigger")]
#[command(version)]
pub struct Args {
    /// Chip offset (BCM pin on a Raspberry Pi) of the DAC enable output
    #[arg(long, default_value = "23")]
    pub dac_enable_pin: u32,

    /// Chip offset of the DAC power-good input
    #[arg(long, default_value = "22")]
    pub power_good_pin: u32,

    /// Chip offset of the external trigger input
    #[arg(long, default_value = "16")]
    pub trigger_in_pin: u32,

    /// Chip offset of the first trigger output
    #[arg(long, default_value = "6")]
    pub trigger_out1_pin: u32,

    /// Chip offset of the second trigger output
    #[arg(long, default_value = "13")]
    pub trigger_out2_pin: u32,

    /// GPIO character device
    #[arg(long, default_value = DEFAULT_CHIP)]
    pub chip: PathBuf,

    /// Time an input level must hold before it counts, in milliseconds
    #[arg(long, default_value = "50")]
    pub edge_debounce_ms: u64,

    /// Settings file (default: <config dir>/dac-trigger/settings.json)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Log mode (silent, development, debug)
    #[arg(long, default_value = "development")]
    pub log_mode: String,

    /// Run against a simulated board instead of the GPIO chip
    #[arg(long)]
    pub simulate: bool,
}

impl Args {
    pub fn pin_map(&self) -> PinMap {
        PinMap {
            dac_enable: self.dac_enable_pin,
            power_good: self.power_good_pin,
            external_trigger: self.trigger_in_pin,
            trigger_out_1: self.trigger_out1_pin,
            trigger_out_2: self.trigger_out2_pin,
        }
    }

    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if let Some((a, b)) = self.pin_map().find_conflict() {
            return Err(anyhow::anyhow!(
                "{} and {} are both assigned pin {}",
                a,
                b,
                self.pin_map().pin(a)
            ));
        }

        self.log_mode
            .parse::<LoggingMode>()
            .map_err(|e| anyhow::anyhow!("{}. Valid modes: silent, development, debug", e))?;

        Ok(())
    }
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub pins: PinMap,
    pub chip: PathBuf,
    pub settings_path: PathBuf,
    pub log_mode: LoggingMode,
    pub simulate: bool,
    pub trigger: TriggerConfig,
}

impl DaemonConfig {
    /// Create configuration from command line arguments and environment variables
    pub fn from_env() -> Result<Self> {
        let mut args = Args::parse();

        if let Ok(path) = std::env::var("DAC_TRIGGER_SETTINGS") {
            args.settings = Some(PathBuf::from(path));
        }

        if let Ok(mode) = std::env::var("DAC_TRIGGER_LOG_MODE") {
            args.log_mode = mode;
        }

        if let Ok(chip) = std::env::var("DAC_TRIGGER_CHIP") {
            args.chip = PathBuf::from(chip);
        }

        Self::try_from(args)
    }

    pub fn print_summary(&self) {
        info!("Configuration:");
        info!(
            "  Pins: enable={} power-good={} trigger-in={} outputs={},{}",
            self.pins.dac_enable,
            self.pins.power_good,
            self.pins.external_trigger,
            self.pins.trigger_out_1,
            self.pins.trigger_out_2
        );
        if self.simulate {
            info!("  GPIO: simulated");
        } else {
            info!("  GPIO: {}", self.chip.display());
        }
        info!("  Settings: {}", self.settings_path.display());
        info!("  Input debounce: {:?}", self.trigger.input_debounce);
    }
}

impl TryFrom<Args> for DaemonConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        args.validate()?;

        let settings_path = match &args.settings {
            Some(path) => path.clone(),
            None => JsonFileStore::default_path()?,
        };

        let trigger = TriggerConfig::default()
            .with_input_debounce(Duration::from_millis(args.edge_debounce_ms));
        trigger.validate()?;

        Ok(Self {
            pins: args.pin_map(),
            log_mode: args.log_mode.parse()?,
            chip: args.chip,
            settings_path,
            simulate: args.simulate,
            trigger,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::from_env()?;
    init_logging(config.log_mode).context("Failed to initialize logging")?;
    config.print_summary();

    let result = if config.simulate {
        run(config, MockGpio::following()).await
    } else {
        let port = CdevGpio::open(&config.chip, config.pins)
            .context("Failed to set up GPIO lines")?;
        run(config, port).await
    };

    if let Err(e) = &result {
        error!("dac-triggerd failed: {:#}", e);
    }
    result
}

/// Run the service until Ctrl+C
async fn run<P: GpioPort>(config: DaemonConfig, port: P) -> Result<()> {
    let (lines, writer_task) = LineWriter::spawn(tokio::io::stdout(), OUTPUT_QUEUE);
    let store = JsonFileStore::new(&config.settings_path);
    let (service, handle) = TriggerService::new(
        config.trigger.clone(),
        port.clone(),
        JsonLinesTransport::new(lines.clone()),
        TracingStatus,
        store,
    )
    .context("Failed to create trigger service")?;

    let service_task = tokio::spawn(service.run());
    let watchers = spawn_input_watchers(port, &handle, &config.trigger);

    let bridge_task = tokio::spawn({
        let handle = handle.clone();
        let lines = lines.clone();
        async move {
            let stdin = BufReader::new(tokio::io::stdin());
            match serve_requests(stdin, &handle, &lines).await {
                Ok(stats) => warn!(
                    "Request input closed ({} forwarded, {} answered, {} rejected); trigger input still active",
                    stats.forwarded, stats.answered, stats.rejected
                ),
                Err(e) => error!("Failed to read requests: {}", e),
            }
        }
    });

    info!("dac-triggerd running, press Ctrl+C to stop");
    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down");

    bridge_task.abort();
    let _ = bridge_task.await;
    for watcher in &watchers {
        watcher.stop();
    }

    if let Err(e) = handle.shutdown().await {
        warn!("Trigger service already stopped: {}", e);
    }
    let service = service_task.await.context("Trigger service task failed")?;
    info!(
        "Stopped with DAC power {}",
        service.arbitrator().trigger_state()
    );

    // Flush whatever is still queued for stdout
    drop(service);
    drop(lines);
    if writer_task.await.is_err() {
        warn!("Output writer task failed");
    }

    Ok(())
}
