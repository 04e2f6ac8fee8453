// Public modules
pub mod angle;
pub mod bus;
pub mod calibration;
pub mod config;
pub mod cycle;
pub mod errors;
pub mod feedback;
pub mod filter;
pub mod messages;
pub mod posture;
pub mod registry;
pub mod reporting;
pub mod scheduler;
pub mod sensors;
pub mod types;

// Re-export commonly used types
pub use config::{load_hub_config, HubConfig};
pub use cycle::{CycleOutcome, PollingCycle};
pub use errors::{SensorError, SensorResult};
pub use registry::{open_bus, SensorArray};
pub use reporting::{LogReporter, Reporter};
pub use scheduler::{run_monitor, MonitorCommand};
pub use types::{Joint, Triplet};

use feedback::{spawn_feedback_task, HapticMotor, SysfsPwm};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialize tracing with default configuration
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// Run the posture monitor with the configuration found in `config_path`
pub async fn run_posture_hub(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("[PostureSensorHub] starting up...");

    let hub_config_path = format!("{}/posture.toml", config_path);
    let config = load_hub_config(&hub_config_path)?;
    info!("[config] loaded {} joint(s)", config.joints.len());

    let bus = open_bus(&config.bus)?;
    let array = SensorArray::init(bus, &config).await?;
    for (joint, reason) in array.excluded() {
        error!("[registry] {} unavailable for this session: {}", joint, reason);
    }

    let pwm = SysfsPwm::open(
        config.feedback.pwm_chip,
        config.feedback.pwm_channel,
        config.feedback.frequency_hz,
    )
    .await?;
    let (feedback, feedback_task) = spawn_feedback_task(HapticMotor::new(pwm), &config.feedback);

    let mut cycle = PollingCycle::new(array, &config, feedback, Arc::new(LogReporter));
    let skipped = cycle.recalibrate().await;
    info!("[calibration] startup capture done, {} joint(s) pending", skipped.len());

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[main] interrupt received, shutting down");
            let _ = tx.send(MonitorCommand::Shutdown).await;
        }
    });

    info!("[main] monitoring posture");
    let stats = run_monitor(cycle, config.sampling.interval(), rx).await;
    info!("[main] {:?}", stats);

    // the cycle owned the last feedback handle, so the task winds down now
    if let Err(e) = feedback_task.await {
        error!("[feedback] task ended abnormally: {}", e);
    }
    Ok(())
}
