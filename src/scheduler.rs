use crate::cycle::PollingCycle;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// Events accepted by a running monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    /// Recapture every baseline before the next cycle
    Recalibrate,
    Shutdown,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    pub cycles: u64,
    pub alerts: u64,
    pub recalibrations: u64,
    pub faults: u64,
}

/// Run polling cycles back to back, pausing `interval` between them.
///
/// A cycle always runs to completion; commands are only handled between
/// cycles. The loop ends on `Shutdown` or once every command sender is gone,
/// and the multiplexer is left with no channel selected.
pub async fn run_monitor(
    mut cycle: PollingCycle,
    interval: Duration,
    mut commands: mpsc::Receiver<MonitorCommand>,
) -> MonitorStats {
    let mut stats = MonitorStats::default();
    info!("[scheduler] polling every {}ms", interval.as_millis());

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(MonitorCommand::Recalibrate) => {
                    let errors = cycle.recalibrate().await;
                    stats.recalibrations += 1;
                    stats.faults += errors.len() as u64;
                    info!("[scheduler] recalibrated on request ({} joint(s) skipped)", errors.len());
                }
                Some(MonitorCommand::Shutdown) | None => break,
            },
            _ = sleep(interval) => {
                let outcome = cycle.run_once().await;
                stats.cycles += 1;
                stats.faults += outcome.faults.len() as u64;
                if outcome.feedback_triggered {
                    stats.alerts += 1;
                }
                if outcome.recalibrated {
                    stats.recalibrations += 1;
                }
            }
        }
    }

    if let Err(e) = cycle.array().bus().lock().await.disable().await {
        warn!("[scheduler] failed to release multiplexer: {}", e);
    }
    info!(
        "[scheduler] stopped after {} cycle(s), {} alert(s), {} fault(s)",
        stats.cycles, stats.alerts, stats.faults
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::BusWrite;
    use crate::feedback::feedback_channel;
    use crate::registry::tests::{healthy_bus, mock_shared, test_config};
    use crate::registry::SensorArray;
    use crate::reporting::tests::RecordingReporter;
    use crate::reporting::ReportAck;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_runs_cycles_and_handles_commands() {
        let mock = healthy_bus();
        let config = test_config();
        let array = SensorArray::init(mock_shared(&mock), &config).await.unwrap();
        let (feedback, _feedback_rx) = feedback_channel(&config.feedback);
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let cycle = PollingCycle::new(array, &config, feedback, reporter);

        let (tx, rx) = mpsc::channel(4);
        let monitor = tokio::spawn(run_monitor(cycle, Duration::from_millis(100), rx));

        tx.send(MonitorCommand::Recalibrate).await.unwrap();
        sleep(Duration::from_millis(350)).await;
        tx.send(MonitorCommand::Shutdown).await.unwrap();

        let stats = monitor.await.unwrap();
        assert_eq!(stats.recalibrations, 1);
        assert!(stats.cycles >= 2, "only {} cycles", stats.cycles);
        assert_eq!(stats.alerts, 0);
        assert_eq!(mock.writes().last(), Some(&BusWrite::Command { address: 0x70, byte: 0 }));
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_monitor() {
        let mock = healthy_bus();
        let config = test_config();
        let array = SensorArray::init(mock_shared(&mock), &config).await.unwrap();
        let (feedback, _feedback_rx) = feedback_channel(&config.feedback);
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let cycle = PollingCycle::new(array, &config, feedback, reporter);

        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let stats = run_monitor(cycle, Duration::from_secs(60), rx).await;
        assert_eq!(stats.cycles, 0);
    }
}
