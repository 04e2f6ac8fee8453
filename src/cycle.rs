use crate::calibration::CalibrationState;
use crate::config::HubConfig;
use crate::errors::{CalibrationError, ReportError, SensorError};
use crate::feedback::FeedbackHandle;
use crate::messages::{CalibrationMessage, PostureStatusMessage, ReportMessage};
use crate::posture::{DeltaReport, Evaluation, PostureEvaluator, PostureFlags};
use crate::registry::SensorArray;
use crate::reporting::{ReportAck, Reporter};
use crate::types::Joint;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Something that went wrong during one cycle without stopping it
#[derive(Error, Debug)]
pub enum CycleFault {
    #[error("{joint}: {source}")]
    Sensor {
        joint: Joint,
        #[source]
        source: SensorError,
    },

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("reporting: {0}")]
    Report(#[from] ReportError),
}

/// What one cycle produced
#[derive(Debug)]
pub struct CycleOutcome {
    pub report: DeltaReport,
    pub flags: PostureFlags,
    pub faults: Vec<CycleFault>,
    pub feedback_triggered: bool,
    pub recalibrated: bool,
}

/// One pass of read → compare → alert → report.
///
/// Owns the sensor array and the baselines; nothing else touches them.
pub struct PollingCycle {
    array: SensorArray,
    calibration: CalibrationState,
    evaluator: PostureEvaluator,
    feedback: FeedbackHandle,
    reporter: Arc<dyn Reporter>,
}

impl PollingCycle {
    pub fn new(
        array: SensorArray,
        config: &HubConfig,
        feedback: FeedbackHandle,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            array,
            calibration: CalibrationState::new(),
            evaluator: PostureEvaluator::new(config.thresholds),
            feedback,
            reporter,
        }
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn array(&self) -> &SensorArray {
        &self.array
    }

    /// Read every joint and replace the baselines of those with fresh data.
    /// Used at startup and for the "recalibrate now" event.
    pub async fn recalibrate(&mut self) -> Vec<CalibrationError> {
        let reading = self.array.read_all().await;
        self.calibration.capture_baseline(&reading)
    }

    pub async fn run_once(&mut self) -> CycleOutcome {
        let reading = self.array.read_all().await;
        let mut faults: Vec<CycleFault> = reading
            .stale()
            .map(|(joint, e)| CycleFault::Sensor {
                joint,
                source: e.clone(),
            })
            .collect();

        // joints that missed the startup capture get their baseline now
        self.calibration.capture_missing(&reading);

        let Evaluation {
            report,
            flags,
            uncalibrated,
        } = self.evaluator.evaluate(&reading, &self.calibration);
        for joint in uncalibrated {
            debug!("[cycle] {} has no baseline yet", joint);
        }

        let feedback_triggered = flags.any();
        if feedback_triggered {
            let joints: Vec<_> = flags.flagged().collect();
            info!("[cycle] bad posture at {:?}", joints);
            self.feedback.pulse();
        }

        let recalibrated = self.report(&report, &flags, &mut faults).await;

        for fault in &faults {
            warn!("[cycle] {}", fault);
        }

        CycleOutcome {
            report,
            flags,
            faults,
            feedback_triggered,
            recalibrated,
        }
    }

    /// Hand the snapshot to the reporter. Returns true when an accepted
    /// report led to a recalibration.
    async fn report(&mut self, report: &DeltaReport, flags: &PostureFlags, faults: &mut Vec<CycleFault>) -> bool {
        let timestamp = match self.reporter.current_time().await {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                debug!("[cycle] no timestamp, report skipped");
                return false;
            }
            Err(e) => {
                faults.push(e.into());
                return false;
            }
        };

        let message = ReportMessage::new(timestamp, report);
        match self.reporter.submit(&message).await {
            Ok(ReportAck::Accepted) => {
                let previous = CalibrationMessage {
                    baselines: self.calibration.snapshot(),
                };
                if let Err(e) = self.reporter.publish_calibration(&previous).await {
                    faults.push(e.into());
                }
                let reset = PostureStatusMessage::from(&PostureFlags::cleared());
                if let Err(e) = self.reporter.publish_posture(&reset).await {
                    faults.push(e.into());
                }

                let errors = self.recalibrate().await;
                faults.extend(errors.into_iter().map(CycleFault::from));
                info!("[cycle] report accepted, baselines recaptured");
                true
            }
            Ok(ReportAck::Rejected { status }) => {
                debug!("[cycle] report not accepted (status {})", status);
                if flags.any() {
                    if let Err(e) = self.reporter.publish_posture(&PostureStatusMessage::from(flags)).await {
                        faults.push(e.into());
                    }
                }
                false
            }
            Err(e) => {
                faults.push(e.into());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;
    use crate::feedback::{feedback_channel, FeedbackCommand};
    use crate::registry::tests::{gyro_words, healthy_bus, mock_shared, test_config, GYRO_XOUT_H};
    use crate::reporting::tests::{RecordingReporter, Sent};
    use crate::types::Triplet;
    use tokio::sync::mpsc;

    async fn build(
        mock: &MockBus,
        reporter: Arc<RecordingReporter>,
    ) -> (PollingCycle, mpsc::Receiver<FeedbackCommand>) {
        let config = test_config();
        let array = SensorArray::init(mock_shared(mock), &config).await.unwrap();
        let (feedback, rx) = feedback_channel(&config.feedback);
        (PollingCycle::new(array, &config, feedback, reporter), rx)
    }

    fn set_rate(mock: &MockBus, joint: Joint, dps: Triplet) {
        mock.set_register(Some(joint.default_channel()), 0x68, GYRO_XOUT_H, &gyro_words(dps));
    }

    fn drain(rx: &mut mpsc::Receiver<FeedbackCommand>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[tokio::test]
    async fn test_single_actuation_per_cycle() {
        let mock = healthy_bus();
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let (mut cycle, mut rx) = build(&mock, reporter.clone()).await;

        // all joints read zero rate at startup, so every baseline is 0,0,0
        assert!(cycle.recalibrate().await.is_empty());
        assert_eq!(cycle.calibration().baseline(Joint::MiddleBack), Some(Triplet::ZERO));

        // the filter averages over the startup sample, so push the window full
        for _ in 0..10 {
            set_rate(&mock, Joint::MiddleBack, Triplet::new(9.0 / 1.1, 0.0, 0.0));
            set_rate(&mock, Joint::LeftShoulder, Triplet::new(0.0, 1.0, 0.0));
            cycle.array.read_all().await;
        }
        drain(&mut rx);

        let outcome = cycle.run_once().await;
        assert!((outcome.report.get(Joint::MiddleBack).x - 9.0).abs() < 0.05);
        assert!(outcome.flags.is_flagged(Joint::MiddleBack));
        assert!(!outcome.flags.is_flagged(Joint::LeftShoulder));
        assert!(outcome.feedback_triggered);
        assert_eq!(drain(&mut rx), 1);
    }

    #[tokio::test]
    async fn test_several_flagged_joints_still_one_pulse() {
        let mock = healthy_bus();
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let (mut cycle, mut rx) = build(&mock, reporter.clone()).await;
        cycle.recalibrate().await;

        for joint in Joint::POSTURE {
            set_rate(&mock, joint, Triplet::new(0.0, 0.0, 200.0));
        }
        let outcome = cycle.run_once().await;

        assert_eq!(outcome.flags.flagged().count(), 3);
        assert_eq!(drain(&mut rx), 1);
        // rejected report with flags set publishes the posture status
        assert!(matches!(reporter.sent().last(), Some(Sent::Posture(s)) if s.any_flagged()));
    }

    #[tokio::test]
    async fn test_quiet_cycle_sends_no_pulse() {
        let mock = healthy_bus();
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let (mut cycle, mut rx) = build(&mock, reporter.clone()).await;
        cycle.recalibrate().await;

        let outcome = cycle.run_once().await;
        assert!(!outcome.feedback_triggered);
        assert_eq!(drain(&mut rx), 0);
        assert_eq!(reporter.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_report_recalibrates() {
        let mock = healthy_bus();
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let (mut cycle, _rx) = build(&mock, reporter.clone()).await;
        cycle.recalibrate().await;

        set_rate(&mock, Joint::RightShoulder, Triplet::new(100.0, 0.0, 0.0));
        let before = cycle.calibration().baseline(Joint::RightShoulder).unwrap();
        *reporter.ack.lock().unwrap() = ReportAck::Accepted;

        let outcome = cycle.run_once().await;
        assert!(outcome.recalibrated);

        let after = cycle.calibration().baseline(Joint::RightShoulder).unwrap();
        assert_ne!(before, after);

        let sent = reporter.sent();
        assert!(matches!(sent[0], Sent::Report(_)));
        assert!(matches!(&sent[1], Sent::Calibration(c) if c.baselines[&Joint::RightShoulder] == before));
        assert!(matches!(&sent[2], Sent::Posture(s) if !s.any_flagged()));
        assert_eq!(sent.len(), 3);
    }

    #[tokio::test]
    async fn test_stale_joint_is_a_fault_not_an_abort() {
        let mock = healthy_bus();
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let (mut cycle, _rx) = build(&mock, reporter.clone()).await;
        cycle.recalibrate().await;

        mock.fail_reads_on(Joint::MiddleBack.default_channel());
        set_rate(&mock, Joint::LeftShoulder, Triplet::new(200.0, 0.0, 0.0));
        let outcome = cycle.run_once().await;

        assert!(matches!(
            outcome.faults.as_slice(),
            [CycleFault::Sensor { joint: Joint::MiddleBack, .. }]
        ));
        assert_eq!(outcome.report.get(Joint::MiddleBack), Triplet::ZERO);
        assert!(!outcome.flags.is_flagged(Joint::MiddleBack));
        assert!(outcome.flags.is_flagged(Joint::LeftShoulder));
    }

    #[tokio::test]
    async fn test_late_baseline_for_joint_stale_at_startup() {
        let mock = healthy_bus();
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let (mut cycle, _rx) = build(&mock, reporter).await;

        mock.fail_reads_on(Joint::MiddleBack.default_channel());
        let errors = cycle.recalibrate().await;
        assert_eq!(errors.len(), 1);
        assert!(!cycle.calibration().is_calibrated(Joint::MiddleBack));
    }

    #[tokio::test]
    async fn test_incomplete_startup_read_leaves_joint_uncalibrated() {
        let mock = healthy_bus();
        let reporter = Arc::new(RecordingReporter::new(ReportAck::Rejected { status: 500 }));
        let (mut cycle, _rx) = build(&mock, reporter).await;

        let channel = Joint::MiddleBack.default_channel();
        mock.set_register(Some(channel), 0x68, GYRO_XOUT_H, &[0x00, 0x83, 0x00]);
        let errors = cycle.recalibrate().await;
        assert!(matches!(
            errors.as_slice(),
            [CalibrationError::CaptureFailed { joint, .. }] if joint == "middle_back"
        ));
        assert_eq!(cycle.calibration().baseline(Joint::MiddleBack), None);

        set_rate(&mock, Joint::MiddleBack, Triplet::new(1.0, 0.0, 0.0));
        cycle.run_once().await;
        assert_eq!(cycle.calibration().baseline(Joint::MiddleBack), Some(Triplet::new(1.1, 0.0, 0.0)));
    }

    #[tokio::test]
    async fn test_report_failure_is_collected() {
        let mock = healthy_bus();
        let mut recording = RecordingReporter::new(ReportAck::Accepted);
        recording.fail_submit = true;
        let (mut cycle, _rx) = build(&mock, Arc::new(recording)).await;
        cycle.recalibrate().await;

        let outcome = cycle.run_once().await;
        assert!(!outcome.recalibrated);
        assert!(matches!(outcome.faults.as_slice(), [CycleFault::Report(_)]));
    }

    #[tokio::test]
    async fn test_missing_timestamp_skips_report() {
        let mock = healthy_bus();
        let mut recording = RecordingReporter::new(ReportAck::Accepted);
        recording.timestamp = None;
        let reporter = Arc::new(recording);
        let (mut cycle, _rx) = build(&mock, reporter.clone()).await;
        cycle.recalibrate().await;

        let outcome = cycle.run_once().await;
        assert!(!outcome.recalibrated);
        assert!(reporter.sent().is_empty());
    }
}
