//! Contract of the remote reporting collaborator.
//!
//! The transport behind it (HTTP, retries, connectivity) lives outside this
//! crate. The only thing the pipeline acts on is the acknowledgment of a
//! submitted report: an accepted report triggers recalibration.

use crate::errors::ReportResult;
use crate::messages::{to_json, CalibrationMessage, PostureStatusMessage, ReportMessage};
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportAck {
    /// The service stored the report; baselines must be recaptured
    Accepted,
    Rejected { status: u16 },
}

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Timestamp used to key the next report. `None` skips reporting for
    /// this cycle.
    async fn current_time(&self) -> ReportResult<Option<String>>;

    async fn submit(&self, report: &ReportMessage) -> ReportResult<ReportAck>;

    /// Baselines that were in effect when a report was accepted
    async fn publish_calibration(&self, calibration: &CalibrationMessage) -> ReportResult<()>;

    async fn publish_posture(&self, status: &PostureStatusMessage) -> ReportResult<()>;
}

/// Writes every payload to the log and never acknowledges a report, so it
/// never triggers a recalibration.
#[derive(Debug, Default, Clone)]
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn current_time(&self) -> ReportResult<Option<String>> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Ok(Some(millis.to_string()))
    }

    async fn submit(&self, report: &ReportMessage) -> ReportResult<ReportAck> {
        info!("[report] {} {}", report.timestamp, to_json(report)?);
        Ok(ReportAck::Rejected { status: 0 })
    }

    async fn publish_calibration(&self, calibration: &CalibrationMessage) -> ReportResult<()> {
        info!("[report] calibration {}", to_json(calibration)?);
        Ok(())
    }

    async fn publish_posture(&self, status: &PostureStatusMessage) -> ReportResult<()> {
        info!("[report] posture {}", to_json(status)?);
        Ok(())
    }
}
