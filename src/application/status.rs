//! Shared status channel
//!
//! Any collaborator may publish; observers hold a `watch::Receiver` and render
//! from the latest value instead of being called back synchronously.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::error::CaptureError;
use crate::domain::status::{Status, StatusReport};

/// Single owner of the current `StatusReport`
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    sender: Arc<watch::Sender<StatusReport>>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(StatusReport::idle());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Observe status changes
    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> StatusReport {
        self.sender.borrow().clone()
    }

    /// Publish a lifecycle status, clearing any previous error
    pub fn set(&self, status: Status) {
        self.publish(StatusReport::of(status));
    }

    /// Classify a failure and publish it as the current error
    pub fn raise(&self, error: &CaptureError) -> StatusReport {
        let report = StatusReport::from_error(error);
        warn!(
            error = %error,
            permission_related = report.permission_related,
            "capture error raised"
        );
        self.publish(report.clone());
        report
    }

    /// Back to idle after the user dismissed an error
    pub fn clear(&self) {
        self.set(Status::Idle);
    }

    fn publish(&self, report: StatusReport) {
        info!(status = %report.status, "status changed");
        // send_replace keeps the value even when nobody is subscribed yet
        self.sender.send_replace(report);
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
