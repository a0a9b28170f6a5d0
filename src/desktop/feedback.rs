use std::process::{Command, Stdio};

use crate::recorder::{Feedback, Notification, RecordingStatus, SessionPhase};

/// Logs the recording indicator and shows notifications through `notify-send`.
///
/// Falls back to logging only when `notify-send` is not installed.
#[derive(Debug, Clone)]
pub struct DesktopFeedback {
    notify_send: bool,
}

impl DesktopFeedback {
    pub fn new() -> Self {
        let notify_send = Command::new("notify-send")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();
        if !notify_send {
            tracing::warn!(target: "system", "[FEEDBACK] notify-send not found, notifications go to the log only");
        }
        Self { notify_send }
    }
}

impl Default for DesktopFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl Feedback for DesktopFeedback {
    fn state_changed(&self, status: &RecordingStatus) {
        match status.state {
            SessionPhase::Recording => {
                if let Some(region) = status.region {
                    tracing::info!(target: "session", "[INDICATOR] Recording {}", region);
                }
            }
            phase => tracing::info!(target: "session", "[INDICATOR] {}", phase),
        }
    }

    fn notify(&self, notification: &Notification) {
        if notification.is_error() {
            tracing::error!(target: "session", "[NOTIFY] {}: {}", notification.title(), notification);
        } else {
            tracing::info!(target: "session", "[NOTIFY] {}: {}", notification.title(), notification);
        }

        if !self.notify_send {
            return;
        }

        let urgency = if notification.is_error() { "critical" } else { "normal" };
        let spawned = Command::new("notify-send")
            .args(["--app-name", "regionreel", "--urgency", urgency])
            .arg(notification.title())
            .arg(notification.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        // reap in the background so the event loop never waits on the notifier
        match spawned {
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => tracing::warn!(target: "system", "[FEEDBACK] Failed to run notify-send: {}", e),
        }
    }
}
