//! Alert delivery: one structured request per recipient, posted with curl.
//!
//! Every recipient gets its own attempt. A failure is returned to the caller
//! per recipient and never short-circuits the remaining deliveries.

#![allow(missing_docs)]

use std::io::Write as _;
use std::process::{Command, Stdio};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::NotifierConfig;
use crate::core::errors::{MonError, Result};

pub const ALERT_TITLE: &str = "Server Disk Usage Alert";
pub const ALERT_CATEGORY: &str = "system";

// ──────────────────── request ────────────────────

/// Payload accepted by the notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub username: String,
    pub title: String,
    pub body: String,
    pub category: String,
}

impl NotificationRequest {
    /// Alert request for one recipient.
    #[must_use]
    pub fn alert(username: &str, body: &str) -> Self {
        Self {
            username: username.to_string(),
            title: ALERT_TITLE.to_string(),
            body: body.to_string(),
            category: ALERT_CATEGORY.to_string(),
        }
    }
}

/// Host name in upper case, a newline, then the alert lines newline-joined.
#[must_use]
pub fn compose_body(host: &str, alerts: &[String]) -> String {
    format!("{}:\n{}", host.to_uppercase(), alerts.join("\n"))
}

// ──────────────────── transports ────────────────────

/// A way of getting one request to its recipient.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, request: &NotificationRequest) -> Result<()>;
}

/// JSON POST via `curl`, authenticated by the configured API key.
#[derive(Debug, Clone)]
pub struct CurlNotifier {
    api_url: String,
    api_key: String,
    timeout: Duration,
}

impl CurlNotifier {
    #[must_use]
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn command(&self, body: &str) -> Command {
        let mut cmd = Command::new("curl");
        cmd.arg("--fail")
            .arg("--silent")
            .arg("--show-error")
            .arg("--max-time")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg("--header")
            .arg("Content-Type: application/json")
            .arg("--header")
            .arg("@-")
            .arg("--data")
            .arg(body)
            .arg(&self.api_url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Header line fed to curl on stdin so the key stays out of the process table.
    fn auth_header(&self) -> String {
        format!("Authorization: {}\n", self.api_key)
    }
}

impl Notifier for CurlNotifier {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn send(&self, request: &NotificationRequest) -> Result<()> {
        let body = serde_json::to_string(request)?;
        let delivery_error = |details: String| MonError::Delivery {
            recipient: request.username.clone(),
            details,
        };
        let mut child = self
            .command(&body)
            .spawn()
            .map_err(|e| delivery_error(format!("failed to run curl: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            // Dropping stdin closes the pipe so curl sees the end of its header list.
            if let Err(e) = stdin.write_all(self.auth_header().as_bytes()) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(delivery_error(format!("failed to pass headers to curl: {e}")));
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|e| delivery_error(format!("failed to wait for curl: {e}")))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(MonError::Delivery {
            recipient: request.username.clone(),
            details: format!("curl exited with {}: {}", output.status, stderr.trim()),
        })
    }
}

/// In-memory transport that records every request. Recipients listed in
/// `failing` get an error instead, after the attempt is recorded.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationRequest>>,
    failing: Vec<String>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: recipients.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    /// Every request attempted so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn send(&self, request: &NotificationRequest) -> Result<()> {
        self.sent.lock().push(request.clone());
        if self.failing.contains(&request.username) {
            return Err(MonError::Delivery {
                recipient: request.username.clone(),
                details: "recipient configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

// ──────────────────── fan-out ────────────────────

/// Send `body` to every recipient, returning one error per failed attempt.
pub fn deliver_all(notifier: &dyn Notifier, recipients: &[String], body: &str) -> Vec<MonError> {
    recipients
        .iter()
        .filter_map(|user| notifier.send(&NotificationRequest::alert(user, body)).err())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn body_is_upper_host_then_lines() {
        let alerts = vec![
            "DISK \"/data\" is at 95%".to_string(),
            "DISK \"/\" is at 80%".to_string(),
        ];
        assert_eq!(
            compose_body("web-01", &alerts),
            "WEB-01:\nDISK \"/data\" is at 95%\nDISK \"/\" is at 80%"
        );
    }

    #[test]
    fn request_has_fixed_title_and_category() {
        let req = NotificationRequest::alert("ops", "HOST:\nline");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "username": "ops",
                "title": "Server Disk Usage Alert",
                "body": "HOST:\nline",
                "category": "system",
            })
        );
    }

    #[test]
    fn deliver_all_reaches_every_recipient() {
        let notifier = RecordingNotifier::new();
        let errors = deliver_all(&notifier, &recipients(&["alice", "bob"]), "H:\nx");
        assert!(errors.is_empty());
        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].username, "alice");
        assert_eq!(sent[1].username, "bob");
        assert!(sent.iter().all(|r| r.body == "H:\nx"));
    }

    #[test]
    fn one_failure_does_not_stop_others() {
        let notifier = RecordingNotifier::failing_for(&["alice"]);
        let errors = deliver_all(&notifier, &recipients(&["alice", "bob"]), "H:\nx");
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], MonError::Delivery { recipient, .. } if recipient == "alice"));
        assert_eq!(notifier.sent().len(), 2);
    }

    #[test]
    fn curl_command_keeps_key_off_argv_and_carries_timeout_and_body() {
        let notifier =
            CurlNotifier::new("https://n.example.com/api", "key-1", Duration::from_secs(7));
        let cmd = notifier.command("{\"a\":1}");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(cmd.get_program(), "curl");
        assert!(args.contains(&"--fail".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--max-time" && w[1] == "7"));
        assert!(args.windows(2).any(|w| w[0] == "--header" && w[1] == "@-"));
        assert!(args.iter().all(|a| !a.contains("key-1")));
        assert_eq!(notifier.auth_header(), "Authorization: key-1\n");
        assert!(args.windows(2).any(|w| w[0] == "--data" && w[1] == "{\"a\":1}"));
        assert_eq!(args.last().map(String::as_str), Some("https://n.example.com/api"));
    }

    #[test]
    fn curl_against_unreachable_endpoint_fails_as_delivery_error() {
        let notifier = CurlNotifier::new("http://127.0.0.1:9/", "k", Duration::from_secs(1));
        let err = notifier
            .send(&NotificationRequest::alert("ops", "H:\nx"))
            .expect_err("nothing listens on the discard port");
        assert_eq!(err.code(), "DM-3101");
    }
}
