//! Background-job status polling.
//!
//! The backend kicks off a long-running import and hands back a task id; the
//! dashboard polls `GET {base}/status/{task_id}` once a second until the job
//! reports a terminal state. The body is a plain-text state name; anything
//! other than `SUCCESS` or `FAILURE` means the job is still running.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;

use crate::error::{DashboardError, Result};

const POLL_INTERVAL_MS: u64 = 1_000;

/// Observed state of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Failure,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

/// Map a status-endpoint body to a job state. Unknown states count as still
/// running.
pub fn parse_status(body: &str) -> JobStatus {
    match body.trim() {
        "SUCCESS" => JobStatus::Success,
        "FAILURE" => JobStatus::Failure,
        _ => JobStatus::Pending,
    }
}

/// Polls the status endpoint for the current background job, if any.
pub struct StatusPoller {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    task_id: Option<String>,
}

impl StatusPoller {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DashboardError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            task_id: None,
        })
    }

    /// Override the default 1s poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start tracking a background job.
    pub fn set_task(&mut self, task_id: &str) {
        info!("[StatusPoller] Tracking task {}", task_id);
        self.task_id = Some(task_id.to_string());
    }

    /// Stop tracking (the task-id cookie is cleared).
    pub fn clear_task(&mut self) {
        self.task_id = None;
    }

    /// Currently tracked task id, if any.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Poll the status endpoint once. Returns `None` when no job is tracked.
    /// Transport and HTTP errors count as [`JobStatus::Failure`]; a terminal
    /// state clears the tracked task id so a later poll cannot re-report it.
    pub async fn poll_once(&mut self) -> Option<JobStatus> {
        let task_id = self.task_id.clone()?;
        let url = format!("{}/status/{}", self.base_url, task_id);

        let status = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => parse_status(&body),
                Err(e) => {
                    warn!("[StatusPoller] Failed to read status body: {}", e);
                    JobStatus::Failure
                }
            },
            Ok(response) => {
                warn!("[StatusPoller] HTTP {} from {}", response.status(), url);
                JobStatus::Failure
            }
            Err(e) => {
                warn!("[StatusPoller] Request error: {}", e);
                JobStatus::Failure
            }
        };

        debug!("[StatusPoller] Task {} is {:?}", task_id, status);
        if status.is_terminal() {
            self.clear_task();
        }
        Some(status)
    }

    /// Poll at the configured interval until the job reaches a terminal
    /// state. Returns `None` immediately when no job is tracked.
    pub async fn run(&mut self) -> Option<JobStatus> {
        self.task_id.as_ref()?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Some(status) if status.is_terminal() => {
                    // Stop the timer before surfacing the terminal state so a
                    // stale pending tick can never fire a duplicate notification
                    drop(ticker);
                    info!("[StatusPoller] Job finished: {:?}", status);
                    return Some(status);
                }
                Some(_) => continue,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_terminal_states() {
        assert_eq!(parse_status("SUCCESS"), JobStatus::Success);
        assert_eq!(parse_status("FAILURE"), JobStatus::Failure);
        assert_eq!(parse_status("  SUCCESS\n"), JobStatus::Success);
    }

    #[test]
    fn test_parse_status_unknown_is_pending() {
        assert_eq!(parse_status("PENDING"), JobStatus::Pending);
        assert_eq!(parse_status("STARTED"), JobStatus::Pending);
        assert_eq!(parse_status(""), JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_poll_once_without_task() {
        let mut poller = StatusPoller::new("http://127.0.0.1:1").unwrap();
        assert_eq!(poller.poll_once().await, None);
    }

    #[tokio::test]
    async fn test_poll_once_transport_error_is_failure_and_clears_task() {
        // Nothing listens on port 1
        let mut poller = StatusPoller::new("http://127.0.0.1:1").unwrap();
        poller.set_task("abc123");

        assert_eq!(poller.poll_once().await, Some(JobStatus::Failure));
        assert_eq!(poller.task_id(), None);
    }
}
