//! HTTP client for the activity backend.
//!
//! Fetches the JSON record set the dashboard renders:
//! `GET {base}/api/activities/{user_id}?date_start=YYYY-MM-DD&date_end=YYYY-MM-DD`.
//!
//! Fetches are not retried; the caller keeps the previously rendered data in
//! place on failure and the user triggers another refresh when they want one.

use std::time::Duration;

use log::{info, warn};
use reqwest::Client;

use crate::error::{DashboardError, Result};
use crate::{ActivityRecord, DateRange};

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Client for the activity-records endpoint.
pub struct ActivityClient {
    client: Client,
    base_url: String,
}

impl ActivityClient {
    /// Create a client against the given backend base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| DashboardError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL for one user's records over a date range (dates formatted
    /// `YYYY-MM-DD`, both boundaries inclusive on the server side).
    pub fn activities_url(&self, user_id: &str, range: &DateRange) -> String {
        format!(
            "{}/api/activities/{}?date_start={}&date_end={}",
            self.base_url,
            user_id,
            range.start.format("%Y-%m-%d"),
            range.end.format("%Y-%m-%d"),
        )
    }

    /// Fetch one user's records over a date range. Non-2xx responses and
    /// transport failures surface as errors without retry.
    pub async fn fetch_activities(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ActivityRecord>> {
        let url = self.activities_url(user_id, range);
        info!("[ActivityClient] Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DashboardError::Http {
                message: format!("Request error: {}", e),
                status_code: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("[ActivityClient] HTTP {} for {}", status, url);
            return Err(DashboardError::Http {
                message: format!("HTTP {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        let records: Vec<ActivityRecord> =
            response.json().await.map_err(|e| DashboardError::Parse {
                message: format!("Invalid activity payload: {}", e),
            })?;

        info!("[ActivityClient] Received {} records", records.len());
        Ok(records)
    }
}
