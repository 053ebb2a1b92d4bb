//! Selected-user session state (the `user` cookie, modeled in Rust).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long a user selection persists.
pub const USER_SESSION_DAYS: i64 = 90;

/// The currently selected user, with cookie-style expiry and the token of a
/// pending import job, if one is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub task_id: Option<String>,
}

impl UserSession {
    /// Select a user now; the selection expires after [`USER_SESSION_DAYS`].
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            expires_at: now + chrono::Duration::days(USER_SESSION_DAYS),
            task_id: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Record the token of a started import job.
    pub fn set_task(&mut self, task_id: &str) {
        self.task_id = Some(task_id.to_string());
    }

    /// Forget the import-job token (the job finished or failed).
    pub fn clear_task(&mut self) {
        self.task_id = None;
    }
}
