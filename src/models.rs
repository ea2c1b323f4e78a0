use std::fmt;

use chrono::{DateTime, Utc};

use crate::vault::EncryptedPayload;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub card_label: String,
    pub issuer_label: String,
    pub login_url: String,
    pub closing_day: u32,
    pub statement_day: u32,
    pub active: bool,
    pub encrypted_credentials: EncryptedPayload,
    pub last_download_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: i64,
    pub account_id: i64,
    pub next_occurrence: DateTime<Utc>,
    pub enabled: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Enabled, will fire at `next_occurrence`.
    Pending,
    /// Enabled, last attempt errored; retries at the same `next_occurrence`.
    Failed,
    Disabled,
}

impl Schedule {
    pub fn state(&self) -> ScheduleState {
        if !self.enabled {
            ScheduleState::Disabled
        } else if self.last_error.is_some() {
            ScheduleState::Failed
        } else {
            ScheduleState::Pending
        }
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScheduleState::Pending => "pending",
            ScheduleState::Failed => "failed",
            ScheduleState::Disabled => "disabled",
        };
        f.write_str(label)
    }
}

/// A schedule joined with the labels of the account it belongs to.
#[derive(Debug, Clone)]
pub struct ScheduleView {
    pub schedule: Schedule,
    pub card_label: String,
    pub issuer_label: String,
    pub account_active: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadRun {
    pub target: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub reported_at: DateTime<Utc>,
}
