//! Fires due schedules through the external downloader and feeds each
//! reported outcome back into the schedule registry.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::accounts::get_account;
use crate::db::to_stamp;
use crate::error::{CycleError, Result};
use crate::models::{Account, Schedule};
use crate::schedules::{due_schedules, record_failure, record_success};

/// What the downloader receives on stdin, one JSON object per invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub schedule_id: i64,
    pub account_id: i64,
    pub card_label: String,
    pub issuer_label: String,
    pub login_url: String,
    pub target: String,
    /// Base64 of the sealed credential envelope; only the downloader can open it.
    pub encrypted_credentials: String,
}

impl DownloadRequest {
    pub fn new(schedule: &Schedule, account: &Account) -> Self {
        Self {
            schedule_id: schedule.id,
            account_id: account.id,
            card_label: account.card_label.clone(),
            issuer_label: account.issuer_label.clone(),
            login_url: account.login_url.clone(),
            target: to_stamp(schedule.next_occurrence),
            encrypted_credentials: B64.encode(account.encrypted_credentials.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl DownloadOutcome {
    #[cfg(test)]
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

pub trait Downloader {
    /// Attempt one statement fetch. Failures are reported in the outcome, never raised.
    fn fetch(&self, request: &DownloadRequest) -> DownloadOutcome;
}

/// Runs an external program per download: request JSON on stdin, report JSON
/// (`{"success": bool, "errorMessage": "..."}`) as the last line of stdout.
///
/// A downloader still running after `timeout` is killed and the attempt
/// counts as failed.
pub struct CommandDownloader {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).ok();
        }
        buf
    })
}

impl CommandDownloader {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn invoke(&self, request: &DownloadRequest) -> Result<DownloadOutcome> {
        let payload = serde_json::to_vec(request)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CycleError::Other(format!("cannot start downloader {}: {e}", self.program)))?;

        // A downloader may exit without reading its request; its report still counts.
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || match stdin.write_all(&payload) {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                child.kill().ok();
                child.wait()?;
                tracing::warn!(program = %self.program, timeout_secs = self.timeout.as_secs(), "downloader timed out");
                return Err(CycleError::Other(format!(
                    "downloader timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let written = writer
            .map(|w| w.join().unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))))
            .unwrap_or(Ok(()));
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if let Some(outcome) = parse_report(&String::from_utf8_lossy(&stdout)) {
            return Ok(outcome);
        }
        written?;
        let stderr = String::from_utf8_lossy(&stderr);
        let detail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
        Err(CycleError::Other(if status.success() {
            "downloader exited without a report".to_string()
        } else if detail.is_empty() {
            format!("downloader exited with {status}")
        } else {
            format!("downloader exited with {status}: {detail}")
        }))
    }
}

impl Downloader for CommandDownloader {
    fn fetch(&self, request: &DownloadRequest) -> DownloadOutcome {
        self.invoke(request)
            .unwrap_or_else(|e| DownloadOutcome::failed(e.to_string()))
    }
}

fn parse_report(stdout: &str) -> Option<DownloadOutcome> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    serde_json::from_str(line.trim()).ok()
}

#[derive(Debug)]
pub struct RunFailure {
    pub schedule_id: i64,
    pub card_label: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: Vec<i64>,
    /// Downloads that ran and reported failure.
    pub failed: Vec<RunFailure>,
    /// Schedules whose outcome could not be recorded.
    pub errors: Vec<RunFailure>,
}

/// Fire every due schedule once, soonest first.
pub fn run_due(conn: &Connection, downloader: &dyn Downloader, now: DateTime<Utc>) -> Result<RunSummary> {
    let due = due_schedules(conn, now)?;
    let mut summary = RunSummary::default();
    tracing::info!(due = due.len(), "running due schedules");

    for view in due {
        let schedule = view.schedule;
        let failure = |message: String| RunFailure {
            schedule_id: schedule.id,
            card_label: view.card_label.clone(),
            message,
        };

        let account = match get_account(conn, schedule.account_id) {
            Ok(account) => account,
            Err(e) => {
                summary.errors.push(failure(e.to_string()));
                continue;
            }
        };

        let request = DownloadRequest::new(&schedule, &account);
        tracing::debug!(schedule_id = schedule.id, target = %request.target, "invoking downloader");
        let outcome = downloader.fetch(&request);

        let recorded = if outcome.success {
            record_success(conn, schedule.id, now)
        } else {
            record_failure(conn, schedule.id, outcome.error_message.as_deref().unwrap_or(""), now)
        };
        match recorded {
            Ok(_) if outcome.success => summary.succeeded.push(schedule.id),
            Ok(updated) => summary.failed.push(failure(updated.last_error.unwrap_or_default())),
            Err(e) => {
                tracing::error!(schedule_id = schedule.id, error = %e, "could not record download outcome");
                summary.errors.push(failure(e.to_string()));
            }
        }
    }
    Ok(summary)
}
