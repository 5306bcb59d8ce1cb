//! Calendar reminder sync.
//!
//! The calendar is an external service reached through a bridge that
//! owns the OAuth handshake; this module only speaks its connect/sync
//! contract. Approval-triggered care-plan sync and medication reminder
//! sync both go through `CalendarClient`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Medication;
use crate::pipeline::stages::CarePlan;

/// Care-plan reminders repeat daily for a week, pending the follow-up visit.
const CARE_PLAN_REPEAT_DAYS: u32 = 7;
const DAILY_ACTION_TIME: &str = "09:00";
const MONITORING_TIME: &str = "10:00";

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Calendar bridge unreachable: {0}")]
    Unreachable(String),

    #[error("Calendar bridge returned error (status {status}): {body}")]
    Bridge { status: u16, body: String },
}

/// One reminder series to create.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderSpec {
    pub title: String,
    pub description: String,
    /// Clock times for each day's reminders.
    pub times: Vec<String>,
    pub repeat_days: u32,
}

/// Whether a patient has authorized calendar access.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Where to send the patient to authorize, when not connected.
    #[serde(default)]
    pub authorization_url: Option<String>,
}

/// Calendar bridge abstraction (allows mocking).
pub trait CalendarClient: Send + Sync {
    fn connection_status(&self, patient_id: Uuid) -> Result<ConnectionStatus, CalendarError>;

    /// Create a reminder series; returns the calendar event id.
    fn create_reminder(
        &self,
        patient_id: Uuid,
        spec: &ReminderSpec,
    ) -> Result<String, CalendarError>;
}

impl<T: CalendarClient + ?Sized> CalendarClient for std::sync::Arc<T> {
    fn connection_status(&self, patient_id: Uuid) -> Result<ConnectionStatus, CalendarError> {
        (**self).connection_status(patient_id)
    }

    fn create_reminder(
        &self,
        patient_id: Uuid,
        spec: &ReminderSpec,
    ) -> Result<String, CalendarError> {
        (**self).create_reminder(patient_id, spec)
    }
}

/// HTTP client for the calendar bridge REST API.
pub struct HttpCalendarClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpCalendarClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> CalendarError {
        if e.is_connect() {
            CalendarError::Unreachable(format!("cannot reach {}", self.base_url))
        } else if e.is_timeout() {
            CalendarError::Unreachable(format!("request timed out after {}s", self.timeout_secs))
        } else {
            CalendarError::Unreachable(e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct CreateReminderResponse {
    event_id: String,
}

impl CalendarClient for HttpCalendarClient {
    fn connection_status(&self, patient_id: Uuid) -> Result<ConnectionStatus, CalendarError> {
        let url = format!("{}/patients/{}/status", self.base_url, patient_id);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CalendarError::Bridge {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| CalendarError::Unreachable(format!("invalid response envelope: {e}")))
    }

    fn create_reminder(
        &self,
        patient_id: Uuid,
        spec: &ReminderSpec,
    ) -> Result<String, CalendarError> {
        let url = format!("{}/patients/{}/reminders", self.base_url, patient_id);
        let response = self
            .client
            .post(&url)
            .json(spec)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CalendarError::Bridge {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreateReminderResponse = response
            .json()
            .map_err(|e| CalendarError::Unreachable(format!("invalid response envelope: {e}")))?;
        Ok(parsed.event_id)
    }
}

/// Overall outcome of a sync attempt, reported alongside the triggering
/// operation's result (never in place of it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Synced { events_created: usize },
    Failed { reason: String },
    NotConnected { authorization_url: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub event_ids: Vec<String>,
    /// Per-item failures when the sync partially succeeded.
    pub warnings: Vec<String>,
}

impl SyncReport {
    fn failed(reason: String) -> Self {
        Self {
            status: SyncStatus::Failed { reason },
            event_ids: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Create calendar reminders for an approved care plan: one daily series
/// per action and per monitoring task.
pub fn sync_care_plan(
    client: &dyn CalendarClient,
    patient_id: Uuid,
    plan: &CarePlan,
) -> SyncReport {
    let status = match client.connection_status(patient_id) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(patient_id = %patient_id, error = %e, "Calendar status check failed");
            return SyncReport::failed(e.to_string());
        }
    };
    if !status.connected {
        return SyncReport {
            status: SyncStatus::NotConnected {
                authorization_url: status.authorization_url,
            },
            event_ids: Vec::new(),
            warnings: Vec::new(),
        };
    }

    let mut specs = Vec::new();
    for action in &plan.daily_actions {
        specs.push(ReminderSpec {
            title: action.clone(),
            description: "MedTwin daily care task".into(),
            times: vec![DAILY_ACTION_TIME.into()],
            repeat_days: CARE_PLAN_REPEAT_DAYS,
        });
    }
    for task in &plan.monitoring {
        specs.push(ReminderSpec {
            title: format!("Monitor: {task}"),
            description: "MedTwin monitoring task".into(),
            times: vec![MONITORING_TIME.into()],
            repeat_days: CARE_PLAN_REPEAT_DAYS,
        });
    }

    create_all(client, patient_id, &specs)
}

/// Create calendar reminders for a medication's dose times.
pub fn sync_medication(
    client: &dyn CalendarClient,
    patient_id: Uuid,
    medication: &Medication,
) -> SyncReport {
    let status = match client.connection_status(patient_id) {
        Ok(status) => status,
        Err(e) => return SyncReport::failed(e.to_string()),
    };
    if !status.connected {
        return SyncReport {
            status: SyncStatus::NotConnected {
                authorization_url: status.authorization_url,
            },
            event_ids: Vec::new(),
            warnings: Vec::new(),
        };
    }

    let times = if medication.timing.is_empty() {
        vec![DAILY_ACTION_TIME.to_string()]
    } else {
        medication.timing.clone()
    };
    let spec = ReminderSpec {
        title: format!("{} {}", medication.name, medication.dosage),
        description: medication
            .instructions
            .clone()
            .unwrap_or_else(|| "MedTwin medication reminder".into()),
        times,
        repeat_days: CARE_PLAN_REPEAT_DAYS,
    };

    create_all(client, patient_id, std::slice::from_ref(&spec))
}

fn create_all(client: &dyn CalendarClient, patient_id: Uuid, specs: &[ReminderSpec]) -> SyncReport {
    let mut event_ids = Vec::new();
    let mut warnings = Vec::new();

    for spec in specs {
        match client.create_reminder(patient_id, spec) {
            Ok(event_id) => event_ids.push(event_id),
            Err(e) => {
                tracing::warn!(
                    patient_id = %patient_id,
                    title = %spec.title,
                    error = %e,
                    "Reminder creation failed"
                );
                warnings.push(format!("{}: {e}", spec.title));
            }
        }
    }

    let status = if event_ids.is_empty() && !warnings.is_empty() {
        SyncStatus::Failed {
            reason: warnings.join("; "),
        }
    } else {
        SyncStatus::Synced {
            events_created: event_ids.len(),
        }
    };

    SyncReport {
        status,
        event_ids,
        warnings,
    }
}

/// Scripted calendar client for tests.
pub struct MockCalendarClient {
    connected: bool,
    fail_creates: bool,
    created: std::sync::Mutex<Vec<ReminderSpec>>,
}

impl MockCalendarClient {
    pub fn connected() -> Self {
        Self {
            connected: true,
            fail_creates: false,
            created: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            fail_creates: false,
            created: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            connected: true,
            fail_creates: true,
            created: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn created_titles(&self) -> Vec<String> {
        self.created
            .lock()
            .expect("mock lock")
            .iter()
            .map(|s| s.title.clone())
            .collect()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().expect("mock lock").len()
    }
}

impl CalendarClient for MockCalendarClient {
    fn connection_status(&self, _patient_id: Uuid) -> Result<ConnectionStatus, CalendarError> {
        Ok(ConnectionStatus {
            connected: self.connected,
            authorization_url: (!self.connected)
                .then(|| "https://calendar.example/authorize".to_string()),
        })
    }

    fn create_reminder(
        &self,
        _patient_id: Uuid,
        spec: &ReminderSpec,
    ) -> Result<String, CalendarError> {
        if self.fail_creates {
            return Err(CalendarError::Bridge {
                status: 502,
                body: "upstream calendar write failed".into(),
            });
        }
        let mut created = self.created.lock().expect("mock lock");
        created.push(spec.clone());
        Ok(format!("evt-{}", created.len()))
    }
}
