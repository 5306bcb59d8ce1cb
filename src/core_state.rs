//! Shared application state handed to the API layer.
//!
//! Owns the consultation workflow (and through it the per-consultation
//! lock registry), the calendar client, and the database location. Every
//! handler opens its own SQLite connection; cross-request coordination
//! happens through the workflow's locks and the store's version checks,
//! never through shared connections.

use std::path::PathBuf;
use std::sync::Arc;

use crate::calendar::{CalendarClient, HttpCalendarClient};
use crate::config::Settings;
use crate::db::{self, DatabaseError};
use crate::pipeline::agent::{AgentClient, DeepSeekClient};
use crate::pipeline::invoker::AgentInvoker;
use crate::pipeline::workflow::ConsultationWorkflow;

pub struct CoreState {
    settings: Settings,
    workflow: ConsultationWorkflow,
    calendar: Arc<dyn CalendarClient>,
}

impl CoreState {
    /// Wire up production clients from settings.
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        let agent: Box<dyn AgentClient> = Box::new(DeepSeekClient::new(
            &settings.agent_base_url,
            &settings.agent_api_key,
            &settings.agent_model,
            settings.agent_timeout_secs,
        ));
        let calendar: Arc<dyn CalendarClient> = Arc::new(HttpCalendarClient::new(
            &settings.calendar_base_url,
            settings.calendar_timeout_secs,
        ));
        Self::with_clients(settings, agent, calendar)
    }

    /// Wire up with injected clients (tests use mocks here).
    pub fn with_clients(
        settings: Settings,
        agent: Box<dyn AgentClient>,
        calendar: Arc<dyn CalendarClient>,
    ) -> Result<Self, CoreError> {
        if let Some(parent) = settings.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            settings,
            workflow: ConsultationWorkflow::new(AgentInvoker::new(agent)),
            calendar,
        })
    }

    /// Open a database connection for the current request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(db::open_database(&self.settings.database_path)?)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.settings.database_path
    }

    pub fn workflow(&self) -> &ConsultationWorkflow {
        &self.workflow
    }

    pub fn calendar(&self) -> &dyn CalendarClient {
        &*self.calendar
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
