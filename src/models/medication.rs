use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A medication owned by a patient, independent of any single
/// consultation. Referenced by calendar reminder sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub dosage: String,
    /// e.g. "once daily", "twice daily"
    pub frequency: String,
    /// Clock times the doses are taken, e.g. ["08:00", "20:00"].
    pub timing: Vec<String>,
    pub instructions: Option<String>,
    pub start_date: NaiveDate,
    /// e.g. "30 days", "ongoing"
    pub duration: Option<String>,
    pub active: bool,
    /// Calendar event ids created for this medication's reminders.
    pub calendar_event_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a medication record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub timing: Vec<String>,
    pub instructions: Option<String>,
    pub start_date: NaiveDate,
    pub duration: Option<String>,
}

impl NewMedication {
    pub fn into_medication(self, patient_id: Uuid) -> Medication {
        let now = Utc::now();
        Medication {
            id: Uuid::new_v4(),
            patient_id,
            name: self.name,
            dosage: self.dosage,
            frequency: self.frequency,
            timing: self.timing,
            instructions: self.instructions,
            start_date: self.start_date,
            duration: self.duration,
            active: true,
            calendar_event_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
