pub mod consultation;
pub mod enums;
pub mod medication;
pub mod ticket;

pub use consultation::{CollectedData, Consultation, QaExchange};
pub use enums::{ConsultationStage, Severity, TicketStatus};
pub use medication::{Medication, NewMedication};
pub use ticket::{MedicalTicket, TicketSummary};
