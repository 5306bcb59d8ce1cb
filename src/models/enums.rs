use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(ConsultationStage {
    Interviewing => "interviewing",
    Analyzing => "analyzing",
    Planning => "planning",
    AwaitingReview => "awaiting_review",
    Completed => "completed",
});

impl ConsultationStage {
    /// Position in the pipeline. Stages only ever advance, so comparing
    /// ranks decides whether a transition is legal or a re-invocation.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Interviewing => 0,
            Self::Analyzing => 1,
            Self::Planning => 2,
            Self::AwaitingReview => 3,
            Self::Completed => 4,
        }
    }
}

str_enum!(TicketStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(Severity {
    Low => "low",
    Moderate => "moderate",
    High => "high",
    Critical => "critical",
});

impl Severity {
    /// Doctor queue priority: critical tickets sort first.
    pub fn priority_score(&self) -> i32 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Moderate => 3,
            Self::Low => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn consultation_stage_round_trip() {
        for (variant, s) in [
            (ConsultationStage::Interviewing, "interviewing"),
            (ConsultationStage::Analyzing, "analyzing"),
            (ConsultationStage::Planning, "planning"),
            (ConsultationStage::AwaitingReview, "awaiting_review"),
            (ConsultationStage::Completed, "completed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(ConsultationStage::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn stage_ranks_are_strictly_increasing() {
        let stages = [
            ConsultationStage::Interviewing,
            ConsultationStage::Analyzing,
            ConsultationStage::Planning,
            ConsultationStage::AwaitingReview,
            ConsultationStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn ticket_status_round_trip() {
        for (variant, s) in [
            (TicketStatus::Pending, "pending"),
            (TicketStatus::Approved, "approved"),
            (TicketStatus::Rejected, "rejected"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(TicketStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn severity_round_trip_and_priority() {
        for (variant, s, score) in [
            (Severity::Low, "low", 4),
            (Severity::Moderate, "moderate", 3),
            (Severity::High, "high", 2),
            (Severity::Critical, "critical", 1),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Severity::from_str(s).unwrap(), variant);
            assert_eq!(variant.priority_score(), score);
        }
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = ConsultationStage::from_str("cancelled").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: Severity = serde_json::from_str("\"moderate\"").unwrap();
        assert_eq!(parsed, Severity::Moderate);
    }
}
