use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::records::{Record, RecordId};

/// Lifecycle of a course preinscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreinscriptionStatus {
    Draft,
    Submitted,
    InReview,
    Validated,
    Confirmed,
    Rejected,
    Cancelled,
}

impl PreinscriptionStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Draft,
            Self::Submitted,
            Self::InReview,
            Self::Validated,
            Self::Confirmed,
            Self::Rejected,
            Self::Cancelled,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Validated => "validated",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Borrador",
            Self::Submitted => "Enviada",
            Self::InReview => "En revisión",
            Self::Validated => "Validada",
            Self::Confirmed => "Confirmada",
            Self::Rejected => "Rechazada",
            Self::Cancelled => "Cancelada",
        }
    }

    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Submitted, Self::Cancelled],
            Self::Submitted => &[Self::InReview, Self::Cancelled],
            Self::InReview => &[Self::Validated, Self::Rejected],
            Self::Validated => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed | Self::Rejected | Self::Cancelled => &[],
        }
    }

    pub fn can_transition(self, to: Self) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Rejected and cancelled preinscriptions no longer hold a place in the course.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for PreinscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit entry appended on every status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: PreinscriptionStatus,
    pub to: PreinscriptionStatus,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub actor_id: Option<RecordId>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("preinscription is already {0}")]
    Unchanged(PreinscriptionStatus),
    #[error("cannot move a preinscription from {from} to {to}")]
    NotAllowed {
        from: PreinscriptionStatus,
        to: PreinscriptionStatus,
    },
    #[error("a reason is required to reject a preinscription")]
    ReasonRequired,
}

/// A person's request for a seat in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preinscription {
    #[serde(default)]
    pub id: RecordId,
    pub person_id: RecordId,
    pub course_id: RecordId,
    pub status: PreinscriptionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validated_by: Option<RecordId>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

impl Preinscription {
    pub fn new(
        person_id: RecordId,
        course_id: RecordId,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            person_id,
            course_id,
            status: PreinscriptionStatus::Draft,
            notes: notes.filter(|text| !text.trim().is_empty()),
            created_at,
            submitted_at: None,
            validated_at: None,
            validated_by: None,
            confirmed_at: None,
            rejection_reason: None,
            history: Vec::new(),
        }
    }

    /// Apply a transition from the workflow table, stamping milestones and history.
    pub fn change_status(
        &mut self,
        to: PreinscriptionStatus,
        actor_id: Option<RecordId>,
        at: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<StatusChange, TransitionError> {
        let from = self.status;
        if from == to {
            return Err(TransitionError::Unchanged(from));
        }
        if !from.can_transition(to) {
            return Err(TransitionError::NotAllowed { from, to });
        }

        let note = note
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        match to {
            PreinscriptionStatus::Submitted => self.submitted_at = Some(at),
            PreinscriptionStatus::Validated => {
                self.validated_at = Some(at);
                self.validated_by = actor_id;
            }
            PreinscriptionStatus::Confirmed => self.confirmed_at = Some(at),
            PreinscriptionStatus::Rejected => {
                let reason = note.clone().ok_or(TransitionError::ReasonRequired)?;
                self.rejection_reason = Some(reason);
            }
            PreinscriptionStatus::Draft
            | PreinscriptionStatus::InReview
            | PreinscriptionStatus::Cancelled => {}
        }

        let change = StatusChange {
            from,
            to,
            at,
            actor_id,
            note,
        };
        self.status = to;
        self.history.push(change.clone());

        Ok(change)
    }
}

impl Record for Preinscription {
    const RESOURCE: &'static str = "preinscription";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

/// One row of the transition table, as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStep {
    pub status: PreinscriptionStatus,
    pub label: &'static str,
    pub allowed: Vec<PreinscriptionStatus>,
    pub terminal: bool,
}

impl WorkflowStep {
    pub fn for_status(status: PreinscriptionStatus) -> Self {
        Self {
            status,
            label: status.label(),
            allowed: status.allowed_transitions().to_vec(),
            terminal: status.is_terminal(),
        }
    }
}

pub fn workflow() -> Vec<WorkflowStep> {
    PreinscriptionStatus::ordered()
        .into_iter()
        .map(WorkflowStep::for_status)
        .collect()
}
