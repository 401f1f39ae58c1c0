//! Manifest lifecycle: the static status table and transition validation.
//!
//! The status is what box 4 of the form prints, so the wire names are the
//! Spanish literals used on the paper form.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ManifestStatus {
    #[default]
    #[serde(rename = "PROVISORIO")]
    Provisional,
    #[serde(rename = "DEFINITIVO")]
    Final,
    #[serde(rename = "CONFIRMADO")]
    Confirmed,
    #[serde(rename = "EN_PROCESO")]
    InProcess,
    #[serde(rename = "FINALIZADO")]
    Finalized,
    #[serde(rename = "ANULADO")]
    Voided,
}

/// Static configuration of one status.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusRule {
    pub status: ManifestStatus,
    pub label: &'static str,
    pub successors: &'static [ManifestStatus],
    /// Moving into this status must be explicitly confirmed by the caller.
    pub requires_confirmation: bool,
    /// Fields other than the status may be edited while in this status.
    pub editable: bool,
    pub terminal: bool,
}

use ManifestStatus::*;

static STATUS_TABLE: [StatusRule; 6] = [
    StatusRule {
        status: Provisional,
        label: "Provisorio",
        successors: &[Final, Voided],
        requires_confirmation: false,
        editable: true,
        terminal: false,
    },
    StatusRule {
        status: Final,
        label: "Definitivo",
        successors: &[Confirmed, InProcess, Voided],
        requires_confirmation: true,
        editable: true,
        terminal: false,
    },
    StatusRule {
        status: Confirmed,
        label: "Confirmado",
        successors: &[InProcess, Finalized, Voided],
        requires_confirmation: true,
        editable: false,
        terminal: false,
    },
    StatusRule {
        status: InProcess,
        label: "En Proceso",
        successors: &[Finalized, Voided],
        requires_confirmation: true,
        editable: false,
        terminal: false,
    },
    StatusRule {
        status: Finalized,
        label: "Finalizado",
        successors: &[],
        requires_confirmation: false,
        editable: false,
        terminal: true,
    },
    StatusRule {
        status: Voided,
        label: "Anulado",
        successors: &[],
        requires_confirmation: false,
        editable: false,
        terminal: true,
    },
];

impl ManifestStatus {
    pub const ALL: [ManifestStatus; 6] =
        [Provisional, Final, Confirmed, InProcess, Finalized, Voided];

    /// The literal printed in box 4.
    pub fn as_str(self) -> &'static str {
        match self {
            Provisional => "PROVISORIO",
            Final => "DEFINITIVO",
            Confirmed => "CONFIRMADO",
            InProcess => "EN_PROCESO",
            Finalized => "FINALIZADO",
            Voided => "ANULADO",
        }
    }

    /// Parses a box-4 literal, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_uppercase();
        Self::ALL.into_iter().find(|s| s.as_str() == wanted)
    }

    pub fn rule(self) -> &'static StatusRule {
        // The table is indexed in declaration order.
        &STATUS_TABLE[self as usize]
    }

    pub fn is_editable(self) -> bool {
        self.rule().editable
    }

    pub fn is_terminal(self) -> bool {
        self.rule().terminal
    }

    pub fn can_transition_to(self, next: ManifestStatus) -> bool {
        self == next || self.rule().successors.contains(&next)
    }
}

pub fn status_table() -> &'static [StatusRule] {
    &STATUS_TABLE
}

/// Why a status change request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    NotAllowed {
        from: ManifestStatus,
        to: ManifestStatus,
    },
    ConfirmationRequired(ManifestStatus),
    Locked(ManifestStatus),
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::NotAllowed { from, to } => write!(
                f,
                "transition from {} to {} is not allowed",
                from.as_str(),
                to.as_str()
            ),
            TransitionError::ConfirmationRequired(to) => {
                write!(f, "moving to {} requires confirmation", to.as_str())
            }
            TransitionError::Locked(current) => write!(
                f,
                "manifest fields cannot be edited while in status {}",
                current.as_str()
            ),
        }
    }
}

/// Validates one update request against the status table.
///
/// `next` is the requested status (`None` keeps the current one) and
/// `edits_fields` tells whether anything other than the status changes.
/// Field edits are checked against the *current* status, so a request that
/// both leaves a locked status and edits fields is still refused.
pub fn validate_update(
    current: ManifestStatus,
    next: Option<ManifestStatus>,
    edits_fields: bool,
    confirmed: bool,
) -> Result<ManifestStatus, TransitionError> {
    let target = next.unwrap_or(current);

    if !current.can_transition_to(target) {
        return Err(TransitionError::NotAllowed {
            from: current,
            to: target,
        });
    }
    if edits_fields && !current.is_editable() {
        return Err(TransitionError::Locked(current));
    }
    if target != current && target.rule().requires_confirmation && !confirmed {
        return Err(TransitionError::ConfirmationRequired(target));
    }
    Ok(target)
}
