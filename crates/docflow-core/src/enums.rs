//! Enum types for the docflow system.
//!
//! Every enum here is closed: it serializes as its snake_case string and
//! refuses unknown strings on the way back in. Each one has:
//! - `as_str()`, `ALL`, `Display`
//! - `FromStr` returning [`ParseEnumError`]
//! - Serialize / Deserialize through the string form

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

// ---------------------------------------------------------------------------
// Macro: defines a closed enum with a fixed set of string variants.
// ---------------------------------------------------------------------------
macro_rules! define_enum {
    (
        $(#[$meta:meta])*
        $name:ident, kind = $kind:expr, default = $default:ident,
        variants: [
            $( ($variant:ident, $str:expr) ),+ $(,)?
        ]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[ $( Self::$variant, )+ ];

            /// Returns the string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $str => Ok(Self::$variant), )+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_owned(),
                        expected: [$( $str ),+].join(", "),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// DocumentStatus
// ---------------------------------------------------------------------------
define_enum!(
    /// Lifecycle status of a document.
    DocumentStatus, kind = "document status", default = Draft,
    variants: [
        (Draft, "draft"),
        (Prepare, "prepare"),
        (PendingChecking, "pending_checking"),
        (Checking, "checking"),
        (Pending, "pending"),
        (Approved, "approved"),
        (Rejected, "rejected"),
    ]
);

impl DocumentStatus {
    /// Status a document takes while `step_type` is the active step.
    ///
    /// `signed` is true once at least one assignee of the active step has
    /// approved; a checking step nobody has signed yet reads as
    /// `PendingChecking`.
    pub fn for_step(step_type: StepType, signed: bool) -> Self {
        match step_type {
            StepType::Prepare => Self::Prepare,
            StepType::Checking if signed => Self::Checking,
            StepType::Checking => Self::PendingChecking,
            StepType::Approve => Self::Pending,
        }
    }

    /// Returns true while the document sits on an active step.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Prepare | Self::PendingChecking | Self::Checking | Self::Pending
        )
    }

    /// Returns true for states with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

// ---------------------------------------------------------------------------
// StepType
// ---------------------------------------------------------------------------
define_enum!(
    /// Kind of workflow step. Notification and recall policy are pure
    /// functions of the variant.
    StepType, kind = "step type", default = Approve,
    variants: [
        (Prepare, "prepare"),
        (Checking, "checking"),
        (Approve, "approve"),
    ]
);

impl StepType {
    /// Whether entering a step of this type emails its assignees.
    pub fn should_send_email(&self) -> bool {
        match self {
            Self::Prepare => false,
            Self::Checking | Self::Approve => true,
        }
    }

    /// Whether a document may be recalled once a step of this type has
    /// been fully approved.
    pub fn can_recall_after_approve(&self) -> bool {
        match self {
            Self::Prepare | Self::Checking => true,
            Self::Approve => false,
        }
    }

    /// Activity recorded when a step of this type completes.
    pub fn completion_action(&self) -> ActivityAction {
        match self {
            Self::Prepare => ActivityAction::Prepared,
            Self::Checking => ActivityAction::Checked,
            Self::Approve => ActivityAction::Approved,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Prepare => "Prepare",
            Self::Checking => "Checking",
            Self::Approve => "Approve",
        }
    }
}

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------
define_enum!(
    /// Status of one approver assignment.
    ApprovalStatus, kind = "approval status", default = Pending,
    variants: [
        (Pending, "pending"),
        (Approved, "approved"),
        (Rejected, "rejected"),
    ]
);

// ---------------------------------------------------------------------------
// ActivityAction
// ---------------------------------------------------------------------------
define_enum!(
    /// Audit log action kinds.
    ActivityAction, kind = "activity action", default = Created,
    variants: [
        (Created, "created"),
        (Edited, "edited"),
        (Submitted, "submitted"),
        (Prepared, "prepared"),
        (Checked, "checked"),
        (Approved, "approved"),
        (Rejected, "rejected"),
        (Recalled, "recalled"),
    ]
);

// ---------------------------------------------------------------------------
// VersionStatus
// ---------------------------------------------------------------------------
define_enum!(
    /// Publication status of a template or workflow version.
    VersionStatus, kind = "version status", default = Draft,
    variants: [
        (Draft, "draft"),
        (Published, "published"),
        (Archived, "archived"),
    ]
);

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------
define_enum!(
    /// Input types a template field marker may declare.
    FieldType, kind = "field type", default = Text,
    variants: [
        (Text, "text"),
        (Email, "email"),
        (Tel, "tel"),
        (Number, "number"),
        (Date, "date"),
        (Textarea, "textarea"),
        (Select, "select"),
        (Checkbox, "checkbox"),
        (Signature, "signature"),
    ]
);

// ---------------------------------------------------------------------------
// NotificationKind
// ---------------------------------------------------------------------------
define_enum!(
    /// Message kinds handed to the notification collaborator.
    NotificationKind, kind = "notification kind", default = OverdueReminder,
    variants: [
        (OverdueReminder, "overdue_reminder"),
        (ApprovalRequested, "approval_requested"),
        (CheckingRequested, "checking_requested"),
        (Approved, "approved"),
        (Rejected, "rejected"),
        (Recalled, "recalled"),
    ]
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_roundtrip_through_strings() {
        for status in DocumentStatus::ALL {
            let parsed: DocumentStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
        assert_eq!(DocumentStatus::PendingChecking.as_str(), "pending_checking");
    }

    #[test]
    fn unknown_string_is_rejected() {
        let err = "in_review".parse::<DocumentStatus>().unwrap_err();
        assert_eq!(err.value, "in_review");
        assert!(err.to_string().contains("pending_checking"));

        let json = serde_json::from_str::<StepType>("\"review\"");
        assert!(json.is_err());
    }

    #[test]
    fn serde_uses_snake_case_strings() {
        let json = serde_json::to_string(&DocumentStatus::PendingChecking).unwrap();
        assert_eq!(json, "\"pending_checking\"");
        let back: NotificationKind = serde_json::from_str("\"checking_requested\"").unwrap();
        assert_eq!(back, NotificationKind::CheckingRequested);
    }

    #[test]
    fn step_policies() {
        assert!(!StepType::Prepare.should_send_email());
        assert!(StepType::Checking.should_send_email());
        assert!(StepType::Approve.should_send_email());

        assert!(StepType::Prepare.can_recall_after_approve());
        assert!(StepType::Checking.can_recall_after_approve());
        assert!(!StepType::Approve.can_recall_after_approve());
    }

    #[test]
    fn status_mirrors_active_step_type() {
        assert_eq!(DocumentStatus::for_step(StepType::Prepare, false), DocumentStatus::Prepare);
        assert_eq!(DocumentStatus::for_step(StepType::Prepare, true), DocumentStatus::Prepare);
        assert_eq!(
            DocumentStatus::for_step(StepType::Checking, false),
            DocumentStatus::PendingChecking
        );
        assert_eq!(DocumentStatus::for_step(StepType::Checking, true), DocumentStatus::Checking);
        assert_eq!(DocumentStatus::for_step(StepType::Approve, false), DocumentStatus::Pending);
    }

    #[test]
    fn in_flight_and_terminal_partition() {
        assert!(!DocumentStatus::Draft.is_in_flight());
        assert!(!DocumentStatus::Draft.is_terminal());
        assert!(DocumentStatus::Pending.is_in_flight());
        assert!(DocumentStatus::Approved.is_terminal());
        assert!(DocumentStatus::Rejected.is_terminal());
        assert!(!DocumentStatus::Rejected.is_in_flight());
    }

    #[test]
    fn completion_actions() {
        assert_eq!(StepType::Prepare.completion_action(), ActivityAction::Prepared);
        assert_eq!(StepType::Checking.completion_action(), ActivityAction::Checked);
        assert_eq!(StepType::Approve.completion_action(), ActivityAction::Approved);
    }
}
