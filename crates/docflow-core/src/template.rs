//! Form templates: named sheets of HTML with embedded field markers.
//!
//! Templates are versioned by name. A new version starts as a draft; only
//! a published, unexpired version accepts new documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::VersionStatus;

/// One sheet of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub html: String,
}

impl Sheet {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub status: VersionStatus,

    /// The version this one was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,

    pub sheets: Vec<Sheet>,

    /// Script run over the form data on every save. Empty means none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub calculation_script: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_reason: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Template {
    /// A draft with no id or version yet; storage assigns both.
    pub fn new(name: impl Into<String>, sheets: Vec<Sheet>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            version: 0,
            status: VersionStatus::Draft,
            parent_id: None,
            sheets,
            calculation_script: String::new(),
            expired_at: None,
            expired_reason: None,
            created_at,
        }
    }

    pub fn with_calculation_script(mut self, script: impl Into<String>) -> Self {
        self.calculation_script = script.into();
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired_at.is_some_and(|at| at <= now)
    }

    /// Only drafts may be published.
    pub fn can_publish(&self) -> bool {
        self.status == VersionStatus::Draft
    }

    pub fn can_expire(&self) -> bool {
        self.status == VersionStatus::Published && self.expired_at.is_none()
    }

    /// Whether new documents may be created from this version at `now`.
    pub fn accepts_documents(&self, now: DateTime<Utc>) -> bool {
        self.status == VersionStatus::Published && !self.is_expired(now)
    }

    /// Human label, e.g. `Purchase order v2`.
    pub fn label(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }
}
