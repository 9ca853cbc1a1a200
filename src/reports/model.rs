//! # Crime Reports
//!
//! The report record, its lifecycle states, and input validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ReportError, ReportResult};

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_LOCATION_LEN: usize = 200;

/// Report lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Investigating,
    Resolved,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Investigating => "investigating",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ReportStatus::Pending),
            "investigating" => Some(ReportStatus::Investigating),
            "resolved" => Some(ReportStatus::Resolved),
            "closed" => Some(ReportStatus::Closed),
            _ => None,
        }
    }
}

/// A community crime report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrimeReport {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub status: ReportStatus,
    pub reporter_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new report
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl NewReport {
    /// Validate field shapes and lengths
    pub fn validate(&self) -> ReportResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ReportError::Validation("Title is required".to_string()));
        }
        if title.len() > MAX_TITLE_LEN {
            return Err(ReportError::Validation(format!(
                "Title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(ReportError::Validation(
                "Description is required".to_string(),
            ));
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(ReportError::Validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        if let Some(location) = &self.location {
            if location.len() > MAX_LOCATION_LEN {
                return Err(ReportError::Validation(format!(
                    "Location must be at most {} characters",
                    MAX_LOCATION_LEN
                )));
            }
        }

        Ok(())
    }

    /// Build the stored record. New reports always start pending.
    pub fn into_report(self, reporter_id: Uuid) -> ReportResult<CrimeReport> {
        self.validate()?;
        let now = Utc::now();
        Ok(CrimeReport {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            location: self
                .location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            status: ReportStatus::Pending,
            reporter_id,
            created_at: now,
            updated_at: now,
        })
    }
}
