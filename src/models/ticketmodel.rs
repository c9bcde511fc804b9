// src/models/ticketmodel.rs
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::Type;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "ticket_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketCategory {
    Troubleshooting,
    AccountManagement,
    DocumentUpload,
    TechnicalAssistance,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 4] = [
        TicketCategory::Troubleshooting,
        TicketCategory::AccountManagement,
        TicketCategory::DocumentUpload,
        TicketCategory::TechnicalAssistance,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            TicketCategory::Troubleshooting => "TROUBLESHOOTING",
            TicketCategory::AccountManagement => "ACCOUNT_MANAGEMENT",
            TicketCategory::DocumentUpload => "DOCUMENT_UPLOAD",
            TicketCategory::TechnicalAssistance => "TECHNICAL_ASSISTANCE",
        }
    }

    /// Human readable name, e.g. "Account Management".
    pub fn display_name(&self) -> &'static str {
        match self {
            TicketCategory::Troubleshooting => "Troubleshooting",
            TicketCategory::AccountManagement => "Account Management",
            TicketCategory::DocumentUpload => "Document Upload",
            TicketCategory::TechnicalAssistance => "Technical Assistance",
        }
    }

    /// Route segment used by the per-category submission endpoints.
    pub fn from_slug(slug: &str) -> Option<TicketCategory> {
        match slug {
            "troubleshooting" => Some(TicketCategory::Troubleshooting),
            "account-management" => Some(TicketCategory::AccountManagement),
            "document-upload" => Some(TicketCategory::DocumentUpload),
            "technical-assistance" => Some(TicketCategory::TechnicalAssistance),
            _ => None,
        }
    }
}

impl FromStr for TicketCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketCategory::ALL
            .into_iter()
            .find(|category| category.to_str() == s)
            .ok_or_else(|| format!("Invalid ticket category: {}", s))
    }
}

impl fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "ticket_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Pending,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::Resolved => "RESOLVED",
            TicketStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.to_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "ticket_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 3] = [
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "LOW",
            TicketPriority::Medium => "MEDIUM",
            TicketPriority::High => "HIGH",
        }
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketPriority::ALL
            .into_iter()
            .find(|priority| priority.to_str() == s)
            .ok_or_else(|| format!("Invalid priority: {}", s))
    }
}

/// Flat, category-dependent columns of a ticket.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetails {
    pub department: Option<String>,
    pub location: Option<String>,
    pub location_type: Option<String>,
    pub school_level: Option<String>,
    pub school_name: Option<String>,
    // Troubleshooting
    pub date_of_request: Option<DateTime<Utc>>,
    pub type_of_equipment: Option<String>,
    pub model_of_equipment: Option<String>,
    pub serial_no: Option<String>,
    pub specific_problem: Option<String>,
    // Account management
    pub action_type: Option<String>,
    pub account_type: Option<String>,
    pub reason: Option<String>,
    pub position: Option<String>,
    pub employee_id: Option<String>,
    // Document upload
    pub document_title: Option<String>,
    pub document_type: Option<String>,
    pub document_description: Option<String>,
    // Technical assistance
    pub ta_type: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// Resolution metadata filled in by ICT staff.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IctDetails {
    pub ict_assigned_to: Option<String>,
    pub ict_diagnosis_details: Option<String>,
    pub ict_fix_details: Option<String>,
    pub ict_date_fixed: Option<DateTime<Utc>>,
    pub ict_recommendations: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i32,
    pub tracking_id: Option<String>,
    pub category: TicketCategory,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub name: String,
    pub email: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub details: TicketDetails,
    pub category_specific_details: Option<serde_json::Value>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ict: IctDetails,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Derives `{type, details}` from the flat columns.
    pub fn category_specific_details(&self) -> serde_json::Value {
        category_specific_details(self.category.to_str(), self.priority, &self.details)
    }

    /// Replaces the cached blob with the value derived from the flat columns.
    pub fn with_derived_details(mut self) -> Self {
        self.category_specific_details = Some(self.category_specific_details());
        self
    }

    /// Subject line used by notifications and emails.
    pub fn display_subject(&self) -> Option<&str> {
        self.details
            .subject
            .as_deref()
            .or(self.details.document_title.as_deref())
    }
}

/// Builds the `categorySpecificDetails` projection for a category label.
///
/// Total over every label: the four known categories produce
/// `{type, details}`, anything else produces `{}`.
pub fn category_specific_details(
    category: &str,
    priority: TicketPriority,
    d: &TicketDetails,
) -> serde_json::Value {
    let Ok(category) = category.parse::<TicketCategory>() else {
        return json!({});
    };

    match category {
        TicketCategory::Troubleshooting => json!({
            "type": "Technical Support",
            "details": {
                "location": d.location,
                "dateOfRequest": d.date_of_request,
                "equipment": d.type_of_equipment,
                "model": d.model_of_equipment,
                "serialNo": d.serial_no,
                "problem": d.specific_problem,
                "department": d.department,
                "schoolLevel": d.school_level,
                "schoolName": d.school_name,
            }
        }),
        TicketCategory::AccountManagement => json!({
            "type": "Account Management",
            "details": {
                "actionType": d.action_type,
                "accountType": d.account_type,
                "reason": d.reason,
                "position": d.position,
                "employeeId": d.employee_id,
                "locationType": d.location_type,
                "location": d.location,
                "schoolLevel": d.school_level,
                "schoolName": d.school_name,
                "department": d.department,
                "subject": d.subject,
                "message": d.message,
            }
        }),
        TicketCategory::DocumentUpload => json!({
            "type": "Document Processing",
            "details": {
                "documentTitle": d.document_title,
                "documentType": d.document_type,
                "documentDescription": d.document_description,
                "department": d.department,
                "locationType": d.location_type,
                "location": d.location,
                "schoolLevel": d.school_level,
                "schoolName": d.school_name,
            }
        }),
        TicketCategory::TechnicalAssistance => json!({
            "type": "Technical Assistance",
            "details": {
                "taType": d.ta_type,
                "priority": priority.to_str(),
                "location": d.location,
                "locationType": d.location_type,
                "schoolLevel": d.school_level,
                "schoolName": d.school_name,
                "department": d.department,
                "subject": d.subject,
                "message": d.message,
            }
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdate {
    pub id: i32,
    pub ticket_id: i32,
    pub admin_id: i32,
    pub previous_status: TicketStatus,
    pub new_status: TicketStatus,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i32,
    pub ticket_id: i32,
    pub filename: String,
    pub path: String,
    pub mimetype: String,
    pub created_at: DateTime<Utc>,
}

/// A validated submission, ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub name: String,
    pub email: String,
    pub details: TicketDetails,
    pub category_specific_details: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub filename: String,
    pub path: String,
    pub mimetype: String,
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub page: i64,
    pub limit: i64,
    pub status: Option<TicketStatus>,
    pub category: Option<TicketCategory>,
    pub search: Option<String>,
    pub archived: bool,
}

impl TicketFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(0))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountByLabel {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total_tickets: i64,
    pub pending_tickets: i64,
    pub in_progress_tickets: i64,
    pub resolved_tickets: i64,
    pub closed_tickets: i64,
    pub archived_tickets: i64,
    pub recently_archived_tickets: i64,
    pub category_distribution: Vec<CountByLabel>,
    pub priority_distribution: Vec<CountByLabel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_limited_to_four_values() {
        for status in TicketStatus::ALL {
            assert_eq!(status.to_str().parse::<TicketStatus>(), Ok(status));
        }
        assert!("BOGUS".parse::<TicketStatus>().is_err());
        assert!("pending".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_offset_saturates_instead_of_overflowing() {
        let filter = TicketFilter {
            page: 3,
            limit: 10,
            ..Default::default()
        };
        assert_eq!(filter.offset(), 20);

        let filter = TicketFilter {
            page: i64::MAX,
            limit: 100,
            ..Default::default()
        };
        assert_eq!(filter.offset(), i64::MAX);
    }

    #[test]
    fn test_category_details_for_every_known_category() {
        let details = TicketDetails {
            type_of_equipment: Some("Printer".to_string()),
            document_title: Some("Memo".to_string()),
            ta_type: Some("ICT_TUTORIAL".to_string()),
            action_type: Some("Password Reset".to_string()),
            ..Default::default()
        };

        let expected = [
            (TicketCategory::Troubleshooting, "Technical Support"),
            (TicketCategory::AccountManagement, "Account Management"),
            (TicketCategory::DocumentUpload, "Document Processing"),
            (TicketCategory::TechnicalAssistance, "Technical Assistance"),
        ];

        for (category, label) in expected {
            let value = category_specific_details(category.to_str(), TicketPriority::High, &details);
            assert_eq!(value["type"], label);
            assert!(value["details"].is_object());
        }

        let ta = category_specific_details("TECHNICAL_ASSISTANCE", TicketPriority::High, &details);
        assert_eq!(ta["details"]["priority"], "HIGH");
        assert_eq!(ta["details"]["taType"], "ICT_TUTORIAL");
    }

    #[test]
    fn test_category_details_for_unknown_category_is_empty() {
        let value = category_specific_details("HARDWARE_LOAN", TicketPriority::Low, &TicketDetails::default());
        assert_eq!(value, json!({}));

        let value = category_specific_details("", TicketPriority::Low, &TicketDetails::default());
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_category_slugs() {
        assert_eq!(TicketCategory::from_slug("document-upload"), Some(TicketCategory::DocumentUpload));
        assert_eq!(TicketCategory::from_slug("technical-assistance"), Some(TicketCategory::TechnicalAssistance));
        assert_eq!(TicketCategory::from_slug("hardware"), None);
    }
}
