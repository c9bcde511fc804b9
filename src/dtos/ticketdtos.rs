// dtos/ticketdtos.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::ticketmodel::IctDetails;

#[derive(Validate, Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TroubleshootingDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,

    #[validate(length(min = 1, message = "Equipment type is required"))]
    pub type_of_equipment: String,

    #[validate(length(min = 1, message = "Equipment model is required"))]
    pub model_of_equipment: String,

    #[validate(length(min = 1, message = "Serial number is required"))]
    pub serial_no: String,

    #[validate(length(min = 1, message = "Problem description is required"))]
    pub specific_problem: String,

    pub location: Option<String>,
    pub school_level: Option<String>,
    pub school_name: Option<String>,
    pub date_of_request: Option<String>,
    pub priority: Option<String>,
}

#[derive(Validate, Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountManagementDto {
    #[serde(rename = "type", alias = "actionType")]
    pub action_type: String,

    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,

    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,

    pub account_type: Option<String>,
    pub position: Option<String>,
    pub employee_id: Option<String>,
    pub location_type: Option<String>,
    pub school_level: Option<String>,
    pub school_name: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub priority: Option<String>,
}

#[derive(Validate, Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentUploadDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,

    #[validate(length(min = 1, message = "Document title is required"))]
    pub document_title: String,

    pub document_type: String,

    #[validate(length(min = 1, message = "Document description is required"))]
    pub document_description: String,

    pub location_type: Option<String>,
    pub school_level: Option<String>,
    pub school_name: Option<String>,
    pub priority: Option<String>,
}

#[derive(Validate, Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TechnicalAssistanceDto {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub priority: String,

    pub ta_type: String,

    pub location: String,

    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,

    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,

    pub location_type: Option<String>,
    pub department: Option<String>,
    pub school_level: Option<String>,
    pub school_name: Option<String>,
}

#[derive(Validate, Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackTicketDto {
    #[validate(length(min = 1, message = "Tracking ID is required"))]
    pub tracking_id: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitQuery {
    pub email: String,
}

#[derive(Validate, Debug, Clone, Deserialize)]
pub struct UpdateStatusDto {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,

    #[serde(default)]
    pub comment: Option<String>,
}

/// ICT resolution notes as sent by the admin panel.
#[derive(Validate, Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IctDetailsDto {
    #[validate(length(max = 255, message = "Assignee must be at most 255 characters"))]
    pub assigned_to: Option<String>,
    pub diagnosis_details: Option<String>,
    pub fix_details: Option<String>,
    pub date_fixed: Option<chrono::DateTime<chrono::Utc>>,
    pub recommendations: Option<String>,
}

impl From<IctDetailsDto> for IctDetails {
    fn from(dto: IctDetailsDto) -> Self {
        IctDetails {
            ict_assigned_to: dto.assigned_to,
            ict_diagnosis_details: dto.diagnosis_details,
            ict_fix_details: dto.fix_details,
            ict_date_fixed: dto.date_fixed,
            ict_recommendations: dto.recommendations,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQueryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub show_archived: bool,
}

/// `time_period` (weekly, monthly, annual) wins over an explicit range.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub time_period: Option<String>,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponseDto {
    pub archived: usize,
    pub purged: usize,
}
