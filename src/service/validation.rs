// Per-category validation of ticket submissions
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use super::{
    error::{FieldError, ServiceError},
    file_store::UploadedFile,
};
use crate::{
    dtos::ticketdtos::*,
    models::{
        settingsmodel::CategorySettings,
        ticketmodel::{category_specific_details, NewTicket, TicketCategory, TicketDetails, TicketPriority},
    },
};

pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

const ALLOWED_MIME_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];
const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

pub const TA_TYPES: [&str; 7] = [
    "DCP_MONITORING",
    "AV_ASSISTANCE",
    "ICT_TUTORIAL",
    "ICT_ASSISTANCE",
    "ID_PRINTING",
    "BIOMETRICS_ENROLLMENT",
    "ICT_EQUIPMENT_INSPECTION",
];
const ACCOUNT_ACTIONS: [&str; 2] = ["Account Request", "Password Reset"];
const ACCOUNT_TYPES: [&str; 3] = ["email", "system", "both"];
const DOCUMENT_TYPES: [&str; 4] = ["official", "report", "form", "other"];

const SDO: &str = "SDO";
const SCHOOL: &str = "SCHOOL";
const SDO_LOCATION: &str = "SDO_IMUS_CITY";
const SCHOOL_LOCATION: &str = "SCHOOL_IMUS_CITY";

/// Collects field errors from the derive and from the manual rules.
#[derive(Debug, Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn push(&mut self, field: &str, message: &str) {
        if !self.0.iter().any(|e| e.field == field) {
            self.0.push(FieldError::new(field, message));
        }
    }

    fn extend_from(&mut self, result: Result<(), ValidationErrors>) {
        let Err(errors) = result else {
            return;
        };
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        for (field, list) in fields {
            let message = list
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            self.push(&request_field_name(field), &message);
        }
    }

    fn require(&mut self, field: &str, value: Option<&str>, message: &str) {
        if value.map_or(true, str::is_empty) {
            self.push(field, message);
        }
    }

    fn one_of(&mut self, field: &str, value: &str, allowed: &[&str], message: &str) {
        if !allowed.contains(&value) {
            self.push(field, message);
        }
    }

    fn finish<T>(self, value: T) -> Result<T, ServiceError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(ServiceError::Validation(self.0))
        }
    }
}

/// Runs the derive rules of a request body, reporting failures with the
/// request's field names.
pub fn validate_dto<T: Validate>(dto: &T) -> Result<(), ServiceError> {
    let mut errors = Errors::default();
    errors.extend_from(dto.validate());
    errors.finish(())
}

/// Maps a struct field name to the camelCase name used in requests.
fn request_field_name(field: &str) -> String {
    if field == "action_type" {
        return "type".to_string();
    }
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Trims strings, stringifies scalars and drops nulls so that the DTOs only
/// ever see strings.
fn normalize(payload: Value) -> Map<String, Value> {
    let Value::Object(map) = payload else {
        return Map::new();
    };
    map.into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => Value::String(s.trim().to_string()),
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                Value::Null => return None,
                other => other,
            };
            Some((key, value))
        })
        .collect()
}

fn parse_dto<T: DeserializeOwned>(payload: Map<String, Value>) -> Result<T, ServiceError> {
    serde_json::from_value(Value::Object(payload)).map_err(|e| {
        ServiceError::Validation(vec![FieldError::new("body", format!("Malformed request body: {}", e))])
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_priority(value: Option<&str>, errors: &mut Errors) -> TicketPriority {
    match value.filter(|v| !v.is_empty()) {
        None => TicketPriority::default(),
        Some(v) => TicketPriority::from_str(v).unwrap_or_else(|_| {
            errors.push("priority", "Priority must be LOW, MEDIUM or HIGH");
            TicketPriority::default()
        }),
    }
}

fn parse_request_date(value: Option<&str>, errors: &mut Errors) -> Option<DateTime<Utc>> {
    let value = value.filter(|v| !v.is_empty())?;
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(0, 0, 0).map(|at| at.and_utc()),
        Err(_) => {
            errors.push("dateOfRequest", "Date of request must be a valid date");
            None
        }
    }
}

/// Validates `locationType` and the school fields it makes mandatory.
fn check_school_context(
    location_type: Option<&str>,
    school_level: Option<&str>,
    school_name: Option<&str>,
    errors: &mut Errors,
) {
    match location_type {
        None | Some(SDO) => {}
        Some(SCHOOL) => {
            errors.require("schoolLevel", school_level, "School level is required");
            errors.require("schoolName", school_name, "School name is required");
        }
        Some(_) => errors.push("locationType", "Location type must be SDO or SCHOOL"),
    }
}

fn location_for(location_type: Option<&str>) -> Option<String> {
    match location_type {
        Some(SDO) => Some(SDO_LOCATION.to_string()),
        Some(SCHOOL) => Some(SCHOOL_LOCATION.to_string()),
        _ => None,
    }
}

/// Checks an uploaded document's type and size.
pub fn check_file(file: &UploadedFile) -> Result<(), ServiceError> {
    let mime_ok = ALLOWED_MIME_TYPES.contains(&file.content_type.as_str());
    let ext_ok = file
        .extension()
        .map_or(false, |ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));

    if !mime_ok && !ext_ok {
        return Err(ServiceError::InvalidFile);
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ServiceError::FileTooLarge);
    }
    Ok(())
}

/// Resolves a category label and checks that it is enabled.
pub fn resolve_category(label: &str, categories: &CategorySettings) -> Result<TicketCategory, ServiceError> {
    let category = TicketCategory::from_str(label).map_err(|_| {
        ServiceError::Validation(vec![FieldError::new("category", "Invalid ticket category")])
    })?;

    if !categories.is_active(category) {
        return Err(ServiceError::Validation(vec![FieldError::new(
            "category",
            format!("{} tickets are currently not accepted", category.display_name()),
        )]));
    }

    Ok(category)
}

/// Validates a submission for `category` and turns it into an insertable
/// ticket. Every field violation is reported at once.
pub fn validate_submission(
    category: &str,
    payload: Value,
    file: Option<&UploadedFile>,
    categories: &CategorySettings,
) -> Result<NewTicket, ServiceError> {
    let category = resolve_category(category, categories)?;

    if category == TicketCategory::DocumentUpload {
        if let Some(file) = file {
            check_file(file)?;
        }
    }

    let payload = normalize(payload);
    let (name, email, priority, details) = match category {
        TicketCategory::Troubleshooting => validate_troubleshooting(parse_dto(payload)?)?,
        TicketCategory::AccountManagement => validate_account_management(parse_dto(payload)?)?,
        TicketCategory::DocumentUpload => validate_document_upload(parse_dto(payload)?)?,
        TicketCategory::TechnicalAssistance => validate_technical_assistance(parse_dto(payload)?)?,
    };

    let category_specific_details = category_specific_details(category.to_str(), priority, &details);

    Ok(NewTicket {
        category,
        priority,
        name,
        email,
        details,
        category_specific_details,
    })
}

type Validated = (String, String, TicketPriority, TicketDetails);

fn validate_troubleshooting(dto: TroubleshootingDto) -> Result<Validated, ServiceError> {
    let mut errors = Errors::default();
    errors.extend_from(dto.validate());
    let priority = parse_priority(dto.priority.as_deref(), &mut errors);
    let date_of_request = parse_request_date(dto.date_of_request.as_deref(), &mut errors);

    let details = TicketDetails {
        department: Some(dto.department),
        location: non_empty(dto.location),
        school_level: non_empty(dto.school_level),
        school_name: non_empty(dto.school_name),
        date_of_request,
        type_of_equipment: Some(dto.type_of_equipment),
        model_of_equipment: Some(dto.model_of_equipment),
        serial_no: Some(dto.serial_no),
        specific_problem: Some(dto.specific_problem),
        ..Default::default()
    };

    errors.finish((dto.name, dto.email, priority, details))
}

fn validate_account_management(dto: AccountManagementDto) -> Result<Validated, ServiceError> {
    let mut errors = Errors::default();
    errors.extend_from(dto.validate());
    errors.one_of(
        "type",
        &dto.action_type,
        &ACCOUNT_ACTIONS,
        "Request type must be Account Request or Password Reset",
    );
    if let Some(account_type) = dto.account_type.as_deref().filter(|v| !v.is_empty()) {
        errors.one_of(
            "accountType",
            account_type,
            &ACCOUNT_TYPES,
            "Account type must be email, system or both",
        );
    }
    let location_type = dto.location_type.as_deref().filter(|v| !v.is_empty());
    check_school_context(
        location_type,
        dto.school_level.as_deref(),
        dto.school_name.as_deref(),
        &mut errors,
    );
    let priority = parse_priority(dto.priority.as_deref(), &mut errors);

    let details = TicketDetails {
        department: Some(dto.department),
        location: location_for(location_type),
        location_type: location_type.map(str::to_string),
        school_level: non_empty(dto.school_level),
        school_name: non_empty(dto.school_name),
        action_type: Some(dto.action_type),
        account_type: non_empty(dto.account_type),
        reason: Some(dto.reason),
        position: non_empty(dto.position),
        employee_id: non_empty(dto.employee_id),
        subject: non_empty(dto.subject),
        message: non_empty(dto.message),
        ..Default::default()
    };

    errors.finish((dto.name, dto.email, priority, details))
}

fn validate_document_upload(dto: DocumentUploadDto) -> Result<Validated, ServiceError> {
    let mut errors = Errors::default();
    errors.extend_from(dto.validate());
    errors.one_of(
        "documentType",
        &dto.document_type,
        &DOCUMENT_TYPES,
        "Document type must be official, report, form or other",
    );
    let location_type = dto.location_type.as_deref().filter(|v| !v.is_empty());
    check_school_context(
        location_type,
        dto.school_level.as_deref(),
        dto.school_name.as_deref(),
        &mut errors,
    );
    let priority = parse_priority(dto.priority.as_deref(), &mut errors);

    let details = TicketDetails {
        department: Some(dto.department),
        location: location_for(location_type),
        location_type: location_type.map(str::to_string),
        school_level: non_empty(dto.school_level),
        school_name: non_empty(dto.school_name),
        document_title: Some(dto.document_title),
        document_type: Some(dto.document_type),
        document_description: Some(dto.document_description),
        ..Default::default()
    };

    errors.finish((dto.name, dto.email, priority, details))
}

fn validate_technical_assistance(dto: TechnicalAssistanceDto) -> Result<Validated, ServiceError> {
    let mut errors = Errors::default();
    errors.extend_from(dto.validate());

    errors.require("priority", Some(dto.priority.as_str()), "Priority is required");
    let priority = parse_priority(Some(dto.priority.as_str()), &mut errors);

    errors.one_of("taType", &dto.ta_type, &TA_TYPES, "Please select a valid assistance type");
    errors.one_of(
        "location",
        &dto.location,
        &[SDO_LOCATION, SCHOOL_LOCATION],
        "Location must be SDO_IMUS_CITY or SCHOOL_IMUS_CITY",
    );

    let location_type = match dto.location_type.as_deref().filter(|v| !v.is_empty()) {
        Some(given) => Some(given),
        None if dto.location == SCHOOL_LOCATION => Some(SCHOOL),
        None if dto.location == SDO_LOCATION => Some(SDO),
        None => None,
    };
    check_school_context(
        location_type,
        dto.school_level.as_deref(),
        dto.school_name.as_deref(),
        &mut errors,
    );
    if location_type == Some(SDO) {
        errors.require("department", dto.department.as_deref(), "Department is required");
    }

    let details = TicketDetails {
        department: non_empty(dto.department),
        location: Some(dto.location),
        location_type: location_type.map(str::to_string),
        school_level: non_empty(dto.school_level),
        school_name: non_empty(dto.school_name),
        ta_type: Some(dto.ta_type),
        subject: Some(dto.subject),
        message: Some(dto.message),
        ..Default::default()
    };

    errors.finish((dto.name, dto.email, priority, details))
}
