// Ticket report export
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::ServiceError;
use crate::models::ticketmodel::{Ticket, TicketPriority};

pub const REPORT_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const REPORT_DISPOSITION: &str = "attachment; filename=tickets_report.csv";

const HEADERS: [&str; 20] = [
    "Tracking ID",
    "Name",
    "Email",
    "Category",
    "Status",
    "Priority",
    "Location",
    "Department",
    "School Level",
    "School Name",
    "Created At",
    "Equipment Type",
    "Equipment Model",
    "Serial No.",
    "Specific Problem",
    "Assigned To",
    "Diagnosis Details",
    "Fix Details",
    "Date Fixed",
    "Recommendations",
];

/// One flattened ticket line of the admin report. Field order matches `HEADERS`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportRow {
    pub tracking_id: String,
    pub name: String,
    pub email: String,
    pub category: String,
    pub status: String,
    pub priority: String,
    pub location: String,
    pub department: String,
    pub school_level: String,
    pub school_name: String,
    pub created_at: String,
    pub type_of_equipment: String,
    pub model_of_equipment: String,
    pub serial_no: String,
    pub specific_problem: String,
    pub assigned_to: String,
    pub diagnosis_details: String,
    pub fix_details: String,
    pub date_fixed: String,
    pub recommendations: String,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn report_date(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format("%m/%d/%Y %I:%M %p").to_string())
        .unwrap_or_default()
}

fn location_label(location: Option<&str>) -> String {
    match location {
        Some("SDO_IMUS_CITY") => "SDO - Imus City".to_string(),
        Some(_) => "School - Imus City".to_string(),
        None => String::new(),
    }
}

impl From<&Ticket> for ReportRow {
    fn from(ticket: &Ticket) -> Self {
        let d = &ticket.details;
        let ict = &ticket.ict;

        ReportRow {
            tracking_id: text(&ticket.tracking_id),
            name: ticket.name.clone(),
            email: ticket.email.clone(),
            category: ticket.category.to_str().replace('_', " "),
            status: ticket.status.to_str().replace('_', " "),
            priority: ticket.priority.to_str().to_string(),
            location: location_label(d.location.as_deref()),
            department: text(&d.department),
            school_level: text(&d.school_level),
            school_name: text(&d.school_name),
            created_at: report_date(Some(ticket.created_at)),
            type_of_equipment: text(&d.type_of_equipment),
            model_of_equipment: text(&d.model_of_equipment),
            serial_no: text(&d.serial_no),
            specific_problem: text(&d.specific_problem),
            assigned_to: text(&ict.ict_assigned_to),
            diagnosis_details: text(&ict.ict_diagnosis_details),
            fix_details: text(&ict.ict_fix_details),
            date_fixed: report_date(ict.ict_date_fixed),
            recommendations: text(&ict.ict_recommendations),
        }
    }
}

/// HIGH priority rows first, then by category label. The sort is stable, so
/// rows keep their newest-first order inside a group.
pub fn report_rows(tickets: &[Ticket]) -> Vec<ReportRow> {
    let mut rows: Vec<(TicketPriority, ReportRow)> = tickets
        .iter()
        .map(|ticket| (ticket.priority, ReportRow::from(ticket)))
        .collect();

    rows.sort_by(|(a_priority, a), (b_priority, b)| {
        match (*a_priority == TicketPriority::High, *b_priority == TicketPriority::High) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.category.cmp(&b.category),
        }
    });

    rows.into_iter().map(|(_, row)| row).collect()
}

/// Writes the rows as CSV. The header line is written even when there are no rows.
pub fn write_csv(rows: &[ReportRow]) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(HEADERS)
        .map_err(|e| ServiceError::Report(e.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ServiceError::Report(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| ServiceError::Report(e.to_string()))
}
