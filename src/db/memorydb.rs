// src/db/memorydb.rs
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Error;

use super::{notificationdb::NotificationExt, ticketdb::TicketExt};
use crate::{
    models::{notificationmodel::*, ticketmodel::*},
    utils::tracking_id,
};

#[derive(Debug, Default)]
struct MemoryState {
    tickets: BTreeMap<i32, Ticket>,
    updates: Vec<TicketUpdate>,
    attachments: Vec<Attachment>,
    notifications: Vec<Notification>,
    next_ticket_id: i32,
    next_update_id: i32,
    next_attachment_id: i32,
    next_notification_id: i32,
}

impl MemoryState {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }
}

/// Process-local store used when no `DATABASE_URL` is configured and in tests.
/// Every method runs under one lock, so each call is atomic.
#[derive(Debug, Default)]
pub struct MemoryDB {
    state: Mutex<MemoryState>,
}

impl MemoryDB {
    pub fn new() -> Self {
        MemoryDB::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overrides a ticket's `updated_at`. Used to age tickets in tests.
    #[cfg(test)]
    pub fn set_updated_at(&self, ticket_id: i32, at: DateTime<Utc>) {
        if let Some(ticket) = self.lock().tickets.get_mut(&ticket_id) {
            ticket.updated_at = at;
        }
    }
}

fn matches_search(ticket: &Ticket, needle: &str) -> bool {
    let d = &ticket.details;
    [
        Some(ticket.name.as_str()),
        Some(ticket.email.as_str()),
        ticket.tracking_id.as_deref(),
        d.subject.as_deref(),
        d.message.as_deref(),
        d.specific_problem.as_deref(),
        d.document_title.as_deref(),
        d.document_description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| value.to_lowercase().contains(needle))
}

fn in_range(at: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.map_or(true, |from| at >= from) && to.map_or(true, |to| at <= to)
}

fn count_by<F>(tickets: &[&Ticket], label: F) -> Vec<CountByLabel>
where
    F: Fn(&Ticket) -> &'static str,
{
    let mut counts: BTreeMap<&'static str, i64> = BTreeMap::new();
    for ticket in tickets {
        *counts.entry(label(ticket)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| CountByLabel {
            label: label.to_string(),
            count,
        })
        .collect()
}

#[async_trait]
impl TicketExt for MemoryDB {
    async fn create_ticket(
        &self,
        ticket: NewTicket,
        attachment: Option<NewAttachment>,
    ) -> Result<(Ticket, Option<Attachment>), Error> {
        let mut state = self.lock();
        let now = Utc::now();
        let id = MemoryState::next_id(&mut state.next_ticket_id);

        let stored = Ticket {
            id,
            tracking_id: Some(tracking_id::encode(now.date_naive(), id)),
            category: ticket.category,
            status: TicketStatus::Pending,
            priority: ticket.priority,
            name: ticket.name,
            email: ticket.email,
            details: ticket.details,
            category_specific_details: Some(ticket.category_specific_details),
            ict: IctDetails::default(),
            archived: false,
            archived_at: None,
            created_at: now,
            updated_at: now,
        };
        state.tickets.insert(id, stored.clone());

        let attachment = attachment.map(|attachment| {
            let stored_attachment = Attachment {
                id: MemoryState::next_id(&mut state.next_attachment_id),
                ticket_id: id,
                filename: attachment.filename,
                path: attachment.path,
                mimetype: attachment.mimetype,
                created_at: now,
            };
            state.attachments.push(stored_attachment.clone());
            stored_attachment
        });

        Ok((stored, attachment))
    }

    async fn get_ticket(&self, ticket_id: i32) -> Result<Option<Ticket>, Error> {
        Ok(self.lock().tickets.get(&ticket_id).cloned())
    }

    async fn get_ticket_by_tracking_id(
        &self,
        tracking_id: &str,
        email: &str,
    ) -> Result<Option<Ticket>, Error> {
        let state = self.lock();
        Ok(state
            .tickets
            .values()
            .find(|ticket| {
                ticket.tracking_id.as_deref() == Some(tracking_id)
                    && ticket.email.eq_ignore_ascii_case(email)
            })
            .cloned())
    }

    async fn get_tickets(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), Error> {
        let state = self.lock();
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut matching: Vec<&Ticket> = state
            .tickets
            .values()
            .filter(|ticket| ticket.archived == filter.archived)
            .filter(|ticket| filter.status.map_or(true, |status| ticket.status == status))
            .filter(|ticket| filter.category.map_or(true, |category| ticket.category == category))
            .filter(|ticket| needle.as_deref().map_or(true, |needle| matches_search(ticket, needle)))
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn get_tickets_created_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Ticket>, Error> {
        let state = self.lock();
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|ticket| in_range(ticket.created_at, from, to))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }

    async fn get_ticket_updates(&self, ticket_id: i32) -> Result<Vec<TicketUpdate>, Error> {
        let state = self.lock();
        let mut updates: Vec<TicketUpdate> = state
            .updates
            .iter()
            .filter(|update| update.ticket_id == ticket_id)
            .cloned()
            .collect();
        updates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(updates)
    }

    async fn get_ticket_attachments(&self, ticket_id: i32) -> Result<Vec<Attachment>, Error> {
        let state = self.lock();
        Ok(state
            .attachments
            .iter()
            .filter(|attachment| attachment.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn update_ticket_status(
        &self,
        ticket_id: i32,
        status: TicketStatus,
        admin_id: i32,
        comment: String,
    ) -> Result<Option<(Ticket, TicketUpdate)>, Error> {
        let mut state = self.lock();
        let now = Utc::now();

        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };
        let previous_status = ticket.status;
        ticket.status = status;
        ticket.updated_at = now;
        let ticket = ticket.clone();

        let update = TicketUpdate {
            id: MemoryState::next_id(&mut state.next_update_id),
            ticket_id,
            admin_id,
            previous_status,
            new_status: status,
            comment,
            created_at: now,
        };
        state.updates.push(update.clone());

        Ok(Some((ticket, update)))
    }

    async fn update_ict_details(
        &self,
        ticket_id: i32,
        ict: IctDetails,
    ) -> Result<Option<Ticket>, Error> {
        let mut state = self.lock();
        Ok(state.tickets.get_mut(&ticket_id).map(|ticket| {
            ticket.ict = ict;
            ticket.updated_at = Utc::now();
            ticket.clone()
        }))
    }

    async fn archive_ticket(
        &self,
        ticket_id: i32,
        archived_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, Error> {
        let mut state = self.lock();
        Ok(state
            .tickets
            .get_mut(&ticket_id)
            .filter(|ticket| !ticket.archived)
            .map(|ticket| {
                ticket.archived = true;
                ticket.archived_at = Some(archived_at);
                ticket.clone()
            }))
    }

    async fn archive_resolved_ticket(
        &self,
        ticket_id: i32,
        resolved_before: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let mut state = self.lock();
        match state.tickets.get_mut(&ticket_id) {
            Some(ticket)
                if ticket.status == TicketStatus::Resolved
                    && !ticket.archived
                    && ticket.updated_at <= resolved_before =>
            {
                ticket.archived = true;
                ticket.archived_at = Some(archived_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_ticket(&self, ticket_id: i32) -> Result<Option<Ticket>, Error> {
        let mut state = self.lock();
        Ok(state.tickets.get_mut(&ticket_id).map(|ticket| {
            ticket.archived = false;
            ticket.archived_at = None;
            ticket.updated_at = Utc::now();
            ticket.clone()
        }))
    }

    async fn delete_ticket(
        &self,
        ticket_id: i32,
        archived_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<Attachment>>, Error> {
        let mut state = self.lock();

        let deletable = match (state.tickets.get(&ticket_id), archived_before) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(ticket), Some(cutoff)) => {
                ticket.archived && ticket.archived_at.map_or(false, |at| at <= cutoff)
            }
        };
        if !deletable {
            return Ok(None);
        }

        state.tickets.remove(&ticket_id);
        state.updates.retain(|update| update.ticket_id != ticket_id);
        state
            .notifications
            .retain(|notification| notification.ticket_id != Some(ticket_id));

        let (removed, kept): (Vec<Attachment>, Vec<Attachment>) = state
            .attachments
            .drain(..)
            .partition(|attachment| attachment.ticket_id == ticket_id);
        state.attachments = kept;

        Ok(Some(removed))
    }

    async fn get_archivable_ticket_ids(
        &self,
        resolved_before: DateTime<Utc>,
    ) -> Result<Vec<i32>, Error> {
        let state = self.lock();
        Ok(state
            .tickets
            .values()
            .filter(|ticket| {
                ticket.status == TicketStatus::Resolved
                    && !ticket.archived
                    && ticket.updated_at <= resolved_before
            })
            .map(|ticket| ticket.id)
            .collect())
    }

    async fn get_purgeable_ticket_ids(
        &self,
        archived_before: DateTime<Utc>,
    ) -> Result<Vec<i32>, Error> {
        let state = self.lock();
        Ok(state
            .tickets
            .values()
            .filter(|ticket| {
                ticket.archived && ticket.archived_at.map_or(false, |at| at <= archived_before)
            })
            .map(|ticket| ticket.id)
            .collect())
    }

    async fn count_archived_tickets(&self) -> Result<i64, Error> {
        let state = self.lock();
        Ok(state.tickets.values().filter(|ticket| ticket.archived).count() as i64)
    }

    async fn get_ticket_stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        recently_archived_since: DateTime<Utc>,
    ) -> Result<TicketStats, Error> {
        let state = self.lock();
        let tickets: Vec<&Ticket> = state
            .tickets
            .values()
            .filter(|ticket| in_range(ticket.created_at, from, to))
            .collect();

        let active_with = |status: TicketStatus| {
            tickets
                .iter()
                .filter(|ticket| !ticket.archived && ticket.status == status)
                .count() as i64
        };

        Ok(TicketStats {
            total_tickets: tickets.len() as i64,
            pending_tickets: active_with(TicketStatus::Pending),
            in_progress_tickets: active_with(TicketStatus::InProgress),
            resolved_tickets: active_with(TicketStatus::Resolved),
            closed_tickets: active_with(TicketStatus::Closed),
            archived_tickets: tickets.iter().filter(|ticket| ticket.archived).count() as i64,
            recently_archived_tickets: tickets
                .iter()
                .filter(|ticket| ticket.archived_at.map_or(false, |at| at >= recently_archived_since))
                .count() as i64,
            category_distribution: count_by(&tickets, |ticket| ticket.category.to_str()),
            priority_distribution: count_by(&tickets, |ticket| ticket.priority.to_str()),
        })
    }
}

#[async_trait]
impl NotificationExt for MemoryDB {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, Error> {
        let mut state = self.lock();
        let stored = Notification {
            id: MemoryState::next_id(&mut state.next_notification_id),
            title: notification.title,
            message: notification.message,
            notification_type: notification.notification_type,
            priority: notification.priority,
            ticket_id: notification.ticket_id,
            recipient_id: notification.recipient_id,
            read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(stored.clone());
        Ok(stored)
    }

    async fn get_admin_notifications(
        &self,
        admin_id: i32,
        limit: i64,
    ) -> Result<Vec<Notification>, Error> {
        let state = self.lock();
        let mut notifications: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.recipient_id.map_or(true, |recipient| recipient == admin_id))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        notifications.truncate(limit.max(0) as usize);
        Ok(notifications)
    }

    async fn mark_notification_read(&self, notification_id: i32) -> Result<Option<Notification>, Error> {
        let mut state = self.lock();
        Ok(state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .map(|n| {
                n.read = true;
                n.clone()
            }))
    }

    async fn clear_notifications(&self, admin_id: i32) -> Result<u64, Error> {
        let mut state = self.lock();
        let before = state.notifications.len();
        state
            .notifications
            .retain(|n| n.recipient_id.map_or(false, |recipient| recipient != admin_id));
        Ok((before - state.notifications.len()) as u64)
    }
}
