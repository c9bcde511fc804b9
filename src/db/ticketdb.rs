// src/db/ticketdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Error, Postgres, QueryBuilder};

use super::db::DBClient;
use crate::{
    models::ticketmodel::*,
    utils::tracking_id,
};

#[async_trait]
pub trait TicketExt {
    /// Inserts the ticket, assigns its tracking ID and stores the optional
    /// attachment in a single transaction.
    async fn create_ticket(
        &self,
        ticket: NewTicket,
        attachment: Option<NewAttachment>,
    ) -> Result<(Ticket, Option<Attachment>), Error>;

    async fn get_ticket(&self, ticket_id: i32) -> Result<Option<Ticket>, Error>;

    async fn get_ticket_by_tracking_id(
        &self,
        tracking_id: &str,
        email: &str,
    ) -> Result<Option<Ticket>, Error>;

    async fn get_tickets(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), Error>;

    /// Every ticket, archived or not, created inside the optional range,
    /// newest first.
    async fn get_tickets_created_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Ticket>, Error>;

    async fn get_ticket_updates(&self, ticket_id: i32) -> Result<Vec<TicketUpdate>, Error>;

    async fn get_ticket_attachments(&self, ticket_id: i32) -> Result<Vec<Attachment>, Error>;

    /// Sets the status and appends the history row atomically.
    /// Returns `None` when the ticket does not exist.
    async fn update_ticket_status(
        &self,
        ticket_id: i32,
        status: TicketStatus,
        admin_id: i32,
        comment: String,
    ) -> Result<Option<(Ticket, TicketUpdate)>, Error>;

    async fn update_ict_details(
        &self,
        ticket_id: i32,
        ict: IctDetails,
    ) -> Result<Option<Ticket>, Error>;

    /// Archives a ticket that is not archived yet. `None` when the ticket is
    /// missing or already archived.
    async fn archive_ticket(
        &self,
        ticket_id: i32,
        archived_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, Error>;

    /// Archives the ticket only if it is still RESOLVED, unarchived and last
    /// updated at or before `resolved_before`.
    async fn archive_resolved_ticket(
        &self,
        ticket_id: i32,
        resolved_before: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    async fn restore_ticket(&self, ticket_id: i32) -> Result<Option<Ticket>, Error>;

    /// Deletes a ticket with its attachments, history and notifications and
    /// returns the removed attachments. With `archived_before` set, only a
    /// ticket archived at or before that instant is deleted.
    async fn delete_ticket(
        &self,
        ticket_id: i32,
        archived_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<Attachment>>, Error>;

    async fn get_archivable_ticket_ids(
        &self,
        resolved_before: DateTime<Utc>,
    ) -> Result<Vec<i32>, Error>;

    async fn get_purgeable_ticket_ids(
        &self,
        archived_before: DateTime<Utc>,
    ) -> Result<Vec<i32>, Error>;

    async fn count_archived_tickets(&self) -> Result<i64, Error>;

    async fn get_ticket_stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        recently_archived_since: DateTime<Utc>,
    ) -> Result<TicketStats, Error>;
}

fn push_ticket_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, filter: &'a TicketFilter) {
    builder.push(" WHERE archived = ").push_bind(filter.archived);

    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }

    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category);
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (");
        let columns = [
            "name",
            "email",
            "tracking_id",
            "subject",
            "message",
            "specific_problem",
            "document_title",
            "document_description",
        ];
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder
                .push(*column)
                .push(" ILIKE ")
                .push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

#[async_trait]
impl TicketExt for DBClient {
    async fn create_ticket(
        &self,
        ticket: NewTicket,
        attachment: Option<NewAttachment>,
    ) -> Result<(Ticket, Option<Attachment>), Error> {
        let mut tx = self.pool.begin().await?;
        let d = ticket.details;

        let (ticket_id, created_at): (i32, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO tickets (
                category, status, priority, name, email,
                department, location, location_type, school_level, school_name,
                date_of_request, type_of_equipment, model_of_equipment, serial_no, specific_problem,
                action_type, account_type, reason, position, employee_id,
                document_title, document_type, document_description,
                ta_type, subject, message, category_specific_details
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20,
                $21, $22, $23,
                $24, $25, $26, $27
            )
            RETURNING id, created_at
            "#
        )
        .bind(ticket.category)
        .bind(TicketStatus::Pending)
        .bind(ticket.priority)
        .bind(ticket.name)
        .bind(ticket.email)
        .bind(d.department)
        .bind(d.location)
        .bind(d.location_type)
        .bind(d.school_level)
        .bind(d.school_name)
        .bind(d.date_of_request)
        .bind(d.type_of_equipment)
        .bind(d.model_of_equipment)
        .bind(d.serial_no)
        .bind(d.specific_problem)
        .bind(d.action_type)
        .bind(d.account_type)
        .bind(d.reason)
        .bind(d.position)
        .bind(d.employee_id)
        .bind(d.document_title)
        .bind(d.document_type)
        .bind(d.document_description)
        .bind(d.ta_type)
        .bind(d.subject)
        .bind(d.message)
        .bind(ticket.category_specific_details)
        .fetch_one(&mut *tx)
        .await?;

        let tracking_id = tracking_id::encode(created_at.date_naive(), ticket_id);

        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET tracking_id = $1
            WHERE id = $2
            RETURNING *
            "#
        )
        .bind(tracking_id)
        .bind(ticket_id)
        .fetch_one(&mut *tx)
        .await?;

        let attachment = match attachment {
            Some(attachment) => Some(
                sqlx::query_as::<_, Attachment>(
                    r#"
                    INSERT INTO attachments (ticket_id, filename, path, mimetype)
                    VALUES ($1, $2, $3, $4)
                    RETURNING *
                    "#
                )
                .bind(ticket.id)
                .bind(attachment.filename)
                .bind(attachment.path)
                .bind(attachment.mimetype)
                .fetch_one(&mut *tx)
                .await?,
            ),
            None => None,
        };

        tx.commit().await?;

        Ok((ticket, attachment))
    }

    async fn get_ticket(&self, ticket_id: i32) -> Result<Option<Ticket>, Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE id = $1
            "#
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn get_ticket_by_tracking_id(
        &self,
        tracking_id: &str,
        email: &str,
    ) -> Result<Option<Ticket>, Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE tracking_id = $1 AND LOWER(email) = LOWER($2)
            "#
        )
        .bind(tracking_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn get_tickets(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), Error> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tickets");
        push_ticket_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut select_query = QueryBuilder::<Postgres>::new("SELECT * FROM tickets");
        push_ticket_filters(&mut select_query, filter);
        select_query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let tickets = select_query
            .build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await?;

        Ok((tickets, total))
    }

    async fn get_tickets_created_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Ticket>, Error> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
            AND ($2::timestamptz IS NULL OR created_at <= $2)
            ORDER BY created_at DESC, id DESC
            "#
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    async fn get_ticket_updates(&self, ticket_id: i32) -> Result<Vec<TicketUpdate>, Error> {
        let updates = sqlx::query_as::<_, TicketUpdate>(
            r#"
            SELECT * FROM ticket_updates
            WHERE ticket_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(updates)
    }

    async fn get_ticket_attachments(&self, ticket_id: i32) -> Result<Vec<Attachment>, Error> {
        let attachments = sqlx::query_as::<_, Attachment>(
            r#"
            SELECT * FROM attachments
            WHERE ticket_id = $1
            ORDER BY id ASC
            "#
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attachments)
    }

    async fn update_ticket_status(
        &self,
        ticket_id: i32,
        status: TicketStatus,
        admin_id: i32,
        comment: String,
    ) -> Result<Option<(Ticket, TicketUpdate)>, Error> {
        let mut tx = self.pool.begin().await?;

        let previous_status: Option<TicketStatus> = sqlx::query_scalar(
            r#"
            SELECT status FROM tickets
            WHERE id = $1
            FOR UPDATE
            "#
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(previous_status) = previous_status else {
            return Ok(None);
        };

        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#
        )
        .bind(status)
        .bind(ticket_id)
        .fetch_one(&mut *tx)
        .await?;

        let update = sqlx::query_as::<_, TicketUpdate>(
            r#"
            INSERT INTO ticket_updates (ticket_id, admin_id, previous_status, new_status, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(ticket_id)
        .bind(admin_id)
        .bind(previous_status)
        .bind(status)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some((ticket, update)))
    }

    async fn update_ict_details(
        &self,
        ticket_id: i32,
        ict: IctDetails,
    ) -> Result<Option<Ticket>, Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET ict_assigned_to = $1,
                ict_diagnosis_details = $2,
                ict_fix_details = $3,
                ict_date_fixed = $4,
                ict_recommendations = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#
        )
        .bind(ict.ict_assigned_to)
        .bind(ict.ict_diagnosis_details)
        .bind(ict.ict_fix_details)
        .bind(ict.ict_date_fixed)
        .bind(ict.ict_recommendations)
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn archive_ticket(
        &self,
        ticket_id: i32,
        archived_at: DateTime<Utc>,
    ) -> Result<Option<Ticket>, Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET archived = TRUE, archived_at = $1
            WHERE id = $2 AND archived = FALSE
            RETURNING *
            "#
        )
        .bind(archived_at)
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn archive_resolved_ticket(
        &self,
        ticket_id: i32,
        resolved_before: DateTime<Utc>,
        archived_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET archived = TRUE, archived_at = $1
            WHERE id = $2
            AND status = 'RESOLVED'
            AND archived = FALSE
            AND updated_at <= $3
            "#
        )
        .bind(archived_at)
        .bind(ticket_id)
        .bind(resolved_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn restore_ticket(&self, ticket_id: i32) -> Result<Option<Ticket>, Error> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET archived = FALSE, archived_at = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn delete_ticket(
        &self,
        ticket_id: i32,
        archived_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<Attachment>>, Error> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT id FROM tickets
            WHERE id = $1
            AND ($2::timestamptz IS NULL OR (archived = TRUE AND archived_at <= $2))
            FOR UPDATE
            "#
        )
        .bind(ticket_id)
        .bind(archived_before)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Ok(None);
        }

        let attachments = sqlx::query_as::<_, Attachment>(
            r#"
            DELETE FROM attachments
            WHERE ticket_id = $1
            RETURNING *
            "#
        )
        .bind(ticket_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM ticket_updates WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM notifications WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(attachments))
    }

    async fn get_archivable_ticket_ids(
        &self,
        resolved_before: DateTime<Utc>,
    ) -> Result<Vec<i32>, Error> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM tickets
            WHERE status = 'RESOLVED'
            AND archived = FALSE
            AND updated_at <= $1
            ORDER BY id
            "#
        )
        .bind(resolved_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn get_purgeable_ticket_ids(
        &self,
        archived_before: DateTime<Utc>,
    ) -> Result<Vec<i32>, Error> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM tickets
            WHERE archived = TRUE
            AND archived_at <= $1
            ORDER BY id
            "#
        )
        .bind(archived_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn count_archived_tickets(&self) -> Result<i64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE archived = TRUE")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn get_ticket_stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        recently_archived_since: DateTime<Utc>,
    ) -> Result<TicketStats, Error> {
        let (total, pending, in_progress, resolved, closed, archived, recently_archived): (i64, i64, i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'PENDING' AND archived = FALSE),
                    COUNT(*) FILTER (WHERE status = 'IN_PROGRESS' AND archived = FALSE),
                    COUNT(*) FILTER (WHERE status = 'RESOLVED' AND archived = FALSE),
                    COUNT(*) FILTER (WHERE status = 'CLOSED' AND archived = FALSE),
                    COUNT(*) FILTER (WHERE archived = TRUE),
                    COUNT(*) FILTER (WHERE archived = TRUE AND archived_at >= $3)
                FROM tickets
                WHERE ($1::timestamptz IS NULL OR created_at >= $1)
                AND ($2::timestamptz IS NULL OR created_at <= $2)
                "#
            )
            .bind(from)
            .bind(to)
            .bind(recently_archived_since)
            .fetch_one(&self.pool)
            .await?;

        let category_distribution = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT category::text, COUNT(*)
            FROM tickets
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
            AND ($2::timestamptz IS NULL OR created_at <= $2)
            GROUP BY category
            ORDER BY category
            "#
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let priority_distribution = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT priority::text, COUNT(*)
            FROM tickets
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
            AND ($2::timestamptz IS NULL OR created_at <= $2)
            GROUP BY priority
            ORDER BY priority
            "#
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let to_counts = |rows: Vec<(String, i64)>| {
            rows.into_iter()
                .map(|(label, count)| CountByLabel { label, count })
                .collect()
        };

        Ok(TicketStats {
            total_tickets: total,
            pending_tickets: pending,
            in_progress_tickets: in_progress,
            resolved_tickets: resolved,
            closed_tickets: closed,
            archived_tickets: archived,
            recently_archived_tickets: recently_archived,
            category_distribution: to_counts(category_distribution),
            priority_distribution: to_counts(priority_distribution),
        })
    }
}
