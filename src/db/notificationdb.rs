// src/db/notificationdb.rs
use async_trait::async_trait;
use sqlx::Error;

use super::db::DBClient;
use crate::models::notificationmodel::{NewNotification, Notification};

#[async_trait]
pub trait NotificationExt {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, Error>;

    /// Notifications addressed to the admin plus broadcasts, newest first.
    async fn get_admin_notifications(
        &self,
        admin_id: i32,
        limit: i64,
    ) -> Result<Vec<Notification>, Error>;

    async fn mark_notification_read(&self, notification_id: i32) -> Result<Option<Notification>, Error>;

    /// Removes the admin's own notifications and every broadcast.
    async fn clear_notifications(&self, admin_id: i32) -> Result<u64, Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn create_notification(&self, notification: NewNotification) -> Result<Notification, Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (title, message, type, priority, ticket_id, recipient_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.notification_type)
        .bind(notification.priority)
        .bind(notification.ticket_id)
        .bind(notification.recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn get_admin_notifications(
        &self,
        admin_id: i32,
        limit: i64,
    ) -> Result<Vec<Notification>, Error> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1 OR recipient_id IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        )
        .bind(admin_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn mark_notification_read(&self, notification_id: i32) -> Result<Option<Notification>, Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn clear_notifications(&self, admin_id: i32) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE recipient_id = $1 OR recipient_id IS NULL
            "#
        )
        .bind(admin_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
