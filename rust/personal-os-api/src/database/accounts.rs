//! SQLite implementations of the account and billing repositories.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row, params};

use super::repository::{SubscriptionRepository, SubscriptionUpsert, UserRecord, UserRepository};
use super::{Database, format_timestamp, kind_column, now, optional_timestamp_column, timestamp_column};
use crate::domain::Subscription;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, stripe_customer_id, stripe_subscription_id, \
     stripe_price_id, stripe_current_period_end, status, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        stripe_customer_id: row.get(2)?,
        stripe_subscription_id: row.get(3)?,
        stripe_price_id: row.get(4)?,
        stripe_current_period_end: optional_timestamp_column(row, 5)?,
        status: kind_column(row, 6)?,
        created_at: timestamp_column(row, 7)?,
        updated_at: timestamp_column(row, 8)?,
    })
}

#[async_trait]
impl UserRepository for Database {
    async fn insert_user(&self, user: &UserRecord) -> Result<bool> {
        let user = user.clone();
        self.call(move |conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO users (id, email, name, password_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(email) DO NOTHING",
                    params![
                        user.id,
                        user.email,
                        user.name,
                        user.password_hash,
                        format_timestamp(&user.created_at),
                    ],
                )
                .context("Failed to insert user")?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = email.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, email, name, password_hash, created_at FROM users WHERE email = ?1",
                params![email],
                user_from_row,
            )
            .optional()
            .context("Failed to look up user by email")
        })
        .await
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let id = id.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, email, name, password_hash, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
            .context("Failed to load user")
        })
        .await
    }
}

#[async_trait]
impl SubscriptionRepository for Database {
    async fn get_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?1"),
                params![user_id],
                subscription_from_row,
            )
            .optional()
            .context("Failed to load subscription")
        })
        .await
    }

    async fn upsert_subscription(&self, upsert: &SubscriptionUpsert) -> Result<Subscription> {
        let upsert = upsert.clone();
        let id = uuid::Uuid::new_v4().to_string();
        let ts = format_timestamp(&now());
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO subscriptions
                   (id, user_id, stripe_customer_id, stripe_subscription_id, stripe_price_id,
                    stripe_current_period_end, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                   stripe_subscription_id = COALESCE(excluded.stripe_subscription_id, stripe_subscription_id),
                   stripe_price_id = excluded.stripe_price_id,
                   stripe_current_period_end = excluded.stripe_current_period_end,
                   status = excluded.status,
                   updated_at = excluded.updated_at",
                params![
                    id,
                    upsert.user_id,
                    upsert.stripe_customer_id,
                    upsert.stripe_subscription_id,
                    upsert.stripe_price_id,
                    upsert.stripe_current_period_end.as_ref().map(format_timestamp),
                    upsert.status.as_str(),
                    ts,
                ],
            )
            .context("Failed to upsert subscription")?;

            conn.query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?1"),
                params![upsert.user_id],
                subscription_from_row,
            )
            .context("Failed to reload subscription")
        })
        .await
    }
}
