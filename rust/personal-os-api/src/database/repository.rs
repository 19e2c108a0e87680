//! Repository traits for the relational store.
//!
//! Every lookup that takes an entity id also takes the owner id, and the SQL
//! filters on both. A row owned by someone else is therefore
//! indistinguishable from a missing row.
//!
//! Inserts that can hit a uniqueness constraint return `Ok(false)` instead
//! of an error so callers can map the outcome themselves.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    Document, DocumentType, GoalStatus, InterviewType, ReviewType, Subscription,
    SubscriptionStatus, Timeframe, Upload, User,
};

/// Review row. `content` is the encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    pub id: String,
    pub user_id: String,
    pub review_type: ReviewType,
    pub date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Goal row. `content` is the encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalRecord {
    pub id: String,
    pub user_id: String,
    pub timeframe: Timeframe,
    pub title: String,
    pub category: Option<String>,
    pub content: String,
    pub status: Option<GoalStatus>,
    pub progress: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Interview row. `content` is the encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewRecord {
    pub id: String,
    pub user_id: String,
    pub interview_type: InterviewType,
    pub content: String,
    pub completed_at: DateTime<Utc>,
}

/// Account row including the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Public view without the hash.
    #[must_use]
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
        }
    }
}

/// Review listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub review_type: Option<ReviewType>,
    /// Only reviews dated on or after this day.
    pub since: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Fields written by a subscription upsert, keyed by user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpsert {
    pub user_id: String,
    pub stripe_customer_id: String,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub stripe_current_period_end: Option<DateTime<Utc>>,
    pub status: SubscriptionStatus,
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Insert a review. `false` when (user, type, date) already exists.
    async fn insert_review(&self, review: &ReviewRecord) -> anyhow::Result<bool>;

    async fn get_review(&self, user_id: &str, id: &str) -> anyhow::Result<Option<ReviewRecord>>;

    async fn update_review_content(
        &self,
        user_id: &str,
        id: &str,
        content: &str,
    ) -> anyhow::Result<bool>;

    async fn delete_review(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;

    /// Most recent date first.
    async fn list_reviews(
        &self,
        user_id: &str,
        filter: &ReviewFilter,
    ) -> anyhow::Result<Vec<ReviewRecord>>;

    /// Case-insensitive substring match on content.
    async fn search_reviews(
        &self,
        user_id: &str,
        term: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ReviewRecord>>;
}

#[async_trait]
pub trait GoalRepository: Send + Sync {
    async fn insert_goal(&self, goal: &GoalRecord) -> anyhow::Result<()>;

    async fn get_goal(&self, user_id: &str, id: &str) -> anyhow::Result<Option<GoalRecord>>;

    /// Overwrite every mutable column of an existing goal.
    async fn update_goal(&self, goal: &GoalRecord) -> anyhow::Result<bool>;

    async fn delete_goal(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;

    /// Most recently created first.
    async fn list_goals(
        &self,
        user_id: &str,
        timeframe: Option<Timeframe>,
    ) -> anyhow::Result<Vec<GoalRecord>>;

    /// Case-insensitive substring match on title or content.
    async fn search_goals(
        &self,
        user_id: &str,
        term: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<GoalRecord>>;
}

#[async_trait]
pub trait InterviewRepository: Send + Sync {
    async fn insert_interview(&self, interview: &InterviewRecord) -> anyhow::Result<()>;

    async fn get_interview(
        &self,
        user_id: &str,
        id: &str,
    ) -> anyhow::Result<Option<InterviewRecord>>;

    async fn update_interview_content(
        &self,
        user_id: &str,
        id: &str,
        content: &str,
    ) -> anyhow::Result<bool>;

    async fn delete_interview(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;

    /// Most recently completed first.
    async fn list_interviews(
        &self,
        user_id: &str,
        interview_type: Option<InterviewType>,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<InterviewRecord>>;

    async fn search_interviews(
        &self,
        user_id: &str,
        term: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<InterviewRecord>>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert unless the user already has a document of this type.
    /// `false` when one exists; the existing row is left untouched.
    async fn insert_document_if_absent(&self, document: &Document) -> anyhow::Result<bool>;

    async fn get_document(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Document>>;

    async fn get_document_by_type(
        &self,
        user_id: &str,
        document_type: DocumentType,
    ) -> anyhow::Result<Option<Document>>;

    async fn update_document_content(
        &self,
        user_id: &str,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn delete_document(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;

    /// Most recently updated first.
    async fn list_documents(&self, user_id: &str) -> anyhow::Result<Vec<Document>>;

    async fn search_documents(&self, user_id: &str, term: &str) -> anyhow::Result<Vec<Document>>;
}

#[async_trait]
pub trait UploadRepository: Send + Sync {
    async fn insert_upload(&self, upload: &Upload) -> anyhow::Result<()>;

    async fn get_upload(&self, user_id: &str, id: &str) -> anyhow::Result<Option<Upload>>;

    async fn delete_upload(&self, user_id: &str, id: &str) -> anyhow::Result<bool>;

    /// Most recent first.
    async fn list_uploads(
        &self,
        user_id: &str,
        category: Option<&str>,
    ) -> anyhow::Result<Vec<Upload>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert an account. `false` when the email is taken.
    async fn insert_user(&self, user: &UserRecord) -> anyhow::Result<bool>;

    /// Case-insensitive email lookup.
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    async fn get_user(&self, id: &str) -> anyhow::Result<Option<UserRecord>>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn get_subscription(&self, user_id: &str) -> anyhow::Result<Option<Subscription>>;

    /// Create or update the user's mirror record.
    async fn upsert_subscription(
        &self,
        upsert: &SubscriptionUpsert,
    ) -> anyhow::Result<Subscription>;
}
