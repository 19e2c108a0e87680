//! Entry store: owner-scoped CRUD over reviews, goals, interviews,
//! documents and upload metadata.
//!
//! The store turns repository outcomes into the application error taxonomy.
//! Payloads are accepted as raw JSON, checked against their kind's shape
//! before any write, and decoded on every read.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::database::{
    self, Database, DocumentRepository, GoalRecord, GoalRepository, InterviewRecord,
    InterviewRepository, ReviewFilter, ReviewRecord, ReviewRepository, UploadRepository,
};
use crate::domain::templates::template_for;
use crate::domain::{
    ContentPayload, Document, DocumentType, Goal, GoalContent, GoalStatus, Interview,
    InterviewContent, InterviewType, Review, ReviewContent, ReviewType, Timeframe, Upload,
};
use crate::error::{AppError, AppResult};
use crate::logging::OpTimer;

/// Upper bound for any caller-supplied list limit.
pub const MAX_LIST_LIMIT: usize = 500;

/// Clamp a caller-supplied limit to `[1, MAX_LIST_LIMIT]`.
#[must_use]
pub fn clamp_limit(limit: Option<usize>) -> Option<usize> {
    limit.map(|l| l.clamp(1, MAX_LIST_LIMIT))
}

/// Distinguishes an absent field from an explicit `null`.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>` field.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parse a review date. Accepts `YYYY-MM-DD` or an RFC 3339 timestamp,
/// which is truncated to its calendar day.
pub fn parse_entry_date(raw: &str) -> AppResult<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.date_naive())
        .map_err(|_parse| AppError::validation(format!("Invalid date: {raw}")))
}

fn check_progress(progress: Option<u8>) -> AppResult<()> {
    match progress {
        Some(p) if !(1..=10).contains(&p) => Err(AppError::validation(format!(
            "progress must be between 1 and 10, got {p}"
        ))),
        _ => Ok(()),
    }
}

fn check_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    Ok(title.to_string())
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// New review.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    #[serde(rename = "type")]
    pub review_type: ReviewType,
    /// `YYYY-MM-DD` or RFC 3339.
    pub date: String,
    pub content: Value,
}

/// Partial review update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPatch {
    #[serde(default)]
    pub content: Option<Value>,
}

/// New goal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub timeframe: Timeframe,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub content: Value,
    #[serde(default)]
    pub status: Option<GoalStatus>,
    #[serde(default)]
    pub progress: Option<u8>,
}

/// Partial goal update. Absent fields keep their value; `null` clears the
/// optional ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub status: Option<Option<GoalStatus>>,
    #[serde(default, deserialize_with = "nullable")]
    pub progress: Option<Option<u8>>,
}

/// New interview.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInterview {
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    pub content: Value,
}

/// Search hits, each list most recent first.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub reviews: Vec<Review>,
    pub goals: Vec<Goal>,
    pub interviews: Vec<Interview>,
    pub documents: Vec<Document>,
}

/// Owner-scoped access to every entry kind.
#[derive(Debug, Clone)]
pub struct EntryStore {
    db: Database,
}

impl EntryStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ------------------------------------------------------------------
    // Reviews
    // ------------------------------------------------------------------

    /// Create a review. Conflict when the user already has one of this type
    /// on this day.
    pub async fn create_review(&self, user_id: &str, new: NewReview) -> AppResult<Review> {
        let date = parse_entry_date(&new.date)?;
        let content =
            ReviewContent::parse(new.review_type, new.content).map_err(AppError::on_write)?;
        let record = ReviewRecord {
            id: new_id(),
            user_id: user_id.to_string(),
            review_type: new.review_type,
            date,
            content: content.encode().map_err(AppError::on_write)?,
            created_at: database::now(),
        };

        if !self.db.insert_review(&record).await? {
            return Err(AppError::conflict(format!(
                "A {} review already exists for {date}",
                new.review_type
            )));
        }

        tracing::info!(
            user_id = %user_id,
            review_id = %record.id,
            kind = %new.review_type,
            date = %date,
            "Review created"
        );
        Ok(Review {
            id: record.id,
            user_id: record.user_id,
            review_type: record.review_type,
            date,
            content,
            created_at: record.created_at,
        })
    }

    pub async fn get_review(&self, user_id: &str, id: &str) -> AppResult<Review> {
        let record = self
            .db
            .get_review(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Review"))?;
        decode_review(record)
    }

    pub async fn update_review(&self, user_id: &str, id: &str, patch: ReviewPatch) -> AppResult<Review> {
        let mut review = self.get_review(user_id, id).await?;
        let Some(value) = patch.content else {
            return Ok(review);
        };

        let content = ReviewContent::parse(review.review_type, value).map_err(AppError::on_write)?;
        let encoded = content.encode().map_err(AppError::on_write)?;
        if !self.db.update_review_content(user_id, id, &encoded).await? {
            return Err(AppError::NotFound("Review"));
        }
        review.content = content;
        tracing::info!(user_id = %user_id, review_id = %id, "Review updated");
        Ok(review)
    }

    pub async fn delete_review(&self, user_id: &str, id: &str) -> AppResult<()> {
        if !self.db.delete_review(user_id, id).await? {
            return Err(AppError::NotFound("Review"));
        }
        tracing::info!(user_id = %user_id, review_id = %id, "Review deleted");
        Ok(())
    }

    /// Most recent date first.
    pub async fn list_reviews(&self, user_id: &str, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let filter = ReviewFilter {
            limit: clamp_limit(filter.limit),
            ..filter
        };
        self.db
            .list_reviews(user_id, &filter)
            .await?
            .into_iter()
            .map(decode_review)
            .collect()
    }

    // ------------------------------------------------------------------
    // Goals
    // ------------------------------------------------------------------

    pub async fn create_goal(&self, user_id: &str, new: NewGoal) -> AppResult<Goal> {
        let title = check_title(&new.title)?;
        check_progress(new.progress)?;
        let content = GoalContent::parse((), new.content).map_err(AppError::on_write)?;
        let now = database::now();
        let record = GoalRecord {
            id: new_id(),
            user_id: user_id.to_string(),
            timeframe: new.timeframe,
            title,
            category: new.category.filter(|c| !c.trim().is_empty()),
            content: content.encode().map_err(AppError::on_write)?,
            status: new.status,
            progress: new.progress,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_goal(&record).await?;

        tracing::info!(
            user_id = %user_id,
            goal_id = %record.id,
            timeframe = %record.timeframe,
            "Goal created"
        );
        Ok(goal_with_content(record, content))
    }

    pub async fn get_goal(&self, user_id: &str, id: &str) -> AppResult<Goal> {
        let record = self
            .db
            .get_goal(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Goal"))?;
        decode_goal(record)
    }

    /// Apply only the supplied fields.
    pub async fn update_goal(&self, user_id: &str, id: &str, patch: GoalPatch) -> AppResult<Goal> {
        let mut record = self
            .db
            .get_goal(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Goal"))?;

        if let Some(title) = patch.title {
            record.title = check_title(&title)?;
        }
        if let Some(category) = patch.category {
            record.category = category.filter(|c| !c.trim().is_empty());
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(progress) = patch.progress {
            check_progress(progress)?;
            record.progress = progress;
        }
        let content = match patch.content {
            Some(value) => {
                let content = GoalContent::parse((), value).map_err(AppError::on_write)?;
                record.content = content.encode().map_err(AppError::on_write)?;
                content
            }
            None => GoalContent::decode((), &record.content).map_err(AppError::on_read)?,
        };
        record.updated_at = database::now();

        if !self.db.update_goal(&record).await? {
            return Err(AppError::NotFound("Goal"));
        }
        tracing::info!(user_id = %user_id, goal_id = %id, "Goal updated");
        Ok(goal_with_content(record, content))
    }

    pub async fn delete_goal(&self, user_id: &str, id: &str) -> AppResult<()> {
        if !self.db.delete_goal(user_id, id).await? {
            return Err(AppError::NotFound("Goal"));
        }
        tracing::info!(user_id = %user_id, goal_id = %id, "Goal deleted");
        Ok(())
    }

    /// Most recently created first.
    pub async fn list_goals(&self, user_id: &str, timeframe: Option<Timeframe>) -> AppResult<Vec<Goal>> {
        self.db
            .list_goals(user_id, timeframe)
            .await?
            .into_iter()
            .map(decode_goal)
            .collect()
    }

    // ------------------------------------------------------------------
    // Interviews
    // ------------------------------------------------------------------

    /// Interviews are not unique per type; every call creates a new one.
    pub async fn create_interview(&self, user_id: &str, new: NewInterview) -> AppResult<Interview> {
        let content =
            InterviewContent::parse(new.interview_type, new.content).map_err(AppError::on_write)?;
        let record = InterviewRecord {
            id: new_id(),
            user_id: user_id.to_string(),
            interview_type: new.interview_type,
            content: content.encode().map_err(AppError::on_write)?,
            completed_at: database::now(),
        };
        self.db.insert_interview(&record).await?;

        tracing::info!(
            user_id = %user_id,
            interview_id = %record.id,
            kind = %record.interview_type,
            "Interview completed"
        );
        Ok(Interview {
            id: record.id,
            user_id: record.user_id,
            interview_type: record.interview_type,
            content,
            completed_at: record.completed_at,
        })
    }

    pub async fn get_interview(&self, user_id: &str, id: &str) -> AppResult<Interview> {
        let record = self
            .db
            .get_interview(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Interview"))?;
        decode_interview(record)
    }

    pub async fn update_interview(
        &self,
        user_id: &str,
        id: &str,
        content: Option<Value>,
    ) -> AppResult<Interview> {
        let mut interview = self.get_interview(user_id, id).await?;
        let Some(value) = content else {
            return Ok(interview);
        };

        let content =
            InterviewContent::parse(interview.interview_type, value).map_err(AppError::on_write)?;
        let encoded = content.encode().map_err(AppError::on_write)?;
        if !self.db.update_interview_content(user_id, id, &encoded).await? {
            return Err(AppError::NotFound("Interview"));
        }
        interview.content = content;
        tracing::info!(user_id = %user_id, interview_id = %id, "Interview updated");
        Ok(interview)
    }

    pub async fn delete_interview(&self, user_id: &str, id: &str) -> AppResult<()> {
        if !self.db.delete_interview(user_id, id).await? {
            return Err(AppError::NotFound("Interview"));
        }
        tracing::info!(user_id = %user_id, interview_id = %id, "Interview deleted");
        Ok(())
    }

    /// Most recently completed first.
    pub async fn list_interviews(
        &self,
        user_id: &str,
        interview_type: Option<InterviewType>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Interview>> {
        self.db
            .list_interviews(user_id, interview_type, clamp_limit(limit))
            .await?
            .into_iter()
            .map(decode_interview)
            .collect()
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Explicitly create a document. Conflict when one of this type exists.
    pub async fn create_document(
        &self,
        user_id: &str,
        document_type: DocumentType,
        content: Option<String>,
    ) -> AppResult<Document> {
        let document = Document {
            id: new_id(),
            user_id: user_id.to_string(),
            document_type,
            content: content.unwrap_or_else(|| template_for(document_type).to_string()),
            updated_at: database::now(),
        };
        if !self.db.insert_document_if_absent(&document).await? {
            return Err(AppError::conflict(format!(
                "A {} document already exists",
                document_type.label()
            )));
        }
        tracing::info!(user_id = %user_id, document_id = %document.id, kind = %document_type, "Document created");
        Ok(document)
    }

    /// Return the user's document of this type, materializing it from the
    /// template on first access.
    ///
    /// Insert-if-absent and the follow-up read make concurrent first views
    /// converge on a single row.
    pub async fn get_or_create_document(
        &self,
        user_id: &str,
        document_type: DocumentType,
    ) -> AppResult<Document> {
        if let Some(existing) = self.db.get_document_by_type(user_id, document_type).await? {
            return Ok(existing);
        }

        let timer = OpTimer::new("entry_store", "materialize_document");
        let candidate = Document {
            id: new_id(),
            user_id: user_id.to_string(),
            document_type,
            content: template_for(document_type).to_string(),
            updated_at: database::now(),
        };
        let inserted = self.db.insert_document_if_absent(&candidate).await?;
        let document = self
            .db
            .get_document_by_type(user_id, document_type)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Document {document_type} vanished after insert"))?;
        timer.finish();

        if inserted {
            tracing::info!(user_id = %user_id, document_id = %document.id, kind = %document_type, "Document materialized from template");
        }
        Ok(document)
    }

    /// Make sure the core documents exist for a new account.
    pub async fn ensure_core_documents(&self, user_id: &str) -> AppResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(DocumentType::CORE.len());
        for kind in DocumentType::CORE {
            documents.push(self.get_or_create_document(user_id, *kind).await?);
        }
        Ok(documents)
    }

    pub async fn get_document(&self, user_id: &str, id: &str) -> AppResult<Document> {
        self.db
            .get_document(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Document"))
    }

    /// Replace document content. Last write wins.
    pub async fn update_document(&self, user_id: &str, id: &str, content: String) -> AppResult<Document> {
        let updated_at = database::now();
        if !self
            .db
            .update_document_content(user_id, id, &content, updated_at)
            .await?
        {
            return Err(AppError::NotFound("Document"));
        }
        tracing::debug!(user_id = %user_id, document_id = %id, bytes = content.len(), "Document saved");
        self.get_document(user_id, id).await
    }

    pub async fn delete_document(&self, user_id: &str, id: &str) -> AppResult<()> {
        if !self.db.delete_document(user_id, id).await? {
            return Err(AppError::NotFound("Document"));
        }
        tracing::info!(user_id = %user_id, document_id = %id, "Document deleted");
        Ok(())
    }

    /// Most recently updated first.
    pub async fn list_documents(&self, user_id: &str) -> AppResult<Vec<Document>> {
        Ok(self.db.list_documents(user_id).await?)
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    pub async fn record_upload(&self, upload: &Upload) -> AppResult<()> {
        self.db.insert_upload(upload).await?;
        tracing::info!(
            user_id = %upload.user_id,
            upload_id = %upload.id,
            file_type = %upload.file_type,
            size = upload.file_size,
            "Upload recorded"
        );
        Ok(())
    }

    pub async fn get_upload(&self, user_id: &str, id: &str) -> AppResult<Upload> {
        self.db
            .get_upload(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Upload"))
    }

    pub async fn delete_upload(&self, user_id: &str, id: &str) -> AppResult<()> {
        if !self.db.delete_upload(user_id, id).await? {
            return Err(AppError::NotFound("Upload"));
        }
        Ok(())
    }

    pub async fn list_uploads(&self, user_id: &str, category: Option<&str>) -> AppResult<Vec<Upload>> {
        Ok(self.db.list_uploads(user_id, category).await?)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Case-insensitive substring search across every entry kind.
    pub async fn search(&self, user_id: &str, query: &str) -> AppResult<SearchResults> {
        let term = query.trim();
        if term.is_empty() {
            return Ok(SearchResults::default());
        }

        let reviews = self.db.search_reviews(user_id, term, 20).await?;
        let goals = self.db.search_goals(user_id, term, 20).await?;
        let interviews = self.db.search_interviews(user_id, term, 10).await?;
        let documents = self.db.search_documents(user_id, term).await?;

        Ok(SearchResults {
            reviews: reviews.into_iter().map(decode_review).collect::<AppResult<_>>()?,
            goals: goals.into_iter().map(decode_goal).collect::<AppResult<_>>()?,
            interviews: interviews
                .into_iter()
                .map(decode_interview)
                .collect::<AppResult<_>>()?,
            documents,
        })
    }
}

fn decode_review(record: ReviewRecord) -> AppResult<Review> {
    let content =
        ReviewContent::decode(record.review_type, &record.content).map_err(AppError::on_read)?;
    Ok(Review {
        id: record.id,
        user_id: record.user_id,
        review_type: record.review_type,
        date: record.date,
        content,
        created_at: record.created_at,
    })
}

fn decode_goal(record: GoalRecord) -> AppResult<Goal> {
    let content = GoalContent::decode((), &record.content).map_err(AppError::on_read)?;
    Ok(goal_with_content(record, content))
}

fn goal_with_content(record: GoalRecord, content: GoalContent) -> Goal {
    Goal {
        id: record.id,
        user_id: record.user_id,
        timeframe: record.timeframe,
        title: record.title,
        category: record.category,
        content,
        status: record.status,
        progress: record.progress,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn decode_interview(record: InterviewRecord) -> AppResult<Interview> {
    let content = InterviewContent::decode(record.interview_type, &record.content)
        .map_err(AppError::on_read)?;
    Ok(Interview {
        id: record.id,
        user_id: record.user_id,
        interview_type: record.interview_type,
        content,
        completed_at: record.completed_at,
    })
}

/// Reviews dated on or after `since`.
#[must_use]
pub fn review_window(since: NaiveDate, limit: usize) -> ReviewFilter {
    ReviewFilter {
        review_type: None,
        since: Some(since),
        limit: Some(limit),
    }
}
