//! SQLite implementations of the journal repositories.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

use super::repository::{
    DocumentRepository, GoalRecord, GoalRepository, InterviewRecord, InterviewRepository,
    ReviewFilter, ReviewRecord, ReviewRepository, UploadRepository,
};
use super::{
    Database, date_column, format_date, format_timestamp, kind_column, like_pattern,
    timestamp_column,
};
use crate::domain::{Document, DocumentType, InterviewType, Timeframe, Upload};

const REVIEW_COLUMNS: &str = "id, user_id, type, date, content, created_at";
const GOAL_COLUMNS: &str =
    "id, user_id, timeframe, title, category, content, status, progress, created_at, updated_at";
const INTERVIEW_COLUMNS: &str = "id, user_id, type, content, completed_at";
const DOCUMENT_COLUMNS: &str = "id, user_id, type, content, updated_at";
const UPLOAD_COLUMNS: &str =
    "id, user_id, file_name, file_size, file_type, storage_path, category, uploaded_at";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        review_type: kind_column(row, 2)?,
        date: date_column(row, 3)?,
        content: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<GoalRecord> {
    let status: Option<String> = row.get(6)?;
    let status = status
        .map(|s| {
            s.parse()
                .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))
        })
        .transpose()?;
    let progress: Option<i64> = row.get(7)?;
    let progress = progress
        .map(|p| {
            u8::try_from(p)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Integer, Box::new(e)))
        })
        .transpose()?;

    Ok(GoalRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        timeframe: kind_column(row, 2)?,
        title: row.get(3)?,
        category: row.get(4)?,
        content: row.get(5)?,
        status,
        progress,
        created_at: timestamp_column(row, 8)?,
        updated_at: timestamp_column(row, 9)?,
    })
}

fn interview_from_row(row: &Row<'_>) -> rusqlite::Result<InterviewRecord> {
    Ok(InterviewRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        interview_type: kind_column(row, 2)?,
        content: row.get(3)?,
        completed_at: timestamp_column(row, 4)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        user_id: row.get(1)?,
        document_type: kind_column(row, 2)?,
        content: row.get(3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

fn upload_from_row(row: &Row<'_>) -> rusqlite::Result<Upload> {
    let size: i64 = row.get(3)?;
    Ok(Upload {
        id: row.get(0)?,
        user_id: row.get(1)?,
        file_name: row.get(2)?,
        file_size: u64::try_from(size)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?,
        file_type: row.get(4)?,
        storage_path: row.get(5)?,
        category: row.get(6)?,
        uploaded_at: timestamp_column(row, 7)?,
    })
}

fn limit_param(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded.
    limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1)
}

#[async_trait]
impl ReviewRepository for Database {
    async fn insert_review(&self, review: &ReviewRecord) -> Result<bool> {
        let review = review.clone();
        self.call(move |conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO reviews (id, user_id, type, date, content, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(user_id, type, date) DO NOTHING",
                    params![
                        review.id,
                        review.user_id,
                        review.review_type.as_str(),
                        format_date(review.date),
                        review.content,
                        format_timestamp(&review.created_at),
                    ],
                )
                .context("Failed to insert review")?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn get_review(&self, user_id: &str, id: &str) -> Result<Option<ReviewRecord>> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                review_from_row,
            )
            .optional()
            .context("Failed to load review")
        })
        .await
    }

    async fn update_review_content(&self, user_id: &str, id: &str, content: &str) -> Result<bool> {
        let (user_id, id, content) = (user_id.to_string(), id.to_string(), content.to_string());
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE reviews SET content = ?3 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id, content],
            )?;
            Ok(updated == 1)
        })
        .await
    }

    async fn delete_review(&self, user_id: &str, id: &str) -> Result<bool> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM reviews WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(deleted == 1)
        })
        .await
    }

    async fn list_reviews(&self, user_id: &str, filter: &ReviewFilter) -> Result<Vec<ReviewRecord>> {
        let user_id = user_id.to_string();
        let filter = *filter;
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews
                 WHERE user_id = ?1
                   AND (?2 IS NULL OR type = ?2)
                   AND (?3 IS NULL OR date >= ?3)
                 ORDER BY date DESC, created_at DESC
                 LIMIT ?4"
            ))?;
            let rows = stmt.query_map(
                params![
                    user_id,
                    filter.review_type.map(|t| t.as_str()),
                    filter.since.map(format_date),
                    limit_param(filter.limit),
                ],
                review_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list reviews")
        })
        .await
    }

    async fn search_reviews(&self, user_id: &str, term: &str, limit: usize) -> Result<Vec<ReviewRecord>> {
        let user_id = user_id.to_string();
        let pattern = like_pattern(term);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews
                 WHERE user_id = ?1 AND content LIKE ?2 ESCAPE '\\'
                 ORDER BY date DESC, created_at DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![user_id, pattern, limit_param(Some(limit))],
                review_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to search reviews")
        })
        .await
    }
}

#[async_trait]
impl GoalRepository for Database {
    async fn insert_goal(&self, goal: &GoalRecord) -> Result<()> {
        let goal = goal.clone();
        self.call(move |conn| {
            conn.execute(
                &format!("INSERT INTO goals ({GOAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    goal.id,
                    goal.user_id,
                    goal.timeframe.as_str(),
                    goal.title,
                    goal.category,
                    goal.content,
                    goal.status.map(|s| s.as_str()),
                    goal.progress,
                    format_timestamp(&goal.created_at),
                    format_timestamp(&goal.updated_at),
                ],
            )
            .context("Failed to insert goal")?;
            Ok(())
        })
        .await
    }

    async fn get_goal(&self, user_id: &str, id: &str) -> Result<Option<GoalRecord>> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                goal_from_row,
            )
            .optional()
            .context("Failed to load goal")
        })
        .await
    }

    async fn update_goal(&self, goal: &GoalRecord) -> Result<bool> {
        let goal = goal.clone();
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE goals
                 SET title = ?3, category = ?4, content = ?5, status = ?6, progress = ?7, updated_at = ?8
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    goal.id,
                    goal.user_id,
                    goal.title,
                    goal.category,
                    goal.content,
                    goal.status.map(|s| s.as_str()),
                    goal.progress,
                    format_timestamp(&goal.updated_at),
                ],
            )?;
            Ok(updated == 1)
        })
        .await
    }

    async fn delete_goal(&self, user_id: &str, id: &str) -> Result<bool> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM goals WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(deleted == 1)
        })
        .await
    }

    async fn list_goals(&self, user_id: &str, timeframe: Option<Timeframe>) -> Result<Vec<GoalRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals
                 WHERE user_id = ?1 AND (?2 IS NULL OR timeframe = ?2)
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(
                params![user_id, timeframe.map(|t| t.as_str())],
                goal_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list goals")
        })
        .await
    }

    async fn search_goals(&self, user_id: &str, term: &str, limit: usize) -> Result<Vec<GoalRecord>> {
        let user_id = user_id.to_string();
        let pattern = like_pattern(term);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals
                 WHERE user_id = ?1
                   AND (title LIKE ?2 ESCAPE '\\' OR content LIKE ?2 ESCAPE '\\')
                 ORDER BY created_at DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![user_id, pattern, limit_param(Some(limit))],
                goal_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to search goals")
        })
        .await
    }
}

#[async_trait]
impl InterviewRepository for Database {
    async fn insert_interview(&self, interview: &InterviewRecord) -> Result<()> {
        let interview = interview.clone();
        self.call(move |conn| {
            conn.execute(
                &format!("INSERT INTO interviews ({INTERVIEW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![
                    interview.id,
                    interview.user_id,
                    interview.interview_type.as_str(),
                    interview.content,
                    format_timestamp(&interview.completed_at),
                ],
            )
            .context("Failed to insert interview")?;
            Ok(())
        })
        .await
    }

    async fn get_interview(&self, user_id: &str, id: &str) -> Result<Option<InterviewRecord>> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                interview_from_row,
            )
            .optional()
            .context("Failed to load interview")
        })
        .await
    }

    async fn update_interview_content(&self, user_id: &str, id: &str, content: &str) -> Result<bool> {
        let (user_id, id, content) = (user_id.to_string(), id.to_string(), content.to_string());
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE interviews SET content = ?3 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id, content],
            )?;
            Ok(updated == 1)
        })
        .await
    }

    async fn delete_interview(&self, user_id: &str, id: &str) -> Result<bool> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM interviews WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(deleted == 1)
        })
        .await
    }

    async fn list_interviews(
        &self,
        user_id: &str,
        interview_type: Option<InterviewType>,
        limit: Option<usize>,
    ) -> Result<Vec<InterviewRecord>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INTERVIEW_COLUMNS} FROM interviews
                 WHERE user_id = ?1 AND (?2 IS NULL OR type = ?2)
                 ORDER BY completed_at DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![user_id, interview_type.map(|t| t.as_str()), limit_param(limit)],
                interview_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list interviews")
        })
        .await
    }

    async fn search_interviews(&self, user_id: &str, term: &str, limit: usize) -> Result<Vec<InterviewRecord>> {
        let user_id = user_id.to_string();
        let pattern = like_pattern(term);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INTERVIEW_COLUMNS} FROM interviews
                 WHERE user_id = ?1 AND content LIKE ?2 ESCAPE '\\'
                 ORDER BY completed_at DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![user_id, pattern, limit_param(Some(limit))],
                interview_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to search interviews")
        })
        .await
    }
}

#[async_trait]
impl DocumentRepository for Database {
    async fn insert_document_if_absent(&self, document: &Document) -> Result<bool> {
        let document = document.clone();
        self.call(move |conn| {
            let updated_at = format_timestamp(&document.updated_at);
            let inserted = conn
                .execute(
                    "INSERT INTO documents (id, user_id, type, content, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     ON CONFLICT(user_id, type) DO NOTHING",
                    params![
                        document.id,
                        document.user_id,
                        document.document_type.as_str(),
                        document.content,
                        updated_at,
                    ],
                )
                .context("Failed to insert document")?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn get_document(&self, user_id: &str, id: &str) -> Result<Option<Document>> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                document_from_row,
            )
            .optional()
            .context("Failed to load document")
        })
        .await
    }

    async fn get_document_by_type(
        &self,
        user_id: &str,
        document_type: DocumentType,
    ) -> Result<Option<Document>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ?1 AND type = ?2"),
                params![user_id, document_type.as_str()],
                document_from_row,
            )
            .optional()
            .context("Failed to load document by type")
        })
        .await
    }

    async fn update_document_content(
        &self,
        user_id: &str,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let (user_id, id, content) = (user_id.to_string(), id.to_string(), content.to_string());
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE documents SET content = ?3, updated_at = ?4 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id, content, format_timestamp(&updated_at)],
            )?;
            Ok(updated == 1)
        })
        .await
    }

    async fn delete_document(&self, user_id: &str, id: &str) -> Result<bool> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM documents WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(deleted == 1)
        })
        .await
    }

    async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ?1 ORDER BY updated_at DESC"
            ))?;
            let rows = stmt.query_map(params![user_id], document_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list documents")
        })
        .await
    }

    async fn search_documents(&self, user_id: &str, term: &str) -> Result<Vec<Document>> {
        let user_id = user_id.to_string();
        let pattern = like_pattern(term);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 WHERE user_id = ?1 AND content LIKE ?2 ESCAPE '\\'
                 ORDER BY updated_at DESC"
            ))?;
            let rows = stmt.query_map(params![user_id, pattern], document_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to search documents")
        })
        .await
    }
}

#[async_trait]
impl UploadRepository for Database {
    async fn insert_upload(&self, upload: &Upload) -> Result<()> {
        let upload = upload.clone();
        let size = i64::try_from(upload.file_size).context("File size out of range")?;
        self.call(move |conn| {
            conn.execute(
                &format!("INSERT INTO uploads ({UPLOAD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    upload.id,
                    upload.user_id,
                    upload.file_name,
                    size,
                    upload.file_type,
                    upload.storage_path,
                    upload.category,
                    format_timestamp(&upload.uploaded_at),
                ],
            )
            .context("Failed to insert upload")?;
            Ok(())
        })
        .await
    }

    async fn get_upload(&self, user_id: &str, id: &str) -> Result<Option<Upload>> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            conn.query_row(
                &format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                upload_from_row,
            )
            .optional()
            .context("Failed to load upload")
        })
        .await
    }

    async fn delete_upload(&self, user_id: &str, id: &str) -> Result<bool> {
        let (user_id, id) = (user_id.to_string(), id.to_string());
        self.call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM uploads WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(deleted == 1)
        })
        .await
    }

    async fn list_uploads(&self, user_id: &str, category: Option<&str>) -> Result<Vec<Upload>> {
        let user_id = user_id.to_string();
        let category = category.map(str::to_string);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {UPLOAD_COLUMNS} FROM uploads
                 WHERE user_id = ?1 AND (?2 IS NULL OR category = ?2)
                 ORDER BY uploaded_at DESC"
            ))?;
            let rows = stmt.query_map(params![user_id, category], upload_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list uploads")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::database::repository::{UserRecord, UserRepository};
    use crate::database::now;
    use crate::domain::ReviewType;

    async fn db_with_user(user_id: &str) -> Database {
        let db = Database::in_memory().await.unwrap();
        db.insert_user(&UserRecord {
            id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            name: None,
            password_hash: "hash".to_string(),
            created_at: now(),
        })
        .await
        .unwrap();
        db
    }

    fn review(id: &str, user_id: &str, date: &str) -> ReviewRecord {
        ReviewRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            review_type: ReviewType::Daily,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            content: r#"{"energyLevel":5}"#.to_string(),
            created_at: now(),
        }
    }

    #[tokio::test]
    async fn test_review_unique_per_day() {
        let db = db_with_user("u1").await;
        assert!(db.insert_review(&review("r1", "u1", "2025-01-02")).await.unwrap());
        assert!(!db.insert_review(&review("r2", "u1", "2025-01-02")).await.unwrap());
        assert!(db.insert_review(&review("r3", "u1", "2025-01-03")).await.unwrap());
    }

    #[tokio::test]
    async fn test_review_lookup_is_owner_scoped() {
        let db = db_with_user("u1").await;
        db.insert_review(&review("r1", "u1", "2025-01-02")).await.unwrap();

        assert!(db.get_review("u1", "r1").await.unwrap().is_some());
        assert!(db.get_review("u2", "r1").await.unwrap().is_none());
        assert!(!db.delete_review("u2", "r1").await.unwrap());
        assert!(db.delete_review("u1", "r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_reviews_newest_first_with_limit() {
        let db = db_with_user("u1").await;
        for (id, date) in [("a", "2025-01-01"), ("b", "2025-01-03"), ("c", "2025-01-02")] {
            db.insert_review(&review(id, "u1", date)).await.unwrap();
        }
        let filter = ReviewFilter {
            limit: Some(2),
            ..ReviewFilter::default()
        };
        let ids: Vec<_> = db
            .list_reviews("u1", &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_document_insert_if_absent() {
        let db = db_with_user("u1").await;
        let doc = Document {
            id: "d1".to_string(),
            user_id: "u1".to_string(),
            document_type: DocumentType::Memory,
            content: "first".to_string(),
            updated_at: now(),
        };
        assert!(db.insert_document_if_absent(&doc).await.unwrap());

        let second = Document {
            id: "d2".to_string(),
            content: "second".to_string(),
            ..doc.clone()
        };
        assert!(!db.insert_document_if_absent(&second).await.unwrap());

        let stored = db
            .get_document_by_type("u1", DocumentType::Memory)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, "d1");
        assert_eq!(stored.content, "first");
    }

    #[tokio::test]
    async fn test_search_escapes_like_wildcards() {
        let db = db_with_user("u1").await;
        let mut r = review("r1", "u1", "2025-01-02");
        r.content = r#"{"meaningfulWin":"Shipped v2"}"#.to_string();
        db.insert_review(&r).await.unwrap();

        assert_eq!(db.search_reviews("u1", "SHIPPED", 20).await.unwrap().len(), 1);
        assert!(db.search_reviews("u1", "%", 20).await.unwrap().is_empty());
    }
}
