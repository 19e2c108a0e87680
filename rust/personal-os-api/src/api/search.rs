//! Full-text search across the caller's entries.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::domain::{DocumentType, InterviewType, ReviewContent, ReviewType, Timeframe};
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;
use crate::journal::SearchResults;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/search", get(search))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// One match, tagged with the entry kind.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchHit {
    #[serde(rename_all = "camelCase")]
    Review {
        id: String,
        review_type: ReviewType,
        date: NaiveDate,
        content: ReviewContent,
    },
    #[serde(rename_all = "camelCase")]
    Goal {
        id: String,
        title: String,
        timeframe: Timeframe,
        created_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Interview {
        id: String,
        interview_type: InterviewType,
        completed_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Document {
        id: String,
        document_type: DocumentType,
        updated_at: DateTime<Utc>,
    },
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

impl From<SearchResults> for SearchResponse {
    fn from(found: SearchResults) -> Self {
        let reviews = found.reviews.into_iter().map(|r| SearchHit::Review {
            id: r.id,
            review_type: r.review_type,
            date: r.date,
            content: r.content,
        });
        let goals = found.goals.into_iter().map(|g| SearchHit::Goal {
            id: g.id,
            title: g.title,
            timeframe: g.timeframe,
            created_at: g.created_at,
        });
        let interviews = found.interviews.into_iter().map(|i| SearchHit::Interview {
            id: i.id,
            interview_type: i.interview_type,
            completed_at: i.completed_at,
        });
        let documents = found.documents.into_iter().map(|d| SearchHit::Document {
            id: d.id,
            document_type: d.document_type,
            updated_at: d.updated_at,
        });

        Self {
            results: reviews.chain(goals).chain(interviews).chain(documents).collect(),
        }
    }
}

async fn search(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let term = query.q.unwrap_or_default();
    let found = state.store.search(&user.user_id, &term).await?;
    Ok(Json(found.into()))
}
