//! Markdown export of everything the caller has written.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use axum::{
    Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::AppState;
use crate::database::ReviewFilter;
use crate::domain::{Document, Goal, GoalStatus, Interview, Review, ReviewType};
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;

const RULE: &str = "---\n\n";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/export", get(export))
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() { "N/A" } else { value }
}

fn pretty<T: Serialize>(content: &T) -> String {
    serde_json::to_string_pretty(content).unwrap_or_default()
}

/// Render the export document. Reviews are expected newest first and keep
/// that order inside each type group.
pub fn render_markdown(
    documents: &[Document],
    goals: &[Goal],
    reviews: &[Review],
    interviews: &[Interview],
    today: NaiveDate,
) -> String {
    let mut md = String::from("# Personal OS Export\n\n");
    let _ = write!(md, "Export Date: {}\n\n{RULE}", today.format("%B %-d, %Y"));

    if !documents.is_empty() {
        md.push_str("## Documents\n\n");
        for doc in documents {
            let _ = write!(md, "### {}\n\n{}\n\n{RULE}", doc.document_type.label(), doc.content);
        }
    }

    if !goals.is_empty() {
        md.push_str("## Goals\n\n");
        for goal in goals {
            let _ = write!(md, "### {} ({})\n\n", goal.title, goal.timeframe);
            let _ = write!(md, "**Category:** {}\n\n", goal.category.as_deref().unwrap_or("N/A"));
            let _ = write!(md, "**Status:** {}\n\n", GoalStatus::label(goal.status));
            if let Some(progress) = goal.progress {
                let _ = write!(md, "**Progress:** {progress}/10\n\n");
            }
            let content = &goal.content;
            let _ = write!(md, "**What:** {}\n\n", or_na(&content.what));
            let _ = write!(md, "**Why:** {}\n\n", or_na(&content.why));
            let _ = write!(md, "**Success Looks Like:** {}\n\n", or_na(&content.success_looks_like));
            let _ = write!(md, "**First Action:** {}\n\n{RULE}", or_na(&content.first_action));
        }
    }

    if !reviews.is_empty() {
        md.push_str("## Reviews\n\n");
        let mut by_type: BTreeMap<usize, (ReviewType, Vec<&Review>)> = BTreeMap::new();
        for review in reviews {
            let order = ReviewType::ALL
                .iter()
                .position(|t| *t == review.review_type)
                .unwrap_or(usize::MAX);
            by_type
                .entry(order)
                .or_insert_with(|| (review.review_type, Vec::new()))
                .1
                .push(review);
        }
        for (kind, group) in by_type.values() {
            let _ = write!(md, "### {kind} Reviews\n\n");
            for review in group {
                let _ = write!(
                    md,
                    "#### {}\n\n{}\n\n{RULE}",
                    review.date.format("%B %-d, %Y"),
                    pretty(&review.content)
                );
            }
        }
    }

    if !interviews.is_empty() {
        md.push_str("## Interviews\n\n");
        for interview in interviews {
            let _ = write!(
                md,
                "### {}\n\nCompleted: {}\n\n{}\n\n{RULE}",
                interview.interview_type,
                interview.completed_at.format("%B %-d, %Y"),
                pretty(&interview.content)
            );
        }
    }

    md
}

async fn export(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let store = &state.store;
    let documents = store.list_documents(&user.user_id).await?;
    let goals = store.list_goals(&user.user_id, None).await?;
    let reviews = store.list_reviews(&user.user_id, ReviewFilter::default()).await?;
    let interviews = store.list_interviews(&user.user_id, None, None).await?;

    let today = chrono::Utc::now().date_naive();
    let body = render_markdown(&documents, &goals, &reviews, &interviews, today);
    tracing::info!(
        user_id = %user.user_id,
        documents = documents.len(),
        goals = goals.len(),
        reviews = reviews.len(),
        interviews = interviews.len(),
        "Export generated"
    );

    let disposition = format!(
        "attachment; filename=\"personal-os-export-{}.md\"",
        today.format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
