//! Dashboard aggregates.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::database::ReviewFilter;
use crate::domain::stats::{GoalCompletion, calculate_streak};
use crate::domain::{Goal, Review, ReviewType, Timeframe};
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;
use crate::journal::parse_entry_date;

const RECENT_LIMIT: usize = 5;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/dashboard", get(dashboard))
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Caller's calendar day; defaults to the server's UTC day.
    pub today: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub streak: u32,
    pub today_has_review: bool,
    pub total_reviews: usize,
    pub recent_reviews: Vec<Review>,
    pub goal_completion_rate: u8,
    pub completed_goals: usize,
    pub total_goals: usize,
    pub active_goals: Vec<Goal>,
}

/// Fold reviews (newest first) and one-year goals into the dashboard.
pub fn summarize(reviews: Vec<Review>, goals: Vec<Goal>, today: NaiveDate) -> Dashboard {
    let daily: Vec<NaiveDate> = reviews
        .iter()
        .filter(|r| r.review_type == ReviewType::Daily)
        .map(|r| r.date)
        .collect();
    let completion = GoalCompletion::from_goals(&goals);
    let total_reviews = reviews.len();

    Dashboard {
        streak: calculate_streak(daily.iter().copied(), today),
        today_has_review: daily.contains(&today),
        total_reviews,
        recent_reviews: reviews.into_iter().take(RECENT_LIMIT).collect(),
        goal_completion_rate: completion.percent,
        completed_goals: completion.completed,
        total_goals: completion.total,
        active_goals: goals.into_iter().take(RECENT_LIMIT).collect(),
    }
}

async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<Dashboard>> {
    let today = match query.today.as_deref() {
        Some(raw) => parse_entry_date(raw)?,
        None => chrono::Utc::now().date_naive(),
    };

    let reviews = state
        .store
        .list_reviews(&user.user_id, ReviewFilter::default())
        .await?;
    let goals = state
        .store
        .list_goals(&user.user_id, Some(Timeframe::OneYear))
        .await?;
    Ok(Json(summarize(reviews, goals, today)))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{GoalStatus, ReviewContent, content};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn daily(date: &str) -> Review {
        Review {
            id: date.to_string(),
            user_id: "u1".to_string(),
            review_type: ReviewType::Daily,
            date: day(date),
            content: ReviewContent::Daily(content::fixtures::daily(7, "shipped")),
            created_at: Utc::now(),
        }
    }

    fn goal(id: &str, status: Option<GoalStatus>) -> Goal {
        Goal {
            id: id.to_string(),
            user_id: "u1".to_string(),
            timeframe: Timeframe::OneYear,
            title: id.to_string(),
            category: None,
            content: content::fixtures::goal("grow"),
            status,
            progress: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts_streak_and_completion() {
        let reviews = vec![daily("2024-03-10"), daily("2024-03-09"), daily("2024-03-07")];
        let goals = vec![
            goal("a", Some(GoalStatus::Completed)),
            goal("b", Some(GoalStatus::OnTrack)),
            goal("c", None),
        ];

        let summary = summarize(reviews, goals, day("2024-03-10"));
        assert_eq!(summary.streak, 2);
        assert!(summary.today_has_review);
        assert_eq!(summary.total_reviews, 3);
        assert_eq!(summary.completed_goals, 1);
        assert_eq!(summary.total_goals, 3);
        assert_eq!(summary.goal_completion_rate, 33);
    }

    #[test]
    fn test_recent_lists_are_capped() {
        let reviews: Vec<Review> = (1..=8).rev().map(|d| daily(&format!("2024-03-0{d}"))).collect();
        let goals: Vec<Goal> = (0..7).map(|i| goal(&i.to_string(), None)).collect();

        let summary = summarize(reviews, goals, day("2024-03-20"));
        assert_eq!(summary.recent_reviews.len(), 5);
        assert_eq!(summary.recent_reviews[0].date, day("2024-03-08"));
        assert_eq!(summary.active_goals.len(), 5);
        assert_eq!(summary.streak, 0);
        assert!(!summary.today_has_review);
        assert_eq!(summary.goal_completion_rate, 0);
    }
}
