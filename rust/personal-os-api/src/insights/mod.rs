//! Insight requester: bounded corpus assembly and forwarding to the
//! configured text generator.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::InsightsConfig;
use crate::domain::{ContentPayload, Goal, GoalStatus, Interview, Review};
use crate::error::{AppError, AppResult};
use crate::journal::EntryStore;
use crate::journal::store::review_window;
use crate::llm::{Prompt, TextGenerator};
use crate::logging::OpTimer;

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Reviews and interviews in a comprehensive corpus.
const COMPREHENSIVE_REVIEWS: usize = 30;
const COMPREHENSIVE_INTERVIEWS: usize = 5;

/// Longest review window a caller may ask for.
const MAX_WINDOW_DAYS: u32 = 3650;

const SYSTEM_PROMPT: &str = "You are an executive coach analyzing a founder's personal operating system. Your role is to:
1. Identify recurring patterns in their work, energy, and decision-making
2. Extract meaningful insights that help them improve
3. Highlight contradictions between stated goals and actual behavior
4. Suggest what should be captured in their \"memory.md\" (operating manual)

Be specific, direct, and actionable. Reference concrete examples from their data.
Format your response in markdown with clear sections.";

/// What to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Reviews,
    Goals,
    Comprehensive,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightRequest {
    #[serde(rename = "type")]
    pub kind: AnalysisKind,
    /// Review window in days.
    #[serde(default)]
    pub timeframe: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResponse {
    pub insights: String,
    pub items_analyzed: usize,
    pub model: String,
}

/// Text handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub text: String,
    /// Entries included.
    pub items: usize,
}

impl Corpus {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items == 0
    }
}

#[derive(Clone)]
pub struct InsightRequester {
    store: EntryStore,
    generator: Option<Arc<dyn TextGenerator>>,
    config: InsightsConfig,
}

impl std::fmt::Debug for InsightRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightRequester")
            .field("generator", &self.generator.as_ref().map(|g| g.provider()))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InsightRequester {
    #[must_use]
    pub fn new(
        store: EntryStore,
        generator: Option<Arc<dyn TextGenerator>>,
        config: InsightsConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Collect the caller's recent entries of `kind` into one text, never more
    /// than `max_items` entries.
    pub async fn build_corpus(
        &self,
        user_id: &str,
        kind: AnalysisKind,
        window_days: Option<u32>,
        today: NaiveDate,
    ) -> AppResult<Corpus> {
        let max_items = self.config.max_items;
        let corpus = match kind {
            AnalysisKind::Reviews => {
                let days = window_days
                    .unwrap_or(self.config.default_window_days)
                    .clamp(1, MAX_WINDOW_DAYS);
                let since = today
                    .checked_sub_days(Days::new(u64::from(days)))
                    .unwrap_or(NaiveDate::MIN);
                let reviews = self
                    .store
                    .list_reviews(user_id, review_window(since, max_items))
                    .await?;
                Corpus {
                    text: join_blocks(reviews.iter().map(review_block)),
                    items: reviews.len(),
                }
            }
            AnalysisKind::Goals => {
                let goals = self.recent_goals(user_id, max_items).await?;
                Corpus {
                    text: join_blocks(goals.iter().map(goal_block)),
                    items: goals.len(),
                }
            }
            AnalysisKind::Comprehensive => self.comprehensive(user_id, max_items).await?,
        };

        if corpus.is_empty() {
            return Err(AppError::validation("No data available for analysis"));
        }
        Ok(corpus)
    }

    /// Most recently updated goals first.
    async fn recent_goals(&self, user_id: &str, limit: usize) -> AppResult<Vec<Goal>> {
        let mut goals = self.store.list_goals(user_id, None).await?;
        goals.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        goals.truncate(limit);
        Ok(goals)
    }

    async fn comprehensive(&self, user_id: &str, max_items: usize) -> AppResult<Corpus> {
        let interview_budget = COMPREHENSIVE_INTERVIEWS.min(max_items);
        let review_budget = COMPREHENSIVE_REVIEWS.min(max_items - interview_budget);

        let reviews = if review_budget == 0 {
            Vec::new()
        } else {
            self.store
                .list_reviews(
                    user_id,
                    crate::database::ReviewFilter {
                        limit: Some(review_budget),
                        ..Default::default()
                    },
                )
                .await?
        };
        let goals = self
            .recent_goals(user_id, max_items - interview_budget - reviews.len())
            .await?;
        let interviews: Vec<Interview> = if interview_budget == 0 {
            Vec::new()
        } else {
            self.store
                .list_interviews(user_id, None, Some(interview_budget))
                .await?
        };

        let reviews_text = reviews
            .iter()
            .map(|r| format!("[{}]\n{}", r.review_type, compact(&r.content)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let goals_text = goals
            .iter()
            .map(|g| format!("[{}] {}: {}", g.timeframe, g.title, compact(&g.content)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let interviews_text = interviews
            .iter()
            .map(|i| format!("[{}]\n{}", i.interview_type, compact(&i.content)))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(Corpus {
            text: format!(
                "REVIEWS:\n{reviews_text}\n\nGOALS:\n{goals_text}\n\nINTERVIEWS:\n{interviews_text}"
            ),
            items: reviews.len() + goals.len() + interviews.len(),
        })
    }

    /// Forward a corpus with the coaching preamble and return the generated
    /// text unchanged.
    pub async fn request_insight(&self, corpus: &Corpus) -> AppResult<crate::llm::Generation> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            AppError::unavailable(
                "AI insights are not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY to enable them.",
            )
        })?;

        let prompt = Prompt::new(
            SYSTEM_PROMPT,
            format!("Analyze the following data and provide insights:\n\n{}", corpus.text),
        );
        let timer = OpTimer::new("insights", format!("generate/{}", generator.provider()));
        let result = generator.generate(&prompt).await;
        timer.finish_with_result(result.as_ref());

        result.map_err(|e| {
            tracing::warn!(error = %format!("{e:#}"), "Text generation failed");
            AppError::unavailable("Failed to generate insights. Please try again later.")
        })
    }

    /// Build the corpus for a request and forward it.
    pub async fn analyze(
        &self,
        user_id: &str,
        request: &InsightRequest,
        today: NaiveDate,
    ) -> AppResult<InsightResponse> {
        let corpus = self
            .build_corpus(user_id, request.kind, request.timeframe, today)
            .await?;
        let generation = self.request_insight(&corpus).await?;
        tracing::info!(
            user_id = %user_id,
            kind = ?request.kind,
            items = corpus.items,
            model = %generation.model,
            "Insights generated"
        );
        Ok(InsightResponse {
            insights: generation.text,
            items_analyzed: corpus.items,
            model: generation.model,
        })
    }
}

fn join_blocks(blocks: impl Iterator<Item = String>) -> String {
    blocks.collect::<Vec<_>>().join(BLOCK_SEPARATOR)
}

fn pretty<T: Serialize>(content: &T) -> String {
    serde_json::to_string_pretty(content).unwrap_or_default()
}

fn compact<T: ContentPayload>(content: &T) -> String {
    content.encode().unwrap_or_default()
}

fn review_block(review: &Review) -> String {
    format!(
        "[{} - {}]\n{}",
        review.review_type,
        review.date.format("%Y-%m-%d"),
        pretty(&review.content)
    )
}

fn goal_block(goal: &Goal) -> String {
    let progress = goal
        .progress
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    format!(
        "[{} - {}]\nStatus: {}\nProgress: {progress}/10\n{}",
        goal.timeframe,
        goal.title,
        GoalStatus::label(goal.status),
        pretty(&goal.content)
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::database::repository::{UserRecord, UserRepository};
    use crate::database::{self, Database};
    use crate::domain::content::fixtures;
    use crate::domain::{ReviewType, Timeframe};
    use crate::journal::{NewGoal, NewReview};
    use crate::llm::{Generation, Provider};

    #[derive(Default)]
    struct EchoGenerator {
        prompts: Mutex<Vec<Prompt>>,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &Prompt) -> anyhow::Result<Generation> {
            self.prompts.lock().push(prompt.clone());
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(Generation {
                text: "## Patterns\nYou ship on Tuesdays.".to_string(),
                model: "echo".to_string(),
                total_tokens: None,
            })
        }

        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    async fn seeded_store() -> EntryStore {
        let db = Database::in_memory().await.unwrap();
        db.insert_user(&UserRecord {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            name: None,
            password_hash: "hash".to_string(),
            created_at: database::now(),
        })
        .await
        .unwrap();
        EntryStore::new(db)
    }

    async fn add_daily(store: &EntryStore, date: NaiveDate, win: &str) {
        store
            .create_review(
                "u1",
                NewReview {
                    review_type: ReviewType::Daily,
                    date: date.to_string(),
                    content: serde_json::to_value(fixtures::daily(7, win)).unwrap(),
                },
            )
            .await
            .unwrap();
    }

    fn requester(store: EntryStore, generator: Option<Arc<dyn TextGenerator>>, max_items: usize) -> InsightRequester {
        InsightRequester::new(
            store,
            generator,
            InsightsConfig {
                max_items,
                default_window_days: 90,
            },
        )
    }

    #[tokio::test]
    async fn test_review_corpus_is_bounded_and_windowed() {
        let store = seeded_store().await;
        for offset in 0..8 {
            add_daily(&store, today() - Days::new(offset), &format!("win {offset}")).await;
        }
        add_daily(&store, today() - Days::new(200), "ancient").await;

        let corpus = requester(store, None, 5)
            .build_corpus("u1", AnalysisKind::Reviews, None, today())
            .await
            .unwrap();

        assert_eq!(corpus.items, 5);
        assert_eq!(corpus.text.matches(BLOCK_SEPARATOR).count(), 4);
        assert!(corpus.text.starts_with("[DAILY - 2024-06-30]\n{"));
        assert!(!corpus.text.contains("ancient"));
    }

    #[tokio::test]
    async fn test_goal_corpus_format() {
        let store = seeded_store().await;
        store
            .create_goal(
                "u1",
                NewGoal {
                    timeframe: Timeframe::OneYear,
                    title: "Launch".to_string(),
                    category: None,
                    content: serde_json::to_value(fixtures::goal("ship v1")).unwrap(),
                    status: None,
                    progress: Some(4),
                },
            )
            .await
            .unwrap();

        let corpus = requester(store, None, 50)
            .build_corpus("u1", AnalysisKind::Goals, None, today())
            .await
            .unwrap();
        assert!(corpus.text.starts_with("[ONE_YEAR - Launch]\nStatus: Not started\nProgress: 4/10\n"));
    }

    #[tokio::test]
    async fn test_comprehensive_sections() {
        let store = seeded_store().await;
        add_daily(&store, today(), "focus").await;

        let corpus = requester(store, None, 50)
            .build_corpus("u1", AnalysisKind::Comprehensive, None, today())
            .await
            .unwrap();
        assert_eq!(corpus.items, 1);
        assert!(corpus.text.starts_with("REVIEWS:\n[DAILY]\n{"));
        assert!(corpus.text.contains("\n\nGOALS:\n"));
        assert!(corpus.text.ends_with("\n\nINTERVIEWS:\n"));
    }

    #[tokio::test]
    async fn test_empty_corpus_is_validation_error() {
        let store = seeded_store().await;
        let err = requester(store, None, 50)
            .build_corpus("u1", AnalysisKind::Comprehensive, None, today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_generator_is_unavailable() {
        let store = seeded_store().await;
        add_daily(&store, today(), "focus").await;

        let err = requester(store, None, 50)
            .analyze("u1", &InsightRequest { kind: AnalysisKind::Reviews, timeframe: Some(7) }, today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_prompt_carries_preamble_and_corpus() {
        let store = seeded_store().await;
        add_daily(&store, today(), "closed the round").await;
        let generator = Arc::new(EchoGenerator::default());

        let response = requester(store, Some(generator.clone()), 50)
            .analyze("u1", &InsightRequest { kind: AnalysisKind::Reviews, timeframe: None }, today())
            .await
            .unwrap();

        assert_eq!(response.insights, "## Patterns\nYou ship on Tuesdays.");
        assert_eq!(response.items_analyzed, 1);
        let prompts = generator.prompts.lock();
        assert!(prompts[0].system.contains("executive coach"));
        assert!(prompts[0].user.starts_with("Analyze the following data and provide insights:\n\n[DAILY"));
        assert!(prompts[0].user.contains("closed the round"));
    }

    #[tokio::test]
    async fn test_generator_failure_is_unavailable() {
        let store = seeded_store().await;
        add_daily(&store, today(), "x").await;
        let generator = Arc::new(EchoGenerator {
            fail: true,
            ..EchoGenerator::default()
        });

        let err = requester(store, Some(generator), 50)
            .analyze("u1", &InsightRequest { kind: AnalysisKind::Reviews, timeframe: None }, today())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_request_deserializes() {
        let request: InsightRequest =
            serde_json::from_value(json!({ "type": "comprehensive" })).unwrap();
        assert_eq!(request.kind, AnalysisKind::Comprehensive);
        assert_eq!(request.timeframe, None);
    }
}
