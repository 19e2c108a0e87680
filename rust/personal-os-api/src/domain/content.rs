//! Content codec for structured entry payloads.
//!
//! Entries carry a kind-specific payload persisted as a JSON text blob. The
//! payload shape is chosen by the entry's kind (review type, interview type),
//! never guessed from the JSON itself, so each kind is validated against its
//! own struct.
//!
//! Reads and writes fail differently: text coming back from storage that no
//! longer decodes is [`ContentError::Malformed`] and fatal for that read,
//! while a client payload that does not fit its kind is
//! [`ContentError::Invalid`] and rejected before persistence.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entries::{InterviewType, ReviewType};

/// Codec failures.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// Persisted text could not be decoded.
    #[error("Malformed content: {0}")]
    Malformed(String),

    /// Client payload does not satisfy the kind's shape or ranges.
    #[error("Invalid content: {0}")]
    Invalid(String),

    /// Payload could not be serialized.
    #[error("Failed to encode content: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Encode a payload to its persisted text form.
pub fn encode<T: Serialize>(payload: &T) -> Result<String, ContentError> {
    serde_json::to_string(payload).map_err(ContentError::Encode)
}

/// Decode persisted text into a payload.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ContentError> {
    serde_json::from_str(text).map_err(|e| ContentError::Malformed(e.to_string()))
}

/// A structured payload whose shape is selected by a kind discriminant.
pub trait ContentPayload: Serialize + Sized {
    /// Discriminant that selects the payload shape.
    type Kind: Copy;

    /// Kind of this payload.
    fn kind(&self) -> Self::Kind;

    /// Deserialize a raw JSON value as the shape for `kind`.
    fn from_value(kind: Self::Kind, value: Value) -> Result<Self, serde_json::Error>;

    /// Range and presence checks beyond what the type system enforces.
    fn validate(&self) -> Result<(), ContentError> {
        Ok(())
    }

    /// Accept a client payload: shape check, then validation.
    fn parse(kind: Self::Kind, value: Value) -> Result<Self, ContentError> {
        let payload =
            Self::from_value(kind, value).map_err(|e| ContentError::Invalid(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Decode persisted text for `kind`.
    fn decode(kind: Self::Kind, text: &str) -> Result<Self, ContentError> {
        let value: Value = decode(text)?;
        Self::from_value(kind, value).map_err(|e| ContentError::Malformed(e.to_string()))
    }

    /// Encode to persisted text.
    fn encode(&self) -> Result<String, ContentError> {
        encode(self)
    }
}

fn check_rating(field: &str, value: u8) -> Result<(), ContentError> {
    if (1..=10).contains(&value) {
        Ok(())
    } else {
        Err(ContentError::Invalid(format!(
            "{field} must be between 1 and 10, got {value}"
        )))
    }
}

// ----------------------------------------------------------------------------
// Reviews
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReviewContent {
    /// 1 to 10.
    pub energy_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_notes: Option<String>,
    pub meaningful_win: String,
    pub friction_point: String,
    pub let_go_of: String,
    pub tomorrow_priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGoalProgress {
    pub goal_id: String,
    /// 1 to 10.
    pub progress: u8,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReviewContent {
    pub moved_needle: String,
    pub was_noise: String,
    pub time_leaked: String,
    pub energy_gained: String,
    pub energy_drained: String,
    pub energy_pattern: String,
    pub strategic_insight: String,
    pub proud: String,
    pub do_differently: String,
    #[serde(default)]
    pub goal_progress: Vec<WeeklyGoalProgress>,
    #[serde(default)]
    pub next_week_priorities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlyGoalProgress {
    pub goal_id: String,
    pub on_track: bool,
    #[serde(default)]
    pub notes: String,
}

/// Six-pillar life assessment, each rated 1 to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifePillarRatings {
    pub career: u8,
    pub relationships: u8,
    pub health: u8,
    pub meaning: u8,
    pub finances: u8,
    pub fun: u8,
}

impl LifePillarRatings {
    fn pillars(&self) -> [(&'static str, u8); 6] {
        [
            ("career", self.career),
            ("relationships", self.relationships),
            ("health", self.health),
            ("meaning", self.meaning),
            ("finances", self.finances),
            ("fun", self.fun),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlyReviewContent {
    #[serde(default)]
    pub biggest_wins: Vec<String>,
    #[serde(default)]
    pub biggest_challenges: Vec<String>,
    pub surprised: String,
    pub disappointed: String,
    #[serde(default)]
    pub goal_progress: Vec<QuarterlyGoalProgress>,
    pub life_pillar_ratings: LifePillarRatings,
    pub misalignments: String,
    #[serde(default)]
    pub next_quarter_priorities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipShifts {
    pub added: String,
    pub neglected: String,
    pub stronger: String,
    pub weaker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualReviewContent {
    pub year_summary: String,
    #[serde(default)]
    pub most_proud: Vec<String>,
    pub best_decision: String,
    pub worst_decision: String,
    pub energy_gained: String,
    pub energy_drained: String,
    pub surprised: String,
    pub relationships: RelationshipShifts,
    pub patterns: String,
    pub next_year_theme: String,
    #[serde(default)]
    pub next_year_goals: Vec<String>,
}

/// Review payload, one shape per [`ReviewType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReviewContent {
    Daily(DailyReviewContent),
    Weekly(WeeklyReviewContent),
    Quarterly(QuarterlyReviewContent),
    Annual(AnnualReviewContent),
}

impl ContentPayload for ReviewContent {
    type Kind = ReviewType;

    fn kind(&self) -> ReviewType {
        match self {
            Self::Daily(_) => ReviewType::Daily,
            Self::Weekly(_) => ReviewType::Weekly,
            Self::Quarterly(_) => ReviewType::Quarterly,
            Self::Annual(_) => ReviewType::Annual,
        }
    }

    fn from_value(kind: ReviewType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ReviewType::Daily => Self::Daily(serde_json::from_value(value)?),
            ReviewType::Weekly => Self::Weekly(serde_json::from_value(value)?),
            ReviewType::Quarterly => Self::Quarterly(serde_json::from_value(value)?),
            ReviewType::Annual => Self::Annual(serde_json::from_value(value)?),
        })
    }

    fn validate(&self) -> Result<(), ContentError> {
        match self {
            Self::Daily(daily) => check_rating("energyLevel", daily.energy_level),
            Self::Weekly(weekly) => weekly
                .goal_progress
                .iter()
                .try_for_each(|entry| check_rating("goalProgress.progress", entry.progress)),
            Self::Quarterly(quarterly) => quarterly
                .life_pillar_ratings
                .pillars()
                .into_iter()
                .try_for_each(|(name, rating)| {
                    check_rating(&format!("lifePillarRatings.{name}"), rating)
                }),
            Self::Annual(_) => Ok(()),
        }
    }
}

// ----------------------------------------------------------------------------
// Goals
// ----------------------------------------------------------------------------

/// Quarterly milestones toward a goal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestones {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q4: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalContent {
    /// Specific, measurable outcome.
    pub what: String,
    pub why: String,
    pub success_looks_like: String,
    /// The very next step.
    pub first_action: String,
    #[serde(default)]
    pub milestones: Milestones,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_needs_to_be_true: Option<String>,
}

impl ContentPayload for GoalContent {
    type Kind = ();

    fn kind(&self) {}

    fn from_value((): (), value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

// ----------------------------------------------------------------------------
// Interviews
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastYearReflectionContent {
    #[serde(default)]
    pub significant_moments: Vec<String>,
    pub proudest_achievements: String,
    pub biggest_challenges: String,
    pub lessons_learned: String,
    pub relationship_changes: String,
    pub energy_patterns: String,
    pub surprises: String,
    pub regrets: String,
    pub grateful_for: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityValuesContent {
    #[serde(default)]
    pub core_values: Vec<String>,
    pub identity_statement: String,
    pub non_negotiables: String,
    pub deal_breakers: String,
    pub when_at_best: String,
    pub when_at_worst: String,
    pub principles_in_action: String,
    pub values_to_develop: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureSelfContent {
    /// e.g. "5 years".
    pub time_horizon: String,
    pub vivid_vision: String,
    pub daily_life: String,
    pub relationships: String,
    pub work: String,
    pub health: String,
    pub legacy: String,
    pub values_alignment: String,
    #[serde(default)]
    pub first_steps: Vec<String>,
}

/// Interview payload, one shape per [`InterviewType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InterviewContent {
    PastYearReflection(PastYearReflectionContent),
    IdentityAndValues(IdentityValuesContent),
    FutureSelf(FutureSelfContent),
}

impl ContentPayload for InterviewContent {
    type Kind = InterviewType;

    fn kind(&self) -> InterviewType {
        match self {
            Self::PastYearReflection(_) => InterviewType::PastYearReflection,
            Self::IdentityAndValues(_) => InterviewType::IdentityAndValues,
            Self::FutureSelf(_) => InterviewType::FutureSelfInterview,
        }
    }

    fn from_value(kind: InterviewType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            InterviewType::PastYearReflection => {
                Self::PastYearReflection(serde_json::from_value(value)?)
            }
            InterviewType::IdentityAndValues => {
                Self::IdentityAndValues(serde_json::from_value(value)?)
            }
            InterviewType::FutureSelfInterview => Self::FutureSelf(serde_json::from_value(value)?),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn daily(energy_level: u8, win: &str) -> DailyReviewContent {
        DailyReviewContent {
            energy_level,
            energy_notes: None,
            meaningful_win: win.to_string(),
            friction_point: "context switching".to_string(),
            let_go_of: "inbox zero".to_string(),
            tomorrow_priority: "ship the draft".to_string(),
            notes: Some("slept well".to_string()),
        }
    }

    pub fn goal(what: &str) -> GoalContent {
        GoalContent {
            what: what.to_string(),
            why: "freedom".to_string(),
            success_looks_like: "numbers hit".to_string(),
            first_action: "write the plan".to_string(),
            milestones: Milestones {
                q1: Some("plan".to_string()),
                ..Milestones::default()
            },
            constraints: None,
            what_needs_to_be_true: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_daily_round_trip() {
        let payload = ReviewContent::Daily(fixtures::daily(7, "closed the deal"));
        let text = payload.encode().unwrap();
        let decoded = ReviewContent::decode(ReviewType::Daily, &text).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.kind(), ReviewType::Daily);
    }

    #[test]
    fn test_quarterly_round_trip() {
        let payload = ReviewContent::Quarterly(QuarterlyReviewContent {
            biggest_wins: vec!["launch".to_string()],
            biggest_challenges: vec![],
            surprised: "demand".to_string(),
            disappointed: "hiring".to_string(),
            goal_progress: vec![QuarterlyGoalProgress {
                goal_id: "g1".to_string(),
                on_track: true,
                notes: String::new(),
            }],
            life_pillar_ratings: LifePillarRatings {
                career: 8,
                relationships: 6,
                health: 5,
                meaning: 7,
                finances: 9,
                fun: 3,
            },
            misalignments: "too much travel".to_string(),
            next_quarter_priorities: vec!["rest".to_string()],
        });
        let text = payload.encode().unwrap();
        assert_eq!(
            ReviewContent::decode(ReviewType::Quarterly, &text).unwrap(),
            payload
        );
    }

    #[test]
    fn test_weekly_round_trip() {
        let payload = ReviewContent::Weekly(WeeklyReviewContent {
            moved_needle: "signed two pilots".to_string(),
            was_noise: "status meetings".to_string(),
            time_leaked: "email".to_string(),
            energy_gained: "customer calls".to_string(),
            energy_drained: "late nights".to_string(),
            energy_pattern: "mornings are best".to_string(),
            strategic_insight: "focus on one segment".to_string(),
            proud: "said no twice".to_string(),
            do_differently: "block deep work".to_string(),
            goal_progress: vec![WeeklyGoalProgress {
                goal_id: "g1".to_string(),
                progress: 6,
                notes: "behind on hiring".to_string(),
            }],
            next_week_priorities: vec!["demo".to_string(), "pricing".to_string()],
        });
        let text = payload.encode().unwrap();
        let decoded = ReviewContent::decode(ReviewType::Weekly, &text).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.kind(), ReviewType::Weekly);
    }

    #[test]
    fn test_annual_round_trip() {
        let payload = ReviewContent::Annual(AnnualReviewContent {
            year_summary: "built the foundation".to_string(),
            most_proud: vec!["first hire".to_string()],
            best_decision: "moving cities".to_string(),
            worst_decision: "the side project".to_string(),
            energy_gained: "running".to_string(),
            energy_drained: "commuting".to_string(),
            surprised: "how fast it went".to_string(),
            relationships: RelationshipShifts {
                added: "mentor".to_string(),
                neglected: "old friends".to_string(),
                stronger: "family".to_string(),
                weaker: "college group".to_string(),
            },
            patterns: "overcommitting in Q4".to_string(),
            next_year_theme: "depth".to_string(),
            next_year_goals: vec![],
        });
        let text = payload.encode().unwrap();
        assert_eq!(ReviewContent::decode(ReviewType::Annual, &text).unwrap(), payload);
    }

    #[test]
    fn test_reflection_interviews_round_trip() {
        let past = InterviewContent::PastYearReflection(PastYearReflectionContent {
            significant_moments: vec!["wedding".to_string()],
            proudest_achievements: "marathon".to_string(),
            biggest_challenges: "burnout".to_string(),
            lessons_learned: "rest is work".to_string(),
            relationship_changes: "closer to siblings".to_string(),
            energy_patterns: "winter slump".to_string(),
            surprises: "enjoyed managing".to_string(),
            regrets: "skipped the trip".to_string(),
            grateful_for: "health".to_string(),
        });
        let text = past.encode().unwrap();
        assert_eq!(
            InterviewContent::decode(InterviewType::PastYearReflection, &text).unwrap(),
            past
        );

        let identity = InterviewContent::IdentityAndValues(IdentityValuesContent {
            core_values: vec!["honesty".to_string(), "craft".to_string()],
            identity_statement: "a builder who teaches".to_string(),
            non_negotiables: "family dinners".to_string(),
            deal_breakers: "dishonesty".to_string(),
            when_at_best: "rested and focused".to_string(),
            when_at_worst: "overbooked".to_string(),
            principles_in_action: "ship small".to_string(),
            values_to_develop: "patience".to_string(),
        });
        let text = identity.encode().unwrap();
        let decoded = InterviewContent::decode(InterviewType::IdentityAndValues, &text).unwrap();
        assert_eq!(decoded, identity);
        assert_eq!(decoded.kind(), InterviewType::IdentityAndValues);
    }

    #[test]
    fn test_goal_and_interview_round_trip() {
        let goal = fixtures::goal("10 paying customers");
        assert_eq!(
            GoalContent::decode((), &goal.encode().unwrap()).unwrap(),
            goal
        );

        let interview = InterviewContent::FutureSelf(FutureSelfContent {
            time_horizon: "10 years".to_string(),
            vivid_vision: "calm".to_string(),
            daily_life: "writing".to_string(),
            relationships: "close".to_string(),
            work: "small team".to_string(),
            health: "strong".to_string(),
            legacy: "books".to_string(),
            values_alignment: "high".to_string(),
            first_steps: vec!["walk daily".to_string()],
        });
        let text = interview.encode().unwrap();
        assert_eq!(
            InterviewContent::decode(InterviewType::FutureSelfInterview, &text).unwrap(),
            interview
        );
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let err = ReviewContent::decode(ReviewType::Daily, "{not json").unwrap_err();
        assert!(matches!(err, ContentError::Malformed(_)));

        // Valid JSON but the wrong shape for the kind.
        let err = ReviewContent::decode(ReviewType::Annual, r#"{"energyLevel":3}"#).unwrap_err();
        assert!(matches!(err, ContentError::Malformed(_)));
    }

    #[test]
    fn test_parse_missing_field_is_invalid() {
        let err = ReviewContent::parse(ReviewType::Daily, json!({ "energyLevel": 5 })).unwrap_err();
        assert!(matches!(err, ContentError::Invalid(_)));
    }

    #[test]
    fn test_parse_enforces_ranges() {
        let value = serde_json::to_value(fixtures::daily(11, "x")).unwrap();
        let err = ReviewContent::parse(ReviewType::Daily, value).unwrap_err();
        assert!(err.to_string().contains("energyLevel"));

        let weekly = json!({
            "movedNeedle": "a", "wasNoise": "b", "timeLeaked": "c",
            "energyGained": "d", "energyDrained": "e", "energyPattern": "f",
            "strategicInsight": "g", "proud": "h", "doDifferently": "i",
            "goalProgress": [{ "goalId": "g1", "progress": 0, "notes": "" }],
            "nextWeekPriorities": []
        });
        assert!(ReviewContent::parse(ReviewType::Weekly, weekly).is_err());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let mut daily = fixtures::daily(4, "x");
        daily.notes = None;
        let text = encode(&daily).unwrap();
        assert!(!text.contains("notes"));
        assert!(!text.contains("energyNotes"));
    }
}
