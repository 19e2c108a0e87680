//! Journal entry models.
//!
//! Every entry is owned by exactly one user. Kind enums are stored as their
//! wire names (`DAILY`, `ONE_YEAR`, `on_track`, ...) so the same string is
//! used in the database, in query filters and in JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::content::{GoalContent, InterviewContent, ReviewContent};

/// Declares a closed string-backed kind enum with storage helpers.
///
/// Parsing is case-insensitive so `daily` and `DAILY` both resolve.
macro_rules! string_kind {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire and storage name.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            /// Parse an optional filter value, ignoring anything unrecognised.
            #[must_use]
            pub fn parse_filter(value: Option<&str>) -> Option<Self> {
                value.and_then(|v| v.parse().ok())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($wire) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Unknown {}: {s}", $label))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_kind! {
    /// Review cadence.
    ReviewType, "review type" {
        Daily => "DAILY",
        Weekly => "WEEKLY",
        Quarterly => "QUARTERLY",
        Annual => "ANNUAL",
    }
}

string_kind! {
    /// Goal horizon.
    Timeframe, "timeframe" {
        OneYear => "ONE_YEAR",
        ThreeYear => "THREE_YEAR",
        TenYear => "TEN_YEAR",
    }
}

string_kind! {
    /// Goal status. A goal without a status is "not started".
    GoalStatus, "goal status" {
        OnTrack => "on_track",
        OffTrack => "off_track",
        Completed => "completed",
        Abandoned => "abandoned",
    }
}

string_kind! {
    /// One-time self-reflection interview kind.
    InterviewType, "interview type" {
        PastYearReflection => "PAST_YEAR_REFLECTION",
        IdentityAndValues => "IDENTITY_AND_VALUES",
        FutureSelfInterview => "FUTURE_SELF_INTERVIEW",
    }
}

string_kind! {
    /// Long-form document kind. A user has at most one document per kind.
    DocumentType, "document type" {
        Principles => "PRINCIPLES",
        NorthStar => "NORTH_STAR",
        Memory => "MEMORY",
        FrameworkAnnualReview => "FRAMEWORK_ANNUAL_REVIEW",
        FrameworkVividVision => "FRAMEWORK_VIVID_VISION",
        FrameworkIdealLifeCosting => "FRAMEWORK_IDEAL_LIFE_COSTING",
        FrameworkLifeMap => "FRAMEWORK_LIFE_MAP",
    }
}

string_kind! {
    /// Mirror of the payment provider's subscription status.
    SubscriptionStatus, "subscription status" {
        Active => "active",
        Trialing => "trialing",
        PastDue => "past_due",
        Canceled => "canceled",
        Incomplete => "incomplete",
        IncompleteExpired => "incomplete_expired",
        Unpaid => "unpaid",
        Paused => "paused",
    }
}

/// Suggested goal categories. Category is free text; these are the presets.
pub const GOAL_CATEGORIES: &[&str] = &[
    "Business",
    "Personal",
    "Health",
    "Relationships",
    "Finances",
    "Learning",
    "Other",
];

impl GoalStatus {
    /// Human label, "Not started" when unset.
    #[must_use]
    pub fn label(status: Option<Self>) -> &'static str {
        match status {
            None => "Not started",
            Some(Self::OnTrack) => "On Track",
            Some(Self::OffTrack) => "Off Track",
            Some(Self::Completed) => "Completed",
            Some(Self::Abandoned) => "Abandoned",
        }
    }
}

impl InterviewType {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::PastYearReflection => "Past Year Reflection",
            Self::IdentityAndValues => "Identity & Values",
            Self::FutureSelfInterview => "Future Self Interview",
        }
    }
}

impl DocumentType {
    /// Documents every account starts with.
    pub const CORE: &'static [Self] = &[Self::Principles, Self::NorthStar, Self::Memory];

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Principles => "Principles",
            Self::NorthStar => "North Star",
            Self::Memory => "Memory",
            Self::FrameworkAnnualReview => "Annual Review Framework",
            Self::FrameworkVividVision => "Vivid Vision",
            Self::FrameworkIdealLifeCosting => "Ideal Life Costing",
            Self::FrameworkLifeMap => "Life Map",
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Principles => "Core operating principles that shape your system",
            Self::NorthStar => "What you're optimizing for - your decision filter",
            Self::Memory => "Patterns you've learned about yourself",
            Self::FrameworkAnnualReview => "Dr. Anthony Gustin's structured yearly reflection",
            Self::FrameworkVividVision => "Tony Robbins-style future visualization",
            Self::FrameworkIdealLifeCosting => "Tim Ferriss's lifestyle budgeting",
            Self::FrameworkLifeMap => "Alex Lieberman's 6-pillar life assessment",
        }
    }

    #[must_use]
    pub fn is_framework(&self) -> bool {
        !Self::CORE.contains(self)
    }
}

impl SubscriptionStatus {
    /// Whether the subscription currently grants access.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// A dated review. Unique per (user, type, date).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub review_type: ReviewType,
    /// Calendar day, time-of-day stripped.
    pub date: NaiveDate,
    pub content: ReviewContent,
    pub created_at: DateTime<Utc>,
}

/// A goal on one of the three horizons.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub timeframe: Timeframe,
    pub title: String,
    pub category: Option<String>,
    pub content: GoalContent,
    pub status: Option<GoalStatus>,
    /// Self-assessed progress, 1 to 10.
    pub progress: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A completed self-reflection interview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub interview_type: InterviewType,
    pub content: InterviewContent,
    pub completed_at: DateTime<Utc>,
}

/// A freeform markdown document. Unique per (user, type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// Metadata for a file held by object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub storage_path: String,
    pub category: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Local mirror of a payment-provider subscription, one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub stripe_customer_id: String,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub stripe_current_period_end: Option<DateTime<Utc>>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registered account. The password hash never leaves the database layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        assert_eq!("daily".parse::<ReviewType>(), Ok(ReviewType::Daily));
        assert_eq!("North_Star".parse::<DocumentType>(), Ok(DocumentType::NorthStar));
        assert_eq!("ON_TRACK".parse::<GoalStatus>(), Ok(GoalStatus::OnTrack));
        assert!("MONTHLY".parse::<ReviewType>().is_err());
    }

    #[test]
    fn test_unknown_filter_is_ignored() {
        assert_eq!(Timeframe::parse_filter(Some("FIVE_YEAR")), None);
        assert_eq!(Timeframe::parse_filter(None), None);
        assert_eq!(
            Timeframe::parse_filter(Some("TEN_YEAR")),
            Some(Timeframe::TenYear)
        );
    }

    #[test]
    fn test_wire_names_match_serde() {
        for kind in DocumentType::ALL {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(
            serde_json::to_string(&GoalStatus::OffTrack).unwrap(),
            "\"off_track\""
        );
    }

    #[test]
    fn test_document_catalogue() {
        assert_eq!(DocumentType::ALL.len(), 7);
        assert!(!DocumentType::Memory.is_framework());
        assert!(DocumentType::FrameworkLifeMap.is_framework());
        assert_eq!(DocumentType::NorthStar.label(), "North Star");
    }

    #[test]
    fn test_goal_status_label() {
        assert_eq!(GoalStatus::label(None), "Not started");
        assert_eq!(GoalStatus::label(Some(GoalStatus::Completed)), "Completed");
    }
}
