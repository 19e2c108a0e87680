//! Dashboard aggregates: daily-review streak and goal completion ratio.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};

use super::entries::{Goal, GoalStatus};

/// Count consecutive days with at least one daily review, ending today when
/// today has one and yesterday otherwise.
///
/// `dates` may contain duplicates and need not be sorted.
#[must_use]
pub fn calculate_streak<I>(dates: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let days: HashSet<NaiveDate> = dates.into_iter().collect();
    if days.is_empty() {
        return 0;
    }

    let mut cursor = if days.contains(&today) {
        Some(today)
    } else {
        today.checked_sub_days(Days::new(1))
    };

    let mut streak = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.checked_sub_days(Days::new(1));
    }
    streak
}

/// Completed share of `total`, rounded half up to a whole percent.
/// Zero when there is nothing to measure.
#[must_use]
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    let percent = (completed * 200 + total) / (total * 2);
    u8::try_from(percent).unwrap_or(100)
}

/// Goal completion figures for a set of goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalCompletion {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl GoalCompletion {
    #[must_use]
    pub fn from_goals(goals: &[Goal]) -> Self {
        let completed = goals
            .iter()
            .filter(|g| g.status == Some(GoalStatus::Completed))
            .count();
        Self {
            completed,
            total: goals.len(),
            percent: completion_percent(completed, goals.len()),
        }
    }
}
