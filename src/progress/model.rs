//! Progress records and the completion state machine
//!
//! A [`Progress`] record tracks one user's state for exactly one chapter or
//! lab. Every mutation is expressed as a [`ProgressChange`] so the store can
//! apply it atomically under its own lock.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{ChapterId, LabId, UserId};
use crate::error::{CoreError, CoreResult};

/// Identifier of a progress record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressId(pub u64);

impl From<ProgressId> for u64 {
    fn from(id: ProgressId) -> u64 {
        id.0
    }
}

/// What a progress record refers to: a chapter or a lab, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTarget {
    Chapter(ChapterId),
    Lab(LabId),
}

impl ProgressTarget {
    /// Build a target from the two optional ids a request carries
    ///
    /// Exactly one of them must be set.
    pub fn from_parts(chapter: Option<ChapterId>, lab: Option<LabId>) -> CoreResult<Self> {
        match (chapter, lab) {
            (Some(chapter), None) => Ok(ProgressTarget::Chapter(chapter)),
            (None, Some(lab)) => Ok(ProgressTarget::Lab(lab)),
            (Some(_), Some(_)) => {
                Err(CoreError::invalid("specify either a chapter or a lab, not both"))
            }
            (None, None) => Err(CoreError::invalid("must specify a chapter or a lab")),
        }
    }

    /// Kind of entity the target points at
    pub fn entity(&self) -> &'static str {
        match self {
            ProgressTarget::Chapter(_) => "chapter",
            ProgressTarget::Lab(_) => "lab",
        }
    }

    /// Raw id of the target entity
    pub fn raw_id(&self) -> u64 {
        match self {
            ProgressTarget::Chapter(id) => id.0,
            ProgressTarget::Lab(id) => id.0,
        }
    }
}

impl fmt::Display for ProgressTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity(), self.raw_id())
    }
}

/// Completion status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user's progress on one chapter or lab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub id: ProgressId,
    pub user_id: UserId,
    pub target: ProgressTarget,
    pub status: ProgressStatus,
    /// Set iff `status` is completed
    pub completed_at: Option<DateTime<Utc>>,
    /// Hints revealed so far (labs only), bounded by the lab's hint count
    pub hints_used: u32,
    pub time_spent_minutes: u64,
    pub last_accessed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Progress {
    /// A fresh `not_started` record
    pub fn new(id: ProgressId, user_id: UserId, target: ProgressTarget, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            target,
            status: ProgressStatus::NotStarted,
            completed_at: None,
            hints_used: 0,
            time_spent_minutes: 0,
            last_accessed_at: now,
            notes: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// Apply a change in place
    ///
    /// Returns whether the change took effect: a status transition, a
    /// revealed hint, added time or new notes. Refreshing the access time
    /// alone does not count.
    pub fn apply(&mut self, change: &ProgressChange) -> bool {
        match change {
            ProgressChange::MarkViewed { at } => {
                self.last_accessed_at = *at;
                if self.status == ProgressStatus::NotStarted {
                    self.status = ProgressStatus::InProgress;
                    true
                } else {
                    false
                }
            }
            ProgressChange::MarkComplete { at } => {
                self.status = ProgressStatus::Completed;
                self.completed_at = Some(*at);
                true
            }
            ProgressChange::AddTime { minutes, at } => {
                self.time_spent_minutes = self.time_spent_minutes.saturating_add(*minutes);
                self.last_accessed_at = *at;
                *minutes > 0
            }
            ProgressChange::RevealHint { limit } => {
                if self.hints_used < *limit {
                    self.hints_used += 1;
                    true
                } else {
                    false
                }
            }
            ProgressChange::SetNotes { notes } => {
                self.notes = notes.clone();
                true
            }
        }
    }
}

/// A mutation of a progress record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressChange {
    /// `not_started → in_progress`; refreshes the access time on every call
    MarkViewed { at: DateTime<Utc> },
    /// Any state → `completed`, re-stamping the completion time
    MarkComplete { at: DateTime<Utc> },
    /// Accumulate time spent
    AddTime { minutes: u64, at: DateTime<Utc> },
    /// Increment the hint counter if it is below `limit`
    RevealHint { limit: u32 },
    /// Replace the free-text notes
    SetNotes { notes: Option<String> },
}

impl ProgressChange {
    /// Validate a signed minute delta and build an `AddTime` change
    pub fn add_time(minutes: i64, at: DateTime<Utc>) -> CoreResult<Self> {
        let minutes = u64::try_from(minutes)
            .map_err(|_| CoreError::invalid(format!("time spent cannot be negative: {minutes}")))?;
        Ok(ProgressChange::AddTime { minutes, at })
    }
}

/// Result of applying a change in the store
#[derive(Debug, Clone)]
pub struct Applied {
    /// Record after the change
    pub progress: Progress,
    /// Whether the change took effect (see [`Progress::apply`])
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn fresh(target: ProgressTarget) -> Progress {
        Progress::new(ProgressId(1), UserId(1), target, Utc::now())
    }

    #[test]
    fn target_requires_exactly_one_id() {
        assert_eq!(
            ProgressTarget::from_parts(Some(ChapterId(1)), None).unwrap(),
            ProgressTarget::Chapter(ChapterId(1))
        );
        assert_eq!(
            ProgressTarget::from_parts(None, Some(LabId(2))).unwrap(),
            ProgressTarget::Lab(LabId(2))
        );
        assert!(matches!(
            ProgressTarget::from_parts(Some(ChapterId(1)), Some(LabId(2))),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            ProgressTarget::from_parts(None, None),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn viewing_starts_only_from_not_started() {
        let mut p = fresh(ProgressTarget::Chapter(ChapterId(1)));
        let later = p.last_accessed_at + Duration::minutes(5);

        assert!(p.apply(&ProgressChange::MarkViewed { at: later }));
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.last_accessed_at, later);

        let even_later = later + Duration::minutes(5);
        assert!(!p.apply(&ProgressChange::MarkViewed { at: even_later }));
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.last_accessed_at, even_later);
    }

    #[test]
    fn viewing_never_leaves_completed() {
        let mut p = fresh(ProgressTarget::Lab(LabId(1)));
        let now = Utc::now();
        p.apply(&ProgressChange::MarkComplete { at: now });
        assert!(!p.apply(&ProgressChange::MarkViewed { at: now }));
        assert_eq!(p.status, ProgressStatus::Completed);
        assert_eq!(p.completed_at, Some(now));
    }

    #[test]
    fn completing_twice_restamps() {
        let mut p = fresh(ProgressTarget::Lab(LabId(1)));
        let first = Utc::now();
        let second = first + Duration::seconds(30);

        assert!(p.apply(&ProgressChange::MarkComplete { at: first }));
        assert!(p.apply(&ProgressChange::MarkComplete { at: second }));
        assert_eq!(p.status, ProgressStatus::Completed);
        assert_eq!(p.completed_at, Some(second));
    }

    #[test]
    fn negative_time_is_rejected() {
        assert!(matches!(
            ProgressChange::add_time(-1, Utc::now()),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn time_accumulates() {
        let mut p = fresh(ProgressTarget::Chapter(ChapterId(1)));
        let now = Utc::now();
        p.apply(&ProgressChange::add_time(15, now).unwrap());
        p.apply(&ProgressChange::add_time(0, now).unwrap());
        p.apply(&ProgressChange::add_time(10, now).unwrap());
        assert_eq!(p.time_spent_minutes, 25);
    }

    #[test]
    fn hint_counter_stops_at_limit() {
        let mut p = fresh(ProgressTarget::Lab(LabId(1)));
        let reveal = ProgressChange::RevealHint { limit: 2 };
        assert!(p.apply(&reveal));
        assert!(p.apply(&reveal));
        assert!(!p.apply(&reveal));
        assert_eq!(p.hints_used, 2);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ProgressStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn target_serializes_tagged() {
        let json = serde_json::to_string(&ProgressTarget::Lab(LabId(9))).unwrap();
        assert_eq!(json, r#"{"lab":9}"#);
    }
}
