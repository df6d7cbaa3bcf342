//! Per-user progress: the completion state machine, hints, flags and
//! course-wide aggregates

pub mod aggregate;
pub mod flag;
pub mod hints;
pub mod ledger;
pub mod model;

#[cfg(test)]
pub(crate) mod fixtures;

pub use aggregate::{
    ChapterSummary, CourseProgressEntry, CourseSummary, DashboardStats, LabSummary, percentage,
};
pub use flag::{FlagOutcome, SolutionView, matches_flag};
pub use hints::HintReveal;
pub use model::{Applied, Progress, ProgressChange, ProgressId, ProgressStatus, ProgressTarget};
