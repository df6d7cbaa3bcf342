//! Course-wide progress: percentages, summaries, resets and dashboard stats

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{Progress, ProgressStatus, ProgressTarget};
use crate::content::{ChapterId, CourseId, CourseOutline, LabId, UserId};
use crate::courseware::Courseware;
use crate::error::CoreResult;
use crate::store::Store;

/// Per-lab line of a course summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSummary {
    pub lab_id: LabId,
    pub title: String,
    pub status: ProgressStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub hints_used: u32,
}

/// Per-chapter line of a course summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    pub chapter_id: ChapterId,
    pub title: String,
    pub status: ProgressStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub labs: Vec<LabSummary>,
}

/// A user's progress through one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_id: CourseId,
    pub course_title: String,
    pub overall_progress: u8,
    pub chapters: Vec<ChapterSummary>,
}

/// A user's percentage for one published course
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressEntry {
    pub course_id: CourseId,
    pub title: String,
    pub slug: String,
    pub progress: u8,
}

/// Dashboard counters for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub completed_chapters: usize,
    pub completed_labs: usize,
    pub in_progress: usize,
    /// Minutes, summed over every record
    pub total_time_spent: u64,
}

/// Rounded percentage of `completed` over `total`, 0 when `total` is 0
///
/// Halves round up, so 1 of 8 is 13%.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((completed * 200 + total) / (total * 2)) as u8
}

/// A user's records keyed by target
fn index_by_target(records: Vec<Progress>) -> HashMap<ProgressTarget, Progress> {
    records.into_iter().map(|p| (p.target, p)).collect()
}

fn completed_items(outline: &CourseOutline, records: &HashMap<ProgressTarget, Progress>) -> usize {
    outline
        .targets()
        .iter()
        .filter(|target| records.get(*target).is_some_and(Progress::is_completed))
        .count()
}

impl<S: Store> Courseware<S> {
    /// Percentage of a course's chapters and labs the user has completed
    ///
    /// Recomputed from the ledger on every call.
    pub async fn course_progress(&self, user: UserId, course: CourseId) -> CoreResult<u8> {
        let outline = self.course_outline(course).await?;
        let records = index_by_target(self.store().user_progress(user).await?);
        Ok(percentage(completed_items(&outline, &records), outline.item_count()))
    }

    /// Per-item status tree for a course
    pub async fn course_summary(&self, user: UserId, course: CourseId) -> CoreResult<CourseSummary> {
        let outline = self.course_outline(course).await?;
        let records = index_by_target(self.store().user_progress(user).await?);
        let overall_progress = percentage(completed_items(&outline, &records), outline.item_count());

        let chapters = outline
            .chapters
            .iter()
            .map(|entry| {
                let chapter_progress = records.get(&ProgressTarget::Chapter(entry.chapter.id));
                let labs = entry
                    .labs
                    .iter()
                    .map(|lab| {
                        let lab_progress = records.get(&ProgressTarget::Lab(lab.id));
                        LabSummary {
                            lab_id: lab.id,
                            title: lab.title.clone(),
                            status: lab_progress.map(|p| p.status).unwrap_or_default(),
                            completed_at: lab_progress.and_then(|p| p.completed_at),
                            hints_used: lab_progress.map_or(0, |p| p.hints_used),
                        }
                    })
                    .collect();

                ChapterSummary {
                    chapter_id: entry.chapter.id,
                    title: entry.chapter.title.clone(),
                    status: chapter_progress.map(|p| p.status).unwrap_or_default(),
                    completed_at: chapter_progress.and_then(|p| p.completed_at),
                    labs,
                }
            })
            .collect();

        Ok(CourseSummary {
            course_id: outline.course.id,
            course_title: outline.course.title.clone(),
            overall_progress,
            chapters,
        })
    }

    /// Delete all of a user's records for a course's chapters and labs
    ///
    /// Either every matching record is removed or none is. Returns how many
    /// were removed.
    pub async fn reset_progress(&self, user: UserId, course: CourseId) -> CoreResult<usize> {
        let outline = self.course_outline(course).await?;
        let removed = self.store().delete_progress(user, &outline.targets()).await?;
        tracing::info!("Reset {} progress records for user {} in course {}", removed, user, course);
        Ok(removed)
    }

    /// Counters for the user's dashboard
    pub async fn stats(&self, user: UserId) -> CoreResult<DashboardStats> {
        let records = self.store().user_progress(user).await?;

        let mut stats = DashboardStats::default();
        for progress in &records {
            match (progress.status, progress.target) {
                (ProgressStatus::Completed, ProgressTarget::Chapter(_)) => {
                    stats.completed_chapters += 1
                }
                (ProgressStatus::Completed, ProgressTarget::Lab(_)) => stats.completed_labs += 1,
                (ProgressStatus::InProgress, _) => stats.in_progress += 1,
                (ProgressStatus::NotStarted, _) => {}
            }
            stats.total_time_spent += progress.time_spent_minutes;
        }
        Ok(stats)
    }

    /// The user's percentage for every published course
    pub async fn overall_progress(&self, user: UserId) -> CoreResult<Vec<CourseProgressEntry>> {
        let records = index_by_target(self.store().user_progress(user).await?);

        let mut entries = Vec::new();
        for course in self.published_courses().await? {
            let outline = self.course_outline(course.id).await?;
            entries.push(CourseProgressEntry {
                course_id: course.id,
                progress: percentage(completed_items(&outline, &records), outline.item_count()),
                title: course.title,
                slug: course.slug,
            });
        }
        Ok(entries)
    }
}
