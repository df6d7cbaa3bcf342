//! CTF-style flag verification and solution access

use serde::Serialize;

use super::model::ProgressTarget;
use crate::content::{LabId, Role, UserId};
use crate::courseware::Courseware;
use crate::error::CoreResult;
use crate::store::Store;

/// Outcome of a flag submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagOutcome {
    /// The lab has no flag; neither a success nor a failure
    NotApplicable,
    /// The flag matched and the lab is now completed
    Correct,
    /// The flag did not match; nothing changed
    Incorrect,
}

/// What a user may see of a lab's solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionView {
    pub lab_id: LabId,
    pub can_view: bool,
    /// Present only when `can_view` is true
    pub solution: Option<String>,
}

/// Constant-time string comparison
///
/// Runs in time dependent only on the length of the inputs.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Compare a submission against the stored flag
///
/// Returns `None` when there is no flag to check. Surrounding whitespace
/// and byte-order marks are trimmed from the submission; nothing else is
/// normalized.
pub fn matches_flag(stored: Option<&str>, submission: &str) -> Option<bool> {
    let submission = submission.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    stored.map(|flag| constant_time_compare(submission, flag))
}

impl<S: Store> Courseware<S> {
    /// Check a flag submission, completing the lab on a match
    pub async fn check_flag(
        &self,
        user: UserId,
        lab_id: LabId,
        submission: &str,
    ) -> CoreResult<FlagOutcome> {
        let lab = self.require_lab(lab_id).await?;

        match matches_flag(lab.flag.as_deref(), submission) {
            None => Ok(FlagOutcome::NotApplicable),
            Some(false) => {
                tracing::debug!("User {} submitted a wrong flag for lab {}", user, lab_id);
                Ok(FlagOutcome::Incorrect)
            }
            Some(true) => {
                self.complete(user, ProgressTarget::Lab(lab_id)).await?;
                Ok(FlagOutcome::Correct)
            }
        }
    }

    /// A lab's solution, unlocked by completing the lab or by authoring rights
    pub async fn solution(&self, user: UserId, role: Role, lab_id: LabId) -> CoreResult<SolutionView> {
        let lab = self.require_lab(lab_id).await?;
        let completed = self
            .progress_for(user, ProgressTarget::Lab(lab_id))
            .await?
            .is_some_and(|p| p.is_completed());

        let can_view = completed || role.can_edit_courses();
        Ok(SolutionView { lab_id, can_view, solution: if can_view { lab.solution } else { None } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{NewChapter, NewLab};
    use crate::error::CoreError;
    use crate::progress::ProgressStatus;
    use crate::progress::fixtures::{course_with, lab_with};
    use crate::store::LedgerStore;
    use pretty_assertions::assert_eq;

    const USER: UserId = UserId(1);

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("FLAG{abc}", "FLAG{abc}"));
        assert!(!constant_time_compare("FLAG{abc}", "FLAG{abd}"));
        assert!(!constant_time_compare("FLAG{abc}", "FLAG{ab}"));
        assert!(!constant_time_compare("", "x"));
    }

    #[test]
    fn matching_trims_but_keeps_case() {
        assert_eq!(matches_flag(Some("FLAG{abc}"), " FLAG{abc} \n"), Some(true));
        assert_eq!(matches_flag(Some("FLAG{abc}"), "flag{abc}"), Some(false));
        assert_eq!(matches_flag(None, "FLAG{abc}"), None);
    }

    #[test]
    fn byte_order_mark_from_pasted_files_is_ignored() {
        assert_eq!(matches_flag(Some("FLAG{abc}"), "\u{feff}FLAG{abc}\n"), Some(true));
        assert_eq!(matches_flag(Some("FLAG{abc}"), "FLAG{a\u{feff}bc}"), Some(false));
    }

    #[tokio::test]
    async fn correct_flag_completes_the_lab() {
        let (cw, lab) = lab_with(&[], Some("FLAG{abc}")).await;

        let outcome = cw.check_flag(USER, lab.id, " FLAG{abc} ").await.unwrap();
        assert_eq!(outcome, FlagOutcome::Correct);

        let progress = cw.progress_for(USER, ProgressTarget::Lab(lab.id)).await.unwrap().unwrap();
        assert_eq!(progress.status, ProgressStatus::Completed);
        assert!(progress.completed_at.is_some());
    }

    #[tokio::test]
    async fn wrong_case_is_rejected_without_side_effects() {
        let (cw, lab) = lab_with(&[], Some("FLAG{abc}")).await;

        let outcome = cw.check_flag(USER, lab.id, "flag{abc}").await.unwrap();
        assert_eq!(outcome, FlagOutcome::Incorrect);
        assert!(cw.store().user_progress(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_flag_leaves_existing_progress_alone() {
        let (cw, lab) = lab_with(&["h1"], Some("FLAG{abc}")).await;
        let before = cw.view(USER, ProgressTarget::Lab(lab.id)).await.unwrap();

        cw.check_flag(USER, lab.id, "nope").await.unwrap();

        let after = cw.progress_for(USER, ProgressTarget::Lab(lab.id)).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn lab_without_flag_is_not_applicable() {
        let (cw, lab) = lab_with(&[], None).await;
        let outcome = cw.check_flag(USER, lab.id, "anything").await.unwrap();
        assert_eq!(outcome, FlagOutcome::NotApplicable);
        assert!(cw.store().user_progress(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_lab_is_not_found() {
        let (cw, _) = lab_with(&[], Some("F")).await;
        let result = cw.check_flag(USER, LabId(404), "F").await;
        assert!(matches!(result, Err(CoreError::NotFound { entity: "lab", id: 404 })));
    }

    #[tokio::test]
    async fn solution_unlocks_on_completion_or_authoring_role() {
        let f = course_with(&[]).await;
        let chapter =
            f.cw.create_chapter(NewChapter::new(f.course.id, "Init arrays")).await.unwrap();
        let lab = f
            .cw
            .create_lab(NewLab::new(chapter.id, "Hijack .init_array").with_solution("patch it"))
            .await
            .unwrap();

        let locked = f.cw.solution(USER, Role::Student, lab.id).await.unwrap();
        assert!(!locked.can_view);
        assert_eq!(locked.solution, None);

        let instructor = f.cw.solution(UserId(2), Role::Instructor, lab.id).await.unwrap();
        assert_eq!(instructor.solution.as_deref(), Some("patch it"));

        f.cw.complete(USER, ProgressTarget::Lab(lab.id)).await.unwrap();
        let unlocked = f.cw.solution(USER, Role::Student, lab.id).await.unwrap();
        assert!(unlocked.can_view);
        assert_eq!(unlocked.solution.as_deref(), Some("patch it"));
    }
}
