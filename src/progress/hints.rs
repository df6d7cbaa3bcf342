//! Progressive hint disclosure for labs

use serde::Serialize;

use super::model::{ProgressChange, ProgressTarget};
use crate::content::{LabId, UserId};
use crate::courseware::Courseware;
use crate::error::CoreResult;
use crate::store::Store;

/// Outcome of asking for the next hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HintReveal {
    /// A new hint was disclosed
    Revealed {
        /// 1-based number of the hint just revealed
        hint_number: u32,
        hint: String,
        has_more_hints: bool,
    },
    /// Every hint has already been revealed (or the lab has none)
    Exhausted,
}

impl<S: Store> Courseware<S> {
    /// Reveal the next hint of a lab for this user
    ///
    /// Hints are disclosed strictly in order. The per-user counter only
    /// grows and never passes the lab's hint count.
    pub async fn reveal_next_hint(&self, user: UserId, lab_id: LabId) -> CoreResult<HintReveal> {
        let lab = self.require_lab(lab_id).await?;
        if lab.hints.is_empty() {
            return Ok(HintReveal::Exhausted);
        }

        let limit = u32::try_from(lab.hints.len()).unwrap_or(u32::MAX);
        let progress = self.ensure(user, ProgressTarget::Lab(lab_id)).await?;
        let applied =
            self.store().apply_progress(progress.id, ProgressChange::RevealHint { limit }).await?;

        if !applied.changed {
            return Ok(HintReveal::Exhausted);
        }

        let hint_number = applied.progress.hints_used;
        let hint = lab.hints[(hint_number - 1) as usize].clone();
        tracing::debug!("User {} revealed hint {}/{} on lab {}", user, hint_number, limit, lab_id);

        Ok(HintReveal::Revealed { hint_number, hint, has_more_hints: hint_number < limit })
    }

    /// Hints the user has already unlocked, in order
    pub async fn revealed_hints(&self, user: UserId, lab_id: LabId) -> CoreResult<Vec<String>> {
        let lab = self.require_lab(lab_id).await?;
        let used = self
            .progress_for(user, ProgressTarget::Lab(lab_id))
            .await?
            .map_or(0, |p| p.hints_used as usize);
        Ok(lab.hints.into_iter().take(used).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::progress::fixtures::lab_with;
    use crate::store::LedgerStore;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const USER: UserId = UserId(1);

    fn revealed(hint_number: u32, hint: &str, has_more_hints: bool) -> HintReveal {
        HintReveal::Revealed { hint_number, hint: hint.to_string(), has_more_hints }
    }

    #[tokio::test]
    async fn hints_come_out_in_order_then_run_out() {
        let (cw, lab) = lab_with(&["h1", "h2", "h3"], None).await;

        assert_eq!(cw.reveal_next_hint(USER, lab.id).await.unwrap(), revealed(1, "h1", true));
        assert_eq!(cw.reveal_next_hint(USER, lab.id).await.unwrap(), revealed(2, "h2", true));
        assert_eq!(cw.reveal_next_hint(USER, lab.id).await.unwrap(), revealed(3, "h3", false));
        assert_eq!(cw.reveal_next_hint(USER, lab.id).await.unwrap(), HintReveal::Exhausted);

        let progress = cw.progress_for(USER, ProgressTarget::Lab(lab.id)).await.unwrap().unwrap();
        assert_eq!(progress.hints_used, 3);
    }

    #[tokio::test]
    async fn counters_are_per_user() {
        let (cw, lab) = lab_with(&["h1", "h2"], None).await;
        cw.reveal_next_hint(USER, lab.id).await.unwrap();
        cw.reveal_next_hint(USER, lab.id).await.unwrap();

        assert_eq!(cw.reveal_next_hint(UserId(2), lab.id).await.unwrap(), revealed(1, "h1", true));
    }

    #[tokio::test]
    async fn lab_without_hints_is_exhausted_and_untouched() {
        let (cw, lab) = lab_with(&[], None).await;
        assert_eq!(cw.reveal_next_hint(USER, lab.id).await.unwrap(), HintReveal::Exhausted);
        assert!(cw.store().user_progress(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_lab_is_not_found() {
        let (cw, _) = lab_with(&["h1"], None).await;
        let result = cw.reveal_next_hint(USER, LabId(999)).await;
        assert!(matches!(result, Err(CoreError::NotFound { entity: "lab", .. })));
    }

    #[tokio::test]
    async fn revealing_hints_does_not_change_status() {
        let (cw, lab) = lab_with(&["h1"], None).await;
        cw.reveal_next_hint(USER, lab.id).await.unwrap();
        let progress = cw.progress_for(USER, ProgressTarget::Lab(lab.id)).await.unwrap().unwrap();
        assert_eq!(progress.status, crate::progress::ProgressStatus::NotStarted);
    }

    #[tokio::test]
    async fn revealed_hints_lists_the_unlocked_prefix() {
        let (cw, lab) = lab_with(&["h1", "h2", "h3"], None).await;
        assert!(cw.revealed_hints(USER, lab.id).await.unwrap().is_empty());

        cw.reveal_next_hint(USER, lab.id).await.unwrap();
        cw.reveal_next_hint(USER, lab.id).await.unwrap();
        assert_eq!(
            cw.revealed_hints(USER, lab.id).await.unwrap(),
            vec!["h1".to_string(), "h2".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reveals_hand_out_each_hint_once() {
        let (cw, lab) = lab_with(&["h1", "h2", "h3", "h4"], None).await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cw = cw.clone();
                tokio::spawn(async move { cw.reveal_next_hint(USER, lab.id).await })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            if let HintReveal::Revealed { hint_number, .. } = handle.await.unwrap().unwrap() {
                numbers.push(hint_number);
            }
        }
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn two_processes_on_one_snapshot_share_the_hint_counter() {
        use crate::content::{NewChapter, NewCourse, NewLab};
        use crate::courseware::Courseware;
        use crate::store::LocalStore;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = Courseware::new(LocalStore::open(&path).unwrap());
        let course = first.create_course(NewCourse::new("Loader Attacks").published()).await.unwrap();
        let chapter = first.create_chapter(NewChapter::new(course.id, "GOT")).await.unwrap();
        let lab = first
            .create_lab(NewLab::new(chapter.id, "Overwrite puts").with_hints(["h1", "h2", "h3"]))
            .await
            .unwrap();

        let second = Courseware::new(LocalStore::open(&path).unwrap());

        assert_eq!(first.reveal_next_hint(USER, lab.id).await.unwrap(), revealed(1, "h1", true));
        second.complete(USER, ProgressTarget::Chapter(chapter.id)).await.unwrap();
        assert_eq!(second.reveal_next_hint(USER, lab.id).await.unwrap(), revealed(2, "h2", true));

        let reopened = Courseware::new(LocalStore::open(&path).unwrap());
        let progress =
            reopened.progress_for(USER, ProgressTarget::Lab(lab.id)).await.unwrap().unwrap();
        assert_eq!(progress.hints_used, 2);
        assert!(
            reopened.progress_for(USER, ProgressTarget::Chapter(chapter.id)).await.unwrap().is_some()
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn hint_counter_is_monotonic_and_bounded(hint_count in 0usize..6, calls in 0usize..12) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let hints: Vec<String> = (1..=hint_count).map(|i| format!("h{i}")).collect();
                let refs: Vec<&str> = hints.iter().map(String::as_str).collect();
                let (cw, lab) = lab_with(&refs, None).await;

                let mut last = 0;
                for _ in 0..calls {
                    cw.reveal_next_hint(USER, lab.id).await.unwrap();
                    let used = cw
                        .progress_for(USER, ProgressTarget::Lab(lab.id))
                        .await
                        .unwrap()
                        .map_or(0, |p| p.hints_used);
                    prop_assert!(used >= last);
                    prop_assert!(used as usize <= hint_count);
                    last = used;
                }
                prop_assert_eq!(last as usize, calls.min(hint_count));
                Ok(())
            })?;
        }
    }
}
