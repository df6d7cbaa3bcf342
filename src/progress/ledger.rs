//! Progress ledger operations: find-or-create and state transitions

use chrono::Utc;

use super::model::{Progress, ProgressChange, ProgressTarget};
use crate::content::{ChapterId, LabId, UserId};
use crate::courseware::Courseware;
use crate::error::{CoreError, CoreResult};
use crate::store::{Store, StoreError};

impl<S: Store> Courseware<S> {
    /// Return the user's record for `target`, creating a `not_started` one
    ///
    /// Safe under concurrent calls: the store's uniqueness constraint
    /// rejects a second insert and the loser returns the winner's record.
    pub async fn ensure(&self, user: UserId, target: ProgressTarget) -> CoreResult<Progress> {
        self.require_target(target).await?;

        if let Some(progress) = self.store().find_progress(user, target).await? {
            return Ok(progress);
        }
        self.insert_or_fetch(user, target).await
    }

    async fn insert_or_fetch(&self, user: UserId, target: ProgressTarget) -> CoreResult<Progress> {
        match self.store().insert_progress(user, target).await {
            Ok(progress) => {
                tracing::debug!("Created progress {} for user {} on {}", progress.id.0, user, target);
                Ok(progress)
            }
            Err(StoreError::Conflict(_)) => {
                tracing::warn!("Concurrent progress insert for user {} on {}, re-fetching", user, target);
                self.store()
                    .find_progress(user, target)
                    .await?
                    .ok_or_else(|| CoreError::not_found(target.entity(), target.raw_id()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn require_target(&self, target: ProgressTarget) -> CoreResult<()> {
        match target {
            ProgressTarget::Chapter(id) => self.require_chapter(id).await.map(|_| ()),
            ProgressTarget::Lab(id) => self.require_lab(id).await.map(|_| ()),
        }
    }

    /// `not_started → in_progress`; always refreshes the access time
    pub async fn mark_viewed(&self, progress: &Progress) -> CoreResult<Progress> {
        let applied = self
            .store()
            .apply_progress(progress.id, ProgressChange::MarkViewed { at: Utc::now() })
            .await?;
        if applied.changed {
            tracing::debug!("User {} started {}", applied.progress.user_id, applied.progress.target);
        }
        Ok(applied.progress)
    }

    /// Move to `completed` from any state, stamping the completion time
    pub async fn mark_complete(&self, progress: &Progress) -> CoreResult<Progress> {
        let applied = self
            .store()
            .apply_progress(progress.id, ProgressChange::MarkComplete { at: Utc::now() })
            .await?;
        tracing::info!("User {} completed {}", applied.progress.user_id, applied.progress.target);
        Ok(applied.progress)
    }

    /// Accumulate time spent; negative deltas are rejected before any write
    pub async fn add_time(&self, progress: &Progress, minutes: i64) -> CoreResult<Progress> {
        let change = ProgressChange::add_time(minutes, Utc::now())?;
        Ok(self.store().apply_progress(progress.id, change).await?.progress)
    }

    /// First-view handling for a chapter or lab page
    ///
    /// Creates the record if needed and starts it, so a first view always
    /// lands `in_progress`.
    pub async fn view(&self, user: UserId, target: ProgressTarget) -> CoreResult<Progress> {
        let progress = self.ensure(user, target).await?;
        self.mark_viewed(&progress).await
    }

    /// Explicit "mark complete" action
    pub async fn complete(&self, user: UserId, target: ProgressTarget) -> CoreResult<Progress> {
        let progress = self.ensure(user, target).await?;
        self.mark_complete(&progress).await
    }

    /// Add time spent on a chapter or lab
    pub async fn record_time(
        &self,
        user: UserId,
        target: ProgressTarget,
        minutes: i64,
    ) -> CoreResult<Progress> {
        // Validate up front so a bad delta never creates a record
        ProgressChange::add_time(minutes, Utc::now())?;
        let progress = self.ensure(user, target).await?;
        self.add_time(&progress, minutes).await
    }

    /// Replace the user's notes on a chapter or lab
    ///
    /// Exactly one of `chapter` and `lab` must be given. Blank notes clear
    /// the field.
    pub async fn update_notes(
        &self,
        user: UserId,
        chapter: Option<ChapterId>,
        lab: Option<LabId>,
        notes: &str,
    ) -> CoreResult<Progress> {
        let target = ProgressTarget::from_parts(chapter, lab)?;
        let progress = self.ensure(user, target).await?;
        let notes = Some(notes.trim()).filter(|n| !n.is_empty()).map(String::from);
        Ok(self.store().apply_progress(progress.id, ProgressChange::SetNotes { notes }).await?.progress)
    }

    /// The user's record for `target`, without creating one
    pub async fn progress_for(
        &self,
        user: UserId,
        target: ProgressTarget,
    ) -> CoreResult<Option<Progress>> {
        Ok(self.store().find_progress(user, target).await?)
    }

    /// Remove every record a user owns (the user was deleted)
    pub async fn delete_user(&self, user: UserId) -> CoreResult<usize> {
        let removed = self.store().delete_user_progress(user).await?;
        tracing::info!("Removed {} progress records for deleted user {}", removed, user);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressStatus;
    use crate::progress::fixtures::course_with;
    use crate::store::LedgerStore;
    use pretty_assertions::assert_eq;

    const USER: UserId = UserId(1);

    #[tokio::test]
    async fn ensure_creates_once_then_returns_existing() {
        let f = course_with(&[1]).await;
        let target = ProgressTarget::Chapter(f.chapters[0].id);

        let first = f.cw.ensure(USER, target).await.unwrap();
        assert_eq!(first.status, ProgressStatus::NotStarted);
        let second = f.cw.ensure(USER, target).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn ensure_rejects_unknown_targets() {
        let f = course_with(&[]).await;
        let result = f.cw.ensure(USER, ProgressTarget::Lab(LabId(77))).await;
        assert!(matches!(result, Err(CoreError::NotFound { entity: "lab", id: 77 })));
        assert!(f.cw.store().user_progress(USER).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ensure_never_duplicates() {
        let f = course_with(&[1]).await;
        let target = ProgressTarget::Lab(f.labs[0].id);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cw = f.cw.clone();
                tokio::spawn(async move { cw.ensure(USER, target).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(f.cw.store().user_progress(USER).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn losing_the_insert_race_returns_the_winner() {
        let f = course_with(&[1]).await;
        let target = ProgressTarget::Lab(f.labs[0].id);
        let winner = f.cw.store().insert_progress(USER, target).await.unwrap();

        let loser = f.cw.insert_or_fetch(USER, target).await.unwrap();
        assert_eq!(loser.id, winner.id);
    }

    #[tokio::test]
    async fn first_view_lands_in_progress() {
        let f = course_with(&[1]).await;
        let progress = f.cw.view(USER, ProgressTarget::Chapter(f.chapters[0].id)).await.unwrap();
        assert_eq!(progress.status, ProgressStatus::InProgress);
        assert!(progress.completed_at.is_none());
    }

    #[tokio::test]
    async fn viewing_a_completed_item_keeps_it_completed() {
        let f = course_with(&[1]).await;
        let target = ProgressTarget::Lab(f.labs[0].id);
        let done = f.cw.complete(USER, target).await.unwrap();

        let viewed = f.cw.view(USER, target).await.unwrap();
        assert_eq!(viewed.status, ProgressStatus::Completed);
        assert_eq!(viewed.completed_at, done.completed_at);
        assert!(viewed.last_accessed_at >= done.last_accessed_at);
    }

    #[tokio::test]
    async fn completing_twice_is_idempotent() {
        let f = course_with(&[1]).await;
        let target = ProgressTarget::Chapter(f.chapters[0].id);

        let first = f.cw.complete(USER, target).await.unwrap();
        let second = f.cw.complete(USER, target).await.unwrap();
        assert_eq!(first.status, ProgressStatus::Completed);
        assert_eq!(second.status, ProgressStatus::Completed);
        assert_eq!(first.id, second.id);
        assert!(second.completed_at >= first.completed_at);
    }

    #[tokio::test]
    async fn time_accumulates_and_rejects_negative_deltas() {
        let f = course_with(&[1]).await;
        let target = ProgressTarget::Lab(f.labs[0].id);

        f.cw.record_time(USER, target, 20).await.unwrap();
        let progress = f.cw.record_time(USER, target, 5).await.unwrap();
        assert_eq!(progress.time_spent_minutes, 25);

        let result = f.cw.add_time(&progress, -3).await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
        let stored = f.cw.progress_for(USER, target).await.unwrap().unwrap();
        assert_eq!(stored.time_spent_minutes, 25);
    }

    #[tokio::test]
    async fn negative_time_never_creates_a_record() {
        let f = course_with(&[1]).await;
        let result = f.cw.record_time(USER, ProgressTarget::Lab(f.labs[0].id), -1).await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
        assert!(f.cw.store().user_progress(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notes_need_exactly_one_target() {
        let f = course_with(&[1]).await;
        let both = f.cw.update_notes(USER, Some(f.chapters[0].id), Some(f.labs[0].id), "x").await;
        assert!(matches!(both, Err(CoreError::InvalidArgument(_))));
        let neither = f.cw.update_notes(USER, None, None, "x").await;
        assert!(matches!(neither, Err(CoreError::InvalidArgument(_))));

        let saved = f
            .cw
            .update_notes(USER, None, Some(f.labs[0].id), "  check LD_PRELOAD order  ")
            .await
            .unwrap();
        assert_eq!(saved.notes.as_deref(), Some("check LD_PRELOAD order"));
        assert_eq!(saved.status, ProgressStatus::NotStarted);

        let cleared = f.cw.update_notes(USER, None, Some(f.labs[0].id), "   ").await.unwrap();
        assert_eq!(cleared.notes, None);
    }

    #[tokio::test]
    async fn deleting_a_user_drops_only_their_records() {
        let f = course_with(&[1]).await;
        let target = ProgressTarget::Lab(f.labs[0].id);
        f.cw.view(USER, target).await.unwrap();
        f.cw.view(UserId(2), target).await.unwrap();

        assert_eq!(f.cw.delete_user(USER).await.unwrap(), 1);
        assert!(f.cw.progress_for(USER, target).await.unwrap().is_none());
        assert!(f.cw.progress_for(UserId(2), target).await.unwrap().is_some());
    }
}
