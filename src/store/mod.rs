//! Storage abstraction for the content hierarchy and the progress ledger
//!
//! The core never touches a database directly. It is handed a [`Store`]
//! and calls through these traits, so it can run against the in-process
//! [`LocalStore`] in tests and the CLI, or any other backend that honors
//! the same contracts:
//!
//! - at most one progress record per (user, target); a duplicate insert
//!   fails with [`StoreError::Conflict`]
//! - [`LedgerStore::apply_progress`] is an atomic read-modify-write
//! - cascade and batch deletes remove everything or nothing

pub mod local;

use async_trait::async_trait;
use thiserror::Error;

use crate::content::{
    Chapter, ChapterId, Course, CourseId, Lab, LabId, NewChapter, NewCourse, NewLab, UserId,
};
use crate::progress::{Applied, Progress, ProgressChange, ProgressId, ProgressTarget};

pub use local::LocalStore;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),

    /// A record addressed by id does not exist
    #[error("{entity} {id} does not exist")]
    Missing {
        /// Kind of record
        entity: &'static str,
        /// Identifier that was addressed
        id: u64,
    },

    /// Snapshot file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for storage calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Courses, chapters and labs
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a course; fails with `Conflict` if the slug is taken
    async fn insert_course(&self, course: NewCourse, slug: String) -> StoreResult<Course>;

    async fn course(&self, id: CourseId) -> StoreResult<Option<Course>>;

    async fn course_by_slug(&self, slug: &str) -> StoreResult<Option<Course>>;

    /// All courses ordered by position, then id
    async fn courses(&self) -> StoreResult<Vec<Course>>;

    /// Replace a course; fails with `Conflict` if the new slug is taken
    async fn update_course(&self, course: Course) -> StoreResult<()>;

    /// Remove a course with its chapters, labs and their progress records
    async fn delete_course_cascade(&self, id: CourseId) -> StoreResult<()>;

    /// Insert a chapter; fails with `Conflict` if the slug is taken within the course
    async fn insert_chapter(&self, chapter: NewChapter, slug: String) -> StoreResult<Chapter>;

    async fn chapter(&self, id: ChapterId) -> StoreResult<Option<Chapter>>;

    /// Chapters of a course ordered by position, then id
    async fn chapters(&self, course: CourseId) -> StoreResult<Vec<Chapter>>;

    async fn update_chapter(&self, chapter: Chapter) -> StoreResult<()>;

    /// Remove a chapter with its labs and their progress records
    async fn delete_chapter_cascade(&self, id: ChapterId) -> StoreResult<()>;

    async fn insert_lab(&self, lab: NewLab) -> StoreResult<Lab>;

    async fn lab(&self, id: LabId) -> StoreResult<Option<Lab>>;

    /// Labs of a chapter ordered by position, then id
    async fn labs(&self, chapter: ChapterId) -> StoreResult<Vec<Lab>>;

    async fn update_lab(&self, lab: Lab) -> StoreResult<()>;

    /// Remove a lab and its progress records
    async fn delete_lab_cascade(&self, id: LabId) -> StoreResult<()>;
}

/// Per-user progress records
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_progress(
        &self,
        user: UserId,
        target: ProgressTarget,
    ) -> StoreResult<Option<Progress>>;

    /// Insert a `not_started` record; fails with `Conflict` if one exists
    async fn insert_progress(&self, user: UserId, target: ProgressTarget)
    -> StoreResult<Progress>;

    /// Atomically apply a change to an existing record
    async fn apply_progress(&self, id: ProgressId, change: ProgressChange)
    -> StoreResult<Applied>;

    /// Every record a user owns
    async fn user_progress(&self, user: UserId) -> StoreResult<Vec<Progress>>;

    /// Delete a user's records for the given targets in one step
    ///
    /// Returns how many records were removed.
    async fn delete_progress(&self, user: UserId, targets: &[ProgressTarget])
    -> StoreResult<usize>;

    /// Delete every record a user owns
    async fn delete_user_progress(&self, user: UserId) -> StoreResult<usize>;
}

/// A complete storage backend
pub trait Store: ContentStore + LedgerStore {}

impl<T: ContentStore + LedgerStore> Store for T {}
