//! The courseware service
//!
//! [`Courseware`] is the single entry point an outer request layer calls.
//! It holds an explicitly injected storage handle; there is no global
//! connection state. Operations are spread over `impl` blocks in
//! [`crate::content::hierarchy`] and the [`crate::progress`] modules.

use std::sync::Arc;

use crate::content::{Chapter, ChapterId, Course, CourseId, Lab, LabId};
use crate::error::{CoreError, CoreResult};
use crate::store::Store;

/// Course delivery core bound to a storage backend
#[derive(Debug)]
pub struct Courseware<S> {
    store: Arc<S>,
}

impl<S> Clone for Courseware<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: Store> Courseware<S> {
    /// Wrap an owned store
    pub fn new(store: S) -> Self {
        Self { store: Arc::new(store) }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) async fn require_course(&self, id: CourseId) -> CoreResult<Course> {
        self.store.course(id).await?.ok_or_else(|| CoreError::not_found("course", id))
    }

    pub(crate) async fn require_chapter(&self, id: ChapterId) -> CoreResult<Chapter> {
        self.store.chapter(id).await?.ok_or_else(|| CoreError::not_found("chapter", id))
    }

    pub(crate) async fn require_lab(&self, id: LabId) -> CoreResult<Lab> {
        self.store.lab(id).await?.ok_or_else(|| CoreError::not_found("lab", id))
    }
}
