//! Authoring and navigation over the Course → Chapter → Lab tree

use serde::Serialize;

use super::model::{
    Chapter, ChapterId, Course, CourseId, Lab, LabId, Neighbors, NewChapter, NewCourse, NewLab,
    Role,
};
use super::slug::slugify;
use crate::courseware::Courseware;
use crate::error::{CoreError, CoreResult};
use crate::progress::ProgressTarget;
use crate::store::{Store, StoreError};

/// Separator between hints in authoring input
const HINT_SEPARATOR: &str = "\n---\n";

/// Course title length bounds, in characters
const COURSE_TITLE_LEN: std::ops::RangeInclusive<usize> = 3..=255;

/// Split authoring input into an ordered hint list
///
/// Hints are separated by a line containing only `---`. Blank entries are
/// dropped and each hint is trimmed.
pub fn parse_hints(raw: &str) -> Vec<String> {
    raw.replace("\r\n", "\n")
        .split(HINT_SEPARATOR)
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .map(String::from)
        .collect()
}

/// A chapter with its labs, both in position order
#[derive(Debug, Clone, Serialize)]
pub struct ChapterOutline {
    pub chapter: Chapter,
    pub labs: Vec<Lab>,
}

/// A course with its full ordered tree
#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
    pub course: Course,
    pub chapters: Vec<ChapterOutline>,
}

impl CourseOutline {
    /// Number of trackable items: every chapter plus every lab
    pub fn item_count(&self) -> usize {
        self.chapters.iter().map(|c| 1 + c.labs.len()).sum()
    }

    /// Progress targets for every chapter and lab, chapter first
    pub fn targets(&self) -> Vec<ProgressTarget> {
        self.chapters
            .iter()
            .flat_map(|outline| {
                std::iter::once(ProgressTarget::Chapter(outline.chapter.id))
                    .chain(outline.labs.iter().map(|lab| ProgressTarget::Lab(lab.id)))
            })
            .collect()
    }
}

fn derive_slug(title: &str) -> CoreResult<String> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(CoreError::invalid(format!("title '{title}' does not produce a usable slug")));
    }
    Ok(slug)
}

fn validate_course_title(title: &str) -> CoreResult<()> {
    let len = title.trim().chars().count();
    if !COURSE_TITLE_LEN.contains(&len) {
        return Err(CoreError::invalid(format!(
            "course title must be {} to {} characters",
            COURSE_TITLE_LEN.start(),
            COURSE_TITLE_LEN.end()
        )));
    }
    Ok(())
}

fn require_title(title: &str, entity: &str) -> CoreResult<()> {
    if title.trim().is_empty() {
        return Err(CoreError::invalid(format!("{entity} title cannot be empty")));
    }
    Ok(())
}

/// Slug collisions are the caller's fault, not a storage failure
fn slug_conflict(err: StoreError) -> CoreError {
    match err {
        StoreError::Conflict(message) => CoreError::InvalidArgument(message),
        other => other.into(),
    }
}

impl<S: Store> Courseware<S> {
    /// Create a course, deriving its slug from the title
    pub async fn create_course(&self, new: NewCourse) -> CoreResult<Course> {
        validate_course_title(&new.title)?;
        let slug = derive_slug(&new.title)?;
        let course = self.store().insert_course(new, slug).await.map_err(slug_conflict)?;
        tracing::info!("Created course {} '{}'", course.id, course.slug);
        Ok(course)
    }

    /// Change a course title; the slug follows
    pub async fn rename_course(&self, id: CourseId, title: &str) -> CoreResult<Course> {
        validate_course_title(title)?;
        let slug = derive_slug(title)?;
        let mut course = self.require_course(id).await?;
        course.title = title.to_string();
        course.slug = slug;
        self.store().update_course(course.clone()).await.map_err(slug_conflict)?;
        Ok(course)
    }

    /// Publish or unpublish a course
    pub async fn set_published(&self, id: CourseId, published: bool) -> CoreResult<Course> {
        let mut course = self.require_course(id).await?;
        course.is_published = published;
        self.store().update_course(course.clone()).await?;
        Ok(course)
    }

    /// Look up a course by slug
    pub async fn course_by_slug(&self, slug: &str) -> CoreResult<Option<Course>> {
        Ok(self.store().course_by_slug(slug).await?)
    }

    /// Delete a course with its chapters, labs and all related progress
    pub async fn delete_course(&self, id: CourseId) -> CoreResult<()> {
        self.store().delete_course_cascade(id).await?;
        tracing::info!("Deleted course {} and its content", id);
        Ok(())
    }

    /// Create a chapter inside a course
    pub async fn create_chapter(&self, new: NewChapter) -> CoreResult<Chapter> {
        require_title(&new.title, "chapter")?;
        let slug = derive_slug(&new.title)?;
        self.require_course(new.course_id).await?;
        let chapter = self.store().insert_chapter(new, slug).await.map_err(slug_conflict)?;
        tracing::info!("Created chapter {} in course {}", chapter.id, chapter.course_id);
        Ok(chapter)
    }

    /// Change a chapter title; the slug follows
    pub async fn rename_chapter(&self, id: ChapterId, title: &str) -> CoreResult<Chapter> {
        require_title(title, "chapter")?;
        let slug = derive_slug(title)?;
        let mut chapter = self.require_chapter(id).await?;
        chapter.title = title.to_string();
        chapter.slug = slug;
        self.store().update_chapter(chapter.clone()).await.map_err(slug_conflict)?;
        Ok(chapter)
    }

    /// Delete a chapter with its labs and all related progress
    pub async fn delete_chapter(&self, id: ChapterId) -> CoreResult<()> {
        self.store().delete_chapter_cascade(id).await?;
        tracing::info!("Deleted chapter {} and its labs", id);
        Ok(())
    }

    /// Create a lab inside a chapter
    ///
    /// An empty flag is treated as no flag.
    pub async fn create_lab(&self, mut new: NewLab) -> CoreResult<Lab> {
        require_title(&new.title, "lab")?;
        self.require_chapter(new.chapter_id).await?;
        new.flag = new.flag.filter(|flag| !flag.is_empty());
        let lab = self.store().insert_lab(new).await?;
        tracing::info!(
            "Created lab {} in chapter {} ({} hints)",
            lab.id,
            lab.chapter_id,
            lab.hints.len()
        );
        Ok(lab)
    }

    /// Change a lab title
    pub async fn rename_lab(&self, id: LabId, title: &str) -> CoreResult<Lab> {
        require_title(title, "lab")?;
        let mut lab = self.require_lab(id).await?;
        lab.title = title.to_string();
        self.store().update_lab(lab.clone()).await?;
        Ok(lab)
    }

    /// Delete a lab and all related progress
    pub async fn delete_lab(&self, id: LabId) -> CoreResult<()> {
        self.store().delete_lab_cascade(id).await?;
        tracing::info!("Deleted lab {}", id);
        Ok(())
    }

    /// Previous and next chapters within the same course
    pub async fn chapter_neighbors(&self, id: ChapterId) -> CoreResult<Neighbors<Chapter>> {
        let chapter = self.require_chapter(id).await?;
        let siblings = self.store().chapters(chapter.course_id).await?;
        Neighbors::find(&siblings, |c| c.id == id).ok_or_else(|| CoreError::not_found("chapter", id))
    }

    /// Previous and next labs within the same chapter
    pub async fn lab_neighbors(&self, id: LabId) -> CoreResult<Neighbors<Lab>> {
        let lab = self.require_lab(id).await?;
        let siblings = self.store().labs(lab.chapter_id).await?;
        Neighbors::find(&siblings, |l| l.id == id).ok_or_else(|| CoreError::not_found("lab", id))
    }

    /// Load a course with all chapters and labs in order
    pub async fn course_outline(&self, id: CourseId) -> CoreResult<CourseOutline> {
        let course = self.require_course(id).await?;
        let mut chapters = Vec::new();
        for chapter in self.store().chapters(id).await? {
            let labs = self.store().labs(chapter.id).await?;
            chapters.push(ChapterOutline { chapter, labs });
        }
        Ok(CourseOutline { course, chapters })
    }

    /// Published courses in position order
    pub async fn published_courses(&self) -> CoreResult<Vec<Course>> {
        let courses = self.store().courses().await?;
        Ok(courses.into_iter().filter(|c| c.is_published).collect())
    }

    /// Courses `role` may browse: everything for authors, published courses otherwise
    pub async fn courses_for(&self, role: Role) -> CoreResult<Vec<Course>> {
        if role.can_edit_courses() {
            return Ok(self.store().courses().await?);
        }
        self.published_courses().await
    }

    async fn course_visible(&self, id: CourseId, role: Role) -> CoreResult<bool> {
        let course = self.require_course(id).await?;
        Ok(course.is_published || role.can_edit_courses())
    }

    /// A chapter, hidden as `NotFound` while its course is a draft `role` cannot see
    pub async fn visible_chapter(&self, id: ChapterId, role: Role) -> CoreResult<Chapter> {
        let chapter = self.require_chapter(id).await?;
        if !self.course_visible(chapter.course_id, role).await? {
            return Err(CoreError::not_found("chapter", id));
        }
        Ok(chapter)
    }

    /// A lab, hidden as `NotFound` while its course is a draft `role` cannot see
    pub async fn visible_lab(&self, id: LabId, role: Role) -> CoreResult<Lab> {
        let lab = self.require_lab(id).await?;
        let chapter = self.require_chapter(lab.chapter_id).await?;
        if !self.course_visible(chapter.course_id, role).await? {
            return Err(CoreError::not_found("lab", id));
        }
        Ok(lab)
    }
}
