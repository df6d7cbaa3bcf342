//! Content model for courses
//!
//! A course is a strict three-level ordered tree: Course → Chapter → Lab.
//! Each level carries an explicit `position` used for ordering among its
//! siblings.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a user (authentication lives outside this crate)
    UserId
);
id_type!(
    /// Identifier of a course
    CourseId
);
id_type!(
    /// Identifier of a chapter
    ChapterId
);
id_type!(
    /// Identifier of a lab
    LabId
);

/// A course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    /// Globally unique, derived from the title
    pub slug: String,
    pub description: Option<String>,
    pub is_published: bool,
    /// Ordering among courses
    pub position: i32,
    pub created_by: Option<UserId>,
}

/// A chapter within a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub course_id: CourseId,
    pub title: String,
    /// Unique within the owning course
    pub slug: String,
    /// Ordering within the course
    pub position: i32,
    /// Chapter body (markdown, rendered elsewhere)
    pub content: Option<String>,
    pub estimated_minutes: Option<u32>,
}

/// Lab difficulty rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

/// A hands-on lab within a chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lab {
    pub id: LabId,
    pub chapter_id: ChapterId,
    pub title: String,
    /// Ordering within the chapter
    pub position: i32,
    pub difficulty: Difficulty,
    /// Progressive hints. Index `i` is only revealed after index `i - 1`.
    pub hints: Vec<String>,
    /// Verification flag, compared verbatim after trimming the submission
    pub flag: Option<String>,
    /// Format hint shown to the learner (e.g. `FLAG{...}`)
    pub flag_format: Option<String>,
    pub solution: Option<String>,
}

impl Lab {
    /// Whether this lab can be verified by flag submission
    pub fn has_flag(&self) -> bool {
        self.flag.is_some()
    }
}

/// Fields for a new course; the store assigns the id
#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub position: i32,
    pub created_by: Option<UserId>,
}

impl NewCourse {
    /// Create a draft course with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the course as published
    pub fn published(mut self) -> Self {
        self.is_published = true;
        self
    }
}

/// Fields for a new chapter
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub course_id: CourseId,
    pub title: String,
    /// Defaults to one past the last sibling when `None`
    pub position: Option<i32>,
    pub content: Option<String>,
    pub estimated_minutes: Option<u32>,
}

impl NewChapter {
    /// Create a chapter appended to the end of the course
    pub fn new(course_id: CourseId, title: impl Into<String>) -> Self {
        Self { course_id, title: title.into(), position: None, content: None, estimated_minutes: None }
    }

    /// Place the chapter at an explicit position
    pub fn at(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Set the chapter body
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Fields for a new lab
#[derive(Debug, Clone)]
pub struct NewLab {
    pub chapter_id: ChapterId,
    pub title: String,
    pub position: Option<i32>,
    pub difficulty: Difficulty,
    pub hints: Vec<String>,
    pub flag: Option<String>,
    pub flag_format: Option<String>,
    pub solution: Option<String>,
}

impl NewLab {
    /// Create a lab appended to the end of the chapter
    pub fn new(chapter_id: ChapterId, title: impl Into<String>) -> Self {
        Self {
            chapter_id,
            title: title.into(),
            position: None,
            difficulty: Difficulty::default(),
            hints: Vec::new(),
            flag: None,
            flag_format: None,
            solution: None,
        }
    }

    /// Place the lab at an explicit position
    pub fn at(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Set the ordered hint list
    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hints = hints.into_iter().map(Into::into).collect();
        self
    }

    /// Set the verification flag
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    /// Set the solution text
    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }
}

/// Authoring role of the acting user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Instructors and admins may author content and see every solution
    pub fn can_edit_courses(self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

/// Previous and next siblings of a chapter or lab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbors<T> {
    pub previous: Option<T>,
    pub next: Option<T>,
}

impl<T: Clone> Neighbors<T> {
    /// Find the neighbors of the item matching `is_current` in an ordered list
    pub fn find(ordered: &[T], is_current: impl Fn(&T) -> bool) -> Option<Self> {
        let index = ordered.iter().position(is_current)?;
        Some(Self {
            previous: index.checked_sub(1).and_then(|i| ordered.get(i)).cloned(),
            next: ordered.get(index + 1).cloned(),
        })
    }
}
