//! Course content: the Course → Chapter → Lab hierarchy

pub mod hierarchy;
pub mod model;
pub mod slug;

pub use hierarchy::{ChapterOutline, CourseOutline, parse_hints};
pub use model::{
    Chapter, ChapterId, Course, CourseId, Difficulty, Lab, LabId, Neighbors, NewChapter,
    NewCourse, NewLab, Role, UserId,
};
pub use slug::slugify;
