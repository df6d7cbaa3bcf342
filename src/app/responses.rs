//! JSON bodies printed for each command
//!
//! Every body carries a `success` flag. Keys are camelCase.

use serde_json::{Value, json};

use crate::content::{Chapter, Course, Lab, Neighbors};
use crate::progress::{
    CourseProgressEntry, CourseSummary, DashboardStats, FlagOutcome, HintReveal, Progress,
    SolutionView,
};

pub const NO_MORE_HINTS: &str = "No more hints available";
pub const NO_FLAG: &str = "No flag for this lab";
pub const FLAG_CORRECT: &str = "Correct! Lab completed!";
pub const FLAG_INCORRECT: &str = "Incorrect flag, try again";
pub const PROGRESS_RESET: &str = "Progress reset";

pub fn error(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

pub fn message(message: &str) -> Value {
    json!({ "success": true, "message": message })
}

pub fn course(course: &Course) -> Value {
    json!({ "success": true, "course": course })
}

pub fn courses(courses: &[Course]) -> Value {
    json!({ "success": true, "courses": courses })
}

pub fn chapter(chapter: &Chapter) -> Value {
    json!({ "success": true, "chapter": chapter })
}

pub fn lab(lab: &Lab) -> Value {
    json!({ "success": true, "lab": lab })
}

fn link(id: u64, title: &str) -> Value {
    json!({ "id": id, "title": title })
}

/// A chapter page: body, its labs and neighbors
pub fn chapter_view(
    chapter: &Chapter,
    labs: &[Lab],
    neighbors: &Neighbors<Chapter>,
    progress: &Progress,
) -> Value {
    json!({
        "success": true,
        "chapter": {
            "id": chapter.id,
            "courseId": chapter.course_id,
            "title": chapter.title,
            "slug": chapter.slug,
            "content": chapter.content,
            "estimatedMinutes": chapter.estimated_minutes,
            "labs": labs.iter().map(|l| link(l.id.0, &l.title)).collect::<Vec<_>>(),
        },
        "previous": neighbors.previous.as_ref().map(|c| link(c.id.0, &c.title)),
        "next": neighbors.next.as_ref().map(|c| link(c.id.0, &c.title)),
        "progress": progress,
    })
}

/// A lab page; the flag and solution never leave through here
pub fn lab_view(
    lab: &Lab,
    revealed_hints: &[String],
    neighbors: &Neighbors<Lab>,
    progress: &Progress,
) -> Value {
    json!({
        "success": true,
        "lab": {
            "id": lab.id,
            "chapterId": lab.chapter_id,
            "title": lab.title,
            "difficulty": lab.difficulty,
            "flagFormat": lab.flag_format,
            "hasFlag": lab.has_flag(),
            "hasSolution": lab.solution.is_some(),
            "hintCount": lab.hints.len(),
            "revealedHints": revealed_hints,
        },
        "previous": neighbors.previous.as_ref().map(|l| link(l.id.0, &l.title)),
        "next": neighbors.next.as_ref().map(|l| link(l.id.0, &l.title)),
        "progress": progress,
    })
}

pub fn completed(progress: &Progress) -> Value {
    json!({ "success": true, "status": progress.status })
}

pub fn progress(progress: &Progress) -> Value {
    json!({ "success": true, "progress": progress })
}

pub fn notes(progress: &Progress) -> Value {
    json!({ "success": true, "notes": progress.notes })
}

pub fn hint(reveal: &HintReveal) -> Value {
    match reveal {
        HintReveal::Revealed { hint_number, hint, has_more_hints } => json!({
            "success": true,
            "hintNumber": hint_number,
            "hint": hint,
            "hasMoreHints": has_more_hints,
        }),
        HintReveal::Exhausted => json!({ "success": false, "message": NO_MORE_HINTS }),
    }
}

pub fn flag(outcome: FlagOutcome) -> Value {
    let (success, message) = match outcome {
        FlagOutcome::NotApplicable => (false, NO_FLAG),
        FlagOutcome::Correct => (true, FLAG_CORRECT),
        FlagOutcome::Incorrect => (false, FLAG_INCORRECT),
    };
    json!({ "success": success, "message": message })
}

pub fn solution(view: &SolutionView) -> Value {
    json!({
        "success": true,
        "labId": view.lab_id,
        "canView": view.can_view,
        "solution": view.solution,
    })
}

pub fn summary(summary: &CourseSummary) -> Value {
    json!({
        "success": true,
        "courseId": summary.course_id,
        "courseTitle": summary.course_title,
        "overallProgress": summary.overall_progress,
        "chapters": summary.chapters,
    })
}

pub fn overall(entries: &[CourseProgressEntry]) -> Value {
    json!({ "success": true, "data": entries })
}

pub fn reset(removed: usize) -> Value {
    json!({ "success": true, "message": PROGRESS_RESET, "removed": removed })
}

pub fn stats(stats: &DashboardStats) -> Value {
    json!({ "success": true, "stats": stats })
}
