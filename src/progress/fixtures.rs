//! Shared course builders for progress tests

use crate::content::{Chapter, Course, Lab, NewChapter, NewCourse, NewLab};
use crate::courseware::Courseware;
use crate::store::LocalStore;

pub(crate) struct Fixture {
    pub cw: Courseware<LocalStore>,
    pub course: Course,
    pub chapters: Vec<Chapter>,
    pub labs: Vec<Lab>,
}

/// A course whose chapter `i` holds `labs_per_chapter[i]` labs
pub(crate) async fn course_with(labs_per_chapter: &[usize]) -> Fixture {
    let cw = Courseware::new(LocalStore::in_memory());
    let course = cw.create_course(NewCourse::new("Linux Loader Attacks").published()).await.unwrap();

    let mut chapters = Vec::new();
    let mut labs = Vec::new();
    for (i, lab_count) in labs_per_chapter.iter().enumerate() {
        let chapter = cw
            .create_chapter(NewChapter::new(course.id, format!("Chapter {}", i + 1)))
            .await
            .unwrap();
        for j in 0..*lab_count {
            let lab = cw
                .create_lab(NewLab::new(chapter.id, format!("Lab {}.{}", i + 1, j + 1)))
                .await
                .unwrap();
            labs.push(lab);
        }
        chapters.push(chapter);
    }

    Fixture { cw, course, chapters, labs }
}

/// A single lab with the given hints and flag
pub(crate) async fn lab_with(hints: &[&str], flag: Option<&str>) -> (Courseware<LocalStore>, Lab) {
    let fixture = course_with(&[]).await;
    let chapter = fixture
        .cw
        .create_chapter(NewChapter::new(fixture.course.id, "GOT Hijacking"))
        .await
        .unwrap();

    let mut new = NewLab::new(chapter.id, "Overwrite a GOT entry").with_hints(hints.iter().copied());
    if let Some(flag) = flag {
        new = new.with_flag(flag);
    }
    let lab = fixture.cw.create_lab(new).await.unwrap();
    (fixture.cw, lab)
}
