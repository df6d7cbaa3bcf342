//! In-process store, optionally persisted to a JSON snapshot
//!
//! All tables live behind one `RwLock`. Writers work on a copy of the
//! tables, persist it (when a snapshot path is configured) and only then
//! swap it in, so a failed write leaves the previous state untouched.
//!
//! Several processes may share one snapshot. Every write takes an exclusive
//! lock on `<snapshot>.lock`, re-reads the snapshot, applies the change and
//! persists before releasing the lock, so no process overwrites another's
//! work. Reads are served from memory and reflect the snapshot as of the
//! last open or write.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{ContentStore, LedgerStore, StoreError, StoreResult};
use crate::content::{
    Chapter, ChapterId, Course, CourseId, Lab, LabId, NewChapter, NewCourse, NewLab, UserId,
};
use crate::progress::{Applied, Progress, ProgressChange, ProgressId, ProgressTarget};

/// Last id handed out per table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sequences {
    course: u64,
    chapter: u64,
    lab: u64,
    progress: u64,
}

/// Everything the store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    sequences: Sequences,
    courses: BTreeMap<CourseId, Course>,
    chapters: BTreeMap<ChapterId, Chapter>,
    labs: BTreeMap<LabId, Lab>,
    progress: BTreeMap<ProgressId, Progress>,
    /// Uniqueness index over (user, target), rebuilt on load
    #[serde(skip)]
    by_target: HashMap<(UserId, ProgressTarget), ProgressId>,
}

impl Tables {
    fn reindex(&mut self) -> StoreResult<()> {
        self.by_target.clear();
        for progress in self.progress.values() {
            let key = (progress.user_id, progress.target);
            if self.by_target.insert(key, progress.id).is_some() {
                return Err(StoreError::Conflict(format!(
                    "duplicate progress for user {} on {}",
                    progress.user_id, progress.target
                )));
            }
        }
        Ok(())
    }

    fn target_exists(&self, target: ProgressTarget) -> bool {
        match target {
            ProgressTarget::Chapter(id) => self.chapters.contains_key(&id),
            ProgressTarget::Lab(id) => self.labs.contains_key(&id),
        }
    }

    fn remove_progress_where(&mut self, pred: impl Fn(&Progress) -> bool) -> usize {
        let doomed: Vec<ProgressId> =
            self.progress.values().filter(|p| pred(p)).map(|p| p.id).collect();
        for id in &doomed {
            if let Some(progress) = self.progress.remove(id) {
                self.by_target.remove(&(progress.user_id, progress.target));
            }
        }
        doomed.len()
    }

    fn remove_labs(&mut self, labs: &HashSet<LabId>) {
        self.remove_progress_where(
            |p| matches!(p.target, ProgressTarget::Lab(id) if labs.contains(&id)),
        );
        self.labs.retain(|id, _| !labs.contains(id));
    }

    fn remove_chapters(&mut self, chapters: &HashSet<ChapterId>) {
        let labs: HashSet<LabId> = self
            .labs
            .values()
            .filter(|lab| chapters.contains(&lab.chapter_id))
            .map(|lab| lab.id)
            .collect();
        self.remove_labs(&labs);
        self.remove_progress_where(
            |p| matches!(p.target, ProgressTarget::Chapter(id) if chapters.contains(&id)),
        );
        self.chapters.retain(|id, _| !chapters.contains(id));
    }

    fn course_slug_taken(&self, slug: &str, except: Option<CourseId>) -> bool {
        self.courses.values().any(|c| c.slug == slug && Some(c.id) != except)
    }

    fn chapter_slug_taken(&self, course: CourseId, slug: &str, except: Option<ChapterId>) -> bool {
        self.chapters
            .values()
            .any(|c| c.course_id == course && c.slug == slug && Some(c.id) != except)
    }
}

/// One past the highest position in `positions`, or 0 when there are none
fn next_position(positions: impl Iterator<Item = i32>) -> i32 {
    positions.max().map_or(0, |max| max + 1)
}

/// In-process [`Store`](super::Store) implementation
#[derive(Debug, Default)]
pub struct LocalStore {
    tables: RwLock<Tables>,
    /// Snapshot file; `None` keeps everything in memory
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Create an empty store that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store persisted at `path`, loading the snapshot if it exists
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables = read_snapshot(&path)?.unwrap_or_default();

        tracing::debug!(
            "Opened store at {:?} ({} courses, {} progress records)",
            path,
            tables.courses.len(),
            tables.progress.len()
        );

        Ok(Self { tables: RwLock::new(tables), path: Some(path) })
    }

    async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read().await;
        f(&tables)
    }

    /// Run a mutation against a copy of the tables and commit it
    async fn write<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Tables) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut tables = self.tables.write().await;

        let Some(path) = self.path.clone() else {
            let mut next = (*tables).clone();
            let out = f(&mut next)?;
            *tables = next;
            return Ok(out);
        };

        let cached = (*tables).clone();
        let (latest, out) = tokio::task::spawn_blocking(move || commit(&path, cached, f))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        *tables = latest;
        out
    }
}

/// Load the snapshot at `path`, if there is one, with its index rebuilt
fn read_snapshot(path: &Path) -> StoreResult<Option<Tables>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let mut tables = serde_json::from_str::<Tables>(&contents)?;
    tables.reindex()?;
    Ok(Some(tables))
}

fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn open_lock_file(path: &Path) -> StoreResult<File> {
    ensure_parent(path)?;
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path.with_extension("json.lock"))?;
    Ok(file)
}

/// Re-read, mutate and persist the snapshot while holding its file lock
///
/// Returns the tables the caller should cache: the committed tables on
/// success, otherwise the freshest state seen on disk (or `cached` when
/// nothing could be read).
fn commit<T, F>(path: &Path, cached: Tables, f: F) -> (Tables, StoreResult<T>)
where
    F: FnOnce(&mut Tables) -> StoreResult<T>,
{
    let file = match open_lock_file(path) {
        Ok(file) => file,
        Err(e) => return (cached, Err(e)),
    };
    let mut lock = fd_lock::RwLock::new(file);
    let guard = match lock.write() {
        Ok(guard) => guard,
        Err(e) => return (cached, Err(e.into())),
    };

    let latest = match read_snapshot(path) {
        Ok(Some(tables)) => tables,
        Ok(None) => cached,
        Err(e) => return (cached, Err(e)),
    };

    let mut next = latest.clone();
    let result = f(&mut next).and_then(|out| persist(path, &next).map(|()| out));
    drop(guard);

    match result {
        Ok(out) => (next, Ok(out)),
        Err(e) => (latest, Err(e)),
    }
}

/// Write the snapshot via a temporary file so readers never see a torn file
fn persist(path: &Path, tables: &Tables) -> StoreResult<()> {
    ensure_parent(path)?;

    let contents = serde_json::to_string_pretty(tables)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl ContentStore for LocalStore {
    async fn insert_course(&self, new: NewCourse, slug: String) -> StoreResult<Course> {
        self.write(move |t| {
            if t.course_slug_taken(&slug, None) {
                return Err(StoreError::Conflict(format!("course slug '{slug}' is taken")));
            }
            t.sequences.course += 1;
            let course = Course {
                id: CourseId(t.sequences.course),
                title: new.title,
                slug,
                description: new.description,
                is_published: new.is_published,
                position: new.position,
                created_by: new.created_by,
            };
            t.courses.insert(course.id, course.clone());
            Ok(course)
        })
        .await
    }

    async fn course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        Ok(self.read(|t| t.courses.get(&id).cloned()).await)
    }

    async fn course_by_slug(&self, slug: &str) -> StoreResult<Option<Course>> {
        Ok(self.read(|t| t.courses.values().find(|c| c.slug == slug).cloned()).await)
    }

    async fn courses(&self) -> StoreResult<Vec<Course>> {
        let mut courses = self.read(|t| t.courses.values().cloned().collect::<Vec<_>>()).await;
        courses.sort_by_key(|c| (c.position, c.id));
        Ok(courses)
    }

    async fn update_course(&self, course: Course) -> StoreResult<()> {
        self.write(move |t| {
            if !t.courses.contains_key(&course.id) {
                return Err(StoreError::Missing { entity: "course", id: course.id.0 });
            }
            if t.course_slug_taken(&course.slug, Some(course.id)) {
                return Err(StoreError::Conflict(format!(
                    "course slug '{}' is taken",
                    course.slug
                )));
            }
            t.courses.insert(course.id, course);
            Ok(())
        })
        .await
    }

    async fn delete_course_cascade(&self, id: CourseId) -> StoreResult<()> {
        self.write(move |t| {
            if t.courses.remove(&id).is_none() {
                return Err(StoreError::Missing { entity: "course", id: id.0 });
            }
            let chapters: HashSet<ChapterId> =
                t.chapters.values().filter(|c| c.course_id == id).map(|c| c.id).collect();
            t.remove_chapters(&chapters);
            Ok(())
        })
        .await
    }

    async fn insert_chapter(&self, new: NewChapter, slug: String) -> StoreResult<Chapter> {
        self.write(move |t| {
            if !t.courses.contains_key(&new.course_id) {
                return Err(StoreError::Missing { entity: "course", id: new.course_id.0 });
            }
            if t.chapter_slug_taken(new.course_id, &slug, None) {
                return Err(StoreError::Conflict(format!(
                    "chapter slug '{slug}' is taken in course {}",
                    new.course_id
                )));
            }
            let position = new.position.unwrap_or_else(|| {
                next_position(
                    t.chapters.values().filter(|c| c.course_id == new.course_id).map(|c| c.position),
                )
            });
            t.sequences.chapter += 1;
            let chapter = Chapter {
                id: ChapterId(t.sequences.chapter),
                course_id: new.course_id,
                title: new.title,
                slug,
                position,
                content: new.content,
                estimated_minutes: new.estimated_minutes,
            };
            t.chapters.insert(chapter.id, chapter.clone());
            Ok(chapter)
        })
        .await
    }

    async fn chapter(&self, id: ChapterId) -> StoreResult<Option<Chapter>> {
        Ok(self.read(|t| t.chapters.get(&id).cloned()).await)
    }

    async fn chapters(&self, course: CourseId) -> StoreResult<Vec<Chapter>> {
        let mut chapters = self
            .read(|t| {
                t.chapters.values().filter(|c| c.course_id == course).cloned().collect::<Vec<_>>()
            })
            .await;
        chapters.sort_by_key(|c| (c.position, c.id));
        Ok(chapters)
    }

    async fn update_chapter(&self, chapter: Chapter) -> StoreResult<()> {
        self.write(move |t| {
            if !t.chapters.contains_key(&chapter.id) {
                return Err(StoreError::Missing { entity: "chapter", id: chapter.id.0 });
            }
            if !t.courses.contains_key(&chapter.course_id) {
                return Err(StoreError::Missing { entity: "course", id: chapter.course_id.0 });
            }
            if t.chapter_slug_taken(chapter.course_id, &chapter.slug, Some(chapter.id)) {
                return Err(StoreError::Conflict(format!(
                    "chapter slug '{}' is taken in course {}",
                    chapter.slug, chapter.course_id
                )));
            }
            t.chapters.insert(chapter.id, chapter);
            Ok(())
        })
        .await
    }

    async fn delete_chapter_cascade(&self, id: ChapterId) -> StoreResult<()> {
        self.write(move |t| {
            if !t.chapters.contains_key(&id) {
                return Err(StoreError::Missing { entity: "chapter", id: id.0 });
            }
            t.remove_chapters(&HashSet::from([id]));
            Ok(())
        })
        .await
    }

    async fn insert_lab(&self, new: NewLab) -> StoreResult<Lab> {
        self.write(move |t| {
            if !t.chapters.contains_key(&new.chapter_id) {
                return Err(StoreError::Missing { entity: "chapter", id: new.chapter_id.0 });
            }
            let position = new.position.unwrap_or_else(|| {
                next_position(
                    t.labs.values().filter(|l| l.chapter_id == new.chapter_id).map(|l| l.position),
                )
            });
            t.sequences.lab += 1;
            let lab = Lab {
                id: LabId(t.sequences.lab),
                chapter_id: new.chapter_id,
                title: new.title,
                position,
                difficulty: new.difficulty,
                hints: new.hints,
                flag: new.flag,
                flag_format: new.flag_format,
                solution: new.solution,
            };
            t.labs.insert(lab.id, lab.clone());
            Ok(lab)
        })
        .await
    }

    async fn lab(&self, id: LabId) -> StoreResult<Option<Lab>> {
        Ok(self.read(|t| t.labs.get(&id).cloned()).await)
    }

    async fn labs(&self, chapter: ChapterId) -> StoreResult<Vec<Lab>> {
        let mut labs = self
            .read(|t| {
                t.labs.values().filter(|l| l.chapter_id == chapter).cloned().collect::<Vec<_>>()
            })
            .await;
        labs.sort_by_key(|l| (l.position, l.id));
        Ok(labs)
    }

    async fn update_lab(&self, lab: Lab) -> StoreResult<()> {
        self.write(move |t| {
            if !t.labs.contains_key(&lab.id) {
                return Err(StoreError::Missing { entity: "lab", id: lab.id.0 });
            }
            if !t.chapters.contains_key(&lab.chapter_id) {
                return Err(StoreError::Missing { entity: "chapter", id: lab.chapter_id.0 });
            }
            t.labs.insert(lab.id, lab);
            Ok(())
        })
        .await
    }

    async fn delete_lab_cascade(&self, id: LabId) -> StoreResult<()> {
        self.write(move |t| {
            if !t.labs.contains_key(&id) {
                return Err(StoreError::Missing { entity: "lab", id: id.0 });
            }
            t.remove_labs(&HashSet::from([id]));
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LedgerStore for LocalStore {
    async fn find_progress(
        &self,
        user: UserId,
        target: ProgressTarget,
    ) -> StoreResult<Option<Progress>> {
        Ok(self
            .read(|t| t.by_target.get(&(user, target)).and_then(|id| t.progress.get(id)).cloned())
            .await)
    }

    async fn insert_progress(
        &self,
        user: UserId,
        target: ProgressTarget,
    ) -> StoreResult<Progress> {
        self.write(move |t| {
            if !t.target_exists(target) {
                return Err(StoreError::Missing { entity: target.entity(), id: target.raw_id() });
            }
            if t.by_target.contains_key(&(user, target)) {
                return Err(StoreError::Conflict(format!(
                    "progress for user {user} on {target} already exists"
                )));
            }
            t.sequences.progress += 1;
            let progress = Progress::new(ProgressId(t.sequences.progress), user, target, Utc::now());
            t.by_target.insert((user, target), progress.id);
            t.progress.insert(progress.id, progress.clone());
            Ok(progress)
        })
        .await
    }

    async fn apply_progress(
        &self,
        id: ProgressId,
        change: ProgressChange,
    ) -> StoreResult<Applied> {
        self.write(move |t| {
            let progress =
                t.progress.get_mut(&id).ok_or(StoreError::Missing { entity: "progress", id: id.0 })?;
            let changed = progress.apply(&change);
            Ok(Applied { progress: progress.clone(), changed })
        })
        .await
    }

    async fn user_progress(&self, user: UserId) -> StoreResult<Vec<Progress>> {
        Ok(self
            .read(|t| t.progress.values().filter(|p| p.user_id == user).cloned().collect())
            .await)
    }

    async fn delete_progress(
        &self,
        user: UserId,
        targets: &[ProgressTarget],
    ) -> StoreResult<usize> {
        let targets: HashSet<ProgressTarget> = targets.iter().copied().collect();
        self.write(move |t| {
            Ok(t.remove_progress_where(|p| p.user_id == user && targets.contains(&p.target)))
        })
        .await
    }

    async fn delete_user_progress(&self, user: UserId) -> StoreResult<usize> {
        self.write(move |t| Ok(t.remove_progress_where(|p| p.user_id == user))).await
    }
}
