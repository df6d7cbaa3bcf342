//! Command execution for the `dojo` binary

pub mod command;
pub mod responses;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::content::{
    ChapterId, CourseId, LabId, NewChapter, NewCourse, NewLab, Role, UserId, parse_hints,
};
use crate::courseware::Courseware;
use crate::error::CoreError;
use crate::progress::ProgressTarget;
use crate::store::{ContentStore, LocalStore};
use command::{ChapterAction, Command, CourseAction, LabAction};

/// The command-line application
pub struct App {
    courseware: Courseware<LocalStore>,
}

impl App {
    /// Open the configured store
    pub fn new(config: &Config) -> Result<Self> {
        let path = config.store_path()?;
        let store = LocalStore::open(path.clone())
            .with_context(|| format!("Failed to open store at {:?}", path))?;
        Ok(Self::with_courseware(Courseware::new(store)))
    }

    /// Run against an existing courseware handle
    pub fn with_courseware(courseware: Courseware<LocalStore>) -> Self {
        Self { courseware }
    }

    /// Run one command, turning failures into an error body
    pub async fn execute(&self, command: Command) -> Value {
        let user = command.user();
        match self.dispatch(command).await {
            Ok(reply) => reply,
            Err(err) => {
                match err.downcast_ref::<CoreError>() {
                    Some(core) if core.is_client_error() => {
                        tracing::debug!("Rejected request from user {:?}: {}", user, core)
                    }
                    _ => tracing::error!("Command failed: {:#}", err),
                }
                responses::error(&err.to_string())
            }
        }
    }

    async fn dispatch(&self, command: Command) -> Result<Value> {
        let cw = &self.courseware;
        let reply = match command {
            Command::Course { action } => self.course(action).await?,
            Command::Chapter { action } => self.chapter(action).await?,
            Command::Lab { action } => self.lab(action).await?,
            Command::View { kind, id, user, role } => {
                self.view(UserId(user), role.into(), kind.target(id)).await?
            }
            Command::Complete { kind, id, user } => {
                responses::completed(&cw.complete(UserId(user), kind.target(id)).await?)
            }
            Command::Time { kind, id, minutes, user } => {
                responses::progress(&cw.record_time(UserId(user), kind.target(id), minutes).await?)
            }
            Command::Notes { user, chapter, lab, text } => {
                let progress = cw
                    .update_notes(UserId(user), chapter.map(ChapterId), lab.map(LabId), &text)
                    .await?;
                responses::notes(&progress)
            }
            Command::Hint { lab, user } => {
                responses::hint(&cw.reveal_next_hint(UserId(user), LabId(lab)).await?)
            }
            Command::Flag { lab, submission, user } => {
                responses::flag(cw.check_flag(UserId(user), LabId(lab), &submission).await?)
            }
            Command::Solution { lab, user, role } => {
                responses::solution(&cw.solution(UserId(user), role.into(), LabId(lab)).await?)
            }
            Command::Progress { course: Some(course), user } => {
                responses::summary(&cw.course_summary(UserId(user), CourseId(course)).await?)
            }
            Command::Progress { course: None, user } => {
                responses::overall(&cw.overall_progress(UserId(user)).await?)
            }
            Command::Reset { course, user } => {
                responses::reset(cw.reset_progress(UserId(user), CourseId(course)).await?)
            }
            Command::Stats { user } => responses::stats(&cw.stats(UserId(user)).await?),
        };
        Ok(reply)
    }

    async fn course(&self, action: CourseAction) -> Result<Value> {
        let cw = &self.courseware;
        let reply = match action {
            CourseAction::Add { title, description, publish } => {
                let mut new = NewCourse::new(title);
                if let Some(description) = description {
                    new = new.with_description(description);
                }
                if publish {
                    new = new.published();
                }
                responses::course(&cw.create_course(new).await?)
            }
            CourseAction::Rename { id, title } => {
                responses::course(&cw.rename_course(CourseId(id), &title).await?)
            }
            CourseAction::Publish { id } => {
                responses::course(&cw.set_published(CourseId(id), true).await?)
            }
            CourseAction::Unpublish { id } => {
                responses::course(&cw.set_published(CourseId(id), false).await?)
            }
            CourseAction::Delete { id } => {
                cw.delete_course(CourseId(id)).await?;
                responses::message("Course deleted")
            }
            CourseAction::List { role } => {
                responses::courses(&cw.courses_for(role.into()).await?)
            }
        };
        Ok(reply)
    }

    async fn chapter(&self, action: ChapterAction) -> Result<Value> {
        let cw = &self.courseware;
        let reply = match action {
            ChapterAction::Add { course, title, position, content, minutes } => {
                let new = NewChapter {
                    course_id: CourseId(course),
                    title,
                    position,
                    content,
                    estimated_minutes: minutes,
                };
                responses::chapter(&cw.create_chapter(new).await?)
            }
            ChapterAction::Rename { id, title } => {
                responses::chapter(&cw.rename_chapter(ChapterId(id), &title).await?)
            }
            ChapterAction::Delete { id } => {
                cw.delete_chapter(ChapterId(id)).await?;
                responses::message("Chapter deleted")
            }
        };
        Ok(reply)
    }

    async fn lab(&self, action: LabAction) -> Result<Value> {
        let cw = &self.courseware;
        let reply = match action {
            LabAction::Add {
                chapter,
                title,
                position,
                difficulty,
                hints,
                flag,
                flag_format,
                solution,
            } => {
                let mut new = NewLab::new(ChapterId(chapter), title)
                    .with_hints(hints.as_deref().map(parse_hints).unwrap_or_default());
                new.position = position;
                new.difficulty = difficulty.map(Into::into).unwrap_or_default();
                new.flag = flag;
                new.flag_format = flag_format;
                new.solution = solution;
                responses::lab(&cw.create_lab(new).await?)
            }
            LabAction::Rename { id, title } => {
                responses::lab(&cw.rename_lab(LabId(id), &title).await?)
            }
            LabAction::Delete { id } => {
                cw.delete_lab(LabId(id)).await?;
                responses::message("Lab deleted")
            }
        };
        Ok(reply)
    }

    /// Open a chapter or lab page, starting its progress
    async fn view(&self, user: UserId, role: Role, target: ProgressTarget) -> Result<Value> {
        let cw = &self.courseware;
        let reply = match target {
            ProgressTarget::Chapter(id) => {
                let chapter = cw.visible_chapter(id, role).await?;
                let labs = cw.store().labs(id).await?;
                let neighbors = cw.chapter_neighbors(id).await?;
                let progress = cw.view(user, target).await?;
                responses::chapter_view(&chapter, &labs, &neighbors, &progress)
            }
            ProgressTarget::Lab(id) => {
                let lab = cw.visible_lab(id, role).await?;
                let neighbors = cw.lab_neighbors(id).await?;
                let progress = cw.view(user, target).await?;
                let revealed = cw.revealed_hints(user, id).await?;
                responses::lab_view(&lab, &revealed, &neighbors, &progress)
            }
        };
        Ok(reply)
    }
}
