//! Command definitions for the `dojo` command line

use clap::{Subcommand, ValueEnum};

use crate::content::{ChapterId, Difficulty, LabId, Role, UserId};
use crate::progress::ProgressTarget;

/// A single request against the courseware
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Author and list courses
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },
    /// Author chapters
    Chapter {
        #[command(subcommand)]
        action: ChapterAction,
    },
    /// Author labs
    Lab {
        #[command(subcommand)]
        action: LabAction,
    },
    /// Open a chapter or lab, starting it on first view
    View {
        kind: TargetKind,
        id: u64,
        #[arg(long)]
        user: u64,
        /// Draft courses are only visible to instructors and admins
        #[arg(long, value_enum, default_value_t = RoleArg::Student)]
        role: RoleArg,
    },
    /// Mark a chapter or lab completed
    Complete {
        kind: TargetKind,
        id: u64,
        #[arg(long)]
        user: u64,
    },
    /// Add minutes spent on a chapter or lab
    Time {
        kind: TargetKind,
        id: u64,
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
        #[arg(long)]
        user: u64,
    },
    /// Replace the notes on a chapter or lab
    Notes {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        chapter: Option<u64>,
        #[arg(long)]
        lab: Option<u64>,
        text: String,
    },
    /// Reveal the next hint of a lab
    Hint {
        lab: u64,
        #[arg(long)]
        user: u64,
    },
    /// Submit a flag for a lab
    Flag {
        lab: u64,
        submission: String,
        #[arg(long)]
        user: u64,
    },
    /// Show a lab's solution if it is unlocked
    Solution {
        lab: u64,
        #[arg(long)]
        user: u64,
        #[arg(long, value_enum, default_value_t = RoleArg::Student)]
        role: RoleArg,
    },
    /// Per-course summary, or every published course when none is given
    Progress {
        course: Option<u64>,
        #[arg(long)]
        user: u64,
    },
    /// Delete the user's progress for a course
    Reset {
        course: u64,
        #[arg(long)]
        user: u64,
    },
    /// Dashboard counters
    Stats {
        #[arg(long)]
        user: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CourseAction {
    /// Create a course
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        publish: bool,
    },
    /// Change a course title (the slug follows)
    Rename { id: u64, title: String },
    Publish { id: u64 },
    Unpublish { id: u64 },
    /// Delete a course with its chapters, labs and progress
    Delete { id: u64 },
    /// List courses in order; students only see published ones
    List {
        #[arg(long, value_enum, default_value_t = RoleArg::Student)]
        role: RoleArg,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ChapterAction {
    /// Append a chapter to a course
    Add {
        course: u64,
        title: String,
        #[arg(long)]
        position: Option<i32>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        minutes: Option<u32>,
    },
    Rename { id: u64, title: String },
    /// Delete a chapter with its labs and progress
    Delete { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum LabAction {
    /// Append a lab to a chapter
    Add {
        chapter: u64,
        title: String,
        #[arg(long)]
        position: Option<i32>,
        #[arg(long, value_enum)]
        difficulty: Option<DifficultyArg>,
        /// Hints separated by lines containing only `---`
        #[arg(long)]
        hints: Option<String>,
        #[arg(long)]
        flag: Option<String>,
        #[arg(long)]
        flag_format: Option<String>,
        #[arg(long)]
        solution: Option<String>,
    },
    Rename { id: u64, title: String },
    /// Delete a lab and its progress
    Delete { id: u64 },
}

/// Which kind of item a progress command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetKind {
    Chapter,
    Lab,
}

impl TargetKind {
    pub fn target(self, id: u64) -> ProgressTarget {
        match self {
            TargetKind::Chapter => ProgressTarget::Chapter(ChapterId(id)),
            TargetKind::Lab => ProgressTarget::Lab(LabId(id)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Student,
    Instructor,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Student => Role::Student,
            RoleArg::Instructor => Role::Instructor,
            RoleArg::Admin => Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
            DifficultyArg::Expert => Difficulty::Expert,
        }
    }
}

impl Command {
    /// The acting user, for commands that act on someone's progress
    pub fn user(&self) -> Option<UserId> {
        match self {
            Command::View { user, .. }
            | Command::Complete { user, .. }
            | Command::Time { user, .. }
            | Command::Notes { user, .. }
            | Command::Hint { user, .. }
            | Command::Flag { user, .. }
            | Command::Solution { user, .. }
            | Command::Progress { user, .. }
            | Command::Reset { user, .. }
            | Command::Stats { user } => Some(UserId(*user)),
            Command::Course { .. } | Command::Chapter { .. } | Command::Lab { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        Harness::try_parse_from(std::iter::once("dojo").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn parse_view_command() {
        let cmd = parse(&["view", "lab", "9", "--user", "3"]);
        assert_eq!(
            cmd,
            Command::View { kind: TargetKind::Lab, id: 9, user: 3, role: RoleArg::Student }
        );
        assert_eq!(cmd.user(), Some(UserId(3)));
        if let Command::View { kind, id, .. } = cmd {
            assert_eq!(kind.target(id), ProgressTarget::Lab(LabId(9)));
        }
    }

    #[test]
    fn parse_negative_time_reaches_the_core() {
        let cmd = parse(&["time", "chapter", "2", "-5", "--user", "1"]);
        assert_eq!(
            cmd,
            Command::Time { kind: TargetKind::Chapter, id: 2, minutes: -5, user: 1 }
        );
    }

    #[test]
    fn parse_solution_defaults_to_student() {
        let cmd = parse(&["solution", "4", "--user", "1"]);
        assert_eq!(cmd, Command::Solution { lab: 4, user: 1, role: RoleArg::Student });
        assert_eq!(Role::from(RoleArg::Admin), Role::Admin);
    }

    #[test]
    fn parse_course_add() {
        let cmd = parse(&["course", "add", "Heap Exploitation", "--publish"]);
        assert_eq!(
            cmd,
            Command::Course {
                action: CourseAction::Add {
                    title: "Heap Exploitation".to_string(),
                    description: None,
                    publish: true,
                }
            }
        );
        assert_eq!(cmd.user(), None);
    }

    #[test]
    fn parse_course_list_with_role() {
        assert_eq!(
            parse(&["course", "list"]),
            Command::Course { action: CourseAction::List { role: RoleArg::Student } }
        );
        assert_eq!(
            parse(&["course", "list", "--role", "instructor"]),
            Command::Course { action: CourseAction::List { role: RoleArg::Instructor } }
        );
    }

    #[test]
    fn missing_user_is_rejected() {
        let result = Harness::try_parse_from(["dojo", "hint", "3"]);
        assert!(result.is_err());
    }
}
