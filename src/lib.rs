//! dojo - the course-delivery core of a hands-on security training platform
//!
//! Courses are ordered trees of chapters and labs. For each learner, dojo
//! tracks progress through every chapter and lab, reveals lab hints one at
//! a time, verifies CTF-style flags and computes course-wide completion.
//!
//! [`Courseware`] is the entry point; storage is injected through the
//! [`store::Store`] trait, with [`store::LocalStore`] as the bundled
//! backend.

pub mod app;
pub mod config;
pub mod content;
pub mod courseware;
pub mod error;
pub mod progress;
pub mod store;

pub use app::App;
pub use config::Config;
pub use courseware::Courseware;
pub use error::{CoreError, CoreResult};
