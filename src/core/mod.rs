//! Core module - project layout, settings, storage and shared helpers

pub mod config;
pub mod nav;
pub mod project;
pub mod rollup;
pub mod store;

pub use config::Settings;
pub use project::{Project, ProjectError};
pub use store::Store;
