//! Small shared helpers used across the workspace.

pub mod time;
pub mod uuid;
