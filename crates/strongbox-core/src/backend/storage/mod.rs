//! Storage backend implementations

mod fs;
mod git;

pub use fs::{FsLoader, FsStorage};
pub use git::{GitLoader, GitStorage};
