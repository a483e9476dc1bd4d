//! Share Projection
//!
//! Derives the browsable directory tree served over WebDAV from the flat catalog.
//! The tree is copy-on-write: the builder works on path-copied nodes and publishes a
//! new root with a single atomic swap, so readers always hold a whole, consistent
//! snapshot. Each directory caches its rendered multistatus body per depth; path
//! copying gives every touched directory and all of its ancestors a fresh cache,
//! while untouched subtrees keep theirs.

pub mod builder;
pub mod classify;
pub mod node;
pub mod render;
pub mod resolve;
pub mod state;
pub mod worker;

pub use builder::{BuilderOptions, PassReport, TreeBuilder};
pub use classify::{classify, ClassPath, View};
pub use node::{Directory, FileEntry};
pub use render::{Depth, Renderer};
pub use resolve::{resolve, split_path, Expect, Resolved};
pub use state::ProjectionState;
pub use worker::BuilderWorker;
