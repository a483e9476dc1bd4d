//! Yeek: Media Catalog Hosting
//!
//! Hosts uploaded media files and exposes them through a download-by-id endpoint
//! and a read-only WebDAV share. The share is a projection of the flat catalog into
//! a directory tree organised by several classification views at once, maintained
//! incrementally by a background builder and read concurrently by request handlers.

pub mod catalog;
pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod projection;
pub mod server;
pub mod service;
pub mod tooling;
pub mod types;
