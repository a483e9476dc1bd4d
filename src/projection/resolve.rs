//! Path resolution against a projection snapshot

use super::node::{Directory, FileEntry};
use crate::error::ResolveError;
use percent_encoding::percent_decode_str;

/// What the caller wants the final segment to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Directory or file (listing). A directory wins over a same-named file.
    Any,
    /// A file (fetch). Naming a directory is a type conflict.
    File,
}

/// A resolved node together with its canonical path (tree names, not request casing)
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Directory {
        node: &'a Directory,
        path: Vec<&'a str>,
    },
    File {
        entry: &'a FileEntry,
        path: Vec<&'a str>,
    },
}

impl<'a> Resolved<'a> {
    pub fn path(&self) -> &[&'a str] {
        match self {
            Resolved::Directory { path, .. } | Resolved::File { path, .. } => path,
        }
    }

    pub fn as_file(&self) -> Option<&'a FileEntry> {
        match self {
            Resolved::File { entry, .. } => Some(entry),
            Resolved::Directory { .. } => None,
        }
    }
}

/// Split a request path into percent-decoded segments, dropping empty ones
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect()
}

/// Walk `segments` from `root`.
///
/// Intermediate segments must name child directories (case-insensitively). An
/// empty path resolves to the root directory.
pub fn resolve<'a, S: AsRef<str>>(
    root: &'a Directory,
    segments: &[S],
    expect: Expect,
) -> Result<Resolved<'a>, ResolveError> {
    let mut dir = root;
    let mut path: Vec<&'a str> = Vec::with_capacity(segments.len());

    let Some((last, parents)) = segments.split_last() else {
        return match expect {
            Expect::Any => Ok(Resolved::Directory { node: root, path }),
            Expect::File => Err(ResolveError::IsDirectory("/".to_string())),
        };
    };

    for segment in parents {
        let segment = segment.as_ref();
        match dir.child(segment) {
            Some(child) => {
                path.push(child.name().unwrap_or_default());
                dir = &**child;
            }
            None if dir.file(segment).is_some() => {
                return Err(ResolveError::NotADirectory(joined(segments)));
            }
            None => return Err(ResolveError::NotFound(joined(segments))),
        }
    }

    let last = last.as_ref();
    if let Some(child) = dir.child(last) {
        return match expect {
            Expect::Any => {
                path.push(child.name().unwrap_or_default());
                Ok(Resolved::Directory { node: &**child, path })
            }
            Expect::File => Err(ResolveError::IsDirectory(joined(segments))),
        };
    }

    match dir.file(last) {
        Some(entry) => {
            path.push(entry.display_name.as_str());
            Ok(Resolved::File { entry, path })
        }
        None => Err(ResolveError::NotFound(joined(segments))),
    }
}

fn joined<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
    format!("/{}", parts.join("/"))
}
