//! Classification views
//!
//! Every view maps a revision to zero or more directory paths under the share
//! root. The builder evaluates all of [`View::ALL`] uniformly, so adding a view
//! is a new variant plus its path function.

use super::node::fold_name;
use crate::catalog::{segment_name, Revision};
use std::collections::HashSet;

/// Directory for artist tracks that belong to no album
pub const SINGLES_DIR: &str = "Singles";

/// A directory path below the share root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPath(Vec<String>);

impl ClassPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    fn key(&self) -> Vec<String> {
        self.0.iter().map(|s| fold_name(s)).collect()
    }
}

impl std::fmt::Display for ClassPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// A classification scheme presented as a top-level share directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Every file
    Unsorted,
    /// `Albums/<Album>`
    Albums,
    /// `Artist/<Artist>/<Album>` or `Artist/<Artist>/Singles`
    Artist,
    /// `Alphabetical/<first letter of track>`
    Alphabetical,
}

impl View {
    pub const ALL: [View; 4] = [View::Unsorted, View::Albums, View::Artist, View::Alphabetical];

    /// Name of the view's top-level directory
    pub fn root_name(&self) -> &'static str {
        match self {
            View::Unsorted => "Unsorted",
            View::Albums => "Albums",
            View::Artist => "Artist",
            View::Alphabetical => "Alphabetical",
        }
    }

    /// Paths this view places a file with `revision` under
    pub fn paths(&self, revision: &Revision) -> Vec<ClassPath> {
        let root = self.root_name();
        match self {
            View::Unsorted => vec![ClassPath::new([root])],
            View::Albums => revision
                .album()
                .and_then(segment_name)
                .map(|album| vec![ClassPath::new([root.to_string(), album])])
                .unwrap_or_default(),
            View::Artist => {
                let leaf = revision
                    .album()
                    .and_then(segment_name)
                    .unwrap_or_else(|| SINGLES_DIR.to_string());
                let mut seen = HashSet::new();
                revision
                    .artist_names
                    .iter()
                    .filter_map(|a| segment_name(a))
                    .filter(|a| seen.insert(fold_name(a)))
                    .map(|artist| ClassPath::new([root.to_string(), artist, leaf.clone()]))
                    .collect()
            }
            View::Alphabetical => segment_name(&revision.track_name)
                .and_then(|track| track.chars().next())
                .map(|first| {
                    let letter: String = first.to_uppercase().collect();
                    vec![ClassPath::new([root.to_string(), letter])]
                })
                .unwrap_or_default(),
        }
    }
}

/// All classification paths of a revision, without case-insensitive duplicates
pub fn classify(revision: &Revision) -> Vec<ClassPath> {
    let mut seen = HashSet::new();
    View::ALL
        .iter()
        .flat_map(|view| view.paths(revision))
        .filter(|path| seen.insert(path.key()))
        .collect()
}
