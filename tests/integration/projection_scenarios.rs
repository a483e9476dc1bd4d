//! End-to-end builder scenarios over an in-memory catalog

use super::support::{dir_at, names_at, placements, record, render_root, Fixture};
use std::sync::Arc;
use yeek::catalog::Revision;
use yeek::projection::Depth;
use yeek::types::FileId;

#[tokio::test]
async fn test_not_ready_before_first_pass() {
    let mut fx = Fixture::new(&[record(1, Revision::new("Song"))]);
    assert!(!fx.state.is_ready());
    assert!(fx.root().children().is_empty());

    fx.pass().await;
    assert!(fx.state.is_ready());
}

#[tokio::test]
async fn test_empty_catalog_becomes_ready() {
    let mut fx = Fixture::new(&[]);
    fx.pass().await;

    assert!(fx.state.is_ready());
    assert!(fx.root().is_root());
    assert!(fx.root().children().is_empty());
}

#[tokio::test]
async fn test_every_view_places_the_file() {
    let song = record(1, Revision::new("Song").with_album("M").with_artists(["A", "B"]));
    let mut fx = Fixture::new(&[song.clone()]);
    fx.pass().await;

    let root = fx.root();
    assert_eq!(root.count_placements(song.id), 5);
    let name = "A, B_M_Song.midi";
    assert_eq!(names_at(&root, &["Unsorted"]), vec![name]);
    assert_eq!(names_at(&root, &["Albums", "M"]), vec![name]);
    assert_eq!(names_at(&root, &["Artist", "A", "M"]), vec![name]);
    assert_eq!(names_at(&root, &["Artist", "B", "M"]), vec![name]);
    assert_eq!(names_at(&root, &["Alphabetical", "S"]), vec![name]);
}

#[tokio::test]
async fn test_single_without_album_goes_to_singles() {
    let song = record(1, Revision::new("Lonely").with_artists(["A"]));
    let mut fx = Fixture::new(&[song]);
    fx.pass().await;

    let root = fx.root();
    assert_eq!(names_at(&root, &["Artist", "A", "Singles"]), vec!["A_Lonely.midi"]);
    assert!(root.child("Albums").is_none());
}

#[tokio::test]
async fn test_collision_suffix_and_reflow_after_delete() {
    let first = record(1, Revision::new("Song"));
    let second = record(2, Revision::new("Song"));
    let mut fx = Fixture::new(&[first.clone(), second.clone()]);
    fx.pass().await;

    let root = fx.root();
    assert_eq!(names_at(&root, &["Unsorted"]), vec!["Song.midi", "Song (1).midi"]);
    assert_eq!(names_at(&root, &["Alphabetical", "S"]), vec!["Song.midi", "Song (1).midi"]);
    assert_eq!(fx.builder.disambiguated(), vec![second.id]);

    fx.delete(first.id);
    fx.pass().await;

    let root = fx.root();
    assert_eq!(names_at(&root, &["Unsorted"]), vec!["Song.midi"]);
    assert_eq!(root.file_ids_in(&["Unsorted"]), vec![second.id]);
    assert!(fx.builder.disambiguated().is_empty());
}

#[tokio::test]
async fn test_suffix_dropped_when_earlier_sibling_is_renamed() {
    let holder = record(2, Revision::new("Song"));
    let mut fx = Fixture::new(&[holder.clone()]);
    fx.pass().await;

    // The later upload sorts first by id but arrives second.
    let late = record(1, Revision::new("Song"));
    fx.catalog.upsert(late.clone());
    fx.state.enqueue_reindex(late.id);
    fx.pass().await;
    assert_eq!(names_at(&fx.root(), &["Unsorted"]), vec!["Song.midi", "Song (1).midi"]);
    assert_eq!(fx.builder.disambiguated(), vec![late.id]);

    fx.edit(holder, Revision::new("Other"));
    fx.pass().await;

    let mut names = names_at(&fx.root(), &["Unsorted"]);
    names.sort();
    assert_eq!(names, vec!["Other.midi", "Song.midi"]);
    assert_eq!(names_at(&fx.root(), &["Alphabetical", "S"]), vec!["Song.midi"]);
    assert!(fx.builder.disambiguated().is_empty());
    assert!(!fx.builder.has_work());
}

#[tokio::test]
async fn test_suffixes_compact_within_one_pass() {
    let records: Vec<_> = (1..=3).map(|n| record(n, Revision::new("Song"))).collect();
    let mut fx = Fixture::new(&records);
    fx.pass().await;
    assert_eq!(
        names_at(&fx.root(), &["Unsorted"]),
        vec!["Song.midi", "Song (1).midi", "Song (2).midi"]
    );

    fx.edit(records[0].clone(), Revision::new("Other"));
    fx.pass().await;

    let mut names = names_at(&fx.root(), &["Unsorted"]);
    names.sort();
    assert_eq!(names, vec!["Other.midi", "Song (1).midi", "Song.midi"]);
    assert_eq!(fx.builder.disambiguated().len(), 1);
}

#[tokio::test]
async fn test_collision_is_case_insensitive() {
    let upper = record(1, Revision::new("SONG"));
    let lower = record(2, Revision::new("song"));
    let mut fx = Fixture::new(&[upper, lower]);
    fx.pass().await;

    assert_eq!(
        names_at(&fx.root(), &["Unsorted"]),
        vec!["SONG.midi", "song (1).midi"]
    );
}

#[tokio::test]
async fn test_album_rename_moves_file_and_prunes() {
    let song = record(1, Revision::new("Song").with_album("Old").with_artists(["X"]));
    let mut fx = Fixture::new(&[song.clone()]);
    fx.pass().await;
    assert!(dir_at(&fx.root(), &["Albums", "Old"]).is_some());

    fx.edit(song.clone(), Revision::new("Song").with_album("New").with_artists(["X"]));
    fx.pass().await;

    let root = fx.root();
    assert!(dir_at(&root, &["Albums", "Old"]).is_none());
    assert!(dir_at(&root, &["Artist", "X", "Old"]).is_none());
    assert_eq!(names_at(&root, &["Albums", "New"]), vec!["X_New_Song.midi"]);
    assert_eq!(names_at(&root, &["Artist", "X", "New"]), vec!["X_New_Song.midi"]);
    assert_eq!(root.count_placements(song.id), 4);
}

#[tokio::test]
async fn test_removing_last_file_prunes_views() {
    let song = record(1, Revision::new("Song").with_album("M"));
    let mut fx = Fixture::new(&[song.clone()]);
    fx.pass().await;

    fx.delete(song.id);
    let report = fx.builder.run_pass().await.unwrap();

    assert_eq!(report.removed, 1);
    assert!(fx.root().children().is_empty());
}

#[tokio::test]
async fn test_depth_limited_listings() {
    let song = record(1, Revision::new("Song").with_album("M").with_artists(["A", "B"]));
    let mut fx = Fixture::new(&[song]);
    fx.pass().await;
    let root = fx.root();

    let zero = render_root(&root, Depth::Finite(0));
    assert_eq!(zero.matches("<d:response>").count(), 1);
    assert!(zero.contains("<d:href>/webdav/</d:href>"));

    let one = render_root(&root, Depth::Finite(1));
    assert_eq!(one.matches("<d:response>").count(), 5);
    assert!(one.contains("<d:href>/webdav/Albums/</d:href>"));
    assert!(!one.contains("/webdav/Albums/M/"));
}

#[tokio::test]
async fn test_incremental_update_keeps_untouched_caches() {
    let mix = record(1, Revision::new("Alpha").with_album("Mix").with_artists(["X"]));
    let other = record(2, Revision::new("Beta").with_album("Mix").with_artists(["Y"]));
    let mut fx = Fixture::new(&[mix.clone(), other.clone()]);
    fx.pass().await;

    let before = fx.root();
    render_root(&before, Depth::Infinity);
    let artist_before = Arc::clone(before.child("Artist").unwrap());
    let albums_before = Arc::clone(before.child("Albums").unwrap());
    assert!(artist_before.cached_depths() > 0);

    let zed = record(3, Revision::new("Zed"));
    fx.catalog.upsert(zed.clone());
    fx.state.enqueue_reindex(zed.id);
    fx.pass().await;

    let after = fx.root();
    assert!(Arc::ptr_eq(&artist_before, after.child("Artist").unwrap()));
    assert!(Arc::ptr_eq(&albums_before, after.child("Albums").unwrap()));
    assert!(dir_at(&after, &["Albums", "Mix"]).unwrap().cached_depths() > 0);
    assert_eq!(after.cached_depths(), 0);
    assert_eq!(after.child("Unsorted").unwrap().cached_depths(), 0);

    // The old snapshot still answers with what it held.
    assert_eq!(before.count_placements(zed.id), 0);

    let incremental = render_root(&after, Depth::Infinity);
    let mut fresh = Fixture::new(&[mix, other, zed]);
    fresh.pass().await;
    assert_eq!(incremental, render_root(&fresh.root(), Depth::Infinity));
}

#[tokio::test]
async fn test_idle_pass_publishes_same_root() {
    let mut fx = Fixture::new(&[record(1, Revision::new("Song"))]);
    fx.pass().await;
    let before = fx.root();

    let report = fx.builder.run_pass().await.unwrap();
    assert!(!report.bootstrapped);
    assert_eq!(report.reindexed, 0);
    assert!(Arc::ptr_eq(&before, &fx.root()));
}

#[tokio::test]
async fn test_rebuild_matches_incremental() {
    let records = vec![
        record(1, Revision::new("Song").with_album("M").with_artists(["A"])),
        record(2, Revision::new("Song").with_album("M").with_artists(["A"])),
        record(3, Revision::new("Other").with_artists(["B", "A"])),
    ];
    let mut fx = Fixture::new(&records[..1]);
    fx.pass().await;
    for r in &records[1..] {
        fx.catalog.upsert(r.clone());
        fx.state.enqueue_reindex(r.id);
    }
    fx.pass().await;

    let mut fresh = Fixture::new(&records);
    fresh.pass().await;
    assert_eq!(placements(&fx.root()), placements(&fresh.root()));
    let ids: Vec<FileId> = records.iter().map(|r| r.id).collect();
    for id in ids {
        assert_eq!(fx.root().count_placements(id), fresh.root().count_placements(id));
    }
}

trait FileIds {
    fn file_ids_in(&self, path: &[&str]) -> Vec<FileId>;
}

impl FileIds for yeek::projection::Directory {
    fn file_ids_in(&self, path: &[&str]) -> Vec<FileId> {
        dir_at(self, path)
            .map(|d| d.files().iter().map(|f| f.id).collect())
            .unwrap_or_default()
    }
}
