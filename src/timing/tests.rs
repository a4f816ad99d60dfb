use std::fs;
use std::time::Duration;

use super::*;

fn store_in(dir: &tempfile::TempDir, reload: Duration) -> TimingStore {
    TimingStore::new(dir.path().join("chorus_timings.csv"), reload)
}

#[test]
fn lookup_unknown_id_is_absent_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir, Duration::from_secs(5));

    let bounds = store.lookup("nope");
    assert_eq!(bounds, ChorusBounds::default());
    assert_eq!(bounds.start_ms, None);
    assert_eq!(bounds.end_ms, None);
    assert!(bounds.known().is_none());
}

#[test]
fn missing_table_loads_as_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir, Duration::from_secs(5));
    assert!(store.reload(false).unwrap());
    assert_eq!(store.len(), 0);
}

#[test]
fn append_persists_and_lookup_returns_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = store_in(&dir, Duration::from_secs(5));

    let row = TrackTiming::new("abc", "Perfect", "Ed Sheeran", 263_000).with_chorus(30_000, 90_000);
    assert!(writer.append(row).unwrap());

    // A fresh reader sees the row straight from disk.
    let mut reader = store_in(&dir, Duration::from_secs(5));
    let bounds = reader.lookup("abc");
    assert_eq!(bounds.known(), Some((30_000, 90_000)));

    let text = fs::read_to_string(writer.path()).unwrap();
    assert!(text.starts_with(
        "track_id,track_name,artist,duration_ms,chorus_start_ms,chorus_end_ms,last_processed"
    ));
}

#[test]
fn duplicate_append_keeps_the_first_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir, Duration::from_secs(5));

    let first = TrackTiming::new("abc", "Perfect", "Ed Sheeran", 263_000).with_chorus(30_000, 90_000);
    let second = TrackTiming::new("abc", "Perfect", "Ed Sheeran", 263_000).with_chorus(1_000, 2_000);

    assert!(store.append(first).unwrap());
    assert!(!store.append(second).unwrap());
    assert_eq!(store.len(), 1);
    assert_eq!(store.lookup("abc").known(), Some((30_000, 90_000)));
}

#[test]
fn rows_without_bounds_round_trip_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_in(&dir, Duration::from_secs(5));
    store
        .append(TrackTiming::new("xyz", "Shivers", "Ed Sheeran", 207_000))
        .unwrap();

    let mut reader = store_in(&dir, Duration::from_secs(5));
    assert_eq!(reader.lookup("xyz"), ChorusBounds::default());
    assert_eq!(reader.get("xyz").unwrap().duration_ms, 207_000);
}

#[test]
fn reader_copy_is_stale_until_the_window_elapses() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = store_in(&dir, Duration::from_secs(3600));
    assert_eq!(reader.lookup("abc"), ChorusBounds::default());

    let mut writer = store_in(&dir, Duration::from_secs(3600));
    writer
        .append(TrackTiming::new("abc", "Perfect", "Ed Sheeran", 263_000).with_chorus(30_000, 90_000))
        .unwrap();

    // Within the window the reader keeps its old copy.
    assert!(!reader.reload(false).unwrap());
    assert_eq!(reader.lookup("abc"), ChorusBounds::default());

    // A forced reload picks the row up.
    assert!(reader.reload(true).unwrap());
    assert_eq!(reader.lookup("abc").known(), Some((30_000, 90_000)));
}

#[test]
fn zero_window_reloads_on_every_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = store_in(&dir, Duration::ZERO);
    assert_eq!(reader.lookup("abc"), ChorusBounds::default());

    let mut writer = store_in(&dir, Duration::ZERO);
    writer
        .append(TrackTiming::new("abc", "Perfect", "Ed Sheeran", 263_000).with_chorus(5, 10))
        .unwrap();

    assert_eq!(reader.lookup("abc").known(), Some((5, 10)));
}

#[test]
fn corrupt_table_makes_lookup_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chorus_timings.csv");
    fs::write(
        &path,
        "track_id,track_name,artist,duration_ms,chorus_start_ms,chorus_end_ms,last_processed\nabc,x,y,not-a-number,,,\n",
    )
    .unwrap();

    let mut store = TimingStore::new(&path, Duration::from_secs(5));
    assert!(store.reload(true).is_err());
    assert_eq!(store.lookup("abc"), ChorusBounds::default());
}
