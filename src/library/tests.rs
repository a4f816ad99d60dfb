use std::fs;
use std::path::Path;

use super::*;
use crate::pipeline::WorkItem;

#[test]
fn track_list_loads_in_file_order_and_skips_blank_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("songs.csv");
    fs::write(
        &path,
        "song_name,artist\nShape of You, Ed Sheeran\n,Ed Sheeran\nDon't,Ed Sheeran\n",
    )
    .unwrap();

    let items = load_track_list(&path).unwrap();
    assert_eq!(
        items,
        vec![
            WorkItem::new("Shape of You", "Ed Sheeran"),
            WorkItem::new("Don't", "Ed Sheeran"),
        ]
    );
}

#[test]
fn missing_track_list_is_an_error() {
    assert!(load_track_list(Path::new("/definitely/not/here.csv")).is_err());
}

#[test]
fn orphan_scan_finds_clips_only_at_the_top_level() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("chorus_b.wav"), b"x").unwrap();
    fs::write(dir.path().join("chorus_a.WAV"), b"x").unwrap();
    fs::write(dir.path().join("song.wav"), b"x").unwrap();
    fs::write(dir.path().join("chorus_c.mp3"), b"x").unwrap();
    let sub = dir.path().join("nested");
    fs::create_dir_all(&sub).unwrap();
    fs::write(sub.join("chorus_d.wav"), b"x").unwrap();

    let names: Vec<String> = find_orphan_clips(dir.path())
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["chorus_a.WAV".to_string(), "chorus_b.wav".to_string()]);
}

#[test]
fn orphan_scan_of_missing_dir_is_empty() {
    assert!(find_orphan_clips(Path::new("/definitely/not/here")).is_empty());
}

#[test]
fn probe_tags_on_garbage_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fake.mp3");
    fs::write(&path, b"not really an mp3").unwrap();
    assert_eq!(probe_tags(&path), TagInfo::default());
}

#[test]
fn probe_tags_reads_wav_duration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..16_000 {
        w.write_sample(0i16).unwrap();
    }
    w.finalize().unwrap();

    let info = probe_tags(&path);
    let ms = info.duration.unwrap().as_millis();
    assert!((1990..=2010).contains(&ms), "duration was {ms} ms");
}
