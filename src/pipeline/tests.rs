use std::cell::Cell;
use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::*;
use crate::cleanup::{CleanupHandle, CleanupManager};
use crate::error::{Error, Result};
use crate::schedule::CancelToken;
use crate::timing::{TimingStore, TrackTiming};

const RATE: u32 = 8000;

fn tone(seconds: f32, amplitude: f32) -> Vec<f32> {
    let n = (seconds * RATE as f32) as usize;
    (0..n)
        .map(|i| amplitude * (TAU * 440.0 * i as f32 / RATE as f32).sin())
        .collect()
}

fn write_fixture(path: &Path, samples: &[f32]) {
    let pcm = Pcm::new(samples.to_vec(), 1, RATE).unwrap();
    write_wav(path, &pcm).unwrap();
}

/// Search answers with the song name as locator; "missing" has no match,
/// "broken" downloads a file that does not decode.
struct FakeFetcher;

impl AudioFetcher for FakeFetcher {
    fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        if query.starts_with("missing") {
            return Ok(None);
        }
        let name = query.split(' ').next().unwrap_or(query).to_string();
        Ok(Some(SearchHit {
            locator: name.clone(),
            title: format!("{name} (Official Audio)"),
            artist: Some("Uploader".into()),
            track_id: Some(format!("id-{name}")),
        }))
    }

    fn download(&self, hit: &SearchHit, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.wav", hit.locator));
        if hit.locator == "broken" {
            fs::write(&path, b"not audio at all")?;
        } else {
            write_fixture(&path, &tone(10.0, 0.5));
        }
        Ok(path)
    }
}

struct FixedDetector {
    onset: Option<u64>,
    calls: Arc<AtomicUsize>,
}

impl ChorusDetector for FixedDetector {
    fn detect(&self, _mono: &[f32], _sample_rate: u32) -> Option<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.onset
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    calls: Arc<AtomicUsize>,
    cleanup: CleanupHandle,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            calls: Arc::new(AtomicUsize::new(0)),
            cleanup: CleanupManager::new().into_handle(),
        }
    }

    fn scratch(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    fn clips(&self) -> PathBuf {
        self.dir.path().join("clips")
    }

    fn table(&self) -> PathBuf {
        self.dir.path().join("chorus_timings.csv")
    }

    fn downloader(&self, onset: Option<u64>) -> Downloader {
        let options = DownloaderOptions {
            artifact_dir: self.clips(),
            scratch_dir: self.scratch(),
            clip: ClipSpec::default(),
            fallback_ratio: 0.3,
            chorus_span_ms: 60_000,
            pop_wait: Duration::from_millis(10),
        };
        Downloader::new(
            Box::new(FakeFetcher),
            Box::new(FixedDetector {
                onset,
                calls: self.calls.clone(),
            }),
            TimingStore::new(self.table(), Duration::ZERO),
            self.cleanup.clone(),
            options,
        )
    }
}

fn scratch_is_empty(path: &Path) -> bool {
    fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[test]
fn clip_window_is_clamped_to_the_track() {
    let spec = ClipSpec::default();
    assert_eq!(spec.clip_window(30_000, 200_000), (10_000, 70_000));
    assert_eq!(spec.clip_window(5_000, 200_000), (0, 45_000));
    assert_eq!(spec.clip_window(190_000, 200_000), (170_000, 200_000));
    assert_eq!(spec.clip_window(0, 0), (0, 0));
}

#[test]
fn render_cuts_one_window_with_silent_edges_and_normalized_peak() {
    let pcm = Pcm::new(vec![0.25; 120 * 1000], 1, 1000).unwrap();
    let clip = ClipSpec::default().render(&pcm, 30_000);

    assert_eq!(clip.frames(), 60_000);
    assert_eq!(clip.samples[0], 0.0);
    assert!(clip.samples[clip.samples.len() - 1] < 0.01);

    let target = 10f32.powf(-0.1 / 20.0);
    assert!((clip.peak() - target).abs() < 1e-4);
    // Past the fade the level is flat.
    assert!((clip.samples[30_000] - target).abs() < 1e-4);
}

#[test]
fn fades_shrink_to_fit_short_clips() {
    let mut pcm = Pcm::new(vec![1.0; 10], 1, 1000).unwrap();
    apply_fades(&mut pcm, 500);
    assert_eq!(pcm.samples[0], 0.0);
    assert_eq!(pcm.samples[9], 0.0);
    assert!(pcm.samples.iter().all(|s| *s <= 1.0));
}

#[test]
fn normalizing_silence_is_a_no_op() {
    let mut pcm = Pcm::new(vec![0.0; 100], 2, 1000).unwrap();
    normalize_peak(&mut pcm, -0.1);
    assert!(pcm.samples.iter().all(|s| *s == 0.0));
}

#[test]
fn stereo_downmix_averages_channels() {
    let pcm = Pcm::new(vec![1.0, 0.0, 0.5, 0.5], 2, 1000).unwrap();
    assert_eq!(pcm.to_mono(), vec![0.5, 0.5]);
    assert_eq!(pcm.frames(), 2);
}

#[test]
fn zero_channel_audio_is_rejected() {
    assert!(matches!(Pcm::new(vec![], 0, 44_100), Err(Error::Audio(_))));
}

#[test]
fn written_wav_decodes_back_to_the_same_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    write_fixture(&path, &tone(2.0, 0.3));

    let pcm = Pcm::decode_file(&path).unwrap();
    assert_eq!(pcm.channels, 1);
    assert_eq!(pcm.sample_rate, RATE);
    assert_eq!(pcm.duration_ms(), 2000);
}

#[test]
fn safe_title_keeps_only_plain_characters() {
    assert_eq!(safe_title("Don't Stop Me Now!  "), "Dont Stop Me Now");
    assert_eq!(safe_title("Perfect - Ed_Sheeran"), "Perfect - Ed_Sheeran");
    assert_eq!(safe_title("???"), "untitled");
}

#[test]
fn artifact_names_get_a_suffix_when_taken() {
    let dir = tempfile::tempdir().unwrap();
    let first = unique_artifact_path(dir.path(), "Perfect");
    assert_eq!(first, dir.path().join("chorus_Perfect.wav"));

    fs::write(&first, b"x").unwrap();
    let second = unique_artifact_path(dir.path(), "Perfect");
    assert_eq!(second, dir.path().join("chorus_Perfect_2.wav"));

    fs::write(&second, b"x").unwrap();
    assert_eq!(
        unique_artifact_path(dir.path(), "Perfect"),
        dir.path().join("chorus_Perfect_3.wav")
    );
}

#[test]
fn fallback_onset_is_a_share_of_the_track() {
    assert_eq!(fallback_onset(200_000, 0.3), 60_000);
    assert_eq!(fallback_onset(0, 0.3), 0);
}

#[test]
fn detector_finds_the_jump_in_energy() {
    let mut signal = tone(6.0, 0.01);
    signal.extend(tone(14.0, 0.8));

    let onset = OnsetPeakDetector::default().detect(&signal, RATE).unwrap();
    assert!(onset.abs_diff(6000) < 500, "onset {onset}");
}

#[test]
fn detector_has_nothing_to_say_about_silence() {
    let detector = OnsetPeakDetector::default();
    assert_eq!(detector.detect(&vec![0.0; RATE as usize * 5], RATE), None);
    assert_eq!(detector.detect(&[0.1; 100], RATE), None);
}

#[test]
fn search_lines_parse_into_hits() {
    let hit = parse_search_line("dQw4w9WgXcQ\tPerfect\tEd Sheeran\n").unwrap();
    assert_eq!(hit.locator, "dQw4w9WgXcQ");
    assert_eq!(hit.title, "Perfect");
    assert_eq!(hit.artist.as_deref(), Some("Ed Sheeran"));
    assert_eq!(hit.track_id.as_deref(), Some("dQw4w9WgXcQ"));

    let bare = parse_search_line("abc\t\tNA").unwrap();
    assert_eq!(bare.title, "abc");
    assert_eq!(bare.artist, None);

    assert_eq!(parse_search_line("   "), None);
}

#[test]
fn process_writes_a_clip_records_timing_and_removes_the_download() {
    let fx = Fixture::new();
    let mut downloader = fx.downloader(Some(3_000));

    let artifact = downloader
        .process(&WorkItem::new("Perfect", "Ed Sheeran"))
        .unwrap();

    assert_eq!(artifact.file_path, fx.clips().join("chorus_Perfect Official Audio.wav"));
    assert_eq!(artifact.source_title, "Perfect (Official Audio)");
    let clip = Pcm::decode_file(&artifact.file_path).unwrap();
    assert_eq!(clip.duration_ms(), 10_000);
    assert!(scratch_is_empty(&fx.scratch()));

    let mut table = TimingStore::new(fx.table(), Duration::ZERO);
    let row = table.get("id-Perfect").unwrap();
    assert_eq!(row.duration_ms, 10_000);
    assert_eq!((row.chorus_start_ms, row.chorus_end_ms), (Some(3_000), Some(10_000)));
    assert_eq!(row.track_name, "Perfect");
    assert_eq!(row.artist, "Uploader");
}

#[test]
fn missing_detection_falls_back_to_a_share_of_the_track() {
    let fx = Fixture::new();
    let mut downloader = fx.downloader(None);
    downloader
        .process(&WorkItem::new("Shivers", "Ed Sheeran"))
        .unwrap();

    let mut table = TimingStore::new(fx.table(), Duration::ZERO);
    assert_eq!(table.lookup("id-Shivers").start_ms, Some(3_000));
}

#[test]
fn recorded_onset_skips_detection() {
    let fx = Fixture::new();
    let mut seed = TimingStore::new(fx.table(), Duration::ZERO);
    seed.append(TrackTiming::new("id-Perfect", "Perfect", "Ed Sheeran", 10_000).with_chorus(1_000, 9_000))
        .unwrap();

    let mut downloader = fx.downloader(Some(7_000));
    downloader
        .process(&WorkItem::new("Perfect", "Ed Sheeran"))
        .unwrap();

    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    let mut table = TimingStore::new(fx.table(), Duration::ZERO);
    assert_eq!(table.lookup("id-Perfect").known(), Some((1_000, 9_000)));
    assert_eq!(table.len(), 1);
}

#[test]
fn failing_items_do_not_block_the_next_one() {
    let fx = Fixture::new();
    let mut downloader = fx.downloader(Some(3_000));
    let completion = downloader.completion();

    let (job_tx, job_rx) = crossbeam_channel::unbounded();
    let (art_tx, art_rx) = crossbeam_channel::unbounded();
    job_tx.send(Job::Fetch(WorkItem::new("broken", "Nobody"))).unwrap();
    job_tx.send(Job::Fetch(WorkItem::new("missing", "Nobody"))).unwrap();
    job_tx.send(Job::Fetch(WorkItem::new("Perfect", "Ed Sheeran"))).unwrap();
    job_tx.send(Job::Finish).unwrap();

    assert!(!completion.is_done());
    let produced = downloader.run(&job_rx, &art_tx, &CancelToken::new());

    assert_eq!(produced, 1);
    assert!(completion.is_done());
    let artifacts: Vec<Artifact> = art_rx.try_iter().collect();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].source_title, "Perfect (Official Audio)");
    assert!(scratch_is_empty(&fx.scratch()));
}

#[test]
fn downloader_stops_when_cancelled_while_idle() {
    let fx = Fixture::new();
    let mut downloader = fx.downloader(None);
    let completion = downloader.completion();
    let (_job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
    let (art_tx, _art_rx) = crossbeam_channel::unbounded();

    let token = CancelToken::new();
    let stopper = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        stopper.cancel();
    });

    assert_eq!(downloader.run(&job_rx, &art_tx, &token), 0);
    handle.join().unwrap();
    assert!(completion.is_done());
}

/// Stays busy for `ticks` polls after each successful load.
struct FakeEngine {
    ticks: usize,
    remaining: Cell<usize>,
    reject: Option<PathBuf>,
    loaded: Arc<Mutex<Vec<PathBuf>>>,
    unloads: Arc<AtomicUsize>,
}

impl FakeEngine {
    fn new(ticks: usize) -> Self {
        Self {
            ticks,
            remaining: Cell::new(0),
            reject: None,
            loaded: Arc::new(Mutex::new(Vec::new())),
            unloads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PlaybackEngine for FakeEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        if self.reject.as_deref() == Some(path) {
            return Err(Error::Engine("unsupported".into()));
        }
        self.loaded.lock().unwrap().push(path.to_path_buf());
        self.remaining.set(self.ticks);
        Ok(())
    }

    fn play(&mut self) {}

    fn is_busy(&self) -> bool {
        let left = self.remaining.get();
        if left > 0 {
            self.remaining.set(left - 1);
        }
        left > 0
    }

    fn stop(&mut self) {}

    fn unload(&mut self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

fn clip_file(dir: &Path, name: &str) -> Artifact {
    let path = dir.join(format!("chorus_{name}.wav"));
    fs::write(&path, b"clip").unwrap();
    Artifact {
        file_path: path,
        source_title: name.to_string(),
    }
}

#[test]
fn player_plays_in_order_then_completes_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let a = clip_file(dir.path(), "a");
    let b = clip_file(dir.path(), "b");

    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(a.clone()).unwrap();
    tx.send(b.clone()).unwrap();
    let upstream = Completion::new();
    upstream.mark_done();

    let engine = FakeEngine::new(3);
    let loaded = engine.loaded.clone();
    let cleanup = CleanupManager::new().into_handle();
    let mut player = Player::new(engine, cleanup.clone(), Duration::from_millis(1), Duration::from_millis(10));

    let played = player.run(&rx, &upstream, &CancelToken::new());

    assert_eq!(played, 2);
    assert_eq!(*loaded.lock().unwrap(), vec![a.file_path.clone(), b.file_path.clone()]);
    assert!(!a.file_path.exists());
    assert!(!b.file_path.exists());
    assert!(cleanup.lock().unwrap().pending().is_empty());
    assert!(player.current().is_none());
}

#[test]
fn player_waits_while_upstream_is_still_working() {
    let dir = tempfile::tempdir().unwrap();
    let late = clip_file(dir.path(), "late");

    let (tx, rx) = crossbeam_channel::unbounded();
    let upstream = Completion::new();
    let producer = {
        let upstream = upstream.clone();
        let late = late.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            tx.send(late).unwrap();
            upstream.mark_done();
        })
    };

    let mut player = Player::new(
        FakeEngine::new(1),
        CleanupManager::new().into_handle(),
        Duration::from_millis(1),
        Duration::from_millis(5),
    );
    let played = player.run(&rx, &upstream, &CancelToken::new());
    producer.join().unwrap();

    assert_eq!(played, 1);
    assert!(!late.file_path.exists());
}

#[test]
fn unplayable_clip_is_handed_to_cleanup_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let bad = clip_file(dir.path(), "bad");
    let good = clip_file(dir.path(), "good");

    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(bad.clone()).unwrap();
    tx.send(good.clone()).unwrap();
    drop(tx);

    let mut engine = FakeEngine::new(2);
    engine.reject = Some(bad.file_path.clone());
    let mut player = Player::new(
        engine,
        CleanupManager::new().into_handle(),
        Duration::from_millis(1),
        Duration::from_millis(5),
    );

    let played = player.run(&rx, &NeverDrained, &CancelToken::new());
    assert_eq!(played, 1);
    // The sweep after the good clip also takes the rejected one.
    assert!(!bad.file_path.exists());
    assert!(!good.file_path.exists());
}

#[test]
fn standalone_player_runs_until_stopped_and_leaves_current_clip_to_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let clip = clip_file(dir.path(), "long");
    let status = dir.path().join("currently_playing.txt");

    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(clip.clone()).unwrap();

    let engine = FakeEngine::new(usize::MAX);
    let unloads = engine.unloads.clone();
    let cleanup = CleanupManager::new().into_handle();
    let mut player = Player::new(engine, cleanup.clone(), Duration::from_millis(1), Duration::from_millis(5))
        .with_status_file(&status);

    let token = CancelToken::new();
    let stopper = token.clone();
    let status_seen = status.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let text = fs::read_to_string(&status_seen).unwrap();
        stopper.cancel();
        text
    });

    assert_eq!(player.run(&rx, &NeverDrained, &token), 1);
    let status_text = handle.join().unwrap();
    drop(tx);

    assert!(status_text.contains("chorus_long.wav|long"));
    assert_eq!(unloads.load(Ordering::SeqCst), 1);
    assert_eq!(cleanup.lock().unwrap().pending(), &[clip.file_path.clone()]);
    // Deletion is the cleanup manager's job, not the player's.
    assert!(clip.file_path.exists());
}

#[test]
fn clips_left_in_the_channel_after_an_early_stop_are_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let clips: Vec<Artifact> = ["a", "b", "c"].iter().map(|n| clip_file(dir.path(), n)).collect();

    let (tx, rx) = crossbeam_channel::unbounded();
    for clip in &clips {
        tx.send(clip.clone()).unwrap();
    }
    let leftovers = rx.clone();
    let cleanup = CleanupManager::new().into_handle();
    let mut player = Player::new(
        FakeEngine::new(usize::MAX),
        cleanup.clone(),
        Duration::from_millis(1),
        Duration::from_millis(5),
    );

    let token = CancelToken::new();
    let stopper = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        stopper.cancel();
    });
    assert_eq!(player.run(&rx, &Completion::new(), &token), 1);
    handle.join().unwrap();
    drop(rx);

    assert_eq!(cleanup.lock().unwrap().pending(), &[clips[0].file_path.clone()]);
    assert_eq!(abandon_queued(&leftovers, &cleanup), 2);
    assert_eq!(abandon_queued(&leftovers, &cleanup), 0);

    let left = cleanup.lock().unwrap().shutdown(1, Duration::ZERO);
    assert!(left.is_empty());
    for clip in &clips {
        assert!(!clip.file_path.exists(), "{}", clip.file_path.display());
    }
    drop(tx);
}
