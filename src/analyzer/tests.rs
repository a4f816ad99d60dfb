use std::cell::RefCell;
use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::cleanup::CleanupManager;
use crate::config::ControllerSettings;
use crate::controller::{Controller, PlaybackMode, Tick};
use crate::pipeline::{SearchHit, write_wav};
use crate::remote::{NowPlaying, RemotePlayback};

const RATE: u32 = 8000;
const PERFECT: &str = "0tgVpDi06FyKpA1z0VMD4v";

fn remote_track(id: &str, name: &str, duration_ms: u64) -> RemoteTrack {
    RemoteTrack {
        track_id: id.into(),
        name: name.into(),
        artist: "Ed Sheeran".into(),
        duration_ms,
    }
}

/// Remote player whose queue is a fixed list, current track first.
#[derive(Default)]
struct FakePlayer {
    queue: RefCell<Vec<RemoteTrack>>,
    unreachable: RefCell<bool>,
    seeks: RefCell<Vec<u64>>,
}

impl FakePlayer {
    fn with_queue(tracks: Vec<RemoteTrack>) -> Self {
        let player = Self::default();
        *player.queue.borrow_mut() = tracks;
        player
    }
}

impl RemoteQueue for FakePlayer {
    fn lookahead(&self, depth: usize) -> std::result::Result<Vec<RemoteTrack>, RemoteError> {
        if *self.unreachable.borrow() {
            return Err(RemoteError::Protocol("player went away".into()));
        }
        Ok(self.queue.borrow().iter().take(depth + 1).cloned().collect())
    }
}

impl RemotePlayback for FakePlayer {
    fn now_playing(&self) -> std::result::Result<Option<NowPlaying>, RemoteError> {
        Ok(self.queue.borrow().first().map(|t| NowPlaying {
            track_id: t.track_id.clone(),
            name: t.name.clone(),
            is_playing: true,
            progress_ms: 0,
            duration_ms: t.duration_ms,
        }))
    }

    fn upcoming(&self) -> std::result::Result<Option<Vec<String>>, RemoteError> {
        Ok(Some(
            self.queue.borrow().iter().skip(1).map(|t| t.track_id.clone()).collect(),
        ))
    }

    fn pause(&self) -> std::result::Result<(), RemoteError> {
        Ok(())
    }

    fn resume(&self) -> std::result::Result<(), RemoteError> {
        Ok(())
    }

    fn seek(&self, position_ms: u64) -> std::result::Result<(), RemoteError> {
        self.seeks.borrow_mut().push(position_ms);
        Ok(())
    }

    fn skip_next(&self) -> std::result::Result<(), RemoteError> {
        Ok(())
    }
}

/// Downloads a 10 s tone for every query except those starting with "missing".
#[derive(Default)]
struct FakeFetcher {
    queries: Arc<Mutex<Vec<String>>>,
}

impl AudioFetcher for FakeFetcher {
    fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        if query.starts_with("missing") {
            return Ok(None);
        }
        Ok(Some(SearchHit {
            locator: format!("yt{}", self.queries.lock().unwrap().len()),
            title: format!("{query} (Official Video)"),
            artist: Some("Uploader".into()),
            track_id: None,
        }))
    }

    fn download(&self, hit: &SearchHit, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.wav", hit.locator));
        let samples: Vec<f32> = (0..RATE as usize * 10)
            .map(|i| 0.5 * (TAU * 440.0 * i as f32 / RATE as f32).sin())
            .collect();
        write_wav(&path, &Pcm::new(samples, 1, RATE)?)?;
        Ok(path)
    }
}

struct FixedOnset(Option<u64>);

impl ChorusDetector for FixedOnset {
    fn detect(&self, _mono: &[f32], _sample_rate: u32) -> Option<u64> {
        self.0
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    queries: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            queries: Arc::default(),
        }
    }

    fn table(&self) -> PathBuf {
        self.dir.path().join("chorus_timings.csv")
    }

    fn scratch(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    fn analyzer(&self, player: FakePlayer, onset: Option<u64>) -> QueueAnalyzer<FakePlayer> {
        let options = AnalyzerOptions {
            scratch_dir: self.scratch(),
            lookahead: 2,
            fallback_ratio: 0.3,
            chorus_span_ms: 60_000,
            poll: Duration::from_millis(1),
        };
        QueueAnalyzer::new(
            player,
            Box::new(FakeFetcher {
                queries: self.queries.clone(),
            }),
            Box::new(FixedOnset(onset)),
            TimingStore::new(self.table(), Duration::ZERO),
            CleanupManager::new().into_handle(),
            options,
            &AnalyzerSettings::default(),
        )
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[test]
fn current_and_next_two_are_recorded_under_remote_ids() {
    let fx = Fixture::new();
    let player = FakePlayer::with_queue(vec![
        remote_track(PERFECT, "Perfect", 263_000),
        remote_track("6PCUP3dWmTjcTtXY02oFdT", "Castle on the Hill", 261_000),
        remote_track("7qiZfU4dY1lWllzX7mPBI3", "Shape of You", 40_000),
        remote_track("beyond", "Too Far Ahead", 200_000),
    ]);
    let mut analyzer = fx.analyzer(player, Some(30_000));

    let pass = analyzer.pass(&CancelToken::new()).unwrap();
    assert_eq!(pass, Pass::Done { seen: 3, recorded: 3 });
    assert_eq!(
        fx.queries(),
        vec!["Perfect Ed Sheeran", "Castle on the Hill Ed Sheeran", "Shape of You Ed Sheeran"]
    );

    let timings = &mut analyzer.timings;
    let perfect = timings.get(PERFECT).unwrap();
    assert_eq!(perfect.track_name, "Perfect");
    assert_eq!(perfect.artist, "Ed Sheeran");
    assert_eq!(perfect.duration_ms, 263_000);
    assert_eq!((perfect.chorus_start_ms, perfect.chorus_end_ms), (Some(30_000), Some(90_000)));

    // The chorus end never runs past the player's length.
    let short = timings.get("7qiZfU4dY1lWllzX7mPBI3").unwrap();
    assert_eq!(short.chorus_end_ms, Some(40_000));
    assert!(timings.get("beyond").is_none());

    let scratch_empty = fs::read_dir(fx.scratch()).map(|mut d| d.next().is_none()).unwrap_or(true);
    assert!(scratch_empty);
}

#[test]
fn known_tracks_are_not_fetched_again() {
    let fx = Fixture::new();
    let player = FakePlayer::with_queue(vec![remote_track(PERFECT, "Perfect", 263_000)]);
    let mut analyzer = fx.analyzer(player, Some(30_000));

    assert_eq!(analyzer.pass(&CancelToken::new()).unwrap(), Pass::Done { seen: 1, recorded: 1 });
    assert_eq!(analyzer.pass(&CancelToken::new()).unwrap(), Pass::Done { seen: 1, recorded: 0 });
    assert_eq!(fx.queries().len(), 1);
}

#[test]
fn a_failing_track_leaves_the_rest_of_the_pass_alone() {
    let fx = Fixture::new();
    let player = FakePlayer::with_queue(vec![
        remote_track("a", "Perfect", 263_000),
        remote_track("b", "missing song", 200_000),
        remote_track("c", "Shape of You", 233_000),
    ]);
    let mut analyzer = fx.analyzer(player, None);

    assert_eq!(analyzer.pass(&CancelToken::new()).unwrap(), Pass::Done { seen: 3, recorded: 2 });
    assert!(analyzer.timings.get("b").is_none());

    // No detection: the onset falls back to a share of the downloaded audio.
    let a = analyzer.timings.get("a").unwrap();
    assert_eq!(a.chorus_start_ms, Some(3_000));
}

#[test]
fn unknown_remote_length_falls_back_to_the_download() {
    let fx = Fixture::new();
    let player = FakePlayer::with_queue(vec![remote_track("a", "Perfect", 0)]);
    let mut analyzer = fx.analyzer(player, Some(9_000));

    analyzer.pass(&CancelToken::new()).unwrap();
    let row = analyzer.timings.get("a").unwrap();
    assert_eq!(row.duration_ms, 10_000);
    assert_eq!((row.chorus_start_ms, row.chorus_end_ms), (Some(9_000), Some(10_000)));
}

#[test]
fn empty_or_unreachable_player_is_not_a_pass() {
    let fx = Fixture::new();
    let mut analyzer = fx.analyzer(FakePlayer::default(), Some(30_000));
    assert_eq!(analyzer.pass(&CancelToken::new()).unwrap(), Pass::Idle);

    let player = FakePlayer::default();
    *player.unreachable.borrow_mut() = true;
    let mut analyzer = fx.analyzer(player, Some(30_000));
    assert!(analyzer.pass(&CancelToken::new()).is_err());
    assert!(fx.queries().is_empty());
}

#[test]
fn controller_seeks_to_a_chorus_the_analyzer_recorded() {
    let fx = Fixture::new();
    let queue = || {
        vec![
            remote_track(PERFECT, "Perfect", 263_000),
            remote_track(PERFECT, "Perfect", 263_000),
            remote_track("next", "Shape of You", 233_000),
        ]
    };
    let mut analyzer = fx.analyzer(FakePlayer::with_queue(queue()), Some(30_000));
    analyzer.pass(&CancelToken::new()).unwrap();

    let settings = ControllerSettings {
        settle_ms: 0,
        ..ControllerSettings::default()
    };
    let mut controller = Controller::new(
        FakePlayer::with_queue(queue()),
        TimingStore::new(fx.table(), Duration::ZERO),
        &settings,
    );
    assert_eq!(controller.tick().unwrap(), Tick::Entered(PlaybackMode::ChorusOnly));
    assert_eq!(*controller.remote().seeks.borrow(), vec![30_000]);
}
