/*
 *  tests/refresh_pipeline.rs
 *
 *  Integration tests for the cache + refresh worker
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use lymons_frame::fingerprint;
use lymons_frame::frame::{FrameCache, FrameGeometry, RenderOptions, WakeReason};
use lymons_frame::render::{FrameRenderer, RenderError, RenderedFrame};
use lymons_frame::sources::{LocationSource, MusicSource, SourceError};
use lymons_frame::state::{LocationState, MusicState};
use lymons_frame::worker::{CycleOutcome, RefreshConfig, RefreshWorker};

#[derive(Default)]
struct FakeMusic {
    state: Mutex<Option<MusicState>>,
    broken: AtomicBool,
}

impl FakeMusic {
    fn playing(title: &str, progress_ms: u64) -> Arc<Self> {
        let m = Arc::new(Self::default());
        m.set(title, progress_ms);
        m
    }

    fn set(&self, title: &str, progress_ms: u64) {
        *self.state.lock() = Some(MusicState {
            title: title.into(),
            artist: "Artist".into(),
            duration_ms: 300_000,
            progress_ms,
            is_playing: true,
            ..Default::default()
        });
    }
}

impl MusicSource for FakeMusic {
    async fn current_music_state(&self) -> Result<Option<MusicState>, SourceError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("player offline".into()));
        }
        Ok(self.state.lock().clone())
    }
}

struct NoLocation;

impl LocationSource for NoLocation {
    async fn current_location_state(&self) -> Result<Option<LocationState>, SourceError> {
        Ok(None)
    }
}

#[derive(Default)]
struct FakeRenderer {
    renders: AtomicUsize,
    fail: AtomicBool,
    stall: AtomicBool,
}

impl FakeRenderer {
    fn count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl FrameRenderer for FakeRenderer {
    async fn render(
        &self,
        music: Option<&MusicState>,
        _location: Option<&LocationState>,
        options: RenderOptions,
    ) -> Result<RenderedFrame, RenderError> {
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::Task("boom".into()));
        }
        let n = self.renders.fetch_add(1, Ordering::SeqCst) as u8;
        let geometry = FrameGeometry::mono(16, 2);
        let mut bytes = vec![0u8; geometry.byte_len()];
        bytes[0] = n;
        bytes[1] = music.map(|m| m.title.len() as u8).unwrap_or(0);
        bytes[2] = options.device_battery_percent;
        Ok(RenderedFrame { bytes, geometry })
    }
}

type Worker = RefreshWorker<Arc<FakeMusic>, NoLocation, Arc<FakeRenderer>>;

fn setup(music: Arc<FakeMusic>) -> (Arc<FrameCache>, Arc<FakeRenderer>, Worker) {
    let cache = Arc::new(FrameCache::new(RenderOptions::default()));
    let renderer = Arc::new(FakeRenderer::default());
    let worker = RefreshWorker::new(
        cache.clone(),
        music,
        NoLocation,
        renderer.clone(),
        RefreshConfig { poll_interval: Duration::from_secs(60), render_timeout: Duration::from_secs(5) },
    );
    (cache, renderer, worker)
}

#[tokio::test(start_paused = true)]
async fn test_initial_render_then_skip_when_unchanged() {
    let (cache, renderer, mut worker) = setup(FakeMusic::playing("Song", 0));
    assert!(cache.latest_frame().is_none());

    let CycleOutcome::Rendered(first) = worker.run_cycle(WakeReason::Interval).await else {
        panic!("expected a first render");
    };
    assert_eq!(first.render_reason, "initial");
    assert_eq!(first.etag, format!("\"{}\"", first.source_hash));
    assert_eq!(first.frame_bytes.len(), 4);

    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Skipped));
    assert!(matches!(worker.run_cycle(WakeReason::Interval).await, CycleOutcome::Skipped));
    assert_eq!(renderer.count(), 1);
    assert!(Arc::ptr_eq(&first, &cache.latest_frame().unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_rerender_only_on_meaningful_change() {
    let music = FakeMusic::playing("Song", 12_000);
    let (cache, renderer, mut worker) = setup(music.clone());
    worker.run_cycle(WakeReason::Signal).await;

    // same 10 s progress bucket
    music.set("Song", 19_999);
    assert!(matches!(worker.run_cycle(WakeReason::Interval).await, CycleOutcome::Skipped));

    music.set("Song", 20_001);
    let CycleOutcome::Rendered(snap) = worker.run_cycle(WakeReason::Interval).await else {
        panic!("progress bucket change should render");
    };
    assert_eq!(snap.render_reason, "interval");

    music.set("Other Song", 20_001);
    let CycleOutcome::Rendered(snap) = worker.run_cycle(WakeReason::Signal).await else {
        panic!("title change should render");
    };
    assert_eq!(snap.render_reason, "signal");
    assert_eq!(renderer.count(), 3);
    assert_eq!(cache.latest_frame().unwrap().etag, snap.etag);
}

#[tokio::test(start_paused = true)]
async fn test_requested_options_change_rerenders() {
    let (cache, renderer, mut worker) = setup(FakeMusic::playing("Song", 0));
    worker.run_cycle(WakeReason::Signal).await;

    // 57 and 59 share a battery bucket
    cache.update_requested_render_options(false, 57);
    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Rendered(_)));
    cache.update_requested_render_options(false, 59);
    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Skipped));

    cache.update_requested_render_options(true, 59);
    let CycleOutcome::Rendered(snap) = worker.run_cycle(WakeReason::Signal).await else {
        panic!("dither change should render");
    };
    assert!(snap.dithered);
    assert_eq!(snap.device_battery_percent, 59);
    assert_eq!(renderer.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_render_keeps_previous_frame() {
    let music = FakeMusic::playing("Song", 0);
    let (cache, renderer, mut worker) = setup(music.clone());
    worker.run_cycle(WakeReason::Signal).await;
    let before = cache.latest_frame().unwrap();

    renderer.fail.store(true, Ordering::SeqCst);
    music.set("Next", 0);
    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Failed));
    assert!(Arc::ptr_eq(&before, &cache.latest_frame().unwrap()));

    // not recorded as rendered, so the next cycle retries
    renderer.fail.store(false, Ordering::SeqCst);
    assert!(matches!(worker.run_cycle(WakeReason::Interval).await, CycleOutcome::Rendered(_)));
}

#[tokio::test(start_paused = true)]
async fn test_render_timeout_is_a_failure() {
    let (cache, renderer, mut worker) = setup(FakeMusic::playing("Song", 0));
    renderer.stall.store(true, Ordering::SeqCst);
    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Failed));
    assert!(cache.latest_frame().is_none());

    // the stalled render is still running, so nothing new starts
    renderer.stall.store(false, Ordering::SeqCst);
    assert!(matches!(worker.run_cycle(WakeReason::Interval).await, CycleOutcome::Busy));
    assert_eq!(renderer.count(), 0);
}

#[derive(Default)]
struct DrawStats {
    draw_ms: AtomicU64,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Draws on the blocking pool, like the status page renderer.
struct BlockingRenderer(Arc<DrawStats>);

impl FrameRenderer for BlockingRenderer {
    async fn render(
        &self,
        _music: Option<&MusicState>,
        _location: Option<&LocationState>,
        _options: RenderOptions,
    ) -> Result<RenderedFrame, RenderError> {
        let stats = Arc::clone(&self.0);
        tokio::task::spawn_blocking(move || {
            let now = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
            stats.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(stats.draw_ms.load(Ordering::SeqCst)));
            stats.active.fetch_sub(1, Ordering::SeqCst);
            RenderedFrame { bytes: vec![0xFF], geometry: FrameGeometry::mono(8, 1) }
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))
    }
}

#[tokio::test]
async fn test_timed_out_blocking_render_is_never_overlapped() {
    let cache = Arc::new(FrameCache::new(RenderOptions::default()));
    let stats = Arc::new(DrawStats::default());
    stats.draw_ms.store(250, Ordering::SeqCst);
    let mut worker = RefreshWorker::new(
        cache.clone(),
        FakeMusic::playing("Song", 0),
        NoLocation,
        BlockingRenderer(stats.clone()),
        RefreshConfig { poll_interval: Duration::from_secs(60), render_timeout: Duration::from_millis(50) },
    );

    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Failed));
    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Busy));
    assert!(matches!(worker.run_cycle(WakeReason::Signal).await, CycleOutcome::Busy));

    // abandoned draw done: the next cycle may start one again
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(matches!(worker.run_cycle(WakeReason::Interval).await, CycleOutcome::Failed));

    tokio::time::sleep(Duration::from_millis(500)).await;
    stats.draw_ms.store(0, Ordering::SeqCst);
    assert!(matches!(worker.run_cycle(WakeReason::Interval).await, CycleOutcome::Rendered(_)));
    assert!(cache.latest_frame().is_some());
    assert_eq!(stats.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_source_error_renders_as_absent() {
    let music = FakeMusic::playing("Song", 0);
    music.broken.store(true, Ordering::SeqCst);
    let (cache, _renderer, mut worker) = setup(music);

    let CycleOutcome::Rendered(snap) = worker.run_cycle(WakeReason::Signal).await else {
        panic!("an unavailable source still renders");
    };
    assert_eq!(snap.source_hash, fingerprint::compute(None, None, &RenderOptions::default()));
    assert_eq!(snap.frame_bytes[1], 0);
    assert!(cache.latest_frame().is_some());
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_worker_lifecycle() {
    let music = FakeMusic::playing("Song", 0);
    let (cache, renderer, worker) = setup(music.clone());
    let shutdown = CancellationToken::new();
    let handle = worker.spawn(shutdown.clone());

    // first frame without waiting for the poll interval
    let started = tokio::time::Instant::now();
    wait_for(|| cache.latest_frame().is_some()).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    let first = cache.latest_frame().unwrap();
    assert_eq!(first.render_reason, "initial");

    // a signal wakes it early
    music.set("Track Two", 0);
    cache.signal_render_needed();
    wait_for(|| cache.latest_frame().unwrap().etag != first.etag).await;
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(cache.latest_frame().unwrap().render_reason, "signal");

    // the interval catches changes nobody signalled
    music.set("Track Three", 0);
    let second = cache.latest_frame().unwrap().etag.clone();
    wait_for(|| cache.latest_frame().unwrap().etag != second).await;
    assert_eq!(cache.latest_frame().unwrap().render_reason, "interval");
    assert_eq!(renderer.count(), 3);

    shutdown.cancel();
    handle.await.unwrap();
}
