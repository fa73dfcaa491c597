/*
 *  worker.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Refresh worker - waits, fingerprints, renders only when something changed
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::fingerprint;
use crate::frame::{FrameCache, FrameSnapshot, WakeReason};
use crate::render::{FrameRenderer, RenderError, RenderedFrame};
use crate::sources::{LocationSource, MusicSource};

#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    /// Safety-net cadence when nobody signals.
    pub poll_interval: Duration,
    pub render_timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            render_timeout: Duration::from_secs(20),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Rendered(Arc<FrameSnapshot>),
    Skipped,
    Failed,
    /// A render that outlived its timeout is still running.
    Busy,
}

type RenderTask = JoinHandle<Result<RenderedFrame, RenderError>>;

/// The only writer of frames. Renders strictly one at a time, including
/// renders abandoned by the timeout: those stay tracked until they finish.
pub struct RefreshWorker<M, L, R> {
    cache: Arc<FrameCache>,
    music: M,
    location: L,
    renderer: Arc<R>,
    config: RefreshConfig,
    in_flight: Option<RenderTask>,
}

impl<M, L, R> RefreshWorker<M, L, R>
where
    M: MusicSource,
    L: LocationSource,
    R: FrameRenderer,
{
    pub fn new(cache: Arc<FrameCache>, music: M, location: L, renderer: R, config: RefreshConfig) -> Self {
        Self { cache, music, location, renderer: Arc::new(renderer), config, in_flight: None }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Loop until `shutdown` is cancelled. Failures never end the loop.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "Refresh worker started (poll {:?}, render timeout {:?})",
            self.config.poll_interval, self.config.render_timeout
        );
        // first frame as soon as possible rather than one interval in
        self.cache.signal_render_needed();

        loop {
            let wake = self
                .cache
                .wait_for_signal_or_interval(self.config.poll_interval, &shutdown)
                .await;
            if wake == WakeReason::Cancelled {
                break;
            }
            debug!("Refresh worker woke: {}", wake);
            self.run_cycle(wake).await;
        }
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        info!("Refresh worker stopped.");
    }

    /// `true` while a timed-out render has not yet returned.
    fn render_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(task) if !task.is_finished() => {
                self.in_flight = Some(task);
                true
            }
            Some(_) => {
                debug!("Abandoned render finished, result discarded");
                false
            }
            None => false,
        }
    }

    /// One evaluate/render pass.
    pub async fn run_cycle(&mut self, wake: WakeReason) -> CycleOutcome {
        if self.render_in_flight() {
            warn!("Previous render still running, not starting another");
            return CycleOutcome::Busy;
        }

        let options = self.cache.requested_render_options();

        // an unavailable source is rendered as absent, not as a failure
        let music = match self.music.current_music_state().await {
            Ok(m) => m,
            Err(e) => {
                warn!("Music state unavailable: {}", e);
                None
            }
        };
        let location = match self.location.current_location_state().await {
            Ok(l) => l,
            Err(e) => {
                warn!("Location state unavailable: {}", e);
                None
            }
        };

        let source_hash = fingerprint::compute(music.as_ref(), location.as_ref(), &options);
        let cached = self.cache.latest_source_hash();
        if cached.as_deref() == Some(source_hash.as_str()) {
            debug!("Fingerprint unchanged ({}), skipping render", &source_hash[..12]);
            return CycleOutcome::Skipped;
        }

        let reason = match cached {
            None => "initial".to_string(),
            Some(_) => wake.to_string(),
        };
        let captured_at = Utc::now();
        let started = Instant::now();
        // owned task, so a render that outlives the timeout is still accounted for
        let renderer = Arc::clone(&self.renderer);
        let mut task: RenderTask =
            tokio::spawn(async move { renderer.render(music.as_ref(), location.as_ref(), options).await });

        let rendered = match tokio::time::timeout(self.config.render_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RenderError::Task(e.to_string())),
            Err(_) => {
                self.in_flight = Some(task);
                Err(RenderError::Timeout(self.config.render_timeout))
            }
        };

        match rendered {
            Ok(frame) => {
                let elapsed = started.elapsed();
                let snapshot = self.cache.update_frame(
                    frame,
                    source_hash,
                    captured_at,
                    elapsed,
                    &reason,
                    options.dither,
                    options.device_battery_percent as i64,
                );
                info!(
                    "Rendered frame {} in {:.1}ms ({}, dither {}, battery {}%)",
                    snapshot.etag,
                    snapshot.render_duration_ms(),
                    reason,
                    snapshot.dithered,
                    snapshot.device_battery_percent
                );
                CycleOutcome::Rendered(snapshot)
            }
            Err(e) => {
                error!("Render failed, keeping previous frame: {}", e);
                CycleOutcome::Failed
            }
        }
    }
}
