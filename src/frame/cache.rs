/*
 *  frame/cache.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame cache - the one object the worker and the HTTP layer share
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

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::options::{clamp_battery, RenderOptions};
use super::snapshot::{quote_etag, FrameSnapshot};
use super::wake::{WakeReason, WakeSignal};
use crate::render::RenderedFrame;

#[derive(Debug, Default)]
struct CacheState {
    options: RenderOptions,
    frame: Option<Arc<FrameSnapshot>>,
}

/// Shared between the refresh worker and every request handler.
///
/// The lock only ever guards a copy or a pointer swap; nothing renders or
/// does I/O while holding it.
#[derive(Debug, Default)]
pub struct FrameCache {
    state: Mutex<CacheState>,
    wake: WakeSignal,
}

impl FrameCache {
    pub fn new(initial: RenderOptions) -> Self {
        Self {
            state: Mutex::new(CacheState { options: initial, frame: None }),
            wake: WakeSignal::new(),
        }
    }

    /// Replace the requested options. Does not wake the worker.
    pub fn update_requested_render_options(&self, dither: bool, device_battery_percent: i64) {
        let options = RenderOptions::new(dither, device_battery_percent);
        self.state.lock().options = options;
    }

    /// Fold a partial request into the requested options in one critical
    /// section. Returns `true` if anything changed. Does not wake the worker.
    pub fn merge_requested_render_options(&self, dither: Option<bool>, device_battery_percent: Option<i64>) -> bool {
        let mut state = self.state.lock();
        let current = state.options;
        let wanted = RenderOptions::new(
            dither.unwrap_or(current.dither),
            device_battery_percent.unwrap_or(current.device_battery_percent as i64),
        );
        state.options = wanted;
        wanted != current
    }

    pub fn requested_render_options(&self) -> RenderOptions {
        self.state.lock().options
    }

    pub fn signal_render_needed(&self) {
        self.wake.signal();
    }

    pub async fn wait_for_signal_or_interval(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> WakeReason {
        self.wake.wait(interval, cancel).await
    }

    /// The only write path for frames.
    #[allow(clippy::too_many_arguments)]
    pub fn update_frame(
        &self,
        frame: RenderedFrame,
        source_hash: String,
        captured_at: DateTime<Utc>,
        render_duration: Duration,
        render_reason: &str,
        dithered: bool,
        device_battery_percent: i64,
    ) -> Arc<FrameSnapshot> {
        // build outside the lock; publish is a pointer swap
        let snapshot = Arc::new(FrameSnapshot {
            frame_bytes: frame.bytes,
            geometry: frame.geometry,
            etag: quote_etag(&source_hash),
            source_hash,
            device_battery_percent: clamp_battery(device_battery_percent),
            render_duration,
            rendered_at: captured_at,
            render_reason: render_reason.to_string(),
            dithered,
        });

        let previous = self.state.lock().frame.replace(Arc::clone(&snapshot));
        debug!(
            "frame published {} (was {})",
            snapshot.etag,
            previous.as_ref().map(|p| p.etag.as_str()).unwrap_or("none")
        );
        snapshot
    }

    pub fn latest_frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.state.lock().frame.clone()
    }

    /// Hash of the published frame, if any.
    pub fn latest_source_hash(&self) -> Option<String> {
        self.state.lock().frame.as_ref().map(|f| f.source_hash.clone())
    }
}
