/*
 *  http.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  HTTP surface - serves the cached frame, never renders on the request path
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

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::frame::{FrameCache, FrameSnapshot, RenderOptions};
use crate::sources::LocationStore;
use crate::state::LocationState;

// intermediaries must neither cache nor recompress the bitmap
const NO_CACHE: &str = "no-store, no-transform";
const RETRY_AFTER_SECS: &str = "5";

const X_WIDTH: HeaderName = HeaderName::from_static("x-width");
const X_HEIGHT: HeaderName = HeaderName::from_static("x-height");
const X_BYTES_PER_LINE: HeaderName = HeaderName::from_static("x-bytes-per-line");
const X_RENDERED_AT: HeaderName = HeaderName::from_static("x-rendered-at");
const X_RENDER_REASON: HeaderName = HeaderName::from_static("x-render-reason");

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FrameCache>,
    pub locations: Arc<LocationStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/frame", get(get_frame))
        .route("/status", get(get_status))
        .route("/location", post(post_location))
        .route("/refresh", post(post_refresh))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP frame server listening on {}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health() -> impl IntoResponse {
    "ok"
}

#[derive(Debug, Default, Deserialize)]
pub struct FrameQuery {
    pub dither: Option<bool>,
    pub battery: Option<i64>,
}

/// Record what the device asked for; wake the worker only if it differs.
/// The response still carries whatever is cached now.
pub fn note_requested_options(cache: &FrameCache, query: &FrameQuery) -> bool {
    if !cache.merge_requested_render_options(query.dither, query.battery) {
        return false;
    }
    debug!("Requested options changed to {:?}", cache.requested_render_options());
    cache.signal_render_needed();
    true
}

/// If-None-Match against a strong etag: list aware, `*` aware, weak prefix ignored.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

fn rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The conditional-GET decision, independent of axum extractors.
pub fn frame_response(snapshot: Option<Arc<FrameSnapshot>>, if_none_match: Option<&str>) -> Response {
    let Some(snap) = snapshot else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, RETRY_AFTER_SECS), (header::CACHE_CONTROL, NO_CACHE)],
            "no frame rendered yet",
        )
            .into_response();
    };

    if if_none_match.is_some_and(|inm| etag_matches(inm, &snap.etag)) {
        return (
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, snap.etag.clone()), (header::CACHE_CONTROL, NO_CACHE.to_string())],
        )
            .into_response();
    }

    let g = snap.geometry;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::ETAG, snap.etag.clone()),
            (header::CACHE_CONTROL, NO_CACHE.to_string()),
            (X_WIDTH, g.width.to_string()),
            (X_HEIGHT, g.height.to_string()),
            (X_BYTES_PER_LINE, g.bytes_per_line.to_string()),
            (X_RENDERED_AT, rfc3339(&snap.rendered_at)),
            (X_RENDER_REASON, snap.render_reason.clone()),
        ],
        snap.frame_bytes.clone(),
    )
        .into_response()
}

pub async fn get_frame(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
    headers: HeaderMap,
) -> Response {
    note_requested_options(&state.cache, &query);
    let if_none_match = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    frame_response(state.cache.latest_frame(), if_none_match)
}

#[derive(Debug, Serialize)]
pub struct FrameMeta {
    pub etag: String,
    pub source_hash: String,
    pub width: u32,
    pub height: u32,
    pub bytes_per_line: u32,
    pub byte_len: usize,
    pub rendered_at: String,
    pub render_reason: String,
    pub render_duration_ms: f64,
    pub dithered: bool,
    pub device_battery_percent: u8,
}

impl From<&FrameSnapshot> for FrameMeta {
    fn from(s: &FrameSnapshot) -> Self {
        Self {
            etag: s.etag.clone(),
            source_hash: s.source_hash.clone(),
            width: s.geometry.width,
            height: s.geometry.height,
            bytes_per_line: s.geometry.bytes_per_line,
            byte_len: s.frame_bytes.len(),
            rendered_at: rfc3339(&s.rendered_at),
            render_reason: s.render_reason.clone(),
            render_duration_ms: s.render_duration_ms(),
            dithered: s.dithered,
            device_battery_percent: s.device_battery_percent,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub requested: RenderOptions,
    pub frame: Option<FrameMeta>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(StatusReport {
        requested: state.cache.requested_render_options(),
        frame: state.cache.latest_frame().as_deref().map(FrameMeta::from),
    })
}

#[derive(Debug, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub hierarchy: Vec<String>,
    #[serde(default)]
    pub known_place: Option<String>,
}

impl From<LocationFix> for LocationState {
    fn from(fix: LocationFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            display_name: fix.display_name.unwrap_or_default(),
            hierarchy: fix.hierarchy,
            known_place: fix.known_place.filter(|p| !p.is_empty()),
            captured_at: Utc::now(),
        }
    }
}

pub async fn post_location(State(state): State<AppState>, Json(fix): Json<LocationFix>) -> Response {
    match state.locations.update(fix.into()) {
        Ok(()) => {
            state.cache.signal_render_needed();
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => {
            warn!("Rejected location update: {}", e);
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
        }
    }
}

pub async fn post_refresh(State(state): State<AppState>) -> StatusCode {
    state.cache.signal_render_needed();
    StatusCode::ACCEPTED
}
