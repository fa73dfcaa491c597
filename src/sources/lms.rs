/*
 *  sources/lms.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Now-playing from a Lyrion (Logitech) Media Server via JSON-RPC
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

use log::debug;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

use super::{MusicSource, SourceError};
use crate::deutils::{deserialize_numeric_i64, deserialize_opt_seconds, deserialize_opt_string, seconds_to_ms};
use crate::state::MusicState;

// title is always returned; a=artist l=album d=duration u=url K=artwork_url c=coverid
const STATUS_TAGS: &str = "tags:alduKc";

#[derive(Debug, Error)]
pub enum LmsClientError {
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("LMS Server error {}: {}", .0.code, .0.message)]
    Rpc(RpcError),
    #[error("LMS Server response missing 'result' field")]
    MissingResult,
    #[error("LMS Server ID mismatch: expected {expected}, received {received:?}")]
    IdMismatch { expected: u32, received: Option<u32> },
}

#[derive(Debug, Serialize)]
struct SlimRequest<'a> {
    id: u32,
    method: &'a str,
    params: Vec<Value>, // [player MAC, [command, param, ...]]
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct SlimResponse {
    id: Option<u32>,
    result: Option<Value>,
    error: Option<RpcError>,
}

/// Thin `slim.request` client. Request ids increase per call.
#[derive(Debug)]
pub struct LmsClient {
    base_url: String,
    client: Client,
    next_id: AtomicU32,
}

impl LmsClient {
    pub fn new(host: &str, port: u16) -> Result<Self, LmsClientError> {
        const VERSION: &str = concat!("LyMonS ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .http1_only()
            .connect_timeout(Duration::from_millis(500))
            .default_headers(headers)
            .timeout(Duration::from_millis(1500))
            .build()?;

        Ok(Self {
            base_url: format!("http://{}:{}", host, port),
            client,
            next_id: AtomicU32::new(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send_slim_request(
        &self,
        player_id: &str,
        command: &str,
        inner_params: Vec<Value>,
    ) -> Result<Value, LmsClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut command_and_params = vec![json!(command)];
        command_and_params.extend(inner_params);

        let request = SlimRequest {
            id,
            method: "slim.request",
            params: vec![Value::String(player_id.to_string()), Value::Array(command_and_params)],
        };

        let body = self
            .client
            .post(format!("{}/jsonrpc.js", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: SlimResponse = serde_json::from_str(&body)?;
        if response.id != Some(id) {
            return Err(LmsClientError::IdMismatch { expected: id, received: response.id });
        }
        if let Some(error) = response.error {
            return Err(LmsClientError::Rpc(error));
        }
        response.result.ok_or(LmsClientError::MissingResult)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlayerStatus {
    #[serde(default = "connected_unless_told", deserialize_with = "deserialize_numeric_i64")]
    player_connected: i64,
    mode: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_seconds")]
    time: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric_i64")]
    playlist_cur_index: i64,
    playlist_loop: Option<Vec<Track>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Track {
    title: Option<String>,
    artist: Option<String>,
    albumartist: Option<String>,
    trackartist: Option<String>,
    album: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_seconds")]
    duration: Option<f64>,
    url: Option<String>,
    artwork_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    coverid: Option<String>,
    #[serde(rename = "playlist index", default, deserialize_with = "deserialize_numeric_i64")]
    playlist_index: i64,
}

fn connected_unless_told() -> i64 {
    1
}

/// A player LMS knows about but cannot reach has no current state at all.
fn check_connected(status: &PlayerStatus, player_id: &str) -> Result<(), SourceError> {
    if status.player_connected == 0 {
        return Err(SourceError::Unavailable(format!("LMS player {} is not connected", player_id)));
    }
    Ok(())
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn cover_url(base_url: &str, track: &Track) -> String {
    if let Some(art) = non_empty(&track.artwork_url) {
        if art.starts_with("http://") || art.starts_with("https://") {
            return art.to_string();
        }
        return format!("{}/{}", base_url, art.trim_start_matches('/'));
    }
    match non_empty(&track.coverid) {
        Some(id) => format!("{}/music/{}/cover.jpg", base_url, id),
        None => String::new(),
    }
}

/// Map an LMS `status` result to our state. An empty playlist is `None`.
fn music_from_status(status: PlayerStatus, base_url: &str) -> Option<MusicState> {
    let tracks = status.playlist_loop?;
    let cur = status.playlist_cur_index;
    // status with "-" start returns the current track; match by index and fall back to the first
    let track = tracks
        .iter()
        .find(|t| t.playlist_index == cur)
        .or_else(|| tracks.first())?;

    let artist = non_empty(&track.artist)
        .or_else(|| non_empty(&track.albumartist))
        .or_else(|| non_empty(&track.trackartist))
        .unwrap_or_default()
        .to_string();

    Some(MusicState {
        title: non_empty(&track.title).unwrap_or_default().to_string(),
        artist,
        album: non_empty(&track.album).unwrap_or_default().to_string(),
        cover_url: cover_url(base_url, track),
        duration_ms: track.duration.map(seconds_to_ms).unwrap_or(0),
        progress_ms: status.time.map(seconds_to_ms).unwrap_or(0),
        uri: track.url.clone().unwrap_or_default(),
        is_playing: status.mode.as_deref() == Some("play"),
    })
}

/// Music source polling one LMS player.
#[derive(Debug)]
pub struct LmsMusicSource {
    client: LmsClient,
    player_id: String,
}

impl LmsMusicSource {
    pub fn new(client: LmsClient, player_id: &str) -> Self {
        Self { client, player_id: player_id.to_string() }
    }
}

impl MusicSource for LmsMusicSource {
    async fn current_music_state(&self) -> Result<Option<MusicState>, SourceError> {
        let result = self
            .client
            .send_slim_request(&self.player_id, "status", vec![json!("-"), json!(1), json!(STATUS_TAGS)])
            .await?;
        let status: PlayerStatus = serde_json::from_value(result).map_err(LmsClientError::from)?;
        check_connected(&status, &self.player_id)?;
        let music = music_from_status(status, self.client.base_url());
        debug!(
            "LMS status: {}",
            music.as_ref().map(|m| format!("{} - {}", m.artist, m.title)).unwrap_or_else(|| "idle".into())
        );
        Ok(music)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://lms.local:9000";

    fn status(v: Value) -> PlayerStatus {
        serde_json::from_value(v).expect("status json")
    }

    #[test]
    fn test_status_maps_current_track() {
        let s = status(json!({
            "mode": "play",
            "time": 42.7,
            "playlist_cur_index": "1",
            "playlist_loop": [
                { "playlist index": 1, "title": "Blue in Green", "artist": "Miles Davis",
                  "album": "Kind of Blue", "duration": "337.5", "url": "file:///kob/03.flac",
                  "coverid": "9f1e" }
            ]
        }));
        let m = music_from_status(s, BASE).expect("track");
        assert_eq!(m.title, "Blue in Green");
        assert_eq!(m.artist, "Miles Davis");
        assert_eq!(m.duration_ms, 337_500);
        assert_eq!(m.progress_ms, 42_700);
        assert_eq!(m.cover_url, "http://lms.local:9000/music/9f1e/cover.jpg");
        assert_eq!(m.uri, "file:///kob/03.flac");
        assert!(m.is_playing);
    }

    #[test]
    fn test_artist_fallback_and_artwork() {
        let s = status(json!({
            "mode": "pause",
            "playlist_cur_index": 0,
            "playlist_loop": [
                { "playlist index": 0, "title": "Radio", "albumartist": "Various",
                  "artwork_url": "/imageproxy/abc/image.png" }
            ]
        }));
        let m = music_from_status(s, BASE).expect("track");
        assert_eq!(m.artist, "Various");
        assert_eq!(m.cover_url, "http://lms.local:9000/imageproxy/abc/image.png");
        assert_eq!(m.duration_ms, 0);
        assert!(!m.is_playing);
    }

    #[test]
    fn test_absolute_artwork_kept() {
        let track = Track { artwork_url: Some("https://cdn.example/a.jpg".into()), ..Default::default() };
        assert_eq!(cover_url(BASE, &track), "https://cdn.example/a.jpg");
    }

    #[test]
    fn test_empty_playlist_is_none() {
        assert!(music_from_status(status(json!({ "mode": "stop" })), BASE).is_none());
        assert!(music_from_status(status(json!({ "mode": "stop", "playlist_loop": [] })), BASE).is_none());
    }

    #[test]
    fn test_disconnected_player_is_unavailable() {
        let gone = status(json!({ "player_connected": 0, "mode": "stop" }));
        assert!(matches!(check_connected(&gone, "aa:bb"), Err(SourceError::Unavailable(msg)) if msg.contains("aa:bb")));
        assert!(check_connected(&status(json!({ "player_connected": "1" })), "aa:bb").is_ok());
        // older servers omit the field
        assert!(check_connected(&status(json!({ "mode": "play" })), "aa:bb").is_ok());
    }

    #[test]
    fn test_client_base_url() {
        let c = LmsClient::new("10.0.0.5", 9000).expect("client");
        assert_eq!(c.base_url(), "http://10.0.0.5:9000");
    }
}
