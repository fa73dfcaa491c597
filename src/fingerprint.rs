/*
 *  fingerprint.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Content fingerprint - decides whether a new frame is worth rendering
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

//! The fingerprint is deliberately lossy. Playback progress, battery level and
//! GPS coordinates all move far faster than an e-ink panel should refresh, so
//! each is quantized before hashing:
//!
//! - progress to 10 second buckets
//! - battery to deciles
//! - coordinates to 5 decimal places (~1.1 m)
//!
//! Everything else is hashed verbatim. Renderers draw from the same
//! quantized values (`quantized_*`), so one hash always names one bitmap.

use sha2::{Digest, Sha256};

use crate::frame::RenderOptions;
use crate::state::{LocationState, MusicState};

const PROGRESS_BUCKET_MS: u64 = 10_000;
const BATTERY_BUCKET_PCT: u8 = 10;
const COORD_SCALE: f64 = 100_000.0;

#[derive(Debug)]
struct MusicKey<'a> {
    title: &'a str,
    artist: &'a str,
    album: &'a str,
    cover_url: &'a str,
    duration_ms: u64,
    progress_bucket: u64,
    uri: &'a str,
    is_playing: bool,
}

#[derive(Debug)]
struct LocationKey<'a> {
    lat_e5: i64,
    lon_e5: i64,
    display_name: &'a str,
    hierarchy: &'a [String],
    known_place: Option<&'a str>,
}

#[derive(Debug)]
struct FingerprintKey<'a> {
    music: Option<MusicKey<'a>>,
    location: Option<LocationKey<'a>>,
    dither: bool,
    battery_bucket: u8,
}

#[inline]
pub fn progress_bucket(progress_ms: u64) -> u64 {
    progress_ms / PROGRESS_BUCKET_MS
}

#[inline]
pub fn battery_bucket(battery_pct: u8) -> u8 {
    battery_pct.min(100) / BATTERY_BUCKET_PCT
}

#[inline]
fn round_coord(v: f64) -> i64 {
    (v * COORD_SCALE).round() as i64
}

/// Progress at the start of its bucket.
pub fn quantized_progress_ms(progress_ms: u64) -> u64 {
    progress_bucket(progress_ms) * PROGRESS_BUCKET_MS
}

/// Battery at the bottom of its decile.
pub fn quantized_battery(battery_pct: u8) -> u8 {
    battery_bucket(battery_pct) * BATTERY_BUCKET_PCT
}

/// Coordinate as hashed, i.e. rounded to 5 decimal places.
pub fn quantized_coord(v: f64) -> f64 {
    round_coord(v) as f64 / COORD_SCALE
}

/// Quantized canonical form of the inputs. Debug output quotes and escapes
/// strings and keeps `None` distinct from empty; it is stable within a build,
/// and hashes never leave the process.
fn canonical(
    music: Option<&MusicState>,
    location: Option<&LocationState>,
    options: &RenderOptions,
) -> String {
    let key = FingerprintKey {
        music: music.map(|m| MusicKey {
            title: &m.title,
            artist: &m.artist,
            album: &m.album,
            cover_url: &m.cover_url,
            duration_ms: m.duration_ms,
            progress_bucket: progress_bucket(m.progress_ms),
            uri: &m.uri,
            is_playing: m.is_playing,
        }),
        location: location.map(|l| LocationKey {
            lat_e5: round_coord(l.latitude),
            lon_e5: round_coord(l.longitude),
            display_name: &l.display_name,
            hierarchy: &l.hierarchy,
            known_place: l.known_place.as_deref(),
        }),
        dither: options.dither,
        battery_bucket: battery_bucket(options.device_battery_percent),
    };
    format!("{key:?}")
}

/// Hex SHA-256 over the quantized state. This is the frame's `source_hash`.
pub fn compute(
    music: Option<&MusicState>,
    location: Option<&LocationState>,
    options: &RenderOptions,
) -> String {
    let digest = Sha256::digest(canonical(music, location, options).as_bytes());
    hex::encode(digest)
}
