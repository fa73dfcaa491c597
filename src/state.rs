/*
 *  state.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Source state fed into the fingerprint and the renderer
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
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the player is doing right now.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicState {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: String,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub uri: String,
    pub is_playing: bool,
}

impl MusicState {
    /// Progress as a 0.0..=1.0 fraction of the track, 0.0 for streams with no duration.
    pub fn progress_fraction(&self) -> f32 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.progress_ms as f32 / self.duration_ms as f32).clamp(0.0, 1.0)
    }
}

/// Latest location fix, as posted by the webhook or taken from config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationState {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub display_name: String,
    /// Coarse to fine, e.g. ["Canada", "Ontario", "Toronto"]
    #[serde(default)]
    pub hierarchy: Vec<String>,
    #[serde(default)]
    pub known_place: Option<String>,
    /// Not part of the fingerprint.
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl LocationState {
    pub fn coordinates_valid(latitude: f64, longitude: f64) -> bool {
        latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
    }
}

impl fmt::Display for LocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
        } else {
            write!(f, "{} ({:.4}, {:.4})", self.display_name, self.latitude, self.longitude)
        }
    }
}
