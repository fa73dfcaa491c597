/*
 *  frame/snapshot.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  One published, immutable frame plus its metadata
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
use serde::Serialize;
use std::time::Duration;

/// Pixel layout of a packed frame, owned by the renderer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub bytes_per_line: u32,
}

impl FrameGeometry {
    /// 1 bit per pixel, rows padded to a whole byte.
    pub fn mono(width: u32, height: u32) -> Self {
        Self { width, height, bytes_per_line: width.div_ceil(8) }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes_per_line as usize * self.height as usize
    }
}

/// Never mutated after publication; a new render replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub frame_bytes: Vec<u8>,
    pub geometry: FrameGeometry,
    pub source_hash: String,
    /// `source_hash` in double quotes (strong ETag).
    pub etag: String,
    pub device_battery_percent: u8,
    pub render_duration: Duration,
    pub rendered_at: DateTime<Utc>,
    pub render_reason: String,
    pub dithered: bool,
}

impl FrameSnapshot {
    pub fn render_duration_ms(&self) -> f64 {
        self.render_duration.as_secs_f64() * 1000.0
    }
}

pub fn quote_etag(source_hash: &str) -> String {
    format!("\"{source_hash}\"")
}
