/*
 *  frame/options.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Caller-requested render options
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

use serde::Serialize;

/// Render preferences the device asked for. Battery is always 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderOptions {
    pub dither: bool,
    pub device_battery_percent: u8,
}

impl RenderOptions {
    pub fn new(dither: bool, device_battery_percent: i64) -> Self {
        Self {
            dither,
            device_battery_percent: clamp_battery(device_battery_percent),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        // unknown battery reads as full so the gauge is not alarming
        Self { dither: false, device_battery_percent: 100 }
    }
}

#[inline]
pub fn clamp_battery(pct: i64) -> u8 {
    pct.clamp(0, 100) as u8
}
