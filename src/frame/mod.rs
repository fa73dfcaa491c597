/*
 *  frame/mod.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame cache subsystem
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

pub mod cache;
pub mod options;
pub mod snapshot;
pub mod wake;

pub use cache::FrameCache;
pub use options::{clamp_battery, RenderOptions};
pub use snapshot::{quote_etag, FrameGeometry, FrameSnapshot};
pub use wake::{WakeReason, WakeSignal};
