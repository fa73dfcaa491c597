/*
 *  lib.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Frame cache and refresh coordinator for low refresh e-ink panels
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

pub mod config;
pub mod deutils;
pub mod fingerprint;
pub mod frame;
pub mod http;
pub mod render;
pub mod sources;
pub mod state;
pub mod worker;

pub use frame::{FrameCache, FrameSnapshot, RenderOptions, WakeReason};
pub use render::{FrameRenderer, RenderError, RenderedFrame};
pub use sources::{LocationSource, MusicSource, SourceError};
pub use state::{LocationState, MusicState};
pub use worker::{CycleOutcome, RefreshConfig, RefreshWorker};
