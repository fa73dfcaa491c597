/*
 *  sources/mod.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  State providers consumed by the refresh worker
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

pub mod lms;
pub mod location;

use std::future::Future;
use thiserror::Error;

use crate::state::{LocationState, MusicState};

pub use lms::{LmsClient, LmsClientError, LmsMusicSource};
pub use location::LocationStore;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("LMS: {0}")]
    Lms(#[from] LmsClientError),
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// `Ok(None)` means "nothing to show", which is a valid state, not an error.
pub trait MusicSource: Send + Sync + 'static {
    fn current_music_state(&self) -> impl Future<Output = Result<Option<MusicState>, SourceError>> + Send;
}

pub trait LocationSource: Send + Sync + 'static {
    fn current_location_state(&self) -> impl Future<Output = Result<Option<LocationState>, SourceError>> + Send;
}

// an unconfigured source is simply always empty
impl<T: MusicSource> MusicSource for Option<T> {
    async fn current_music_state(&self) -> Result<Option<MusicState>, SourceError> {
        match self {
            Some(source) => source.current_music_state().await,
            None => Ok(None),
        }
    }
}

impl<T: LocationSource> LocationSource for Option<T> {
    async fn current_location_state(&self) -> Result<Option<LocationState>, SourceError> {
        match self {
            Some(source) => source.current_location_state().await,
            None => Ok(None),
        }
    }
}

impl<T: MusicSource> MusicSource for std::sync::Arc<T> {
    async fn current_music_state(&self) -> Result<Option<MusicState>, SourceError> {
        self.as_ref().current_music_state().await
    }
}

impl<T: LocationSource> LocationSource for std::sync::Arc<T> {
    async fn current_location_state(&self) -> Result<Option<LocationState>, SourceError> {
        self.as_ref().current_location_state().await
    }
}
