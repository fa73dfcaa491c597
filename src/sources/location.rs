/*
 *  sources/location.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Location service - latest webhook fix, else the configured location
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

use chrono::Utc;
use log::{info, warn};
use parking_lot::RwLock;
use thiserror::Error;

use super::{LocationSource, SourceError};
use crate::state::LocationState;

#[derive(Debug, Error, PartialEq)]
pub enum LocationError {
    #[error("Invalid coordinates: {0}, {1}")]
    InvalidCoordinates(f64, f64),
}

#[derive(Debug, Default)]
pub struct LocationStore {
    latest: RwLock<Option<LocationState>>,
    fallback: Option<LocationState>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed location until the first webhook fix arrives.
    pub fn with_fallback(
        latitude: f64,
        longitude: f64,
        name: Option<String>,
    ) -> Result<Self, LocationError> {
        if !LocationState::coordinates_valid(latitude, longitude) {
            warn!("Invalid coordinates in config: {}, {}", latitude, longitude);
            return Err(LocationError::InvalidCoordinates(latitude, longitude));
        }
        let fallback = LocationState {
            latitude,
            longitude,
            display_name: name.unwrap_or_default(),
            hierarchy: Vec::new(),
            known_place: None,
            captured_at: Utc::now(),
        };
        info!("Using location from config: {}", fallback);
        Ok(Self { latest: RwLock::new(None), fallback: Some(fallback) })
    }

    pub fn update(&self, fix: LocationState) -> Result<(), LocationError> {
        if !LocationState::coordinates_valid(fix.latitude, fix.longitude) {
            return Err(LocationError::InvalidCoordinates(fix.latitude, fix.longitude));
        }
        info!("Location update: {}", fix);
        *self.latest.write() = Some(fix);
        Ok(())
    }

    pub fn current(&self) -> Option<LocationState> {
        self.latest.read().clone().or_else(|| self.fallback.clone())
    }
}

impl LocationSource for LocationStore {
    async fn current_location_state(&self) -> Result<Option<LocationState>, SourceError> {
        Ok(self.current())
    }
}
