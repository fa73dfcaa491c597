/*
 *  render/mod.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Renderer interface used by the refresh worker
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

pub mod status_page;
pub mod vframebuf;

use std::future::Future;
use thiserror::Error;

use crate::frame::{FrameGeometry, RenderOptions};
use crate::state::{LocationState, MusicState};

pub use status_page::StatusPageRenderer;
pub use vframebuf::MonoFrameBuf;

/// Packed pixels plus the layout needed to interpret them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub bytes: Vec<u8>,
    pub geometry: FrameGeometry,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid frame geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("Render task failed: {0}")]
    Task(String),
    #[error("Render timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub trait FrameRenderer: Send + Sync + 'static {
    fn render(
        &self,
        music: Option<&MusicState>,
        location: Option<&LocationState>,
        options: RenderOptions,
    ) -> impl Future<Output = Result<RenderedFrame, RenderError>> + Send;
}

impl<T: FrameRenderer> FrameRenderer for std::sync::Arc<T> {
    async fn render(
        &self,
        music: Option<&MusicState>,
        location: Option<&LocationState>,
        options: RenderOptions,
    ) -> Result<RenderedFrame, RenderError> {
        self.as_ref().render(music, location, options).await
    }
}
