/*
 *  render/status_page.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Reference renderer - now playing over location, 1-bit
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

use core::convert::Infallible;
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use super::{FrameRenderer, MonoFrameBuf, RenderError, RenderedFrame};
use crate::deutils::ms_to_hms;
use crate::fingerprint::{quantized_battery, quantized_coord, quantized_progress_ms};
use crate::frame::RenderOptions;
use crate::state::{LocationState, MusicState};

const MARGIN: i32 = 8;
const MIN_WIDTH: u32 = 128;
const MIN_HEIGHT: u32 = 64;

#[derive(Debug, Clone)]
pub struct StatusPageRenderer {
    width: u32,
    height: u32,
}

impl StatusPageRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width < MIN_WIDTH || height < MIN_HEIGHT {
            return Err(RenderError::InvalidGeometry { width, height });
        }
        Ok(Self { width, height })
    }

    /// Synchronous draw; the async path runs this on the blocking pool.
    pub fn draw(
        &self,
        music: Option<&MusicState>,
        location: Option<&LocationState>,
        options: RenderOptions,
    ) -> Result<RenderedFrame, RenderError> {
        let mut fb = MonoFrameBuf::new(self.width, self.height);
        let Ok(()) = Page::new(&mut fb, options.dither).draw(music, location, options);

        let geometry = fb.geometry();
        let bytes = fb.to_packed_bytes();
        if bytes.len() != geometry.byte_len() {
            return Err(RenderError::BufferSizeMismatch { expected: geometry.byte_len(), actual: bytes.len() });
        }
        Ok(RenderedFrame { bytes, geometry })
    }
}

impl FrameRenderer for StatusPageRenderer {
    async fn render(
        &self,
        music: Option<&MusicState>,
        location: Option<&LocationState>,
        options: RenderOptions,
    ) -> Result<RenderedFrame, RenderError> {
        let renderer = self.clone();
        let music = music.cloned();
        let location = location.cloned();
        tokio::task::spawn_blocking(move || renderer.draw(music.as_ref(), location.as_ref(), options))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

/// Cut to `max` chars, marking the cut with "..".
fn fit(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 2 {
        return s.chars().take(max).collect();
    }
    let mut out: String = s.chars().take(max - 2).collect();
    out.push_str("..");
    out
}

struct Page<'a> {
    fb: &'a mut MonoFrameBuf,
    dither: bool,
    width: i32,
    y: i32,
}

impl<'a> Page<'a> {
    fn new(fb: &'a mut MonoFrameBuf, dither: bool) -> Self {
        let width = fb.width() as i32;
        Self { fb, dither, width, y: MARGIN }
    }

    fn inner_width(&self) -> i32 {
        self.width - 2 * MARGIN
    }

    fn text(&mut self, s: &str, font: &MonoFont<'_>) -> Result<(), Infallible> {
        let max = (self.inner_width().max(0) as u32 / font.character_size.width.max(1)) as usize;
        let style = MonoTextStyle::new(font, BinaryColor::On);
        Text::with_baseline(&fit(s, max), Point::new(MARGIN, self.y), style, Baseline::Top).draw(&mut *self.fb)?;
        self.y += font.character_size.height as i32 + 4;
        Ok(())
    }

    fn rule(&mut self) -> Result<(), Infallible> {
        Line::new(Point::new(MARGIN, self.y), Point::new(self.width - MARGIN, self.y))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut *self.fb)?;
        self.y += 6;
        Ok(())
    }

    /// Outlined bar with a proportional fill.
    fn bar(&mut self, origin: Point, size: Size, fraction: f32) -> Result<(), Infallible> {
        let outline = Rectangle::new(origin, size);
        outline.into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1)).draw(&mut *self.fb)?;
        let inner_w = size.width.saturating_sub(4);
        let fill_w = (inner_w as f32 * fraction.clamp(0.0, 1.0)).round() as u32;
        if fill_w > 0 {
            let fill = Rectangle::new(origin + Point::new(2, 2), Size::new(fill_w, size.height.saturating_sub(4)));
            self.fb.fill_area(&fill, self.dither);
        }
        Ok(())
    }

    fn header(&mut self, options: RenderOptions) -> Result<(), Infallible> {
        let battery = quantized_battery(options.device_battery_percent);
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        Text::with_baseline("LyMonS", Point::new(MARGIN, self.y), small, Baseline::Top).draw(&mut *self.fb)?;

        // battery gauge, right aligned, with a nub
        let gauge = Size::new(28, 10);
        let origin = Point::new(self.width - MARGIN - gauge.width as i32 - 2, self.y);
        self.bar(origin, gauge, battery as f32 / 100.0)?;
        Rectangle::new(origin + Point::new(gauge.width as i32, 3), Size::new(2, 4))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut *self.fb)?;

        let right = TextStyleBuilder::new().alignment(Alignment::Right).baseline(Baseline::Top).build();
        Text::with_text_style(
            &format!("{}%", battery),
            origin - Point::new(4, 0),
            small,
            right,
        )
        .draw(&mut *self.fb)?;

        self.y += 14;
        self.rule()
    }

    fn music(&mut self, music: Option<&MusicState>) -> Result<(), Infallible> {
        let Some(m) = music else {
            return self.text("Nothing playing", &FONT_10X20);
        };
        self.text(if m.title.is_empty() { "Unknown title" } else { &m.title }, &FONT_10X20)?;
        if !m.artist.is_empty() {
            self.text(&m.artist, &FONT_10X20)?;
        }
        if !m.album.is_empty() {
            self.text(&m.album, &FONT_6X10)?;
        }

        // only bucketed progress is drawn, finer changes do not re-render
        let shown = MusicState { progress_ms: quantized_progress_ms(m.progress_ms), ..m.clone() };
        if shown.duration_ms > 0 {
            let size = Size::new(self.inner_width().max(8) as u32, 10);
            self.bar(Point::new(MARGIN, self.y), size, shown.progress_fraction())?;
            self.y += 14;
        }
        let state = if shown.is_playing { "PLAY" } else { "PAUSE" };
        let times = if shown.duration_ms > 0 {
            format!("{}  {} / {}", state, ms_to_hms(shown.progress_ms), ms_to_hms(shown.duration_ms))
        } else {
            state.to_string()
        };
        self.text(&times, &FONT_6X10)
    }

    fn location(&mut self, location: Option<&LocationState>) -> Result<(), Infallible> {
        let Some(l) = location else {
            return self.text("Location unknown", &FONT_6X10);
        };
        if !l.display_name.is_empty() {
            self.text(&l.display_name, &FONT_10X20)?;
        }
        if !l.hierarchy.is_empty() {
            self.text(&l.hierarchy.join(" / "), &FONT_6X10)?;
        }
        if let Some(place) = l.known_place.as_deref().filter(|p| !p.is_empty()) {
            self.text(&format!("@ {place}"), &FONT_6X10)?;
        }
        self.text(
            &format!("{:.5}, {:.5}", quantized_coord(l.latitude), quantized_coord(l.longitude)),
            &FONT_6X10,
        )
    }

    fn draw(
        &mut self,
        music: Option<&MusicState>,
        location: Option<&LocationState>,
        options: RenderOptions,
    ) -> Result<(), Infallible> {
        self.header(options)?;
        self.music(music)?;
        self.rule()?;
        self.location(location)
    }
}
