/*
 *  render/vframebuf.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime-sized 1-bit canvas, packed for the panel
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
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PointsIter, Rectangle};

use crate::frame::FrameGeometry;

/// A runtime-sized monochrome framebuffer for embedded-graphics.
#[derive(Debug, Clone)]
pub struct MonoFrameBuf {
    buf: Vec<BinaryColor>,
    w: usize,
    h: usize,
}

impl MonoFrameBuf {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![BinaryColor::Off; w * h], w, h }
    }

    pub fn width(&self) -> usize { self.w }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::mono(self.w as u32, self.h as u32)
    }

    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    #[cfg(test)]
    fn pixel(&self, p: Point) -> Option<BinaryColor> {
        self.idx(p).map(|i| self.buf[i])
    }

    /// Fill an area solid, or with a 2x2 checker (50% ordered dither).
    pub fn fill_area(&mut self, area: &Rectangle, dither: bool) {
        for p in area.points() {
            let on = !dither || (p.x + p.y) % 2 == 0;
            if let Some(i) = self.idx(p) {
                self.buf[i] = if on { BinaryColor::On } else { BinaryColor::Off };
            }
        }
    }

    /// Rows MSB-first (leftmost pixel in bit 7), each row padded to a whole byte.
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        let stride = self.w.div_ceil(8);
        let mut bytes = vec![0u8; stride * self.h];
        for (row, pixels) in self.buf.chunks(self.w.max(1)).enumerate() {
            let base = row * stride;
            for (x, pixel) in pixels.iter().enumerate() {
                if pixel.is_on() {
                    bytes[base + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        bytes
    }
}

impl OriginDimensions for MonoFrameBuf {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for MonoFrameBuf {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }
}
