//! Drawing surfaces the renderer paints onto.
//!
//! [`Surface`] is the small subset of a 2D canvas the scope needs: filled
//! rectangles and stroked polylines. [`DisplayList`] records the calls so a
//! host can replay them on its own canvas, [`PixelSurface`] rasterises them
//! into an RGBA buffer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, ScopeError};

/// 8-bit RGBA colour. Serialises as a `#rrggbb` / `#rrggbbaa` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 0xff)
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let invalid = || ScopeError::InvalidColor(hex.to_string());
        let digits = hex.strip_prefix('#').ok_or_else(invalid)?;
        if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
        };

        match digits.len() {
            3 => {
                let short = |i: usize| channel(i..i + 1).map(|v| v * 0x11);
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self::rgba(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 0xff {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Line colour and thickness for [`Surface::stroke_polyline`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

/// Target of the renderer. Sizes are fixed for the lifetime of the surface.
pub trait Surface {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Called once before every full repaint.
    fn begin_frame(&mut self) {}

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Strokes an open polyline through `points`. Fewer than two points
    /// draw nothing.
    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke);
}

/// A single recorded drawing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    FillRect { rect: Rect, color: Color },
    StrokePolyline { points: Vec<Point>, stroke: Stroke },
}

/// Surface that records the calls of the latest frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayList {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Surface for DisplayList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) {
        self.commands.clear();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke) {
        self.commands.push(DrawCommand::StrokePolyline {
            points: points.to_vec(),
            stroke,
        });
    }
}

/// RGBA8 raster surface. Colours are written without blending.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Raw RGBA bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[offset..offset + 4];
        Some(Color::rgba(px[0], px[1], px[2], px[3]))
    }

    /// Fills the pixels whose centres fall inside `[x0, x1) x [y0, y1)`,
    /// clipped to the surface. Spans thinner than a pixel still cover one.
    fn fill_span(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Color) {
        let (cols, rows) = (
            pixel_span(x0, x1, self.width),
            pixel_span(y0, y1, self.height),
        );
        let (Some(cols), Some(rows)) = (cols, rows) else {
            return;
        };

        let rgba = [color.r, color.g, color.b, color.a];
        let stride = self.width as usize * 4;
        for y in rows {
            let row = &mut self.pixels[y * stride..(y + 1) * stride];
            for x in cols.clone() {
                row[x * 4..x * 4 + 4].copy_from_slice(&rgba);
            }
        }
    }

    fn draw_segment(&mut self, from: Point, to: Point, stroke: Stroke) {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        let half = stroke.width * 0.5;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = from.x + dx * t;
            let y = from.y + dy * t;
            self.fill_span(x - half, y - half, x + half, y + half, stroke.color);
        }
    }
}

fn pixel_span(start: f32, end: f32, limit: u32) -> Option<std::ops::Range<usize>> {
    if !start.is_finite() || !end.is_finite() {
        return None;
    }
    let first = start.round();
    let last = end.round().max(first + 1.0);
    let first = first.max(0.0);
    let last = last.min(limit as f32);
    (first < last).then(|| first as usize..last as usize)
}

impl Surface for PixelSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.fill_span(
            rect.x,
            rect.y,
            rect.x + rect.width,
            rect.y + rect.height,
            color,
        );
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: Stroke) {
        for pair in points.windows(2) {
            self.draw_segment(pair[0], pair[1], stroke);
        }
    }
}

impl fmt::Debug for PixelSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
