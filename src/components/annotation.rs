use egui::Pos2;
use image::{Rgba, RgbaImage};

use crate::colormap::Colormap;
use crate::components::brush::BrushEngine;
use crate::ops::ingest::RawSlice;

/// Integer world points visited between `from` and `to`.
///
/// Coincident endpoints yield the single point `from`.  Otherwise, with
/// `d = |to - from|` and `a = atan2(dx, dy)`, points are
/// `from + i * (sin a, cos a)` for `i` in `[0, d)`, rounded to the nearest
/// pixel.  `to` itself is left for the next segment (or the final stamp on
/// release), so consecutive segments never double-stamp their joint.
pub fn stroke_points(from: Pos2, to: Pos2) -> Vec<[i32; 2]> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist < 1e-3 {
        return vec![[from.x.round() as i32, from.y.round() as i32]];
    }
    let angle = dx.atan2(dy);
    let (sin, cos) = angle.sin_cos();
    let steps = dist.ceil() as usize;
    (0..steps)
        .map(|i| {
            let t = i as f32;
            [(from.x + sin * t).round() as i32, (from.y + cos * t).round() as i32]
        })
        .collect()
}

/// The locally painted annotation for the current slice.
///
/// Local strokes give immediate feedback; whenever the backend sends its
/// authoritative slice the raster is rebuilt from it and every local stroke
/// is dropped.
pub struct AnnotationSurface {
    raster: RgbaImage,
    /// Last authoritative slice, re-rendered on colormap edits.
    server: Option<RawSlice>,
}

impl Default for AnnotationSurface {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl AnnotationSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: RgbaImage::new(width, height),
            server: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn is_empty(&self) -> bool {
        self.raster.width() == 0 || self.raster.height() == 0
    }

    /// Clear to transparent at the given dimensions and forget the server slice.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.raster = RgbaImage::new(width, height);
        self.server = None;
    }

    pub fn clear(&mut self) {
        let (w, h) = self.raster.dimensions();
        self.reset(w, h);
    }

    /// Stamp the segment `prev → cur` (or a single stamp at `cur` when there is
    /// no previous point) and return the stamped points.  Nothing is stamped
    /// when the brush is in `None` mode or the surface is empty.
    pub fn draw(&mut self, brush: &BrushEngine, prev: Option<Pos2>, cur: Pos2) -> Vec<[i32; 2]> {
        if self.is_empty() || brush.mode().wire_name().is_none() {
            return Vec::new();
        }
        let points = stroke_points(prev.unwrap_or(cur), cur);
        for [x, y] in &points {
            brush.stamp_at(&mut self.raster, *x, *y);
        }
        points
    }

    /// Draw a thin line `from → to` in `color`, two pixels wide.  Used for the
    /// local echo of a lasso outline; nothing is submitted.
    pub fn trace(&mut self, from: Pos2, to: Pos2, color: Rgba<u8>) {
        if self.is_empty() {
            return;
        }
        let (w, h) = (self.raster.width() as i32, self.raster.height() as i32);
        for [x, y] in stroke_points(from, to).into_iter().chain(std::iter::once([
            to.x.round() as i32,
            to.y.round() as i32,
        ])) {
            for (tx, ty) in [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)] {
                if tx >= 0 && ty >= 0 && tx < w && ty < h {
                    self.raster.put_pixel(tx as u32, ty as u32, color);
                }
            }
        }
    }

    /// Replace the raster with the backend's per-pixel label ids.  Negative
    /// ids are unset; every other id maps through `colormap` at its alpha.
    pub fn replace_from_server(&mut self, slice: RawSlice, colormap: &Colormap) {
        self.raster = Self::render(&slice, colormap);
        self.server = Some(slice);
    }

    /// Re-render the last authoritative slice after a colormap change.
    /// Returns false when no server slice has been received for this slice.
    pub fn recolor(&mut self, colormap: &Colormap) -> bool {
        match &self.server {
            Some(slice) => {
                self.raster = Self::render(slice, colormap);
                true
            }
            None => false,
        }
    }

    fn render(slice: &RawSlice, colormap: &Colormap) -> RgbaImage {
        RgbaImage::from_fn(slice.width, slice.height, |x, y| {
            let i = (y * slice.width + x) as usize;
            let id = slice.data.label_at(i);
            if id < 0 {
                Rgba([0, 0, 0, 0])
            } else {
                colormap.rgba(id as u32, 1.0)
            }
        })
    }
}
