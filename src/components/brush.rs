use egui::Pos2;
use image::{Rgba, RgbaImage};

use crate::canvas::{BlendMode, blend_pixel};
use crate::colormap::Colormap;

/// Smallest brush that still produces a visible stamp.
pub const MIN_BRUSH_SIZE: u32 = 2;

/// Neutral stamp color used in erase mode.  Only its alpha matters.
const ERASE_STAMP: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// What a brush stroke does to the annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushMode {
    #[default]
    Draw,
    Erase,
    /// Brush disabled: no stamps, no cursor.
    None,
}

impl BrushMode {
    pub fn label(&self) -> &'static str {
        match self {
            BrushMode::Draw => "Draw",
            BrushMode::Erase => "Erase",
            BrushMode::None => "None",
        }
    }

    pub fn all() -> &'static [BrushMode] {
        &[BrushMode::Draw, BrushMode::Erase, BrushMode::None]
    }

    /// Name the backend expects in a stroke submission.
    pub fn wire_name(&self) -> Option<&'static str> {
        match self {
            BrushMode::Draw => Some("draw_brush"),
            BrushMode::Erase => Some("erase_brush"),
            BrushMode::None => None,
        }
    }

    pub fn blend_mode(&self) -> BlendMode {
        match self {
            BrushMode::Erase => BlendMode::Erase,
            _ => BlendMode::Normal,
        }
    }
}

/// Pre-rasterized filled circle on an odd `2 * half + 1` grid.  Pixel
/// `(sx, sy)` of `image` lands on world pixel `(x - half + sx, y - half + sy)`
/// when stamped at integer `(x, y)`, so the disc is centered on pixel `(x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Stamp {
    pub image: RgbaImage,
    pub half: i32,
}

impl Stamp {
    /// Rasterize a disc of `radius` around the center of pixel (0, 0).
    /// A pixel is covered when its center lies inside the disc.
    fn circle(radius: f32, color: Rgba<u8>) -> Self {
        let half = radius.ceil().max(1.0) as i32;
        let side = (half * 2 + 1) as u32;
        let r_sq = radius * radius;
        let image = RgbaImage::from_fn(side, side, |sx, sy| {
            let dx = (sx as i32 - half) as f32;
            let dy = (sy as i32 - half) as f32;
            if dx * dx + dy * dy <= r_sq {
                color
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        Self { image, half }
    }

    /// Number of covered pixels.
    pub fn area(&self) -> usize {
        self.image.pixels().filter(|p| p[3] > 0).count()
    }
}

/// Brush state and stamp rasterization.
///
/// The stamp is regenerated eagerly on every size/label/mode/colormap change,
/// so `stamp()` is never stale.
pub struct BrushEngine {
    size: u32,
    label: u32,
    mode: BrushMode,
    colormap: Colormap,
    stamp: Stamp,
    cursor: Option<Pos2>,
}

impl BrushEngine {
    pub fn new(size: u32, colormap: Colormap) -> Self {
        let size = size.max(MIN_BRUSH_SIZE);
        let mode = BrushMode::Draw;
        let stamp = Stamp::circle(size as f32 / 2.0, Self::stamp_color(&colormap, 0, mode));
        Self {
            size,
            label: 0,
            mode,
            colormap,
            stamp,
            cursor: None,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn radius(&self) -> f32 {
        self.size as f32 / 2.0
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    pub fn mode(&self) -> BrushMode {
        self.mode
    }

    pub fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    pub fn stamp(&self) -> &Stamp {
        &self.stamp
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = size.max(MIN_BRUSH_SIZE);
        self.regenerate();
    }

    pub fn grow(&mut self) {
        self.set_size(self.size.saturating_add(1));
    }

    pub fn shrink(&mut self) {
        self.set_size(self.size.saturating_sub(1));
    }

    pub fn set_label(&mut self, label: u32) {
        self.label = label;
        self.regenerate();
    }

    pub fn set_mode(&mut self, mode: BrushMode) {
        self.mode = mode;
        self.regenerate();
    }

    pub fn set_colormap(&mut self, colormap: Colormap) {
        self.colormap = colormap;
        self.regenerate();
    }

    fn stamp_color(colormap: &Colormap, label: u32, mode: BrushMode) -> Rgba<u8> {
        match mode {
            BrushMode::Draw => colormap.rgba(label, 1.0),
            BrushMode::Erase | BrushMode::None => ERASE_STAMP,
        }
    }

    fn regenerate(&mut self) {
        let color = Self::stamp_color(&self.colormap, self.label, self.mode);
        self.stamp = Stamp::circle(self.radius(), color);
    }

    /// Composite one stamp centered on `(x, y)` into `target`, clipped to its
    /// bounds.  Draw blends normally; erase subtracts alpha.  Returns false in
    /// `None` mode.
    pub fn stamp_at(&self, target: &mut RgbaImage, x: i32, y: i32) -> bool {
        if self.mode == BrushMode::None {
            return false;
        }
        let blend = self.mode.blend_mode();
        let (w, h) = (target.width() as i32, target.height() as i32);
        let ox = x - self.stamp.half;
        let oy = y - self.stamp.half;
        for (sx, sy, src) in self.stamp.image.enumerate_pixels() {
            if src[3] == 0 {
                continue;
            }
            let tx = ox + sx as i32;
            let ty = oy + sy as i32;
            if tx < 0 || ty < 0 || tx >= w || ty >= h {
                continue;
            }
            let dst = target.get_pixel_mut(tx as u32, ty as u32);
            *dst = blend_pixel(*dst, *src, blend, 1.0);
        }
        true
    }

    // ========================================================================
    // CURSOR
    // ========================================================================

    pub fn move_cursor(&mut self, world: Pos2) {
        self.cursor = Some(world);
    }

    pub fn hide_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn cursor(&self) -> Option<Pos2> {
        self.cursor
    }

    /// Cursor raster and its world-space top-left corner, or `None` when the
    /// cursor is hidden (no pointer, or brush in `None` mode).
    pub fn cursor_raster(&self) -> Option<(RgbaImage, Pos2)> {
        if self.mode == BrushMode::None {
            return None;
        }
        let at = self.cursor?;
        let x = at.x.round() - self.stamp.half as f32;
        let y = at.y.round() - self.stamp.half as f32;
        Some((self.stamp.image.clone(), Pos2::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brush() -> BrushEngine {
        BrushEngine::new(4, Colormap::new(vec![[0, 0, 0], [255, 0, 0], [0, 255, 0]]))
    }

    #[test]
    fn size_is_clamped_to_minimum() {
        let mut b = brush();
        b.set_size(0);
        assert_eq!(b.size(), MIN_BRUSH_SIZE);
        b.shrink();
        assert_eq!(b.size(), MIN_BRUSH_SIZE);
        b.grow();
        assert_eq!(b.size(), 3);
    }

    #[test]
    fn resize_and_restore_is_exact() {
        let mut b = brush();
        let orig = b.size();
        let stamp = b.stamp().clone();
        b.set_size(17);
        assert_eq!(b.radius(), 8.5);
        b.set_size(orig);
        assert_eq!(b.radius(), 2.0);
        assert_eq!(b.stamp(), &stamp);
    }

    #[test]
    fn stamp_color_follows_label_in_draw_mode_only() {
        let mut b = brush();
        b.set_label(4);
        let c = *b.stamp().image.get_pixel(2, 2);
        assert_eq!(c, Rgba([255, 0, 0, 255]));

        b.set_mode(BrushMode::Erase);
        assert_eq!(*b.stamp().image.get_pixel(2, 2), ERASE_STAMP);

        b.set_mode(BrushMode::None);
        b.move_cursor(Pos2::new(3.0, 3.0));
        assert!(b.cursor_raster().is_none());
    }

    #[test]
    fn stamp_is_centered_on_point() {
        let b = brush();
        let mut target = RgbaImage::new(20, 20);
        assert!(b.stamp_at(&mut target, 10, 10));
        let row: Vec<u32> = (0..20).filter(|&x| target.get_pixel(x, 10)[3] > 0).collect();
        let col: Vec<u32> = (0..20).filter(|&y| target.get_pixel(10, y)[3] > 0).collect();
        assert_eq!(row, vec![8, 9, 10, 11, 12]);
        assert_eq!(col, row);
        let covered = |dx: i32, dy: i32| target.get_pixel((10 + dx) as u32, (10 + dy) as u32)[3] > 0;
        for dy in -3..=3 {
            for dx in -3..=3 {
                assert_eq!(covered(dx, dy), covered(-dx, dy));
                assert_eq!(covered(dx, dy), covered(dx, -dy));
            }
        }
    }

    #[test]
    fn stamp_clips_at_raster_edge() {
        let b = brush();
        let mut target = RgbaImage::new(4, 4);
        assert!(b.stamp_at(&mut target, 0, 0));
        assert!(target.get_pixel(0, 0)[3] > 0);
        assert_eq!(target.get_pixel(3, 3)[3], 0);
    }
}
