use egui::{Color32, Vec2};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Canvas background behind the image layer (matches the viewer chrome).
pub const BACKGROUND: Rgba<u8> = Rgba([0x30, 0x30, 0x30, 255]);

// ============================================================================
// BLEND MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Standard "over" alpha compositing.
    #[default]
    Normal,
    /// Top color is added to the base; used for tinted masks.
    Additive,
    /// Destination-out: top alpha punches a hole in the base, color ignored.
    Erase,
}

impl BlendMode {
    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Additive => "Additive",
            BlendMode::Erase => "Erase",
        }
    }
}

/// Blend `top` over `base` with the given mode and layer opacity.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel: nothing to blend
    if top[3] == 0 {
        return base;
    }

    // Fast path: Normal blend, full opacity, fully opaque top pixel: just overwrite
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Additive => (
            (base_r + top_r).min(1.0),
            (base_g + top_g).min(1.0),
            (base_b + top_b).min(1.0),
        ),
        BlendMode::Erase => {
            let out_a = base_a * (1.0 - top_a);
            if out_a * 255.0 < 0.5 {
                return Rgba([0, 0, 0, 0]);
            }
            return Rgba([base[0], base[1], base[2], (out_a * 255.0).round() as u8]);
        }
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).clamp(0.0, 255.0) as u8,
        (out_g * 255.0).clamp(0.0, 255.0) as u8,
        (out_b * 255.0).clamp(0.0, 255.0) as u8,
        (out_a * 255.0).clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// LAYERS
// ============================================================================

/// The six fixed layers of a slice canvas, listed bottom to top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Image,
    Preview,
    Superpixel,
    Label,
    Annotation,
    BrushCursor,
}

impl LayerKind {
    /// Z-order, bottom first.
    pub fn all() -> &'static [LayerKind] {
        &[
            LayerKind::Image,
            LayerKind::Preview,
            LayerKind::Superpixel,
            LayerKind::Label,
            LayerKind::Annotation,
            LayerKind::BrushCursor,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Image => "Image",
            LayerKind::Preview => "Preview",
            LayerKind::Superpixel => "Superpixel",
            LayerKind::Label => "Label",
            LayerKind::Annotation => "Annotation",
            LayerKind::BrushCursor => "Brush Cursor",
        }
    }

    fn index(self) -> usize {
        match self {
            LayerKind::Image => 0,
            LayerKind::Preview => 1,
            LayerKind::Superpixel => 2,
            LayerKind::Label => 3,
            LayerKind::Annotation => 4,
            LayerKind::BrushCursor => 5,
        }
    }
}

/// A positioned raster element.  `position` is the world coordinate of the
/// raster's top-left corner and `scale` the world size of one raster pixel.
pub struct Layer {
    pub kind: LayerKind,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Multiplied into every sample; `Color32::WHITE` leaves colors untouched.
    pub tint: Color32,
    pub position: Vec2,
    pub scale: f32,
    pub pixels: RgbaImage,
}

impl Layer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            tint: Color32::WHITE,
            position: Vec2::ZERO,
            scale: 1.0,
            pixels: RgbaImage::new(0, 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    /// Drop the raster, leaving an empty transparent layer.
    pub fn clear(&mut self) {
        self.pixels = RgbaImage::new(0, 0);
    }

    /// Nearest-neighbour sample at a world position, tint applied.
    pub fn sample(&self, wx: f32, wy: f32) -> Option<Rgba<u8>> {
        if self.is_empty() || self.scale <= 0.0 {
            return None;
        }
        let lx = ((wx - self.position.x) / self.scale).floor();
        let ly = ((wy - self.position.y) / self.scale).floor();
        if lx < 0.0 || ly < 0.0 {
            return None;
        }
        let (lx, ly) = (lx as u32, ly as u32);
        if lx >= self.pixels.width() || ly >= self.pixels.height() {
            return None;
        }
        let p = *self.pixels.get_pixel(lx, ly);
        if self.tint == Color32::WHITE {
            return Some(p);
        }
        let t = self.tint;
        Some(Rgba([
            ((p[0] as u16 * t.r() as u16) / 255) as u8,
            ((p[1] as u16 * t.g() as u16) / 255) as u8,
            ((p[2] as u16 * t.b() as u16) / 255) as u8,
            p[3],
        ]))
    }
}

// ============================================================================
// LAYER STACK
// ============================================================================

/// Fixed, z-ordered set of canvas layers.
///
/// Every mutable access bumps `generation`, so a renderer can skip
/// recompositing and re-uploading when nothing changed since its last frame.
pub struct LayerStack {
    layers: Vec<Layer>,
    generation: u64,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStack {
    pub fn new() -> Self {
        let mut layers: Vec<Layer> = LayerKind::all().iter().map(|k| Layer::new(*k)).collect();

        let superpixel = &mut layers[LayerKind::Superpixel.index()];
        superpixel.tint = Color32::from_rgb(255, 0, 0);
        superpixel.opacity = 0.3;
        superpixel.blend_mode = BlendMode::Additive;

        layers[LayerKind::Preview.index()].visible = false;
        layers[LayerKind::BrushCursor.index()].opacity = 0.5;

        Self { layers, generation: 0 }
    }

    pub fn get(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    pub fn get_mut(&mut self, kind: LayerKind) -> &mut Layer {
        self.generation = self.generation.wrapping_add(1);
        &mut self.layers[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mark_dirty(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn set_pixels(&mut self, kind: LayerKind, pixels: RgbaImage) {
        self.get_mut(kind).pixels = pixels;
    }

    pub fn clear(&mut self, kind: LayerKind) {
        self.get_mut(kind).clear();
    }

    pub fn set_visible(&mut self, kind: LayerKind, visible: bool) {
        self.get_mut(kind).visible = visible;
    }

    pub fn set_opacity(&mut self, kind: LayerKind, opacity: f32) {
        self.get_mut(kind).opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn set_tint(&mut self, kind: LayerKind, tint: Color32) {
        self.get_mut(kind).tint = tint;
    }

    /// Composite every visible layer over `BACKGROUND` into a `width`×`height`
    /// world-space raster (one output pixel per world unit).  Rows are
    /// processed in parallel.
    pub fn composite(&self, width: u32, height: u32) -> RgbaImage {
        let mut out = RgbaImage::new(width, height);
        if width == 0 || height == 0 {
            return out;
        }
        let visible: Vec<&Layer> = self
            .layers
            .iter()
            .filter(|l| l.visible && !l.is_empty() && l.opacity > 0.0)
            .collect();

        let stride = width as usize * 4;
        out.as_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let wy = y as f32 + 0.5;
                for x in 0..width as usize {
                    let wx = x as f32 + 0.5;
                    let mut px = BACKGROUND;
                    for layer in &visible {
                        if let Some(top) = layer.sample(wx, wy) {
                            px = blend_pixel(px, top, layer.blend_mode, layer.opacity);
                        }
                    }
                    row[x * 4..x * 4 + 4].copy_from_slice(&px.0);
                }
            });
        out
    }
}
