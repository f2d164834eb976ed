// ============================================================================
// SLICE INGEST: numeric slice samples to display rasters
// ============================================================================

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::colormap::Colormap;

/// Fixed alpha of the label overlay before the per-label alpha is applied.
pub const LABEL_OVERLAY_ALPHA: f32 = 0.5;

/// Typed sample buffer of one slice, row-major.
#[derive(Clone, Debug, PartialEq)]
pub enum SliceData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
    I32(Vec<i32>),
}

impl SliceData {
    pub fn len(&self) -> usize {
        match self {
            SliceData::U8(v) => v.len(),
            SliceData::U16(v) => v.len(),
            SliceData::F32(v) => v.len(),
            SliceData::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype_name(&self) -> &'static str {
        match self {
            SliceData::U8(_) => "u8",
            SliceData::U16(_) => "u16",
            SliceData::F32(_) => "f32",
            SliceData::I32(_) => "i32",
        }
    }

    /// Sample `i` as an integer label id.  Floats truncate toward zero.
    pub fn label_at(&self, i: usize) -> i64 {
        match self {
            SliceData::U8(v) => v[i] as i64,
            SliceData::U16(v) => v[i] as i64,
            SliceData::F32(v) => v[i] as i64,
            SliceData::I32(v) => v[i] as i64,
        }
    }
}

/// One decoded slice as received from the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSlice {
    pub width: u32,
    pub height: u32,
    pub data: SliceData,
}

impl RawSlice {
    /// `None` when the buffer length does not match `width * height`.
    pub fn new(width: u32, height: u32, data: SliceData) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn labels(&self) -> Vec<i64> {
        (0..self.data.len()).map(|i| self.data.label_at(i)).collect()
    }
}

/// Display contrast window as fractions of the full 16-bit range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContrastWindow {
    pub min: f32,
    pub max: f32,
}

impl Default for ContrastWindow {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ContrastWindow {
    /// Window with the bounds clamped to [0, 1] and ordered.
    pub fn new(min: f32, max: f32) -> Self {
        let (a, b) = (min.clamp(0.0, 1.0), max.clamp(0.0, 1.0));
        if a <= b { Self { min: a, max: b } } else { Self { min: b, max: a } }
    }
}

fn unit_to_u8(v: f32) -> u8 {
    (255.0 * v.clamp(0.0, 1.0)).round() as u8
}

/// 16-bit sample under the window.  A zero-width window thresholds at `min`.
pub fn normalize_u16(v: u16, window: ContrastWindow) -> u8 {
    let lo = window.min * 65535.0;
    let span = (window.max - window.min) * 65535.0;
    if span <= 0.0 {
        return if v as f32 >= lo { 255 } else { 0 };
    }
    unit_to_u8((v as f32 - lo) / span)
}

/// Convert a slice to 8-bit grey.
///
/// * u8 : pass-through
/// * u16: window normalization
/// * f32: assumed normalized, clamped to 0..1
/// * i32: stretched over the slice's own min..max; flat slices are mid-grey
pub fn to_display_gray(raw: &RawSlice, window: ContrastWindow) -> GrayImage {
    let out: Vec<u8> = match &raw.data {
        SliceData::U8(v) => v.clone(),
        SliceData::U16(v) => v.par_iter().map(|&s| normalize_u16(s, window)).collect(),
        SliceData::F32(v) => v.par_iter().map(|&s| unit_to_u8(s)).collect(),
        SliceData::I32(v) => {
            let lo = v.par_iter().copied().min().unwrap_or(0);
            let hi = v.par_iter().copied().max().unwrap_or(0);
            if lo == hi {
                vec![128; v.len()]
            } else {
                let span = (hi as f64 - lo as f64) as f32;
                v.par_iter()
                    .map(|&s| unit_to_u8((s as f64 - lo as f64) as f32 / span))
                    .collect()
            }
        }
    };
    GrayImage::from_raw(raw.width, raw.height, out)
        .unwrap_or_else(|| GrayImage::new(0, 0))
}

// ============================================================================
// IMAGE COLORMAPS: 256-entry pseudo-color lookup tables
// ============================================================================

/// Pseudo-color map applied to the grey image and preview layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ImageColormap {
    #[default]
    Greys,
    Viridis,
    Inferno,
    Magma,
    Plasma,
    Jet,
    Hot,
    Bone,
}

impl ImageColormap {
    pub fn all() -> &'static [ImageColormap] {
        &[
            ImageColormap::Greys,
            ImageColormap::Viridis,
            ImageColormap::Inferno,
            ImageColormap::Magma,
            ImageColormap::Plasma,
            ImageColormap::Jet,
            ImageColormap::Hot,
            ImageColormap::Bone,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ImageColormap::Greys => "greys",
            ImageColormap::Viridis => "viridis",
            ImageColormap::Inferno => "inferno",
            ImageColormap::Magma => "magma",
            ImageColormap::Plasma => "plasma",
            ImageColormap::Jet => "jet",
            ImageColormap::Hot => "hot",
            ImageColormap::Bone => "bone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.name().eq_ignore_ascii_case(s.trim()))
    }

    /// Control points `(position, rgb)` with positions ascending over 0..=1.
    fn stops(&self) -> &'static [(f32, [u8; 3])] {
        match self {
            ImageColormap::Greys => &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])],
            ImageColormap::Viridis => &[
                (0.0, [68, 1, 84]),
                (0.25, [59, 82, 139]),
                (0.5, [33, 145, 140]),
                (0.75, [94, 201, 98]),
                (1.0, [253, 231, 37]),
            ],
            ImageColormap::Inferno => &[
                (0.0, [0, 0, 4]),
                (0.25, [87, 16, 110]),
                (0.5, [188, 55, 84]),
                (0.75, [249, 142, 9]),
                (1.0, [252, 255, 164]),
            ],
            ImageColormap::Magma => &[
                (0.0, [0, 0, 4]),
                (0.25, [81, 18, 124]),
                (0.5, [183, 55, 121]),
                (0.75, [252, 137, 97]),
                (1.0, [252, 253, 191]),
            ],
            ImageColormap::Plasma => &[
                (0.0, [13, 8, 135]),
                (0.25, [126, 3, 168]),
                (0.5, [204, 71, 120]),
                (0.75, [248, 149, 64]),
                (1.0, [240, 249, 33]),
            ],
            ImageColormap::Jet => &[
                (0.0, [0, 0, 131]),
                (0.125, [0, 60, 170]),
                (0.375, [5, 255, 255]),
                (0.625, [255, 255, 0]),
                (0.875, [250, 0, 0]),
                (1.0, [128, 0, 0]),
            ],
            ImageColormap::Hot => &[
                (0.0, [0, 0, 0]),
                (0.3, [230, 0, 0]),
                (0.6, [255, 210, 0]),
                (1.0, [255, 255, 255]),
            ],
            ImageColormap::Bone => &[
                (0.0, [0, 0, 0]),
                (0.376, [84, 84, 116]),
                (0.753, [169, 200, 200]),
                (1.0, [255, 255, 255]),
            ],
        }
    }

    /// Color of normalized intensity `t`, linearly interpolated between stops.
    pub fn sample(&self, t: f32) -> [u8; 3] {
        let t = t.clamp(0.0, 1.0);
        let stops = self.stops();
        let hi = stops.iter().position(|(p, _)| *p >= t).unwrap_or(stops.len() - 1);
        if hi == 0 {
            return stops[0].1;
        }
        let (p0, c0) = stops[hi - 1];
        let (p1, c1) = stops[hi];
        let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * f).round() as u8;
        [mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2])]
    }

    /// One entry per 8-bit grey level.
    pub fn lut(&self) -> [[u8; 3]; 256] {
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = self.sample(i as f32 / 255.0);
        }
        lut
    }
}

/// Expand 8-bit grey to opaque RGBA through `cmap`.
pub fn gray_to_rgba(gray: &GrayImage, cmap: ImageColormap) -> RgbaImage {
    let lut = cmap.lut();
    let mut buf = vec![0u8; gray.as_raw().len() * 4];
    buf.par_chunks_mut(4).zip(gray.as_raw().par_iter()).for_each(|(px, &v)| {
        let [r, g, b] = lut[v as usize];
        px.copy_from_slice(&[r, g, b, 255]);
    });
    RgbaImage::from_raw(gray.width(), gray.height(), buf).unwrap_or_else(|| RgbaImage::new(0, 0))
}

/// Label id per pixel → colored overlay.  Ids ≤ 0 are transparent.
pub fn label_overlay(raw: &RawSlice, colormap: &Colormap) -> RgbaImage {
    let mut buf = vec![0u8; raw.data.len() * 4];
    buf.par_chunks_mut(4).enumerate().for_each(|(i, px)| {
        let id = raw.data.label_at(i);
        if id > 0 {
            let c = colormap.rgba(id as u32, LABEL_OVERLAY_ALPHA);
            px.copy_from_slice(&c.0);
        }
    });
    RgbaImage::from_raw(raw.width, raw.height, buf).unwrap_or_else(|| RgbaImage::new(0, 0))
}

/// Superpixel boundary mask (0/1 samples) scaled to 0..255 grey.  Tint and
/// additive blending are layer properties.
pub fn superpixel_overlay(raw: &RawSlice) -> RgbaImage {
    let mut buf = vec![0u8; raw.data.len() * 4];
    buf.par_chunks_mut(4).enumerate().for_each(|(i, px)| {
        let v = (raw.data.label_at(i).clamp(0, 1) * 255) as u8;
        px.copy_from_slice(&[v, v, v, 255]);
    });
    RgbaImage::from_raw(raw.width, raw.height, buf).unwrap_or_else(|| RgbaImage::new(0, 0))
}

/// Holds the last raw image and preview slices so a contrast or colormap
/// change can re-render them without a fetch.
#[derive(Default)]
pub struct ImageIngestor {
    window: ContrastWindow,
    colormap: ImageColormap,
    image: Option<RawSlice>,
    preview: Option<RawSlice>,
}

impl ImageIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colormap(colormap: ImageColormap) -> Self {
        Self { colormap, ..Self::default() }
    }

    pub fn window(&self) -> ContrastWindow {
        self.window
    }

    pub fn colormap(&self) -> ImageColormap {
        self.colormap
    }

    pub fn image(&self) -> Option<&RawSlice> {
        self.image.as_ref()
    }

    pub fn preview(&self) -> Option<&RawSlice> {
        self.preview.as_ref()
    }

    fn render(&self, raw: &RawSlice) -> RgbaImage {
        gray_to_rgba(&to_display_gray(raw, self.window), self.colormap)
    }

    /// Store the slice and return its display raster.
    pub fn ingest_image(&mut self, raw: RawSlice) -> RgbaImage {
        let out = self.render(&raw);
        self.image = Some(raw);
        out
    }

    pub fn ingest_preview(&mut self, raw: RawSlice) -> RgbaImage {
        let out = self.render(&raw);
        self.preview = Some(raw);
        out
    }

    pub fn clear_preview(&mut self) {
        self.preview = None;
    }

    pub fn clear(&mut self) {
        self.image = None;
        self.preview = None;
    }

    fn rerender(&self) -> (Option<RgbaImage>, Option<RgbaImage>) {
        (
            self.image.as_ref().map(|r| self.render(r)),
            self.preview.as_ref().map(|r| self.render(r)),
        )
    }

    /// Change the window and re-render the stored slices as
    /// `(image, preview)`; either is `None` if never received.
    pub fn set_window(&mut self, window: ContrastWindow) -> (Option<RgbaImage>, Option<RgbaImage>) {
        self.window = window;
        self.rerender()
    }

    /// Change the pseudo-color map; same return shape as `set_window`.
    pub fn set_colormap(&mut self, colormap: ImageColormap) -> (Option<RgbaImage>, Option<RgbaImage>) {
        self.colormap = colormap;
        self.rerender()
    }
}
