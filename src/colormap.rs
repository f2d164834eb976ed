// ============================================================================
// LABEL COLORMAP: cyclic palette mapping label ids to RGB + alpha
// ============================================================================

use image::Rgba;

/// Default palette.  Entry 0 is the background label.
const DEFAULT_PALETTE: [[u8; 3]; 20] = [
    [0, 0, 0],
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
    [210, 245, 60],
    [250, 190, 212],
    [0, 128, 128],
    [220, 190, 255],
    [170, 110, 40],
    [255, 250, 200],
    [128, 0, 0],
    [170, 255, 195],
    [128, 128, 0],
    [255, 215, 180],
    [0, 0, 128],
];

/// Highest label id an edit may address.  Edits past it are ignored.
pub const MAX_LABEL_ID: usize = u16::MAX as usize;

/// A single colormap edit coming from the label table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelColor {
    pub id: usize,
    pub color: [u8; 3],
    pub alpha: f32,
}

/// Ordered, cyclic label palette.  Lookups wrap with `id mod N`.
#[derive(Clone, Debug, PartialEq)]
pub struct Colormap {
    colors: Vec<[u8; 3]>,
    alphas: Vec<f32>,
}

impl Default for Colormap {
    fn default() -> Self {
        Self::new(DEFAULT_PALETTE.to_vec())
    }
}

impl Colormap {
    /// Build a colormap with full opacity for every entry.  An empty list
    /// falls back to a single black entry so lookups never divide by zero.
    pub fn new(colors: Vec<[u8; 3]>) -> Self {
        let colors = if colors.is_empty() { vec![[0, 0, 0]] } else { colors };
        let alphas = vec![1.0; colors.len()];
        Self { colors, alphas }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color(&self, label: u32) -> [u8; 3] {
        self.colors[label as usize % self.colors.len()]
    }

    pub fn alpha(&self, label: u32) -> f32 {
        self.alphas[label as usize % self.alphas.len()]
    }

    /// RGBA for `label` with the label alpha scaled by `layer_alpha`.
    pub fn rgba(&self, label: u32, layer_alpha: f32) -> Rgba<u8> {
        let [r, g, b] = self.color(label);
        let a = (self.alpha(label) * layer_alpha).clamp(0.0, 1.0);
        Rgba([r, g, b, (a * 255.0).round() as u8])
    }

    /// Apply label-table edits.  Ids past the end grow the palette; gap
    /// entries take their default palette color.  Ids above `MAX_LABEL_ID`
    /// are skipped.
    pub fn apply(&mut self, edits: &[LabelColor]) {
        for edit in edits {
            if edit.id > MAX_LABEL_ID {
                log_warn!("Ignoring colormap edit for label {} (max {})", edit.id, MAX_LABEL_ID);
                continue;
            }
            while self.colors.len() <= edit.id {
                let next = DEFAULT_PALETTE[self.colors.len() % DEFAULT_PALETTE.len()];
                self.colors.push(next);
                self.alphas.push(1.0);
            }
            self.colors[edit.id] = edit.color;
            self.alphas[edit.id] = edit.alpha.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_wraps_around() {
        let cmap = Colormap::new(vec![[0, 0, 0], [1, 2, 3], [4, 5, 6]]);
        assert_eq!(cmap.color(1), [1, 2, 3]);
        assert_eq!(cmap.color(4), [1, 2, 3]);
        assert_eq!(cmap.color(3), [0, 0, 0]);
    }

    #[test]
    fn edits_grow_palette_and_set_alpha() {
        let mut cmap = Colormap::new(vec![[0, 0, 0], [10, 10, 10]]);
        cmap.apply(&[LabelColor { id: 4, color: [9, 8, 7], alpha: 0.5 }]);
        assert_eq!(cmap.len(), 5);
        assert_eq!(cmap.color(4), [9, 8, 7]);
        assert_eq!(cmap.rgba(4, 1.0), Rgba([9, 8, 7, 128]));
        assert_eq!(cmap.alpha(2), 1.0);
    }

    #[test]
    fn out_of_range_edit_is_ignored() {
        let mut cmap = Colormap::new(vec![[0, 0, 0], [10, 10, 10]]);
        cmap.apply(&[
            LabelColor { id: usize::MAX, color: [1, 1, 1], alpha: 1.0 },
            LabelColor { id: MAX_LABEL_ID + 1, color: [1, 1, 1], alpha: 1.0 },
            LabelColor { id: 1, color: [2, 2, 2], alpha: 1.0 },
        ]);
        assert_eq!(cmap.len(), 2);
        assert_eq!(cmap.color(1), [2, 2, 2]);
    }
}
