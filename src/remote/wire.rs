// ============================================================================
// WIRE PAYLOADS: JSON bodies exchanged with the annotation backend
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::volume::{Axis, SliceCoordinate, VolumeShape};

/// The five slice rasters the canvas fetches from the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SliceKind {
    Image,
    Label,
    Preview,
    Superpixel,
    Annotation,
}

impl SliceKind {
    pub fn all() -> &'static [SliceKind] {
        &[
            SliceKind::Image,
            SliceKind::Label,
            SliceKind::Preview,
            SliceKind::Superpixel,
            SliceKind::Annotation,
        ]
    }

    pub fn path(&self) -> &'static str {
        match self {
            SliceKind::Image => "/get_image_slice/image",
            SliceKind::Label => "/get_image_slice/label",
            SliceKind::Preview => "/get_image_slice/future",
            SliceKind::Superpixel => "/get_superpixel_slice",
            SliceKind::Annotation => "/get_annot_slice",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            SliceKind::Image => 0,
            SliceKind::Label => 1,
            SliceKind::Preview => 2,
            SliceKind::Superpixel => 3,
            SliceKind::Annotation => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SliceRequest {
    pub axis: Axis,
    pub slice: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contour: Option<bool>,
}

impl SliceRequest {
    /// Body for fetching `kind` at `coord`.  The preview slice is always
    /// requested at XY/0; only the label slice carries `contour`.
    pub fn for_kind(kind: SliceKind, coord: SliceCoordinate, contour: bool) -> Self {
        match kind {
            SliceKind::Preview => Self { axis: Axis::XY, slice: 0, contour: None },
            SliceKind::Label => Self { axis: coord.axis, slice: coord.index, contour: Some(contour) },
            _ => Self { axis: coord.axis, slice: coord.index, contour: None },
        }
    }
}

/// One finished brush stroke.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrokeRequest {
    #[serde(rename = "coords")]
    pub points: Vec<[i32; 2]>,
    pub slice: u32,
    pub axis: Axis,
    pub size: u32,
    pub label: u32,
    pub mode: String,
}

/// A lasso vertex in world coordinates (fractional, as sampled).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LassoPoint {
    pub x: f32,
    pub y: f32,
}

/// A closed lasso polygon; the backend fills its interior with `label`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LassoRequest {
    pub lasso_points: Vec<LassoPoint>,
    pub slice_num: u32,
    pub axis: Axis,
    pub label: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamKind {
    Box,
    Pos,
    Neg,
    NewAnnotation,
    #[serde(rename = "clearall")]
    ClearAll,
}

/// Body of every `/sam` call.  Prompt kinds carry the whole session; the
/// reset kinds send nulls.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SamPayload {
    #[serde(rename = "type")]
    pub kind: SamKind,
    #[serde(rename = "box")]
    pub bbox: Option<[i32; 4]>,
    pub points_pos: Vec<[i32; 2]>,
    pub points_neg: Vec<[i32; 2]>,
    pub slice: Option<u32>,
    pub axis: Option<Axis>,
    pub label: Option<u32>,
    pub new_click: bool,
}

impl SamPayload {
    /// A session-less payload (`new_annotation`, `clearall`).
    pub fn reset(kind: SamKind) -> Self {
        Self {
            kind,
            bbox: None,
            points_pos: Vec::new(),
            points_neg: Vec::new(),
            slice: None,
            axis: None,
            label: None,
            new_click: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FindLabelRequest {
    pub x_coord: i32,
    pub y_coord: i32,
    pub slice: u32,
    pub axis: Axis,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ImageInfo {
    #[serde(rename = "imageShape")]
    pub image_shape: VolumeShape,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stroke_serializes_points_as_coords() {
        let req = StrokeRequest {
            points: vec![[1, 2], [3, 4]],
            slice: 7,
            axis: Axis::XZ,
            size: 4,
            label: 2,
            mode: "erase_brush".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"coords": [[1, 2], [3, 4]], "slice": 7, "axis": "XZ", "size": 4, "label": 2, "mode": "erase_brush"})
        );
    }

    #[test]
    fn lasso_serializes_points_as_objects() {
        let req = LassoRequest {
            lasso_points: vec![LassoPoint { x: 1.5, y: 2.0 }, LassoPoint { x: 4.0, y: 2.25 }],
            slice_num: 3,
            axis: Axis::XY,
            label: 5,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"lasso_points": [{"x": 1.5, "y": 2.0}, {"x": 4.0, "y": 2.25}],
                   "slice_num": 3, "axis": "XY", "label": 5})
        );
    }

    #[test]
    fn clearall_payload_sends_nulls() {
        let v = serde_json::to_value(SamPayload::reset(SamKind::ClearAll)).unwrap();
        assert_eq!(
            v,
            json!({"type": "clearall", "box": null, "points_pos": [], "points_neg": [],
                   "slice": null, "axis": null, "label": null, "new_click": true})
        );
    }

    #[test]
    fn preview_request_is_pinned_and_label_carries_contour() {
        let coord = SliceCoordinate::new(Axis::YZ, 9);
        let preview = serde_json::to_value(SliceRequest::for_kind(SliceKind::Preview, coord, true)).unwrap();
        assert_eq!(preview, json!({"axis": "XY", "slice": 0}));
        let label = serde_json::to_value(SliceRequest::for_kind(SliceKind::Label, coord, true)).unwrap();
        assert_eq!(label, json!({"axis": "YZ", "slice": 9, "contour": true}));
    }

    #[test]
    fn image_info_reads_camel_case_shape() {
        let info: ImageInfo = serde_json::from_str(r#"{"imageShape": {"x": 4, "y": 5, "z": 6}}"#).unwrap();
        assert_eq!(info.image_shape, VolumeShape { x: 4, y: 5, z: 6 });
    }
}
