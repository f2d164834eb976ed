use serde::{Deserialize, Serialize};

/// One of the three canonical cross-sections through a volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    XY,
    XZ,
    YZ,
}

impl Axis {
    pub fn all() -> &'static [Axis] {
        &[Axis::XY, Axis::XZ, Axis::YZ]
    }

    /// Wire name used by the backend (`"XY"`, `"XZ"`, `"YZ"`).
    pub fn name(&self) -> &'static str {
        match self {
            Axis::XY => "XY",
            Axis::XZ => "XZ",
            Axis::YZ => "YZ",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XY" => Some(Axis::XY),
            "XZ" => Some(Axis::XZ),
            "YZ" => Some(Axis::YZ),
            _ => None,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The active 2D plane through the volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct SliceCoordinate {
    pub axis: Axis,
    pub index: u32,
}

impl SliceCoordinate {
    pub fn new(axis: Axis, index: u32) -> Self {
        Self { axis, index }
    }
}

/// Extents of the loaded volume along x, y and z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
pub struct VolumeShape {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl VolumeShape {
    /// (width, height) of a slice cut along `axis`.
    pub fn slice_dims(&self, axis: Axis) -> (u32, u32) {
        match axis {
            Axis::XY => (self.x, self.y),
            Axis::XZ => (self.x, self.z),
            Axis::YZ => (self.y, self.z),
        }
    }

    /// Number of slices available along `axis`.
    pub fn depth(&self, axis: Axis) -> u32 {
        match axis {
            Axis::XY => self.z,
            Axis::XZ => self.y,
            Axis::YZ => self.x,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_dims_follow_the_cut_plane() {
        let shape = VolumeShape { x: 100, y: 80, z: 20 };
        assert_eq!(shape.slice_dims(Axis::XY), (100, 80));
        assert_eq!(shape.slice_dims(Axis::XZ), (100, 20));
        assert_eq!(shape.slice_dims(Axis::YZ), (80, 20));
        assert_eq!(shape.depth(Axis::XY), 20);
        assert_eq!(shape.depth(Axis::YZ), 100);
    }

    #[test]
    fn axis_parse_is_case_insensitive() {
        assert_eq!(Axis::parse("xz"), Some(Axis::XZ));
        assert_eq!(Axis::parse(" YZ "), Some(Axis::YZ));
        assert_eq!(Axis::parse("zz"), None);
    }
}
