use egui::{Color32, Pos2};

use crate::remote::wire::{LassoPoint, LassoRequest};
use crate::viewport::{NodeId, OverlayNode, Viewport};
use crate::volume::SliceCoordinate;

pub const CLOSING_LINE_WIDTH: f32 = 2.0;

/// Free-hand polygon selection.
///
/// Vertices are kept at the fractional world positions they were sampled at.
/// While the lasso is open a single overlay line joins the first vertex to the
/// pointer, previewing the edge that closes the polygon on release.
#[derive(Default)]
pub struct LassoTool {
    points: Vec<Pos2>,
    closing_line: Option<NodeId>,
    color: Color32,
}

impl LassoTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.points.is_empty()
    }

    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    pub fn start(&mut self, viewport: &mut Viewport, world: Pos2, color: Color32) {
        self.remove_line(viewport);
        self.points = vec![world];
        self.color = color;
        let node = OverlayNode::Line { from: world, to: world, width: CLOSING_LINE_WIDTH, color };
        self.closing_line = Some(viewport.add_node(node));
    }

    /// Append a vertex and return the previous one, so the caller can echo
    /// the new edge.  `None` when no lasso is open.
    pub fn add_point(&mut self, viewport: &mut Viewport, world: Pos2) -> Option<Pos2> {
        let prev = *self.points.last()?;
        self.points.push(world);
        if let Some(id) = self.closing_line {
            let node = OverlayNode::Line {
                from: self.points[0],
                to: world,
                width: CLOSING_LINE_WIDTH,
                color: self.color,
            };
            viewport.update_node(id, node);
        }
        Some(prev)
    }

    /// Close the lasso and build the fill request.  `None` when no lasso was
    /// open.
    pub fn finish(
        &mut self,
        viewport: &mut Viewport,
        coord: SliceCoordinate,
        label: u32,
    ) -> Option<LassoRequest> {
        self.remove_line(viewport);
        if self.points.is_empty() {
            return None;
        }
        let lasso_points = self
            .points
            .drain(..)
            .map(|p| LassoPoint { x: p.x, y: p.y })
            .collect();
        Some(LassoRequest { lasso_points, slice_num: coord.index, axis: coord.axis, label })
    }

    /// Drop the open lasso without building a request.
    pub fn cancel(&mut self, viewport: &mut Viewport) {
        self.remove_line(viewport);
        self.points.clear();
    }

    fn remove_line(&mut self, viewport: &mut Viewport) {
        if let Some(id) = self.closing_line.take() {
            viewport.remove_node(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Axis;

    #[test]
    fn closing_line_follows_pointer_from_first_vertex() {
        let mut vp = Viewport::new();
        let mut lasso = LassoTool::new();
        lasso.start(&mut vp, Pos2::new(1.0, 1.0), Color32::RED);
        assert_eq!(lasso.add_point(&mut vp, Pos2::new(5.0, 1.0)), Some(Pos2::new(1.0, 1.0)));
        assert_eq!(lasso.add_point(&mut vp, Pos2::new(5.5, 6.0)), Some(Pos2::new(5.0, 1.0)));

        assert_eq!(vp.node_count(), 1);
        assert!(vp.nodes().any(|(_, n)| matches!(
            n,
            OverlayNode::Line { from, to, .. } if *from == Pos2::new(1.0, 1.0) && *to == Pos2::new(5.5, 6.0)
        )));
    }

    #[test]
    fn finish_builds_request_and_removes_overlay() {
        let mut vp = Viewport::new();
        let mut lasso = LassoTool::new();
        lasso.start(&mut vp, Pos2::new(1.0, 1.0), Color32::RED);
        lasso.add_point(&mut vp, Pos2::new(4.5, 1.0));
        let req = lasso.finish(&mut vp, SliceCoordinate::new(Axis::XZ, 7), 3).unwrap();
        assert_eq!(req.lasso_points, vec![LassoPoint { x: 1.0, y: 1.0 }, LassoPoint { x: 4.5, y: 1.0 }]);
        assert_eq!((req.slice_num, req.axis, req.label), (7, Axis::XZ, 3));
        assert_eq!(vp.node_count(), 0);
        assert!(!lasso.is_active());
        assert!(lasso.finish(&mut vp, SliceCoordinate::new(Axis::XZ, 7), 3).is_none());
    }

    #[test]
    fn cancel_discards_points() {
        let mut vp = Viewport::new();
        let mut lasso = LassoTool::new();
        lasso.start(&mut vp, Pos2::ZERO, Color32::RED);
        lasso.cancel(&mut vp);
        assert!(!lasso.is_active());
        assert_eq!(vp.node_count(), 0);
        assert!(lasso.add_point(&mut vp, Pos2::new(1.0, 1.0)).is_none());
    }
}
