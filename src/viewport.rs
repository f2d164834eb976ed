use std::collections::BTreeMap;

use egui::{Color32, PointerButton, Pos2, Rect, Vec2};

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 100.0;

/// Handle to an overlay node hosted by the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

/// Vector graphics drawn above the layer stack in world coordinates, so they
/// pan and zoom with the image but never touch any raster.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayNode {
    Circle {
        center: Pos2,
        radius: f32,
        color: Color32,
    },
    RectOutline {
        rect: Rect,
        width: f32,
        color: Color32,
    },
    Line {
        from: Pos2,
        to: Pos2,
        width: f32,
        color: Color32,
    },
}

/// Screen ↔ world transform plus the transient overlay scene.
///
/// The transform is `screen = (world - center) * zoom + screen_size / 2`:
/// `center` is the world point shown in the middle of the render surface.
/// Because the center is stored in world space, resizing the surface keeps
/// the view centered on the same content.
pub struct Viewport {
    zoom: f32,
    center: Pos2,
    screen_size: Vec2,
    /// Only drags with this button pan the view.
    drag_button: PointerButton,
    drag_paused: bool,
    nodes: BTreeMap<NodeId, OverlayNode>,
    next_node: u64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            zoom: 1.0,
            center: Pos2::ZERO,
            screen_size: Vec2::ZERO,
            drag_button: PointerButton::Middle,
            drag_paused: false,
            nodes: BTreeMap::new(),
            next_node: 0,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn center(&self) -> Pos2 {
        self.center
    }

    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    pub fn to_world(&self, screen: Pos2) -> Pos2 {
        self.center + (screen.to_vec2() - self.screen_size * 0.5) / self.zoom
    }

    pub fn to_screen(&self, world: Pos2) -> Pos2 {
        ((world - self.center) * self.zoom + self.screen_size * 0.5).to_pos2()
    }

    /// Screen-space rectangle covered by a world-space rectangle.
    pub fn world_rect_to_screen(&self, world: Rect) -> Rect {
        Rect::from_min_max(self.to_screen(world.min), self.to_screen(world.max))
    }

    // ========================================================================
    // GESTURES
    // ========================================================================

    pub fn set_drag_button(&mut self, button: PointerButton) {
        self.drag_button = button;
    }

    pub fn drag_button(&self) -> PointerButton {
        self.drag_button
    }

    /// Suspend drag panning while a single-touch paint stroke is active.
    pub fn pause_drag(&mut self) {
        self.drag_paused = true;
    }

    pub fn resume_drag(&mut self) {
        self.drag_paused = false;
    }

    pub fn is_drag_paused(&self) -> bool {
        self.drag_paused
    }

    /// Pan by a screen-space delta if `button` is the drag trigger.
    /// Returns whether the view moved.
    pub fn drag(&mut self, button: PointerButton, delta: Vec2) -> bool {
        if self.drag_paused || button != self.drag_button {
            return false;
        }
        self.pan_by(delta);
        true
    }

    /// Pan by a screen-space delta unconditionally (two-finger pan).
    pub fn pan_by(&mut self, delta: Vec2) {
        self.center -= delta / self.zoom;
    }

    /// Zoom while keeping a screen-space point fixed (the mouse cursor or the
    /// pinch midpoint).
    pub fn zoom_around_screen_point(&mut self, zoom_factor: f32, anchor: Pos2) {
        if !zoom_factor.is_finite() || zoom_factor <= 0.0 {
            return;
        }
        let world_anchor = self.to_world(anchor);
        self.zoom = (self.zoom * zoom_factor).clamp(MIN_ZOOM, MAX_ZOOM);
        // Shift the center so `world_anchor` maps back onto `anchor`.
        self.center = world_anchor - (anchor.to_vec2() - self.screen_size * 0.5) / self.zoom;
    }

    /// Mouse-wheel zoom.  One notch (`scroll_y` = 1.0) scales by 10%.
    pub fn wheel(&mut self, scroll_y: f32, anchor: Pos2) {
        if scroll_y == 0.0 {
            return;
        }
        self.zoom_around_screen_point(1.1f32.powf(scroll_y), anchor);
    }

    /// Two-contact gesture: `zoom_factor` from the change in finger spread,
    /// `translation` from the midpoint movement.
    pub fn pinch(&mut self, zoom_factor: f32, anchor: Pos2, translation: Vec2) {
        self.pan_by(translation);
        self.zoom_around_screen_point(zoom_factor, anchor);
    }

    // ========================================================================
    // SURFACE
    // ========================================================================

    pub fn resize(&mut self, width: f32, height: f32) {
        self.screen_size = Vec2::new(width.max(0.0), height.max(0.0));
    }

    /// Scale so a `width`×`height` world extent fits the surface.
    pub fn fit(&mut self, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 || self.screen_size.x <= 0.0 || self.screen_size.y <= 0.0 {
            return;
        }
        let zoom = (self.screen_size.x / width).min(self.screen_size.y / height);
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Center on a `width`×`height` world extent and fit it.
    pub fn recenter(&mut self, width: f32, height: f32) {
        self.center = Pos2::new(width / 2.0, height / 2.0);
        self.fit(width, height);
    }

    // ========================================================================
    // OVERLAY SCENE
    // ========================================================================

    pub fn add_node(&mut self, node: OverlayNode) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, node);
        id
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<OverlayNode> {
        self.nodes.remove(&id)
    }

    /// Replace a node in place.  Returns false if `id` is no longer hosted.
    pub fn update_node(&mut self, id: NodeId, node: OverlayNode) -> bool {
        match self.nodes.get_mut(&id) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&OverlayNode> {
        self.nodes.get(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &OverlayNode)> {
        self.nodes.iter().map(|(id, n)| (*id, n))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        let mut vp = Viewport::new();
        vp.resize(800.0, 600.0);
        vp.recenter(200.0, 100.0);
        vp
    }

    #[test]
    fn to_world_inverts_to_screen() {
        let mut vp = viewport();
        vp.zoom_around_screen_point(1.7, Pos2::new(123.0, 45.0));
        vp.pan_by(Vec2::new(-31.0, 12.5));
        for p in [Pos2::new(0.0, 0.0), Pos2::new(57.3, 91.1), Pos2::new(-12.0, 400.0)] {
            let back = vp.to_world(vp.to_screen(p));
            assert!((back - p).length() < 1e-3, "{p:?} -> {back:?}");
        }
    }

    #[test]
    fn recenter_fits_extent() {
        let vp = viewport();
        assert_eq!(vp.center(), Pos2::new(100.0, 50.0));
        assert!((vp.zoom() - 4.0).abs() < 1e-6);
        assert_eq!(vp.to_screen(Pos2::new(100.0, 50.0)), Pos2::new(400.0, 300.0));
    }

    #[test]
    fn resize_preserves_view_center() {
        let mut vp = viewport();
        let before = vp.to_world(Pos2::new(400.0, 300.0));
        vp.resize(1000.0, 400.0);
        let after = vp.to_world(Pos2::new(500.0, 200.0));
        assert!((before - after).length() < 1e-4);
    }

    #[test]
    fn zoom_keeps_anchor_fixed_and_clamps() {
        let mut vp = viewport();
        let anchor = Pos2::new(250.0, 120.0);
        let world = vp.to_world(anchor);
        vp.zoom_around_screen_point(3.0, anchor);
        assert!((vp.to_world(anchor) - world).length() < 1e-3);

        vp.zoom_around_screen_point(1e6, anchor);
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.zoom_around_screen_point(1e-9, anchor);
        assert_eq!(vp.zoom(), MIN_ZOOM);
    }

    #[test]
    fn drag_is_gated_to_trigger_button() {
        let mut vp = viewport();
        let c = vp.center();
        assert!(!vp.drag(PointerButton::Primary, Vec2::new(10.0, 0.0)));
        assert_eq!(vp.center(), c);

        assert!(vp.drag(PointerButton::Middle, Vec2::new(8.0, 0.0)));
        assert!((vp.center().x - (c.x - 2.0)).abs() < 1e-6);

        vp.pause_drag();
        assert!(!vp.drag(PointerButton::Middle, Vec2::new(8.0, 0.0)));
    }

    #[test]
    fn overlay_nodes_add_update_remove() {
        let mut vp = Viewport::new();
        let dot = OverlayNode::Circle { center: Pos2::new(1.0, 2.0), radius: 3.0, color: Color32::RED };
        let id = vp.add_node(dot.clone());
        assert_eq!(vp.node(id), Some(&dot));

        let moved = OverlayNode::Circle { center: Pos2::new(5.0, 5.0), radius: 3.0, color: Color32::RED };
        assert!(vp.update_node(id, moved.clone()));
        assert_eq!(vp.node(id), Some(&moved));

        assert!(vp.remove_node(id).is_some());
        assert!(!vp.update_node(id, moved));
        assert_eq!(vp.node_count(), 0);
    }
}
