use std::time::{Duration, Instant};

use egui::{Color32, Pos2, Rect, Vec2};

use crate::remote::wire::{SamKind, SamPayload};
use crate::viewport::{NodeId, OverlayNode, Viewport};
use crate::volume::SliceCoordinate;

pub const POSITIVE_MARKER: Color32 = Color32::from_rgb(0x33, 0x99, 0xff);
pub const NEGATIVE_MARKER: Color32 = Color32::from_rgb(0xff, 0x33, 0x33);
pub const BOX_OUTLINE: Color32 = Color32::from_rgb(0x00, 0xff, 0x00);
pub const MARKER_RADIUS: f32 = 3.0;
pub const BOX_LINE_WIDTH: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamState {
    Idle,
    Boxing,
}

/// Point/box prompt session for segmentation assist.
///
/// The controller only builds request payloads; the caller sends them.  All
/// graphics are viewport overlay nodes and are destroyed on every reset.
pub struct SamController {
    state: SamState,
    start: Option<Pos2>,
    end: Option<Pos2>,
    box_node: Option<NodeId>,
    current_box: Option<[i32; 4]>,
    positive: Vec<([i32; 2], NodeId)>,
    negative: Vec<([i32; 2], NodeId)>,
    pending_new_click: bool,
    cooldown: Duration,
    last_point: Option<Instant>,
}

impl SamController {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: SamState::Idle,
            start: None,
            end: None,
            box_node: None,
            current_box: None,
            positive: Vec::new(),
            negative: Vec::new(),
            pending_new_click: true,
            cooldown,
            last_point: None,
        }
    }

    pub fn state(&self) -> SamState {
        self.state
    }

    pub fn pending_new_click(&self) -> bool {
        self.pending_new_click
    }

    pub fn current_box(&self) -> Option<[i32; 4]> {
        self.current_box
    }

    pub fn positive_points(&self) -> Vec<[i32; 2]> {
        self.positive.iter().map(|(p, _)| *p).collect()
    }

    pub fn negative_points(&self) -> Vec<[i32; 2]> {
        self.negative.iter().map(|(p, _)| *p).collect()
    }

    fn outline(min: Pos2, size: Vec2) -> OverlayNode {
        OverlayNode::RectOutline {
            rect: Rect::from_min_size(min, size),
            width: BOX_LINE_WIDTH,
            color: BOX_OUTLINE,
        }
    }

    // ========================================================================
    // BOX
    // ========================================================================

    pub fn start_box(&mut self, viewport: &mut Viewport, world: Pos2) {
        self.start = Some(world);
        self.end = Some(world);
        self.state = SamState::Boxing;
        let node = Self::outline(world, Vec2::splat(1.0));
        match self.box_node {
            Some(id) if viewport.update_node(id, node.clone()) => {}
            _ => self.box_node = Some(viewport.add_node(node)),
        }
    }

    pub fn update_box(&mut self, viewport: &mut Viewport, world: Pos2) {
        let (SamState::Boxing, Some(start)) = (self.state, self.start) else { return };
        self.end = Some(world);
        let rect = Rect::from_two_pos(start, world);
        if let Some(id) = self.box_node {
            viewport.update_node(id, Self::outline(rect.min, rect.size()));
        }
    }

    /// Close the box at `world` and build the prompt.  The outline stays
    /// visible until the next reset.
    pub fn finish_box(
        &mut self,
        viewport: &mut Viewport,
        world: Pos2,
        coord: SliceCoordinate,
        label: u32,
    ) -> Option<SamPayload> {
        if self.state != SamState::Boxing {
            return None;
        }
        self.update_box(viewport, world);
        self.state = SamState::Idle;
        let (start, end) = (self.start?, self.end?);

        let (x1, y1) = (start.x.round() as i32, start.y.round() as i32);
        let (x2, y2) = (end.x.round() as i32, end.y.round() as i32);
        self.current_box = Some([x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)]);

        Some(self.prompt(SamKind::Box, coord, label))
    }

    /// Abandon a box drag in progress.  The last committed box, if any, keeps
    /// its outline.
    pub fn cancel_box(&mut self, viewport: &mut Viewport) {
        if self.state != SamState::Boxing {
            return;
        }
        self.state = SamState::Idle;
        self.start = None;
        self.end = None;
        match (self.current_box, self.box_node) {
            (Some([x1, y1, x2, y2]), Some(id)) => {
                let min = Pos2::new(x1 as f32, y1 as f32);
                let size = Vec2::new((x2 - x1) as f32, (y2 - y1) as f32);
                viewport.update_node(id, Self::outline(min, size));
            }
            (None, Some(id)) => {
                viewport.remove_node(id);
                self.box_node = None;
            }
            _ => {}
        }
    }

    // ========================================================================
    // POINTS
    // ========================================================================

    fn cooling_down(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_point
            && now.saturating_duration_since(last) < self.cooldown
        {
            return true;
        }
        self.last_point = Some(now);
        false
    }

    /// Add a positive point.  `None` while the click cooldown is running.
    pub fn positive_point(
        &mut self,
        viewport: &mut Viewport,
        world: Pos2,
        now: Instant,
        coord: SliceCoordinate,
        label: u32,
    ) -> Option<SamPayload> {
        self.add_point(viewport, world, now, coord, label, true)
    }

    pub fn negative_point(
        &mut self,
        viewport: &mut Viewport,
        world: Pos2,
        now: Instant,
        coord: SliceCoordinate,
        label: u32,
    ) -> Option<SamPayload> {
        self.add_point(viewport, world, now, coord, label, false)
    }

    fn add_point(
        &mut self,
        viewport: &mut Viewport,
        world: Pos2,
        now: Instant,
        coord: SliceCoordinate,
        label: u32,
        positive: bool,
    ) -> Option<SamPayload> {
        if self.cooling_down(now) {
            return None;
        }
        let p = [world.x.round() as i32, world.y.round() as i32];
        let color = if positive { POSITIVE_MARKER } else { NEGATIVE_MARKER };
        let node = viewport.add_node(OverlayNode::Circle {
            center: Pos2::new(p[0] as f32, p[1] as f32),
            radius: MARKER_RADIUS,
            color,
        });
        if positive {
            self.positive.push((p, node));
            Some(self.prompt(SamKind::Pos, coord, label))
        } else {
            self.negative.push((p, node));
            Some(self.prompt(SamKind::Neg, coord, label))
        }
    }

    /// Snapshot the session and consume the pending new-click flag.
    fn prompt(&mut self, kind: SamKind, coord: SliceCoordinate, label: u32) -> SamPayload {
        let payload = SamPayload {
            kind,
            bbox: self.current_box,
            points_pos: self.positive_points(),
            points_neg: self.negative_points(),
            slice: Some(coord.index),
            axis: Some(coord.axis),
            label: Some(label),
            new_click: self.pending_new_click,
        };
        self.pending_new_click = false;
        payload
    }

    // ========================================================================
    // RESETS
    // ========================================================================

    /// Drop the session and its graphics and re-arm the new-click flag.
    /// No backend call.
    pub fn clear_local(&mut self, viewport: &mut Viewport) {
        if let Some(id) = self.box_node.take() {
            viewport.remove_node(id);
        }
        for (_, id) in self.positive.drain(..).chain(self.negative.drain(..)) {
            viewport.remove_node(id);
        }
        self.start = None;
        self.end = None;
        self.state = SamState::Idle;
        self.current_box = None;
        self.pending_new_click = true;
    }

    /// Local reset plus the backend `clearall` payload.
    pub fn clear_all(&mut self, viewport: &mut Viewport) -> SamPayload {
        self.clear_local(viewport);
        SamPayload::reset(SamKind::ClearAll)
    }

    /// Finalize the object: `new_annotation` followed by a full reset.  The
    /// two payloads must be sent in order.
    pub fn new_annotation(&mut self, viewport: &mut Viewport) -> [SamPayload; 2] {
        [SamPayload::reset(SamKind::NewAnnotation), self.clear_all(viewport)]
    }
}
