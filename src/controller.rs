// ============================================================================
// CANVAS CONTROLLER: one slice canvas: tools, layers, backend round trips
// ============================================================================

use std::sync::mpsc;
use std::time::Instant;

use egui::{Color32, PointerButton, Pos2, Vec2};
use image::RgbaImage;

use crate::bus::{CanvasEvent, EventBus, MagicWandClick};
use crate::canvas::{LayerKind, LayerStack};
use crate::colormap::{Colormap, LabelColor};
use crate::components::annotation::AnnotationSurface;
use crate::components::brush::{BrushEngine, BrushMode};
use crate::components::lasso::LassoTool;
use crate::components::sam::SamController;
use crate::components::tools::{PointerEvent, PointerKind, SamPrompt, Tool};
use crate::ops::ingest::{self, ContrastWindow, ImageColormap, ImageIngestor, RawSlice};
use crate::remote::RemoteError;
use crate::remote::dispatch::{Dispatcher, Reply, Request};
use crate::remote::wire::{FindLabelRequest, SamKind, SamPayload, SliceKind, StrokeRequest};
use crate::settings::Settings;
use crate::viewport::Viewport;
use crate::volume::{Axis, SliceCoordinate, VolumeShape};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PaintState {
    Idle,
    /// `prev` is the last stamped world point (floored).
    Painting { prev: Pos2 },
}

pub struct CanvasController {
    settings: Settings,
    viewport: Viewport,
    layers: LayerStack,
    brush: BrushEngine,
    annotation: AnnotationSurface,
    ingest: ImageIngestor,
    sam: SamController,
    lasso: LassoTool,
    colormap: Colormap,
    bus: EventBus,
    dispatcher: Dispatcher,

    tool: Tool,
    coord: SliceCoordinate,
    shape: Option<VolumeShape>,
    paint: PaintState,
    stroke: Vec<[i32; 2]>,
    find_label_armed: bool,
    sequential_label: bool,
    label_contour: bool,
    /// Last label slice, re-rendered on colormap edits.
    label_slice: Option<RawSlice>,

    refetch_due: Option<Instant>,
    recenter_pending: bool,
    /// SAM requests sent and not yet answered; the loading notice clears at 0.
    sam_in_flight: usize,
    next_seq: u64,
    applied_seq: [u64; 5],
}

impl CanvasController {
    pub fn new(settings: Settings, dispatcher: Dispatcher) -> Self {
        let colormap = Colormap::default();
        let mut layers = LayerStack::new();
        layers.set_opacity(LayerKind::Label, settings.label_alpha);
        layers.set_opacity(LayerKind::Annotation, settings.annotation_alpha);
        layers.set_opacity(LayerKind::Superpixel, settings.superpixel_alpha);
        layers.set_tint(LayerKind::Superpixel, settings.superpixel_tint);

        Self {
            viewport: Viewport::new(),
            layers,
            brush: BrushEngine::new(settings.brush_size, colormap.clone()),
            annotation: AnnotationSurface::default(),
            ingest: ImageIngestor::with_colormap(settings.image_colormap),
            sam: SamController::new(settings.sam_cooldown()),
            lasso: LassoTool::new(),
            colormap,
            bus: EventBus::new(),
            dispatcher,
            tool: Tool::Brush,
            coord: SliceCoordinate::default(),
            shape: None,
            paint: PaintState::Idle,
            stroke: Vec::new(),
            find_label_armed: false,
            sequential_label: false,
            label_contour: settings.label_contour,
            label_slice: None,
            refetch_due: None,
            recenter_pending: false,
            sam_in_flight: 0,
            next_seq: 0,
            applied_seq: [0; 5],
            settings,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn brush(&self) -> &BrushEngine {
        &self.brush
    }

    pub fn annotation(&self) -> &AnnotationSurface {
        &self.annotation
    }

    pub fn sam(&self) -> &SamController {
        &self.sam
    }

    pub fn lasso(&self) -> &LassoTool {
        &self.lasso
    }

    pub fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn coord(&self) -> SliceCoordinate {
        self.coord
    }

    pub fn volume_shape(&self) -> Option<VolumeShape> {
        self.shape
    }

    pub fn paint_state(&self) -> PaintState {
        self.paint
    }

    pub fn is_painting(&self) -> bool {
        matches!(self.paint, PaintState::Painting { .. })
    }

    /// Points buffered for the stroke in progress.
    pub fn stroke_points(&self) -> &[[i32; 2]] {
        &self.stroke
    }

    pub fn is_find_label_armed(&self) -> bool {
        self.find_label_armed
    }

    pub fn is_sequential_label(&self) -> bool {
        self.sequential_label
    }

    pub fn label_contour(&self) -> bool {
        self.label_contour
    }

    pub fn contrast_window(&self) -> ContrastWindow {
        self.ingest.window()
    }

    pub fn image_colormap(&self) -> ImageColormap {
        self.ingest.colormap()
    }

    pub fn pending_requests(&self) -> usize {
        self.dispatcher.pending()
    }

    pub fn refetch_due(&self) -> Option<Instant> {
        self.refetch_due
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<CanvasEvent> {
        self.bus.subscribe()
    }

    /// (width, height) of the current slice: the known volume shape, else the
    /// received image, else the annotation surface.
    pub fn slice_dims(&self) -> (u32, u32) {
        if let Some(shape) = self.shape {
            return shape.slice_dims(self.coord.axis);
        }
        if let Some(img) = self.ingest.image() {
            return (img.width, img.height);
        }
        (self.annotation.width(), self.annotation.height())
    }

    /// Composite every visible layer at slice resolution.
    pub fn composite(&self) -> RgbaImage {
        let (w, h) = self.slice_dims();
        self.layers.composite(w, h)
    }

    // ========================================================================
    // VIEWPORT
    // ========================================================================

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport.resize(width, height);
    }

    pub fn recenter(&mut self) {
        let (w, h) = self.slice_dims();
        self.viewport.recenter(w as f32, h as f32);
    }

    pub fn drag(&mut self, button: PointerButton, delta: Vec2) -> bool {
        self.viewport.drag(button, delta)
    }

    pub fn wheel(&mut self, scroll_y: f32, anchor: Pos2) {
        self.viewport.wheel(scroll_y, anchor);
    }

    pub fn pinch(&mut self, zoom_factor: f32, anchor: Pos2, translation: Vec2) {
        self.viewport.pinch(zoom_factor, anchor, translation);
    }

    // ========================================================================
    // TOOL & BRUSH COMMANDS
    // ========================================================================

    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        if self.is_painting() {
            self.finish_stroke(None);
        }
        if self.lasso.is_active() {
            self.lasso.cancel(&mut self.viewport);
            self.viewport.resume_drag();
        }
        if let Tool::Sam(_) = self.tool {
            self.sam.cancel_box(&mut self.viewport);
        }
        if tool != Tool::Brush {
            self.brush.hide_cursor();
            self.sync_cursor_layer();
        }
        self.tool = tool;
    }

    pub fn set_label(&mut self, label: u32) {
        self.brush.set_label(label);
        self.sync_cursor_layer();
    }

    pub fn set_brush_mode(&mut self, mode: BrushMode) {
        self.brush.set_mode(mode);
        self.sync_cursor_layer();
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush.set_size(size);
        self.sync_cursor_layer();
    }

    pub fn grow_brush(&mut self) {
        self.brush.grow();
        self.sync_cursor_layer();
    }

    pub fn shrink_brush(&mut self) {
        self.brush.shrink();
        self.sync_cursor_layer();
    }

    /// Make the next pointer-down a label lookup instead of a tool action.
    pub fn arm_find_label(&mut self) {
        self.find_label_armed = true;
    }

    pub fn set_sequential_label(&mut self, enabled: bool) {
        self.sequential_label = enabled;
    }

    // ========================================================================
    // LAYER COMMANDS
    // ========================================================================

    pub fn set_layer_visible(&mut self, kind: LayerKind, visible: bool) {
        self.layers.set_visible(kind, visible);
    }

    pub fn set_layer_alpha(&mut self, kind: LayerKind, alpha: f32) {
        self.layers.set_opacity(kind, alpha);
    }

    pub fn set_superpixel_tint(&mut self, tint: Color32) {
        self.layers.set_tint(LayerKind::Superpixel, tint);
    }

    /// Switch between filled and outlined labels; refetches the label slice.
    pub fn set_label_contour(&mut self, contour: bool) {
        if contour == self.label_contour {
            return;
        }
        self.label_contour = contour;
        self.fetch(SliceKind::Label);
    }

    /// Apply label-table color/alpha edits and re-render every layer that
    /// depends on the colormap, without a fetch.
    pub fn apply_colormap(&mut self, edits: &[LabelColor]) {
        self.colormap.apply(edits);
        self.brush.set_colormap(self.colormap.clone());
        if self.annotation.recolor(&self.colormap) {
            self.sync_annotation_layer();
        }
        if let Some(slice) = &self.label_slice {
            let overlay = ingest::label_overlay(slice, &self.colormap);
            self.layers.set_pixels(LayerKind::Label, overlay);
        }
        self.sync_cursor_layer();
    }

    /// Re-normalize the stored image and preview slices under a new window.
    pub fn set_contrast(&mut self, window: ContrastWindow) {
        let rendered = self.ingest.set_window(window);
        self.set_image_rasters(rendered);
    }

    /// Switch the image and preview pseudo-color map; no fetch.
    pub fn set_image_colormap(&mut self, colormap: ImageColormap) {
        let rendered = self.ingest.set_colormap(colormap);
        self.set_image_rasters(rendered);
    }

    /// Hide and drop the preview slice.  The next preview fetch shows it again.
    pub fn clear_preview(&mut self) {
        self.ingest.clear_preview();
        self.layers.clear(LayerKind::Preview);
        self.layers.set_visible(LayerKind::Preview, false);
    }

    fn set_image_rasters(&mut self, (image, preview): (Option<RgbaImage>, Option<RgbaImage>)) {
        if let Some(img) = image {
            self.layers.set_pixels(LayerKind::Image, img);
        }
        if let Some(img) = preview {
            self.layers.set_pixels(LayerKind::Preview, img);
        }
    }

    // ========================================================================
    // SLICE LIFECYCLE
    // ========================================================================

    pub fn set_slice(&mut self, index: u32, now: Instant) {
        self.set_coord(SliceCoordinate::new(self.coord.axis, index), now);
    }

    /// Change axis, keeping the slice index when it is still in range.
    pub fn set_axis(&mut self, axis: Axis, now: Instant) {
        let mut index = self.coord.index;
        if let Some(shape) = self.shape {
            index = index.min(shape.depth(axis).saturating_sub(1));
        }
        self.set_coord(SliceCoordinate::new(axis, index), now);
    }

    /// Move to `coord`: flush any open stroke for the old slice, clear the
    /// annotation surface, arm the debounced refetch, and recenter once the
    /// new image arrives if the axis changed.
    pub fn set_coord(&mut self, coord: SliceCoordinate, now: Instant) {
        if coord == self.coord {
            return;
        }
        if self.is_painting() {
            self.finish_stroke(None);
        }
        if self.lasso.is_active() {
            self.finish_lasso();
        }
        if coord.axis != self.coord.axis {
            self.recenter_pending = true;
        }
        self.coord = coord;

        let (w, h) = match self.shape {
            Some(shape) => shape.slice_dims(coord.axis),
            None if self.recenter_pending => (0, 0),
            None => (self.annotation.width(), self.annotation.height()),
        };
        self.annotation.reset(w, h);
        self.sync_annotation_layer();
        self.refetch_due = Some(now + self.settings.refetch_debounce());
    }

    /// Fetch every slice layer for the current coordinate right away.
    pub fn fetch_all(&mut self) {
        self.refetch_due = None;
        for kind in SliceKind::all() {
            self.fetch(*kind);
        }
    }

    fn fetch(&mut self, kind: SliceKind) {
        self.next_seq += 1;
        self.dispatcher.send(Request::FetchSlice {
            kind,
            coord: self.coord,
            contour: self.label_contour,
            seq: self.next_seq,
        });
    }

    /// Full reset after a new volume was opened: layers, annotation, lasso and
    /// SAM session are dropped, the shape and every layer are fetched, and a
    /// new annotation is created if the backend has none.
    pub fn image_loaded(&mut self) {
        log_info!("Image loaded; resetting canvas at {} {}", self.coord.axis, self.coord.index);
        if self.is_painting() {
            self.paint = PaintState::Idle;
            self.stroke.clear();
            self.viewport.resume_drag();
        }
        if self.lasso.is_active() {
            self.lasso.cancel(&mut self.viewport);
            self.viewport.resume_drag();
        }
        // The shape is replaced when the info reply lands; a failed lookup
        // keeps the previous one.
        self.ingest.clear();
        self.label_slice = None;
        for kind in LayerKind::all() {
            if *kind != LayerKind::BrushCursor {
                self.layers.clear(*kind);
            }
        }
        self.annotation.reset(0, 0);
        self.sam.clear_local(&mut self.viewport);
        self.recenter_pending = true;
        self.dispatcher.send(Request::ImageInfo);
        self.fetch_all();
        self.dispatcher.send(Request::IsAnnotationEmpty);
    }

    /// Inbound "annotation changed" from another tool: refetch the
    /// authoritative annotation slice.
    pub fn annotation_changed(&mut self) {
        self.fetch(SliceKind::Annotation);
    }

    pub fn undo(&mut self) {
        self.dispatcher.send(Request::Undo);
    }

    pub fn new_annotation(&mut self) {
        self.annotation.clear();
        self.sync_annotation_layer();
        self.dispatcher.send(Request::NewAnnotation);
    }

    // ========================================================================
    // POINTER ROUTING
    // ========================================================================

    fn world_floor(&self, screen: Pos2) -> Pos2 {
        let w = self.viewport.to_world(screen);
        Pos2::new(w.x.floor(), w.y.floor())
    }

    pub fn pointer_down(&mut self, event: PointerEvent, now: Instant) {
        if !event.is_primary() {
            return;
        }
        if self.find_label_armed {
            self.find_label_armed = false;
            let at = self.world_floor(event.pos);
            self.dispatcher.send(Request::FindLabel(FindLabelRequest {
                x_coord: at.x as i32,
                y_coord: at.y as i32,
                slice: self.coord.index,
                axis: self.coord.axis,
            }));
            return;
        }
        match self.tool {
            Tool::Brush => {
                if self.brush.mode() == BrushMode::None {
                    return;
                }
                // A press without a release in between still commits the
                // stroke it interrupts.
                if self.is_painting() {
                    self.finish_stroke(None);
                }
                if event.kind == PointerKind::Touch {
                    self.viewport.pause_drag();
                }
                self.paint = PaintState::Painting { prev: self.world_floor(event.pos) };
            }
            Tool::Lasso => {
                if self.lasso.is_active() {
                    self.finish_lasso();
                }
                if event.kind == PointerKind::Touch {
                    self.viewport.pause_drag();
                }
                let [r, g, b] = self.colormap.color(self.brush.label());
                let world = self.viewport.to_world(event.pos);
                self.lasso.start(&mut self.viewport, world, Color32::from_rgb(r, g, b));
            }
            Tool::MagicWand => {
                self.viewport.pause_drag();
                let world = self.viewport.to_world(event.pos);
                self.bus.emit(CanvasEvent::MagicWand(MagicWandClick {
                    slice: self.coord.index,
                    axis: self.coord.axis,
                    label: self.brush.label(),
                    x_coord: world.x.round() as i32,
                    y_coord: world.y.round() as i32,
                }));
            }
            Tool::Sam(prompt) => {
                let world = self.viewport.to_world(event.pos);
                let label = self.brush.label();
                let payload = match prompt {
                    SamPrompt::Box => {
                        self.sam.start_box(&mut self.viewport, world);
                        None
                    }
                    SamPrompt::Positive => {
                        self.sam.positive_point(&mut self.viewport, world, now, self.coord, label)
                    }
                    SamPrompt::Negative => {
                        self.sam.negative_point(&mut self.viewport, world, now, self.coord, label)
                    }
                };
                if let Some(p) = payload {
                    self.send_sam(p);
                }
            }
        }
    }

    pub fn pointer_move(&mut self, event: PointerEvent, _now: Instant) {
        let world = self.world_floor(event.pos);
        if self.tool == Tool::Brush {
            self.brush.move_cursor(world);
            self.sync_cursor_layer();
        }

        if event.is_multi_touch() {
            if self.is_painting() {
                self.cancel_stroke();
            }
            if self.lasso.is_active() {
                log_info!("Multi-touch during lasso; discarding {} points", self.lasso.points().len());
                self.lasso.cancel(&mut self.viewport);
                self.viewport.resume_drag();
                self.fetch(SliceKind::Annotation);
            }
            return;
        }

        if self.lasso.is_active() {
            let at = self.viewport.to_world(event.pos);
            if let Some(prev) = self.lasso.add_point(&mut self.viewport, at) {
                let color = self.colormap.rgba(self.brush.label(), 1.0);
                self.annotation.trace(prev, at, color);
                self.sync_annotation_layer();
            }
            return;
        }

        match self.paint {
            PaintState::Painting { prev } => {
                let pts = self.annotation.draw(&self.brush, Some(prev), world);
                self.stroke.extend(pts);
                self.paint = PaintState::Painting { prev: world };
                self.sync_annotation_layer();
            }
            PaintState::Idle => {
                if let Tool::Sam(SamPrompt::Box) = self.tool {
                    let w = self.viewport.to_world(event.pos);
                    self.sam.update_box(&mut self.viewport, w);
                }
            }
        }
    }

    pub fn pointer_up(&mut self, event: PointerEvent, _now: Instant) {
        self.viewport.resume_drag();
        if self.is_painting() {
            let world = self.world_floor(event.pos);
            self.finish_stroke(Some(world));
            return;
        }
        if self.lasso.is_active() {
            self.finish_lasso();
            return;
        }
        if let Tool::Sam(SamPrompt::Box) = self.tool {
            let world = self.viewport.to_world(event.pos);
            let label = self.brush.label();
            if let Some(p) = self.sam.finish_box(&mut self.viewport, world, self.coord, label) {
                self.send_sam(p);
            }
        }
    }

    /// Leaving the canvas ends the gesture exactly like a release.
    pub fn pointer_leave(&mut self, event: PointerEvent, now: Instant) {
        self.pointer_up(event, now);
        self.brush.hide_cursor();
        self.sync_cursor_layer();
    }

    /// Close the stroke: one last stamp at `release` (if given), submit the
    /// buffered points, and advance the label in sequential mode.
    fn finish_stroke(&mut self, release: Option<Pos2>) {
        if let Some(at) = release {
            let pts = self.annotation.draw(&self.brush, None, at);
            self.stroke.extend(pts);
            self.sync_annotation_layer();
        }
        self.paint = PaintState::Idle;
        self.viewport.resume_drag();

        let points = std::mem::take(&mut self.stroke);
        let Some(mode) = self.brush.mode().wire_name() else { return };
        if points.is_empty() {
            return;
        }
        self.dispatcher.send(Request::Stroke(StrokeRequest {
            points,
            slice: self.coord.index,
            axis: self.coord.axis,
            size: self.brush.size(),
            label: self.brush.label(),
            mode: mode.to_string(),
        }));

        if self.sequential_label {
            let previous = self.brush.label();
            let next = previous.saturating_add(1);
            self.brush.set_label(next);
            self.sync_cursor_layer();
            self.bus.emit(CanvasEvent::SequentialLabelAdvanced { previous, next });
        }
    }

    /// Close the lasso and submit its polygon for the current slice.  The
    /// traced outline stays until the server annotation replaces it.
    fn finish_lasso(&mut self) {
        self.viewport.resume_drag();
        if let Some(req) = self.lasso.finish(&mut self.viewport, self.coord, self.brush.label()) {
            self.dispatcher.send(Request::Lasso(req));
        }
    }

    /// Abort the stroke without submitting; the local stamps are replaced by
    /// the server's annotation slice.
    fn cancel_stroke(&mut self) {
        log_info!("Multi-touch during stroke; discarding {} points", self.stroke.len());
        self.paint = PaintState::Idle;
        self.stroke.clear();
        self.viewport.resume_drag();
        self.fetch(SliceKind::Annotation);
    }

    // ========================================================================
    // SAM COMMANDS
    // ========================================================================

    fn send_sam(&mut self, payload: SamPayload) {
        let message = match payload.kind {
            SamKind::NewAnnotation => "Finalizing annotation...",
            SamKind::ClearAll => "Resetting SAM...",
            _ => "Running SAM...",
        };
        self.bus.emit(CanvasEvent::Loading(Some(message.to_string())));
        self.sam_in_flight += 1;
        self.dispatcher.send(Request::Sam(payload));
    }

    /// Drop the prompt session locally (no backend call).
    pub fn sam_clear_local(&mut self) {
        self.sam.clear_local(&mut self.viewport);
    }

    pub fn sam_clear_all(&mut self) {
        let payload = self.sam.clear_all(&mut self.viewport);
        self.send_sam(payload);
    }

    /// Commit the SAM object and start a fresh session.
    pub fn sam_new_annotation(&mut self) {
        for payload in self.sam.new_annotation(&mut self.viewport) {
            self.send_sam(payload);
        }
    }

    // ========================================================================
    // POLL
    // ========================================================================

    /// Apply finished backend replies and fire the debounced refetch if due.
    /// Returns true when anything visible may have changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some(due) = self.refetch_due
            && now >= due
        {
            self.fetch_all();
        }
        while let Some(reply) = self.dispatcher.try_recv() {
            self.handle_reply(reply);
            changed = true;
        }
        changed
    }

    fn handle_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Slice { kind, coord, seq, result } => self.apply_slice(kind, coord, seq, result),
            Reply::ImageInfo(Ok(shape)) => {
                log_info!("Volume shape {}x{}x{}", shape.x, shape.y, shape.z);
                self.shape = Some(shape);
                let (w, h) = shape.slice_dims(self.coord.axis);
                if (self.annotation.width(), self.annotation.height()) != (w, h) {
                    self.annotation.reset(w, h);
                    self.sync_annotation_layer();
                }
            }
            Reply::ImageInfo(Err(e)) => log_err!("Volume info request failed: {}", e),
            Reply::AnnotationEmpty(Ok(true)) => {
                log_info!("Backend has no annotation; creating one");
                self.dispatcher.send(Request::NewAnnotation);
            }
            Reply::AnnotationEmpty(Ok(false)) => {}
            Reply::AnnotationEmpty(Err(e)) => log_err!("Annotation status request failed: {}", e),
            Reply::LabelFound(Ok(id)) if id >= 0 => {
                let label = id.min(u32::MAX as i64) as u32;
                self.brush.set_label(label);
                self.brush.set_mode(BrushMode::Draw);
                self.sync_cursor_layer();
                self.bus.emit(CanvasEvent::LabelFoundByClick(label));
            }
            Reply::LabelFound(Ok(_)) => log_info!("No label under click"),
            Reply::LabelFound(Err(e)) => log_err!("Find label request failed: {}", e),
            Reply::StrokeCommitted(result) => self.acknowledge("Stroke", result),
            Reply::LassoApplied(result) => self.acknowledge("Lasso", result),
            Reply::Undone(result) => self.acknowledge("Undo", result),
            Reply::NewAnnotationCreated(result) => self.acknowledge("New annotation", result),
            Reply::SamDone { kind, result } => {
                self.sam_in_flight = self.sam_in_flight.saturating_sub(1);
                if self.sam_in_flight == 0 {
                    self.bus.emit(CanvasEvent::Loading(None));
                }
                if kind == SamKind::ClearAll {
                    if let Err(e) = result {
                        log_err!("SAM reset failed: {}", e);
                    }
                } else {
                    self.acknowledge("SAM", result);
                }
            }
        }
    }

    /// Success broadcasts "annotation changed" and refetches the slice;
    /// failure is logged and not retried.
    fn acknowledge(&mut self, what: &str, result: Result<(), RemoteError>) {
        match result {
            Ok(()) => {
                self.bus.emit(CanvasEvent::AnnotationChanged);
                self.annotation_changed();
            }
            Err(e) => log_err!("{} submission failed: {}", what, e),
        }
    }

    fn apply_slice(
        &mut self,
        kind: SliceKind,
        coord: SliceCoordinate,
        seq: u64,
        result: Result<RawSlice, RemoteError>,
    ) {
        let applied = &mut self.applied_seq[kind.index()];
        if coord != self.coord || seq < *applied {
            log_info!("Dropping stale {:?} slice for {} {}", kind, coord.axis, coord.index);
            return;
        }
        *applied = seq;

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                log_warn!("{:?} slice fetch failed: {}", kind, e);
                return;
            }
        };

        match kind {
            SliceKind::Image => {
                let (w, h) = (raw.width, raw.height);
                let img = self.ingest.ingest_image(raw);
                self.layers.set_pixels(LayerKind::Image, img);
                if (self.annotation.width(), self.annotation.height()) != (w, h) {
                    self.annotation.reset(w, h);
                    self.sync_annotation_layer();
                }
                if self.recenter_pending {
                    self.recenter_pending = false;
                    self.viewport.recenter(w as f32, h as f32);
                }
            }
            SliceKind::Preview => {
                let img = self.ingest.ingest_preview(raw);
                self.layers.set_pixels(LayerKind::Preview, img);
                self.layers.set_visible(LayerKind::Preview, true);
            }
            SliceKind::Label => {
                let overlay = ingest::label_overlay(&raw, &self.colormap);
                self.layers.set_pixels(LayerKind::Label, overlay);
                self.label_slice = Some(raw);
            }
            SliceKind::Superpixel => {
                self.layers.set_pixels(LayerKind::Superpixel, ingest::superpixel_overlay(&raw));
            }
            SliceKind::Annotation => {
                self.annotation.replace_from_server(raw, &self.colormap);
                self.sync_annotation_layer();
            }
        }
    }

    // ========================================================================
    // LAYER SYNC
    // ========================================================================

    fn sync_annotation_layer(&mut self) {
        self.layers.set_pixels(LayerKind::Annotation, self.annotation.raster().clone());
    }

    fn sync_cursor_layer(&mut self) {
        match self.brush.cursor_raster() {
            Some((img, at)) if self.tool == Tool::Brush => {
                let layer = self.layers.get_mut(LayerKind::BrushCursor);
                layer.pixels = img;
                layer.position = at.to_vec2();
            }
            _ => {
                if !self.layers.get(LayerKind::BrushCursor).is_empty() {
                    self.layers.clear(LayerKind::BrushCursor);
                }
            }
        }
    }
}
