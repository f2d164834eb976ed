// ============================================================================
// VOLPAINT APP: eframe shell around one slice canvas
// ============================================================================

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use eframe::egui;
use egui::{
    Color32, ColorImage, Key, PointerButton, Pos2, Rect, Sense, Stroke, TextureHandle,
    TextureOptions, Vec2,
};

use volpaint::bus::CanvasEvent;
use volpaint::canvas::{BACKGROUND, LayerKind};
use volpaint::colormap::LabelColor;
use volpaint::components::brush::BrushMode;
use volpaint::components::tools::{PointerEvent, SamPrompt, Tool};
use volpaint::ops::ingest::{ContrastWindow, ImageColormap};
use volpaint::remote::Backend;
use volpaint::remote::dispatch::{Dispatcher, Waker};
use volpaint::settings::Settings;
use volpaint::viewport::OverlayNode;
use volpaint::volume::{Axis, SliceCoordinate};
use volpaint::{CanvasController, log_err, log_info};

/// Repaint cadence while requests are in flight or a refetch is armed.
const BUSY_REPAINT: Duration = Duration::from_millis(50);

pub struct VolPaintApp {
    controller: CanvasController,
    events: mpsc::Receiver<CanvasEvent>,
    settings: Settings,

    composite: Option<TextureHandle>,
    composite_generation: Option<u64>,
    last_surface: Vec2,
    pointer_inside: bool,

    loading: Option<String>,
    status: String,
    start_coord: SliceCoordinate,
    first_frame: bool,
}

impl VolPaintApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings: Settings,
        backend: Arc<dyn Backend>,
        start_coord: SliceCoordinate,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        let waker: Waker = Arc::new(move || ctx.request_repaint());
        let dispatcher = match Dispatcher::threaded(backend.clone(), Some(waker)) {
            Ok(d) => d,
            Err(e) => {
                log_err!("Cannot start dispatcher workers ({}); running requests inline", e);
                Dispatcher::inline(backend)
            }
        };

        let mut controller = CanvasController::new(settings.clone(), dispatcher);
        let events = controller.subscribe();

        Self {
            controller,
            events,
            settings,
            composite: None,
            composite_generation: None,
            last_surface: Vec2::ZERO,
            pointer_inside: false,
            loading: None,
            status: String::new(),
            start_coord,
            first_frame: true,
        }
    }

    // ========================================================================
    // TOOL STRIP
    // ========================================================================

    fn tool_strip(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        ui.horizontal_wrapped(|ui| {
            let mut tool = self.controller.tool();
            for t in Tool::plain() {
                ui.selectable_value(&mut tool, *t, t.label());
            }
            for prompt in SamPrompt::all() {
                let label = format!("SAM {}", prompt.label());
                ui.selectable_value(&mut tool, Tool::Sam(*prompt), label);
            }
            if tool != self.controller.tool() {
                self.controller.set_tool(tool);
            }
            ui.separator();

            let mut mode = self.controller.brush().mode();
            egui::ComboBox::from_id_source("brush_mode")
                .selected_text(mode.label())
                .show_ui(ui, |ui| {
                    for m in BrushMode::all() {
                        ui.selectable_value(&mut mode, *m, m.label());
                    }
                });
            if mode != self.controller.brush().mode() {
                self.controller.set_brush_mode(mode);
            }

            let mut size = self.controller.brush().size();
            ui.label("Size");
            let slider = ui.add(egui::Slider::new(&mut size, 2..=200));
            if slider.changed() {
                self.controller.set_brush_size(size);
            }
            if slider.drag_released() {
                self.settings.brush_size = self.controller.brush().size();
                self.settings.save();
            }

            let mut label = self.controller.brush().label();
            ui.label("Label");
            if ui.add(egui::DragValue::new(&mut label).clamp_range(0..=u16::MAX as u32)).changed() {
                self.controller.set_label(label);
            }
            let cmap = self.controller.colormap();
            let mut rgb = cmap.color(label);
            let alpha = cmap.alpha(label);
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                self.controller.apply_colormap(&[LabelColor { id: label as usize, color: rgb, alpha }]);
            }

            let armed = self.controller.is_find_label_armed();
            if ui.selectable_label(armed, "Pick label").clicked() && !armed {
                self.controller.arm_find_label();
            }
            let mut sequential = self.controller.is_sequential_label();
            if ui.checkbox(&mut sequential, "Sequential").changed() {
                self.controller.set_sequential_label(sequential);
            }
            ui.separator();

            let coord = self.controller.coord();
            let mut axis = coord.axis;
            egui::ComboBox::from_id_source("axis")
                .selected_text(axis.name())
                .show_ui(ui, |ui| {
                    for a in Axis::all() {
                        ui.selectable_value(&mut axis, *a, a.name());
                    }
                });
            if axis != coord.axis {
                self.controller.set_axis(axis, now);
            }
            let max = self
                .controller
                .volume_shape()
                .map(|s| s.depth(self.controller.coord().axis).saturating_sub(1))
                .unwrap_or(u32::MAX);
            let mut index = self.controller.coord().index;
            ui.label("Slice");
            if ui.add(egui::DragValue::new(&mut index).clamp_range(0..=max)).changed() {
                self.controller.set_slice(index, now);
            }
            ui.separator();

            if ui.button("Undo").clicked() {
                self.controller.undo();
            }
            if ui.button("New annotation").clicked() {
                self.controller.new_annotation();
            }
            if ui.button("Reload").clicked() {
                self.controller.image_loaded();
            }
            if matches!(self.controller.tool(), Tool::Sam(_)) {
                ui.separator();
                if ui.button("SAM finish object").clicked() {
                    self.controller.sam_new_annotation();
                }
                if ui.button("SAM reset").clicked() {
                    self.controller.sam_clear_all();
                }
            }

            if let Some(msg) = &self.loading {
                ui.separator();
                ui.spinner();
                ui.label(msg);
            } else if !self.status.is_empty() {
                ui.separator();
                ui.weak(&self.status);
            }
        });
    }

    // ========================================================================
    // LAYERS PANEL
    // ========================================================================

    fn layers_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layers");
        for kind in LayerKind::all() {
            if *kind == LayerKind::BrushCursor {
                continue;
            }
            let layer = self.controller.layers().get(*kind);
            let (mut visible, mut opacity) = (layer.visible, layer.opacity);
            ui.horizontal(|ui| {
                if ui.checkbox(&mut visible, kind.name()).changed() {
                    self.controller.set_layer_visible(*kind, visible);
                }
                if ui.add(egui::Slider::new(&mut opacity, 0.0..=1.0).show_value(false)).changed() {
                    self.controller.set_layer_alpha(*kind, opacity);
                }
            });
        }
        ui.separator();

        let mut tint = self.controller.layers().get(LayerKind::Superpixel).tint;
        ui.horizontal(|ui| {
            ui.label("Superpixel tint");
            if ui.color_edit_button_srgba(&mut tint).changed() {
                self.controller.set_superpixel_tint(tint);
                self.settings.superpixel_tint = tint;
                self.settings.save();
            }
        });
        let mut contour = self.controller.label_contour();
        if ui.checkbox(&mut contour, "Label contours").changed() {
            self.controller.set_label_contour(contour);
            self.settings.label_contour = contour;
            self.settings.save();
        }
        ui.separator();

        ui.label("Contrast");
        let window = self.controller.contrast_window();
        let (mut lo, mut hi) = (window.min, window.max);
        let lo_changed = ui.add(egui::Slider::new(&mut lo, 0.0..=1.0).text("min")).changed();
        let hi_changed = ui.add(egui::Slider::new(&mut hi, 0.0..=1.0).text("max")).changed();
        if lo_changed || hi_changed {
            self.controller.set_contrast(ContrastWindow::new(lo, hi));
        }

        let mut cmap = self.controller.image_colormap();
        egui::ComboBox::from_label("Image colormap")
            .selected_text(cmap.name())
            .show_ui(ui, |ui| {
                for c in ImageColormap::all() {
                    ui.selectable_value(&mut cmap, *c, c.name());
                }
            });
        if cmap != self.controller.image_colormap() {
            self.controller.set_image_colormap(cmap);
            self.settings.image_colormap = cmap;
            self.settings.save();
        }
        if ui.button("Clear preview").clicked() {
            self.controller.clear_preview();
        }
    }

    // ========================================================================
    // CANVAS
    // ========================================================================

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        let sense = Sense::click_and_drag().union(Sense::hover());
        let (response, painter) = ui.allocate_painter(ui.available_size(), sense);
        let rect = response.rect;
        let origin = rect.min.to_vec2();

        if rect.size() != self.last_surface {
            self.last_surface = rect.size();
            self.controller.resize(rect.width(), rect.height());
            if self.first_frame {
                self.controller.recenter();
            }
        }

        self.handle_input(ui, &response, rect, now);

        // Re-upload the composite only when a layer changed.
        let generation = self.controller.layers().generation();
        if self.composite_generation != Some(generation) {
            self.composite_generation = Some(generation);
            let raster = self.controller.composite();
            let size = [raster.width() as usize, raster.height() as usize];
            let image = ColorImage::from_rgba_unmultiplied(size, raster.as_raw());
            match &mut self.composite {
                Some(tex) => tex.set(image, TextureOptions::NEAREST),
                None => {
                    self.composite = Some(ui.ctx().load_texture(
                        "slice_composite",
                        image,
                        TextureOptions::NEAREST,
                    ))
                }
            }
        }

        let [r, g, b, _] = BACKGROUND.0;
        painter.rect_filled(rect, 0.0, Color32::from_rgb(r, g, b).gamma_multiply(0.6));

        let viewport = self.controller.viewport();
        let (w, h) = self.controller.slice_dims();
        if let Some(tex) = &self.composite
            && w > 0
            && h > 0
        {
            let world = Rect::from_min_size(Pos2::ZERO, Vec2::new(w as f32, h as f32));
            let screen = viewport.world_rect_to_screen(world).translate(origin);
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            painter.with_clip_rect(rect).image(tex.id(), screen, uv, Color32::WHITE);
        }

        let zoom = viewport.zoom();
        for (_, node) in viewport.nodes() {
            match node {
                OverlayNode::Circle { center, radius, color } => {
                    let c = viewport.to_screen(*center) + origin;
                    painter.circle_filled(c, (radius * zoom).max(2.0), *color);
                }
                OverlayNode::RectOutline { rect: r, width, color } => {
                    let s = viewport.world_rect_to_screen(*r).translate(origin);
                    painter.rect_stroke(s, 0.0, Stroke::new((width * zoom).max(1.0), *color));
                }
                OverlayNode::Line { from, to, width, color } => {
                    let a = viewport.to_screen(*from) + origin;
                    let b = viewport.to_screen(*to) + origin;
                    painter.line_segment([a, b], Stroke::new((width * zoom).max(1.0), *color));
                }
            }
        }
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, rect: Rect, now: Instant) {
        let origin = rect.min.to_vec2();
        let (hover, pressed, released, scroll, multi, space, undo) = ui.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.scroll_delta,
                i.multi_touch(),
                i.key_pressed(Key::Space),
                i.modifiers.command && i.key_pressed(Key::Z),
            )
        });

        if response.dragged_by(PointerButton::Middle) {
            self.controller.drag(PointerButton::Middle, response.drag_delta());
        }

        let inside = hover.is_some_and(|p| rect.contains(p));
        let local = hover.map(|p| p - origin);

        if let Some(mt) = &multi {
            let anchor = local.unwrap_or(rect.center() - origin);
            self.controller.pinch(mt.zoom_delta, anchor, mt.translation_delta);
            self.controller.pointer_move(PointerEvent::touch(anchor, mt.num_touches), now);
        } else if inside && scroll.y != 0.0 {
            if let Some(p) = local {
                // egui reports roughly 50 points per wheel notch.
                self.controller.wheel(scroll.y / 50.0, p);
            }
        }

        if let Some(p) = local {
            let button = ui.input(|i| i.pointer.primary_down()).then_some(PointerButton::Primary);
            if pressed && inside {
                self.controller.pointer_down(PointerEvent::mouse(p, Some(PointerButton::Primary)), now);
            }
            if inside && multi.is_none() {
                self.controller.pointer_move(PointerEvent::mouse(p, button), now);
            }
            if released {
                self.controller.pointer_up(PointerEvent::mouse(p, Some(PointerButton::Primary)), now);
            }
        }

        if self.pointer_inside && !inside {
            let p = local.unwrap_or(rect.center() - origin);
            self.controller.pointer_leave(PointerEvent::mouse(p, None), now);
        }
        self.pointer_inside = inside;

        if space {
            self.controller.sam_clear_local();
        }
        if undo {
            self.controller.undo();
        }
        if inside {
            let (grow, shrink) = ui.input(|i| {
                (i.key_pressed(Key::PlusEquals), i.key_pressed(Key::Minus))
            });
            if grow {
                self.controller.grow_brush();
            }
            if shrink {
                self.controller.shrink_brush();
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                CanvasEvent::Loading(msg) => self.loading = msg,
                CanvasEvent::AnnotationChanged => self.status = "Annotation saved".to_string(),
                CanvasEvent::LabelFoundByClick(label) => {
                    self.status = format!("Picked label {}", label);
                }
                CanvasEvent::SequentialLabelAdvanced { next, .. } => {
                    self.status = format!("Next label {}", next);
                }
                CanvasEvent::MagicWand(click) => {
                    log_info!(
                        "Magic wand seed ({}, {}) on {} {} for label {}",
                        click.x_coord,
                        click.y_coord,
                        click.axis,
                        click.slice,
                        click.label
                    );
                    self.status = format!("Wand seed at ({}, {})", click.x_coord, click.y_coord);
                }
            }
        }
    }
}

impl eframe::App for VolPaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        if self.first_frame {
            log_info!("Opening {} slice {}", self.start_coord.axis, self.start_coord.index);
            self.controller.set_coord(self.start_coord, now);
            self.controller.image_loaded();
        }

        if self.controller.poll(now) {
            ctx.request_repaint();
        }
        self.drain_events();

        egui::TopBottomPanel::top("tool_strip").show(ctx, |ui| self.tool_strip(ui));
        egui::SidePanel::right("layers_panel")
            .default_width(220.0)
            .show(ctx, |ui| self.layers_panel(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.canvas_ui(ui));
        self.first_frame = false;

        if self.controller.pending_requests() > 0 || self.controller.refetch_due().is_some() {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }
}
