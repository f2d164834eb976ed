mod common;

use common::{Call, Fault, MockBackend, after, opened, press, screen_of};
use egui::PointerButton;
use volpaint::bus::CanvasEvent;
use volpaint::components::brush::BrushMode;
use volpaint::components::tools::PointerEvent;
use volpaint::controller::PaintState;
use volpaint::remote::wire::SliceKind;
use volpaint::volume::{Axis, SliceCoordinate};

#[test]
fn vertical_stroke_buffers_path_and_submits_on_release() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.set_brush_size(4);
    c.set_label(1);

    c.pointer_down(press(&c, 10.0, 10.0), t);
    assert_eq!(c.paint_state(), PaintState::Painting { prev: egui::Pos2::new(10.0, 10.0) });
    assert!(c.stroke_points().is_empty(), "pointer-down records the origin without stamping");

    c.pointer_move(press(&c, 10.0, 14.0), t);
    assert_eq!(c.stroke_points(), &[[10, 10], [10, 11], [10, 12], [10, 13]]);
    assert!(c.annotation().raster().get_pixel(10, 12)[3] > 0);

    c.pointer_up(press(&c, 10.0, 14.0), t);
    assert!(!c.is_painting());
    assert!(c.stroke_points().is_empty());

    let strokes = backend.strokes();
    assert_eq!(strokes.len(), 1);
    let s = &strokes[0];
    assert_eq!(s.points, vec![[10, 10], [10, 11], [10, 12], [10, 13], [10, 14]]);
    assert_eq!((s.slice, s.axis, s.size, s.label), (0, Axis::XY, 4, 1));
    assert_eq!(s.mode, "draw_brush");
}

#[test]
fn acknowledged_stroke_broadcasts_and_reloads_server_annotation() {
    let (mut c, backend, t) = opened(MockBackend::new());
    let events = c.subscribe();

    c.pointer_down(press(&c, 20.0, 20.0), t);
    c.pointer_move(press(&c, 25.0, 20.0), t);
    c.pointer_up(press(&c, 25.0, 20.0), t);
    assert!(c.annotation().raster().get_pixel(22, 20)[3] > 0);

    c.poll(t);
    assert_eq!(events.try_recv(), Ok(CanvasEvent::AnnotationChanged));
    assert_eq!(backend.fetches(SliceKind::Annotation), vec![SliceCoordinate::new(Axis::XY, 0)]);
    // The mock server has no labels, so the local stroke is replaced by nothing.
    assert_eq!(c.annotation().raster().get_pixel(22, 20)[3], 0);
}

#[test]
fn second_press_commits_the_interrupted_stroke() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.pointer_down(press(&c, 10.0, 10.0), t);
    c.pointer_move(press(&c, 10.0, 14.0), t);
    c.pointer_down(press(&c, 20.0, 20.0), t);
    assert_eq!(c.paint_state(), PaintState::Painting { prev: egui::Pos2::new(20.0, 20.0) });
    c.pointer_up(press(&c, 20.0, 20.0), t);

    let strokes = backend.strokes();
    assert_eq!(strokes.len(), 2);
    assert_eq!(strokes[0].points, vec![[10, 10], [10, 11], [10, 12], [10, 13]]);
    assert_eq!(strokes[1].points, vec![[20, 20]]);
}

#[test]
fn failed_stroke_is_not_acknowledged() {
    let (mut c, backend, t) = opened(MockBackend::new());
    let events = c.subscribe();
    backend.fail(Fault::Submit);

    c.pointer_down(press(&c, 10.0, 10.0), t);
    c.pointer_up(press(&c, 12.0, 10.0), t);
    c.poll(t);

    assert_eq!(backend.strokes().len(), 1);
    assert!(events.try_recv().is_err());
    assert!(backend.fetches(SliceKind::Annotation).is_empty());
    // The optimistic stamps stay until the next annotation fetch.
    assert!(c.annotation().raster().get_pixel(12, 10)[3] > 0);
}

#[test]
fn erase_mode_sends_erase_and_none_mode_never_paints() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.set_brush_mode(BrushMode::Erase);
    c.pointer_down(press(&c, 5.0, 5.0), t);
    c.pointer_up(press(&c, 5.0, 5.0), t);
    assert_eq!(backend.strokes()[0].mode, "erase_brush");
    assert_eq!(backend.strokes()[0].points, vec![[5, 5]]);

    backend.clear_calls();
    c.set_brush_mode(BrushMode::None);
    c.pointer_down(press(&c, 5.0, 5.0), t);
    assert!(!c.is_painting());
    c.pointer_move(press(&c, 9.0, 5.0), t);
    c.pointer_up(press(&c, 9.0, 5.0), t);
    assert!(backend.strokes().is_empty());
}

#[test]
fn secondary_button_does_not_start_a_stroke() {
    let (mut c, _backend, t) = opened(MockBackend::new());
    let right = PointerEvent::mouse(screen_of(&c, 3.0, 3.0), Some(PointerButton::Secondary));
    c.pointer_down(right, t);
    assert!(!c.is_painting());
}

#[test]
fn sequential_mode_advances_label_after_each_stroke() {
    let (mut c, backend, t) = opened(MockBackend::new());
    let events = c.subscribe();
    c.set_label(4);
    c.set_sequential_label(true);

    for x in [10.0, 20.0] {
        c.pointer_down(press(&c, x, 10.0), t);
        c.pointer_up(press(&c, x, 10.0), t);
    }

    let labels: Vec<u32> = backend.strokes().iter().map(|s| s.label).collect();
    assert_eq!(labels, vec![4, 5]);
    assert_eq!(c.brush().label(), 6);
    assert_eq!(
        events.try_recv(),
        Ok(CanvasEvent::SequentialLabelAdvanced { previous: 4, next: 5 })
    );
}

#[test]
fn second_touch_cancels_stroke_and_restores_server_annotation() {
    let (mut c, backend, t) = opened(MockBackend::new());

    c.pointer_down(PointerEvent::touch(screen_of(&c, 5.0, 5.0), 1), t);
    assert!(c.viewport().is_drag_paused());
    c.pointer_move(PointerEvent::touch(screen_of(&c, 5.0, 9.0), 1), t);
    assert_eq!(c.stroke_points().len(), 4);

    c.pointer_move(PointerEvent::touch(screen_of(&c, 6.0, 9.0), 2), t);
    assert!(!c.is_painting());
    assert!(!c.viewport().is_drag_paused());
    assert!(c.stroke_points().is_empty());

    c.pointer_up(PointerEvent::touch(screen_of(&c, 6.0, 9.0), 0), t);
    assert!(backend.strokes().is_empty());

    c.poll(t);
    assert_eq!(backend.fetches(SliceKind::Annotation).len(), 1);
    assert_eq!(c.annotation().raster().get_pixel(5, 7)[3], 0);
}

#[test]
fn leaving_the_canvas_finishes_the_stroke() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.pointer_down(press(&c, 30.0, 30.0), t);
    c.pointer_move(press(&c, 32.0, 30.0), t);
    c.pointer_leave(press(&c, 33.0, 30.0), t);
    assert!(!c.is_painting());
    assert_eq!(backend.strokes()[0].points.last(), Some(&[33, 30]));
    assert!(c.brush().cursor().is_none());
}

#[test]
fn changing_slice_mid_stroke_commits_to_the_old_slice() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.pointer_down(press(&c, 8.0, 8.0), t);
    c.pointer_move(press(&c, 8.0, 12.0), t);
    c.set_slice(3, after(t, 10));

    assert!(!c.is_painting());
    let strokes = backend.strokes();
    assert_eq!(strokes.len(), 1);
    assert_eq!(strokes[0].slice, 0);
    assert_eq!(c.coord(), SliceCoordinate::new(Axis::XY, 3));
    assert!(c.annotation().raster().pixels().all(|p| p[3] == 0));
}

#[test]
fn find_label_click_is_one_shot_and_switches_to_draw() {
    let (mut c, backend, t) = opened(MockBackend::new());
    let events = c.subscribe();
    c.set_brush_mode(BrushMode::Erase);
    c.arm_find_label();

    c.pointer_down(press(&c, 12.0, 20.0), t);
    assert!(!c.is_painting());
    assert!(!c.is_find_label_armed());
    assert!(matches!(
        backend.calls().as_slice(),
        [Call::FindLabel(r)] if (r.x_coord, r.y_coord, r.slice, r.axis) == (12, 20, 0, Axis::XY)
    ));

    c.poll(t);
    assert_eq!(c.brush().label(), 7);
    assert_eq!(c.brush().mode(), BrushMode::Draw);
    assert_eq!(events.try_recv(), Ok(CanvasEvent::LabelFoundByClick(7)));

    c.pointer_down(press(&c, 12.0, 20.0), t);
    assert!(c.is_painting());
}

#[test]
fn find_label_miss_keeps_brush_unchanged() {
    let mut backend = MockBackend::new();
    backend.label_under_click = -1;
    let (mut c, _backend, t) = opened(backend);
    c.set_label(3);
    c.arm_find_label();
    c.pointer_down(press(&c, 1.0, 1.0), t);
    c.poll(t);
    assert_eq!(c.brush().label(), 3);
    assert!(!c.is_find_label_armed());
}
