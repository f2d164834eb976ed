mod common;

use common::{Fault, MockBackend, after, opened, press, press_world};
use volpaint::bus::CanvasEvent;
use volpaint::components::sam::SamState;
use volpaint::components::tools::{SamPrompt, Tool};
use volpaint::remote::wire::SamKind;
use volpaint::volume::Axis;

#[test]
fn box_prompt_carries_points_collected_before_it() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.set_label(2);

    c.set_tool(Tool::Sam(SamPrompt::Positive));
    c.pointer_down(press_world(&c, 10.2, 10.2), t);
    c.set_tool(Tool::Sam(SamPrompt::Negative));
    c.pointer_down(press_world(&c, 30.2, 12.2), after(t, 300));

    c.set_tool(Tool::Sam(SamPrompt::Box));
    c.pointer_down(press_world(&c, 40.2, 40.2), after(t, 600));
    assert_eq!(c.sam().state(), SamState::Boxing);
    c.pointer_move(press_world(&c, 20.2, 30.2), after(t, 610));
    c.pointer_up(press_world(&c, 5.2, 20.2), after(t, 620));

    let sent = backend.sam_payloads();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].new_click);
    assert!(!sent[1].new_click);

    let b = &sent[2];
    assert_eq!(b.kind, SamKind::Box);
    assert!(!b.new_click);
    assert_eq!(b.points_pos, vec![[10, 10]]);
    assert_eq!(b.points_neg, vec![[30, 12]]);
    assert_eq!(b.bbox, Some([5, 20, 40, 40]));
    assert_eq!((b.slice, b.axis, b.label), (Some(0), Some(Axis::XY), Some(2)));
    assert!(backend.strokes().is_empty());
}

#[test]
fn rapid_point_clicks_inside_cooldown_are_ignored() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.set_tool(Tool::Sam(SamPrompt::Positive));
    c.pointer_down(press(&c, 1.0, 1.0), t);
    c.pointer_down(press(&c, 2.0, 2.0), after(t, 100));
    c.set_tool(Tool::Sam(SamPrompt::Negative));
    c.pointer_down(press(&c, 3.0, 3.0), after(t, 200));
    c.pointer_down(press(&c, 4.0, 4.0), after(t, 260));

    let kinds: Vec<SamKind> = backend.sam_payloads().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![SamKind::Pos, SamKind::Neg]);
    assert_eq!(c.viewport().node_count(), 2);
}

#[test]
fn loading_wraps_each_sam_round_trip() {
    let (mut c, _backend, t) = opened(MockBackend::new());
    let events = c.subscribe();
    c.set_tool(Tool::Sam(SamPrompt::Positive));
    c.pointer_down(press(&c, 8.0, 8.0), t);
    assert!(matches!(events.try_recv(), Ok(CanvasEvent::Loading(Some(_)))));

    c.poll(t);
    assert_eq!(events.try_recv(), Ok(CanvasEvent::Loading(None)));
    assert_eq!(events.try_recv(), Ok(CanvasEvent::AnnotationChanged));
}

#[test]
fn finishing_an_object_commits_then_resets_in_order() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.set_tool(Tool::Sam(SamPrompt::Positive));
    c.pointer_down(press(&c, 8.0, 8.0), t);
    c.set_tool(Tool::Sam(SamPrompt::Box));
    c.pointer_down(press(&c, 1.0, 1.0), t);
    c.pointer_up(press(&c, 9.0, 9.0), t);
    assert_eq!(c.viewport().node_count(), 2);

    backend.clear_calls();
    c.sam_new_annotation();
    let kinds: Vec<SamKind> = backend.sam_payloads().iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![SamKind::NewAnnotation, SamKind::ClearAll]);
    assert_eq!(c.viewport().node_count(), 0);
    assert!(c.sam().pending_new_click());
    assert!(c.sam().positive_points().is_empty());

    c.set_tool(Tool::Sam(SamPrompt::Positive));
    c.pointer_down(press(&c, 8.0, 8.0), after(t, 500));
    assert!(backend.sam_payloads().last().is_some_and(|p| p.new_click));
}

#[test]
fn finalize_clears_loading_only_after_both_replies() {
    let (mut c, _backend, t) = opened(MockBackend::new());
    let events = c.subscribe();
    c.sam_new_annotation();
    c.poll(t);

    let seen: Vec<CanvasEvent> = events.try_iter().collect();
    assert_eq!(seen.len(), 4, "{:?}", seen);
    assert!(matches!(seen[0], CanvasEvent::Loading(Some(_))));
    assert!(matches!(seen[1], CanvasEvent::Loading(Some(_))));
    assert_eq!(seen[2], CanvasEvent::AnnotationChanged);
    assert_eq!(seen[3], CanvasEvent::Loading(None));
}

#[test]
fn failed_sam_request_still_clears_loading() {
    let (mut c, backend, t) = opened(MockBackend::new());
    let events = c.subscribe();
    backend.fail(Fault::Submit);
    c.set_tool(Tool::Sam(SamPrompt::Positive));
    c.pointer_down(press(&c, 8.0, 8.0), t);
    c.poll(t);

    assert!(matches!(events.try_recv(), Ok(CanvasEvent::Loading(Some(_)))));
    assert_eq!(events.try_recv(), Ok(CanvasEvent::Loading(None)));
    assert!(events.try_recv().is_err());
    assert!(backend.fetches(volpaint::remote::wire::SliceKind::Annotation).is_empty());
}

#[test]
fn switching_tool_mid_box_drops_the_drag() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.set_tool(Tool::Sam(SamPrompt::Box));
    c.pointer_down(press(&c, 2.0, 2.0), t);
    c.pointer_move(press(&c, 12.0, 9.0), t);
    assert_eq!(c.viewport().node_count(), 1);

    c.set_tool(Tool::Sam(SamPrompt::Positive));
    assert_eq!(c.sam().state(), SamState::Idle);
    assert_eq!(c.viewport().node_count(), 0);

    c.pointer_up(press(&c, 12.0, 9.0), t);
    assert!(backend.sam_payloads().is_empty());
}

#[test]
fn local_clear_drops_graphics_without_a_backend_call() {
    let (mut c, backend, t) = opened(MockBackend::new());
    c.set_tool(Tool::Sam(SamPrompt::Negative));
    c.pointer_down(press(&c, 8.0, 8.0), t);
    backend.clear_calls();

    c.sam_clear_local();
    assert_eq!(c.viewport().node_count(), 0);
    assert!(c.sam().pending_new_click());
    assert!(backend.calls().is_empty());
}

#[test]
fn sam_tool_hides_brush_cursor() {
    let (mut c, _backend, t) = opened(MockBackend::new());
    c.pointer_move(press(&c, 8.0, 8.0), t);
    assert!(c.brush().cursor().is_some());
    c.set_tool(Tool::Sam(SamPrompt::Box));
    assert!(c.brush().cursor().is_none());
    assert!(c.layers().get(volpaint::canvas::LayerKind::BrushCursor).is_empty());
}
