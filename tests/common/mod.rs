// Shared fixtures for the canvas scenario tests: a scripted in-memory backend
// and a controller wired to it through an inline dispatcher.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use egui::{PointerButton, Pos2};

use volpaint::CanvasController;
use volpaint::components::tools::PointerEvent;
use volpaint::ops::ingest::{RawSlice, SliceData};
use volpaint::remote::dispatch::Dispatcher;
use volpaint::remote::wire::{
    FindLabelRequest, LassoRequest, SamPayload, SliceKind, StrokeRequest,
};
use volpaint::remote::{Backend, RemoteError};
use volpaint::settings::Settings;
use volpaint::volume::{Axis, SliceCoordinate, VolumeShape};

pub const SHAPE: VolumeShape = VolumeShape { x: 64, y: 48, z: 32 };

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Fetch(SliceKind, SliceCoordinate, bool),
    Stroke(StrokeRequest),
    Lasso(LassoRequest),
    Sam(SamPayload),
    FindLabel(FindLabelRequest),
    Undo,
    NewAnnotation,
    IsEmpty,
    ImageInfo,
}

/// Request groups the mock can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Every slice fetch.
    Fetch,
    /// Strokes, lassos, SAM prompts, undo and new annotation.
    Submit,
    ImageInfo,
}

pub struct MockBackend {
    pub shape: VolumeShape,
    pub calls: Mutex<Vec<Call>>,
    pub label_under_click: i64,
    pub annotation_empty: bool,
    faults: Mutex<Vec<Fault>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            shape: SHAPE,
            calls: Mutex::new(Vec::new()),
            label_under_click: 7,
            annotation_empty: false,
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Make every later request in `fault`'s group fail with a 500.
    pub fn fail(&self, fault: Fault) {
        self.faults.lock().unwrap().push(fault);
    }

    pub fn heal(&self) {
        self.faults.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Record `call`, then fail it if its group is faulted.
    fn answer(&self, call: Call, group: Fault, path: &str) -> Result<(), RemoteError> {
        self.record(call);
        if self.faults.lock().unwrap().contains(&group) {
            return Err(RemoteError::Status { path: path.to_string(), code: 500 });
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn strokes(&self) -> Vec<StrokeRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Stroke(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn lassos(&self) -> Vec<LassoRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Lasso(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn sam_payloads(&self) -> Vec<SamPayload> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Sam(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn fetches(&self, kind: SliceKind) -> Vec<SliceCoordinate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch(k, coord, _) if k == kind => Some(coord),
                _ => None,
            })
            .collect()
    }
}

impl Backend for MockBackend {
    /// Image samples carry the slice index so tests can tell slices apart;
    /// labels are 1 everywhere and the annotation is unset (-1).
    fn fetch_slice(
        &self,
        kind: SliceKind,
        coord: SliceCoordinate,
        contour: bool,
    ) -> Result<RawSlice, RemoteError> {
        self.answer(Call::Fetch(kind, coord, contour), Fault::Fetch, kind.path())?;
        let axis = if kind == SliceKind::Preview { Axis::XY } else { coord.axis };
        let (w, h) = self.shape.slice_dims(axis);
        let n = (w * h) as usize;
        let data = match kind {
            SliceKind::Image | SliceKind::Preview => SliceData::U8(vec![coord.index as u8; n]),
            SliceKind::Label => SliceData::I32(vec![1; n]),
            SliceKind::Superpixel => SliceData::U8(vec![0; n]),
            SliceKind::Annotation => SliceData::I32(vec![-1; n]),
        };
        RawSlice::new(w, h, data).ok_or_else(|| RemoteError::Decode("size".into()))
    }

    fn submit_stroke(&self, stroke: &StrokeRequest) -> Result<(), RemoteError> {
        self.answer(Call::Stroke(stroke.clone()), Fault::Submit, "/draw")
    }

    fn submit_sam(&self, payload: &SamPayload) -> Result<(), RemoteError> {
        self.answer(Call::Sam(payload.clone()), Fault::Submit, "/sam")
    }

    fn apply_lasso(&self, lasso: &LassoRequest) -> Result<(), RemoteError> {
        self.answer(Call::Lasso(lasso.clone()), Fault::Submit, "/apply_lasso/annotation")
    }

    fn find_label_by_click(&self, req: &FindLabelRequest) -> Result<i64, RemoteError> {
        self.record(Call::FindLabel(req.clone()));
        Ok(self.label_under_click)
    }

    fn undo(&self) -> Result<(), RemoteError> {
        self.answer(Call::Undo, Fault::Submit, "/undo_annot")
    }

    fn new_annotation(&self) -> Result<(), RemoteError> {
        self.answer(Call::NewAnnotation, Fault::Submit, "/new_annot/annotation")
    }

    fn is_annotation_empty(&self) -> Result<bool, RemoteError> {
        self.record(Call::IsEmpty);
        Ok(self.annotation_empty)
    }

    fn image_info(&self) -> Result<VolumeShape, RemoteError> {
        self.answer(Call::ImageInfo, Fault::ImageInfo, "/get_image_info/image_info")?;
        Ok(self.shape)
    }
}

/// Controller on a 200x100 surface with the mock volume opened at XY/0.
pub fn opened(backend: MockBackend) -> (CanvasController, Arc<MockBackend>, Instant) {
    let backend = Arc::new(backend);
    let mut c = CanvasController::new(Settings::default(), Dispatcher::inline(backend.clone()));
    c.resize(200.0, 100.0);
    let now = Instant::now();
    c.image_loaded();
    c.poll(now);
    backend.clear_calls();
    (c, backend, now)
}

pub fn after(t: Instant, ms: u64) -> Instant {
    t + Duration::from_millis(ms)
}

/// Screen position of the center of world pixel (x, y).
pub fn screen_of(c: &CanvasController, x: f32, y: f32) -> Pos2 {
    c.viewport().to_screen(Pos2::new(x + 0.5, y + 0.5))
}

pub fn press(c: &CanvasController, x: f32, y: f32) -> PointerEvent {
    PointerEvent::mouse(screen_of(c, x, y), Some(PointerButton::Primary))
}

/// Primary press at an exact world position (SAM prompts round, not floor).
pub fn press_world(c: &CanvasController, x: f32, y: f32) -> PointerEvent {
    PointerEvent::mouse(c.viewport().to_screen(Pos2::new(x, y)), Some(PointerButton::Primary))
}
