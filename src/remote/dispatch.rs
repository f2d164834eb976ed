// ============================================================================
// DISPATCHER: backend calls off the UI thread
// ============================================================================
//
// Two FIFO lanes, each served by one worker thread:
//   fetch : slice reads, volume info, label lookups
//   submit: strokes, lassos, SAM prompts, undo, new annotation
// Within a lane requests complete in send order, so e.g. a SAM finalize
// (`new_annotation` then `clearall`) reaches the backend in that order.
// Replies from both lanes land on one channel drained by the owner.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use super::wire::{
    FindLabelRequest, LassoRequest, SamKind, SamPayload, SliceKind, StrokeRequest,
};
use super::{Backend, RemoteError};
use crate::ops::ingest::RawSlice;
use crate::volume::{SliceCoordinate, VolumeShape};

/// Called from a worker after each reply is queued (e.g. to request a repaint).
pub type Waker = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    FetchSlice {
        kind: SliceKind,
        coord: SliceCoordinate,
        contour: bool,
        seq: u64,
    },
    ImageInfo,
    IsAnnotationEmpty,
    FindLabel(FindLabelRequest),
    Stroke(StrokeRequest),
    Lasso(LassoRequest),
    Sam(SamPayload),
    Undo,
    NewAnnotation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    Fetch,
    Submit,
}

impl Request {
    pub fn lane(&self) -> Lane {
        match self {
            Request::FetchSlice { .. }
            | Request::ImageInfo
            | Request::IsAnnotationEmpty
            | Request::FindLabel(_) => Lane::Fetch,
            Request::Stroke(_)
            | Request::Lasso(_)
            | Request::Sam(_)
            | Request::Undo
            | Request::NewAnnotation => Lane::Submit,
        }
    }
}

#[derive(Debug)]
pub enum Reply {
    Slice {
        kind: SliceKind,
        coord: SliceCoordinate,
        seq: u64,
        result: Result<RawSlice, RemoteError>,
    },
    ImageInfo(Result<VolumeShape, RemoteError>),
    AnnotationEmpty(Result<bool, RemoteError>),
    LabelFound(Result<i64, RemoteError>),
    StrokeCommitted(Result<(), RemoteError>),
    LassoApplied(Result<(), RemoteError>),
    SamDone {
        kind: SamKind,
        result: Result<(), RemoteError>,
    },
    Undone(Result<(), RemoteError>),
    NewAnnotationCreated(Result<(), RemoteError>),
}

/// Run one request against the backend.
pub fn execute(backend: &dyn Backend, request: Request) -> Reply {
    match request {
        Request::FetchSlice { kind, coord, contour, seq } => Reply::Slice {
            kind,
            coord,
            seq,
            result: backend.fetch_slice(kind, coord, contour),
        },
        Request::ImageInfo => Reply::ImageInfo(backend.image_info()),
        Request::IsAnnotationEmpty => Reply::AnnotationEmpty(backend.is_annotation_empty()),
        Request::FindLabel(req) => Reply::LabelFound(backend.find_label_by_click(&req)),
        Request::Stroke(stroke) => Reply::StrokeCommitted(backend.submit_stroke(&stroke)),
        Request::Lasso(lasso) => Reply::LassoApplied(backend.apply_lasso(&lasso)),
        Request::Sam(payload) => Reply::SamDone {
            kind: payload.kind,
            result: backend.submit_sam(&payload),
        },
        Request::Undo => Reply::Undone(backend.undo()),
        Request::NewAnnotation => Reply::NewAnnotationCreated(backend.new_annotation()),
    }
}

pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    /// `None` in inline mode.
    lanes: Option<(mpsc::Sender<Request>, mpsc::Sender<Request>)>,
    reply_tx: mpsc::Sender<Reply>,
    reply_rx: mpsc::Receiver<Reply>,
    pending: usize,
}

impl Dispatcher {
    /// Spawn the fetch and submit workers.
    pub fn threaded(backend: Arc<dyn Backend>, waker: Option<Waker>) -> Result<Self, RemoteError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let fetch = Self::spawn_lane("volpaint-fetch", backend.clone(), reply_tx.clone(), waker.clone())?;
        let submit = Self::spawn_lane("volpaint-submit", backend.clone(), reply_tx.clone(), waker)?;
        log_info!("Dispatcher started with fetch and submit workers");
        Ok(Self {
            backend,
            lanes: Some((fetch, submit)),
            reply_tx,
            reply_rx,
            pending: 0,
        })
    }

    /// Run every request synchronously inside `send`.  Replies still queue
    /// until the next `try_recv`, matching the threaded ordering model.
    pub fn inline(backend: Arc<dyn Backend>) -> Self {
        let (reply_tx, reply_rx) = mpsc::channel();
        Self {
            backend,
            lanes: None,
            reply_tx,
            reply_rx,
            pending: 0,
        }
    }

    fn spawn_lane(
        name: &str,
        backend: Arc<dyn Backend>,
        reply_tx: mpsc::Sender<Reply>,
        waker: Option<Waker>,
    ) -> Result<mpsc::Sender<Request>, RemoteError> {
        let (tx, rx) = mpsc::channel::<Request>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Ok(request) = rx.recv() {
                let reply = execute(backend.as_ref(), request);
                if reply_tx.send(reply).is_err() {
                    break;
                }
                if let Some(w) = &waker {
                    w();
                }
            }
        })?;
        Ok(tx)
    }

    pub fn is_inline(&self) -> bool {
        self.lanes.is_none()
    }

    /// Number of requests sent whose reply has not been received yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn send(&mut self, request: Request) {
        self.pending += 1;
        let Some((fetch, submit)) = &self.lanes else {
            let reply = execute(self.backend.as_ref(), request);
            let _ = self.reply_tx.send(reply);
            return;
        };
        let lane = match request.lane() {
            Lane::Fetch => fetch,
            Lane::Submit => submit,
        };
        if let Err(mpsc::SendError(request)) = lane.send(request) {
            log_err!("Dispatcher worker is gone; running {:?} inline", request.lane());
            let reply = execute(self.backend.as_ref(), request);
            let _ = self.reply_tx.send(reply);
        }
    }

    pub fn try_recv(&mut self) -> Option<Reply> {
        let reply = self.reply_rx.try_recv().ok()?;
        self.pending = self.pending.saturating_sub(1);
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Axis;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Backend for Recorder {
        fn fetch_slice(&self, _: SliceKind, _: SliceCoordinate, _: bool) -> Result<RawSlice, RemoteError> {
            self.calls.lock().unwrap().push("fetch");
            Err(RemoteError::Http("offline".into()))
        }
        fn submit_stroke(&self, _: &StrokeRequest) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push("stroke");
            Ok(())
        }
        fn submit_sam(&self, p: &SamPayload) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(match p.kind {
                SamKind::NewAnnotation => "sam:new",
                SamKind::ClearAll => "sam:clear",
                _ => "sam",
            });
            Ok(())
        }
        fn apply_lasso(&self, _: &LassoRequest) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push("lasso");
            Ok(())
        }
        fn find_label_by_click(&self, _: &FindLabelRequest) -> Result<i64, RemoteError> {
            Ok(3)
        }
        fn undo(&self) -> Result<(), RemoteError> {
            Ok(())
        }
        fn new_annotation(&self) -> Result<(), RemoteError> {
            Ok(())
        }
        fn is_annotation_empty(&self) -> Result<bool, RemoteError> {
            Ok(true)
        }
        fn image_info(&self) -> Result<VolumeShape, RemoteError> {
            Ok(VolumeShape { x: 1, y: 1, z: 1 })
        }
    }

    #[test]
    fn lanes_are_split_by_request_kind() {
        assert_eq!(Request::ImageInfo.lane(), Lane::Fetch);
        assert_eq!(Request::Undo.lane(), Lane::Submit);
        assert_eq!(Request::Sam(SamPayload::reset(SamKind::ClearAll)).lane(), Lane::Submit);
    }

    #[test]
    fn inline_replies_wait_for_drain() {
        let mut d = Dispatcher::inline(Arc::new(Recorder::default()));
        d.send(Request::Undo);
        d.send(Request::IsAnnotationEmpty);
        assert_eq!(d.pending(), 2);
        assert!(matches!(d.try_recv(), Some(Reply::Undone(Ok(())))));
        assert!(matches!(d.try_recv(), Some(Reply::AnnotationEmpty(Ok(true)))));
        assert!(d.try_recv().is_none());
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn threaded_submit_lane_keeps_order() {
        let backend = Arc::new(Recorder::default());
        let mut d = Dispatcher::threaded(backend.clone(), None).unwrap();
        d.send(Request::Sam(SamPayload::reset(SamKind::NewAnnotation)));
        d.send(Request::Sam(SamPayload::reset(SamKind::ClearAll)));
        d.send(Request::FetchSlice {
            kind: SliceKind::Image,
            coord: SliceCoordinate::new(Axis::XY, 0),
            contour: false,
            seq: 1,
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut got = 0;
        while got < 3 && Instant::now() < deadline {
            if d.try_recv().is_some() {
                got += 1;
            } else {
                thread::sleep(Duration::from_millis(2));
            }
        }
        assert_eq!(got, 3);
        let calls = backend.calls.lock().unwrap().clone();
        let new_at = calls.iter().position(|c| *c == "sam:new").unwrap();
        let clear_at = calls.iter().position(|c| *c == "sam:clear").unwrap();
        assert!(new_at < clear_at);
    }
}
