use std::sync::mpsc;

use crate::volume::Axis;

/// Seed pixel picked with the magic wand.  The region growing itself is run
/// by whoever owns the wand's tolerance settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MagicWandClick {
    pub slice: u32,
    pub axis: Axis,
    pub label: u32,
    pub x_coord: i32,
    pub y_coord: i32,
}

/// Notifications a canvas broadcasts to the rest of the application.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasEvent {
    /// The backend acknowledged an annotation edit.
    AnnotationChanged,
    /// A find-label-by-click lookup selected this label.
    LabelFoundByClick(u32),
    /// Sequential-label mode moved from `previous` to `next` after a stroke.
    SequentialLabelAdvanced { previous: u32, next: u32 },
    /// The magic wand was clicked on a world pixel.
    MagicWand(MagicWandClick),
    /// A long-running request started (`Some(message)`) or finished (`None`).
    Loading(Option<String>),
}

/// Per-canvas fan-out channel.  Subscribers whose receiver was dropped are
/// pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<mpsc::Sender<CanvasEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<CanvasEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: CanvasEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
