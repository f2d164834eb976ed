use egui::{PointerButton, Pos2};

/// Sub-mode of the segmentation-assist tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SamPrompt {
    #[default]
    Box,
    Positive,
    Negative,
}

impl SamPrompt {
    pub fn label(&self) -> &'static str {
        match self {
            SamPrompt::Box => "Box",
            SamPrompt::Positive => "Positive point",
            SamPrompt::Negative => "Negative point",
        }
    }

    pub fn all() -> &'static [SamPrompt] {
        &[SamPrompt::Box, SamPrompt::Positive, SamPrompt::Negative]
    }
}

/// The single tool that receives pointer events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    /// Free-hand polygon filled by the backend on release.
    Lasso,
    /// Click-to-seed region growing; the click is published, not painted.
    MagicWand,
    Sam(SamPrompt),
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Lasso => "Lasso",
            Tool::MagicWand => "Magic wand",
            Tool::Sam(_) => "SAM",
        }
    }

    /// Tools selectable on their own (the SAM prompts are listed separately).
    pub fn plain() -> &'static [Tool] {
        &[Tool::Brush, Tool::Lasso, Tool::MagicWand]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
}

/// One pointer sample in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub pos: Pos2,
    /// Button held for this event (`None` for hover moves and touches).
    pub button: Option<PointerButton>,
    pub kind: PointerKind,
    /// Active touch contacts (0 for mouse input).
    pub touches: usize,
}

impl PointerEvent {
    pub fn mouse(pos: Pos2, button: Option<PointerButton>) -> Self {
        Self { pos, button, kind: PointerKind::Mouse, touches: 0 }
    }

    pub fn touch(pos: Pos2, touches: usize) -> Self {
        Self { pos, button: None, kind: PointerKind::Touch, touches }
    }

    /// Primary mouse button or a single touch contact.
    pub fn is_primary(&self) -> bool {
        match self.kind {
            PointerKind::Mouse => self.button == Some(PointerButton::Primary),
            PointerKind::Touch => self.touches <= 1,
        }
    }

    pub fn is_multi_touch(&self) -> bool {
        self.kind == PointerKind::Touch && self.touches > 1
    }
}
