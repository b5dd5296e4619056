//! Overlay data model and the keyed registry that the protocol drives.

pub mod registry;

use std::path::{Path, PathBuf};

use serde::Serialize;

pub use registry::OverlayRegistry;

/// Key under which an overlay is registered.
pub type OverlayKey = String;

/// Variant-specific overlay state. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayKind {
    Image {
        /// Path as sent by the engine.
        image_path: String,
        /// `image_path` resolved against the scene folder.
        resolved_path: PathBuf,
    },
    Text {
        text: String,
        size: f32,
    },
}

/// A positioned, visibility-toggleable element layered on the scene image.
///
/// Fields are private so the variant and the image path stay immutable once
/// the overlay exists; mutation goes through the crate-internal setters used
/// by [`OverlayRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    visible: bool,
    x: f32,
    y: f32,
    #[serde(flatten)]
    kind: OverlayKind,
}

impl Overlay {
    pub fn image(image_path: impl Into<String>, resolved_path: impl Into<PathBuf>) -> Self {
        Self::with_kind(OverlayKind::Image {
            image_path: image_path.into(),
            resolved_path: resolved_path.into(),
        })
    }

    pub fn text(text: impl Into<String>, size: f32) -> Self {
        Self::with_kind(OverlayKind::Text {
            text: text.into(),
            size,
        })
    }

    fn with_kind(kind: OverlayKind) -> Self {
        Self {
            visible: true,
            x: 0.0,
            y: 0.0,
            kind,
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn kind(&self) -> &OverlayKind {
        &self.kind
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, OverlayKind::Text { .. })
    }

    pub fn image_path(&self) -> Option<&str> {
        match &self.kind {
            OverlayKind::Image { image_path, .. } => Some(image_path.as_str()),
            OverlayKind::Text { .. } => None,
        }
    }

    pub fn resolved_path(&self) -> Option<&Path> {
        match &self.kind {
            OverlayKind::Image { resolved_path, .. } => Some(resolved_path.as_path()),
            OverlayKind::Text { .. } => None,
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            OverlayKind::Text { text, .. } => Some(text.as_str()),
            OverlayKind::Image { .. } => None,
        }
    }

    pub fn text_size(&self) -> Option<f32> {
        match &self.kind {
            OverlayKind::Text { size, .. } => Some(*size),
            OverlayKind::Image { .. } => None,
        }
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// Returns false on an image overlay, leaving it untouched.
    pub(crate) fn set_text(&mut self, value: String) -> bool {
        match &mut self.kind {
            OverlayKind::Text { text, .. } => {
                *text = value;
                true
            }
            OverlayKind::Image { .. } => false,
        }
    }

    /// Returns false on an image overlay, leaving it untouched.
    pub(crate) fn set_size(&mut self, value: f32) -> bool {
        match &mut self.kind {
            OverlayKind::Text { size, .. } => {
                *size = value;
                true
            }
            OverlayKind::Image { .. } => false,
        }
    }
}
