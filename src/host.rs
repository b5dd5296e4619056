//! Host-side collaborators.
//!
//! The host container owns the window, the base image and the text log
//! widget. This crate only sees it through the traits below, plus the
//! [`Scene`] folder layout shared by the registry and the connection.

use std::path::{Path, PathBuf};

use crate::overlay::Overlay;

/// Base image file inside a scene folder.
pub const SCENE_IMAGE: &str = "image.jpg";

/// Session definition file inside a scene folder.
pub const SCENE_PATCH: &str = "_main.pd";

/// Text size used when the surface does not override it.
pub const DEFAULT_TEXT_SIZE: f32 = 16.0;

/// Surface that draws the base image and its overlays.
///
/// Callbacks are invoked while the overlay registry holds its lock, so an
/// implementation must not call back into the registry from them.
pub trait RenderSurface: Send + Sync {
    /// A new overlay was created under `key`.
    fn add_overlay(&self, key: &str, overlay: &Overlay);

    /// An existing overlay changed; redraw when convenient.
    fn overlay_changed(&self, _key: &str, _overlay: &Overlay) {}

    /// Current drawable size in pixels as `(width, height)`.
    fn dimensions(&self) -> (f32, f32);

    fn default_text_size(&self) -> f32 {
        DEFAULT_TEXT_SIZE
    }
}

/// Lifecycle hook used to close the host surface.
pub trait HostControl: Send + Sync {
    fn finish(&self);
}

/// An active scene: a folder holding the base image and the session file.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    folder: PathBuf,
}

impl Scene {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Display name, taken from the folder name.
    pub fn name(&self) -> String {
        self.folder
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn image_path(&self) -> PathBuf {
        self.folder.join(SCENE_IMAGE)
    }

    pub fn patch_path(&self) -> PathBuf {
        self.folder.join(SCENE_PATCH)
    }

    /// Resolve an asset path relative to the scene folder.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.folder.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_layout_paths() {
        let scene = Scene::new("/sdcard/pd/scenes/Wobble");
        assert_eq!(scene.name(), "Wobble");
        assert_eq!(
            scene.image_path(),
            PathBuf::from("/sdcard/pd/scenes/Wobble/image.jpg")
        );
        assert_eq!(
            scene.patch_path(),
            PathBuf::from("/sdcard/pd/scenes/Wobble/_main.pd")
        );
        assert_eq!(
            scene.resolve("sprites/a.png"),
            PathBuf::from("/sdcard/pd/scenes/Wobble/sprites/a.png")
        );
    }
}
