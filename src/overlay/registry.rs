// OverlayRegistry: keyed overlay state driven by protocol messages
//
// One mutex covers lookup, mutation and insertion so messages arriving on
// different delivery threads never interleave on the same overlay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

use super::{Overlay, OverlayKey};
use crate::host::{RenderSurface, Scene};
use crate::protocol::{self, Atom, OverlayCommand};
use crate::remote::MessageListener;

/// Registry of overlays keyed by the name the engine chose for them.
///
/// Entries are created by `load` or `text` on an unseen key and are never
/// removed. The variant of an entry never changes.
pub struct OverlayRegistry {
    overlays: Mutex<HashMap<OverlayKey, Overlay>>,
    scene: Scene,
    surface: Arc<dyn RenderSurface>,
}

impl OverlayRegistry {
    pub fn new(scene: Scene, surface: Arc<dyn RenderSurface>) -> Self {
        Self {
            overlays: Mutex::new(HashMap::new()),
            scene,
            surface,
        }
    }

    /// Decode one message and apply it.
    ///
    /// Never fails: malformed frames, unknown verbs, unknown keys for a
    /// non-creating verb and variant mismatches are all dropped silently.
    pub fn apply(&self, args: &[Atom]) {
        let Some(message) = protocol::decode(args) else {
            trace!("[OverlayRegistry] dropping undecodable message ({} atoms)", args.len());
            return;
        };

        let mut overlays = self.lock_overlays();
        let key = message.key;

        if let Some(overlay) = overlays.get_mut(&key) {
            let changed = match message.command {
                OverlayCommand::Visible { flag } => {
                    overlay.set_visible(flag);
                    true
                }
                OverlayCommand::Move { x, y } => {
                    overlay.set_position(x, y);
                    true
                }
                OverlayCommand::Text { value } => overlay.set_text(value),
                OverlayCommand::Size { value } => overlay.set_size(value),
                OverlayCommand::Load { .. } | OverlayCommand::Unknown { .. } => false,
            };
            if changed {
                self.surface.overlay_changed(&key, overlay);
            }
            return;
        }

        let overlay = match message.command {
            OverlayCommand::Load { path } => {
                let resolved = self.scene.resolve(&path);
                Overlay::image(path, resolved)
            }
            OverlayCommand::Text { value } => {
                Overlay::text(value, self.surface.default_text_size())
            }
            _ => return,
        };

        debug!("[OverlayRegistry] created overlay {:?}", key);
        self.surface.add_overlay(&key, &overlay);
        overlays.insert(key, overlay);
    }

    /// Copy of the overlay registered under `key`.
    pub fn get(&self, key: &str) -> Option<Overlay> {
        self.lock_overlays().get(key).cloned()
    }

    /// Copy of every overlay, ordered by key.
    pub fn snapshot(&self) -> Vec<(OverlayKey, Overlay)> {
        let overlays = self.lock_overlays();
        let mut entries: Vec<_> = overlays
            .iter()
            .map(|(key, overlay)| (key.clone(), overlay.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.lock_overlays().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    // A panic inside a render callback must not wedge delivery, so a
    // poisoned lock is recovered rather than reported.
    fn lock_overlays(&self) -> MutexGuard<'_, HashMap<OverlayKey, Overlay>> {
        self.overlays.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageListener for OverlayRegistry {
    fn receive_list(&self, _topic: &str, args: &[Atom]) {
        self.apply(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSurface {
        added: AtomicUsize,
        changed: AtomicUsize,
    }

    impl RenderSurface for CountingSurface {
        fn add_overlay(&self, _key: &str, _overlay: &Overlay) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }

        fn overlay_changed(&self, _key: &str, _overlay: &Overlay) {
            self.changed.fetch_add(1, Ordering::SeqCst);
        }

        fn dimensions(&self) -> (f32, f32) {
            (320.0, 240.0)
        }

        fn default_text_size(&self) -> f32 {
            18.0
        }
    }

    fn registry() -> (OverlayRegistry, Arc<CountingSurface>) {
        let surface = Arc::new(CountingSurface::default());
        let registry = OverlayRegistry::new(Scene::new("/scenes/demo"), surface.clone());
        (registry, surface)
    }

    fn sym(value: &str) -> Atom {
        Atom::Symbol(value.to_string())
    }

    fn num(value: f32) -> Atom {
        Atom::Float(value)
    }

    #[test]
    fn test_load_move_visible_in_order() {
        let (registry, surface) = registry();
        registry.apply(&[sym("k"), sym("load"), sym("a.png")]);
        registry.apply(&[sym("k"), sym("move"), num(10.0), num(20.0)]);
        registry.apply(&[sym("k"), sym("visible"), num(0.0)]);

        let overlay = registry.get("k").unwrap();
        assert_eq!(overlay.image_path(), Some("a.png"));
        assert_eq!(
            overlay.resolved_path(),
            Some(std::path::Path::new("/scenes/demo/a.png"))
        );
        assert_eq!(overlay.position(), (10.0, 20.0));
        assert!(!overlay.visible());
        assert_eq!(surface.added.load(Ordering::SeqCst), 1);
        assert_eq!(surface.changed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_text_overlay_lifecycle() {
        let (registry, _surface) = registry();
        registry.apply(&[sym("t1"), sym("text"), sym("hello")]);
        let created = registry.get("t1").unwrap();
        assert_eq!(created.text_content(), Some("hello"));
        assert_eq!(created.text_size(), Some(18.0));

        registry.apply(&[sym("t1"), sym("size"), num(24.0)]);
        registry.apply(&[sym("t1"), sym("move"), num(5.0), num(5.0)]);
        registry.apply(&[sym("t1"), sym("text"), sym("bye")]);

        let overlay = registry.get("t1").unwrap();
        assert_eq!(overlay.text_size(), Some(24.0));
        assert_eq!(overlay.position(), (5.0, 5.0));
        assert_eq!(overlay.text_content(), Some("bye"));
    }

    #[test]
    fn test_text_commands_do_not_touch_image_overlays() {
        let (registry, surface) = registry();
        registry.apply(&[sym("img"), sym("load"), sym("a.png")]);
        let before = registry.get("img").unwrap();

        registry.apply(&[sym("img"), sym("text"), sym("oops")]);
        registry.apply(&[sym("img"), sym("size"), num(40.0)]);

        assert_eq!(registry.get("img").unwrap(), before);
        assert_eq!(surface.changed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recreation_keeps_original_variant() {
        let (registry, surface) = registry();
        registry.apply(&[sym("k"), sym("load"), sym("a.png")]);
        registry.apply(&[sym("k"), sym("text"), sym("now text?")]);
        registry.apply(&[sym("k"), sym("load"), sym("b.png")]);

        let overlay = registry.get("k").unwrap();
        assert_eq!(overlay.image_path(), Some("a.png"));
        assert_eq!(registry.len(), 1);
        assert_eq!(surface.added.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_move_leaves_overlay_unchanged() {
        let (registry, _surface) = registry();
        registry.apply(&[sym("k"), sym("load"), sym("a.png")]);
        registry.apply(&[sym("k"), sym("move"), num(3.0), num(4.0)]);
        registry.apply(&[sym("k"), sym("move"), num(10.0)]);
        registry.apply(&[sym("k"), sym("move"), num(10.0), sym("y")]);

        assert_eq!(registry.get("k").unwrap().position(), (3.0, 4.0));
    }

    #[test]
    fn test_unknown_key_only_created_by_load_or_text() {
        let (registry, surface) = registry();
        registry.apply(&[sym("ghost"), sym("move"), num(1.0), num(2.0)]);
        registry.apply(&[sym("ghost"), sym("visible"), num(1.0)]);
        registry.apply(&[sym("ghost"), sym("size"), num(9.0)]);
        registry.apply(&[sym("ghost"), sym("explode")]);

        assert!(registry.is_empty());
        assert_eq!(surface.added.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_snapshot_is_sorted_by_key() {
        let (registry, _surface) = registry();
        registry.apply(&[sym("b"), sym("text"), sym("2")]);
        registry.apply(&[sym("a"), sym("text"), sym("1")]);
        let keys: Vec<_> = registry.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
