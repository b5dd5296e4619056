//! Overlay protocol behavior through the public registry API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use scene_player::{Atom, Overlay, OverlayKind, OverlayRegistry, RenderSurface, Scene};

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
        (800.0, 600.0)
    }
}

fn sym(value: &str) -> Atom {
    Atom::Symbol(value.to_string())
}

fn num(value: f32) -> Atom {
    Atom::Float(value)
}

fn registry() -> (Arc<OverlayRegistry>, Arc<CountingSurface>) {
    let surface = Arc::new(CountingSurface::default());
    let registry = Arc::new(OverlayRegistry::new(
        Scene::new("/scenes/protocol"),
        surface.clone(),
    ));
    (registry, surface)
}

#[test]
fn test_creation_never_changes_variant() {
    let (registry, surface) = registry();
    registry.apply(&[sym("k"), sym("load"), sym("a.png")]);
    registry.apply(&[sym("k"), sym("text"), sym("now text?")]);
    registry.apply(&[sym("k"), sym("load"), sym("b.png")]);
    registry.apply(&[sym("k"), sym("size"), num(40.0)]);

    let overlay = registry.get("k").unwrap();
    assert!(matches!(overlay.kind(), OverlayKind::Image { .. }));
    assert_eq!(overlay.image_path(), Some("a.png"));
    assert_eq!(surface.added.load(Ordering::SeqCst), 1);
    assert_eq!(surface.changed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_malformed_frames_leave_state_untouched() {
    let (registry, _surface) = registry();
    registry.apply(&[sym("k"), sym("load"), sym("a.png")]);
    let before = registry.get("k").unwrap();

    registry.apply(&[sym("k"), sym("move"), num(10.0)]);
    registry.apply(&[sym("k"), sym("move"), sym("ten"), num(20.0)]);
    registry.apply(&[sym("k"), sym("visible"), sym("yes")]);
    registry.apply(&[num(1.0), sym("move"), num(1.0), num(1.0)]);
    registry.apply(&[sym("k")]);
    registry.apply(&[]);
    registry.apply(&[sym("k"), sym("spin"), num(90.0)]);

    assert_eq!(registry.get("k").unwrap(), before);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unknown_key_needs_creation_command() {
    let (registry, _surface) = registry();
    registry.apply(&[sym("ghost"), sym("move"), num(1.0), num(2.0)]);
    registry.apply(&[sym("ghost"), sym("visible"), num(1.0)]);
    registry.apply(&[sym("ghost"), sym("size"), num(12.0)]);
    assert!(registry.is_empty());
}

#[test]
fn test_text_end_to_end() {
    let (registry, _surface) = registry();
    registry.apply(&[sym("t1"), sym("text"), sym("hello")]);
    registry.apply(&[sym("t1"), sym("size"), num(24.0)]);
    registry.apply(&[sym("t1"), sym("move"), num(5.0), num(5.0)]);

    let overlay = registry.get("t1").unwrap();
    assert_eq!(overlay.text_content(), Some("hello"));
    assert_eq!(overlay.text_size(), Some(24.0));
    assert_eq!(overlay.position(), (5.0, 5.0));
    assert!(overlay.visible());
}

#[test]
fn test_concurrent_keys_stay_independent() {
    let (registry, surface) = registry();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                let key = format!("key-{}", t);
                barrier.wait();
                registry.apply(&[sym(&key), sym("text"), sym("start")]);
                for i in 0..200 {
                    let value = (t * 1000 + i) as f32;
                    registry.apply(&[sym(&key), sym("move"), num(value), num(value)]);
                }
                registry.apply(&[sym(&key), sym("text"), sym(&key)]);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), threads);
    assert_eq!(surface.added.load(Ordering::SeqCst), threads);
    for (key, overlay) in registry.snapshot() {
        let t: usize = key.trim_start_matches("key-").parse().unwrap();
        let last = (t * 1000 + 199) as f32;
        assert_eq!(overlay.position(), (last, last));
        assert_eq!(overlay.text_content(), Some(key.as_str()));
    }
}
