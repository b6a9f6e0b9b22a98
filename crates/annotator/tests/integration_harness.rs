//! Integration tests for TestHarness and the fixtures it is built on.

use annotator_lib::assets::glb::decode_glb;
use annotator_lib::fixtures;
use annotator_lib::harness::TestHarness;
use annotator_lib::state::{AnnotationPhase, AnnotatorSettings};

#[test]
fn test_harness_starts_idle_and_unready() {
    let h = TestHarness::new();
    assert_eq!(h.phase(), AnnotationPhase::Idle);
    assert!(!h.session.is_ready());
    assert_eq!(h.graph().live_count(), 0);
}

#[test]
fn test_harness_pick_confirm_cancel_cycle() {
    let mut h = TestHarness::new();
    h.load_strip_scene("S1", Default::default());

    h.click_face(1);
    assert_eq!(h.live_markers(), 1);
    h.cancel();
    assert_eq!(h.live_markers(), 0);
    assert_eq!(h.phase(), AnnotationPhase::Idle);

    h.click_face(1);
    assert!(h.confirm());
    assert_eq!(h.live_highlights(), 1);
    assert_eq!(h.live_outlines(), 1);
    assert!(!h.confirm());
}

#[test]
fn test_harness_small_capacity_evicts_on_save() {
    let settings = AnnotatorSettings {
        max_persistent_markers: 2,
        ..Default::default()
    };
    let mut h = TestHarness::with_settings(settings);
    h.load_strip_scene("S1", Default::default());

    for face in [0, 2, 7] {
        h.click_face(face);
        h.confirm();
        h.fill("thing", "some query");
        h.save_ok().unwrap();
    }
    let visuals = h.session.visuals();
    assert_eq!(visuals.live_persistent_count(), 2);
    assert!(visuals.persistent("0").is_none());
    assert!(visuals.persistent("1").is_some());
    assert!(visuals.persistent("2").is_some());
    // the cache keeps every saved annotation
    assert_eq!(h.session.saved().len(), 3);
}

#[test]
fn test_fixture_glb_decodes_to_strip_geometry() {
    let root = decode_glb(&fixtures::strip_glb()).unwrap();
    assert_eq!(root.triangle_count(), fixtures::STRIP_FACE_MAP.len());
    let bounds = root.world_bounds().unwrap();
    assert_eq!(bounds.min.x, 0.0);
    assert_eq!(bounds.max.x, 10.0);
}
