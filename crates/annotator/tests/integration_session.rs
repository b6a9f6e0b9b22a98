//! Integration tests for the picking → confirm → save workflow on the ten-face strip.

use std::collections::BTreeMap;

use annotator_lib::assets::details::InstanceDetailTable;
use annotator_lib::assets::face_map::FaceInstanceIndex;
use annotator_lib::error::SaveError;
use annotator_lib::fixtures;
use annotator_lib::harness::TestHarness;
use annotator_lib::state::AnnotationPhase;
use annotator_lib::viewport::highlight::{extract_highlight, HighlightStyle};
use annotator_lib::viewport::picking::PickResult;
use annotator_lib::viewport::scene_graph::VisualKind;
use glam::Vec3;
use shared::{RegionMap, SavedAnnotation, SavedAnnotationMap};

fn loaded() -> TestHarness {
    let mut h = TestHarness::new();
    h.load_strip_scene("S1", SavedAnnotationMap::new());
    h
}

#[test]
fn test_strip_screen_pick_hits_table() {
    let mut h = loaded();
    h.set_camera(fixtures::top_down_camera(4.5, 0.4));
    let center = fixtures::viewport_center();

    let result = h.click_screen(center.x, center.y).unwrap();
    let hit = result.hit().expect("expected a hit");
    assert_eq!(hit.face_index, 4);
    assert_eq!(hit.instance_id, 1);
    assert_eq!(hit.detail.label, "table");
    assert!((hit.point - Vec3::new(4.5, 0.4, 0.0)).length() < 1e-4);
    assert_eq!(h.phase(), AnnotationPhase::Pending);
}

#[test]
fn test_screen_pick_outside_mesh_is_miss() {
    let mut h = loaded();
    h.set_camera(fixtures::top_down_camera(4.5, 5.0));
    let center = fixtures::viewport_center();
    assert_eq!(h.click_screen(center.x, center.y), Some(PickResult::Miss));
}

#[test]
fn test_sentinel_face_is_unmapped() {
    let mut h = loaded();
    let result = h.click_face(5).unwrap();
    assert!(matches!(result, PickResult::UnmappedFace { face_index: 5, instance_id: -1 }));
    assert_eq!(h.phase(), AnnotationPhase::Idle);
}

#[test]
fn test_every_face_resolves_to_its_instance() {
    let mut h = loaded();
    for (f, &expected) in fixtures::STRIP_FACE_MAP.iter().enumerate() {
        match h.click_face(f).unwrap() {
            PickResult::Hit(hit) => assert_eq!(hit.instance_id, expected, "face {f}"),
            PickResult::UnmappedFace { instance_id, .. } => {
                assert_eq!(instance_id, expected);
                assert!(expected < 0);
            }
            other => panic!("face {f}: unexpected {other:?}"),
        }
    }
}

#[test]
fn test_extraction_matches_face_counts() {
    let root = fixtures::strip_root();
    let faces = fixtures::strip_faces();
    for id in faces.instance_ids() {
        let highlight = extract_highlight(id, &root, &faces, HighlightStyle::default())
            .unwrap()
            .expect("instance has faces");
        assert_eq!(highlight.geometry.triangle_count(), faces.face_count_of(id));
        assert_eq!(highlight.skipped_faces, 0);
    }
}

#[test]
fn test_save_with_default_region() {
    let mut h = loaded();
    h.click_face(4);
    assert!(h.confirm());
    h.fill("dining table", "wooden table near window");

    let request = h.save_ok().unwrap();
    assert_eq!(request.instance_id, "1");
    assert_eq!(request.final_label_string, "dining table");
    assert_eq!(request.final_region_label, "N/A");
    assert_eq!(request.final_region_code, "-");
    assert!(request.bounding_box.is_some());

    let saved = h.session.saved().get("1").unwrap();
    assert_eq!(saved.final_label, "dining table");
    assert_eq!(saved.query, "wooden table near window");
    // selection stays open after a save
    assert_eq!(h.phase(), AnnotationPhase::Selected);
}

#[test]
fn test_save_uses_selected_region() {
    let mut h = loaded();
    let regions: RegionMap = [("k", "kitchen"), ("l", "living room")]
        .into_iter()
        .map(|(c, l)| (c.to_string(), l.to_string()))
        .collect();
    h.session.set_regions(&regions);
    h.click_face(0);
    h.confirm();
    let choices = h.session.regions().clone();
    assert!(h.session.form.select_region(&choices, "living room"));
    h.fill("chair", "chair by the sofa");

    let request = h.save_ok().unwrap();
    assert_eq!(request.final_region_label, "living room");
    assert_eq!(request.final_region_code, "l");
}

#[test]
fn test_save_validation_rejects_empty_fields() {
    let mut h = loaded();
    h.click_face(4);
    h.confirm();

    h.fill("", "non-empty");
    assert_eq!(h.save_ok(), Err(SaveError::EmptyLabel));
    h.fill("table", "");
    assert_eq!(h.save_ok(), Err(SaveError::EmptyQuery));
    assert_eq!(h.session.selection().in_flight_count(), 0);
    assert!(h.session.saved().is_empty());
}

#[test]
fn test_save_without_selection() {
    let mut h = loaded();
    h.fill("table", "q");
    assert_eq!(h.save_ok(), Err(SaveError::NoSelection));
}

#[test]
fn test_promoted_visuals_survive_clear_highlight() {
    let mut h = TestHarness::new();
    let mut bundle = fixtures::strip_bundle("S42");
    bundle.faces = FaceInstanceIndex::new(vec![42; 10]);
    bundle.details =
        InstanceDetailTable::from_records(BTreeMap::from([("42".to_string(), fixtures::detail_record("sofa", 9))]));
    h.session.begin_scene_load("S42");
    h.session.finish_scene_load(bundle).unwrap();

    h.click_face(3);
    h.confirm();
    h.fill("sofa", "grey sofa");
    h.save_ok().unwrap();

    let entry = *h.session.visuals().persistent("42").unwrap();
    let (marker, outline) = (entry.marker.unwrap(), entry.outline.unwrap());
    assert!(h.session.visuals().temporary_marker().is_none());
    assert!(h.session.visuals().temporary_outline().is_none());
    assert_eq!(h.live_highlights(), 0);

    // a new pick clears the highlight; cancelling clears the temporary marker
    h.click_face(0);
    h.cancel();
    assert!(h.graph().is_live(marker));
    assert!(h.graph().is_live(outline));
    assert_eq!(h.graph().stale_removals(), 0);
}

#[test]
fn test_bulk_redisplay_capacity_bound() {
    let mut h = TestHarness::new();
    let report = h.load_strip_scene("S1", fixtures::annotations_with_boxes(250));
    assert_eq!(report.displayed, 200);
    assert_eq!(report.over_capacity.len(), 50);
    assert_eq!(h.session.visuals().live_persistent_count(), 200);
    assert_eq!(h.live_markers(), 200);
    assert_eq!(h.live_outlines(), 200);
}

#[test]
fn test_saved_box_redisplays_at_center() {
    // box as it travels: request json → stored annotation → scene load
    let request_box = serde_json::to_value(fixtures::unit_box()).unwrap();
    let mut saved = SavedAnnotationMap::new();
    saved.insert(
        "1".to_string(),
        SavedAnnotation {
            final_label: "table".into(),
            query: "q".into(),
            bounding_box: Some(request_box),
        },
    );

    let mut h = TestHarness::new();
    h.load_strip_scene("S1", saved);
    let marker = h.session.visuals().persistent("1").unwrap().marker.unwrap();
    match &h.graph().get(marker).unwrap().kind {
        VisualKind::Marker { center, .. } => assert_eq!(*center, Vec3::splat(0.5)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_pending_and_selected_coexist_until_confirm() {
    let mut h = loaded();
    h.click_face(4);
    h.confirm();
    h.click_face(8);
    assert_eq!(h.phase(), AnnotationPhase::Pending);
    assert!(h.session.selection().is_selected("1"));
    assert_eq!(h.live_highlights(), 0);

    h.confirm();
    assert!(h.session.selection().is_selected("2"));
    assert_eq!(h.session.form.label, "lamp");
    assert_eq!(h.live_highlights(), 1);
}

#[test]
fn test_scene_clear_releases_all_visuals() {
    let mut h = TestHarness::new();
    h.load_strip_scene("S1", fixtures::annotations_with_boxes(20));
    h.click_face(4);
    h.confirm();
    h.fill("table", "q");
    h.save_ok().unwrap();
    h.click_face(0);
    h.confirm();

    h.clear();
    assert!(h.all_released());
    assert!(h.session.saved().is_empty());
    assert_eq!(h.phase(), AnnotationPhase::Idle);
    assert!(h.click_face(0).is_none());
}
