use spline_engine::Engine;
use spline_engine::geom::{
    BendTarget, FillingMode, GeomMesh, SourceMesh, SourceTransform, bend_mesh,
};
use spline_engine::parse::spline_xml;

const STRAIGHT: &str = r#"
<spline>
  <node>
    <position x="0" y="0" z="0"/>
    <direction x="4" y="0" z="0"/>
  </node>
  <node>
    <position x="12" y="0" z="0"/>
    <direction x="16" y="0" z="0"/>
  </node>
</spline>
"#;

/// Unit box from x = 0 to 3 with cross-sections at every unit.
fn box_buffers() -> (Vec<f64>, Vec<u32>, Vec<f64>) {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    for i in 0..4 {
        let x = f64::from(i);
        for (y, z) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            positions.extend_from_slice(&[x, y, z]);
            uvs.extend_from_slice(&[x / 3.0, 0.0]);
        }
    }
    let mut indices = Vec::new();
    for i in 0..3u32 {
        for s in 0..4u32 {
            let a = i * 4 + s;
            let b = i * 4 + (s + 1) % 4;
            indices.extend_from_slice(&[a, b, b + 4, a, b + 4, a + 4]);
        }
    }
    (positions, indices, uvs)
}

fn loaded_engine() -> Engine {
    let mut engine = Engine::new();
    engine.load_spline_xml(STRAIGHT).expect("load spline");
    let (positions, indices, uvs) = box_buffers();
    engine
        .set_source_mesh(positions, indices, None, Some(uvs))
        .expect("load source");
    engine
}

#[test]
fn bending_requires_spline_and_source() {
    let mut engine = Engine::new();
    assert!(engine.bend().is_err());
    engine.load_spline_xml(STRAIGHT).unwrap();
    assert!(engine.bend().is_err());
    assert!(engine.positions().is_err());
}

#[test]
fn straight_spline_stretches_box() {
    let mut engine = loaded_engine();
    assert!((engine.spline_length() - 12.0).abs() < 1e-9);
    engine.bend().expect("bend");

    let positions = engine.positions().unwrap();
    assert_eq!(positions.len(), 16 * 3);
    assert_eq!(engine.indices().unwrap().len(), 24 * 3);
    assert_eq!(engine.normals().unwrap().len(), 16 * 3);

    // x = 3 on the source lands on the spline end.
    let last_x = positions[15 * 3];
    assert!((last_x - 12.0).abs() < 1e-6, "{last_x}");
    let uvs = engine.uvs(0).unwrap().expect("uv channel 0");
    assert_eq!(uvs.len(), 32);
    assert_eq!(engine.uvs(3).unwrap(), None);

    let diag = engine.last_diagnostics().unwrap();
    assert_eq!(diag.group_count, 4);
    assert_eq!(diag.sample_evaluations, 4);
}

#[test]
fn engine_rebends_only_when_dirty() {
    let mut engine = loaded_engine();
    assert!(engine.needs_bend());
    engine.bend().unwrap();
    assert!(!engine.needs_bend());
    engine.bend().unwrap();
    assert!(!engine.last_diagnostics().unwrap().cache_hit);

    engine
        .append_node(vec![20.0, 4.0, 0.0, 24.0, 4.0, 0.0])
        .unwrap();
    assert!(engine.needs_bend());
    engine.bend().unwrap();
    assert_eq!(engine.node_count(), 3);
    assert!(engine.spline_length() > 12.0);

    engine.set_filling_mode("repeat").unwrap();
    assert!(engine.needs_bend());
    engine.set_filling_mode("stretch").unwrap();
    engine.bend().unwrap();
    // Same spline version, source and mode as the previous bend.
    assert!(engine.last_diagnostics().unwrap().cache_hit);
    assert!(engine.cache_hit_rate() > 0.0);
}

#[test]
fn failed_edits_leave_spline_intact() {
    let mut engine = loaded_engine();
    engine.bend().unwrap();

    assert!(engine.remove_node(0).is_err());
    assert!(engine.update_node(7, vec![0.0; 6]).is_err());
    assert!(engine.insert_node(0, vec![0.0; 4]).is_err());
    assert!(engine.set_filling_mode("sideways").is_err());
    assert_eq!(engine.node_count(), 2);
    assert!(!engine.needs_bend());
}

#[test]
fn repeat_mode_lays_whole_copies() {
    let mut engine = loaded_engine();
    // Slightly shorter than a quarter of the path, so chord-sum rounding on
    // the path length cannot drop a copy.
    engine
        .set_source_transform(vec![0.0; 3], vec![0.0; 4], vec![0.98, 1.0, 1.0])
        .unwrap();
    engine.set_filling_mode("repeat").unwrap();
    assert_eq!(engine.filling_mode(), FillingMode::Repeat.as_str());
    engine.bend().unwrap();
    assert_eq!(engine.vertex_count(), 4 * 16);
    assert_eq!(engine.last_diagnostics().unwrap().copies, 4);
}

#[test]
fn per_segment_mode_bends_each_curve() {
    let mut engine = loaded_engine();
    engine.add_node_after(1).unwrap();
    engine.set_loop(true).unwrap();
    engine.set_per_segment(true);
    engine.bend().unwrap();

    let curves = engine.current_spline().unwrap().curve_count();
    assert_eq!(curves, 3);
    assert_eq!(engine.vertex_count(), curves * 16);
    assert!(engine.bent_mesh().unwrap().validate().is_ok());
}

#[test]
fn interval_restricts_bend() {
    let mut engine = loaded_engine();
    engine.set_interval(Some(2.0), Some(5.0));
    engine.bend().unwrap();
    let positions = engine.positions().unwrap();
    let xs: Vec<f64> = positions.chunks(3).map(|p| p[0]).collect();
    assert!(xs.iter().all(|x| *x > 2.0 - 1e-6 && *x < 5.0 + 1e-6));
}

#[test]
fn source_transform_rebuilds_snapshot() {
    let mut engine = loaded_engine();
    engine.bend().unwrap();
    let before = engine.positions().unwrap();

    engine
        .set_source_transform(vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 0.0, 0.0], vec![1.0, 2.0, 2.0])
        .unwrap();
    assert!(engine.needs_bend());
    engine.bend().unwrap();
    let after = engine.positions().unwrap();
    assert_eq!(before.len(), after.len());
    assert!((after[1] - (before[1] * 2.0 + 1.0)).abs() < 1e-6);

    assert!(engine
        .set_source_transform(vec![0.0; 2], vec![0.0; 4], vec![1.0; 3])
        .is_err());
}

#[test]
fn create_spline_reads_short_and_full_node_buffers() {
    let mut engine = Engine::new();
    engine
        .create_spline(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 10.0, 0.0, 0.0, 11.0, 0.0, 0.0], 6, false)
        .unwrap();
    assert_eq!(engine.node_count(), 2);
    assert!((engine.spline_length() - 10.0).abs() < 1e-9);

    let mut three = Vec::new();
    for x in [0.0, 4.0, 8.0] {
        three.extend_from_slice(&[x, 0.0, 0.0, x + 1.0, 0.0, 0.0]);
    }
    engine.create_spline(three, 6, true).unwrap();
    assert_eq!(engine.node_count(), 3);
    assert!(engine.is_loop().unwrap());

    let full = engine.node_data().unwrap();
    assert_eq!(full.len(), 3 * 12);
    let mut copy = Engine::new();
    copy.create_spline(full.clone(), 12, true).unwrap();
    assert_eq!(copy.node_data().unwrap(), full);
}

#[test]
fn create_spline_rejects_bad_buffers() {
    let mut engine = Engine::new();
    let two_short = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 10.0, 0.0, 0.0, 11.0, 0.0, 0.0];
    // Twelve floats at the full stride are a single node.
    assert!(engine.create_spline(two_short.clone(), 12, false).is_err());
    assert!(engine.create_spline(two_short, 4, false).is_err());
    assert!(engine.create_spline(vec![0.0; 13], 6, false).is_err());
    assert_eq!(engine.node_count(), 0);
}

#[test]
fn spline_xml_round_trips_through_engine() {
    let mut engine = loaded_engine();
    engine.apply_scale_roll_ramp(1.0, 0.25, 0.0, 90.0).unwrap();
    engine.set_loop(true).unwrap();
    let xml = engine.spline_xml().unwrap();

    let spline = spline_xml::parse_str(&xml).unwrap();
    let original = engine.current_spline().unwrap();
    assert_eq!(spline.nodes(), original.nodes());
    assert!(spline.is_loop());

    let mut other = Engine::new();
    other.load_spline_xml(&xml).unwrap();
    assert_eq!(other.node_data().unwrap(), engine.node_data().unwrap());
}

#[test]
fn engine_matches_library_bend() {
    let mut engine = loaded_engine();
    engine.bend().unwrap();

    let spline = spline_xml::parse_str(STRAIGHT).unwrap();
    let (positions, indices, uvs) = box_buffers();
    let mesh = GeomMesh::new(
        positions.chunks(3).map(|c| [c[0], c[1], c[2]]).collect(),
        indices,
    )
    .with_uv_channel(0, uvs.chunks(2).map(|c| [c[0], c[1]]).collect());
    let source = SourceMesh::build(&mesh, SourceTransform::new()).unwrap();
    let (expected, _) = bend_mesh(&source, BendTarget::spline(&spline), FillingMode::default());

    assert_eq!(engine.bent_mesh(), Some(&expected));
}
