use crate::geom::{GeomMesh, Quat, SourceMesh, SourceTransform, Vec3};

/// Open tube along `z`: `rings` cross-sections of `segments` vertices each.
pub(super) fn tube_along_z(rings: usize, segments: usize, length: f64) -> GeomMesh {
    let mut positions = Vec::with_capacity(rings * segments);
    for r in 0..rings {
        let z = length * r as f64 / (rings - 1) as f64;
        for s in 0..segments {
            let a = std::f64::consts::TAU * s as f64 / segments as f64;
            positions.push([a.cos(), a.sin(), z]);
        }
    }
    let mut indices = Vec::new();
    for r in 0..rings - 1 {
        for s in 0..segments {
            let a = (r * segments + s) as u32;
            let b = (r * segments + (s + 1) % segments) as u32;
            let c = b + segments as u32;
            let d = a + segments as u32;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    GeomMesh::new(positions, indices)
}

/// Turns the tube onto `x`. The rotation leaves ~1e-16 noise on `x`, so rates
/// are snapped.
fn x_aligned() -> SourceTransform {
    SourceTransform::new()
        .rotate(Quat::from_axis_angle_degrees(Vec3::Y, 90.0))
        .rate_quantum(1e-9)
}

#[test]
fn rotated_tube_groups_by_ring() {
    let source = SourceMesh::build(&tube_along_z(5, 8, 4.0), x_aligned()).unwrap();
    assert_eq!(source.group_count(), 5);
    assert!((source.length() - 4.0).abs() < 1e-12);
    for (i, rate) in source.sample_groups().iter().enumerate() {
        assert!((rate - 0.25 * i as f64).abs() < 1e-12, "group {i}: {rate}");
    }
    for (v, group) in source.vertex_groups().iter().enumerate() {
        assert_eq!(*group, v / 8);
    }
}

#[test]
fn group_count_ignores_cross_section_density() {
    let coarse = SourceMesh::build(&tube_along_z(6, 4, 2.0), x_aligned()).unwrap();
    let fine = SourceMesh::build(&tube_along_z(6, 64, 2.0), x_aligned()).unwrap();
    assert_eq!(coarse.group_count(), fine.group_count());
    assert_eq!(fine.vertex_count(), 6 * 64);
}

#[test]
fn translation_does_not_change_rates() {
    let mesh = tube_along_z(3, 6, 1.0);
    let base = SourceMesh::build(&mesh, x_aligned()).unwrap();
    let moved =
        SourceMesh::build(&mesh, x_aligned().translate(Vec3::new(-7.5, 2.0, 1.0))).unwrap();
    assert_eq!(base.sample_groups(), moved.sample_groups());
    assert!((moved.min_x() - (base.min_x() - 7.5)).abs() < 1e-12);
    assert_eq!(base.vertex_groups(), moved.vertex_groups());
}

#[test]
fn scaling_stretches_extent_and_keeps_normals_unnormalized() {
    let mesh = tube_along_z(2, 4, 1.0).with_normals(vec![[0.0, 0.0, 1.0]; 8]);
    let source = SourceMesh::build(&mesh, x_aligned().scale(Vec3::new(3.0, 1.0, 1.0))).unwrap();
    assert!((source.length() - 3.0).abs() < 1e-12);
    let n = source.vertices()[0].normal;
    assert!((n - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-12);
    assert!(!source.has_generated_normals());
}

#[test]
fn mirrored_snapshot_reverses_every_triangle() {
    let mesh = tube_along_z(3, 4, 1.0);
    let source =
        SourceMesh::build(&mesh, SourceTransform::new().scale(Vec3::new(1.0, 1.0, -1.0))).unwrap();
    for (src, dst) in mesh.indices.chunks(3).zip(source.indices().chunks(3)) {
        assert_eq!(dst, [src[2], src[1], src[0]]);
    }
    // Input mesh is untouched.
    assert_eq!(mesh.indices[..3], [0, 1, 5]);
}

#[test]
fn empty_mesh_builds_empty_snapshot() {
    let source = SourceMesh::build(&GeomMesh::default(), SourceTransform::new()).unwrap();
    assert_eq!(source.vertex_count(), 0);
    assert_eq!(source.group_count(), 0);
    assert_eq!(source.length(), 0.0);
}
