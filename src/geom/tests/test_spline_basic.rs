use std::cell::Cell;
use std::rc::Rc;

use crate::geom::{
    CubicBezierCurve, Point3, Spline, SplineError, SplineNode, Tolerance, Vec2, Vec3,
    sample_curves_at_distance,
};

fn square_loop() -> Spline {
    let corners = [
        (0.0, 0.0, 1.0, 0.0),
        (10.0, 0.0, 0.0, 1.0),
        (10.0, 10.0, -1.0, 0.0),
        (0.0, 10.0, 0.0, -1.0),
    ];
    let nodes = corners
        .iter()
        .map(|&(x, z, dx, dz)| {
            SplineNode::new(Point3::new(x, 0.0, z), Point3::new(x + 4.0 * dx, 0.0, z + 4.0 * dz))
        })
        .collect();
    Spline::new(nodes).unwrap().looped(true)
}

#[test]
fn removing_from_two_node_path_fails_and_keeps_state() {
    let a = SplineNode::new(Point3::ORIGIN, Point3::new(10.0, 0.0, 0.0));
    let b = SplineNode::new(Point3::new(20.0, 0.0, 0.0), Point3::new(30.0, 0.0, 0.0));
    let mut spline = Spline::new(vec![a, b]).unwrap();
    let length = spline.length();

    for index in 0..2 {
        assert_eq!(
            spline.remove(index),
            Err(SplineError::InvariantViolation { node_count: 1 })
        );
    }
    assert_eq!(spline.nodes(), &[a, b]);
    assert_eq!(spline.length(), length);
    assert_eq!(spline.version(), 0);
}

#[test]
fn loop_length_is_sum_of_segments() {
    let spline = square_loop();
    assert_eq!(spline.curve_count(), 4);
    let sum: f64 = spline.curves().iter().map(CubicBezierCurve::length).sum();
    assert!(Tolerance::DEFAULT.approx_eq_f64(spline.length(), sum));
    assert!(spline.length() > 40.0 - 1e-9);
}

#[test]
fn global_distance_walks_segments() {
    let spline = square_loop();
    let first = spline.curves()[0].length();
    let second = spline.curves()[1].length();

    let (index, local) = spline.curve_at_distance(first + 0.5 * second);
    assert_eq!(index, 1);
    assert!(Tolerance::DEFAULT.approx_eq_f64(local, 0.5 * second));

    let end = spline.sample_at_distance(spline.length() + 100.0);
    assert!(Tolerance::LOOSE.approx_eq_point3(end.location, Point3::ORIGIN));

    let corner = spline.sample_at_distance(first);
    assert!(Tolerance::LOOSE.approx_eq_point3(corner.location, Point3::new(10.0, 0.0, 0.0)));
}

#[test]
fn slice_sampling_matches_spline_sampling() {
    let spline = square_loop();
    for d in [0.0, 3.3, 17.0, 31.5] {
        assert_eq!(
            sample_curves_at_distance(spline.curves(), d),
            spline.sample_at_distance(d)
        );
    }
    let fallback = sample_curves_at_distance(&[], 5.0);
    assert_eq!(fallback.location, Point3::ORIGIN);
}

#[test]
fn opening_a_loop_drops_closing_segment() {
    let mut spline = square_loop();
    let closed = spline.length();
    spline.set_loop(false);
    assert_eq!(spline.curve_count(), 3);
    assert!(spline.length() < closed);
}

#[test]
fn listeners_see_every_edit_once() {
    let mut spline = square_loop();
    let count = Rc::new(Cell::new(0));
    let last_nodes = Rc::new(Cell::new(0));
    let (c, n) = (Rc::clone(&count), Rc::clone(&last_nodes));
    let id = spline.on_change(move |event| {
        c.set(c.get() + 1);
        n.set(event.node_count);
    });

    let added = spline.add_node_after(3).unwrap();
    assert_eq!(added, 4);
    spline.clone_node(0).unwrap();
    spline.apply_scale_roll_ramp(Vec2::ONE, Vec2::splat(0.2), 0.0, 90.0);
    assert_eq!(count.get(), 3);
    assert_eq!(last_nodes.get(), 6);

    assert!(spline.remove_listener(id));
    spline.set_loop(false);
    assert_eq!(count.get(), 3);
}

#[test]
fn tentacle_ramp_on_open_path() {
    let nodes = (0..5)
        .map(|i| {
            let x = f64::from(i) * 5.0;
            SplineNode::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 0.0, 0.0))
        })
        .collect();
    let mut spline = Spline::new(nodes).unwrap();
    spline.apply_scale_roll_ramp(Vec2::splat(2.0), Vec2::splat(0.0), 0.0, 360.0);

    let scales: Vec<f64> = spline.nodes().iter().map(|n| n.scale.x).collect();
    for (i, scale) in scales.iter().enumerate() {
        let expected = 2.0 - 0.5 * i as f64;
        assert!((scale - expected).abs() < 1e-6, "node {i}: {scale} vs {expected}");
    }
    assert!((spline.nodes()[4].roll - 360.0).abs() < 1e-9);

    let mid = spline.sample(2.0);
    assert!((mid.scale.x - 1.0).abs() < 1e-6);
    assert!((mid.roll - 180.0).abs() < 1e-4);
}

#[test]
fn up_vectors_interpolate_along_segment() {
    let a = SplineNode::new(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)).with_up(Vec3::Y);
    let b = SplineNode::new(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 0.0, 0.0))
        .with_up(Vec3::Z);
    let spline = Spline::new(vec![a, b]).unwrap();
    let mid = spline.sample(0.5);
    assert!(Tolerance::DEFAULT.approx_eq_vec3(mid.up, Vec3::new(0.0, 0.5, 0.5)));
    let q = mid.rotation();
    assert!((q.length() - 1.0).abs() < 1e-12);
}
