use crate::geom::{
    CubicBezierCurve, Curve3, Point3, SplineNode, Tolerance, Vec3, curve_arc_length,
};

fn s_curve_nodes() -> (SplineNode, SplineNode) {
    (
        SplineNode::new(Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)),
        SplineNode::new(Point3::new(10.0, 10.0, 0.0), Point3::new(15.0, 10.0, 0.0)),
    )
}

#[test]
fn straight_segment_scenario() {
    let curve = CubicBezierCurve::new(
        SplineNode::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)),
        SplineNode::new(Point3::new(20.0, 0.0, 0.0), Point3::new(30.0, 0.0, 0.0)),
    );
    let tol = Tolerance::DEFAULT;
    assert!(tol.approx_eq_f64(curve.length(), 20.0));

    let mid = curve.sample_at_time(0.5);
    assert!(tol.approx_eq_point3(mid.location, Point3::new(10.0, 0.0, 0.0)));
    assert!(tol.approx_eq_vec3(mid.tangent, Vec3::X));
    assert!(tol.approx_eq_f64(mid.distance_in_curve, 10.0));
}

#[test]
fn length_converges_with_resolution() {
    let (a, b) = s_curve_nodes();
    let reference = curve_arc_length(CubicBezierCurve::new(a, b).bezier(), 24_000);

    let mut previous = 0.0;
    for resolution in [15, 30, 60, 120, 240] {
        let length = CubicBezierCurve::with_resolution(a, b, resolution).length();
        assert!(
            length >= previous - 1e-12,
            "length dropped at resolution {resolution}: {length} < {previous}"
        );
        assert!(length <= reference + 1e-9);
        previous = length;
    }
    assert!((reference - previous).abs() < 1e-3);
}

#[test]
fn distance_endpoints_match_time_endpoints() {
    let (a, b) = s_curve_nodes();
    let curve = CubicBezierCurve::new(a, b);
    let tol = Tolerance::LOOSE;

    let start = curve.sample_at_distance(0.0);
    assert!(tol.approx_eq_point3(start.location, curve.sample_at_time(0.0).location));
    assert!(tol.approx_eq_vec3(start.tangent, curve.sample_at_time(0.0).tangent));

    let end = curve.sample_at_distance(curve.length());
    assert!(tol.approx_eq_point3(end.location, b.position));
    assert!(tol.approx_eq_f64(end.time_in_curve, 1.0));
}

#[test]
fn distance_sampling_is_exact_at_cache_nodes() {
    let (a, b) = s_curve_nodes();
    let curve = CubicBezierCurve::new(a, b);
    for cached in curve.samples() {
        let sampled = curve.sample_at_distance(cached.distance_in_curve);
        assert!(Tolerance::DEFAULT.approx_eq_point3(sampled.location, cached.location));
        assert!(Tolerance::DEFAULT.approx_eq_f64(sampled.time_in_curve, cached.time_in_curve));
    }
}

#[test]
fn distance_sampling_is_monotonic() {
    let (a, b) = s_curve_nodes();
    let curve = CubicBezierCurve::new(a, b);
    let steps = 97;
    let mut last_time = -1.0;
    for i in 0..=steps {
        let d = curve.length() * f64::from(i) / f64::from(steps);
        let sample = curve.sample_at_distance(d);
        assert!(sample.time_in_curve >= last_time);
        assert!((sample.distance_in_curve - d).abs() < 1e-9);
        assert!((sample.tangent.length() - 1.0).abs() < 1e-9);
        last_time = sample.time_in_curve;
    }
}

#[test]
fn cached_time_samples_match_direct_evaluation() {
    let (a, b) = s_curve_nodes();
    let curve = CubicBezierCurve::new(a, b);
    for cached in curve.samples() {
        let direct = curve.sample_at_time(cached.time_in_curve);
        assert_eq!(&direct, cached);
    }
}

#[test]
fn analytic_derivative_matches_numeric() {
    struct Numeric<'a>(&'a CubicBezierCurve);
    impl Curve3 for Numeric<'_> {
        fn point_at(&self, t: f64) -> Point3 {
            self.0.point_at(t)
        }
    }

    let (a, b) = s_curve_nodes();
    let curve = CubicBezierCurve::new(a, b);
    for t in [0.1, 0.35, 0.5, 0.8] {
        let analytic = curve.derivative_at(t);
        let numeric = Numeric(&curve).derivative_at(t);
        assert!((analytic - numeric).length() < 1e-4, "t={t}");
    }
}
