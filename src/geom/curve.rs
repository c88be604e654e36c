use super::core::{Point3, Tolerance, Vec3, clamp_total};
use super::node::SplineNode;
use super::sample::CurveSample;

/// Number of time steps cached per [`CubicBezierCurve`] unless overridden.
pub const DEFAULT_CURVE_RESOLUTION: usize = 30;

pub trait Curve3 {
    fn point_at(&self, t: f64) -> Point3;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    /// Central difference; implementors with an analytic form override this.
    #[must_use]
    fn derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let span = b - a;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }

        let h = Tolerance::LOOSE.eps * span.abs();
        let t0 = (t - h).max(a);
        let t1 = (t + h).min(b);
        if t1 == t0 {
            return Vec3::ZERO;
        }

        let p0 = self.point_at(t0);
        let p1 = self.point_at(t1);
        p1.sub_point(p0).mul_scalar(1.0 / (t1 - t0))
    }

    #[must_use]
    fn tangent_at(&self, t: f64) -> Option<Vec3> {
        self.derivative_at(t).normalized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier3 {
    pub p0: Point3,
    pub p1: Point3,
    pub p2: Point3,
    pub p3: Point3,
}

impl CubicBezier3 {
    #[must_use]
    pub const fn new(p0: Point3, p1: Point3, p2: Point3, p3: Point3) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Control polygon of the segment running from `a` to `b`.
    ///
    /// `a`'s handle is the first inner control point; `b`'s handle is mirrored
    /// through `b` so that the curve arrives travelling along `b.direction`.
    #[must_use]
    pub const fn from_nodes(a: &SplineNode, b: &SplineNode) -> Self {
        Self::new(a.position, a.direction, b.mirrored_direction(), b.position)
    }

    #[must_use]
    pub const fn chord(&self) -> Vec3 {
        self.p3.sub_point(self.p0)
    }

    /// Direction the curve leaves (or enters) an end whose handle collapsed
    /// onto the end point. Second control leg from the nearest end.
    fn limit_direction(&self, t: f64) -> Vec3 {
        if t < 0.5 {
            self.p2.sub_point(self.p0)
        } else {
            self.p3.sub_point(self.p1)
        }
    }
}

impl Curve3 for CubicBezier3 {
    fn point_at(&self, t: f64) -> Point3 {
        let t = clamp_total(t, 0.0, 1.0);
        let u = 1.0 - t;
        let u2 = u * u;
        let t2 = t * t;
        point_weighted_sum4(
            self.p0,
            u2 * u,
            self.p1,
            3.0 * u2 * t,
            self.p2,
            3.0 * u * t2,
            self.p3,
            t2 * t,
        )
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let t = clamp_total(t, 0.0, 1.0);
        let u = 1.0 - t;
        let a = self.p1.sub_point(self.p0);
        let b = self.p2.sub_point(self.p1);
        let c = self.p3.sub_point(self.p2);
        a.mul_scalar(3.0 * u * u)
            .add(b.mul_scalar(6.0 * u * t))
            .add(c.mul_scalar(3.0 * t * t))
    }

    /// Unit tangent with fallbacks for collapsed handles: the limit direction
    /// at the end, then the chord. `None` only when all four control points
    /// coincide.
    fn tangent_at(&self, t: f64) -> Option<Vec3> {
        self.derivative_at(t)
            .normalized()
            .or_else(|| self.limit_direction(t).normalized())
            .or_else(|| self.chord().normalized())
    }
}

/// Computes the approximate arc length of a curve by summing `samples` chords.
#[must_use]
pub fn curve_arc_length<C: Curve3>(curve: &C, samples: usize) -> f64 {
    let samples = samples.max(1);
    let (t0, t1) = curve.domain();
    let span = t1 - t0;
    if !span.is_finite() || span == 0.0 {
        return 0.0;
    }

    let mut length = 0.0;
    let mut prev = curve.point_at(t0);
    for i in 1..=samples {
        let t = t0 + span * (i as f64 / samples as f64);
        let curr = curve.point_at(t);
        length += curr.sub_point(prev).length();
        prev = curr;
    }
    length
}

// ─────────────────────────────────────────────────────────────────────────────
// CubicBezierCurve
// ─────────────────────────────────────────────────────────────────────────────

/// One segment of a [`Spline`](super::Spline): a cubic Bezier between two
/// nodes plus a cache of time-spaced samples carrying cumulative arc length.
///
/// The cache holds `resolution + 1` samples at `t = i / resolution`. Distances
/// are chord sums, so [`length`](Self::length) slightly underestimates the true
/// arc length and converges to it as the resolution grows.
///
/// Coincident node positions are accepted: the segment then has zero length and
/// every distance query returns the first sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicBezierCurve {
    node1: SplineNode,
    node2: SplineNode,
    bezier: CubicBezier3,
    resolution: usize,
    samples: Vec<CurveSample>,
    length: f64,
}

impl CubicBezierCurve {
    #[must_use]
    pub fn new(node1: SplineNode, node2: SplineNode) -> Self {
        Self::with_resolution(node1, node2, DEFAULT_CURVE_RESOLUTION)
    }

    /// Builds the segment with `resolution` cached steps (at least 1).
    #[must_use]
    pub fn with_resolution(node1: SplineNode, node2: SplineNode, resolution: usize) -> Self {
        let resolution = resolution.max(1);
        let bezier = CubicBezier3::from_nodes(&node1, &node2);
        let mut curve = Self {
            node1,
            node2,
            bezier,
            resolution,
            samples: Vec::with_capacity(resolution + 1),
            length: 0.0,
        };

        let mut distance = 0.0;
        let mut prev = bezier.p0;
        for i in 0..=resolution {
            let t = i as f64 / resolution as f64;
            let location = bezier.point_at(t);
            distance += location.sub_point(prev).length();
            prev = location;
            let sample = curve.sample_with(t, location, distance);
            curve.samples.push(sample);
        }
        curve.length = distance;

        if curve.is_degenerate() {
            log::trace!("curve segment at {:?} has zero length", node1.position);
        }
        curve
    }

    #[must_use]
    pub const fn node1(&self) -> &SplineNode {
        &self.node1
    }

    #[must_use]
    pub const fn node2(&self) -> &SplineNode {
        &self.node2
    }

    #[must_use]
    pub const fn bezier(&self) -> &CubicBezier3 {
        &self.bezier
    }

    #[must_use]
    pub const fn resolution(&self) -> usize {
        self.resolution
    }

    /// Cached samples, monotonic in both time and distance.
    #[must_use]
    pub fn samples(&self) -> &[CurveSample] {
        &self.samples
    }

    /// Arc length, equal to the last cached sample's distance.
    #[must_use]
    pub const fn length(&self) -> f64 {
        self.length
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        Tolerance::ZERO_LENGTH.is_zero_length(self.length)
    }

    /// True when some tangent had to fall back from the derivative, i.e. a
    /// node handle sits on its node.
    #[must_use]
    pub fn has_collapsed_handle(&self) -> bool {
        let b = &self.bezier;
        b.p1.sub_point(b.p0).normalized().is_none() || b.p3.sub_point(b.p2).normalized().is_none()
    }

    /// Unit tangent at `t`; `+X` when the segment collapsed to a point.
    #[must_use]
    pub fn tangent_at(&self, t: f64) -> Vec3 {
        self.bezier.tangent_at(t).unwrap_or(Vec3::X)
    }

    /// Arc length from the start to time `t`, interpolated from the cache.
    #[must_use]
    pub fn distance_at_time(&self, t: f64) -> f64 {
        let t = clamp_total(t, 0.0, 1.0);
        let scaled = t * self.resolution as f64;
        let i = (scaled.floor() as usize).min(self.resolution - 1);
        let frac = scaled - i as f64;
        let d0 = self.samples[i].distance_in_curve;
        let d1 = self.samples[i + 1].distance_in_curve;
        d0 + (d1 - d0) * frac
    }

    /// Exact evaluation at curve time `t` (clamped to `[0, 1]`).
    ///
    /// Position and tangent come from the Bernstein form; up, scale and roll
    /// are interpolated between the two nodes by `t`.
    #[must_use]
    pub fn sample_at_time(&self, t: f64) -> CurveSample {
        let t = clamp_total(t, 0.0, 1.0);
        self.sample_with(t, self.bezier.point_at(t), self.distance_at_time(t))
    }

    /// Sample at arc-length distance `d` from the start (clamped to
    /// `[0, length]`).
    ///
    /// Finds the first cached sample at or past `d` and interpolates from its
    /// predecessor by distance, which approximates constant-speed travel. Exact
    /// at cached samples.
    #[must_use]
    pub fn sample_at_distance(&self, d: f64) -> CurveSample {
        let d = clamp_total(d, 0.0, self.length);
        let idx = self.samples.partition_point(|s| s.distance_in_curve < d);
        if idx == 0 {
            return self.samples[0];
        }
        let Some(next) = self.samples.get(idx) else {
            return self.samples[self.samples.len() - 1];
        };
        let prev = &self.samples[idx - 1];
        let span = next.distance_in_curve - prev.distance_in_curve;
        let t = if span > 0.0 {
            (d - prev.distance_in_curve) / span
        } else {
            0.0
        };
        CurveSample::lerp(prev, next, t)
    }

    fn sample_with(&self, t: f64, location: Point3, distance: f64) -> CurveSample {
        let (a, b) = (&self.node1, &self.node2);
        CurveSample::new(
            location,
            self.tangent_at(t),
            a.up.lerp(b.up, t),
            a.scale.lerp(b.scale, t),
            a.roll + (b.roll - a.roll) * t,
            distance,
            t,
        )
    }
}

impl Curve3 for CubicBezierCurve {
    fn point_at(&self, t: f64) -> Point3 {
        self.bezier.point_at(t)
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        self.bezier.derivative_at(t)
    }
}

#[allow(clippy::too_many_arguments)]
fn point_weighted_sum4(
    p0: Point3,
    w0: f64,
    p1: Point3,
    w1: f64,
    p2: Point3,
    w2: f64,
    p3: Point3,
    w3: f64,
) -> Point3 {
    Point3::new(
        p0.x * w0 + p1.x * w1 + p2.x * w2 + p3.x * w3,
        p0.y * w0 + p1.y * w1 + p2.y * w2 + p3.y * w3,
        p0.z * w0 + p1.z * w1 + p2.z * w2 + p3.z * w3,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec2;

    fn straight() -> CubicBezierCurve {
        CubicBezierCurve::new(
            SplineNode::new(Point3::ORIGIN, Point3::new(10.0, 0.0, 0.0)),
            SplineNode::new(Point3::new(20.0, 0.0, 0.0), Point3::new(30.0, 0.0, 0.0)),
        )
    }

    #[test]
    fn test_cache_shape() {
        let curve = straight();
        assert_eq!(curve.resolution(), DEFAULT_CURVE_RESOLUTION);
        assert_eq!(curve.samples().len(), DEFAULT_CURVE_RESOLUTION + 1);
        assert_eq!(curve.samples()[0].distance_in_curve, 0.0);
        assert_eq!(
            curve.samples().last().map(|s| s.distance_in_curve),
            Some(curve.length())
        );
        for pair in curve.samples().windows(2) {
            assert!(pair[1].time_in_curve > pair[0].time_in_curve);
            assert!(pair[1].distance_in_curve > pair[0].distance_in_curve);
        }
    }

    #[test]
    fn test_endpoints_exact() {
        let a = SplineNode::new(Point3::new(1.5, -2.0, 0.25), Point3::new(3.0, 4.0, 1.0));
        let b = SplineNode::new(Point3::new(-7.0, 2.0, 9.0), Point3::new(-6.0, 0.0, 8.0));
        let curve = CubicBezierCurve::new(a, b);
        assert_eq!(curve.sample_at_time(0.0).location, a.position);
        assert_eq!(curve.sample_at_time(1.0).location, b.position);
    }

    #[test]
    fn test_time_and_distance_are_clamped() {
        let curve = straight();
        assert_eq!(curve.sample_at_time(-3.0), curve.sample_at_time(0.0));
        assert_eq!(curve.sample_at_time(7.0), curve.sample_at_time(1.0));
        assert_eq!(curve.sample_at_time(f64::NAN), curve.sample_at_time(0.0));
        assert_eq!(curve.sample_at_distance(-1.0), curve.sample_at_distance(0.0));
        assert_eq!(
            curve.sample_at_distance(1e9),
            curve.sample_at_distance(curve.length())
        );
    }

    #[test]
    fn test_properties_interpolated_between_nodes() {
        let a = SplineNode::new(Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0))
            .with_scale(Vec2::new(1.0, 1.0))
            .with_roll(0.0);
        let b = SplineNode::new(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 0.0, 0.0))
            .with_scale(Vec2::new(3.0, 5.0))
            .with_roll(90.0);
        let mid = CubicBezierCurve::new(a, b).sample_at_time(0.5);
        assert!((mid.roll - 45.0).abs() < 1e-12);
        assert!(Tolerance::DEFAULT.approx_eq_vec2(mid.scale, Vec2::new(2.0, 3.0)));
    }

    #[test]
    fn test_collapsed_handle_uses_limit_direction() {
        let a = SplineNode::new(Point3::ORIGIN, Point3::ORIGIN);
        let b = SplineNode::new(Point3::new(0.0, 5.0, 0.0), Point3::new(0.0, 6.0, 0.0));
        let curve = CubicBezierCurve::new(a, b);
        assert!(curve.has_collapsed_handle());
        let tangent = curve.sample_at_time(0.0).tangent;
        assert!(Tolerance::DEFAULT.approx_eq_vec3(tangent, Vec3::Y));
    }

    #[test]
    fn test_zero_length_segment_collapses() {
        let node = SplineNode::new(Point3::new(2.0, 2.0, 2.0), Point3::new(2.0, 2.0, 2.0));
        let curve = CubicBezierCurve::new(node, node);
        assert!(curve.is_degenerate());
        assert_eq!(curve.length(), 0.0);
        let s = curve.sample_at_distance(5.0);
        assert_eq!(s.location, node.position);
        assert_eq!(s.tangent, Vec3::X);
        assert!((s.tangent.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_resolution_floor_is_one() {
        let curve = CubicBezierCurve::with_resolution(
            SplineNode::default(),
            SplineNode::new(Point3::new(4.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)),
            0,
        );
        assert_eq!(curve.resolution(), 1);
        assert_eq!(curve.samples().len(), 2);
        assert!((curve.length() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_at_time_matches_cache_nodes() {
        let curve = straight();
        for (i, s) in curve.samples().iter().enumerate() {
            let t = i as f64 / curve.resolution() as f64;
            assert!((curve.distance_at_time(t) - s.distance_in_curve).abs() < 1e-9);
        }
    }
}
