//! Evaluated points on a curve and the per-vertex bending transform.
//!
//! Bending works in a fixed axis convention: the source mesh's local `x` is
//! the bend axis and is absorbed into the sample's placement along the curve,
//! while the cross-section lives in `(y, z)`.

use super::{Point3, Quat, Tolerance, Vec2, Vec3};

/// A vertex position/normal pair in source mesh space or bent space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

impl MeshVertex {
    #[must_use]
    pub const fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// Snapshot of a curve at one location.
///
/// Orientation is not stored; [`CurveSample::rotation`] derives it on demand
/// from `tangent`, `up` and `roll`. Code that needs the orientation for many
/// vertices should build a [`SampleFrame`] once and reuse it.
#[derive(Debug, Clone, Copy)]
pub struct CurveSample {
    pub location: Point3,
    /// Unit tangent.
    pub tangent: Vec3,
    pub up: Vec3,
    pub scale: Vec2,
    /// Roll in degrees.
    pub roll: f64,
    pub distance_in_curve: f64,
    pub time_in_curve: f64,
}

impl CurveSample {
    #[must_use]
    pub const fn new(
        location: Point3,
        tangent: Vec3,
        up: Vec3,
        scale: Vec2,
        roll: f64,
        distance_in_curve: f64,
        time_in_curve: f64,
    ) -> Self {
        Self {
            location,
            tangent,
            up,
            scale,
            roll,
            distance_in_curve,
            time_in_curve,
        }
    }

    /// Look rotation along `tangent`.
    ///
    /// The up vector is `up` rotated by `roll` degrees around the world forward
    /// axis (`+Z`), re-orthogonalized against the tangent with a double cross
    /// product. With a non-default `up`, a non-zero roll couples with it in ways
    /// that can look surprising; this matches how nodes have always been
    /// authored and is left as is.
    #[must_use]
    pub fn rotation(&self) -> Quat {
        let rolled_up = Quat::from_axis_angle_degrees(Vec3::Z, self.roll) * self.up;
        let side = rolled_up
            .cross(self.tangent)
            .normalized()
            .unwrap_or_else(|| self.tangent.any_perpendicular());
        let up = self.tangent.cross(side);
        Quat::look_rotation(self.tangent, up)
    }

    /// Resolves the orientation once for bending many vertices.
    #[must_use]
    pub fn frame(&self) -> SampleFrame {
        SampleFrame {
            location: self.location,
            scale: self.scale,
            roll: Quat::from_axis_angle_degrees(Vec3::X, self.roll),
            orientation: self.rotation() * bend_axis_correction(),
        }
    }

    /// Bends a single vertex onto this sample. See [`SampleFrame::bend`].
    #[must_use]
    pub fn get_bent(&self, vertex: MeshVertex) -> MeshVertex {
        self.frame().bend(vertex)
    }

    /// Component-wise interpolation of every field.
    ///
    /// The tangent is re-normalized; orientation is never interpolated and is
    /// always re-derived from the interpolated fields.
    #[must_use]
    pub fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        let tangent = a
            .tangent
            .lerp(b.tangent, t)
            .normalized()
            .unwrap_or(a.tangent);
        Self {
            location: a.location.lerp(b.location, t),
            tangent,
            up: a.up.lerp(b.up, t),
            scale: a.scale.lerp(b.scale, t),
            roll: lerp_f64(a.roll, b.roll, t),
            distance_in_curve: lerp_f64(a.distance_in_curve, b.distance_in_curve, t),
            time_in_curve: lerp_f64(a.time_in_curve, b.time_in_curve, t),
        }
    }
}

impl PartialEq for CurveSample {
    fn eq(&self, other: &Self) -> bool {
        let tol = Tolerance::DEFAULT;
        tol.approx_eq_point3(self.location, other.location)
            && tol.approx_eq_vec3(self.tangent, other.tangent)
            && tol.approx_eq_vec3(self.up, other.up)
            && tol.approx_eq_vec2(self.scale, other.scale)
            && tol.approx_eq_f64(self.roll, other.roll)
            && tol.approx_eq_f64(self.distance_in_curve, other.distance_in_curve)
            && tol.approx_eq_f64(self.time_in_curve, other.time_in_curve)
    }
}

/// Pre-resolved bending transform of one [`CurveSample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleFrame {
    pub location: Point3,
    pub scale: Vec2,
    /// Roll around the bend axis.
    pub roll: Quat,
    /// Sample rotation composed with the bend-axis correction.
    pub orientation: Quat,
}

impl SampleFrame {
    /// Bends a vertex.
    ///
    /// 1. The cross-section is scaled (`y` by `scale.y`, `z` by `scale.x`) and
    ///    the bend-axis component is dropped.
    /// 2. Position and normal are rolled around the bend axis.
    /// 3. Both are reoriented along the tangent and the position is moved to
    ///    `location`.
    ///
    /// Normals are rotated, never scaled.
    #[must_use]
    pub fn bend(&self, vertex: MeshVertex) -> MeshVertex {
        let cross_section = Vec3::new(
            0.0,
            vertex.position.y * self.scale.y,
            vertex.position.z * self.scale.x,
        );
        let rolled = self.roll * cross_section;
        let normal = self.roll * vertex.normal;

        let offset = self.orientation * rolled;
        MeshVertex {
            position: self.location.add_vec(offset).to_vec3(),
            normal: self.orientation * normal,
        }
    }
}

/// Turns the look rotation's forward (`+Z`) so that the mesh bend axis (`+X`)
/// follows the tangent.
fn bend_axis_correction() -> Quat {
    Quat::from_axis_angle_degrees(Vec3::Y, -90.0)
}

fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
