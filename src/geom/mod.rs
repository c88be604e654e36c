mod bender;
mod cache;
mod core;
mod curve;
mod diagnostics;
mod mesh;
mod metrics;
mod node;
mod sample;
mod source_mesh;
mod spline;

pub use bender::{
    BendTarget, FillingMode, MAX_REPEAT_VERTICES, MeshBender, bend_mesh, bend_spline_segments,
};
pub use cache::{
    BendCache, BendCacheStats, BendKey, BendOutput, DEFAULT_BEND_CACHE_CAPACITY, TargetKey,
};
pub use self::core::{BBox, Point3, Quat, Tolerance, Vec2, Vec3, clamp_total};
pub use curve::{CubicBezier3, CubicBezierCurve, Curve3, DEFAULT_CURVE_RESOLUTION, curve_arc_length};
pub use diagnostics::BendDiagnostics;
pub use mesh::{GeomMesh, MAX_UV_CHANNELS, compute_smooth_normals};
pub use metrics::{BendMetrics, BendTimingReport, TimingBucket};
pub use node::SplineNode;
pub use sample::{CurveSample, MeshVertex, SampleFrame};
pub use source_mesh::{SourceMesh, SourceMeshError, SourceTransform};
pub use spline::{
    ListenerId, MIN_NODE_COUNT, Spline, SplineChange, SplineDocument, SplineError, SplineEvent,
    locate_distance, sample_curves_at_distance,
};

#[cfg(test)]
mod tests;
