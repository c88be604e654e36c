//! Bending a [`SourceMesh`] along a curve segment or a portion of a spline.
//!
//! The curve is sampled once per distance-rate group (per copy in
//! [`FillingMode::Repeat`]), never per vertex. Each sample is resolved into a
//! [`SampleFrame`] that every vertex of the group then reuses.

use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::cache::{BendCache, BendCacheStats, BendKey, BendOutput, TargetKey};
use super::core::{Tolerance, clamp_total};
use super::curve::CubicBezierCurve;
use super::diagnostics::BendDiagnostics;
use super::mesh::GeomMesh;
use super::metrics::{BendMetrics, TimingBucket};
use super::node::SplineNode;
use super::sample::SampleFrame;
use super::source_mesh::SourceMesh;
use super::spline::{Spline, sample_curves_at_distance};

/// How the source mesh is laid along the bend interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillingMode {
    /// Stretch or squash the source so it spans the interval exactly.
    #[default]
    StretchToInterval,
    /// Keep the source's own length, starting at the interval start. Vertices
    /// past the interval end are pinned to it.
    Once,
    /// Lay as many whole copies of the source as fit into the interval.
    Repeat,
}

impl FillingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StretchToInterval => "stretch",
            Self::Once => "once",
            Self::Repeat => "repeat",
        }
    }

    /// Parses the names produced by [`as_str`](Self::as_str).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "stretch" | "stretch_to_interval" => Some(Self::StretchToInterval),
            "once" => Some(Self::Once),
            "repeat" => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// What to bend along.
#[derive(Debug, Clone, Copy)]
pub enum BendTarget<'a> {
    /// A whole segment, from distance 0 to its length.
    Curve(&'a CubicBezierCurve),
    /// `[start, end]` of a spline's path distance; `None` means the path's
    /// start or end. Both are clamped to `[0, length]`.
    Spline {
        spline: &'a Spline,
        start: Option<f64>,
        end: Option<f64>,
    },
}

impl<'a> BendTarget<'a> {
    /// Whole spline.
    #[must_use]
    pub const fn spline(spline: &'a Spline) -> Self {
        Self::Spline {
            spline,
            start: None,
            end: None,
        }
    }

    #[must_use]
    pub const fn spline_range(spline: &'a Spline, start: f64, end: f64) -> Self {
        Self::Spline {
            spline,
            start: Some(start),
            end: Some(end),
        }
    }

    fn curves(&self) -> &'a [CubicBezierCurve] {
        match *self {
            Self::Curve(curve) => std::slice::from_ref(curve),
            Self::Spline { spline, .. } => spline.curves(),
        }
    }

    fn interval(&self) -> (f64, f64) {
        match *self {
            Self::Curve(curve) => (0.0, curve.length()),
            Self::Spline { spline, start, end } => {
                let length = spline.length();
                (
                    clamp_total(start.unwrap_or(0.0), 0.0, length),
                    clamp_total(end.unwrap_or(length), 0.0, length),
                )
            }
        }
    }

    fn key(&self) -> TargetKey {
        match *self {
            Self::Curve(curve) => TargetKey::Curve {
                nodes: node_bits(curve.node1(), curve.node2()),
                resolution: curve.resolution(),
            },
            Self::Spline { spline, .. } => {
                let (start, end) = self.interval();
                TargetKey::Spline {
                    id: spline.id(),
                    version: spline.version(),
                    start_bits: start.to_bits(),
                    end_bits: end.to_bits(),
                }
            }
        }
    }
}

/// Placement of the source along the interval for one filling mode.
struct Layout {
    start: f64,
    end: f64,
    copies: usize,
    /// Distance covered by one unit of rate.
    stride: f64,
    pin_to_end: bool,
}

impl Layout {
    fn distance(&self, copy: usize, rate: f64) -> f64 {
        let d = self.start + (copy as f64 + rate) * self.stride;
        if self.pin_to_end { d.min(self.end) } else { d }
    }
}

/// Upper bound on vertices produced by [`FillingMode::Repeat`]; output
/// indices stay well inside `u32`.
pub const MAX_REPEAT_VERTICES: usize = 1 << 24;

/// Largest copy count whose vertices, sample frames and indices stay within
/// [`MAX_REPEAT_VERTICES`].
fn max_repeat_copies(source: &SourceMesh) -> usize {
    let per_copy = source
        .vertex_count()
        .max(source.group_count())
        .max(source.indices().len())
        .max(1);
    (MAX_REPEAT_VERTICES / per_copy).max(1)
}

fn plan_layout(
    source: &SourceMesh,
    start: f64,
    end: f64,
    mode: FillingMode,
    diagnostics: &mut BendDiagnostics,
) -> Layout {
    let interval = end - start;
    match mode {
        FillingMode::StretchToInterval => Layout {
            start,
            end,
            copies: 1,
            stride: interval,
            pin_to_end: false,
        },
        FillingMode::Once => {
            if source.length() > interval {
                diagnostics.add_warning(format!(
                    "source length {} exceeds interval {interval}; pinned to interval end",
                    source.length()
                ));
            }
            Layout {
                start,
                end,
                copies: 1,
                stride: source.length(),
                pin_to_end: true,
            }
        }
        FillingMode::Repeat => {
            let fits = if Tolerance::ZERO_LENGTH.is_zero_length(source.length()) {
                0.0
            } else {
                (interval / source.length()).floor()
            };
            let copies = if fits >= 1.0 && fits.is_finite() {
                let limit = max_repeat_copies(source);
                if fits > limit as f64 {
                    diagnostics.add_warning(format!(
                        "repeat: {fits} copies of source length {} exceed the limit; laying {limit}",
                        source.length()
                    ));
                    limit
                } else {
                    fits as usize
                }
            } else {
                diagnostics.add_warning(format!(
                    "repeat: source length {} does not fit interval {interval}; laying one copy",
                    source.length()
                ));
                1
            };
            Layout {
                start,
                end,
                copies,
                stride: source.length(),
                pin_to_end: copies == 1,
            }
        }
    }
}

/// Bends `source` along `target`.
///
/// Topology is preserved per copy; UV channels are passed through (repeated
/// per copy). Degenerate inputs produce well-defined output plus warnings.
#[must_use]
pub fn bend_mesh(
    source: &SourceMesh,
    target: BendTarget<'_>,
    mode: FillingMode,
) -> (GeomMesh, BendDiagnostics) {
    let mut metrics = BendMetrics::default();
    metrics.begin();
    let (mesh, mut diagnostics) = bend_mesh_with_metrics(source, target, mode, &mut metrics);
    diagnostics.timing = metrics.end();
    (mesh, diagnostics)
}

fn bend_mesh_with_metrics(
    source: &SourceMesh,
    target: BendTarget<'_>,
    mode: FillingMode,
    metrics: &mut BendMetrics,
) -> (GeomMesh, BendDiagnostics) {
    let mut diagnostics = BendDiagnostics::new();
    let curves = target.curves();
    let (start, end) = target.interval();

    if curves.iter().all(CubicBezierCurve::is_degenerate) {
        diagnostics.add_warning("curve has zero length; output collapses to a point");
    } else if Tolerance::ZERO_LENGTH.is_zero_length(end - start) {
        diagnostics.add_warning("zero-length bend interval");
    }
    if curves.iter().any(CubicBezierCurve::has_collapsed_handle) {
        diagnostics.add_warning("node handle on its node; tangent falls back to the chord");
    }
    if source.vertex_count() > 0 && source.length() == 0.0 {
        diagnostics.add_warning("source mesh has zero extent along the bend axis");
    }

    let layout = plan_layout(source, start, end, mode, &mut diagnostics);
    let frames = metrics.time(TimingBucket::CurveSampling, || {
        resolve_frames(curves, source.sample_groups(), &layout)
    });
    let mesh = metrics.time(TimingBucket::Bending, || {
        assemble(source, &frames, layout.copies)
    });

    diagnostics.vertex_count = mesh.vertex_count();
    diagnostics.triangle_count = mesh.triangle_count();
    diagnostics.group_count = source.group_count();
    diagnostics.sample_evaluations = frames.len();
    diagnostics.copies = layout.copies;
    log::debug!("bend: {}", diagnostics.summary());
    (mesh, diagnostics)
}

/// One frame per `(copy, group)`, indexed `copy * groups + group`.
#[cfg(feature = "parallel")]
fn resolve_frames(curves: &[CubicBezierCurve], rates: &[f64], layout: &Layout) -> Vec<SampleFrame> {
    (0..layout.copies * rates.len())
        .into_par_iter()
        .map(|slot| resolve_frame(curves, rates, layout, slot))
        .collect()
}

/// One frame per `(copy, group)`, indexed `copy * groups + group`.
#[cfg(not(feature = "parallel"))]
fn resolve_frames(curves: &[CubicBezierCurve], rates: &[f64], layout: &Layout) -> Vec<SampleFrame> {
    (0..layout.copies * rates.len())
        .map(|slot| resolve_frame(curves, rates, layout, slot))
        .collect()
}

fn resolve_frame(
    curves: &[CubicBezierCurve],
    rates: &[f64],
    layout: &Layout,
    slot: usize,
) -> SampleFrame {
    let (copy, group) = (slot / rates.len(), slot % rates.len());
    let distance = layout.distance(copy, rates[group]);
    sample_curves_at_distance(curves, distance).frame()
}

fn assemble(source: &SourceMesh, frames: &[SampleFrame], copies: usize) -> GeomMesh {
    let vertex_count = source.vertex_count();
    let (positions, normals) = bend_vertices(source, frames, copies);

    let mut indices = Vec::with_capacity(source.indices().len() * copies);
    for copy in 0..copies {
        let base = (copy * vertex_count) as u32;
        indices.extend(source.indices().iter().map(|&i| i + base));
    }

    let mut mesh = GeomMesh::new(positions, indices).with_normals(normals);
    for (dst, src) in mesh.uv_channels.iter_mut().zip(source.uv_channels()) {
        *dst = src.as_ref().map(|uvs| uvs.repeat(copies));
    }
    mesh
}

type BentBuffers = (Vec<[f64; 3]>, Vec<[f64; 3]>);

#[cfg(feature = "parallel")]
fn bend_vertices(source: &SourceMesh, frames: &[SampleFrame], copies: usize) -> BentBuffers {
    (0..copies * source.vertex_count())
        .into_par_iter()
        .map(|slot| bend_vertex(source, frames, slot))
        .unzip()
}

#[cfg(not(feature = "parallel"))]
fn bend_vertices(source: &SourceMesh, frames: &[SampleFrame], copies: usize) -> BentBuffers {
    (0..copies * source.vertex_count())
        .map(|slot| bend_vertex(source, frames, slot))
        .unzip()
}

fn bend_vertex(source: &SourceMesh, frames: &[SampleFrame], slot: usize) -> ([f64; 3], [f64; 3]) {
    let vertex_count = source.vertex_count();
    let (copy, index) = (slot / vertex_count, slot % vertex_count);
    let group = source.vertex_groups()[index];
    let bent = frames[copy * source.group_count() + group].bend(source.vertices()[index]);
    (bent.position.to_array(), bent.normal.to_array())
}

/// Bends `source` once per segment of `spline`, each copy spanning its whole
/// segment.
#[must_use]
pub fn bend_spline_segments(
    source: &SourceMesh,
    spline: &Spline,
    mode: FillingMode,
) -> Vec<(GeomMesh, BendDiagnostics)> {
    spline
        .curves()
        .iter()
        .map(|curve| bend_mesh(source, BendTarget::Curve(curve), mode))
        .collect()
}

/// Memoizing front end for [`bend_mesh`].
///
/// A result is reused while the source snapshot, the target (spline id and
/// version, resolved interval, or curve node data) and the filling mode stay
/// the same.
#[derive(Debug, Default)]
pub struct MeshBender {
    mode: FillingMode,
    cache: BendCache,
    metrics: BendMetrics,
}

impl MeshBender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FillingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = BendCache::with_capacity(capacity);
        self
    }

    #[must_use]
    pub const fn mode(&self) -> FillingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FillingMode) {
        self.mode = mode;
    }

    /// Bends, or returns the memoized result. The returned diagnostics have
    /// `cache_hit` set accordingly.
    pub fn bend(&mut self, source: &SourceMesh, target: BendTarget<'_>) -> (Arc<GeomMesh>, BendDiagnostics) {
        let key = BendKey {
            source_id: source.id(),
            target: target.key(),
            mode: self.mode,
        };
        let mode = self.mode;
        self.metrics.begin();
        let (output, hit) = self.cache.get_or_insert_with(key, || {
            let (mesh, diagnostics) = bend_mesh_with_metrics(source, target, mode, &mut self.metrics);
            BendOutput {
                mesh: Arc::new(mesh),
                diagnostics,
            }
        });
        if hit {
            log::debug!("bend cache hit for source {}", source.id());
        }

        let mut diagnostics = output.diagnostics.clone();
        diagnostics.cache_hit = hit;
        diagnostics.timing = self.metrics.end();
        (Arc::clone(&output.mesh), diagnostics)
    }

    #[must_use]
    pub fn cache_stats(&self) -> BendCacheStats {
        self.cache.stats()
    }

    /// Forgets every memoized result.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}

fn node_bits(a: &SplineNode, b: &SplineNode) -> [u64; 24] {
    let mut bits = [0u64; 24];
    for (chunk, node) in bits.chunks_exact_mut(12).zip([a, b]) {
        let values = [
            node.position.x,
            node.position.y,
            node.position.z,
            node.direction.x,
            node.direction.y,
            node.direction.z,
            node.up.x,
            node.up.y,
            node.up.z,
            node.scale.x,
            node.scale.y,
            node.roll,
        ];
        for (slot, value) in chunk.iter_mut().zip(values) {
            *slot = value.to_bits();
        }
    }
    bits
}
