//! Pre-transformed, immutable copies of a mesh ready for bending.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::core::{Point3, Quat, Vec3};
use super::mesh::{GeomMesh, MAX_UV_CHANNELS, compute_smooth_normals};
use super::sample::MeshVertex;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum SourceMeshError {
    #[error("invalid source mesh: {0}")]
    InvalidMesh(String),
    #[error("source transform contains non-finite values")]
    InvalidTransform,
}

/// Placement of the source mesh before bending: rotate, then scale, then
/// translate.
///
/// `rate_quantum`, when set, snaps distance rates to multiples of the quantum
/// before grouping. Without it vertices group by exact rate equality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub rate_quantum: Option<f64>,
}

impl SourceTransform {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            rate_quantum: None,
        }
    }

    #[must_use]
    pub const fn translate(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    #[must_use]
    pub const fn rotate(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub const fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Quantum for rate grouping; non-positive values disable quantization.
    #[must_use]
    pub const fn rate_quantum(mut self, quantum: f64) -> Self {
        self.rate_quantum = Some(quantum);
        self
    }

    /// True when an odd number of scale axes is negative, i.e. the transform
    /// mirrors the mesh and triangle winding must flip.
    #[must_use]
    pub fn is_reversing(&self) -> bool {
        [self.scale.x, self.scale.y, self.scale.z]
            .iter()
            .filter(|s| **s < 0.0)
            .count()
            % 2
            == 1
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.translation.is_finite()
            && self.rotation.is_finite()
            && self.scale.is_finite()
            && self.rate_quantum.is_none_or(f64::is_finite)
    }

    fn apply(&self, vertex: MeshVertex) -> MeshVertex {
        let position = (self.rotation * vertex.position).scale_by(self.scale) + self.translation;
        let normal = (self.rotation * vertex.normal).scale_by(self.scale);
        MeshVertex::new(position, normal)
    }
}

impl Default for SourceTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// Transformed source mesh plus its distance-rate grouping.
///
/// The bend axis is local `x`. Every vertex gets a rate `|x - min_x| / length`
/// in `[0, 1]`; vertices with the same rate share a group and are bent with one
/// shared curve sample. Groups are numbered in the order their rate first
/// appears.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMesh {
    id: u64,
    transform: SourceTransform,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    uv_channels: [Option<Vec<[f64; 2]>>; MAX_UV_CHANNELS],
    min_x: f64,
    max_x: f64,
    length: f64,
    sample_groups: Vec<f64>,
    vertex_groups: Vec<usize>,
    generated_normals: bool,
}

impl SourceMesh {
    /// Validates `mesh` and builds the snapshot. The input is not modified.
    ///
    /// Normals are rotated and scaled with the positions but not renormalized;
    /// missing normals are generated as smooth vertex normals first.
    pub fn build(mesh: &GeomMesh, transform: SourceTransform) -> Result<Self, SourceMeshError> {
        mesh.validate().map_err(SourceMeshError::InvalidMesh)?;
        if !transform.is_finite() {
            return Err(SourceMeshError::InvalidTransform);
        }

        let generated_normals = mesh.normals.is_none();
        let normals = match &mesh.normals {
            Some(normals) => normals.clone(),
            None => {
                let points: Vec<Point3> = mesh.positions.iter().copied().map(Point3::from).collect();
                compute_smooth_normals(&points, &mesh.indices)
            }
        };

        let vertices: Vec<MeshVertex> = mesh
            .positions
            .iter()
            .zip(&normals)
            .map(|(p, n)| transform.apply(MeshVertex::new(Vec3::from(*p), Vec3::from(*n))))
            .collect();

        let indices = if transform.is_reversing() {
            reversed_triangles(&mesh.indices)
        } else {
            mesh.indices.clone()
        };

        let (min_x, max_x) = vertices
            .iter()
            .map(|v| v.position.x)
            .fold(None, |acc: Option<(f64, f64)>, x| match acc {
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
                None => Some((x, x)),
            })
            .unwrap_or((0.0, 0.0));
        let length = (max_x - min_x).abs();

        let quantum = transform.rate_quantum.filter(|q| *q > 0.0);
        let (sample_groups, vertex_groups) = group_by_rate(&vertices, min_x, length, quantum);

        log::debug!(
            "source mesh: {} vertices, {} triangles, {} distance-rate groups, length {length}",
            vertices.len(),
            indices.len() / 3,
            sample_groups.len()
        );

        Ok(Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            transform,
            vertices,
            indices,
            uv_channels: mesh.uv_channels.clone(),
            min_x,
            max_x,
            length,
            sample_groups,
            vertex_groups,
            generated_normals,
        })
    }

    /// Process-unique identity, used to key memoized bends.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn transform(&self) -> &SourceTransform {
        &self.transform
    }

    #[must_use]
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Triangle list, already reversed for mirroring transforms.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn uv_channels(&self) -> &[Option<Vec<[f64; 2]>>; MAX_UV_CHANNELS] {
        &self.uv_channels
    }

    #[must_use]
    pub const fn min_x(&self) -> f64 {
        self.min_x
    }

    #[must_use]
    pub const fn max_x(&self) -> f64 {
        self.max_x
    }

    /// Extent along the bend axis, `max_x - min_x`.
    #[must_use]
    pub const fn length(&self) -> f64 {
        self.length
    }

    /// Distinct distance rates, indexed by group id.
    #[must_use]
    pub fn sample_groups(&self) -> &[f64] {
        &self.sample_groups
    }

    /// Group id of each vertex.
    #[must_use]
    pub fn vertex_groups(&self) -> &[usize] {
        &self.vertex_groups
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.sample_groups.len()
    }

    #[must_use]
    pub fn distance_rate(&self, vertex: usize) -> Option<f64> {
        let group = *self.vertex_groups.get(vertex)?;
        self.sample_groups.get(group).copied()
    }

    #[must_use]
    pub const fn has_generated_normals(&self) -> bool {
        self.generated_normals
    }

    /// The transformed mesh, unbent.
    #[must_use]
    pub fn to_mesh(&self) -> GeomMesh {
        GeomMesh {
            positions: self.vertices.iter().map(|v| v.position.to_array()).collect(),
            indices: self.indices.clone(),
            normals: Some(self.vertices.iter().map(|v| v.normal.to_array()).collect()),
            uv_channels: self.uv_channels.clone(),
        }
    }
}

fn group_by_rate(
    vertices: &[MeshVertex],
    min_x: f64,
    length: f64,
    quantum: Option<f64>,
) -> (Vec<f64>, Vec<usize>) {
    let mut sample_groups = Vec::new();
    let mut lookup: HashMap<u64, usize> = HashMap::new();
    let mut vertex_groups = Vec::with_capacity(vertices.len());

    for vertex in vertices {
        let mut rate = if length == 0.0 {
            0.0
        } else {
            (vertex.position.x - min_x).abs() / length
        };
        if let Some(q) = quantum {
            rate = ((rate / q).round() * q).clamp(0.0, 1.0);
        }
        // +0.0 and -0.0 share a group
        let key = (rate + 0.0).to_bits();
        let group = *lookup.entry(key).or_insert_with(|| {
            sample_groups.push(rate);
            sample_groups.len() - 1
        });
        vertex_groups.push(group);
    }
    (sample_groups, vertex_groups)
}

fn reversed_triangles(indices: &[u32]) -> Vec<u32> {
    indices
        .chunks_exact(3)
        .flat_map(|tri| [tri[2], tri[1], tri[0]])
        .collect()
}
