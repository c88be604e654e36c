use super::Point3;

/// Number of independent UV channels carried through bending.
pub const MAX_UV_CHANNELS: usize = 8;

/// Indexed triangle mesh used both as bend input and bend output.
///
/// UV channels are opaque to the geometry code; they are validated for length
/// and otherwise passed through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeomMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f64; 3]>>,
    pub uv_channels: [Option<Vec<[f64; 2]>>; MAX_UV_CHANNELS],
}

impl GeomMesh {
    /// Create a new mesh with positions and indices only.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            normals: None,
            uv_channels: Default::default(),
        }
    }

    #[must_use]
    pub fn with_normals(mut self, normals: Vec<[f64; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Attaches UVs to `channel`. Channels past [`MAX_UV_CHANNELS`] are dropped.
    #[must_use]
    pub fn with_uv_channel(mut self, channel: usize, uvs: Vec<[f64; 2]>) -> Self {
        match self.uv_channels.get_mut(channel) {
            Some(slot) => *slot = Some(uvs),
            None => log::warn!("ignoring uv channel {channel}, only {MAX_UV_CHANNELS} supported"),
        }
        self
    }

    #[must_use]
    pub fn uv_channel(&self, channel: usize) -> Option<&[[f64; 2]]> {
        self.uv_channels.get(channel)?.as_deref()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions.iter().flatten().any(|c| !c.is_finite())
    }

    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len();
        self.indices.iter().all(|&i| (i as usize) < n)
    }

    #[must_use]
    pub fn has_triangle_indices(&self) -> bool {
        self.indices.len() % 3 == 0
    }

    /// Returns true if normals and every present UV channel match `positions.len()`.
    #[must_use]
    pub fn has_valid_attribute_lengths(&self) -> bool {
        let n = self.positions.len();
        self.normals.as_ref().is_none_or(|normals| normals.len() == n)
            && self
                .uv_channels
                .iter()
                .flatten()
                .all(|uvs| uvs.len() == n)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.has_triangle_indices() {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if !self.has_valid_attribute_lengths() {
            return Err("mesh attribute buffers do not match vertex count".to_string());
        }
        Ok(())
    }

    /// Position buffer as `[x0, y0, z0, x1, ...]`, for packed wasm buffers.
    #[must_use]
    pub fn positions_flat(&self) -> &[f64] {
        self.positions.as_flattened()
    }

    #[must_use]
    pub fn normals_flat(&self) -> Option<&[f64]> {
        self.normals.as_deref().map(<[[f64; 3]]>::as_flattened)
    }

    #[must_use]
    pub fn uvs_flat(&self, channel: usize) -> Option<&[f64]> {
        self.uv_channel(channel).map(<[[f64; 2]]>::as_flattened)
    }

    /// Concatenates meshes, offsetting indices.
    ///
    /// Normals and each UV channel survive only when every input carries them.
    #[must_use]
    pub fn merge<'a>(meshes: impl IntoIterator<Item = &'a GeomMesh>) -> Self {
        let meshes: Vec<&GeomMesh> = meshes.into_iter().collect();
        let mut out = Self::default();
        if meshes.is_empty() {
            return out;
        }

        let keep_normals = meshes.iter().all(|m| m.normals.is_some());
        let keep_uvs: Vec<bool> = (0..MAX_UV_CHANNELS)
            .map(|c| meshes.iter().all(|m| m.uv_channels[c].is_some()))
            .collect();
        if keep_normals {
            out.normals = Some(Vec::new());
        }
        for (c, keep) in keep_uvs.iter().enumerate() {
            if *keep {
                out.uv_channels[c] = Some(Vec::new());
            }
        }

        for mesh in meshes {
            let base = out.positions.len() as u32;
            out.positions.extend_from_slice(&mesh.positions);
            out.indices.extend(mesh.indices.iter().map(|&i| i + base));
            if let (Some(dst), Some(src)) = (out.normals.as_mut(), mesh.normals.as_ref()) {
                dst.extend_from_slice(src);
            }
            for (dst, src) in out.uv_channels.iter_mut().zip(&mesh.uv_channels) {
                if let (Some(dst), Some(src)) = (dst.as_mut(), src.as_ref()) {
                    dst.extend_from_slice(src);
                }
            }
        }
        out
    }
}

/// Area-weighted vertex normals. Vertices touched by no (non-degenerate)
/// triangle get `+Z`.
#[must_use]
pub fn compute_smooth_normals(points: &[Point3], indices: &[u32]) -> Vec<[f64; 3]> {
    let mut normals = vec![[0.0, 0.0, 0.0]; points.len()];

    for tri in indices.chunks_exact(3) {
        let i0 = tri[0] as usize;
        let i1 = tri[1] as usize;
        let i2 = tri[2] as usize;

        let (Some(a), Some(b), Some(c)) = (points.get(i0), points.get(i1), points.get(i2)) else {
            continue;
        };

        let n = b.sub_point(*a).cross(c.sub_point(*a)).to_array();
        for i in [i0, i1, i2] {
            for k in 0..3 {
                normals[i][k] += n[k];
            }
        }
    }

    for n in &mut normals {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len.is_finite() && len > 0.0 {
            let inv = 1.0 / len;
            n.iter_mut().for_each(|c| *c *= inv);
        } else {
            *n = [0.0, 0.0, 1.0];
        }
    }

    normals
}
