#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod parse;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use geom::{
    BendDiagnostics, BendMetrics, BendTarget, FillingMode, GeomMesh, ListenerId, MAX_UV_CHANNELS,
    MeshBender, Point3, Quat, SourceMesh, SourceTransform, Spline, SplineDocument, SplineNode,
    TimingBucket, Vec2, Vec3,
};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    // A second `initialize` keeps the logger that is already installed.
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Floats per node in the flat node buffers: position, direction, up, scale,
/// roll. Buffers of [`SHORT_NODE_STRIDE`] floats carry position and direction
/// only.
pub const NODE_STRIDE: usize = 12;
pub const SHORT_NODE_STRIDE: usize = 6;

/// Public entry point for consumers.
///
/// Holds one spline, one source mesh and the last bent mesh. The engine
/// subscribes to its spline's change notifications and only re-bends when
/// the spline, the source or the bend settings changed since the last bend.
#[wasm_bindgen]
pub struct Engine {
    spline: Option<Spline>,
    listener: Option<ListenerId>,
    spline_dirty: Rc<Cell<bool>>,
    raw_source: Option<GeomMesh>,
    transform: SourceTransform,
    source: Option<SourceMesh>,
    bender: MeshBender,
    metrics: BendMetrics,
    interval: (Option<f64>, Option<f64>),
    per_segment: bool,
    settings_dirty: bool,
    result: Option<Arc<GeomMesh>>,
    diagnostics: Option<BendDiagnostics>,
    snapshot_build_ms: Option<f64>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Engine {
        Engine {
            spline: None,
            listener: None,
            spline_dirty: Rc::new(Cell::new(false)),
            raw_source: None,
            transform: SourceTransform::new(),
            source: None,
            bender: MeshBender::new().with_cache_capacity(64),
            metrics: BendMetrics::default(),
            interval: (None, None),
            per_segment: false,
            settings_dirty: false,
            result: None,
            diagnostics: None,
            snapshot_build_ms: None,
        }
    }

    // ─── Spline ─────────────────────────────────────────────────────────────

    /// Replaces the spline with one read from a `<spline>` document.
    #[wasm_bindgen]
    pub fn load_spline_xml(&mut self, xml: &str) -> Result<(), JsValue> {
        let spline = parse::parse_str(xml).map_err(to_js_error)?;
        self.attach_spline(spline);
        Ok(())
    }

    /// Replaces the spline with one built from a flat node buffer holding
    /// `stride` floats per node, [`SHORT_NODE_STRIDE`] or [`NODE_STRIDE`].
    #[wasm_bindgen]
    pub fn create_spline(
        &mut self,
        nodes: Vec<f64>,
        stride: usize,
        is_loop: bool,
    ) -> Result<(), JsValue> {
        let nodes = nodes_from_flat(&nodes, stride).map_err(|err| js_error(&err))?;
        let spline = Spline::new(nodes).map_err(to_js_error)?.looped(is_loop);
        self.attach_spline(spline);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn spline_xml(&self) -> Result<String, JsValue> {
        parse::to_string(self.spline()?).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn append_node(&mut self, node: Vec<f64>) -> Result<(), JsValue> {
        let node = node_from_slice(&node).map_err(|err| js_error(&err))?;
        self.spline_mut()?.append(node);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn insert_node(&mut self, index: usize, node: Vec<f64>) -> Result<(), JsValue> {
        let node = node_from_slice(&node).map_err(|err| js_error(&err))?;
        self.spline_mut()?.insert(index, node).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn update_node(&mut self, index: usize, node: Vec<f64>) -> Result<(), JsValue> {
        let node = node_from_slice(&node).map_err(|err| js_error(&err))?;
        self.spline_mut()?
            .update(index, node)
            .map(|_| ())
            .map_err(to_js_error)
    }

    /// Fails, leaving the spline untouched, when only two nodes remain.
    #[wasm_bindgen]
    pub fn remove_node(&mut self, index: usize) -> Result<(), JsValue> {
        self.spline_mut()?
            .remove(index)
            .map(|_| ())
            .map_err(to_js_error)
    }

    /// Returns the index of the new node.
    #[wasm_bindgen]
    pub fn add_node_after(&mut self, index: usize) -> Result<usize, JsValue> {
        self.spline_mut()?.add_node_after(index).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn clone_node(&mut self, index: usize) -> Result<usize, JsValue> {
        self.spline_mut()?.clone_node(index).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn apply_scale_roll_ramp(
        &mut self,
        start_scale: f64,
        end_scale: f64,
        start_roll: f64,
        end_roll: f64,
    ) -> Result<(), JsValue> {
        self.spline_mut()?.apply_scale_roll_ramp(
            Vec2::splat(start_scale),
            Vec2::splat(end_scale),
            start_roll,
            end_roll,
        );
        Ok(())
    }

    #[wasm_bindgen]
    pub fn set_loop(&mut self, is_loop: bool) -> Result<(), JsValue> {
        self.spline_mut()?.set_loop(is_loop);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn is_loop(&self) -> Result<bool, JsValue> {
        Ok(self.spline()?.is_loop())
    }

    #[wasm_bindgen]
    pub fn node_count(&self) -> usize {
        self.spline.as_ref().map_or(0, Spline::node_count)
    }

    #[wasm_bindgen]
    pub fn spline_length(&self) -> f64 {
        self.spline.as_ref().map_or(0.0, Spline::length)
    }

    /// Flat node buffer, [`NODE_STRIDE`] floats per node.
    #[wasm_bindgen]
    pub fn node_data(&self) -> Result<Vec<f64>, JsValue> {
        Ok(self.spline()?.nodes().iter().flat_map(node_to_array).collect())
    }

    /// `[location xyz, tangent xyz, up xyz, scale xy, roll]` at a path
    /// distance, for drawing gizmos.
    #[wasm_bindgen]
    pub fn sample_at_distance(&self, distance: f64) -> Result<Vec<f64>, JsValue> {
        let sample = self.spline()?.sample_at_distance(distance);
        let mut out = Vec::with_capacity(12);
        out.extend(sample.location.to_array());
        out.extend(sample.tangent.to_array());
        out.extend(sample.up.to_array());
        out.extend([sample.scale.x, sample.scale.y, sample.roll]);
        Ok(out)
    }

    #[wasm_bindgen]
    pub fn get_nodes(&self) -> Result<JsValue, JsValue> {
        let document = SplineDocument::from(self.spline()?);
        serde_wasm_bindgen::to_value(&document).map_err(to_js_error)
    }

    // ─── Source mesh ────────────────────────────────────────────────────────

    /// Loads the mesh to bend. `positions` and `normals` hold three floats per
    /// vertex, `uvs` two; missing normals are generated.
    #[wasm_bindgen]
    pub fn set_source_mesh(
        &mut self,
        positions: Vec<f64>,
        indices: Vec<u32>,
        normals: Option<Vec<f64>>,
        uvs: Option<Vec<f64>>,
    ) -> Result<(), JsValue> {
        let mut mesh = GeomMesh::new(triples(&positions, "positions")?, indices);
        if let Some(normals) = normals {
            mesh = mesh.with_normals(triples(&normals, "normals")?);
        }
        if let Some(uvs) = uvs {
            mesh = mesh.with_uv_channel(0, pairs(&uvs)?);
        }
        self.rebuild_source(mesh, self.transform)
    }

    /// Adds a UV channel to the loaded source mesh.
    #[wasm_bindgen]
    pub fn set_source_uvs(&mut self, channel: usize, uvs: Vec<f64>) -> Result<(), JsValue> {
        if channel >= MAX_UV_CHANNELS {
            return Err(js_error("uv channel out of range"));
        }
        let uvs = pairs(&uvs)?;
        let Some(mesh) = self.raw_source.clone() else {
            return Err(js_error("no source mesh loaded"));
        };
        self.rebuild_source(mesh.with_uv_channel(channel, uvs), self.transform)
    }

    /// Sets translation, rotation (axis `xyz` plus angle in degrees) and scale
    /// of the source and rebuilds its snapshot.
    #[wasm_bindgen]
    pub fn set_source_transform(
        &mut self,
        translation: Vec<f64>,
        rotation: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<(), JsValue> {
        let [tx, ty, tz] = fixed::<3>(&translation, "translation")?;
        let [ax, ay, az, degrees] = fixed::<4>(&rotation, "rotation")?;
        let [sx, sy, sz] = fixed::<3>(&scale, "scale")?;
        let rotation = Vec3::new(ax, ay, az)
            .normalized()
            .map_or(Quat::IDENTITY, |axis| Quat::from_axis_angle_degrees(axis, degrees));
        let transform = SourceTransform {
            translation: Vec3::new(tx, ty, tz),
            rotation,
            scale: Vec3::new(sx, sy, sz),
            rate_quantum: self.transform.rate_quantum,
        };
        match self.raw_source.clone() {
            Some(mesh) => self.rebuild_source(mesh, transform),
            None => {
                self.transform = transform;
                Ok(())
            }
        }
    }

    // ─── Bending ────────────────────────────────────────────────────────────

    /// Accepts `stretch`, `once` or `repeat`.
    #[wasm_bindgen]
    pub fn set_filling_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode = FillingMode::from_name(mode)
            .ok_or_else(|| js_error(&format!("unknown filling mode: {mode}")))?;
        if mode != self.bender.mode() {
            self.bender.set_mode(mode);
            self.settings_dirty = true;
        }
        Ok(())
    }

    #[wasm_bindgen]
    pub fn filling_mode(&self) -> String {
        self.bender.mode().as_str().to_owned()
    }

    /// Restricts bending to `[start, end]` of the path distance; `None` means
    /// the path start or end.
    #[wasm_bindgen]
    pub fn set_interval(&mut self, start: Option<f64>, end: Option<f64>) {
        if self.interval != (start, end) {
            self.interval = (start, end);
            self.settings_dirty = true;
        }
    }

    /// Bends one copy of the source along each segment instead of along the
    /// whole path.
    #[wasm_bindgen]
    pub fn set_per_segment(&mut self, per_segment: bool) {
        if self.per_segment != per_segment {
            self.per_segment = per_segment;
            self.settings_dirty = true;
        }
    }

    /// True when the next [`bend`](Self::bend) will produce a new mesh.
    #[wasm_bindgen]
    pub fn needs_bend(&self) -> bool {
        self.result.is_none() || self.spline_dirty.get() || self.settings_dirty
    }

    /// Bends the source along the spline. Does nothing when nothing changed
    /// since the last bend.
    #[wasm_bindgen]
    pub fn bend(&mut self) -> Result<(), JsValue> {
        if !self.needs_bend() {
            return Ok(());
        }
        let spline = self
            .spline
            .as_ref()
            .ok_or_else(|| js_error("no spline loaded"))?;
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| js_error("no source mesh loaded"))?;

        let (mesh, diagnostics) = if self.per_segment {
            let mut parts = Vec::with_capacity(spline.curve_count());
            let mut diagnostics = BendDiagnostics::new();
            for curve in spline.curves() {
                let (mesh, part) = self.bender.bend(source, BendTarget::Curve(curve));
                diagnostics.merge(&part);
                parts.push(mesh);
            }
            let merged = GeomMesh::merge(parts.iter().map(|mesh| &**mesh));
            (Arc::new(merged), diagnostics)
        } else {
            let (start, end) = self.interval;
            self.bender
                .bend(source, BendTarget::Spline { spline, start, end })
        };

        debug_log!("bend: {}", diagnostics.summary());
        self.result = Some(mesh);
        self.diagnostics = Some(diagnostics);
        self.spline_dirty.set(false);
        self.settings_dirty = false;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn positions(&self) -> Result<Vec<f64>, JsValue> {
        Ok(self.result()?.positions_flat().to_vec())
    }

    #[wasm_bindgen]
    pub fn normals(&self) -> Result<Vec<f64>, JsValue> {
        Ok(self
            .result()?
            .normals_flat()
            .map(<[f64]>::to_vec)
            .unwrap_or_default())
    }

    #[wasm_bindgen]
    pub fn indices(&self) -> Result<Vec<u32>, JsValue> {
        Ok(self.result()?.indices.clone())
    }

    /// UVs of `channel`, `None` when the source carries none there.
    #[wasm_bindgen]
    pub fn uvs(&self, channel: usize) -> Result<Option<Vec<f64>>, JsValue> {
        Ok(self.result()?.uvs_flat(channel).map(<[f64]>::to_vec))
    }

    #[wasm_bindgen]
    pub fn vertex_count(&self) -> usize {
        self.result.as_ref().map_or(0, |mesh| mesh.vertex_count())
    }

    #[wasm_bindgen]
    pub fn get_diagnostics(&self) -> Result<JsValue, JsValue> {
        let diagnostics = self
            .diagnostics
            .as_ref()
            .ok_or_else(|| js_error("nothing bent yet"))?;
        serde_wasm_bindgen::to_value(diagnostics).map_err(to_js_error)
    }

    /// One-line summary of the last bend, empty before the first one.
    #[wasm_bindgen]
    pub fn diagnostics_summary(&self) -> String {
        self.diagnostics
            .as_ref()
            .map(BendDiagnostics::summary)
            .unwrap_or_default()
    }

    /// Hit rate of the bend memo.
    #[wasm_bindgen]
    pub fn cache_hit_rate(&self) -> f64 {
        self.bender.cache_stats().hit_rate()
    }

    /// Time the last snapshot build took, when `bend_metrics` is enabled.
    #[wasm_bindgen]
    pub fn snapshot_build_ms(&self) -> Option<f64> {
        self.snapshot_build_ms
    }
}

impl Engine {
    /// Borrow of the current spline, for native callers.
    #[must_use]
    pub fn current_spline(&self) -> Option<&Spline> {
        self.spline.as_ref()
    }

    /// Diagnostics of the last bend, for native callers.
    #[must_use]
    pub fn last_diagnostics(&self) -> Option<&BendDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// Last bent mesh, for native callers.
    #[must_use]
    pub fn bent_mesh(&self) -> Option<&GeomMesh> {
        self.result.as_deref()
    }

    fn attach_spline(&mut self, mut spline: Spline) {
        if let (Some(old), Some(id)) = (self.spline.as_mut(), self.listener.take()) {
            old.remove_listener(id);
        }
        let dirty = Rc::clone(&self.spline_dirty);
        self.listener = Some(spline.on_change(move |_| dirty.set(true)));
        log::debug!(
            "engine: attached spline {} with {} nodes",
            spline.id(),
            spline.node_count()
        );
        self.spline = Some(spline);
        self.spline_dirty.set(true);
    }

    fn rebuild_source(&mut self, mesh: GeomMesh, transform: SourceTransform) -> Result<(), JsValue> {
        self.metrics.begin();
        let built = self
            .metrics
            .time(TimingBucket::SnapshotBuild, || SourceMesh::build(&mesh, transform));
        self.snapshot_build_ms = self.metrics.end().map(|report| report.total_ms());

        let source = built.map_err(to_js_error)?;
        if let Some(old) = self.source.as_ref() {
            log::debug!("engine: replacing source snapshot {}", old.id());
        }
        self.bender.invalidate();
        self.source = Some(source);
        self.raw_source = Some(mesh);
        self.transform = transform;
        self.settings_dirty = true;
        Ok(())
    }

    fn spline(&self) -> Result<&Spline, JsValue> {
        self.spline.as_ref().ok_or_else(|| js_error("no spline loaded"))
    }

    fn spline_mut(&mut self) -> Result<&mut Spline, JsValue> {
        self.spline.as_mut().ok_or_else(|| js_error("no spline loaded"))
    }

    fn result(&self) -> Result<&GeomMesh, JsValue> {
        self.result
            .as_deref()
            .ok_or_else(|| js_error("nothing bent yet"))
    }
}

/// Reads one node from [`NODE_STRIDE`] or [`SHORT_NODE_STRIDE`] floats.
fn node_from_slice(data: &[f64]) -> Result<SplineNode, String> {
    let node = match *data {
        [px, py, pz, dx, dy, dz] => {
            SplineNode::new(Point3::new(px, py, pz), Point3::new(dx, dy, dz))
        }
        [px, py, pz, dx, dy, dz, ux, uy, uz, sx, sy, roll] => {
            SplineNode::new(Point3::new(px, py, pz), Point3::new(dx, dy, dz))
                .with_up(Vec3::new(ux, uy, uz))
                .with_scale(Vec2::new(sx, sy))
                .with_roll(roll)
        }
        _ => {
            return Err(format!(
                "node data needs {SHORT_NODE_STRIDE} or {NODE_STRIDE} values, got {}",
                data.len()
            ));
        }
    };
    if node.is_finite() {
        Ok(node)
    } else {
        Err("node data must be finite".to_owned())
    }
}

fn nodes_from_flat(data: &[f64], stride: usize) -> Result<Vec<SplineNode>, String> {
    if stride != SHORT_NODE_STRIDE && stride != NODE_STRIDE {
        return Err(format!(
            "node stride must be {SHORT_NODE_STRIDE} or {NODE_STRIDE}, got {stride}"
        ));
    }
    if data.len() % stride != 0 {
        return Err(format!(
            "node buffer length {} is not a multiple of {stride}",
            data.len()
        ));
    }
    data.chunks_exact(stride).map(node_from_slice).collect()
}

fn node_to_array(node: &SplineNode) -> [f64; NODE_STRIDE] {
    let [px, py, pz] = node.position.to_array();
    let [dx, dy, dz] = node.direction.to_array();
    let [ux, uy, uz] = node.up.to_array();
    [px, py, pz, dx, dy, dz, ux, uy, uz, node.scale.x, node.scale.y, node.roll]
}

fn triples(data: &[f64], what: &str) -> Result<Vec<[f64; 3]>, JsValue> {
    if data.len() % 3 != 0 {
        return Err(js_error(&format!("{what} length is not a multiple of 3")));
    }
    Ok(data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

fn pairs(data: &[f64]) -> Result<Vec<[f64; 2]>, JsValue> {
    if data.len() % 2 != 0 {
        return Err(js_error("uv length is not a multiple of 2"));
    }
    Ok(data.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
}

fn fixed<const N: usize>(data: &[f64], what: &str) -> Result<[f64; N], JsValue> {
    <[f64; N]>::try_from(data).map_err(|_| js_error(&format!("{what} needs {N} values")))
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    log::debug!("engine error: {message}");
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_short_and_full_node_data() {
        let short = node_from_slice(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(short.up, Vec3::Y);
        assert_eq!(short.scale, Vec2::ONE);

        let full = node_from_slice(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0, 1.0, 2.0, 0.5, 30.0,
        ])
        .unwrap();
        assert_eq!(node_to_array(&full)[11], 30.0);
        assert_eq!(full.up, Vec3::Z);
        assert_eq!(full.scale, Vec2::new(2.0, 0.5));
    }

    #[test]
    fn rejects_bad_node_data() {
        assert!(node_from_slice(&[0.0; 5]).is_err());
        assert!(node_from_slice(&[0.0, 0.0, f64::NAN, 1.0, 0.0, 0.0]).is_err());
        assert!(nodes_from_flat(&[0.0; 13], NODE_STRIDE).is_err());
        assert!(nodes_from_flat(&[0.0; 24], 8).is_err());
        assert_eq!(nodes_from_flat(&[0.0; 24], NODE_STRIDE).map(|n| n.len()), Ok(2));
        assert_eq!(nodes_from_flat(&[0.0; 24], SHORT_NODE_STRIDE).map(|n| n.len()), Ok(4));
        assert_eq!(nodes_from_flat(&[0.0; 18], SHORT_NODE_STRIDE).map(|n| n.len()), Ok(3));
    }

    #[test]
    fn flat_node_buffers_round_trip() {
        let node = SplineNode::new(Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0))
            .with_roll(12.0);
        let flat = node_to_array(&node);
        assert_eq!(node_from_slice(&flat), Ok(node));
    }
}
