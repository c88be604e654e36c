//! Ordered node sequences and their lazily rebuilt curve segments.

use std::cell::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::core::{Vec2, clamp_total};
use super::curve::{CubicBezierCurve, DEFAULT_CURVE_RESOLUTION};
use super::node::SplineNode;
use super::sample::CurveSample;

/// Minimum number of nodes a spline may hold.
pub const MIN_NODE_COUNT: usize = 2;

static NEXT_SPLINE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplineError {
    #[error("a spline needs at least 2 nodes, operation would leave {node_count}")]
    InvariantViolation { node_count: usize },
    #[error("node index {index} out of bounds for {len} nodes")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// What changed in a [`Spline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplineChange {
    NodeInserted { index: usize },
    NodeRemoved { index: usize },
    NodeUpdated { index: usize },
    NodesReshaped,
    LoopChanged { is_loop: bool },
}

/// Delivered synchronously to every listener after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplineEvent {
    pub spline_id: u64,
    pub version: u64,
    pub node_count: usize,
    pub change: SplineChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&SplineEvent)>;

/// A path through at least two [`SplineNode`]s, optionally closed.
///
/// Segments are rebuilt on first access after a mutation. Every successful
/// mutation bumps [`version`](Self::version) and then notifies listeners in
/// registration order. Listeners receive the event only; they cannot reach
/// back into the spline while it is being mutated.
///
/// Cloning yields an independent spline with a fresh id and no listeners.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "SplineDocument", into = "SplineDocument")]
pub struct Spline {
    id: u64,
    nodes: Vec<SplineNode>,
    is_loop: bool,
    resolution: usize,
    version: u64,
    curves: OnceCell<Vec<CubicBezierCurve>>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Spline {
    pub fn new(nodes: Vec<SplineNode>) -> Result<Self, SplineError> {
        if nodes.len() < MIN_NODE_COUNT {
            return Err(SplineError::InvariantViolation {
                node_count: nodes.len(),
            });
        }
        Ok(Self {
            id: NEXT_SPLINE_ID.fetch_add(1, Ordering::Relaxed),
            nodes,
            is_loop: false,
            resolution: DEFAULT_CURVE_RESOLUTION,
            version: 0,
            curves: OnceCell::new(),
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    /// Sets the loop flag at construction, without notifying. The version
    /// still moves when the flag changes.
    #[must_use]
    pub fn looped(mut self, is_loop: bool) -> Self {
        if self.is_loop != is_loop {
            self.is_loop = is_loop;
            self.rebuilt();
        }
        self
    }

    /// Per-segment cache resolution, at least 1.
    #[must_use]
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        let resolution = resolution.max(1);
        if self.resolution != resolution {
            self.resolution = resolution;
            self.rebuilt();
        }
        self
    }

    fn rebuilt(&mut self) {
        self.version += 1;
        self.curves = OnceCell::new();
    }

    /// Process-unique identity of this spline value.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub const fn resolution(&self) -> usize {
        self.resolution
    }

    #[must_use]
    pub fn nodes(&self) -> &[SplineNode] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, index: usize) -> Option<&SplineNode> {
        self.nodes.get(index)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn is_loop(&self) -> bool {
        self.is_loop
    }

    // ─── Mutation ───────────────────────────────────────────────────────────

    /// Inserts `node` at `index` (`index == node_count()` appends).
    pub fn insert(&mut self, index: usize, node: SplineNode) -> Result<(), SplineError> {
        if index > self.nodes.len() {
            return Err(SplineError::IndexOutOfBounds {
                index,
                len: self.nodes.len(),
            });
        }
        self.nodes.insert(index, node);
        self.notify(SplineChange::NodeInserted { index });
        Ok(())
    }

    pub fn append(&mut self, node: SplineNode) {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.notify(SplineChange::NodeInserted { index });
    }

    /// Removes and returns the node at `index`. Refuses to go below two nodes.
    pub fn remove(&mut self, index: usize) -> Result<SplineNode, SplineError> {
        self.check_index(index)?;
        if self.nodes.len() <= MIN_NODE_COUNT {
            return Err(SplineError::InvariantViolation {
                node_count: self.nodes.len() - 1,
            });
        }
        let node = self.nodes.remove(index);
        self.notify(SplineChange::NodeRemoved { index });
        Ok(node)
    }

    /// Replaces the node at `index`, returning the previous value.
    pub fn update(&mut self, index: usize, node: SplineNode) -> Result<SplineNode, SplineError> {
        self.check_index(index)?;
        let old = std::mem::replace(&mut self.nodes[index], node);
        self.notify(SplineChange::NodeUpdated { index });
        Ok(old)
    }

    /// Opens or closes the path. Setting the current value is a no-op.
    pub fn set_loop(&mut self, is_loop: bool) {
        if self.is_loop == is_loop {
            return;
        }
        self.is_loop = is_loop;
        self.notify(SplineChange::LoopChanged { is_loop });
    }

    /// Adds a node one handle length past the node at `index` and returns the
    /// new node's index.
    ///
    /// The new node sits on the selected node's handle and keeps the same
    /// heading (`direction = 2 * handle - position`). Up, scale and roll are
    /// copied from the selected node.
    pub fn add_node_after(&mut self, index: usize) -> Result<usize, SplineError> {
        self.check_index(index)?;
        let selected = self.nodes[index];
        let mut node = selected;
        node.position = selected.direction;
        node.direction = selected.position.reflect_through(selected.direction);
        self.insert(index + 1, node)?;
        Ok(index + 1)
    }

    /// Duplicates the node at `index` right after itself.
    pub fn clone_node(&mut self, index: usize) -> Result<usize, SplineError> {
        self.check_index(index)?;
        let node = self.nodes[index];
        self.insert(index + 1, node)?;
        Ok(index + 1)
    }

    /// Ramps scale and roll along the path by each node's cumulative distance
    /// ratio. One mutation, one notification.
    ///
    /// On a loop the first node ends up with the end values, since the closing
    /// segment arrives at it.
    pub fn apply_scale_roll_ramp(
        &mut self,
        start_scale: Vec2,
        end_scale: Vec2,
        start_roll: f64,
        end_roll: f64,
    ) {
        let total = self.length();
        let node_count = self.nodes.len();
        let lengths: Vec<f64> = self.curves().iter().map(CubicBezierCurve::length).collect();

        let rate = |distance: f64| if total > 0.0 { distance / total } else { 0.0 };
        let mut travelled = 0.0;
        for (i, length) in lengths.into_iter().enumerate() {
            let start_rate = rate(travelled);
            travelled += length;
            let end_rate = rate(travelled);

            let first = &mut self.nodes[i];
            first.scale = start_scale.lerp(end_scale, start_rate);
            first.roll = start_roll + (end_roll - start_roll) * start_rate;

            let second = &mut self.nodes[(i + 1) % node_count];
            second.scale = start_scale.lerp(end_scale, end_rate);
            second.roll = start_roll + (end_roll - start_roll) * end_rate;
        }
        self.notify(SplineChange::NodesReshaped);
    }

    // ─── Listeners ──────────────────────────────────────────────────────────

    pub fn on_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&SplineEvent) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns whether a listener was registered under `id`.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ─── Geometry ───────────────────────────────────────────────────────────

    /// One segment per consecutive node pair, plus the closing segment when
    /// looping.
    pub fn curves(&self) -> &[CubicBezierCurve] {
        self.curves.get_or_init(|| {
            let curves = build_curves(&self.nodes, self.is_loop, self.resolution);
            log::trace!(
                "spline {} v{}: rebuilt {} curve segments",
                self.id,
                self.version,
                curves.len()
            );
            curves
        })
    }

    #[must_use]
    pub fn curve_count(&self) -> usize {
        self.curves().len()
    }

    /// Sum of all segment lengths.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.curves().iter().map(CubicBezierCurve::length).sum()
    }

    /// Maps a path distance to `(segment index, distance within segment)`.
    ///
    /// Linear scan over segments; `d` is clamped to `[0, length]`.
    #[must_use]
    pub fn curve_at_distance(&self, d: f64) -> (usize, f64) {
        locate_distance(self.curves(), d)
    }

    #[must_use]
    pub fn sample_at_distance(&self, d: f64) -> CurveSample {
        sample_curves_at_distance(self.curves(), d)
    }

    /// Samples by path time `t` in `[0, curve_count]`: the integer part picks
    /// the segment and the fraction is the time within it.
    #[must_use]
    pub fn sample(&self, t: f64) -> CurveSample {
        let curves = self.curves();
        let last = curves.len() - 1;
        let t = clamp_total(t, 0.0, curves.len() as f64);
        let index = (t.floor() as usize).min(last);
        curves[index].sample_at_time(t - index as f64)
    }

    fn check_index(&self, index: usize) -> Result<(), SplineError> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(SplineError::IndexOutOfBounds {
                index,
                len: self.nodes.len(),
            })
        }
    }

    fn notify(&mut self, change: SplineChange) {
        self.version += 1;
        self.curves = OnceCell::new();
        let event = SplineEvent {
            spline_id: self.id,
            version: self.version,
            node_count: self.nodes.len(),
            change,
        };
        log::debug!("spline {}: {:?} -> v{}", self.id, change, self.version);
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }
}

/// See [`Spline::curve_at_distance`].
#[must_use]
pub fn locate_distance(curves: &[CubicBezierCurve], d: f64) -> (usize, f64) {
    let total: f64 = curves.iter().map(CubicBezierCurve::length).sum();
    let mut remaining = clamp_total(d, 0.0, total);
    for (i, curve) in curves.iter().enumerate() {
        if remaining <= curve.length() {
            return (i, remaining);
        }
        remaining -= curve.length();
    }
    let last = curves.len().saturating_sub(1);
    (last, curves.last().map_or(0.0, CubicBezierCurve::length))
}

/// Samples a segment list at a path distance.
///
/// Works on the bare slice so that callers holding only the segments (for
/// example worker threads) can sample without the owning [`Spline`]. An empty
/// slice yields a default sample at the origin.
#[must_use]
pub fn sample_curves_at_distance(curves: &[CubicBezierCurve], d: f64) -> CurveSample {
    let (index, local) = locate_distance(curves, d);
    curves.get(index).map_or_else(
        || CubicBezierCurve::new(SplineNode::default(), SplineNode::default()).sample_at_time(0.0),
        |curve| curve.sample_at_distance(local),
    )
}

fn build_curves(nodes: &[SplineNode], is_loop: bool, resolution: usize) -> Vec<CubicBezierCurve> {
    let mut curves: Vec<CubicBezierCurve> = nodes
        .windows(2)
        .map(|pair| CubicBezierCurve::with_resolution(pair[0], pair[1], resolution))
        .collect();
    if is_loop {
        if let (Some(last), Some(first)) = (nodes.last(), nodes.first()) {
            curves.push(CubicBezierCurve::with_resolution(*last, *first, resolution));
        }
    }
    curves
}

impl Clone for Spline {
    fn clone(&self) -> Self {
        Self {
            id: NEXT_SPLINE_ID.fetch_add(1, Ordering::Relaxed),
            nodes: self.nodes.clone(),
            is_loop: self.is_loop,
            resolution: self.resolution,
            version: self.version,
            curves: self.curves.clone(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }
}

impl fmt::Debug for Spline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spline")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("is_loop", &self.is_loop)
            .field("nodes", &self.nodes)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Persisted form of a [`Spline`]: nodes and the loop flag only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineDocument {
    #[serde(default)]
    pub is_loop: bool,
    pub nodes: Vec<SplineNode>,
}

impl TryFrom<SplineDocument> for Spline {
    type Error = SplineError;

    fn try_from(doc: SplineDocument) -> Result<Self, Self::Error> {
        Ok(Self::new(doc.nodes)?.looped(doc.is_loop))
    }
}

impl From<Spline> for SplineDocument {
    fn from(spline: Spline) -> Self {
        Self {
            is_loop: spline.is_loop,
            nodes: spline.nodes,
        }
    }
}

impl From<&Spline> for SplineDocument {
    fn from(spline: &Spline) -> Self {
        Self {
            is_loop: spline.is_loop,
            nodes: spline.nodes.clone(),
        }
    }
}
