//! Opt-in timing hooks for snapshot building and bending.
//!
//! Timing is collected only with the `bend_metrics` feature on non-wasm
//! targets (`std::time::Instant` is unavailable on `wasm32`). Otherwise every
//! call is a pass-through and [`BendMetrics::end`] returns `None`.
//!
//! ```ignore
//! let mut metrics = BendMetrics::default();
//! metrics.begin();
//! let source = metrics.time(TimingBucket::SnapshotBuild, || SourceMesh::build(&mesh, tf));
//! if let Some(report) = metrics.end() {
//!     println!("snapshot: {} ns", report.snapshot_build_ns);
//! }
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Curve rebuilds and per-group sample resolution.
    CurveSampling,
    /// Source mesh transform and distance-rate grouping.
    SnapshotBuild,
    /// Per-vertex bending and output assembly.
    Bending,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BendTimingReport {
    pub curve_sampling_ns: u64,
    pub snapshot_build_ns: u64,
    pub bending_ns: u64,
}

impl BendTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.curve_sampling_ns
            .saturating_add(self.snapshot_build_ns)
            .saturating_add(self.bending_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

#[derive(Debug, Default)]
pub struct BendMetrics {
    #[cfg(all(feature = "bend_metrics", not(target_arch = "wasm32")))]
    report: BendTimingReport,
}

impl BendMetrics {
    /// Resets all counters.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "bend_metrics", not(target_arch = "wasm32")))]
        {
            self.report = BendTimingReport::default();
        }
    }

    /// Accumulated report, `None` when metrics are compiled out.
    #[must_use]
    pub fn end(&self) -> Option<BendTimingReport> {
        #[cfg(all(feature = "bend_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "bend_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f`, adding its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "bend_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            let slot = match bucket {
                TimingBucket::CurveSampling => &mut self.report.curve_sampling_ns,
                TimingBucket::SnapshotBuild => &mut self.report.snapshot_build_ns,
                TimingBucket::Bending => &mut self.report.bending_ns,
            };
            *slot = slot.saturating_add(nanos);
            result
        }

        #[cfg(not(all(feature = "bend_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_passes_result_through() {
        let mut metrics = BendMetrics::default();
        metrics.begin();
        let value = metrics.time(TimingBucket::Bending, || 41 + 1);
        assert_eq!(value, 42);

        #[cfg(all(feature = "bend_metrics", not(target_arch = "wasm32")))]
        assert!(metrics.end().is_some());
        #[cfg(not(all(feature = "bend_metrics", not(target_arch = "wasm32"))))]
        assert!(metrics.end().is_none());
    }

    #[test]
    fn test_report_totals_saturate() {
        let report = BendTimingReport {
            curve_sampling_ns: u64::MAX,
            bending_ns: 5,
            ..BendTimingReport::default()
        };
        assert_eq!(report.total_ns(), u64::MAX);
    }
}
