//! Diagnostics returned next to every bent mesh.
//!
//! Degenerate geometry never fails a bend. It shows up here instead, as
//! warnings, so interactive callers can keep drawing while a user drags a
//! handle through a degenerate position.
//!
//! ```ignore
//! let (mesh, diagnostics) = bend_mesh(&source, BendTarget::Curve(&curve), FillingMode::default());
//! assert_eq!(diagnostics.sample_evaluations, diagnostics.group_count * diagnostics.copies);
//! for warning in &diagnostics.warnings {
//!     log::warn!("{warning}");
//! }
//! ```

use std::fmt;

use serde::Serialize;

use super::metrics::BendTimingReport;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BendDiagnostics {
    /// Vertices in the output mesh.
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Distinct distance-rate groups in the source.
    pub group_count: usize,
    /// Curve samples resolved by distance. Equals `group_count * copies`,
    /// independent of the vertex count.
    pub sample_evaluations: usize,
    /// How many times the source was laid along the curve.
    pub copies: usize,
    /// True when the result came from a memo instead of being recomputed.
    pub cache_hit: bool,
    /// Only populated with the `bend_metrics` feature on native targets.
    #[serde(skip)]
    pub timing: Option<BendTimingReport>,
    pub warnings: Vec<String>,
}

impl BendDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Records a warning and logs it.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Sums counts and appends warnings; `timing` and `cache_hit` of `other`
    /// are ignored.
    pub fn merge(&mut self, other: &BendDiagnostics) {
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.group_count += other.group_count;
        self.sample_evaluations += other.sample_evaluations;
        self.copies += other.copies;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Format: `"V:{vertices} T:{triangles} G:{groups} S:{samples} [x{copies}]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "V:{} T:{} G:{} S:{}",
            self.vertex_count, self.triangle_count, self.group_count, self.sample_evaluations
        )];
        if self.copies > 1 {
            parts.push(format!("x{}", self.copies));
        }
        if self.cache_hit {
            parts.push("cached".to_string());
        }
        if !self.warnings.is_empty() {
            parts.push(format!("warnings:{}", self.warnings.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for BendDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bend Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(f, "  Groups: {}", self.group_count)?;
        writeln!(f, "  Sample evaluations: {}", self.sample_evaluations)?;
        writeln!(f, "  Copies: {}", self.copies)?;
        if self.cache_hit {
            writeln!(f, "  Served from cache")?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        if let Some(timing) = &self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_only_interesting_parts() {
        let mut diag = BendDiagnostics {
            vertex_count: 8,
            triangle_count: 12,
            group_count: 2,
            sample_evaluations: 2,
            copies: 1,
            ..BendDiagnostics::default()
        };
        assert_eq!(diag.summary(), "V:8 T:12 G:2 S:2");
        diag.copies = 3;
        diag.add_warning("zero-length interval");
        assert_eq!(diag.summary(), "V:8 T:12 G:2 S:2 x3 warnings:1");
        assert!(diag.to_string().contains("zero-length interval"));
    }

    #[test]
    fn test_merge_sums_counts() {
        let mut a = BendDiagnostics {
            vertex_count: 4,
            sample_evaluations: 2,
            copies: 1,
            ..BendDiagnostics::default()
        };
        let mut b = a.clone();
        b.add_warning("w");
        a.merge(&b);
        assert_eq!(a.vertex_count, 8);
        assert_eq!(a.sample_evaluations, 4);
        assert_eq!(a.copies, 2);
        assert_eq!(a.warnings, vec!["w".to_string()]);
    }
}
