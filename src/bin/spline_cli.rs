#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("spline_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use spline_engine::geom::{
        BBox, BendDiagnostics, BendTarget, FillingMode, GeomMesh, MeshBender, Point3, Quat,
        SourceMesh, SourceTransform, Spline, SplineNode, Vec2, Vec3, bend_spline_segments,
    };
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    const USAGE: &str = r"spline_cli (spline-engine)

USAGE:
  spline_cli list
  spline_cli run <scenario|all> [options]

SCENARIOS:
  straight_box
  s_curve_box
  loop_ring
  tentacle_ramp
  repeat_links

OPTIONS (run):
  --out-dir <dir>    Write <scenario>.obj and/or <scenario>.snap to this dir (required for `all`)
  --obj <path>       Write OBJ (single scenario only)
  --snap <path>      Write snapshot (single scenario only)
  --no-obj           Skip OBJ when using --out-dir
  --no-snap          Skip snapshot when using --out-dir
  --overwrite        Overwrite existing output files
  -h, --help         Show this help
";

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut overwrite = false;
        let mut write_obj = true;
        let mut write_snap = true;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--overwrite" => overwrite = true,
                "--no-obj" => write_obj = false,
                "--no-snap" => write_snap = false,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() || snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            if !write_obj && !write_snap {
                return Err("nothing to write (both --no-obj and --no-snap set)".to_string());
            }

            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_one_scenario_to_dir(*scenario, dir, write_obj, write_snap, overwrite)?;
                }
                return Ok(());
            }

            let scenario = Scenario::from_name(&scenario_name)
                .ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_one_scenario_to_dir(scenario, dir, write_obj, write_snap, overwrite);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario =
            Scenario::from_name(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario)?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }

        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(&output);
        Ok(())
    }

    fn run_one_scenario_to_dir(
        scenario: Scenario,
        dir: &Path,
        write_obj: bool,
        write_snap: bool,
        overwrite: bool,
    ) -> Result<(), String> {
        let output = run_scenario(scenario)?;

        if write_snap {
            let path = dir.join(format!("{}.snap", output.name));
            write_text_file(&path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        if write_obj {
            let path = dir.join(format!("{}.obj", output.name));
            write_obj_file(&path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(&output);
        Ok(())
    }

    fn report(output: &ScenarioOutput) {
        eprintln!("{}: {}", output.name, output.diagnostics.summary());
        for warning in &output.diagnostics.warnings {
            eprintln!("  warning: {warning}");
        }
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = format!("unknown scenario `{name}`\n\navailable scenarios:\n");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    fn ensure_writable(path: &Path, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        Ok(())
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        ensure_writable(path, overwrite)?;
        fs::write(path, normalize_snapshot_text(text))
            .map_err(|e| format!("write {}: {e}", path.display()))
    }

    fn write_obj_file(path: &Path, mesh: &GeomMesh, name: &str, overwrite: bool) -> Result<(), String> {
        mesh.validate()
            .map_err(|e| format!("mesh validation failed: {e}"))?;
        ensure_writable(path, overwrite)?;

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);
        write_obj(&mut w, mesh, name).map_err(|e| format!("write obj: {e}"))?;
        w.flush()
            .map_err(|e| format!("flush {}: {e}", path.display()))
    }

    fn write_obj(w: &mut impl Write, mesh: &GeomMesh, name: &str) -> std::io::Result<()> {
        writeln!(w, "# spline-engine spline_cli")?;
        writeln!(w, "o {name}")?;

        for p in &mesh.positions {
            writeln!(w, "v {} {} {}", p[0], p[1], p[2])?;
        }

        // OBJ carries a single texture channel; channel 0 is written.
        let uvs = mesh.uv_channel(0);
        if let Some(uvs) = uvs {
            for uv in uvs {
                writeln!(w, "vt {} {}", uv[0], uv[1])?;
            }
        }

        if let Some(normals) = mesh.normals.as_ref() {
            for n in normals {
                writeln!(w, "vn {} {} {}", n[0], n[1], n[2])?;
            }
        }

        let has_uvs = uvs.is_some();
        let has_normals = mesh.normals.is_some();

        for tri in mesh.indices.chunks_exact(3) {
            let a = tri[0] + 1;
            let b = tri[1] + 1;
            let c = tri[2] + 1;

            match (has_uvs, has_normals) {
                (true, true) => writeln!(w, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}"),
                (true, false) => writeln!(w, "f {a}/{a} {b}/{b} {c}/{c}"),
                (false, true) => writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}"),
                (false, false) => writeln!(w, "f {a} {b} {c}"),
            }?;
        }
        Ok(())
    }

    fn normalize_snapshot_text(text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\n') {
            normalized
        } else {
            format!("{normalized}\n")
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        // -0.0 prints as "-0.000000"
        q + 0.0
    }

    fn write_f64(out: &mut String, value: f64) {
        let value = quantize_f64(value);
        let _ = write!(out, "{value:.SNAPSHOT_DECIMALS$}");
    }

    fn write_values_line(out: &mut String, prefix: &str, values: &[f64]) {
        out.push_str(prefix);
        for value in values {
            out.push(' ');
            write_f64(out, *value);
        }
        out.push('\n');
    }

    fn write_spline(out: &mut String, spline: &Spline) {
        let _ = writeln!(out, "spline.node_count {}", spline.node_count());
        let _ = writeln!(out, "spline.loop {}", spline.is_loop());
        let _ = writeln!(out, "spline.curve_count {}", spline.curve_count());
        write_values_line(out, "spline.length", &[spline.length()]);
        for node in spline.nodes() {
            write_values_line(
                out,
                "node",
                &[
                    node.position.x,
                    node.position.y,
                    node.position.z,
                    node.scale.x,
                    node.scale.y,
                    node.roll,
                ],
            );
        }
    }

    fn write_diagnostics(out: &mut String, diag: &BendDiagnostics) {
        let _ = writeln!(out, "bend.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "bend.triangle_count {}", diag.triangle_count);
        let _ = writeln!(out, "bend.group_count {}", diag.group_count);
        let _ = writeln!(out, "bend.sample_evaluations {}", diag.sample_evaluations);
        let _ = writeln!(out, "bend.copies {}", diag.copies);
        let _ = writeln!(out, "bend.warning_count {}", diag.warnings.len());
        for (idx, warning) in diag.warnings.iter().enumerate() {
            let _ = writeln!(out, "bend.warning.{idx} {warning}");
        }
    }

    fn write_mesh(out: &mut String, mesh: &GeomMesh) {
        let bounds = BBox::from_points(mesh.positions.iter().copied().map(Point3::from));
        if let Some(bounds) = bounds {
            write_values_line(out, "mesh.bbox_min", &bounds.min.to_array());
            write_values_line(out, "mesh.bbox_max", &bounds.max.to_array());
            write_values_line(out, "mesh.bbox_size", &bounds.size().to_array());
        } else {
            let _ = writeln!(out, "mesh.bbox none");
        }

        let _ = writeln!(out, "mesh.positions {}", mesh.positions.len());
        for p in &mesh.positions {
            write_values_line(out, "p", p);
        }

        let _ = writeln!(out, "mesh.indices {}", mesh.indices.len());
        for tri in mesh.indices.chunks_exact(3) {
            let _ = writeln!(out, "i {} {} {}", tri[0], tri[1], tri[2]);
        }

        if let Some(normals) = mesh.normals.as_ref() {
            let _ = writeln!(out, "mesh.normals {}", normals.len());
            for n in normals {
                write_values_line(out, "n", n);
            }
        } else {
            let _ = writeln!(out, "mesh.normals none");
        }

        for (channel, uvs) in mesh.uv_channels.iter().enumerate() {
            if let Some(uvs) = uvs {
                let _ = writeln!(out, "mesh.uv{channel} {}", uvs.len());
                for uv in uvs {
                    write_values_line(out, "uv", uv);
                }
            }
        }
    }

    fn snapshot(op: &str, sections: impl FnOnce(&mut String)) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# spline-engine snapshot v1");
        let _ = writeln!(out, "op {op}");
        let _ = writeln!(out, "quantize {SNAPSHOT_QUANTIZE:.1e}");
        sections(&mut out);
        normalize_snapshot_text(&out)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        StraightBox,
        SCurveBox,
        LoopRing,
        TentacleRamp,
        RepeatLinks,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::StraightBox,
            Scenario::SCurveBox,
            Scenario::LoopRing,
            Scenario::TentacleRamp,
            Scenario::RepeatLinks,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::StraightBox => "straight_box",
                Scenario::SCurveBox => "s_curve_box",
                Scenario::LoopRing => "loop_ring",
                Scenario::TentacleRamp => "tentacle_ramp",
                Scenario::RepeatLinks => "repeat_links",
            }
        }

        fn from_name(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|s| s.name() == name)
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: GeomMesh,
        diagnostics: BendDiagnostics,
        snapshot: String,
    }

    fn run_scenario(scenario: Scenario) -> Result<ScenarioOutput, String> {
        let name = scenario.name();
        let (spline, mesh, diagnostics) = match scenario {
            Scenario::StraightBox => scenario_straight_box()?,
            Scenario::SCurveBox => scenario_s_curve_box()?,
            Scenario::LoopRing => scenario_loop_ring()?,
            Scenario::TentacleRamp => scenario_tentacle_ramp()?,
            Scenario::RepeatLinks => scenario_repeat_links()?,
        };
        mesh.validate()
            .map_err(|e| format!("{name}: bent mesh is inconsistent: {e}"))?;

        let snapshot = snapshot(name, |out| {
            write_spline(out, &spline);
            write_diagnostics(out, &diagnostics);
            write_mesh(out, &mesh);
        });
        Ok(ScenarioOutput {
            name,
            mesh,
            diagnostics,
            snapshot,
        })
    }

    type Bent = (Spline, GeomMesh, BendDiagnostics);

    fn bend_whole(spline: Spline, source: &SourceMesh, mode: FillingMode) -> Bent {
        let mut bender = MeshBender::new().with_mode(mode);
        let (mesh, diagnostics) = bender.bend(source, BendTarget::spline(&spline));
        (spline, GeomMesh::clone(&mesh), diagnostics)
    }

    /// A 1 x 1 box along `x` from 0 to 4, one cross-section per unit.
    fn scenario_straight_box() -> Result<Bent, String> {
        let spline = Spline::new(vec![
            SplineNode::new(Point3::ORIGIN, Point3::new(8.0 / 3.0, 0.0, 0.0)),
            SplineNode::new(Point3::new(8.0, 0.0, 0.0), Point3::new(32.0 / 3.0, 0.0, 0.0)),
        ])
        .map_err(|e| e.to_string())?;
        let source = build_source(&box_bar(4, 4.0), SourceTransform::new())?;
        Ok(bend_whole(spline, &source, FillingMode::StretchToInterval))
    }

    fn scenario_s_curve_box() -> Result<Bent, String> {
        let spline = Spline::new(vec![
            SplineNode::new(Point3::ORIGIN, Point3::new(5.0, 0.0, 0.0)),
            SplineNode::new(Point3::new(10.0, 10.0, 0.0), Point3::new(15.0, 10.0, 0.0)),
        ])
        .map_err(|e| e.to_string())?;
        let source = build_source(&box_bar(16, 1.0), SourceTransform::new())?;
        Ok(bend_whole(spline, &source, FillingMode::StretchToInterval))
    }

    /// A tube bent once per side of a closed square path, then merged.
    fn scenario_loop_ring() -> Result<Bent, String> {
        let corners = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let nodes = corners
            .iter()
            .zip(corners.iter().cycle().skip(1))
            .map(|(&(x, z), &(nx, nz))| {
                let handle = Vec3::new(nx - x, 0.0, nz - z).mul_scalar(0.4);
                let position = Point3::new(x, 0.0, z);
                SplineNode::new(position, position.add_vec(handle))
            })
            .collect();
        let spline = Spline::new(nodes).map_err(|e| e.to_string())?.looped(true);
        let source = build_source(&tube(6, 8, 1.0, 0.5), SourceTransform::new())?;

        let parts = bend_spline_segments(&source, &spline, FillingMode::StretchToInterval);
        let mut diagnostics = BendDiagnostics::new();
        for (_, part) in &parts {
            diagnostics.merge(part);
        }
        let mesh = GeomMesh::merge(parts.iter().map(|(mesh, _)| mesh));
        Ok((spline, mesh, diagnostics))
    }

    /// Tapering, twisting tentacle along an open five-node path.
    fn scenario_tentacle_ramp() -> Result<Bent, String> {
        let nodes = (0..5)
            .map(|i| {
                let x = f64::from(i) * 4.0;
                let y = if i % 2 == 0 { 0.0 } else { 2.0 };
                SplineNode::new(Point3::new(x, y, 0.0), Point3::new(x + 1.5, y, 0.0))
            })
            .collect();
        let mut spline = Spline::new(nodes).map_err(|e| e.to_string())?;
        spline.apply_scale_roll_ramp(Vec2::ONE, Vec2::splat(0.1), 0.0, 360.0);

        let transform = SourceTransform::new().scale(Vec3::new(1.0, 0.6, 0.6));
        let source = build_source(&tube(24, 8, 1.0, 1.0), transform)?;
        Ok(bend_whole(spline, &source, FillingMode::StretchToInterval))
    }

    /// Short links repeated along a gentle arc.
    fn scenario_repeat_links() -> Result<Bent, String> {
        let spline = Spline::new(vec![
            SplineNode::new(Point3::ORIGIN, Point3::new(4.0, 0.0, 2.0)),
            SplineNode::new(Point3::new(12.0, 0.0, 0.0), Point3::new(16.0, 0.0, -2.0))
                .with_up(Vec3::new(0.0, 1.0, 0.2)),
        ])
        .map_err(|e| e.to_string())?;
        let link = Quat::from_axis_angle_degrees(Vec3::X, 45.0);
        let transform = SourceTransform::new()
            .rotate(link)
            .scale(Vec3::new(1.5, 0.3, 0.3));
        let source = build_source(&box_bar(1, 1.0), transform)?;
        Ok(bend_whole(spline, &source, FillingMode::Repeat))
    }

    fn build_source(mesh: &GeomMesh, transform: SourceTransform) -> Result<SourceMesh, String> {
        SourceMesh::build(mesh, transform).map_err(|e| e.to_string())
    }

    /// Unit-square cross-sections at `sections + 1` stations along `x`, with a
    /// `u = x / length` UV channel.
    fn box_bar(sections: u32, length: f64) -> GeomMesh {
        tube_with(sections, 4, length, std::f64::consts::FRAC_1_SQRT_2, 45.0)
    }

    /// Open tube of `segments`-gons along `x`.
    fn tube(sections: u32, segments: u32, length: f64, radius: f64) -> GeomMesh {
        tube_with(sections, segments, length, radius, 0.0)
    }

    fn tube_with(sections: u32, segments: u32, length: f64, radius: f64, phase_deg: f64) -> GeomMesh {
        let mut positions = Vec::new();
        let mut uvs = Vec::new();
        for s in 0..=sections {
            let u = f64::from(s) / f64::from(sections);
            for k in 0..segments {
                let a = phase_deg.to_radians()
                    + std::f64::consts::TAU * f64::from(k) / f64::from(segments);
                positions.push([u * length, radius * a.cos(), radius * a.sin()]);
                uvs.push([u, f64::from(k) / f64::from(segments)]);
            }
        }
        let mut indices = Vec::new();
        for s in 0..sections {
            for k in 0..segments {
                let a = s * segments + k;
                let b = s * segments + (k + 1) % segments;
                let (c, d) = (b + segments, a + segments);
                indices.extend_from_slice(&[a, d, c, a, c, b]);
            }
        }
        GeomMesh::new(positions, indices).with_uv_channel(0, uvs)
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
