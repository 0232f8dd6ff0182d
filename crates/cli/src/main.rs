use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::Path;
use tracing_subscriber::fmt::SubscriberBuilder;

use uvatlas::{create_atlas, AtlasOptions, GeodesicMode, MeshDesc, Progress};

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Atlas experiment runner over procedural meshes")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Generate a procedural shape, build its atlas, report JSON stats
    Atlas {
        /// cube | tetrahedron | cylinder | sphere | grid
        #[arg(long)]
        shape: String,
        /// Shape detail (segments / subdivisions / grid size)
        #[arg(long, default_value_t = 2)]
        detail: usize,
        #[arg(long, default_value_t = 512)]
        width: usize,
        #[arg(long, default_value_t = 512)]
        height: usize,
        #[arg(long, default_value_t = 2.0)]
        gutter: f64,
        #[arg(long, default_value_t = 1.0 / 6.0)]
        max_stretch: f64,
        /// Upper bound on the chart count (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_charts: usize,
        /// Force the quality geodesic engine
        #[arg(long, default_value_t = false)]
        quality: bool,
        /// Optional path for the full atlas dump (JSON)
        #[arg(long)]
        out: Option<String>,
    },
    /// List the available procedural shapes
    Shapes,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Atlas {
            shape,
            detail,
            width,
            height,
            gutter,
            max_stretch,
            max_charts,
            quality,
            out,
        } => atlas(
            &shape,
            detail,
            width,
            height,
            gutter,
            max_stretch,
            max_charts,
            quality,
            out,
        ),
        Action::Shapes => {
            println!("cube tetrahedron cylinder sphere grid");
            Ok(())
        }
    }
}

fn generate(shape: &str, detail: usize) -> Result<(Vec<[f32; 3]>, Vec<u32>)> {
    Ok(match shape {
        "cube" => uvatlas::shapes::cube(),
        "tetrahedron" => uvatlas::shapes::tetrahedron(),
        "cylinder" => uvatlas::shapes::cylinder_shell(detail.max(3) * 8, detail.max(1)),
        "sphere" => uvatlas::shapes::icosphere(detail.min(4)),
        "grid" => uvatlas::shapes::grid(detail.max(1)),
        other => bail!("unknown shape '{other}'"),
    })
}

#[allow(clippy::too_many_arguments)]
fn atlas(
    shape: &str,
    detail: usize,
    width: usize,
    height: usize,
    gutter: f64,
    max_stretch: f64,
    max_charts: usize,
    quality: bool,
    out: Option<String>,
) -> Result<()> {
    let (positions, indices) = generate(shape, detail)?;
    tracing::info!(
        shape,
        vertices = positions.len(),
        faces = indices.len() / 3,
        "generated input mesh"
    );

    let desc = MeshDesc {
        positions: &positions,
        indices: &indices,
        ..MeshDesc::default()
    };
    let options = AtlasOptions {
        max_chart_number: max_charts,
        max_stretch,
        width,
        height,
        gutter,
        geodesic: if quality {
            GeodesicMode::Quality
        } else {
            GeodesicMode::Default
        },
        ..AtlasOptions::default()
    };

    let started = std::time::Instant::now();
    let mut last_percent = 0u32;
    let mut progress = |fraction: f32| {
        let percent = (fraction * 100.0) as u32;
        if percent >= last_percent + 10 {
            last_percent = percent;
            tracing::info!(percent, "atlas progress");
        }
        Progress::Continue
    };
    let atlas = create_atlas(&desc, &options, Some(&mut progress))?;
    let elapsed = started.elapsed();

    tracing::info!(
        charts = atlas.chart_count,
        stretch = atlas.stretch,
        vertices = atlas.positions.len(),
        ms = elapsed.as_millis() as u64,
        "atlas complete"
    );

    let stats = json!({
        "shape": shape,
        "input": { "vertices": positions.len(), "faces": indices.len() / 3 },
        "atlas": {
            "charts": atlas.chart_count,
            "stretch": atlas.stretch,
            "vertices": atlas.positions.len(),
            "duplicated_vertices": atlas.positions.len().saturating_sub(positions.len()),
        },
        "options": {
            "width": width, "height": height, "gutter": gutter,
            "max_stretch": max_stretch, "max_charts": max_charts,
        },
        "elapsed_ms": elapsed.as_millis() as u64,
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if let Some(out) = out {
        let dump = json!({
            "positions": atlas.positions,
            "uvs": atlas.uvs,
            "indices": atlas.indices,
            "face_partition": atlas.face_partition,
            "vertex_remap": atlas.vertex_remap,
        });
        let out_path = Path::new(&out);
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(out_path, serde_json::to_vec_pretty(&dump)?)?;
        tracing::info!(out, "atlas dump written");
    }
    Ok(())
}
