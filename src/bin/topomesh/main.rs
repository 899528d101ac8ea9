//! Topomesh CLI - inspect, subdivide and replay built-in meshes.
//!
//! Usage: topomesh [--log-level <LEVEL>] <COMMAND> [OPTIONS]
//!
//! Run `topomesh --help` for available commands.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::{Point3, Vector3};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use topomesh::algo::subdivide::{catmull_clark_subdivide_with_progress, SubdivideOptions};
use topomesh::algo::Progress;
use topomesh::mesh::{
    faceted_cube, grid, unit_cube, DropNonManifoldFaces, HalfEdgeMesh, IndexedMesh,
};

#[derive(Parser)]
#[command(name = "topomesh")]
#[command(author, version, about = "Half-edge mesh and subdivision CLI", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh information
    Info {
        /// Built-in mesh
        #[arg(value_enum, default_value = "cube")]
        shape: Shape,

        /// Cells per side for the grid
        #[arg(long, default_value = "4")]
        size: usize,
    },

    /// Subdivide a mesh and report the result
    Subdivide {
        /// Built-in mesh
        #[arg(value_enum, default_value = "cube")]
        shape: Shape,

        /// Cells per side for the grid
        #[arg(long, default_value = "4")]
        size: usize,

        /// Number of iterations
        #[arg(short, long, default_value = "2")]
        iterations: usize,

        /// Keep original vertices in place
        #[arg(long)]
        no_update_points: bool,

        /// Keep quads instead of triangulating
        #[arg(long)]
        quads: bool,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },

    /// Time stencil replay against full re-subdivision
    Replay {
        /// Built-in mesh
        #[arg(value_enum, default_value = "faceted-cube")]
        shape: Shape,

        /// Cells per side for the grid
        #[arg(long, default_value = "4")]
        size: usize,

        /// Number of iterations
        #[arg(short, long, default_value = "3")]
        iterations: usize,

        /// Number of animated frames to evaluate
        #[arg(short, long, default_value = "10")]
        frames: usize,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Shape {
    /// Unit cube with shared corners
    Cube,
    /// Unit cube with a flat normal per side
    FacetedCube,
    /// Flat quad grid with normals
    Grid,
}

impl Shape {
    fn build(self, size: usize) -> IndexedMesh {
        match self {
            Shape::Cube => unit_cube(),
            Shape::FacetedCube => faceted_cube(),
            Shape::Grid => grid(size),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install logger: {}", e);
    }

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Info { shape, size } => cmd_info(&shape.build(size))?,

        Commands::Subdivide {
            shape,
            size,
            iterations,
            no_update_points,
            quads,
            sequential,
        } => {
            let options = SubdivideOptions::new(iterations)
                .with_update_points(!no_update_points)
                .with_triangulate(!quads)
                .with_parallel(!sequential);
            cmd_subdivide(&shape.build(size), &options)?;
        }

        Commands::Replay {
            shape,
            size,
            iterations,
            frames,
            sequential,
        } => {
            let options = SubdivideOptions::new(iterations).with_parallel(!sequential);
            cmd_replay(&shape.build(size), &options, frames)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Only ever move forward
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        if raw_percent <= previous && raw_percent != 100 {
            return;
        }

        let bar_width = 30;
        let filled = (raw_percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);
        eprint!("\r[{}{}] {:3}% {}", bar, space, raw_percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn import(source: &IndexedMesh) -> Result<HalfEdgeMesh, Box<dyn std::error::Error>> {
    let mut policy = DropNonManifoldFaces::new();
    let mesh = HalfEdgeMesh::from_indexed(source, &mut policy)?;
    if policy.dropped() > 0 {
        println!("Dropped {} non-manifold faces", policy.dropped());
    }
    Ok(mesh)
}

fn cmd_info(source: &IndexedMesh) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = import(source)?;

    println!("Input vertices: {}", source.num_vertices());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Faces: {}", mesh.num_faces());
    println!("Edges: {}", mesh.num_edges());
    println!("Half-edges: {}", mesh.num_halfedges());
    println!("Wedges: {}", mesh.num_wedges());

    let total_area: f64 = mesh.face_ids().map(|f| mesh.face_area(f)).sum();
    println!("Surface area: {:.6}", total_area);

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
    }

    if mesh.is_triangle_mesh() {
        println!("Mesh type: Triangle mesh");
    } else if mesh.is_quad_mesh() {
        println!("Mesh type: Quad mesh");
    } else {
        println!("Mesh type: Mixed polygon mesh");
    }

    let boundary = mesh.vertex_ids().filter(|&v| mesh.is_boundary_vertex(v)).count();
    if boundary == 0 {
        println!("Topology: Closed (no boundary)");
    } else {
        println!("Topology: Open ({} boundary vertices)", boundary);
    }

    let seams = mesh.edge_ids().filter(|&e| mesh.is_feature_edge(e)).count();
    println!("Attribute seams: {} edges", seams);

    Ok(())
}

fn cmd_subdivide(
    source: &IndexedMesh,
    options: &SubdivideOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut mesh = import(source)?;
    println!("Loaded: {} vertices, {} faces", mesh.num_vertices(), mesh.num_faces());

    let mode = if options.parallel { "parallel" } else { "sequential" };
    println!(
        "Applying Catmull-Clark subdivision ({} iterations, {})...",
        options.iterations, mode
    );

    let progress = create_progress();
    let start = Instant::now();
    let subdivider = catmull_clark_subdivide_with_progress(&mut mesh, options, &progress)?;
    let elapsed = start.elapsed();

    println!(
        "Result: {} vertices, {} faces, {} wedges",
        mesh.num_vertices(),
        mesh.num_faces(),
        mesh.num_wedges()
    );
    println!("Recorded {} stencils", subdivider.stencils().len());

    let start = Instant::now();
    let (out, _) = mesh.to_triangle_mesh();
    println!(
        "Exported: {} vertices, {} triangles ({:.2?} subdivide, {:.2?} export)",
        out.num_vertices(),
        out.num_faces(),
        elapsed,
        start.elapsed()
    );

    Ok(())
}

fn cmd_replay(
    source: &IndexedMesh,
    options: &SubdivideOptions,
    frames: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut mesh = import(source)?;
    let subdivider = catmull_clark_subdivide_with_progress(&mut mesh, options, &Progress::none())?;
    let (surface, output) = mesh.to_triangle_mesh();
    println!(
        "Subdivided to {} vertices ({} stencils)",
        surface.num_vertices(),
        subdivider.stencils().len()
    );

    let normals = source
        .normals()
        .map(<[Vector3<f64>]>::to_vec)
        .unwrap_or_else(|| vec![Vector3::zeros(); source.num_vertices()]);
    let frame_positions = |frame: usize| -> Vec<Point3<f64>> {
        let shift = Vector3::new(0.0, 0.0, 0.1 * frame as f64);
        source.positions.iter().map(|p| p + shift).collect()
    };

    let mut positions = Vec::new();
    let mut out_normals = Vec::new();
    let mut max_error = 0.0_f64;
    let start = Instant::now();
    for frame in 0..frames {
        let moved = frame_positions(frame);
        subdivider.recompute(&mesh, &output, &moved, &normals, &mut positions, &mut out_normals)?;

        let shift = Vector3::new(0.0, 0.0, 0.1 * frame as f64);
        for (p, q) in positions.iter().zip(&surface.positions) {
            max_error = max_error.max((p - (q + shift)).norm());
        }
    }
    let replay_time = start.elapsed();

    let start = Instant::now();
    for frame in 0..frames {
        let mut moved = source.clone();
        moved.positions = frame_positions(frame);
        let mut fresh = import(&moved)?;
        catmull_clark_subdivide_with_progress(&mut fresh, options, &Progress::none())?;
        let _ = fresh.to_triangle_mesh();
    }
    let rebuild_time = start.elapsed();

    println!("Frames: {}", frames);
    println!("Replay:  {:.2?}", replay_time);
    println!("Rebuild: {:.2?}", rebuild_time);
    println!("Max deviation from translated surface: {:.3e}", max_error);

    Ok(())
}
