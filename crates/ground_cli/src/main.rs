//! Ground CLI
//!
//! Render the Ground Graphics demos headlessly and write PNG frames.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ground_3d::prelude::*;
use ground_gpu::GpuBackend;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{SceneFile, ShapeKind};

#[derive(Parser)]
#[command(name = "ground")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ground Graphics demo renderer", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a subdivided, swirled triangle or square
    Gasket {
        /// Base polygon
        #[arg(long, value_enum, default_value = "triangle")]
        shape: GasketArg,

        /// Recursion depth
        #[arg(short, long, default_value = "7")]
        depth: u32,

        /// Drop the center cell at every level
        #[arg(long)]
        gasket: bool,

        /// Swirl angle per unit of radius
        #[arg(long, default_value = "1.0")]
        theta: f32,

        /// Fill color (#rrggbb)
        #[arg(long, default_value = "#ffcc00")]
        color: String,

        /// Output width and height in pixels
        #[arg(short, long, default_value = "512")]
        size: u32,

        /// Output PNG path
        #[arg(short, long, default_value = "gasket.png")]
        out: PathBuf,

        #[arg(long, value_enum, default_value = "software")]
        backend: BackendArg,
    },

    /// Render a scene description and optionally pick a pixel
    Scene {
        /// Scene TOML file
        #[arg(short, long)]
        config: PathBuf,

        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        out: PathBuf,

        /// Output width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Output height in pixels
        #[arg(long, default_value = "480")]
        height: u32,

        /// Pixel to pick, as X,Y from the top-left corner
        #[arg(long, value_parser = parse_point)]
        pick: Option<(u32, u32)>,

        #[arg(long, value_enum, default_value = "software")]
        backend: BackendArg,
    },

    /// Print vertex and face statistics of a primitive
    Mesh {
        /// cube, cone, cylinder, sphere, plane or gasket
        #[arg(long)]
        shape: ShapeKind,

        /// Divisions (rows for plane, depth for gasket)
        #[arg(long)]
        divisions: Option<u32>,
    },
}

/// Command-line name of a [`GasketShape`]
#[derive(Clone, Copy, Debug, ValueEnum)]
enum GasketArg {
    Triangle,
    Square,
}

impl From<GasketArg> for GasketShape {
    fn from(arg: GasketArg) -> Self {
        match arg {
            GasketArg::Triangle => GasketShape::Triangle,
            GasketArg::Square => GasketShape::Square,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Software,
    Gpu,
}

fn parse_point(s: &str) -> Result<(u32, u32)> {
    let (x, y) = s
        .split_once(',')
        .with_context(|| format!("Expected X,Y but got '{}'", s))?;
    Ok((x.trim().parse()?, y.trim().parse()?))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("ground=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ground=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Gasket {
            shape,
            depth,
            gasket,
            theta,
            color,
            size,
            out,
            backend,
        } => {
            let gasket = Gasket {
                shape: shape.into(),
                depth,
                gasket,
                theta,
            };
            cmd_gasket(gasket, &color, size, &out, backend)
        }

        Commands::Scene {
            config,
            out,
            width,
            height,
            pick,
            backend,
        } => cmd_scene(&config, &out, width, height, pick, backend),

        Commands::Mesh { shape, divisions } => cmd_mesh(shape, divisions),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

enum Renderer {
    Software(SoftwareBackend),
    Gpu(Box<GpuBackend>),
}

impl Renderer {
    fn new(kind: BackendArg) -> Result<Self> {
        Ok(match kind {
            BackendArg::Software => Renderer::Software(SoftwareBackend::new()),
            BackendArg::Gpu => Renderer::Gpu(Box::new(
                GpuBackend::new_headless().context("Failed to create GPU backend")?,
            )),
        })
    }

    fn backend(&mut self) -> &mut dyn RenderBackend {
        match self {
            Renderer::Software(b) => b,
            Renderer::Gpu(b) => b.as_mut(),
        }
    }

    fn frame(&self) -> Result<RgbaImage> {
        Ok(match self {
            Renderer::Software(b) => b.to_image()?,
            Renderer::Gpu(b) => b.read_frame()?,
        })
    }
}

fn save(image: &RgbaImage, out: &Path) -> Result<()> {
    image
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!("Wrote {}x{} frame to {}", image.width(), image.height(), out.display());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_gasket(gasket: Gasket, color: &str, size: u32, out: &Path, backend: BackendArg) -> Result<()> {
    if size == 0 {
        anyhow::bail!("Output size must be at least 1 pixel");
    }
    let color = Color::from_hex_str(color).with_context(|| format!("Invalid color '{}'", color))?;

    // the gasket lies in z = 0, draw it straight into clip space
    let mut camera = Camera::new(&CameraConfig {
        eye: [0.0, 0.0, 0.0],
        pitch: 0.0,
        yaw: 0.0,
        ..Default::default()
    });
    camera.set_projection(Mat4::IDENTITY);

    let mut scene = Scene::new(
        SceneConfig {
            clear_color: Color::WHITE,
            ..Default::default()
        },
        camera,
    );
    let renderable = Renderable::new("gasket", gasket)
        .with_transform(Transform::new(Vec3::new(0.0, 0.0, 0.5), Vec3::ZERO, Vec3::ONE))
        .with_material(Material::new().diffuse(color));
    scene.add(renderable)?;

    info!(
        "Rendering {:?} gasket (depth {}, theta {}, {} triangles)",
        gasket.shape,
        gasket.depth,
        gasket.theta,
        gasket.points().len() / 3
    );

    let mut renderer = Renderer::new(backend)?;
    scene.render(renderer.backend(), size, size)?;
    save(&renderer.frame()?, out)
}

fn cmd_scene(
    config: &Path,
    out: &Path,
    width: u32,
    height: u32,
    pick: Option<(u32, u32)>,
    backend: BackendArg,
) -> Result<()> {
    if width == 0 || height == 0 {
        anyhow::bail!("Output size must be at least 1x1 pixels");
    }
    let file = SceneFile::load(config)?;
    let mut scene = file.build(width, height)?;
    info!(
        "Loaded {} objects and {} lights from {}",
        scene.len(),
        scene.lights().len(),
        config.display()
    );

    let mut renderer = Renderer::new(backend)?;
    scene.render(renderer.backend(), width, height)?;
    save(&renderer.frame()?, out)?;

    if let Some((x, y)) = pick {
        match scene.pick(renderer.backend(), x, y, width, height)? {
            Some(id) => {
                let name = scene.get(id).map(|r| r.name()).unwrap_or_default();
                println!("picked {} ({}) at {},{}", name, id, x, y);
            }
            None => println!("nothing at {},{}", x, y),
        }
    }
    Ok(())
}

fn cmd_mesh(shape: ShapeKind, divisions: Option<u32>) -> Result<()> {
    let shape = shape.build(divisions);
    let mesh = shape
        .generate()
        .with_context(|| format!("Failed to generate {}", shape.name()))?;

    println!("shape:          {}", shape.name());
    println!("layout:         {:?}", mesh.layout());
    println!("faces:          {}", mesh.face_count());
    println!("verts per face: {}", mesh.verts_per_face());
    println!("vertices:       {}", mesh.vertex_count());
    println!("triangles:      {}", mesh.triangle_count());
    println!("outline lines:  {}", mesh.outline_indices().len() / 2);
    Ok(())
}
