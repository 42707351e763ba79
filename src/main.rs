//! scenebake CLI
//!
//! Command-line interface for glTF export, GLB unpacking and texture conversion.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use scenebake_core::SceneNode;
use scenebake_export::{
    convert_or_resize_image, unpack_glb, Container, ExportError, ExportOptions, GltfExporter, OutputBuffer,
    ResizeOptions, VrmOptions,
};

/// scenebake - scene graph to glTF 2.0 exporter
#[derive(Parser)]
#[command(name = "scenebake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a JSON scene graph to glTF
    Export(ExportArgs),

    /// Split a GLB into a .gltf and a .bin
    Unpack(UnpackArgs),

    /// Convert or resize a single image
    Texture(TextureArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufferArg {
    Bin,
    Draco,
    Both,
}

impl std::str::FromStr for BufferArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bin" => Ok(BufferArg::Bin),
            "draco" => Ok(BufferArg::Draco),
            "both" => Ok(BufferArg::Both),
            _ => Err(format!("Unknown buffer mode: {s}")),
        }
    }
}

impl From<BufferArg> for OutputBuffer {
    fn from(arg: BufferArg) -> Self {
        match arg {
            BufferArg::Bin => OutputBuffer::Bin,
            BufferArg::Draco => OutputBuffer::Draco,
            BufferArg::Both => OutputBuffer::Both,
        }
    }
}

#[derive(Args)]
struct ExportArgs {
    /// Scene graph (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Output .gltf or .glb path
    #[arg(short, long)]
    output: PathBuf,

    /// Export options (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Buffer mode: bin, draco, both
    #[arg(long)]
    buffer: Option<BufferArg>,

    /// Write a single GLB
    #[arg(long)]
    glb: bool,

    /// Attach humanoid avatar metadata
    #[arg(long)]
    vrm: bool,

    /// Write compact JSON
    #[arg(long)]
    compact: bool,
}

#[derive(Args)]
struct UnpackArgs {
    /// Source .glb
    #[arg(short, long)]
    input: PathBuf,

    /// Destination .gltf; the .bin lands beside it
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct TextureArgs {
    /// Source image
    #[arg(short, long)]
    input: PathBuf,

    /// Destination image; the extension picks the format
    #[arg(short, long)]
    output: PathBuf,

    /// Resize once either side reaches this size (0 disables)
    #[arg(long, default_value = "0")]
    max_size: u32,

    /// Longer side after a size-triggered resize
    #[arg(long, default_value = "2048")]
    target_size: u32,

    /// Round sides up to powers of two
    #[arg(long)]
    pot: bool,

    /// Make the image square
    #[arg(long)]
    square: bool,

    /// JPEG quality in 0..=1
    #[arg(long, default_value = "0.9")]
    quality: f32,
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_thread_ids(verbosity >= 3)
        .with_file(verbosity >= 3)
        .with_line_number(verbosity >= 3)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Export(args) => cmd_export(args),
        Commands::Unpack(args) => cmd_unpack(args),
        Commands::Texture(args) => cmd_texture(args),
    }
}

fn load_options(args: &ExportArgs) -> Result<ExportOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ExportOptions::default(),
    };

    if let Some(buffer) = args.buffer {
        options.output_buffer = buffer.into();
    }
    if args.glb {
        options.container = Container::Glb;
    }
    if args.vrm && options.vrm.is_none() {
        options.vrm = Some(VrmOptions::default());
    }
    if args.compact {
        options.pretty_json = false;
    }
    Ok(options)
}

fn cmd_export(args: ExportArgs) -> Result<()> {
    let options = load_options(&args)?;

    info!("Loading scene: {:?}", args.input);
    let text = fs::read_to_string(&args.input).context("Failed to read scene file")?;
    let root: SceneNode = serde_json::from_str(&text).context("Failed to parse scene file")?;

    let exporter = GltfExporter::new(options);
    let summary = match exporter.export(&root, &args.output) {
        Ok(summary) => summary,
        Err(ExportError::CodecUnavailable(mode)) => {
            bail!("Buffer mode '{mode}' needs a mesh codec; this build ships none, use --buffer bin")
        }
        Err(err) => return Err(err).context("Export failed"),
    };

    println!("Exported {} nodes, {} meshes to {}", summary.nodes, summary.meshes, summary.document.display());
    for buffer in &summary.buffers {
        println!("  buffer  {}", buffer.display());
    }
    for texture in &summary.textures {
        println!("  texture {}", texture.display());
    }
    Ok(())
}

fn cmd_unpack(args: UnpackArgs) -> Result<()> {
    info!("Unpacking: {:?}", args.input);
    unpack_glb(&args.input, &args.output).context("Failed to unpack GLB")?;
    println!("Unpacked {} -> {}", args.input.display(), args.output.display());
    Ok(())
}

fn cmd_texture(args: TextureArgs) -> Result<()> {
    let options = ResizeOptions {
        max_size: args.max_size,
        target_size: args.target_size,
        power_of_two: args.pot,
        square: args.square,
        quality: args.quality,
    };
    convert_or_resize_image(&args.input, &args.output, &options).context("Failed to convert texture")?;
    println!("Converted {} -> {}", args.input.display(), args.output.display());
    Ok(())
}
