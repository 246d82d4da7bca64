//! A read-only inspector for archive files: opens one for a chosen backend
//! and lists what it finds in each directory without constructing any
//! pipeline objects (that would need a live `archive_device_traits::Device`,
//! out of scope for a dump tool).

use std::path::PathBuf;

use archive_format::BackendTag;
use archive_io::FileByteSource;
use clap::{Parser, ValueEnum};
use serde::Serialize;

/// The backend to open the archive as. Every archive carries data for all
/// backends it was built with, but `pso_archive::Archive::open` always binds
/// to exactly one (§3) — this picks which.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliBackend {
    Opengl,
    D3d11,
    D3d12,
    Vulkan,
    MetalIos,
    MetalMacos,
}

impl From<CliBackend> for BackendTag {
    fn from(value: CliBackend) -> Self {
        match value {
            CliBackend::Opengl => BackendTag::OpenGl,
            CliBackend::D3d11 => BackendTag::Direct3D11,
            CliBackend::D3d12 => BackendTag::Direct3D12,
            CliBackend::Vulkan => BackendTag::Vulkan,
            CliBackend::MetalIos => BackendTag::MetalIos,
            CliBackend::MetalMacos => BackendTag::MetalMacos,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the archive file to inspect.
    file: PathBuf,

    /// Which backend's blocks to report block-base offsets and shader
    /// availability for. Resource/shader names and counts are the same
    /// regardless of backend, since the shader table is backend-independent.
    #[arg(long, value_enum, default_value_t = CliBackend::Vulkan)]
    backend: CliBackend,

    /// Emit a machine-readable summary instead of the human-readable listing.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary {
    backend: String,
    block_base_offsets: [u32; archive_format::NUM_BACKENDS],
    shader_count: usize,
    signatures: Vec<String>,
    graphics_pipeline_states: Vec<String>,
    compute_pipeline_states: Vec<String>,
    ray_tracing_pipeline_states: Vec<String>,
    tile_pipeline_states: Vec<String>,
    render_passes: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let source = FileByteSource::open(&args.file)
        .map_err(|err| anyhow::anyhow!("failed to open {:?}: {err}", args.file))?;
    let archive = pso_archive::Archive::open(&source, args.backend.into())?;

    let summary = Summary {
        backend: format!("{:?}", archive.backend()),
        block_base_offsets: archive.block_base_offsets(),
        shader_count: archive.shader_count(),
        signatures: archive.signature_names().map(str::to_string).collect(),
        graphics_pipeline_states: archive.graphics_pipeline_state_names().map(str::to_string).collect(),
        compute_pipeline_states: archive.compute_pipeline_state_names().map(str::to_string).collect(),
        ray_tracing_pipeline_states: archive
            .ray_tracing_pipeline_state_names()
            .map(str::to_string)
            .collect(),
        tile_pipeline_states: archive.tile_pipeline_state_names().map(str::to_string).collect(),
        render_passes: archive.render_pass_names().map(str::to_string).collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{:?} (bound as {})", args.file, summary.backend);
    println!("block base offsets: {:?}", summary.block_base_offsets);
    println!("shaders: {}", summary.shader_count);
    print_names("resource signatures", &summary.signatures);
    print_names("graphics pipeline states", &summary.graphics_pipeline_states);
    print_names("compute pipeline states", &summary.compute_pipeline_states);
    print_names("ray tracing pipeline states", &summary.ray_tracing_pipeline_states);
    print_names("tile pipeline states", &summary.tile_pipeline_states);
    print_names("render passes", &summary.render_passes);

    Ok(())
}

fn print_names(label: &str, names: &[String]) {
    println!("{label} ({}):", names.len());
    for name in names {
        println!("  {name}");
    }
}
