use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cubebatch_assets::{DecodedImage, FileDecoder, ImageDecoder, MemoryDecoder};
use cubebatch_common::{FaceMask, FaceTiles};
use cubebatch_kernel::World;
use cubebatch_render::{
    BehaviorKey, BindingRole, FrameStats, GraphicBinding, RecordingBackend, RenderBackend,
    RenderConfig, RenderSubsystem, mesher,
};
use cubebatch_render_wgpu::WgpuBackend;
use glam::{IVec3, Mat4, Vec3};
use tracing_subscriber::EnvFilter;

const GENERATED_ATLAS: &str = "generated/atlas.png";

#[derive(Parser)]
#[command(name = "cubebatch-cli", about = "CLI tool for the cubebatch render core")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, crate info and the active config
    Info,
    /// Build a block world and run frames through the render core
    Demo {
        /// Edge length of the ground slab, in blocks
        #[arg(short, long, default_value = "8")]
        size: i32,
        /// Number of frames to run
        #[arg(short, long, default_value = "3")]
        frames: u32,
        /// Atlas image relative to the asset root; a generated atlas is used if absent
        #[arg(short, long)]
        atlas: Option<PathBuf>,
        /// Render on the GPU and write the last frame to this PNG
        #[arg(long)]
        png: Option<PathBuf>,
        /// Output image size for --png
        #[arg(long, default_value = "512")]
        resolution: u32,
    },
    /// Print the quads emitted for one cube
    Mesh {
        /// Exposed-face mask, decimal or 0b-prefixed (bits: top, front, left, right, back, bottom)
        #[arg(short, long, default_value = "0b111111")]
        mask: String,
        /// One tile for every face, or six tiles in face order
        #[arg(short, long, num_args = 1..=6, default_values_t = [0])]
        tiles: Vec<u32>,
        /// Atlas width in pixels
        #[arg(long, default_value = "64")]
        atlas_width: u32,
    },
    /// Run the pixel converter on a PNG
    Convert {
        /// Input image
        input: PathBuf,
        /// Write the converted (bottom-up RGBA) buffer as a PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RenderConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("cubebatch-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", cubebatch_common::crate_info());
            println!("assets: {}", cubebatch_assets::crate_info());
            println!("render: {}", cubebatch_render::crate_info());
            println!("kernel: {}", cubebatch_kernel::crate_info());
            println!("render-wgpu: {}", cubebatch_render_wgpu::crate_info());
            println!(
                "config: asset_root={} tile_size={} grid={}x{}x{} chunk_size={} chunks={}",
                config.asset_root.display(),
                config.tile_size,
                config.grid.chunks_x,
                config.grid.chunks_y,
                config.grid.chunks_z,
                config.grid.chunk_size,
                config.grid.chunk_count()
            );
        }
        Commands::Demo {
            size,
            frames,
            atlas,
            png,
            resolution,
        } => {
            if size < 1 {
                bail!("--size must be at least 1");
            }
            let (decoder, atlas_path) = demo_decoder(&config, atlas)?;
            match png {
                None => {
                    let mut rs = RenderSubsystem::new(config, RecordingBackend::new(), decoder)?;
                    run_demo(&mut rs, &atlas_path, size, frames, |rs, _| {
                        println!("  backend: {}", rs.backend().summary());
                        rs.backend_mut().take_calls();
                        Ok(())
                    })?;
                }
                Some(out) => {
                    let backend = WgpuBackend::headless().context("creating GPU backend")?;
                    let mut rs = RenderSubsystem::new(config, backend, decoder)?;
                    let view_proj = demo_camera(size);
                    let mut last = Vec::new();
                    run_demo(&mut rs, &atlas_path, size, frames, |rs, _| {
                        last = rs
                            .backend_mut()
                            .render_offscreen(resolution, resolution, view_proj)?;
                        Ok(())
                    })?;
                    image::save_buffer(
                        &out,
                        &last,
                        resolution,
                        resolution,
                        image::ExtendedColorType::Rgba8,
                    )
                    .with_context(|| format!("writing {}", out.display()))?;
                    println!("Wrote {}", out.display());
                }
            }
        }
        Commands::Mesh {
            mask,
            tiles,
            atlas_width,
        } => {
            let mask = parse_mask(&mask)?;
            let tiles = match tiles.as_slice() {
                [t] => FaceTiles::uniform(*t),
                [top, front, left, right, back, bottom] => {
                    FaceTiles::new(*top, *front, *left, *right, *back, *bottom)
                }
                _ => bail!("--tiles takes one value or six"),
            };
            let atlas = mesher::AtlasLayout::new(atlas_width, config.tile_size)
                .with_context(|| {
                    format!(
                        "atlas width {atlas_width} is smaller than tile size {}",
                        config.tile_size
                    )
                })?;

            println!(
                "mask={:#08b} faces={} tiles_per_row={} epsilon={}",
                mask.bits(),
                mask.count(),
                atlas.tiles_per_row(),
                atlas.epsilon()
            );
            for face in mask.faces() {
                let uv = atlas.tile_uv(tiles.get(face));
                let quad = mesher::face_quad(Vec3::ZERO, face, uv);
                println!(
                    "{face:?}: tile={} normal={} corners={:?} uv=[{:.4}, {:.4}] x [{:.4}, {:.4}]",
                    tiles.get(face),
                    quad.normal,
                    quad.corners,
                    uv.u_min,
                    uv.u_max,
                    uv.v_min,
                    uv.v_max
                );
            }
        }
        Commands::Convert { input, output } => {
            let decoder = FileDecoder::new("");
            let image = decoder.decode(&input)?;
            let rgba = cubebatch_assets::argb_top_down_to_rgba_bottom_up(
                image.argb(),
                image.width(),
                image.height(),
            )?;
            println!(
                "{}: {}x{} alpha={} bytes={}",
                input.display(),
                image.width(),
                image.height(),
                image.has_alpha(),
                rgba.len()
            );
            if let Some(out) = output {
                image::save_buffer(
                    &out,
                    &rgba,
                    image.width(),
                    image.height(),
                    image::ExtendedColorType::Rgba8,
                )
                .with_context(|| format!("writing {}", out.display()))?;
                println!("Wrote {} (rows bottom-up)", out.display());
            }
        }
    }

    Ok(())
}

/// Decoder for the demo plus the atlas path to register.
fn demo_decoder(
    config: &RenderConfig,
    atlas: Option<PathBuf>,
) -> anyhow::Result<(Box<dyn ImageDecoder>, PathBuf)> {
    match atlas {
        Some(path) => Ok((Box::new(FileDecoder::new(config.asset_root.clone())), path)),
        None => {
            let mut decoder = MemoryDecoder::new();
            decoder.insert(GENERATED_ATLAS, generated_atlas(config.tile_size)?);
            Ok((Box::new(decoder), PathBuf::from(GENERATED_ATLAS)))
        }
    }
}

/// 2x2-tile atlas: grass, stone, dirt, snow. Each tile has a darker border.
fn generated_atlas(tile_size: u32) -> anyhow::Result<DecodedImage> {
    const COLORS: [[u8; 3]; 4] = [[86, 160, 62], [128, 128, 132], [134, 96, 67], [236, 240, 244]];
    let width = tile_size * 2;
    let mut rgba = Vec::with_capacity((width * width * 4) as usize);
    for y in 0..width {
        for x in 0..width {
            let tile = (y / tile_size) * 2 + x / tile_size;
            let [r, g, b] = COLORS[tile as usize];
            let (tx, ty) = (x % tile_size, y % tile_size);
            let edge = tx == 0 || ty == 0 || tx == tile_size - 1 || ty == tile_size - 1;
            let shade = |c: u8| if edge { c / 2 } else { c };
            rgba.extend_from_slice(&[shade(r), shade(g), shade(b), 255]);
        }
    }
    Ok(DecodedImage::from_rgba(width, width, false, rgba)?)
}

fn parse_mask(s: &str) -> anyhow::Result<FaceMask> {
    let bits = match s.strip_prefix("0b") {
        Some(bin) => u8::from_str_radix(bin, 2),
        None => s.parse::<u8>(),
    }
    .with_context(|| format!("invalid mask {s:?}"))?;
    if bits > FaceMask::ALL.bits() {
        bail!("mask {s} has bits above the six faces");
    }
    Ok(FaceMask::from_bits(bits))
}

fn demo_camera(size: i32) -> Mat4 {
    let extent = size as f32;
    let center = Vec3::new(extent / 2.0, 0.0, extent / 2.0);
    let eye = center + Vec3::new(extent * 0.9, extent * 0.8, extent * 1.1);
    Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, extent * 10.0)
        * Mat4::look_at_rh(eye, center, Vec3::Y)
}

/// Ground slab, a stone pillar and one overlay marker. The pillar loses its
/// top block on the third frame.
fn run_demo<B, F>(
    rs: &mut RenderSubsystem<B>,
    atlas_path: &std::path::Path,
    size: i32,
    frames: u32,
    mut after_frame: F,
) -> anyhow::Result<()>
where
    B: RenderBackend,
    F: FnMut(&mut RenderSubsystem<B>, u32) -> anyhow::Result<()>,
{
    let atlas = rs.register_image_resource(atlas_path, BehaviorKey::Texture)?;
    let marker = rs.register_procedural_resource(BehaviorKey::Overlay)?;

    let mut world = World::new(rs.config().grid);
    let ground = [GraphicBinding::surface(atlas, FaceTiles::column(0, 2, 2))];
    world.fill(IVec3::ZERO, IVec3::new(size - 1, 0, size - 1), &ground)?;

    let mid = size / 2;
    let pillar = [GraphicBinding::surface(atlas, FaceTiles::column(3, 1, 1))];
    let pillar_ids = world.fill(IVec3::new(mid, 1, mid), IVec3::new(mid, 3, mid), &pillar)?;
    world.place(
        IVec3::new(0, 5, 0),
        vec![GraphicBinding::new(
            marker,
            BindingRole::Marker,
            FaceTiles::uniform(0),
        )],
    )?;
    tracing::info!(size, frames, "demo world built");
    println!(
        "World: {} blocks, {} exposed faces, {} chunks",
        world.block_count(),
        world.exposed_face_count(),
        rs.config().grid.chunk_count()
    );

    for frame in 0..frames {
        if frame == 2 {
            if let Some(top) = pillar_ids.last() {
                world.remove(*top)?;
            }
        }
        let queued = world.submit_changes(rs)?;
        let stats = rs.run_frame(&world)?;
        print_stats(frame, queued, &stats);
        after_frame(rs, frame)?;
    }
    Ok(())
}

fn print_stats(frame: u32, queued: usize, stats: &FrameStats) {
    println!(
        "frame {frame}: queued={queued} recorded={} skipped={} swept={} seen_skips={} quads={} replayed={}",
        stats.slots_recorded,
        stats.slots_skipped,
        stats.entities_swept,
        stats.queued_skipped_seen,
        stats.quads_emitted,
        stats.batches_replayed
    );
}
