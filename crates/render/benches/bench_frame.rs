use std::collections::HashMap;
use std::hint::black_box;
use std::time::Instant;

use cubebatch_assets::{DecodedImage, MemoryDecoder};
use cubebatch_common::{ChunkGrid, ChunkIndex, EntityId, FaceMask, FaceTiles};
use cubebatch_render::{
    BehaviorKey, GraphicBinding, GraphicId, RecordingBackend, RenderConfig, RenderEntity,
    RenderSubsystem, WorldView, mesher,
};
use glam::Vec3;

struct Block {
    position: Vec3,
    bindings: Vec<GraphicBinding>,
}

impl RenderEntity for Block {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn exposed_faces(&self) -> FaceMask {
        FaceMask::ALL
    }

    fn bindings(&self) -> &[GraphicBinding] {
        &self.bindings
    }
}

struct FlatWorld {
    grid: ChunkGrid,
    blocks: HashMap<EntityId, Block>,
    users: HashMap<GraphicId, Vec<EntityId>>,
}

impl WorldView for FlatWorld {
    fn chunk_index_of(&self, position: Vec3) -> ChunkIndex {
        self.grid.chunk_index_of(position)
    }

    fn users_of(&self, graphic: GraphicId) -> Vec<EntityId> {
        self.users.get(&graphic).cloned().unwrap_or_default()
    }

    fn entity(&self, id: EntityId) -> Option<&dyn RenderEntity> {
        self.blocks.get(&id).map(|b| b as &dyn RenderEntity)
    }
}

fn make_setup(side: usize) -> (RenderSubsystem<RecordingBackend>, FlatWorld) {
    let grid = ChunkGrid::cubic(8, 16.0).unwrap();
    let mut decoder = MemoryDecoder::new();
    decoder.insert(
        "atlas.png",
        DecodedImage::from_argb(256, 256, true, vec![255; 256 * 256 * 4]).unwrap(),
    );
    let config = RenderConfig {
        grid,
        ..RenderConfig::default()
    };
    let mut rs = RenderSubsystem::new(config, RecordingBackend::new(), Box::new(decoder)).unwrap();
    let atlas = rs
        .register_image_resource("atlas.png", BehaviorKey::Texture)
        .unwrap();

    let mut world = FlatWorld {
        grid,
        blocks: HashMap::new(),
        users: HashMap::new(),
    };
    for x in 0..side {
        for z in 0..side {
            let id = EntityId::new();
            world.blocks.insert(
                id,
                Block {
                    position: Vec3::new(x as f32, 0.0, z as f32),
                    bindings: vec![GraphicBinding::surface(atlas, FaceTiles::column(0, 1, 2))],
                },
            );
            world.users.entry(atlas).or_default().push(id);
        }
    }
    (rs, world)
}

fn bench_full_rebuild(side: usize, iterations: usize) {
    let (mut rs, world) = make_setup(side);
    let ids: Vec<EntityId> = world.blocks.keys().copied().collect();

    let start = Instant::now();
    for _ in 0..iterations {
        for id in &ids {
            rs.enqueue(*id);
        }
        let _ = black_box(rs.run_frame(black_box(&world)));
        rs.backend_mut().take_calls();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  full rebuild ({} blocks, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        side * side
    );
}

fn bench_replay_only(side: usize, iterations: usize) {
    let (mut rs, world) = make_setup(side);
    for id in world.blocks.keys() {
        rs.enqueue(*id);
    }
    let _ = rs.run_frame(&world);

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(rs.run_frame(black_box(&world)));
        rs.backend_mut().take_calls();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  cached replay ({} blocks, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        side * side
    );
}

struct Discard(usize);

impl cubebatch_render::QuadSink for Discard {
    fn push_quad(&mut self, quad: cubebatch_render::Quad) {
        black_box(quad);
        self.0 += 1;
    }
}

fn bench_mesher(iterations: usize) {
    let atlas = mesher::AtlasLayout::new(256, 32).unwrap();
    let tiles = FaceTiles::new(0, 1, 2, 3, 4, 5);
    let mut sink = Discard(0);

    let start = Instant::now();
    for i in 0..iterations {
        let mask = FaceMask::from_bits((i % 64) as u8);
        mesher::emit_box(&mut sink, Some(&atlas), Vec3::ZERO, black_box(mask), &tiles);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  emit_box ({iterations} iters, {} quads): {per_iter:?}/iter, total {elapsed:?}",
        sink.0
    );
}

fn main() {
    println!("=== Render Frame Benchmarks ===\n");

    println!("Full rebuild (every block queued):");
    bench_full_rebuild(16, 100);
    bench_full_rebuild(64, 10);

    println!("\nCached replay (nothing queued):");
    bench_replay_only(16, 1000);
    bench_replay_only(64, 100);

    println!("\nMesher:");
    bench_mesher(100_000);

    println!("\n=== Done ===");
}
