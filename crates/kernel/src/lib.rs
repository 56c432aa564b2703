//! World Kernel: reference block world consumed by the render core.
//!
//! # Invariants
//! - Every mutation keeps the graphic -> users index and exposed-face masks
//!   consistent with occupancy.
//! - All state mutations flow through explicit operations and are logged.
//! - A block whose mask or bindings change is dirty until drained.

pub mod world;

pub use world::{Block, World, WorldError, WorldEvent};

pub fn crate_info() -> &'static str {
    "cubebatch-kernel v0.1.0"
}
