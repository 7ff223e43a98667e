//! Rectangle packing.
//!
//! A single first-fit shelf packer backs both the runtime atlases and the offline
//! spritesheet export, so the two paths place rectangles identically.

pub mod shelf;

pub use shelf::{Placement, Shelf, ShelfPacker};
