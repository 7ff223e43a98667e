//! PSD/PSB asset ingestion and texture packing.
//!
//! - Decoding: `psd::decode` reads the header, layer records and channel data (raw and
//!   PackBits) and rebuilds the group hierarchy.
//! - Animations: groups named `anim - <name>` yield numbered frames (`animation`).
//! - Packing: a first-fit `ShelfPacker` drives both the offline spritesheet export
//!   (`pipeline::export_psd`) and the runtime `TextureAtlasManager` / `TextureSystem`.
//!
//! Quick example:
//! ```ignore
//! use psd_packer_core::{SpritesheetConfig, export_psd, to_json_string};
//! # fn main() -> anyhow::Result<()> {
//! let bytes = std::fs::read("hero.psd")?;
//! let cfg = SpritesheetConfig::builder().base_name("hero").build();
//! let out = export_psd(&bytes, &cfg)?;
//! for img in &out.images {
//!     img.rgba.save(&img.filename)?;
//! }
//! std::fs::write("hero.json", to_json_string(&out.descriptor)?)?;
//! # Ok(()) }
//! ```

pub mod animation;
pub mod compositing;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod psd;
pub mod reader;
pub mod runtime;
pub mod runtime_atlas;
pub mod texture_system;

pub use animation::*;
pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::*;
pub use pipeline::*;
pub use psd::{PsdDocument, PsdHeader, decode};
pub use runtime::TextureAtlasManager;
pub use runtime_atlas::{RegionSource, TextureAtlas, TextureRegion, Uv};
pub use texture_system::{PrebakedAtlas, TextureSystem};

/// Convenience prelude for common types and functions.
/// Importing `psd_packer_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::animation::{Frame, extract_frames_from_group, find_animation_groups};
    pub use crate::config::{AtlasConfig, SpritesheetConfig};
    pub use crate::error::{PsdPackerError, Result};
    pub use crate::export::SpritesheetDescriptor;
    pub use crate::model::{Rect, Size, SpritesheetStats};
    pub use crate::packer::{Placement, ShelfPacker};
    pub use crate::pipeline::{ExportStage, SpritesheetOutput, export_psd, pack_frames_into_atlases};
    pub use crate::psd::{LayerNode, LayerRecord, PsdDocument, decode};
    pub use crate::runtime::TextureAtlasManager;
    pub use crate::runtime_atlas::{TextureAtlas, TextureRegion, Uv};
    pub use crate::texture_system::TextureSystem;
}
