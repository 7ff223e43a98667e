use std::collections::{BTreeMap, HashSet};

use image::RgbaImage;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::animation::Frame;
use crate::compositing::{create_canvas, put_pixels, resize_canvas};
use crate::config::{MAX_ATLAS_SIZE, SpritesheetConfig};
use crate::error::{PsdPackerError, Result};
use crate::export::{
    DescriptorFrame, DescriptorImage, DescriptorMeta, SpritesheetDescriptor, atlas_image_filename,
};
use crate::model::{Rect, Size, SpritesheetStats};
use crate::packer::ShelfPacker;
use crate::psd::{self, PsdDocument};

/// Smallest atlas height emitted by the export.
const MIN_ATLAS_HEIGHT: u32 = 16;

/// Export milestones. Percentages are fixed checkpoints, not measured progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Extracting,
    Resizing,
    Packing,
    Compositing,
    Finalizing,
    Complete,
}

impl ExportStage {
    pub fn percent(self) -> u8 {
        match self {
            ExportStage::Extracting => 0,
            ExportStage::Resizing => 20,
            ExportStage::Packing => 40,
            ExportStage::Compositing => 60,
            ExportStage::Finalizing => 80,
            ExportStage::Complete => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportStage::Extracting => "extracting",
            ExportStage::Resizing => "resizing",
            ExportStage::Packing => "packing",
            ExportStage::Compositing => "compositing",
            ExportStage::Finalizing => "finalizing",
            ExportStage::Complete => "complete",
        }
    }
}

/// A frame placed by [`pack_frames_into_atlases`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedFrame {
    /// Index into the frame slice that was packed.
    pub frame_index: usize,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PackedAtlas {
    pub frames: Vec<PackedFrame>,
    /// Height consumed by the packer's shelves.
    pub used_height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FramePacking {
    pub atlases: Vec<PackedAtlas>,
    /// Indices of frames larger than an empty atlas.
    pub dropped: Vec<usize>,
}

/// One composited atlas image.
pub struct AtlasImage {
    pub filename: String,
    pub rgba: RgbaImage,
}

/// Output of a spritesheet export: atlas images plus their JSON descriptor.
pub struct SpritesheetOutput {
    pub descriptor: SpritesheetDescriptor,
    pub images: Vec<AtlasImage>,
    /// Filenames of frames dropped as too large for an atlas.
    pub dropped: Vec<String>,
}

impl SpritesheetOutput {
    /// Computes packing statistics for this output.
    pub fn stats(&self) -> SpritesheetStats {
        let total_atlas_area: u64 = self
            .images
            .iter()
            .map(|i| (i.rgba.width() as u64) * (i.rgba.height() as u64))
            .sum();
        let used_frame_area: u64 = self.descriptor.frames.iter().map(|f| f.frame.area()).sum();
        let occupancy = if total_atlas_area > 0 {
            used_frame_area as f64 / total_atlas_area as f64
        } else {
            0.0
        };
        SpritesheetStats {
            num_atlases: self.images.len(),
            num_frames: self.descriptor.frames.len(),
            num_dropped: self.dropped.len(),
            total_atlas_area,
            used_frame_area,
            occupancy,
        }
    }
}

/// Decodes `data` and exports its animations as spritesheets.
pub fn export_psd(data: &[u8], cfg: &SpritesheetConfig) -> Result<SpritesheetOutput> {
    export_psd_with_progress(data, cfg, |_| {})
}

/// [`export_psd`] reporting each [`ExportStage`] as it starts.
#[instrument(skip_all, fields(len = data.len()))]
pub fn export_psd_with_progress<F: FnMut(ExportStage)>(
    data: &[u8],
    cfg: &SpritesheetConfig,
    on_progress: F,
) -> Result<SpritesheetOutput> {
    cfg.validate()?;
    let doc = psd::decode(data)?;
    convert(&doc, cfg, on_progress)
}

/// Runs the export stages on an already-decoded document.
///
/// Frames of every animation (in layer-tree order) are concatenated, optionally resized
/// to `cfg.resolution`, shelf-packed across as many atlases as needed, then composited.
/// Frames larger than an empty atlas are dropped and listed in `dropped`.
#[instrument(skip_all)]
pub fn convert<F: FnMut(ExportStage)>(
    doc: &PsdDocument,
    cfg: &SpritesheetConfig,
    mut on_progress: F,
) -> Result<SpritesheetOutput> {
    cfg.validate()?;

    stage(&mut on_progress, ExportStage::Extracting);
    let mut frames: Vec<Frame> = doc
        .animations_in_tree_order()
        .flat_map(|(_, frames)| frames.iter().cloned())
        .collect();
    if frames.is_empty() {
        return Err(PsdPackerError::Empty);
    }
    info!(
        animations = doc.animations.len(),
        frames = frames.len(),
        "extracted frames"
    );

    stage(&mut on_progress, ExportStage::Resizing);
    if let Some((tw, th)) = cfg.resolution {
        if (tw, th) != (doc.width(), doc.height()) {
            frames = resize_frames(frames, tw, th, cfg.nearest_neighbor);
        }
    }

    stage(&mut on_progress, ExportStage::Packing);
    let packing = pack_frames_into_atlases(&frames, cfg.atlas_size, cfg.padding);

    stage(&mut on_progress, ExportStage::Compositing);
    let atlas_count = packing.atlases.len();
    let mut images = Vec::with_capacity(atlas_count);
    let mut descriptor_frames = Vec::with_capacity(frames.len());
    for (index, atlas) in packing.atlases.iter().enumerate() {
        let height = final_atlas_height(atlas.used_height, cfg.atlas_size);
        let mut canvas = create_canvas(cfg.atlas_size, height);
        for placed in &atlas.frames {
            let frame = &frames[placed.frame_index];
            put_pixels(&mut canvas, &frame.image, placed.x, placed.y);
            descriptor_frames.push(DescriptorFrame {
                filename: frame.filename.clone(),
                frame: Rect::new(placed.x, placed.y, frame.width(), frame.height()),
                source_size: Size::new(frame.width(), frame.height()),
                atlas: index,
            });
        }
        images.push(AtlasImage {
            filename: atlas_image_filename(&cfg.base_name, index, atlas_count),
            rgba: canvas,
        });
    }

    stage(&mut on_progress, ExportStage::Finalizing);
    let mut animations: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let skipped: HashSet<usize> = packing.dropped.iter().copied().collect();
    for (i, frame) in frames.iter().enumerate() {
        if skipped.contains(&i) {
            continue;
        }
        animations
            .entry(frame.anim_name.clone())
            .or_default()
            .push(frame.filename.clone());
    }
    let descriptor = SpritesheetDescriptor {
        frames: descriptor_frames,
        animations,
        meta: DescriptorMeta {
            app: "psd-packer".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            images: images
                .iter()
                .map(|img| DescriptorImage {
                    filename: img.filename.clone(),
                    size: Size::new(img.rgba.width(), img.rgba.height()),
                })
                .collect(),
        },
    };
    let dropped = packing
        .dropped
        .iter()
        .map(|&i| frames[i].filename.clone())
        .collect();

    stage(&mut on_progress, ExportStage::Complete);
    Ok(SpritesheetOutput {
        descriptor,
        images,
        dropped,
    })
}

fn stage<F: FnMut(ExportStage)>(on_progress: &mut F, s: ExportStage) {
    info!(stage = s.label(), percent = s.percent(), "export stage");
    on_progress(s);
}

fn resize_frames(frames: Vec<Frame>, w: u32, h: u32, nearest: bool) -> Vec<Frame> {
    let resize_one = |f: Frame| Frame {
        image: resize_canvas(&f.image, w, h, nearest),
        ..f
    };
    #[cfg(feature = "parallel")]
    {
        frames.into_par_iter().map(resize_one).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        frames.into_iter().map(resize_one).collect()
    }
}

/// Packs frames, in order, into `atlas_size x atlas_size` shelf packers, opening a new
/// atlas whenever the current one rejects a frame. Frames that would not fit even an
/// empty atlas are logged and dropped.
pub fn pack_frames_into_atlases(frames: &[Frame], atlas_size: u32, padding: u32) -> FramePacking {
    let mut out = FramePacking::default();
    let mut packer = ShelfPacker::new(atlas_size, atlas_size, padding);
    let mut current = PackedAtlas::default();

    for (frame_index, frame) in frames.iter().enumerate() {
        let (w, h) = (frame.width(), frame.height());
        if !ShelfPacker::new(atlas_size, atlas_size, padding).can_fit(w, h) {
            warn!(
                frame = %frame.filename,
                w,
                h,
                atlas_size,
                "frame larger than an empty atlas; dropped"
            );
            out.dropped.push(frame_index);
            continue;
        }
        let at = match packer.pack(w, h) {
            Some(at) => at,
            None => {
                current.used_height = packer.used_height();
                out.atlases.push(std::mem::take(&mut current));
                packer = ShelfPacker::new(atlas_size, atlas_size, padding);
                match packer.pack(w, h) {
                    Some(at) => at,
                    None => {
                        out.dropped.push(frame_index);
                        continue;
                    }
                }
            }
        };
        current.frames.push(PackedFrame {
            frame_index,
            x: at.x,
            y: at.y,
        });
    }

    if !current.frames.is_empty() {
        current.used_height = packer.used_height();
        out.atlases.push(current);
    }
    out
}

/// Next power of two at or above `used_height`, at least 16 and at most `atlas_size` (and 4096).
pub fn final_atlas_height(used_height: u32, atlas_size: u32) -> u32 {
    let cap = atlas_size.min(MAX_ATLAS_SIZE);
    used_height
        .max(MIN_ATLAS_HEIGHT)
        .checked_next_power_of_two()
        .unwrap_or(MAX_ATLAS_SIZE)
        .min(cap)
}
