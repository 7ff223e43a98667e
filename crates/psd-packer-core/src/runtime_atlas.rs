use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;

use crate::compositing::{create_canvas, put_pixels};
use crate::model::Rect;
use crate::packer::ShelfPacker;

/// What a region's pixel offsets refer to.
#[derive(Debug, Clone)]
pub enum RegionSource {
    /// A packed atlas, by its index in the owning manager.
    Atlas { index: usize, width: u32, height: u32 },
    /// A standalone image: an oversized source kept whole, or a pre-baked sheet.
    Image(Arc<RgbaImage>),
}

/// Normalized texture coordinates of a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uv {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

/// A named rectangle inside an atlas or a standalone image.
#[derive(Debug, Clone)]
pub struct TextureRegion {
    source: RegionSource,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    /// Region packed at (x, y) inside atlas `index` of size `atlas_width x atlas_height`.
    pub fn packed(index: usize, atlas_width: u32, atlas_height: u32, frame: Rect) -> Self {
        Self {
            source: RegionSource::Atlas {
                index,
                width: atlas_width,
                height: atlas_height,
            },
            x: frame.x,
            y: frame.y,
            width: frame.w,
            height: frame.h,
        }
    }

    /// Region covering a whole image that bypassed packing.
    pub fn standalone(image: Arc<RgbaImage>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            source: RegionSource::Image(image),
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Region at a known rectangle of an already-baked image.
    pub fn sub_image(image: Arc<RgbaImage>, frame: Rect) -> Self {
        Self {
            source: RegionSource::Image(image),
            x: frame.x,
            y: frame.y,
            width: frame.w,
            height: frame.h,
        }
    }

    pub fn source(&self) -> &RegionSource {
        &self.source
    }

    /// Dimensions of the backing atlas or image.
    pub fn backing_size(&self) -> (u32, u32) {
        match &self.source {
            RegionSource::Atlas { width, height, .. } => (*width, *height),
            RegionSource::Image(img) => img.dimensions(),
        }
    }

    pub fn atlas_index(&self) -> Option<usize> {
        match self.source {
            RegionSource::Atlas { index, .. } => Some(index),
            RegionSource::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        match &self.source {
            RegionSource::Image(img) => Some(img),
            RegionSource::Atlas { .. } => None,
        }
    }

    /// True when the region is a whole image outside any atlas.
    pub fn is_standalone(&self) -> bool {
        matches!(self.source, RegionSource::Image(_))
            && self.x == 0
            && self.y == 0
            && (self.width, self.height) == self.backing_size()
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Texture coordinates relative to the backing image's full dimensions.
    pub fn uv(&self) -> Uv {
        let (bw, bh) = self.backing_size();
        let (bw, bh) = (bw.max(1) as f32, bh.max(1) as f32);
        Uv {
            u0: self.x as f32 / bw,
            v0: self.y as f32 / bh,
            u1: (self.x + self.width) as f32 / bw,
            v1: (self.y + self.height) as f32 / bh,
        }
    }
}

/// A canvas-backed atlas filled by one [`ShelfPacker`].
///
/// `dirty` is set by every successful [`add`](Self::add) and only cleared by
/// [`mark_clean`](Self::mark_clean). `full` mirrors the packer and never reverts
/// except through [`clear`](Self::clear).
pub struct TextureAtlas {
    index: usize,
    canvas: RgbaImage,
    packer: ShelfPacker,
    regions: HashMap<String, Arc<TextureRegion>>,
    dirty: bool,
}

impl TextureAtlas {
    pub fn new(index: usize, width: u32, height: u32, padding: u32) -> Self {
        Self {
            index,
            canvas: create_canvas(width, height),
            packer: ShelfPacker::new(width, height, padding),
            regions: HashMap::new(),
            dirty: false,
        }
    }

    /// Packs and draws `image` under `id`.
    ///
    /// A known `id` returns the existing region untouched. Returns `None` without side
    /// effects when the image does not fit.
    pub fn add(&mut self, id: &str, image: &RgbaImage) -> Option<Arc<TextureRegion>> {
        if let Some(region) = self.regions.get(id) {
            return Some(Arc::clone(region));
        }
        let (w, h) = image.dimensions();
        let at = self.packer.pack(w, h)?;
        put_pixels(&mut self.canvas, image, at.x, at.y);

        let region = Arc::new(TextureRegion::packed(
            self.index,
            self.canvas.width(),
            self.canvas.height(),
            Rect::new(at.x, at.y, w, h),
        ));
        self.regions.insert(id.to_string(), Arc::clone(&region));
        self.dirty = true;
        Some(region)
    }

    pub fn can_fit(&self, w: u32, h: u32) -> bool {
        self.packer.can_fit(w, h)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<TextureRegion>> {
        self.regions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.regions.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.packer.is_full()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn used_height(&self) -> u32 {
        self.packer.used_height()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Drops every region, wipes the canvas and starts a fresh packer.
    pub fn clear(&mut self) {
        let (w, h) = self.canvas.dimensions();
        self.canvas = create_canvas(w, h);
        self.packer = ShelfPacker::new(w, h, self.packer.padding());
        self.regions.clear();
        self.dirty = true;
    }
}
