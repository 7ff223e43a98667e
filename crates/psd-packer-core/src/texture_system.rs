use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::config::AtlasConfig;
use crate::error::{PsdPackerError, Result};
use crate::export::SpritesheetDescriptor;
use crate::model::Rect;
use crate::runtime::TextureAtlasManager;
use crate::runtime_atlas::{RegionSource, TextureAtlas, TextureRegion};

/// A pre-baked atlas image with known frame rectangles (no packing involved).
pub struct PrebakedAtlas {
    pub name: String,
    pub image: Arc<RgbaImage>,
    pub frames: HashMap<String, Arc<TextureRegion>>,
}

/// Runtime sprite lookup: dynamically packed textures plus registered pre-baked atlases.
///
/// Lookups check pre-baked frames first, then the atlas manager. When two pre-baked
/// atlases define the same frame id, the one registered first wins.
pub struct TextureSystem {
    manager: TextureAtlasManager,
    prebaked: Vec<PrebakedAtlas>,
    prebaked_index: HashMap<String, Arc<TextureRegion>>,
    animations: BTreeMap<String, Vec<String>>,
}

impl TextureSystem {
    pub fn new(cfg: AtlasConfig) -> Result<Self> {
        Ok(Self {
            manager: TextureAtlasManager::new(cfg)?,
            prebaked: Vec::new(),
            prebaked_index: HashMap::new(),
            animations: BTreeMap::new(),
        })
    }

    /// Registers an already-baked atlas. Re-registering a name replaces the old atlas.
    /// Every frame must lie inside the image.
    pub fn register_atlas<I>(&mut self, name: &str, image: Arc<RgbaImage>, frames: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Rect)>,
    {
        let bounds = Rect::new(0, 0, image.width(), image.height());
        let mut regions = HashMap::new();
        for (id, rect) in frames {
            if rect.w == 0 || rect.h == 0 || !bounds.contains(&rect) {
                return Err(PsdPackerError::InvalidConfig(format!(
                    "frame '{id}' ({},{} {}x{}) lies outside atlas '{name}' ({}x{})",
                    rect.x, rect.y, rect.w, rect.h, bounds.w, bounds.h
                )));
            }
            regions.insert(id, Arc::new(TextureRegion::sub_image(Arc::clone(&image), rect)));
        }

        self.remove_atlas(name);
        debug!(atlas = name, frames = regions.len(), "registered pre-baked atlas");
        self.prebaked.push(PrebakedAtlas {
            name: name.to_string(),
            image,
            frames: regions,
        });
        self.rebuild_index();
        Ok(())
    }

    /// Registers every atlas image of an exported spritesheet, in descriptor order, along
    /// with its animation frame lists. Atlases are named after their image filenames.
    pub fn register_spritesheet(
        &mut self,
        descriptor: &SpritesheetDescriptor,
        images: Vec<Arc<RgbaImage>>,
    ) -> Result<()> {
        if images.len() != descriptor.meta.images.len() {
            return Err(PsdPackerError::InvalidConfig(format!(
                "descriptor lists {} atlas images but {} were supplied",
                descriptor.meta.images.len(),
                images.len()
            )));
        }
        for (index, (meta, image)) in descriptor.meta.images.iter().zip(images).enumerate() {
            if (image.width(), image.height()) != (meta.size.w, meta.size.h) {
                warn!(
                    atlas = %meta.filename,
                    expected_w = meta.size.w,
                    expected_h = meta.size.h,
                    w = image.width(),
                    h = image.height(),
                    "atlas image size differs from descriptor"
                );
            }
            let frames = descriptor
                .frames_on_atlas(index)
                .map(|f| (f.filename.clone(), f.frame));
            self.register_atlas(&meta.filename, image, frames)?;
        }
        for (name, frames) in &descriptor.animations {
            self.animations.insert(name.clone(), frames.clone());
        }
        Ok(())
    }

    /// Unregisters a pre-baked atlas. Returns false if no atlas had that name.
    pub fn remove_atlas(&mut self, name: &str) -> bool {
        let before = self.prebaked.len();
        self.prebaked.retain(|a| a.name != name);
        let removed = self.prebaked.len() != before;
        if removed {
            self.rebuild_index();
        }
        removed
    }

    fn rebuild_index(&mut self) {
        self.prebaked_index.clear();
        for atlas in &self.prebaked {
            for (id, region) in &atlas.frames {
                self.prebaked_index
                    .entry(id.clone())
                    .or_insert_with(|| Arc::clone(region));
            }
        }
    }

    /// Packs a texture into the default atlas group.
    pub fn add_texture(&mut self, id: &str, image: Arc<RgbaImage>) -> Option<Arc<TextureRegion>> {
        self.manager.add(id, image)
    }

    /// Packs a texture into a named atlas group.
    pub fn add_texture_to_group(
        &mut self,
        group: &str,
        id: &str,
        image: Arc<RgbaImage>,
    ) -> Option<Arc<TextureRegion>> {
        self.manager.add_to_named_atlas(group, id, image)
    }

    pub fn get_texture(&self, id: &str) -> Option<&Arc<TextureRegion>> {
        self.prebaked_index
            .get(id)
            .or_else(|| self.manager.get(id))
    }

    pub fn has_texture(&self, id: &str) -> bool {
        self.get_texture(id).is_some()
    }

    /// Regions of an animation registered through [`register_spritesheet`](Self::register_spritesheet),
    /// in playback order. Frames that no longer resolve are skipped.
    pub fn animation_frames(&self, name: &str) -> Option<Vec<Arc<TextureRegion>>> {
        let ids = self.animations.get(name)?;
        Some(
            ids.iter()
                .filter_map(|id| self.get_texture(id).cloned())
                .collect(),
        )
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.animations.keys().map(String::as_str)
    }

    /// Pixels backing a region from either source.
    pub fn region_image<'a>(&'a self, region: &'a TextureRegion) -> Option<&'a RgbaImage> {
        match region.source() {
            RegionSource::Image(img) => Some(img.as_ref()),
            RegionSource::Atlas { .. } => self.manager.region_image(region),
        }
    }

    pub fn prebaked_atlases(&self) -> &[PrebakedAtlas] {
        &self.prebaked
    }

    /// Packed atlases that need re-uploading.
    pub fn dirty_atlases(&self) -> impl Iterator<Item = &TextureAtlas> {
        self.manager.dirty_atlases()
    }

    pub fn mark_all_clean(&mut self) {
        self.manager.mark_all_clean();
    }

    pub fn manager(&self) -> &TextureAtlasManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut TextureAtlasManager {
        &mut self.manager
    }

    /// Drops pre-baked atlases, animations and every packed texture.
    pub fn clear(&mut self) {
        self.prebaked.clear();
        self.prebaked_index.clear();
        self.animations.clear();
        self.manager.clear();
    }
}
