use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::config::AtlasConfig;
use crate::error::Result;
use crate::packer::ShelfPacker;
use crate::runtime_atlas::{RegionSource, TextureAtlas, TextureRegion};

/// Groups runtime atlases by name and routes images into them.
///
/// Ids are unique across the whole manager: adding an id that already exists returns
/// the original region. Images larger than an atlas are kept whole as standalone regions.
/// Atlases are created on overflow and never shared between groups.
pub struct TextureAtlasManager {
    cfg: AtlasConfig,
    atlases: Vec<TextureAtlas>,
    default_group: Vec<usize>,
    groups: HashMap<String, Vec<usize>>,
    regions: HashMap<String, Arc<TextureRegion>>,
    standalone: usize,
}

impl TextureAtlasManager {
    pub fn new(cfg: AtlasConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            atlases: Vec::new(),
            default_group: Vec::new(),
            groups: HashMap::new(),
            regions: HashMap::new(),
            standalone: 0,
        })
    }

    /// Adds `image` to the default group.
    pub fn add(&mut self, id: &str, image: Arc<RgbaImage>) -> Option<Arc<TextureRegion>> {
        self.add_to_group(None, id, image)
    }

    /// Adds `image` to the atlases of `group`, creating the group on first use.
    pub fn add_to_named_atlas(
        &mut self,
        group: &str,
        id: &str,
        image: Arc<RgbaImage>,
    ) -> Option<Arc<TextureRegion>> {
        self.add_to_group(Some(group), id, image)
    }

    fn add_to_group(
        &mut self,
        group: Option<&str>,
        id: &str,
        image: Arc<RgbaImage>,
    ) -> Option<Arc<TextureRegion>> {
        if let Some(region) = self.regions.get(id) {
            return Some(Arc::clone(region));
        }
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            warn!(id, w, h, "rejecting empty image");
            return None;
        }

        let size = self.cfg.atlas_size;
        if w > size || h > size || !ShelfPacker::new(size, size, self.cfg.padding).can_fit(w, h)
        {
            debug!(id, w, h, atlas_size = size, "oversized image kept standalone");
            let region = Arc::new(TextureRegion::standalone(image));
            self.regions.insert(id.to_string(), Arc::clone(&region));
            self.standalone += 1;
            return Some(region);
        }

        let candidates = self.group_indices(group).to_vec();
        for idx in candidates {
            let atlas = &mut self.atlases[idx];
            if !atlas.can_fit(w, h) {
                continue;
            }
            if let Some(region) = atlas.add(id, &image) {
                self.regions.insert(id.to_string(), Arc::clone(&region));
                return Some(region);
            }
        }

        let index = self.atlases.len();
        let mut atlas = TextureAtlas::new(index, size, size, self.cfg.padding);
        let region = atlas.add(id, &image)?;
        debug!(index, group = group.unwrap_or("<default>"), "created atlas");
        self.atlases.push(atlas);
        match group {
            Some(name) => self.groups.entry(name.to_string()).or_default().push(index),
            None => self.default_group.push(index),
        }
        self.regions.insert(id.to_string(), Arc::clone(&region));
        Some(region)
    }

    fn group_indices(&self, group: Option<&str>) -> &[usize] {
        match group {
            Some(name) => self.groups.get(name).map(Vec::as_slice).unwrap_or(&[]),
            None => &self.default_group,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<TextureRegion>> {
        self.regions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.regions.contains_key(id)
    }

    /// Pixels backing `region`: its atlas canvas or its standalone image.
    pub fn region_image<'a>(&'a self, region: &'a TextureRegion) -> Option<&'a RgbaImage> {
        match region.source() {
            RegionSource::Atlas { index, .. } => self.atlases.get(*index).map(TextureAtlas::canvas),
            RegionSource::Image(img) => Some(img.as_ref()),
        }
    }

    pub fn atlas_count(&self) -> usize {
        self.atlases.len()
    }

    pub fn atlas(&self, index: usize) -> Option<&TextureAtlas> {
        self.atlases.get(index)
    }

    pub fn atlases(&self) -> &[TextureAtlas] {
        &self.atlases
    }

    /// Atlases of a named group, in creation order.
    pub fn group_atlases(&self, group: &str) -> impl Iterator<Item = &TextureAtlas> {
        self.group_indices(Some(group))
            .iter()
            .map(move |&i| &self.atlases[i])
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Number of registered ids, packed and standalone.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn standalone_count(&self) -> usize {
        self.standalone
    }

    /// Atlases changed since they were last marked clean.
    pub fn dirty_atlases(&self) -> impl Iterator<Item = &TextureAtlas> {
        self.atlases.iter().filter(|a| a.is_dirty())
    }

    pub fn mark_clean(&mut self, index: usize) {
        if let Some(atlas) = self.atlases.get_mut(index) {
            atlas.mark_clean();
        }
    }

    pub fn mark_all_clean(&mut self) {
        for atlas in &mut self.atlases {
            atlas.mark_clean();
        }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.cfg
    }

    /// Drops every atlas, group and region.
    pub fn clear(&mut self) {
        self.atlases.clear();
        self.default_group.clear();
        self.groups.clear();
        self.regions.clear();
        self.standalone = 0;
    }
}
