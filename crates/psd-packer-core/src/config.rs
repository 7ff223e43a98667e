use serde::{Deserialize, Serialize};

use crate::error::{PsdPackerError, Result};

/// Largest atlas edge the spritesheet export produces.
pub const MAX_ATLAS_SIZE: u32 = 4096;

/// Runtime atlas manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Edge length of each (square) atlas in pixels.
    #[serde(default = "default_runtime_atlas_size")]
    pub atlas_size: u32,
    /// Pixels reserved to the right of and below every region.
    #[serde(default = "default_runtime_padding")]
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            atlas_size: default_runtime_atlas_size(),
            padding: default_runtime_padding(),
        }
    }
}

impl AtlasConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        validate_size(self.atlas_size, self.padding)
    }

    /// Create a fluent builder for `AtlasConfig`.
    pub fn builder() -> AtlasConfigBuilder {
        AtlasConfigBuilder::new()
    }
}

/// Offline spritesheet export configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpritesheetConfig {
    /// Atlas width, and the cap for the power-of-two atlas height. At most 4096.
    #[serde(default = "default_export_atlas_size")]
    pub atlas_size: u32,
    /// Pixels between frames.
    #[serde(default)]
    pub padding: u32,
    /// Uniform frame size `(w, h)`. `None` (or the document size) keeps frames unscaled.
    #[serde(default)]
    pub resolution: Option<(u32, u32)>,
    /// Nearest-neighbor resampling when resizing (bilinear otherwise).
    #[serde(default = "default_nearest_neighbor")]
    pub nearest_neighbor: bool,
    /// Output base name: `<base>.png` or `<base>_<index>.png`.
    #[serde(default = "default_base_name")]
    pub base_name: String,
}

impl Default for SpritesheetConfig {
    fn default() -> Self {
        Self {
            atlas_size: default_export_atlas_size(),
            padding: 0,
            resolution: None,
            nearest_neighbor: default_nearest_neighbor(),
            base_name: default_base_name(),
        }
    }
}

impl SpritesheetConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - the atlas size is zero or larger than 4096
    /// - padding leaves no usable space
    /// - the target resolution has a zero edge
    /// - the base name is empty
    pub fn validate(&self) -> Result<()> {
        validate_size(self.atlas_size, self.padding)?;
        if self.atlas_size > MAX_ATLAS_SIZE {
            return Err(PsdPackerError::InvalidConfig(format!(
                "atlas_size ({}) exceeds {}",
                self.atlas_size, MAX_ATLAS_SIZE
            )));
        }
        if let Some((w, h)) = self.resolution {
            if w == 0 || h == 0 {
                return Err(PsdPackerError::InvalidDimensions {
                    width: w,
                    height: h,
                });
            }
        }
        if self.base_name.trim().is_empty() {
            return Err(PsdPackerError::InvalidConfig("base_name is empty".into()));
        }
        Ok(())
    }

    /// Create a fluent builder for `SpritesheetConfig`.
    pub fn builder() -> SpritesheetConfigBuilder {
        SpritesheetConfigBuilder::new()
    }
}

fn validate_size(atlas_size: u32, padding: u32) -> Result<()> {
    if atlas_size == 0 {
        return Err(PsdPackerError::InvalidDimensions {
            width: atlas_size,
            height: atlas_size,
        });
    }
    if padding >= atlas_size {
        return Err(PsdPackerError::InvalidConfig(format!(
            "padding ({}) leaves no usable space in a {}x{} atlas",
            padding, atlas_size, atlas_size
        )));
    }
    Ok(())
}

fn default_runtime_atlas_size() -> u32 {
    2048
}
fn default_runtime_padding() -> u32 {
    1
}
fn default_export_atlas_size() -> u32 {
    MAX_ATLAS_SIZE
}
fn default_nearest_neighbor() -> bool {
    true
}
fn default_base_name() -> String {
    "spritesheet".into()
}

/// Builder for `AtlasConfig`.
#[derive(Debug, Default, Clone)]
pub struct AtlasConfigBuilder {
    cfg: AtlasConfig,
}

impl AtlasConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: AtlasConfig::default(),
        }
    }
    pub fn atlas_size(mut self, v: u32) -> Self {
        self.cfg.atlas_size = v;
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn build(self) -> AtlasConfig {
        self.cfg
    }
}

/// Builder for `SpritesheetConfig`.
#[derive(Debug, Default, Clone)]
pub struct SpritesheetConfigBuilder {
    cfg: SpritesheetConfig,
}

impl SpritesheetConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: SpritesheetConfig::default(),
        }
    }
    pub fn atlas_size(mut self, v: u32) -> Self {
        self.cfg.atlas_size = v;
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn resolution(mut self, v: Option<(u32, u32)>) -> Self {
        self.cfg.resolution = v;
        self
    }
    pub fn nearest_neighbor(mut self, v: bool) -> Self {
        self.cfg.nearest_neighbor = v;
        self
    }
    pub fn base_name(mut self, v: impl Into<String>) -> Self {
        self.cfg.base_name = v.into();
        self
    }
    pub fn build(self) -> SpritesheetConfig {
        self.cfg
    }
}
