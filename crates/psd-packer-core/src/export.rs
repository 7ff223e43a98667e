use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PsdPackerError, Result};
use crate::model::{Rect, Size};

/// JSON metadata pairing atlas images with frame rectangles and animation orders.
///
/// Shape: `{ frames: [{ filename, frame, sourceSize, atlas }], animations: { name: [filename] },
/// meta: { app, version, images: [{ filename, size }] } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpritesheetDescriptor {
    pub frames: Vec<DescriptorFrame>,
    pub animations: BTreeMap<String, Vec<String>>,
    pub meta: DescriptorMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DescriptorFrame {
    /// `<anim>/<number>`.
    pub filename: String,
    /// Placement inside the atlas image.
    pub frame: Rect,
    #[serde(rename = "sourceSize")]
    pub source_size: Size,
    /// Index into `meta.images`.
    pub atlas: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DescriptorMeta {
    pub app: String,
    pub version: String,
    pub images: Vec<DescriptorImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DescriptorImage {
    pub filename: String,
    pub size: Size,
}

impl SpritesheetDescriptor {
    /// Frames placed on atlas `index`.
    pub fn frames_on_atlas(&self, index: usize) -> impl Iterator<Item = &DescriptorFrame> {
        self.frames.iter().filter(move |f| f.atlas == index)
    }
}

/// Image filename for atlas `index`: `<base>.png` for a single atlas, `<base>_<index>.png` otherwise.
pub fn atlas_image_filename(base_name: &str, index: usize, atlas_count: usize) -> String {
    if atlas_count == 1 {
        format!("{base_name}.png")
    } else {
        format!("{base_name}_{index}.png")
    }
}

/// Serialize a descriptor as a JSON value.
pub fn to_json(descriptor: &SpritesheetDescriptor) -> Result<Value> {
    serde_json::to_value(descriptor).map_err(|e| PsdPackerError::Encode(e.to_string()))
}

/// Serialize a descriptor as pretty-printed JSON text.
pub fn to_json_string(descriptor: &SpritesheetDescriptor) -> Result<String> {
    serde_json::to_string_pretty(descriptor).map_err(|e| PsdPackerError::Encode(e.to_string()))
}

/// Parse descriptor JSON text.
pub fn from_json_str(json: &str) -> Result<SpritesheetDescriptor> {
    serde_json::from_str(json).map_err(|e| PsdPackerError::Descriptor(e.to_string()))
}
