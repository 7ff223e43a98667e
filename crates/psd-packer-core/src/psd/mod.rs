//! PSD / PSB decoding.
//!
//! [`decode`] reads the header, skips the color-mode and image-resource blocks,
//! then reads the layer records followed by their channel image data (PSD stores
//! the two back to back, so every record is buffered before any pixels are read).
//! The flat layer list is kept bottom-to-top as in the file; [`PsdDocument::tree`]
//! is the reconstructed group hierarchy, listed top-to-bottom.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::animation::{Frame, extract_animations};
use crate::error::{PsdPackerError, Result};
use crate::reader::BinaryReader;

pub mod rle;
pub mod tree;

pub use rle::{decode_rle, encode_packbits};
pub use tree::{LayerNode, build_layer_tree};

const SIGNATURE: &[u8; 4] = b"8BPS";

/// Tagged blocks whose length field is 8 bytes wide in PSB documents.
const PSB_LONG_KEYS: [&str; 13] = [
    "LMsk", "Lr16", "Lr32", "Layr", "Mt16", "Mt32", "Mtrn", "Alph", "FMsk", "lnk2", "FEid", "FXid",
    "PxSD",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsdVersion {
    /// Version 1, regular Photoshop document.
    Psd,
    /// Version 2, large document format.
    Psb,
}

impl PsdVersion {
    fn is_wide(self) -> bool {
        matches!(self, PsdVersion::Psb)
    }

    /// Largest width or height the format allows.
    pub fn max_dimension(self) -> u32 {
        match self {
            PsdVersion::Psd => 30_000,
            PsdVersion::Psb => 300_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Bitmap,
    Grayscale,
    Indexed,
    Rgb,
    Cmyk,
    Multichannel,
    Duotone,
    Lab,
}

impl ColorMode {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => Self::Bitmap,
            1 => Self::Grayscale,
            2 => Self::Indexed,
            3 => Self::Rgb,
            4 => Self::Cmyk,
            7 => Self::Multichannel,
            8 => Self::Duotone,
            9 => Self::Lab,
            _ => return None,
        })
    }
}

/// File header. PSD stores height before width; the fields here are named, not ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsdHeader {
    pub version: PsdVersion,
    pub channels: u16,
    pub width: u32,
    pub height: u32,
    /// Bits per channel (1, 8, 16 or 32).
    pub depth: u16,
    pub color_mode: ColorMode,
}

/// Channel descriptor from a layer record. Id `-1` is alpha, `0/1/2` are R/G/B,
/// `-2` and below are masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: i16,
    pub data_length: usize,
}

/// What a layer record represents in the group structure (from the `lsct`/`lsdk` block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerKind {
    #[default]
    Normal,
    /// Opening record of a group; carries the group's name. `collapsed` is divider type 2.
    GroupOpen { collapsed: bool },
    /// Hidden bounding marker closing the innermost open group.
    GroupEnd,
}

impl LayerKind {
    fn from_divider(kind: u32) -> Self {
        match kind {
            1 => LayerKind::GroupOpen { collapsed: false },
            2 => LayerKind::GroupOpen { collapsed: true },
            3 => LayerKind::GroupEnd,
            _ => LayerKind::Normal,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayerRecord {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub channels: Vec<ChannelInfo>,
    /// Four-character blend key, e.g. `norm`, `mul `.
    pub blend_mode: String,
    pub opacity: u8,
    pub clipping: u8,
    pub flags: u8,
    pub visible: bool,
    pub name: String,
    pub kind: LayerKind,
    /// Decoded planes, one byte per pixel, `width * height` long. Channels that used an
    /// unsupported compression are absent.
    pub channel_data: BTreeMap<i16, Vec<u8>>,
}

impl LayerRecord {
    pub fn width(&self) -> u32 {
        (self.right as i64 - self.left as i64).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom as i64 - self.top as i64).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, LayerKind::GroupOpen { .. })
    }

    pub fn is_group_end(&self) -> bool {
        matches!(self.kind, LayerKind::GroupEnd)
    }

    pub fn channel(&self, id: i16) -> Option<&[u8]> {
        self.channel_data.get(&id).map(Vec::as_slice)
    }
}

/// A decoded document. Immutable once returned from [`decode`].
#[derive(Debug, Clone)]
pub struct PsdDocument {
    pub header: PsdHeader,
    /// Flat layer list, bottom-to-top (file order).
    pub layers: Vec<Arc<LayerRecord>>,
    /// Group hierarchy, top-to-bottom.
    pub tree: Vec<LayerNode>,
    /// Animation name -> frames in ascending frame-number order.
    pub animations: BTreeMap<String, Vec<Frame>>,
    /// Animation names in the order their groups appear, top-to-bottom.
    pub animation_order: Vec<String>,
}

impl PsdDocument {
    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Topmost layer (non-group) with the given name.
    pub fn layer_by_name(&self, name: &str) -> Option<&Arc<LayerRecord>> {
        self.layers
            .iter()
            .rev()
            .find(|l| l.kind == LayerKind::Normal && l.name == name)
    }

    /// Animations in layer-tree order rather than name order.
    pub fn animations_in_tree_order(&self) -> impl Iterator<Item = (&str, &[Frame])> {
        self.animation_order
            .iter()
            .filter_map(|name| Some((name.as_str(), self.animations.get(name)?.as_slice())))
    }
}

/// Decodes a PSD/PSB buffer.
///
/// Fails with [`PsdPackerError::InvalidSignature`] when the file does not start with
/// `8BPS`, and [`PsdPackerError::UnsupportedVersion`] for versions other than 1 and 2.
#[instrument(skip_all, fields(len = data.len()))]
pub fn decode(data: &[u8]) -> Result<PsdDocument> {
    let mut r = BinaryReader::new(data);
    let header = read_header(&mut r)?;
    debug!(?header, "psd header");

    let color_data_len = r.read_u32()? as usize;
    r.skip(color_data_len)?;
    let resources_len = r.read_u32()? as usize;
    r.skip(resources_len)?;

    let layers: Vec<Arc<LayerRecord>> = read_layer_section(&mut r, &header)?
        .into_iter()
        .map(Arc::new)
        .collect();
    let tree = build_layer_tree(&layers);
    let extracted = extract_animations(&tree, header.width, header.height);
    let animation_order: Vec<String> = extracted.iter().map(|(name, _)| name.clone()).collect();
    let animations: BTreeMap<String, Vec<Frame>> = extracted.into_iter().collect();
    debug!(
        layers = layers.len(),
        animations = animations.len(),
        "psd decoded"
    );

    Ok(PsdDocument {
        header,
        layers,
        tree,
        animations,
        animation_order,
    })
}

fn read_header(r: &mut BinaryReader) -> Result<PsdHeader> {
    let signature: [u8; 4] = r.read_array()?;
    if &signature != SIGNATURE {
        return Err(PsdPackerError::InvalidSignature(signature));
    }
    let version = match r.read_u16()? {
        1 => PsdVersion::Psd,
        2 => PsdVersion::Psb,
        v => return Err(PsdPackerError::UnsupportedVersion(v)),
    };
    r.skip(6)?;
    let channels = r.read_u16()?;
    let height = r.read_u32()?;
    let width = r.read_u32()?;
    let depth = r.read_u16()?;
    let mode = r.read_u16()?;
    if width > version.max_dimension() || height > version.max_dimension() {
        return Err(PsdPackerError::InvalidDimensions { width, height });
    }
    let color_mode = ColorMode::from_code(mode)
        .ok_or_else(|| PsdPackerError::Format(format!("unknown color mode {mode}")))?;
    Ok(PsdHeader {
        version,
        channels,
        width,
        height,
        depth,
        color_mode,
    })
}

fn read_layer_section(r: &mut BinaryReader, header: &PsdHeader) -> Result<Vec<LayerRecord>> {
    let wide = header.version.is_wide();
    let section_len = r.read_length(wide)?;
    if section_len == 0 {
        return Ok(Vec::new());
    }
    let section_end = end_offset(r, section_len)?;

    let info_len = r.read_length(wide)?;
    if info_len == 0 {
        r.seek(section_end)?;
        return Ok(Vec::new());
    }

    let raw_count = r.read_i16()?;
    if raw_count < 0 {
        debug!("negative layer count: first alpha channel holds merged transparency");
    }
    let count = raw_count.unsigned_abs() as usize;

    let mut layers = Vec::with_capacity(count);
    for index in 0..count {
        layers.push(read_layer_record(r, wide, index)?);
    }
    for layer in &mut layers {
        layer.channel_data = read_channel_planes(r, layer, header)?;
    }

    r.seek(section_end)?;
    Ok(layers)
}

fn read_layer_record(r: &mut BinaryReader, wide: bool, index: usize) -> Result<LayerRecord> {
    let top = r.read_i32()?;
    let left = r.read_i32()?;
    let bottom = r.read_i32()?;
    let right = r.read_i32()?;

    let channel_count = r.read_u16()? as usize;
    let mut channels = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        let id = r.read_i16()?;
        let data_length = r.read_length(wide)?;
        channels.push(ChannelInfo { id, data_length });
    }

    let blend_sig: [u8; 4] = r.read_array()?;
    if &blend_sig != b"8BIM" && &blend_sig != b"8B64" {
        return Err(PsdPackerError::Format(format!(
            "layer {index}: bad blend mode signature {blend_sig:?}"
        )));
    }
    let blend_mode = r.read_string(4)?;
    let opacity = r.read_u8()?;
    let clipping = r.read_u8()?;
    let flags = r.read_u8()?;
    r.skip(1)?;

    let extra_len = r.read_u32()? as usize;
    let extra_end = end_offset(r, extra_len)?;

    let mask_len = r.read_u32()? as usize;
    r.skip(mask_len)?;
    let ranges_len = r.read_u32()? as usize;
    r.skip(ranges_len)?;

    // Pascal string, padded so that length byte + text is a multiple of 4.
    let name_len = r.read_u8()? as usize;
    let mut name = r.read_string(name_len)?;
    let padded = (name_len + 1).div_ceil(4) * 4;
    r.skip(padded - name_len - 1)?;

    let mut kind = LayerKind::Normal;
    while r.position() + 12 <= extra_end {
        let sig: [u8; 4] = r.read_array()?;
        if &sig != b"8BIM" && &sig != b"8B64" {
            break;
        }
        let key = r.read_string(4)?;
        let len = r.read_length(wide && PSB_LONG_KEYS.contains(&key.as_str()))?;
        let start = r.position();
        match key.as_str() {
            "lsct" | "lsdk" if len >= 4 => kind = LayerKind::from_divider(r.read_u32()?),
            "luni" if len >= 4 => {
                let unicode = read_unicode_string(r)?;
                if !unicode.is_empty() {
                    name = unicode;
                }
            }
            _ => {}
        }
        let next = start
            .checked_add(len + (len & 1))
            .ok_or_else(|| PsdPackerError::Format(format!("layer {index}: block length overflow")))?;
        if next > extra_end {
            break;
        }
        r.seek(next)?;
    }
    r.seek(extra_end)?;

    Ok(LayerRecord {
        top,
        left,
        bottom,
        right,
        channels,
        blend_mode,
        opacity,
        clipping,
        flags,
        visible: flags & 0x02 == 0,
        name,
        kind,
        channel_data: BTreeMap::new(),
    })
}

fn read_unicode_string(r: &mut BinaryReader) -> Result<String> {
    let count = r.read_u32()? as usize;
    if count.saturating_mul(2) > r.remaining() {
        return Err(PsdPackerError::UnexpectedEof {
            offset: r.position(),
            needed: count * 2 - r.remaining(),
        });
    }
    let mut units = Vec::with_capacity(count);
    for _ in 0..count {
        units.push(r.read_u16()?);
    }
    Ok(String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string())
}

fn read_channel_planes(
    r: &mut BinaryReader,
    layer: &LayerRecord,
    header: &PsdHeader,
) -> Result<BTreeMap<i16, Vec<u8>>> {
    let wide = header.version.is_wide();
    let h = layer.height() as usize;
    let mut planes = BTreeMap::new();

    for ch in &layer.channels {
        let end = end_offset(r, ch.data_length)?;
        // Zero-area layers and masks (own bounds) are skipped by length.
        if layer.is_empty() || ch.id < -1 || ch.data_length < 2 {
            r.seek(end)?;
            continue;
        }
        let sizes = PlaneSizes::new(layer, header.depth)?;
        let payload = ch.data_length - 2;
        let compression = r.read_u16()?;
        let plane = match compression {
            0 => {
                if payload < sizes.plane_len {
                    return Err(too_short(layer, ch.id, payload, sizes.plane_len));
                }
                Some(r.read_bytes(payload)?.to_vec())
            }
            1 => {
                let count_width = if wide { 4 } else { 2 };
                let table = h
                    .checked_mul(count_width)
                    .ok_or_else(|| bounds_overflow(layer))?;
                // A two-byte PackBits packet expands to at most 128 bytes.
                let need = table.saturating_add(sizes.plane_len.div_ceil(64));
                if payload < need {
                    return Err(too_short(layer, ch.id, payload, need));
                }
                let mut counts = Vec::with_capacity(h);
                for _ in 0..h {
                    counts.push(if wide {
                        r.read_u32()? as usize
                    } else {
                        r.read_u16()? as usize
                    });
                }
                let mut out = Vec::with_capacity(sizes.plane_len);
                for count in counts {
                    out.extend(decode_rle(r.read_bytes(count)?, sizes.row_len));
                }
                Some(out)
            }
            other => {
                warn!(
                    layer = %layer.name,
                    channel = ch.id,
                    compression = other,
                    "unsupported channel compression; channel left empty"
                );
                None
            }
        };
        r.seek(end)?;
        if let Some(plane) = plane {
            planes.insert(ch.id, to_8bit(&plane, header.depth, sizes.pixels));
        }
    }

    if header.color_mode == ColorMode::Grayscale {
        if let Some(gray) = planes.get(&0).cloned() {
            planes.entry(1).or_insert_with(|| gray.clone());
            planes.entry(2).or_insert(gray);
        }
    }
    Ok(planes)
}

/// Byte counts implied by a layer's bounds, checked against `usize` overflow.
struct PlaneSizes {
    pixels: usize,
    row_len: usize,
    plane_len: usize,
}

impl PlaneSizes {
    fn new(layer: &LayerRecord, depth: u16) -> Result<Self> {
        let (w, h) = (layer.width() as usize, layer.height() as usize);
        let pixels = w.checked_mul(h).ok_or_else(|| bounds_overflow(layer))?;
        let row_len = w
            .checked_mul(bytes_per_sample(depth))
            .ok_or_else(|| bounds_overflow(layer))?;
        let plane_len = row_len
            .checked_mul(h)
            .ok_or_else(|| bounds_overflow(layer))?;
        Ok(Self {
            pixels,
            row_len,
            plane_len,
        })
    }
}

fn bounds_overflow(layer: &LayerRecord) -> PsdPackerError {
    PsdPackerError::Format(format!(
        "layer {:?}: bounds {}x{} overflow the plane size",
        layer.name,
        layer.width(),
        layer.height()
    ))
}

fn too_short(layer: &LayerRecord, channel: i16, have: usize, need: usize) -> PsdPackerError {
    PsdPackerError::Format(format!(
        "layer {:?} channel {channel}: {have} bytes of data cannot hold its {}x{} plane (needs {need})",
        layer.name,
        layer.width(),
        layer.height()
    ))
}

fn bytes_per_sample(depth: u16) -> usize {
    match depth {
        16 => 2,
        32 => 4,
        _ => 1,
    }
}

/// Normalizes a decoded plane to one byte per pixel, zero-padded to `pixels`.
fn to_8bit(plane: &[u8], depth: u16, pixels: usize) -> Vec<u8> {
    let mut out: Vec<u8> = match depth {
        16 => plane.chunks_exact(2).map(|s| s[0]).collect(),
        32 => plane
            .chunks_exact(4)
            .map(|s| {
                let v = f32::from_be_bytes([s[0], s[1], s[2], s[3]]);
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            })
            .collect(),
        _ => plane.to_vec(),
    };
    out.resize(pixels, 0);
    out
}

fn end_offset(r: &BinaryReader, len: usize) -> Result<usize> {
    let end = r
        .position()
        .checked_add(len)
        .ok_or_else(|| PsdPackerError::Format(format!("length {len} overflows")))?;
    if end > r.len() {
        return Err(PsdPackerError::UnexpectedEof {
            offset: r.position(),
            needed: end - r.len(),
        });
    }
    Ok(end)
}
