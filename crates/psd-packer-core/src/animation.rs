//! Animation frames from layer groups named `anim <name>` / `anim-<name>` / `anim - <name>`.
//!
//! Direct layer children whose names start with a decimal number are frames, ordered by
//! that number. Anything else inside the group (reference sketches, guides) is ignored.

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::compositing::create_canvas;
use crate::psd::{LayerNode, LayerRecord};

/// One rasterized animation frame, document-sized with the layer at its own offset.
#[derive(Debug, Clone)]
pub struct Frame {
    /// `<anim_name>/<frame_number>`.
    pub filename: String,
    pub anim_name: String,
    pub frame_number: u32,
    pub image: RgbaImage,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Interleaved RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Returns the animation name if `group_name` follows the animation-group convention
/// (case-insensitive `anim` followed by spaces and/or dashes, then the name).
pub fn animation_name(group_name: &str) -> Option<&str> {
    let prefix = group_name.get(..4)?;
    if !prefix.eq_ignore_ascii_case("anim") {
        return None;
    }
    let rest = &group_name[4..];
    let name = rest.trim_start_matches(|c: char| c == '-' || c.is_whitespace());
    if name.len() == rest.len() {
        return None;
    }
    let name = name.trim_end();
    (!name.is_empty()).then_some(name)
}

/// Leading decimal number of a frame layer name (`"12_run"` -> 12).
pub fn frame_number(layer_name: &str) -> Option<u32> {
    let digits = layer_name
        .find(|c: char| !c.is_ascii_digit())
        .map_or(layer_name, |end| &layer_name[..end]);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Collects animation groups depth-first. A matching group is not descended into, so an
/// animation group nested inside another one is never reported.
pub fn find_animation_groups(tree: &[LayerNode]) -> Vec<&LayerNode> {
    let mut out = Vec::new();
    for node in tree {
        collect_groups(node, &mut out);
    }
    out
}

fn collect_groups<'a>(node: &'a LayerNode, out: &mut Vec<&'a LayerNode>) {
    if !node.is_group() {
        return;
    }
    if animation_name(node.name()).is_some() {
        out.push(node);
        return;
    }
    for child in node.children() {
        collect_groups(child, out);
    }
}

/// Rasterizes the numbered layer children of `group` onto `psd_width x psd_height`
/// canvases, in ascending frame-number order.
pub fn extract_frames_from_group(group: &LayerNode, psd_width: u32, psd_height: u32) -> Vec<Frame> {
    let anim_name = animation_name(group.name()).unwrap_or(group.name()).to_string();

    let mut numbered: Vec<(u32, &LayerRecord)> = group
        .children()
        .iter()
        .filter_map(|child| {
            let layer = child.layer()?;
            match frame_number(&layer.name) {
                Some(n) => Some((n, layer.as_ref())),
                None => {
                    debug!(anim = %anim_name, layer = %layer.name, "skipping non-frame layer");
                    None
                }
            }
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);

    numbered
        .into_iter()
        .map(|(n, layer)| Frame {
            filename: format!("{anim_name}/{n}"),
            anim_name: anim_name.clone(),
            frame_number: n,
            image: composite_layer(layer, psd_width, psd_height),
        })
        .collect()
}

/// Extracts every animation in the tree, in the top-to-bottom order the groups are found.
/// A later group reusing an animation name is skipped.
pub fn extract_animations(
    tree: &[LayerNode],
    psd_width: u32,
    psd_height: u32,
) -> Vec<(String, Vec<Frame>)> {
    let mut out: Vec<(String, Vec<Frame>)> = Vec::new();
    for group in find_animation_groups(tree) {
        let Some(name) = animation_name(group.name()) else {
            continue;
        };
        if out.iter().any(|(seen, _)| seen == name) {
            warn!(anim = name, "duplicate animation group; keeping the first one");
            continue;
        }
        let frames = extract_frames_from_group(group, psd_width, psd_height);
        out.push((name.to_string(), frames));
    }
    out
}

/// Draws a layer's channels onto a transparent `canvas_width x canvas_height` canvas at
/// the layer's offset. Missing R/G/B planes read as 0, a missing alpha plane as 255.
pub fn composite_layer(layer: &LayerRecord, canvas_width: u32, canvas_height: u32) -> RgbaImage {
    let mut canvas = create_canvas(canvas_width, canvas_height);
    if layer.is_empty() {
        return canvas;
    }
    let (lw, lh) = (layer.width() as i64, layer.height() as i64);
    let red = layer.channel(0);
    let green = layer.channel(1);
    let blue = layer.channel(2);
    let alpha = layer.channel(-1);
    let sample = |plane: Option<&[u8]>, idx: usize, missing: u8| {
        plane.map_or(missing, |p| p.get(idx).copied().unwrap_or(0))
    };

    // Only the part of the layer that overlaps the canvas is visited.
    let (top, left) = (layer.top as i64, layer.left as i64);
    let rows = (-top).max(0)..lh.min(canvas_height as i64 - top);
    let cols = (-left).max(0)..lw.min(canvas_width as i64 - left);
    for ly in rows {
        for lx in cols.clone() {
            // Out-of-range indices read as a short plane.
            let idx = ly
                .checked_mul(lw)
                .and_then(|row| row.checked_add(lx))
                .and_then(|i| usize::try_from(i).ok())
                .unwrap_or(usize::MAX);
            canvas.put_pixel(
                (left + lx) as u32,
                (top + ly) as u32,
                Rgba([
                    sample(red, idx, 0),
                    sample(green, idx, 0),
                    sample(blue, idx, 0),
                    sample(alpha, idx, 255),
                ]),
            );
        }
    }
    canvas
}
