//! Minimal big-endian PSD/PSB writer for building decoder fixtures in-test.
#![allow(dead_code)]

use psd_packer_core::psd::encode_packbits;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Normal,
    Open,
    End,
}

#[derive(Clone, Debug)]
pub struct LayerSpec {
    pub name: String,
    pub unicode_name: Option<String>,
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub kind: Kind,
    pub visible: bool,
    /// (channel id, plane bytes, compression code)
    pub channels: Vec<(i16, Vec<u8>, u16)>,
}

impl LayerSpec {
    /// Solid-colour layer with R, G, B and alpha planes, stored raw.
    pub fn solid(name: &str, left: i32, top: i32, w: u32, h: u32, rgba: [u8; 4]) -> Self {
        let n = (w * h) as usize;
        Self {
            name: name.into(),
            unicode_name: None,
            top,
            left,
            bottom: top + h as i32,
            right: left + w as i32,
            kind: Kind::Normal,
            visible: true,
            channels: vec![
                (-1, vec![rgba[3]; n], 0),
                (0, vec![rgba[0]; n], 0),
                (1, vec![rgba[1]; n], 0),
                (2, vec![rgba[2]; n], 0),
            ],
        }
    }

    pub fn group_open(name: &str) -> Self {
        Self::marker(name, Kind::Open)
    }

    pub fn group_end() -> Self {
        Self::marker("</Layer group>", Kind::End)
    }

    fn marker(name: &str, kind: Kind) -> Self {
        Self {
            name: name.into(),
            unicode_name: None,
            top: 0,
            left: 0,
            bottom: 0,
            right: 0,
            kind,
            visible: true,
            channels: vec![
                (-1, Vec::new(), 0),
                (0, Vec::new(), 0),
                (1, Vec::new(), 0),
                (2, Vec::new(), 0),
            ],
        }
    }

    /// Switches every channel to the given compression code.
    pub fn compression(mut self, code: u16) -> Self {
        for ch in &mut self.channels {
            ch.2 = code;
        }
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_channels(mut self, channels: Vec<(i16, Vec<u8>, u16)>) -> Self {
        self.channels = channels;
        self
    }

    /// Overrides the bounding box without touching the channel data.
    pub fn bounds(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        (self.left, self.top, self.right, self.bottom) = (left, top, right, bottom);
        self
    }

    pub fn with_unicode_name(mut self, name: &str) -> Self {
        self.unicode_name = Some(name.into());
        self
    }

    fn width(&self) -> usize {
        (self.right as i64 - self.left as i64).max(0) as usize
    }

    fn height(&self) -> usize {
        (self.bottom as i64 - self.top as i64).max(0) as usize
    }
}

/// Layers of an animation group in file order (bottom-to-top): end marker, frames, opener.
/// `frames` are given top-to-bottom as they appear in the Photoshop layers panel.
pub fn group(name: &str, frames: Vec<LayerSpec>) -> Vec<LayerSpec> {
    let mut out = vec![LayerSpec::group_end()];
    out.extend(frames.into_iter().rev());
    out.push(LayerSpec::group_open(name));
    out
}

pub struct PsdBuilder {
    pub version: u16,
    pub width: u32,
    pub height: u32,
    pub depth: u16,
    pub color_mode: u16,
    /// Bottom-to-top, as stored in the file.
    pub layers: Vec<LayerSpec>,
    pub negative_count: bool,
}

impl PsdBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            version: 1,
            width,
            height,
            depth: 8,
            color_mode: 3,
            layers: Vec::new(),
            negative_count: false,
        }
    }

    pub fn psb(mut self) -> Self {
        self.version = 2;
        self
    }

    pub fn depth(mut self, depth: u16) -> Self {
        self.depth = depth;
        self
    }

    pub fn color_mode(mut self, mode: u16) -> Self {
        self.color_mode = mode;
        self
    }

    pub fn layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layers(mut self, layers: Vec<LayerSpec>) -> Self {
        self.layers.extend(layers);
        self
    }

    fn wide(&self) -> bool {
        self.version == 2
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"8BPS");
        put_u16(&mut out, self.version);
        out.extend_from_slice(&[0; 6]);
        put_u16(&mut out, 4);
        put_u32(&mut out, self.height);
        put_u32(&mut out, self.width);
        put_u16(&mut out, self.depth);
        put_u16(&mut out, self.color_mode);
        put_u32(&mut out, 0); // color mode data
        put_u32(&mut out, 0); // image resources

        if self.layers.is_empty() {
            self.put_len(&mut out, 0);
        } else {
            let info = self.layer_info();
            let mut section = Vec::new();
            self.put_len(&mut section, info.len());
            section.extend_from_slice(&info);
            put_u32(&mut section, 0); // global layer mask
            self.put_len(&mut out, section.len());
            out.extend_from_slice(&section);
        }

        put_u16(&mut out, 0); // merged image data, raw
        out
    }

    fn layer_info(&self) -> Vec<u8> {
        let mut info = Vec::new();
        let count = self.layers.len() as i16;
        put_i16(&mut info, if self.negative_count { -count } else { count });

        let encoded: Vec<Vec<Vec<u8>>> = self
            .layers
            .iter()
            .map(|l| {
                l.channels
                    .iter()
                    .map(|(_, plane, code)| self.encode_channel(l, plane, *code))
                    .collect()
            })
            .collect();

        for (layer, channels) in self.layers.iter().zip(&encoded) {
            put_i32(&mut info, layer.top);
            put_i32(&mut info, layer.left);
            put_i32(&mut info, layer.bottom);
            put_i32(&mut info, layer.right);
            put_u16(&mut info, layer.channels.len() as u16);
            for ((id, _, _), data) in layer.channels.iter().zip(channels) {
                put_i16(&mut info, *id);
                self.put_len(&mut info, data.len());
            }
            info.extend_from_slice(b"8BIMnorm");
            info.push(255);
            info.push(0);
            info.push(if layer.visible { 0 } else { 2 });
            info.push(0);

            let extra = extra_data(layer);
            put_u32(&mut info, extra.len() as u32);
            info.extend_from_slice(&extra);
        }

        for channels in &encoded {
            for data in channels {
                info.extend_from_slice(data);
            }
        }
        info
    }

    fn encode_channel(&self, layer: &LayerSpec, plane: &[u8], code: u16) -> Vec<u8> {
        let mut out = Vec::new();
        put_u16(&mut out, code);
        let (w, h) = (layer.width(), layer.height());
        if w == 0 || h == 0 {
            return out;
        }
        let bps = (self.depth as usize / 8).max(1);
        match code {
            1 => {
                let rows: Vec<Vec<u8>> = plane
                    .chunks(w * bps)
                    .map(encode_packbits)
                    .collect();
                for row in &rows {
                    if self.wide() {
                        put_u32(&mut out, row.len() as u32);
                    } else {
                        put_u16(&mut out, row.len() as u16);
                    }
                }
                for row in rows {
                    out.extend_from_slice(&row);
                }
            }
            _ => out.extend_from_slice(plane),
        }
        out
    }

    fn put_len(&self, out: &mut Vec<u8>, len: usize) {
        if self.wide() {
            out.extend_from_slice(&(len as u64).to_be_bytes());
        } else {
            put_u32(out, len as u32);
        }
    }
}

fn extra_data(layer: &LayerSpec) -> Vec<u8> {
    let mut extra = Vec::new();
    put_u32(&mut extra, 0); // layer mask
    put_u32(&mut extra, 0); // blending ranges
    let name = layer.name.as_bytes();
    extra.push(name.len() as u8);
    extra.extend_from_slice(name);
    while (extra.len() - 8) % 4 != 0 {
        extra.push(0);
    }

    let divider = match layer.kind {
        Kind::Normal => None,
        Kind::Open => Some(1u32),
        Kind::End => Some(3u32),
    };
    if let Some(t) = divider {
        extra.extend_from_slice(b"8BIMlsct");
        put_u32(&mut extra, 4);
        put_u32(&mut extra, t);
    }
    if let Some(uni) = &layer.unicode_name {
        let units: Vec<u16> = uni.encode_utf16().collect();
        let mut block = Vec::new();
        put_u32(&mut block, units.len() as u32);
        for u in units {
            put_u16(&mut block, u);
        }
        extra.extend_from_slice(b"8BIMluni");
        put_u32(&mut extra, block.len() as u32);
        extra.extend_from_slice(&block);
    }
    extra
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}
