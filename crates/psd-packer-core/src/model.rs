use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// Returns true if the two rectangles share any pixel.
    pub fn intersects(&self, r: &Rect) -> bool {
        self.x < r.right() && r.x < self.right() && self.y < r.bottom() && r.y < self.bottom()
    }
    pub fn area(&self) -> u64 {
        (self.w as u64) * (self.h as u64)
    }
}

/// Width/height pair as written in spritesheet descriptors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Statistics about a spritesheet export.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpritesheetStats {
    /// Number of atlas images.
    pub num_atlases: usize,
    /// Number of frames placed.
    pub num_frames: usize,
    /// Frames dropped because they exceed an empty atlas.
    pub num_dropped: usize,
    /// Sum of atlas image areas.
    pub total_atlas_area: u64,
    /// Sum of placed frame areas.
    pub used_frame_area: u64,
    /// used_frame_area / total_atlas_area (0.0 to 1.0).
    pub occupancy: f64,
}

impl SpritesheetStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Atlases: {}, Frames: {}, Dropped: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px²",
            self.num_atlases,
            self.num_frames,
            self.num_dropped,
            self.occupancy * 100.0,
            self.total_atlas_area,
            self.used_frame_area,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_atlas_area.saturating_sub(self.used_frame_area)
    }
}
