use serde::{Deserialize, Serialize};

/// Top-left corner assigned to a packed rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// A horizontal strip whose height is fixed by the first item placed on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shelf {
    pub y: u32,
    /// Next free x on this shelf.
    pub x: u32,
    pub height: u32,
    pub remaining_width: u32,
}

/// First-fit shelf packer.
///
/// Items are `(w + padding) x (h + padding)` slots. Existing shelves are scanned in
/// creation order and the first one that is tall and wide enough takes the item;
/// otherwise a new shelf is opened below the last one. When neither works the packer
/// becomes `full` and stays full until [`ShelfPacker::clear`].
///
/// Callers wanting tighter packing should feed items by descending height.
#[derive(Clone, Debug)]
pub struct ShelfPacker {
    width: u32,
    height: u32,
    padding: u32,
    shelves: Vec<Shelf>,
    current_y: u32,
    full: bool,
}

impl ShelfPacker {
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
            shelves: Vec::new(),
            current_y: 0,
            full: false,
        }
    }

    /// Places a `w x h` rectangle, or returns `None` (and becomes full) when it cannot.
    /// Zero-sized requests return `None` without changing state.
    pub fn pack(&mut self, w: u32, h: u32) -> Option<Placement> {
        if self.full || w == 0 || h == 0 {
            return None;
        }
        let (pw, ph) = self.slot(w, h);

        if let Some(i) = self.find_shelf(pw, ph) {
            let shelf = &mut self.shelves[i];
            let placement = Placement {
                x: shelf.x,
                y: shelf.y,
            };
            shelf.x += pw;
            shelf.remaining_width -= pw;
            return Some(placement);
        }

        if self.fits_new_shelf(pw, ph) {
            let y = self.current_y;
            self.shelves.push(Shelf {
                y,
                x: pw,
                height: ph,
                remaining_width: self.width - pw,
            });
            self.current_y += ph;
            return Some(Placement { x: 0, y });
        }

        self.full = true;
        None
    }

    /// Same search as [`pack`](Self::pack) without placing anything.
    pub fn can_fit(&self, w: u32, h: u32) -> bool {
        if self.full || w == 0 || h == 0 {
            return false;
        }
        let (pw, ph) = self.slot(w, h);
        self.find_shelf(pw, ph).is_some() || self.fits_new_shelf(pw, ph)
    }

    /// Forgets every shelf and clears the full flag.
    pub fn clear(&mut self) {
        self.shelves.clear();
        self.current_y = 0;
        self.full = false;
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Height consumed by shelves so far (top of the next new shelf).
    pub fn used_height(&self) -> u32 {
        self.current_y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    pub fn shelves(&self) -> &[Shelf] {
        &self.shelves
    }

    fn slot(&self, w: u32, h: u32) -> (u32, u32) {
        (w.saturating_add(self.padding), h.saturating_add(self.padding))
    }

    fn find_shelf(&self, pw: u32, ph: u32) -> Option<usize> {
        self.shelves
            .iter()
            .position(|s| s.height >= ph && s.remaining_width >= pw)
    }

    fn fits_new_shelf(&self, pw: u32, ph: u32) -> bool {
        pw <= self.width
            && self
                .current_y
                .checked_add(ph)
                .is_some_and(|bottom| bottom <= self.height)
    }
}
