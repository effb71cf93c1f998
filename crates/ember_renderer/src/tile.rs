//! Tile partitioning of the data window.
//!
//! Each sample pass splits the data window into square tiles that are
//! rendered independently and in parallel with rayon.

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 8;

/// Pixel rectangle to render, y-down, in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DataWindow {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Window covering a whole `width` x `height` buffer.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip the window to a `width` x `height` buffer. An empty or fully
    /// outside window falls back to the whole buffer.
    pub fn fit_to(&self, width: u32, height: u32) -> DataWindow {
        if self.is_empty() || self.x >= width || self.y >= height {
            return DataWindow::full(width, height);
        }
        DataWindow::new(
            self.x,
            self.y,
            self.width.min(width - self.x),
            self.height.min(height - self.y),
        )
    }
}

/// A rectangular region of the image rendered by one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's top-left corner
    pub x: u32,
    /// Y coordinate of the tile's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Row-major position of this tile within the window
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Pixels of the tile in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |y| (self.x..self.x + self.width).map(move |x| (x, y)))
    }
}

/// Split `window` into tiles of at most `tile_size` pixels on a side, in
/// row-major order. Edge tiles are clipped to the window.
pub fn generate_tiles(window: DataWindow, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();

    let mut y = window.y;
    while y < window.y + window.height {
        let mut x = window.x;
        while x < window.x + window.width {
            let tw = tile_size.min(window.x + window.width - x);
            let th = tile_size.min(window.y + window.height - y);
            tiles.push(Tile::new(x, y, tw, th, tiles.len()));
            x += tile_size;
        }
        y += tile_size;
    }

    tiles
}
