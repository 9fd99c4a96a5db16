//! Contact sheet composition.
//!
//! Tiles are laid out row-major from the top-left corner. Cell width is
//! derived from the median tile aspect ratio so one odd frame cannot skew
//! the whole grid. The `image` canvas is top-down, so cell origins map to
//! pixels directly and the first tile always lands in the top-left cell.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use crate::config::SheetConfig;
use crate::types::FitPolicy;

/// Residual border (per side) that gets closed by stretching instead.
const GAP_TOLERANCE: u32 = 2;

/// Largest sheet edge an encoder accepts (the JPEG limit).
pub const MAX_SHEET_EDGE: u32 = 65_535;

/// Grid layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub columns: u32,
    pub cell_height: u32,
    pub spacing: u32,
    pub fit: FitPolicy,
    pub background: Rgb<u8>,
}

impl SheetLayout {
    pub fn from_config(config: &SheetConfig) -> Self {
        Self {
            columns: config.columns.max(1),
            cell_height: config.cell_height.max(1),
            spacing: config.spacing,
            fit: config.fit,
            background: Rgb(config.background),
        }
    }

    /// Grid geometry for `tiles`, or `None` when either sheet edge would
    /// exceed [`MAX_SHEET_EDGE`].
    pub fn geometry(&self, tiles: &[DynamicImage]) -> Option<SheetGeometry> {
        let count = u32::try_from(tiles.len()).ok()?;
        let columns = self.columns.max(1);
        let rows = count.div_ceil(columns).max(1);
        let cell_height = self.cell_height.max(1);
        let cell_width = (cell_height as f64 * median_aspect(tiles)).round().max(1.0);
        if cell_width > MAX_SHEET_EDGE as f64 {
            return None;
        }
        let cell_width = cell_width as u32;

        let edge = |cells: u32, size: u32| {
            cells
                .checked_mul(size)?
                .checked_add(cells.checked_add(1)?.checked_mul(self.spacing)?)
                .filter(|&total| total <= MAX_SHEET_EDGE)
        };

        Some(SheetGeometry {
            columns,
            rows,
            cell_width,
            cell_height,
            spacing: self.spacing,
            width: edge(columns, cell_width)?,
            height: edge(rows, cell_height)?,
        })
    }
}

/// Resolved pixel geometry of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetGeometry {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub spacing: u32,
    pub width: u32,
    pub height: u32,
}

impl SheetGeometry {
    /// Top-left pixel of cell `index` (row-major).
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        let col = index % self.columns;
        let row = index / self.columns;
        (
            self.spacing + col * (self.cell_width + self.spacing),
            self.spacing + row * (self.cell_height + self.spacing),
        )
    }
}

/// Median width/height ratio of the tiles; 1.0 when there are none.
pub fn median_aspect(tiles: &[DynamicImage]) -> f64 {
    let mut ratios: Vec<f64> = tiles
        .iter()
        .filter(|t| t.height() > 0)
        .map(|t| t.width() as f64 / t.height() as f64)
        .collect();
    if ratios.is_empty() {
        return 1.0;
    }
    ratios.sort_by(f64::total_cmp);
    let mid = ratios.len() / 2;
    if ratios.len() % 2 == 0 {
        (ratios[mid - 1] + ratios[mid]) / 2.0
    } else {
        ratios[mid]
    }
}

/// Where a tile goes inside its cell. Offsets may be negative for `Crop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Fit a `tile` of the given size into a `cell` under `fit`.
pub fn place(tile: (u32, u32), cell: (u32, u32), fit: FitPolicy) -> Placement {
    let (tw, th) = (tile.0.max(1) as f64, tile.1.max(1) as f64);
    let (cw, ch) = cell;

    let (mut width, mut height) = match fit {
        FitPolicy::Stretch => (cw, ch),
        FitPolicy::Pad => {
            let scale = (cw as f64 / tw).min(ch as f64 / th);
            (
                ((tw * scale).round() as u32).clamp(1, cw),
                ((th * scale).round() as u32).clamp(1, ch),
            )
        }
        FitPolicy::Crop => {
            let scale = (cw as f64 / tw).max(ch as f64 / th);
            (
                ((tw * scale).round() as u32).max(1),
                ((th * scale).round() as u32).max(1),
            )
        }
    };

    if width < cw && cw - width <= 2 * GAP_TOLERANCE {
        width = cw;
    }
    if height < ch && ch - height <= 2 * GAP_TOLERANCE {
        height = ch;
    }

    Placement {
        x: (cw as i64 - width as i64) / 2,
        y: (ch as i64 - height as i64) / 2,
        width,
        height,
    }
}

/// Compose `tiles` into one sheet. Same input, same pixels.
///
/// An empty tile list yields a 1x1 background image. Returns `None` when
/// the sheet would be larger than [`MAX_SHEET_EDGE`] on either side.
pub fn compose(tiles: &[DynamicImage], layout: &SheetLayout) -> Option<RgbImage> {
    if tiles.is_empty() {
        return Some(RgbImage::from_pixel(1, 1, layout.background));
    }

    let geometry = layout.geometry(tiles)?;
    let mut sheet = RgbImage::from_pixel(geometry.width, geometry.height, layout.background);
    let cell_size = (geometry.cell_width, geometry.cell_height);

    for (index, tile) in tiles.iter().enumerate() {
        let placement = place((tile.width(), tile.height()), cell_size, layout.fit);
        let (visible, x, y) = visible_part(tile, placement, cell_size);

        let mut cell = RgbImage::from_pixel(cell_size.0, cell_size.1, layout.background);
        imageops::overlay(&mut cell, &visible, x, y);

        let (x, y) = geometry.cell_origin(index);
        imageops::replace(&mut sheet, &cell, x as i64, y as i64);
    }

    Some(sheet)
}

/// Resample only the part of `tile` that lands inside the cell.
///
/// For `Crop` the overflow is cut from the source first, so a tile is never
/// scaled up beyond the cell it ends up in.
fn visible_part(
    tile: &DynamicImage,
    placement: Placement,
    cell: (u32, u32),
) -> (RgbImage, i64, i64) {
    let (tw, th) = (tile.width().max(1), tile.height().max(1));
    let x0 = placement.x.max(0);
    let y0 = placement.y.max(0);
    let x1 = (placement.x + placement.width as i64).min(cell.0 as i64);
    let y1 = (placement.y + placement.height as i64).min(cell.1 as i64);
    let (vis_w, vis_h) = ((x1 - x0).max(1) as u32, (y1 - y0).max(1) as u32);

    let sx = tw as f64 / placement.width.max(1) as f64;
    let sy = th as f64 / placement.height.max(1) as f64;
    let src_x = (((x0 - placement.x) as f64 * sx).floor() as u32).min(tw - 1);
    let src_y = (((y0 - placement.y) as f64 * sy).floor() as u32).min(th - 1);
    let src_w = ((vis_w as f64 * sx).round() as u32).clamp(1, tw - src_x);
    let src_h = ((vis_h as f64 * sy).round() as u32).clamp(1, th - src_y);

    let visible = tile
        .crop_imm(src_x, src_y, src_w, src_h)
        .resize_exact(vis_w, vis_h, FilterType::Triangle)
        .to_rgb8();
    (visible, x0, y0)
}
