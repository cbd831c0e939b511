//! Zone classification: maps a filtered gaze position to a discrete zone.
//!
//! Two addressing modes:
//! - banded: the screen is cut into column thirds and two or three row bands
//!   (coarse menus);
//! - cells: an N×N grid inside a container rectangle, resolved by nearest
//!   cell center so jitter near a boundary does not flip cells.

use super::geometry::Point;
use crate::error::ConfigError;

/// Largest supported N for an N×N cell grid.
pub const MAX_GRID_SIZE: usize = 12;

// ── Bands ───────────────────────────────────────────────────

/// Vertical band of a banded layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Row {
    Up,
    Middle,
    Down,
}

impl Row {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Middle => "middle",
            Self::Down => "down",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "middle" => Some(Self::Middle),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Horizontal third of a banded layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Col {
    Left,
    Center,
    Right,
}

impl Col {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Number of row bands in a banded layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandLayout {
    /// up / down
    TwoRows,
    /// up / middle / down
    ThreeRows,
}

// ── Zone ────────────────────────────────────────────────────

/// A discrete gaze zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Band { row: Row, col: Col },
    Cell { row: usize, col: usize },
}

impl Zone {
    pub fn band(row: Row, col: Col) -> Self {
        Self::Band { row, col }
    }

    pub fn cell(row: usize, col: usize) -> Self {
        Self::Cell { row, col }
    }

    /// Human-readable label: `up-left` for bands, `A1` style for cells.
    pub fn label(&self) -> String {
        match self {
            Self::Band { row, col } => format!("{}-{}", row.as_str(), col.as_str()),
            Self::Cell { row, col } => {
                let letter = (b'A' + (*col as u8 % 26)) as char;
                format!("{}{}", letter, row + 1)
            }
        }
    }

    pub fn to_sexp(&self) -> String {
        match self {
            Self::Band { row, col } => {
                format!("(:row :{} :col :{})", row.as_str(), col.as_str())
            }
            Self::Cell { row, col } => format!("(:row {} :col {})", row, col),
        }
    }
}

/// S-expression for an optional zone (`nil` when absent).
pub fn zone_sexp(zone: Option<Zone>) -> String {
    zone.map(|z| z.to_sexp()).unwrap_or_else(|| "nil".to_string())
}

// ── Grid spec ───────────────────────────────────────────────

/// Container rectangle of a cell grid, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whether `p` lies inside (left/top inclusive, right/bottom exclusive).
    pub fn contains(&self, p: Point) -> bool {
        let rx = p.x - self.left;
        let ry = p.y - self.top;
        rx >= 0.0 && rx < self.width && ry >= 0.0 && ry < self.height
    }
}

/// Zone addressing mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridSpec {
    Bands(BandLayout),
    Cells { size: usize, bounds: ContainerRect },
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::Bands(BandLayout::ThreeRows)
    }
}

impl GridSpec {
    /// Validated N×N cell grid.
    pub fn cells(size: usize, bounds: ContainerRect) -> Result<Self, ConfigError> {
        let spec = Self::Cells { size, bounds };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Bands(_) => Ok(()),
            Self::Cells { size, bounds } => {
                if *size == 0 || *size > MAX_GRID_SIZE {
                    return Err(ConfigError::InvalidGridSize {
                        size: *size,
                        max: MAX_GRID_SIZE,
                    });
                }
                if !(bounds.width > 0.0 && bounds.height > 0.0) {
                    return Err(ConfigError::InvalidBounds {
                        width: bounds.width,
                        height: bounds.height,
                    });
                }
                Ok(())
            }
        }
    }

    /// Whether `zone` can be produced by this grid.
    pub fn contains_zone(&self, zone: &Zone) -> bool {
        match (self, zone) {
            (Self::Bands(BandLayout::TwoRows), Zone::Band { row, .. }) => *row != Row::Middle,
            (Self::Bands(BandLayout::ThreeRows), Zone::Band { .. }) => true,
            (Self::Cells { size, .. }, Zone::Cell { row, col }) => row < size && col < size,
            _ => false,
        }
    }

    pub fn as_sexp(&self) -> String {
        match self {
            Self::Bands(BandLayout::TwoRows) => "(:mode :bands :rows 2)".to_string(),
            Self::Bands(BandLayout::ThreeRows) => "(:mode :bands :rows 3)".to_string(),
            Self::Cells { size, bounds } => format!(
                "(:mode :cells :size {} :bounds ({:.0} {:.0} {:.0} {:.0}))",
                size, bounds.left, bounds.top, bounds.width, bounds.height,
            ),
        }
    }
}

// ── Classification ──────────────────────────────────────────

/// Classify a filtered position into a zone.
///
/// Banded layouts cover the whole screen: positions past an edge fall into
/// the outermost band. Cell grids return `None` outside the container, and
/// both modes return `None` for a degenerate screen.
pub fn classify(pos: Point, screen_width: f64, screen_height: f64, grid: &GridSpec) -> Option<Zone> {
    if !pos.is_finite() {
        return None;
    }
    match grid {
        GridSpec::Bands(layout) => {
            if screen_width <= 0.0 || screen_height <= 0.0 {
                return None;
            }
            Some(Zone::Band {
                row: classify_row(pos.y, screen_height, *layout),
                col: classify_col(pos.x, screen_width),
            })
        }
        GridSpec::Cells { size, bounds } => nearest_cell(pos, *size, bounds),
    }
}

fn classify_col(x: f64, width: f64) -> Col {
    if x < width / 3.0 {
        Col::Left
    } else if x < 2.0 * width / 3.0 {
        Col::Center
    } else {
        Col::Right
    }
}

fn classify_row(y: f64, height: f64, layout: BandLayout) -> Row {
    match layout {
        BandLayout::TwoRows => {
            if y < height / 2.0 {
                Row::Up
            } else {
                Row::Down
            }
        }
        BandLayout::ThreeRows => {
            if y < height / 3.0 {
                Row::Up
            } else if y < 2.0 * height / 3.0 {
                Row::Middle
            } else {
                Row::Down
            }
        }
    }
}

fn nearest_cell(pos: Point, size: usize, bounds: &ContainerRect) -> Option<Zone> {
    if size == 0 || !bounds.contains(pos) {
        return None;
    }
    let cell_w = bounds.width / size as f64;
    let cell_h = bounds.height / size as f64;
    let rel = Point::new(pos.x - bounds.left, pos.y - bounds.top);

    let mut best: Option<(Zone, f64)> = None;
    for row in 0..size {
        for col in 0..size {
            let center = Point::new(
                col as f64 * cell_w + cell_w / 2.0,
                row as f64 * cell_h + cell_h / 2.0,
            );
            let d = rel.distance_sq(center);
            match best {
                Some((_, best_d)) if best_d <= d => {}
                _ => best = Some((Zone::cell(row, col), d)),
            }
        }
    }
    best.map(|(zone, _)| zone)
}

// ── Tests ───────────────────────────────────────────────────
