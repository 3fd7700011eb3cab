//! Tile addressing helpers shared by the `mbtilesmap` crates.
//!
//! Map clients address tiles top-down (XYZ), while `MBTiles` containers store rows
//! bottom-up (TMS). Everything here is pure arithmetic with no I/O.

use std::f64::consts::PI;
use std::fmt::{Display, Formatter};

use serde::Serialize;

mod decoders;
pub use decoders::*;

/// Highest zoom level a container row may use
pub const MAX_ZOOM: u8 = 30;

/// Default width and height of a raster tile, in pixels
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Whole-world bounds in degrees: west, south, east, north
pub const WORLD_BOUNDS: [f64; 4] = [-180.0, -90.0, 180.0, 90.0];

/// Sine of the latitude is clamped to this value so the poles stay finite.
const MAX_SIN_LAT: f64 = 0.9999;

/// A tile address in the XYZ scheme, where `y = 0` is the northernmost row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Returns `None` if the zoom is above [`MAX_ZOOM`] or a column/row is outside of `0..2^z`.
    #[must_use]
    pub fn new_checked(z: u8, x: u32, y: u32) -> Option<Self> {
        Self::is_valid(z, x, y).then_some(Self { z, x, y })
    }

    #[must_use]
    pub fn is_valid(z: u8, x: u32, y: u32) -> bool {
        if z > MAX_ZOOM {
            return false;
        }
        let side = 1_u32 << z;
        x < side && y < side
    }

    /// The same tile addressed with the bottom-up (TMS) row numbering used inside `MBTiles` files.
    #[must_use]
    pub fn tms_row(&self) -> u32 {
        invert_y_value(self.z, self.y)
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Convert a row between the XYZ and TMS numbering. Applying it twice yields the original row.
///
/// The caller must make sure `zoom <= MAX_ZOOM` and `y < 2^zoom`, see [`TileCoord::is_valid`].
#[must_use]
pub fn invert_y_value(zoom: u8, y: u32) -> u32 {
    (1_u32 << zoom) - 1 - y
}

/// Find the XYZ tile at `zoom` that covers the given WGS84 point.
///
/// This is the pixel-space spherical Mercator projection used by the classic
/// Google tiling scheme: the point is first projected to a whole pixel of a
/// `tile_size * 2^zoom` wide world image, and the pixel is then divided by the tile size.
/// Points on the antimeridian or the poles are clamped to the last column/row.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn tile_at(zoom: u8, lon: f64, lat: f64, tile_size: u32) -> (u32, u32) {
    let tile_size = f64::from(tile_size.max(1));
    let tiles = f64::from(zoom).exp2();
    let world = tile_size * tiles;
    let half = world / 2.0;

    let px = (half + lon * world / 360.0).round();
    let sin_lat = lat.to_radians().sin().clamp(-MAX_SIN_LAT, MAX_SIN_LAT);
    let py = (half - 0.5 * ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() * world / (2.0 * PI)).round();

    let last = tiles - 1.0;
    let x = (px / tile_size).floor().clamp(0.0, last);
    let y = (py / tile_size).floor().clamp(0.0, last);
    (x as u32, y as u32)
}

/// Geometric midpoint of a `[west, south, east, north]` box, as `(lon, lat)`.
#[must_use]
pub fn bounds_midpoint(bounds: [f64; 4]) -> (f64, f64) {
    let [west, south, east, north] = bounds;
    (west + (east - west) / 2.0, south + (north - south) / 2.0)
}
