//! Typed values derived from the raw `metadata` table.
//!
//! The metadata written by tile generators is frequently incomplete or wrong,
//! so every accessor here falls back to something computed from the tiles
//! themselves instead of failing. A value that does not parse is treated the
//! same way as a missing one.

use std::collections::BTreeMap;

use log::{debug, warn};
use mbtilesmap_tile_utils::{WORLD_BOUNDS, bounds_midpoint};
use tilejson::{Bounds, Center};

/// Metadata key/value pairs, exactly as stored in the container
pub type RawMetadata = BTreeMap<String, String>;

/// Parse a `west,south,east,north` string. Anything but four finite numbers is rejected.
#[must_use]
pub fn parse_bounds(value: &str) -> Option<Bounds> {
    let [left, bottom, right, top] = parse_numbers::<4>(value)?;
    Some(Bounds {
        left,
        bottom,
        right,
        top,
    })
}

/// Parse a `lon,lat,zoom` string. The zoom is returned as a number so the caller
/// can decide what to do with values that are not valid zoom levels.
#[must_use]
pub fn parse_center(value: &str) -> Option<(f64, f64, f64)> {
    let [lon, lat, zoom] = parse_numbers::<3>(value)?;
    Some((lon, lat, zoom))
}

fn parse_numbers<const N: usize>(value: &str) -> Option<[f64; N]> {
    let mut result = [0.0; N];
    let mut parts = value.split(',');
    for slot in &mut result {
        let v: f64 = parts.next()?.trim().parse().ok()?;
        if !v.is_finite() {
            return None;
        }
        *slot = v;
    }
    parts.next().is_none().then_some(result)
}

#[must_use]
pub fn world_bounds() -> Bounds {
    let [left, bottom, right, top] = WORLD_BOUNDS;
    Bounds {
        left,
        bottom,
        right,
        top,
    }
}

/// Bounds from metadata, or the whole world if they are absent or malformed.
#[must_use]
pub fn bounds(raw: &RawMetadata, source: &str) -> Bounds {
    match raw.get("bounds") {
        None => {
            debug!("No bounds metadata in '{source}', using whole world");
            world_bounds()
        }
        Some(value) => parse_bounds(value).unwrap_or_else(|| {
            warn!("Invalid bounds metadata '{value}' in '{source}', fallback to whole world");
            world_bounds()
        }),
    }
}

/// The element in the middle of the zoom level list, at index `len / 2`.
/// For an even number of levels this is the upper of the two middle elements.
#[must_use]
pub fn middle_zoom(zoom_levels: &[u8]) -> Option<u8> {
    zoom_levels.get(zoom_levels.len() / 2).copied()
}

#[must_use]
pub fn min_zoom(raw: &RawMetadata, zoom_levels: &[u8], source: &str) -> Option<u8> {
    zoom_override(raw, "minzoom", source).or_else(|| zoom_levels.first().copied())
}

#[must_use]
pub fn max_zoom(raw: &RawMetadata, zoom_levels: &[u8], source: &str) -> Option<u8> {
    zoom_override(raw, "maxzoom", source).or_else(|| zoom_levels.last().copied())
}

fn zoom_override(raw: &RawMetadata, key: &str, source: &str) -> Option<u8> {
    let value = raw.get(key)?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(err) => {
            warn!("Unable to parse metadata {key} value '{value}' in {source}: {err}");
            None
        }
    }
}

/// Center of the tileset.
///
/// A `lon,lat,zoom` metadata value is used when its zoom is one of the available
/// zoom levels. If the zoom is not available, the middle zoom level replaces it
/// while the coordinates are kept. If the value is absent or malformed, the center
/// is the middle of `bounds` at the middle zoom level.
///
/// Returns `None` only if there are no zoom levels at all.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn center(
    raw: &RawMetadata,
    bounds: Bounds,
    zoom_levels: &[u8],
    source: &str,
) -> Option<Center> {
    let middle = middle_zoom(zoom_levels)?;

    if let Some(value) = raw.get("center") {
        if let Some((longitude, latitude, zoom)) = parse_center(value) {
            // zoom levels are whole numbers, a fractional part is dropped
            let zoom = zoom.trunc();
            let available = zoom_levels.iter().find(|&&z| f64::from(z) == zoom).copied();
            let zoom = available.unwrap_or_else(|| {
                warn!(
                    "Invalid zoom level ({zoom}) in center of '{source}', fallback to middle zoom ({middle})"
                );
                middle
            });
            return Some(Center {
                longitude,
                latitude,
                zoom,
            });
        }
        warn!("Invalid center metadata '{value}' in '{source}', using the middle of the bounds");
    }

    let (longitude, latitude) =
        bounds_midpoint([bounds.left, bounds.bottom, bounds.right, bounds.top]);
    Some(Center {
        longitude,
        latitude,
        zoom: middle,
    })
}

/// Human-readable name of the tileset, falling back to its id
#[must_use]
pub fn display_name(raw: &RawMetadata, id: &str) -> String {
    raw.get("name")
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawMetadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn bounds_from_metadata() {
        let meta = raw(&[("bounds", "-18.6328,32.25,29.8828,60.2398")]);
        assert_eq!(
            bounds(&meta, "test"),
            Bounds {
                left: -18.6328,
                bottom: 32.25,
                right: 29.8828,
                top: 60.2398
            }
        );
        let meta = raw(&[("bounds", " -1.5 , 2 ,3,4 ")]);
        assert_eq!(bounds(&meta, "test"), Bounds::new(-1.5, 2.0, 3.0, 4.0));
    }

    #[rstest]
    #[case::absent(None)]
    #[case::empty(Some(""))]
    #[case::three(Some("1,2,3"))]
    #[case::five(Some("1,2,3,4,5"))]
    #[case::text(Some("a,b,c,d"))]
    #[case::nan(Some("NaN,0,1,1"))]
    #[case::infinite(Some("-inf,0,1,1"))]
    #[case::comma_decimal(Some("1,5;2,5;3,5;4,5"))]
    fn bounds_fallback(#[case] value: Option<&str>) {
        let meta = value.map_or_else(RawMetadata::new, |v| raw(&[("bounds", v)]));
        assert_eq!(bounds(&meta, "test"), Bounds::new(-180.0, -90.0, 180.0, 90.0));
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&[4], Some(4))]
    #[case(&[3, 5], Some(5))]
    #[case(&[0, 1, 2], Some(1))]
    #[case(&[0, 1, 2, 3], Some(2))]
    #[case(&[0, 1, 2, 3, 4, 5, 6], Some(3))]
    fn middle(#[case] levels: &[u8], #[case] expected: Option<u8>) {
        assert_eq!(middle_zoom(levels), expected);
    }

    #[test]
    fn zoom_range() {
        let levels = [3, 5, 8];
        let none = RawMetadata::new();
        assert_eq!(min_zoom(&none, &levels, "test"), Some(3));
        assert_eq!(max_zoom(&none, &levels, "test"), Some(8));
        assert_eq!(min_zoom(&none, &[], "test"), None);

        let meta = raw(&[("minzoom", "0"), ("maxzoom", " 12 ")]);
        assert_eq!(min_zoom(&meta, &levels, "test"), Some(0));
        assert_eq!(max_zoom(&meta, &levels, "test"), Some(12));
        assert_eq!(max_zoom(&meta, &[], "test"), Some(12));

        let meta = raw(&[("minzoom", "zero"), ("maxzoom", "7.5")]);
        assert_eq!(min_zoom(&meta, &levels, "test"), Some(3));
        assert_eq!(max_zoom(&meta, &levels, "test"), Some(8));
    }

    #[test]
    fn center_from_bounds_midpoint() {
        let none = RawMetadata::new();
        let center = center(&none, world_bounds(), &[3, 5], "test").unwrap();
        assert_eq!(
            center,
            Center {
                longitude: 0.0,
                latitude: 0.0,
                zoom: 5
            }
        );

        let b = Bounds::new(0.0, 10.0, 20.0, 50.0);
        let center = super::center(&none, b, &[1], "test").unwrap();
        assert_eq!((center.longitude, center.latitude, center.zoom), (10.0, 30.0, 1));
    }

    #[test]
    fn center_from_metadata() {
        let meta = raw(&[("center", "2.3401,48.8503,2")]);
        let c = center(&meta, world_bounds(), &[0, 1, 2, 3], "test").unwrap();
        assert_eq!((c.longitude, c.latitude, c.zoom), (2.3401, 48.8503, 2));

        let meta = raw(&[("center", "2.3401,48.8503,2.0")]);
        let c = center(&meta, world_bounds(), &[0, 1, 2, 3], "test").unwrap();
        assert_eq!(c.zoom, 2);
    }

    #[test]
    fn center_zoom_not_available() {
        let meta = raw(&[("center", "2.3401,48.8503,7")]);
        let levels = [0, 1, 2, 3, 4, 5, 6];
        let c = center(&meta, world_bounds(), &levels, "test").unwrap();
        assert_eq!((c.longitude, c.latitude, c.zoom), (2.3401, 48.8503, 3));

        let meta = raw(&[("center", "2,48,-1")]);
        let c = center(&meta, world_bounds(), &[0, 2], "test").unwrap();
        assert_eq!((c.longitude, c.latitude, c.zoom), (2.0, 48.0, 2));
    }

    #[rstest]
    #[case("")]
    #[case("2.3401,48.8503")]
    #[case("2.3401,48.8503,7,1")]
    #[case("east,48.8503,7")]
    fn center_malformed(#[case] value: &str) {
        let meta = raw(&[("center", value)]);
        let b = Bounds::new(-10.0, -20.0, 30.0, 40.0);
        let c = center(&meta, b, &[3, 5], "test").unwrap();
        assert_eq!((c.longitude, c.latitude, c.zoom), (10.0, 10.0, 5));
    }

    #[test]
    fn center_without_tiles() {
        let meta = raw(&[("center", "1,2,3")]);
        assert_eq!(center(&meta, world_bounds(), &[], "test"), None);
    }

    #[test]
    fn name() {
        assert_eq!(display_name(&RawMetadata::new(), "france-35"), "france-35");
        let meta = raw(&[("name", "Geography Class")]);
        assert_eq!(display_name(&meta, "geography-class"), "Geography Class");
        let meta = raw(&[("name", "")]);
        assert_eq!(display_name(&meta, "france-35"), "france-35");
    }
}
