//! Read-only access to `MBTiles` tile stores organised into catalogs.
//!
//! A catalog is a directory of `.mbtiles` files. [`TileService`] resolves request
//! identifiers to files, and [`TileStore`] reads tiles, UTF-Grids and metadata from
//! one file. Values missing from the metadata table are computed from the tiles.
#![allow(clippy::missing_errors_doc)]

mod catalog;
pub use catalog::{CatalogResolver, CatalogRoot};

mod config;
pub use config::{Config, DEFAULT_EXTENSION, MissingTilePolicy, ROOT_DELIMITER};

mod enumerator;
pub use enumerator::CatalogEnumerator;

mod errors;
pub use errors::{ErrorKind, MbtError, MbtResult};

mod grid;
pub use grid::UtfGrid;

mod locator;
pub use locator::{LocatedStore, StoreLocator};

pub mod metadata;
pub use metadata::RawMetadata;

mod queries;

mod response;
pub use response::{
    DEFAULT_TILEJSON_CALLBACK, JAVASCRIPT_CONTENT_TYPE, PNG_CONTENT_TYPE, TilePayload,
    validate_callback, validate_identifier, wrap_jsonp,
};

mod service;
pub use service::TileService;

mod store;
pub use store::{StoreInfo, TileStore};

mod tiles_info;
pub use tiles_info::{TILEJSON_VERSION, build_tilejson, url_template};

// Re-export the coordinate helpers for convenience
pub use mbtilesmap_tile_utils::{TileCoord, invert_y_value, tile_at};
