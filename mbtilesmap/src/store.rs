use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf, absolute};

use log::{debug, trace};
use mbtilesmap_tile_utils::{TileCoord, tile_at};
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, SqliteConnection};
use tilejson::{Bounds, Center};
use tokio::fs;

use crate::config::Config;
use crate::errors::{MbtError, MbtResult, allow_no_tiles};
use crate::grid::UtfGrid;
use crate::metadata::{self, RawMetadata};
use crate::queries;

/// One `MBTiles` container file, opened for reading.
///
/// Creating a `TileStore` does not touch the file. The `SQLite` connection is
/// opened by the first query and reused by all later ones. Metadata, zoom
/// levels and every value derived from them are read once and cached for the
/// lifetime of the instance, so create a new `TileStore` to see changes on disk.
#[derive(Debug)]
pub struct TileStore {
    path: PathBuf,
    filepath: String,
    id: String,
    catalog: Option<String>,
    tile_size: u32,
    conn: Option<SqliteConnection>,
    metadata: Option<RawMetadata>,
    zoom_levels: Option<Vec<u8>>,
    bounds: Option<Bounds>,
    center: Option<Center>,
    min_zoom: Option<u8>,
    max_zoom: Option<u8>,
}

/// Summary of a tile store, as shown in catalog listings
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreInfo {
    pub id: String,
    pub name: String,
    pub catalog: Option<String>,
    pub basename: String,
    pub filesize: u64,
    pub zoom_levels: Vec<u8>,
    pub minzoom: Option<u8>,
    pub maxzoom: Option<u8>,
    pub bounds: Bounds,
    pub center: Option<Center>,
}

impl Display for TileStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filepath)
    }
}

impl TileStore {
    /// Prepare a store for the given file. No I/O happens until the first query.
    ///
    /// Fails if the file name does not yield a non-empty id.
    pub fn open<P: AsRef<Path>>(filepath: P, config: &Config) -> MbtResult<Self> {
        let path = filepath.as_ref();
        let path = absolute(path).map_err(|e| MbtError::IoError(e, path.to_path_buf()))?;
        let filepath = path
            .to_str()
            .ok_or_else(|| MbtError::UnsupportedCharsInFilepath(path.clone()))?
            .to_string();
        let id = path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MbtError::EmptyStoreId(path.clone()))?;
        Ok(Self {
            path,
            filepath,
            id,
            catalog: None,
            tile_size: config.tile_size,
            conn: None,
            metadata: None,
            zoom_levels: None,
            bounds: None,
            center: None,
            min_zoom: None,
            max_zoom: None,
        })
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    /// File name without the extension
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// File name including the extension
    #[must_use]
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub async fn filesize(&self) -> MbtResult<u64> {
        let meta = fs::metadata(&self.path)
            .await
            .map_err(|e| MbtError::IoError(e, self.path.clone()))?;
        Ok(meta.len())
    }

    async fn ensure_open<'a>(
        conn: &'a mut Option<SqliteConnection>,
        path: &Path,
    ) -> MbtResult<&'a mut SqliteConnection> {
        let connection = match conn.take() {
            Some(c) => c,
            None => {
                debug!("Opening as readonly {}", path.display());
                let opt = SqliteConnectOptions::new().filename(path).read_only(true);
                SqliteConnection::connect_with(&opt).await?
            }
        };
        Ok(conn.insert(connection))
    }

    /// Close the connection but keep every cached value.
    /// The next query that needs the file opens it again.
    pub async fn disconnect(&mut self) -> MbtResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }

    /// Close the connection if it was ever opened.
    pub async fn close(mut self) -> MbtResult<()> {
        self.disconnect().await
    }

    async fn load_metadata(&mut self) -> MbtResult<()> {
        if self.metadata.is_none() {
            let conn = Self::ensure_open(&mut self.conn, &self.path).await?;
            self.metadata = Some(queries::get_metadata_rows(conn).await?);
        }
        Ok(())
    }

    async fn load_zoom_levels(&mut self) -> MbtResult<()> {
        if self.zoom_levels.is_none() {
            let conn = Self::ensure_open(&mut self.conn, &self.path).await?;
            self.zoom_levels = Some(queries::get_zoom_levels(conn, &self.filepath).await?);
        }
        Ok(())
    }

    /// Everything the metadata interpreter needs, loaded if necessary
    async fn interpreter_input(&mut self) -> MbtResult<(&RawMetadata, &[u8], &str)> {
        self.load_metadata().await?;
        self.load_zoom_levels().await?;
        Ok((
            self.metadata.get_or_insert_default(),
            self.zoom_levels.get_or_insert_default(),
            &self.id,
        ))
    }

    fn no_tiles(&self) -> MbtError {
        MbtError::NoTilesFound(self.filepath.clone())
    }

    /// Raw values of the `metadata` table
    pub async fn metadata(&mut self) -> MbtResult<&RawMetadata> {
        self.load_metadata().await?;
        Ok(self.metadata.get_or_insert_default())
    }

    /// Zoom levels that have at least one tile, ascending and without duplicates
    pub async fn zoom_levels(&mut self) -> MbtResult<&[u8]> {
        self.load_zoom_levels().await?;
        Ok(self.zoom_levels.get_or_insert_default())
    }

    pub async fn bounds(&mut self) -> MbtResult<Bounds> {
        if let Some(bounds) = self.bounds {
            return Ok(bounds);
        }
        self.load_metadata().await?;
        let raw = self.metadata.get_or_insert_default();
        let bounds = metadata::bounds(raw, &self.id);
        self.bounds = Some(bounds);
        Ok(bounds)
    }

    pub async fn center(&mut self) -> MbtResult<Center> {
        if let Some(center) = self.center {
            return Ok(center);
        }
        let bounds = self.bounds().await?;
        let (raw, levels, id) = self.interpreter_input().await?;
        let center = metadata::center(raw, bounds, levels, id);
        let center = center.ok_or_else(|| self.no_tiles())?;
        self.center = Some(center);
        Ok(center)
    }

    pub async fn min_zoom(&mut self) -> MbtResult<u8> {
        if let Some(zoom) = self.min_zoom {
            return Ok(zoom);
        }
        let (raw, levels, id) = self.interpreter_input().await?;
        let zoom = metadata::min_zoom(raw, levels, id);
        let zoom = zoom.ok_or_else(|| self.no_tiles())?;
        self.min_zoom = Some(zoom);
        Ok(zoom)
    }

    pub async fn max_zoom(&mut self) -> MbtResult<u8> {
        if let Some(zoom) = self.max_zoom {
            return Ok(zoom);
        }
        let (raw, levels, id) = self.interpreter_input().await?;
        let zoom = metadata::max_zoom(raw, levels, id);
        let zoom = zoom.ok_or_else(|| self.no_tiles())?;
        self.max_zoom = Some(zoom);
        Ok(zoom)
    }

    pub async fn middle_zoom(&mut self) -> MbtResult<u8> {
        let zoom = metadata::middle_zoom(self.zoom_levels().await?);
        zoom.ok_or_else(|| self.no_tiles())
    }

    /// The `name` metadata value, or the id if there is none
    pub async fn name(&mut self) -> MbtResult<String> {
        self.load_metadata().await?;
        let raw = self.metadata.get_or_insert_default();
        Ok(metadata::display_name(raw, &self.id))
    }

    fn checked_coord(&self, z: u8, x: u32, y: u32) -> MbtResult<TileCoord> {
        TileCoord::new_checked(z, x, y).ok_or_else(|| MbtError::TileMissing {
            id: self.id.clone(),
            coord: TileCoord { z, x, y },
        })
    }

    /// Tile data at an XYZ coordinate
    pub async fn tile(&mut self, z: u8, x: u32, y: u32) -> MbtResult<Vec<u8>> {
        let coord = self.checked_coord(z, x, y)?;
        let conn = Self::ensure_open(&mut self.conn, &self.path).await?;
        if let Some(data) = queries::get_tile(conn, coord).await? {
            Ok(data)
        } else {
            trace!("Couldn't find tile data in {coord} of {}", self.id);
            Err(MbtError::TileMissing {
                id: self.id.clone(),
                coord,
            })
        }
    }

    /// UTF-Grid at an XYZ coordinate, with all of its `grid_data` rows merged in
    pub async fn grid(&mut self, z: u8, x: u32, y: u32) -> MbtResult<UtfGrid> {
        let coord = self.checked_coord(z, x, y)?;
        let conn = Self::ensure_open(&mut self.conn, &self.path).await?;

        let blob = if queries::has_table(&mut *conn, "grids").await? {
            queries::get_grid(&mut *conn, coord).await?
        } else {
            None
        };
        let Some(blob) = blob else {
            trace!("Couldn't find grid data in {coord} of {}", self.id);
            return Err(MbtError::TileMissing {
                id: self.id.clone(),
                coord,
            });
        };

        let rows = if queries::has_table(&mut *conn, "grid_data").await? {
            queries::get_grid_data(&mut *conn, coord).await?
        } else {
            Vec::new()
        };
        UtfGrid::decode(&blob, rows, &self.filepath)
    }

    /// The XYZ tile that contains the center, at the center's zoom level
    pub async fn center_tile(&mut self) -> MbtResult<TileCoord> {
        let center = self.center().await?;
        let (x, y) = tile_at(center.zoom, center.longitude, center.latitude, self.tile_size);
        Ok(TileCoord {
            z: center.zoom,
            x,
            y,
        })
    }

    /// Make sure the file is a readable tile container with a usable name.
    pub async fn validate(&mut self) -> MbtResult<()> {
        let conn = Self::ensure_open(&mut self.conn, &self.path).await?;
        if !queries::has_table(&mut *conn, "tiles").await? {
            return Err(MbtError::corrupt(&self.filepath, "missing tiles table"));
        }
        if self.name().await?.is_empty() {
            return Err(MbtError::EmptyStoreId(self.path.clone()));
        }
        Ok(())
    }

    pub async fn info(&mut self) -> MbtResult<StoreInfo> {
        Ok(StoreInfo {
            id: self.id.clone(),
            name: self.name().await?,
            catalog: self.catalog.clone(),
            basename: self.basename(),
            filesize: self.filesize().await?,
            zoom_levels: self.zoom_levels().await?.to_vec(),
            minzoom: allow_no_tiles(self.min_zoom().await)?,
            maxzoom: allow_no_tiles(self.max_zoom().await)?,
            bounds: self.bounds().await?,
            center: allow_no_tiles(self.center().await)?,
        })
    }
}
