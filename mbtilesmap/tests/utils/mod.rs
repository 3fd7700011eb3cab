#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mbtilesmap_tile_utils::encode_zlib;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, Executor as _, SqliteConnection, query};

const TILES_SCHEMA: &str = "
    CREATE TABLE metadata (name text, value text);
    CREATE UNIQUE INDEX name ON metadata (name);
    CREATE TABLE tiles (zoom_level integer, tile_column integer, tile_row integer, tile_data blob);
    CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);";

const GRIDS_SCHEMA: &str = "
    CREATE TABLE grids (zoom_level integer, tile_column integer, tile_row integer, grid blob);
    CREATE TABLE grid_data (zoom_level integer, tile_column integer, tile_row integer, key_name text, key_json text);";

/// Builds small `MBTiles` files for tests. Rows use the TMS numbering stored on disk.
#[derive(Default, Clone)]
pub struct StoreBuilder {
    metadata: Vec<(String, String)>,
    tiles: Vec<(u8, u32, u32, Vec<u8>)>,
    grid_tables: bool,
    grids: Vec<(u8, u32, u32, Vec<u8>)>,
    grid_data: Vec<(u8, u32, u32, String, String)>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta(mut self, name: &str, value: &str) -> Self {
        self.metadata.push((name.to_string(), value.to_string()));
        self
    }

    pub fn tile(mut self, z: u8, x: u32, tms_y: u32, data: &[u8]) -> Self {
        self.tiles.push((z, x, tms_y, data.to_vec()));
        self
    }

    /// One tile at each zoom level
    pub fn levels(mut self, levels: &[u8]) -> Self {
        for &z in levels {
            self.tiles.push((z, 0, 0, format!("tile-{z}").into_bytes()));
        }
        self
    }

    pub fn grid_tables(mut self) -> Self {
        self.grid_tables = true;
        self
    }

    pub fn grid(mut self, z: u8, x: u32, tms_y: u32, json: &str) -> Self {
        self.grid_tables = true;
        let blob = encode_zlib(json.as_bytes()).unwrap();
        self.grids.push((z, x, tms_y, blob));
        self
    }

    pub fn raw_grid(mut self, z: u8, x: u32, tms_y: u32, blob: &[u8]) -> Self {
        self.grid_tables = true;
        self.grids.push((z, x, tms_y, blob.to_vec()));
        self
    }

    pub fn grid_data(mut self, z: u8, x: u32, tms_y: u32, key: &str, json: &str) -> Self {
        self.grid_tables = true;
        self.grid_data
            .push((z, x, tms_y, key.to_string(), json.to_string()));
        self
    }

    pub async fn write(&self, path: &Path) -> PathBuf {
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&opt).await.unwrap();
        conn.execute(TILES_SCHEMA).await.unwrap();
        if self.grid_tables {
            conn.execute(GRIDS_SCHEMA).await.unwrap();
        }
        for (name, value) in &self.metadata {
            query("INSERT INTO metadata (name, value) VALUES (?, ?)")
                .bind(name)
                .bind(value)
                .execute(&mut conn)
                .await
                .unwrap();
        }
        for (z, x, y, data) in &self.tiles {
            query("INSERT INTO tiles VALUES (?, ?, ?, ?)")
                .bind(z)
                .bind(x)
                .bind(y)
                .bind(data)
                .execute(&mut conn)
                .await
                .unwrap();
        }
        for (z, x, y, blob) in &self.grids {
            query("INSERT INTO grids VALUES (?, ?, ?, ?)")
                .bind(z)
                .bind(x)
                .bind(y)
                .bind(blob)
                .execute(&mut conn)
                .await
                .unwrap();
        }
        for (z, x, y, key, json) in &self.grid_data {
            query("INSERT INTO grid_data VALUES (?, ?, ?, ?, ?)")
                .bind(z)
                .bind(x)
                .bind(y)
                .bind(key)
                .bind(json)
                .execute(&mut conn)
                .await
                .unwrap();
        }
        conn.close().await.unwrap();
        path.to_path_buf()
    }
}

/// Tiles at zoom 3 and 5 and no metadata at all
pub fn france_35() -> StoreBuilder {
    StoreBuilder::new().levels(&[3, 5])
}

/// Zoom 0 to 6, with bounds and a center at an unavailable zoom level
pub fn geography_class() -> StoreBuilder {
    StoreBuilder::new()
        .meta("name", "Geography Class")
        .meta("description", "One of the example maps that comes with TileMill")
        .meta("attribution", "Natural Earth")
        .meta("version", "1.0.0")
        .meta("bounds", "-18.6328,32.25,29.8828,60.2398")
        .meta("center", "2.3401,48.8503,7")
        .meta("minzoom", "0")
        .meta("maxzoom", "6")
        .meta("format", "png")
        .levels(&[0, 1, 2, 3, 4, 5, 6])
        .tile(3, 4, 5, b"paris")
}

/// Open a writable connection to change a store after it has been read
pub async fn open_writable(path: &Path) -> SqliteConnection {
    let opt = SqliteConnectOptions::new().filename(path);
    SqliteConnection::connect_with(&opt).await.unwrap()
}
