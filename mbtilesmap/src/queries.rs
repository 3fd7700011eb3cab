use futures::TryStreamExt as _;
use log::warn;
use mbtilesmap_tile_utils::{MAX_ZOOM, TileCoord};
use sqlx::{Row as _, SqliteExecutor, query};

use crate::errors::MbtResult;
use crate::metadata::RawMetadata;

/// Returns true if the database has a table or a view with this name
pub async fn has_table<T>(conn: &mut T, name: &str) -> MbtResult<bool>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let row = query(
        "SELECT COUNT(*) AS cnt
         FROM sqlite_master
         WHERE name = ?
             AND type IN ('table', 'view')",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.try_get::<i64, _>("cnt")? > 0)
}

/// All metadata values as stored. Rows with a NULL name or value are skipped.
pub async fn get_metadata_rows<T>(conn: &mut T) -> MbtResult<RawMetadata>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let mut rows = query("SELECT name, value FROM metadata").fetch(&mut *conn);
    let mut result = RawMetadata::new();
    while let Some(row) = rows.try_next().await? {
        let name: Option<String> = row.try_get("name")?;
        let value: Option<String> = row.try_get("value")?;
        if let (Some(name), Some(value)) = (name, value) {
            result.insert(name, value);
        }
    }
    Ok(result)
}

/// Distinct zoom levels of the `tiles` table, ascending.
/// Rows with a zoom level outside of `0..=MAX_ZOOM` are ignored.
pub async fn get_zoom_levels<T>(conn: &mut T, source: &str) -> MbtResult<Vec<u8>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let rows = query(
        "SELECT DISTINCT zoom_level
         FROM tiles
         WHERE zoom_level IS NOT NULL
         ORDER BY zoom_level",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let zoom: i64 = row.try_get(0)?;
        match u8::try_from(zoom) {
            Ok(z) if z <= MAX_ZOOM => levels.push(z),
            _ => warn!("Ignoring tiles with invalid zoom level {zoom} in {source}"),
        }
    }
    Ok(levels)
}

/// Tile data at an XYZ coordinate. The row is flipped to the TMS numbering used in the file.
pub async fn get_tile<T>(conn: &mut T, coord: TileCoord) -> MbtResult<Option<Vec<u8>>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let row = query(
        "SELECT tile_data
         FROM tiles
         WHERE zoom_level = ?
             AND tile_column = ?
             AND tile_row = ?",
    )
    .bind(coord.z)
    .bind(coord.x)
    .bind(coord.tms_row())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(match row {
        Some(row) => row.try_get::<Option<Vec<u8>>, _>(0)?,
        None => None,
    })
}

/// Compressed UTF-Grid blob at an XYZ coordinate
pub async fn get_grid<T>(conn: &mut T, coord: TileCoord) -> MbtResult<Option<Vec<u8>>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let row = query(
        "SELECT grid
         FROM grids
         WHERE zoom_level = ?
             AND tile_column = ?
             AND tile_row = ?",
    )
    .bind(coord.z)
    .bind(coord.x)
    .bind(coord.tms_row())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(match row {
        Some(row) => row.try_get::<Option<Vec<u8>>, _>(0)?,
        None => None,
    })
}

/// `(key_name, key_json)` rows of a grid tile, in the order `SQLite` returns them.
/// A NULL `key_json` is returned as a JSON `null`.
pub async fn get_grid_data<T>(conn: &mut T, coord: TileCoord) -> MbtResult<Vec<(String, String)>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let rows = query(
        "SELECT key_name, key_json
         FROM grid_data
         WHERE zoom_level = ?
             AND tile_column = ?
             AND tile_row = ?",
    )
    .bind(coord.z)
    .bind(coord.x)
    .bind(coord.tms_row())
    .fetch_all(&mut *conn)
    .await?;

    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let key_name: Option<String> = row.try_get("key_name")?;
        let key_json: Option<String> = row.try_get("key_json")?;
        if let Some(key_name) = key_name {
            result.push((key_name, key_json.unwrap_or_else(|| "null".to_string())));
        }
    }
    Ok(result)
}
