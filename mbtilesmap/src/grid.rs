use mbtilesmap_tile_utils::decode_deflate_stream;
use serde::Serialize;
use serde_json::{Map, Value as JSONValue};

use crate::errors::{MbtError, MbtResult};
use crate::response::wrap_jsonp;

/// A UTF-Grid interactivity tile.
///
/// Containers keep the `grid` and `keys` arrays in a compressed blob, and every
/// `data` entry as a separate row. [`UtfGrid::decode`] joins the two back into
/// one JSON object.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UtfGrid(Map<String, JSONValue>);

impl UtfGrid {
    /// Decompress `blob` and merge the `(key_name, key_json)` rows into its `data` object.
    ///
    /// Rows are applied in the given order, a repeated key keeps the last value.
    /// `source` names the container in error messages.
    pub fn decode<I>(blob: &[u8], key_rows: I, source: &str) -> MbtResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let json = decode_deflate_stream(blob)
            .map_err(|e| MbtError::corrupt(source, format!("unable to decompress grid: {e}")))?;
        let JSONValue::Object(mut grid) = serde_json::from_slice(&json)
            .map_err(|e| MbtError::corrupt(source, format!("grid is not valid JSON: {e}")))?
        else {
            return Err(MbtError::corrupt(source, "grid is not a JSON object"));
        };

        let mut data = Map::new();
        for (key_name, key_json) in key_rows {
            let value = serde_json::from_str(&key_json).map_err(|e| {
                MbtError::corrupt(source, format!("grid data for key {key_name}: {e}"))
            })?;
            data.insert(key_name, value);
        }
        grid.insert("data".to_string(), JSONValue::Object(data));

        Ok(Self(grid))
    }

    /// Encoded rows of the grid, one string per pixel row
    #[must_use]
    pub fn rows(&self) -> Option<&Vec<JSONValue>> {
        self.0.get("grid").and_then(JSONValue::as_array)
    }

    #[must_use]
    pub fn keys(&self) -> Option<&Vec<JSONValue>> {
        self.0.get("keys").and_then(JSONValue::as_array)
    }

    #[must_use]
    pub fn data(&self) -> Option<&Map<String, JSONValue>> {
        self.0.get("data").and_then(JSONValue::as_object)
    }

    #[must_use]
    pub fn into_json(self) -> JSONValue {
        JSONValue::Object(self.0)
    }

    /// Serialize as JSON, optionally wrapped into a `callback(...);` envelope.
    pub fn to_jsonp(&self, callback: Option<&str>) -> MbtResult<String> {
        wrap_jsonp(callback, &serde_json::to_string(&self.0)?)
    }
}
