use log::debug;
use serde_json::Value;
use tilejson::{TileJSON, tilejson};
use url::Url;

use crate::errors::{MbtResult, allow_no_tiles};
use crate::store::TileStore;

pub const TILEJSON_VERSION: &str = "2.0.1";

/// Build the `TileJSON` document of a store.
///
/// Every raw metadata entry is included, then the computed `bounds`, `center`,
/// `minzoom`, `maxzoom` and `name` replace whatever the metadata said.
/// Tile and grid URL templates are resolved against `base`.
pub async fn build_tilejson(store: &mut TileStore, base: &Url) -> MbtResult<TileJSON> {
    let mut tj = tilejson! { tiles: vec![] };
    tj.tilejson = TILEJSON_VERSION.to_string();

    let raw = store.metadata().await?.clone();
    for (name, value) in raw {
        match name.as_str() {
            "description" => tj.description = Some(value),
            "attribution" => tj.attribution = Some(value),
            "legend" => tj.legend = Some(value),
            "template" => tj.template = Some(value),
            "version" => tj.version = Some(value),
            "bounds" | "center" | "minzoom" | "maxzoom" | "name" | "scheme" | "tilejson"
            | "tiles" | "grids" | "data" | "fillzoom" | "vector_layers" => {}
            "id" | "basename" | "filesize" => {
                debug!("Metadata value {name} of {store} is replaced by a computed one");
            }
            _ => {
                tj.other.insert(name, Value::String(value));
            }
        }
    }

    tj.bounds = Some(store.bounds().await?);
    tj.center = allow_no_tiles(store.center().await)?;
    tj.minzoom = allow_no_tiles(store.min_zoom().await)?;
    tj.maxzoom = allow_no_tiles(store.max_zoom().await)?;
    tj.name = Some(store.name().await?);
    tj.scheme = Some("xyz".to_string());

    let catalog = store.catalog();
    tj.tiles = vec![url_template(base, catalog, store.id(), ".png")?];
    tj.grids = Some(vec![url_template(base, catalog, store.id(), ".grid.json")?]);

    tj.other.insert("id".to_string(), Value::from(store.id()));
    tj.other.insert("basename".to_string(), Value::from(store.basename()));
    tj.other.insert("filesize".to_string(), Value::from(store.filesize().await?));

    Ok(tj)
}

/// URL template `[catalog/]id/{z}/{x}/{y}<suffix>` resolved against `base`.
/// The `{z}`, `{x}` and `{y}` placeholders are kept literal.
pub fn url_template(base: &Url, catalog: Option<&str>, id: &str, suffix: &str) -> MbtResult<String> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let relative = match catalog {
        Some(catalog) => format!("./{catalog}/{id}/{{z}}/{{x}}/{{y}}{suffix}"),
        None => format!("./{id}/{{z}}/{{x}}/{{y}}{suffix}"),
    };
    let url = base.join(&relative)?;
    Ok(url
        .as_str()
        .replace("%7B", "{")
        .replace("%7b", "{")
        .replace("%7D", "}")
        .replace("%7d", "}"))
}
