use futures::StreamExt as _;
use futures::stream::{self, BoxStream};
use log::{debug, warn};
use tilejson::TileJSON;
use url::Url;

use crate::catalog::{CatalogResolver, CatalogRoot};
use crate::config::{Config, MissingTilePolicy};
use crate::enumerator::CatalogEnumerator;
use crate::errors::{MbtError, MbtResult};
use crate::locator::StoreLocator;
use crate::response::{
    DEFAULT_TILEJSON_CALLBACK, TilePayload, validate_callback, validate_identifier, wrap_jsonp,
};
use crate::store::TileStore;
use crate::tiles_info::build_tilejson;

/// Entry point for a web layer.
///
/// Every request opens its own [`TileStore`] and closes it when done,
/// nothing is shared between requests except the configuration.
#[derive(Clone, Debug)]
pub struct TileService {
    config: Config,
    resolver: CatalogResolver,
}

impl TileService {
    /// Fails if no catalog root is configured or one of them does not exist.
    pub fn new(config: Config) -> MbtResult<Self> {
        let resolver = CatalogResolver::new(&config)?;
        Ok(Self { config, resolver })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn catalogs(&self) -> &[CatalogRoot] {
        self.resolver.list_roots()
    }

    #[must_use]
    pub fn default_catalog(&self) -> &str {
        self.resolver.default_catalog()
    }

    #[must_use]
    pub fn locator(&self) -> StoreLocator<'_> {
        StoreLocator::new(&self.config, &self.resolver)
    }

    #[must_use]
    pub fn enumerator(&self) -> CatalogEnumerator<'_> {
        CatalogEnumerator::new(&self.config)
    }

    /// Catalog to show first, see [`CatalogEnumerator::default_catalog_guess`]
    pub async fn default_catalog_guess(&self) -> MbtResult<Option<String>> {
        self.enumerator()
            .default_catalog_guess(self.resolver.default_root())
            .await
    }

    /// Find a store by its request identifier. The file itself is not opened yet.
    pub fn open(&self, id: &str, catalog: Option<&str>) -> MbtResult<TileStore> {
        validate_identifier(id)?;
        if let Some(catalog) = catalog {
            validate_identifier(catalog)?;
        }
        let located = self.locator().locate(id, catalog).inspect_err(|e| {
            if matches!(e, MbtError::StoreNotFound { .. }) {
                warn!("{e}");
            }
        })?;
        let store = TileStore::open(&located.path, &self.config)?;
        Ok(match located.catalog {
            Some(catalog) => store.with_catalog(catalog),
            None => store,
        })
    }

    /// All valid stores of one catalog, or of every catalog if none is given.
    pub fn list(&self, catalog: Option<&str>) -> MbtResult<BoxStream<'_, TileStore>> {
        let enumerator = self.enumerator();
        Ok(match catalog {
            Some(name) => enumerator.list(&self.resolver.resolve_catalog(Some(name))?),
            None => stream::iter(self.resolver.list_roots())
                .flat_map(move |root| enumerator.list(root))
                .boxed(),
        })
    }

    /// PNG tile at an XYZ coordinate.
    /// A missing tile is answered according to the configured [`MissingTilePolicy`].
    pub async fn tile(
        &self,
        id: &str,
        catalog: Option<&str>,
        z: u8,
        x: u32,
        y: u32,
    ) -> MbtResult<TilePayload> {
        let mut store = self.open(id, catalog)?;
        let result = store.tile(z, x, y).await;
        self.tile_payload(finish(store, result).await)
    }

    /// The tile that contains the center of the store
    pub async fn preview(&self, id: &str, catalog: Option<&str>) -> MbtResult<TilePayload> {
        let mut store = self.open(id, catalog)?;
        let result = match store.center_tile().await {
            Ok(coord) => {
                debug!("Preview of {id} is tile {coord}");
                store.tile(coord.z, coord.x, coord.y).await
            }
            Err(err) => Err(err),
        };
        self.tile_payload(finish(store, result).await)
    }

    fn tile_payload(&self, result: MbtResult<Vec<u8>>) -> MbtResult<TilePayload> {
        match result {
            Ok(data) => Ok(TilePayload::png(data)),
            Err(err @ MbtError::TileMissing { .. }) => {
                debug!("{err}");
                match self.config.missing_tile {
                    MissingTilePolicy::Empty => Ok(TilePayload::png(Vec::new())),
                    MissingTilePolicy::NotFound => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// UTF-Grid at an XYZ coordinate, optionally wrapped into a JSONP callback.
    /// A missing grid is always reported as [`MbtError::TileMissing`].
    pub async fn grid(
        &self,
        id: &str,
        catalog: Option<&str>,
        z: u8,
        x: u32,
        y: u32,
        callback: Option<&str>,
    ) -> MbtResult<TilePayload> {
        if let Some(callback) = callback {
            validate_callback(callback)?;
        }
        let mut store = self.open(id, catalog)?;
        let grid = store.grid(z, x, y).await;
        let grid = finish(store, grid).await?;
        Ok(TilePayload::javascript(grid.to_jsonp(callback)?))
    }

    pub async fn tilejson(&self, id: &str, catalog: Option<&str>, base: &Url) -> MbtResult<TileJSON> {
        let mut store = self.open(id, catalog)?;
        let tj = build_tilejson(&mut store, base).await;
        finish(store, tj).await
    }

    /// `TileJSON` wrapped into a JSONP callback, `grid` unless another one is given
    pub async fn tilejson_payload(
        &self,
        id: &str,
        catalog: Option<&str>,
        base: &Url,
        callback: Option<&str>,
    ) -> MbtResult<TilePayload> {
        let callback = validate_callback(callback.unwrap_or(DEFAULT_TILEJSON_CALLBACK))?;
        let tj = self.tilejson(id, catalog, base).await?;
        let json = serde_json::to_string(&tj)?;
        Ok(TilePayload::javascript(wrap_jsonp(Some(callback), &json)?))
    }
}

/// Close a store once a request is done. Failing to close is logged, the request result is kept.
async fn finish<T>(store: TileStore, result: MbtResult<T>) -> MbtResult<T> {
    let name = store.to_string();
    keep_result(result, store.close().await, &name)
}

fn keep_result<T>(result: MbtResult<T>, closed: MbtResult<()>, store: &str) -> MbtResult<T> {
    if let Err(err) = closed {
        warn!("Unable to close {store}: {err}");
    }
    result
}
