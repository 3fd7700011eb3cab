use std::path::{Path, PathBuf};

use futures::stream::{self, BoxStream};
use futures::StreamExt as _;
use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::catalog::CatalogRoot;
use crate::config::Config;
use crate::errors::{MbtError, MbtResult};
use crate::store::TileStore;

/// Lists the valid tile stores of a catalog.
///
/// Files that cannot be opened as a tile store are logged and skipped,
/// a single broken file never ends the listing.
#[derive(Clone, Copy, Debug)]
pub struct CatalogEnumerator<'a> {
    config: &'a Config,
}

impl<'a> CatalogEnumerator<'a> {
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Files with the configured extension below `root`, sorted by name within each directory.
    /// Hidden files and directories are ignored.
    pub fn candidates(&self, root: &Path) -> impl Iterator<Item = PathBuf> + use<'a> {
        self.walk(root, self.config.walk_depth)
    }

    fn walk(&self, root: &Path, max_depth: Option<usize>) -> impl Iterator<Item = PathBuf> + use<'a> {
        let mut walker = WalkDir::new(root).follow_links(true).sort_by_file_name();
        if let Some(depth) = max_depth {
            walker = walker.max_depth(depth);
        }
        let config = self.config;
        let root = root.to_path_buf();
        walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(move |entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry in {}: {err}", root.display());
                    None
                }
            })
            .filter(move |e| e.file_type().is_file() && config.has_extension(e.path()))
            .map(DirEntry::into_path)
    }

    /// Lazily open and validate every candidate file of the catalog.
    /// Each returned store is tagged with the catalog name and has its connection closed.
    pub fn list(&self, root: &CatalogRoot) -> BoxStream<'a, TileStore> {
        self.list_with_depth(root, self.config.walk_depth)
    }

    fn list_with_depth(&self, root: &CatalogRoot, max_depth: Option<usize>) -> BoxStream<'a, TileStore> {
        let config = self.config;
        let catalog = root.name.clone();
        stream::iter(self.walk(&root.path, max_depth))
            .filter_map(move |path| {
                let catalog = catalog.clone();
                async move { open_valid(path, &catalog, config).await }
            })
            .boxed()
    }

    /// First candidate file below `root` named `identifier`, with or without the extension.
    pub fn find(&self, root: &Path, identifier: &str) -> Option<PathBuf> {
        self.candidates(root).find(|path| {
            path.file_name().is_some_and(|v| v == identifier)
                || path.file_stem().is_some_and(|v| v == identifier)
        })
    }

    /// Guess the catalog to show first.
    ///
    /// A root that directly contains a valid store is its own default catalog.
    /// Otherwise the first subdirectory by name is used, which the resolver knows
    /// as an implicit catalog. If there is none there is no default.
    pub async fn default_catalog_guess(&self, root: &CatalogRoot) -> MbtResult<Option<String>> {
        if self.list_with_depth(root, Some(1)).next().await.is_some() {
            return Ok(Some(root.name.clone()));
        }

        let subdirs = WalkDir::new(&root.path)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));
        for entry in subdirs {
            let entry = entry.map_err(|e| MbtError::DirectoryWalking(e, root.path.clone()))?;
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy().to_string();
                debug!("No stores directly in {}, guessing catalog {name}", root.path.display());
                return Ok(Some(name));
            }
        }
        Ok(None)
    }
}

async fn open_valid(path: PathBuf, catalog: &str, config: &Config) -> Option<TileStore> {
    match validated_store(&path, catalog, config).await {
        Ok(store) => {
            debug!("Found tile store {} in catalog {catalog}", store.id());
            Some(store)
        }
        Err(err) => {
            warn!("Skipping {}: {err}", path.display());
            None
        }
    }
}

async fn validated_store(path: &Path, catalog: &str, config: &Config) -> MbtResult<TileStore> {
    let mut store = TileStore::open(path, config)?.with_catalog(catalog);
    store.validate().await?;
    store.disconnect().await?;
    Ok(store)
}

/// Returns `true` if `entry`'s file name starts with `.`, `false` otherwise.
fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|s| s.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn candidates_filter_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::create_dir(root.join(".hidden")).unwrap();
        for file in [
            "b.mbtiles",
            "a.mbtiles",
            "notes.txt",
            "mbtiles",
            ".secret.mbtiles",
            "nested/c.mbtiles",
            "nested/deeper/d.mbtiles",
            ".hidden/e.mbtiles",
        ] {
            fs::write(root.join(file), b"").unwrap();
        }
        fs::create_dir(root.join("dir.mbtiles")).unwrap();

        let cfg = Config::default();
        let found: Vec<_> = CatalogEnumerator::new(&cfg)
            .candidates(root)
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            found,
            [
                PathBuf::from("a.mbtiles"),
                PathBuf::from("b.mbtiles"),
                PathBuf::from("nested/c.mbtiles"),
                PathBuf::from("nested/deeper/d.mbtiles"),
            ]
        );

        let cfg = Config {
            walk_depth: Some(1),
            ..Config::default()
        };
        let found = CatalogEnumerator::new(&cfg).candidates(root).count();
        assert_eq!(found, 2);
    }

    #[test]
    fn candidates_of_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::default();
        let found = CatalogEnumerator::new(&cfg)
            .candidates(&dir.path().join("missing"))
            .count();
        assert_eq!(found, 0);
    }

    #[tokio::test]
    async fn invalid_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.mbtiles"), b"").unwrap();
        fs::write(dir.path().join("text.mbtiles"), b"not a database").unwrap();
        let root = CatalogRoot {
            name: "maps".to_string(),
            path: dir.path().to_path_buf(),
        };

        let cfg = Config::default();
        let stores: Vec<_> = CatalogEnumerator::new(&cfg).list(&root).collect().await;
        assert!(stores.is_empty());
    }

    #[tokio::test]
    async fn guess_first_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("zeta")).unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("broken.mbtiles"), b"").unwrap();
        let root = CatalogRoot {
            name: "maps".to_string(),
            path: dir.path().to_path_buf(),
        };

        let cfg = Config::default();
        let guess = CatalogEnumerator::new(&cfg).default_catalog_guess(&root).await.unwrap();
        assert_eq!(guess.as_deref(), Some("alpha"));
    }

    #[test]
    fn find_nested_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2012/europe")).unwrap();
        fs::create_dir(root.join(".old")).unwrap();
        fs::write(root.join("2012/europe/world.mbtiles"), b"").unwrap();
        fs::write(root.join(".old/france.mbtiles"), b"").unwrap();

        let cfg = Config::default();
        let enumerator = CatalogEnumerator::new(&cfg);
        let expected = root.join("2012/europe/world.mbtiles");
        assert_eq!(enumerator.find(root, "world"), Some(expected.clone()));
        assert_eq!(enumerator.find(root, "world.mbtiles"), Some(expected));
        assert_eq!(enumerator.find(root, "france"), None);
        assert_eq!(enumerator.find(root, "europe"), None);
    }

    #[tokio::test]
    async fn no_guess_without_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let root = CatalogRoot {
            name: "maps".to_string(),
            path: dir.path().to_path_buf(),
        };
        let cfg = Config::default();
        let guess = CatalogEnumerator::new(&cfg).default_catalog_guess(&root).await.unwrap();
        assert_eq!(guess, None);
    }
}
