use std::path::{Path, PathBuf};

use log::debug;

use crate::catalog::{CatalogResolver, CatalogRoot};
use crate::config::Config;
use crate::enumerator::CatalogEnumerator;
use crate::errors::{MbtError, MbtResult};

/// Resolves a tileset identifier to a container file.
///
/// An identifier may be given in four forms, tried in this order:
/// 1. an existing path to a file, used as-is
/// 2. a file name inside the catalog root, e.g. `world.mbtiles`
/// 3. a bare id inside the catalog root, e.g. `world`, with the configured extension appended
/// 4. a file name or bare id anywhere below the catalog root, searched like the catalog is listed
#[derive(Clone, Copy, Debug)]
pub struct StoreLocator<'a> {
    config: &'a Config,
    resolver: &'a CatalogResolver,
}

/// A container file together with the catalog it was found in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedStore {
    pub path: PathBuf,
    /// `None` for a path outside of every configured root
    pub catalog: Option<String>,
}

impl<'a> StoreLocator<'a> {
    #[must_use]
    pub fn new(config: &'a Config, resolver: &'a CatalogResolver) -> Self {
        Self { config, resolver }
    }

    pub fn locate(&self, identifier: &str, catalog: Option<&str>) -> MbtResult<LocatedStore> {
        let root = self.resolver.resolve_catalog(catalog)?;

        let direct = PathBuf::from(identifier);
        if direct.is_file() {
            let path = absolute(&direct)?;
            debug!("Resolved '{identifier}' to {}", path.display());
            let catalog = if path.starts_with(&root.path) {
                Some(root.name)
            } else {
                self.resolver.root_of(&path).map(|r| r.name.clone())
            };
            return Ok(LocatedStore { path, catalog });
        }

        let path = self.locate_in(identifier, &root)?;
        Ok(LocatedStore {
            path,
            catalog: Some(root.name),
        })
    }

    fn locate_in(&self, identifier: &str, root: &CatalogRoot) -> MbtResult<PathBuf> {
        let candidates = [
            root.path.join(identifier),
            root.path.join(self.config.file_name_for(identifier)),
        ];
        let found = candidates.into_iter().find(|p| p.is_file()).or_else(|| {
            CatalogEnumerator::new(self.config).find(&root.path, identifier)
        });
        match found {
            Some(candidate) => {
                debug!("Resolved '{identifier}' to {}", candidate.display());
                absolute(&candidate)
            }
            None => Err(MbtError::StoreNotFound {
                id: identifier.to_string(),
                root: root.path.clone(),
                catalog: root.name.clone(),
            }),
        }
    }
}

fn absolute(path: &Path) -> MbtResult<PathBuf> {
    path.canonicalize()
        .map_err(|e| MbtError::IoError(e, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        other: PathBuf,
        config: Config,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("maps");
        fs::create_dir(&root).unwrap();
        let root = root.canonicalize().unwrap();
        let other = dir.path().join("other");
        fs::create_dir(&other).unwrap();
        let other = other.canonicalize().unwrap();
        fs::write(root.join("world.mbtiles"), b"").unwrap();
        fs::write(root.join("plain"), b"").unwrap();
        fs::write(other.join("world.mbtiles"), b"").unwrap();
        let config = Config::with_root(format!("{}:{}", root.display(), other.display()));
        Fixture {
            _dir: dir,
            root,
            other,
            config,
        }
    }

    #[test]
    fn call_styles() {
        let f = fixture();
        let resolver = CatalogResolver::new(&f.config).unwrap();
        let locator = StoreLocator::new(&f.config, &resolver);
        let expected = f.root.join("world.mbtiles");

        let found = locator.locate("world", None).unwrap();
        assert_eq!(found.path, expected);
        assert_eq!(found.catalog.as_deref(), Some("maps"));

        assert_eq!(locator.locate("world.mbtiles", None).unwrap().path, expected);
        assert_eq!(
            locator.locate(expected.to_str().unwrap(), None).unwrap().path,
            expected
        );
        assert_eq!(
            locator.locate("plain", Some("maps")).unwrap().path,
            f.root.join("plain")
        );
    }

    #[test]
    fn catalog_selects_root() {
        let f = fixture();
        let resolver = CatalogResolver::new(&f.config).unwrap();
        let locator = StoreLocator::new(&f.config, &resolver);

        let found = locator.locate("world", Some("other")).unwrap();
        assert_eq!(found.path, f.other.join("world.mbtiles"));
        assert_eq!(found.catalog.as_deref(), Some("other"));

        assert!(matches!(
            locator.locate("world", Some("nope")),
            Err(MbtError::CatalogNotFound(_))
        ));
    }

    #[test]
    fn existing_path_wins_over_catalog_file() {
        let f = fixture();
        let resolver = CatalogResolver::new(&f.config).unwrap();
        let locator = StoreLocator::new(&f.config, &resolver);

        let absolute = f.other.join("world.mbtiles");
        let found = locator
            .locate(absolute.to_str().unwrap(), Some("maps"))
            .unwrap();
        assert_eq!(found.path, absolute);
        // tagged with the root the file lives in, not the requested one
        assert_eq!(found.catalog.as_deref(), Some("other"));
    }

    #[test]
    fn path_outside_of_roots_has_no_catalog() {
        let f = fixture();
        let resolver = CatalogResolver::new(&f.config).unwrap();
        let locator = StoreLocator::new(&f.config, &resolver);

        let outside = tempfile::tempdir().unwrap();
        let file = outside.path().join("loose.mbtiles");
        fs::write(&file, b"").unwrap();
        let found = locator.locate(file.to_str().unwrap(), None).unwrap();
        assert_eq!(found.path, file.canonicalize().unwrap());
        assert_eq!(found.catalog, None);
    }

    #[test]
    fn nested_store_is_found() {
        let f = fixture();
        fs::create_dir_all(f.other.join("2012")).unwrap();
        fs::write(f.other.join("2012/europe.mbtiles"), b"").unwrap();
        let resolver = CatalogResolver::new(&f.config).unwrap();
        let locator = StoreLocator::new(&f.config, &resolver);

        let found = locator.locate("europe", Some("other")).unwrap();
        assert_eq!(found.path, f.other.join("2012/europe.mbtiles"));
        assert_eq!(found.catalog.as_deref(), Some("other"));
        assert!(locator.locate("europe", Some("maps")).is_err());
    }

    #[test]
    fn not_found() {
        let f = fixture();
        let resolver = CatalogResolver::new(&f.config).unwrap();
        let locator = StoreLocator::new(&f.config, &resolver);

        match locator.locate("unknown.mbtiles", None) {
            Err(MbtError::StoreNotFound { id, root, catalog }) => {
                assert_eq!(id, "unknown.mbtiles");
                assert_eq!(root, f.root);
                assert_eq!(catalog, "maps");
            }
            v => panic!("unexpected {v:?}"),
        }
    }
}
