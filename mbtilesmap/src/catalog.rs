use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::config::Config;
use crate::errors::{MbtError, MbtResult};

/// One configured directory of tile stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogRoot {
    /// Logical catalog name, the last segment of the directory path
    pub name: String,
    /// Absolute path of the directory
    pub path: PathBuf,
}

impl CatalogRoot {
    fn new(path: &Path) -> MbtResult<Self> {
        let path = path.canonicalize().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MbtError::RootNotFound(path.to_path_buf())
            } else {
                MbtError::IoError(e, path.to_path_buf())
            }
        })?;
        Ok(Self {
            name: catalog_name(&path),
            path,
        })
    }
}

fn catalog_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().to_string(),
        |v| v.to_string_lossy().to_string(),
    )
}

/// Maps catalog names to the configured root directories.
#[derive(Clone, Debug)]
pub struct CatalogResolver {
    roots: Vec<CatalogRoot>,
}

impl CatalogResolver {
    /// Fails if no roots are configured, or if any of them does not exist.
    pub fn new(config: &Config) -> MbtResult<Self> {
        let roots = config
            .roots()
            .iter()
            .map(|p| CatalogRoot::new(p))
            .collect::<MbtResult<Vec<_>>>()?;
        if roots.is_empty() {
            return Err(MbtError::NoCatalogRoots);
        }
        debug!(
            "Configured catalogs: {}",
            roots
                .iter()
                .map(|r| format!("{}={}", r.name, r.path.display()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { roots })
    }

    #[must_use]
    pub fn list_roots(&self) -> &[CatalogRoot] {
        &self.roots
    }

    #[must_use]
    pub fn default_root(&self) -> &CatalogRoot {
        // `new` guarantees at least one root
        &self.roots[0]
    }

    #[must_use]
    pub fn default_catalog(&self) -> &str {
        &self.default_root().name
    }

    /// Find a root by its catalog name. Without a name, the default catalog is returned.
    ///
    /// Configured roots are matched first. A visible first-level subdirectory of the
    /// default root is an implicit catalog named after that subdirectory.
    pub fn resolve_catalog(&self, name: Option<&str>) -> MbtResult<CatalogRoot> {
        let Some(name) = name else {
            return Ok(self.default_root().clone());
        };
        if let Some(root) = self.roots.iter().find(|r| r.name == name) {
            return Ok(root.clone());
        }
        self.implicit_catalog(name)
            .ok_or_else(|| MbtError::CatalogNotFound(name.to_string()))
    }

    fn implicit_catalog(&self, name: &str) -> Option<CatalogRoot> {
        let mut components = Path::new(name).components();
        let (Some(Component::Normal(_)), None) = (components.next(), components.next()) else {
            return None;
        };
        if name.starts_with('.') {
            return None;
        }
        let path = self.default_root().path.join(name);
        if !path.is_dir() {
            return None;
        }
        debug!("Using {} as implicit catalog {name}", path.display());
        Some(CatalogRoot {
            name: name.to_string(),
            path,
        })
    }

    /// The configured root that contains `path`, if any
    #[must_use]
    pub fn root_of(&self, path: &Path) -> Option<&CatalogRoot> {
        self.roots.iter().find(|r| path.starts_with(&r.path))
    }
}
