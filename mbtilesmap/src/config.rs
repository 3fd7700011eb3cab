use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use mbtilesmap_tile_utils::DEFAULT_TILE_SIZE;
use serde::{Deserialize, Serialize};

use crate::errors::{MbtError, MbtResult};

/// Separator between catalog root directories in [`Config::root`]
pub const ROOT_DELIMITER: char = ':';

pub const DEFAULT_EXTENSION: &str = "mbtiles";

pub type UnrecognizedValues = HashMap<String, serde_yaml::Value>;

/// What to answer when a store exists but has no tile at the requested coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum MissingTilePolicy {
    /// Succeed with an empty body
    #[default]
    Empty,
    /// Report the tile as not found
    NotFound,
}

/// Settings consumed by the catalog resolver, the store locator and the tile reader.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File extension of tile stores, without the leading dot
    pub extension: String,
    /// One or more catalog directories separated by `:`. The first one is the default catalog.
    /// Quote the value in YAML when it ends with `:` or contains `: `, e.g. `root: "/srv/maps:/srv/archive"`.
    pub root: String,
    /// Tile width and height in pixels, used when projecting the center to a tile
    pub tile_size: u32,
    pub missing_tile: MissingTilePolicy,
    /// How deep to look for tile stores below a catalog root. Unlimited if not set.
    pub walk_depth: Option<usize>,
    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            root: ".".to_string(),
            tile_size: DEFAULT_TILE_SIZE,
            missing_tile: MissingTilePolicy::default(),
            walk_depth: None,
            unrecognized: UnrecognizedValues::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> MbtResult<Self> {
        let contents =
            fs::read_to_string(path).map_err(|e| MbtError::IoError(e, path.to_path_buf()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> MbtResult<Self> {
        let mut cfg: Self = serde_yaml::from_str(contents)?;
        for key in cfg.unrecognized.keys() {
            warn!("Ignoring unrecognized configuration key '{key}'");
        }
        cfg.finalize()?;
        Ok(cfg)
    }

    /// Normalize values and reject the ones that cannot work.
    /// Call again after changing any field.
    pub fn finalize(&mut self) -> MbtResult<()> {
        self.extension = self.extension.trim_start_matches('.').to_string();
        if self.extension.is_empty() {
            return Err(MbtError::InvalidConfig(
                "tile store extension must not be empty".to_string(),
            ));
        }
        if self.tile_size == 0 {
            return Err(MbtError::InvalidConfig(
                "tile_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured catalog root directories, in order. Empty segments are ignored.
    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        self.root
            .split(ROOT_DELIMITER)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// `name` with the configured extension appended, e.g. `world` -> `world.mbtiles`
    #[must_use]
    pub fn file_name_for(&self, name: &str) -> String {
        format!("{name}.{}", self.extension)
    }

    #[must_use]
    pub fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }
}
